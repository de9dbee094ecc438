//! A recurrence set: RRULE and RDATE instants minus EXRULE and EXDATE.
//!
//! The stored form keeps four texts. Rules are `\n`-separated. Date groups
//! are `\n`-separated lists of the form `[TZID;]VALUE[,VALUE...]`, where a
//! group without a zone is read as UTC.
//!
//! # Example
//!
//! ```
//! use recurrence_engine::{RecurrenceSet, Time};
//!
//! let set = RecurrenceSet::new(Some("FREQ=DAILY;COUNT=3"), None, None, Some("20080222T120000Z"))
//!     .unwrap();
//! let mut dtstart = Time::new("America/New_York").unwrap();
//! dtstart.parse("20080221T070000").unwrap();
//!
//! let starts: Vec<i64> = set.occurrences(&dtstart).unwrap().collect();
//! assert_eq!(starts, vec![1_203_595_200_000, 1_203_768_000_000]);
//! ```

use std::collections::BTreeSet;
use std::iter::{FusedIterator, Peekable};

use tracing::debug;

use crate::error::{RecurrenceError, Result};
use crate::expand::RuleOccurrences;
use crate::rule::RecurrenceRule;
use crate::time::{Time, TIMEZONE_UTC};

// ── Options ─────────────────────────────────────────────────────────────────

/// Window for [`RecurrenceSet::expand`]: `[range_start, range_end)` in epoch
/// milliseconds. `None` leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpandOptions {
    pub range_start: Option<i64>,
    pub range_end: Option<i64>,
}

impl ExpandOptions {
    pub fn with_range(range_start: i64, range_end: i64) -> Self {
        Self {
            range_start: Some(range_start),
            range_end: Some(range_end),
        }
    }
}

/// Result of [`RecurrenceSet::last_occurrence`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastOccurrence {
    /// The set produces nothing.
    None,
    At(i64),
    /// An RRULE has neither COUNT nor UNTIL and no cap was given.
    Unbounded,
}

// ── RecurrenceSet ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecurrenceSet {
    pub rrules: Vec<RecurrenceRule>,
    pub exrules: Vec<RecurrenceRule>,
    pub rdates: BTreeSet<i64>,
    pub exdates: BTreeSet<i64>,
}

impl RecurrenceSet {
    /// Build a set from its four stored texts. Date groups without a zone
    /// are UTC.
    ///
    /// # Errors
    ///
    /// Fails on the first rule or date that does not parse.
    pub fn new(
        rrule: Option<&str>,
        rdate: Option<&str>,
        exrule: Option<&str>,
        exdate: Option<&str>,
    ) -> Result<Self> {
        Self::new_in_zone(rrule, rdate, exrule, exdate, TIMEZONE_UTC)
    }

    /// Like [`RecurrenceSet::new`], reading zone-less date groups in
    /// `default_zone`.
    pub fn new_in_zone(
        rrule: Option<&str>,
        rdate: Option<&str>,
        exrule: Option<&str>,
        exdate: Option<&str>,
        default_zone: &str,
    ) -> Result<Self> {
        let dates = |text: Option<&str>| match text {
            Some(text) => parse_multiline_recurrence_dates_in(text, default_zone),
            None => Ok(BTreeSet::new()),
        };
        Ok(Self {
            rrules: parse_rules(rrule)?,
            exrules: parse_rules(exrule)?,
            rdates: dates(rdate)?,
            exdates: dates(exdate)?,
        })
    }

    /// True when there is at least one RRULE or RDATE.
    pub fn has_recurrence(&self) -> bool {
        !self.rrules.is_empty() || !self.rdates.is_empty()
    }

    /// True when some RRULE has neither COUNT nor UNTIL.
    pub fn is_unbounded(&self) -> bool {
        self.rrules.iter().any(RecurrenceRule::is_unbounded)
    }

    /// Lazily produce the set's instants in ascending order, each once.
    ///
    /// DTSTART is produced through the RRULE streams, so a set made only of
    /// RDATEs yields only those dates. Every EXRULE stream also starts at
    /// DTSTART and therefore removes it.
    ///
    /// # Errors
    ///
    /// Returns an error if `dtstart` or a rule's UNTIL cannot be resolved.
    pub fn occurrences(&self, dtstart: &Time) -> Result<SetOccurrences> {
        let rules = self
            .rrules
            .iter()
            .map(|rule| Ok(rule.occurrences(dtstart)?.peekable()))
            .collect::<Result<Vec<_>>>()?;
        let exrules = self
            .exrules
            .iter()
            .map(|rule| Ok(rule.occurrences(dtstart)?.peekable()))
            .collect::<Result<Vec<_>>>()?;
        Ok(SetOccurrences {
            rules,
            rdates: self.rdates.iter().copied().collect(),
            rdate_pos: 0,
            exrules,
            exdates: self.exdates.clone(),
            end: None,
        })
    }

    /// Collect the instants inside `options`' window.
    ///
    /// # Errors
    ///
    /// Returns [`RecurrenceError::Expansion`] when the set is unbounded and
    /// the window has no end.
    #[tracing::instrument(level = "debug", skip(self, dtstart), fields(rules = self.rrules.len()))]
    pub fn expand(&self, dtstart: &Time, options: &ExpandOptions) -> Result<Vec<i64>> {
        if self.is_unbounded() && options.range_end.is_none() {
            return Err(RecurrenceError::Expansion(
                "unbounded recurrence needs a range end".to_string(),
            ));
        }
        let mut occurrences = self.occurrences(dtstart)?;
        if let Some(end) = options.range_end {
            occurrences = occurrences.before(end);
        }
        let starts: Vec<i64> = occurrences
            .skip_while(|&millis| options.range_start.is_some_and(|start| millis < start))
            .take_while(|&millis| options.range_end.is_none_or(|end| millis < end))
            .collect();
        debug!(count = starts.len(), "expanded recurrence set");
        Ok(starts)
    }

    /// The last instant of the set, looking no further than `max` when given.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`RecurrenceSet::occurrences`].
    pub fn last_occurrence(&self, dtstart: &Time, max: Option<i64>) -> Result<LastOccurrence> {
        if max.is_none() && self.is_unbounded() {
            return Ok(LastOccurrence::Unbounded);
        }
        let mut occurrences = self.occurrences(dtstart)?;
        if let Some(max) = max {
            occurrences = occurrences.before(max.saturating_add(1));
        }
        let last = occurrences.last();
        Ok(last.map_or(LastOccurrence::None, LastOccurrence::At))
    }
}

// ── SetOccurrences ──────────────────────────────────────────────────────────

/// Iterator returned by [`RecurrenceSet::occurrences`].
#[derive(Debug, Clone)]
pub struct SetOccurrences {
    rules: Vec<Peekable<RuleOccurrences>>,
    rdates: Vec<i64>,
    rdate_pos: usize,
    exrules: Vec<Peekable<RuleOccurrences>>,
    exdates: BTreeSet<i64>,
    /// Exclusive upper bound on merged candidates.
    end: Option<i64>,
}

impl SetOccurrences {
    /// Stop at the first merged candidate at or after `end`, excluded or
    /// not, so a window whose instants are all excluded still ends there.
    pub fn before(mut self, end: i64) -> Self {
        self.end = Some(self.end.map_or(end, |current| current.min(end)));
        self
    }

    fn next_candidate(&mut self) -> Option<i64> {
        let from_rules = self.rules.iter_mut().filter_map(|rule| rule.peek().copied()).min();
        let from_rdates = self.rdates.get(self.rdate_pos).copied();
        let next = match (from_rules, from_rdates) {
            (Some(a), Some(b)) => a.min(b),
            (a, b) => a.or(b)?,
        };
        if self.end.is_some_and(|end| next >= end) {
            return None;
        }

        for rule in &mut self.rules {
            while rule.next_if_eq(&next).is_some() {}
        }
        while self.rdates.get(self.rdate_pos) == Some(&next) {
            self.rdate_pos += 1;
        }
        Some(next)
    }

    fn excluded(&mut self, millis: i64) -> bool {
        if self.exdates.contains(&millis) {
            return true;
        }
        let mut hit = false;
        for exrule in &mut self.exrules {
            while exrule.next_if(|&ex| ex < millis).is_some() {}
            hit |= exrule.peek() == Some(&millis);
        }
        hit
    }
}

impl Iterator for SetOccurrences {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        loop {
            let candidate = self.next_candidate()?;
            if !self.excluded(candidate) {
                return Some(candidate);
            }
        }
    }
}

impl FusedIterator for SetOccurrences {}

// ── Date lists ──────────────────────────────────────────────────────────────

/// Parse one stored date group, `[TZID;]VALUE[,VALUE...]`.
///
/// A group without a zone is UTC. A value ending in `Z` is UTC whatever the
/// group's zone, and a date-only value is midnight in the group's zone.
///
/// # Errors
///
/// Returns [`RecurrenceError::InvalidTimezone`] or
/// [`RecurrenceError::InvalidDatetime`] for the first bad zone or value.
pub fn parse_recurrence_dates(text: &str) -> Result<Vec<i64>> {
    parse_recurrence_dates_in(text, TIMEZONE_UTC)
}

/// Like [`parse_recurrence_dates`], reading a group without a zone in
/// `default_zone`.
pub fn parse_recurrence_dates_in(text: &str, default_zone: &str) -> Result<Vec<i64>> {
    let (timezone, values) = text.split_once(';').unwrap_or((default_zone, text));
    parse_date_values(timezone, values)
}

/// Parse `\n`-separated date groups, collapsing duplicates.
///
/// # Errors
///
/// Fails on the first group [`parse_recurrence_dates`] rejects.
pub fn parse_multiline_recurrence_dates(text: &str) -> Result<BTreeSet<i64>> {
    parse_multiline_recurrence_dates_in(text, TIMEZONE_UTC)
}

/// Like [`parse_multiline_recurrence_dates`], reading groups without a zone
/// in `default_zone`.
pub fn parse_multiline_recurrence_dates_in(
    text: &str,
    default_zone: &str,
) -> Result<BTreeSet<i64>> {
    let mut dates = BTreeSet::new();
    for group in text.lines().map(str::trim).filter(|group| !group.is_empty()) {
        dates.extend(parse_recurrence_dates_in(group, default_zone)?);
    }
    Ok(dates)
}

/// Parse a comma-separated value list in `timezone`.
pub(crate) fn parse_date_values(timezone: &str, values: &str) -> Result<Vec<i64>> {
    let template = Time::new(timezone)?;
    values
        .split(',')
        .filter(|value| !value.is_empty())
        .map(|value| {
            let mut time = template.clone();
            time.parse(value)?;
            time.to_millis()
        })
        .collect()
}

fn parse_rules(text: Option<&str>) -> Result<Vec<RecurrenceRule>> {
    let Some(text) = text else {
        return Ok(Vec::new());
    };
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(RecurrenceRule::parse)
        .collect()
}
