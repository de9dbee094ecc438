//! Lazy expansion of one rule into occurrence instants.
//!
//! [`RuleOccurrences`] walks the rule one period at a time (a year, a month,
//! a week aligned to WKST, a day, or one clock unit for the sub-daily
//! frequencies). Within a period it builds every candidate date that passes
//! the BYxxx filters, crosses it with the candidate times, applies
//! BYSETPOS and resolves each wall-clock value in the DTSTART zone.
//!
//! DTSTART is always the first instant produced and counts toward COUNT,
//! whether or not it matches the rule.

use std::collections::VecDeque;
use std::iter::FusedIterator;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike, Weekday};
use chrono_tz::Tz;
use tracing::warn;

use crate::error::{RecurrenceError, Result};
use crate::rule::{Frequency, RecurrenceRule, WeekdayNum};
use crate::time::{days_in_month, days_in_year, resolve_local, Time};

/// Occurrences past the end of this year are never produced.
pub const MAX_YEAR: i32 = 9999;

impl RecurrenceRule {
    /// Lazily expand this rule from `dtstart`.
    ///
    /// The iterator is infinite when the rule has neither COUNT nor UNTIL.
    /// Clone it, or call this again, to restart.
    pub fn occurrences(&self, dtstart: &Time) -> Result<RuleOccurrences> {
        RuleOccurrences::new(self, dtstart)
    }
}

// ── Filters ─────────────────────────────────────────────────────────────────

/// BYxxx lists with the DTSTART-derived defaults filled in.
#[derive(Debug, Clone)]
struct Filters {
    months: Vec<u32>,
    week_nos: Vec<i32>,
    year_days: Vec<i32>,
    month_days: Vec<i32>,
    days: Vec<WeekdayNum>,
    hours: Vec<u32>,
    minutes: Vec<u32>,
    seconds: Vec<u32>,
    week_start: Weekday,
    /// BYDAY ordinals count within the month rather than the year.
    month_scope: bool,
}

impl Filters {
    fn new(rule: &RecurrenceRule, anchor: NaiveDateTime) -> Self {
        let freq = rule.freq;
        let mut months = sorted(&rule.by_month);
        let mut month_days = sorted(&rule.by_month_day);
        let mut days = rule.by_day.clone();

        let no_day_rules = rule.by_week_no.is_empty()
            && rule.by_year_day.is_empty()
            && rule.by_month_day.is_empty()
            && rule.by_day.is_empty();
        if no_day_rules {
            match freq {
                Frequency::Yearly => {
                    if months.is_empty() {
                        months = vec![anchor.month()];
                    }
                    month_days = vec![anchor.day() as i32];
                }
                Frequency::Monthly => month_days = vec![anchor.day() as i32],
                Frequency::Weekly => days = vec![WeekdayNum::every(anchor.weekday())],
                _ => {}
            }
        }
        if freq < Frequency::Monthly {
            // Ordinals only mean something inside a month or a year.
            for entry in &mut days {
                entry.ordinal = 0;
            }
            days.dedup();
        }

        let or_anchor = |list: &[u32], coarser_than: Frequency, value: u32| {
            if list.is_empty() && freq > coarser_than {
                vec![value]
            } else {
                sorted(list)
            }
        };

        Self {
            months,
            week_nos: rule.by_week_no.clone(),
            year_days: rule.by_year_day.clone(),
            month_days,
            days,
            hours: or_anchor(&rule.by_hour, Frequency::Hourly, anchor.hour()),
            minutes: or_anchor(&rule.by_minute, Frequency::Minutely, anchor.minute()),
            seconds: or_anchor(&rule.by_second, Frequency::Secondly, anchor.second()),
            week_start: rule.week_start,
            month_scope: freq == Frequency::Monthly
                || (freq == Frequency::Yearly && !rule.by_month.is_empty()),
        }
    }

    fn date_matches(&self, date: NaiveDate) -> bool {
        if !self.months.is_empty() && !self.months.contains(&date.month()) {
            return false;
        }
        if !self.week_nos.is_empty() {
            let (week, weeks_in_year) = week_number(date, self.week_start);
            if !self
                .week_nos
                .iter()
                .any(|&n| n == week || n == week - weeks_in_year - 1)
            {
                return false;
            }
        }
        if !self.year_days.is_empty() {
            let day = date.ordinal() as i32;
            let len = days_in_year(date.year()) as i32;
            if !signed_contains(&self.year_days, day, len) {
                return false;
            }
        }
        if !self.month_days.is_empty() {
            let day = date.day() as i32;
            let len = days_in_month(date.year(), date.month0() as i32) as i32;
            if !signed_contains(&self.month_days, day, len) {
                return false;
            }
        }
        if !self.days.is_empty() && !self.days.iter().any(|e| self.weekday_matches(date, e)) {
            return false;
        }
        true
    }

    fn weekday_matches(&self, date: NaiveDate, entry: &WeekdayNum) -> bool {
        if date.weekday() != entry.weekday {
            return false;
        }
        if entry.ordinal == 0 {
            return true;
        }
        let Some((first, last)) = self.ordinal_scope(date) else {
            return false;
        };
        let nth = if entry.ordinal > 0 {
            (date - first).num_days() / 7 + 1
        } else {
            -((last - date).num_days() / 7 + 1)
        };
        nth == i64::from(entry.ordinal)
    }

    fn ordinal_scope(&self, date: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        if self.month_scope {
            let first = date.with_day(1)?;
            let last = date.with_day(days_in_month(date.year(), date.month0() as i32))?;
            Some((first, last))
        } else {
            let first = NaiveDate::from_ymd_opt(date.year(), 1, 1)?;
            let last = NaiveDate::from_ymd_opt(date.year(), 12, 31)?;
            Some((first, last))
        }
    }
}

fn sorted<T: Ord + Copy>(list: &[T]) -> Vec<T> {
    let mut out = list.to_vec();
    out.sort_unstable();
    out.dedup();
    out
}

/// `value` (one-based, out of `len`) matches a positive or negative entry.
fn signed_contains(list: &[i32], value: i32, len: i32) -> bool {
    list.contains(&value) || list.contains(&(value - len - 1))
}

fn days_since_week_start(day: Weekday, week_start: Weekday) -> i64 {
    i64::from((day.num_days_from_monday() + 7 - week_start.num_days_from_monday()) % 7)
}

/// First day of week 1: the first week with at least four days in `year`.
fn week_one_start(year: i32, week_start: Weekday) -> Option<NaiveDate> {
    let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let offset = days_since_week_start(jan1.weekday(), week_start);
    let start = jan1.checked_sub_signed(TimeDelta::days(offset))?;
    if 7 - offset >= 4 {
        Some(start)
    } else {
        start.checked_add_signed(TimeDelta::days(7))
    }
}

/// Week number of `date` under `week_start`, and the number of weeks in the
/// week-numbering year it belongs to.
fn week_number(date: NaiveDate, week_start: Weekday) -> (i32, i32) {
    for year in [date.year() + 1, date.year(), date.year() - 1] {
        let Some(start) = week_one_start(year, week_start) else {
            continue;
        };
        if date >= start {
            let week = (date - start).num_days() / 7 + 1;
            let weeks = week_one_start(year + 1, week_start)
                .map_or(52, |next| (next - start).num_days() / 7);
            return (week as i32, weeks as i32);
        }
    }
    (0, 0)
}

// ── RuleOccurrences ─────────────────────────────────────────────────────────

/// Occurrence instants of one rule, in epoch milliseconds, strictly
/// increasing.
#[derive(Debug, Clone)]
pub struct RuleOccurrences {
    filters: Filters,
    freq: Frequency,
    interval: i64,
    set_pos: Vec<i32>,
    tz: Tz,
    anchor: NaiveDateTime,
    /// First day of the WKST week containing DTSTART.
    week_origin: NaiveDate,
    /// DTSTART truncated to the rule's clock unit.
    clock_origin: NaiveDateTime,
    step: i64,
    start_millis: i64,
    last: i64,
    until: Option<i64>,
    count: Option<u32>,
    emitted: u32,
    pending: VecDeque<i64>,
    started: bool,
    /// No periods remain; `pending` may still hold instants.
    exhausted: bool,
    done: bool,
}

impl RuleOccurrences {
    /// # Errors
    ///
    /// Returns [`RecurrenceError::InvalidDatetime`] if `dtstart` cannot be
    /// resolved, or an error from [`RecurrenceRule::until_millis`].
    pub fn new(rule: &RecurrenceRule, dtstart: &Time) -> Result<Self> {
        let mut start = dtstart.clone();
        let start_millis = start.normalize(true)?;
        let anchor = start.naive_local()?;
        let until = rule.until_millis(dtstart.timezone())?;

        let week_origin = anchor
            .date()
            .checked_sub_signed(TimeDelta::days(days_since_week_start(
                anchor.weekday(),
                rule.week_start,
            )))
            .ok_or_else(|| RecurrenceError::Expansion(format!("{anchor} out of range")))?;
        let clock_origin = match rule.freq {
            Frequency::Hourly => anchor.date().and_time(hms(anchor.hour(), 0, 0)),
            Frequency::Minutely => anchor.date().and_time(hms(anchor.hour(), anchor.minute(), 0)),
            _ => anchor,
        };

        Ok(Self {
            filters: Filters::new(rule, anchor),
            freq: rule.freq,
            interval: i64::from(rule.interval.max(1)),
            set_pos: rule.by_set_pos.clone(),
            tz: start.tz(),
            anchor,
            week_origin,
            clock_origin,
            step: 0,
            start_millis,
            last: start_millis,
            until,
            count: rule.count,
            emitted: 0,
            pending: VecDeque::new(),
            started: false,
            exhausted: false,
            done: false,
        })
    }

    /// Candidates of the next period, or `None` once past [`MAX_YEAR`].
    fn next_period(&mut self) -> Option<Vec<NaiveDateTime>> {
        let step = self.step;
        self.step += 1;
        let offset = step.checked_mul(self.interval)?;

        let dates: Vec<NaiveDate> = match self.freq {
            Frequency::Yearly => {
                let year = i32::try_from(i64::from(self.anchor.year()) + offset).ok()?;
                if year > MAX_YEAR {
                    return None;
                }
                let months: Vec<u32> = if self.filters.months.is_empty() {
                    (1..=12).collect()
                } else {
                    self.filters.months.clone()
                };
                months
                    .into_iter()
                    .flat_map(|month| month_dates(year, month))
                    .filter(|d| self.filters.date_matches(*d))
                    .collect()
            }
            Frequency::Monthly => {
                let base = i64::from(self.anchor.year()) * 12 + i64::from(self.anchor.month0());
                let index = base.checked_add(offset)?;
                let year = i32::try_from(index.div_euclid(12)).ok()?;
                if year > MAX_YEAR {
                    return None;
                }
                month_dates(year, index.rem_euclid(12) as u32 + 1)
                    .filter(|d| self.filters.date_matches(*d))
                    .collect()
            }
            Frequency::Weekly => {
                let first = add_days(self.week_origin, offset.checked_mul(7)?)?;
                if first.year() > MAX_YEAR {
                    return None;
                }
                first
                    .iter_days()
                    .take(7)
                    .filter(|d| self.filters.date_matches(*d))
                    .collect()
            }
            Frequency::Daily => {
                let date = add_days(self.anchor.date(), offset)?;
                if date.year() > MAX_YEAR {
                    return None;
                }
                if self.filters.date_matches(date) {
                    vec![date]
                } else {
                    Vec::new()
                }
            }
            Frequency::Hourly | Frequency::Minutely | Frequency::Secondly => {
                return self.next_clock_period(offset);
            }
        };

        let mut candidates = Vec::new();
        for date in dates {
            for &h in &self.filters.hours {
                for &m in &self.filters.minutes {
                    for &s in &self.filters.seconds {
                        candidates.push(date.and_time(hms(h, m, s)));
                    }
                }
            }
        }
        Some(self.apply_set_pos(candidates))
    }

    fn next_clock_period(&mut self, offset: i64) -> Option<Vec<NaiveDateTime>> {
        let unit = match self.freq {
            Frequency::Hourly => 3_600,
            Frequency::Minutely => 60,
            _ => 1,
        };
        let period = self
            .clock_origin
            .checked_add_signed(TimeDelta::try_seconds(offset.checked_mul(unit)?)?)?;
        if period.year() > MAX_YEAR {
            return None;
        }

        if !self.filters.date_matches(period.date()) {
            let next_day = period.date().succ_opt()?.and_time(NaiveTime::MIN);
            self.skip_to(next_day, unit);
            return Some(Vec::new());
        }
        if !self.filters.hours.is_empty() && !self.filters.hours.contains(&period.hour()) {
            let next_hour = period.date().and_time(hms(period.hour(), 0, 0)) + TimeDelta::hours(1);
            self.skip_to(next_hour, unit);
            return Some(Vec::new());
        }
        if self.freq <= Frequency::Minutely
            && !self.filters.minutes.is_empty()
            && !self.filters.minutes.contains(&period.minute())
        {
            return Some(Vec::new());
        }
        if self.freq == Frequency::Secondly
            && !self.filters.seconds.is_empty()
            && !self.filters.seconds.contains(&period.second())
        {
            return Some(Vec::new());
        }

        let minutes = if self.freq <= Frequency::Minutely {
            vec![period.minute()]
        } else {
            self.filters.minutes.clone()
        };
        let seconds = if self.freq == Frequency::Secondly {
            vec![period.second()]
        } else {
            self.filters.seconds.clone()
        };
        let mut candidates = Vec::new();
        for &m in &minutes {
            for &s in &seconds {
                candidates.push(period.date().and_time(hms(period.hour(), m, s)));
            }
        }
        Some(self.apply_set_pos(candidates))
    }

    /// Advance `step` to the first period starting at or after `boundary`.
    fn skip_to(&mut self, boundary: NaiveDateTime, unit: i64) {
        let per_step = self.interval * unit;
        let elapsed = (boundary - self.clock_origin).num_seconds();
        let target = (elapsed + per_step - 1).div_euclid(per_step);
        self.step = self.step.max(target);
    }

    fn apply_set_pos(&self, candidates: Vec<NaiveDateTime>) -> Vec<NaiveDateTime> {
        if self.set_pos.is_empty() {
            return candidates;
        }
        let len = candidates.len() as i64;
        let mut picked: Vec<NaiveDateTime> = self
            .set_pos
            .iter()
            .filter_map(|&pos| {
                let index = if pos > 0 {
                    i64::from(pos) - 1
                } else {
                    len + i64::from(pos)
                };
                usize::try_from(index).ok().and_then(|i| candidates.get(i).copied())
            })
            .collect();
        picked.sort_unstable();
        picked.dedup();
        picked
    }

    fn fill_pending(&mut self) {
        let Some(candidates) = self.next_period() else {
            self.exhausted = true;
            return;
        };
        let mut resolved = Vec::with_capacity(candidates.len());
        for naive in candidates {
            match resolve_local(&self.tz, naive) {
                Ok(local) => resolved.push(local.timestamp_millis()),
                Err(err) => {
                    warn!(error = %err, "stopping expansion at unresolvable time");
                    self.exhausted = true;
                    break;
                }
            }
        }
        resolved.sort_unstable();
        self.pending.extend(resolved);
    }
}

impl Iterator for RuleOccurrences {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        if !self.started {
            self.started = true;
            self.emitted = 1;
            return Some(self.start_millis);
        }
        loop {
            if self.done || self.count.is_some_and(|count| self.emitted >= count) {
                self.done = true;
                return None;
            }
            if let Some(millis) = self.pending.pop_front() {
                if millis <= self.last {
                    continue;
                }
                if self.until.is_some_and(|until| millis > until) {
                    self.done = true;
                    return None;
                }
                self.emitted += 1;
                self.last = millis;
                return Some(millis);
            }
            if self.exhausted {
                self.done = true;
                return None;
            }
            self.fill_pending();
        }
    }
}

impl FusedIterator for RuleOccurrences {}

// ── Internal helpers ────────────────────────────────────────────────────────

fn hms(hour: u32, minute: u32, second: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, second).unwrap_or(NaiveTime::MIN)
}

fn add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_add_signed(TimeDelta::try_days(days)?)
}

fn month_dates(year: i32, month: u32) -> impl Iterator<Item = NaiveDate> {
    let len = days_in_month(year, month as i32 - 1);
    (1..=len).filter_map(move |day| NaiveDate::from_ymd_opt(year, month, day))
}
