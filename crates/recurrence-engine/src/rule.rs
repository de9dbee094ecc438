//! RRULE / EXRULE parsing and the [`RecurrenceRule`] model.
//!
//! A rule is a semicolon-separated list of `KEY=VALUE` parts. Keys are
//! matched case-insensitively against a fixed table of [`RulePart`]
//! variants. Keys outside the table are skipped so newer producers can add
//! parts without breaking older readers.
//!
//! [`RecurrenceRule`]'s `Display` is the canonical text form: parts are
//! always written in the same order, and a rule parsed back from that text
//! compares equal to the original.

use std::fmt;
use std::str::FromStr;

use chrono::Weekday;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{RecurrenceError, Result};
use crate::time::Time;

// ── Frequency and weekday entries ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Frequency {
    Secondly,
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Secondly => "SECONDLY",
            Frequency::Minutely => "MINUTELY",
            Frequency::Hourly => "HOURLY",
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        const ALL: [Frequency; 7] = [
            Frequency::Secondly,
            Frequency::Minutely,
            Frequency::Hourly,
            Frequency::Daily,
            Frequency::Weekly,
            Frequency::Monthly,
            Frequency::Yearly,
        ];
        ALL.into_iter().find(|f| f.as_str().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `BYDAY` entry. `ordinal` 0 means every such weekday in scope;
/// `-1` is the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct WeekdayNum {
    pub ordinal: i32,
    pub weekday: Weekday,
}

impl WeekdayNum {
    pub fn every(weekday: Weekday) -> Self {
        Self {
            ordinal: 0,
            weekday,
        }
    }

    pub fn nth(ordinal: i32, weekday: Weekday) -> Self {
        Self { ordinal, weekday }
    }

    fn parse(entry: &str) -> Result<Self> {
        let invalid = || RecurrenceError::InvalidRule(format!("bad BYDAY entry '{entry}'"));
        if entry.len() < 2 || !entry.is_ascii() {
            return Err(invalid());
        }
        let (number, code) = entry.split_at(entry.len() - 2);
        let weekday = parse_weekday(code).ok_or_else(invalid)?;
        if number.is_empty() {
            return Ok(Self::every(weekday));
        }
        let digits = number.strip_prefix(['+', '-']).unwrap_or(number);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let ordinal: i32 = number.parse().map_err(|_| invalid())?;
        if ordinal == 0 || !(-53..=53).contains(&ordinal) {
            return Err(invalid());
        }
        Ok(Self::nth(ordinal, weekday))
    }
}

impl fmt::Display for WeekdayNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ordinal != 0 {
            write!(f, "{}", self.ordinal)?;
        }
        f.write_str(weekday_code(self.weekday))
    }
}

pub(crate) fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "SU",
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
    }
}

fn parse_weekday(code: &str) -> Option<Weekday> {
    match code.to_ascii_uppercase().as_str() {
        "SU" => Some(Weekday::Sun),
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        _ => None,
    }
}

// ── Part table ──────────────────────────────────────────────────────────────

/// A recognized rule key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulePart {
    Freq,
    Until,
    Count,
    Interval,
    WeekStart,
    BySecond,
    ByMinute,
    ByHour,
    ByDay,
    ByMonthDay,
    ByYearDay,
    ByWeekNo,
    ByMonth,
    BySetPos,
    Unknown,
}

const RULE_PARTS: [(&str, RulePart); 14] = [
    ("FREQ", RulePart::Freq),
    ("UNTIL", RulePart::Until),
    ("COUNT", RulePart::Count),
    ("INTERVAL", RulePart::Interval),
    ("WKST", RulePart::WeekStart),
    ("BYSECOND", RulePart::BySecond),
    ("BYMINUTE", RulePart::ByMinute),
    ("BYHOUR", RulePart::ByHour),
    ("BYDAY", RulePart::ByDay),
    ("BYMONTHDAY", RulePart::ByMonthDay),
    ("BYYEARDAY", RulePart::ByYearDay),
    ("BYWEEKNO", RulePart::ByWeekNo),
    ("BYMONTH", RulePart::ByMonth),
    ("BYSETPOS", RulePart::BySetPos),
];

impl RulePart {
    pub fn from_key(key: &str) -> Self {
        RULE_PARTS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map_or(RulePart::Unknown, |&(_, part)| part)
    }

    pub fn key(self) -> Option<&'static str> {
        RULE_PARTS
            .iter()
            .find(|(_, part)| *part == self)
            .map(|&(name, _)| name)
    }

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

// ── RecurrenceRule ──────────────────────────────────────────────────────────

/// A parsed RRULE or EXRULE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecurrenceRule {
    pub freq: Frequency,
    /// UNTIL exactly as written (`YYYYMMDD[THHMMSS[Z]]`).
    pub until: Option<String>,
    pub count: Option<u32>,
    pub interval: u32,
    pub week_start: Weekday,
    pub by_second: Vec<u32>,
    pub by_minute: Vec<u32>,
    pub by_hour: Vec<u32>,
    pub by_day: Vec<WeekdayNum>,
    pub by_month_day: Vec<i32>,
    pub by_year_day: Vec<i32>,
    pub by_week_no: Vec<i32>,
    pub by_month: Vec<u32>,
    pub by_set_pos: Vec<i32>,
}

impl RecurrenceRule {
    /// A rule with only `freq` set and every other part at its default.
    pub fn new(freq: Frequency) -> Self {
        Self {
            freq,
            until: None,
            count: None,
            interval: 1,
            week_start: Weekday::Mon,
            by_second: Vec::new(),
            by_minute: Vec::new(),
            by_hour: Vec::new(),
            by_day: Vec::new(),
            by_month_day: Vec::new(),
            by_year_day: Vec::new(),
            by_week_no: Vec::new(),
            by_month: Vec::new(),
            by_set_pos: Vec::new(),
        }
    }

    /// Parse a rule such as `FREQ=MONTHLY;BYDAY=-1FR;COUNT=3`.
    ///
    /// Empty segments (a trailing `;`) are skipped. Unknown keys are ignored.
    /// A negative or zero `COUNT` becomes 1 and an `INTERVAL` below 1 becomes
    /// 1.
    ///
    /// # Errors
    ///
    /// - [`RecurrenceError::InvalidRule`]: a segment without `=`, an empty
    ///   value, a non-numeric or out-of-range list entry, a bad weekday code,
    ///   or an UNTIL that is not a valid date.
    /// - [`RecurrenceError::InconsistentRule`]: FREQ missing or not a known
    ///   frequency, a key given twice, or both COUNT and UNTIL.
    ///
    /// # Examples
    ///
    /// ```
    /// use recurrence_engine::{Frequency, RecurrenceRule};
    ///
    /// let rule = RecurrenceRule::parse("FREQ=WEEKLY;BYDAY=TU,TH;COUNT=4").unwrap();
    /// assert_eq!(rule.freq, Frequency::Weekly);
    /// assert_eq!(rule.count, Some(4));
    /// assert!(RecurrenceRule::parse("FREQ=NEVER").is_err());
    /// ```
    #[tracing::instrument(level = "trace", skip(text), fields(text_len = text.len()))]
    pub fn parse(text: &str) -> Result<Self> {
        let mut rule = RecurrenceRule::new(Frequency::Yearly);
        let mut seen: u16 = 0;

        for segment in text.split(';') {
            if segment.is_empty() {
                continue;
            }
            let Some((key, value)) = segment.split_once('=') else {
                return Err(RecurrenceError::InvalidRule(format!(
                    "missing '=' in '{segment}'"
                )));
            };
            if value.is_empty() {
                return Err(RecurrenceError::InvalidRule(format!(
                    "empty value for '{key}'"
                )));
            }

            let part = RulePart::from_key(key);
            if part == RulePart::Unknown {
                debug!(key, "ignoring unknown rule part");
                continue;
            }
            if seen & part.bit() != 0 {
                return Err(RecurrenceError::InconsistentRule(format!(
                    "'{}' given more than once",
                    key.to_ascii_uppercase()
                )));
            }
            seen |= part.bit();
            rule.apply(part, value)?;
        }

        if seen & RulePart::Freq.bit() == 0 {
            return Err(RecurrenceError::InconsistentRule(format!(
                "FREQ is required in '{text}'"
            )));
        }
        if rule.count.is_some() && rule.until.is_some() {
            return Err(RecurrenceError::InconsistentRule(format!(
                "COUNT and UNTIL are both set in '{text}'"
            )));
        }
        Ok(rule)
    }

    fn apply(&mut self, part: RulePart, value: &str) -> Result<()> {
        match part {
            RulePart::Freq => {
                self.freq = Frequency::parse(value).ok_or_else(|| {
                    RecurrenceError::InconsistentRule(format!("unknown FREQ '{value}'"))
                })?;
            }
            RulePart::Until => {
                Time::utc().parse(value).map_err(|err| {
                    RecurrenceError::InvalidRule(format!("bad UNTIL '{value}': {err}"))
                })?;
                self.until = Some(value.to_string());
            }
            RulePart::Count => {
                let count: i64 = parse_number(value, "COUNT")?;
                if count < 1 {
                    warn!(count, "non-positive COUNT, using 1");
                }
                self.count = Some(u32::try_from(count.max(1)).unwrap_or(u32::MAX));
            }
            RulePart::Interval => {
                let interval: i64 = parse_number(value, "INTERVAL")?;
                if interval < 1 {
                    warn!(interval, "INTERVAL below 1, using 1");
                }
                self.interval = u32::try_from(interval.max(1)).unwrap_or(u32::MAX);
            }
            RulePart::WeekStart => {
                self.week_start = parse_weekday(value).ok_or_else(|| {
                    RecurrenceError::InvalidRule(format!("bad WKST '{value}'"))
                })?;
            }
            RulePart::BySecond => self.by_second = parse_list(value, "BYSECOND", 0, 59)?,
            RulePart::ByMinute => self.by_minute = parse_list(value, "BYMINUTE", 0, 59)?,
            RulePart::ByHour => self.by_hour = parse_list(value, "BYHOUR", 0, 23)?,
            RulePart::ByDay => {
                self.by_day = value
                    .split(',')
                    .map(WeekdayNum::parse)
                    .collect::<Result<_>>()?;
            }
            RulePart::ByMonthDay => {
                self.by_month_day = parse_signed_list(value, "BYMONTHDAY", 31)?;
            }
            RulePart::ByYearDay => {
                self.by_year_day = parse_signed_list(value, "BYYEARDAY", 366)?;
            }
            RulePart::ByWeekNo => self.by_week_no = parse_signed_list(value, "BYWEEKNO", 53)?,
            RulePart::ByMonth => self.by_month = parse_list(value, "BYMONTH", 1, 12)?,
            RulePart::BySetPos => self.by_set_pos = parse_signed_list(value, "BYSETPOS", 366)?,
            RulePart::Unknown => {}
        }
        Ok(())
    }

    /// The rule has neither COUNT nor UNTIL.
    pub fn is_unbounded(&self) -> bool {
        self.count.is_none() && self.until.is_none()
    }

    /// UNTIL as an instant. A trailing `Z` is absolute UTC; otherwise the
    /// value is wall-clock time in `timezone`.
    pub fn until_millis(&self, timezone: &str) -> Result<Option<i64>> {
        let Some(until) = &self.until else {
            return Ok(None);
        };
        let mut time = if until.ends_with('Z') {
            Time::utc()
        } else {
            Time::new(timezone)?
        };
        time.parse(until)?;
        Ok(Some(time.to_millis()?))
    }
}

impl FromStr for RecurrenceRule {
    type Err = RecurrenceError;

    fn from_str(s: &str) -> Result<Self> {
        RecurrenceRule::parse(s)
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FREQ={}", self.freq)?;
        if let Some(until) = &self.until {
            write!(f, ";UNTIL={until}")?;
        }
        if let Some(count) = self.count {
            write!(f, ";COUNT={count}")?;
        }
        if self.interval > 1 {
            write!(f, ";INTERVAL={}", self.interval)?;
        }
        if self.week_start != Weekday::Mon {
            write!(f, ";WKST={}", weekday_code(self.week_start))?;
        }
        write_list(f, "BYSECOND", &self.by_second)?;
        write_list(f, "BYMINUTE", &self.by_minute)?;
        write_list(f, "BYHOUR", &self.by_hour)?;
        write_list(f, "BYDAY", &self.by_day)?;
        write_list(f, "BYMONTHDAY", &self.by_month_day)?;
        write_list(f, "BYYEARDAY", &self.by_year_day)?;
        write_list(f, "BYWEEKNO", &self.by_week_no)?;
        write_list(f, "BYMONTH", &self.by_month)?;
        write_list(f, "BYSETPOS", &self.by_set_pos)
    }
}

// ── Parsing helpers ─────────────────────────────────────────────────────────

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, key: &str, items: &[T]) -> fmt::Result {
    if items.is_empty() {
        return Ok(());
    }
    write!(f, ";{key}=")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn parse_number<T: FromStr>(value: &str, key: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| RecurrenceError::InvalidRule(format!("bad {key} value '{value}'")))
}

fn parse_list(value: &str, key: &str, min: u32, max: u32) -> Result<Vec<u32>> {
    value
        .split(',')
        .map(|item| {
            let n: u32 = parse_number(item, key)?;
            if (min..=max).contains(&n) {
                Ok(n)
            } else {
                Err(RecurrenceError::InvalidRule(format!(
                    "{key} value {n} outside {min}..={max}"
                )))
            }
        })
        .collect()
}

/// Entries in `-max..=-1` or `1..=max`.
fn parse_signed_list(value: &str, key: &str, max: i32) -> Result<Vec<i32>> {
    value
        .split(',')
        .map(|item| {
            let n: i32 = parse_number(item, key)?;
            if n != 0 && n.abs() <= max {
                Ok(n)
            } else {
                Err(RecurrenceError::InvalidRule(format!(
                    "{key} value {n} outside ±1..={max}"
                )))
            }
        })
        .collect()
}
