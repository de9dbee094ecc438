//! RFC 2445 durations (`P7W`, `-P15DT5H0M20S`, `PT1H2M3S`).
//!
//! The parser is lenient in the way calendar providers need: an empty string
//! is the zero duration, `T` may appear anywhere after `P`, and a unit that
//! repeats overwrites the earlier value. Anything that is not a sign, `P`,
//! `T`, digits or one of the unit letters `W D H M S` is rejected.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::{RecurrenceError, Result};
use crate::time::{
    Time, TimeField, DAY_IN_MILLIS, HOUR_IN_MILLIS, MINUTE_IN_MILLIS, SECOND_IN_MILLIS,
    WEEK_IN_MILLIS,
};

/// A parsed duration. Magnitudes are unsigned; `sign` is `1` or `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Duration {
    pub sign: i32,
    pub weeks: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl Default for Duration {
    fn default() -> Self {
        Self {
            sign: 1,
            weeks: 0,
            days: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

impl Duration {
    /// Parse `[+|-]P[n W|D|H|M|S ...]` with an optional `T` designator.
    ///
    /// # Errors
    ///
    /// Returns [`RecurrenceError::InvalidDuration`] for leading whitespace, a
    /// missing `P`, an unknown character, a unit without digits, digits
    /// without a unit, or a value that does not fit in 32 bits.
    ///
    /// # Examples
    ///
    /// ```
    /// use recurrence_engine::Duration;
    ///
    /// let d = Duration::parse("-P15DT5H0M20S").unwrap();
    /// assert_eq!((d.sign, d.days, d.hours, d.seconds), (-1, 15, 5, 20));
    /// assert!(Duration::parse(" -P15DT5H0M20S").is_err());
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let mut parsed = Duration::default();
        if text.is_empty() {
            return Ok(parsed);
        }

        let rest = match text.as_bytes()[0] {
            b'-' => {
                parsed.sign = -1;
                &text[1..]
            }
            b'+' => &text[1..],
            _ => text,
        };
        let Some(body) = rest.strip_prefix('P') else {
            return Err(RecurrenceError::InvalidDuration(format!(
                "expected 'P' in '{text}'"
            )));
        };

        let mut value: Option<u32> = None;
        for ch in body.chars() {
            if let Some(digit) = ch.to_digit(10) {
                let next = value
                    .unwrap_or(0)
                    .checked_mul(10)
                    .and_then(|n| n.checked_add(digit))
                    .ok_or_else(|| {
                        RecurrenceError::InvalidDuration(format!("value too large in '{text}'"))
                    })?;
                value = Some(next);
                continue;
            }
            if ch == 'T' {
                if value.is_some() {
                    return Err(RecurrenceError::InvalidDuration(format!(
                        "number without unit before 'T' in '{text}'"
                    )));
                }
                continue;
            }
            let slot = match ch {
                'W' => &mut parsed.weeks,
                'D' => &mut parsed.days,
                'H' => &mut parsed.hours,
                'M' => &mut parsed.minutes,
                'S' => &mut parsed.seconds,
                _ => {
                    return Err(RecurrenceError::InvalidDuration(format!(
                        "unexpected '{ch}' in '{text}'"
                    )));
                }
            };
            *slot = value.take().ok_or_else(|| {
                RecurrenceError::InvalidDuration(format!("expected a number before '{ch}' in '{text}'"))
            })?;
        }

        if value.is_some() {
            return Err(RecurrenceError::InvalidDuration(format!(
                "number without unit at end of '{text}'"
            )));
        }
        Ok(parsed)
    }

    pub fn is_zero(&self) -> bool {
        self.weeks == 0 && self.days == 0 && self.hours == 0 && self.minutes == 0
            && self.seconds == 0
    }

    /// Signed length in milliseconds, counting a day as 24 hours.
    pub fn to_millis(&self) -> i64 {
        let magnitude = i64::from(self.weeks) * WEEK_IN_MILLIS
            + i64::from(self.days) * DAY_IN_MILLIS
            + i64::from(self.hours) * HOUR_IN_MILLIS
            + i64::from(self.minutes) * MINUTE_IN_MILLIS
            + i64::from(self.seconds) * SECOND_IN_MILLIS;
        i64::from(self.sign) * magnitude
    }

    /// `millis` shifted by this duration's fixed length.
    pub fn add_to_millis(&self, millis: i64) -> i64 {
        millis + self.to_millis()
    }

    /// Shift `time` by this duration.
    ///
    /// Weeks and days move the wall-clock date; hours, minutes and seconds
    /// are elapsed time.
    pub fn add_to(&self, time: &mut Time) -> Result<()> {
        let sign = i64::from(self.sign);
        let days = i64::from(self.weeks) * 7 + i64::from(self.days);
        if days != 0 {
            time.add(TimeField::MonthDay, sign * days)?;
        }
        let seconds = i64::from(self.hours) * 3_600 + i64::from(self.minutes) * 60
            + i64::from(self.seconds);
        if seconds != 0 {
            time.add(TimeField::Second, sign * seconds)?;
        }
        Ok(())
    }
}

impl FromStr for Duration {
    type Err = RecurrenceError;

    fn from_str(s: &str) -> Result<Self> {
        Duration::parse(s)
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sign < 0 {
            f.write_str("-")?;
        }
        f.write_str("P")?;
        if self.is_zero() {
            return f.write_str("T0S");
        }
        if self.weeks > 0 {
            write!(f, "{}W", self.weeks)?;
        }
        if self.days > 0 {
            write!(f, "{}D", self.days)?;
        }
        if self.hours > 0 || self.minutes > 0 || self.seconds > 0 {
            f.write_str("T")?;
            if self.hours > 0 {
                write!(f, "{}H", self.hours)?;
            }
            if self.minutes > 0 {
                write!(f, "{}M", self.minutes)?;
            }
            if self.seconds > 0 {
                write!(f, "{}S", self.seconds)?;
            }
        }
        Ok(())
    }
}

impl Serialize for Duration {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
