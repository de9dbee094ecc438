//! Wall-clock calendar arithmetic in an IANA time zone.
//!
//! [`Time`] keeps the field layout calendar storage expects: a zero-based
//! `month`, a Sunday-based `week_day` and a zero-based `year_day`. Fields may
//! be written out of range (day 32, month 13, hour -1) and are folded back
//! into canonical form by [`Time::normalize`] using the proleptic Gregorian
//! calendar.
//!
//! # Functions
//!
//! - [`julian_day`]: local Julian day number of an instant
//! - [`year_day`]: zero-based ordinal of a calendar date
//! - [`days_in_month`] / [`days_in_year`] / [`is_leap_year`]
//!
//! # Wall-clock resolution
//!
//! A local time that falls in a DST gap is moved forward by the length of
//! the gap. A local time that occurs twice resolves to the earlier instant.

use std::fmt;

use chrono::{
    DateTime, Datelike, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeDelta,
    TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;

use crate::error::{RecurrenceError, Result};

/// Julian day number of 1970-01-01.
pub const EPOCH_JULIAN_DAY: i64 = 2_440_588;

pub const SECOND_IN_MILLIS: i64 = 1_000;
pub const MINUTE_IN_MILLIS: i64 = 60 * SECOND_IN_MILLIS;
pub const HOUR_IN_MILLIS: i64 = 60 * MINUTE_IN_MILLIS;
pub const DAY_IN_MILLIS: i64 = 24 * HOUR_IN_MILLIS;
pub const WEEK_IN_MILLIS: i64 = 7 * DAY_IN_MILLIS;

/// Zone identifier used for floating, all-day and `Z`-suffixed values.
pub const TIMEZONE_UTC: &str = "UTC";

/// A calendar field addressed by [`Time::add`] and [`Time::actual_maximum`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeField {
    Second,
    Minute,
    Hour,
    MonthDay,
    Month,
    Year,
    WeekDay,
    YearDay,
}

// ── Time ────────────────────────────────────────────────────────────────────

/// A wall-clock date and time in a named zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Time {
    pub year: i32,
    /// Zero-based month (January = 0).
    pub month: i32,
    /// Day of the month, starting at 1.
    pub day: i32,
    pub hour: i32,
    pub minute: i32,
    pub second: i32,
    /// Day of the week, Sunday = 0.
    pub week_day: i32,
    /// Zero-based day of the year.
    pub year_day: i32,
    /// The value carries a date and no time of day.
    pub all_day: bool,
    timezone: String,
    tz: Tz,
}

impl Time {
    /// Create a time set to 1970-01-01 00:00:00 wall-clock in `timezone`.
    ///
    /// # Errors
    ///
    /// Returns [`RecurrenceError::InvalidTimezone`] if `timezone` is not an
    /// IANA zone name.
    pub fn new(timezone: &str) -> Result<Self> {
        let tz = parse_timezone(timezone)?;
        Ok(Self::with_zone(timezone.to_string(), tz))
    }

    pub fn utc() -> Self {
        Self::with_zone(TIMEZONE_UTC.to_string(), Tz::UTC)
    }

    fn with_zone(timezone: String, tz: Tz) -> Self {
        Self {
            year: 1970,
            month: 0,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
            week_day: 4,
            year_day: 0,
            all_day: false,
            timezone,
            tz,
        }
    }

    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    pub(crate) fn tz(&self) -> Tz {
        self.tz
    }

    /// Parse `YYYYMMDD`, `YYYYMMDDTHHMMSS` or `YYYYMMDDTHHMMSSZ`.
    ///
    /// A date-only value sets [`Time::all_day`]. A trailing `Z` switches the
    /// zone to UTC. The fields are normalized afterwards, so out-of-range
    /// values such as `20060432` roll over into the next month.
    ///
    /// # Errors
    ///
    /// Returns [`RecurrenceError::InvalidDatetime`] when the length is not 8
    /// or at least 15, a digit position holds something else, or the literal
    /// `T`/`Z` is missing.
    pub fn parse(&mut self, text: &str) -> Result<()> {
        let bytes = text.as_bytes();
        let len = bytes.len();
        if len != 8 && len < 15 {
            return Err(RecurrenceError::InvalidDatetime(format!(
                "'{text}' must be 8 or at least 15 characters"
            )));
        }

        let year = parse_digits(text, 0, 4)?;
        let month = parse_digits(text, 4, 2)? - 1;
        let day = parse_digits(text, 6, 2)?;
        let (mut hour, mut minute, mut second) = (0, 0, 0);
        let mut in_utc = false;

        if len > 8 {
            expect_byte(text, 8, b'T')?;
            hour = parse_digits(text, 9, 2)?;
            minute = parse_digits(text, 11, 2)?;
            second = parse_digits(text, 13, 2)?;
            if len > 15 {
                expect_byte(text, 15, b'Z')?;
                in_utc = true;
            }
        }

        self.year = year;
        self.month = month;
        self.day = day;
        self.hour = hour;
        self.minute = minute;
        self.second = second;
        self.all_day = len == 8;
        if in_utc {
            self.timezone = TIMEZONE_UTC.to_string();
            self.tz = Tz::UTC;
        }
        self.normalize(true)?;
        Ok(())
    }

    /// Fold overflowed fields into canonical form and return the instant in
    /// epoch milliseconds.
    ///
    /// `ignore_dst` selects between the two DST modes calendar storage knows
    /// about. Only the ignoring mode is implemented, so both values resolve
    /// the same instant.
    ///
    /// # Errors
    ///
    /// Returns [`RecurrenceError::InvalidDatetime`] if the folded date is
    /// outside the supported range.
    pub fn normalize(&mut self, _ignore_dst: bool) -> Result<i64> {
        let naive = self.folded_naive()?;
        let local = resolve_local(&self.tz, naive)?;
        self.read_fields(&local);
        Ok(local.timestamp_millis())
    }

    /// The instant these fields denote, without mutating `self`.
    pub fn to_millis(&self) -> Result<i64> {
        self.clone().normalize(true)
    }

    /// Populate the fields from an epoch-millisecond instant in this zone.
    ///
    /// Clears [`Time::all_day`].
    pub fn set(&mut self, millis: i64) -> Result<()> {
        let local = instant_in(&self.tz, millis)?;
        self.read_fields(&local);
        self.all_day = false;
        Ok(())
    }

    /// Set the date, with the time of day at midnight, and normalize.
    pub fn set_date(&mut self, day: i32, month: i32, year: i32) -> Result<()> {
        self.set_date_time(0, 0, 0, day, month, year)
    }

    /// Set every wall-clock field, then normalize.
    pub fn set_date_time(
        &mut self,
        second: i32,
        minute: i32,
        hour: i32,
        day: i32,
        month: i32,
        year: i32,
    ) -> Result<()> {
        self.second = second;
        self.minute = minute;
        self.hour = hour;
        self.day = day;
        self.month = month;
        self.year = year;
        self.normalize(true)?;
        Ok(())
    }

    /// Move to another zone, keeping the absolute instant.
    ///
    /// # Errors
    ///
    /// Returns [`RecurrenceError::InvalidTimezone`] for an unknown zone.
    pub fn switch_timezone(&mut self, timezone: &str) -> Result<()> {
        let tz = parse_timezone(timezone)?;
        let millis = self.to_millis()?;
        self.tz = tz;
        self.timezone = timezone.to_string();
        let local = instant_in(&self.tz, millis)?;
        self.read_fields(&local);
        Ok(())
    }

    /// Relabel the zone, keeping the wall-clock fields.
    pub fn set_timezone(&mut self, timezone: &str) -> Result<()> {
        self.tz = parse_timezone(timezone)?;
        self.timezone = timezone.to_string();
        Ok(())
    }

    /// Offset from UTC in seconds at the current instant.
    pub fn gmt_offset(&self) -> Result<i64> {
        let millis = self.to_millis()?;
        let local = instant_in(&self.tz, millis)?;
        Ok(i64::from(local.offset().fix().local_minus_utc()))
    }

    /// Set local midnight of `julian_day` and return its instant.
    ///
    /// In zones where midnight is skipped the time lands on the first
    /// existing wall-clock time of that day.
    pub fn set_julian_day(&mut self, julian_day: i64) -> Result<i64> {
        let date = TimeDelta::try_days(julian_day - EPOCH_JULIAN_DAY)
            .and_then(|delta| epoch_date().checked_add_signed(delta))
            .ok_or_else(|| {
                RecurrenceError::InvalidDatetime(format!("Julian day {julian_day} out of range"))
            })?;
        self.year = date.year();
        self.month = date.month0() as i32;
        self.day = date.day() as i32;
        self.hour = 0;
        self.minute = 0;
        self.second = 0;
        self.normalize(true)
    }

    /// ISO 8601 week number: weeks start on Monday and week 1 holds at least
    /// four days of the new year.
    pub fn week_number(&self) -> Result<u32> {
        let mut copy = self.clone();
        copy.normalize(true)?;
        Ok(copy.naive_date()?.iso_week().week())
    }

    /// Largest value `field` can take for the current month and year.
    pub fn actual_maximum(&self, field: TimeField) -> i32 {
        match field {
            TimeField::Second | TimeField::Minute => 59,
            TimeField::Hour => 23,
            TimeField::MonthDay => days_in_month(self.year, self.month) as i32,
            TimeField::Month => 11,
            TimeField::Year => 9999,
            TimeField::WeekDay => 7,
            TimeField::YearDay => days_in_year(self.year) as i32,
        }
    }

    /// Add `amount` units of `field`.
    ///
    /// Seconds, minutes and hours are elapsed time, so adding 24 hours across
    /// a DST change shifts the wall clock by an hour. Day-based fields keep
    /// the wall-clock time. Month and year additions clamp the day to the end
    /// of the target month.
    pub fn add(&mut self, field: TimeField, amount: i64) -> Result<()> {
        let elapsed = match field {
            TimeField::Second => Some(SECOND_IN_MILLIS),
            TimeField::Minute => Some(MINUTE_IN_MILLIS),
            TimeField::Hour => Some(HOUR_IN_MILLIS),
            _ => None,
        };
        if let Some(unit) = elapsed {
            let millis = amount
                .checked_mul(unit)
                .and_then(|delta| self.to_millis().ok()?.checked_add(delta))
                .ok_or_else(|| self.out_of_range())?;
            let local = instant_in(&self.tz, millis)?;
            self.read_fields(&local);
            return Ok(());
        }

        self.normalize(true)?;
        match field {
            TimeField::MonthDay | TimeField::WeekDay | TimeField::YearDay => {
                self.day = add_i32(self.day, amount).ok_or_else(|| self.out_of_range())?;
            }
            TimeField::Month | TimeField::Year => {
                let months = if field == TimeField::Year {
                    amount.checked_mul(12)
                } else {
                    Some(amount)
                };
                let total = months
                    .and_then(|m| (i64::from(self.year) * 12 + i64::from(self.month)).checked_add(m))
                    .ok_or_else(|| self.out_of_range())?;
                self.year =
                    i32::try_from(total.div_euclid(12)).map_err(|_| self.out_of_range())?;
                self.month = total.rem_euclid(12) as i32;
                self.day = self.day.min(days_in_month(self.year, self.month) as i32);
            }
            _ => {}
        }
        self.normalize(true)?;
        Ok(())
    }

    /// Render in the RFC 2445 text form [`Time::parse`] accepts.
    pub fn format_2445(&self) -> String {
        if self.all_day {
            format!("{:04}{:02}{:02}", self.year, self.month + 1, self.day)
        } else {
            let suffix = if self.timezone == TIMEZONE_UTC { "Z" } else { "" };
            format!(
                "{:04}{:02}{:02}T{:02}{:02}{:02}{suffix}",
                self.year,
                self.month + 1,
                self.day,
                self.hour,
                self.minute,
                self.second
            )
        }
    }

    /// Calendar date of canonical fields.
    pub(crate) fn naive_date(&self) -> Result<NaiveDate> {
        u32::try_from(self.month + 1)
            .ok()
            .zip(u32::try_from(self.day).ok())
            .and_then(|(month, day)| NaiveDate::from_ymd_opt(self.year, month, day))
            .ok_or_else(|| self.out_of_range())
    }

    /// Wall-clock date and time of canonical fields.
    pub(crate) fn naive_local(&self) -> Result<NaiveDateTime> {
        let time = u32::try_from(self.hour)
            .ok()
            .zip(u32::try_from(self.minute).ok())
            .zip(u32::try_from(self.second).ok())
            .and_then(|((h, m), s)| NaiveTime::from_hms_opt(h, m, s))
            .ok_or_else(|| self.out_of_range())?;
        Ok(self.naive_date()?.and_time(time))
    }

    fn folded_naive(&self) -> Result<NaiveDateTime> {
        let month = i64::from(self.month);
        let year = i64::from(self.year) + month.div_euclid(12);
        let month0 = month.rem_euclid(12) as u32;

        let seconds = i64::from(self.hour) * 3_600 + i64::from(self.minute) * 60
            + i64::from(self.second);
        let day_carry = seconds.div_euclid(86_400);
        let second_of_day = seconds.rem_euclid(86_400) as u32;

        let first = i32::try_from(year)
            .ok()
            .and_then(|y| NaiveDate::from_ymd_opt(y, month0 + 1, 1))
            .ok_or_else(|| self.out_of_range())?;
        let date = TimeDelta::try_days(i64::from(self.day) - 1 + day_carry)
            .and_then(|delta| first.checked_add_signed(delta))
            .ok_or_else(|| self.out_of_range())?;
        let time = NaiveTime::from_num_seconds_from_midnight_opt(second_of_day, 0)
            .ok_or_else(|| self.out_of_range())?;
        Ok(date.and_time(time))
    }

    fn read_fields(&mut self, local: &DateTime<Tz>) {
        self.year = local.year();
        self.month = local.month0() as i32;
        self.day = local.day() as i32;
        self.hour = local.hour() as i32;
        self.minute = local.minute() as i32;
        self.second = local.second() as i32;
        self.week_day = local.weekday().num_days_from_sunday() as i32;
        self.year_day = local.ordinal0() as i32;
    }

    fn out_of_range(&self) -> RecurrenceError {
        RecurrenceError::InvalidDatetime(format!(
            "fields out of range: {}-{}-{} {}:{}:{} ({})",
            self.year,
            self.month + 1,
            self.day,
            self.hour,
            self.minute,
            self.second,
            self.timezone
        ))
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_2445())
    }
}

// ── Free functions ──────────────────────────────────────────────────────────

/// Julian day number of the local date containing `millis`.
///
/// `gmt_offset` is the zone offset in seconds at that instant. Days before
/// the epoch round toward negative infinity, so local midnights of
/// consecutive dates always differ by exactly one.
pub fn julian_day(millis: i64, gmt_offset: i64) -> i64 {
    (millis + gmt_offset * SECOND_IN_MILLIS).div_euclid(DAY_IN_MILLIS) + EPOCH_JULIAN_DAY
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in zero-based `month` of `year`.
pub fn days_in_month(year: i32, month: i32) -> u32 {
    match month.rem_euclid(12) {
        1 if is_leap_year(year) => 29,
        1 => 28,
        3 | 5 | 8 | 10 => 30,
        _ => 31,
    }
}

pub fn days_in_year(year: i32) -> u32 {
    if is_leap_year(year) {
        366
    } else {
        365
    }
}

/// Zero-based day of the year for zero-based `month` and one-based `day`.
pub fn year_day(year: i32, month: i32, day: i32) -> i32 {
    (0..month).map(|m| days_in_month(year, m) as i32).sum::<i32>() + day - 1
}

// ── Internal helpers ────────────────────────────────────────────────────────

pub(crate) fn parse_timezone(s: &str) -> Result<Tz> {
    s.parse::<Tz>()
        .map_err(|_| RecurrenceError::InvalidTimezone(format!("'{s}'")))
}

/// Resolve a wall-clock time in `tz` to an instant.
pub(crate) fn resolve_local(tz: &Tz, naive: NaiveDateTime) -> Result<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => {
            // Skipped wall time: apply the offset in force before the transition.
            let probe = naive
                .checked_sub_signed(TimeDelta::days(1))
                .ok_or_else(|| RecurrenceError::InvalidDatetime(format!("{naive} out of range")))?;
            let before = tz.offset_from_utc_datetime(&probe).fix().local_minus_utc();
            let utc = naive
                .checked_sub_signed(TimeDelta::seconds(i64::from(before)))
                .ok_or_else(|| RecurrenceError::InvalidDatetime(format!("{naive} out of range")))?;
            Ok(Utc.from_utc_datetime(&utc).with_timezone(tz))
        }
    }
}

pub(crate) fn instant_in(tz: &Tz, millis: i64) -> Result<DateTime<Tz>> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|utc| utc.with_timezone(tz))
        .ok_or_else(|| RecurrenceError::InvalidDatetime(format!("{millis} ms out of range")))
}

fn epoch_date() -> NaiveDate {
    DateTime::<Utc>::UNIX_EPOCH.date_naive()
}

fn add_i32(value: i32, amount: i64) -> Option<i32> {
    i32::try_from(i64::from(value).checked_add(amount)?).ok()
}

fn parse_digits(text: &str, start: usize, width: usize) -> Result<i32> {
    let bytes = text.as_bytes();
    let mut n = 0;
    for pos in start..start + width {
        match bytes.get(pos) {
            Some(b) if b.is_ascii_digit() => n = n * 10 + i32::from(b - b'0'),
            _ => {
                return Err(RecurrenceError::InvalidDatetime(format!(
                    "expected a digit at position {pos} in '{text}'"
                )));
            }
        }
    }
    Ok(n)
}

fn expect_byte(text: &str, pos: usize, expected: u8) -> Result<()> {
    if text.as_bytes().get(pos) == Some(&expected) {
        Ok(())
    } else {
        Err(RecurrenceError::InvalidDatetime(format!(
            "expected '{}' at position {pos} in '{text}'",
            expected as char
        )))
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
