//! Cross-check expansion against the `rrule` crate.
//!
//! Only COUNT-bounded rules are compared, and DTSTART always matches the
//! rule, so both engines agree on what the first instant is.

use recurrence_engine::{RecurrenceRule, Time};
use rrule::RRuleSet;

fn ours(zone: &str, dtstart: &str, rule: &str) -> Vec<i64> {
    let mut start = Time::new(zone).unwrap();
    start.parse(dtstart).unwrap();
    RecurrenceRule::parse(rule)
        .unwrap()
        .occurrences(&start)
        .unwrap()
        .collect()
}

fn theirs(zone: &str, dtstart: &str, rule: &str) -> Vec<i64> {
    let header = if zone == "UTC" {
        format!("DTSTART:{dtstart}Z")
    } else {
        format!("DTSTART;TZID={zone}:{dtstart}")
    };
    let set: RRuleSet = format!("{header}\nRRULE:{rule}").parse().unwrap();
    set.all(1000)
        .dates
        .iter()
        .map(|date| date.timestamp_millis())
        .collect()
}

fn assert_parity(zone: &str, dtstart: &str, rule: &str) {
    let expected = theirs(zone, dtstart, rule);
    assert!(!expected.is_empty());
    assert_eq!(ours(zone, dtstart, rule), expected, "{dtstart} {rule}");
}

// ---------------------------------------------------------------------------
// Daily and weekly
// ---------------------------------------------------------------------------

#[test]
fn daily_across_dst_start() {
    assert_parity("America/New_York", "20070301T090000", "FREQ=DAILY;COUNT=30");
}

#[test]
fn weekly_three_days() {
    assert_parity(
        "America/New_York",
        "20240101T100000",
        "FREQ=WEEKLY;COUNT=20;BYDAY=MO,WE,FR",
    );
}

#[test]
fn biweekly_sunday_week_start() {
    assert_parity(
        "America/Los_Angeles",
        "19970902T090000",
        "FREQ=WEEKLY;INTERVAL=2;COUNT=12;WKST=SU;BYDAY=TU,TH",
    );
}

// ---------------------------------------------------------------------------
// Monthly and yearly
// ---------------------------------------------------------------------------

#[test]
fn monthly_thirty_first() {
    assert_parity("Europe/London", "20240131T080000", "FREQ=MONTHLY;COUNT=8;BYMONTHDAY=31");
}

#[test]
fn monthly_last_friday() {
    assert_parity("Europe/Berlin", "20240126T170000", "FREQ=MONTHLY;COUNT=14;BYDAY=-1FR");
}

#[test]
fn monthly_last_weekday() {
    assert_parity(
        "America/Chicago",
        "20240131T120000",
        "FREQ=MONTHLY;COUNT=12;BYDAY=MO,TU,WE,TH,FR;BYSETPOS=-1",
    );
}

#[test]
fn yearly_leap_day() {
    assert_parity("UTC", "20000229T120000", "FREQ=YEARLY;COUNT=5");
}

#[test]
fn yearly_week_number() {
    assert_parity(
        "America/New_York",
        "19970512T090000",
        "FREQ=YEARLY;COUNT=5;BYWEEKNO=20;BYDAY=MO",
    );
}

// ---------------------------------------------------------------------------
// Sub-daily
// ---------------------------------------------------------------------------

#[test]
fn every_five_hours() {
    assert_parity("UTC", "20240301T000000", "FREQ=HOURLY;INTERVAL=5;COUNT=40");
}
