//! The RRULE examples of RFC 5545 section 3.8.5.3.
//!
//! Dates are compared as `YYYYMMDD`; the time of day always matches DTSTART
//! unless the rule sets BYHOUR/BYMINUTE or a sub-daily FREQ.

use recurrence_engine::{RecurrenceRule, Time};

const NEW_YORK: &str = "America/New_York";

fn start(zone: &str, text: &str) -> Time {
    let mut time = Time::new(zone).unwrap();
    time.parse(text).unwrap();
    time
}

/// The first `limit` occurrences formatted in `zone`.
fn expand(zone: &str, dtstart: &str, rule: &str, limit: usize) -> Vec<String> {
    let rule = RecurrenceRule::parse(rule).unwrap();
    let mut out = Time::new(zone).unwrap();
    rule.occurrences(&start(zone, dtstart))
        .unwrap()
        .take(limit)
        .map(|millis| {
            out.set(millis).unwrap();
            out.format_2445()
        })
        .collect()
}

fn dates(zone: &str, dtstart: &str, rule: &str, limit: usize) -> Vec<String> {
    expand(zone, dtstart, rule, limit)
        .into_iter()
        .map(|text| text[..8].to_string())
        .collect()
}

fn assert_dates(dtstart: &str, rule: &str, limit: usize, expected: &[&str]) {
    assert_eq!(dates(NEW_YORK, dtstart, rule, limit), expected, "RRULE:{rule}");
}

// ---------------------------------------------------------------------------
// Daily
// ---------------------------------------------------------------------------

#[test]
fn daily_for_ten_occurrences() {
    assert_dates(
        "19970902T090000",
        "FREQ=DAILY;COUNT=10",
        100,
        &[
            "19970902", "19970903", "19970904", "19970905", "19970906", "19970907", "19970908",
            "19970909", "19970910", "19970911",
        ],
    );
}

#[test]
fn daily_until_december_24() {
    let got = dates(NEW_YORK, "19970902T090000", "FREQ=DAILY;UNTIL=19971224T000000Z", 1000);
    assert_eq!(got.len(), 113);
    assert_eq!(got.first().map(String::as_str), Some("19970902"));
    assert_eq!(got.last().map(String::as_str), Some("19971223"));
}

#[test]
fn every_tenth_day() {
    assert_dates(
        "19970902T090000",
        "FREQ=DAILY;INTERVAL=10;COUNT=5",
        100,
        &["19970902", "19970912", "19970922", "19971002", "19971012"],
    );
}

#[test]
fn daily_keeps_wall_clock_across_dst_end() {
    let got = expand(NEW_YORK, "19971025T090000", "FREQ=DAILY;COUNT=3", 10);
    assert_eq!(got, ["19971025T090000", "19971026T090000", "19971027T090000"]);

    let rule = RecurrenceRule::parse("FREQ=DAILY;COUNT=2").unwrap();
    let instants: Vec<i64> = rule
        .occurrences(&start(NEW_YORK, "19971025T090000"))
        .unwrap()
        .collect();
    assert_eq!(instants[1] - instants[0], 25 * 3_600_000);
}

// ---------------------------------------------------------------------------
// Weekly
// ---------------------------------------------------------------------------

#[test]
fn weekly_for_ten_occurrences() {
    assert_dates(
        "19970902T090000",
        "FREQ=WEEKLY;COUNT=10",
        100,
        &[
            "19970902", "19970909", "19970916", "19970923", "19970930", "19971007", "19971014",
            "19971021", "19971028", "19971104",
        ],
    );
}

#[test]
fn every_other_week() {
    assert_dates(
        "19970902T090000",
        "FREQ=WEEKLY;INTERVAL=2;WKST=SU",
        11,
        &[
            "19970902", "19970916", "19970930", "19971014", "19971028", "19971111", "19971125",
            "19971209", "19971223", "19980106", "19980120",
        ],
    );
}

#[test]
fn weekly_tuesday_thursday_until() {
    assert_dates(
        "19970902T090000",
        "FREQ=WEEKLY;UNTIL=19971007T000000Z;WKST=SU;BYDAY=TU,TH",
        100,
        &[
            "19970902", "19970904", "19970909", "19970911", "19970916", "19970918", "19970923",
            "19970925", "19970930", "19971002",
        ],
    );
}

// ---------------------------------------------------------------------------
// Monthly
// ---------------------------------------------------------------------------

#[test]
fn monthly_first_friday() {
    assert_dates(
        "19970905T090000",
        "FREQ=MONTHLY;COUNT=10;BYDAY=1FR",
        100,
        &[
            "19970905", "19971003", "19971107", "19971205", "19980102", "19980206", "19980306",
            "19980403", "19980501", "19980605",
        ],
    );
}

#[test]
fn every_other_month_first_and_last_sunday() {
    assert_dates(
        "19970907T090000",
        "FREQ=MONTHLY;INTERVAL=2;COUNT=10;BYDAY=1SU,-1SU",
        100,
        &[
            "19970907", "19970928", "19971102", "19971130", "19980104", "19980125", "19980301",
            "19980329", "19980503", "19980531",
        ],
    );
}

#[test]
fn monthly_second_to_last_monday() {
    assert_dates(
        "19970922T090000",
        "FREQ=MONTHLY;COUNT=6;BYDAY=-2MO",
        100,
        &["19970922", "19971020", "19971117", "19971222", "19980119", "19980216"],
    );
}

#[test]
fn monthly_third_to_last_day() {
    assert_dates(
        "19970928T090000",
        "FREQ=MONTHLY;BYMONTHDAY=-3",
        6,
        &["19970928", "19971029", "19971128", "19971229", "19980129", "19980226"],
    );
}

#[test]
fn monthly_second_and_fifteenth() {
    assert_dates(
        "19970902T090000",
        "FREQ=MONTHLY;COUNT=10;BYMONTHDAY=2,15",
        100,
        &[
            "19970902", "19970915", "19971002", "19971015", "19971102", "19971115", "19971202",
            "19971215", "19980102", "19980115",
        ],
    );
}

#[test]
fn monthly_first_and_last_day() {
    assert_dates(
        "19970930T090000",
        "FREQ=MONTHLY;COUNT=10;BYMONTHDAY=1,-1",
        100,
        &[
            "19970930", "19971001", "19971031", "19971101", "19971130", "19971201", "19971231",
            "19980101", "19980131", "19980201",
        ],
    );
}

#[test]
fn every_eighteen_months_tenth_to_fifteenth() {
    assert_dates(
        "19970910T090000",
        "FREQ=MONTHLY;INTERVAL=18;COUNT=10;BYMONTHDAY=10,11,12,13,14,15",
        100,
        &[
            "19970910", "19970911", "19970912", "19970913", "19970914", "19970915", "19990310",
            "19990311", "19990312", "19990313",
        ],
    );
}

#[test]
fn monthly_invalid_day_is_skipped() {
    assert_dates(
        "20070115T090000",
        "FREQ=MONTHLY;BYMONTHDAY=15,30;COUNT=5",
        100,
        &["20070115", "20070130", "20070215", "20070315", "20070330"],
    );
}

#[test]
fn friday_the_thirteenth() {
    assert_dates(
        "19980213T090000",
        "FREQ=MONTHLY;BYDAY=FR;BYMONTHDAY=13",
        5,
        &["19980213", "19980313", "19981113", "19990813", "20001013"],
    );
}

#[test]
fn first_saturday_after_first_sunday() {
    assert_dates(
        "19970913T090000",
        "FREQ=MONTHLY;BYDAY=SA;BYMONTHDAY=7,8,9,10,11,12,13",
        10,
        &[
            "19970913", "19971011", "19971108", "19971213", "19980110", "19980207", "19980307",
            "19980411", "19980509", "19980613",
        ],
    );
}

#[test]
fn third_tuesday_wednesday_or_thursday() {
    assert_dates(
        "19970904T090000",
        "FREQ=MONTHLY;COUNT=3;BYDAY=TU,WE,TH;BYSETPOS=3",
        100,
        &["19970904", "19971007", "19971106"],
    );
}

#[test]
fn second_to_last_weekday() {
    assert_dates(
        "19970929T090000",
        "FREQ=MONTHLY;BYDAY=MO,TU,WE,TH,FR;BYSETPOS=-2",
        7,
        &[
            "19970929", "19971030", "19971127", "19971230", "19980129", "19980226", "19980330",
        ],
    );
}

#[test]
fn first_and_last_weekend_day_of_march() {
    assert_dates(
        "20000304T090000",
        "FREQ=MONTHLY;BYMONTH=3;BYDAY=SA,SU;BYSETPOS=1",
        4,
        &["20000304", "20010303", "20020302", "20030301"],
    );
    assert_dates(
        "20000326T090000",
        "FREQ=MONTHLY;BYMONTH=3;BYDAY=SA,SU;BYSETPOS=-1",
        4,
        &["20000326", "20010331", "20020331", "20030330"],
    );
}

// ---------------------------------------------------------------------------
// Yearly
// ---------------------------------------------------------------------------

#[test]
fn yearly_in_june_and_july() {
    assert_dates(
        "19970610T090000",
        "FREQ=YEARLY;COUNT=10;BYMONTH=6,7",
        100,
        &[
            "19970610", "19970710", "19980610", "19980710", "19990610", "19990710", "20000610",
            "20000710", "20010610", "20010710",
        ],
    );
}

#[test]
fn every_third_year_by_year_day() {
    assert_dates(
        "19970101T090000",
        "FREQ=YEARLY;INTERVAL=3;COUNT=10;BYYEARDAY=1,100,200",
        100,
        &[
            "19970101", "19970410", "19970719", "20000101", "20000409", "20000718", "20030101",
            "20030410", "20030719", "20060101",
        ],
    );
}

#[test]
fn twentieth_monday_of_year() {
    assert_dates(
        "19970519T090000",
        "FREQ=YEARLY;BYDAY=20MO",
        3,
        &["19970519", "19980518", "19990517"],
    );
}

#[test]
fn monday_of_week_twenty() {
    assert_dates(
        "19970512T090000",
        "FREQ=YEARLY;BYWEEKNO=20;BYDAY=MO",
        3,
        &["19970512", "19980511", "19990517"],
    );
}

#[test]
fn sunday_of_week_one() {
    assert_dates(
        "19990110T090000",
        "FREQ=YEARLY;BYWEEKNO=1;BYDAY=SU",
        4,
        &["19990110", "20000109", "20010107", "20020106"],
    );
}

#[test]
fn every_thursday_in_march() {
    assert_dates(
        "19970313T090000",
        "FREQ=YEARLY;BYMONTH=3;BYDAY=TH",
        11,
        &[
            "19970313", "19970320", "19970327", "19980305", "19980312", "19980319", "19980326",
            "19990304", "19990311", "19990318", "19990325",
        ],
    );
}

#[test]
fn us_presidential_election_day() {
    assert_dates(
        "19961105T090000",
        "FREQ=YEARLY;INTERVAL=4;BYMONTH=11;BYDAY=TU;BYMONTHDAY=2,3,4,5,6,7,8",
        3,
        &["19961105", "20001107", "20041102"],
    );
}

// ---------------------------------------------------------------------------
// Sub-daily
// ---------------------------------------------------------------------------

#[test]
fn every_three_hours_until() {
    let got = expand(
        "UTC",
        "19970902T090000Z",
        "FREQ=HOURLY;INTERVAL=3;UNTIL=19970902T170000Z",
        100,
    );
    assert_eq!(got, ["19970902T090000Z", "19970902T120000Z", "19970902T150000Z"]);
}

#[test]
fn every_fifteen_minutes() {
    let got = expand(NEW_YORK, "19970902T090000", "FREQ=MINUTELY;INTERVAL=15;COUNT=6", 100);
    assert_eq!(
        got,
        [
            "19970902T090000",
            "19970902T091500",
            "19970902T093000",
            "19970902T094500",
            "19970902T100000",
            "19970902T101500",
        ]
    );
}

#[test]
fn every_hour_and_a_half() {
    let got = expand(NEW_YORK, "19970902T090000", "FREQ=MINUTELY;INTERVAL=90;COUNT=4", 100);
    assert_eq!(
        got,
        [
            "19970902T090000",
            "19970902T103000",
            "19970902T120000",
            "19970902T133000",
        ]
    );
}
