use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use recurrence_engine::{populate, Duration, ExpandOptions, RecurrenceRule, RecurrenceSet, Time};

// A spread of rules calendar clients commonly store.
const RULES: &[&str] = &[
    "FREQ=DAILY;COUNT=100",
    "FREQ=DAILY;INTERVAL=2;UNTIL=20080101T000000Z",
    "FREQ=YEARLY;UNTIL=20090131T090000Z;BYMONTH=1;BYDAY=SU,MO,TU,WE,TH,FR,SA",
    "FREQ=WEEKLY;INTERVAL=2;WKST=SU",
    "FREQ=WEEKLY;COUNT=100;WKST=SU;BYDAY=MO,TU,WE,TH,FR",
    "FREQ=MONTHLY;COUNT=100;BYDAY=1FR",
    "FREQ=MONTHLY;INTERVAL=2;COUNT=100;BYDAY=1SU,-1SU",
    "FREQ=MONTHLY;BYMONTHDAY=1,15",
    "FREQ=MONTHLY;INTERVAL=3;COUNT=100;BYMONTHDAY=10,11,12,13,14",
    "FREQ=YEARLY;COUNT=100;BYMONTH=6,7,8",
    "FREQ=YEARLY;INTERVAL=2;BYMONTH=1,2,3,6,7,8",
    "FREQ=YEARLY;COUNT=100;BYYEARDAY=1,100,200",
    "FREQ=YEARLY;BYDAY=2MO",
    "FREQ=YEARLY;BYWEEKNO=2,3,4;BYDAY=MO",
    "FREQ=YEARLY;BYMONTH=3,4,5;BYDAY=TH",
    "FREQ=MONTHLY;BYDAY=FR;BYMONTHDAY=13",
    "FREQ=MONTHLY;BYDAY=SA;BYMONTHDAY=7,8,9,10,11,12,13",
    "FREQ=YEARLY;INTERVAL=2;BYMONTH=11;BYDAY=TU;BYMONTHDAY=2,3,4,5,6,7,8",
    "FREQ=WEEKLY;INTERVAL=2;COUNT=100;BYDAY=TU,SU;WKST=MO",
    "FREQ=WEEKLY;INTERVAL=2;COUNT=100;BYDAY=TU,SU;WKST=SU",
];

fn pacific(text: &str) -> Time {
    let mut time = Time::new("America/Los_Angeles").unwrap();
    time.parse(text).unwrap();
    time
}

fn bench_expand_rules(c: &mut Criterion) {
    let dtstart = pacific("20010101T000000");
    let options = ExpandOptions::with_range(
        dtstart.to_millis().unwrap(),
        pacific("20090101T000000").to_millis().unwrap(),
    );
    let sets: Vec<RecurrenceSet> = RULES
        .iter()
        .map(|rule| RecurrenceSet::new(Some(rule), None, None, None).unwrap())
        .collect();

    c.bench_function("expand_all_rules", |b| {
        b.iter(|| {
            for set in &sets {
                black_box(set.expand(black_box(&dtstart), &options).unwrap());
            }
        });
    });
}

fn bench_lazy_take(c: &mut Criterion) {
    let dtstart = pacific("20010101T000000");
    let mut group = c.benchmark_group("lazy_take");
    for take in [10usize, 100, 1000] {
        let rule = RecurrenceRule::parse("FREQ=DAILY;BYHOUR=9,17").unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(take), &take, |b, &take| {
            b.iter(|| {
                let n = rule.occurrences(&dtstart).unwrap().take(take).count();
                black_box(n)
            });
        });
    }
    group.finish();
}

fn bench_parsing(c: &mut Criterion) {
    c.bench_function("parse_rules", |b| {
        b.iter(|| {
            for rule in RULES {
                black_box(RecurrenceRule::parse(black_box(rule)).unwrap());
            }
        });
    });

    c.bench_function("parse_duration", |b| {
        b.iter(|| black_box(Duration::parse(black_box("-P1W15DT5H0M20S")).unwrap()));
    });

    let component = "DTSTART;TZID=America/New_York:20080221T070000\n\
                     DTEND;TZID=America/New_York:20080221T190000\n\
                     RRULE:FREQ=DAILY;UNTIL=20080222T000000Z\n\
                     EXDATE:20080222T120000Z";
    c.bench_function("populate_component", |b| {
        b.iter(|| black_box(populate(black_box(component)).unwrap()));
    });
}

criterion_group!(benches, bench_expand_rules, bench_lazy_take, bench_parsing);
criterion_main!(benches);
