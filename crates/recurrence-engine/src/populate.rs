//! Assemble the stored recurrence fields of a calendar component.
//!
//! [`populate`] reads DTSTART, DTEND, DURATION, RRULE, EXRULE, RDATE and
//! EXDATE lines and derives the record calendar storage keeps per event:
//! rule texts, date-list texts, the start instant, the event zone, a
//! duration and the all-day flag. The call is all-or-nothing: any bad line
//! fails the whole component.

use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::component::{Component, Property, PropertyName};
use crate::duration::Duration;
use crate::error::{RecurrenceError, Result};
use crate::rule::RecurrenceRule;
use crate::set::{parse_date_values, RecurrenceSet};
use crate::time::{Time, SECOND_IN_MILLIS, TIMEZONE_UTC};

/// Duration stored when a component has neither DURATION nor DTEND.
pub const ZERO_DURATION: &str = "+P0S";

const SECONDS_PER_DAY: i64 = 86_400;

/// The storage-facing record, serialized with the column names calendar
/// providers use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecurrence {
    pub rrule: Option<String>,
    pub rdate: Option<String>,
    pub exrule: Option<String>,
    pub exdate: Option<String>,
    /// Start instant in epoch milliseconds.
    pub dtstart: i64,
    pub event_timezone: String,
    pub duration: String,
    #[serde(serialize_with = "serialize_flag")]
    pub all_day: bool,
}

impl StoredRecurrence {
    /// Rebuild the recurrence set from the stored texts.
    ///
    /// Date groups without a zone are read in the event zone, matching how
    /// [`populate`] resolved them.
    pub fn to_set(&self) -> Result<RecurrenceSet> {
        RecurrenceSet::new_in_zone(
            self.rrule.as_deref(),
            self.rdate.as_deref(),
            self.exrule.as_deref(),
            self.exdate.as_deref(),
            &self.event_timezone,
        )
    }

    /// DTSTART as a [`Time`] in the event zone.
    pub fn start_time(&self) -> Result<Time> {
        let mut time = Time::new(&self.event_timezone)?;
        time.set(self.dtstart)?;
        time.all_day = self.all_day;
        Ok(time)
    }
}

fn serialize_flag<S: Serializer>(flag: &bool, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*flag))
}

/// Output of [`populate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulatedRecurrence {
    pub stored: StoredRecurrence,
    /// Parsed set, with zone-less RDATE/EXDATE values resolved in the
    /// DTSTART zone.
    pub set: RecurrenceSet,
}

/// Parse component text and assemble its recurrence.
///
/// # Errors
///
/// - [`RecurrenceError::InvalidProperty`] for a malformed line
/// - [`RecurrenceError::IncompleteComponent`] without DTSTART, or with
///   neither RRULE nor RDATE
/// - any error from parsing a date, zone, duration or rule
///
/// # Examples
///
/// ```
/// use recurrence_engine::populate;
///
/// let text = "DTSTART;TZID=America/New_York:20080221T070000\n\
///             DTEND;TZID=America/New_York:20080221T190000\n\
///             RRULE:FREQ=DAILY;UNTIL=20080222T000000Z";
/// let populated = populate(text).unwrap();
/// assert_eq!(populated.stored.duration, "P43200S");
/// assert_eq!(populated.stored.dtstart, 1_203_595_200_000);
/// ```
#[tracing::instrument(skip(text), fields(input_len = text.len()))]
pub fn populate(text: &str) -> Result<PopulatedRecurrence> {
    let component = Component::parse(text)?;
    populate_component(&component).inspect_err(|err| {
        warn!(error = %err, "recurrence component rejected");
    })
}

/// Assemble the recurrence of an already parsed component.
pub fn populate_component(component: &Component) -> Result<PopulatedRecurrence> {
    let start_prop = component
        .first(&PropertyName::DtStart)
        .ok_or_else(|| RecurrenceError::IncompleteComponent("missing DTSTART".to_string()))?;
    let mut start = read_time(start_prop, TIMEZONE_UTC)?;
    let all_day = start.all_day;
    if all_day {
        start.set_timezone(TIMEZONE_UTC)?;
    }
    let dtstart = start.to_millis()?;

    let (rrule, rrules) = collect_rules(component, &PropertyName::RRule)?;
    let (exrule, exrules) = collect_rules(component, &PropertyName::ExRule)?;
    let (rdate, rdates) = collect_dates(component, &PropertyName::RDate, start.timezone())?;
    let (exdate, exdates) = collect_dates(component, &PropertyName::ExDate, start.timezone())?;

    if rrules.is_empty() && rdates.is_empty() {
        return Err(RecurrenceError::IncompleteComponent(
            "no RRULE or RDATE".to_string(),
        ));
    }

    let duration = derive_duration(component, &start, dtstart)?;
    let ignored = component
        .properties
        .iter()
        .filter(|p| matches!(p.name, PropertyName::Other(_)))
        .count();
    debug!(
        ignored,
        rrules = rrules.len(),
        rdates = rdates.len(),
        %duration,
        all_day,
        "populated recurrence"
    );

    Ok(PopulatedRecurrence {
        stored: StoredRecurrence {
            rrule,
            rdate,
            exrule,
            exdate,
            dtstart,
            event_timezone: start.timezone().to_string(),
            duration,
            all_day,
        },
        set: RecurrenceSet {
            rrules,
            exrules,
            rdates: rdates.into_iter().collect(),
            exdates: exdates.into_iter().collect(),
        },
    })
}

/// A date property in its TZID, or `default_zone` without one.
fn read_time(prop: &Property, default_zone: &str) -> Result<Time> {
    let mut time = Time::new(prop.tzid().unwrap_or(default_zone))?;
    time.parse(&prop.value)?;
    Ok(time)
}

/// Validate every rule line and join the texts with `\n`.
fn collect_rules(
    component: &Component,
    name: &PropertyName,
) -> Result<(Option<String>, Vec<RecurrenceRule>)> {
    let mut texts = Vec::new();
    let mut rules = Vec::new();
    for prop in component.all(name) {
        rules.push(RecurrenceRule::parse(&prop.value)?);
        texts.push(prop.value.as_str());
    }
    Ok((join_lines(&texts), rules))
}

/// Resolve every value of the date lines; the stored text keeps each line's
/// TZID as a `TZID;` prefix.
fn collect_dates(
    component: &Component,
    name: &PropertyName,
    start_zone: &str,
) -> Result<(Option<String>, Vec<i64>)> {
    let mut texts = Vec::new();
    let mut dates = Vec::new();
    for prop in component.all(name) {
        dates.extend(parse_date_values(prop.tzid().unwrap_or(start_zone), &prop.value)?);
        texts.push(match prop.tzid() {
            Some(tzid) => format!("{tzid};{}", prop.value),
            None => prop.value.clone(),
        });
    }
    let texts: Vec<&str> = texts.iter().map(String::as_str).collect();
    Ok((join_lines(&texts), dates))
}

fn join_lines(texts: &[&str]) -> Option<String> {
    (!texts.is_empty()).then(|| texts.join("\n"))
}

/// DURATION verbatim, else DTEND minus DTSTART, else [`ZERO_DURATION`].
fn derive_duration(component: &Component, start: &Time, dtstart: i64) -> Result<String> {
    if let Some(prop) = component.first(&PropertyName::Duration) {
        Duration::parse(&prop.value)?;
        return Ok(prop.value.clone());
    }
    let Some(prop) = component.first(&PropertyName::DtEnd) else {
        return Ok(ZERO_DURATION.to_string());
    };

    let mut end = read_time(prop, start.timezone())?;
    if start.all_day && end.all_day {
        end.set_timezone(TIMEZONE_UTC)?;
    }
    let seconds = (end.to_millis()? - dtstart) / SECOND_IN_MILLIS;
    Ok(if start.all_day && seconds >= 0 && seconds % SECONDS_PER_DAY == 0 {
        format!("P{}D", seconds / SECONDS_PER_DAY)
    } else if seconds < 0 {
        format!("-P{}S", -seconds)
    } else {
        format!("P{seconds}S")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::set::ExpandOptions;

    #[test]
    fn test_missing_dtstart() {
        let err = populate("RRULE:FREQ=DAILY").unwrap_err();
        assert!(matches!(err, RecurrenceError::IncompleteComponent(_)));
    }

    #[test]
    fn test_no_rrule_or_rdate() {
        let err = populate("DTSTART:20080221T070000Z\nEXDATE:20080222T070000Z").unwrap_err();
        assert!(matches!(err, RecurrenceError::IncompleteComponent(_)));
    }

    #[test]
    fn test_zero_duration_default() {
        let populated = populate("DTSTART:20080221T070000Z\nRRULE:FREQ=DAILY").unwrap();
        assert_eq!(populated.stored.duration, ZERO_DURATION);
        assert_eq!(populated.stored.event_timezone, "UTC");
    }

    #[test]
    fn test_negative_duration() {
        let populated = populate(
            "DTSTART:20080221T070000Z\nDTEND:20080221T060000Z\nRRULE:FREQ=DAILY",
        )
        .unwrap();
        assert_eq!(populated.stored.duration, "-P3600S");
    }

    #[test]
    fn test_all_day_partial_day_in_seconds() {
        let populated = populate(
            "DTSTART;VALUE=DATE:20090821\nDTEND:20090821T120000Z\nRRULE:FREQ=YEARLY",
        )
        .unwrap();
        assert_eq!(populated.stored.duration, "P43200S");
    }

    #[test]
    fn test_floating_dtstart_is_utc() {
        let populated = populate("DTSTART:20080221T070000\nRRULE:FREQ=DAILY").unwrap();
        assert_eq!(populated.stored.event_timezone, "UTC");
        assert_eq!(populated.stored.dtstart, 1_203_577_200_000);
    }

    #[test]
    fn test_bad_duration_fails() {
        let err = populate("DTSTART:20080221T070000Z\nRRULE:FREQ=DAILY\nDURATION:1H").unwrap_err();
        assert!(matches!(err, RecurrenceError::InvalidDuration(_)));
    }

    #[test]
    fn test_zone_less_exdate_rebuilds_in_event_zone() {
        let populated = populate(
            "DTSTART;TZID=America/New_York:20080221T070000\n\
             RRULE:FREQ=DAILY;COUNT=3\n\
             EXDATE:20080222T070000",
        )
        .unwrap();
        assert_eq!(populated.stored.exdate.as_deref(), Some("20080222T070000"));
        assert_eq!(
            populated.set.exdates.iter().copied().collect::<Vec<_>>(),
            vec![1_203_681_600_000]
        );

        let rebuilt = populated.stored.to_set().unwrap();
        assert_eq!(rebuilt, populated.set);
        let start = populated.stored.start_time().unwrap();
        let starts = rebuilt.expand(&start, &ExpandOptions::default()).unwrap();
        assert_eq!(starts, vec![1_203_595_200_000, 1_203_768_000_000]);
    }

    #[test]
    fn test_stored_round_trip_to_set() {
        let populated = populate(
            "DTSTART;TZID=America/New_York:20080221T070000\n\
             RRULE:FREQ=DAILY;COUNT=3\n\
             EXDATE:20080222T120000Z",
        )
        .unwrap();
        assert_eq!(populated.stored.to_set().unwrap(), populated.set);
        let start = populated.stored.start_time().unwrap();
        assert_eq!(start.to_millis().unwrap(), 1_203_595_200_000);
        assert_eq!(start.hour, 7);
    }
}
