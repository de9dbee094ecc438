//! # recurrence-engine
//!
//! Calendar recurrence for event storage.
//!
//! The engine parses RFC 2445 recurrence rules and durations, assembles the
//! stored recurrence fields of a calendar component, and lazily expands a
//! recurrence set into occurrence start instants. Wall-clock arithmetic
//! happens in IANA time zones so that DST changes, leap years and short
//! months land where calendar users expect.
//!
//! ## Modules
//!
//! - [`time`]: zone-aware wall-clock fields, normalization and Julian days
//! - [`duration`]: `P15DT5H0M20S`-style durations
//! - [`rule`]: RRULE/EXRULE parsing and canonical text
//! - [`expand`]: lazy expansion of one rule
//! - [`set`]: RRULE + RDATE - EXRULE - EXDATE, merged and deduplicated
//! - [`component`]: property lines of a calendar component
//! - [`populate`]: stored recurrence fields from component text
//! - [`text`]: escaping, line folding and UTC date-time text
//! - [`error`]: error types

pub mod component;
pub mod duration;
pub mod error;
pub mod expand;
pub mod populate;
pub mod rule;
pub mod set;
pub mod text;
pub mod time;

pub use component::{Component, Parameter, Property, PropertyName};
pub use duration::Duration;
pub use error::{ErrorKind, RecurrenceError};
pub use expand::{RuleOccurrences, MAX_YEAR};
pub use populate::{populate, populate_component, PopulatedRecurrence, StoredRecurrence};
pub use rule::{Frequency, RecurrenceRule, RulePart, WeekdayNum};
pub use set::{
    parse_multiline_recurrence_dates, parse_multiline_recurrence_dates_in,
    parse_recurrence_dates, parse_recurrence_dates_in, ExpandOptions, LastOccurrence,
    RecurrenceSet, SetOccurrences,
};
pub use text::{escape_text, fold_line, format_utc_datetime, unescape_text, unfold_lines};
pub use time::{julian_day, Time, TimeField};
