//! Property lines of a calendar component.
//!
//! Format: `NAME *(";" PARAM "=" VALUE) ":" VALUE`. Names and parameter
//! names are case-insensitive and stored upper-cased. A parameter value may
//! be quoted, in which case it can contain `;`, `:` and `,`.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::{RecurrenceError, Result};
use crate::text::LineCursor;

/// Property names the recurrence assembler reads. Anything else is kept as
/// [`PropertyName::Other`] and ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyName {
    DtStart,
    DtEnd,
    Duration,
    RRule,
    ExRule,
    RDate,
    ExDate,
    Other(String),
}

impl PropertyName {
    /// Look up an upper-cased name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "DTSTART" => Self::DtStart,
            "DTEND" => Self::DtEnd,
            "DURATION" => Self::Duration,
            "RRULE" => Self::RRule,
            "EXRULE" => Self::ExRule,
            "RDATE" => Self::RDate,
            "EXDATE" => Self::ExDate,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::DtStart => "DTSTART",
            Self::DtEnd => "DTEND",
            Self::Duration => "DURATION",
            Self::RRule => "RRULE",
            Self::ExRule => "EXRULE",
            Self::RDate => "RDATE",
            Self::ExDate => "EXDATE",
            Self::Other(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

/// One unfolded content line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: PropertyName,
    pub params: Vec<Parameter>,
    pub value: String,
}

impl Property {
    /// Parse a single unfolded line.
    ///
    /// # Errors
    ///
    /// Returns [`RecurrenceError::InvalidProperty`] for an empty or invalid
    /// name, a parameter without `=`, an unclosed quote, or a missing `:`.
    pub fn parse(line: &str) -> Result<Self> {
        let mut chars = line.char_indices().peekable();
        let mut name_end = line.len();
        while let Some(&(i, c)) = chars.peek() {
            if c == ';' || c == ':' {
                name_end = i;
                break;
            }
            if !c.is_ascii_alphanumeric() && c != '-' {
                return Err(invalid(line, &format!("unexpected '{c}' in name")));
            }
            chars.next();
        }
        if name_end == 0 {
            return Err(invalid(line, "missing property name"));
        }
        let name = PropertyName::from_name(&line[..name_end].to_ascii_uppercase());

        let mut params = Vec::new();
        loop {
            match chars.next() {
                Some((i, ':')) => {
                    return Ok(Self {
                        name,
                        params,
                        value: line[i + 1..].to_string(),
                    });
                }
                Some((_, ';')) => params.push(parse_parameter(&mut chars, line)?),
                _ => return Err(invalid(line, "missing ':'")),
            }
        }
    }

    /// Value of the first parameter called `name` (upper-case).
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    pub fn tzid(&self) -> Option<&str> {
        self.param("TZID")
    }

    /// True for `VALUE=DATE`.
    pub fn is_date_value(&self) -> bool {
        self.param("VALUE")
            .is_some_and(|v| v.eq_ignore_ascii_case("DATE"))
    }
}

/// Parses one parameter after its leading `;`, stopping before the `;` or
/// `:` that follows it.
fn parse_parameter(chars: &mut Peekable<CharIndices<'_>>, line: &str) -> Result<Parameter> {
    let start = chars.peek().map_or(line.len(), |&(i, _)| i);
    let mut name_end = None;
    for (i, c) in chars.by_ref() {
        if c == '=' {
            name_end = Some(i);
            break;
        }
        if !c.is_ascii_alphanumeric() && c != '-' {
            return Err(invalid(line, &format!("unexpected '{c}' in parameter name")));
        }
    }
    let name_end = name_end.ok_or_else(|| invalid(line, "parameter without '='"))?;
    if name_end == start {
        return Err(invalid(line, "missing parameter name"));
    }
    let name = line[start..name_end].to_ascii_uppercase();

    let mut value = String::new();
    let mut quoted = false;
    while let Some(&(_, c)) = chars.peek() {
        if c == '"' {
            quoted = !quoted;
            chars.next();
            continue;
        }
        if !quoted && (c == ';' || c == ':') {
            break;
        }
        value.push(c);
        chars.next();
    }
    if quoted {
        return Err(invalid(line, "unclosed quote"));
    }
    Ok(Parameter { name, value })
}

fn invalid(line: &str, reason: &str) -> RecurrenceError {
    RecurrenceError::InvalidProperty(format!("{reason}: '{line}'"))
}

// ── Component ───────────────────────────────────────────────────────────────

/// The property lines of one component, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Component {
    pub properties: Vec<Property>,
}

impl Component {
    /// Parse newline-separated property lines.
    ///
    /// Folded lines are rejoined, CRLF is accepted and blank lines are
    /// skipped. `BEGIN`/`END` lines are kept as [`PropertyName::Other`].
    ///
    /// # Errors
    ///
    /// Returns [`RecurrenceError::InvalidProperty`] for the first line that
    /// fails [`Property::parse`].
    pub fn parse(text: &str) -> Result<Self> {
        let mut cursor = LineCursor::new(text);
        let mut properties = Vec::new();
        while let Some(line) = cursor.next_logical() {
            properties.push(Property::parse(&line)?);
        }
        Ok(Self { properties })
    }

    pub fn first(&self, name: &PropertyName) -> Option<&Property> {
        self.properties.iter().find(|p| &p.name == name)
    }

    pub fn all<'a>(&'a self, name: &'a PropertyName) -> impl Iterator<Item = &'a Property> + 'a {
        self.properties.iter().filter(move |p| &p.name == name)
    }
}
