//! Text helpers shared with the iCalendar import and export layers.
//!
//! Content lines are limited to 75 octets (RFC 5545 §3.1). A longer line is
//! folded by inserting a line break followed by a single space, and unfolded
//! by removing that pair again.

use chrono::{DateTime, Utc};

use crate::error::{RecurrenceError, Result};

/// Maximum line length in octets, not counting the line break.
pub const MAX_LINE_OCTETS: usize = 75;

// ── Escaping ────────────────────────────────────────────────────────────────

/// Escape a TEXT value: backslash, comma, semicolon and newline.
///
/// A carriage return is dropped; the `\n` escape stands for the whole line
/// break.
#[must_use]
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ',' => out.push_str("\\,"),
            ';' => out.push_str("\\;"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}

/// Reverse [`escape_text`].
///
/// `\N` is accepted as a newline. An unknown escape keeps the escaped
/// character, and a trailing lone backslash is kept as is.
#[must_use]
pub fn unescape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

// ── Folding ─────────────────────────────────────────────────────────────────

/// Fold `line` into 75-octet segments joined by `"\r\n "`.
///
/// The result carries no trailing line break. A UTF-8 sequence is never
/// split across segments.
#[must_use]
pub fn fold_line(line: &str) -> String {
    if line.len() <= MAX_LINE_OCTETS {
        return line.to_string();
    }

    let mut out = String::with_capacity(line.len() + (line.len() / MAX_LINE_OCTETS) * 3);
    let mut rest = line;
    let mut first = true;
    while !rest.is_empty() {
        // Continuation segments lose one octet to the leading space.
        let limit = if first {
            MAX_LINE_OCTETS
        } else {
            MAX_LINE_OCTETS - 1
        };
        let mut end = rest.len().min(limit);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        if !first {
            out.push_str("\r\n ");
        }
        out.push_str(&rest[..end]);
        rest = &rest[end..];
        first = false;
    }
    out
}

/// Explicit cursor over a pre-split array of physical lines.
///
/// [`LineCursor::next_logical`] joins a line with the continuation lines
/// that follow it.
#[derive(Debug, Clone)]
pub struct LineCursor<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> LineCursor<'a> {
    /// Split `text` on `\n`, dropping a trailing `\r` from each line.
    pub fn new(text: &'a str) -> Self {
        let lines = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .collect();
        Self { lines, pos: 0 }
    }

    /// Index of the next physical line.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn peek(&self) -> Option<&'a str> {
        self.lines.get(self.pos).copied()
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.lines.len()
    }

    /// The next logical line with continuations joined, or `None` at the end.
    ///
    /// Blank physical lines are skipped. A continuation line with nothing
    /// before it starts a logical line of its own.
    pub fn next_logical(&mut self) -> Option<String> {
        while self.peek().is_some_and(str::is_empty) {
            self.pos += 1;
        }
        let first = self.peek()?;
        self.pos += 1;

        let mut line = strip_fold(first).unwrap_or(first).to_string();
        while let Some(continuation) = self.peek().and_then(strip_fold) {
            line.push_str(continuation);
            self.pos += 1;
        }
        Some(line)
    }
}

/// Rejoin folded lines. Each logical line ends up on a line of its own,
/// separated by `\n`, with blank lines removed.
#[must_use]
pub fn unfold_lines(text: &str) -> String {
    let mut cursor = LineCursor::new(text);
    let mut out = Vec::new();
    while let Some(line) = cursor.next_logical() {
        out.push(line);
    }
    out.join("\n")
}

fn strip_fold(line: &str) -> Option<&str> {
    line.strip_prefix([' ', '\t'])
}

// ── Date-time text ──────────────────────────────────────────────────────────

/// Render an instant as `YYYYMMDDTHHMMSSZ`.
///
/// # Errors
///
/// Returns [`RecurrenceError::InvalidDatetime`] if `millis` is outside the
/// representable range.
pub fn format_utc_datetime(millis: i64) -> Result<String> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.format("%Y%m%dT%H%M%SZ").to_string())
        .ok_or_else(|| RecurrenceError::InvalidDatetime(format!("{millis} ms out of range")))
}
