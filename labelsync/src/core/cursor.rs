//! Resume cursor rules.
//!
//! A cursor marks the last fully processed move log entry as
//! `<timestamp>|<log id>`, e.g. `2024-05-01T12:00:00Z|4711`. Timestamps are
//! ISO-8601 UTC with second precision, so several moves can share one; the log
//! id breaks the tie. A bare timestamp (written by `cursor --set`) covers its
//! whole second.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed cursor {0:?}: expected <timestamp> or <timestamp>|<log id>")]
pub struct CursorError(pub String);

/// Position of a move log entry. Orders by timestamp, then log id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub timestamp: String,
    pub log_id: u64,
}

impl Position {
    pub fn new(timestamp: impl Into<String>, log_id: u64) -> Self {
        Self {
            timestamp: timestamp.into(),
            log_id,
        }
    }

    /// Position after every entry stamped `timestamp`.
    pub fn end_of_second(timestamp: impl Into<String>) -> Self {
        Self::new(timestamp, u64::MAX)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.log_id == u64::MAX {
            f.write_str(&self.timestamp)
        } else {
            write!(f, "{}|{}", self.timestamp, self.log_id)
        }
    }
}

impl FromStr for Position {
    type Err = CursorError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let malformed = || CursorError(raw.to_string());
        let raw = raw.trim();
        match raw.split_once('|') {
            Some((timestamp, log_id)) if !timestamp.is_empty() => {
                let log_id = log_id.parse().map_err(|_| malformed())?;
                Ok(Self::new(timestamp, log_id))
            }
            Some(_) => Err(malformed()),
            None if raw.is_empty() => Err(malformed()),
            None => Ok(Self::end_of_second(raw)),
        }
    }
}

/// Canonical timestamp form of an RFC 3339 timestamp (UTC, second precision).
pub fn normalize(timestamp: &str) -> Result<String, chrono::ParseError> {
    let parsed = DateTime::parse_from_rfc3339(timestamp.trim())?;
    Ok(parsed
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// The cursor to persist after processing the entry at `candidate`.
///
/// Returns `None` when persisting would move the cursor backwards or leave it
/// where it is.
pub fn advance(current: Option<&Position>, candidate: &Position) -> Option<Position> {
    match current {
        Some(current) if candidate <= current => None,
        _ => Some(candidate.clone()),
    }
}

/// Whether the entry at `position` lies strictly after `cursor`.
pub fn is_after(cursor: Option<&Position>, position: &Position) -> bool {
    cursor.is_none_or(|cursor| position > cursor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(timestamp: &str, log_id: u64) -> Position {
        Position::new(timestamp, log_id)
    }

    #[test]
    fn first_event_always_advances() {
        let first = at("2024-05-01T12:00:00Z", 7);
        assert_eq!(advance(None, &first), Some(first));
    }

    #[test]
    fn cursor_never_moves_backwards() {
        let current = at("2024-05-01T12:00:00Z", 10);
        assert_eq!(advance(Some(&current), &at("2024-04-30T23:59:59Z", 99)), None);
        assert_eq!(advance(Some(&current), &at("2024-05-01T12:00:00Z", 9)), None);
        assert_eq!(advance(Some(&current), &current), None);
        assert_eq!(
            advance(Some(&current), &at("2024-05-01T12:00:00Z", 11)),
            Some(at("2024-05-01T12:00:00Z", 11))
        );
    }

    #[test]
    fn resume_is_exclusive_within_a_second() {
        let cursor = at("2024-05-01T12:00:00Z", 10);
        assert!(!is_after(Some(&cursor), &at("2024-05-01T12:00:00Z", 10)));
        assert!(is_after(Some(&cursor), &at("2024-05-01T12:00:00Z", 11)));
        assert!(is_after(Some(&cursor), &at("2024-05-01T12:00:01Z", 1)));
        assert!(is_after(None, &at("2001-01-01T00:00:00Z", 1)));
    }

    #[test]
    fn bare_timestamp_covers_its_second() {
        let cursor: Position = "2024-05-01T12:00:00Z".parse().expect("parse");
        assert!(!is_after(Some(&cursor), &at("2024-05-01T12:00:00Z", 123_456)));
        assert!(is_after(Some(&cursor), &at("2024-05-01T12:00:01Z", 1)));
        assert_eq!(cursor.to_string(), "2024-05-01T12:00:00Z");
    }

    #[test]
    fn cursor_text_round_trips() {
        let cursor: Position = "2024-05-01T12:00:00Z|4711\n".parse().expect("parse");
        assert_eq!(cursor, at("2024-05-01T12:00:00Z", 4711));
        assert_eq!(cursor.to_string(), "2024-05-01T12:00:00Z|4711");
        assert!("2024-05-01T12:00:00Z|x".parse::<Position>().is_err());
        assert!("|4711".parse::<Position>().is_err());
        assert!("".parse::<Position>().is_err());
    }

    #[test]
    fn normalize_converts_to_utc_seconds() {
        assert_eq!(
            normalize("2024-05-01T14:00:00.250+02:00").expect("parse"),
            "2024-05-01T12:00:00Z"
        );
        assert_eq!(
            normalize("2024-05-01T12:00:00Z").expect("parse"),
            "2024-05-01T12:00:00Z"
        );
        assert!(normalize("yesterday").is_err());
    }
}
