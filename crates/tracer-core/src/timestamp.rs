//! Timestamp normalization.
//!
//! Upstream log datasets carry timestamps either as wall-clock text
//! (`"H:MM"`) or as a plain number. Both are reduced to a single integer
//! tick count before storage: text becomes `hours * 60 + minutes`, numbers
//! are taken as-is. The playback clock and the time label then treat that
//! count as seconds, so the stored value should be read as an opaque tick
//! count rather than a true wall-clock unit.

use serde::{Deserialize, Serialize};

use crate::error::TimestampError;

/// A timestamp as it appears in a raw log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Non-negative integer, already in ticks.
    Ticks(u64),
    /// Any other JSON number. Must still be a non-negative whole number.
    Number(f64),
    /// `"H:MM"`, `"H:MM:SS"` or integer text.
    Text(String),
}

impl RawTimestamp {
    /// Reduce to an integer tick count.
    pub fn normalize(&self) -> Result<u64, TimestampError> {
        match self {
            RawTimestamp::Ticks(ticks) => Ok(*ticks),
            RawTimestamp::Number(value) => normalize_number(*value),
            RawTimestamp::Text(text) => parse_clock_text(text),
        }
    }
}

impl From<u64> for RawTimestamp {
    fn from(ticks: u64) -> Self {
        RawTimestamp::Ticks(ticks)
    }
}

impl From<&str> for RawTimestamp {
    fn from(text: &str) -> Self {
        RawTimestamp::Text(text.to_string())
    }
}

fn normalize_number(value: f64) -> Result<u64, TimestampError> {
    if !value.is_finite() {
        return Err(TimestampError::NotFinite(value));
    }
    if value >= u64::MAX as f64 {
        return Err(TimestampError::TooLarge(value));
    }
    if value < 0.0 {
        return Err(TimestampError::Negative(value));
    }
    if value.fract() != 0.0 {
        return Err(TimestampError::Fractional(value));
    }
    Ok(value as u64)
}

/// Parse timestamp text into ticks.
///
/// `"1:30"` is 90 and `"08:05:59"` is 485 (a trailing seconds field is
/// validated and then dropped). Bare integer text such as `"42"` is taken
/// as ticks. Every field must be plain ASCII digits; signs are rejected.
pub fn parse_clock_text(text: &str) -> Result<u64, TimestampError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(TimestampError::Empty);
    }
    let invalid = || TimestampError::InvalidText(text.to_string());

    if !trimmed.contains(':') {
        return digits(trimmed).ok_or_else(invalid);
    }

    let fields: Vec<&str> = trimmed.split(':').collect();
    if !(2..=3).contains(&fields.len()) {
        return Err(invalid());
    }
    let number = |field: &str| digits(field).ok_or_else(invalid);

    let hours = number(fields[0])?;
    let minutes = number(fields[1])?;
    if minutes > 59 {
        return Err(TimestampError::OutOfRange {
            text: text.to_string(),
            field: "minutes",
            value: minutes,
        });
    }
    if let Some(seconds) = fields.get(2) {
        let seconds = number(seconds)?;
        if seconds > 59 {
            return Err(TimestampError::OutOfRange {
                text: text.to_string(),
                field: "seconds",
                value: seconds,
            });
        }
    }

    hours
        .checked_mul(60)
        .and_then(|h| h.checked_add(minutes))
        .ok_or_else(invalid)
}

fn digits(field: &str) -> Option<u64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// Render a tick count for the timeline indicator as `M:SS`.
pub fn format_time(ticks: u64) -> String {
    format!("{}:{:02}", ticks / 60, ticks % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_text_is_hours_times_sixty_plus_minutes() {
        assert_eq!(parse_clock_text("1:30"), Ok(90));
        assert_eq!(parse_clock_text("0:05"), Ok(5));
        assert_eq!(parse_clock_text("08:05"), Ok(485));
        assert_eq!(parse_clock_text(" 2:00 "), Ok(120));
    }

    #[test]
    fn trailing_seconds_are_dropped() {
        assert_eq!(parse_clock_text("08:05:59"), Ok(485));
        assert!(matches!(
            parse_clock_text("08:05:75"),
            Err(TimestampError::OutOfRange { field: "seconds", .. })
        ));
    }

    #[test]
    fn integer_text_is_ticks() {
        assert_eq!(parse_clock_text("42"), Ok(42));
    }

    #[test]
    fn rejects_garbage_text() {
        assert_eq!(parse_clock_text(""), Err(TimestampError::Empty));
        assert!(parse_clock_text("noon").is_err());
        assert!(parse_clock_text("1:2:3:4").is_err());
        assert!(parse_clock_text("-1:30").is_err());
        assert!(parse_clock_text("1:").is_err());
        assert!(parse_clock_text("1:+5").is_err());
        assert!(parse_clock_text("+1:05").is_err());
        assert!(parse_clock_text("+42").is_err());
        assert!(matches!(
            parse_clock_text("1:75"),
            Err(TimestampError::OutOfRange { field: "minutes", value: 75, .. })
        ));
    }

    #[test]
    fn numbers_must_be_whole_and_non_negative() {
        assert_eq!(RawTimestamp::Ticks(7).normalize(), Ok(7));
        assert_eq!(RawTimestamp::Number(12.0).normalize(), Ok(12));
        assert_eq!(
            RawTimestamp::Number(2.5).normalize(),
            Err(TimestampError::Fractional(2.5))
        );
        assert_eq!(
            RawTimestamp::Number(-3.0).normalize(),
            Err(TimestampError::Negative(-3.0))
        );
        assert!(matches!(
            RawTimestamp::Number(f64::NAN).normalize(),
            Err(TimestampError::NotFinite(_))
        ));
        assert_eq!(
            RawTimestamp::Number(f64::INFINITY).normalize(),
            Err(TimestampError::NotFinite(f64::INFINITY))
        );
        assert_eq!(
            RawTimestamp::Number(1e30).normalize(),
            Err(TimestampError::TooLarge(1e30))
        );
    }

    #[test]
    fn deserializes_both_upstream_forms() {
        let parsed: Vec<RawTimestamp> = serde_json::from_str(r#"[5, "1:30", 3.0, -2]"#).unwrap();
        assert_eq!(parsed[0], RawTimestamp::Ticks(5));
        assert_eq!(parsed[1], RawTimestamp::Text("1:30".into()));
        assert_eq!(parsed[2].normalize(), Ok(3));
        assert!(parsed[3].normalize().is_err());
    }

    #[test]
    fn time_label() {
        assert_eq!(format_time(0), "0:00");
        assert_eq!(format_time(9), "0:09");
        assert_eq!(format_time(90), "1:30");
        assert_eq!(format_time(3605), "60:05");
    }
}
