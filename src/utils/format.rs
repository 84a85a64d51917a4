use std::sync::Once;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

static DISCLAIMER: Once = Once::new();

/// Print the unofficial-API disclaimer once per process, on stderr so it
/// never pollutes JSON/CSV output.
pub fn print_disclaimer() {
    DISCLAIMER.call_once(|| {
        eprintln!(
            "Note: This tool uses unofficial vendor APIs and may break if endpoints change."
        );
    });
}

/// Normalize a vendor timestamp for display. ISO strings pass through,
/// unix-second integers (bare or stringified) are rendered as RFC3339.
/// Anything unrecognized is returned as-is rather than dropped.
pub fn format_timestamp(value: Option<&Value>) -> Option<String> {
    let value = value?;
    match value {
        Value::String(s) => {
            if s.contains('T') {
                Some(s.clone())
            } else if let Ok(secs) = s.parse::<i64>() {
                Some(unix_to_rfc3339(secs).unwrap_or_else(|| s.clone()))
            } else if s.is_empty() {
                None
            } else {
                Some(s.clone())
            }
        }
        Value::Number(n) => {
            let secs = n.as_i64()?;
            unix_to_rfc3339(secs)
        }
        _ => None,
    }
}

fn unix_to_rfc3339(secs: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn iso_strings_pass_through() {
        let value = json!("2025-09-25T12:00:00Z");
        assert_eq!(
            format_timestamp(Some(&value)).as_deref(),
            Some("2025-09-25T12:00:00Z")
        );
    }

    #[test]
    fn unix_seconds_become_rfc3339() {
        let value = json!(1758800000);
        assert_eq!(
            format_timestamp(Some(&value)).as_deref(),
            Some("2025-09-25T11:33:20Z")
        );
    }

    #[test]
    fn stringified_unix_seconds_become_rfc3339() {
        let value = json!("1758800000");
        assert_eq!(
            format_timestamp(Some(&value)).as_deref(),
            Some("2025-09-25T11:33:20Z")
        );
    }

    #[test]
    fn missing_and_unusable_values_are_none() {
        assert_eq!(format_timestamp(None), None);
        assert_eq!(format_timestamp(Some(&json!(null))), None);
        assert_eq!(format_timestamp(Some(&json!(""))), None);
    }
}
