//! Structured event candidates produced by AI extraction.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use super::time::local_midnight;
use super::time::parse_timestamp;

/// Raw extraction output as returned by the model.
///
/// `start` and `end` are ISO-8601 strings; see [`ExtractionResult::into_event`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub title: String,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub all_day: Option<bool>,
    #[serde(default)]
    pub label: Option<String>,
}

/// An extraction result with resolved timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedEvent {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub all_day: Option<bool>,
    pub label: Option<String>,
}

/// A timestamp in the extraction output could not be understood.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid {field} timestamp: {value:?}")]
pub struct TimestampError {
    pub field: &'static str,
    pub value: String,
}

impl ExtractionResult {
    /// Resolves the timestamps to absolute instants.
    ///
    /// All-day events are normalized to local midnight of their start and end
    /// day. Blank optional strings are dropped.
    pub fn into_event(self, tz: Tz) -> Result<ExtractedEvent, TimestampError> {
        let mut start = parse_timestamp(&self.start, tz).ok_or_else(|| TimestampError {
            field: "start",
            value: self.start.clone(),
        })?;
        let mut end = parse_timestamp(&self.end, tz).ok_or_else(|| TimestampError {
            field: "end",
            value: self.end.clone(),
        })?;

        if self.all_day == Some(true) {
            start = local_midnight(start, tz);
            end = local_midnight(end, tz);
        }

        Ok(ExtractedEvent {
            title: self.title,
            start,
            end,
            description: non_blank(self.description),
            location: non_blank(self.location),
            all_day: self.all_day,
            label: non_blank(self.label),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Berlin;
    use pretty_assertions::assert_eq;

    fn result(start: &str, end: &str, all_day: Option<bool>) -> ExtractionResult {
        ExtractionResult {
            title: "Elternabend".to_string(),
            start: start.to_string(),
            end: end.to_string(),
            description: None,
            location: Some("Aula".to_string()),
            all_day,
            label: None,
        }
    }

    #[test]
    fn deserializes_model_output_with_nulls() {
        let json = r#"{
            "title": "Elternabend",
            "start": "2025-01-14T18:00:00+01:00",
            "end": "2025-01-14T19:30:00+01:00",
            "location": "Aula",
            "description": null,
            "allDay": false,
            "label": null
        }"#;
        let parsed: ExtractionResult = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed,
            result(
                "2025-01-14T18:00:00+01:00",
                "2025-01-14T19:30:00+01:00",
                Some(false)
            )
        );
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let json = r#"{"title": "Elternabend", "start": "2025-01-14T18:00:00+01:00"}"#;
        assert!(serde_json::from_str::<ExtractionResult>(json).is_err());
    }

    #[test]
    fn into_event_resolves_timestamps() {
        let event = result(
            "2025-01-14T18:00:00+01:00",
            "2025-01-14T19:30:00+01:00",
            Some(false),
        )
        .into_event(Berlin)
        .unwrap();

        assert_eq!(event.start, Utc.with_ymd_and_hms(2025, 1, 14, 17, 0, 0).unwrap());
        assert_eq!(event.end, Utc.with_ymd_and_hms(2025, 1, 14, 18, 30, 0).unwrap());
        assert_eq!(event.location.as_deref(), Some("Aula"));
        assert_eq!(event.description, None);
    }

    #[test]
    fn all_day_events_snap_to_local_midnight() {
        let event = result(
            "2025-03-03T10:17:00+01:00",
            "2025-03-05T23:59:00+01:00",
            Some(true),
        )
        .into_event(Berlin)
        .unwrap();

        assert_eq!(event.start, Utc.with_ymd_and_hms(2025, 3, 2, 23, 0, 0).unwrap());
        assert_eq!(event.end, Utc.with_ymd_and_hms(2025, 3, 4, 23, 0, 0).unwrap());
    }

    #[test]
    fn invalid_timestamp_names_the_field() {
        let err = result("2025-01-14T18:00:00+01:00", "soon", None)
            .into_event(Berlin)
            .unwrap_err();
        assert_eq!(err.field, "end");
    }

    #[test]
    fn blank_optionals_are_dropped() {
        let mut raw = result("2025-01-14", "2025-01-14", None);
        raw.description = Some("  ".to_string());
        let event = raw.into_event(Berlin).unwrap();
        assert_eq!(event.description, None);
    }
}
