use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single toll-gate crossing reported by the transit feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transit {
    pub id: String,
    pub plate: String,
    pub vehicle_type: String,
    /// `None` when the feed omitted the timestamp or sent one we could not read.
    pub occurred_at: Option<DateTime<Utc>>,
    pub gate_id: Option<String>,
    pub speed_kmh: Option<f64>,
    pub capture_ref: Option<String>,
}

impl Transit {
    pub fn new(
        id: impl Into<String>,
        plate: impl Into<String>,
        vehicle_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            plate: plate.into(),
            vehicle_type: vehicle_type.into(),
            occurred_at: None,
            gate_id: None,
            speed_kmh: None,
            capture_ref: None,
        }
    }

    pub fn occurred_at(mut self, at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(at);
        self
    }
}

/// Parses a feed timestamp. The feed emits RFC 1123 dates
/// (`Tue, 21 Oct 2025 23:00:00 GMT`); RFC 3339 and zone-less ISO 8601
/// (assumed UTC) are accepted too. Anything else yields `None`.
pub fn parse_occurred_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(at) = DateTime::parse_from_rfc2822(raw) {
        return Some(at.with_timezone(&Utc));
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_rfc1123_gmt() {
        let at = parse_occurred_at("Tue, 21 Oct 2025 23:00:00 GMT").unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2025, 10, 21, 23, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_rfc3339_with_offset() {
        let at = parse_occurred_at("2025-10-21T20:00:00-03:00").unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2025, 10, 21, 23, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_naive_assumes_utc() {
        let at = parse_occurred_at("2025-10-21T23:00:00.250").unwrap();
        assert_eq!(at.timestamp_millis() % 1000, 250);
    }

    #[test]
    fn test_unparsable_is_none() {
        assert!(parse_occurred_at("").is_none());
        assert!(parse_occurred_at("yesterday-ish").is_none());
    }
}
