use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One article as listed in a day's index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: i64,
    pub url: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Parse a saved or freshly fetched daily index document.
///
/// The endpoint returns a JSON array of entries; re-parsing a file written by
/// an earlier cycle goes through the same function, so retries see identical
/// data.
pub fn parse_index(raw: &str) -> Result<Vec<IndexEntry>> {
    Ok(serde_json::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_index_entries() {
        let raw = r#"[
            {"id": 101, "url": "https://www.crhoy.com/a/101", "published_at": "2024-06-01T16:15:00Z", "categories": ["nacionales", "deportes/futbol"]},
            {"id": 102, "url": "https://www.crhoy.com/a/102", "published_at": "2024-06-01T17:00:00Z"}
        ]"#;
        let entries = parse_index(raw).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, 101);
        assert_eq!(
            entries[0].published_at,
            Utc.with_ymd_and_hms(2024, 6, 1, 16, 15, 0).unwrap()
        );
        assert_eq!(entries[0].categories, vec!["nacionales", "deportes/futbol"]);
        assert!(entries[1].categories.is_empty());
    }

    #[test]
    fn malformed_index_is_a_parse_error() {
        let err = parse_index("{\"not\": \"a list\"}").unwrap_err();
        assert!(matches!(err, crate::error::CrhoyError::Parse(_)));
    }

    #[test]
    fn offset_timestamps_normalize_to_utc() {
        let raw = r#"[{"id": 1, "url": "u", "published_at": "2024-06-01T10:15:00-06:00", "categories": []}]"#;
        let entries = parse_index(raw).unwrap();
        assert_eq!(
            entries[0].published_at,
            Utc.with_ymd_and_hms(2024, 6, 1, 16, 15, 0).unwrap()
        );
    }
}
