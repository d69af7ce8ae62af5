use serde::{Deserialize, Serialize};

/// A shortened link as held by the store and written to the snapshot file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRecord {
    pub long_url: String,
    pub clicks: u64,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_at: i64,
}

impl LinkRecord {
    pub fn new(long_url: impl Into<String>, created_at: i64) -> Self {
        Self {
            long_url: long_url.into(),
            clicks: 0,
            created_at,
        }
    }
}

/// Read-only view of one link, returned by the stats endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkStats {
    pub short_code: String,
    pub long_url: String,
    pub clicks: u64,
    pub created_at: i64,
}

/// Full on-disk state of the store.
///
/// Both maps are stored as lists of pairs. Entries are sorted by key when
/// taken from a live store so repeated flushes of the same state produce the
/// same file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub long_to_short: Vec<(String, String)>,
    #[serde(default)]
    pub short_to_record: Vec<(String, LinkRecord)>,
    #[serde(default)]
    pub counter: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_uses_the_documented_layout() {
        let snapshot = Snapshot {
            long_to_short: vec![("http://example.com".into(), "a".into())],
            short_to_record: vec![(
                "a".into(),
                LinkRecord {
                    long_url: "http://example.com".into(),
                    clicks: 3,
                    created_at: 1_700_000_000_000,
                },
            )],
            counter: 1,
        };

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "longToShort": [["http://example.com", "a"]],
                "shortToRecord": [["a", {
                    "longUrl": "http://example.com",
                    "clicks": 3,
                    "createdAt": 1_700_000_000_000_i64
                }]],
                "counter": 1
            })
        );
    }

    #[test]
    fn empty_object_parses_as_empty_snapshot() {
        let snapshot: Snapshot = serde_json::from_str("{}").unwrap();
        assert_eq!(snapshot, Snapshot::default());
    }
}
