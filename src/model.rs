use serde::{Deserialize, Serialize};

/// One captured option-chain record as served by the backend.
///
/// Rows arrive most-recent-first and are displayed in server order; the
/// client never re-sorts or filters them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub snapshot_id: i64,
    /// Capture timestamp (UTC), rendered verbatim.
    pub ts: String,
    pub underlying: String,
    /// Requested days-to-expiration horizon for this capture.
    pub target_dte: i32,
    pub expiration: String,
    /// Content hash of the captured payload.
    pub checksum: String,
}

impl ChainSnapshot {
    /// Leading characters of the checksum, enough to eyeball identity.
    pub fn checksum_prefix(&self) -> &str {
        checksum_prefix(&self.checksum)
    }
}

/// Wire wrapper around the snapshot listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotPage {
    pub items: Vec<ChainSnapshot>,
}

/// One capture performed by an on-demand run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertedCapture {
    pub target_dte: i32,
    pub expiration: String,
    /// Day count actually resolved for the horizon, which may differ from the target.
    pub actual_dte_days: i32,
    pub checksum: String,
}

impl InsertedCapture {
    pub fn checksum_prefix(&self) -> &str {
        checksum_prefix(&self.checksum)
    }
}

/// Outcome of one on-demand snapshot run.
///
/// `reason` is an opaque backend string (e.g. why a run was skipped) and is
/// displayed as-is, never interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub skipped: bool,
    #[serde(default)]
    pub reason: Option<String>,
    /// The backend's clock at evaluation time, for sanity-checking against market hours.
    pub now_et: String,
    #[serde(default)]
    pub inserted: Vec<InsertedCapture>,
}

fn checksum_prefix(checksum: &str) -> &str {
    checksum.get(..12).unwrap_or(checksum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_snapshot_listing() {
        let page: SnapshotPage = serde_json::from_str(
            r#"{
                "items": [
                    {
                        "snapshot_id": 42,
                        "ts": "2026-02-06T15:05:00Z",
                        "underlying": "SPX",
                        "target_dte": 5,
                        "expiration": "2026-02-11",
                        "checksum": "0a1b2c3d4e5f67890a1b2c3d4e5f6789"
                    }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(page.items.len(), 1);
        let s = &page.items[0];
        assert_eq!(s.snapshot_id, 42);
        assert_eq!(s.underlying, "SPX");
        assert_eq!(s.checksum_prefix(), "0a1b2c3d4e5f");
    }

    #[test]
    fn decodes_skipped_run() {
        let run: RunOutcome = serde_json::from_str(
            r#"{
                "skipped": true,
                "reason": "outside_rth",
                "now_et": "2026-02-06T18:30:00-05:00",
                "inserted": []
            }"#,
        )
        .unwrap();
        assert!(run.skipped);
        assert_eq!(run.reason.as_deref(), Some("outside_rth"));
        assert!(run.inserted.is_empty());
    }

    #[test]
    fn decodes_run_with_null_reason_and_captures() {
        let run: RunOutcome = serde_json::from_str(
            r#"{
                "skipped": false,
                "reason": null,
                "now_et": "2026-02-06T10:15:00-05:00",
                "inserted": [
                    {
                        "target_dte": 5,
                        "expiration": "2026-02-11",
                        "actual_dte_days": 5,
                        "checksum": "feedfacefeedfacefeedface"
                    }
                ]
            }"#,
        )
        .unwrap();
        assert!(!run.skipped);
        assert_eq!(run.reason, None);
        assert_eq!(run.inserted[0].actual_dte_days, 5);
    }

    #[test]
    fn short_checksum_prefix_is_whole_value() {
        assert_eq!(checksum_prefix("abc"), "abc");
    }
}
