//! Text summary builder for CLI output.
//!
//! Formats the snapshot table and the optional run outcome as
//! human-readable lines; the CLI layer decides where they go.

use crate::model::{ChainSnapshot, RunOutcome};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Build the text listing: run outcome first when present, then the table.
pub(crate) fn build_text_summary(
    items: &[ChainSnapshot],
    outcome: Option<&RunOutcome>,
) -> TextSummary {
    let mut lines = Vec::new();

    if let Some(run) = outcome {
        if run.skipped {
            lines.push(format!(
                "Run skipped: {} (server time {})",
                run.reason.as_deref().unwrap_or("no reason given"),
                run.now_et
            ));
        } else {
            lines.push(format!(
                "Run inserted {} capture(s) (server time {})",
                run.inserted.len(),
                run.now_et
            ));
            for cap in &run.inserted {
                lines.push(format!(
                    "  dte {} -> {} (actual {}d)  {}",
                    cap.target_dte,
                    cap.expiration,
                    cap.actual_dte_days,
                    cap.checksum_prefix()
                ));
            }
        }
        lines.push(String::new());
    }

    if items.is_empty() {
        lines.push("No snapshots yet.".to_string());
        return TextSummary { lines };
    }

    lines.push(format!(
        "{:>8}  {:<24}  {:<10}  {:>4}  {:<12}  {}",
        "ID", "Time (UTC)", "Underlying", "DTE", "Expiration", "Checksum"
    ));
    for s in items {
        lines.push(format!(
            "{:>8}  {:<24}  {:<10}  {:>4}  {:<12}  {}",
            s.snapshot_id,
            s.ts,
            s.underlying,
            s.target_dte,
            s.expiration,
            s.checksum_prefix()
        ));
    }

    TextSummary { lines }
}
