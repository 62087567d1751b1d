use crate::api::{SnapshotApi, SnapshotRepository};
use anyhow::{Context, Result};
use clap::Parser;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "chain-snapshot-cli",
    version,
    about = "Console for an options chain-snapshot service with optional TUI"
)]
pub struct Cli {
    /// Base URL of the snapshot backend
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    pub base_url: String,

    /// Maximum number of snapshot rows to fetch
    #[arg(long, default_value_t = 50)]
    pub limit: u32,

    /// Print the snapshot list as JSON and exit (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Print the snapshot list as text and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Run silently: suppress all output except errors (for cron usage)
    #[arg(long)]
    pub silent: bool,

    /// Trigger an out-of-band capture before listing
    #[arg(long)]
    pub run_now: bool,

    /// Admin credential for run-now triggers (sent as X-API-Key)
    #[arg(long)]
    pub admin_key: Option<String>,

    /// Fetch the snapshot list as soon as the TUI launches
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub refresh_on_launch: bool,
}

pub async fn run(args: Cli) -> Result<()> {
    // Validate that --silent can only be used with --json
    if args.silent && !args.json {
        return Err(anyhow::anyhow!(
            "--silent can only be used with --json. Use --silent --json together."
        ));
    }

    if !args.json && !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_text(args).await;
        }
    }

    if args.json {
        return run_json(args).await;
    }

    run_text(args).await
}

/// Normalize the CLI credential the same way the TUI does: trimmed, with an
/// empty value meaning unauthenticated.
fn credential(args: &Cli) -> Option<String> {
    args.admin_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}

async fn run_json(args: Cli) -> Result<()> {
    let repo = SnapshotRepository::new(&args.base_url)?;
    let key = credential(&args);

    let outcome = if args.run_now {
        let run = repo
            .trigger_run(key.as_deref())
            .await
            .context("run-now trigger failed")?;
        Some(run)
    } else {
        None
    };

    let items = repo
        .list_snapshots(args.limit)
        .await
        .context("snapshot list failed")?;

    if !args.silent {
        let out = serde_json::json!({ "run": outcome, "items": items });
        println!("{}", serde_json::to_string_pretty(&out)?);
    }
    Ok(())
}

async fn run_text(args: Cli) -> Result<()> {
    let repo = SnapshotRepository::new(&args.base_url)?;
    let key = credential(&args);

    let outcome = if args.run_now {
        let run = repo
            .trigger_run(key.as_deref())
            .await
            .context("run-now trigger failed")?;
        Some(run)
    } else {
        None
    };

    let items = repo
        .list_snapshots(args.limit)
        .await
        .context("snapshot list failed")?;

    let summary = crate::text_summary::build_text_summary(&items, outcome.as_ref());
    for line in summary.lines {
        println!("{line}");
    }
    Ok(())
}
