//! crmdash-sync - Dashboard snapshot runner
//!
//! Fetches the CRM export webhook, aggregates it into a dashboard snapshot
//! and writes the snapshot as JSON. Runs once by default; `--watch` keeps
//! polling and rewrites the output after every successful refresh.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use crmdash_common::config::TomlConfig;
use crmdash_common::DateRangePreset;
use crmdash_sync::{SyncSession, SyncedSnapshot, WebhookClient};
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Command-line arguments for crmdash-sync
#[derive(Parser, Debug)]
#[command(name = "crmdash-sync")]
#[command(about = "Turns a CRM webhook export into dashboard metrics")]
#[command(version)]
struct Args {
    /// Config file (overrides CRMDASH_CONFIG)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Webhook URL serving the CRM export
    #[arg(short, long, env = "CRMDASH_WEBHOOK_URL")]
    url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "CRMDASH_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Reporting period (today, week, month, last-month, custom, all)
    #[arg(short, long)]
    preset: Option<DateRangePreset>,

    /// Window start (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Window end (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Write the snapshot here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Keep polling the webhook
    #[arg(short, long)]
    watch: bool,

    /// Poll interval in seconds (watch mode)
    #[arg(long)]
    interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // The configured level is not known yet, so config loading logs through
    // a scoped bootstrap subscriber
    let loaded = load_config(args.config.as_deref(), env_filter("info"), std::io::stderr);
    let level = match &loaded {
        Ok((config, _)) => config.logging.level.clone(),
        Err(_) => "info".to_string(),
    };

    // stdout carries the snapshot JSON
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(&level))
        .with_writer(std::io::stderr)
        .init();

    info!(
        "Starting crmdash-sync v{} [{}] built {}",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE")
    );

    let (mut config, _source) = loaded.context("Failed to load configuration")?;

    apply_overrides(&mut config, &args);
    config.validate().context("Invalid configuration")?;

    let url = config
        .webhook_url
        .clone()
        .ok_or_else(|| anyhow!("No webhook URL: pass --url, set CRMDASH_WEBHOOK_URL or add webhook_url to the config file"))?;

    let timeout = Duration::from_secs(config.request_timeout_secs);
    let client = WebhookClient::new(url, timeout).context("Failed to build HTTP client")?;
    info!(url = %client.url(), timeout_secs = config.request_timeout_secs, "Webhook client ready");

    let mut session = SyncSession::new(client, &config);

    if !args.watch {
        let today = chrono::Local::now().date_naive();
        let synced = session
            .refresh(today)
            .await
            .context("Failed to refresh dashboard snapshot")?;
        write_snapshot(synced, args.output.as_deref(), args.pretty).await?;
        return Ok(());
    }

    let interval = Duration::from_secs(config.poll_interval_secs);
    info!(interval_secs = config.poll_interval_secs, "Watching webhook");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let today = chrono::Local::now().date_naive();
                match session.refresh(today).await {
                    Ok(synced) => {
                        if let Err(e) = write_snapshot(synced, args.output.as_deref(), args.pretty).await {
                            error!("Failed to write snapshot: {:#}", e);
                        }
                    }
                    Err(e) => warn!("Refresh failed: {}", e),
                }
            }
            _ = signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    Ok(())
}

/// `RUST_LOG` if set, else `level`.
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

fn load_config<W>(
    path: Option<&Path>,
    filter: EnvFilter,
    writer: W,
) -> crmdash_common::Result<(TomlConfig, Option<PathBuf>)>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .finish();
    tracing::subscriber::with_default(bootstrap, || TomlConfig::load_or_default(path))
}

/// Command-line values take priority over the config file.
fn apply_overrides(config: &mut TomlConfig, args: &Args) {
    if let Some(url) = &args.url {
        config.webhook_url = Some(url.clone());
    }
    if let Some(secs) = args.timeout_secs {
        config.request_timeout_secs = secs;
    }
    if let Some(secs) = args.interval_secs {
        config.poll_interval_secs = secs;
    }
    if let Some(preset) = args.preset {
        config.window.preset = preset;
    }
    if args.start.is_some() || args.end.is_some() {
        config.window.start = args.start;
        config.window.end = args.end;
    }
}

async fn write_snapshot(synced: &SyncedSnapshot, output: Option<&Path>, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(synced)?
    } else {
        serde_json::to_string(synced)?
    };

    match output {
        Some(path) => {
            tokio::fs::write(path, json.as_bytes())
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), bytes = json.len(), "Snapshot written");
        }
        None => println!("{}", json),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLog {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[test]
    fn test_missing_config_warning_is_logged() {
        let log = CapturedLog::default();
        let writer = log.clone();
        let missing = std::env::temp_dir().join("crmdash-sync-absent-config.toml");

        let (config, source) =
            load_config(Some(missing.as_path()), EnvFilter::new("warn"), move || writer.clone()).unwrap();

        assert!(source.is_none());
        assert_eq!(config.poll_interval_secs, 300);
        assert!(log.text().contains("Config file not found, using defaults"));
    }

    #[test]
    fn test_banner_build_info_is_present() {
        assert!(!env!("GIT_HASH").is_empty());
        assert!(!env!("BUILD_PROFILE").is_empty());
    }

    #[test]
    fn test_apply_overrides_prefers_cli_values() {
        let args = Args::parse_from([
            "crmdash-sync",
            "--url",
            "https://hooks.example.com/x",
            "--preset",
            "last-month",
            "--start",
            "2024-02-01",
        ]);
        let mut config = TomlConfig::default();
        apply_overrides(&mut config, &args);

        assert_eq!(config.webhook_url.as_deref(), Some("https://hooks.example.com/x"));
        assert_eq!(config.window.preset, DateRangePreset::LastMonth);
        assert_eq!(config.window.start, NaiveDate::from_ymd_opt(2024, 2, 1));
        assert_eq!(config.window.end, None);
    }
}
