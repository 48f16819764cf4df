//! Per-endpoint state machine: start → poll → fetch-summary → write →
//! parse → render.

use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::PrismClient;
use crate::config::Config;
use crate::error::Error;
use crate::filter::FindingFilter;
use crate::fs::{Fs, DIR_MODE, FILE_MODE};
use crate::http::retry::sleep_cancellable;
use crate::parser;
use crate::progress::Progress;
use crate::report::{self, OutputFormat};
use crate::types::Finding;

/// Percent reported once the task has been started.
const INITIAL_PERCENT: u8 = 1;

/// Drive one endpoint through its full run.
///
/// Every suspending operation observes `cancel`; the caller derives it from
/// the per-endpoint deadline. The returned findings have already been
/// filtered.
///
/// # Errors
/// The first unrecoverable error of any phase.
pub async fn run_endpoint(
    config: &Config,
    fs: &dyn Fs,
    client: &PrismClient,
    host: &str,
    cancel: &CancellationToken,
    progress: &dyn Progress,
    filter: &FindingFilter,
) -> Result<Vec<Finding>, Error> {
    progress.set_phase("starting");
    info!(cluster = host, "starting NCC checks");
    let task_id = client.start_checks(cancel).await?;
    info!(cluster = host, task_id = %task_id, "ncc task started");
    progress.set_percent(INITIAL_PERCENT);

    progress.set_phase("polling");
    let mut last_percent = INITIAL_PERCENT;
    loop {
        sleep_cancellable(cancel, poll_delay(config), "poll wait").await?;

        let status = client.get_task(cancel, &task_id).await?;

        // The remote API has been observed to regress percent between
        // polls; clamp so the reported sequence is non-decreasing.
        let observed = status.percentage_complete.clamp(0, 100) as u8;
        let percent = observed.max(last_percent);
        progress.set_percent(percent);
        debug!(
            cluster = host,
            percent,
            progress = %status.progress_status,
            "task status"
        );
        last_percent = percent;

        if status.progress_status == "Failed" {
            return Err(Error::RemoteTaskFailed);
        }
        if percent >= 100 {
            break;
        }
    }

    progress.set_phase("fetching");
    let summary = client.get_run_summary(cancel, &task_id).await?;

    progress.set_phase("writing");
    let raw_path = raw_log_path(config, host);
    fs.ensure_dir(&config.output_dir_logs, DIR_MODE).await?;
    fs.write(&raw_path, parser::sanitize(&summary).as_bytes(), FILE_MODE)
        .await?;
    info!(cluster = host, path = %raw_path.display(), "summary written");

    progress.set_phase("parsing");
    let raw = fs.read_to_string(&raw_path).await?;
    let findings = match parser::parse_summary(&raw) {
        Ok(findings) => findings,
        Err(Error::NoFindings) => {
            // A clean cluster report has no detail blocks; not a failure.
            warn!(cluster = host, path = %raw_path.display(), "no finding blocks in summary");
            Vec::new()
        }
        Err(err) => return Err(err),
    };

    let filtered_path = filtered_log_path(config, host);
    fs.ensure_dir(&config.output_dir_filtered, DIR_MODE).await?;
    fs.write(
        &filtered_path,
        parser::render_filtered(&findings).as_bytes(),
        FILE_MODE,
    )
    .await?;
    info!(cluster = host, path = %filtered_path.display(), "filtered written");

    progress.set_phase("rendering");
    let findings = filter.apply(host, findings);
    render_outputs(config, fs, host, &findings).await?;

    progress.set_percent(100);
    progress.set_phase("done");
    Ok(findings)
}

/// Write the requested per-endpoint report files next to the filtered log.
pub(crate) async fn render_outputs(
    config: &Config,
    fs: &dyn Fs,
    host: &str,
    findings: &[Finding],
) -> Result<(), Error> {
    let generated_at = chrono::Utc::now();
    for format in &config.outputs {
        let path = report_path(config, host, *format);
        let rendered = match format {
            OutputFormat::Html => report::html::endpoint_report(findings, generated_at),
            OutputFormat::Csv => report::csv::render(findings),
            OutputFormat::Json => report::json::render(host, findings, generated_at)?,
        };
        fs.write(&path, rendered.as_bytes(), FILE_MODE).await?;
        info!(cluster = host, path = %path.display(), "report generated");
    }
    Ok(())
}

/// Poll delay: the configured interval plus uniform jitter.
fn poll_delay(config: &Config) -> Duration {
    let jitter_ms = config.poll_jitter.as_millis() as u64;
    let jitter = if jitter_ms == 0 {
        Duration::ZERO
    } else {
        Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
    };
    config.poll_interval + jitter
}

/// `{logs_dir}/{host}.log`
#[must_use]
pub fn raw_log_path(config: &Config, host: &str) -> PathBuf {
    config.output_dir_logs.join(format!("{host}.log"))
}

/// `{filtered_dir}/{host}.log`
#[must_use]
pub fn filtered_log_path(config: &Config, host: &str) -> PathBuf {
    config.output_dir_filtered.join(format!("{host}.log"))
}

/// `{filtered_dir}/{host}.log.{ext}`
#[must_use]
pub fn report_path(config: &Config, host: &str, format: OutputFormat) -> PathBuf {
    config
        .output_dir_filtered
        .join(format!("{host}.log.{}", format.extension()))
}
