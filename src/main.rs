//! NCC orchestrator CLI entry point.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ncc_orchestrator::aggregate::Aggregate;
use ncc_orchestrator::client::PrismClient;
use ncc_orchestrator::config::{split_csv, Cli, Config};
use ncc_orchestrator::filter::FindingFilter;
use ncc_orchestrator::fs::{Fs, OsFs, DIR_MODE, FILE_MODE};
use ncc_orchestrator::http::ReqwestTransport;
use ncc_orchestrator::notify::{
    self, EmailConfig, EmailNotifier, Notifier, NotifyReport, WebhookConfig, WebhookNotifier,
};
use ncc_orchestrator::progress::LogProgressFactory;
use ncc_orchestrator::report::html::{aggregate_report, EndpointLinks};
use ncc_orchestrator::{metrics, replay, scheduler};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_cli(&cli).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    // Keep the guard alive so buffered log lines flush on exit.
    let _log_guard = init_tracing(&config)?;

    info!(
        clusters = ?config.clusters,
        username = %config.username,
        insecure_skip_verify = config.insecure_skip_verify,
        timeout = ?config.timeout,
        request_timeout = ?config.request_timeout,
        poll_interval = ?config.poll_interval,
        poll_jitter = ?config.poll_jitter,
        max_parallel = config.max_parallel,
        outputs = ?config.outputs,
        logs_dir = %config.output_dir_logs.display(),
        filtered_dir = %config.output_dir_filtered.display(),
        retry_max_attempts = config.retry.max_attempts,
        retry_base_delay = ?config.retry.base_delay,
        retry_max_delay = ?config.retry.max_delay,
        replay = config.replay,
        "starting NCC orchestrator"
    );

    let fs = Arc::new(OsFs);
    fs.ensure_dir(&config.output_dir_logs, DIR_MODE)
        .await
        .context("failed to create logs directory")?;
    fs.ensure_dir(&config.output_dir_filtered, DIR_MODE)
        .await
        .context("failed to create output directory")?;

    let filter = Arc::new(FindingFilter::from_options(
        config.filter_severity.as_deref(),
        config.filter_check.as_deref(),
        config.filter_cluster.as_deref(),
    ));

    if config.replay {
        let aggregate = replay::run(&config, fs.as_ref(), &filter)
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        write_aggregate_outputs(&cli, &config, fs.as_ref(), &aggregate).await?;
        println!(
            "Replay complete: {} findings aggregated",
            aggregate.rows.len()
        );
        return Ok(());
    }

    let transport = Arc::new(
        ReqwestTransport::new(config.insecure_skip_verify)
            .map_err(|e| anyhow::anyhow!(e.to_string()))?,
    );

    if config.skip_health_check {
        warn!("skipping cluster health checks");
    } else {
        run_health_checks(&config, transport.clone()).await?;
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling active workers");
                cancel.cancel();
            }
        });
    }

    let outcome = scheduler::run_all(
        Arc::new(config.clone()),
        transport,
        fs.clone(),
        filter,
        Arc::new(LogProgressFactory),
        cancel,
    )
    .await;

    let aggregate = Aggregate::from_results(&outcome.results);
    write_aggregate_outputs(&cli, &config, fs.as_ref(), &aggregate).await?;

    if !aggregate.failed.is_empty() {
        error!(failed_clusters = ?aggregate.failed, "some clusters failed");
        bail!("some clusters failed: {}", aggregate.failed.join(", "));
    }

    info!("all clusters processed successfully");
    println!("All clusters processed successfully");
    Ok(())
}

/// Probe every endpoint before scheduling any work.
async fn run_health_checks(config: &Config, transport: Arc<ReqwestTransport>) -> Result<()> {
    println!(
        "Performing health checks on {} clusters...",
        config.clusters.len()
    );

    let mut failed = Vec::new();
    for endpoint in config.endpoints() {
        print!("Checking cluster {}... ", endpoint.host);
        let client = PrismClient::new(
            &endpoint.host,
            endpoint.username,
            endpoint.password,
            transport.clone(),
            config.retry,
            config.request_timeout,
        );
        match client.health_check(config.health_check_timeout).await {
            Ok(()) => {
                println!("OK");
                info!(cluster = %endpoint.host, "health check passed");
            }
            Err(err) => {
                println!("FAILED: {err}");
                error!(cluster = %endpoint.host, error = %err, "health check failed");
                failed.push(endpoint.host);
            }
        }
    }

    if !failed.is_empty() {
        bail!("health checks failed for clusters: {}", failed.join(", "));
    }
    println!("All clusters passed health checks");
    Ok(())
}

/// Write the aggregated page, then metrics and notifications if enabled.
async fn write_aggregate_outputs(
    cli: &Cli,
    config: &Config,
    fs: &dyn Fs,
    aggregate: &Aggregate,
) -> Result<()> {
    let links: Vec<EndpointLinks> = aggregate
        .succeeded
        .iter()
        .map(|host| EndpointLinks {
            host: host.clone(),
            files: config
                .outputs
                .iter()
                .map(|format| format!("{host}.log.{}", format.extension()))
                .collect(),
        })
        .collect();

    let index_path = config.output_dir_filtered.join("index.html");
    fs.write(
        &index_path,
        aggregate_report(aggregate, &links).as_bytes(),
        FILE_MODE,
    )
    .await
    .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    info!(path = %index_path.display(), rows = aggregate.rows.len(), "aggregated page generated");

    if cli.metrics_enabled {
        let rendered = metrics::render(
            &aggregate.rows,
            &aggregate.failed,
            aggregate.generated_at.timestamp(),
        );
        match fs.write(&cli.metrics_file, rendered.as_bytes(), FILE_MODE).await {
            Ok(()) => info!(path = %cli.metrics_file.display(), "Prometheus metrics written"),
            Err(err) => error!(error = %err, "failed to write Prometheus metrics"),
        }
    }

    let notifiers = build_notifiers(cli);
    if !notifiers.is_empty() {
        notify::dispatch(&notifiers, &NotifyReport::new(aggregate)).await;
    }
    Ok(())
}

/// Assemble the enabled notification channels. Misconfigured channels are
/// logged and dropped; they never fail the run.
fn build_notifiers(cli: &Cli) -> Vec<Box<dyn Notifier>> {
    let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();

    if cli.webhook_enabled {
        let headers = cli
            .webhook_headers
            .as_deref()
            .map(|raw| match notify::webhook::parse_headers(raw) {
                Ok(headers) => headers,
                Err(err) => {
                    warn!(error = %err, "failed to parse webhook headers, ignoring");
                    HashMap::new()
                }
            })
            .unwrap_or_default();

        match WebhookNotifier::new(WebhookConfig {
            url: cli.webhook_url.clone().unwrap_or_default(),
            method: cli.webhook_method.clone(),
            headers,
            timeout: cli.webhook_timeout,
        }) {
            Ok(notifier) => notifiers.push(Box::new(notifier)),
            Err(err) => error!(error = %err, "webhook notifier disabled"),
        }
    }

    if cli.email_enabled {
        match EmailNotifier::new(EmailConfig {
            smtp_host: cli.email_smtp_host.clone().unwrap_or_default(),
            smtp_port: cli.email_smtp_port,
            username: cli.email_username.clone(),
            password: cli.email_password.clone(),
            from: cli.email_from.clone().unwrap_or_default(),
            to: split_csv(cli.email_to.as_deref().unwrap_or_default()),
            subject: cli.email_subject.clone(),
            use_tls: cli.email_tls,
        }) {
            Ok(notifier) => notifiers.push(Box::new(notifier)),
            Err(err) => error!(error = %err, "email notifier disabled"),
        }
    }

    notifiers
}

/// Initialize the process-wide tracing sink: a daily-rolling file with a
/// non-blocking writer.
fn init_tracing(config: &Config) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let dir = config
        .log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).context("failed to create log directory")?;

    let file_name = config.log_file.file_name().map_or_else(
        || "ncc-runner.log".to_string(),
        |name| name.to_string_lossy().into_owned(),
    );

    let appender = tracing_appender::rolling::daily(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(parse_level(&config.log_level)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .with(filter)
        .init();
    Ok(guard)
}

/// Map the `--log-level` value (names or 0..5) onto a filter directive.
fn parse_level(level: &str) -> &'static str {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" | "0" => "trace",
        "debug" | "1" => "debug",
        "warn" | "warning" | "3" => "warn",
        "error" | "4" | "fatal" | "5" => "error",
        _ => "info",
    }
}
