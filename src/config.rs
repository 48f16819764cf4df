//! Configuration: CLI flags, `NCC_*` environment bindings, and validation.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::warn;

use crate::error::Error;
use crate::http::RetryPolicy;
use crate::report::OutputFormat;
use crate::types::Endpoint;

/// Run NCC checks on multiple clusters, aggregate results, and generate
/// reports.
///
/// Every flag is also bindable through an environment variable with prefix
/// `NCC_` and `-` replaced by `_` (e.g. `--poll-interval` ↔
/// `NCC_POLL_INTERVAL`).
#[derive(Debug, Parser)]
#[command(name = "ncc-orchestrator")]
#[command(about = "Run NCC checks across clusters and aggregate the results")]
#[command(version)]
pub struct Cli {
    /// Comma-separated cluster IPs or FQDNs
    #[arg(long, env = "NCC_CLUSTERS", default_value = "")]
    pub clusters: String,

    /// Username for Prism Gateway
    #[arg(long, env = "NCC_USERNAME", default_value = "admin")]
    pub username: String,

    /// Password (prefer NCC_PASSWORD over the flag)
    #[arg(long, env = "NCC_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,

    /// Skip TLS verify (only for trusted labs)
    #[arg(long, env = "NCC_INSECURE_SKIP_VERIFY")]
    pub insecure_skip_verify: bool,

    /// Overall per-cluster timeout
    #[arg(long, env = "NCC_TIMEOUT", default_value = "15m", value_parser = humantime::parse_duration)]
    pub timeout: Duration,

    /// Per-request timeout
    #[arg(long, env = "NCC_REQUEST_TIMEOUT", default_value = "20s", value_parser = humantime::parse_duration)]
    pub request_timeout: Duration,

    /// Polling interval for task status
    #[arg(long, env = "NCC_POLL_INTERVAL", default_value = "15s", value_parser = humantime::parse_duration)]
    pub poll_interval: Duration,

    /// Additive jitter to the polling interval
    #[arg(long, env = "NCC_POLL_JITTER", default_value = "2s", value_parser = humantime::parse_duration)]
    pub poll_jitter: Duration,

    /// Max concurrent clusters
    #[arg(long, env = "NCC_MAX_PARALLEL", default_value_t = 4)]
    pub max_parallel: usize,

    /// Comma-separated outputs for per-cluster files: html,csv,json
    #[arg(long, env = "NCC_OUTPUTS", default_value = "html,csv")]
    pub outputs: String,

    /// Directory for raw NCC summary text
    #[arg(long, env = "NCC_OUTPUT_DIR_LOGS", default_value = "nccfiles")]
    pub output_dir_logs: PathBuf,

    /// Directory for filtered and aggregated results
    #[arg(long, env = "NCC_OUTPUT_DIR_FILTERED", default_value = "outputfiles")]
    pub output_dir_filtered: PathBuf,

    /// Path to the rotated log file
    #[arg(long, env = "NCC_LOG_FILE", default_value = "logs/ncc-runner.log")]
    pub log_file: PathBuf,

    /// Log level (trace/debug/info/warn/error or 0..5)
    #[arg(long, env = "NCC_LOG_LEVEL", default_value = "")]
    pub log_level: String,

    /// Max retry attempts for HTTP calls
    #[arg(long, env = "NCC_RETRY_MAX_ATTEMPTS", default_value_t = 6)]
    pub retry_max_attempts: u32,

    /// Base retry delay (with jitter, exponential)
    #[arg(long, env = "NCC_RETRY_BASE_DELAY", default_value = "400ms", value_parser = humantime::parse_duration)]
    pub retry_base_delay: Duration,

    /// Max retry delay cap
    #[arg(long, env = "NCC_RETRY_MAX_DELAY", default_value = "8s", value_parser = humantime::parse_duration)]
    pub retry_max_delay: Duration,

    /// Replay from existing logs without running NCC
    #[arg(long, env = "NCC_REPLAY")]
    pub replay: bool,

    /// Skip cluster health validation before running NCC
    #[arg(long, env = "NCC_SKIP_HEALTH_CHECK")]
    pub skip_health_check: bool,

    /// Timeout for cluster health checks
    #[arg(long, env = "NCC_HEALTH_CHECK_TIMEOUT", default_value = "30s", value_parser = humantime::parse_duration)]
    pub health_check_timeout: Duration,

    /// Filter results by severity (FAIL,WARN,INFO,ERR)
    #[arg(long, env = "NCC_FILTER_SEVERITY")]
    pub filter_severity: Option<String>,

    /// Filter results by check name pattern (regex)
    #[arg(long, env = "NCC_FILTER_CHECK")]
    pub filter_check: Option<String>,

    /// Filter results by cluster pattern (regex)
    #[arg(long, env = "NCC_FILTER_CLUSTER")]
    pub filter_cluster: Option<String>,

    /// Enable webhook notifications
    #[arg(long, env = "NCC_WEBHOOK_ENABLED")]
    pub webhook_enabled: bool,

    /// Webhook URL for notifications
    #[arg(long, env = "NCC_WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// HTTP method for the webhook
    #[arg(long, env = "NCC_WEBHOOK_METHOD", default_value = "POST")]
    pub webhook_method: String,

    /// JSON object of additional webhook headers
    #[arg(long, env = "NCC_WEBHOOK_HEADERS")]
    pub webhook_headers: Option<String>,

    /// Webhook request timeout
    #[arg(long, env = "NCC_WEBHOOK_TIMEOUT", default_value = "30s", value_parser = humantime::parse_duration)]
    pub webhook_timeout: Duration,

    /// Enable email notifications
    #[arg(long, env = "NCC_EMAIL_ENABLED")]
    pub email_enabled: bool,

    /// SMTP server hostname
    #[arg(long, env = "NCC_EMAIL_SMTP_HOST")]
    pub email_smtp_host: Option<String>,

    /// SMTP server port
    #[arg(long, env = "NCC_EMAIL_SMTP_PORT", default_value_t = 587)]
    pub email_smtp_port: u16,

    /// SMTP username
    #[arg(long, env = "NCC_EMAIL_USERNAME")]
    pub email_username: Option<String>,

    /// SMTP password
    #[arg(long, env = "NCC_EMAIL_PASSWORD", hide_env_values = true)]
    pub email_password: Option<String>,

    /// Email sender address
    #[arg(long, env = "NCC_EMAIL_FROM")]
    pub email_from: Option<String>,

    /// Comma-separated email recipients
    #[arg(long, env = "NCC_EMAIL_TO")]
    pub email_to: Option<String>,

    /// Email subject
    #[arg(long, env = "NCC_EMAIL_SUBJECT", default_value = "NCC Orchestrator Report")]
    pub email_subject: String,

    /// Use STARTTLS for SMTP
    #[arg(long, env = "NCC_EMAIL_TLS", default_value_t = true, action = clap::ArgAction::Set)]
    pub email_tls: bool,

    /// Enable Prometheus metrics export
    #[arg(long, env = "NCC_METRICS_ENABLED")]
    pub metrics_enabled: bool,

    /// Path to the Prometheus metrics file
    #[arg(long, env = "NCC_METRICS_FILE", default_value = "metrics.prom")]
    pub metrics_file: PathBuf,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub clusters: Vec<String>,
    pub username: String,
    pub password: String,
    pub insecure_skip_verify: bool,
    pub timeout: Duration,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub poll_jitter: Duration,
    pub max_parallel: usize,
    pub outputs: Vec<OutputFormat>,
    pub output_dir_logs: PathBuf,
    pub output_dir_filtered: PathBuf,
    pub log_file: PathBuf,
    pub log_level: String,
    pub retry: RetryPolicy,
    pub replay: bool,
    pub skip_health_check: bool,
    pub health_check_timeout: Duration,
    pub filter_severity: Option<String>,
    pub filter_check: Option<String>,
    pub filter_cluster: Option<String>,
}

impl Config {
    /// Build and validate a config from parsed CLI flags.
    ///
    /// # Errors
    /// [`Error::Config`] describing the first invalid field.
    pub fn from_cli(cli: &Cli) -> Result<Self, Error> {
        let clusters = split_csv(&cli.clusters);

        let mut outputs = Vec::new();
        for token in split_csv(&cli.outputs) {
            match token.parse::<OutputFormat>() {
                Ok(format) if !outputs.contains(&format) => outputs.push(format),
                Ok(_) => {}
                Err(_) => warn!(format = %token, "unknown output format, skipping"),
            }
        }

        let config = Self {
            clusters,
            username: cli.username.clone(),
            password: cli.password.clone(),
            insecure_skip_verify: cli.insecure_skip_verify,
            timeout: cli.timeout,
            request_timeout: cli.request_timeout,
            poll_interval: cli.poll_interval,
            poll_jitter: cli.poll_jitter,
            max_parallel: cli.max_parallel,
            outputs,
            output_dir_logs: cli.output_dir_logs.clone(),
            output_dir_filtered: cli.output_dir_filtered.clone(),
            log_file: cli.log_file.clone(),
            log_level: cli.log_level.clone(),
            retry: RetryPolicy {
                max_attempts: cli.retry_max_attempts,
                base_delay: cli.retry_base_delay,
                max_delay: cli.retry_max_delay,
            },
            replay: cli.replay,
            skip_health_check: cli.skip_health_check,
            health_check_timeout: cli.health_check_timeout,
            filter_severity: cli.filter_severity.clone(),
            filter_check: cli.filter_check.clone(),
            filter_cluster: cli.filter_cluster.clone(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that must hold before any worker starts.
    ///
    /// # Errors
    /// [`Error::Config`] for the first violated invariant.
    pub fn validate(&self) -> Result<(), Error> {
        if self.clusters.is_empty() {
            return Err(Error::Config("no clusters provided".into()));
        }
        if self.username.is_empty() {
            return Err(Error::Config("username is required".into()));
        }
        if !self.replay && self.password.is_empty() {
            return Err(Error::Config(
                "password is required (set NCC_PASSWORD or --password)".into(),
            ));
        }
        if self.max_parallel == 0 {
            return Err(Error::Config("max-parallel must be greater than 0".into()));
        }
        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than 0".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::Config("request-timeout must be greater than 0".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::Config("poll-interval must be greater than 0".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config(
                "retry-max-attempts must be greater than 0".into(),
            ));
        }
        if self.retry.base_delay.is_zero() {
            return Err(Error::Config("retry-base-delay must be greater than 0".into()));
        }
        if self.retry.max_delay < self.retry.base_delay {
            return Err(Error::Config(
                "retry-max-delay must be at least retry-base-delay".into(),
            ));
        }
        Ok(())
    }

    /// Endpoints for this run, binding the credential pair to each host.
    #[must_use]
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.clusters
            .iter()
            .map(|host| Endpoint {
                host: host.clone(),
                username: self.username.clone(),
                password: self.password.clone(),
            })
            .collect()
    }
}

/// Split a comma-separated value, trimming and dropping empty items.
#[must_use]
pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
