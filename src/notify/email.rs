//! Email notification channel over SMTP.

use std::fmt::Write;

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{Notifier, NotifyReport};
use crate::error::Error;

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub use_tls: bool,
}

/// Sends the aggregated report as an HTML email.
pub struct EmailNotifier {
    config: EmailConfig,
}

impl EmailNotifier {
    /// # Errors
    /// [`Error::Config`] when host or recipients are missing.
    pub fn new(config: EmailConfig) -> Result<Self, Error> {
        if config.smtp_host.is_empty() {
            return Err(Error::Config("email SMTP host not configured".to_string()));
        }
        if config.to.is_empty() {
            return Err(Error::Config("no email recipients configured".to_string()));
        }
        Ok(Self { config })
    }

    fn build_message(&self, report: &NotifyReport) -> Result<Message, Error> {
        let from: Mailbox = self
            .config
            .from
            .parse()
            .map_err(|e| Error::Config(format!("invalid from address: {e}")))?;

        let mut builder = Message::builder()
            .from(from)
            .subject(self.config.subject.clone());
        for recipient in &self.config.to {
            let to: Mailbox = recipient
                .parse()
                .map_err(|e| Error::Config(format!("invalid recipient {recipient}: {e}")))?;
            builder = builder.to(to);
        }

        builder
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body(report)),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body(report)),
                    ),
            )
            .map_err(|e| Error::Config(format!("failed to build email message: {e}")))
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, report: &NotifyReport) -> Result<(), Error> {
        let message = self.build_message(report)?;

        let mut builder = if self.config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)
                .map_err(|e| Error::Network(format!("failed to create SMTP transport: {e}")))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.smtp_host)
        };
        builder = builder.port(self.config.smtp_port);

        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        builder
            .build()
            .send(message)
            .await
            .map_err(|e| Error::Network(format!("failed to send email: {e}")))?;
        Ok(())
    }
}

fn html_body(report: &NotifyReport) -> String {
    let mut rows = String::new();
    for result in &report.results {
        let _ = write!(
            rows,
            r#"
      <tr class="{sev}">
        <td>{cluster}</td>
        <td>{sev}</td>
        <td>{check}</td>
      </tr>"#,
            sev = result.severity,
            cluster = escape(&result.cluster),
            check = escape(&result.check),
        );
    }

    let failed = if report.failed_clusters.is_empty() {
        String::new()
    } else {
        format!(
            r#"<p class="failed">Failed clusters: {}</p>"#,
            escape(&report.failed_clusters.join(", "))
        )
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <style>
    body {{ font-family: Arial, sans-serif; margin: 20px; }}
    .summary span {{ display: inline-block; margin-right: 12px; padding: 4px 8px; border-radius: 4px; background: #f3f4f6; }}
    .failed {{ color: #c62828; }}
    table {{ border-collapse: collapse; }}
    th, td {{ border: 1px solid #ddd; padding: 6px 10px; text-align: left; }}
    .FAIL {{ background-color: #ffebee; }}
    .WARN {{ background-color: #fff3e0; }}
    .INFO {{ background-color: #e3f2fd; }}
    .ERR {{ background-color: #f5f5f5; }}
  </style>
</head>
<body>
  <h1>NCC Report</h1>
  <p>Generated at {timestamp}</p>
  <div class="summary">
    <span>Total: {total}</span>
    <span>FAIL: {fail}</span>
    <span>WARN: {warn}</span>
    <span>INFO: {info}</span>
    <span>ERR: {err}</span>
  </div>
  {failed}
  <table>
    <thead><tr><th>Cluster</th><th>Severity</th><th>Check</th></tr></thead>
    <tbody>{rows}
    </tbody>
  </table>
</body>
</html>"#,
        timestamp = escape(&report.timestamp),
        total = report.summary.total,
        fail = report.summary.fail,
        warn = report.summary.warn,
        info = report.summary.info,
        err = report.summary.err,
        failed = failed,
        rows = rows,
    )
}

fn text_body(report: &NotifyReport) -> String {
    let mut out = format!(
        "NCC Report ({timestamp})\n\
Total: {total}  FAIL: {fail}  WARN: {warn}  INFO: {info}  ERR: {err}\n",
        timestamp = report.timestamp,
        total = report.summary.total,
        fail = report.summary.fail,
        warn = report.summary.warn,
        info = report.summary.info,
        err = report.summary.err,
    );
    if !report.failed_clusters.is_empty() {
        let _ = writeln!(out, "Failed clusters: {}", report.failed_clusters.join(", "));
    }
    out
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
