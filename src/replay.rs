//! Replay mode: rebuild reports from previously persisted artifacts without
//! contacting the remote API.

use tracing::{error, info, warn};

use crate::aggregate::Aggregate;
use crate::config::Config;
use crate::error::Error;
use crate::filter::FindingFilter;
use crate::fs::{Fs, DIR_MODE, FILE_MODE};
use crate::parser;
use crate::runner::{filtered_log_path, raw_log_path, render_outputs};
use crate::types::EndpointResult;

/// Reconstitute filtered files, parse, and render for every configured
/// endpoint. Endpoints lacking both the filtered and the raw artifact are
/// skipped with a warning; per-endpoint problems never abort the replay.
pub async fn run(
    config: &Config,
    fs: &dyn Fs,
    filter: &FindingFilter,
) -> Result<Aggregate, Error> {
    let mut results = Vec::new();

    for host in &config.clusters {
        let filtered_path = filtered_log_path(config, host);

        if !fs.exists(&filtered_path).await {
            let raw_path = raw_log_path(config, host);
            if !fs.exists(&raw_path).await {
                warn!(cluster = %host, "replay: no filtered or raw log, skipping");
                continue;
            }
            match rebuild_filtered(config, fs, host).await {
                Ok(()) => {
                    info!(cluster = %host, path = %filtered_path.display(), "replay: built filtered");
                }
                Err(err) => {
                    error!(cluster = %host, error = %err, "replay: build filtered failed");
                    continue;
                }
            }
        }

        let data = match fs.read_to_string(&filtered_path).await {
            Ok(data) => data,
            Err(err) => {
                error!(cluster = %host, error = %err, "replay: read filtered failed");
                continue;
            }
        };

        let findings = match parser::parse_summary(&data) {
            Ok(findings) => findings,
            Err(Error::NoFindings) => {
                warn!(cluster = %host, "replay: no finding blocks in filtered log");
                Vec::new()
            }
            Err(err) => {
                error!(cluster = %host, error = %err, "replay: parse filtered failed");
                continue;
            }
        };

        let findings = filter.apply(host, findings);
        if let Err(err) = render_outputs(config, fs, host, &findings).await {
            error!(cluster = %host, error = %err, "replay: render failed");
            continue;
        }

        results.push(EndpointResult {
            endpoint: host.clone(),
            outcome: Ok(findings),
        });
    }

    let aggregate = Aggregate::from_results(&results);
    info!(
        clusters = results.len(),
        rows = aggregate.rows.len(),
        "replay: aggregate assembled"
    );
    Ok(aggregate)
}

/// Build the filtered artifact from the raw log.
async fn rebuild_filtered(config: &Config, fs: &dyn Fs, host: &str) -> Result<(), Error> {
    let raw = fs.read_to_string(&raw_log_path(config, host)).await?;
    let findings = match parser::parse_summary(&raw) {
        Ok(findings) => findings,
        Err(Error::NoFindings) => Vec::new(),
        Err(err) => return Err(err),
    };
    fs.ensure_dir(&config.output_dir_filtered, DIR_MODE).await?;
    fs.write(
        &filtered_log_path(config, host),
        parser::render_filtered(&findings).as_bytes(),
        FILE_MODE,
    )
    .await
}
