//! Bounded scheduler: one worker per endpoint, gated by a counting
//! semaphore. Every endpoint publishes exactly one result; worker panics are
//! isolated and converted into failed results.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::client::PrismClient;
use crate::config::Config;
use crate::error::Error;
use crate::filter::FindingFilter;
use crate::fs::Fs;
use crate::http::Transport;
use crate::progress::ProgressFactory;
use crate::runner;
use crate::types::EndpointResult;

/// All published results, in order of publication.
#[derive(Debug)]
pub struct SchedulerOutcome {
    pub results: Vec<EndpointResult>,
}

impl SchedulerOutcome {
    /// Hosts whose worker failed.
    #[must_use]
    pub fn failed_hosts(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| r.is_failed())
            .map(|r| r.endpoint.clone())
            .collect()
    }
}

/// Run one worker per configured endpoint with at most
/// `config.max_parallel` active at once.
///
/// The scheduler never short-circuits: every endpoint is attempted even if
/// siblings fail, and it returns only once all workers have published.
/// Cancelling `cancel` propagates to every active worker.
pub async fn run_all(
    config: Arc<Config>,
    transport: Arc<dyn Transport>,
    fs: Arc<dyn Fs>,
    filter: Arc<FindingFilter>,
    progress: Arc<dyn ProgressFactory>,
    cancel: CancellationToken,
) -> SchedulerOutcome {
    let endpoints = config.endpoints();
    let semaphore = Arc::new(Semaphore::new(config.max_parallel));
    let (tx, mut rx) = mpsc::channel::<EndpointResult>(endpoints.len().max(1));

    let mut handles = Vec::with_capacity(endpoints.len());
    for endpoint in endpoints {
        let config = Arc::clone(&config);
        let transport = Arc::clone(&transport);
        let fs = Arc::clone(&fs);
        let filter = Arc::clone(&filter);
        let progress = Arc::clone(&progress);
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();
        let tx = tx.clone();
        let host = endpoint.host.clone();

        let handle = tokio::spawn(async move {
            let permit = tokio::select! {
                () = cancel.cancelled() => None,
                permit = semaphore.acquire_owned() => permit.ok(),
            };

            let outcome = match permit {
                None => Err(Error::Timeout("cancelled before start".to_string())),
                Some(_permit) => {
                    let client = PrismClient::new(
                        &endpoint.host,
                        endpoint.username.clone(),
                        endpoint.password.clone(),
                        Arc::clone(&transport),
                        config.retry,
                        config.request_timeout,
                    );
                    let bar = progress.for_endpoint(&endpoint.host);
                    let child = cancel.child_token();

                    let run = runner::run_endpoint(
                        &config,
                        fs.as_ref(),
                        &client,
                        &endpoint.host,
                        &child,
                        bar.as_ref(),
                        filter.as_ref(),
                    );
                    let outcome = tokio::select! {
                        () = child.cancelled() => {
                            Err(Error::Timeout("cancelled".to_string()))
                        }
                        result = tokio::time::timeout(config.timeout, run) => match result {
                            Ok(inner) => inner,
                            Err(_) => {
                                child.cancel();
                                Err(Error::Timeout(format!(
                                    "endpoint deadline of {:?} exceeded",
                                    config.timeout
                                )))
                            }
                        },
                    };
                    if let Err(err) = &outcome {
                        bar.set_phase("failed");
                        error!(cluster = %endpoint.host, error = %err, "cluster run failed");
                    } else {
                        info!(cluster = %endpoint.host, "cluster run completed");
                    }
                    outcome
                }
            };

            // Capacity equals the endpoint count, so this never blocks.
            let _ = tx
                .send(EndpointResult {
                    endpoint: endpoint.host,
                    outcome,
                })
                .await;
        });
        handles.push((host, handle));
    }
    drop(tx);

    // Join every worker; a panicked worker never sent a result, so publish
    // one on its behalf instead of letting the panic reach siblings.
    let mut panicked = Vec::new();
    for (host, handle) in handles {
        if let Err(join_err) = handle.await {
            if join_err.is_panic() {
                let message = panic_message(join_err);
                error!(cluster = %host, panic = %message, "cluster worker panicked");
                panicked.push(EndpointResult {
                    endpoint: host,
                    outcome: Err(Error::Panic(message)),
                });
            }
        }
    }

    let mut results = Vec::new();
    while let Some(result) = rx.recv().await {
        results.push(result);
    }
    results.extend(panicked);

    SchedulerOutcome { results }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => {
            if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            }
        }
        Err(join_err) => join_err.to_string(),
    }
}
