//! The replacement worker loop.
//!
//! Requests are handled strictly one at a time in arrival order; the next
//! request is not received until the current replacement, including its
//! operation waits, has finished. Failures are logged and the request is
//! dropped.

use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::config::AddressFilter;
use crate::replacer::IpReplacer;
use crate::request::ReplacementRequest;
use crate::waiter::shutdown_requested;

/// Outcome counters for a worker run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Requests taken off the queue.
    pub processed: u64,

    /// Requests that ended with the reserved address attached.
    pub replaced: u64,

    /// Requests that failed at any stage.
    pub failed: u64,

    /// Failures that may have left the instance without an external address.
    pub detached: u64,
}

/// Sequential consumer of replacement requests.
pub struct Worker {
    replacer: IpReplacer,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    pub fn new(replacer: IpReplacer, shutdown: watch::Receiver<bool>) -> Self {
        Self { replacer, shutdown }
    }

    /// Process requests until the channel closes or shutdown is signalled.
    pub async fn run(
        &self,
        mut requests: mpsc::Receiver<ReplacementRequest>,
        filter: &AddressFilter,
    ) -> WorkerStats {
        info!(filter = %filter, "Starting replacement worker");

        let mut shutdown = self.shutdown.clone();
        let mut stats = WorkerStats::default();

        loop {
            let request = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => {
                    info!("Worker shutting down");
                    break;
                }
                request = requests.recv() => match request {
                    Some(request) => request,
                    None => {
                        info!("Request stream closed");
                        break;
                    }
                },
            };

            stats.processed += 1;
            info!(
                project = %request.project_id,
                zone = %request.zone,
                instance = %request.instance_name,
                "Working on instance"
            );

            match self
                .replacer
                .replace(
                    &request.project_id,
                    &request.zone,
                    &request.instance_name,
                    filter,
                )
                .await
            {
                Ok(address) => {
                    stats.replaced += 1;
                    info!(
                        instance = %request.instance_name,
                        address = %address,
                        "Instance now uses reserved address"
                    );
                }
                Err(e) if e.leaves_instance_detached() => {
                    stats.failed += 1;
                    stats.detached += 1;
                    error!(
                        instance = %request.instance_name,
                        zone = %request.zone,
                        stage = %e.stage(),
                        reason = e.reason_code(),
                        detached = true,
                        error = %e,
                        "IP replacement failed; instance may have no external access config"
                    );
                }
                Err(e) => {
                    stats.failed += 1;
                    warn!(
                        instance = %request.instance_name,
                        zone = %request.zone,
                        stage = %e.stage(),
                        reason = e.reason_code(),
                        detached = false,
                        error = %e,
                        "IP replacement failed"
                    );
                }
            }
        }

        info!(
            processed = stats.processed,
            replaced = stats.replaced,
            failed = stats.failed,
            detached = stats.detached,
            "Replacement worker stopped"
        );
        stats
    }
}
