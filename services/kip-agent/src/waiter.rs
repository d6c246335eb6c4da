//! Waiting for zonal operations to finish.
//!
//! The waiter re-fetches an operation until the provider reports it `DONE`,
//! sleeping a fixed interval between polls. A fetch error ends the wait
//! immediately: the caller must treat it as "outcome unknown". An optional
//! deadline and the shutdown signal bound how long a stuck operation can hold
//! the worker.

use std::sync::Arc;
use std::time::Duration;

use kip_compute::{Operation, OperationApi};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::WaitError;

/// Default interval between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Waiter configuration.
#[derive(Debug, Clone)]
pub struct WaiterConfig {
    /// Interval between status polls.
    pub poll_interval: Duration,

    /// Give up once an operation has been waited on this long.
    pub max_wait: Option<Duration>,
}

impl Default for WaiterConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: None,
        }
    }
}

/// Blocks until zonal operations complete.
#[derive(Clone)]
pub struct OperationWaiter {
    api: Arc<dyn OperationApi>,
    config: WaiterConfig,
    shutdown: watch::Receiver<bool>,
}

impl OperationWaiter {
    pub fn new(
        api: Arc<dyn OperationApi>,
        config: WaiterConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            api,
            config,
            shutdown,
        }
    }

    /// Wait for `operation` to reach `DONE`, returning its final state.
    pub async fn wait(
        &self,
        project: &str,
        zone: &str,
        operation: &Operation,
    ) -> Result<Operation, WaitError> {
        let started = Instant::now();
        let mut shutdown = self.shutdown.clone();
        debug!(
            operation = %operation.name,
            status = %operation.status,
            "Waiting for operation"
        );

        loop {
            if *shutdown.borrow() {
                return Err(WaitError::Cancelled {
                    operation: operation.name.clone(),
                });
            }

            let current = self
                .api
                .get_zone_operation(project, zone, &operation.name)
                .await
                .map_err(|source| {
                    error!(operation = %operation.name, error = %source, "Failed to fetch operation status");
                    WaitError::Provider {
                        operation: operation.name.clone(),
                        source,
                    }
                })?;

            info!(operation = %current.name, status = %current.status, "Operation status");

            if current.status.is_done() {
                if let Some(failure) = current.error.as_ref().filter(|e| !e.errors.is_empty()) {
                    warn!(operation = %current.name, error = %failure, "Operation finished with errors");
                    return Err(WaitError::OperationFailed {
                        operation: current.name.clone(),
                        error: failure.clone(),
                    });
                }
                return Ok(current);
            }

            let elapsed = started.elapsed();
            if let Some(max_wait) = self.config.max_wait {
                if elapsed >= max_wait {
                    warn!(operation = %operation.name, elapsed_secs = elapsed.as_secs(), "Operation wait timed out");
                    return Err(WaitError::Timeout {
                        operation: operation.name.clone(),
                        elapsed,
                    });
                }
            }

            let pause = match self.config.max_wait {
                Some(max_wait) => self.config.poll_interval.min(max_wait - elapsed),
                None => self.config.poll_interval,
            };
            debug!(operation = %operation.name, "sleeping");
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = shutdown_requested(&mut shutdown) => {
                    info!(operation = %operation.name, "Operation wait cancelled");
                    return Err(WaitError::Cancelled {
                        operation: operation.name.clone(),
                    });
                }
            }
        }
    }
}

/// Resolves once shutdown is signalled. Never resolves if the sender is gone
/// without having signalled.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use kip_compute::{InstanceApi, OperationStatus};
    use kip_testing::{Call, FakeCompute, DELETE_ACCESS_CONFIG};

    use super::*;

    async fn start_delete(fake: &FakeCompute) -> Operation {
        fake.delete_access_config("p1", "us-central1-a", "node-1", "external-nat", "nic0")
            .await
            .unwrap()
    }

    fn polls(fake: &FakeCompute) -> usize {
        fake.calls()
            .iter()
            .filter(|c| matches!(c, Call::GetOperation { .. }))
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_at_fixed_interval_until_done() {
        let fake = Arc::new(
            FakeCompute::new()
                .with_instance("node-1", "34.0.0.9")
                .with_polls_until_done(3),
        );
        let (_tx, rx) = watch::channel(false);
        let waiter = OperationWaiter::new(fake.clone(), WaiterConfig::default(), rx);
        let op = start_delete(&fake).await;

        let started = Instant::now();
        let done = waiter.wait("p1", "us-central1-a", &op).await.unwrap();

        assert_eq!(done.status, OperationStatus::Done);
        assert_eq!(polls(&fake), 4);
        assert_eq!(started.elapsed(), DEFAULT_POLL_INTERVAL * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_error_ends_wait_without_retry() {
        let fake = Arc::new(
            FakeCompute::new()
                .with_instance("node-1", "34.0.0.9")
                .failing_poll(DELETE_ACCESS_CONFIG),
        );
        let (_tx, rx) = watch::channel(false);
        let waiter = OperationWaiter::new(fake.clone(), WaiterConfig::default(), rx);
        let op = start_delete(&fake).await;

        let err = waiter.wait("p1", "us-central1-a", &op).await.unwrap_err();

        assert!(matches!(err, WaitError::Provider { .. }));
        assert_eq!(polls(&fake), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_with_errors_is_failure() {
        let fake = Arc::new(
            FakeCompute::new()
                .with_instance("node-1", "34.0.0.9")
                .failing_operation(DELETE_ACCESS_CONFIG),
        );
        let (_tx, rx) = watch::channel(false);
        let waiter = OperationWaiter::new(fake.clone(), WaiterConfig::default(), rx);
        let op = start_delete(&fake).await;

        let err = waiter.wait("p1", "us-central1-a", &op).await.unwrap_err();
        assert!(matches!(err, WaitError::OperationFailed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_bounds_the_wait() {
        let fake = Arc::new(
            FakeCompute::new()
                .with_instance("node-1", "34.0.0.9")
                .with_polls_until_done(u32::MAX),
        );
        let (_tx, rx) = watch::channel(false);
        let config = WaiterConfig {
            poll_interval: Duration::from_secs(2),
            max_wait: Some(Duration::from_secs(10)),
        };
        let waiter = OperationWaiter::new(fake.clone(), config, rx);
        let op = start_delete(&fake).await;

        let err = waiter.wait("p1", "us-central1-a", &op).await.unwrap_err();

        match err {
            WaitError::Timeout { elapsed, .. } => assert_eq!(elapsed, Duration::from_secs(10)),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(polls(&fake), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_is_not_overrun_by_poll_interval() {
        let fake = Arc::new(
            FakeCompute::new()
                .with_instance("node-1", "34.0.0.9")
                .with_polls_until_done(u32::MAX),
        );
        let (_tx, rx) = watch::channel(false);
        let config = WaiterConfig {
            poll_interval: Duration::from_secs(2),
            max_wait: Some(Duration::from_secs(5)),
        };
        let waiter = OperationWaiter::new(fake.clone(), config, rx);
        let op = start_delete(&fake).await;

        let err = waiter.wait("p1", "us-central1-a", &op).await.unwrap_err();

        match err {
            WaitError::Timeout { elapsed, .. } => assert_eq!(elapsed, Duration::from_secs(5)),
            other => panic!("unexpected error: {other:?}"),
        }
        // Polls at 0, 2, 4 and a final one at the 5 s deadline.
        assert_eq!(polls(&fake), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_wait() {
        let fake = Arc::new(
            FakeCompute::new()
                .with_instance("node-1", "34.0.0.9")
                .with_polls_until_done(u32::MAX),
        );
        let (tx, rx) = watch::channel(false);
        let waiter = OperationWaiter::new(fake.clone(), WaiterConfig::default(), rx);
        let op = start_delete(&fake).await;

        let handle = tokio::spawn(async move { waiter.wait("p1", "us-central1-a", &op).await });
        tokio::time::sleep(Duration::from_secs(5)).await;
        tx.send(true).unwrap();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, WaitError::Cancelled { .. }));
    }
}
