//! Background maintenance of the revocation store and validation cache.
//!
//! The loop only reclaims memory. Both stores already hide expired entries on
//! lookup, so correctness never depends on it running.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::TokenResult;
use crate::cache::ValidationCache;
use crate::error::TokenError;
use crate::revocation::RevocationStore;

/// Entries removed by one maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Expired revocation entries removed.
    pub revoked_removed: usize,
    /// Stale cache entries removed.
    pub cache_removed: usize,
}

impl SweepReport {
    /// Total number of entries removed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.revoked_removed + self.cache_removed
    }
}

/// Sweeps both stores once as of `now`.
///
/// The stores are swept one after the other; no lock is held across them.
pub fn sweep(
    revocations: &RevocationStore,
    cache: Option<&ValidationCache>,
    now: OffsetDateTime,
) -> SweepReport {
    let revoked_removed = revocations.sweep(now);
    let cache_removed = cache.map_or(0, |cache| cache.sweep(now));

    let report = SweepReport {
        revoked_removed,
        cache_removed,
    };
    if report.total() > 0 {
        tracing::debug!(
            revoked_removed = report.revoked_removed,
            cache_removed = report.cache_removed,
            "Maintenance sweep removed expired entries"
        );
    }
    report
}

/// Handle for a running maintenance loop.
#[derive(Debug)]
pub struct MaintenanceHandle {
    /// Task handle for the loop
    handle: JoinHandle<()>,
    /// Shutdown signal
    shutdown: oneshot::Sender<()>,
}

impl MaintenanceHandle {
    /// Starts the loop on the current Tokio runtime.
    ///
    /// The first sweep happens one `interval` after start.
    ///
    /// # Errors
    /// Returns `TokenError::Configuration` if `interval` is zero or no Tokio
    /// runtime is available.
    pub fn spawn(
        revocations: Arc<RevocationStore>,
        cache: Option<Arc<ValidationCache>>,
        interval: Duration,
    ) -> TokenResult<Self> {
        if interval.is_zero() {
            return Err(TokenError::configuration(
                "maintenance interval must be > 0",
            ));
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            TokenError::configuration(format!("maintenance loop needs a Tokio runtime: {e}"))
        })?;

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            tracing::info!(?interval, "Maintenance loop started");

            loop {
                tokio::select! {
                    biased;
                    // Fires on an explicit stop and when the sender is dropped
                    _ = &mut shutdown_rx => {
                        tracing::info!("Maintenance loop shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        sweep(&revocations, cache.as_deref(), OffsetDateTime::now_utc());
                    }
                }
            }
        });

        Ok(Self {
            handle,
            shutdown: shutdown_tx,
        })
    }

    /// Returns `true` if the task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stops the loop and waits for the task to exit.
    ///
    /// No sweep runs after this returns.
    pub async fn stop(self) {
        if self.shutdown.send(()).is_err() {
            tracing::warn!("Maintenance loop already stopped");
        }
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "Maintenance task ended abnormally");
        }
    }
}
