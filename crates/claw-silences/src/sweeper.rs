//! Background purge of expired silences.
//!
//! Expired silences stop muting as soon as their window ends; the sweeper
//! only reclaims the rows. It ticks on a fixed interval and deletes every
//! silence with `ends_at <= now` through the `ends_at` index.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SweeperConfig;
use crate::error::{Result, SilenceError};
use crate::store::SilenceStore;

/// Periodically purges expired silences from a store.
#[derive(Debug, Clone)]
pub struct ExpirySweeper {
    store: SilenceStore,
    interval: Duration,
}

impl ExpirySweeper {
    /// Creates a sweeper running every `interval`.
    ///
    /// # Errors
    ///
    /// Returns `SilenceError::Config` if `interval` is zero.
    pub fn new(store: SilenceStore, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(SilenceError::Config(
                "sweep interval must be greater than 0".to_string(),
            ));
        }
        Ok(Self { store, interval })
    }

    /// Creates a sweeper from configuration, or `None` if sweeping is disabled.
    ///
    /// # Errors
    ///
    /// Returns `SilenceError::Config` if sweeping is enabled with a zero interval.
    pub fn from_config(store: SilenceStore, config: &SweeperConfig) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }
        Self::new(store, config.interval()).map(Some)
    }

    /// Returns the sweep interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs a single purge with cutoff `now`.
    ///
    /// # Errors
    ///
    /// Returns `SilenceError::Storage` if the purge cannot be committed.
    pub fn sweep_once(&self, now: DateTime<Utc>) -> Result<usize> {
        self.store.purge_expired(now)
    }

    /// Starts the sweep loop on the current tokio runtime.
    ///
    /// The first sweep runs immediately. Failed sweeps are logged and the
    /// loop keeps going.
    #[must_use]
    pub fn spawn(self) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let sweeps = Arc::new(AtomicU64::new(0));
        let purged = Arc::new(AtomicU64::new(0));

        let task_sweeps = Arc::clone(&sweeps);
        let task_purged = Arc::clone(&purged);

        info!(interval_secs = self.interval.as_secs(), "starting expiry sweeper");

        let task = tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(self.interval);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {}
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                        continue;
                    }
                }

                let sweeper = self.clone();
                let outcome =
                    tokio::task::spawn_blocking(move || sweeper.sweep_once(Utc::now())).await;

                match outcome {
                    Ok(Ok(removed)) => {
                        task_purged.fetch_add(removed as u64, Ordering::SeqCst);
                        debug!(removed, "expiry sweep complete");
                    }
                    Ok(Err(e)) => warn!(error = %e, "expiry sweep failed"),
                    Err(e) => warn!(error = %e, "expiry sweep task failed"),
                }
                task_sweeps.fetch_add(1, Ordering::SeqCst);
            }

            info!("expiry sweeper stopped");
        });

        SweeperHandle {
            shutdown: shutdown_tx,
            task,
            sweeps,
            purged,
        }
    }
}

/// Handle for controlling a running sweeper.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    sweeps: Arc<AtomicU64>,
    purged: Arc<AtomicU64>,
}

impl SweeperHandle {
    /// Number of sweeps attempted so far.
    #[must_use]
    pub fn sweeps(&self) -> u64 {
        self.sweeps.load(Ordering::SeqCst)
    }

    /// Total silences purged so far.
    #[must_use]
    pub fn purged(&self) -> u64 {
        self.purged.load(Ordering::SeqCst)
    }

    /// Returns true while the sweep loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops the loop and waits for an in-flight sweep to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "expiry sweeper ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::Matcher;
    use crate::types::NewSilence;
    use chrono::Duration as ChronoDuration;

    fn silence(start: DateTime<Utc>, end: DateTime<Utc>) -> NewSilence {
        NewSilence::new(
            vec![Matcher::equal("alertname", "Watchdog").unwrap()],
            start,
            end,
            "admin",
            "test",
        )
        .unwrap()
    }

    #[test]
    fn from_config_respects_enabled() {
        let store = SilenceStore::open_in_memory().unwrap();

        let enabled = SweeperConfig {
            enabled: true,
            interval_secs: 30,
        };
        let sweeper = ExpirySweeper::from_config(store.clone(), &enabled)
            .unwrap()
            .unwrap();
        assert_eq!(sweeper.interval(), Duration::from_secs(30));

        let disabled = SweeperConfig {
            enabled: false,
            interval_secs: 30,
        };
        assert!(ExpirySweeper::from_config(store, &disabled).unwrap().is_none());
    }

    #[test]
    fn zero_interval_rejected() {
        let store = SilenceStore::open_in_memory().unwrap();

        let result = ExpirySweeper::new(store.clone(), Duration::ZERO);
        assert!(matches!(result, Err(SilenceError::Config(msg)) if msg.contains("interval")));

        let zero = SweeperConfig {
            enabled: true,
            interval_secs: 0,
        };
        assert!(matches!(
            ExpirySweeper::from_config(store.clone(), &zero),
            Err(SilenceError::Config(_))
        ));

        let disabled = SweeperConfig {
            enabled: false,
            interval_secs: 0,
        };
        assert!(ExpirySweeper::from_config(store, &disabled).unwrap().is_none());
    }

    #[test]
    fn sweep_once_uses_given_cutoff() {
        let store = SilenceStore::open_in_memory().unwrap();
        let now = Utc::now();
        store
            .create(&silence(now - ChronoDuration::hours(2), now - ChronoDuration::hours(1)))
            .unwrap();
        store
            .create(&silence(now - ChronoDuration::hours(1), now + ChronoDuration::hours(1)))
            .unwrap();

        let sweeper = ExpirySweeper::new(store.clone(), Duration::from_secs(60)).unwrap();
        assert_eq!(sweeper.sweep_once(now).unwrap(), 1);
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(sweeper.sweep_once(now + ChronoDuration::hours(2)).unwrap(), 1);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn spawned_sweeper_purges_and_stops() {
        let store = SilenceStore::open_in_memory().unwrap();
        let now = Utc::now();
        store
            .create(&silence(now - ChronoDuration::hours(2), now - ChronoDuration::hours(1)))
            .unwrap();
        let live = store
            .create(&silence(now - ChronoDuration::hours(1), now + ChronoDuration::hours(1)))
            .unwrap();

        let handle = ExpirySweeper::new(store.clone(), Duration::from_millis(10))
            .unwrap()
            .spawn();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while handle.purged() == 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(handle.purged(), 1);
        assert!(handle.sweeps() >= 1);
        assert!(handle.is_running());
        assert!(store.get(live).is_ok());

        handle.shutdown().await;
        assert_eq!(store.count().unwrap(), 1);
    }
}
