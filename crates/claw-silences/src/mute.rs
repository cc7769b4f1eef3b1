//! Mute evaluation for the alert ingestion path.
//!
//! [`MuteEvaluator`] answers whether a label set is covered by any active
//! silence. It fails open: when the silence source errors, times out, or
//! panics, the answer is "not muted", so a degraded store can never
//! suppress alert delivery.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::Result;
use crate::matcher::{LabelSet, matches_all};
use crate::store::SilenceStore;
use crate::types::{Silence, SilenceId};

/// Supplies the silences that are active at an instant.
///
/// Implement this to evaluate mutes against something other than a
/// [`SilenceStore`].
pub trait SilenceSource: Send + Sync + std::fmt::Debug {
    /// Returns the silences whose window contains `now`.
    fn active_silences(&self, now: DateTime<Utc>) -> Result<Vec<Silence>>;
}

impl SilenceSource for SilenceStore {
    fn active_silences(&self, now: DateTime<Utc>) -> Result<Vec<Silence>> {
        self.list_active(now)
    }
}

/// Decides whether label sets are currently silenced.
///
/// Every call re-reads the source; nothing is cached.
#[derive(Debug, Clone)]
pub struct MuteEvaluator {
    source: Arc<dyn SilenceSource>,
}

impl MuteEvaluator {
    /// Creates an evaluator over an arbitrary silence source.
    #[must_use]
    pub fn new(source: Arc<dyn SilenceSource>) -> Self {
        Self { source }
    }

    /// Creates an evaluator reading from a store.
    #[must_use]
    pub fn from_store(store: SilenceStore) -> Self {
        Self::new(Arc::new(store))
    }

    /// Returns true if at least one silence active at `now` matches `labels`.
    ///
    /// Never fails: a source error is logged and reported as not muted.
    #[must_use]
    pub fn is_muted(&self, labels: &LabelSet, now: DateTime<Utc>) -> bool {
        let Some(candidates) = self.candidates(now) else {
            return false;
        };

        let muted_by = candidates
            .iter()
            .find(|s| matches_all(&s.matchers, labels))
            .map(|s| s.id);

        debug!(
            candidates = candidates.len(),
            muted_by = ?muted_by,
            "mute check"
        );
        muted_by.is_some()
    }

    /// Returns the ids of every silence active at `now` that matches `labels`.
    ///
    /// Empty when nothing matches or the source fails.
    #[must_use]
    pub fn muting_silences(&self, labels: &LabelSet, now: DateTime<Utc>) -> Vec<SilenceId> {
        self.candidates(now)
            .unwrap_or_default()
            .into_iter()
            .filter(|s| matches_all(&s.matchers, labels))
            .map(|s| s.id)
            .collect()
    }

    /// Runs [`is_muted`](Self::is_muted) on the blocking pool, bounded by `timeout`.
    ///
    /// A timeout or a failed task reads as not muted. Dropping the returned
    /// future abandons the check; reads hold no transaction.
    pub async fn is_muted_within(
        &self,
        labels: LabelSet,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> bool {
        let evaluator = self.clone();
        let task = tokio::task::spawn_blocking(move || evaluator.is_muted(&labels, now));

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(muted)) => muted,
            Ok(Err(e)) => {
                warn!(error = %e, "mute check task failed, treating as not muted");
                false
            }
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "mute check timed out, treating as not muted"
                );
                false
            }
        }
    }

    /// Fetches candidates and drops any the source returned outside their window.
    fn candidates(&self, now: DateTime<Utc>) -> Option<Vec<Silence>> {
        match self.source.active_silences(now) {
            Ok(silences) => Some(
                silences
                    .into_iter()
                    .filter(|s| s.is_active_at(now))
                    .collect(),
            ),
            Err(e) => {
                warn!(error = %e, "silence lookup failed, treating as not muted");
                None
            }
        }
    }
}
