//! Indexer health tracking with escalating back-off.
//!
//! Every consecutive failure moves an indexer one step up the escalation
//! ladder; a success resets it. While disabled, pending releases from that
//! indexer are held back.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Back-off periods in seconds, indexed by escalation level.
const ESCALATION_PERIODS_SECS: [i64; 12] = [
    0, 60, 300, 600, 900, 1800, 3600, 7200, 14400, 28800, 43200, 86400,
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexerStatus {
    pub escalation: usize,
    pub disabled_till: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
}

impl IndexerStatus {
    pub fn is_disabled_at(&self, now: DateTime<Utc>) -> bool {
        self.disabled_till.map(|till| till > now).unwrap_or(false)
    }
}

#[derive(Default)]
pub struct IndexerStatusService {
    statuses: Mutex<HashMap<i64, IndexerStatus>>,
}

impl IndexerStatusService {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_statuses<T>(&self, f: impl FnOnce(&mut HashMap<i64, IndexerStatus>) -> T) -> T {
        let mut guard = match self.statuses.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    pub fn record_success(&self, indexer_id: i64) {
        self.with_statuses(|statuses| {
            if statuses.remove(&indexer_id).is_some() {
                debug!("Indexer {} recovered", indexer_id);
            }
        });
    }

    /// Records a failure. `retry_after` extends the disabled window when the
    /// indexer asked for a longer pause than the escalation gives.
    pub fn record_failure(&self, indexer_id: i64, retry_after: Option<Duration>) {
        let now = Utc::now();
        self.with_statuses(|statuses| {
            let status = statuses.entry(indexer_id).or_default();
            status.escalation = (status.escalation + 1).min(ESCALATION_PERIODS_SECS.len() - 1);
            status.last_failure = Some(now);

            let backoff = ChronoDuration::seconds(ESCALATION_PERIODS_SECS[status.escalation]);
            let requested = retry_after
                .and_then(|d| ChronoDuration::from_std(d).ok())
                .unwrap_or_else(ChronoDuration::zero);
            let till = now + backoff.max(requested);
            status.disabled_till = Some(till);

            warn!(
                "Indexer {} failed (escalation {}), disabled until {}",
                indexer_id, status.escalation, till
            );
        });
    }

    pub fn status(&self, indexer_id: i64) -> Option<IndexerStatus> {
        self.with_statuses(|statuses| statuses.get(&indexer_id).cloned())
    }

    pub fn is_disabled(&self, indexer_id: i64) -> bool {
        let now = Utc::now();
        self.with_statuses(|statuses| {
            statuses
                .get(&indexer_id)
                .map(|s| s.is_disabled_at(now))
                .unwrap_or(false)
        })
    }

    /// Ids of indexers currently disabled.
    pub fn blocked_indexers(&self) -> HashSet<i64> {
        let now = Utc::now();
        self.with_statuses(|statuses| {
            statuses
                .iter()
                .filter(|(_, s)| s.is_disabled_at(now))
                .map(|(id, _)| *id)
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_escalate() {
        let service = IndexerStatusService::new();

        service.record_failure(1, None);
        let first = service.status(1).unwrap();
        assert_eq!(first.escalation, 1);

        service.record_failure(1, None);
        let second = service.status(1).unwrap();
        assert_eq!(second.escalation, 2);
        assert!(second.disabled_till.unwrap() > first.disabled_till.unwrap());
        assert!(service.is_disabled(1));
        assert!(service.blocked_indexers().contains(&1));
    }

    #[test]
    fn test_escalation_is_capped() {
        let service = IndexerStatusService::new();
        for _ in 0..30 {
            service.record_failure(1, None);
        }
        assert_eq!(
            service.status(1).unwrap().escalation,
            ESCALATION_PERIODS_SECS.len() - 1
        );
    }

    #[test]
    fn test_retry_after_extends_window() {
        let service = IndexerStatusService::new();
        service.record_failure(1, Some(Duration::from_secs(7200)));

        let till = service.status(1).unwrap().disabled_till.unwrap();
        assert!(till > Utc::now() + ChronoDuration::seconds(7000));
    }

    #[test]
    fn test_success_resets() {
        let service = IndexerStatusService::new();
        service.record_failure(1, None);
        service.record_success(1);

        assert!(service.status(1).is_none());
        assert!(!service.is_disabled(1));
        assert!(!service.is_disabled(2));
    }
}
