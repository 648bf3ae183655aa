//! # Transition Scanner
//!
//! Periodic pass applying due transitions: episodes first, then series,
//! each in application date order. Transitions still waiting out their
//! backoff or abandoned are skipped.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::model::TransitionId;
use super::query::TransitionQuery;
use crate::acl::{AclResult, AclService};
use crate::observability::{log_event_at, log_event_with_fields, Event, Severity};

/// Outcome of one pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Correlates the pass's log lines
    pub scan_id: Uuid,
    pub applied: Vec<TransitionId>,
    pub failed: Vec<TransitionId>,
    /// Due but waiting for backoff, or abandoned
    pub skipped: Vec<TransitionId>,
}

/// Applies due transitions of one organization
pub struct TransitionScanner {
    service: Arc<AclService>,
    interval: Duration,
}

impl TransitionScanner {
    pub fn new(service: Arc<AclService>, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// Run one pass at `now`
    pub fn scan(&self, now: DateTime<Utc>) -> AclResult<ScanReport> {
        let mut report = ScanReport {
            scan_id: Uuid::new_v4(),
            applied: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
        };
        let scan_id = report.scan_id.to_string();
        let now_str = now.to_rfc3339();
        log_event_with_fields(
            Event::ScanBegin,
            &[("now", now_str.as_str()), ("scan", scan_id.as_str())],
        );

        let due = self
            .service
            .get_transitions(&TransitionQuery::new().with_done(false).before(now))?;
        let policy = *self.service.retry_policy();

        for t in due.episode_transitions {
            if !policy.is_eligible(&t.retry, now) {
                report.skipped.push(t.transition_id);
                continue;
            }
            match self.service.apply_episode_acl_transition(t.transition_id) {
                Ok(true) => report.applied.push(t.transition_id),
                Ok(false) | Err(_) => report.failed.push(t.transition_id),
            }
        }

        for t in due.series_transitions {
            if !policy.is_eligible(&t.retry, now) {
                report.skipped.push(t.transition_id);
                continue;
            }
            match self.service.apply_series_acl_transition(t.transition_id) {
                Ok(true) => report.applied.push(t.transition_id),
                Ok(false) | Err(_) => report.failed.push(t.transition_id),
            }
        }

        log_event_with_fields(
            Event::ScanComplete,
            &[
                ("applied", report.applied.len().to_string().as_str()),
                ("failed", report.failed.len().to_string().as_str()),
                ("scan", scan_id.as_str()),
                ("skipped", report.skipped.len().to_string().as_str()),
            ],
        );
        Ok(report)
    }

    /// Scan every interval on the blocking pool until `shutdown` fires or
    /// its sender is dropped.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let scanner = Arc::clone(&self);
                    let pass = tokio::task::spawn_blocking(move || scanner.scan(Utc::now())).await;
                    match pass {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => log_event_at(
                            Severity::Error,
                            Event::ScanComplete,
                            &[("error", e.to_string().as_str())],
                        ),
                        Err(e) => log_event_at(
                            Severity::Error,
                            Event::ScanComplete,
                            &[("error", e.to_string().as_str()), ("stage", "join")],
                        ),
                    }
                }

                _ = shutdown.recv() => {
                    break;
                }
            }
        }
    }
}
