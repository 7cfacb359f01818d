use super::dedup::{DedupPolicy, Watermark, processing_order};
use crate::domain::outcome::AuditEntry;
use crate::domain::ports::{AuditSinkRef, OutcomeActionsRef, TransitFeedRef, VehicleLookupRef};
use crate::domain::registration::{OutcomeKind, Registration};
use crate::domain::transit::Transit;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Where the reconciler currently is within a poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Fetching,
    Deciding,
    Acting,
    Logging,
}

/// Collaborators the reconciler drives.
pub struct ReconcilerDeps {
    pub feed: TransitFeedRef,
    pub lookup: VehicleLookupRef,
    pub actions: OutcomeActionsRef,
    pub audit: AuditSinkRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedTransit {
    pub transit_id: String,
    pub plate: String,
    pub kind: OutcomeKind,
    pub success: bool,
}

/// Summary of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub skipped: usize,
    pub processed: Vec<ProcessedTransit>,
}

/// Periodically pulls the latest transits and issues a payment or a fine for
/// each one it has not handled yet.
///
/// Every failure inside a cycle is logged and absorbed: a failed fetch is an
/// empty cycle, a failed registration check means "unregistered", a failed
/// action is recorded as unsuccessful and the audit sink cannot fail at all.
pub struct PollingReconciler {
    deps: ReconcilerDeps,
    interval: Duration,
    watermark: Watermark,
    phase: Phase,
}

impl PollingReconciler {
    pub fn new(deps: ReconcilerDeps, policy: DedupPolicy, interval: Duration) -> Self {
        Self {
            deps,
            interval,
            watermark: Watermark::new(policy),
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn watermark(&self) -> &Watermark {
        &self.watermark
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs cycles until `shutdown` flips to `true` or its sender is dropped.
    /// The inter-cycle sleep is cut short by a shutdown; in-flight calls are not.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            policy = %self.watermark.policy(),
            "Polling reconciler started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.run_cycle().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Polling reconciler stopped");
    }

    /// One fetch → filter → decide → act → log pass.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        self.phase = Phase::Fetching;
        let fetched = match self.deps.feed.fetch_latest(self.watermark.since()).await {
            Ok(transits) => transits,
            Err(e) => {
                error!(error = %e, "Failed to fetch transits");
                Vec::new()
            }
        };
        report.fetched = fetched.len();
        let batch_ids: Vec<String> = fetched.iter().map(|t| t.id.clone()).collect();

        let (fresh, seen) = self.watermark.split_fresh(fetched);
        report.skipped = seen.len();

        for transit in &seen {
            debug!(transit_id = %transit.id, plate = %transit.plate, "Transit already processed");
        }

        if fresh.is_empty() {
            if report.fetched == 0 {
                info!("No transits available");
            }
            self.phase = Phase::Idle;
            return report;
        }

        let mut ordered = fresh.clone();
        processing_order(&mut ordered);
        for transit in &ordered {
            info!(transit_id = %transit.id, plate = %transit.plate, "Processing new transit");
            let processed = self.process(transit).await;
            report.processed.push(processed);
        }

        self.watermark.advance(&fresh, batch_ids, Utc::now());
        self.phase = Phase::Idle;
        report
    }

    async fn process(&mut self, transit: &Transit) -> ProcessedTransit {
        let plate = transit.plate.as_str();
        let vehicle_type = transit.vehicle_type.as_str();

        self.phase = Phase::Deciding;
        let registration = self.deps.lookup.registration(plate).await;
        let kind = registration.outcome_kind();
        match &registration {
            Registration::Registered { .. } => {
                info!(plate, "Vehicle registered, creating payment")
            }
            Registration::Unregistered(reason) => {
                info!(plate, %reason, "Vehicle not registered, creating fine")
            }
        }

        self.phase = Phase::Acting;
        let result = match kind {
            OutcomeKind::Payment => {
                self.deps
                    .actions
                    .create_payment(plate, Some(vehicle_type))
                    .await
            }
            OutcomeKind::Fine => self.deps.actions.create_fine(plate, Some(vehicle_type)).await,
        };

        let (success, detail) = match result {
            Ok(true) => (true, created_detail(kind, vehicle_type)),
            Ok(false) => {
                warn!(plate, %kind, "Remote side refused the request");
                (false, format!("failed to create {}", kind))
            }
            Err(e) => {
                error!(plate, %kind, error = %e, "Action request failed");
                (false, format!("error: {}", e))
            }
        };

        self.phase = Phase::Logging;
        self.deps
            .audit
            .record(AuditEntry::new(plate, kind, success, detail))
            .await;

        ProcessedTransit {
            transit_id: transit.id.clone(),
            plate: plate.to_string(),
            kind,
            success,
        }
    }
}

fn created_detail(kind: OutcomeKind, vehicle_type: &str) -> String {
    match kind {
        OutcomeKind::Payment => format!(
            "payment created for registered vehicle of type {}",
            vehicle_type
        ),
        OutcomeKind::Fine => format!(
            "fine created for unregistered vehicle of type {}",
            vehicle_type
        ),
    }
}
