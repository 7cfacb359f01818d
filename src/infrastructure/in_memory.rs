use crate::domain::outcome::AuditEntry;
use crate::domain::ports::{AuditSink, MessagePublisher, OutcomeActions, TransitFeed, VehicleLookup};
use crate::domain::registration::OutcomeKind;
use crate::domain::transit::Transit;
use crate::domain::vehicle::VehicleRecord;
use crate::error::{Result, TollError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Failure an in-memory collaborator can be told to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedFailure {
    Status(u16),
    Timeout,
}

impl SimulatedFailure {
    fn into_error(self, endpoint: &str) -> TollError {
        match self {
            Self::Status(status) => TollError::UnexpectedStatus {
                endpoint: endpoint.to_string(),
                status,
            },
            Self::Timeout => TollError::Timeout(format!("{} did not answer in time", endpoint)),
        }
    }
}

#[derive(Default)]
struct RegistryState {
    vehicles: HashMap<String, VehicleRecord>,
    plate_failures: HashMap<String, SimulatedFailure>,
    global_failure: Option<SimulatedFailure>,
    lookups: usize,
}

/// A vehicle registry held in memory, keyed by plate.
#[derive(Default, Clone)]
pub struct InMemoryRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record: VehicleRecord) {
        let mut state = self.state.write().await;
        state.vehicles.insert(record.plate.clone(), record);
    }

    /// Makes every lookup for `plate` fail.
    pub async fn fail_plate(&self, plate: &str, failure: SimulatedFailure) {
        let mut state = self.state.write().await;
        state.plate_failures.insert(plate.to_string(), failure);
    }

    /// Makes every lookup fail with the given HTTP status.
    pub async fn fail_with_status(&self, status: u16) {
        self.state.write().await.global_failure = Some(SimulatedFailure::Status(status));
    }

    pub async fn lookups(&self) -> usize {
        self.state.read().await.lookups
    }
}

#[async_trait]
impl VehicleLookup for InMemoryRegistry {
    async fn find_by_plate(&self, plate: &str) -> Result<Option<VehicleRecord>> {
        let mut state = self.state.write().await;
        state.lookups += 1;

        let failure = state
            .plate_failures
            .get(plate)
            .copied()
            .or(state.global_failure);
        if let Some(failure) = failure {
            return Err(failure.into_error("/vehicles"));
        }

        Ok(state.vehicles.get(plate).cloned())
    }
}

/// How the in-memory action client answers a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionResponse {
    #[default]
    Accept,
    Reject,
    Fail(SimulatedFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCall {
    pub kind: OutcomeKind,
    pub plate: String,
    pub vehicle_type: Option<String>,
}

#[derive(Default)]
struct ActionState {
    calls: Vec<ActionCall>,
    responses: HashMap<OutcomeKind, ActionResponse>,
}

/// Records payment and fine requests instead of sending them anywhere.
#[derive(Default, Clone)]
pub struct InMemoryActions {
    state: Arc<RwLock<ActionState>>,
}

impl InMemoryActions {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn respond_with(&self, kind: OutcomeKind, response: ActionResponse) {
        self.state.write().await.responses.insert(kind, response);
    }

    pub async fn calls(&self) -> Vec<ActionCall> {
        self.state.read().await.calls.clone()
    }

    pub async fn calls_of(&self, kind: OutcomeKind) -> Vec<ActionCall> {
        self.state
            .read()
            .await
            .calls
            .iter()
            .filter(|call| call.kind == kind)
            .cloned()
            .collect()
    }

    async fn handle(
        &self,
        kind: OutcomeKind,
        plate: &str,
        vehicle_type: Option<&str>,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        state.calls.push(ActionCall {
            kind,
            plate: plate.to_string(),
            vehicle_type: vehicle_type.map(String::from),
        });

        match state.responses.get(&kind).copied().unwrap_or_default() {
            ActionResponse::Accept => Ok(true),
            ActionResponse::Reject => Ok(false),
            ActionResponse::Fail(failure) => Err(failure.into_error(match kind {
                OutcomeKind::Payment => "/payments",
                OutcomeKind::Fine => "/fines",
            })),
        }
    }
}

#[async_trait]
impl OutcomeActions for InMemoryActions {
    async fn create_payment(&self, plate: &str, vehicle_type: Option<&str>) -> Result<bool> {
        self.handle(OutcomeKind::Payment, plate, vehicle_type).await
    }

    async fn create_fine(&self, plate: &str, vehicle_type: Option<&str>) -> Result<bool> {
        self.handle(OutcomeKind::Fine, plate, vehicle_type).await
    }
}

struct FeedState {
    transits: Vec<Transit>,
    limit: usize,
    pending_failures: usize,
    fetches: usize,
}

/// A transit feed that serves the newest transits it has been given,
/// newest first, the way the remote `/transits` endpoint does.
#[derive(Clone)]
pub struct InMemoryTransitFeed {
    state: Arc<RwLock<FeedState>>,
}

impl Default for InMemoryTransitFeed {
    fn default() -> Self {
        Self::with_limit(1)
    }
}

impl InMemoryTransitFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(FeedState {
                transits: Vec::new(),
                limit: limit.max(1),
                pending_failures: 0,
                fetches: 0,
            })),
        }
    }

    /// Appends a transit; the last one pushed is the newest.
    pub async fn push(&self, transit: Transit) {
        self.state.write().await.transits.push(transit);
    }

    /// The next `count` fetches fail with a timeout.
    pub async fn fail_next(&self, count: usize) {
        self.state.write().await.pending_failures = count;
    }

    pub async fn fetches(&self) -> usize {
        self.state.read().await.fetches
    }
}

#[async_trait]
impl TransitFeed for InMemoryTransitFeed {
    async fn fetch_latest(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Transit>> {
        let mut state = self.state.write().await;
        state.fetches += 1;

        if state.pending_failures > 0 {
            state.pending_failures -= 1;
            return Err(SimulatedFailure::Timeout.into_error("/transits"));
        }

        Ok(state
            .transits
            .iter()
            .rev()
            .filter(|t| match (since, t.occurred_at) {
                (Some(since), Some(at)) => at > since,
                _ => true,
            })
            .take(state.limit)
            .cloned()
            .collect())
    }
}

/// Keeps audit entries in memory.
#[derive(Default, Clone)]
pub struct InMemoryAuditSink {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, entry: AuditEntry) {
        self.entries.write().await.push(entry);
    }
}

/// Captures published messages as `(queue, json)` pairs.
#[derive(Default, Clone)]
pub struct InMemoryPublisher {
    published: Arc<RwLock<Vec<(String, serde_json::Value)>>>,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn published(&self) -> Vec<(String, serde_json::Value)> {
        self.published.read().await.clone()
    }
}

#[async_trait]
impl MessagePublisher for InMemoryPublisher {
    async fn publish(&self, destination: &str, payload: &[u8]) -> Result<()> {
        let body = serde_json::from_slice(payload)?;
        self.published
            .write()
            .await
            .push((destination.to_string(), body));
        Ok(())
    }
}
