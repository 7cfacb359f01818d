use super::outcome::AuditEntry;
use super::registration::Registration;
use super::transit::Transit;
use super::vehicle::VehicleRecord;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[async_trait]
pub trait VehicleLookup: Send + Sync {
    /// `Ok(None)` means the registry does not know the plate.
    async fn find_by_plate(&self, plate: &str) -> Result<Option<VehicleRecord>>;

    /// Registration status that never fails: lookup errors resolve to
    /// unregistered so the caller issues a fine.
    async fn registration(&self, plate: &str) -> Registration {
        match self.find_by_plate(plate).await {
            Ok(record) => Registration::from_lookup(record.as_ref()),
            Err(e) => {
                tracing::warn!(
                    plate,
                    error = %e,
                    "Registry lookup failed, treating vehicle as unregistered"
                );
                Registration::fail_closed(e)
            }
        }
    }

    async fn is_registered(&self, plate: &str) -> bool {
        self.registration(plate).await.is_registered()
    }
}

#[async_trait]
pub trait OutcomeActions: Send + Sync {
    /// `Ok(false)` when the remote side refused the request.
    async fn create_payment(&self, plate: &str, vehicle_type: Option<&str>) -> Result<bool>;
    async fn create_fine(&self, plate: &str, vehicle_type: Option<&str>) -> Result<bool>;
}

#[async_trait]
pub trait TransitFeed: Send + Sync {
    async fn fetch_latest(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Transit>>;
}

/// Best-effort audit trail. Implementations log their own failures; there is
/// nothing for the caller to handle.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry);
}

#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publishes a persistent message to the named queue.
    async fn publish(&self, destination: &str, payload: &[u8]) -> Result<()>;
}

pub type VehicleLookupRef = Arc<dyn VehicleLookup>;
pub type OutcomeActionsRef = Arc<dyn OutcomeActions>;
pub type TransitFeedRef = Arc<dyn TransitFeed>;
pub type AuditSinkRef = Arc<dyn AuditSink>;
pub type MessagePublisherRef = Arc<dyn MessagePublisher>;
