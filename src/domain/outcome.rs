use super::registration::OutcomeKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tag written into every audit entry produced by this service.
pub const AUDIT_ORIGIN: &str = "tollgate";

/// Message published to the payments queue for a registered vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub plate: String,
    #[serde(rename = "vehicleType")]
    pub vehicle_type: String,
}

/// Message published to the fines queue for an unregistered vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FineIntent {
    pub plate: String,
}

/// What the event router decided and published for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutedMessage {
    Payment(PaymentIntent),
    Fine(FineIntent),
}

impl RoutedMessage {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Payment(_) => OutcomeKind::Payment,
            Self::Fine(_) => OutcomeKind::Fine,
        }
    }

    pub fn plate(&self) -> &str {
        match self {
            Self::Payment(intent) => &intent.plate,
            Self::Fine(intent) => &intent.plate,
        }
    }

    /// JSON body as published on the wire.
    pub fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
        match self {
            Self::Payment(intent) => serde_json::to_vec(intent),
            Self::Fine(intent) => serde_json::to_vec(intent),
        }
    }
}

/// One line of the local audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub plate: String,
    /// Operator that triggered the action; automated cycles leave it empty.
    pub user: Option<String>,
    pub kind: OutcomeKind,
    pub success: bool,
    pub detail: String,
    pub recorded_at: DateTime<Utc>,
    pub origin: String,
}

impl AuditEntry {
    pub fn new(
        plate: impl Into<String>,
        kind: OutcomeKind,
        success: bool,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            plate: plate.into(),
            user: None,
            kind,
            success,
            detail: detail.into(),
            recorded_at: Utc::now(),
            origin: AUDIT_ORIGIN.to_string(),
        }
    }

    /// Whether the vehicle passed validation, i.e. a payment was actually created.
    pub fn is_valid(&self) -> bool {
        self.kind == OutcomeKind::Payment && self.success
    }
}
