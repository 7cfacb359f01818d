use super::vehicle::VehicleRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which downstream action a vehicle sighting results in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Payment,
    Fine,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Payment => f.write_str("payment"),
            Self::Fine => f.write_str("fine"),
        }
    }
}

/// Why a plate ended up on the fine branch. Only used for diagnostics;
/// every reason leads to the same outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnregisteredReason {
    NotFound,
    NoCustomer,
    LookupFailed(String),
}

impl fmt::Display for UnregisteredReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("vehicle not found in registry"),
            Self::NoCustomer => f.write_str("vehicle has no associated customer"),
            Self::LookupFailed(e) => write!(f, "registry lookup failed: {}", e),
        }
    }
}

/// Result of the registered-vs-unregistered decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Registered { customer_id: String },
    Unregistered(UnregisteredReason),
}

impl Registration {
    /// A vehicle is registered iff a record exists and it carries a
    /// non-empty customer id.
    pub fn from_lookup(record: Option<&VehicleRecord>) -> Self {
        match record {
            None => Self::Unregistered(UnregisteredReason::NotFound),
            Some(record) => match record.customer() {
                Some(customer_id) => Self::Registered {
                    customer_id: customer_id.to_string(),
                },
                None => Self::Unregistered(UnregisteredReason::NoCustomer),
            },
        }
    }

    /// Uncertainty resolves to the fine branch.
    pub fn fail_closed(error: impl fmt::Display) -> Self {
        Self::Unregistered(UnregisteredReason::LookupFailed(error.to_string()))
    }

    pub fn is_registered(&self) -> bool {
        matches!(self, Self::Registered { .. })
    }

    pub fn outcome_kind(&self) -> OutcomeKind {
        if self.is_registered() {
            OutcomeKind::Payment
        } else {
            OutcomeKind::Fine
        }
    }
}
