use serde::{Deserialize, Serialize};

/// An inbound request to route a single vehicle sighting.
///
/// Accepts both the current field names and the legacy `patente` /
/// `tipoVehiculo` names still emitted by older gate controllers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleEvent {
    #[serde(alias = "patente")]
    pub plate: String,
    #[serde(rename = "vehicleType", alias = "tipoVehiculo", default)]
    pub vehicle_type: String,
}

impl VehicleEvent {
    pub fn new(plate: impl Into<String>, vehicle_type: impl Into<String>) -> Self {
        Self {
            plate: plate.into(),
            vehicle_type: vehicle_type.into(),
        }
    }
}

/// A vehicle as known by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VehicleRecord {
    #[serde(default)]
    pub vehicle_id: String,
    #[serde(default)]
    pub plate: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
}

impl VehicleRecord {
    /// The owning customer, if the record carries a non-empty id.
    /// Whitespace is kept as is: only an absent or empty id means no customer.
    pub fn customer(&self) -> Option<&str> {
        self.customer_id.as_deref().filter(|id| !id.is_empty())
    }
}
