use crate::domain::ports::{OutcomeActions, TransitFeed, VehicleLookup};
use crate::domain::transit::{Transit, parse_occurred_at};
use crate::domain::vehicle::VehicleRecord;
use crate::error::{Result, TollError};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

const VEHICLES_PATH: &str = "/vehicles";
const TRANSITS_PATH: &str = "/transits";
const PAYMENTS_PATH: &str = "/payments";
const FINES_PATH: &str = "/fines";

/// Currency of the placeholder amounts; the billing side fills in real amounts later.
const CURRENCY: &str = "ARS";

/// Paged list envelope used by every collection endpoint.
#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Option<Vec<T>>,
}

#[derive(Debug, Deserialize)]
struct VehicleDto {
    vehicle_id: Option<String>,
    plate: Option<String>,
    customer_id: Option<String>,
    make: Option<String>,
    model: Option<String>,
    year: Option<i32>,
}

impl From<VehicleDto> for VehicleRecord {
    fn from(dto: VehicleDto) -> Self {
        Self {
            vehicle_id: dto.vehicle_id.unwrap_or_default(),
            plate: dto.plate.unwrap_or_default(),
            customer_id: dto.customer_id,
            make: dto.make,
            model: dto.model,
            year: dto.year,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TransitDto {
    transit_id: Option<String>,
    vehicle_plate: Option<String>,
    vehicle_type: Option<String>,
    occurred_at: Option<String>,
    gate_id: Option<String>,
    speed_kmh: Option<f64>,
    capture_ref: Option<String>,
}

impl TransitDto {
    /// Transits without an id cannot be deduplicated and are dropped.
    fn into_transit(self) -> Option<Transit> {
        let id = self.transit_id.filter(|id| !id.trim().is_empty())?;
        let occurred_at = self.occurred_at.as_deref().and_then(|raw| {
            let parsed = parse_occurred_at(raw);
            if parsed.is_none() {
                debug!(transit_id = %id, raw, "Unreadable occurred_at, treating as absent");
            }
            parsed
        });

        Some(Transit {
            id,
            plate: self.vehicle_plate.unwrap_or_else(|| "UNKNOWN".to_string()),
            vehicle_type: self.vehicle_type.unwrap_or_else(|| "unknown".to_string()),
            occurred_at,
            gate_id: self.gate_id,
            speed_kmh: self.speed_kmh,
            capture_ref: self.capture_ref,
        })
    }
}

#[derive(Debug, Serialize)]
struct PaymentRequest<'a> {
    plate: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    currency: &'a str,
    status: &'a str,
    method: &'a str,
    requested_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct FineRequest<'a> {
    plate: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    currency: &'a str,
    reason: String,
    status: &'a str,
    issued_at: DateTime<Utc>,
}

fn fine_reason(vehicle_type: Option<&str>) -> String {
    match vehicle_type {
        Some(vehicle_type) => format!(
            "Unregistered vehicle - transit without authorization (type: {})",
            vehicle_type
        ),
        None => "Unregistered vehicle - transit without authorization".to_string(),
    }
}

fn transport(e: reqwest::Error) -> TollError {
    if e.is_timeout() {
        TollError::Timeout(e.to_string())
    } else {
        TollError::Transport(e)
    }
}

/// Client for the toll registry REST API: vehicles, transits, payments and fines.
///
/// The base URL carries the API prefix, e.g. `http://localhost:3001/api`.
#[derive(Clone)]
pub struct RegistryApiClient {
    client: Client,
    base_url: String,
    batch_limit: usize,
}

impl RegistryApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration, batch_limit: usize) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            batch_limit: batch_limit.max(1),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GETs a list endpoint. `Ok(None)` on 404.
    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<Vec<T>>> {
        let response = self
            .client
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(TollError::UnexpectedStatus {
                endpoint: path.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(transport)?;
        let list: ListResponse<T> = serde_json::from_str(&body)?;
        Ok(Some(list.data.unwrap_or_default()))
    }

    async fn post_action<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<bool> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }

        let error_body = response.text().await.unwrap_or_default();
        warn!(endpoint = path, status = status.as_u16(), body = %error_body, "Request rejected");
        Ok(false)
    }
}

#[async_trait]
impl VehicleLookup for RegistryApiClient {
    async fn find_by_plate(&self, plate: &str) -> Result<Option<VehicleRecord>> {
        debug!(plate, "Looking up vehicle");
        let vehicles = self
            .get_list::<VehicleDto>(VEHICLES_PATH, &[("plate", plate.to_string())])
            .await?;

        Ok(vehicles
            .and_then(|vehicles| vehicles.into_iter().next())
            .map(VehicleRecord::from))
    }
}

#[async_trait]
impl TransitFeed for RegistryApiClient {
    async fn fetch_latest(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Transit>> {
        let mut query = vec![
            ("order_by", "occurred_at".to_string()),
            ("order_dir", "desc".to_string()),
            ("limit", self.batch_limit.to_string()),
        ];
        if let Some(since) = since {
            query.push(("since", since.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }

        let transits: Vec<Transit> = self
            .get_list::<TransitDto>(TRANSITS_PATH, &query)
            .await?
            .unwrap_or_default()
            .into_iter()
            .filter_map(|dto| {
                let transit = dto.into_transit();
                if transit.is_none() {
                    warn!("Dropping transit without transit_id");
                }
                transit
            })
            .collect();

        if let Some(latest) = transits.first() {
            info!(
                count = transits.len(),
                plate = %latest.plate,
                occurred_at = ?latest.occurred_at,
                "Latest transits fetched"
            );
        }
        Ok(transits)
    }
}

#[async_trait]
impl OutcomeActions for RegistryApiClient {
    async fn create_payment(&self, plate: &str, vehicle_type: Option<&str>) -> Result<bool> {
        info!(plate, vehicle_type = vehicle_type.unwrap_or("N/A"), "Creating payment");
        let request = PaymentRequest {
            plate,
            amount: Decimal::ZERO,
            currency: CURRENCY,
            status: "pending",
            method: "automatic",
            requested_at: Utc::now(),
        };
        let created = self.post_action(PAYMENTS_PATH, &request).await?;
        if created {
            info!(plate, "Payment created");
        }
        Ok(created)
    }

    async fn create_fine(&self, plate: &str, vehicle_type: Option<&str>) -> Result<bool> {
        info!(plate, vehicle_type = vehicle_type.unwrap_or("N/A"), "Creating fine");
        let request = FineRequest {
            plate,
            amount: Decimal::ZERO,
            currency: CURRENCY,
            reason: fine_reason(vehicle_type),
            status: "pending",
            issued_at: Utc::now(),
        };
        let created = self.post_action(FINES_PATH, &request).await?;
        if created {
            info!(plate, "Fine created");
        }
        Ok(created)
    }
}
