use crate::domain::outcome::{FineIntent, PaymentIntent, RoutedMessage};
use crate::domain::ports::{MessagePublisherRef, VehicleLookupRef};
use crate::domain::registration::{Registration, UnregisteredReason};
use crate::domain::vehicle::VehicleEvent;
use crate::error::Result;
use tracing::{info, warn};

/// Queue names the router publishes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteQueues {
    pub payments: String,
    pub fines: String,
}

/// Routes inbound vehicle events to the payments or fines queue.
///
/// Each call to [`EventRouter::route`] looks the plate up once and publishes
/// exactly one message. Lookup and publish errors are returned untouched so
/// the transport layer can decide whether to requeue or drop the delivery.
pub struct EventRouter {
    lookup: VehicleLookupRef,
    publisher: MessagePublisherRef,
    queues: RouteQueues,
}

impl EventRouter {
    pub fn new(
        lookup: VehicleLookupRef,
        publisher: MessagePublisherRef,
        queues: RouteQueues,
    ) -> Self {
        Self {
            lookup,
            publisher,
            queues,
        }
    }

    pub async fn route(&self, event: &VehicleEvent) -> Result<RoutedMessage> {
        info!(plate = %event.plate, vehicle_type = %event.vehicle_type, "Vehicle event received");

        let record = self.lookup.find_by_plate(&event.plate).await?;
        let registration = Registration::from_lookup(record.as_ref());

        let (message, destination) = match registration {
            Registration::Registered { customer_id } => {
                info!(plate = %event.plate, customer_id = %customer_id, "Vehicle registered");
                let intent = PaymentIntent {
                    plate: event.plate.clone(),
                    vehicle_type: event.vehicle_type.clone(),
                };
                (RoutedMessage::Payment(intent), &self.queues.payments)
            }
            Registration::Unregistered(reason) => {
                match reason {
                    UnregisteredReason::NotFound => {
                        warn!(plate = %event.plate, "Vehicle not found in registry")
                    }
                    _ => warn!(plate = %event.plate, %reason, "Vehicle not registered"),
                }
                let intent = FineIntent {
                    plate: event.plate.clone(),
                };
                (RoutedMessage::Fine(intent), &self.queues.fines)
            }
        };

        self.publisher
            .publish(destination, &message.to_payload()?)
            .await?;
        info!(
            plate = %event.plate,
            queue = %destination,
            kind = %message.kind(),
            "Message published"
        );

        Ok(message)
    }
}
