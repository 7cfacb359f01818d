use crate::application::router::EventRouter;
use crate::domain::vehicle::VehicleEvent;
use crate::error::Result;
use futures::StreamExt;
use lapin::Consumer;
use lapin::options::{BasicAckOptions, BasicNackOptions};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// What to tell the broker about a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    /// Negative acknowledgement without requeue; the broker drops the
    /// message or dead-letters it if the queue is configured to.
    Reject,
}

/// Decodes one delivery body and routes it.
///
/// Malformed payloads and routing failures are both rejected: a retry would
/// hit the same decode error, and routing is retried by the gate re-sending.
pub async fn handle_payload(router: &EventRouter, payload: &[u8]) -> Disposition {
    let event: VehicleEvent = match serde_json::from_slice(payload) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Discarding malformed vehicle event");
            return Disposition::Reject;
        }
    };

    match router.route(&event).await {
        Ok(_) => Disposition::Ack,
        Err(e) => {
            error!(plate = %event.plate, error = %e, "Failed to route vehicle event");
            Disposition::Reject
        }
    }
}

/// Consumes deliveries one at a time until the stream ends or `shutdown`
/// flips to `true`. A delivery being handled when shutdown arrives is
/// finished and acknowledged first.
pub async fn run_consumer(
    mut consumer: Consumer,
    router: EventRouter,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    info!("Waiting for vehicle events");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let delivery = tokio::select! {
            next = consumer.next() => match next {
                Some(delivery) => delivery?,
                None => {
                    warn!("Consumer stream closed by broker");
                    break;
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        };

        match handle_payload(&router, &delivery.data).await {
            Disposition::Ack => delivery.acker.ack(BasicAckOptions::default()).await?,
            Disposition::Reject => {
                delivery
                    .acker
                    .nack(BasicNackOptions {
                        requeue: false,
                        ..BasicNackOptions::default()
                    })
                    .await?
            }
        }
    }

    info!("Consumer stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::router::RouteQueues;
    use crate::domain::vehicle::VehicleRecord;
    use crate::infrastructure::in_memory::{InMemoryPublisher, InMemoryRegistry};
    use serde_json::json;
    use std::sync::Arc;

    async fn setup() -> (EventRouter, InMemoryRegistry, InMemoryPublisher) {
        let registry = InMemoryRegistry::new();
        registry
            .insert(VehicleRecord {
                vehicle_id: "v1".into(),
                plate: "ABC123".into(),
                customer_id: Some("c1".into()),
                ..Default::default()
            })
            .await;
        let publisher = InMemoryPublisher::new();
        let router = EventRouter::new(
            Arc::new(registry.clone()),
            Arc::new(publisher.clone()),
            RouteQueues {
                payments: "toll.payments".into(),
                fines: "toll.fines".into(),
            },
        );
        (router, registry, publisher)
    }

    #[tokio::test]
    async fn test_legacy_payload_is_routed_and_acked() {
        let (router, _, publisher) = setup().await;

        let disposition =
            handle_payload(&router, br#"{"patente":"ABC123","tipoVehiculo":"car"}"#).await;

        assert_eq!(disposition, Disposition::Ack);
        assert_eq!(
            publisher.published().await,
            vec![(
                "toll.payments".to_string(),
                json!({"plate": "ABC123", "vehicleType": "car"})
            )]
        );
    }

    #[tokio::test]
    async fn test_malformed_payload_is_rejected_without_lookup() {
        let (router, registry, publisher) = setup().await;

        let disposition = handle_payload(&router, b"{\"plate\": 42").await;

        assert_eq!(disposition, Disposition::Reject);
        assert_eq!(registry.lookups().await, 0);
        assert!(publisher.published().await.is_empty());
    }

    #[tokio::test]
    async fn test_routing_error_is_rejected() {
        let (router, registry, publisher) = setup().await;
        registry.fail_with_status(500).await;

        let disposition =
            handle_payload(&router, br#"{"plate":"ABC123","vehicleType":"car"}"#).await;

        assert_eq!(disposition, Disposition::Reject);
        assert!(publisher.published().await.is_empty());
    }
}
