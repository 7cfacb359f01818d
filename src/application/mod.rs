//! Application layer: the event router and the polling reconciler.
//!
//! Both entry points share the registration predicate from the domain layer.
//! `EventRouter` handles one queued vehicle event at a time and republishes
//! it; `PollingReconciler` owns its watermark and drives the payment and fine
//! endpoints directly.

pub mod dedup;
pub mod reconciler;
pub mod router;
