pub mod amqp;
pub mod http;
pub mod in_memory;
pub mod log_audit;
#[cfg(feature = "audit-rocksdb")]
pub mod rocksdb;
