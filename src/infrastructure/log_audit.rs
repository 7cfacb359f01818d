use crate::domain::outcome::AuditEntry;
use crate::domain::ports::AuditSink;
use async_trait::async_trait;
use tracing::info;

/// Audit sink that emits each entry as a structured log event under the
/// `tollgate::audit` target. Used when no audit database is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAuditSink;

impl LogAuditSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn record(&self, entry: AuditEntry) {
        info!(
            target: "tollgate::audit",
            plate = %entry.plate,
            user = ?entry.user,
            kind = %entry.kind,
            success = entry.success,
            valid = entry.is_valid(),
            origin = %entry.origin,
            "{}",
            entry.detail
        );
    }
}
