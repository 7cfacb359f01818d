use crate::domain::outcome::AuditEntry;
use crate::domain::ports::AuditSink;
use crate::error::{Result, TollError};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error};

/// Column Family holding audit entries.
pub const CF_AUDIT: &str = "audit";

fn storage_error(e: impl std::fmt::Display) -> TollError {
    TollError::Audit(e.to_string())
}

/// A persistent audit trail backed by RocksDB.
///
/// Keys are the big-endian recording time in nanoseconds followed by a
/// per-process sequence number, so iteration yields entries in the order
/// they were written. Values are JSON.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbAuditSink {
    db: Arc<DB>,
    sequence: Arc<AtomicU64>,
}

impl RocksDbAuditSink {
    /// Opens or creates a RocksDB instance at the specified path, creating the
    /// "audit" column family when missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_audit = ColumnFamilyDescriptor::new(CF_AUDIT, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_audit]).map_err(storage_error)?;

        Ok(Self {
            db: Arc::new(db),
            sequence: Arc::new(AtomicU64::new(0)),
        })
    }

    fn cf(&self) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(CF_AUDIT)
            .ok_or_else(|| TollError::Audit("audit column family not found".to_string()))
    }

    fn key(&self, entry: &AuditEntry) -> [u8; 16] {
        let nanos = entry.recorded_at.timestamp_nanos_opt().unwrap_or_default().max(0) as u64;
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);

        let mut key = [0u8; 16];
        key[..8].copy_from_slice(&nanos.to_be_bytes());
        key[8..].copy_from_slice(&sequence.to_be_bytes());
        key
    }

    fn try_record(&self, entry: &AuditEntry) -> Result<()> {
        let cf = self.cf()?;
        let value = serde_json::to_vec(entry)?;
        self.db
            .put_cf(cf, self.key(entry), value)
            .map_err(storage_error)
    }

    /// All stored entries, oldest first.
    pub fn entries(&self) -> Result<Vec<AuditEntry>> {
        let cf = self.cf()?;
        let mut entries = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item.map_err(storage_error)?;
            entries.push(serde_json::from_slice(&value)?);
        }
        Ok(entries)
    }
}

#[async_trait]
impl AuditSink for RocksDbAuditSink {
    async fn record(&self, entry: AuditEntry) {
        match self.try_record(&entry) {
            Ok(()) => debug!(plate = %entry.plate, valid = entry.is_valid(), "Audit entry stored"),
            Err(e) => error!(plate = %entry.plate, error = %e, "Failed to store audit entry"),
        }
    }
}
