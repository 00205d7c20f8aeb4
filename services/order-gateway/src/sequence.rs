//! Per-partner monotonic sequence generator (C3).
//!
//! The in-memory counter is always authoritative for `next()`; the
//! on-disk snapshot is debounced so a burst of submissions collapses
//! into a single write. A `flush` call on shutdown guarantees the
//! last value is durable.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use feed_common::PartnerId;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::Notify;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::GatewayResult;
use crate::error_repository::ErrorRepository;
use crate::order::{ErrorCode, ErrorEvent};

const DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Default)]
struct Counters {
    values: HashMap<PartnerId, u64>,
}

/// Issues strictly increasing sequence numbers per partner.
pub struct SequenceGenerator {
    counters: Arc<Mutex<Counters>>,
    persist_path: Option<PathBuf>,
    dirty: Arc<Notify>,
    errors: Option<Arc<ErrorRepository>>,
}

impl SequenceGenerator {
    /// Creates an in-memory-only generator (no durability). Used in
    /// test mode.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            counters: Arc::new(Mutex::new(Counters::default())),
            persist_path: None,
            dirty: Arc::new(Notify::new()),
            errors: None,
        }
    }

    /// Creates a generator backed by a debounced JSON snapshot at
    /// `path`, loading any existing state first. A write failure in
    /// the background debounced writer is recorded in `errors` as an
    /// `InternalError` event in addition to being logged.
    #[must_use]
    pub fn with_persistence(path: PathBuf, errors: Arc<ErrorRepository>) -> Self {
        let mut counters = Counters::default();
        if let Ok(bytes) = std::fs::read(&path) {
            match serde_json::from_slice::<HashMap<PartnerId, u64>>(&bytes) {
                Ok(loaded) => counters.values = loaded,
                Err(e) => warn!(error = %e, "failed to parse sequences snapshot, starting from zero"),
            }
        }

        let generator = Self {
            counters: Arc::new(Mutex::new(counters)),
            persist_path: Some(path),
            dirty: Arc::new(Notify::new()),
            errors: Some(errors),
        };
        generator.spawn_debounced_writer();
        generator
    }

    fn spawn_debounced_writer(&self) {
        let Some(path) = self.persist_path.clone() else { return };
        let counters = Arc::clone(&self.counters);
        let dirty = Arc::clone(&self.dirty);
        let errors = self.errors.clone();

        tokio::spawn(async move {
            loop {
                dirty.notified().await;
                tokio::time::sleep(DEBOUNCE).await;
                let snapshot = counters.lock().values.clone();
                if let Err(e) = write_snapshot(&path, &snapshot) {
                    error!(error = %e, "failed to persist sequence snapshot");
                    if let Some(errors) = &errors {
                        // The snapshot covers every partner's counter, so
                        // there is no single partner to attribute this to.
                        errors.save(ErrorEvent {
                            id: Uuid::new_v4(),
                            partner_id: PartnerId::PartnerA,
                            external_order_id: None,
                            error_code: ErrorCode::InternalError,
                            message: format!("failed to persist sequence snapshot: {e}"),
                            details: Vec::new(),
                            original_payload: json!({ "path": path.display().to_string() }),
                            timestamp: Utc::now(),
                        });
                    }
                }
            }
        });
    }

    /// Returns the next sequence number for `partner`, mutating and
    /// durably scheduling persistence of the new value.
    pub fn next(&self, partner: PartnerId) -> u64 {
        let value = {
            let mut counters = self.counters.lock();
            let entry = counters.values.entry(partner).or_insert(0);
            *entry += 1;
            *entry
        };
        debug!(partner = %partner, sequence = value, "issued sequence number");
        self.dirty.notify_one();
        value
    }

    /// Current value without mutation.
    #[must_use]
    pub fn current(&self, partner: PartnerId) -> u64 {
        self.counters.lock().values.get(&partner).copied().unwrap_or(0)
    }

    /// Resets a single partner's counter. Test-only.
    pub fn reset(&self, partner: PartnerId) {
        self.counters.lock().values.insert(partner, 0);
        self.dirty.notify_one();
    }

    /// Resets every partner's counter. Test-only.
    pub fn reset_all(&self) {
        self.counters.lock().values.clear();
        self.dirty.notify_one();
    }

    /// Synchronously flushes the current state to disk, bypassing the
    /// debounce. Intended for graceful shutdown.
    pub fn flush(&self) -> GatewayResult<()> {
        let Some(path) = &self.persist_path else { return Ok(()) };
        let snapshot = self.counters.lock().values.clone();
        write_snapshot(path, &snapshot)?;
        Ok(())
    }
}

fn write_snapshot(path: &PathBuf, snapshot: &HashMap<PartnerId, u64>) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(snapshot)?;
    std::fs::write(path, bytes)
}
