//! Rejected-payload repository (C6): storage, filtering, pagination,
//! and aggregate statistics over `ErrorEvent`s.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use feed_common::PartnerId;
use parking_lot::RwLock;
use tokio::sync::Notify;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::GatewayResult;
use crate::order::{ErrorCode, ErrorEvent};
use crate::repository::{Page, Pagination};

const DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Default)]
pub struct ErrorFilters {
    pub partner_id: Option<PartnerId>,
    pub error_code: Option<ErrorCode>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

impl ErrorFilters {
    fn matches(&self, event: &ErrorEvent) -> bool {
        if let Some(partner) = self.partner_id {
            if event.partner_id != partner {
                return false;
            }
        }
        if let Some(code) = self.error_code {
            if event.error_code != code {
                return false;
            }
        }
        if let Some(from) = self.from_date {
            if event.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to_date {
            if event.timestamp > to {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorStatistics {
    pub total_errors: usize,
    pub errors_last_24h: usize,
    pub errors_by_partner: HashMap<PartnerId, usize>,
    pub errors_by_code: HashMap<ErrorCode, usize>,
}

/// Rejected payloads in memory, snapshotted to a debounced JSON file
/// when a persistence path is configured. Mirrors `OrderRepository`'s
/// storage pattern.
pub struct ErrorRepository {
    events: Arc<RwLock<Vec<ErrorEvent>>>,
    persist_path: Option<PathBuf>,
    dirty: Arc<Notify>,
}

impl ErrorRepository {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            persist_path: None,
            dirty: Arc::new(Notify::new()),
        }
    }

    #[must_use]
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut events = Vec::new();
        if let Ok(bytes) = std::fs::read(&path) {
            match serde_json::from_slice::<Vec<ErrorEvent>>(&bytes) {
                Ok(loaded) => events = loaded,
                Err(e) => warn!(error = %e, "failed to parse errors snapshot, starting empty"),
            }
        }

        let repository = Self {
            events: Arc::new(RwLock::new(events)),
            persist_path: Some(path),
            dirty: Arc::new(Notify::new()),
        };
        repository.spawn_debounced_writer();
        repository
    }

    fn spawn_debounced_writer(&self) {
        let Some(path) = self.persist_path.clone() else { return };
        let events = Arc::clone(&self.events);
        let dirty = Arc::clone(&self.dirty);

        tokio::spawn(async move {
            loop {
                dirty.notified().await;
                tokio::time::sleep(DEBOUNCE).await;
                let snapshot = events.read().clone();
                if let Err(e) = write_snapshot(&path, &snapshot) {
                    error!(error = %e, "failed to persist error snapshot");
                }
            }
        });
    }

    pub fn save(&self, event: ErrorEvent) {
        debug!(error_id = %event.id, partner = %event.partner_id, code = %event.error_code, "saving error event");
        self.events.write().push(event);
        self.dirty.notify_one();
    }

    #[must_use]
    pub fn find_by_id(&self, id: Uuid) -> Option<ErrorEvent> {
        self.events.read().iter().find(|e| e.id == id).cloned()
    }

    #[must_use]
    pub fn count(&self, filters: &ErrorFilters) -> usize {
        self.events.read().iter().filter(|e| filters.matches(e)).count()
    }

    #[must_use]
    pub fn find_many(&self, filters: &ErrorFilters, pagination: Pagination) -> Page<ErrorEvent> {
        let pagination = pagination.normalized();
        let mut matched: Vec<ErrorEvent> = self
            .events
            .read()
            .iter()
            .filter(|e| filters.matches(e))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let total = matched.len();
        let total_pages = total.div_ceil(pagination.page_size as usize).max(1) as u32;
        let start = ((pagination.page - 1) as usize) * pagination.page_size as usize;
        let data = matched.into_iter().skip(start).take(pagination.page_size as usize).collect();

        Page {
            data,
            total,
            page: pagination.page,
            page_size: pagination.page_size,
            total_pages,
            has_more: pagination.page < total_pages,
        }
    }

    #[must_use]
    pub fn get_statistics(&self, filters: &ErrorFilters) -> ErrorStatistics {
        let events = self.events.read();
        let matched: Vec<&ErrorEvent> = events.iter().filter(|e| filters.matches(e)).collect();

        let mut errors_by_partner: HashMap<PartnerId, usize> =
            PartnerId::ALL.into_iter().map(|p| (p, 0)).collect();
        let mut errors_by_code: HashMap<ErrorCode, usize> = HashMap::new();
        let cutoff = Utc::now() - chrono::Duration::hours(24);
        let mut errors_last_24h = 0;

        for event in &matched {
            *errors_by_partner.entry(event.partner_id).or_insert(0) += 1;
            *errors_by_code.entry(event.error_code).or_insert(0) += 1;
            if event.timestamp >= cutoff {
                errors_last_24h += 1;
            }
        }

        ErrorStatistics {
            total_errors: matched.len(),
            errors_last_24h,
            errors_by_partner,
            errors_by_code,
        }
    }

    pub fn clear(&self) {
        self.events.write().clear();
        self.dirty.notify_one();
    }

    /// Synchronously flushes the current state to disk, bypassing the
    /// debounce. Intended for graceful shutdown.
    pub fn flush(&self) -> GatewayResult<()> {
        let Some(path) = &self.persist_path else { return Ok(()) };
        let snapshot = self.events.read().clone();
        write_snapshot(path, &snapshot)?;
        Ok(())
    }
}

fn write_snapshot(path: &PathBuf, snapshot: &[ErrorEvent]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(snapshot)?;
    std::fs::write(path, bytes)
}
