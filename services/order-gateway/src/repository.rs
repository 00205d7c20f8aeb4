//! Order repository (C5): storage, filtering, pagination, sorting,
//! the external-id lookup index, and aggregate statistics.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use feed_common::{round2, PartnerId};
use parking_lot::RwLock;
use tokio::sync::Notify;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::GatewayResult;
use crate::order::OrderEvent;

const DEBOUNCE: Duration = Duration::from_millis(500);
const MAX_PAGE_SIZE: u32 = 100;
const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    ProcessedAt,
    TransactionTime,
    GrossAmount,
    SequenceNumber,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct Sort {
    pub field: SortField,
    pub order: SortOrder,
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            field: SortField::ProcessedAt,
            order: SortOrder::Desc,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilters {
    pub partner_id: Option<PartnerId>,
    pub customer_id: Option<String>,
    pub product_id: Option<String>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
}

impl OrderFilters {
    fn matches(&self, order: &OrderEvent) -> bool {
        if let Some(partner) = self.partner_id {
            if order.partner_id != partner {
                return false;
            }
        }
        if let Some(customer) = &self.customer_id {
            if &order.customer_id != customer {
                return false;
            }
        }
        if let Some(product) = &self.product_id {
            if &order.product_id != product {
                return false;
            }
        }
        if let Some(from) = self.from_date {
            if order.transaction_time < from {
                return false;
            }
        }
        if let Some(to) = self.to_date {
            if order.transaction_time > to {
                return false;
            }
        }
        if let Some(min) = self.min_amount {
            if order.gross_amount < min {
                return false;
            }
        }
        if let Some(max) = self.max_amount {
            if order.gross_amount > max {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    /// Clamps page to at least 1 and page size to the `[1, MAX_PAGE_SIZE]` ceiling.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            page_size: self.page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub has_more: bool,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct OrderStatistics {
    pub total_orders: usize,
    pub orders_by_partner: HashMap<PartnerId, usize>,
    pub total_gross_amount: f64,
    pub total_tax_amount: f64,
    pub total_net_amount: f64,
    pub average_order_value: f64,
    pub highest_sequence: HashMap<PartnerId, u64>,
}

struct Store {
    /// Insertion order is preserved for stable tie-breaking.
    orders: Vec<OrderEvent>,
    by_id: HashMap<Uuid, usize>,
    by_external_id: HashMap<(PartnerId, String), Uuid>,
}

impl Store {
    fn new() -> Self {
        Self {
            orders: Vec::new(),
            by_id: HashMap::new(),
            by_external_id: HashMap::new(),
        }
    }

    fn insert(&mut self, order: OrderEvent) {
        let index = self.orders.len();
        self.by_id.insert(order.id, index);
        self.by_external_id
            .insert((order.partner_id, order.external_order_id.clone()), order.id);
        self.orders.push(order);
    }
}

/// Orders in memory, snapshotted to a debounced JSON file when a
/// persistence path is configured.
pub struct OrderRepository {
    store: Arc<RwLock<Store>>,
    persist_path: Option<PathBuf>,
    dirty: Arc<Notify>,
}

impl OrderRepository {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(RwLock::new(Store::new())),
            persist_path: None,
            dirty: Arc::new(Notify::new()),
        }
    }

    #[must_use]
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut store = Store::new();
        if let Ok(bytes) = std::fs::read(&path) {
            match serde_json::from_slice::<Vec<OrderEvent>>(&bytes) {
                Ok(orders) => {
                    for order in orders {
                        store.insert(order);
                    }
                }
                Err(e) => warn!(error = %e, "failed to parse orders snapshot, starting empty"),
            }
        }

        let repository = Self {
            store: Arc::new(RwLock::new(store)),
            persist_path: Some(path),
            dirty: Arc::new(Notify::new()),
        };
        repository.spawn_debounced_writer();
        repository
    }

    fn spawn_debounced_writer(&self) {
        let Some(path) = self.persist_path.clone() else { return };
        let store = Arc::clone(&self.store);
        let dirty = Arc::clone(&self.dirty);

        tokio::spawn(async move {
            loop {
                dirty.notified().await;
                tokio::time::sleep(DEBOUNCE).await;
                let snapshot: Vec<OrderEvent> = store.read().orders.clone();
                if let Err(e) = write_snapshot(&path, &snapshot) {
                    error!(error = %e, "failed to persist order snapshot");
                }
            }
        });
    }

    pub fn save(&self, order: OrderEvent) {
        debug!(order_id = %order.id, partner = %order.partner_id, "saving order");
        self.store.write().insert(order);
        self.dirty.notify_one();
    }

    pub fn save_batch(&self, orders: Vec<OrderEvent>) {
        if orders.is_empty() {
            return;
        }
        let mut store = self.store.write();
        for order in orders {
            store.insert(order);
        }
        drop(store);
        self.dirty.notify_one();
    }

    #[must_use]
    pub fn find_by_id(&self, id: Uuid) -> Option<OrderEvent> {
        let store = self.store.read();
        store.by_id.get(&id).map(|&idx| store.orders[idx].clone())
    }

    #[must_use]
    pub fn find_by_external_id(&self, partner: PartnerId, external_id: &str) -> Option<OrderEvent> {
        let store = self.store.read();
        let id = store.by_external_id.get(&(partner, external_id.to_string()))?;
        store.by_id.get(id).map(|&idx| store.orders[idx].clone())
    }

    #[must_use]
    pub fn exists_by_external_id(&self, partner: PartnerId, external_id: &str) -> bool {
        self.store
            .read()
            .by_external_id
            .contains_key(&(partner, external_id.to_string()))
    }

    #[must_use]
    pub fn count(&self, filters: &OrderFilters) -> usize {
        self.store.read().orders.iter().filter(|o| filters.matches(o)).count()
    }

    #[must_use]
    pub fn find_many(&self, filters: &OrderFilters, pagination: Pagination, sort: &Sort) -> Page<OrderEvent> {
        let pagination = pagination.normalized();
        let mut matched: Vec<OrderEvent> = self
            .store
            .read()
            .orders
            .iter()
            .filter(|o| filters.matches(o))
            .cloned()
            .collect();

        sort_orders(&mut matched, sort);

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
    pub fn get_statistics(&self, filters: &OrderFilters) -> OrderStatistics {
        let store = self.store.read();
        let matched: Vec<&OrderEvent> = store.orders.iter().filter(|o| filters.matches(o)).collect();

        let mut orders_by_partner: HashMap<PartnerId, usize> =
            PartnerId::ALL.into_iter().map(|p| (p, 0)).collect();
        let mut highest_sequence: HashMap<PartnerId, u64> =
            PartnerId::ALL.into_iter().map(|p| (p, 0)).collect();

        let mut total_gross = 0.0;
        let mut total_tax = 0.0;
        let mut total_net = 0.0;

        for order in &matched {
            *orders_by_partner.entry(order.partner_id).or_insert(0) += 1;
            total_gross += order.gross_amount;
            total_tax += order.tax_amount;
            total_net += order.net_amount;
            let current = highest_sequence.entry(order.partner_id).or_insert(0);
            *current = (*current).max(order.sequence_number);
        }

        let total_orders = matched.len();
        let average_order_value = if total_orders > 0 {
            round2(total_gross / total_orders as f64)
        } else {
            0.0
        };

        OrderStatistics {
            total_orders,
            orders_by_partner,
            total_gross_amount: round2(total_gross),
            total_tax_amount: round2(total_tax),
            total_net_amount: round2(total_net),
            average_order_value,
            highest_sequence,
        }
    }

    pub fn clear(&self) {
        *self.store.write() = Store::new();
        self.dirty.notify_one();
    }

    /// Synchronously flushes the current state to disk, bypassing the
    /// debounce. Intended for graceful shutdown.
    pub fn flush(&self) -> GatewayResult<()> {
        let Some(path) = &self.persist_path else { return Ok(()) };
        let snapshot: Vec<OrderEvent> = self.store.read().orders.clone();
        write_snapshot(path, &snapshot)?;
        Ok(())
    }
}

fn sort_orders(orders: &mut [OrderEvent], sort: &Sort) {
    orders.sort_by(|a, b| {
        let ordering = match sort.field {
            // Compared at millisecond precision: that is the unit the
            // wire format and the query layer both expose.
            SortField::ProcessedAt => a.processed_at.timestamp_millis().cmp(&b.processed_at.timestamp_millis()),
            SortField::TransactionTime => {
                a.transaction_time.timestamp_millis().cmp(&b.transaction_time.timestamp_millis())
            }
            SortField::GrossAmount => a.gross_amount.total_cmp(&b.gross_amount),
            SortField::SequenceNumber => a.sequence_number.cmp(&b.sequence_number),
        };
        match sort.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

fn write_snapshot(path: &PathBuf, snapshot: &[OrderEvent]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(snapshot)?;
    std::fs::write(path, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::order::{PartnerAInput, PartnerInput};

    fn sample_order(seq: u64, partner: PartnerId, customer: &str, gross: f64) -> OrderEvent {
        let input = PartnerAInput {
            order_id: format!("ORD-{seq}"),
            sku_id: "SKU-1".to_string(),
            customer_id: customer.to_string(),
            quantity: 1,
            unit_price: gross,
            tax_rate: 0.0,
            transaction_time_ms: 1_705_315_800_000,
            metadata: None,
        };
        let mut order = normalize(&PartnerInput::A(input), seq);
        order.partner_id = partner;
        order
    }

    #[test]
    fn find_by_id_and_external_id_round_trip() {
        let repo = OrderRepository::in_memory();
        let order = sample_order(1, PartnerId::PartnerA, "C1", 10.0);
        let id = order.id;
        let external_id = order.external_order_id.clone();
        repo.save(order);

        assert!(repo.find_by_id(id).is_some());
        assert!(repo.find_by_external_id(PartnerId::PartnerA, &external_id).is_some());
        assert!(repo.exists_by_external_id(PartnerId::PartnerA, &external_id));
        assert!(!repo.exists_by_external_id(PartnerId::PartnerB, &external_id));
    }

    #[test]
    fn pagination_respects_ceiling_and_total_pages() {
        let repo = OrderRepository::in_memory();
        for i in 1..=25 {
            repo.save(sample_order(i, PartnerId::PartnerA, "C1", 10.0));
        }

        let page = repo.find_many(
            &OrderFilters::default(),
            Pagination { page: 3, page_size: 10 },
            &Sort::default(),
        );
        assert_eq!(page.data.len(), 5);
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 3);
        assert!(!page.has_more);

        let clamped = repo.find_many(
            &OrderFilters::default(),
            Pagination { page: 1, page_size: 500 },
            &Sort::default(),
        );
        assert_eq!(clamped.page_size, 100);
    }

    #[test]
    fn count_matches_find_many_total() {
        let repo = OrderRepository::in_memory();
        for i in 1..=5 {
            repo.save(sample_order(i, PartnerId::PartnerA, "C1", 10.0));
        }
        let filters = OrderFilters::default();
        assert_eq!(repo.count(&filters), 5);
        assert_eq!(repo.find_many(&filters, Pagination::default(), &Sort::default()).total, 5);
    }

    #[test]
    fn statistics_zero_initialize_every_partner() {
        let repo = OrderRepository::in_memory();
        repo.save(sample_order(1, PartnerId::PartnerA, "C1", 100.0));

        let stats = repo.get_statistics(&OrderFilters::default());
        assert_eq!(stats.total_orders, 1);
        assert_eq!(stats.orders_by_partner[&PartnerId::PartnerA], 1);
        assert_eq!(stats.orders_by_partner[&PartnerId::PartnerB], 0);
        assert_eq!(stats.highest_sequence[&PartnerId::PartnerB], 0);
        assert_eq!(stats.total_gross_amount, 100.0);
        assert_eq!(stats.average_order_value, 100.0);
    }

    #[tokio::test]
    async fn persists_and_reloads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.json");

        let order = sample_order(1, PartnerId::PartnerA, "C1", 10.0);
        let id = order.id;
        {
            let repo = OrderRepository::with_persistence(path.clone());
            repo.save(order);
            repo.flush().unwrap();
        }

        let reloaded = OrderRepository::with_persistence(path);
        assert!(reloaded.find_by_id(id).is_some());
    }
}
