//! Order gateway: partner order feed ingestion, normalization,
//! sequencing, and query core.
//!
//! Accepts raw JSON payloads from two upstream partners, validates and
//! normalizes them into a canonical [`order::OrderEvent`], assigns a
//! per-partner monotonic sequence number, persists the result, and
//! publishes it on an in-process event bus. Rejected payloads are
//! captured as an [`order::ErrorEvent`] rather than dropped.
//!
//! The HTTP transport that would front this core is out of scope:
//! this crate exposes coordinator methods and plain request/response
//! types, not a bound socket.

#![forbid(unsafe_code)]

pub mod auth;
pub mod coordinator;
pub mod error;
pub mod error_repository;
pub mod health;
pub mod normalize;
pub mod order;
pub mod query;
pub mod repository;
pub mod sequence;
pub mod validation;

use std::path::PathBuf;
use std::sync::Arc;

use feed_common::{EventBus, EventBusConfig, GatewayConfig};

pub use coordinator::{FeedCoordinator, ProcessingResult, SubmissionOutcome};
pub use error::{GatewayError, GatewayResult};
pub use health::GatewayHealth;
pub use order::{ErrorCode, ErrorEvent, FieldError, OrderEvent, PartnerAInput, PartnerBInput, PartnerInput};
pub use query::QueryCoordinator;

/// Bundles the coordinators a transport layer needs: submission
/// (`feed`) and reads (`query`). Constructed once at process startup
/// from a [`GatewayConfig`].
pub struct OrderGateway {
    pub feed: FeedCoordinator,
    pub query: QueryCoordinator,
    orders: Arc<repository::OrderRepository>,
    errors: Arc<error_repository::ErrorRepository>,
}

impl OrderGateway {
    /// Wires repositories, the sequence generator, and the event bus
    /// according to `config`. `config.in_memory` selects between
    /// file-backed and pure in-memory state.
    #[must_use]
    pub fn new(config: &GatewayConfig) -> Self {
        let data_dir = PathBuf::from(&config.data_dir);

        let orders = Arc::new(if config.in_memory {
            repository::OrderRepository::in_memory()
        } else {
            repository::OrderRepository::with_persistence(data_dir.join("orders.json"))
        });

        let errors = Arc::new(if config.in_memory {
            error_repository::ErrorRepository::in_memory()
        } else {
            error_repository::ErrorRepository::with_persistence(data_dir.join("errors.json"))
        });

        let sequences = if config.in_memory {
            sequence::SequenceGenerator::in_memory()
        } else {
            sequence::SequenceGenerator::with_persistence(data_dir.join("sequences.json"), Arc::clone(&errors))
        };

        let order_bus = Arc::new(EventBus::new(EventBusConfig::default()));
        let error_bus = Arc::new(EventBus::new(EventBusConfig::default()));

        let feed = FeedCoordinator::new(
            config,
            sequences,
            Arc::clone(&orders),
            Arc::clone(&errors),
            order_bus,
            error_bus,
        );
        let query = QueryCoordinator::new(Arc::clone(&orders), Arc::clone(&errors));

        Self { feed, query, orders, errors }
    }

    /// Flushes both repositories to disk, bypassing the debounce.
    /// Intended for graceful shutdown in a file-backed deployment.
    pub fn flush(&self) -> GatewayResult<()> {
        self.orders.flush()?;
        self.errors.flush()
    }

    /// The `/health` response value. Does not touch either repository.
    #[must_use]
    pub fn health(&self) -> GatewayHealth {
        GatewayHealth::healthy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feed_common::PartnerId;
    use serde_json::json;

    #[tokio::test]
    async fn end_to_end_submission_is_queryable() {
        let gateway = OrderGateway::new(&GatewayConfig::default());

        let outcome = gateway
            .feed
            .submit(
                PartnerId::PartnerA,
                json!({
                    "orderId": "ORD-1",
                    "skuId": "SKU-1",
                    "customerId": "C1",
                    "quantity": 5,
                    "unitPrice": 20.0,
                    "taxRate": 0.1,
                    "transactionTimeMs": 1_705_315_800_000i64,
                }),
            )
            .await;
        assert!(outcome.is_accepted());

        let found = gateway.query.order_by_external_id(PartnerId::PartnerA, "ORD-1");
        assert!(found.is_some());
        assert_eq!(found.unwrap().gross_amount, 100.0);
    }

    #[tokio::test]
    async fn rejected_submission_is_visible_on_the_error_query_path() {
        let gateway = OrderGateway::new(&GatewayConfig::default());

        let outcome = gateway.feed.submit(PartnerId::PartnerA, json!({})).await;
        assert!(!outcome.is_accepted());

        let page = gateway.query.list_errors(&std::collections::HashMap::new()).unwrap();
        assert_eq!(page.total, 1);
    }
}
