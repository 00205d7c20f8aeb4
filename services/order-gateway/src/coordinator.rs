//! Feed coordinator (C7): the single entry point that ties validation,
//! sequencing, normalization, storage, and bus publication together
//! for one submission or a batch of them.

use std::sync::Arc;

use feed_common::{EventBus, EventBusError, GatewayConfig, PartnerId};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error_repository::ErrorRepository;
use crate::normalize::normalize;
use crate::order::{ErrorCode, ErrorEvent, OrderEvent};
use crate::repository::OrderRepository;
use crate::sequence::SequenceGenerator;
use crate::validation::validate;

/// Outcome of a single submission: either the canonical order that was
/// accepted, or the error event recorded for a rejection.
#[derive(Debug, Clone)]
pub enum SubmissionOutcome {
    Accepted(OrderEvent),
    Rejected(ErrorEvent),
}

impl SubmissionOutcome {
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// The shape a transport layer renders as the submission response
/// body (202 on acceptance, 422 on rejection).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProcessingResult {
    pub success: bool,
    pub partner_id: PartnerId,
    pub order_id: Option<String>,
    pub sequence_number: Option<u64>,
    pub errors: Vec<String>,
}

impl From<&SubmissionOutcome> for ProcessingResult {
    fn from(outcome: &SubmissionOutcome) -> Self {
        match outcome {
            SubmissionOutcome::Accepted(order) => Self {
                success: true,
                partner_id: order.partner_id,
                order_id: Some(order.external_order_id.clone()),
                sequence_number: Some(order.sequence_number),
                errors: Vec::new(),
            },
            SubmissionOutcome::Rejected(event) => Self {
                success: false,
                partner_id: event.partner_id,
                order_id: event.external_order_id.clone(),
                sequence_number: None,
                errors: event.details.iter().map(|e| e.message.clone()).collect(),
            },
        }
    }
}

/// Orchestrates the ingestion pipeline: validate, sequence, normalize,
/// persist, and publish. Sequence numbers are only consumed once a
/// payload has already passed validation, so a rejected payload never
/// creates a gap in a partner's sequence.
pub struct FeedCoordinator {
    sequences: SequenceGenerator,
    orders: Arc<OrderRepository>,
    errors: Arc<ErrorRepository>,
    order_bus: Arc<EventBus<OrderEvent>>,
    error_bus: Arc<EventBus<ErrorEvent>>,
    reject_duplicate_external_id: bool,
}

impl FeedCoordinator {
    #[must_use]
    pub fn new(
        config: &GatewayConfig,
        sequences: SequenceGenerator,
        orders: Arc<OrderRepository>,
        errors: Arc<ErrorRepository>,
        order_bus: Arc<EventBus<OrderEvent>>,
        error_bus: Arc<EventBus<ErrorEvent>>,
    ) -> Self {
        Self {
            sequences,
            orders,
            errors,
            order_bus,
            error_bus,
            reject_duplicate_external_id: config.reject_duplicate_external_id,
        }
    }

    /// Submits one payload for the given partner, returning what was
    /// recorded (accepted order or rejection).
    pub async fn submit(&self, partner: PartnerId, raw: Value) -> SubmissionOutcome {
        if self.reject_duplicate_external_id {
            if let Some(external_id) = extract_external_id(partner, &raw) {
                if self.orders.exists_by_external_id(partner, &external_id) {
                    let event = self.reject(
                        partner,
                        raw,
                        ErrorCode::DuplicateOrder,
                        format!("duplicate external order id: {external_id}"),
                        Vec::new(),
                    );
                    return SubmissionOutcome::Rejected(event);
                }
            }
        }

        match validate(partner, &raw) {
            Ok(input) => {
                let sequence_number = self.sequences.next(partner);
                let order = normalize(&input, sequence_number);
                self.orders.save(order.clone());
                if let Err(e) = self.order_bus.publish(order.clone()).await {
                    if !matches!(e, EventBusError::NoSubscribers { .. }) {
                        warn!(error = %e, order_id = %order.id, "failed to publish accepted order");
                    }
                }
                info!(order_id = %order.id, partner = %partner, sequence = sequence_number, "accepted order");
                SubmissionOutcome::Accepted(order)
            }
            Err(field_errors) => {
                let code = field_errors.first().map_or(ErrorCode::MissingRequiredField, |e| e.code);
                let event = self.reject(
                    partner,
                    raw,
                    code,
                    format!("{} field error(s)", field_errors.len()),
                    field_errors,
                );
                SubmissionOutcome::Rejected(event)
            }
        }
    }

    /// Submits a batch, processing each payload independently so one
    /// rejection never blocks the rest of the batch.
    pub async fn submit_batch(&self, partner: PartnerId, payloads: Vec<Value>) -> Vec<SubmissionOutcome> {
        let mut outcomes = Vec::with_capacity(payloads.len());
        for raw in payloads {
            outcomes.push(self.submit(partner, raw).await);
        }
        outcomes
    }

    fn reject(
        &self,
        partner: PartnerId,
        raw: Value,
        code: ErrorCode,
        message: String,
        details: Vec<crate::order::FieldError>,
    ) -> ErrorEvent {
        let external_order_id = extract_external_id(partner, &raw);
        let event = ErrorEvent {
            id: Uuid::new_v4(),
            partner_id: partner,
            external_order_id,
            error_code: code,
            message,
            details,
            original_payload: raw,
            timestamp: chrono::Utc::now(),
        };
        self.errors.save(event.clone());
        let bus = Arc::clone(&self.error_bus);
        let to_publish = event.clone();
        let error_id = event.id;
        tokio::spawn(async move {
            if let Err(e) = bus.publish(to_publish).await {
                if !matches!(e, EventBusError::NoSubscribers { .. }) {
                    warn!(error = %e, error_id = %error_id, "failed to publish rejected order");
                }
            }
        });
        warn!(partner = %partner, code = %event.error_code, "rejected order");
        event
    }
}

fn extract_external_id(partner: PartnerId, raw: &Value) -> Option<String> {
    let key = match partner {
        PartnerId::PartnerA => "orderId",
        PartnerId::PartnerB => "transactionId",
    };
    raw.get(key)?.as_str().map(str::to_string)
}
