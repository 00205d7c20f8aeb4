//! Canonical domain types: partner inputs, the canonical order record,
//! and the error record produced when a payload is rejected.

use chrono::{DateTime, Utc};
use feed_common::{BusMessage, PartnerId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw, still-untyped payload handed to a validator.
pub type RawPayload = serde_json::Value;

/// Partner A's wire shape after successful validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerAInput {
    pub order_id: String,
    pub sku_id: String,
    pub customer_id: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub tax_rate: f64,
    pub transaction_time_ms: i64,
    pub metadata: Option<serde_json::Value>,
}

/// Partner B's wire shape after successful validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerBInput {
    pub transaction_id: String,
    pub item_code: String,
    pub client_id: String,
    pub qty: i64,
    pub price: f64,
    pub tax: f64,
    pub purchase_time: String,
    pub notes: Option<String>,
}

/// A validated input tagged by which partner it came from.
#[derive(Debug, Clone)]
pub enum PartnerInput {
    A(PartnerAInput),
    B(PartnerBInput),
}

impl PartnerInput {
    #[must_use]
    pub const fn partner_id(&self) -> PartnerId {
        match self {
            Self::A(_) => PartnerId::PartnerA,
            Self::B(_) => PartnerId::PartnerB,
        }
    }

    #[must_use]
    pub fn external_order_id(&self) -> &str {
        match self {
            Self::A(a) => &a.order_id,
            Self::B(b) => &b.transaction_id,
        }
    }
}

/// The canonical order record. Immutable once constructed: it is
/// created exactly once by the normalizer and never mutated again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    pub id: Uuid,
    pub external_order_id: String,
    pub partner_id: PartnerId,
    pub sequence_number: u64,
    pub product_id: String,
    pub customer_id: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub tax_rate: f64,
    pub gross_amount: f64,
    pub tax_amount: f64,
    pub net_amount: f64,
    pub transaction_time: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
    pub metadata: Option<serde_json::Value>,
}

impl BusMessage for OrderEvent {
    fn topic(&self) -> &str {
        "orders.valid"
    }
}

/// A single field-level validation failure, tagged with the
/// `ErrorCode` that caused it so a rejection's overall `ErrorEvent`
/// can report the real failure rather than a generic one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    pub code: ErrorCode,
    pub received_value: Option<serde_json::Value>,
    pub expected_type: Option<String>,
}

impl FieldError {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code,
            received_value: None,
            expected_type: None,
        }
    }

    #[must_use]
    pub fn with_received(mut self, value: serde_json::Value) -> Self {
        self.received_value = Some(value);
        self
    }

    #[must_use]
    pub fn with_expected_type(mut self, expected: impl Into<String>) -> Self {
        self.expected_type = Some(expected.into());
        self
    }
}

/// Emitted when a payload fails validation, carrying enough detail
/// to diagnose the rejection without replaying the original request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub id: Uuid,
    pub partner_id: PartnerId,
    pub external_order_id: Option<String>,
    pub error_code: ErrorCode,
    pub message: String,
    pub details: Vec<FieldError>,
    pub original_payload: RawPayload,
    pub timestamp: DateTime<Utc>,
}

impl BusMessage for ErrorEvent {
    fn topic(&self) -> &str {
        "orders.error"
    }
}

/// The error taxonomy. `FutureTimestamp` and `DuplicateOrder` are
/// reserved for policy that is not currently enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MissingRequiredField,
    NullValue,
    InvalidDataType,
    InvalidValue,
    NegativeNumber,
    ZeroValue,
    NotANumber,
    InvalidTimestamp,
    FutureTimestamp,
    DuplicateOrder,
    UnknownPartner,
    TransformationError,
    InternalError,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            Self::NullValue => "NULL_VALUE",
            Self::InvalidDataType => "INVALID_DATA_TYPE",
            Self::InvalidValue => "INVALID_VALUE",
            Self::NegativeNumber => "NEGATIVE_NUMBER",
            Self::ZeroValue => "ZERO_VALUE",
            Self::NotANumber => "NOT_A_NUMBER",
            Self::InvalidTimestamp => "INVALID_TIMESTAMP",
            Self::FutureTimestamp => "FUTURE_TIMESTAMP",
            Self::DuplicateOrder => "DUPLICATE_ORDER",
            Self::UnknownPartner => "UNKNOWN_PARTNER",
            Self::TransformationError => "TRANSFORMATION_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{s}")
    }
}
