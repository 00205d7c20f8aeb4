//! Per-partner payload validation (C1).
//!
//! Validators never short-circuit on the first bad field: every
//! required field is checked and all failures are collected before
//! returning, so a caller sees the complete list of problems with a
//! single submission.

use chrono::{DateTime, TimeZone, Utc};
use feed_common::PartnerId;
use serde_json::Value;

use crate::order::{ErrorCode, FieldError, PartnerAInput, PartnerBInput, PartnerInput};

/// Lower bound of the plausibility window for partner A timestamps:
/// 2000-01-01T00:00:00Z in epoch milliseconds.
const MIN_TRANSACTION_TIME_MS: i64 = 946_684_800_000;
/// Upper bound: roughly 100 years from the lower bound.
const MAX_TRANSACTION_TIME_MS: i64 = MIN_TRANSACTION_TIME_MS + 100 * 365 * 24 * 60 * 60 * 1000;

/// Validates a raw payload for the given partner, dispatching to the
/// matching per-partner validator.
pub fn validate(partner: PartnerId, raw: &Value) -> Result<PartnerInput, Vec<FieldError>> {
    match partner {
        PartnerId::PartnerA => validate_partner_a(raw).map(PartnerInput::A),
        PartnerId::PartnerB => validate_partner_b(raw).map(PartnerInput::B),
    }
}

pub fn validate_partner_a(raw: &Value) -> Result<PartnerAInput, Vec<FieldError>> {
    let mut errors = Vec::new();

    let Some(obj) = root_object(raw, &mut errors) else {
        return Err(errors);
    };

    let order_id = required_string(obj, "orderId", &mut errors);
    let sku_id = required_string(obj, "skuId", &mut errors);
    let customer_id = required_string(obj, "customerId", &mut errors);
    let quantity = required_positive_int(obj, "quantity", &mut errors);
    let unit_price = required_positive_number(obj, "unitPrice", &mut errors);
    let tax_rate = required_number_in_range(obj, "taxRate", 0.0, 1.0, &mut errors);
    let transaction_time_ms = required_transaction_time_ms(obj, &mut errors);
    let metadata = optional_mapping(obj, "metadata", &mut errors);

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(PartnerAInput {
        order_id: order_id.unwrap(),
        sku_id: sku_id.unwrap(),
        customer_id: customer_id.unwrap(),
        quantity: quantity.unwrap(),
        unit_price: unit_price.unwrap(),
        tax_rate: tax_rate.unwrap(),
        transaction_time_ms: transaction_time_ms.unwrap(),
        metadata,
    })
}

pub fn validate_partner_b(raw: &Value) -> Result<PartnerBInput, Vec<FieldError>> {
    let mut errors = Vec::new();

    let Some(obj) = root_object(raw, &mut errors) else {
        return Err(errors);
    };

    let transaction_id = required_string(obj, "transactionId", &mut errors);
    let item_code = required_string(obj, "itemCode", &mut errors);
    let client_id = required_string(obj, "clientId", &mut errors);
    let qty = required_positive_int(obj, "qty", &mut errors);
    let price = required_positive_number(obj, "price", &mut errors);
    let tax = required_number_in_range(obj, "tax", 0.0, 100.0, &mut errors);
    let purchase_time = required_iso_timestamp(obj, "purchaseTime", &mut errors);
    let notes = optional_string(obj, "notes", &mut errors);

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(PartnerBInput {
        transaction_id: transaction_id.unwrap(),
        item_code: item_code.unwrap(),
        client_id: client_id.unwrap(),
        qty: qty.unwrap(),
        price: price.unwrap(),
        tax: tax.unwrap(),
        purchase_time: purchase_time.unwrap(),
        notes,
    })
}

fn root_object<'a>(raw: &'a Value, errors: &mut Vec<FieldError>) -> Option<&'a serde_json::Map<String, Value>> {
    match raw.as_object() {
        Some(obj) => Some(obj),
        None => {
            errors.push(
                FieldError::new("$", "payload must be a JSON object", ErrorCode::InvalidDataType)
                    .with_received(raw.clone())
                    .with_expected_type("object"),
            );
            None
        }
    }
}

fn required_string(obj: &serde_json::Map<String, Value>, field: &str, errors: &mut Vec<FieldError>) -> Option<String> {
    match obj.get(field) {
        None => {
            errors.push(FieldError::new(field, format!("{field} is required"), ErrorCode::MissingRequiredField));
            None
        }
        Some(Value::Null) => {
            errors.push(FieldError::new(field, format!("{field} must not be null"), ErrorCode::NullValue));
            None
        }
        Some(Value::String(s)) => {
            if s.trim().is_empty() {
                errors.push(
                    FieldError::new(field, format!("{field} must not be empty or whitespace"), ErrorCode::InvalidValue)
                        .with_received(Value::String(s.clone())),
                );
                None
            } else {
                Some(s.clone())
            }
        }
        Some(other) => {
            errors.push(
                FieldError::new(field, format!("{field} must be a string"), ErrorCode::InvalidDataType)
                    .with_received(other.clone())
                    .with_expected_type("string"),
            );
            None
        }
    }
}

fn optional_string(obj: &serde_json::Map<String, Value>, field: &str, errors: &mut Vec<FieldError>) -> Option<String> {
    match obj.get(field) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::String(_)) => None,
        Some(other) => {
            errors.push(
                FieldError::new(field, format!("{field} must be a string"), ErrorCode::InvalidDataType)
                    .with_received(other.clone())
                    .with_expected_type("string"),
            );
            None
        }
    }
}

fn optional_mapping(obj: &serde_json::Map<String, Value>, field: &str, errors: &mut Vec<FieldError>) -> Option<Value> {
    match obj.get(field) {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(Value::Object(map.clone())),
        Some(other) => {
            errors.push(
                FieldError::new(field, format!("{field} must be an object"), ErrorCode::InvalidDataType)
                    .with_received(other.clone())
                    .with_expected_type("object"),
            );
            None
        }
    }
}

fn required_positive_int(obj: &serde_json::Map<String, Value>, field: &str, errors: &mut Vec<FieldError>) -> Option<i64> {
    match obj.get(field) {
        None => {
            errors.push(FieldError::new(field, format!("{field} is required"), ErrorCode::MissingRequiredField));
            None
        }
        Some(Value::Null) => {
            errors.push(FieldError::new(field, format!("{field} must not be null"), ErrorCode::NullValue));
            None
        }
        Some(Value::Number(n)) => {
            let Some(as_f64) = n.as_f64() else {
                errors.push(FieldError::new(field, format!("{field} is not a number"), ErrorCode::NotANumber));
                return None;
            };
            if as_f64.is_nan() {
                errors.push(FieldError::new(field, format!("{field} is not a number"), ErrorCode::NotANumber));
                return None;
            }
            if as_f64.fract() != 0.0 {
                errors.push(
                    FieldError::new(field, format!("{field} must be an integer"), ErrorCode::InvalidValue)
                        .with_received(Value::Number(n.clone())),
                );
                return None;
            }
            let as_int = as_f64 as i64;
            if as_int < 0 {
                errors.push(FieldError::new(field, format!("{field} must not be negative"), ErrorCode::NegativeNumber));
                None
            } else if as_int == 0 {
                errors.push(FieldError::new(field, format!("{field} must be greater than zero"), ErrorCode::ZeroValue));
                None
            } else {
                Some(as_int)
            }
        }
        Some(other) => {
            errors.push(
                FieldError::new(field, format!("{field} must be a number"), ErrorCode::InvalidDataType)
                    .with_received(other.clone())
                    .with_expected_type("integer"),
            );
            None
        }
    }
}

fn required_positive_number(obj: &serde_json::Map<String, Value>, field: &str, errors: &mut Vec<FieldError>) -> Option<f64> {
    match obj.get(field) {
        None => {
            errors.push(FieldError::new(field, format!("{field} is required"), ErrorCode::MissingRequiredField));
            None
        }
        Some(Value::Null) => {
            errors.push(FieldError::new(field, format!("{field} must not be null"), ErrorCode::NullValue));
            None
        }
        Some(Value::Number(n)) => {
            let Some(value) = n.as_f64() else {
                errors.push(FieldError::new(field, format!("{field} is not a number"), ErrorCode::NotANumber));
                return None;
            };
            if value.is_nan() {
                errors.push(FieldError::new(field, format!("{field} is not a number"), ErrorCode::NotANumber));
                None
            } else if value < 0.0 {
                errors.push(FieldError::new(field, format!("{field} must not be negative"), ErrorCode::NegativeNumber));
                None
            } else if value == 0.0 {
                errors.push(FieldError::new(field, format!("{field} must be greater than zero"), ErrorCode::ZeroValue));
                None
            } else {
                Some(value)
            }
        }
        Some(other) => {
            errors.push(
                FieldError::new(field, format!("{field} must be a number"), ErrorCode::InvalidDataType)
                    .with_received(other.clone())
                    .with_expected_type("number"),
            );
            None
        }
    }
}

fn required_number_in_range(
    obj: &serde_json::Map<String, Value>,
    field: &str,
    min: f64,
    max: f64,
    errors: &mut Vec<FieldError>,
) -> Option<f64> {
    match obj.get(field) {
        None => {
            errors.push(FieldError::new(field, format!("{field} is required"), ErrorCode::MissingRequiredField));
            None
        }
        Some(Value::Null) => {
            errors.push(FieldError::new(field, format!("{field} must not be null"), ErrorCode::NullValue));
            None
        }
        Some(Value::Number(n)) => {
            let Some(value) = n.as_f64() else {
                errors.push(FieldError::new(field, format!("{field} is not a number"), ErrorCode::NotANumber));
                return None;
            };
            if value.is_nan() {
                errors.push(FieldError::new(field, format!("{field} is not a number"), ErrorCode::NotANumber));
                None
            } else if value < min || value > max {
                errors.push(FieldError::new(
                    field,
                    format!("{field} must be between {min} and {max}"),
                    ErrorCode::InvalidValue,
                ));
                None
            } else {
                Some(value)
            }
        }
        Some(other) => {
            errors.push(
                FieldError::new(field, format!("{field} must be a number"), ErrorCode::InvalidDataType)
                    .with_received(other.clone())
                    .with_expected_type("number"),
            );
            None
        }
    }
}

fn required_transaction_time_ms(obj: &serde_json::Map<String, Value>, errors: &mut Vec<FieldError>) -> Option<i64> {
    let field = "transactionTimeMs";
    match obj.get(field) {
        None => {
            errors.push(FieldError::new(field, format!("{field} is required"), ErrorCode::MissingRequiredField));
            None
        }
        Some(Value::Null) => {
            errors.push(FieldError::new(field, format!("{field} must not be null"), ErrorCode::NullValue));
            None
        }
        Some(Value::Number(n)) => {
            let Some(value) = n.as_i64() else {
                errors.push(FieldError::new(
                    field,
                    format!("{field} must be an integer timestamp"),
                    ErrorCode::InvalidDataType,
                ));
                return None;
            };
            if value < MIN_TRANSACTION_TIME_MS || value > MAX_TRANSACTION_TIME_MS {
                errors.push(FieldError::new(
                    field,
                    format!("{field} is outside the plausible range"),
                    ErrorCode::InvalidTimestamp,
                ));
                None
            } else {
                Some(value)
            }
        }
        Some(other) => {
            errors.push(
                FieldError::new(field, format!("{field} must be an integer"), ErrorCode::InvalidDataType)
                    .with_received(other.clone())
                    .with_expected_type("integer"),
            );
            None
        }
    }
}

fn required_iso_timestamp(obj: &serde_json::Map<String, Value>, field: &str, errors: &mut Vec<FieldError>) -> Option<String> {
    match obj.get(field) {
        None => {
            errors.push(FieldError::new(field, format!("{field} is required"), ErrorCode::MissingRequiredField));
            None
        }
        Some(Value::Null) => {
            errors.push(FieldError::new(field, format!("{field} must not be null"), ErrorCode::NullValue));
            None
        }
        Some(Value::String(s)) => match parse_instant(s) {
            Some(_) => Some(s.clone()),
            None => {
                errors.push(
                    FieldError::new(field, format!("{field} is not a parseable timestamp"), ErrorCode::InvalidTimestamp)
                        .with_received(Value::String(s.clone())),
                );
                None
            }
        },
        Some(other) => {
            errors.push(
                FieldError::new(field, format!("{field} must be a string"), ErrorCode::InvalidDataType)
                    .with_received(other.clone())
                    .with_expected_type("string"),
            );
            None
        }
    }
}

/// Parses an ISO-8601 instant, accepting both `DateTime` (with an
/// explicit offset) and naive forms interpreted as UTC.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .and_then(|naive| Utc.from_local_datetime(&naive).single())
}
