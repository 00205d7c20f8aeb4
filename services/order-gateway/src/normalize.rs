//! Pure normalization of a validated partner input into the canonical
//! order record (C2).

use chrono::Utc;
use feed_common::round2;
use serde_json::json;
use uuid::Uuid;

use crate::order::{OrderEvent, PartnerAInput, PartnerBInput, PartnerInput};
use crate::validation::parse_instant;

/// Builds the canonical order for an already-validated, already-sequenced
/// input. Never fails: by the time this runs, validation has already
/// guaranteed every field is well-formed.
#[must_use]
pub fn normalize(input: &PartnerInput, sequence_number: u64) -> OrderEvent {
    match input {
        PartnerInput::A(a) => normalize_a(a, sequence_number),
        PartnerInput::B(b) => normalize_b(b, sequence_number),
    }
}

fn normalize_a(input: &PartnerAInput, sequence_number: u64) -> OrderEvent {
    let transaction_time = chrono::DateTime::from_timestamp_millis(input.transaction_time_ms)
        .unwrap_or_else(Utc::now);

    build(
        input.order_id.clone(),
        feed_common::PartnerId::PartnerA,
        sequence_number,
        input.sku_id.clone(),
        input.customer_id.clone(),
        input.quantity,
        input.unit_price,
        input.tax_rate,
        transaction_time,
        input.metadata.clone(),
    )
}

fn normalize_b(input: &PartnerBInput, sequence_number: u64) -> OrderEvent {
    let transaction_time = parse_instant(&input.purchase_time).unwrap_or_else(Utc::now);
    let metadata = input.notes.as_ref().map(|notes| json!({ "notes": notes }));

    build(
        input.transaction_id.clone(),
        feed_common::PartnerId::PartnerB,
        sequence_number,
        input.item_code.clone(),
        input.client_id.clone(),
        input.qty,
        input.price,
        input.tax / 100.0,
        transaction_time,
        metadata,
    )
}

#[allow(clippy::too_many_arguments)]
fn build(
    external_order_id: String,
    partner_id: feed_common::PartnerId,
    sequence_number: u64,
    product_id: String,
    customer_id: String,
    quantity: i64,
    unit_price: f64,
    tax_rate: f64,
    transaction_time: chrono::DateTime<Utc>,
    metadata: Option<serde_json::Value>,
) -> OrderEvent {
    let gross_amount = round2(quantity as f64 * unit_price);
    let tax_amount = round2(gross_amount * tax_rate);
    let net_amount = round2(gross_amount + tax_amount);

    OrderEvent {
        id: Uuid::new_v4(),
        external_order_id,
        partner_id,
        sequence_number,
        product_id,
        customer_id,
        quantity,
        unit_price: round2(unit_price),
        tax_rate,
        gross_amount,
        tax_amount,
        net_amount,
        transaction_time,
        processed_at: Utc::now(),
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::PartnerAInput;
    use proptest::prop_assert;

    fn sample_a() -> PartnerAInput {
        PartnerAInput {
            order_id: "ORD-1".to_string(),
            sku_id: "SKU-1".to_string(),
            customer_id: "C1".to_string(),
            quantity: 5,
            unit_price: 20.0,
            tax_rate: 0.1,
            transaction_time_ms: 1_705_315_800_000,
            metadata: None,
        }
    }

    #[test]
    fn computes_amounts_from_partner_a() {
        let event = normalize_a(&sample_a(), 1);
        assert_eq!(event.gross_amount, 100.0);
        assert_eq!(event.tax_amount, 10.0);
        assert_eq!(event.net_amount, 110.0);
        assert_eq!(event.sequence_number, 1);
    }

    #[test]
    fn partner_a_timestamp_is_formatted_as_utc_millis() {
        let event = normalize_a(&sample_a(), 1);
        let formatted = event.transaction_time.to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        assert_eq!(formatted, "2024-01-15T10:30:00.000Z");
    }

    #[test]
    fn partner_b_percentage_tax_becomes_decimal() {
        let input = PartnerBInput {
            transaction_id: "TXN-1".to_string(),
            item_code: "ITM-1".to_string(),
            client_id: "C2".to_string(),
            qty: 3,
            price: 20.0,
            tax: 15.0,
            purchase_time: "2024-01-15T10:30:00.000Z".to_string(),
            notes: None,
        };

        let event = normalize_b(&input, 1);
        assert_eq!(event.tax_rate, 0.15);
        assert_eq!(event.gross_amount, 60.0);
        assert_eq!(event.tax_amount, 9.0);
        assert_eq!(event.net_amount, 69.0);
    }

    #[test]
    fn partner_b_notes_become_metadata_passthrough() {
        let input = PartnerBInput {
            transaction_id: "TXN-2".to_string(),
            item_code: "ITM-1".to_string(),
            client_id: "C2".to_string(),
            qty: 1,
            price: 1.0,
            tax: 0.0,
            purchase_time: "2024-01-15T10:30:00.000Z".to_string(),
            notes: Some("gift wrap".to_string()),
        };

        let event = normalize_b(&input, 1);
        assert_eq!(event.metadata, Some(json!({ "notes": "gift wrap" })));
    }

    proptest::proptest! {
        #[test]
        fn net_amount_always_equals_gross_plus_tax(
            quantity in 1i64..10_000,
            unit_price in 0.01f64..10_000.0,
            tax_rate in 0.0f64..1.0,
        ) {
            let input = PartnerAInput {
                order_id: "ORD-PROP".to_string(),
                sku_id: "SKU-1".to_string(),
                customer_id: "C1".to_string(),
                quantity,
                unit_price,
                tax_rate,
                transaction_time_ms: 1_705_315_800_000,
                metadata: None,
            };
            let event = normalize_a(&input, 1);
            prop_assert!((event.net_amount - (event.gross_amount + event.tax_amount)).abs() < 1e-9);
        }
    }
}
