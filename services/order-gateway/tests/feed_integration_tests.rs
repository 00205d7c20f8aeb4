//! End-to-end scenarios and boundary cases exercised against the
//! `OrderGateway` facade, mirroring how a transport layer would drive
//! the core.

use feed_common::{GatewayConfig, PartnerId};
use order_gateway::{OrderGateway, SubmissionOutcome};
use serde_json::json;

fn gateway() -> OrderGateway {
    OrderGateway::new(&GatewayConfig::default())
}

fn partner_a_payload(order_id: &str, quantity: i64) -> serde_json::Value {
    json!({
        "orderId": order_id,
        "skuId": "SKU-1",
        "customerId": "C1",
        "quantity": quantity,
        "unitPrice": 20.0,
        "taxRate": 0.1,
        "transactionTimeMs": 1_705_315_800_000i64,
    })
}

// E1
#[tokio::test]
async fn accepted_order_has_computed_amounts_and_sequence_one() {
    let gateway = gateway();
    let outcome = gateway.feed.submit(PartnerId::PartnerA, partner_a_payload("ORD-1", 5)).await;

    let order = match outcome {
        SubmissionOutcome::Accepted(order) => order,
        SubmissionOutcome::Rejected(_) => panic!("expected acceptance"),
    };

    assert_eq!(order.sequence_number, 1);
    assert_eq!(order.gross_amount, 100.0);
    assert_eq!(order.tax_amount, 10.0);
    assert_eq!(order.net_amount, 110.0);
    assert_eq!(
        order.transaction_time.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "2024-01-15T10:30:00.000Z"
    );
}

// E2
#[tokio::test]
async fn sequence_numbers_are_dense_per_partner_and_independent_across_partners() {
    let gateway = gateway();
    for order_id in ["ORD-1", "ORD-2", "ORD-3"] {
        let outcome = gateway.feed.submit(PartnerId::PartnerA, partner_a_payload(order_id, 5)).await;
        assert!(outcome.is_accepted());
    }

    let b_payload = json!({
        "transactionId": "TXN-1",
        "itemCode": "ITM-1",
        "clientId": "C2",
        "qty": 3,
        "price": 20.0,
        "tax": 15.0,
        "purchaseTime": "2024-01-15T10:30:00.000Z",
    });
    let outcome = gateway.feed.submit(PartnerId::PartnerB, b_payload).await;
    match outcome {
        SubmissionOutcome::Accepted(order) => {
            assert_eq!(order.sequence_number, 1);
            assert_eq!(order.gross_amount, 60.0);
            assert_eq!(order.tax_rate, 0.15);
            assert_eq!(order.tax_amount, 9.0);
            assert_eq!(order.net_amount, 69.0);
        }
        SubmissionOutcome::Rejected(_) => panic!("expected acceptance"),
    }
}

// E3
#[tokio::test]
async fn rejected_submission_does_not_consume_a_sequence_number() {
    let gateway = gateway();
    let outcome = gateway.feed.submit(PartnerId::PartnerA, partner_a_payload("ORD-X", -5)).await;
    match outcome {
        SubmissionOutcome::Rejected(event) => {
            assert!(event.details.iter().any(|e| e.field == "quantity"));
        }
        SubmissionOutcome::Accepted(_) => panic!("expected rejection"),
    }

    let next = gateway.feed.submit(PartnerId::PartnerA, partner_a_payload("ORD-Y", 1)).await;
    match next {
        SubmissionOutcome::Accepted(order) => assert_eq!(order.sequence_number, 1),
        SubmissionOutcome::Rejected(_) => panic!("expected acceptance"),
    }
}

// E4
#[tokio::test]
async fn batch_with_one_bad_payload_accepts_the_rest_with_contiguous_sequence_numbers() {
    let gateway = gateway();
    let payloads = vec![
        partner_a_payload("ORD-1", 1),
        partner_a_payload("ORD-2", 0),
        partner_a_payload("ORD-3", 1),
    ];

    let outcomes = gateway.feed.submit_batch(PartnerId::PartnerA, payloads).await;
    assert_eq!(outcomes.len(), 3);

    let accepted: Vec<_> = outcomes
        .iter()
        .filter_map(|o| match o {
            SubmissionOutcome::Accepted(order) => Some(order.sequence_number),
            SubmissionOutcome::Rejected(_) => None,
        })
        .collect();
    assert_eq!(accepted, vec![1, 2]);
}

// E5
#[tokio::test]
async fn paginates_twenty_five_orders_across_three_pages_of_ten() {
    let gateway = gateway();
    for i in 1..=25 {
        let outcome = gateway
            .feed
            .submit(PartnerId::PartnerA, partner_a_payload(&format!("ORD-{i}"), 1))
            .await;
        assert!(outcome.is_accepted());
    }

    let mut params = std::collections::HashMap::new();
    params.insert("page".to_string(), "3".to_string());
    params.insert("pageSize".to_string(), "10".to_string());
    let page = gateway.query.list_orders(&params).unwrap();

    assert_eq!(page.data.len(), 5);
    assert_eq!(page.total, 25);
    assert_eq!(page.total_pages, 3);
    assert!(!page.has_more);
}

// E6
#[tokio::test]
async fn statistics_filtered_by_partner_match_expected_totals() {
    let gateway = gateway();
    for order_id in ["ORD-1", "ORD-2", "ORD-3"] {
        gateway.feed.submit(PartnerId::PartnerA, partner_a_payload(order_id, 5)).await;
    }

    let mut params = std::collections::HashMap::new();
    params.insert("partnerId".to_string(), "PARTNER_A".to_string());
    let stats = gateway.query.order_statistics(&params).unwrap();

    assert_eq!(stats.total_orders, 3);
    assert_eq!(stats.total_gross_amount, 300.0);
    assert_eq!(stats.average_order_value, 100.0);
    assert_eq!(stats.highest_sequence[&PartnerId::PartnerA], 3);
    assert_eq!(stats.highest_sequence[&PartnerId::PartnerB], 0);
}

// B1
#[tokio::test]
async fn zero_quantity_is_rejected() {
    let gateway = gateway();
    let outcome = gateway.feed.submit(PartnerId::PartnerA, partner_a_payload("ORD-1", 0)).await;
    match outcome {
        SubmissionOutcome::Rejected(event) => assert_eq!(event.error_code, order_gateway::ErrorCode::ZeroValue),
        SubmissionOutcome::Accepted(_) => panic!("expected rejection"),
    }
}

// B2
#[tokio::test]
async fn boundary_tax_rate_values_are_accepted_for_both_partners() {
    let gateway = gateway();

    let mut a_max_tax = partner_a_payload("ORD-1", 1);
    a_max_tax["taxRate"] = json!(1.0);
    assert!(gateway.feed.submit(PartnerId::PartnerA, a_max_tax).await.is_accepted());

    let b_max_tax = json!({
        "transactionId": "TXN-1",
        "itemCode": "ITM-1",
        "clientId": "C2",
        "qty": 1,
        "price": 10.0,
        "tax": 100.0,
        "purchaseTime": "2024-01-15T10:30:00.000Z",
    });
    assert!(gateway.feed.submit(PartnerId::PartnerB, b_max_tax).await.is_accepted());
}

// B3
#[tokio::test]
async fn whitespace_only_customer_id_is_rejected() {
    let gateway = gateway();
    let mut payload = partner_a_payload("ORD-1", 1);
    payload["customerId"] = json!("   ");
    assert!(!gateway.feed.submit(PartnerId::PartnerA, payload).await.is_accepted());
}

// B4
#[tokio::test]
async fn timestamp_before_year_2000_is_rejected() {
    let gateway = gateway();
    let mut payload = partner_a_payload("ORD-1", 1);
    payload["transactionTimeMs"] = json!(0i64);
    assert!(!gateway.feed.submit(PartnerId::PartnerA, payload).await.is_accepted());
}

// B5
#[tokio::test]
async fn malformed_partner_b_timestamp_is_rejected() {
    let gateway = gateway();
    let payload = json!({
        "transactionId": "TXN-1",
        "itemCode": "ITM-1",
        "clientId": "C2",
        "qty": 1,
        "price": 10.0,
        "tax": 0.0,
        "purchaseTime": "2024-13-45T99:99:99Z",
    });
    assert!(!gateway.feed.submit(PartnerId::PartnerB, payload).await.is_accepted());
}

// B6
#[tokio::test]
async fn unknown_partner_id_is_rejected_by_the_query_parser() {
    let gateway = gateway();
    let mut params = std::collections::HashMap::new();
    params.insert("partnerId".to_string(), "PARTNER_C".to_string());
    assert!(gateway.query.list_orders(&params).is_err());
}
