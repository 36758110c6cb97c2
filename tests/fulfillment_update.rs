use httpmock::prelude::*;
use tempfile::tempdir;

use shipbatch::error::ShipError;
use shipbatch::fulfillment::{export_csv, read_csv, FulfillmentRecord, MarketplaceClient};

fn record(order_id: &str) -> FulfillmentRecord {
    FulfillmentRecord {
        marketplace_order_id: order_id.to_string(),
        seller_label_number: "7".to_string(),
        customer_name: "Jane Doe".to_string(),
        carrier: "USPS".to_string(),
        tracking_number: "9400TRACK".to_string(),
        tracking_url: "https://track.example/9400TRACK".to_string(),
        status: "shipped".to_string(),
    }
}

#[tokio::test]
async fn successful_update_sends_tracking_fields_and_nulls() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/orders/MP-1/fulfillment")
                .header("X-ManaPool-Email", "seller@example.com")
                .header("X-ManaPool-Access-Token", "token-1")
                .json_body(serde_json::json!({
                    "status": "shipped",
                    "tracking_company": "USPS",
                    "tracking_number": "9400TRACK",
                    "tracking_url": "https://track.example/9400TRACK",
                    "in_transit_at": null,
                    "estimated_delivery_at": null,
                    "delivered_at": null,
                }));
            then.status(200).json_body(serde_json::json!({"ok": true}));
        })
        .await;

    let client =
        MarketplaceClient::with_base_url("seller@example.com", "token-1", &server.base_url())
            .unwrap();
    let summary = client
        .notify_all(&[record("MP-1")], "shipped", &mut |_| {})
        .await;

    mock.assert_async().await;
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn transient_failures_are_retried_up_to_the_bound() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(PUT).path("/orders/MP-2/fulfillment");
            then.status(503);
        })
        .await;

    let client =
        MarketplaceClient::with_base_url("seller@example.com", "token-1", &server.base_url())
            .unwrap();
    let summary = client
        .notify_all(&[record("MP-2")], "shipped", &mut |_| {})
        .await;

    assert_eq!(summary.updated, 0);
    assert_eq!(summary.failed, 1);
    // Bounded retry: exactly five attempts hit the server.
    assert_eq!(mock.hits_async().await, 5);
}

#[tokio::test]
async fn permanent_rejection_is_not_retried() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(PUT).path("/orders/MP-3/fulfillment");
            then.status(404).body("order not found");
        })
        .await;

    let client =
        MarketplaceClient::with_base_url("seller@example.com", "token-1", &server.base_url())
            .unwrap();
    let summary = client
        .notify_all(&[record("MP-3")], "shipped", &mut |_| {})
        .await;

    assert_eq!(summary.failed, 1);
    assert!(summary.errors[0].contains("404"));
    assert_eq!(mock.hits_async().await, 1);
}

#[tokio::test]
async fn records_without_order_id_are_skipped_not_fatal() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(PUT).path("/orders/MP-4/fulfillment");
            then.status(200);
        })
        .await;

    let client =
        MarketplaceClient::with_base_url("seller@example.com", "token-1", &server.base_url())
            .unwrap();
    let summary = client
        .notify_all(&[record(""), record("MP-4")], "shipped", &mut |_| {})
        .await;

    mock.assert_async().await;
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.failed, 1);
    assert!(summary.errors[0].contains("missing order id"));
}

#[test]
fn blank_credentials_are_an_auth_error() {
    let err = MarketplaceClient::new("", "token").unwrap_err();
    assert!(matches!(err, ShipError::Auth(_)));
    let err = MarketplaceClient::new("seller@example.com", " ").unwrap_err();
    assert!(matches!(err, ShipError::Auth(_)));
}

#[test]
fn fulfillment_csv_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fulfillment.csv");
    let records = vec![record("MP-1"), record("MP-2")];

    export_csv(&records, &path).unwrap();
    let loaded = read_csv(&path).unwrap();

    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].marketplace_order_id, "MP-1");
    assert_eq!(loaded[1].tracking_number, "9400TRACK");
    assert_eq!(loaded[0].status, "shipped");
}
