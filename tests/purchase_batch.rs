use shipbatch::batch::{MarketplaceLink, ShipmentRow};
use shipbatch::contract::{Address, MockCarrierClient, Shipment, Tracker};
use shipbatch::error::ShipError;
use shipbatch::purchase::purchase_batch;
use shipbatch::rates::RateQuote;
use shipbatch::rules::ParcelSpec;

fn row(name: &str) -> ShipmentRow {
    ShipmentRow {
        to: Address {
            name: name.to_string(),
            street1: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            zip: "62701".to_string(),
            country: "US".to_string(),
            ..Address::default()
        },
        from: Address::default(),
        parcel: ParcelSpec::Letter {
            weight_oz: 1.0,
            machinable: Some(true),
            predefined_package: "Letter".to_string(),
        },
        label_format: "PNG".to_string(),
        carrier: "USPS".to_string(),
        service: "First".to_string(),
        marketplace: None,
    }
}

fn usps_rate() -> RateQuote {
    RateQuote {
        id: "rate_1".to_string(),
        carrier: "USPS".to_string(),
        service: "First".to_string(),
        rate: "3.50".to_string(),
    }
}

#[tokio::test]
async fn one_failing_row_does_not_abort_the_batch() {
    let mut client = MockCarrierClient::new();

    // Row "bad" gets no quotes back, so rate selection fails for it; the
    // other two rows create and buy normally.
    client.expect_create_shipment().returning(|req| {
        let name = req.to_address.name.clone();
        if name == "bad" {
            Ok(Shipment {
                id: "shp_bad".to_string(),
                ..Shipment::default()
            })
        } else {
            Ok(Shipment {
                id: format!("shp_{name}"),
                rates: vec![usps_rate()],
                ..Shipment::default()
            })
        }
    });
    client.expect_buy_shipment().returning(|shipment_id, _rate_id| {
        Ok(Shipment {
            id: shipment_id.to_string(),
            tracking_code: Some("9400TRACK".to_string()),
            tracker: Some(Tracker {
                public_url: Some("https://track.example/9400TRACK".to_string()),
            }),
            selected_rate: Some(usps_rate()),
            ..Shipment::default()
        })
    });

    let rows = vec![row("a"), row("bad"), row("c")];
    let mut progress_calls = 0;
    let report = purchase_batch(&client, &rows, |_| progress_calls += 1)
        .await
        .unwrap();

    assert_eq!(report.purchased.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].row, 1);
    assert!(report.failures[0].message.contains("no rates"));
    assert_eq!(progress_calls, 3);

    // Order of successes mirrors input order.
    assert_eq!(report.purchased[0].shipment_id, "shp_a");
    assert_eq!(report.purchased[1].shipment_id, "shp_c");
    assert_eq!(report.purchased[0].carrier_used, "USPS");
    assert_eq!(report.purchased[0].tracking_number.as_deref(), Some("9400TRACK"));
}

#[tokio::test]
async fn all_rows_failing_is_fatal() {
    let mut client = MockCarrierClient::new();
    client.expect_create_shipment().returning(|_| {
        Err(ShipError::Validation(
            "HTTP 422: {\"error\":{\"message\":\"invalid address\"}}".to_string(),
        ))
    });

    let rows = vec![row("a"), row("b")];
    let err = purchase_batch(&client, &rows, |_| {}).await.unwrap_err();
    assert!(matches!(err, ShipError::AllPurchasesFailed { attempted: 2 }));
}

#[tokio::test]
async fn empty_batch_yields_empty_report() {
    let client = MockCarrierClient::new();
    let report = purchase_batch(&client, &[], |_| {}).await.unwrap();
    assert!(report.purchased.is_empty());
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn marketplace_rows_produce_fulfillment_records() {
    let mut client = MockCarrierClient::new();
    client.expect_create_shipment().returning(|_| {
        Ok(Shipment {
            id: "shp_1".to_string(),
            rates: vec![usps_rate()],
            ..Shipment::default()
        })
    });
    client.expect_buy_shipment().returning(|shipment_id, _| {
        Ok(Shipment {
            id: shipment_id.to_string(),
            tracking_code: Some("9400TRACK".to_string()),
            selected_rate: Some(usps_rate()),
            ..Shipment::default()
        })
    });

    let mut linked = row("jane");
    linked.marketplace = Some(MarketplaceLink {
        order_id: "MP-42".to_string(),
        seller_label_number: "7".to_string(),
        customer_name: "Jane".to_string(),
    });
    let rows = vec![linked, row("unlinked")];

    let report = purchase_batch(&client, &rows, |_| {}).await.unwrap();
    assert_eq!(report.purchased.len(), 2);
    assert_eq!(report.fulfillments.len(), 1);
    let record = &report.fulfillments[0];
    assert_eq!(record.marketplace_order_id, "MP-42");
    assert_eq!(record.carrier, "USPS");
    assert_eq!(record.tracking_number, "9400TRACK");
}
