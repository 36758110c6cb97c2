//! Purchase orchestration: drives prepared rows through shipment creation,
//! rate selection, and purchase, strictly in order and one at a time.
//!
//! A single row's failure is recorded and the batch moves on; the batch only
//! fails outright when authentication is rejected up front or when every row
//! failed, in which case no label or document work is attempted.

use tracing::{error, info};

use crate::batch::ShipmentRow;
use crate::contract::{CarrierClient, PurchasedShipment};
use crate::error::{Result, ShipError};
use crate::fulfillment::FulfillmentRecord;
use crate::rates::select_rate;

/// One row's recorded failure: which row, and the carrier's message verbatim.
#[derive(Debug, Clone)]
pub struct RowFailure {
    pub row: usize,
    pub message: String,
}

/// Everything a completed batch produced: purchases in row order, per-row
/// failures, and fulfillment records for marketplace-linked rows.
#[derive(Debug, Default)]
pub struct PurchaseReport {
    pub purchased: Vec<PurchasedShipment>,
    pub failures: Vec<RowFailure>,
    pub fulfillments: Vec<FulfillmentRecord>,
}

impl PurchaseReport {
    pub fn shipment_ids(&self) -> Vec<String> {
        self.purchased.iter().map(|p| p.shipment_id.clone()).collect()
    }
}

/// Create, rate-select, and buy every row in order.
///
/// `progress` is invoked synchronously after each row; the caller decides how
/// to surface it. Returns `AllPurchasesFailed` when rows were attempted and
/// none succeeded.
pub async fn purchase_batch<C, F>(
    client: &C,
    rows: &[ShipmentRow],
    mut progress: F,
) -> Result<PurchaseReport>
where
    C: CarrierClient + ?Sized,
    F: FnMut(&str),
{
    let mut report = PurchaseReport::default();
    info!(rows = rows.len(), "starting bulk purchase");

    for (index, row) in rows.iter().enumerate() {
        match purchase_row(client, row).await {
            Ok(purchased) => {
                if let Some(link) = row.marketplace.as_ref().filter(|l| !l.order_id.is_empty()) {
                    report
                        .fulfillments
                        .push(FulfillmentRecord::new(link, &purchased));
                }
                info!(row = index, shipment_id = %purchased.shipment_id, "row purchased");
                report.purchased.push(purchased);
            }
            Err(e) => {
                let message = e.to_string();
                error!(row = index, error = %message, "row failed, continuing batch");
                report.failures.push(RowFailure { row: index, message });
            }
        }
        progress(&format!(
            "[{}/{}] bought {}, {} error(s)",
            index + 1,
            rows.len(),
            report.purchased.len(),
            report.failures.len()
        ));
    }

    if report.purchased.is_empty() && !rows.is_empty() {
        return Err(ShipError::AllPurchasesFailed { attempted: rows.len() });
    }
    info!(
        purchased = report.purchased.len(),
        failed = report.failures.len(),
        "bulk purchase finished"
    );
    Ok(report)
}

async fn purchase_row<C>(client: &C, row: &ShipmentRow) -> Result<PurchasedShipment>
where
    C: CarrierClient + ?Sized,
{
    let payload = row.to_shipment_create();
    let created = client.create_shipment(&payload).await?;
    let rate = select_rate(&created.rates, &row.carrier, &row.service)?;
    let rate_id = rate.id.clone();
    let bought = client.buy_shipment(&created.id, &rate_id).await?;

    let carrier_used = bought
        .selected_rate
        .as_ref()
        .map(|r| r.carrier.clone())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| row.carrier.clone());

    Ok(PurchasedShipment {
        shipment_id: if bought.id.is_empty() { created.id } else { bought.id },
        carrier_used,
        tracking_number: bought.tracking_code,
        tracking_url: bought.tracker.and_then(|t| t.public_url),
    })
}
