//! Report tracking data for marketplace-linked purchases back to the
//! marketplace.
//!
//! One authenticated update per record, strictly sequential. Transient HTTP
//! failures (429/5xx) are retried with bounded exponential backoff; the PUT
//! is idempotent so retrying is safe. A single record's failure never aborts
//! the run, mirroring the purchase batch's partial-failure policy.

use std::path::Path;
use std::time::Duration;

use csv::{ReaderBuilder, WriterBuilder};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::batch::MarketplaceLink;
use crate::contract::PurchasedShipment;
use crate::error::{Result, ShipError};

pub const DEFAULT_SELLER_BASE: &str = "https://manapool.com/api/v1/seller";

const MAX_ATTEMPTS: u32 = 5;
const BACKOFF_BASE_MS: u64 = 250;

/// Tracking data for one marketplace order, derived from a purchase and its
/// originating row.
#[derive(Debug, Clone, Serialize)]
pub struct FulfillmentRecord {
    pub marketplace_order_id: String,
    pub seller_label_number: String,
    pub customer_name: String,
    pub carrier: String,
    pub tracking_number: String,
    pub tracking_url: String,
    pub status: String,
}

impl FulfillmentRecord {
    pub fn new(link: &MarketplaceLink, purchased: &PurchasedShipment) -> Self {
        FulfillmentRecord {
            marketplace_order_id: link.order_id.clone(),
            seller_label_number: link.seller_label_number.clone(),
            customer_name: link.customer_name.clone(),
            carrier: purchased.carrier_used.clone(),
            tracking_number: purchased.tracking_number.clone().unwrap_or_default(),
            tracking_url: purchased.tracking_url.clone().unwrap_or_default(),
            status: "shipped".to_string(),
        }
    }
}

/// Wire payload for the fulfillment update. Absent values are serialized as
/// JSON null, which is what the marketplace expects.
#[derive(Debug, Serialize)]
struct FulfillmentPayload<'a> {
    status: &'a str,
    tracking_company: Option<&'a str>,
    tracking_number: Option<&'a str>,
    tracking_url: Option<&'a str>,
    in_transit_at: Option<String>,
    estimated_delivery_at: Option<String>,
    delivered_at: Option<String>,
}

fn retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn non_empty(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Aggregated outcome of a notification run.
#[derive(Debug, Default)]
pub struct NotifySummary {
    pub updated: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

#[derive(Debug)]
pub struct MarketplaceClient {
    http: Client,
    base_url: String,
    email: String,
    api_key: String,
}

impl MarketplaceClient {
    pub fn new(email: &str, api_key: &str) -> Result<Self> {
        Self::with_base_url(email, api_key, DEFAULT_SELLER_BASE)
    }

    pub fn with_base_url(email: &str, api_key: &str, base_url: &str) -> Result<Self> {
        if email.trim().is_empty() || api_key.trim().is_empty() {
            return Err(ShipError::Auth(
                "marketplace email and API key are required".to_string(),
            ));
        }
        Ok(Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            email: email.trim().to_string(),
            api_key: api_key.trim().to_string(),
        })
    }

    /// Push every record with a marketplace order id; skipped/failed records
    /// are tallied, never escalated.
    pub async fn notify_all(
        &self,
        records: &[FulfillmentRecord],
        status: &str,
        progress: &mut dyn FnMut(&str),
    ) -> NotifySummary {
        let mut summary = NotifySummary::default();
        info!(records = records.len(), status, "starting fulfillment updates");

        for (index, record) in records.iter().enumerate() {
            if record.marketplace_order_id.trim().is_empty() {
                summary.failed += 1;
                summary.errors.push(format!("Row {index}: missing order id"));
                continue;
            }
            match self.put_fulfillment(&record.marketplace_order_id, record, status).await {
                Ok(()) => summary.updated += 1,
                Err(e) => {
                    error!(row = index, order_id = %record.marketplace_order_id, error = %e, "fulfillment update failed");
                    summary.failed += 1;
                    summary.errors.push(format!("Row {index}: {e}"));
                }
            }
            progress(&format!(
                "Updated {} order(s); {} error(s)",
                summary.updated, summary.failed
            ));
        }

        info!(updated = summary.updated, failed = summary.failed, "fulfillment updates finished");
        summary
    }

    async fn put_fulfillment(
        &self,
        order_id: &str,
        record: &FulfillmentRecord,
        status: &str,
    ) -> Result<()> {
        let url = format!("{}/orders/{}/fulfillment", self.base_url, order_id);
        let payload = FulfillmentPayload {
            status,
            tracking_company: non_empty(&record.carrier),
            tracking_number: non_empty(&record.tracking_number),
            tracking_url: non_empty(&record.tracking_url),
            in_transit_at: None,
            estimated_delivery_at: None,
            delivered_at: None,
        };

        let mut last_error = None;
        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                let backoff = Duration::from_millis(BACKOFF_BASE_MS << (attempt - 1));
                debug!(order_id, attempt, backoff_ms = backoff.as_millis() as u64, "retrying fulfillment update");
                tokio::time::sleep(backoff).await;
            }
            let sent = self
                .http
                .put(&url)
                .header("X-ManaPool-Email", &self.email)
                .header("X-ManaPool-Access-Token", &self.api_key)
                .json(&payload)
                .send()
                .await;
            match sent {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) if retryable(resp.status()) => {
                    warn!(order_id, status = %resp.status(), attempt, "transient marketplace failure");
                    last_error = Some(ShipError::TransientNetwork(format!(
                        "HTTP {} from marketplace",
                        resp.status().as_u16()
                    )));
                }
                Ok(resp) => {
                    let code = resp.status().as_u16();
                    let body = resp.text().await.unwrap_or_default();
                    return Err(ShipError::Api(format!("HTTP {code}: {body}")));
                }
                Err(e) if e.is_connect() || e.is_timeout() => {
                    warn!(order_id, attempt, error = %e, "marketplace connection failure");
                    last_error = Some(ShipError::TransientNetwork(e.to_string()));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(last_error.unwrap_or(ShipError::TransientNetwork(
            "marketplace retries exhausted".to_string(),
        )))
    }
}

/// Load fulfillment records from a CSV written by [`export_csv`] (or by an
/// earlier buy run), tolerating the unprefixed aliases the marketplace's own
/// exports use.
pub fn read_csv(path: &Path) -> Result<Vec<FulfillmentRecord>> {
    let mut reader = ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let column = |record: &csv::StringRecord, names: &[&str]| -> String {
        names
            .iter()
            .filter_map(|name| {
                headers
                    .iter()
                    .position(|h| h == *name)
                    .and_then(|i| record.get(i))
            })
            .map(str::trim)
            .find(|v| !v.is_empty())
            .unwrap_or("")
            .to_string()
    };

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        records.push(FulfillmentRecord {
            marketplace_order_id: column(&row, &["manapool.order_id", "mp_order_id", "order_id"]),
            seller_label_number: column(
                &row,
                &["manapool.seller_label_number", "seller_label_number"],
            ),
            customer_name: column(&row, &["manapool.customer_name", "customer_name"]),
            carrier: column(&row, &["tracking_company", "carrier"]),
            tracking_number: column(&row, &["tracking_number"]),
            tracking_url: column(&row, &["tracking_url"]),
            status: {
                let s = column(&row, &["status"]);
                if s.is_empty() { "shipped".to_string() } else { s }
            },
        });
    }
    info!(path = ?path, records = records.len(), "fulfillment CSV loaded");
    Ok(records)
}

/// Export fulfillment records as CSV for manual bookkeeping.
pub fn export_csv(records: &[FulfillmentRecord], path: &Path) -> Result<()> {
    let mut writer = WriterBuilder::new().from_path(path)?;
    writer.write_record([
        "manapool.order_id",
        "manapool.seller_label_number",
        "manapool.customer_name",
        "tracking_company",
        "tracking_number",
        "tracking_url",
        "status",
    ])?;
    for record in records {
        writer.write_record([
            record.marketplace_order_id.as_str(),
            record.seller_label_number.as_str(),
            record.customer_name.as_str(),
            record.carrier.as_str(),
            record.tracking_number.as_str(),
            record.tracking_url.as_str(),
            record.status.as_str(),
        ])?;
    }
    writer.flush()?;
    info!(path = ?path, records = records.len(), "fulfillment CSV written");
    Ok(())
}
