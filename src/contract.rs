//! Carrier API interface: wire types and the [`CarrierClient`] trait.
//!
//! The trait is the seam between the batch pipeline and the carrier's REST
//! API. It is implemented by the real HTTP client in [`crate::carrier`] and
//! by `mockall` mocks in tests; the label-render surface deliberately mirrors
//! the several upstream API shapes the acquisition ladder probes in order.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::Result;
use crate::rates::RateQuote;

/// A postal address. Blank fields are omitted from serialized payloads so the
/// carrier never sees empty strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub company: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub phone: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub street1: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub street2: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub city: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub state: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub zip: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub country: String,
}

/// Parcel payload: either a predefined package (letter path, weight only) or
/// manual dimensions. Absent fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parcel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predefined_package: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

/// Shipment options forwarded to the carrier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShipmentOptions {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label_format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machinable: Option<bool>,
}

impl ShipmentOptions {
    pub fn is_empty(&self) -> bool {
        self.label_format.is_empty() && self.machinable.is_none()
    }
}

/// Payload for the shipment-create call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShipmentCreate {
    pub to_address: Address,
    pub from_address: Address,
    pub parcel: Parcel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ShipmentOptions>,
}

/// Rendered-label block on a shipment, present once a label exists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostageLabel {
    #[serde(default)]
    pub label_url: Option<String>,
    #[serde(default)]
    pub label_pdf_url: Option<String>,
}

/// Tracker block on a purchased shipment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tracker {
    #[serde(default)]
    pub public_url: Option<String>,
}

/// A carrier shipment as returned by create/retrieve/buy/label calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Shipment {
    pub id: String,
    #[serde(default)]
    pub rates: Vec<RateQuote>,
    #[serde(default)]
    pub parcel: Option<Parcel>,
    #[serde(default)]
    pub selected_rate: Option<RateQuote>,
    #[serde(default)]
    pub postage_label: Option<PostageLabel>,
    #[serde(default)]
    pub tracking_code: Option<String>,
    #[serde(default)]
    pub tracker: Option<Tracker>,
}

/// The durable record of a successful buy. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchasedShipment {
    pub shipment_id: String,
    pub carrier_used: String,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
}

/// Async carrier API client.
///
/// All methods map one-to-one onto remote calls; the pipeline awaits them
/// strictly in sequence, so implementations need no internal rate limiting.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CarrierClient: Send + Sync {
    /// Create a shipment and read back its quoted rates.
    async fn create_shipment(&self, req: &ShipmentCreate) -> Result<Shipment>;

    /// Retrieve the current remote state of a shipment.
    async fn retrieve_shipment(&self, shipment_id: &str) -> Result<Shipment>;

    /// Purchase a shipment with one of its quoted rates.
    async fn buy_shipment(&self, shipment_id: &str, rate_id: &str) -> Result<Shipment>;

    /// Label render, newer API shape.
    async fn generate_label(&self, shipment_id: &str, file_format: &str) -> Result<Shipment>;

    /// Label render, older API shape.
    async fn convert_label(&self, shipment_id: &str, file_format: &str) -> Result<Shipment>;

    /// Direct label-render endpoint, used when no API-shape probe yields a
    /// URL. Implementations try a read-style call first and fall back to a
    /// create-style call if the first is rejected.
    async fn render_label(&self, shipment_id: &str, file_format: &str) -> Result<Shipment>;

    /// Fetch raw bytes from a render URL.
    async fn download(&self, url: &str) -> Result<Vec<u8>>;
}
