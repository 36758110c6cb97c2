//! Reqwest implementation of [`CarrierClient`] against an EasyPost-shaped
//! REST API. The base URL is injectable so tests can point the client at a
//! local mock server.

use reqwest::{Client, Response, StatusCode};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::contract::{CarrierClient, Shipment, ShipmentCreate};
use crate::error::{Result, ShipError};

pub const DEFAULT_BASE_URL: &str = "https://api.easypost.com";

pub struct EasyPostClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl EasyPostClient {
    /// Build a client for the production API. Fails up front with an auth
    /// error when the key is blank, before any row is attempted.
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(ShipError::Auth("carrier API key is not set".to_string()));
        }
        Ok(Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn parse_shipment(&self, resp: Response) -> Result<Shipment> {
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        Ok(resp.json::<Shipment>().await?)
    }
}

/// Map a failed carrier response onto the error taxonomy, keeping any
/// structured JSON error body verbatim for diagnostics.
async fn error_from_response(resp: Response) -> ShipError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let detail = match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(v) => v.to_string(),
        Err(_) => body,
    };
    let message = format!("HTTP {}: {}", status.as_u16(), detail);
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        ShipError::Auth(message)
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        ShipError::TransientNetwork(message)
    } else if status == StatusCode::UNPROCESSABLE_ENTITY || status == StatusCode::BAD_REQUEST {
        ShipError::Validation(message)
    } else {
        ShipError::Api(message)
    }
}

#[async_trait::async_trait]
impl CarrierClient for EasyPostClient {
    async fn create_shipment(&self, req: &ShipmentCreate) -> Result<Shipment> {
        debug!(to = %req.to_address.name, "creating shipment");
        let resp = self
            .http
            .post(self.url("/v2/shipments"))
            .basic_auth(&self.api_key, Some(""))
            .json(&json!({ "shipment": req }))
            .send()
            .await?;
        let shipment = self.parse_shipment(resp).await?;
        info!(shipment_id = %shipment.id, rates = shipment.rates.len(), "shipment created");
        Ok(shipment)
    }

    async fn retrieve_shipment(&self, shipment_id: &str) -> Result<Shipment> {
        let resp = self
            .http
            .get(self.url(&format!("/v2/shipments/{shipment_id}")))
            .basic_auth(&self.api_key, Some(""))
            .send()
            .await?;
        self.parse_shipment(resp).await
    }

    async fn buy_shipment(&self, shipment_id: &str, rate_id: &str) -> Result<Shipment> {
        debug!(shipment_id, rate_id, "buying shipment");
        let resp = self
            .http
            .post(self.url(&format!("/v2/shipments/{shipment_id}/buy")))
            .basic_auth(&self.api_key, Some(""))
            .json(&json!({ "rate": { "id": rate_id } }))
            .send()
            .await?;
        let shipment = self.parse_shipment(resp).await?;
        info!(shipment_id = %shipment.id, tracking = ?shipment.tracking_code, "shipment purchased");
        Ok(shipment)
    }

    async fn generate_label(&self, shipment_id: &str, file_format: &str) -> Result<Shipment> {
        let resp = self
            .http
            .post(self.url(&format!("/v2/shipments/{shipment_id}/generate_label")))
            .basic_auth(&self.api_key, Some(""))
            .json(&json!({ "file_format": file_format }))
            .send()
            .await?;
        self.parse_shipment(resp).await
    }

    async fn convert_label(&self, shipment_id: &str, file_format: &str) -> Result<Shipment> {
        let resp = self
            .http
            .get(self.url(&format!("/v2/shipments/{shipment_id}/convert_label")))
            .basic_auth(&self.api_key, Some(""))
            .query(&[("file_format", file_format)])
            .send()
            .await?;
        self.parse_shipment(resp).await
    }

    async fn render_label(&self, shipment_id: &str, file_format: &str) -> Result<Shipment> {
        // Read-style call first; some API versions only accept the
        // create-style POST, so retry that way when the GET is rejected.
        let get_resp = self
            .http
            .get(self.url(&format!("/v2/shipments/{shipment_id}/label")))
            .basic_auth(&self.api_key, Some(""))
            .query(&[("file_format", file_format)])
            .send()
            .await?;
        if get_resp.status().is_success() {
            return self.parse_shipment(get_resp).await;
        }
        warn!(shipment_id, status = %get_resp.status(), "label GET rejected, retrying as POST");
        let post_resp = self
            .http
            .post(self.url(&format!("/v2/shipments/{shipment_id}/label")))
            .basic_auth(&self.api_key, Some(""))
            .json(&json!({ "file_format": file_format }))
            .send()
            .await?;
        self.parse_shipment(post_resp).await
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        Ok(resp.bytes().await?.to_vec())
    }
}
