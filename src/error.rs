use thiserror::Error;

/// Crate-wide error taxonomy.
///
/// Row-scoped failures (`Validation`, `NoRatesAvailable`, `TransientNetwork`)
/// are recorded per row by the purchase orchestrator and never abort a batch.
/// Only `Auth` and `AllPurchasesFailed` are batch-fatal.
#[derive(Error, Debug)]
pub enum ShipError {
    #[error("carrier rejected shipment data: {0}")]
    Validation(String),

    #[error("no rates available for shipment")]
    NoRatesAvailable,

    #[error("transient network failure: {0}")]
    TransientNetwork(String),

    #[error("label bytes for {shipment_id} failed the PNG signature check")]
    CacheCorruption { shipment_id: String },

    #[error("missing or invalid credential: {0}")]
    Auth(String),

    #[error("all {attempted} rows failed to purchase")]
    AllPurchasesFailed { attempted: usize },

    #[error("no label render URL available for {shipment_id}")]
    NoLabelUrl { shipment_id: String },

    #[error("carrier API error: {0}")]
    Api(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV processing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("label image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ShipError>;
