//! Label acquisition: durable PNG cache plus the ordered ladder of carrier
//! API shapes probed for a render URL.
//!
//! Once a shipment's label is cached, later requests never touch the network.
//! A cached file that fails the PNG signature check is treated as a miss; a
//! fresh download that fails the check is retried once and then surfaces as
//! a corruption error.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::contract::{CarrierClient, Shipment};
use crate::error::{Result, ShipError};

pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

const LABEL_FORMAT: &str = "PNG";

/// File-backed label store, one file per shipment id.
pub struct LabelCache {
    dir: PathBuf,
}

impl LabelCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, shipment_id: &str) -> PathBuf {
        let safe = shipment_id.replace('/', "_");
        self.dir.join(format!("{safe}.png"))
    }

    /// Return cached bytes when present and carrying the PNG signature;
    /// anything else reads as a miss.
    pub fn load(&self, shipment_id: &str) -> Option<Vec<u8>> {
        let path = self.path_for(shipment_id);
        let bytes = fs::read(&path).ok()?;
        if bytes.starts_with(&PNG_SIGNATURE) {
            debug!(shipment_id, path = ?path, "label cache hit");
            Some(bytes)
        } else {
            warn!(shipment_id, "cached label failed signature check, ignoring");
            None
        }
    }

    pub fn store(&self, shipment_id: &str, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(shipment_id), bytes)?;
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// The upstream API shapes probed, in order, for a label render URL. Each
/// probe swallows its own failure so the next shape gets a chance.
#[derive(Debug, Clone, Copy)]
enum AcquisitionStrategy {
    GenerateLabel,
    ConvertLabel,
}

const ACQUISITION_LADDER: [AcquisitionStrategy; 2] =
    [AcquisitionStrategy::GenerateLabel, AcquisitionStrategy::ConvertLabel];

impl AcquisitionStrategy {
    fn name(self) -> &'static str {
        match self {
            AcquisitionStrategy::GenerateLabel => "generate_label",
            AcquisitionStrategy::ConvertLabel => "convert_label",
        }
    }

    async fn probe<C>(self, client: &C, shipment_id: &str) -> Option<String>
    where
        C: CarrierClient + ?Sized,
    {
        let outcome = match self {
            AcquisitionStrategy::GenerateLabel => {
                client.generate_label(shipment_id, LABEL_FORMAT).await
            }
            AcquisitionStrategy::ConvertLabel => {
                client.convert_label(shipment_id, LABEL_FORMAT).await
            }
        };
        match outcome {
            Ok(shipment) => extract_label_url(&shipment),
            Err(e) => {
                debug!(shipment_id, strategy = self.name(), error = %e, "strategy failed");
                None
            }
        }
    }
}

/// Pull the PNG render URL off a shipment, if a label has been rendered.
pub fn extract_label_url(shipment: &Shipment) -> Option<String> {
    shipment
        .postage_label
        .as_ref()
        .and_then(|pl| pl.label_url.clone())
        .filter(|url| !url.is_empty())
}

/// Return verified label bytes for a purchased shipment, from cache when
/// possible. Caching is idempotent: after the first successful fetch the
/// network is never consulted again for this id.
pub async fn fetch_or_cache<C>(
    client: &C,
    cache: &LabelCache,
    shipment_id: &str,
    progress: &mut dyn FnMut(&str),
) -> Result<Vec<u8>>
where
    C: CarrierClient + ?Sized,
{
    if let Some(bytes) = cache.load(shipment_id) {
        progress(&format!("Using cached label for {shipment_id}"));
        return Ok(bytes);
    }

    progress(&format!("Generating label for {shipment_id}"));

    // A corrupt download gets one full re-fetch before surfacing.
    for attempt in 0..2 {
        let bytes = fetch_fresh(client, shipment_id, progress).await?;
        if bytes.starts_with(&PNG_SIGNATURE) {
            cache.store(shipment_id, &bytes)?;
            info!(shipment_id, size = bytes.len(), "label fetched and cached");
            return Ok(bytes);
        }
        warn!(shipment_id, attempt, "downloaded label failed signature check");
    }
    Err(ShipError::CacheCorruption {
        shipment_id: shipment_id.to_string(),
    })
}

async fn fetch_fresh<C>(
    client: &C,
    shipment_id: &str,
    progress: &mut dyn FnMut(&str),
) -> Result<Vec<u8>>
where
    C: CarrierClient + ?Sized,
{
    let shipment = client.retrieve_shipment(shipment_id).await?;

    let mut url = None;
    for strategy in ACQUISITION_LADDER {
        if let Some(found) = strategy.probe(client, &shipment.id).await {
            debug!(shipment_id, strategy = strategy.name(), "strategy yielded render URL");
            url = Some(found);
            break;
        }
    }

    let url = match url {
        Some(url) => url,
        None => {
            progress("No API shape yielded a URL, using direct label endpoint");
            let rendered = client.render_label(&shipment.id, LABEL_FORMAT).await?;
            extract_label_url(&rendered).ok_or_else(|| ShipError::NoLabelUrl {
                shipment_id: shipment_id.to_string(),
            })?
        }
    };

    client.download(&url).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_path_sanitizes_separators() {
        let cache = LabelCache::new("/tmp/labels");
        let path = cache.path_for("shp/123");
        assert_eq!(path.file_name().unwrap(), "shp_123.png");
    }

    #[test]
    fn corrupt_cache_entry_reads_as_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LabelCache::new(dir.path());
        cache.store("shp_1", b"not a png").unwrap();
        assert!(cache.load("shp_1").is_none());

        let mut valid = PNG_SIGNATURE.to_vec();
        valid.extend_from_slice(b"rest");
        cache.store("shp_1", &valid).unwrap();
        assert_eq!(cache.load("shp_1").unwrap(), valid);
    }
}
