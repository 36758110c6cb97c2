//! Batch row schema: the canonical column set produced by the importer and
//! consumed by the purchase pipeline, plus CSV read/write and the conversion
//! from a prepared row to the carrier's shipment-create payload.

use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use tracing::{debug, info};

use crate::config::Config;
use crate::contract::{Address, Parcel, ShipmentCreate, ShipmentOptions};
use crate::error::Result;
use crate::rules::{classify, service_for, ParcelSpec};

/// Marketplace linkage carried by rows that originate from a marketplace
/// order; drives the optional fulfillment push after purchase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketplaceLink {
    pub order_id: String,
    pub seller_label_number: String,
    pub customer_name: String,
}

impl MarketplaceLink {
    pub fn is_empty(&self) -> bool {
        self.order_id.is_empty()
            && self.seller_label_number.is_empty()
            && self.customer_name.is_empty()
    }
}

/// One prepared shipment row, ready for purchase once any required package
/// dimensions are filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipmentRow {
    pub to: Address,
    pub from: Address,
    pub parcel: ParcelSpec,
    pub label_format: String,
    pub carrier: String,
    pub service: String,
    pub marketplace: Option<MarketplaceLink>,
}

impl ShipmentRow {
    /// Build the carrier payload, omitting any blank fields.
    pub fn to_shipment_create(&self) -> ShipmentCreate {
        let (parcel, machinable) = match &self.parcel {
            ParcelSpec::Letter {
                weight_oz,
                machinable,
                predefined_package,
            } => (
                Parcel {
                    predefined_package: Some(predefined_package.clone()),
                    weight: Some(*weight_oz),
                    ..Parcel::default()
                },
                *machinable,
            ),
            ParcelSpec::Package {
                length,
                width,
                height,
                weight,
            } => (
                Parcel {
                    predefined_package: None,
                    length: *length,
                    width: *width,
                    height: *height,
                    weight: *weight,
                },
                None,
            ),
        };
        let options = ShipmentOptions {
            label_format: self.label_format.clone(),
            machinable,
        };
        ShipmentCreate {
            to_address: self.to.clone(),
            from_address: self.from.clone(),
            parcel,
            options: if options.is_empty() { None } else { Some(options) },
        }
    }
}

/// A normalized order as handed over by the (out-of-scope) importer: address
/// fields, the item count, and the externally supplied package hint.
#[derive(Debug, Clone, Default)]
pub struct OrderRow {
    pub to: Address,
    pub item_count: u32,
    pub is_package_hint: bool,
    pub marketplace: Option<MarketplaceLink>,
}

/// Classify orders into prepared shipment rows using the configured rules,
/// default carrier/service, and sender address.
pub fn classify_orders(config: &Config, orders: &[OrderRow]) -> Vec<ShipmentRow> {
    orders
        .iter()
        .map(|order| {
            let spec = classify(&config.rules, order.item_count, order.is_package_hint);
            let service = service_for(&spec, &config.defaults.service);
            debug!(
                item_count = order.item_count,
                package = spec.is_package(),
                service = %service,
                "classified order"
            );
            ShipmentRow {
                to: order.to.clone(),
                from: config.from_address.clone(),
                parcel: spec,
                label_format: config.defaults.label_format.clone(),
                carrier: config.defaults.carrier.clone(),
                service,
                marketplace: order.marketplace.clone(),
            }
        })
        .collect()
}

/// Count of rows that still need manual length/width/height/weight.
pub fn missing_dimension_count(rows: &[ShipmentRow]) -> usize {
    rows.iter().filter(|r| r.parcel.needs_dimensions()).count()
}

const BATCH_COLUMNS: [&str; 23] = [
    "to_address.name",
    "to_address.company",
    "to_address.phone",
    "to_address.email",
    "to_address.street1",
    "to_address.street2",
    "to_address.city",
    "to_address.state",
    "to_address.zip",
    "to_address.country",
    "from_address.name",
    "from_address.street1",
    "from_address.street2",
    "from_address.city",
    "from_address.state",
    "from_address.zip",
    "from_address.country",
    "parcel.length",
    "parcel.width",
    "parcel.height",
    "parcel.weight",
    "parcel.predefined_package",
    "options.machinable",
];

const EXTRA_COLUMNS: [&str; 6] = [
    "options.label_format",
    "carrier",
    "service",
    "manapool.order_id",
    "manapool.seller_label_number",
    "manapool.customer_name",
];

struct ColumnView<'a> {
    headers: &'a csv::StringRecord,
    record: &'a csv::StringRecord,
}

impl ColumnView<'_> {
    fn get(&self, column: &str) -> String {
        self.headers
            .iter()
            .position(|h| h == column)
            .and_then(|i| self.record.get(i))
            .unwrap_or("")
            .trim()
            .to_string()
    }

    fn get_f64(&self, column: &str) -> Option<f64> {
        let raw = self.get(column);
        if raw.is_empty() {
            None
        } else {
            raw.parse().ok()
        }
    }

    fn get_bool(&self, column: &str) -> Option<bool> {
        match self.get(column).to_ascii_lowercase().as_str() {
            "true" | "t" | "1" | "yes" | "y" => Some(true),
            "false" | "f" | "0" | "no" | "n" => Some(false),
            _ => None,
        }
    }

    fn address(&self, prefix: &str) -> Address {
        Address {
            name: self.get(&format!("{prefix}name")),
            company: self.get(&format!("{prefix}company")),
            phone: self.get(&format!("{prefix}phone")),
            email: self.get(&format!("{prefix}email")),
            street1: self.get(&format!("{prefix}street1")),
            street2: self.get(&format!("{prefix}street2")),
            city: self.get(&format!("{prefix}city")),
            state: self.get(&format!("{prefix}state")).to_uppercase(),
            zip: self.get(&format!("{prefix}zip")),
            country: self.get(&format!("{prefix}country")).to_uppercase(),
        }
    }
}

/// Read prepared batch rows from a CSV with the canonical column set. A row
/// with a non-empty `parcel.predefined_package` is a letter; everything else
/// is a package whose dimensions come from the `parcel.*` columns.
pub fn read_batch(path: &Path) -> Result<Vec<ShipmentRow>> {
    let mut reader = ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record?;
        let view = ColumnView {
            headers: &headers,
            record: &record,
        };

        let predefined = view.get("parcel.predefined_package");
        let parcel = if predefined.is_empty() {
            ParcelSpec::Package {
                length: view.get_f64("parcel.length"),
                width: view.get_f64("parcel.width"),
                height: view.get_f64("parcel.height"),
                weight: view.get_f64("parcel.weight"),
            }
        } else {
            // A blank machinable column stays absent; the carrier decides.
            ParcelSpec::Letter {
                weight_oz: view.get_f64("parcel.weight").unwrap_or(0.0),
                machinable: view.get_bool("options.machinable"),
                predefined_package: predefined,
            }
        };

        let marketplace = MarketplaceLink {
            order_id: view.get("manapool.order_id"),
            seller_label_number: view.get("manapool.seller_label_number"),
            customer_name: view.get("manapool.customer_name"),
        };

        rows.push(ShipmentRow {
            to: view.address("to_address."),
            from: view.address("from_address."),
            parcel,
            label_format: {
                let f = view.get("options.label_format");
                if f.is_empty() { "PNG".to_string() } else { f }
            },
            carrier: view.get("carrier"),
            service: view.get("service"),
            marketplace: if marketplace.is_empty() { None } else { Some(marketplace) },
        });
    }

    info!(path = ?path, rows = rows.len(), "batch CSV loaded");
    Ok(rows)
}

/// Write prepared rows back out with the canonical column set.
pub fn write_batch(path: &Path, rows: &[ShipmentRow]) -> Result<()> {
    let mut writer = WriterBuilder::new().from_path(path)?;
    let header: Vec<&str> = BATCH_COLUMNS.iter().chain(EXTRA_COLUMNS.iter()).copied().collect();
    writer.write_record(&header)?;

    let fmt = |v: &Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
    for row in rows {
        let (length, width, height, weight, predefined, machinable) = match &row.parcel {
            ParcelSpec::Letter {
                weight_oz,
                machinable,
                predefined_package,
            } => (
                String::new(),
                String::new(),
                String::new(),
                weight_oz.to_string(),
                predefined_package.clone(),
                machinable.map(|m| m.to_string()).unwrap_or_default(),
            ),
            ParcelSpec::Package {
                length,
                width,
                height,
                weight,
            } => (
                fmt(length),
                fmt(width),
                fmt(height),
                fmt(weight),
                String::new(),
                String::new(),
            ),
        };
        let link = row.marketplace.clone().unwrap_or_default();
        writer.write_record([
            row.to.name.as_str(),
            row.to.company.as_str(),
            row.to.phone.as_str(),
            row.to.email.as_str(),
            row.to.street1.as_str(),
            row.to.street2.as_str(),
            row.to.city.as_str(),
            row.to.state.as_str(),
            row.to.zip.as_str(),
            row.to.country.as_str(),
            row.from.name.as_str(),
            row.from.street1.as_str(),
            row.from.street2.as_str(),
            row.from.city.as_str(),
            row.from.state.as_str(),
            row.from.zip.as_str(),
            row.from.country.as_str(),
            length.as_str(),
            width.as_str(),
            height.as_str(),
            weight.as_str(),
            predefined.as_str(),
            machinable.as_str(),
            row.label_format.as_str(),
            row.carrier.as_str(),
            row.service.as_str(),
            link.order_id.as_str(),
            link.seller_label_number.as_str(),
            link.customer_name.as_str(),
        ])?;
    }
    writer.flush()?;
    info!(path = ?path, rows = rows.len(), "batch CSV written");
    Ok(())
}

/// Read normalized orders for classification. Expects `to_address.*` columns
/// plus `item_count`, an optional `shipping_price` consulted by the detection
/// thresholds, and optional `manapool.*` linkage.
pub fn read_orders(path: &Path, config: &Config) -> Result<Vec<OrderRow>> {
    let mut reader = ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let mut orders = Vec::new();

    for record in reader.records() {
        let record = record?;
        let view = ColumnView {
            headers: &headers,
            record: &record,
        };
        let item_count = view
            .get("item_count")
            .parse::<u32>()
            .unwrap_or(0);
        let is_package_hint = view
            .get_f64("shipping_price")
            .map(|p| config.detection.price_means_package(p))
            .unwrap_or(false);
        let marketplace = MarketplaceLink {
            order_id: view.get("manapool.order_id"),
            seller_label_number: view.get("manapool.seller_label_number"),
            customer_name: view.get("manapool.customer_name"),
        };
        let mut to = view.address("to_address.");
        if to.country.is_empty() {
            to.country = config.defaults.country.clone();
        }
        orders.push(OrderRow {
            to,
            item_count,
            is_package_hint,
            marketplace: if marketplace.is_empty() { None } else { Some(marketplace) },
        });
    }

    info!(path = ?path, orders = orders.len(), "orders CSV loaded");
    Ok(orders)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter_row() -> ShipmentRow {
        ShipmentRow {
            to: Address {
                name: "Jane Doe".to_string(),
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

    #[test]
    fn letter_payload_has_no_dimensions() {
        let payload = letter_row().to_shipment_create();
        assert_eq!(payload.parcel.predefined_package.as_deref(), Some("Letter"));
        assert_eq!(payload.parcel.weight, Some(1.0));
        assert!(payload.parcel.length.is_none());
        assert_eq!(payload.options.as_ref().and_then(|o| o.machinable), Some(true));
    }

    #[test]
    fn blank_address_fields_are_omitted_from_json() {
        let payload = letter_row().to_shipment_create();
        let json = serde_json::to_value(&payload).unwrap();
        let to = json.get("to_address").unwrap().as_object().unwrap();
        assert!(to.contains_key("name"));
        assert!(!to.contains_key("street2"));
        assert!(!to.contains_key("company"));
    }

    #[test]
    fn package_payload_carries_dimensions() {
        let mut row = letter_row();
        row.parcel = ParcelSpec::Package {
            length: Some(6.0),
            width: Some(4.0),
            height: Some(1.0),
            weight: Some(3.0),
        };
        let payload = row.to_shipment_create();
        assert!(payload.parcel.predefined_package.is_none());
        assert_eq!(payload.parcel.length, Some(6.0));
        assert!(payload.options.as_ref().map(|o| o.machinable.is_none()).unwrap_or(true));
    }

    #[test]
    fn unset_machinable_stays_absent_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.csv");
        let mut row = letter_row();
        row.parcel = ParcelSpec::Letter {
            weight_oz: 1.0,
            machinable: None,
            predefined_package: "Letter".to_string(),
        };

        write_batch(&path, std::slice::from_ref(&row)).unwrap();
        let read = read_batch(&path).unwrap();
        assert_eq!(read[0].parcel, row.parcel);

        let payload = read[0].to_shipment_create();
        let options = payload.options.as_ref().unwrap();
        assert!(options.machinable.is_none());
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json["options"].get("machinable").is_none());
    }

    #[test]
    fn batch_csv_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.csv");
        let mut rows = vec![letter_row()];
        rows.push(ShipmentRow {
            parcel: ParcelSpec::Package {
                length: Some(6.0),
                width: Some(4.0),
                height: Some(1.0),
                weight: Some(3.0),
            },
            marketplace: Some(MarketplaceLink {
                order_id: "MP-1".to_string(),
                seller_label_number: "7".to_string(),
                customer_name: "Jane".to_string(),
            }),
            service: "GroundAdvantage".to_string(),
            ..letter_row()
        });

        write_batch(&path, &rows).unwrap();
        let read = read_batch(&path).unwrap();
        assert_eq!(read, rows);
    }
}
