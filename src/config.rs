//! Application configuration: classification rules, shipping defaults, the
//! sender address, and package-detection thresholds. Persisted as JSON;
//! missing sections fall back to built-in defaults field by field.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::contract::Address;
use crate::error::Result;
use crate::rules::Rule;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub defaults: Defaults,
    pub from_address: Address,
    pub rules: Vec<Rule>,
    pub detection: Detection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub carrier: String,
    pub service: String,
    pub label_format: String,
    pub country: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Defaults {
            carrier: "USPS".to_string(),
            service: "First".to_string(),
            label_format: "PNG".to_string(),
            country: "US".to_string(),
        }
    }
}

/// Package-detection thresholds. A row whose marketplace shipping price
/// equals one of these points (within tolerance) is treated as a package
/// before any rule is consulted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Detection {
    #[serde(alias = "manapool_shipping_equals_package")]
    pub package_price_points: Vec<f64>,
}

impl Default for Detection {
    fn default() -> Self {
        Detection {
            package_price_points: vec![0.0, 4.99, 9.99],
        }
    }
}

impl Detection {
    const TOLERANCE: f64 = 1e-6;

    pub fn price_means_package(&self, price: f64) -> bool {
        self.package_price_points
            .iter()
            .any(|p| (p - price).abs() <= Self::TOLERANCE)
    }
}

fn default_rules() -> Vec<Rule> {
    let rule = |max_items, weight_oz, machinable, predefined_package: &str| Rule {
        max_items,
        weight_oz,
        machinable,
        predefined_package: predefined_package.to_string(),
    };
    vec![
        rule(7, 1.0, true, "Letter"),
        rule(14, 2.0, true, "Letter"),
        rule(36, 3.5, false, "Letter"),
        rule(80, 6.0, true, "Flat"),
        rule(9999, 1.0, true, "Package"),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Config {
            defaults: Defaults::default(),
            from_address: Address::default(),
            rules: default_rules(),
            detection: Detection::default(),
        }
    }
}

impl Config {
    /// Load from a JSON file, normalizing the rule list. A missing file
    /// yields the built-in defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            info!(config_path = ?path, "no config file, using defaults");
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&content)?;
        config.normalize();
        info!(
            config_path = ?path,
            rules = config.rules.len(),
            "config loaded"
        );
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Restore the default rule set when the list is empty and keep it
    /// sorted ascending by threshold; classification relies on that order.
    pub fn normalize(&mut self) {
        if self.rules.is_empty() {
            warn!("config has no rules, restoring built-in defaults");
            self.rules = default_rules();
        }
        self.rules.sort_by_key(|r| r.max_items);
    }
}
