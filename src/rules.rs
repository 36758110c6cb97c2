//! Rule-based parcel classification.
//!
//! Rules apply to letters only: a row already flagged as a package (by the
//! upstream detection heuristic) skips the rule scan entirely. The rule list
//! is kept sorted ascending by `max_items` and matching is first-match-wins,
//! so a row classifies against the lowest threshold that still covers its
//! item count. A rule whose `predefined_package` is the sentinel "Package"
//! promotes matching rows to manually-dimensioned packages instead.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Service tier every package row gets, regardless of configuration.
pub const PACKAGE_SERVICE: &str = "GroundAdvantage";

/// One threshold-keyed classification policy entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub max_items: u32,
    pub weight_oz: f64,
    pub machinable: bool,
    pub predefined_package: String,
}

impl Rule {
    /// True when this rule promotes matching rows to a package rather than
    /// describing a letter.
    pub fn promotes_to_package(&self) -> bool {
        self.predefined_package.trim().eq_ignore_ascii_case("package")
    }
}

/// The outcome of classifying one row.
///
/// The variant tag is the row's letter/package classification; it is derived
/// once here and carried forward as data, never re-derived downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParcelSpec {
    /// A predefined carrier package type with a fixed weight; no dimensions.
    /// `machinable` is tri-state: absent means the carrier decides.
    Letter {
        weight_oz: f64,
        machinable: Option<bool>,
        predefined_package: String,
    },
    /// Manually-dimensioned package. All fields start blank and must be
    /// completed before purchase.
    Package {
        length: Option<f64>,
        width: Option<f64>,
        height: Option<f64>,
        weight: Option<f64>,
    },
}

impl ParcelSpec {
    /// A package with every dimensional field blank, as produced by the
    /// detection hint or a promoting rule.
    pub fn blank_package() -> Self {
        ParcelSpec::Package {
            length: None,
            width: None,
            height: None,
            weight: None,
        }
    }

    pub fn is_package(&self) -> bool {
        matches!(self, ParcelSpec::Package { .. })
    }

    /// True when the row cannot be purchased yet: a package with any of
    /// length/width/height/weight missing or non-positive.
    pub fn needs_dimensions(&self) -> bool {
        match self {
            ParcelSpec::Letter { .. } => false,
            ParcelSpec::Package {
                length,
                width,
                height,
                weight,
            } => [length, width, height, weight]
                .iter()
                .any(|d| !matches!(d, Some(v) if *v > 0.0)),
        }
    }
}

/// Classify one row from its item count and the upstream package hint.
///
/// `rules` must already be sorted ascending by `max_items` (the config loader
/// guarantees this). When no threshold covers `item_count` the last rule acts
/// as the fallback. An empty rule list classifies everything as a blank
/// package, forcing manual entry rather than guessing a letter weight.
pub fn classify(rules: &[Rule], item_count: u32, is_package_hint: bool) -> ParcelSpec {
    if is_package_hint {
        return ParcelSpec::blank_package();
    }

    let rule = rules
        .iter()
        .find(|r| item_count <= r.max_items)
        .or_else(|| rules.last());

    let Some(rule) = rule else {
        debug!(item_count, "no rules configured, classifying as package");
        return ParcelSpec::blank_package();
    };

    if rule.promotes_to_package() {
        debug!(item_count, max_items = rule.max_items, "rule promoted row to package");
        return ParcelSpec::blank_package();
    }

    ParcelSpec::Letter {
        weight_oz: rule.weight_oz,
        machinable: Some(rule.machinable),
        predefined_package: rule.predefined_package.clone(),
    }
}

/// Map a classification to its shipping service tier.
///
/// Letters get the configured default; packages always ship ground.
pub fn service_for(spec: &ParcelSpec, default_service: &str) -> String {
    if spec.is_package() {
        PACKAGE_SERVICE.to_string()
    } else {
        default_service.to_string()
    }
}
