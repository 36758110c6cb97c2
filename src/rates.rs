//! Rate selection for a created shipment.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ShipError};

/// One carrier-quoted shipping option. Quotes are ephemeral: they belong to a
/// single shipment-create response and their ids are only valid for buying
/// that shipment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateQuote {
    pub id: String,
    #[serde(default)]
    pub carrier: String,
    #[serde(default)]
    pub service: String,
    /// Quoted price as returned on the wire. Kept as a string: quotes with an
    /// unparseable price are excluded from cheapest-rate fallback.
    #[serde(default)]
    pub rate: String,
}

/// Choose one quote for purchase.
///
/// An exact (case-insensitive) carrier+service match always wins, even over a
/// cheaper quote. Without a desired pair, or when nothing matches, the
/// cheapest parseable quote is selected; ties resolve to the first in input
/// order. If every price is unparseable the first quote wins outright.
pub fn select_rate<'a>(
    rates: &'a [RateQuote],
    desired_carrier: &str,
    desired_service: &str,
) -> Result<&'a RateQuote> {
    if rates.is_empty() {
        return Err(ShipError::NoRatesAvailable);
    }

    if !desired_carrier.is_empty() && !desired_service.is_empty() {
        if let Some(hit) = rates.iter().find(|r| {
            r.carrier.eq_ignore_ascii_case(desired_carrier)
                && r.service.eq_ignore_ascii_case(desired_service)
        }) {
            debug!(rate_id = %hit.id, carrier = %hit.carrier, service = %hit.service, "matched desired rate");
            return Ok(hit);
        }
        debug!(
            desired_carrier,
            desired_service, "no quote matches desired pair, falling back to cheapest"
        );
    }

    let cheapest = rates
        .iter()
        .filter_map(|r| r.rate.trim().parse::<f64>().ok().map(|p| (r, p)))
        // min_by on a stable iterator keeps the first of equal prices only if
        // we compare strictly, so fold by "strictly less than".
        .fold(None::<(&RateQuote, f64)>, |best, (r, p)| match best {
            Some((_, bp)) if p >= bp => best,
            _ => Some((r, p)),
        });

    match cheapest {
        Some((rate, price)) => {
            debug!(rate_id = %rate.id, price, "selected cheapest rate");
            Ok(rate)
        }
        // All prices unparseable: take the first quote in input order.
        None => Ok(&rates[0]),
    }
}
