//! Bulk shipping-label purchase and PDF assembly.
//!
//! Converts marketplace order exports into carrier shipments, buys labels in
//! bulk with partial-failure tolerance, fetches and normalizes the rendered
//! label images, merges them into one printable PDF, and optionally reports
//! tracking data back to the marketplace.
//!
//! The pipeline is a plain sequential batch: rows are classified by the rule
//! engine, purchased one at a time through [`contract::CarrierClient`], and
//! the successes flow through the label cache and image transform into the
//! PDF assembler. Only authentication failure and an all-rows-failed batch
//! are fatal; everything else is accumulated and reported at the end.

pub mod batch;
pub mod carrier;
pub mod cli;
pub mod config;
pub mod contract;
pub mod error;
pub mod fulfillment;
pub mod labels;
pub mod pdf;
pub mod purchase;
pub mod rates;
pub mod rules;
pub mod secrets;
pub mod transform;
