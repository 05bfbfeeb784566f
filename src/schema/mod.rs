//! Sleep record input schema
//!
//! This module defines the vendor-agnostic wire shape for nightly sleep
//! records and the parser that validates them into a history.

mod adapter;
mod sleep_record;

pub use adapter::*;
pub use sleep_record::*;

/// Version tag of the raw sleep record schema
pub const SCHEMA_VERSION: &str = "sleep.raw_record.v1";
