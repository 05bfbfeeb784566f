//! Synheart Circadian - On-device sleep debt, chronotype and energy modeling
//!
//! Circadian turns a user's nightly sleep history into a personal sleep
//! profile through a deterministic pipeline: record validation → workday /
//! free-day labeling → MCTQ baseline → chronotype → sleep debt → two-process
//! energy curve.
//!
//! ## Modules
//!
//! - **Sleep Debt**: recency-weighted debt against the user's sleep need
//! - **Baseline & Chronotype**: MCTQ mid-sleep on free days, catch-up corrected
//! - **Energy Curve**: 24-hour alertness from homeostatic and circadian processes
//! - **Data Sufficiency**: whether the history supports personalization
//!
//! ## Example
//!
//! ```ignore
//! use synheart_circadian::{analyze_history, ModelConfig};
//!
//! let report = analyze_history(&history, now, None, &ModelConfig::default());
//! println!("{} h debt", report.debt.current_debt);
//! ```

pub mod adapters;
pub mod baseline;
pub mod cache;
pub mod chronotype;
pub mod clock;
pub mod config;
pub mod debt;
pub mod encoder;
pub mod energy;
pub mod error;
pub mod pipeline;
pub mod schema;
pub mod sufficiency;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use baseline::BaselineEstimator;
pub use cache::ProfileCache;
pub use chronotype::ChronotypeClassifier;
pub use config::ModelConfig;
pub use debt::SleepDebtCalculator;
pub use energy::EnergyCurveSimulator;
pub use error::ComputeError;
pub use pipeline::{analyze_history, sleep_report_from_json, CircadianProcessor};
pub use sufficiency::DataSufficiencyGate;

// Schema exports
pub use schema::{HistoryParser, RawSleepRecord, ValidationPolicy, SCHEMA_VERSION};

/// Engine version embedded in report envelopes
pub const CIRCADIAN_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for report envelopes
pub const PRODUCER_NAME: &str = "synheart-circadian";
