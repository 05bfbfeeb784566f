//! Report envelope encoding
//!
//! This module wraps a deterministic `SleepReport` into the JSON envelope
//! handed to reporting layers. Producer identity and computation time live
//! only in the envelope, so the report itself stays reproducible.

use crate::error::ComputeError;
use crate::schema::RejectedRecord;
use crate::types::SleepReport;
use crate::{CIRCADIAN_VERSION, PRODUCER_NAME};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current report envelope version
pub const REPORT_VERSION: &str = "1.0.0";

/// Producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Envelope around one report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEnvelope {
    pub report_version: String,
    pub producer: ReportProducer,
    /// RFC 3339
    pub computed_at_utc: String,
    pub report: SleepReport,
    /// Input records dropped during validation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedRecord>,
}

/// Encoder producing report envelopes
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Wrap a report, stamped with the current time
    pub fn encode(&self, report: SleepReport, rejected: Vec<RejectedRecord>) -> ReportEnvelope {
        self.encode_at(report, rejected, Utc::now())
    }

    /// Wrap a report with an explicit computation time
    pub fn encode_at(
        &self,
        report: SleepReport,
        rejected: Vec<RejectedRecord>,
        computed_at: DateTime<Utc>,
    ) -> ReportEnvelope {
        ReportEnvelope {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: CIRCADIAN_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: computed_at.to_rfc3339(),
            report,
            rejected,
        }
    }

    /// Encode to a pretty-printed JSON string
    pub fn encode_to_json(
        &self,
        report: SleepReport,
        rejected: Vec<RejectedRecord>,
    ) -> Result<String, ComputeError> {
        let envelope = self.encode(report, rejected);
        serde_json::to_string_pretty(&envelope).map_err(ComputeError::JsonError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::fixtures::office_worker;
    use crate::config::ModelConfig;
    use crate::pipeline::analyze_history;
    use chrono::{NaiveDate, TimeZone};
    use pretty_assertions::assert_eq;

    fn report() -> SleepReport {
        let now = NaiveDate::from_ymd_opt(2024, 3, 24)
            .unwrap()
            .and_hms_opt(11, 0, 0)
            .unwrap();
        analyze_history(&office_worker(3), now, None, &ModelConfig::default())
    }

    #[test]
    fn test_encode_envelope() {
        let encoder = ReportEncoder::with_instance_id("test-instance".to_string());
        let computed_at = Utc.with_ymd_and_hms(2024, 3, 24, 13, 0, 0).unwrap();
        let envelope = encoder.encode_at(report(), vec![], computed_at);

        assert_eq!(envelope.report_version, REPORT_VERSION);
        assert_eq!(envelope.producer.name, PRODUCER_NAME);
        assert_eq!(envelope.producer.version, CIRCADIAN_VERSION);
        assert_eq!(envelope.producer.instance_id, "test-instance");
        assert_eq!(envelope.computed_at_utc, "2024-03-24T13:00:00+00:00");
        assert_eq!(envelope.report, report());
    }

    #[test]
    fn test_encode_to_json() {
        let rejected = vec![RejectedRecord {
            index: 3,
            date: "bad".to_string(),
            reason: "Invalid date".to_string(),
        }];
        let json = ReportEncoder::new().encode_to_json(report(), rejected).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed.get("report_version").is_some());
        assert!(parsed["producer"]["instance_id"].as_str().is_some());
        assert_eq!(parsed["rejected"][0]["index"], 3);
        assert_eq!(parsed["report"]["debt"]["debt_category"], "moderate");
        assert_eq!(parsed["report"]["energy"]["current_zone"], "dip");
    }

    #[test]
    fn test_instance_ids_are_unique() {
        assert_ne!(
            ReportEncoder::new().instance_id(),
            ReportEncoder::new().instance_id()
        );
    }
}
