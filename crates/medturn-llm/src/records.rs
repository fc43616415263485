//! Flattened turn records handed to the generator.

use serde::{Deserialize, Serialize};

/// Maximum number of records sent in a single analysis request.
pub const MAX_ANALYSIS_RECORDS: usize = 100;

/// One turn, flattened for analysis. Timestamps are ISO-8601 strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisRecord {
    pub turn_number: String,
    pub service: String,
    pub priority: bool,
    pub status: String,
    pub module: Option<String>,
    pub professional: Option<String>,
    pub requested_at: String,
    pub called_at: Option<String>,
    pub completed_at: Option<String>,
    pub missed_at: Option<String>,
    pub doctor_completed_at: Option<String>,
    pub doctor_missed_at: Option<String>,
}

/// Input schema of an analysis request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisInput {
    pub turns: Vec<AnalysisRecord>,
}

/// Output schema of an analysis request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub summary: String,
}

impl AnalysisInput {
    /// Build an input batch, keeping at most [`MAX_ANALYSIS_RECORDS`] records.
    pub fn bounded(mut turns: Vec<AnalysisRecord>) -> Self {
        turns.truncate(MAX_ANALYSIS_RECORDS);
        Self { turns }
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
pub(crate) fn sample_record(turn_number: &str) -> AnalysisRecord {
    AnalysisRecord {
        turn_number: turn_number.into(),
        service: "Facturación".into(),
        priority: false,
        status: "completed".into(),
        module: Some("Ventanilla 1".into()),
        professional: Some("Ana Torres".into()),
        requested_at: "2026-03-02T13:00:00.000Z".into(),
        called_at: Some("2026-03-02T13:05:00.000Z".into()),
        completed_at: Some("2026-03-02T13:09:00.000Z".into()),
        missed_at: None,
        doctor_completed_at: None,
        doctor_missed_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_truncates() {
        let records = (0..150)
            .map(|i| sample_record(&format!("F-{:03}", i % 1000)))
            .collect();
        let input = AnalysisInput::bounded(records);
        assert_eq!(input.turns.len(), MAX_ANALYSIS_RECORDS);
        assert_eq!(input.turns[0].turn_number, "F-000");
    }

    proptest::proptest! {
        #[test]
        fn prop_bounded_keeps_leading_records(count in 0usize..250) {
            let records: Vec<_> = (0..count)
                .map(|i| sample_record(&format!("F-{:03}", i % 1000)))
                .collect();
            let input = AnalysisInput::bounded(records.clone());
            proptest::prop_assert_eq!(input.turns.len(), count.min(MAX_ANALYSIS_RECORDS));
            proptest::prop_assert_eq!(&input.turns[..], &records[..input.turns.len()]);
            proptest::prop_assert_eq!(input.is_empty(), count == 0);
        }
    }

    #[test]
    fn test_json_uses_flat_fields() {
        let input = AnalysisInput::bounded(vec![sample_record("F-042")]);
        let json = input.to_json().unwrap();
        assert!(json.contains("\"turn_number\":\"F-042\""));
        assert!(json.contains("\"requested_at\":\"2026-03-02T13:00:00.000Z\""));
        assert!(json.contains("\"missed_at\":null"));
    }
}
