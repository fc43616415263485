//! Turn analysis with fixed fallbacks.

use crate::generation::{parse_summary_output, TextGenerator};
use crate::prompts::{make_analysis_prompt, SYSTEM_PROMPT};
use crate::records::{AnalysisInput, AnalysisRecord};

/// Returned when there is nothing to analyze. The generator is not called.
pub const NO_DATA_MESSAGE: &str = "No hay datos de turnos para analizar.";

/// Returned when the generator fails or produces an empty summary.
pub const FALLBACK_MESSAGE: &str =
    "No se pudo generar el análisis en este momento. Intente de nuevo más tarde.";

/// Summarizes turn batches through a [`TextGenerator`].
pub struct Summarizer<G: TextGenerator> {
    generator: G,
}

impl<G: TextGenerator> Summarizer<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Produce an analysis text. Never fails: errors degrade to
    /// [`FALLBACK_MESSAGE`].
    pub fn summarize(&self, records: Vec<AnalysisRecord>) -> String {
        let input = AnalysisInput::bounded(records);
        if input.is_empty() {
            return NO_DATA_MESSAGE.to_string();
        }

        let turns_json = match input.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize analysis input");
                return FALLBACK_MESSAGE.to_string();
            }
        };

        let raw = match self
            .generator
            .generate(SYSTEM_PROMPT, &make_analysis_prompt(&turns_json))
        {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, turns = input.turns.len(), "turn analysis failed");
                return FALLBACK_MESSAGE.to_string();
            }
        };

        match parse_summary_output(&raw) {
            Ok(output) if !output.summary.trim().is_empty() => {
                tracing::info!(turns = input.turns.len(), "turn analysis generated");
                output.summary
            }
            Ok(_) => {
                tracing::warn!("generator returned an empty summary");
                FALLBACK_MESSAGE.to_string()
            }
            Err(e) => {
                tracing::warn!(error = %e, "unparseable analysis output");
                FALLBACK_MESSAGE.to_string()
            }
        }
    }
}
