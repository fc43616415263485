//! Prompt templates for turn analysis.

/// System prompt for the analysis model.
pub const SYSTEM_PROMPT: &str = r#"You are an operations analyst for a hospital patient-flow system.
You receive a JSON list of patient turns. Each turn records the requested service,
whether the patient had priority (senior, pregnant or disabled), its final status,
the window or consultorio that handled it, the staff member, and the timestamps of
every stage it went through.

Status meanings:
- pending: waiting to be called at a window
- called: currently being attended at a window
- completed: finished at the window, no doctor needed
- missed: did not show up when called at the window
- waiting_doctor: finished at the window, waiting for a doctor
- called_by_doctor: currently with a doctor
- completed_by_doctor: finished with the doctor
- missed_by_doctor: did not show up when called by the doctor

Write in Spanish. Be concrete and cite numbers from the data."#;

/// User prompt template for an analysis request.
pub fn make_analysis_prompt(turns_json: &str) -> String {
    format!(
        r#"Analyze these hospital turns:

{}

Cover the following points:
1. Demand by service: how many turns each service received.
2. Waiting time from requested_at to called_at, per service.
3. Processing time at the window, from called_at to completed_at or missed_at.
4. Waiting time for the doctor, from completed_at to the doctor call, and doctor consultation time.
5. Impact of priority: compare waiting times for priority and non-priority turns.
6. Staff volume: turns handled per professional and per window or consultorio.
7. Bottlenecks and no-shows, with concrete recommendations.

Return a JSON object with a single "summary" field containing the full analysis as text."#,
        turns_json
    )
}

/// JSON schema constraint for the structured output.
pub const OUTPUT_SCHEMA: &str = r#"{
  "type": "object",
  "properties": { "summary": { "type": "string" } },
  "required": ["summary"]
}"#;
