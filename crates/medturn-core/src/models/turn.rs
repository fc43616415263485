//! Turn models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::format_timestamp;

/// Lifecycle status of a turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    /// Waiting to be called at a window
    Pending,
    /// Being attended at a window
    Called,
    /// Finished at the window
    Completed,
    /// No-show at the window (recallable)
    Missed,
    /// Finished at the window, queued for a doctor
    WaitingDoctor,
    /// With a doctor
    CalledByDoctor,
    /// Finished with the doctor
    CompletedByDoctor,
    /// No-show for the doctor
    MissedByDoctor,
}

impl TurnStatus {
    pub const ALL: [TurnStatus; 8] = [
        TurnStatus::Pending,
        TurnStatus::Called,
        TurnStatus::Completed,
        TurnStatus::Missed,
        TurnStatus::WaitingDoctor,
        TurnStatus::CalledByDoctor,
        TurnStatus::CompletedByDoctor,
        TurnStatus::MissedByDoctor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TurnStatus::Pending => "pending",
            TurnStatus::Called => "called",
            TurnStatus::Completed => "completed",
            TurnStatus::Missed => "missed",
            TurnStatus::WaitingDoctor => "waiting_doctor",
            TurnStatus::CalledByDoctor => "called_by_doctor",
            TurnStatus::CompletedByDoctor => "completed_by_doctor",
            TurnStatus::MissedByDoctor => "missed_by_doctor",
        }
    }

    /// No transition leaves these.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnStatus::Completed | TurnStatus::CompletedByDoctor)
    }

    /// Someone is currently attending the patient.
    pub fn is_active_call(&self) -> bool {
        matches!(self, TurnStatus::Called | TurnStatus::CalledByDoctor)
    }
}

impl fmt::Display for TurnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognized status string.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Unknown turn status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for TurnStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TurnStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Staff member acting on a turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Professional {
    pub id: String,
    pub display_name: String,
}

/// One patient's queued request for a service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    /// Store-assigned id
    pub id: String,
    /// Display code, e.g. "F-042" (not unique)
    pub turn_number: String,
    /// Service label
    pub service: String,
    /// Patient document number
    pub patient_id: String,
    pub patient_name: String,
    /// Senior, pregnant or disabled
    pub priority: bool,
    pub status: TurnStatus,
    /// Window or consultorio that last handled the turn
    pub module: Option<String>,
    pub requested_at: DateTime<Utc>,
    /// Overwritten on recall and on doctor call
    pub called_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub missed_at: Option<DateTime<Utc>>,
    pub doctor_completed_at: Option<DateTime<Utc>>,
    pub doctor_missed_at: Option<DateTime<Utc>>,
    /// Last staff member who called or processed the turn
    pub professional_id: Option<String>,
    pub professional_display_name: Option<String>,
}

impl Turn {
    /// Create a new pending turn.
    pub fn new(
        turn_number: String,
        service: String,
        patient_id: String,
        patient_name: String,
        priority: bool,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            turn_number,
            service,
            patient_id,
            patient_name,
            priority,
            status: TurnStatus::Pending,
            module: None,
            requested_at,
            called_at: None,
            completed_at: None,
            missed_at: None,
            doctor_completed_at: None,
            doctor_missed_at: None,
            professional_id: None,
            professional_display_name: None,
        }
    }

    /// Whether `professional` currently holds this turn at `module`.
    pub fn is_held_by(&self, professional_id: &str, module: &str) -> bool {
        self.status.is_active_call()
            && self.professional_id.as_deref() == Some(professional_id)
            && self.module.as_deref() == Some(module)
    }

    /// Flatten into the analysis schema.
    pub fn to_analysis_record(&self) -> medturn_llm::AnalysisRecord {
        medturn_llm::AnalysisRecord {
            turn_number: self.turn_number.clone(),
            service: self.service.clone(),
            priority: self.priority,
            status: self.status.as_str().to_string(),
            module: self.module.clone(),
            professional: self.professional_display_name.clone(),
            requested_at: format_timestamp(&self.requested_at),
            called_at: self.called_at.as_ref().map(format_timestamp),
            completed_at: self.completed_at.as_ref().map(format_timestamp),
            missed_at: self.missed_at.as_ref().map(format_timestamp),
            doctor_completed_at: self.doctor_completed_at.as_ref().map(format_timestamp),
            doctor_missed_at: self.doctor_missed_at.as_ref().map(format_timestamp),
        }
    }
}
