//! Patient intake form.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Intake validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntakeError {
    #[error("Patient document is required")]
    MissingPatientId,

    #[error("Patient name is required")]
    MissingPatientName,

    #[error("Service is required")]
    MissingService,

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Select at least one special condition or 'none'")]
    NoConditionSelected,

    #[error("'None' cannot be combined with other special conditions")]
    ConflictingConditions,
}

/// A special condition that may grant priority.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SpecialCondition {
    Senior,
    Pregnant,
    Disabled,
    None,
}

/// Checkbox group for special conditions.
///
/// Starts with only `none` selected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpecialConditions {
    pub is_senior: bool,
    pub is_pregnant: bool,
    pub is_disabled: bool,
    pub is_none: bool,
}

impl Default for SpecialConditions {
    fn default() -> Self {
        Self {
            is_senior: false,
            is_pregnant: false,
            is_disabled: false,
            is_none: true,
        }
    }
}

impl SpecialConditions {
    /// Check or uncheck one box, keeping the group consistent.
    pub fn set(&mut self, condition: SpecialCondition, checked: bool) {
        match condition {
            SpecialCondition::None => {
                self.is_none = checked;
                if checked {
                    self.is_senior = false;
                    self.is_pregnant = false;
                    self.is_disabled = false;
                }
            }
            SpecialCondition::Senior => self.is_senior = checked,
            SpecialCondition::Pregnant => self.is_pregnant = checked,
            SpecialCondition::Disabled => self.is_disabled = checked,
        }

        if condition != SpecialCondition::None {
            self.is_none = !self.any_priority();
        }
    }

    fn any_priority(&self) -> bool {
        self.is_senior || self.is_pregnant || self.is_disabled
    }

    /// Turn priority derived from the group.
    pub fn grants_priority(&self) -> bool {
        self.any_priority()
    }

    pub fn validate(&self) -> Result<(), IntakeError> {
        match (self.is_none, self.any_priority()) {
            (true, true) => Err(IntakeError::ConflictingConditions),
            (false, false) => Err(IntakeError::NoConditionSelected),
            _ => Ok(()),
        }
    }
}

/// A patient's turn request as submitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TurnRequest {
    pub patient_id: String,
    pub patient_name: String,
    pub service: String,
    pub conditions: SpecialConditions,
}

impl TurnRequest {
    /// Trim fields and check the form constraints.
    pub fn normalized(&self) -> Result<TurnRequest, IntakeError> {
        let patient_id = self.patient_id.trim();
        let patient_name = self.patient_name.trim();
        let service = self.service.trim();

        if patient_id.is_empty() {
            return Err(IntakeError::MissingPatientId);
        }
        if patient_name.is_empty() {
            return Err(IntakeError::MissingPatientName);
        }
        if service.is_empty() {
            return Err(IntakeError::MissingService);
        }
        self.conditions.validate()?;

        Ok(TurnRequest {
            patient_id: patient_id.to_string(),
            patient_name: patient_name.to_string(),
            service: service.to_string(),
            conditions: self.conditions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selecting_condition_clears_none() {
        let mut conditions = SpecialConditions::default();
        assert!(conditions.is_none);

        conditions.set(SpecialCondition::Pregnant, true);
        assert!(!conditions.is_none);
        assert!(conditions.grants_priority());
    }

    #[test]
    fn test_deselecting_all_sets_none() {
        let mut conditions = SpecialConditions::default();
        conditions.set(SpecialCondition::Senior, true);
        conditions.set(SpecialCondition::Disabled, true);
        conditions.set(SpecialCondition::Senior, false);
        assert!(!conditions.is_none);

        conditions.set(SpecialCondition::Disabled, false);
        assert!(conditions.is_none);
        assert!(!conditions.grants_priority());
    }

    #[test]
    fn test_selecting_none_clears_others() {
        let mut conditions = SpecialConditions::default();
        conditions.set(SpecialCondition::Senior, true);
        conditions.set(SpecialCondition::None, true);
        assert_eq!(conditions, SpecialConditions::default());
    }

    #[test]
    fn test_conflicting_state_rejected() {
        let conditions = SpecialConditions {
            is_senior: true,
            is_pregnant: false,
            is_disabled: false,
            is_none: true,
        };
        assert_eq!(conditions.validate(), Err(IntakeError::ConflictingConditions));
    }

    #[test]
    fn test_empty_state_rejected() {
        let conditions = SpecialConditions {
            is_senior: false,
            is_pregnant: false,
            is_disabled: false,
            is_none: false,
        };
        assert_eq!(conditions.validate(), Err(IntakeError::NoConditionSelected));
    }

    #[test]
    fn test_request_normalization() {
        let request = TurnRequest {
            patient_id: " 1020304050 ".into(),
            patient_name: "  Lucía Gómez".into(),
            service: "Facturación ".into(),
            conditions: SpecialConditions::default(),
        };
        let normalized = request.normalized().unwrap();
        assert_eq!(normalized.patient_id, "1020304050");
        assert_eq!(normalized.patient_name, "Lucía Gómez");
        assert_eq!(normalized.service, "Facturación");
    }

    #[test]
    fn test_request_requires_fields() {
        let mut request = TurnRequest {
            patient_id: "   ".into(),
            patient_name: "Lucía".into(),
            service: "Facturación".into(),
            conditions: SpecialConditions::default(),
        };
        assert_eq!(request.normalized(), Err(IntakeError::MissingPatientId));

        request.patient_id = "1".into();
        request.patient_name = String::new();
        assert_eq!(request.normalized(), Err(IntakeError::MissingPatientName));
    }
}
