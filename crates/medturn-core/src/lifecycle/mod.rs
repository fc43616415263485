//! Turn lifecycle state machine.
//!
//! ```text
//! pending ──call──▶ called ──finish──▶ completed
//!                    │  ▲      └─finish (follow-up)──▶ waiting_doctor ──doctor call──▶ called_by_doctor
//!               miss │  │ recall                                                          │
//!                    ▼  │                                                   ┌─────────────┴────────────┐
//!                   missed                                        completed_by_doctor        missed_by_doctor
//! ```
//!
//! Transitions are pure: [`apply`] takes a turn and returns the updated
//! copy. Persisting it is the caller's job.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::models::{Professional, Turn, TurnStatus};

/// Lifecycle errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LifecycleError {
    #[error("Cannot {event} a turn in status {from}")]
    InvalidTransition { from: TurnStatus, event: &'static str },

    #[error("Already attending turn {0}; finish it before calling another")]
    AlreadyAttending(String),

    #[error("No turns waiting")]
    EmptyQueue,
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Something that happens to a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// Window staff calls the turn
    Call { module: String, professional: Professional },
    /// Window staff finishes; `requires_follow_up` routes to the doctor queue
    Finish { requires_follow_up: bool },
    /// Patient did not show up at the window
    MarkMissed,
    /// Window staff calls a missed turn again
    Recall { module: String, professional: Professional },
    /// Doctor calls the turn into a consultorio
    DoctorCall { consultorio: String, professional: Professional },
    /// Doctor finishes the consultation
    DoctorComplete,
    /// Patient did not show up for the doctor
    DoctorMarkMissed,
}

impl TurnEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TurnEvent::Call { .. } => "call",
            TurnEvent::Finish { .. } => "finish",
            TurnEvent::MarkMissed => "mark missed",
            TurnEvent::Recall { .. } => "recall",
            TurnEvent::DoctorCall { .. } => "doctor call",
            TurnEvent::DoctorComplete => "doctor complete",
            TurnEvent::DoctorMarkMissed => "doctor mark missed",
        }
    }

    /// Status a turn must be in for this event to apply.
    pub fn expected_status(&self) -> TurnStatus {
        match self {
            TurnEvent::Call { .. } => TurnStatus::Pending,
            TurnEvent::Finish { .. } | TurnEvent::MarkMissed => TurnStatus::Called,
            TurnEvent::Recall { .. } => TurnStatus::Missed,
            TurnEvent::DoctorCall { .. } => TurnStatus::WaitingDoctor,
            TurnEvent::DoctorComplete | TurnEvent::DoctorMarkMissed => TurnStatus::CalledByDoctor,
        }
    }

    /// Status after the event.
    pub fn target_status(&self) -> TurnStatus {
        match self {
            TurnEvent::Call { .. } | TurnEvent::Recall { .. } => TurnStatus::Called,
            TurnEvent::Finish {
                requires_follow_up: true,
            } => TurnStatus::WaitingDoctor,
            TurnEvent::Finish {
                requires_follow_up: false,
            } => TurnStatus::Completed,
            TurnEvent::MarkMissed => TurnStatus::Missed,
            TurnEvent::DoctorCall { .. } => TurnStatus::CalledByDoctor,
            TurnEvent::DoctorComplete => TurnStatus::CompletedByDoctor,
            TurnEvent::DoctorMarkMissed => TurnStatus::MissedByDoctor,
        }
    }
}

/// Whether any event moves `from` to `to`.
pub fn is_valid_transition(from: TurnStatus, to: TurnStatus) -> bool {
    use TurnStatus::*;
    matches!(
        (from, to),
        (Pending, Called)
            | (Called, WaitingDoctor)
            | (Called, Completed)
            | (Called, Missed)
            | (Missed, Called)
            | (WaitingDoctor, CalledByDoctor)
            | (CalledByDoctor, CompletedByDoctor)
            | (CalledByDoctor, MissedByDoctor)
    )
}

/// Apply `event` to `turn` at time `now`, returning the updated turn.
pub fn apply(turn: &Turn, event: &TurnEvent, now: DateTime<Utc>) -> LifecycleResult<Turn> {
    if turn.status != event.expected_status() {
        return Err(LifecycleError::InvalidTransition {
            from: turn.status,
            event: event.name(),
        });
    }

    let mut next = turn.clone();
    next.status = event.target_status();

    match event {
        TurnEvent::Call {
            module,
            professional,
        } => {
            next.called_at = Some(now);
            assign(&mut next, module, professional);
        }
        TurnEvent::Recall {
            module,
            professional,
        } => {
            // The new call must sort after the no-show it replaces
            let floor = turn
                .missed_at
                .map(|missed| missed + Duration::milliseconds(1));
            next.called_at = Some(match floor {
                Some(floor) if floor > now => floor,
                _ => now,
            });
            assign(&mut next, module, professional);
        }
        TurnEvent::DoctorCall {
            consultorio,
            professional,
        } => {
            next.called_at = Some(now);
            assign(&mut next, consultorio, professional);
        }
        TurnEvent::Finish { .. } => next.completed_at = Some(now),
        TurnEvent::MarkMissed => next.missed_at = Some(now),
        TurnEvent::DoctorComplete => next.doctor_completed_at = Some(now),
        TurnEvent::DoctorMarkMissed => next.doctor_missed_at = Some(now),
    }

    debug_assert!(is_valid_transition(turn.status, next.status));
    Ok(next)
}

fn assign(turn: &mut Turn, module: &str, professional: &Professional) {
    turn.module = Some(module.to_string());
    turn.professional_id = Some(professional.id.clone());
    turn.professional_display_name = Some(professional.display_name.clone());
}

/// Reject a call while the professional still holds an active turn.
pub fn ensure_not_attending(held: &[Turn]) -> LifecycleResult<()> {
    match held.iter().find(|t| t.status.is_active_call()) {
        Some(turn) => Err(LifecycleError::AlreadyAttending(turn.turn_number.clone())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
    }

    fn pending_turn() -> Turn {
        Turn::new(
            "F-001".into(),
            "Facturación".into(),
            "1020304050".into(),
            "Lucía Gómez".into(),
            false,
            t0(),
        )
    }

    fn ana() -> Professional {
        Professional {
            id: "uid-ana".into(),
            display_name: "Ana Torres".into(),
        }
    }

    fn call() -> TurnEvent {
        TurnEvent::Call {
            module: "Ventanilla 1".into(),
            professional: ana(),
        }
    }

    #[test]
    fn test_call_stamps_and_assigns() {
        let called = apply(&pending_turn(), &call(), t0() + Duration::minutes(3)).unwrap();
        assert_eq!(called.status, TurnStatus::Called);
        assert_eq!(called.called_at, Some(t0() + Duration::minutes(3)));
        assert_eq!(called.module.as_deref(), Some("Ventanilla 1"));
        assert_eq!(called.professional_id.as_deref(), Some("uid-ana"));
        assert_eq!(called.professional_display_name.as_deref(), Some("Ana Torres"));
    }

    #[test]
    fn test_finish_routes_by_follow_up_flag() {
        let called = apply(&pending_turn(), &call(), t0()).unwrap();

        let to_doctor = apply(
            &called,
            &TurnEvent::Finish {
                requires_follow_up: true,
            },
            t0() + Duration::minutes(5),
        )
        .unwrap();
        assert_eq!(to_doctor.status, TurnStatus::WaitingDoctor);
        assert_eq!(to_doctor.completed_at, Some(t0() + Duration::minutes(5)));

        let done = apply(
            &called,
            &TurnEvent::Finish {
                requires_follow_up: false,
            },
            t0() + Duration::minutes(5),
        )
        .unwrap();
        assert_eq!(done.status, TurnStatus::Completed);
    }

    #[test]
    fn test_recall_after_missed() {
        let called = apply(&pending_turn(), &call(), t0()).unwrap();
        let missed = apply(&called, &TurnEvent::MarkMissed, t0() + Duration::minutes(2)).unwrap();
        assert_eq!(missed.missed_at, Some(t0() + Duration::minutes(2)));

        let bruno = Professional {
            id: "uid-bruno".into(),
            display_name: "Bruno Díaz".into(),
        };
        let recalled = apply(
            &missed,
            &TurnEvent::Recall {
                module: "Ventanilla 2".into(),
                professional: bruno,
            },
            t0() + Duration::minutes(4),
        )
        .unwrap();
        assert_eq!(recalled.status, TurnStatus::Called);
        assert!(recalled.called_at.unwrap() > recalled.missed_at.unwrap());
        assert_eq!(recalled.module.as_deref(), Some("Ventanilla 2"));
        assert_eq!(recalled.professional_id.as_deref(), Some("uid-bruno"));
    }

    #[test]
    fn test_recall_in_same_instant_still_after_missed() {
        let called = apply(&pending_turn(), &call(), t0()).unwrap();
        let missed = apply(&called, &TurnEvent::MarkMissed, t0()).unwrap();
        let recalled = apply(
            &missed,
            &TurnEvent::Recall {
                module: "Ventanilla 1".into(),
                professional: ana(),
            },
            t0(),
        )
        .unwrap();
        assert!(recalled.called_at.unwrap() > recalled.missed_at.unwrap());
    }

    #[test]
    fn test_doctor_path() {
        let called = apply(&pending_turn(), &call(), t0()).unwrap();
        let waiting = apply(
            &called,
            &TurnEvent::Finish {
                requires_follow_up: true,
            },
            t0() + Duration::minutes(5),
        )
        .unwrap();

        let doctor = Professional {
            id: "uid-doc".into(),
            display_name: "Dra. Ruiz".into(),
        };
        let with_doctor = apply(
            &waiting,
            &TurnEvent::DoctorCall {
                consultorio: "Consultorio 3".into(),
                professional: doctor,
            },
            t0() + Duration::minutes(20),
        )
        .unwrap();
        assert_eq!(with_doctor.status, TurnStatus::CalledByDoctor);
        assert_eq!(with_doctor.called_at, Some(t0() + Duration::minutes(20)));
        assert_eq!(with_doctor.module.as_deref(), Some("Consultorio 3"));
        // Reception stamp survives
        assert_eq!(with_doctor.completed_at, Some(t0() + Duration::minutes(5)));

        let done = apply(&with_doctor, &TurnEvent::DoctorComplete, t0() + Duration::minutes(35)).unwrap();
        assert_eq!(done.status, TurnStatus::CompletedByDoctor);
        assert_eq!(done.doctor_completed_at, Some(t0() + Duration::minutes(35)));

        let no_show = apply(&with_doctor, &TurnEvent::DoctorMarkMissed, t0() + Duration::minutes(25)).unwrap();
        assert_eq!(no_show.status, TurnStatus::MissedByDoctor);
        assert_eq!(no_show.doctor_missed_at, Some(t0() + Duration::minutes(25)));
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let pending = pending_turn();
        let err = apply(&pending, &TurnEvent::MarkMissed, t0()).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::InvalidTransition {
                from: TurnStatus::Pending,
                event: "mark missed"
            }
        );

        // Cannot skip straight to the doctor
        assert!(apply(
            &pending,
            &TurnEvent::DoctorCall {
                consultorio: "Consultorio 1".into(),
                professional: ana(),
            },
            t0()
        )
        .is_err());

        // Terminal states accept nothing
        let mut done = pending_turn();
        done.status = TurnStatus::Completed;
        assert!(apply(&done, &call(), t0()).is_err());
    }

    #[test]
    fn test_ensure_not_attending() {
        assert!(ensure_not_attending(&[]).is_ok());

        let called = apply(&pending_turn(), &call(), t0()).unwrap();
        assert_eq!(
            ensure_not_attending(&[called]),
            Err(LifecycleError::AlreadyAttending("F-001".into()))
        );
    }

    #[test]
    fn test_every_event_edge_is_a_valid_transition() {
        let events = [
            call(),
            TurnEvent::Finish {
                requires_follow_up: true,
            },
            TurnEvent::Finish {
                requires_follow_up: false,
            },
            TurnEvent::MarkMissed,
            TurnEvent::Recall {
                module: "Ventanilla 1".into(),
                professional: ana(),
            },
            TurnEvent::DoctorCall {
                consultorio: "Consultorio 1".into(),
                professional: ana(),
            },
            TurnEvent::DoctorComplete,
            TurnEvent::DoctorMarkMissed,
        ];
        for event in &events {
            assert!(
                is_valid_transition(event.expected_status(), event.target_status()),
                "{} is not a listed edge",
                event.name()
            );
        }
    }
}
