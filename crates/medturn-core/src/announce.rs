//! Call announcements for the display board's speech synthesizer.

use serde::{Deserialize, Serialize};

use crate::models::{Turn, TurnStatus};

/// Language tag handed to the synthesizer.
pub const ANNOUNCEMENT_LANG: &str = "es-ES";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Announcement {
    pub text: String,
    pub lang: String,
}

/// Phrase announcing a called turn, or `None` if the turn is not being
/// called anywhere.
pub fn announcement_for(turn: &Turn) -> Option<Announcement> {
    if !matches!(turn.status, TurnStatus::Called | TurnStatus::CalledByDoctor) {
        return None;
    }
    let module = turn.module.as_deref()?.trim();
    if module.is_empty() {
        return None;
    }
    Some(Announcement {
        text: format!(
            "Turno {}, por favor acercarse a {}",
            turn.turn_number, module
        ),
        lang: ANNOUNCEMENT_LANG.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn turn(status: TurnStatus, module: Option<&str>) -> Turn {
        let mut turn = Turn::new(
            "F-042".into(),
            "Facturación".into(),
            "1".into(),
            "Paciente".into(),
            false,
            Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap(),
        );
        turn.status = status;
        turn.module = module.map(String::from);
        turn
    }

    #[test]
    fn test_called_turn() {
        let a = announcement_for(&turn(TurnStatus::Called, Some("Ventanilla 1"))).unwrap();
        assert_eq!(a.text, "Turno F-042, por favor acercarse a Ventanilla 1");
        assert_eq!(a.lang, "es-ES");

        let a = announcement_for(&turn(TurnStatus::CalledByDoctor, Some("Consultorio 3"))).unwrap();
        assert!(a.text.ends_with("Consultorio 3"));
    }

    #[test]
    fn test_nothing_to_announce() {
        assert!(announcement_for(&turn(TurnStatus::Pending, None)).is_none());
        assert!(announcement_for(&turn(TurnStatus::Completed, Some("Ventanilla 1"))).is_none());
        assert!(announcement_for(&turn(TurnStatus::Called, None)).is_none());
    }
}
