//! Long-wait detection.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Turn, TurnStatus};

/// Which wait exceeded its threshold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WaitStage {
    /// Waiting to be called at a window, measured from `requested_at`
    Window,
    /// Waiting for a doctor, measured from `completed_at`
    Doctor,
}

/// Thresholds per stage. A wait must exceed the threshold to be flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitThresholds {
    pub window: Duration,
    pub doctor: Duration,
}

impl Default for WaitThresholds {
    fn default() -> Self {
        Self {
            window: Duration::minutes(15),
            doctor: Duration::minutes(30),
        }
    }
}

/// A turn that has waited too long.
#[derive(Debug, Clone, PartialEq)]
pub struct LongWaitAlert {
    pub turn: Turn,
    pub stage: WaitStage,
    pub waited: Duration,
    /// Human-readable wait, e.g. "1 h 05 min"
    pub elapsed: String,
}

/// Flag waiting turns whose wait exceeds the stage threshold.
///
/// Result is sorted by `requested_at`, newest first.
pub fn detect_long_waits(
    turns: &[Turn],
    now: DateTime<Utc>,
    thresholds: &WaitThresholds,
) -> Vec<LongWaitAlert> {
    let mut alerts: Vec<LongWaitAlert> = turns
        .iter()
        .filter_map(|turn| {
            let (stage, reference, threshold) = match turn.status {
                TurnStatus::Pending => (WaitStage::Window, turn.requested_at, thresholds.window),
                TurnStatus::WaitingDoctor => {
                    (WaitStage::Doctor, turn.completed_at?, thresholds.doctor)
                }
                _ => return None,
            };
            let waited = now - reference;
            (waited > threshold).then(|| LongWaitAlert {
                turn: turn.clone(),
                stage,
                waited,
                elapsed: format_elapsed(waited),
            })
        })
        .collect();

    alerts.sort_by(|a, b| b.turn.requested_at.cmp(&a.turn.requested_at));
    alerts
}

/// Format a wait as "N min" or "H h MM min".
pub fn format_elapsed(waited: Duration) -> String {
    let minutes = waited.num_minutes().max(0);
    if minutes < 60 {
        format!("{} min", minutes)
    } else {
        format!("{} h {:02} min", minutes / 60, minutes % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap()
    }

    fn pending(number: &str, minutes_ago: i64) -> Turn {
        Turn::new(
            number.into(),
            "Facturación".into(),
            "1".into(),
            "Paciente".into(),
            false,
            now() - Duration::minutes(minutes_ago),
        )
    }

    fn waiting_doctor(number: &str, requested_ago: i64, completed_ago: i64) -> Turn {
        let mut turn = pending(number, requested_ago);
        turn.status = TurnStatus::WaitingDoctor;
        turn.completed_at = Some(now() - Duration::minutes(completed_ago));
        turn
    }

    #[test]
    fn test_window_threshold() {
        let alerts = detect_long_waits(
            &[pending("F-016", 16), pending("F-014", 14)],
            now(),
            &WaitThresholds::default(),
        );
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].turn.turn_number, "F-016");
        assert_eq!(alerts[0].stage, WaitStage::Window);
        assert_eq!(alerts[0].elapsed, "16 min");
    }

    #[test]
    fn test_window_threshold_is_exclusive() {
        let alerts = detect_long_waits(&[pending("F-015", 15)], now(), &WaitThresholds::default());
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_doctor_threshold_uses_completed_at() {
        let alerts = detect_long_waits(
            &[waiting_doctor("F-031", 60, 31), waiting_doctor("F-029", 60, 29)],
            now(),
            &WaitThresholds::default(),
        );
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].turn.turn_number, "F-031");
        assert_eq!(alerts[0].stage, WaitStage::Doctor);
    }

    #[test]
    fn test_other_statuses_ignored() {
        let mut called = pending("F-100", 90);
        called.status = TurnStatus::Called;
        let mut missing_completion = pending("F-101", 90);
        missing_completion.status = TurnStatus::WaitingDoctor;
        let alerts = detect_long_waits(
            &[called, missing_completion],
            now(),
            &WaitThresholds::default(),
        );
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_sorted_newest_request_first() {
        let alerts = detect_long_waits(
            &[
                pending("F-040", 40),
                waiting_doctor("F-050", 20, 45),
                pending("F-025", 25),
            ],
            now(),
            &WaitThresholds::default(),
        );
        let order: Vec<_> = alerts.iter().map(|a| a.turn.turn_number.as_str()).collect();
        assert_eq!(order, vec!["F-050", "F-025", "F-040"]);
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::seconds(59)), "0 min");
        assert_eq!(format_elapsed(Duration::minutes(16)), "16 min");
        assert_eq!(format_elapsed(Duration::minutes(65)), "1 h 05 min");
        assert_eq!(format_elapsed(Duration::minutes(130)), "2 h 10 min");
    }
}
