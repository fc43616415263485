//! Queue selection policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Turn, TurnStatus};

/// Which waiting line to read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum QueueKind {
    /// Pending turns for one service (window staff)
    Staff { service: String },
    /// Turns waiting for a doctor, across all services
    Doctor,
}

impl QueueKind {
    pub fn waiting_status(&self) -> TurnStatus {
        match self {
            QueueKind::Staff { .. } => TurnStatus::Pending,
            QueueKind::Doctor => TurnStatus::WaitingDoctor,
        }
    }

    /// Whether `turn` belongs to this queue.
    pub fn admits(&self, turn: &Turn) -> bool {
        if turn.status != self.waiting_status() {
            return false;
        }
        match self {
            QueueKind::Staff { service } => &turn.service == service,
            QueueKind::Doctor => true,
        }
    }

    /// Arrival time used as tiebreak: request time for the staff queue,
    /// window completion time for the doctor queue.
    pub fn arrival(&self, turn: &Turn) -> DateTime<Utc> {
        match self {
            QueueKind::Staff { .. } => turn.requested_at,
            QueueKind::Doctor => turn.completed_at.unwrap_or(turn.requested_at),
        }
    }
}

/// Filter and order a queue: priority first, then earliest arrival.
///
/// The sort is stable, so equal keys keep their input order.
pub fn order_queue(kind: &QueueKind, turns: Vec<Turn>) -> Vec<Turn> {
    let mut queue: Vec<Turn> = turns.into_iter().filter(|t| kind.admits(t)).collect();
    queue.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| kind.arrival(a).cmp(&kind.arrival(b)))
    });
    queue
}

/// The turn that should be called next, if any.
pub fn next_to_call(kind: &QueueKind, turns: Vec<Turn>) -> Option<Turn> {
    order_queue(kind, turns).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn turn(number: &str, service: &str, priority: bool, requested_min: i64) -> Turn {
        Turn::new(
            number.into(),
            service.into(),
            format!("doc-{}", number),
            format!("Paciente {}", number),
            priority,
            t(requested_min),
        )
    }

    fn staff(service: &str) -> QueueKind {
        QueueKind::Staff {
            service: service.into(),
        }
    }

    #[test]
    fn test_priority_then_arrival() {
        let turns = vec![
            turn("F-001", "Facturación", false, 1),
            turn("F-002", "Facturación", true, 2),
            turn("F-003", "Facturación", false, 3),
        ];
        let order: Vec<_> = order_queue(&staff("Facturación"), turns)
            .into_iter()
            .map(|t| t.turn_number)
            .collect();
        assert_eq!(order, vec!["F-002", "F-001", "F-003"]);
    }

    #[test]
    fn test_staff_queue_filters_service_and_status() {
        let mut called = turn("F-004", "Facturación", true, 0);
        called.status = TurnStatus::Called;
        let turns = vec![
            turn("C-001", "Citas Médicas", true, 0),
            called,
            turn("F-005", "Facturación", false, 5),
        ];
        let next = next_to_call(&staff("Facturación"), turns).unwrap();
        assert_eq!(next.turn_number, "F-005");
    }

    #[test]
    fn test_doctor_queue_orders_by_completion() {
        let mut a = turn("F-010", "Facturación", false, 0);
        a.status = TurnStatus::WaitingDoctor;
        a.completed_at = Some(t(30));
        let mut b = turn("C-011", "Citas Médicas", false, 10);
        b.status = TurnStatus::WaitingDoctor;
        b.completed_at = Some(t(20));
        let mut c = turn("F-012", "Facturación", true, 15);
        c.status = TurnStatus::WaitingDoctor;
        c.completed_at = Some(t(40));

        let order: Vec<_> = order_queue(&QueueKind::Doctor, vec![a, b, c])
            .into_iter()
            .map(|t| t.turn_number)
            .collect();
        assert_eq!(order, vec!["F-012", "C-011", "F-010"]);
    }

    #[test]
    fn test_empty_queue() {
        assert!(next_to_call(&QueueKind::Doctor, vec![]).is_none());
    }
}
