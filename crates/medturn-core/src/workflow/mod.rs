//! Staff and doctor desk operations.
//!
//! Each operation reads what it needs, applies one lifecycle event and
//! writes the result with a status-conditional update. If another session
//! moved the turn first, the write is refused with [`WorkflowError::Conflict`].

use thiserror::Error;

use crate::clock::Clock;
use crate::config::ServiceCatalog;
use crate::db::{Database, DbError};
use crate::lifecycle::{self, LifecycleError, TurnEvent};
use crate::models::{IntakeError, Professional, Turn, TurnRequest, TurnStatus};
use crate::queue::{
    detect_long_waits, next_to_call, order_queue, turn_number_at, LongWaitAlert, QueueKind,
    WaitThresholds,
};

/// Workflow errors.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error("Turn not found: {0}")]
    NotFound(String),

    #[error("Turn {0} was updated by another session")]
    Conflict(String),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Turn operations over a database handle and a clock.
pub struct TurnDesk<'a> {
    db: &'a Database,
    clock: &'a dyn Clock,
}

impl<'a> TurnDesk<'a> {
    pub fn new(db: &'a Database, clock: &'a dyn Clock) -> Self {
        Self { db, clock }
    }

    // =========================================================================
    // Intake
    // =========================================================================

    /// Register a patient's request as a new pending turn.
    pub fn request_turn(
        &self,
        request: &TurnRequest,
        catalog: &ServiceCatalog,
    ) -> WorkflowResult<Turn> {
        let request = request.normalized()?;
        let service = catalog
            .find_by_label(&request.service)
            .ok_or_else(|| IntakeError::UnknownService(request.service.clone()))?;

        let now = self.clock.now();
        let turn = Turn::new(
            turn_number_at(&service.prefix, &now),
            service.label.clone(),
            request.patient_id,
            request.patient_name,
            request.conditions.grants_priority(),
            now,
        );
        self.db.insert_turn(&turn)?;

        tracing::info!(
            turn = %turn.turn_number,
            service = %turn.service,
            priority = turn.priority,
            "turn requested"
        );
        Ok(turn)
    }

    // =========================================================================
    // Window staff
    // =========================================================================

    /// Call the next pending turn of `service` to `module`.
    pub fn call_next(
        &self,
        professional: &Professional,
        module: &str,
        service: &str,
    ) -> WorkflowResult<Turn> {
        let held = self
            .db
            .list_held_turns(&professional.id, module, Some(service))?;
        lifecycle::ensure_not_attending(&held)?;

        let kind = QueueKind::Staff {
            service: service.to_string(),
        };
        let candidates = self.db.list_turns_with_status(kind.waiting_status(), Some(service))?;
        let next = next_to_call(&kind, candidates).ok_or(LifecycleError::EmptyQueue)?;

        self.transition(
            &next,
            TurnEvent::Call {
                module: module.to_string(),
                professional: professional.clone(),
            },
        )
    }

    /// Finish a called turn; services flagged for follow-up go to the doctor queue.
    pub fn finish(&self, turn_id: &str, catalog: &ServiceCatalog) -> WorkflowResult<Turn> {
        let turn = self.load(turn_id)?;
        let requires_follow_up = catalog.requires_follow_up(&turn.service);
        self.transition(&turn, TurnEvent::Finish { requires_follow_up })
    }

    /// Mark a called turn as a no-show.
    pub fn mark_missed(&self, turn_id: &str) -> WorkflowResult<Turn> {
        let turn = self.load(turn_id)?;
        self.transition(&turn, TurnEvent::MarkMissed)
    }

    /// Call a missed turn again.
    pub fn recall(
        &self,
        turn_id: &str,
        professional: &Professional,
        module: &str,
    ) -> WorkflowResult<Turn> {
        let turn = self.load(turn_id)?;
        let held = self
            .db
            .list_held_turns(&professional.id, module, Some(&turn.service))?;
        lifecycle::ensure_not_attending(&held)?;

        self.transition(
            &turn,
            TurnEvent::Recall {
                module: module.to_string(),
                professional: professional.clone(),
            },
        )
    }

    // =========================================================================
    // Doctors
    // =========================================================================

    /// Call the next turn waiting for a doctor into `consultorio`.
    pub fn doctor_call_next(
        &self,
        professional: &Professional,
        consultorio: &str,
    ) -> WorkflowResult<Turn> {
        let held = self.db.list_held_turns(&professional.id, consultorio, None)?;
        lifecycle::ensure_not_attending(&held)?;

        let kind = QueueKind::Doctor;
        let candidates = self.db.list_turns_with_status(kind.waiting_status(), None)?;
        let next = next_to_call(&kind, candidates).ok_or(LifecycleError::EmptyQueue)?;

        self.transition(
            &next,
            TurnEvent::DoctorCall {
                consultorio: consultorio.to_string(),
                professional: professional.clone(),
            },
        )
    }

    pub fn doctor_complete(&self, turn_id: &str) -> WorkflowResult<Turn> {
        let turn = self.load(turn_id)?;
        self.transition(&turn, TurnEvent::DoctorComplete)
    }

    pub fn doctor_mark_missed(&self, turn_id: &str) -> WorkflowResult<Turn> {
        let turn = self.load(turn_id)?;
        self.transition(&turn, TurnEvent::DoctorMarkMissed)
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// A queue in call order.
    pub fn queue(&self, kind: &QueueKind) -> WorkflowResult<Vec<Turn>> {
        let service = match kind {
            QueueKind::Staff { service } => Some(service.as_str()),
            QueueKind::Doctor => None,
        };
        let candidates = self.db.list_turns_with_status(kind.waiting_status(), service)?;
        Ok(order_queue(kind, candidates))
    }

    /// Turns the professional is attending at `module`.
    pub fn attending(&self, professional_id: &str, module: &str) -> WorkflowResult<Vec<Turn>> {
        Ok(self.db.list_held_turns(professional_id, module, None)?)
    }

    /// Missed turns of a service, most recent request first.
    pub fn missed(&self, service: &str) -> WorkflowResult<Vec<Turn>> {
        let mut turns = self
            .db
            .list_turns_with_status(TurnStatus::Missed, Some(service))?;
        turns.reverse();
        Ok(turns)
    }

    /// Waiting turns past their thresholds.
    pub fn long_waits(&self, thresholds: &WaitThresholds) -> WorkflowResult<Vec<LongWaitAlert>> {
        let waiting = self.db.list_waiting_turns()?;
        Ok(detect_long_waits(&waiting, self.clock.now(), thresholds))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn load(&self, turn_id: &str) -> WorkflowResult<Turn> {
        self.db
            .get_turn(turn_id)?
            .ok_or_else(|| WorkflowError::NotFound(turn_id.to_string()))
    }

    fn transition(&self, turn: &Turn, event: TurnEvent) -> WorkflowResult<Turn> {
        let next = lifecycle::apply(turn, &event, self.clock.now())?;
        if !self.db.update_turn_if_status(&next, event.expected_status())? {
            tracing::warn!(turn = %turn.turn_number, event = event.name(), "lost update race");
            return Err(WorkflowError::Conflict(turn.turn_number.clone()));
        }

        tracing::info!(
            turn = %next.turn_number,
            from = %turn.status,
            to = %next.status,
            module = next.module.as_deref().unwrap_or("-"),
            "turn transitioned"
        );
        Ok(next)
    }
}
