//! Turn database operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::clock::{format_timestamp, parse_timestamp};
use crate::models::{Turn, TurnStatus};

const TURN_COLUMNS: &str = r#"
    id, turn_number, service, patient_id, patient_name, priority, status, module,
    requested_at, called_at, completed_at, missed_at, doctor_completed_at,
    doctor_missed_at, professional_id, professional_display_name
"#;

impl Database {
    /// Insert a new turn.
    pub fn insert_turn(&self, turn: &Turn) -> DbResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO turns ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                TURN_COLUMNS
            ),
            params![
                turn.id,
                turn.turn_number,
                turn.service,
                turn.patient_id,
                turn.patient_name,
                turn.priority,
                turn.status.as_str(),
                turn.module,
                format_timestamp(&turn.requested_at),
                opt_ts(&turn.called_at),
                opt_ts(&turn.completed_at),
                opt_ts(&turn.missed_at),
                opt_ts(&turn.doctor_completed_at),
                opt_ts(&turn.doctor_missed_at),
                turn.professional_id,
                turn.professional_display_name,
            ],
        )?;
        Ok(())
    }

    /// Write the lifecycle fields of `turn`, but only if the stored status is
    /// still `expected`. Returns false when another writer got there first.
    pub fn update_turn_if_status(&self, turn: &Turn, expected: TurnStatus) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE turns SET
                status = ?3,
                module = ?4,
                called_at = ?5,
                completed_at = ?6,
                missed_at = ?7,
                doctor_completed_at = ?8,
                doctor_missed_at = ?9,
                professional_id = ?10,
                professional_display_name = ?11
            WHERE id = ?1 AND status = ?2
            "#,
            params![
                turn.id,
                expected.as_str(),
                turn.status.as_str(),
                turn.module,
                opt_ts(&turn.called_at),
                opt_ts(&turn.completed_at),
                opt_ts(&turn.missed_at),
                opt_ts(&turn.doctor_completed_at),
                opt_ts(&turn.doctor_missed_at),
                turn.professional_id,
                turn.professional_display_name,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a turn by ID.
    pub fn get_turn(&self, id: &str) -> DbResult<Option<Turn>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM turns WHERE id = ?", TURN_COLUMNS),
                [id],
                read_row,
            )
            .optional()?
            .map(Turn::try_from)
            .transpose()
    }

    /// List turns in a status, optionally restricted to one service.
    pub fn list_turns_with_status(
        &self,
        status: TurnStatus,
        service: Option<&str>,
    ) -> DbResult<Vec<Turn>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM turns
            WHERE status = ?1 AND (?2 IS NULL OR service = ?2)
            ORDER BY requested_at ASC
            "#,
            TURN_COLUMNS
        ))?;
        let rows = stmt.query_map(params![status.as_str(), service], read_row)?;
        collect_turns(rows)
    }

    /// Turns a professional is currently attending at a module, optionally
    /// restricted to one service.
    pub fn list_held_turns(
        &self,
        professional_id: &str,
        module: &str,
        service: Option<&str>,
    ) -> DbResult<Vec<Turn>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM turns
            WHERE professional_id = ?1 AND module = ?2
              AND status IN ('called', 'called_by_doctor')
              AND (?3 IS NULL OR service = ?3)
            ORDER BY called_at DESC
            "#,
            TURN_COLUMNS
        ))?;
        let rows = stmt.query_map(params![professional_id, module, service], read_row)?;
        collect_turns(rows)
    }

    /// All turns waiting at either stage.
    pub fn list_waiting_turns(&self) -> DbResult<Vec<Turn>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM turns
            WHERE status IN ('pending', 'waiting_doctor')
            ORDER BY requested_at DESC
            "#,
            TURN_COLUMNS
        ))?;
        let rows = stmt.query_map([], read_row)?;
        collect_turns(rows)
    }

    /// Turns being attended right now, most recent call first.
    pub fn list_active_calls(&self, limit: usize) -> DbResult<Vec<Turn>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM turns
            WHERE status IN ('called', 'called_by_doctor')
            ORDER BY called_at DESC
            LIMIT ?
            "#,
            TURN_COLUMNS
        ))?;
        let rows = stmt.query_map([limit as i64], read_row)?;
        collect_turns(rows)
    }

    /// Most recently requested turns, newest first.
    pub fn list_recent_turns(&self, limit: usize) -> DbResult<Vec<Turn>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM turns ORDER BY requested_at DESC LIMIT ?",
            TURN_COLUMNS
        ))?;
        let rows = stmt.query_map([limit as i64], read_row)?;
        collect_turns(rows)
    }

    /// Count turns per status.
    pub fn count_turns_by_status(&self) -> DbResult<Vec<(TurnStatus, u32)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM turns GROUP BY status ORDER BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            let (status, count) = row?;
            let status = status
                .parse::<TurnStatus>()
                .map_err(|e| DbError::Constraint(e.to_string()))?;
            counts.push((status, count));
        }
        Ok(counts)
    }
}

fn opt_ts(ts: &Option<DateTime<Utc>>) -> Option<String> {
    ts.as_ref().map(format_timestamp)
}

/// Intermediate row struct for database mapping.
struct TurnRow {
    id: String,
    turn_number: String,
    service: String,
    patient_id: String,
    patient_name: String,
    priority: bool,
    status: String,
    module: Option<String>,
    requested_at: String,
    called_at: Option<String>,
    completed_at: Option<String>,
    missed_at: Option<String>,
    doctor_completed_at: Option<String>,
    doctor_missed_at: Option<String>,
    professional_id: Option<String>,
    professional_display_name: Option<String>,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<TurnRow> {
    Ok(TurnRow {
        id: row.get(0)?,
        turn_number: row.get(1)?,
        service: row.get(2)?,
        patient_id: row.get(3)?,
        patient_name: row.get(4)?,
        priority: row.get(5)?,
        status: row.get(6)?,
        module: row.get(7)?,
        requested_at: row.get(8)?,
        called_at: row.get(9)?,
        completed_at: row.get(10)?,
        missed_at: row.get(11)?,
        doctor_completed_at: row.get(12)?,
        doctor_missed_at: row.get(13)?,
        professional_id: row.get(14)?,
        professional_display_name: row.get(15)?,
    })
}

fn collect_turns(
    rows: impl Iterator<Item = rusqlite::Result<TurnRow>>,
) -> DbResult<Vec<Turn>> {
    let mut turns = Vec::new();
    for row in rows {
        turns.push(row?.try_into()?);
    }
    Ok(turns)
}

fn decode_ts(field: &str, value: &str) -> Result<DateTime<Utc>, DbError> {
    parse_timestamp(value)
        .map_err(|e| DbError::Constraint(format!("Bad timestamp in {}: {} ({})", field, value, e)))
}

fn decode_opt_ts(field: &str, value: Option<String>) -> Result<Option<DateTime<Utc>>, DbError> {
    value.map(|v| decode_ts(field, &v)).transpose()
}

impl TryFrom<TurnRow> for Turn {
    type Error = DbError;

    fn try_from(row: TurnRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<TurnStatus>()
            .map_err(|e| DbError::Constraint(e.to_string()))?;

        Ok(Turn {
            id: row.id,
            turn_number: row.turn_number,
            service: row.service,
            patient_id: row.patient_id,
            patient_name: row.patient_name,
            priority: row.priority,
            status,
            module: row.module,
            requested_at: decode_ts("requested_at", &row.requested_at)?,
            called_at: decode_opt_ts("called_at", row.called_at)?,
            completed_at: decode_opt_ts("completed_at", row.completed_at)?,
            missed_at: decode_opt_ts("missed_at", row.missed_at)?,
            doctor_completed_at: decode_opt_ts("doctor_completed_at", row.doctor_completed_at)?,
            doctor_missed_at: decode_opt_ts("doctor_missed_at", row.doctor_missed_at)?,
            professional_id: row.professional_id,
            professional_display_name: row.professional_display_name,
        })
    }
}
