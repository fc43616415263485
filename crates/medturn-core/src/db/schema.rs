//! SQLite schema definition.

/// Complete database schema for medturn.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Turns
-- ============================================================================

CREATE TABLE IF NOT EXISTS turns (
    id TEXT PRIMARY KEY,
    turn_number TEXT NOT NULL,                   -- e.g. F-042, not unique
    service TEXT NOT NULL,                       -- service label at request time
    patient_id TEXT NOT NULL,
    patient_name TEXT NOT NULL,
    priority INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN (
        'pending', 'called', 'completed', 'missed', 'waiting_doctor',
        'called_by_doctor', 'completed_by_doctor', 'missed_by_doctor'
    )),
    module TEXT,                                 -- window or consultorio
    requested_at TEXT NOT NULL,                  -- RFC 3339, millisecond precision
    called_at TEXT,
    completed_at TEXT,
    missed_at TEXT,
    doctor_completed_at TEXT,
    doctor_missed_at TEXT,
    professional_id TEXT,
    professional_display_name TEXT
);

CREATE INDEX IF NOT EXISTS idx_turns_status_service ON turns(status, service);
CREATE INDEX IF NOT EXISTS idx_turns_requested_at ON turns(requested_at);
CREATE INDEX IF NOT EXISTS idx_turns_professional ON turns(professional_id, module, status);

-- ============================================================================
-- Service Configurations
-- ============================================================================

CREATE TABLE IF NOT EXISTS service_configurations (
    id TEXT PRIMARY KEY,
    label TEXT NOT NULL,
    icon_name TEXT NOT NULL,
    prefix TEXT NOT NULL,
    modules TEXT NOT NULL DEFAULT '[]',          -- JSON array of strings
    requires_follow_up INTEGER NOT NULL DEFAULT 0,
    position INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- App Configurations (single documents, e.g. main_consultorios_config)
-- ============================================================================

CREATE TABLE IF NOT EXISTS app_configurations (
    id TEXT PRIMARY KEY,
    names TEXT NOT NULL DEFAULT '[]',            -- JSON array of strings
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Local Preferences
-- ============================================================================

CREATE TABLE IF NOT EXISTS preferences (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
