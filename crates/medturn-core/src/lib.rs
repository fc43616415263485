//! MedTurn Core Library
//!
//! Hospital turn queues: patients take a numbered turn for a service, window
//! staff call and process it, and turns from services that need a doctor
//! continue into a second queue served from consultorios.
//!
//! # Architecture
//!
//! ```text
//! Intake (kiosk) ──► pending ──call──► called ──finish──► completed
//!                      ▲                 │    └─(follow-up)─► waiting_doctor
//!                      │               missed                      │
//!                      └───recall────────┘                   doctor call
//!                                                                 │
//!                                                          called_by_doctor
//!                                                           │            │
//!                                              completed_by_doctor  missed_by_doctor
//!
//!        every write ──► change feed ──► queue / display board listeners
//!        waiting turns ──► long-wait monitor ──► admin alerts
//!        recent turns ──► summarizer (medturn-llm) ──► admin analysis
//! ```
//!
//! # Core Principle
//!
//! **A turn moves only through allowed transitions, and only once.** Every
//! status write is conditional on the status it was read in, so two staff
//! members can never both claim the same turn.
//!
//! # Modules
//!
//! - [`db`]: SQLite store for turns, configuration and preferences
//! - [`models`]: Domain types (Turn, ServiceConfig, TurnRequest, etc.)
//! - [`lifecycle`]: Turn state machine
//! - [`queue`]: Call order, long-wait detection, turn numbers
//! - [`workflow`]: Desk operations tying the above together
//! - [`config`]: Service and consultorio configuration with defaults
//! - [`feed`]: Live query subscriptions
//! - [`session`]: Logged-in staff state and preferences
//! - [`monitor`]: Background long-wait monitor
//! - [`lookup`]: Patient name lookup
//! - [`announce`]: Spoken call announcements
//! - [`settings`]: Runtime settings

pub mod announce;
pub mod clock;
pub mod config;
pub mod db;
pub mod feed;
pub mod lifecycle;
pub mod lookup;
pub mod models;
pub mod monitor;
pub mod queue;
pub mod session;
pub mod settings;
pub mod workflow;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigStore, ServiceCatalog};
pub use db::Database;
pub use feed::{FeedQuery, Subscription, TurnFeed};
pub use models::{
    Professional, ServiceConfig, SpecialCondition, SpecialConditions, StaffIdentity, StaffRole,
    Turn, TurnRequest, TurnStatus,
};
pub use queue::{LongWaitAlert, QueueKind, WaitThresholds};
pub use session::StaffSession;
pub use settings::Settings;
pub use workflow::TurnDesk;

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::path::Path;
use std::sync::{Arc, Mutex};

use medturn_llm::{HttpGenerator, Summarizer, TextGenerator, MAX_ANALYSIS_RECORDS};
use tracing_subscriber::EnvFilter;

use crate::clock::format_timestamp;
use crate::lookup::{HttpPatientLookup, PatientLookup};
use crate::monitor::LongWaitMonitor;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum MedTurnError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// The store lacks a table or index it needs
    #[error("Store configuration error: {0}")]
    StoreConfiguration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not allowed: {0}")]
    RuleViolation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Session error: {0}")]
    SessionError(String),
}

impl From<db::DbError> for MedTurnError {
    fn from(e: db::DbError) -> Self {
        if e.is_missing_schema() {
            return MedTurnError::StoreConfiguration(e.to_string());
        }
        match e {
            db::DbError::NotFound(what) => MedTurnError::NotFound(what),
            other => MedTurnError::DatabaseError(other.to_string()),
        }
    }
}

impl From<lifecycle::LifecycleError> for MedTurnError {
    fn from(e: lifecycle::LifecycleError) -> Self {
        MedTurnError::RuleViolation(e.to_string())
    }
}

impl From<models::IntakeError> for MedTurnError {
    fn from(e: models::IntakeError) -> Self {
        MedTurnError::InvalidInput(e.to_string())
    }
}

impl From<workflow::WorkflowError> for MedTurnError {
    fn from(e: workflow::WorkflowError) -> Self {
        use workflow::WorkflowError;
        match e {
            WorkflowError::Db(e) => e.into(),
            WorkflowError::Lifecycle(e) => e.into(),
            WorkflowError::Intake(e) => e.into(),
            WorkflowError::NotFound(id) => MedTurnError::NotFound(format!("turn {}", id)),
            WorkflowError::Conflict(number) => {
                MedTurnError::Conflict(format!("turn {} was taken by another session", number))
            }
        }
    }
}

impl From<config::ConfigError> for MedTurnError {
    fn from(e: config::ConfigError) -> Self {
        use config::ConfigError;
        match e {
            ConfigError::Db(e) => e.into(),
            ConfigError::UnknownService(id) => MedTurnError::NotFound(format!("service {}", id)),
            ConfigError::EmptyName => MedTurnError::InvalidInput(e.to_string()),
        }
    }
}

impl From<session::SessionError> for MedTurnError {
    fn from(e: session::SessionError) -> Self {
        match e {
            session::SessionError::Db(e) => e.into(),
            session::SessionError::EmptySelection => MedTurnError::InvalidInput(e.to_string()),
            other => MedTurnError::SessionError(other.to_string()),
        }
    }
}

impl From<lookup::LookupError> for MedTurnError {
    fn from(e: lookup::LookupError) -> Self {
        match e {
            lookup::LookupError::EmptyDocument => MedTurnError::InvalidInput(e.to_string()),
            other => MedTurnError::ExternalService(other.to_string()),
        }
    }
}

impl From<medturn_llm::GenerationError> for MedTurnError {
    fn from(e: medturn_llm::GenerationError) -> Self {
        MedTurnError::ExternalService(e.to_string())
    }
}

impl From<settings::SettingsError> for MedTurnError {
    fn from(e: settings::SettingsError) -> Self {
        MedTurnError::InvalidInput(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for MedTurnError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        MedTurnError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Install the log subscriber. Honors `RUST_LOG`; safe to call twice.
#[uniffi::export]
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings::DEFAULT_LOG_FILTER));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
    {
        tracing::info!("medturn logging initialized");
    }
}

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<MedTurnCore>, MedTurnError> {
    let settings = Settings::load(None)?;
    let db = Database::open(&path)?;
    Ok(MedTurnCore::new(db, Arc::new(SystemClock), settings))
}

/// Open a database with settings read from a JSON file.
#[uniffi::export]
pub fn open_database_with_settings(
    path: String,
    settings_path: String,
) -> Result<Arc<MedTurnCore>, MedTurnError> {
    let settings = Settings::load(Some(Path::new(&settings_path)))?;
    let db = Database::open(&path)?;
    Ok(MedTurnCore::new(db, Arc::new(SystemClock), settings))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<MedTurnCore>, MedTurnError> {
    let db = Database::open_in_memory()?;
    Ok(MedTurnCore::new(db, Arc::new(SystemClock), Settings::default()))
}

/// Check or uncheck one special-condition box on the intake form.
#[uniffi::export]
pub fn toggle_special_condition(
    conditions: FfiSpecialConditions,
    condition: FfiSpecialCondition,
    checked: bool,
) -> FfiSpecialConditions {
    let mut conditions: SpecialConditions = conditions.into();
    conditions.set(condition.into(), checked);
    conditions.into()
}

/// Default special-condition selection for a fresh intake form.
#[uniffi::export]
pub fn default_special_conditions() -> FfiSpecialConditions {
    SpecialConditions::default().into()
}

// =========================================================================
// Foreign Callbacks
// =========================================================================

/// Receives change-feed snapshots.
#[uniffi::export(with_foreign)]
pub trait QueueListener: Send + Sync {
    fn on_update(&self, turns: Vec<FfiTurn>);
}

/// Receives long-wait alerts on every monitor tick.
#[uniffi::export(with_foreign)]
pub trait LongWaitListener: Send + Sync {
    fn on_alerts(&self, alerts: Vec<FfiLongWaitAlert>);
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe core for FFI.
#[derive(uniffi::Object)]
pub struct MedTurnCore {
    db: Arc<Mutex<Database>>,
    clock: Arc<dyn Clock>,
    settings: Settings,
    feed: TurnFeed,
    session: Mutex<Option<StaffSession>>,
    /// Service configuration, read once and refreshed by configuration writes
    catalog: Mutex<Option<ServiceCatalog>>,
    monitor: Mutex<Option<LongWaitMonitor>>,
    lookup: Mutex<Option<Arc<dyn PatientLookup>>>,
}

impl MedTurnCore {
    /// Build a core over an open database.
    pub fn new(db: Database, clock: Arc<dyn Clock>, settings: Settings) -> Arc<Self> {
        let lookup: Option<Arc<dyn PatientLookup>> = match settings.lookup_url.as_deref() {
            Some(url) => match HttpPatientLookup::new(url, settings.lookup_timeout_secs) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    tracing::warn!(error = %e, "patient lookup disabled");
                    None
                }
            },
            None => None,
        };

        Arc::new(Self {
            db: Arc::new(Mutex::new(db)),
            clock,
            settings,
            feed: TurnFeed::new(),
            session: Mutex::new(None),
            catalog: Mutex::new(None),
            monitor: Mutex::new(None),
            lookup: Mutex::new(lookup),
        })
    }

    /// Replace the patient lookup client.
    pub fn set_patient_lookup(&self, lookup: Arc<dyn PatientLookup>) -> Result<(), MedTurnError> {
        *self.lookup.lock()? = Some(lookup);
        Ok(())
    }

    /// Summarize recent turns with the given generator.
    pub fn analyze_recent_turns_with<G: TextGenerator>(
        &self,
        generator: G,
    ) -> Result<String, MedTurnError> {
        self.require_admin()?;
        let records = {
            let db = self.db.lock()?;
            db.list_recent_turns(MAX_ANALYSIS_RECORDS)?
                .iter()
                .map(Turn::to_analysis_record)
                .collect::<Vec<_>>()
        };
        Ok(Summarizer::new(generator).summarize(records))
    }

    fn current_session(&self) -> Result<StaffSession, MedTurnError> {
        self.session
            .lock()?
            .clone()
            .ok_or_else(|| session::SessionError::NotLoggedIn.into())
    }

    fn require_admin(&self) -> Result<StaffSession, MedTurnError> {
        let session = self.current_session()?;
        session.require_admin(&self.settings.admin_email)?;
        Ok(session)
    }

    fn session_state(&self, session: &StaffSession) -> FfiSessionState {
        FfiSessionState {
            uid: session.identity().uid.clone(),
            display_label: session.identity().display_label(),
            role: session.role().into(),
            module: session.module().map(String::from),
            service: session.service().map(String::from),
            is_admin: session.is_admin(&self.settings.admin_email),
        }
    }

    /// Loaded service catalog, reading the store on first use.
    fn catalog(&self, db: &Database) -> Result<ServiceCatalog, MedTurnError> {
        let mut cached = self.catalog.lock()?;
        if let Some(catalog) = cached.as_ref() {
            return Ok(catalog.clone());
        }
        let catalog = ConfigStore::new(db).load_services()?;
        *cached = Some(catalog.clone());
        Ok(catalog)
    }

    fn invalidate_catalog(&self) -> Result<(), MedTurnError> {
        *self.catalog.lock()? = None;
        Ok(())
    }

    /// Read under the database lock.
    fn read<T>(
        &self,
        op: impl FnOnce(&Database) -> Result<T, MedTurnError>,
    ) -> Result<T, MedTurnError> {
        let db = self.db.lock()?;
        op(&*db)
    }

    /// Write under the database lock, then deliver feed snapshots after
    /// the lock is released.
    fn write<T>(
        &self,
        op: impl FnOnce(&Database) -> Result<T, MedTurnError>,
    ) -> Result<T, MedTurnError> {
        let (result, deliveries) = {
            let db = self.db.lock()?;
            let result = op(&*db)?;
            (result, self.feed.snapshots(&db))
        };
        for delivery in deliveries {
            delivery.deliver();
        }
        Ok(result)
    }

    fn desk<'a>(&'a self, db: &'a Database) -> TurnDesk<'a> {
        TurnDesk::new(db, self.clock.as_ref())
    }
}

#[uniffi::export]
impl MedTurnCore {
    // =========================================================================
    // Session
    // =========================================================================

    /// Start a staff session, restoring the user's last selections.
    pub fn login(
        &self,
        identity: FfiStaffIdentity,
        role: FfiStaffRole,
    ) -> Result<FfiSessionState, MedTurnError> {
        let mut current = self.session.lock()?;
        let session = {
            let db = self.db.lock()?;
            StaffSession::login(&db, identity.into(), role.into())?
        };
        let state = self.session_state(&session);
        *current = Some(session);
        Ok(state)
    }

    /// End the session. Staff operations fail until the next login.
    pub fn logout(&self) -> Result<(), MedTurnError> {
        if let Some(session) = self.session.lock()?.take() {
            tracing::info!(uid = %session.identity().uid, "staff logged out");
        }
        Ok(())
    }

    pub fn session(&self) -> Result<Option<FfiSessionState>, MedTurnError> {
        let session = self.session.lock()?;
        Ok(session.as_ref().map(|s| self.session_state(s)))
    }

    /// Select the window (or consultorio, for doctors) and remember it.
    pub fn select_module(&self, module: String) -> Result<FfiSessionState, MedTurnError> {
        let mut current = self.session.lock()?;
        let session = current.as_mut().ok_or(session::SessionError::NotLoggedIn)?;
        let db = self.db.lock()?;
        session.select_module(&db, &module)?;
        Ok(self.session_state(session))
    }

    /// Select the service whose queue this staff member serves.
    pub fn select_service(&self, service: String) -> Result<FfiSessionState, MedTurnError> {
        let mut current = self.session.lock()?;
        let session = current.as_mut().ok_or(session::SessionError::NotLoggedIn)?;
        let db = self.db.lock()?;
        if self.catalog(&db)?.find_by_label(service.trim()).is_none() {
            return Err(config::ConfigError::UnknownService(service).into());
        }
        session.select_service(&db, &service)?;
        Ok(self.session_state(session))
    }

    pub fn is_admin(&self) -> Result<bool, MedTurnError> {
        Ok(self
            .session
            .lock()?
            .as_ref()
            .map(|s| s.is_admin(&self.settings.admin_email))
            .unwrap_or(false))
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Reload services from the store.
    pub fn load_services(&self) -> Result<FfiServiceCatalog, MedTurnError> {
        self.invalidate_catalog()?;
        let catalog = self.read(|db| self.catalog(db))?;
        Ok(catalog.into())
    }

    pub fn load_consultorios(&self) -> Result<FfiConsultorioCatalog, MedTurnError> {
        let catalog = self.read(|db| Ok(ConfigStore::new(db).load_consultorios()?))?;
        Ok(FfiConsultorioCatalog {
            names: catalog.config.names,
            using_defaults: catalog.using_defaults,
        })
    }

    /// Persist the default services and consultorios (admin only).
    pub fn initialize_defaults(&self) -> Result<(), MedTurnError> {
        self.require_admin()?;
        {
            let mut db = self.db.lock()?;
            ConfigStore::initialize_defaults(&mut db)?;
        }
        self.invalidate_catalog()
    }

    pub fn add_module(&self, service_id: String, name: String) -> Result<bool, MedTurnError> {
        self.require_admin()?;
        let changed = self.read(|db| Ok(ConfigStore::new(db).add_module(&service_id, &name)?))?;
        self.invalidate_catalog()?;
        Ok(changed)
    }

    pub fn remove_module(&self, service_id: String, name: String) -> Result<bool, MedTurnError> {
        self.require_admin()?;
        let changed =
            self.read(|db| Ok(ConfigStore::new(db).remove_module(&service_id, &name)?))?;
        self.invalidate_catalog()?;
        Ok(changed)
    }

    pub fn add_consultorio(&self, name: String) -> Result<bool, MedTurnError> {
        self.require_admin()?;
        self.read(|db| Ok(ConfigStore::new(db).add_consultorio(&name)?))
    }

    pub fn remove_consultorio(&self, name: String) -> Result<bool, MedTurnError> {
        self.require_admin()?;
        self.read(|db| Ok(ConfigStore::new(db).remove_consultorio(&name)?))
    }

    // =========================================================================
    // Intake
    // =========================================================================

    /// Look up a patient's name by document number.
    pub fn lookup_patient(&self, document: String) -> Result<Option<String>, MedTurnError> {
        let lookup = self.lookup.lock()?.clone().ok_or_else(|| {
            MedTurnError::ExternalService("Patient lookup is not configured".into())
        })?;
        Ok(lookup.find_name(&document)?)
    }

    /// Register a new turn.
    pub fn request_turn(&self, request: FfiTurnRequest) -> Result<FfiTurn, MedTurnError> {
        let request: TurnRequest = request.into();
        let turn = self.write(|db| {
            let catalog = self.catalog(db)?;
            Ok(self.desk(db).request_turn(&request, &catalog)?)
        })?;
        Ok(turn.into())
    }

    pub fn get_turn(&self, turn_id: String) -> Result<Option<FfiTurn>, MedTurnError> {
        let turn = self.read(|db| Ok(db.get_turn(&turn_id)?))?;
        Ok(turn.map(Into::into))
    }

    // =========================================================================
    // Window Staff
    // =========================================================================

    /// Call the next turn of the selected service to the selected module.
    pub fn call_next(&self) -> Result<FfiTurn, MedTurnError> {
        let session = self.current_session()?;
        let module = session.require_module()?;
        let service = session.require_service()?;
        let turn =
            self.write(|db| Ok(self.desk(db).call_next(&session.professional(), module, service)?))?;
        Ok(turn.into())
    }

    pub fn finish_turn(&self, turn_id: String) -> Result<FfiTurn, MedTurnError> {
        self.current_session()?;
        let turn = self.write(|db| {
            let catalog = self.catalog(db)?;
            Ok(self.desk(db).finish(&turn_id, &catalog)?)
        })?;
        Ok(turn.into())
    }

    pub fn mark_missed(&self, turn_id: String) -> Result<FfiTurn, MedTurnError> {
        self.current_session()?;
        let turn = self.write(|db| Ok(self.desk(db).mark_missed(&turn_id)?))?;
        Ok(turn.into())
    }

    /// Call a missed turn again to the selected module.
    pub fn recall_turn(&self, turn_id: String) -> Result<FfiTurn, MedTurnError> {
        let session = self.current_session()?;
        let module = session.require_module()?;
        let turn = self
            .write(|db| Ok(self.desk(db).recall(&turn_id, &session.professional(), module)?))?;
        Ok(turn.into())
    }

    /// Turns this staff member is attending at the selected module.
    pub fn attending(&self) -> Result<Vec<FfiTurn>, MedTurnError> {
        let session = self.current_session()?;
        let module = session.require_module()?;
        let turns = self.read(|db| Ok(self.desk(db).attending(&session.identity().uid, module)?))?;
        Ok(turns.into_iter().map(Into::into).collect())
    }

    /// Pending turns of the selected service in call order.
    pub fn service_queue(&self) -> Result<Vec<FfiTurn>, MedTurnError> {
        let session = self.current_session()?;
        let kind = QueueKind::Staff {
            service: session.require_service()?.to_string(),
        };
        let turns = self.read(|db| Ok(self.desk(db).queue(&kind)?))?;
        Ok(turns.into_iter().map(Into::into).collect())
    }

    /// Missed turns of the selected service, newest first.
    pub fn missed_turns(&self) -> Result<Vec<FfiTurn>, MedTurnError> {
        let session = self.current_session()?;
        let service = session.require_service()?;
        let turns = self.read(|db| Ok(self.desk(db).missed(service)?))?;
        Ok(turns.into_iter().map(Into::into).collect())
    }

    // =========================================================================
    // Doctors
    // =========================================================================

    /// Call the next turn waiting for a doctor to the selected consultorio.
    pub fn doctor_call_next(&self) -> Result<FfiTurn, MedTurnError> {
        let session = self.current_session()?;
        let consultorio = session.require_module()?;
        let turn = self.write(|db| {
            Ok(self
                .desk(db)
                .doctor_call_next(&session.professional(), consultorio)?)
        })?;
        Ok(turn.into())
    }

    pub fn doctor_complete(&self, turn_id: String) -> Result<FfiTurn, MedTurnError> {
        self.current_session()?;
        let turn = self.write(|db| Ok(self.desk(db).doctor_complete(&turn_id)?))?;
        Ok(turn.into())
    }

    pub fn doctor_mark_missed(&self, turn_id: String) -> Result<FfiTurn, MedTurnError> {
        self.current_session()?;
        let turn = self.write(|db| Ok(self.desk(db).doctor_mark_missed(&turn_id)?))?;
        Ok(turn.into())
    }

    /// Turns waiting for a doctor in call order.
    pub fn doctor_queue(&self) -> Result<Vec<FfiTurn>, MedTurnError> {
        let turns = self.read(|db| Ok(self.desk(db).queue(&QueueKind::Doctor)?))?;
        Ok(turns.into_iter().map(Into::into).collect())
    }

    // =========================================================================
    // Display Board
    // =========================================================================

    pub fn active_calls(&self, limit: u32) -> Result<Vec<FfiTurn>, MedTurnError> {
        let turns = self.read(|db| Ok(db.list_active_calls(limit as usize)?))?;
        Ok(turns.into_iter().map(Into::into).collect())
    }

    /// Phrase to speak for a called turn.
    pub fn announcement(&self, turn_id: String) -> Result<Option<FfiAnnouncement>, MedTurnError> {
        let turn = self
            .read(|db| Ok(db.get_turn(&turn_id)?))?
            .ok_or_else(|| MedTurnError::NotFound(format!("turn {}", turn_id)))?;
        Ok(announce::announcement_for(&turn).map(|a| FfiAnnouncement {
            text: a.text,
            lang: a.lang,
        }))
    }

    // =========================================================================
    // Change Feed
    // =========================================================================

    /// Subscribe to a live query. The listener gets the current snapshot
    /// right away and a new one after every write.
    pub fn subscribe(
        &self,
        query: FfiFeedQuery,
        listener: Arc<dyn QueueListener>,
    ) -> Result<Arc<FfiSubscription>, MedTurnError> {
        let callback: feed::Listener = Arc::new(move |turns: Vec<Turn>| {
            listener.on_update(turns.into_iter().map(Into::into).collect());
        });
        let (subscription, initial) = {
            let db = self.db.lock()?;
            self.feed.subscribe_deferred(&db, query.into(), callback)?
        };
        initial.deliver();
        Ok(Arc::new(FfiSubscription {
            inner: Mutex::new(Some(subscription)),
        }))
    }

    // =========================================================================
    // Admin
    // =========================================================================

    /// Waiting turns past their thresholds (admin only).
    pub fn long_waits(&self) -> Result<Vec<FfiLongWaitAlert>, MedTurnError> {
        self.require_admin()?;
        let thresholds = self.settings.thresholds();
        let alerts = self.read(|db| Ok(self.desk(db).long_waits(&thresholds)?))?;
        Ok(alerts.into_iter().map(Into::into).collect())
    }

    /// Start the background long-wait monitor (admin only). Replaces any
    /// running monitor.
    pub fn start_long_wait_monitor(
        &self,
        listener: Arc<dyn LongWaitListener>,
    ) -> Result<(), MedTurnError> {
        self.require_admin()?;
        // A running callback may call back in here; never join while holding the slot
        let previous = self.monitor.lock()?.take();
        if let Some(mut previous) = previous {
            previous.stop();
        }
        let mut slot = self.monitor.lock()?;
        let monitor = LongWaitMonitor::start(
            self.db.clone(),
            self.clock.clone(),
            self.settings.thresholds(),
            self.settings.monitor_tick(),
            Box::new(move |alerts: Vec<LongWaitAlert>| {
                listener.on_alerts(alerts.into_iter().map(Into::into).collect());
            }),
        )
        .map_err(|e| MedTurnError::ExternalService(format!("Cannot start monitor: {}", e)))?;
        let replaced = slot.replace(monitor);
        drop(slot);
        if let Some(mut replaced) = replaced {
            replaced.stop();
        }
        Ok(())
    }

    pub fn stop_long_wait_monitor(&self) -> Result<(), MedTurnError> {
        let monitor = self.monitor.lock()?.take();
        if let Some(mut monitor) = monitor {
            monitor.stop();
        }
        Ok(())
    }

    /// Summarize the latest turns with the configured generator (admin only).
    /// Generator failures come back as a fixed message, not an error.
    pub fn analyze_recent_turns(&self) -> Result<String, MedTurnError> {
        self.require_admin()?;
        let generator = HttpGenerator::new(
            &self.settings.generator_url,
            &self.settings.generator_model,
            self.settings.generator_timeout_secs,
        )?;
        self.analyze_recent_turns_with(generator)
    }

    /// Turn counts per status.
    pub fn turn_counts(&self) -> Result<Vec<FfiStatusCount>, MedTurnError> {
        let counts = self.read(|db| Ok(db.count_turns_by_status()?))?;
        Ok(counts
            .into_iter()
            .map(|(status, count)| FfiStatusCount {
                status: status.as_str().to_string(),
                count,
            })
            .collect())
    }
}

/// Handle for a live subscription.
#[derive(uniffi::Object)]
pub struct FfiSubscription {
    inner: Mutex<Option<Subscription>>,
}

#[uniffi::export]
impl FfiSubscription {
    /// Stop receiving snapshots. Idempotent.
    pub fn cancel(&self) {
        let taken = match self.inner.lock() {
            Ok(mut inner) => inner.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(subscription) = taken {
            subscription.cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        match self.inner.lock() {
            Ok(inner) => inner.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        }
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe turn. Timestamps are RFC 3339 strings.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiTurn {
    pub id: String,
    pub turn_number: String,
    pub service: String,
    pub patient_id: String,
    pub patient_name: String,
    pub priority: bool,
    pub status: String,
    pub module: Option<String>,
    pub requested_at: String,
    pub called_at: Option<String>,
    pub completed_at: Option<String>,
    pub missed_at: Option<String>,
    pub doctor_completed_at: Option<String>,
    pub doctor_missed_at: Option<String>,
    pub professional_id: Option<String>,
    pub professional_display_name: Option<String>,
}

impl From<Turn> for FfiTurn {
    fn from(turn: Turn) -> Self {
        Self {
            id: turn.id,
            turn_number: turn.turn_number,
            service: turn.service,
            patient_id: turn.patient_id,
            patient_name: turn.patient_name,
            priority: turn.priority,
            status: turn.status.as_str().to_string(),
            module: turn.module,
            requested_at: format_timestamp(&turn.requested_at),
            called_at: turn.called_at.as_ref().map(format_timestamp),
            completed_at: turn.completed_at.as_ref().map(format_timestamp),
            missed_at: turn.missed_at.as_ref().map(format_timestamp),
            doctor_completed_at: turn.doctor_completed_at.as_ref().map(format_timestamp),
            doctor_missed_at: turn.doctor_missed_at.as_ref().map(format_timestamp),
            professional_id: turn.professional_id,
            professional_display_name: turn.professional_display_name,
        }
    }
}

/// FFI-safe special-condition checkboxes.
#[derive(Debug, Clone, Copy, PartialEq, uniffi::Record)]
pub struct FfiSpecialConditions {
    pub is_senior: bool,
    pub is_pregnant: bool,
    pub is_disabled: bool,
    pub is_none: bool,
}

impl From<SpecialConditions> for FfiSpecialConditions {
    fn from(c: SpecialConditions) -> Self {
        Self {
            is_senior: c.is_senior,
            is_pregnant: c.is_pregnant,
            is_disabled: c.is_disabled,
            is_none: c.is_none,
        }
    }
}

impl From<FfiSpecialConditions> for SpecialConditions {
    fn from(c: FfiSpecialConditions) -> Self {
        SpecialConditions {
            is_senior: c.is_senior,
            is_pregnant: c.is_pregnant,
            is_disabled: c.is_disabled,
            is_none: c.is_none,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiSpecialCondition {
    Senior,
    Pregnant,
    Disabled,
    /// "None of the above"
    NoCondition,
}

impl From<FfiSpecialCondition> for SpecialCondition {
    fn from(c: FfiSpecialCondition) -> Self {
        match c {
            FfiSpecialCondition::Senior => SpecialCondition::Senior,
            FfiSpecialCondition::Pregnant => SpecialCondition::Pregnant,
            FfiSpecialCondition::Disabled => SpecialCondition::Disabled,
            FfiSpecialCondition::NoCondition => SpecialCondition::None,
        }
    }
}

/// FFI-safe intake form.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiTurnRequest {
    pub patient_id: String,
    pub patient_name: String,
    pub service: String,
    pub conditions: FfiSpecialConditions,
}

impl From<FfiTurnRequest> for TurnRequest {
    fn from(r: FfiTurnRequest) -> Self {
        TurnRequest {
            patient_id: r.patient_id,
            patient_name: r.patient_name,
            service: r.service,
            conditions: r.conditions.into(),
        }
    }
}

/// FFI-safe service configuration.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiServiceConfig {
    pub id: String,
    pub label: String,
    /// Stored icon key
    pub icon_name: String,
    /// Icon to render, after fallback for unknown keys
    pub icon: String,
    pub prefix: String,
    pub modules: Vec<String>,
    pub requires_follow_up: bool,
}

impl From<ServiceConfig> for FfiServiceConfig {
    fn from(s: ServiceConfig) -> Self {
        Self {
            icon: s.icon().name().to_string(),
            id: s.id,
            label: s.label,
            icon_name: s.icon_name,
            prefix: s.prefix,
            modules: s.modules,
            requires_follow_up: s.requires_follow_up,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiServiceCatalog {
    pub services: Vec<FfiServiceConfig>,
    /// True when the store is empty and defaults are shown
    pub using_defaults: bool,
}

impl From<ServiceCatalog> for FfiServiceCatalog {
    fn from(c: ServiceCatalog) -> Self {
        Self {
            services: c.services.into_iter().map(Into::into).collect(),
            using_defaults: c.using_defaults,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiConsultorioCatalog {
    pub names: Vec<String>,
    pub using_defaults: bool,
}

/// FFI-safe authenticated identity.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStaffIdentity {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
}

impl From<FfiStaffIdentity> for StaffIdentity {
    fn from(i: FfiStaffIdentity) -> Self {
        StaffIdentity {
            uid: i.uid,
            email: i.email,
            display_name: i.display_name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiStaffRole {
    Professional,
    Doctor,
}

impl From<FfiStaffRole> for StaffRole {
    fn from(r: FfiStaffRole) -> Self {
        match r {
            FfiStaffRole::Professional => StaffRole::Professional,
            FfiStaffRole::Doctor => StaffRole::Doctor,
        }
    }
}

impl From<StaffRole> for FfiStaffRole {
    fn from(r: StaffRole) -> Self {
        match r {
            StaffRole::Professional => FfiStaffRole::Professional,
            StaffRole::Doctor => FfiStaffRole::Doctor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiSessionState {
    pub uid: String,
    pub display_label: String,
    pub role: FfiStaffRole,
    /// Window, or consultorio for doctors
    pub module: Option<String>,
    pub service: Option<String>,
    pub is_admin: bool,
}

/// FFI-safe long-wait alert.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLongWaitAlert {
    pub turn: FfiTurn,
    /// "window" or "doctor"
    pub stage: String,
    pub waited_minutes: i64,
    pub elapsed: String,
}

impl From<LongWaitAlert> for FfiLongWaitAlert {
    fn from(a: LongWaitAlert) -> Self {
        Self {
            stage: match a.stage {
                queue::WaitStage::Window => "window".to_string(),
                queue::WaitStage::Doctor => "doctor".to_string(),
            },
            waited_minutes: a.waited.num_minutes(),
            elapsed: a.elapsed,
            turn: a.turn.into(),
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAnnouncement {
    pub text: String,
    /// BCP 47 language tag for the synthesizer
    pub lang: String,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStatusCount {
    pub status: String,
    pub count: u32,
}

/// Live query selector.
#[derive(Debug, Clone, uniffi::Enum)]
pub enum FfiFeedQuery {
    ServiceQueue { service: String },
    DoctorQueue,
    Attending { professional_id: String, module: String },
    ActiveCalls { limit: u32 },
    Recent { limit: u32 },
}

impl From<FfiFeedQuery> for FeedQuery {
    fn from(q: FfiFeedQuery) -> Self {
        match q {
            FfiFeedQuery::ServiceQueue { service } => FeedQuery::Queue(QueueKind::Staff { service }),
            FfiFeedQuery::DoctorQueue => FeedQuery::Queue(QueueKind::Doctor),
            FfiFeedQuery::Attending {
                professional_id,
                module,
            } => FeedQuery::Attending {
                professional_id,
                module,
            },
            FfiFeedQuery::ActiveCalls { limit } => FeedQuery::ActiveCalls {
                limit: limit as usize,
            },
            FfiFeedQuery::Recent { limit } => FeedQuery::Recent {
                limit: limit as usize,
            },
        }
    }
}
