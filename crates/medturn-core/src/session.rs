//! Staff session state.
//!
//! Created at login and dropped at logout. The selected module (or
//! consultorio) and service are persisted per user so the next login
//! restores them.

use thiserror::Error;

use crate::db::{Database, DbError};
use crate::models::{Professional, StaffIdentity, StaffRole};

/// Session errors.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No staff member is logged in")]
    NotLoggedIn,

    #[error("No module selected")]
    NoModuleSelected,

    #[error("No service selected")]
    NoServiceSelected,

    #[error("Selection cannot be empty")]
    EmptySelection,

    #[error("Admin access required")]
    NotAdmin,

    #[error(transparent)]
    Db(#[from] DbError),
}

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Clone, PartialEq)]
pub struct StaffSession {
    identity: StaffIdentity,
    role: StaffRole,
    module: Option<String>,
    service: Option<String>,
}

impl StaffSession {
    /// Start a session, restoring the user's last selections.
    pub fn login(db: &Database, identity: StaffIdentity, role: StaffRole) -> SessionResult<Self> {
        let module = db.get_preference(&module_key(&identity.uid, role))?;
        let service = match role {
            StaffRole::Professional => db.get_preference(&service_key(&identity.uid))?,
            StaffRole::Doctor => None,
        };

        tracing::info!(
            uid = %identity.uid,
            role = ?role,
            module = module.as_deref().unwrap_or("-"),
            "staff logged in"
        );
        Ok(Self {
            identity,
            role,
            module,
            service,
        })
    }

    pub fn identity(&self) -> &StaffIdentity {
        &self.identity
    }

    pub fn role(&self) -> StaffRole {
        self.role
    }

    pub fn professional(&self) -> Professional {
        self.identity.as_professional()
    }

    /// Selected module, or consultorio for doctors.
    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    pub fn require_module(&self) -> SessionResult<&str> {
        self.module().ok_or(SessionError::NoModuleSelected)
    }

    pub fn require_service(&self) -> SessionResult<&str> {
        self.service().ok_or(SessionError::NoServiceSelected)
    }

    pub fn select_module(&mut self, db: &Database, module: &str) -> SessionResult<()> {
        let module = non_empty(module)?;
        db.set_preference(&module_key(&self.identity.uid, self.role), &module)?;
        tracing::debug!(uid = %self.identity.uid, module = %module, "module selected");
        self.module = Some(module);
        Ok(())
    }

    pub fn select_service(&mut self, db: &Database, service: &str) -> SessionResult<()> {
        let service = non_empty(service)?;
        db.set_preference(&service_key(&self.identity.uid), &service)?;
        tracing::debug!(uid = %self.identity.uid, service = %service, "service selected");
        self.service = Some(service);
        Ok(())
    }

    /// Whether this user is the configured admin. Emails compare trimmed
    /// and case-insensitively.
    pub fn is_admin(&self, admin_email: &str) -> bool {
        let admin = admin_email.trim();
        !admin.is_empty() && self.identity.email.trim().eq_ignore_ascii_case(admin)
    }

    pub fn require_admin(&self, admin_email: &str) -> SessionResult<()> {
        if self.is_admin(admin_email) {
            Ok(())
        } else {
            Err(SessionError::NotAdmin)
        }
    }
}

fn module_key(uid: &str, role: StaffRole) -> String {
    match role {
        StaffRole::Professional => format!("{}:selected_module", uid),
        StaffRole::Doctor => format!("{}:selected_consultorio", uid),
    }
}

fn service_key(uid: &str) -> String {
    format!("{}:selected_service", uid)
}

fn non_empty(value: &str) -> SessionResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SessionError::EmptySelection);
    }
    Ok(trimmed.to_string())
}
