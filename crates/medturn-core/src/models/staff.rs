//! Staff identity models.

use serde::{Deserialize, Serialize};

use super::turn::Professional;

/// An authenticated staff member, as reported by the auth provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StaffIdentity {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
}

impl StaffIdentity {
    /// Name stamped on turns: display name, or the email when absent.
    pub fn display_label(&self) -> String {
        match self.display_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.email.clone(),
        }
    }

    pub fn as_professional(&self) -> Professional {
        Professional {
            id: self.uid.clone(),
            display_name: self.display_label(),
        }
    }
}

/// Which panel a staff member works from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StaffRole {
    /// Window staff calling pending turns for one service
    Professional,
    /// Doctor calling the follow-up queue from a consultorio
    Doctor,
}
