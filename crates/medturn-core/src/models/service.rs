//! Service and consultorio configuration models.

use serde::{Deserialize, Serialize};

/// Id of the single consultorio configuration record.
pub const CONSULTORIOS_CONFIG_ID: &str = "main_consultorios_config";

/// A service patients can request a turn for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    /// Stable id (e.g., "facturacion")
    pub id: String,
    /// Display label, also stored on each turn
    pub label: String,
    /// Icon key, resolved through [`ServiceIcon`]
    pub icon_name: String,
    /// Ticket prefix (e.g., "F")
    pub prefix: String,
    /// Ordered window/module names
    pub modules: Vec<String>,
    /// Finished turns continue to the doctor queue
    pub requires_follow_up: bool,
}

impl ServiceConfig {
    pub fn new(id: &str, label: &str, icon_name: &str, prefix: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            icon_name: icon_name.to_string(),
            prefix: prefix.to_string(),
            modules: Vec::new(),
            requires_follow_up: false,
        }
    }

    pub fn icon(&self) -> ServiceIcon {
        ServiceIcon::from_name(&self.icon_name)
    }

    pub fn has_module(&self, name: &str) -> bool {
        self.modules.iter().any(|m| m == name)
    }
}

/// Closed set of icons a service can display.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ServiceIcon {
    Receipt,
    Calendar,
    FlaskConical,
    Pill,
    FileCheck,
    Stethoscope,
    /// Fallback for unknown names
    Ticket,
}

impl ServiceIcon {
    /// Resolve an icon key. Unknown keys map to [`ServiceIcon::Ticket`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "Receipt" => ServiceIcon::Receipt,
            "CalendarDays" | "Calendar" => ServiceIcon::Calendar,
            "FlaskConical" => ServiceIcon::FlaskConical,
            "Pill" => ServiceIcon::Pill,
            "FileCheck" => ServiceIcon::FileCheck,
            "Stethoscope" => ServiceIcon::Stethoscope,
            other => {
                tracing::debug!(icon = other, "unknown service icon, using fallback");
                ServiceIcon::Ticket
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServiceIcon::Receipt => "Receipt",
            ServiceIcon::Calendar => "CalendarDays",
            ServiceIcon::FlaskConical => "FlaskConical",
            ServiceIcon::Pill => "Pill",
            ServiceIcon::FileCheck => "FileCheck",
            ServiceIcon::Stethoscope => "Stethoscope",
            ServiceIcon::Ticket => "Ticket",
        }
    }
}

/// Doctor consultorio list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsultorioConfig {
    pub id: String,
    pub names: Vec<String>,
}

impl ConsultorioConfig {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            id: CONSULTORIOS_CONFIG_ID.to_string(),
            names,
        }
    }
}

fn windows(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("Ventanilla {}", i)).collect()
}

/// Static services used when the store has none.
pub fn default_services() -> Vec<ServiceConfig> {
    let mut billing = ServiceConfig::new("facturacion", "Facturación", "Receipt", "F");
    billing.modules = windows(4);
    billing.requires_follow_up = true;

    let mut appointments = ServiceConfig::new("citas", "Citas Médicas", "CalendarDays", "C");
    appointments.modules = windows(2);

    let mut lab = ServiceConfig::new("laboratorio", "Laboratorio", "FlaskConical", "L");
    lab.modules = windows(2);

    let mut pharmacy = ServiceConfig::new("farmacia", "Farmacia", "Pill", "M");
    pharmacy.modules = windows(2);

    let mut authorizations =
        ServiceConfig::new("autorizaciones", "Autorizaciones", "FileCheck", "A");
    authorizations.modules = windows(1);

    vec![billing, appointments, lab, pharmacy, authorizations]
}

/// Static consultorios used when the store has none.
pub fn default_consultorios() -> ConsultorioConfig {
    ConsultorioConfig::new((1..=5).map(|i| format!("Consultorio {}", i)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icon_lookup_with_fallback() {
        assert_eq!(ServiceIcon::from_name("Receipt"), ServiceIcon::Receipt);
        assert_eq!(ServiceIcon::from_name("CalendarDays"), ServiceIcon::Calendar);
        assert_eq!(ServiceIcon::from_name("Rocket"), ServiceIcon::Ticket);
        assert_eq!(ServiceIcon::from_name(""), ServiceIcon::Ticket);
    }

    #[test]
    fn test_icon_names_resolve_back() {
        for icon in [
            ServiceIcon::Receipt,
            ServiceIcon::Calendar,
            ServiceIcon::FlaskConical,
            ServiceIcon::Pill,
            ServiceIcon::FileCheck,
            ServiceIcon::Stethoscope,
            ServiceIcon::Ticket,
        ] {
            assert_eq!(ServiceIcon::from_name(icon.name()), icon);
        }
    }

    #[test]
    fn test_only_billing_requires_follow_up() {
        let follow_up: Vec<_> = default_services()
            .into_iter()
            .filter(|s| s.requires_follow_up)
            .map(|s| s.label)
            .collect();
        assert_eq!(follow_up, vec!["Facturación".to_string()]);
    }

    #[test]
    fn test_default_prefixes_unique() {
        let services = default_services();
        let mut prefixes: Vec<_> = services.iter().map(|s| s.prefix.clone()).collect();
        prefixes.sort();
        prefixes.dedup();
        assert_eq!(prefixes.len(), services.len());
    }

    #[test]
    fn test_default_consultorios() {
        let config = default_consultorios();
        assert_eq!(config.id, CONSULTORIOS_CONFIG_ID);
        assert_eq!(config.names.first().map(String::as_str), Some("Consultorio 1"));
    }
}
