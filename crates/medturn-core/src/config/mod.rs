//! Service, module and consultorio configuration.
//!
//! Read once per session; when the store is empty the static defaults are
//! served instead and flagged so the caller can warn the user.

use thiserror::Error;

use crate::db::{Database, DbError};
use crate::models::{
    default_consultorios, default_services, ConsultorioConfig, ServiceConfig,
};

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Name cannot be empty")]
    EmptyName,

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error(transparent)]
    Db(#[from] DbError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Loaded service configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCatalog {
    pub services: Vec<ServiceConfig>,
    /// True when the store had no services and defaults are being served
    pub using_defaults: bool,
}

impl ServiceCatalog {
    pub fn find_by_label(&self, label: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.label == label)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.id == id)
    }

    /// Whether finished turns of `label` go on to the doctor queue.
    /// Unknown labels do not.
    pub fn requires_follow_up(&self, label: &str) -> bool {
        self.find_by_label(label)
            .map(|s| s.requires_follow_up)
            .unwrap_or(false)
    }
}

/// Loaded consultorio configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsultorioCatalog {
    pub config: ConsultorioConfig,
    pub using_defaults: bool,
}

/// Trim a module or consultorio name, rejecting empty ones.
pub fn normalize_name(name: &str) -> ConfigResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::EmptyName);
    }
    Ok(trimmed.to_string())
}

/// Configuration access over a database handle.
pub struct ConfigStore<'a> {
    db: &'a Database,
}

impl<'a> ConfigStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Load services, falling back to the static defaults.
    pub fn load_services(&self) -> ConfigResult<ServiceCatalog> {
        let services = self.db.list_service_configs()?;
        if services.is_empty() {
            tracing::warn!("no service configuration stored, using defaults");
            return Ok(ServiceCatalog {
                services: default_services(),
                using_defaults: true,
            });
        }
        Ok(ServiceCatalog {
            services,
            using_defaults: false,
        })
    }

    /// Load consultorios, falling back to the static defaults.
    pub fn load_consultorios(&self) -> ConfigResult<ConsultorioCatalog> {
        match self.db.get_consultorio_config()? {
            Some(config) if !config.names.is_empty() => Ok(ConsultorioCatalog {
                config,
                using_defaults: false,
            }),
            _ => {
                tracing::warn!("no consultorio configuration stored, using defaults");
                Ok(ConsultorioCatalog {
                    config: default_consultorios(),
                    using_defaults: true,
                })
            }
        }
    }

    pub fn add_module(&self, service_id: &str, name: &str) -> ConfigResult<bool> {
        let name = normalize_name(name)?;
        let changed = self
            .db
            .add_service_module(service_id, &name)
            .map_err(|e| unknown_service(e, service_id))?;
        tracing::info!(service = service_id, module = %name, changed, "module added");
        Ok(changed)
    }

    pub fn remove_module(&self, service_id: &str, name: &str) -> ConfigResult<bool> {
        let name = normalize_name(name)?;
        let changed = self
            .db
            .remove_service_module(service_id, &name)
            .map_err(|e| unknown_service(e, service_id))?;
        tracing::info!(service = service_id, module = %name, changed, "module removed");
        Ok(changed)
    }

    pub fn add_consultorio(&self, name: &str) -> ConfigResult<bool> {
        let name = normalize_name(name)?;
        let changed = self.db.add_consultorio(&name)?;
        tracing::info!(consultorio = %name, changed, "consultorio added");
        Ok(changed)
    }

    pub fn remove_consultorio(&self, name: &str) -> ConfigResult<bool> {
        let name = normalize_name(name)?;
        let changed = self.db.remove_consultorio(&name)?;
        tracing::info!(consultorio = %name, changed, "consultorio removed");
        Ok(changed)
    }

    /// Persist the static defaults, overwriting stored entries with the same id.
    pub fn initialize_defaults(db: &mut Database) -> ConfigResult<()> {
        let services = default_services();
        db.save_configuration(&services, &default_consultorios())?;
        tracing::info!(services = services.len(), "default configuration saved");
        Ok(())
    }
}

fn unknown_service(e: DbError, service_id: &str) -> ConfigError {
    match e {
        DbError::NotFound(_) => ConfigError::UnknownService(service_id.to_string()),
        other => ConfigError::Db(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_store_serves_defaults() {
        let db = Database::open_in_memory().unwrap();
        let store = ConfigStore::new(&db);

        let catalog = store.load_services().unwrap();
        assert!(catalog.using_defaults);
        assert_eq!(catalog.services, default_services());

        let consultorios = store.load_consultorios().unwrap();
        assert!(consultorios.using_defaults);
    }

    #[test]
    fn test_initialize_then_load() {
        let mut db = Database::open_in_memory().unwrap();
        ConfigStore::initialize_defaults(&mut db).unwrap();

        let store = ConfigStore::new(&db);
        let catalog = store.load_services().unwrap();
        assert!(!catalog.using_defaults);
        assert!(catalog.requires_follow_up("Facturación"));
        assert!(!catalog.requires_follow_up("Laboratorio"));
        assert!(!catalog.requires_follow_up("Desconocido"));
        assert!(!store.load_consultorios().unwrap().using_defaults);
    }

    #[test]
    fn test_names_are_trimmed_and_required() {
        let mut db = Database::open_in_memory().unwrap();
        ConfigStore::initialize_defaults(&mut db).unwrap();
        let store = ConfigStore::new(&db);

        assert!(matches!(
            store.add_module("farmacia", "   "),
            Err(ConfigError::EmptyName)
        ));
        assert!(store.add_module("farmacia", "  Ventanilla 7 ").unwrap());
        assert!(!store.add_module("farmacia", "Ventanilla 7").unwrap());

        let catalog = store.load_services().unwrap();
        assert!(catalog
            .find_by_id("farmacia")
            .unwrap()
            .has_module("Ventanilla 7"));

        assert!(store.remove_module("farmacia", "Ventanilla 7 ").unwrap());
        assert!(matches!(
            store.add_consultorio(""),
            Err(ConfigError::EmptyName)
        ));
    }

    #[test]
    fn test_unknown_service() {
        let db = Database::open_in_memory().unwrap();
        let store = ConfigStore::new(&db);
        assert!(matches!(
            store.add_module("nope", "Ventanilla 1"),
            Err(ConfigError::UnknownService(id)) if id == "nope"
        ));
    }

    #[test]
    fn test_emptied_consultorios_fall_back() {
        let db = Database::open_in_memory().unwrap();
        let store = ConfigStore::new(&db);
        store.add_consultorio("Consultorio 9").unwrap();
        store.remove_consultorio("Consultorio 9").unwrap();
        assert!(store.load_consultorios().unwrap().using_defaults);
    }
}
