//! Service and consultorio configuration operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{ConsultorioConfig, ServiceConfig, CONSULTORIOS_CONFIG_ID};

const UPSERT_SERVICE: &str = r#"
    INSERT INTO service_configurations (
        id, label, icon_name, prefix, modules, requires_follow_up, position, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, datetime('now'))
    ON CONFLICT(id) DO UPDATE SET
        label = excluded.label,
        icon_name = excluded.icon_name,
        prefix = excluded.prefix,
        modules = excluded.modules,
        requires_follow_up = excluded.requires_follow_up,
        position = excluded.position,
        updated_at = datetime('now')
"#;

const UPSERT_NAMES: &str = r#"
    INSERT INTO app_configurations (id, names, updated_at)
    VALUES (?1, ?2, datetime('now'))
    ON CONFLICT(id) DO UPDATE SET
        names = excluded.names,
        updated_at = datetime('now')
"#;

impl Database {
    /// Insert or update a service configuration at a display position.
    pub fn upsert_service_config(&self, service: &ServiceConfig, position: u32) -> DbResult<()> {
        let modules_json = serde_json::to_string(&service.modules)?;
        self.conn.execute(
            UPSERT_SERVICE,
            params![
                service.id,
                service.label,
                service.icon_name,
                service.prefix,
                modules_json,
                service.requires_follow_up,
                position,
            ],
        )?;
        Ok(())
    }

    /// Get a service configuration by id.
    pub fn get_service_config(&self, id: &str) -> DbResult<Option<ServiceConfig>> {
        self.conn
            .query_row(
                r#"
                SELECT id, label, icon_name, prefix, modules, requires_follow_up
                FROM service_configurations
                WHERE id = ?
                "#,
                [id],
                read_service_row,
            )
            .optional()?
            .map(ServiceConfig::try_from)
            .transpose()
    }

    /// List all service configurations in display order.
    pub fn list_service_configs(&self) -> DbResult<Vec<ServiceConfig>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, label, icon_name, prefix, modules, requires_follow_up
            FROM service_configurations
            ORDER BY position, label
            "#,
        )?;
        let rows = stmt.query_map([], read_service_row)?;

        let mut services = Vec::new();
        for row in rows {
            services.push(row?.try_into()?);
        }
        Ok(services)
    }

    /// Add a module name to a service (set semantics). Returns whether the
    /// list changed.
    pub fn add_service_module(&self, service_id: &str, module: &str) -> DbResult<bool> {
        let mut service = self
            .get_service_config(service_id)?
            .ok_or_else(|| DbError::NotFound(format!("service {}", service_id)))?;
        if service.has_module(module) {
            return Ok(false);
        }
        service.modules.push(module.to_string());
        self.write_service_modules(&service)?;
        Ok(true)
    }

    /// Remove a module name from a service. Returns whether the list changed.
    pub fn remove_service_module(&self, service_id: &str, module: &str) -> DbResult<bool> {
        let mut service = self
            .get_service_config(service_id)?
            .ok_or_else(|| DbError::NotFound(format!("service {}", service_id)))?;
        let before = service.modules.len();
        service.modules.retain(|m| m != module);
        if service.modules.len() == before {
            return Ok(false);
        }
        self.write_service_modules(&service)?;
        Ok(true)
    }

    fn write_service_modules(&self, service: &ServiceConfig) -> DbResult<()> {
        let modules_json = serde_json::to_string(&service.modules)?;
        self.conn.execute(
            "UPDATE service_configurations SET modules = ?2, updated_at = datetime('now') WHERE id = ?1",
            params![service.id, modules_json],
        )?;
        Ok(())
    }

    /// Get the consultorio configuration, if it was ever saved.
    pub fn get_consultorio_config(&self) -> DbResult<Option<ConsultorioConfig>> {
        let names_json: Option<String> = self
            .conn
            .query_row(
                "SELECT names FROM app_configurations WHERE id = ?",
                [CONSULTORIOS_CONFIG_ID],
                |row| row.get(0),
            )
            .optional()?;

        names_json
            .map(|json| -> DbResult<ConsultorioConfig> {
                Ok(ConsultorioConfig::new(serde_json::from_str(&json)?))
            })
            .transpose()
    }

    /// Overwrite the consultorio configuration.
    pub fn save_consultorio_config(&self, config: &ConsultorioConfig) -> DbResult<()> {
        let names_json = serde_json::to_string(&config.names)?;
        self.conn
            .execute(UPSERT_NAMES, params![CONSULTORIOS_CONFIG_ID, names_json])?;
        Ok(())
    }

    /// Add a consultorio name (set semantics), creating the record if needed.
    pub fn add_consultorio(&self, name: &str) -> DbResult<bool> {
        let mut config = self
            .get_consultorio_config()?
            .unwrap_or_else(|| ConsultorioConfig::new(Vec::new()));
        if config.names.iter().any(|n| n == name) {
            return Ok(false);
        }
        config.names.push(name.to_string());
        self.save_consultorio_config(&config)?;
        Ok(true)
    }

    /// Remove a consultorio name. Returns whether the list changed.
    pub fn remove_consultorio(&self, name: &str) -> DbResult<bool> {
        let Some(mut config) = self.get_consultorio_config()? else {
            return Ok(false);
        };
        let before = config.names.len();
        config.names.retain(|n| n != name);
        if config.names.len() == before {
            return Ok(false);
        }
        self.save_consultorio_config(&config)?;
        Ok(true)
    }

    /// Persist a full configuration set atomically.
    pub fn save_configuration(
        &mut self,
        services: &[ServiceConfig],
        consultorios: &ConsultorioConfig,
    ) -> DbResult<()> {
        let tx = self.transaction()?;
        for (position, service) in services.iter().enumerate() {
            tx.execute(
                UPSERT_SERVICE,
                params![
                    service.id,
                    service.label,
                    service.icon_name,
                    service.prefix,
                    serde_json::to_string(&service.modules)?,
                    service.requires_follow_up,
                    position as u32,
                ],
            )?;
        }
        tx.execute(
            UPSERT_NAMES,
            params![
                CONSULTORIOS_CONFIG_ID,
                serde_json::to_string(&consultorios.names)?
            ],
        )?;
        tx.commit()?;
        Ok(())
    }
}

/// Intermediate row struct for database mapping.
struct ServiceRow {
    id: String,
    label: String,
    icon_name: String,
    prefix: String,
    modules: String,
    requires_follow_up: bool,
}

fn read_service_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ServiceRow> {
    Ok(ServiceRow {
        id: row.get(0)?,
        label: row.get(1)?,
        icon_name: row.get(2)?,
        prefix: row.get(3)?,
        modules: row.get(4)?,
        requires_follow_up: row.get(5)?,
    })
}

impl TryFrom<ServiceRow> for ServiceConfig {
    type Error = DbError;

    fn try_from(row: ServiceRow) -> Result<Self, Self::Error> {
        Ok(ServiceConfig {
            id: row.id,
            label: row.label,
            icon_name: row.icon_name,
            prefix: row.prefix,
            modules: serde_json::from_str(&row.modules)?,
            requires_follow_up: row.requires_follow_up,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{default_consultorios, default_services};

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_upsert_and_list_services() {
        let db = setup_db();
        let services = default_services();
        for (i, s) in services.iter().enumerate().rev() {
            db.upsert_service_config(s, i as u32).unwrap();
        }

        let stored = db.list_service_configs().unwrap();
        assert_eq!(stored, services);
    }

    #[test]
    fn test_module_set_semantics() {
        let db = setup_db();
        let mut lab = ServiceConfig::new("laboratorio", "Laboratorio", "FlaskConical", "L");
        lab.modules = vec!["Ventanilla 1".into()];
        db.upsert_service_config(&lab, 0).unwrap();

        assert!(db.add_service_module("laboratorio", "Ventanilla 2").unwrap());
        assert!(!db.add_service_module("laboratorio", "Ventanilla 2").unwrap());
        assert!(db.remove_service_module("laboratorio", "Ventanilla 1").unwrap());
        assert!(!db.remove_service_module("laboratorio", "Ventanilla 9").unwrap());

        let stored = db.get_service_config("laboratorio").unwrap().unwrap();
        assert_eq!(stored.modules, vec!["Ventanilla 2".to_string()]);
    }

    #[test]
    fn test_module_on_missing_service() {
        let db = setup_db();
        let err = db.add_service_module("nope", "Ventanilla 1").unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[test]
    fn test_consultorio_set_semantics() {
        let db = setup_db();
        assert!(db.get_consultorio_config().unwrap().is_none());
        assert!(!db.remove_consultorio("Consultorio 1").unwrap());

        assert!(db.add_consultorio("Consultorio 1").unwrap());
        assert!(!db.add_consultorio("Consultorio 1").unwrap());
        assert!(db.add_consultorio("Consultorio 2").unwrap());
        assert!(db.remove_consultorio("Consultorio 1").unwrap());

        let config = db.get_consultorio_config().unwrap().unwrap();
        assert_eq!(config.names, vec!["Consultorio 2".to_string()]);
    }

    #[test]
    fn test_save_configuration_overwrites() {
        let mut db = setup_db();
        let mut billing = ServiceConfig::new("facturacion", "Caja", "Receipt", "X");
        billing.modules = vec!["Caja 9".into()];
        db.upsert_service_config(&billing, 0).unwrap();

        db.save_configuration(&default_services(), &default_consultorios())
            .unwrap();

        let stored = db.get_service_config("facturacion").unwrap().unwrap();
        assert_eq!(stored.label, "Facturación");
        assert_eq!(stored.prefix, "F");
        assert_eq!(db.list_service_configs().unwrap().len(), default_services().len());
        assert_eq!(
            db.get_consultorio_config().unwrap().unwrap(),
            default_consultorios()
        );
    }
}
