//! Patient lookup by identity document.
//!
//! Intake uses this to fill in the patient name. A failed lookup never
//! blocks intake; the name can always be typed by hand.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lookup errors.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Document number cannot be empty")]
    EmptyDocument,

    #[error("Cannot reach patient lookup at {0}")]
    Connection(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Patient lookup returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Invalid response format: {0}")]
    InvalidFormat(String),
}

pub type LookupResult<T> = Result<T, LookupError>;

/// Resolves a document number to the patient's full name.
pub trait PatientLookup: Send + Sync {
    /// `Ok(None)` when the service does not know the document.
    fn find_name(&self, document: &str) -> LookupResult<Option<String>>;
}

#[derive(Serialize)]
struct LookupRequest<'a> {
    documento: &'a str,
}

#[derive(Deserialize)]
struct LookupResponse {
    nombre_completo: Option<String>,
}

/// Blocking HTTP client for the lookup endpoint.
pub struct HttpPatientLookup {
    url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpPatientLookup {
    pub fn new(url: &str, timeout_secs: u64) -> LookupResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LookupError::Http(e.to_string()))?;

        Ok(Self {
            url: url.to_string(),
            client,
            timeout_secs,
        })
    }
}

impl PatientLookup for HttpPatientLookup {
    fn find_name(&self, document: &str) -> LookupResult<Option<String>> {
        let document = normalize_document(document)?;
        tracing::debug!(url = %self.url, "looking up patient");

        let response = self
            .client
            .post(&self.url)
            .json(&LookupRequest {
                documento: &document,
            })
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    LookupError::Connection(self.url.clone())
                } else if e.is_timeout() {
                    LookupError::Http(format!("Request timed out after {}s", self.timeout_secs))
                } else {
                    LookupError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            tracing::info!("patient not found in lookup service");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "patient lookup failed");
            return Err(LookupError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: LookupResponse = response
            .json()
            .map_err(|e| LookupError::InvalidFormat(e.to_string()))?;
        Ok(clean_name(parsed.nombre_completo))
    }
}

/// In-memory lookup for tests and offline front ends.
#[derive(Debug, Default)]
pub struct MockPatientLookup {
    names: HashMap<String, String>,
}

impl MockPatientLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patient(mut self, document: &str, name: &str) -> Self {
        self.names.insert(document.to_string(), name.to_string());
        self
    }
}

impl PatientLookup for MockPatientLookup {
    fn find_name(&self, document: &str) -> LookupResult<Option<String>> {
        let document = normalize_document(document)?;
        Ok(clean_name(self.names.get(&document).cloned()))
    }
}

fn normalize_document(document: &str) -> LookupResult<String> {
    let trimmed = document.trim();
    if trimmed.is_empty() {
        return Err(LookupError::EmptyDocument);
    }
    Ok(trimmed.to_string())
}

fn clean_name(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_lookup() {
        let lookup = MockPatientLookup::new().with_patient("1020304050", "Lucía Gómez ");
        assert_eq!(
            lookup.find_name(" 1020304050").unwrap().as_deref(),
            Some("Lucía Gómez")
        );
        assert_eq!(lookup.find_name("999").unwrap(), None);
        assert!(matches!(
            lookup.find_name("  "),
            Err(LookupError::EmptyDocument)
        ));
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(LookupRequest {
            documento: "1020304050",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"documento": "1020304050"}));
    }

    #[test]
    fn test_blank_name_is_not_found() {
        let parsed: LookupResponse =
            serde_json::from_str(r#"{"nombre_completo": "   "}"#).unwrap();
        assert_eq!(clean_name(parsed.nombre_completo), None);

        let parsed: LookupResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(clean_name(parsed.nombre_completo), None);
    }

    fn http_lookup(server: &mockito::ServerGuard) -> HttpPatientLookup {
        HttpPatientLookup::new(&format!("{}/paciente", server.url()), 5).unwrap()
    }

    #[test]
    fn test_http_found() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/paciente")
            .match_body(mockito::Matcher::Json(
                serde_json::json!({"documento": "1020304050"}),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"nombre_completo": " Lucía Gómez "}"#)
            .create();

        let name = http_lookup(&server).find_name(" 1020304050 ").unwrap();
        assert_eq!(name.as_deref(), Some("Lucía Gómez"));
        mock.assert();
    }

    #[test]
    fn test_http_not_found() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/paciente")
            .with_status(404)
            .with_body("sin registro")
            .create();

        assert_eq!(http_lookup(&server).find_name("999").unwrap(), None);
        mock.assert();
    }

    #[test]
    fn test_http_server_error() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/paciente")
            .with_status(500)
            .with_body("database offline")
            .create();

        let err = http_lookup(&server).find_name("1020304050").unwrap_err();
        match err {
            LookupError::Service { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "database offline");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_http_malformed_body() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/paciente")
            .with_status(200)
            .with_body("<html>")
            .create();

        let err = http_lookup(&server).find_name("1020304050").unwrap_err();
        assert!(matches!(err, LookupError::InvalidFormat(_)));
    }

    #[test]
    fn test_unreachable_endpoint() {
        let lookup = HttpPatientLookup::new("http://127.0.0.1:9/paciente", 1).unwrap();
        let err = lookup.find_name("1020304050").unwrap_err();
        assert!(matches!(
            err,
            LookupError::Connection(_) | LookupError::Http(_)
        ));
    }
}
