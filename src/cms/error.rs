//! Errores tipados de la capa CMS.
//!
//! `FetchError` es `Clone` porque un mismo resultado en vuelo se reparte
//! entre todos los llamadores que esperan la misma clave de caché.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("error de red al pedir componentes: {0}")]
    Http(String),

    #[error("Error {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("la API del CMS respondió sin éxito: {0}")]
    Envelope(String),

    #[error("respuesta del CMS ilegible: {0}")]
    Decode(String),

    #[error("tiempo de espera agotado tras {0} ms")]
    Timeout(u64),

    #[error("la petición de componentes se abortó: {0}")]
    Aborted(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("error de red al pedir la configuración: {0}")]
    Http(String),

    #[error("la API de configuración respondió {0}")]
    Status(u16),

    #[error("configuración ilegible: {0}")]
    Decode(String),

    #[error("configuración inválida en `{field}`: {reason}")]
    Invalid { field: String, reason: String },

    #[error("tiempo de espera agotado tras {0} ms")]
    Timeout(u64),
}

impl ConfigError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
