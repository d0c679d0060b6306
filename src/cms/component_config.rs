//! Acceso a la configuración anidada de un componente (`_configuracion` o `config`).

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::models::ContentRecord;

/// Objeto de configuración de un registro; vacío si no tiene o no es un objeto.
pub fn component_config(record: &ContentRecord) -> Map<String, Value> {
    ["_configuracion", "config"]
        .iter()
        .find_map(|key| record.data.get(*key).filter(|v| !v.is_null()))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

/// Vista tipada sobre la configuración de un componente.
pub struct ComponentConfig {
    values: Map<String, Value>,
}

impl ComponentConfig {
    pub fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .filter(|v| !v.is_null())
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }
}
