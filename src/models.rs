//! Modelos de dominio del CMS (registros de contenido y sobres de la API).

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Estado editorial de un registro del CMS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Published,
    Draft,
    Archived,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Draft => "draft",
            Self::Archived => "archived",
        }
    }
}

fn default_true() -> bool {
    true
}

/// `data: null` equivale a un objeto vacío.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decodifica la lista registro a registro: un elemento mal formado se
/// descarta con un aviso en lugar de invalidar la respuesta completa.
fn lenient_records<'de, D>(deserializer: D) -> Result<Vec<ContentRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value::<ContentRecord>(value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Componente #{index} descartado por mal formado: {e}");
                None
            }
        })
        .collect())
}

/// Unidad de contenido creada desde el CMS (un "componente" de página).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Etiqueta semántica que decide el renderizador (ej: "home_hero").
    #[serde(rename = "type")]
    pub kind: String,
    /// Página lógica a la que pertenece (ej: "Inicio").
    pub page: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Map<String, Value>,
    pub status: RecordStatus,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub is_visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
}

impl ContentRecord {
    /// Un registro sólo es elegible para renderizarse si está activo y visible.
    pub fn is_renderable(&self) -> bool {
        self.is_active && self.is_visible
    }

    /// Pista de orden: `_orden` y luego `order`; sólo valores numéricos cuentan.
    pub fn order_hint(&self) -> Option<f64> {
        ["_orden", "order"]
            .iter()
            .find_map(|key| self.data.get(*key).filter(|v| !v.is_null()))
            .and_then(Value::as_f64)
    }
}

/// Filtros de la petición de componentes. El orden de los campos fija la
/// serialización y, por tanto, la clave de caché.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentFilters {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ContentFilters {
    pub fn for_page(page: &str) -> Self {
        Self {
            page_filter: Some(page.to_string()),
            ..Self::default()
        }
    }

    /// Pares `(clave, valor)` para la query string, omitiendo los vacíos.
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        [
            ("type", self.kind.as_deref()),
            ("page_filter", self.page_filter.as_deref()),
            ("status", self.status.as_deref()),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.map(str::trim).filter(|v| !v.is_empty()).map(|v| (k, v)))
        .collect()
    }

    /// Los filtros vacíos o en blanco equivalen a no filtrar.
    pub fn normalized(self) -> Self {
        let clean = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            kind: clean(self.kind),
            page_filter: clean(self.page_filter),
            status: clean(self.status),
        }
    }

    /// ¿Cumple el registro estos filtros? Lo usa el endpoint simulado del CMS.
    pub fn matches(&self, record: &ContentRecord) -> bool {
        self.kind.as_deref().map_or(true, |k| record.kind == k)
            && self.page_filter.as_deref().map_or(true, |p| record.page == p)
            && self
                .status
                .as_deref()
                .map_or(true, |s| record.status.as_str() == s)
    }
}

/// Cliente (tenant) dueño de los componentes devueltos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CmsClient {
    pub id: String,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentsPayload {
    #[serde(default, deserialize_with = "lenient_records")]
    pub components: Vec<ContentRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<CmsClient>,
}

/// Sobre de respuesta de `GET /cms-components`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentsEnvelope {
    pub success: bool,
    #[serde(default)]
    pub data: Option<ComponentsPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(data: Value) -> ContentRecord {
        serde_json::from_value(json!({
            "_id": "r1",
            "type": "home_banner",
            "page": "Inicio",
            "data": data,
            "status": "published"
        }))
        .unwrap()
    }

    #[test]
    fn visibility_flags_default_to_true() {
        let r = record(json!({}));
        assert!(r.is_active && r.is_visible);
        assert!(r.is_renderable());
    }

    #[test]
    fn order_hint_prefers_orden_over_order() {
        assert_eq!(record(json!({"_orden": 2, "order": 9})).order_hint(), Some(2.0));
        assert_eq!(record(json!({"order": 4})).order_hint(), Some(4.0));
        assert_eq!(record(json!({"_orden": null, "order": 4})).order_hint(), Some(4.0));
        assert_eq!(record(json!({"_orden": "tres"})).order_hint(), None);
        assert_eq!(record(json!({})).order_hint(), None);
    }

    #[test]
    fn query_pairs_skip_blank_values() {
        let filters = ContentFilters {
            kind: Some("home_hero".into()),
            page_filter: Some("  ".into()),
            status: None,
        };
        assert_eq!(filters.query_pairs(), vec![("type", "home_hero")]);
    }

    #[test]
    fn filters_match_on_every_present_field() {
        let r = record(json!({}));
        assert!(ContentFilters::default().matches(&r));
        assert!(ContentFilters::for_page("Inicio").matches(&r));
        assert!(!ContentFilters::for_page("Bodega").matches(&r));
        let drafts = ContentFilters {
            status: Some("draft".into()),
            ..ContentFilters::default()
        };
        assert!(!drafts.matches(&r));
    }

    #[test]
    fn blank_filters_normalize_to_none() {
        let filters = ContentFilters {
            kind: Some(" home_hero ".into()),
            page_filter: Some("".into()),
            status: Some("   ".into()),
        }
        .normalized();
        assert_eq!(filters.kind.as_deref(), Some("home_hero"));
        assert_eq!(filters.page_filter, None);
        assert_eq!(filters.status, None);
    }

    #[test]
    fn null_data_reads_as_an_empty_object() {
        let r: ContentRecord = serde_json::from_value(json!({
            "_id": "r2",
            "type": "home_hero",
            "page": "Inicio",
            "data": null,
            "status": "published"
        }))
        .unwrap();
        assert!(r.data.is_empty());
        assert_eq!(r.order_hint(), None);
    }

    #[test]
    fn malformed_components_are_skipped_not_fatal() {
        let envelope: ComponentsEnvelope = serde_json::from_value(json!({
            "success": true,
            "data": {
                "components": [
                    { "_id": "ok", "type": "home_hero", "page": "Inicio", "data": {}, "status": "published" },
                    { "_id": "sin-datos", "type": "home_banner", "page": "Inicio", "data": null, "status": "published" },
                    { "_id": "estado-raro", "type": "home_banner", "page": "Inicio", "status": "pending" },
                    { "_id": "sin-pagina", "type": "home_banner", "status": "published" },
                    "no soy un objeto"
                ]
            }
        }))
        .unwrap();

        let ids: Vec<_> = envelope
            .data
            .unwrap()
            .components
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["ok", "sin-datos"]);
    }

    #[test]
    fn null_component_list_is_empty() {
        let envelope: ComponentsEnvelope =
            serde_json::from_value(json!({ "success": true, "data": { "components": null } })).unwrap();
        assert!(envelope.data.unwrap().components.is_empty());
    }
}
