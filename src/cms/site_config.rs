//! Configuración por cliente (branding, features, SEO) y su validación.
//!
//! La forma se deserializa con `serde` (tipos y enums) y después se validan
//! longitudes y colores. Cualquier fallo invalida el objeto entero.

use std::sync::OnceLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cms::error::ConfigError;

fn default_true() -> bool {
    true
}

fn default_robots() -> String {
    "index, follow".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Basic,
    Custom,
    Premium,
    Enterprise,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DomainEntry {
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub plan: Plan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domains: Option<Vec<DomainEntry>>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Tokens visuales. Los colores deben tener la forma `#RRGGBB`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Branding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hero_background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_background: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Features {
    #[serde(default = "default_true")]
    pub contact_form: bool,
    #[serde(default = "default_true")]
    pub analytics: bool,
    #[serde(default = "default_true")]
    pub cookie_consent: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            contact_form: true,
            analytics: true,
            cookie_consent: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Seo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_image: Option<String>,
    #[serde(default = "default_robots")]
    pub robots: String,
}

impl Default for Seo {
    fn default() -> Self {
        Self {
            title_template: None,
            default_title: None,
            default_description: None,
            og_image: None,
            robots: default_robots(),
        }
    }
}

impl Seo {
    /// Título de una página aplicando `titleTemplate` (`%s` se sustituye).
    pub fn title_for(&self, page_title: &str) -> String {
        match &self.title_template {
            Some(template) => template.replace("%s", page_title),
            None => page_title.to_string(),
        }
    }
}

/// Configuración completa de un sitio cliente.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SiteConfig {
    pub client: ClientInfo,
    pub branding: Branding,
    #[serde(default)]
    pub features: Features,
    #[serde(default)]
    pub seo: Seo,
}

fn hex_color() -> &'static Regex {
    static HEX_COLOR: OnceLock<Regex> = OnceLock::new();
    HEX_COLOR.get_or_init(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("regex de color válida"))
}

/// Nombres de familia separados por comas; nada que pueda cerrar la
/// declaración CSS en la que se inserta.
fn font_family() -> &'static Regex {
    static FONT_FAMILY: OnceLock<Regex> = OnceLock::new();
    FONT_FAMILY.get_or_init(|| Regex::new(r"^[\p{L}\p{N} ,_-]{1,100}$").expect("regex de fuente válida"))
}

impl SiteConfig {
    /// Configuración por defecto, siempre completa y válida.
    pub fn default_config() -> Self {
        Self {
            client: ClientInfo {
                slug: "palo-alto".to_string(),
                name: "Bodega Palo Alto".to_string(),
                plan: Plan::Basic,
                domains: None,
                is_active: true,
                created_at: None,
                updated_at: None,
            },
            branding: Branding {
                primary_color: Some("#1a1a1a".to_string()),
                secondary_color: Some("#8b6914".to_string()),
                accent_color: Some("#c9a227".to_string()),
                ..Branding::default()
            },
            features: Features::default(),
            seo: Seo {
                title_template: Some("%s | Bodega Palo Alto".to_string()),
                default_title: Some("Bodega Palo Alto | Mendoza, Argentina".to_string()),
                default_description: Some(
                    "La pasión por las tierras mendocinas y la nobleza de la vid dieron origen a esta empresa familiar."
                        .to_string(),
                ),
                og_image: None,
                robots: default_robots(),
            },
        }
    }

    /// Deserializa y valida una carga arbitraria.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_value(value).map_err(|e| ConfigError::Decode(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let slug_len = self.client.slug.chars().count();
        if !(1..=50).contains(&slug_len) {
            return Err(ConfigError::invalid("client.slug", "debe tener entre 1 y 50 caracteres"));
        }
        if self.client.name.is_empty() {
            return Err(ConfigError::invalid("client.name", "no puede estar vacío"));
        }

        let colors = [
            ("branding.primaryColor", &self.branding.primary_color),
            ("branding.secondaryColor", &self.branding.secondary_color),
            ("branding.accentColor", &self.branding.accent_color),
        ];
        for (field, color) in colors {
            if let Some(color) = color {
                if !hex_color().is_match(color) {
                    return Err(ConfigError::invalid(field, format!("'{color}' no es un color #RRGGBB")));
                }
            }
        }
        if let Some(font) = &self.branding.font_family {
            if !font_family().is_match(font) {
                return Err(ConfigError::invalid(
                    "branding.fontFamily",
                    "sólo admite letras, dígitos, espacios, comas y guiones",
                ));
            }
        }
        Ok(())
    }

    /// Esquema JSON de la configuración, publicado por la API.
    pub fn json_schema() -> Value {
        serde_json::to_value(schemars::schema_for!(SiteConfig)).unwrap_or(Value::Null)
    }
}

/// Acepta tanto `{ "data": SiteConfig }` como `SiteConfig` directamente.
pub fn unwrap_envelope(raw: Value) -> Value {
    match raw {
        Value::Object(mut map) if map.get("data").is_some_and(|d| d.is_object()) => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "client": { "slug": "destileria", "name": "Destilería Palo Alto" },
            "branding": { "primaryColor": "#0A0B0C" }
        })
    }

    #[test]
    fn default_config_is_valid() {
        assert!(SiteConfig::default_config().validate().is_ok());
    }

    #[test]
    fn omitted_fields_take_their_defaults() {
        let config = SiteConfig::from_value(minimal()).unwrap();
        assert_eq!(config.client.plan, Plan::Basic);
        assert!(config.client.is_active);
        assert_eq!(config.features, Features::default());
        assert_eq!(config.seo.robots, "index, follow");
    }

    #[test]
    fn bad_color_is_rejected() {
        let mut raw = minimal();
        raw["branding"]["primaryColor"] = json!("notacolor");
        let err = SiteConfig::from_value(raw).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "branding.primaryColor"));
    }

    #[test]
    fn font_family_cannot_break_out_of_the_style_block() {
        let mut raw = minimal();
        raw["branding"]["fontFamily"] = json!("Playfair Display, serif");
        let config = SiteConfig::from_value(raw).unwrap();
        assert_eq!(config.branding.font_family.as_deref(), Some("Playfair Display, serif"));

        for hostile in ["x; } body{display:none", "a</style><script>", "url(x)", ""] {
            let mut raw = minimal();
            raw["branding"]["fontFamily"] = json!(hostile);
            let err = SiteConfig::from_value(raw).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "branding.fontFamily"));
        }
    }

    #[test]
    fn unknown_plan_and_wrong_types_are_rejected() {
        let mut raw = minimal();
        raw["client"]["plan"] = json!("gold");
        assert!(matches!(SiteConfig::from_value(raw), Err(ConfigError::Decode(_))));

        let mut raw = minimal();
        raw["features"] = json!({ "analytics": "yes" });
        assert!(SiteConfig::from_value(raw).is_err());

        assert!(SiteConfig::from_value(json!({ "client": { "slug": "x", "name": "y" } })).is_err());
    }

    #[test]
    fn slug_and_name_bounds() {
        let mut raw = minimal();
        raw["client"]["slug"] = json!("x".repeat(51));
        assert!(SiteConfig::from_value(raw).is_err());

        let mut raw = minimal();
        raw["client"]["name"] = json!("");
        assert!(SiteConfig::from_value(raw).is_err());
    }

    #[test]
    fn envelope_and_bare_shapes_are_both_accepted() {
        assert_eq!(unwrap_envelope(json!({ "success": true, "data": minimal() })), minimal());
        assert_eq!(unwrap_envelope(minimal()), minimal());
        assert_eq!(unwrap_envelope(json!({ "data": null })), json!({ "data": null }));
    }

    #[test]
    fn title_template_is_applied() {
        let seo = SiteConfig::default_config().seo;
        assert_eq!(seo.title_for("Inicio"), "Inicio | Bodega Palo Alto");
        assert_eq!(Seo::default().title_for("Inicio"), "Inicio");
    }

    #[test]
    fn schema_describes_the_config() {
        let schema = SiteConfig::json_schema();
        assert!(schema["properties"]["client"].is_object());
        assert!(schema["properties"]["branding"].is_object());
    }
}
