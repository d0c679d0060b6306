//! Carga y gestión de configuración de la aplicación (servidor + CMS).

use std::{env, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{anyhow, Context, Result};
use url::Url;

use crate::cms::site_config::SiteConfig;

const API_PREFIX: &str = "/api/public/v1";

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_addr: String,
    /// Base de la API pública del CMS, siempre terminada en `/api/public/v1`.
    pub cms_api_url: Url,
    pub cache_path: PathBuf,
    pub cache_ttl: Duration,
    pub fetch_timeout: Duration,
    pub config_revalidate: Duration,
    pub site_config_path: Option<PathBuf>,
    pub static_dir: PathBuf,
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow!("Valor inválido para {name}: '{raw}'")),
        Err(_) => Ok(default),
    }
}

/// Normaliza la base de la API: sin `/` final y con el prefijo público.
pub fn build_api_url(base: &str) -> Result<Url> {
    let trimmed = base.trim().trim_end_matches('/');
    let full = if trimmed.ends_with(API_PREFIX) {
        trimmed.to_string()
    } else {
        format!("{trimmed}{API_PREFIX}")
    };
    Url::parse(&full).with_context(|| format!("CMS_API_URL no es una URL válida: {base}"))
}

/// Endpoint concreto bajo la base de la API (ej: `cms-components`).
pub fn endpoint(base: &Url, path: &str) -> Result<Url> {
    let joined = format!("{}/{}", base.as_str().trim_end_matches('/'), path);
    Url::parse(&joined).with_context(|| format!("Endpoint inválido: {joined}"))
}

fn default_cache_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(env::temp_dir)
        .join("bodega-cms")
        .join("cms_cache.json")
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());

        let api_base = env::var("CMS_API_URL").unwrap_or_else(|_| format!("http://{server_addr}"));
        let cms_api_url = build_api_url(&api_base)?;

        let cache_path = env::var("CMS_CACHE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_cache_path());

        let cache_ttl = Duration::from_secs(parse_var("CMS_CACHE_TTL_SECS", 300u64)?);
        let fetch_timeout = Duration::from_millis(parse_var("CMS_FETCH_TIMEOUT_MS", 5000u64)?);
        let config_revalidate = Duration::from_secs(parse_var("CMS_CONFIG_REVALIDATE_SECS", 300u64)?);

        let site_config_path = env::var("SITE_CONFIG_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        let static_dir = env::var("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("public"));

        Ok(Self {
            server_addr,
            cms_api_url,
            cache_path,
            cache_ttl,
            fetch_timeout,
            config_revalidate,
            site_config_path,
            static_dir,
        })
    }

    pub fn components_endpoint(&self) -> Result<Url> {
        endpoint(&self.cms_api_url, "cms-components")
    }

    pub fn client_config_endpoint(&self) -> Result<Url> {
        endpoint(&self.cms_api_url, "client-config")
    }

    /// Configuración de sitio entregada fuera de banda, si se indicó un fichero.
    pub fn initial_site_config(&self) -> Result<Option<SiteConfig>> {
        let Some(path) = &self.site_config_path else {
            return Ok(None);
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("No se pudo leer SITE_CONFIG_PATH: {}", path.display()))?;
        let value: serde_json::Value = serde_json::from_str(&raw)
            .with_context(|| format!("JSON inválido en {}", path.display()))?;
        let config = SiteConfig::from_value(crate::cms::site_config::unwrap_envelope(value))
            .map_err(|e| anyhow!("Configuración de sitio inválida en {}: {e}", path.display()))?;
        Ok(Some(config))
    }
}

#[cfg(test)]
impl AppConfig {
    pub(crate) fn for_tests() -> Self {
        Self {
            server_addr: "127.0.0.1:0".into(),
            cms_api_url: build_api_url("http://127.0.0.1:0").unwrap(),
            cache_path: PathBuf::from("cms_cache.json"),
            cache_ttl: Duration::from_secs(300),
            fetch_timeout: Duration::from_secs(5),
            config_revalidate: Duration::from_secs(300),
            site_config_path: None,
            static_dir: PathBuf::from("public"),
        }
    }
}
