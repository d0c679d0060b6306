//! Resolución de la configuración del sitio a partir del host.
//!
//! Orden: configuración inyectada de antemano → API remota (con timeout) →
//! configuración por defecto. Un fallo de red y una carga inválida se
//! tratan igual: se usa la configuración por defecto completa.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::cms::clock::Clock;
use crate::cms::error::ConfigError;
use crate::cms::site_config::{unwrap_envelope, SiteConfig};

pub const ORIGINAL_HOST_HEADER: &str = "X-Original-Host";

/// Espera máxima por defecto para un origen de configuración.
pub const DEFAULT_CONFIG_TIMEOUT: Duration = Duration::from_secs(5);

/// Origen remoto de la configuración por host.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn fetch_config(&self, host: &str) -> Result<Value, ConfigError>;
}

/// Cliente HTTP de `GET <api>/client-config?host=`.
pub struct HttpConfigSource {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpConfigSource {
    pub fn new(client: reqwest::Client, endpoint: Url, timeout: Duration) -> Self {
        Self {
            client,
            endpoint,
            timeout,
        }
    }
}

#[async_trait]
impl ConfigSource for HttpConfigSource {
    async fn fetch_config(&self, host: &str) -> Result<Value, ConfigError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("host", host);

        let response = self
            .client
            .get(url)
            .header(ORIGINAL_HOST_HEADER, host)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ConfigError::Timeout(self.timeout.as_millis() as u64)
                } else {
                    ConfigError::Http(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(ConfigError::Status(response.status().as_u16()));
        }
        response
            .json()
            .await
            .map_err(|e| ConfigError::Decode(e.to_string()))
    }
}

/// Quita el puerto de un valor de cabecera `Host`.
pub fn clean_host(host: &str) -> &str {
    host.split(':').next().unwrap_or(host).trim()
}

/// Carga la configuración por host y memoriza los aciertos durante
/// `revalidate`. Nunca falla: ante cualquier error devuelve la de por defecto.
pub struct SiteConfigLoader {
    source: Option<Arc<dyn ConfigSource>>,
    revalidate: chrono::Duration,
    timeout: Duration,
    clock: Arc<dyn Clock>,
    memo: Mutex<HashMap<String, (SiteConfig, DateTime<Utc>)>>,
}

impl SiteConfigLoader {
    pub fn new(
        source: Option<Arc<dyn ConfigSource>>,
        revalidate: chrono::Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            revalidate,
            timeout: DEFAULT_CONFIG_TIMEOUT,
            clock,
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// Acota la espera por el origen, sea cual sea su implementación.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn load(&self, host: &str) -> SiteConfig {
        let host = clean_host(host);
        let now = self.clock.now();

        if let Some(config) = self.memoized(host, now) {
            debug!("Configuración de {host} servida desde memoria");
            return config;
        }

        match self.try_load(host).await {
            Ok(config) => {
                info!("Configuración cargada para {host} ({})", config.client.slug);
                self.memo
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(host.to_string(), (config.clone(), now));
                config
            }
            Err(e) => {
                warn!("Usando configuración por defecto para {host}: {e}");
                SiteConfig::default_config()
            }
        }
    }

    fn memoized(&self, host: &str, now: DateTime<Utc>) -> Option<SiteConfig> {
        let memo = self.memo.lock().unwrap_or_else(|e| e.into_inner());
        memo.get(host)
            .filter(|(_, loaded_at)| now - *loaded_at < self.revalidate)
            .map(|(config, _)| config.clone())
    }

    async fn try_load(&self, host: &str) -> Result<SiteConfig, ConfigError> {
        let Some(source) = &self.source else {
            return Ok(SiteConfig::default_config());
        };
        let raw = tokio::time::timeout(self.timeout, source.fetch_config(host))
            .await
            .map_err(|_| ConfigError::Timeout(self.timeout.as_millis() as u64))??;
        SiteConfig::from_value(unwrap_envelope(raw))
    }
}

/// Estado observable de la configuración del sitio.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteConfigState {
    pub config: Option<SiteConfig>,
    pub loading: bool,
    pub error: Option<String>,
}

impl SiteConfigState {
    /// La configuración resuelta, o la de por defecto si aún no la hay.
    pub fn config_or_default(&self) -> SiteConfig {
        self.config.clone().unwrap_or_else(SiteConfig::default_config)
    }
}

/// Proveedor de configuración para un host: resuelve una vez y publica el
/// estado. Sólo vuelve a `loading` con una recarga explícita.
pub struct SiteConfigResolver {
    loader: Arc<SiteConfigLoader>,
    host: String,
    state: watch::Sender<SiteConfigState>,
}

impl SiteConfigResolver {
    /// Con `initial` la configuración se adopta tal cual, sin ir a la red.
    pub fn new(loader: Arc<SiteConfigLoader>, host: &str, initial: Option<SiteConfig>) -> Self {
        let (state, _) = watch::channel(SiteConfigState {
            loading: initial.is_none(),
            config: initial,
            error: None,
        });
        Self {
            loader,
            host: host.to_string(),
            state,
        }
    }

    pub fn state(&self) -> SiteConfigState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SiteConfigState> {
        self.state.subscribe()
    }

    pub async fn resolve(&self) -> SiteConfigState {
        let current = self.state();
        if current.config.is_some() && !current.loading {
            return current;
        }
        self.run().await
    }

    pub async fn reload(&self) -> SiteConfigState {
        self.run().await
    }

    async fn run(&self) -> SiteConfigState {
        self.state.send_modify(|s| s.loading = true);

        let loader = self.loader.clone();
        let host = self.host.clone();
        let next = match tokio::spawn(async move { loader.load(&host).await }).await {
            Ok(config) => SiteConfigState {
                config: Some(config),
                loading: false,
                error: None,
            },
            Err(e) => {
                error!("La resolución de configuración para {} falló: {}", self.host, e);
                SiteConfigState {
                    config: Some(SiteConfig::default_config()),
                    loading: false,
                    error: Some(format!("No se pudo cargar la configuración: {e}")),
                }
            }
        };
        self.state.send_replace(next.clone());
        next
    }
}
