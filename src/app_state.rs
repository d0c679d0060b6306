use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;

use crate::cms::{
    cache::ContentCache,
    clock::{Clock, SystemClock},
    config_loader::{ConfigSource, HttpConfigSource, SiteConfigLoader},
    fetcher::{ContentFetcher, ContentSource, HttpContentSource},
    layout::{DynamicLayout, DEFAULT_PAGE},
    site_config::SiteConfig,
};
use crate::config::AppConfig;
use crate::sections::{home_binding, home_prop_builder};

/// Estado compartido por todos los handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub fetcher: ContentFetcher,
    pub config_loader: Arc<SiteConfigLoader>,
    /// Configuración de sitio inyectada de antemano (se adopta sin red).
    pub initial_site_config: Option<SiteConfig>,
    pub layout: DynamicLayout,
}

impl AppState {
    /// Estado de producción: orígenes HTTP y caché persistida en disco.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .build()
            .context("No se pudo crear el cliente HTTP")?;

        let content_source = HttpContentSource::new(
            http.clone(),
            config.components_endpoint()?,
            config.fetch_timeout,
        );
        let config_source =
            HttpConfigSource::new(http, config.client_config_endpoint()?, config.fetch_timeout);

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ttl = chrono::Duration::from_std(config.cache_ttl).context("CMS_CACHE_TTL_SECS fuera de rango")?;
        let cache = ContentCache::persistent(config.cache_path.clone(), ttl, clock.clone());
        let initial = config.initial_site_config()?;

        Self::new(
            config,
            Arc::new(content_source),
            Some(Arc::new(config_source)),
            cache,
            initial,
            clock,
        )
    }

    pub fn new(
        config: AppConfig,
        content_source: Arc<dyn ContentSource>,
        config_source: Option<Arc<dyn ConfigSource>>,
        cache: ContentCache,
        initial_site_config: Option<SiteConfig>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let revalidate = chrono::Duration::from_std(config.config_revalidate)
            .context("CMS_CONFIG_REVALIDATE_SECS fuera de rango")?;
        let fetcher = ContentFetcher::new(content_source, Arc::new(cache), config.fetch_timeout);
        let config_loader = Arc::new(
            SiteConfigLoader::new(config_source, revalidate, clock).with_timeout(config.fetch_timeout),
        );
        let binding = home_binding();
        for tag in binding.unresolved() {
            warn!("El tipo '{}' apunta a un renderizador no registrado", tag);
        }
        let layout = DynamicLayout::new(DEFAULT_PAGE, binding).with_prop_builder(home_prop_builder());

        Ok(Self {
            config,
            fetcher,
            config_loader,
            initial_site_config,
            layout,
        })
    }
}
