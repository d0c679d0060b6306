//! Obtención de componentes del CMS con caché y deduplicación de peticiones.
//!
//! Flujo de `ContentFetcher::fetch`:
//!   1. Consulta la caché por la clave de los filtros; un acierto no toca la red.
//!   2. Si hay una petición en vuelo para la misma clave, se une a ella.
//!   3. Si no, lanza una única tarea que pide, filtra (`isActive && isVisible`)
//!      y guarda en caché el resultado.
//!   4. Toda espera está acotada por el timeout configurado.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

use crate::cms::cache::{CacheStats, ContentCache};
use crate::cms::error::FetchError;
use crate::models::{ComponentsEnvelope, ContentFilters, ContentRecord};

type FetchResult = Result<Vec<ContentRecord>, FetchError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// Origen remoto de componentes (la API del CMS, o un doble en tests).
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch_components(&self, filters: &ContentFilters) -> FetchResult;
}

/// Cliente HTTP de `GET <api>/cms-components`.
pub struct HttpContentSource {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpContentSource {
    pub fn new(client: reqwest::Client, endpoint: Url, timeout: Duration) -> Self {
        Self {
            client,
            endpoint,
            timeout,
        }
    }
}

#[async_trait]
impl ContentSource for HttpContentSource {
    async fn fetch_components(&self, filters: &ContentFilters) -> FetchResult {
        let mut url = self.endpoint.clone();
        let pairs = filters.query_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }

        debug!("Pidiendo componentes del CMS: {url}");
        let response = self
            .client
            .get(url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(self.timeout.as_millis() as u64)
                } else {
                    FetchError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        let envelope: ComponentsEnvelope = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        if !envelope.success {
            return Err(FetchError::Envelope(
                envelope.message.unwrap_or_else(|| "sin mensaje".to_string()),
            ));
        }

        Ok(envelope.data.map(|d| d.components).unwrap_or_default())
    }
}

/// Registro de peticiones en vuelo: como mucho una por clave de caché.
#[derive(Default)]
pub struct InFlightRegistry {
    pending: Mutex<HashMap<String, SharedFetch>>,
}

impl InFlightRegistry {
    /// Devuelve la petición en vuelo para `key` o arranca una nueva con `start`.
    /// El booleano indica si este llamador es quien la arrancó.
    fn join_or_start(&self, key: &str, start: impl FnOnce() -> SharedFetch) -> (SharedFetch, bool) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = pending.get(key) {
            return (existing.clone(), false);
        }
        let fresh = start();
        pending.insert(key.to_string(), fresh.clone());
        (fresh, true)
    }

    fn finish(&self, key: &str) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }

    pub fn len(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Libera la entrada del registro al terminar la tarea, también si entra en pánico.
struct FinishOnDrop {
    registry: Arc<InFlightRegistry>,
    key: String,
}

impl Drop for FinishOnDrop {
    fn drop(&mut self) {
        self.registry.finish(&self.key);
    }
}

/// Servicio compartido de obtención de componentes.
#[derive(Clone)]
pub struct ContentFetcher {
    source: Arc<dyn ContentSource>,
    cache: Arc<ContentCache>,
    in_flight: Arc<InFlightRegistry>,
    timeout: Duration,
}

impl ContentFetcher {
    pub fn new(source: Arc<dyn ContentSource>, cache: Arc<ContentCache>, timeout: Duration) -> Self {
        Self::with_registry(source, cache, Arc::new(InFlightRegistry::default()), timeout)
    }

    /// Variante con un registro en vuelo propio, compartible entre fetchers.
    pub fn with_registry(
        source: Arc<dyn ContentSource>,
        cache: Arc<ContentCache>,
        in_flight: Arc<InFlightRegistry>,
        timeout: Duration,
    ) -> Self {
        Self {
            source,
            cache,
            in_flight,
            timeout,
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Componentes visibles para `filters`, desde caché o red.
    pub async fn fetch(&self, filters: &ContentFilters) -> FetchResult {
        self.load(filters, false).await
    }

    /// Igual que `fetch` pero ignora la caché (sigue deduplicando).
    pub async fn refetch(&self, filters: &ContentFilters) -> FetchResult {
        self.load(filters, true).await
    }

    async fn load(&self, filters: &ContentFilters, bypass_cache: bool) -> FetchResult {
        let key = ContentCache::key_for(filters);

        if !bypass_cache {
            if let Some(records) = self.cache.get(&key) {
                return Ok(records);
            }
        }

        let (pending, leader) = self
            .in_flight
            .join_or_start(&key, || self.start(key.clone(), filters.clone()));
        if !leader {
            debug!("Uniéndose a la petición en vuelo para {key}");
        }

        match tokio::time::timeout(self.timeout, pending).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Timeout esperando componentes para {key}");
                Err(FetchError::Timeout(self.timeout.as_millis() as u64))
            }
        }
    }

    fn start(&self, key: String, filters: ContentFilters) -> SharedFetch {
        let source = self.source.clone();
        let cache = self.cache.clone();
        let registry = self.in_flight.clone();
        let timeout = self.timeout;

        let task = tokio::spawn(async move {
            let _finish = FinishOnDrop {
                registry,
                key: key.clone(),
            };
            let result = match tokio::time::timeout(timeout, source.fetch_components(&filters)).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout(timeout.as_millis() as u64)),
            };
            let result = result.map(|records| {
                records
                    .into_iter()
                    .filter(ContentRecord::is_renderable)
                    .collect::<Vec<_>>()
            });

            match &result {
                Ok(records) => {
                    info!("{} componentes del CMS recibidos para {key}", records.len());
                    cache.set(&key, records.clone());
                }
                Err(e) => warn!("Error pidiendo componentes para {key}: {e}"),
            }
            result
        });

        async move {
            task.await
                .unwrap_or_else(|e| Err(FetchError::Aborted(e.to_string())))
        }
        .boxed()
        .shared()
    }
}

/// Vista reactiva de una consulta: `records` es `None` mientras no hay
/// resultado o si falló, y `Some(vec![])` si se resolvió sin coincidencias.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentState {
    pub records: Option<Vec<ContentRecord>>,
    pub loading: bool,
    pub error: Option<String>,
}

impl Default for ContentState {
    fn default() -> Self {
        Self {
            records: None,
            loading: true,
            error: None,
        }
    }
}

impl ContentState {
    /// Primer registro con la etiqueta dada.
    pub fn by_type(&self, kind: &str) -> Option<&ContentRecord> {
        self.records.as_deref()?.iter().find(|r| r.kind == kind)
    }

    /// Registros de una página, en el orden de llegada.
    pub fn by_page(&self, page: &str) -> Vec<&ContentRecord> {
        self.records
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter(|r| r.page == page)
            .collect()
    }
}

/// Consulta con estado observable, el equivalente a un hook por filtros.
pub struct ContentQuery {
    fetcher: ContentFetcher,
    filters: ContentFilters,
    state: watch::Sender<ContentState>,
}

impl ContentQuery {
    pub fn new(fetcher: ContentFetcher, filters: ContentFilters) -> Self {
        let (state, _) = watch::channel(ContentState::default());
        Self {
            fetcher,
            filters,
            state,
        }
    }

    pub fn state(&self) -> ContentState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ContentState> {
        self.state.subscribe()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.fetcher.cache_stats()
    }

    pub async fn load(&self) -> ContentState {
        self.run(false).await
    }

    pub async fn refetch(&self) -> ContentState {
        self.run(true).await
    }

    async fn run(&self, bypass_cache: bool) -> ContentState {
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });

        let outcome = if bypass_cache {
            self.fetcher.refetch(&self.filters).await
        } else {
            self.fetcher.fetch(&self.filters).await
        };

        let next = match outcome {
            Ok(records) => ContentState {
                records: Some(records),
                loading: false,
                error: None,
            },
            Err(e) => ContentState {
                records: None,
                loading: false,
                error: Some(e.to_string()),
            },
        };
        self.state.send_replace(next.clone());
        next
    }
}
