//! Caché local de listas de componentes con TTL y persistencia en disco.
//!
//! Cada entrada se reemplaza entera (nunca se muta en parte); las entradas
//! caducadas se desalojan al consultarlas y en cada `set`, que además limita
//! el número de claves. El fichero de persistencia es un único objeto JSON
//! `{clave: {data, timestamp, expiresAt}}`, escrito fuera del cerrojo.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cms::clock::Clock;
use crate::models::{ContentFilters, ContentRecord};

pub const CACHE_KEY_PREFIX: &str = "cms_components_";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheEntry {
    data: Vec<ContentRecord>,
    /// Momento de la descarga, en milisegundos Unix.
    timestamp: i64,
    expires_at: i64,
}

/// Resumen del estado de la caché.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total: usize,
    pub valid: usize,
    pub expired: usize,
    pub hit_rate: f64,
}

/// Límite de claves retenidas; al superarlo se desaloja la más antigua.
pub const MAX_ENTRIES: usize = 128;

pub struct ContentCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    store: Option<Arc<CacheFile>>,
}

impl ContentCache {
    /// Caché sin persistencia (se pierde al reiniciar).
    pub fn in_memory(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            clock,
            store: None,
        }
    }

    /// Caché respaldada por un fichero JSON. Un fichero ausente, ilegible o
    /// corrupto se trata como caché vacía.
    pub fn persistent(path: PathBuf, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let entries = load_entries(&path);
        debug!("Caché del CMS cargada con {} entradas desde {}", entries.len(), path.display());
        Self {
            entries: Mutex::new(entries),
            ttl,
            clock,
            store: Some(Arc::new(CacheFile::new(path))),
        }
    }

    /// Clave determinista: prefijo + serialización JSON de los filtros.
    pub fn key_for(filters: &ContentFilters) -> String {
        let serialized = serde_json::to_string(filters).unwrap_or_else(|_| "{}".to_string());
        format!("{CACHE_KEY_PREFIX}{serialized}")
    }

    /// Devuelve la lista guardada si sigue vigente; si caducó, la desaloja.
    pub fn get(&self, key: &str) -> Option<Vec<ContentRecord>> {
        let now = self.clock.now().timestamp_millis();
        let snapshot = {
            let mut entries = self.lock();
            match entries.get(key) {
                Some(entry) if now < entry.expires_at => {
                    debug!("Caché del CMS: acierto para {key}");
                    return Some(entry.data.clone());
                }
                Some(_) => {
                    debug!("Caché del CMS: entrada caducada para {key}, se desaloja");
                    entries.remove(key);
                    self.snapshot(&entries)
                }
                None => return None,
            }
        };
        self.persist(snapshot);
        None
    }

    /// Guarda la lista con `expiresAt = ahora + TTL`, sustituyendo cualquier
    /// entrada previa. De paso barre las caducadas y aplica `MAX_ENTRIES`.
    pub fn set(&self, key: &str, records: Vec<ContentRecord>) {
        let now = self.clock.now();
        let now_ms = now.timestamp_millis();
        let entry = CacheEntry {
            data: records,
            timestamp: now_ms,
            expires_at: (now + self.ttl).timestamp_millis(),
        };

        let snapshot = {
            let mut entries = self.lock();
            entries.insert(key.to_string(), entry);
            entries.retain(|_, e| now_ms < e.expires_at);
            while entries.len() > MAX_ENTRIES {
                let Some(oldest) = entries
                    .iter()
                    .filter(|(k, _)| k.as_str() != key)
                    .min_by_key(|(_, e)| e.timestamp)
                    .map(|(k, _)| k.clone())
                else {
                    break;
                };
                debug!("Caché del CMS llena, se desaloja {oldest}");
                entries.remove(&oldest);
            }
            self.snapshot(&entries)
        };
        self.persist(snapshot);
    }

    /// Cuenta entradas vigentes y caducadas sin desalojar nada.
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now().timestamp_millis();
        let entries = self.lock();

        let total = entries.len();
        let valid = entries.values().filter(|e| now < e.expires_at).count();
        CacheStats {
            total,
            valid,
            expired: total - valid,
            hit_rate: if total == 0 { 0.0 } else { valid as f64 / total as f64 },
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Serializa el mapa bajo el cerrojo y le asigna versión, para que las
    /// escrituras posteriores nunca queden pisadas por otras más viejas.
    fn snapshot(&self, entries: &HashMap<String, CacheEntry>) -> Option<Snapshot> {
        let store = self.store.as_ref()?;
        match serde_json::to_string(entries) {
            Ok(body) => Some(Snapshot {
                version: store.version.fetch_add(1, Ordering::SeqCst) + 1,
                body,
            }),
            Err(e) => {
                warn!("No se pudo serializar la caché del CMS: {e}");
                None
            }
        }
    }

    /// Escribe fuera del cerrojo: en un hilo bloqueante si hay runtime de
    /// tokio, y en línea si no lo hay.
    fn persist(&self, snapshot: Option<Snapshot>) {
        let (Some(store), Some(snapshot)) = (self.store.clone(), snapshot) else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || store.write(snapshot));
            }
            Err(_) => store.write(snapshot),
        }
    }
}

struct Snapshot {
    version: u64,
    body: String,
}

/// Fichero de persistencia con escrituras atómicas (temporal + rename).
struct CacheFile {
    path: PathBuf,
    version: AtomicU64,
    written: Mutex<u64>,
}

impl CacheFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            version: AtomicU64::new(0),
            written: Mutex::new(0),
        }
    }

    fn write(&self, snapshot: Snapshot) {
        let mut written = self.written.lock().unwrap_or_else(|e| e.into_inner());
        if snapshot.version <= *written {
            return;
        }
        match write_atomically(&self.path, &snapshot.body) {
            Ok(()) => *written = snapshot.version,
            Err(e) => warn!("No se pudo persistir la caché del CMS en {}: {}", self.path.display(), e),
        }
    }
}

fn load_entries(path: &Path) -> HashMap<String, CacheEntry> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return HashMap::new(),
    };
    match serde_json::from_str(&raw) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Caché del CMS corrupta en {} ({}); se ignora", path.display(), e);
            HashMap::new()
        }
    }
}

fn write_atomically(path: &Path, body: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, body)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::clock::ManualClock;
    use crate::models::RecordStatus;
    use chrono::{TimeZone, Utc};

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()))
    }

    fn records(ids: &[&str]) -> Vec<ContentRecord> {
        ids.iter()
            .map(|id| ContentRecord {
                id: id.to_string(),
                name: None,
                kind: "home_hero".into(),
                page: "Inicio".into(),
                data: serde_json::Map::new(),
                status: RecordStatus::Published,
                is_active: true,
                is_visible: true,
                description: None,
                created_at: None,
                updated_at: None,
                client_name: None,
            })
            .collect()
    }

    #[test]
    fn entry_is_served_only_within_ttl() {
        let clock = clock();
        let cache = ContentCache::in_memory(Duration::minutes(5), clock.clone());
        cache.set("k", records(&["a", "b"]));

        clock.advance(Duration::minutes(4));
        assert_eq!(cache.get("k"), Some(records(&["a", "b"])));

        clock.advance(Duration::minutes(1));
        let stats = cache.stats();
        assert_eq!((stats.total, stats.valid, stats.expired), (1, 0, 1));

        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.stats().total, 0);
    }

    #[test]
    fn set_overwrites_and_restarts_ttl() {
        let clock = clock();
        let cache = ContentCache::in_memory(Duration::minutes(5), clock.clone());
        cache.set("k", records(&["a"]));
        clock.advance(Duration::minutes(3));
        cache.set("k", records(&["b"]));
        clock.advance(Duration::minutes(3));
        assert_eq!(cache.get("k"), Some(records(&["b"])));
    }

    #[test]
    fn stats_report_hit_rate() {
        let clock = clock();
        let cache = ContentCache::in_memory(Duration::minutes(5), clock.clone());
        assert_eq!(cache.stats(), CacheStats::default());

        cache.set("viejo", records(&["a"]));
        clock.advance(Duration::minutes(3));
        cache.set("nuevo", records(&["b"]));
        clock.advance(Duration::minutes(3));

        let stats = cache.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.valid, 1);
        assert_eq!(stats.expired, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn keys_are_deterministic_and_distinct() {
        let home = ContentFilters::for_page("Inicio");
        assert_eq!(ContentCache::key_for(&home), ContentCache::key_for(&home.clone()));
        assert_eq!(
            ContentCache::key_for(&home),
            r#"cms_components_{"page_filter":"Inicio"}"#
        );
        assert_eq!(ContentCache::key_for(&ContentFilters::default()), "cms_components_{}");

        let typed = ContentFilters {
            kind: Some("Inicio".into()),
            ..ContentFilters::default()
        };
        assert_ne!(ContentCache::key_for(&home), ContentCache::key_for(&typed));
    }

    #[test]
    fn persisted_entries_survive_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cms").join("cache.json");
        let clock = clock();

        let cache = ContentCache::persistent(path.clone(), Duration::minutes(5), clock.clone());
        cache.set("k", records(&["a"]));

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw["k"]["expiresAt"].is_i64());
        assert!(raw["k"]["timestamp"].is_i64());

        let reloaded = ContentCache::persistent(path, Duration::minutes(5), clock);
        assert_eq!(reloaded.get("k"), Some(records(&["a"])));
    }

    #[test]
    fn corrupt_storage_is_an_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{ esto no es json").unwrap();

        let cache = ContentCache::persistent(path.clone(), Duration::minutes(5), clock());
        assert_eq!(cache.stats().total, 0);
        assert_eq!(cache.get("k"), None);

        cache.set("k", records(&["a"]));
        assert!(fs::read_to_string(&path).unwrap().contains("\"k\""));
    }

    #[test]
    fn set_sweeps_expired_keys() {
        let clock = clock();
        let cache = ContentCache::in_memory(Duration::minutes(5), clock.clone());
        for page in 0..20 {
            cache.set(&format!("pagina-{page}"), vec![]);
        }
        assert_eq!(cache.stats().total, 20);

        clock.advance(Duration::minutes(6));
        cache.set("otra", vec![]);
        let stats = cache.stats();
        assert_eq!((stats.total, stats.valid, stats.expired), (1, 1, 0));
    }

    #[test]
    fn key_count_is_capped_evicting_the_oldest() {
        let clock = clock();
        let cache = ContentCache::in_memory(Duration::minutes(5), clock.clone());
        for page in 0..MAX_ENTRIES + 10 {
            cache.set(&format!("pagina-{page}"), records(&["a"]));
            clock.advance(Duration::milliseconds(1));
        }

        assert_eq!(cache.stats().total, MAX_ENTRIES);
        assert_eq!(cache.get("pagina-0"), None);
        assert_eq!(cache.get("pagina-9"), None);
        assert_eq!(cache.get("pagina-10"), Some(records(&["a"])));
        assert!(cache.get(&format!("pagina-{}", MAX_ENTRIES + 9)).is_some());
    }

    #[tokio::test]
    async fn persistence_inside_a_runtime_lands_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let cache = ContentCache::persistent(path.clone(), Duration::minutes(5), clock());

        cache.set("k", records(&["a"]));
        cache.set("k", records(&["b"]));

        let mut persisted = String::new();
        for _ in 0..100 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            persisted = fs::read_to_string(&path).unwrap_or_default();
            if persisted.contains("\"b\"") {
                break;
            }
        }
        assert!(persisted.contains("\"b\""));
        assert!(!dir.path().join("cache.json.tmp").exists());

        let reloaded = ContentCache::persistent(path, Duration::minutes(5), clock());
        assert_eq!(reloaded.get("k"), Some(records(&["b"])));
    }
}
