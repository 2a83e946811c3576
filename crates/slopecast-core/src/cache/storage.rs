//! Persistent cache namespaces.
//!
//! Each namespace is a URL-keyed map of responses stored as one JSON file,
//! `<dir>/<namespace>.json`. Namespaces are loaded lazily on first touch and
//! written back on every change.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::Response;
use crate::utils::age_display;

/// A value and when it was stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_display(&self) -> String {
        age_display(self.cached_at, Utc::now())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredResponse {
    status: u16,
    content_type: Option<String>,
    #[serde(with = "body_base64")]
    body: Vec<u8>,
}

mod body_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

impl From<&Response> for StoredResponse {
    fn from(response: &Response) -> Self {
        Self {
            status: response.status.as_u16(),
            content_type: response.content_type.clone(),
            body: response.body.clone(),
        }
    }
}

impl StoredResponse {
    fn to_response(&self) -> Result<Response> {
        let status = StatusCode::from_u16(self.status)
            .with_context(|| format!("Invalid cached status: {}", self.status))?;
        Ok(Response {
            status,
            content_type: self.content_type.clone(),
            body: self.body.clone(),
        })
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Namespace {
    entries: BTreeMap<String, CachedData<StoredResponse>>,
}

struct StorageInner {
    dir: Option<PathBuf>,
    namespaces: Mutex<HashMap<String, Namespace>>,
}

/// Named cache namespaces. Clones share the same underlying storage.
#[derive(Clone)]
pub struct CacheStorage {
    inner: Arc<StorageInner>,
}

impl CacheStorage {
    /// Storage persisted under `dir`, created if missing.
    pub fn open(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create cache directory: {}", dir.display()))?;
        Ok(Self::with_dir(Some(dir)))
    }

    /// Storage that lives only as long as this process.
    pub fn in_memory() -> Self {
        Self::with_dir(None)
    }

    fn with_dir(dir: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(StorageInner {
                dir,
                namespaces: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Namespace>> {
        self.inner
            .namespaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn namespace_path(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{}.json", name))
    }

    fn read_namespace(&self, name: &str) -> Result<Option<Namespace>> {
        let Some(ref dir) = self.inner.dir else {
            return Ok(None);
        };
        let path = Self::namespace_path(dir, name);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache namespace: {}", name))?;
        let namespace = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache namespace: {}", name))?;
        Ok(Some(namespace))
    }

    fn write_namespace(&self, name: &str, namespace: &Namespace) -> Result<()> {
        let Some(ref dir) = self.inner.dir else {
            return Ok(());
        };
        let contents = serde_json::to_string(namespace)?;
        std::fs::write(Self::namespace_path(dir, name), contents)
            .with_context(|| format!("Failed to write cache namespace: {}", name))?;
        Ok(())
    }

    /// Run `f` against the named namespace, loading it from disk first if needed.
    fn with_namespace<R>(&self, name: &str, f: impl FnOnce(&mut Namespace) -> R) -> Result<R> {
        let mut namespaces = self.lock();
        if !namespaces.contains_key(name) {
            let loaded = self.read_namespace(name)?.unwrap_or_default();
            namespaces.insert(name.to_string(), loaded);
        }
        let namespace = namespaces
            .get_mut(name)
            .ok_or_else(|| anyhow::anyhow!("Cache namespace vanished: {}", name))?;
        Ok(f(namespace))
    }

    /// Cached response for `url`, if any.
    pub fn get(&self, namespace: &str, url: &str) -> Result<Option<CachedData<Response>>> {
        let stored = self.with_namespace(namespace, |ns| ns.entries.get(url).cloned())?;
        match stored {
            Some(entry) => Ok(Some(CachedData {
                data: entry.data.to_response()?,
                cached_at: entry.cached_at,
            })),
            None => Ok(None),
        }
    }

    pub fn put(&self, namespace: &str, url: &str, response: &Response) -> Result<()> {
        self.with_namespace(namespace, |ns| {
            ns.entries
                .insert(url.to_string(), CachedData::new(StoredResponse::from(response)));
            self.write_namespace(namespace, ns)
        })??;
        debug!(namespace, url, "Cached response");
        Ok(())
    }

    pub fn entry_count(&self, namespace: &str) -> Result<usize> {
        self.with_namespace(namespace, |ns| ns.entries.len())
    }

    /// Names of every namespace, in memory or on disk.
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut names: BTreeSet<String> = self.lock().keys().cloned().collect();

        if let Some(ref dir) = self.inner.dir {
            for entry in std::fs::read_dir(dir).context("Failed to list cache directory")? {
                let path = entry?.path();
                if path.extension().is_some_and(|ext| ext == "json") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        names.insert(stem.to_string());
                    }
                }
            }
        }

        Ok(names.into_iter().collect())
    }

    /// Drop a namespace. Returns whether it existed.
    pub fn delete(&self, namespace: &str) -> Result<bool> {
        let mut existed = self.lock().remove(namespace).is_some();

        if let Some(ref dir) = self.inner.dir {
            let path = Self::namespace_path(dir, namespace);
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to delete cache namespace: {}", namespace))?;
                existed = true;
            }
        }
        Ok(existed)
    }
}
