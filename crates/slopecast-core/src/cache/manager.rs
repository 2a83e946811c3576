//! The offline cache worker.
//!
//! `OfflineCache` wraps a network `Transport` and implements `Transport`
//! itself. Once activated it intercepts every same-origin GET, picks a
//! strategy from the URL shape, and answers from the network, the cache, or a
//! synthetic fallback. It shares nothing with the page but the requests it is
//! handed and the control messages it receives.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::{Method, StatusCode, Url};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::storage::CacheStorage;
use super::strategy::{classify, ResourceClass, Strategy};
use crate::api::{FetchError, Request, Response, Transport};

/// Shell assets fetched into the static namespace at install time.
pub const PRECACHE_MANIFEST: &[&str] = &[
    "./",
    "index.html",
    "lift.html",
    "trail.html",
    "css/app.css",
    "js/app.js",
    "favicon.ico",
    "icons/icon-192.png",
    "icons/icon-512.png",
];

/// Parallel fetches while pre-caching the manifest.
const MAX_CONCURRENT_PRECACHE: usize = 4;

/// Buffer size for the control message channel.
const CONTROL_CHANNEL_SIZE: usize = 8;

const NAMESPACE_PREFIX: &str = "slopecast";

/// Served for page navigations when neither network nor cache can answer.
const OFFLINE_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Offline</title>
<style>
body { font-family: system-ui, sans-serif; background: #0f172a; color: #e2e8f0; display: flex; align-items: center; justify-content: center; min-height: 100vh; margin: 0; text-align: center; }
button { margin-top: 1rem; padding: 0.6rem 1.2rem; border: 0; border-radius: 6px; background: #38bdf8; color: #0f172a; font-size: 1rem; }
</style>
</head>
<body>
<main>
<h1>You're offline</h1>
<p>This page hasn't been saved for offline use yet. Reconnect and try again.</p>
<button onclick="location.reload()">Retry</button>
</main>
</body>
</html>
"#;

/// Lifecycle of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    /// Installed and waiting to take over
    Installed,
    Activating,
    /// Controlling all pages; requests are intercepted
    Activated,
}

/// Fire-and-forget commands from the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Activate now instead of waiting for existing pages to close
    SkipWaiting,
    /// Delete every cache namespace
    ClearCaches,
}

/// The two namespace names for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
    pub static_assets: String,
    pub data: String,
}

impl CacheNames {
    pub fn for_build(build_tag: &str) -> Self {
        Self {
            static_assets: format!("{}-static-{}", NAMESPACE_PREFIX, build_tag),
            data: format!("{}-data-{}", NAMESPACE_PREFIX, build_tag),
        }
    }

    fn contains(&self, name: &str) -> bool {
        name == self.static_assets || name == self.data
    }

    fn for_class(&self, class: ResourceClass) -> &str {
        match class {
            ResourceClass::StaticAsset => &self.static_assets,
            _ => &self.data,
        }
    }
}

/// Outcome of pre-caching the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub cached: usize,
    pub failed: Vec<String>,
}

pub struct OfflineCache {
    origin: Url,
    network: Arc<dyn Transport>,
    storage: CacheStorage,
    names: CacheNames,
    manifest: Vec<String>,
    state: Mutex<WorkerState>,
    refreshes: Mutex<Vec<JoinHandle<()>>>,
}

fn synthetic_offline() -> Response {
    Response::new(StatusCode::SERVICE_UNAVAILABLE, Some("text/plain"), "Offline")
}

fn offline_page() -> Response {
    Response::new(StatusCode::OK, Some("text/html; charset=utf-8"), OFFLINE_PAGE)
}

/// Store a response if it was successful. Storage errors are logged, never surfaced.
fn store_if_success(storage: &CacheStorage, namespace: &str, url: &str, response: &Response) {
    if !response.is_success() {
        debug!(url, status = %response.status, "Not caching unsuccessful response");
        return;
    }
    if let Err(e) = storage.put(namespace, url, response) {
        warn!(url, error = %e, "Failed to write cache entry");
    }
}

impl OfflineCache {
    pub fn new(
        origin: Url,
        network: Arc<dyn Transport>,
        storage: CacheStorage,
        build_tag: &str,
    ) -> Self {
        Self {
            origin,
            network,
            storage,
            names: CacheNames::for_build(build_tag),
            manifest: PRECACHE_MANIFEST.iter().map(|s| s.to_string()).collect(),
            state: Mutex::new(WorkerState::Parsed),
            refreshes: Mutex::new(Vec::new()),
        }
    }

    /// Replace the pre-cache manifest (paths relative to the origin).
    pub fn with_manifest(mut self, manifest: Vec<String>) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn names(&self) -> &CacheNames {
        &self.names
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    fn lock_state(&self) -> MutexGuard<'_, WorkerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> WorkerState {
        *self.lock_state()
    }

    fn set_state(&self, state: WorkerState) {
        *self.lock_state() = state;
    }

    pub fn is_controlling(&self) -> bool {
        self.state() == WorkerState::Activated
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Pre-populate the static namespace. Individual failures are tolerated.
    pub async fn install(&self) -> InstallReport {
        self.set_state(WorkerState::Installing);
        info!(namespace = %self.names.static_assets, assets = self.manifest.len(), "Installing offline cache");

        let urls: Vec<Result<Url, String>> = self
            .manifest
            .iter()
            .map(|path| self.origin.join(path).map_err(|_| path.clone()))
            .collect();

        let results: Vec<Result<(), String>> = stream::iter(urls)
            .map(|url| async move {
                let url = url?;
                match self.network.fetch(Request::get(url.clone())).await {
                    Ok(response) if response.is_success() => self
                        .storage
                        .put(&self.names.static_assets, url.as_str(), &response)
                        .map_err(|e| {
                            warn!(url = %url, error = %e, "Failed to store pre-cached asset");
                            url.to_string()
                        }),
                    Ok(response) => {
                        warn!(url = %url, status = %response.status, "Pre-cache fetch returned an error status");
                        Err(url.to_string())
                    }
                    Err(e) => {
                        warn!(url = %url, error = %e, "Pre-cache fetch failed");
                        Err(url.to_string())
                    }
                }
            })
            .buffer_unordered(MAX_CONCURRENT_PRECACHE)
            .collect()
            .await;

        let mut report = InstallReport::default();
        for result in results {
            match result {
                Ok(()) => report.cached += 1,
                Err(url) => report.failed.push(url),
            }
        }
        report.failed.sort();

        self.set_state(WorkerState::Installed);
        info!(cached = report.cached, failed = report.failed.len(), "Offline cache installed");
        report
    }

    /// Drop namespaces from other builds and start controlling pages.
    /// Returns how many namespaces were deleted.
    pub async fn activate(&self) -> anyhow::Result<usize> {
        self.set_state(WorkerState::Activating);

        let mut deleted = 0;
        for name in self.storage.keys()? {
            if !self.names.contains(&name) {
                info!(namespace = %name, "Deleting stale cache namespace");
                if self.storage.delete(&name)? {
                    deleted += 1;
                }
            }
        }

        self.set_state(WorkerState::Activated);
        info!(deleted, "Offline cache activated, controlling all pages");
        Ok(deleted)
    }

    /// Delete every namespace, current ones included. Returns how many existed.
    pub fn clear_all(&self) -> anyhow::Result<usize> {
        let mut cleared = 0;
        for name in self.storage.keys()? {
            if self.storage.delete(&name)? {
                cleared += 1;
            }
        }
        info!(cleared, "Cleared all cache namespaces");
        Ok(cleared)
    }

    pub async fn handle_message(&self, message: ControlMessage) {
        debug!(?message, "Control message received");
        match message {
            ControlMessage::SkipWaiting => {
                if self.state() == WorkerState::Installed {
                    if let Err(e) = self.activate().await {
                        warn!(error = %e, "Activation failed");
                    }
                }
            }
            ControlMessage::ClearCaches => {
                if let Err(e) = self.clear_all() {
                    warn!(error = %e, "Failed to clear caches");
                }
            }
        }
    }

    /// Start listening for control messages. The task ends when every sender is dropped.
    pub fn spawn_control_listener(
        self: &Arc<Self>,
    ) -> (mpsc::Sender<ControlMessage>, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel(CONTROL_CHANNEL_SIZE);
        let worker = Arc::clone(self);
        let task = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                worker.handle_message(message).await;
            }
        });
        (tx, task)
    }

    /// Wait for every background refresh started so far.
    pub async fn settle(&self) {
        loop {
            let pending = std::mem::take(
                &mut *self.refreshes.lock().unwrap_or_else(PoisonError::into_inner),
            );
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                if let Err(e) = handle.await {
                    debug!(error = %e, "Background refresh task aborted");
                }
            }
        }
    }

    // =========================================================================
    // Interception
    // =========================================================================

    fn intercepts(&self, request: &Request) -> bool {
        request.method == Method::GET
            && matches!(request.url.scheme(), "http" | "https")
            && request.url.origin() == self.origin.origin()
            && self.is_controlling()
    }

    /// Answer a request the way the worker's fetch handler would.
    pub async fn handle(&self, request: Request) -> Result<Response, FetchError> {
        if !self.intercepts(&request) {
            return self.network.fetch(request).await;
        }

        let class = classify(&request.url);
        match class.strategy() {
            Strategy::CacheFirst => Ok(self.cache_first(request, class).await),
            Strategy::NetworkFirst => Ok(self.network_first(request, class).await),
            Strategy::Passthrough => self.network.fetch(request).await,
        }
    }

    fn cached(&self, namespace: &str, url: &str) -> Option<Response> {
        match self.storage.get(namespace, url) {
            Ok(hit) => hit.map(|entry| entry.data),
            Err(e) => {
                warn!(url, error = %e, "Failed to read cache entry");
                None
            }
        }
    }

    async fn cache_first(&self, request: Request, class: ResourceClass) -> Response {
        let namespace = self.names.for_class(class).to_string();
        let url = request.url.to_string();

        if let Some(hit) = self.cached(&namespace, &url) {
            debug!(url = %url, "Cache hit, revalidating in background");
            self.spawn_refresh(request, namespace);
            return hit;
        }

        debug!(url = %url, "Cache miss");
        match self.network.fetch(request).await {
            Ok(response) => {
                store_if_success(&self.storage, &namespace, &url, &response);
                response
            }
            Err(e) => {
                debug!(url = %url, error = %e, "Network failed with nothing cached");
                synthetic_offline()
            }
        }
    }

    async fn network_first(&self, request: Request, class: ResourceClass) -> Response {
        let namespace = self.names.for_class(class);
        let url = request.url.to_string();
        let wants_page = request.accepts_html();

        match self.network.fetch(request).await {
            Ok(response) => {
                store_if_success(&self.storage, namespace, &url, &response);
                response
            }
            Err(e) => {
                debug!(url = %url, error = %e, "Network failed, trying cache");
                if let Some(hit) = self.cached(namespace, &url) {
                    hit
                } else if wants_page {
                    offline_page()
                } else {
                    synthetic_offline()
                }
            }
        }
    }

    /// Stale-while-revalidate: refresh the entry without making anyone wait.
    fn spawn_refresh(&self, request: Request, namespace: String) {
        let network = Arc::clone(&self.network);
        let storage = self.storage.clone();
        let handle = tokio::spawn(async move {
            let url = request.url.to_string();
            match network.fetch(request).await {
                Ok(response) => store_if_success(&storage, &namespace, &url, &response),
                Err(e) => debug!(url = %url, error = %e, "Background refresh failed, keeping cached copy"),
            }
        });
        let mut refreshes = self.refreshes.lock().unwrap_or_else(PoisonError::into_inner);
        refreshes.retain(|h| !h.is_finished());
        refreshes.push(handle);
    }

    #[cfg(test)]
    fn tracked_refreshes(&self) -> (usize, usize) {
        let refreshes = self.refreshes.lock().unwrap_or_else(PoisonError::into_inner);
        let running = refreshes.iter().filter(|h| !h.is_finished()).count();
        (refreshes.len(), running)
    }
}

#[async_trait]
impl Transport for OfflineCache {
    async fn fetch(&self, request: Request) -> Result<Response, FetchError> {
        self.handle(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::testing::ScriptedTransport;

    const ORIGIN: &str = "https://slopecast.app/";
    const CSS: &str = "https://slopecast.app/css/app.css";
    const TERRAIN: &str = "https://slopecast.app/data/alta/terrain/2024-01-05.json";
    const PAGE: &str = "https://slopecast.app/lift.html";

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    async fn active_worker(network: Arc<ScriptedTransport>) -> OfflineCache {
        let worker = OfflineCache::new(url(ORIGIN), network, CacheStorage::in_memory(), "v1")
            .with_manifest(Vec::new());
        worker.install().await;
        worker.activate().await.unwrap();
        worker
    }

    #[tokio::test]
    async fn test_cache_first_serves_hit_offline_and_refreshes_once() {
        let network = Arc::new(ScriptedTransport::new());
        network.respond(CSS, Response::new(StatusCode::OK, Some("text/css"), "body{}"));
        let worker = active_worker(network.clone()).await;

        let first = worker.handle(Request::get(url(CSS))).await.unwrap();
        assert_eq!(first.body, b"body{}".to_vec());
        assert_eq!(network.hits(CSS), 1);

        network.set_offline(true);
        let second = worker.handle(Request::get(url(CSS))).await.unwrap();
        assert_eq!(second.body, b"body{}".to_vec());

        worker.settle().await;
        assert_eq!(network.hits(CSS), 2);

        // The failed refresh left the entry in place
        let third = worker.handle(Request::get(url(CSS))).await.unwrap();
        assert_eq!(third.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cache_first_background_refresh_updates_entry() {
        let network = Arc::new(ScriptedTransport::new());
        network.respond(CSS, Response::new(StatusCode::OK, Some("text/css"), "old"));
        let worker = active_worker(network.clone()).await;

        worker.handle(Request::get(url(CSS))).await.unwrap();
        network.respond(CSS, Response::new(StatusCode::OK, Some("text/css"), "new"));

        let stale = worker.handle(Request::get(url(CSS))).await.unwrap();
        assert_eq!(stale.text(), "old");
        worker.settle().await;

        let fresh = worker.handle(Request::get(url(CSS))).await.unwrap();
        assert_eq!(fresh.text(), "new");
    }

    #[tokio::test]
    async fn test_finished_refreshes_are_not_retained() {
        let network = Arc::new(ScriptedTransport::new());
        network.respond(CSS, Response::new(StatusCode::OK, Some("text/css"), "body{}"));
        let worker = active_worker(network.clone()).await;
        worker.handle(Request::get(url(CSS))).await.unwrap();

        for _ in 0..50 {
            worker.handle(Request::get(url(CSS))).await.unwrap();
            while worker.tracked_refreshes().1 > 0 {
                tokio::task::yield_now().await;
            }
        }

        assert_eq!(network.hits(CSS), 51);
        assert!(worker.tracked_refreshes().0 <= 1);
        worker.settle().await;
        assert_eq!(worker.tracked_refreshes().0, 0);
    }

    #[tokio::test]
    async fn test_cache_first_miss_offline_is_503() {
        let network = Arc::new(ScriptedTransport::new());
        network.set_offline(true);
        let worker = active_worker(network).await;

        let response = worker.handle(Request::get(url(CSS))).await.unwrap();
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.text(), "Offline");
    }

    #[tokio::test]
    async fn test_unsuccessful_responses_are_not_cached() {
        let network = Arc::new(ScriptedTransport::new());
        network.respond_status(CSS, StatusCode::NOT_FOUND);
        network.respond_status(TERRAIN, StatusCode::INTERNAL_SERVER_ERROR);
        let worker = active_worker(network.clone()).await;

        let css = worker.handle(Request::get(url(CSS))).await.unwrap();
        assert_eq!(css.status, StatusCode::NOT_FOUND);
        let data = worker.handle(Request::get(url(TERRAIN))).await.unwrap();
        assert_eq!(data.status, StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(worker.storage().entry_count(&worker.names().static_assets).unwrap(), 0);
        assert_eq!(worker.storage().entry_count(&worker.names().data).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_network_first_falls_back_to_cache() {
        let network = Arc::new(ScriptedTransport::new());
        network.respond_json(TERRAIN, r#"{"GroomingAreas":[]}"#);
        let worker = active_worker(network.clone()).await;

        let online = worker.handle(Request::get(url(TERRAIN))).await.unwrap();
        assert!(online.is_success());

        network.set_offline(true);
        let offline = worker.handle(Request::get(url(TERRAIN))).await.unwrap();
        assert_eq!(offline.text(), r#"{"GroomingAreas":[]}"#);
        assert_eq!(network.hits(TERRAIN), 2);
    }

    #[tokio::test]
    async fn test_network_first_offline_fallbacks() {
        let network = Arc::new(ScriptedTransport::new());
        network.set_offline(true);
        let worker = active_worker(network).await;

        let page = worker.handle(Request::navigate(url(PAGE))).await.unwrap();
        assert_eq!(page.status, StatusCode::OK);
        assert!(page.content_type.as_deref().unwrap().starts_with("text/html"));
        assert!(page.text().contains("You're offline"));

        // Same page fetched without an HTML Accept header
        let page_fetch = worker.handle(Request::get(url(PAGE))).await.unwrap();
        assert_eq!(page_fetch.status, StatusCode::SERVICE_UNAVAILABLE);

        let data = worker.handle(Request::get(url(TERRAIN))).await.unwrap();
        assert_eq!(data.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_non_get_and_cross_origin_pass_through() {
        let network = Arc::new(ScriptedTransport::new());
        network.respond_json("https://cdn.example.com/lib.js", "1");
        network.respond_json(TERRAIN, "{}");
        let worker = active_worker(network.clone()).await;

        let foreign = worker
            .handle(Request::get(url("https://cdn.example.com/lib.js")))
            .await
            .unwrap();
        assert!(foreign.is_success());

        let head = worker
            .handle(Request::get(url(TERRAIN)).with_method(Method::HEAD))
            .await
            .unwrap();
        assert!(head.is_success());

        assert_eq!(worker.storage().entry_count(&worker.names().static_assets).unwrap(), 0);
        assert_eq!(worker.storage().entry_count(&worker.names().data).unwrap(), 0);

        network.set_offline(true);
        assert!(worker
            .handle(Request::get(url("https://cdn.example.com/lib.js")))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_no_interception_before_activation() {
        let network = Arc::new(ScriptedTransport::new());
        network.respond_json(TERRAIN, "{}");
        let worker = OfflineCache::new(url(ORIGIN), network.clone(), CacheStorage::in_memory(), "v1")
            .with_manifest(Vec::new());
        worker.install().await;
        assert_eq!(worker.state(), WorkerState::Installed);

        worker.handle(Request::get(url(TERRAIN))).await.unwrap();
        assert_eq!(worker.storage().entry_count(&worker.names().data).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_install_tolerates_partial_failure() {
        let network = Arc::new(ScriptedTransport::new());
        network.respond("https://slopecast.app/index.html", Response::new(StatusCode::OK, Some("text/html"), "<html>"));
        network.fail("https://slopecast.app/js/app.js");
        let worker = OfflineCache::new(url(ORIGIN), network, CacheStorage::in_memory(), "v1").with_manifest(vec![
            "index.html".to_string(),
            "js/app.js".to_string(),
            "css/missing.css".to_string(),
        ]);

        let report = worker.install().await;
        assert_eq!(report.cached, 1);
        assert_eq!(
            report.failed,
            vec![
                "https://slopecast.app/css/missing.css".to_string(),
                "https://slopecast.app/js/app.js".to_string(),
            ]
        );
        assert_eq!(worker.state(), WorkerState::Installed);
    }

    #[tokio::test]
    async fn test_activate_deletes_stale_namespaces() {
        let network = Arc::new(ScriptedTransport::new());
        let storage = CacheStorage::in_memory();
        let old = CacheNames::for_build("v0");
        let ok = Response::new(StatusCode::OK, None, "x");
        storage.put(&old.static_assets, CSS, &ok).unwrap();
        storage.put(&old.data, TERRAIN, &ok).unwrap();

        let worker = OfflineCache::new(url(ORIGIN), network, storage.clone(), "v1").with_manifest(Vec::new());
        storage.put(&worker.names().data, TERRAIN, &ok).unwrap();

        assert_eq!(worker.activate().await.unwrap(), 2);
        assert_eq!(storage.keys().unwrap(), vec![worker.names().data.clone()]);
        assert!(worker.is_controlling());
    }

    #[tokio::test]
    async fn test_control_messages() {
        let network = Arc::new(ScriptedTransport::new());
        network.respond_json(TERRAIN, "{}");
        let worker = Arc::new(
            OfflineCache::new(url(ORIGIN), network, CacheStorage::in_memory(), "v1").with_manifest(Vec::new()),
        );
        worker.install().await;

        let (tx, task) = worker.spawn_control_listener();
        tx.send(ControlMessage::SkipWaiting).await.unwrap();
        drop(tx);
        task.await.unwrap();
        assert!(worker.is_controlling());

        worker.handle(Request::get(url(TERRAIN))).await.unwrap();
        assert_eq!(worker.storage().entry_count(&worker.names().data).unwrap(), 1);

        worker.handle_message(ControlMessage::ClearCaches).await;
        assert!(worker.storage().keys().unwrap().is_empty());
    }
}
