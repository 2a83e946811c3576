//! Offline caching layer.
//!
//! `OfflineCache` intercepts every request the loader issues and answers it
//! with one of two strategies, chosen by the shape of the URL:
//!
//! - static assets (`.css .js .png .ico .svg .woff2`): cache-first with
//!   background revalidation
//! - data (`.json .ndjson`) and pages (`.html`, paths ending in `/`):
//!   network-first with cache fallback
//!
//! Entries live in two versioned namespaces persisted by `CacheStorage`, so
//! they outlive a single session. Activation drops namespaces from older builds.

pub mod manager;
pub mod storage;
pub mod strategy;

pub use manager::{CacheNames, ControlMessage, InstallReport, OfflineCache, WorkerState};
pub use storage::{CacheStorage, CachedData};
pub use strategy::{classify, ResourceClass, Strategy};
