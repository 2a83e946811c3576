//! Slopecast core - offline-capable client for pre-generated ski resort reports.
//!
//! The data root is a static tree of JSON documents (terrain, weather, lifts,
//! briefs) keyed by resort and date. This crate fetches them through an
//! offline cache, assembles one day's view of a resort, and renders it to HTML.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod dismissals;
pub mod loader;
pub mod models;
pub mod navigation;
pub mod render;
pub mod utils;

pub use api::{Endpoints, FetchError, HttpTransport, LoadError, Request, Response, Transport};
pub use cache::{CacheStorage, ControlMessage, OfflineCache, WorkerState};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Config, FeatureFlag, FeatureFlags, PageParams, SettingsStore};
pub use dismissals::DismissalStore;
pub use loader::{DaySnapshot, LoadOutcome, LoadState, ResortLoader};
pub use navigation::{DateCursor, Direction, GestureAction, GestureTracker};
