//! Resort data loading.
//!
//! `ResortLoader` owns everything known about the active resort: the
//! available dates, the navigation cursor, and the snapshot for the selected
//! day. Loading a day fetches its terrain report (fatal on failure), then the
//! previous calendar day's report for grooming comparison, then weather, lift
//! and brief data concurrently. Every secondary fetch degrades to `None`.
//!
//! Each `load_date` call takes a fresh generation number. A call that finishes
//! after a newer one has started drops its results instead of overwriting the
//! newer state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use crate::api::{Endpoints, FetchError, LoadError, Request, Transport};
use crate::clock::Clock;
use crate::config::{FeatureFlags, SettingsStore};
use crate::models::{
    LiftDetail, LiftIndex, MorningBrief, ResortDataset, ResortIndex, TerrainReport, TrailDetail,
    WeatherReport, WeatherSnapshot,
};
use crate::navigation::{DateCursor, Direction, GestureAction};

/// Where the loader is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    IndexLoading,
    DateLoading,
    Ready,
    /// User-facing message for the failure
    Error(String),
}

/// Everything rendered for one day.
#[derive(Debug, Clone)]
pub struct DaySnapshot {
    pub resort: String,
    pub today: ResortDataset,
    /// The previous calendar day, when it is in the index and loaded
    pub yesterday: Option<ResortDataset>,
    pub weather: Option<WeatherSnapshot>,
    pub lifts: Option<LiftIndex>,
    pub brief: Option<MorningBrief>,
}

impl DaySnapshot {
    pub fn date(&self) -> NaiveDate {
        self.today.date
    }
}

#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Loaded(Arc<DaySnapshot>),
    /// A newer load started before this one finished; its results were dropped
    Superseded,
}

#[derive(Debug)]
struct Session {
    state: LoadState,
    cursor: Option<DateCursor>,
    snapshot: Option<Arc<DaySnapshot>>,
}

pub struct ResortLoader {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
    resort: String,
    clock: Arc<dyn Clock>,
    flags: Mutex<FeatureFlags>,
    session: Mutex<Session>,
    generation: AtomicU64,
}

impl ResortLoader {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoints: Endpoints,
        resort: impl Into<String>,
        flags: FeatureFlags,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            transport,
            endpoints,
            resort: resort.into(),
            clock,
            flags: Mutex::new(flags),
            session: Mutex::new(Session {
                state: LoadState::Idle,
                cursor: None,
                snapshot: None,
            }),
            generation: AtomicU64::new(0),
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn resort(&self) -> &str {
        &self.resort
    }

    pub fn state(&self) -> LoadState {
        self.session().state.clone()
    }

    pub fn snapshot(&self) -> Option<Arc<DaySnapshot>> {
        self.session().snapshot.clone()
    }

    pub fn cursor(&self) -> Option<DateCursor> {
        self.session().cursor.clone()
    }

    pub fn available_dates(&self) -> Vec<NaiveDate> {
        self.session()
            .cursor
            .as_ref()
            .map(|c| c.dates().to_vec())
            .unwrap_or_default()
    }

    pub fn flags(&self) -> FeatureFlags {
        *self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes effect on the next load.
    pub fn set_flags(&self, flags: FeatureFlags) {
        *self.flags.lock().unwrap_or_else(PoisonError::into_inner) = flags;
    }

    /// Track flag changes made through `store` for as long as this loader lives.
    pub fn follow_settings(self: &Arc<Self>, store: &mut SettingsStore) {
        self.set_flags(store.flags());
        let loader = Arc::downgrade(self);
        store.subscribe(Box::new(move |flags| {
            if let Some(loader) = loader.upgrade() {
                loader.set_flags(*flags);
            }
        }));
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn fail(&self, generation: u64, err: LoadError) -> Result<LoadOutcome, LoadError> {
        if !self.is_current(generation) {
            debug!(error = %err, "Superseded load failed, ignoring");
            return Ok(LoadOutcome::Superseded);
        }
        error!(resort = %self.resort, error = %err, "Load failed");
        self.session().state = LoadState::Error(err.user_message());
        Err(err)
    }

    // =========================================================================
    // Fetch helpers
    // =========================================================================

    async fn fetch_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, LoadError> {
        let response = self
            .transport
            .fetch(Request::get(url.clone()))
            .await
            .map_err(|source| LoadError::Fetch {
                url: url.to_string(),
                source,
            })?;

        if !response.is_success() {
            return Err(LoadError::from_status(url.as_str(), response.status));
        }

        response.json().map_err(|source| LoadError::Parse {
            url: url.to_string(),
            source,
        })
    }

    fn endpoint(url: Result<Url, FetchError>) -> Result<Url, LoadError> {
        url.map_err(|source| LoadError::Fetch {
            url: String::new(),
            source,
        })
    }

    /// Secondary fetch: any failure becomes `None`.
    async fn fetch_optional<T: DeserializeOwned>(
        &self,
        url: Result<Url, FetchError>,
        what: &str,
    ) -> Option<T> {
        let url = match url {
            Ok(url) => url,
            Err(e) => {
                warn!(what, error = %e, "Skipping secondary fetch");
                return None;
            }
        };
        match self.fetch_json(url).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(what, error = %e, "Secondary fetch failed, continuing without it");
                None
            }
        }
    }

    // =========================================================================
    // Index
    // =========================================================================

    pub async fn fetch_index(&self) -> Result<ResortIndex, LoadError> {
        self.fetch_json(Self::endpoint(self.endpoints.index())?).await
    }

    /// Resolve the available dates and load the most recent one.
    pub async fn load_index(&self) -> Result<LoadOutcome, LoadError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.session().state = LoadState::IndexLoading;

        let index = match self.fetch_index().await {
            Ok(index) => index,
            Err(e) => return self.fail(generation, e),
        };

        let dates = index.available_dates(&self.resort).unwrap_or_default();
        let Some(cursor) = DateCursor::new(dates) else {
            return self.fail(generation, LoadError::NoData(self.resort.clone()));
        };

        if !self.is_current(generation) {
            return Ok(LoadOutcome::Superseded);
        }

        let latest = cursor.current();
        info!(resort = %self.resort, dates = cursor.dates().len(), %latest, "Index loaded");
        self.session().cursor = Some(cursor);

        self.load_date(latest).await
    }

    // =========================================================================
    // Dates
    // =========================================================================

    /// Load the snapshot for `date` and make it current.
    pub async fn load_date(&self, date: NaiveDate) -> Result<LoadOutcome, LoadError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            // The cursor follows the request, so a failed day can be retried or stepped past
            let mut session = self.session();
            session.state = LoadState::DateLoading;
            if let Some(cursor) = session.cursor.as_mut() {
                cursor.seek(date);
            }
        }
        debug!(resort = %self.resort, %date, generation, "Loading date");

        let today_url = match Self::endpoint(self.endpoints.terrain(&self.resort, date)) {
            Ok(url) => url,
            Err(e) => return self.fail(generation, e),
        };
        let report: TerrainReport = match self.fetch_json(today_url).await {
            Ok(report) => report,
            Err(e) => return self.fail(generation, e),
        };
        let today = ResortDataset::new(self.resort.clone(), date, report);

        let yesterday = self.load_comparison_day(date).await;

        let flags = self.flags();
        let (weather, lifts, brief) = futures::join!(
            self.load_weather_data(date),
            async {
                if flags.live_lift_data {
                    self.fetch_optional::<LiftIndex>(self.endpoints.lifts(&self.resort), "lifts")
                        .await
                } else {
                    None
                }
            },
            async {
                if flags.daily_briefs {
                    self.fetch_optional::<MorningBrief>(self.endpoints.brief(&self.resort), "brief")
                        .await
                } else {
                    None
                }
            },
        );

        if !self.is_current(generation) {
            debug!(%date, generation, "Load superseded, dropping results");
            return Ok(LoadOutcome::Superseded);
        }

        let snapshot = Arc::new(DaySnapshot {
            resort: self.resort.clone(),
            today,
            yesterday,
            weather,
            lifts,
            brief,
        });

        let mut session = self.session();
        session.snapshot = Some(Arc::clone(&snapshot));
        session.state = LoadState::Ready;
        drop(session);

        info!(resort = %self.resort, %date, "Date loaded");
        Ok(LoadOutcome::Loaded(snapshot))
    }

    /// The literal previous calendar day, fetched only when the index lists it.
    async fn load_comparison_day(&self, date: NaiveDate) -> Option<ResortDataset> {
        let previous = date.pred_opt()?;
        let listed = self
            .session()
            .cursor
            .as_ref()
            .is_some_and(|c| c.contains(previous));
        if !listed {
            debug!(%date, %previous, "No report for previous day, grooming comparison disabled");
            return None;
        }

        let report: TerrainReport = self
            .fetch_optional(self.endpoints.terrain(&self.resort, previous), "comparison day")
            .await?;
        Some(ResortDataset::new(self.resort.clone(), previous, report))
    }

    /// Weather for `date`: the by-date report for past days, otherwise (or if
    /// that fails) the latest report.
    pub async fn load_weather_data(&self, date: NaiveDate) -> Option<WeatherSnapshot> {
        if date != self.clock.today() {
            let historical: Option<WeatherReport> = self
                .fetch_optional(self.endpoints.weather(&self.resort, date), "historical weather")
                .await;
            if let Some(report) = historical {
                return Some(WeatherSnapshot {
                    report,
                    is_historical: true,
                });
            }
        }

        let report: WeatherReport = self
            .fetch_optional(self.endpoints.weather_latest(&self.resort), "latest weather")
            .await?;
        Some(WeatherSnapshot {
            report,
            is_historical: false,
        })
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Reload the date under the cursor, whether or not its last load succeeded.
    pub async fn reload(&self) -> Result<LoadOutcome, LoadError> {
        let current = self.session().cursor.as_ref().map(DateCursor::current);
        match current {
            Some(date) => self.load_date(date).await,
            None => self.load_index().await,
        }
    }

    /// Step to an older or newer date. `Ok(None)` when already at the end.
    pub async fn navigate(&self, direction: Direction) -> Result<Option<LoadOutcome>, LoadError> {
        let target = self
            .session()
            .cursor
            .as_ref()
            .and_then(|c| c.peek(direction));
        match target {
            Some(date) => self.load_date(date).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn apply_gesture(&self, action: GestureAction) -> Result<Option<LoadOutcome>, LoadError> {
        match action {
            GestureAction::Refresh => self.reload().await.map(Some),
            GestureAction::Navigate(direction) => self.navigate(direction).await,
        }
    }

    // =========================================================================
    // Detail pages
    // =========================================================================

    pub async fn load_lift_detail(&self, slug: &str) -> Result<LiftDetail, LoadError> {
        let url = Self::endpoint(self.endpoints.lift_detail(&self.resort, slug))?;
        self.fetch_json(url).await
    }

    pub async fn load_trail_detail(&self, slug: &str) -> Result<TrailDetail, LoadError> {
        let url = Self::endpoint(self.endpoints.trail_detail(&self.resort, slug))?;
        self.fetch_json(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::testing::ScriptedTransport;
    use crate::clock::FixedClock;
    use crate::config::{Config, FeatureFlag};
    use crate::render::{render_overview, OverviewContext};
    use chrono::{TimeZone, Utc};
    use reqwest::StatusCode;

    const ROOT: &str = "https://slopecast.app/data/";

    const INDEX: &str = r#"{ "resorts": { "alta": { "files": ["2024-01-05.json", "2024-01-04.json", "2024-01-02.json"] } } }"#;

    fn terrain(groomed: &[(&str, bool)]) -> String {
        let trails: Vec<String> = groomed
            .iter()
            .map(|(id, g)| {
                format!(
                    r#"{{ "Id": "{id}", "Name": "Trail {id}", "Difficulty": "Blue", "IsGroomed": {g}, "IsOpen": true }}"#
                )
            })
            .collect();
        format!(r#"{{ "GroomingAreas": [ {{ "Name": "Main", "Trails": [{}] }} ] }}"#, trails.join(","))
    }

    fn url(path: &str) -> String {
        format!("{}{}", ROOT, path)
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn scripted() -> Arc<ScriptedTransport> {
        let network = Arc::new(ScriptedTransport::new());
        network.respond_json(&url("index.json"), INDEX);
        network.respond_json(&url("alta/terrain/2024-01-05.json"), &terrain(&[("1", true), ("2", true)]));
        network.respond_json(&url("alta/terrain/2024-01-04.json"), &terrain(&[("1", true), ("2", false)]));
        network.respond_json(&url("alta/terrain/2024-01-02.json"), &terrain(&[("1", true)]));
        network.respond_json(&url("alta/snow/latest.json"), r#"{ "conditions": "Sunny" }"#);
        network.respond_json(&url("alta/snow/2024-01-04.json"), r#"{ "conditions": "Snow" }"#);
        network.respond_json(&url("alta/lifts/index.json"), r#"{ "lifts": [] }"#);
        network
    }

    fn loader_with(network: Arc<ScriptedTransport>, flags: FeatureFlags) -> ResortLoader {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 5, 15, 0, 0).unwrap());
        ResortLoader::new(
            network,
            Endpoints::new(Url::parse(ROOT).unwrap()),
            "alta",
            flags,
            Arc::new(clock),
        )
    }

    fn loaded(outcome: LoadOutcome) -> Arc<DaySnapshot> {
        match outcome {
            LoadOutcome::Loaded(snapshot) => snapshot,
            LoadOutcome::Superseded => panic!("load was superseded"),
        }
    }

    #[tokio::test]
    async fn test_load_index_selects_latest_date() {
        let network = scripted();
        let loader = loader_with(network, FeatureFlags::default());
        assert_eq!(loader.state(), LoadState::Idle);

        let snapshot = loaded(loader.load_index().await.unwrap());
        assert_eq!(snapshot.date(), day("2024-01-05"));
        assert_eq!(loader.state(), LoadState::Ready);
        assert_eq!(
            loader.available_dates(),
            vec![day("2024-01-05"), day("2024-01-04"), day("2024-01-02")]
        );
        assert_eq!(loader.cursor().unwrap().index(), 0);
    }

    #[tokio::test]
    async fn test_load_index_unknown_resort_is_no_data() {
        let network = scripted();
        let loader = ResortLoader::new(
            network,
            Endpoints::new(Url::parse(ROOT).unwrap()),
            "snowbird",
            FeatureFlags::default(),
            Arc::new(FixedClock::new(Utc::now())),
        );

        let err = loader.load_index().await.unwrap_err();
        assert!(matches!(err, LoadError::NoData(ref r) if r == "snowbird"));
        assert_eq!(loader.state(), LoadState::Error("No data available for snowbird".to_string()));
    }

    #[tokio::test]
    async fn test_comparison_day_fetched_only_when_listed() {
        let network = scripted();
        let loader = loader_with(network.clone(), FeatureFlags::default());
        loader.load_index().await.unwrap();

        let snapshot = loader.snapshot().unwrap();
        assert_eq!(snapshot.yesterday.as_ref().unwrap().date, day("2024-01-04"));
        assert_eq!(network.hits(&url("alta/terrain/2024-01-04.json")), 1);

        let snapshot = loaded(loader.load_date(day("2024-01-02")).await.unwrap());
        assert!(snapshot.yesterday.is_none());
        assert_eq!(network.hits(&url("alta/terrain/2024-01-01.json")), 0);
        assert_eq!(loader.cursor().unwrap().index(), 2);
    }

    #[tokio::test]
    async fn test_primary_failure_is_fatal() {
        let network = scripted();
        network.respond_status(&url("alta/terrain/2024-01-04.json"), StatusCode::NOT_FOUND);
        let loader = loader_with(network, FeatureFlags::default());
        loader.load_index().await.unwrap();

        let err = loader.load_date(day("2024-01-04")).await.unwrap_err();
        assert!(matches!(err, LoadError::Status { status, .. } if status == StatusCode::NOT_FOUND));
        assert!(matches!(loader.state(), LoadState::Error(_)));
    }

    #[tokio::test]
    async fn test_secondary_failures_degrade() {
        let network = scripted();
        network.fail(&url("alta/terrain/2024-01-04.json"));
        network.fail(&url("alta/snow/latest.json"));
        network.respond_status(&url("alta/lifts/index.json"), StatusCode::BAD_GATEWAY);
        let flags = FeatureFlags {
            daily_briefs: true,
            ..FeatureFlags::default()
        };
        let loader = loader_with(network, flags);

        let snapshot = loaded(loader.load_index().await.unwrap());
        assert!(snapshot.yesterday.is_none());
        assert!(snapshot.weather.is_none());
        assert!(snapshot.lifts.is_none());
        assert!(snapshot.brief.is_none());
        assert_eq!(loader.state(), LoadState::Ready);
    }

    #[tokio::test]
    async fn test_flags_gate_lift_and_brief_fetches() {
        let network = scripted();
        let flags = FeatureFlags {
            live_lift_data: false,
            daily_briefs: false,
            ..FeatureFlags::default()
        };
        let loader = loader_with(network.clone(), flags);
        loader.load_index().await.unwrap();

        assert_eq!(network.hits(&url("alta/lifts/index.json")), 0);
        assert_eq!(network.hits(&url("alta/brief/latest.json")), 0);
    }

    #[tokio::test]
    async fn test_weather_historical_then_latest() {
        let network = scripted();
        let loader = loader_with(network.clone(), FeatureFlags::default());

        // Today: straight to latest
        let today = loader.load_weather_data(day("2024-01-05")).await.unwrap();
        assert!(!today.is_historical);
        assert_eq!(network.hits(&url("alta/snow/2024-01-05.json")), 0);

        let past = loader.load_weather_data(day("2024-01-04")).await.unwrap();
        assert!(past.is_historical);
        assert_eq!(past.report.conditions.as_deref(), Some("Snow"));

        // No by-date report: falls back to latest
        let fallback = loader.load_weather_data(day("2024-01-02")).await.unwrap();
        assert!(!fallback.is_historical);
        assert_eq!(fallback.report.conditions.as_deref(), Some("Sunny"));
    }

    #[tokio::test]
    async fn test_navigation_moves_cursor() {
        let network = scripted();
        let loader = loader_with(network, FeatureFlags::default());
        loader.load_index().await.unwrap();

        assert!(loader.navigate(Direction::Next).await.unwrap().is_none());

        let outcome = loader.navigate(Direction::Previous).await.unwrap().unwrap();
        assert_eq!(loaded(outcome).date(), day("2024-01-04"));

        let outcome = loader.apply_gesture(GestureAction::Refresh).await.unwrap().unwrap();
        assert_eq!(loaded(outcome).date(), day("2024-01-04"));
        assert_eq!(loader.cursor().unwrap().index(), 1);
    }

    #[tokio::test]
    async fn test_failed_date_does_not_trap_navigation() {
        let network = scripted();
        network.respond_status(&url("alta/terrain/2024-01-04.json"), StatusCode::NOT_FOUND);
        let loader = loader_with(network.clone(), FeatureFlags::default());
        loader.load_index().await.unwrap();

        assert!(loader.navigate(Direction::Previous).await.is_err());
        assert_eq!(loader.cursor().unwrap().current(), day("2024-01-04"));

        // Refresh retries the failed day rather than the last good one
        assert!(loader.apply_gesture(GestureAction::Refresh).await.is_err());
        assert_eq!(network.hits(&url("alta/terrain/2024-01-04.json")), 3);
        assert_eq!(network.hits(&url("alta/terrain/2024-01-05.json")), 1);

        let outcome = loader.navigate(Direction::Previous).await.unwrap().unwrap();
        assert_eq!(loaded(outcome).date(), day("2024-01-02"));
        assert_eq!(loader.cursor().unwrap().index(), 2);
        assert_eq!(loader.state(), LoadState::Ready);
    }

    #[tokio::test]
    async fn test_reloading_a_day_renders_identically() {
        let network = scripted();
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 5, 15, 0, 0).unwrap());
        let loader = loader_with(network, FeatureFlags::default());
        loader.load_index().await.unwrap();

        let mut pages = Vec::new();
        for _ in 0..2 {
            let snapshot = loaded(loader.load_date(day("2024-01-05")).await.unwrap());
            let flags = loader.flags();
            let cursor = loader.cursor();
            let html = render_overview(&OverviewContext {
                snapshot: &snapshot,
                flags: &flags,
                cursor: cursor.as_ref(),
                now: clock.now(),
                today: clock.today(),
                brief_dismissed: false,
            });
            pages.push(html.to_html());
        }

        assert!(pages[0].contains("Trail 2"));
        assert_eq!(pages[0], pages[1]);
    }

    #[tokio::test]
    async fn test_follows_settings_changes() {
        let network = scripted();
        let loader = Arc::new(loader_with(network.clone(), FeatureFlags::default()));
        let mut store = SettingsStore::new(Config::default(), None);
        loader.follow_settings(&mut store);

        loader.load_index().await.unwrap();
        assert_eq!(network.hits(&url("alta/lifts/index.json")), 1);

        assert!(store.set(FeatureFlag::LiveLiftData, false).unwrap());
        assert!(!loader.flags().live_lift_data);
        loader.reload().await.unwrap();
        assert_eq!(network.hits(&url("alta/lifts/index.json")), 1);

        drop(loader);
        assert!(store.set(FeatureFlag::LiveLiftData, true).unwrap());
    }

    #[tokio::test]
    async fn test_superseded_load_does_not_overwrite_newer() {
        let network = scripted();
        let loader = loader_with(network.clone(), FeatureFlags::default());
        loader.load_index().await.unwrap();

        let gate = network.hold(&url("alta/terrain/2024-01-04.json"));
        let (slow, fast) = tokio::join!(loader.load_date(day("2024-01-04")), async {
            let outcome = loader.load_date(day("2024-01-02")).await;
            gate.notify_one();
            outcome
        });

        assert!(matches!(slow.unwrap(), LoadOutcome::Superseded));
        assert_eq!(loaded(fast.unwrap()).date(), day("2024-01-02"));
        assert_eq!(loader.snapshot().unwrap().date(), day("2024-01-02"));
        assert_eq!(loader.state(), LoadState::Ready);
    }

    #[tokio::test]
    async fn test_detail_pages() {
        let network = scripted();
        network.respond_json(&url("alta/lifts/data/collins.json"), r#"{ "name": "Collins", "slug": "collins" }"#);
        let loader = loader_with(network, FeatureFlags::default());

        assert_eq!(loader.load_lift_detail("collins").await.unwrap().name, "Collins");
        assert!(matches!(
            loader.load_trail_detail("ballroom").await,
            Err(LoadError::Status { .. })
        ));
        assert!(matches!(
            loader.load_trail_detail("../index").await,
            Err(LoadError::Fetch { .. })
        ));
    }
}
