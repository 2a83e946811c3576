use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context as _, Result};
use chrono::NaiveDate;
use tracing::{error, info};

use slopecast_core::api::{Endpoints, HttpTransport, LoadError, Request, Transport};
use slopecast_core::cache::{CacheStorage, ControlMessage, OfflineCache};
use slopecast_core::clock::{Clock, SystemClock};
use slopecast_core::config::{Config, FeatureFlag, SettingsStore};
use slopecast_core::dismissals::DismissalStore;
use slopecast_core::loader::{LoadOutcome, ResortLoader};
use slopecast_core::models::ResortIndex;
use slopecast_core::render::{
    render_error, render_lift_detail, render_overview, render_trail_detail, OverviewContext,
};
use slopecast_core::utils::{format_date_label, truncate_string};

/// Offline namespaces directory under the cache dir
const OFFLINE_DIR: &str = "offline";

pub struct Context {
    pub config: Config,
    pub cache: Arc<OfflineCache>,
    /// Flags as stored on disk; loaders follow changes made here
    settings: Mutex<SettingsStore>,
    endpoints: Endpoints,
    clock: Arc<dyn Clock>,
    cache_dir: PathBuf,
    resort: Option<String>,
}

impl Context {
    /// Load configuration and bring the offline cache up in front of the network.
    pub async fn new(resort: Option<String>) -> Result<Self> {
        let config_path = Config::config_path()?;
        let stored = Config::load_from(&config_path)?;
        let mut config = stored.clone();
        config.apply_env();
        let settings = Mutex::new(SettingsStore::new(stored, Some(config_path)));

        let cache_dir = config.cache_dir()?;
        let storage = CacheStorage::open(cache_dir.join(OFFLINE_DIR))?;
        let network: Arc<dyn Transport> = Arc::new(HttpTransport::new()?);
        let cache = Arc::new(OfflineCache::new(
            config.origin_url()?,
            network,
            storage,
            &config.build_tag,
        ));

        if cache.storage().entry_count(&cache.names().static_assets)? == 0 {
            let report = cache.install().await;
            if !report.failed.is_empty() {
                info!(failed = report.failed.len(), "Some shell assets were not pre-cached");
            }
        }
        cache.activate().await?;

        Ok(Self {
            endpoints: Endpoints::new(config.data_root_url()?),
            resort: resort.or_else(|| config.resort.clone()),
            config,
            cache,
            settings,
            clock: Arc::new(SystemClock),
            cache_dir,
        })
    }

    fn resort(&self) -> Result<&str> {
        self.resort
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No resort selected; pass --resort or set SLOPECAST_RESORT"))
    }

    fn settings(&self) -> MutexGuard<'_, SettingsStore> {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn loader(&self) -> Result<Arc<ResortLoader>> {
        let transport: Arc<dyn Transport> = self.cache.clone();
        let loader = Arc::new(ResortLoader::new(
            transport,
            self.endpoints.clone(),
            self.resort()?,
            self.config.flags,
            Arc::clone(&self.clock),
        ));
        loader.follow_settings(&mut self.settings());
        Ok(loader)
    }
}

fn emit(html: &str, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => std::fs::write(path, html)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            print!("{}", html);
            Ok(())
        }
    }
}

/// Print the error panel and turn the load error into a failed exit.
fn report_failure(err: LoadError, out: Option<&Path>) -> Result<()> {
    error!(error = %err, "Load failed");
    emit(&render_error(&err.user_message()), out)?;
    Err(err.into())
}

pub async fn overview(ctx: &Context, date: Option<NaiveDate>, out: Option<&Path>) -> Result<()> {
    let loader = ctx.loader()?;

    let mut outcome = loader.load_index().await;
    if let Some(date) = date.filter(|_| outcome.is_ok()) {
        let listed = loader.cursor().is_some_and(|c| c.contains(date));
        if !listed {
            anyhow::bail!("No report for {} on {}", loader.resort(), date);
        }
        outcome = loader.load_date(date).await;
    }

    let snapshot = match outcome {
        Ok(LoadOutcome::Loaded(snapshot)) => snapshot,
        // Only one load is ever in flight here
        Ok(LoadOutcome::Superseded) => {
            anyhow::bail!("Load for {} was superseded by a newer request", loader.resort())
        }
        Err(e) => return report_failure(e, out),
    };

    let today = ctx.clock.today();
    let dismissals = DismissalStore::open(&ctx.cache_dir)?;
    let flags = loader.flags();
    let cursor = loader.cursor();

    let html = render_overview(&OverviewContext {
        snapshot: &snapshot,
        flags: &flags,
        cursor: cursor.as_ref(),
        now: ctx.clock.now(),
        today,
        brief_dismissed: dismissals.is_dismissed(loader.resort(), today),
    });
    emit(&html.to_html(), out)
}

pub async fn dates(ctx: &Context) -> Result<()> {
    let loader = ctx.loader()?;
    let index = loader.fetch_index().await?;
    let dates = index
        .available_dates(loader.resort())
        .ok_or_else(|| LoadError::NoData(loader.resort().to_string()))?;

    for date in dates {
        println!("{}  {}", date, format_date_label(date));
    }
    Ok(())
}

pub async fn lift(ctx: &Context, slug: &str) -> Result<()> {
    let detail = ctx.loader()?.load_lift_detail(slug).await;
    match detail {
        Ok(detail) => emit(&render_lift_detail(&detail), None),
        Err(e) => report_failure(e, None),
    }
}

pub async fn trail(ctx: &Context, slug: &str) -> Result<()> {
    let detail = ctx.loader()?.load_trail_detail(slug).await;
    match detail {
        Ok(detail) => emit(&render_trail_detail(&detail), None),
        Err(e) => report_failure(e, None),
    }
}

pub async fn resorts(ctx: &Context) -> Result<()> {
    let url = ctx.endpoints.index()?;
    let response = ctx.cache.fetch(Request::get(url.clone())).await?;
    if !response.is_success() {
        return Err(LoadError::from_status(url.as_str(), response.status).into());
    }
    let index: ResortIndex = response.json().context("Failed to parse resort index")?;

    for resort in index.visible_resorts(&ctx.settings().flags()) {
        println!(
            "{:<20} {:<32} {:<6} {} days",
            resort.key,
            truncate_string(&resort.name, 32),
            format!("{:?}", resort.pass),
            resort.day_count
        );
    }
    Ok(())
}

pub fn dismiss_brief(ctx: &Context) -> Result<()> {
    let resort = ctx.resort()?;
    let today = ctx.clock.today();
    let mut dismissals = DismissalStore::open(&ctx.cache_dir)?;
    dismissals.dismiss(resort, today)?;
    println!("Morning brief for {} hidden until tomorrow", resort);
    Ok(())
}

pub fn settings_show(ctx: &Context) -> Result<()> {
    let flags = ctx.settings().flags();
    for flag in FeatureFlag::ALL {
        println!("{:<20} {}", flag, flags.get(flag));
    }
    Ok(())
}

/// Persist one flag. The store holds the on-disk config, so env overrides are not written back.
pub fn settings_set(ctx: &Context, flag: &str, value: bool) -> Result<()> {
    let flag: FeatureFlag = flag.parse()?;
    let mut store = ctx.settings();
    store.subscribe(Box::new(move |flags| {
        println!("{} = {}", flag, flags.get(flag));
    }));

    if !store.set(flag, value)? {
        println!("{} already {}", flag, value);
    }
    Ok(())
}

pub async fn cache_warm(ctx: &Context) -> Result<()> {
    let report = ctx.cache.install().await;
    let (tx, task) = ctx.cache.spawn_control_listener();
    tx.send(ControlMessage::SkipWaiting).await?;
    drop(tx);
    task.await?;

    println!("Cached {} assets", report.cached);
    for url in &report.failed {
        println!("  failed: {}", url);
    }
    Ok(())
}

pub async fn cache_clear(ctx: &Context) -> Result<()> {
    let (tx, task) = ctx.cache.spawn_control_listener();
    tx.send(ControlMessage::ClearCaches).await?;
    drop(tx);
    task.await?;
    println!("Offline cache cleared");
    Ok(())
}

pub fn cache_status(ctx: &Context) -> Result<()> {
    let storage = ctx.cache.storage();
    let names = ctx.cache.names();
    println!("state: {:?}", ctx.cache.state());

    let mut keys = storage.keys()?;
    keys.sort();
    for name in keys {
        let current = if name == names.static_assets || name == names.data {
            ""
        } else {
            " (stale)"
        };
        println!("{:<32} {} entries{}", name, storage.entry_count(&name)?, current);
    }
    Ok(())
}
