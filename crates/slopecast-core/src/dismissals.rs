//! Morning brief dismissal state.
//!
//! Dismissing the brief records today's date against the resort key. The
//! brief counts as dismissed only while the stored date equals today, so a
//! dismissal lapses on its own at the next calendar day.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::debug;

/// Dismissal file name in cache directory
const DISMISSALS_FILE: &str = "brief_dismissals.json";

pub struct DismissalStore {
    path: Option<PathBuf>,
    dismissed: BTreeMap<String, NaiveDate>,
}

impl DismissalStore {
    /// Keep dismissals in memory only.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            dismissed: BTreeMap::new(),
        }
    }

    /// Load dismissals persisted under `cache_dir`.
    pub fn open(cache_dir: &Path) -> Result<Self> {
        let path = cache_dir.join(DISMISSALS_FILE);
        let dismissed = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .context("Failed to read brief dismissal file")?;
            serde_json::from_str(&contents).context("Failed to parse brief dismissal file")?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path: Some(path),
            dismissed,
        })
    }

    pub fn is_dismissed(&self, resort: &str, today: NaiveDate) -> bool {
        self.dismissed.get(resort) == Some(&today)
    }

    pub fn dismiss(&mut self, resort: &str, today: NaiveDate) -> Result<()> {
        debug!(resort, %today, "Dismissing morning brief");
        self.dismissed.insert(resort.to_string(), today);
        self.save()
    }

    fn save(&self) -> Result<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&self.dismissed)?;
        std::fs::write(path, contents).context("Failed to write brief dismissal file")?;
        Ok(())
    }
}
