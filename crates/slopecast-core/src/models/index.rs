use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::FeatureFlags;
use crate::utils::parse_day;

/// Top-level `index.json`: every resort and the dated terrain files it has.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResortIndex {
    #[serde(default)]
    pub resorts: BTreeMap<String, ResortEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResortEntry {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub pass: Option<String>,
    #[serde(default)]
    pub incomplete: bool,
}

/// Season pass a resort belongs to. Drives the resort-list filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Ikon,
    Vail,
    Other,
}

impl Pass {
    pub fn from_label(s: Option<&str>) -> Self {
        match s.map(|p| p.trim().to_ascii_lowercase()) {
            Some(p) if p == "ikon" => Pass::Ikon,
            Some(p) if p == "vail" || p == "epic" => Pass::Vail,
            _ => Pass::Other,
        }
    }
}

/// One row of the resort picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResortSummary {
    pub key: String,
    pub name: String,
    pub pass: Pass,
    pub day_count: usize,
}

impl ResortIndex {
    /// Dates with a terrain file for `resort`, most recent first, without duplicates.
    ///
    /// Returns `None` when the resort has no entry in the index. File names that
    /// are not ISO days once their extension is stripped are ignored.
    pub fn available_dates(&self, resort: &str) -> Option<Vec<NaiveDate>> {
        let entry = self.resorts.get(resort)?;

        let unique: BTreeSet<NaiveDate> = entry
            .files
            .iter()
            .filter_map(|file| {
                let stem = file.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(file.as_str());
                let day = parse_day(stem);
                if day.is_none() {
                    debug!(resort, file = %file, "Skipping non-date index entry");
                }
                day
            })
            .collect();

        Some(unique.into_iter().rev().collect())
    }

    /// Resorts the picker should list under the current feature flags, sorted by name.
    pub fn visible_resorts(&self, flags: &FeatureFlags) -> Vec<ResortSummary> {
        let mut resorts: Vec<ResortSummary> = self
            .resorts
            .iter()
            .filter(|(_, entry)| flags.show_incomplete_data || !entry.incomplete)
            .map(|(key, entry)| ResortSummary {
                key: key.clone(),
                name: entry.name.clone().unwrap_or_else(|| key.clone()),
                pass: Pass::from_label(entry.pass.as_deref()),
                day_count: entry.files.len(),
            })
            .filter(|summary| match summary.pass {
                Pass::Ikon => flags.show_ikon_resorts,
                Pass::Vail => flags.show_vail_resorts,
                Pass::Other => true,
            })
            .collect();

        resorts.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        resorts
    }
}
