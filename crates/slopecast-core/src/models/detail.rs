use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::LiftStatus;
use crate::utils::parse_day;

/// Days of lift history shown on a lift page.
pub const LIFT_HISTORY_DAYS: i64 = 14;

/// Days of trail history shown on a trail page.
pub const TRAIL_HISTORY_DAYS: i64 = 90;

/// `<resort>/lifts/data/<slug>.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiftDetail {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    /// Free-form aggregate numbers; rendered as a label/value list in key order.
    #[serde(default)]
    pub stats: BTreeMap<String, serde_json::Value>,
    /// Most recent first.
    #[serde(default)]
    pub history: Vec<LiftHistoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiftHistoryEntry {
    pub date: String,
    #[serde(default)]
    pub status: Option<LiftStatus>,
    #[serde(default, alias = "waitMinutes")]
    pub avg_wait_minutes: Option<f64>,
    #[serde(default)]
    pub hours_open: Option<f64>,
}

/// `<resort>/trails/data/<slug>.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrailDetail {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub stats: BTreeMap<String, serde_json::Value>,
    /// Most recent first.
    #[serde(default)]
    pub history: Vec<TrailHistoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrailHistoryEntry {
    pub date: String,
    #[serde(default)]
    pub is_groomed: bool,
    #[serde(default)]
    pub is_open: bool,
}

trait Dated {
    fn day(&self) -> Option<NaiveDate>;
}

impl Dated for LiftHistoryEntry {
    fn day(&self) -> Option<NaiveDate> {
        parse_day(&self.date)
    }
}

impl Dated for TrailHistoryEntry {
    fn day(&self) -> Option<NaiveDate> {
        parse_day(&self.date)
    }
}

/// Entries dated within `days` days of the newest entry (inclusive), in input order.
fn within_window<T: Dated>(history: &[T], days: i64) -> Vec<&T> {
    let Some(newest) = history.iter().filter_map(Dated::day).max() else {
        return Vec::new();
    };
    let cutoff = newest - Duration::days(days - 1);

    history
        .iter()
        .filter(|entry| entry.day().is_some_and(|d| d >= cutoff))
        .collect()
}

impl LiftDetail {
    pub fn recent_history(&self) -> Vec<&LiftHistoryEntry> {
        within_window(&self.history, LIFT_HISTORY_DAYS)
    }
}

impl TrailDetail {
    pub fn recent_history(&self) -> Vec<&TrailHistoryEntry> {
        within_window(&self.history, TRAIL_HISTORY_DAYS)
    }

    pub fn days_groomed(&self) -> usize {
        self.recent_history().iter().filter(|e| e.is_groomed).count()
    }
}
