use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Raw `<resort>/terrain/<date>.json` document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TerrainReport {
    #[serde(default)]
    pub grooming_areas: Vec<GroomingArea>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroomingArea {
    pub name: String,
    #[serde(default)]
    pub trails: Vec<Trail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Trail {
    // Upstream emits ids as numbers for some resorts and strings for others
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub is_groomed: bool,
    #[serde(default)]
    pub is_open: bool,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

/// One resort's terrain state for one calendar day. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct ResortDataset {
    pub resort: String,
    pub date: NaiveDate,
    pub grooming_areas: Vec<GroomingArea>,
}

impl ResortDataset {
    pub fn new(resort: impl Into<String>, date: NaiveDate, report: TerrainReport) -> Self {
        Self {
            resort: resort.into(),
            date,
            grooming_areas: report.grooming_areas,
        }
    }

    /// Every trail across all grooming areas, in document order.
    pub fn trails(&self) -> impl Iterator<Item = &Trail> {
        self.grooming_areas.iter().flat_map(|area| area.trails.iter())
    }

    pub fn groomed_trails(&self) -> impl Iterator<Item = &Trail> {
        self.trails().filter(|t| t.is_groomed)
    }

    /// Identifiers of every trail groomed on this day.
    pub fn groomed_ids(&self) -> HashSet<&str> {
        self.groomed_trails().map(|t| t.id.as_str()).collect()
    }

    pub fn trail_count(&self) -> usize {
        self.trails().count()
    }

    pub fn groomed_count(&self) -> usize {
        self.groomed_trails().count()
    }

    pub fn open_count(&self) -> usize {
        self.trails().filter(|t| t.is_open).count()
    }
}
