use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiftStatus {
    Open,
    Closed,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for LiftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LiftStatus::Open => write!(f, "Open"),
            LiftStatus::Closed => write!(f, "Closed"),
            LiftStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lift {
    pub name: String,
    pub slug: String,
    pub status: LiftStatus,
    #[serde(default)]
    pub wait_minutes: Option<i64>,
    #[serde(default)]
    pub close_time: Option<String>,
}

impl Lift {
    pub fn is_open(&self) -> bool {
        self.status == LiftStatus::Open
    }

    /// Wait used for ranking; a missing wait counts as zero.
    pub fn wait_or_zero(&self) -> i64 {
        self.wait_minutes.unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct OperatingHours {
    /// Local opening time, "HH:MM"
    pub open: String,
    /// Local closing time, "HH:MM" (exclusive)
    pub close: String,
}

/// `<resort>/lifts/index.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiftIndex {
    #[serde(default)]
    pub lifts: Vec<Lift>,
    #[serde(default)]
    pub generated: Option<String>,
    #[serde(default)]
    pub operating_hours: Option<OperatingHours>,
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Parsed operating hours anchored to the resort's timezone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperatingWindow {
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub timezone: Tz,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("Unknown timezone: {0}")]
    Timezone(String),
    #[error("Invalid operating time: {0}")]
    Time(String),
}

fn parse_clock(s: &str) -> Result<NaiveTime, WindowError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|_| WindowError::Time(s.to_string()))
}

impl OperatingWindow {
    /// Resort-local wall time at `now`.
    pub fn local_time(&self, now: DateTime<Utc>) -> NaiveTime {
        now.with_timezone(&self.timezone).time()
    }

    /// Whether `now` falls inside `[open, close)` resort-local time. A window
    /// whose close is not after its open wraps past midnight.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let t = self.local_time(now);
        if self.open < self.close {
            self.open <= t && t < self.close
        } else {
            t >= self.open || t < self.close
        }
    }
}

impl LiftIndex {
    /// The declared operating window, if both hours and a timezone are present.
    ///
    /// `Ok(None)` means the feed does not declare hours and no gating applies.
    pub fn operating_window(&self) -> Result<Option<OperatingWindow>, WindowError> {
        let (Some(hours), Some(tz)) = (&self.operating_hours, &self.timezone) else {
            return Ok(None);
        };

        let timezone: Tz = tz
            .parse()
            .map_err(|_| WindowError::Timezone(tz.clone()))?;

        Ok(Some(OperatingWindow {
            open: parse_clock(&hours.open)?,
            close: parse_clock(&hours.close)?,
            timezone,
        }))
    }

    pub fn open_count(&self) -> usize {
        self.lifts.iter().filter(|l| l.is_open()).count()
    }

    pub fn total_count(&self) -> usize {
        self.lifts.len()
    }

    /// Open lifts with the longest waits first, at most `limit` of them.
    pub fn longest_waits(&self, limit: usize) -> Vec<&Lift> {
        let mut open: Vec<&Lift> = self.lifts.iter().filter(|l| l.is_open()).collect();
        open.sort_by(|a, b| b.wait_or_zero().cmp(&a.wait_or_zero()));
        open.truncate(limit);
        open
    }
}
