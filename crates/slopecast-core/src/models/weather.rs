use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `<resort>/snow/<date>.json` or `<resort>/snow/latest.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    #[serde(default)]
    pub conditions: Option<String>,
    #[serde(default)]
    pub snowfall: Option<Snowfall>,
    #[serde(default)]
    pub forecast: Option<Forecast>,
    #[serde(default)]
    pub current_conditions: Option<CurrentConditions>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snowfall {
    #[serde(rename = "24hour_inches", default)]
    pub last_24h_inches: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Forecast {
    #[serde(default)]
    pub locations: Vec<ForecastLocation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForecastLocation {
    #[serde(default)]
    pub today: Option<DayForecast>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DayForecast {
    #[serde(default)]
    pub high_f: Option<f64>,
    #[serde(default)]
    pub low_f: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurrentConditions {
    #[serde(default)]
    pub temperature_f: Option<f64>,
}

/// A weather report plus where it came from.
#[derive(Debug, Clone)]
pub struct WeatherSnapshot {
    pub report: WeatherReport,
    /// True only when the by-date endpoint answered for a past day.
    pub is_historical: bool,
}

/// What the snow widget can say about temperature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TemperatureReading {
    Forecast { high: Option<f64>, low: Option<f64> },
    Current(f64),
    Unknown,
}

impl WeatherSnapshot {
    pub fn snowfall_24h(&self) -> Option<f64> {
        self.report.snowfall.as_ref().and_then(|s| s.last_24h_inches)
    }

    /// Forecast hi/lo for the first location when present, otherwise the
    /// single current-conditions reading.
    pub fn temperature(&self) -> TemperatureReading {
        let today = self
            .report
            .forecast
            .as_ref()
            .and_then(|f| f.locations.first())
            .and_then(|loc| loc.today.as_ref())
            .filter(|t| t.high_f.is_some() || t.low_f.is_some());

        if let Some(today) = today {
            return TemperatureReading::Forecast {
                high: today.high_f,
                low: today.low_f,
            };
        }

        match self.report.current_conditions.as_ref().and_then(|c| c.temperature_f) {
            Some(t) => TemperatureReading::Current(t),
            None => TemperatureReading::Unknown,
        }
    }

    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        self.report
            .last_updated
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}
