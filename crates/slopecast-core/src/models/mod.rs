//! Data models for the pre-generated resort JSON corpus.
//!
//! This module contains all the data structures read from the data root:
//!
//! - `ResortIndex`: which dated files exist per resort
//! - `TerrainReport`, `ResortDataset`: grooming/open state of every trail for one day
//! - `WeatherReport`, `WeatherSnapshot`: snow and temperature readings
//! - `LiftIndex`: live lift status and operating hours
//! - `MorningBrief`: the generated daily summary
//! - `LiftDetail`, `TrailDetail`: per-lift and per-trail history pages

pub mod brief;
pub mod detail;
pub mod index;
pub mod lifts;
pub mod terrain;
pub mod weather;

pub use brief::{BriefTag, MorningBrief};
pub use detail::{LiftDetail, LiftHistoryEntry, TrailDetail, TrailHistoryEntry};
pub use index::{Pass, ResortEntry, ResortIndex, ResortSummary};
pub use lifts::{Lift, LiftIndex, LiftStatus, OperatingHours, OperatingWindow, WindowError};
pub use terrain::{GroomingArea, ResortDataset, TerrainReport, Trail};
pub use weather::{TemperatureReading, WeatherReport, WeatherSnapshot};
