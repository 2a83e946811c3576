//! Utility functions for string formatting and manipulation.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{
    age_display, format_date_label, format_snowfall, format_temperature, format_time_12h,
    humanize_key, parse_day, truncate_string,
};
