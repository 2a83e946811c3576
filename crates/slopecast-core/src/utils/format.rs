use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

/// ISO day format used by every dated file in the corpus.
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Parse an ISO `YYYY-MM-DD` day string.
pub fn parse_day(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DAY_FORMAT).ok()
}

/// Short navigation label: "Fri, Jan 5"
pub fn format_date_label(date: NaiveDate) -> String {
    date.format("%a, %b %-d").to_string()
}

/// Render a relative age the way cache ages are shown: "just now", "5m ago",
/// "2h ago", "3d ago". Partial units round half up.
pub fn age_display(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - then).num_minutes();
    if minutes < 1 {
        // Clock skew lands here too
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

/// Whole-degree Fahrenheit, or a placeholder when missing.
pub fn format_temperature(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{}°", v.round() as i64),
        None => "--".to_string(),
    }
}

/// Inches of snowfall with at most one decimal: `0"`, `3.5"`.
pub fn format_snowfall(inches: Option<f64>) -> String {
    match inches {
        Some(v) if v.fract().abs() < f64::EPSILON => format!("{}\"", v as i64),
        Some(v) => format!("{:.1}\"", v),
        None => "--".to_string(),
    }
}

/// "8:00 AM" style clock time.
pub fn format_time_12h(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}

/// Turn a camelCase or snake_case stats key into a label: `avgWaitMinutes` → "Avg wait minutes".
pub fn humanize_key(key: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    for c in key.chars() {
        if c == '_' || c == '-' || c == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else if c.is_ascii_uppercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
            current.push(c.to_ascii_lowercase());
        } else {
            current.push(c.to_ascii_lowercase());
        }
    }
    if !current.is_empty() {
        words.push(current);
    }

    let joined = words.join(" ");
    let mut chars = joined.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_parse_day() {
        assert_eq!(parse_day("2024-01-05"), NaiveDate::from_ymd_opt(2024, 1, 5));
        assert_eq!(parse_day("latest"), None);
        assert_eq!(parse_day("2024-13-01"), None);
    }

    #[test]
    fn test_format_date_label() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(format_date_label(date), "Fri, Jan 5");
    }

    #[test]
    fn test_age_display_rounding() {
        let now = Utc::now();
        assert_eq!(age_display(now, now), "just now");
        assert_eq!(age_display(now + Duration::minutes(5), now), "just now");
        assert_eq!(age_display(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(age_display(now - Duration::minutes(90), now), "2h ago");
        assert_eq!(age_display(now - Duration::minutes(80), now), "1h ago");
        assert_eq!(age_display(now - Duration::hours(36), now), "2d ago");
    }

    #[test]
    fn test_format_temperature_and_snowfall() {
        assert_eq!(format_temperature(Some(27.6)), "28°");
        assert_eq!(format_temperature(None), "--");
        assert_eq!(format_snowfall(Some(3.0)), "3\"");
        assert_eq!(format_snowfall(Some(3.5)), "3.5\"");
        assert_eq!(format_snowfall(None), "--");
    }

    #[test]
    fn test_format_time_12h() {
        let t = NaiveTime::from_hms_opt(16, 0, 0).unwrap();
        assert_eq!(format_time_12h(t), "4:00 PM");
    }

    #[test]
    fn test_humanize_key() {
        assert_eq!(humanize_key("avgWaitMinutes"), "Avg wait minutes");
        assert_eq!(humanize_key("days_groomed"), "Days groomed");
        assert_eq!(humanize_key(""), "");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
    }
}
