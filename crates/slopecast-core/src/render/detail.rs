use std::collections::BTreeMap;
use std::fmt::Write;

use serde_json::Value;

use super::html::{class_token, escape};
use crate::models::detail::{LIFT_HISTORY_DAYS, TRAIL_HISTORY_DAYS};
use crate::models::{LiftDetail, TrailDetail};
use crate::utils::{format_date_label, humanize_key, parse_day};

fn stat_value(value: &Value) -> String {
    match value {
        Value::Null => "--".to_string(),
        Value::Bool(true) => "Yes".to_string(),
        Value::Bool(false) => "No".to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() != 0.0 => format!("{:.1}", f),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn render_stats(out: &mut String, stats: &BTreeMap<String, Value>) {
    if stats.is_empty() {
        return;
    }
    out.push_str("<dl class=\"detail-stats\">\n");
    for (key, value) in stats {
        let _ = writeln!(
            out,
            "<div class=\"stat\"><dt>{}</dt><dd>{}</dd></div>",
            escape(&humanize_key(key)),
            escape(&stat_value(value))
        );
    }
    out.push_str("</dl>\n");
}

fn day_label(raw: &str) -> String {
    parse_day(raw)
        .map(format_date_label)
        .unwrap_or_else(|| raw.to_string())
}

fn optional_number(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) if v.fract() == 0.0 => format!("{}{}", v as i64, unit),
        Some(v) => format!("{:.1}{}", v, unit),
        None => "--".to_string(),
    }
}

pub fn render_lift_detail(detail: &LiftDetail) -> String {
    let mut out = format!(
        "<article class=\"detail lift-detail\" data-slug=\"{}\">\n<h1>{}</h1>\n",
        escape(&detail.slug),
        escape(&detail.name)
    );
    render_stats(&mut out, &detail.stats);

    let history = detail.recent_history();
    let _ = writeln!(out, "<h2>Last {} days</h2>", LIFT_HISTORY_DAYS);
    if history.is_empty() {
        out.push_str("<p class=\"empty\">No history yet.</p>\n");
    } else {
        out.push_str("<table class=\"history\">\n<thead><tr><th>Date</th><th>Status</th><th>Avg wait</th><th>Hours open</th></tr></thead>\n<tbody>\n");
        for entry in history {
            let status = entry
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "--".to_string());
            let _ = writeln!(
                out,
                "<tr><td>{}</td><td class=\"status-{}\">{}</td><td>{}</td><td>{}</td></tr>",
                escape(&day_label(&entry.date)),
                class_token(&status),
                escape(&status),
                optional_number(entry.avg_wait_minutes, " min"),
                optional_number(entry.hours_open, "h")
            );
        }
        out.push_str("</tbody>\n</table>\n");
    }

    out.push_str("</article>\n");
    out
}

pub fn render_trail_detail(detail: &TrailDetail) -> String {
    let mut out = format!(
        "<article class=\"detail trail-detail\" data-slug=\"{}\">\n<h1>{}</h1>\n",
        escape(&detail.slug),
        escape(&detail.name)
    );

    let difficulty = detail.difficulty.as_deref();
    if difficulty.is_some() || detail.area.is_some() {
        out.push_str("<p class=\"trail-meta\">");
        if let Some(d) = difficulty {
            let _ = write!(
                out,
                "<span class=\"difficulty difficulty-{}\">{}</span>",
                class_token(d),
                escape(d)
            );
        }
        if let Some(ref area) = detail.area {
            let _ = write!(out, "<span class=\"trail-area\">{}</span>", escape(area));
        }
        out.push_str("</p>\n");
    }
    render_stats(&mut out, &detail.stats);

    let history = detail.recent_history();
    let _ = writeln!(out, "<h2>Last {} days</h2>", TRAIL_HISTORY_DAYS);
    if history.is_empty() {
        out.push_str("<p class=\"empty\">No history yet.</p>\n");
    } else {
        let _ = writeln!(
            out,
            "<p class=\"groomed-summary\">Groomed {} of {} days</p>",
            detail.days_groomed(),
            history.len()
        );
        out.push_str("<table class=\"history\">\n<thead><tr><th>Date</th><th>Groomed</th><th>Open</th></tr></thead>\n<tbody>\n");
        let yes_no = |b: bool| if b { "Yes" } else { "No" };
        for entry in history {
            let _ = writeln!(
                out,
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape(&day_label(&entry.date)),
                yes_no(entry.is_groomed),
                yes_no(entry.is_open)
            );
        }
        out.push_str("</tbody>\n</table>\n");
    }

    out.push_str("</article>\n");
    out
}
