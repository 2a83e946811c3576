use std::collections::HashSet;
use std::fmt::Write;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::warn;

use super::html::{class_token, escape};
use crate::config::FeatureFlags;
use crate::loader::DaySnapshot;
use crate::models::{Lift, LiftIndex, TemperatureReading, Trail};
use crate::navigation::DateCursor;
use crate::utils::format::DAY_FORMAT;
use crate::utils::{
    age_display, format_date_label, format_snowfall, format_temperature, format_time_12h,
};

/// Rows in the lift-lines widget.
const LIFT_ROWS: usize = 3;

/// Trails in the groomed-highlights widget.
const GROOMED_HIGHLIGHTS: usize = 3;

/// Inputs to one overview render.
pub struct OverviewContext<'a> {
    pub snapshot: &'a DaySnapshot,
    pub flags: &'a FeatureFlags,
    pub cursor: Option<&'a DateCursor>,
    pub now: DateTime<Utc>,
    /// Client's local calendar day
    pub today: NaiveDate,
    pub brief_dismissed: bool,
}

/// Rendered widgets. Optional ones are `None` when hidden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverviewHtml {
    pub header: String,
    pub brief: Option<String>,
    pub snow: String,
    pub lifts: Option<String>,
    pub groomed: String,
}

impl OverviewHtml {
    pub fn to_html(&self) -> String {
        let mut out = String::from("<main class=\"overview\">\n");
        out.push_str(&self.header);
        if let Some(ref brief) = self.brief {
            out.push_str(brief);
        }
        out.push_str(&self.snow);
        if let Some(ref lifts) = self.lifts {
            out.push_str(lifts);
        }
        out.push_str(&self.groomed);
        out.push_str("</main>\n");
        out
    }
}

pub fn render_overview(ctx: &OverviewContext<'_>) -> OverviewHtml {
    OverviewHtml {
        header: render_date_header(ctx),
        brief: render_brief_widget(ctx),
        snow: render_snow_widget(ctx),
        lifts: render_lift_widget(ctx),
        groomed: render_groomed_widget(ctx.snapshot),
    }
}

/// Error panel that replaces the overview when the primary load fails.
pub fn render_error(message: &str) -> String {
    format!(
        "<div class=\"error-message\" role=\"alert\">\n<p>{}</p>\n<p class=\"hint\">Pull down to try again.</p>\n</div>\n",
        escape(message)
    )
}

// ============================================================================
// Date header
// ============================================================================

fn render_date_header(ctx: &OverviewContext<'_>) -> String {
    let date = ctx.snapshot.date();
    let (can_prev, can_next) = ctx
        .cursor
        .map(|c| (c.can_go_previous(), c.can_go_next()))
        .unwrap_or((false, false));
    let disabled = |enabled: bool| if enabled { "" } else { " disabled" };

    let mut out = String::from("<header class=\"date-nav\">\n");
    let _ = writeln!(
        out,
        "<button class=\"date-prev\" aria-label=\"Previous day\"{}>&lsaquo;</button>",
        disabled(can_prev)
    );
    let _ = writeln!(
        out,
        "<h1 class=\"date-label\"><time datetime=\"{}\">{}</time></h1>",
        date.format(DAY_FORMAT),
        escape(&format_date_label(date))
    );
    if ctx.flags.date_picker {
        if let Some(cursor) = ctx.cursor {
            let dates = cursor.dates();
            if let (Some(newest), Some(oldest)) = (dates.first(), dates.last()) {
                let _ = writeln!(
                    out,
                    "<input type=\"date\" class=\"date-picker\" min=\"{}\" max=\"{}\" value=\"{}\">",
                    oldest.format(DAY_FORMAT),
                    newest.format(DAY_FORMAT),
                    date.format(DAY_FORMAT)
                );
            }
        }
    }
    let _ = writeln!(
        out,
        "<button class=\"date-next\" aria-label=\"Next day\"{}>&rsaquo;</button>",
        disabled(can_next)
    );
    out.push_str("</header>\n");
    out
}

// ============================================================================
// Snow widget
// ============================================================================

fn stat(out: &mut String, label: &str, value: &str) {
    let _ = writeln!(
        out,
        "<div class=\"stat\"><dt>{}</dt><dd>{}</dd></div>",
        escape(label),
        escape(value)
    );
}

pub fn render_snow_widget(ctx: &OverviewContext<'_>) -> String {
    let snapshot = ctx.snapshot;
    let weather = snapshot.weather.as_ref();

    let conditions = weather
        .and_then(|w| w.report.conditions.as_deref())
        .unwrap_or("Conditions unavailable");

    let mut out = String::from("<section class=\"widget snow-widget\">\n<h2>Snow Report</h2>\n");
    let _ = writeln!(out, "<p class=\"conditions\">{}</p>", escape(conditions));

    out.push_str("<dl class=\"snow-stats\">\n");
    stat(&mut out, "24h Snow", &format_snowfall(weather.and_then(|w| w.snowfall_24h())));
    match weather.map(|w| w.temperature()) {
        Some(TemperatureReading::Forecast { high, low }) => {
            stat(&mut out, "High", &format_temperature(high));
            stat(&mut out, "Low", &format_temperature(low));
        }
        Some(TemperatureReading::Current(t)) => {
            stat(&mut out, "Now", &format_temperature(Some(t)));
        }
        Some(TemperatureReading::Unknown) | None => {
            stat(&mut out, "Temp", &format_temperature(None));
        }
    }
    let lift_count = snapshot
        .lifts
        .as_ref()
        .map(|l| format!("{}/{}", l.open_count(), l.total_count()))
        .unwrap_or_else(|| "--".to_string());
    stat(&mut out, "Lifts Open", &lift_count);
    stat(
        &mut out,
        "Groomed",
        &format!("{}/{}", snapshot.today.groomed_count(), snapshot.today.trail_count()),
    );
    out.push_str("</dl>\n");

    if let Some(updated) = weather.and_then(|w| w.last_updated_at()) {
        let _ = writeln!(
            out,
            "<p class=\"updated\">Updated {}</p>",
            escape(&age_display(updated, ctx.now))
        );
    }
    if let Some(w) = weather {
        if !w.is_historical && snapshot.date() != ctx.today {
            out.push_str("<p class=\"weather-note\">No snow report was saved for this day; showing the latest conditions.</p>\n");
        }
    }

    out.push_str("</section>\n");
    out
}

// ============================================================================
// Lift widget
// ============================================================================

/// What the lift widget shows.
#[derive(Debug)]
pub enum LiftBoard<'a> {
    /// Outside operating hours; statuses would be stale
    Closed { opens_at: NaiveTime },
    /// Open lifts with the longest waits
    Waits(Vec<&'a Lift>),
}

pub fn lift_board(lifts: &LiftIndex, now: DateTime<Utc>) -> LiftBoard<'_> {
    match lifts.operating_window() {
        Ok(Some(window)) if !window.contains(now) => {
            return LiftBoard::Closed {
                opens_at: window.open,
            };
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Ignoring unusable operating hours"),
    }
    LiftBoard::Waits(lifts.longest_waits(LIFT_ROWS))
}

pub fn render_lift_widget(ctx: &OverviewContext<'_>) -> Option<String> {
    if !ctx.flags.live_lift_data {
        return None;
    }

    let mut out = String::new();
    match ctx.snapshot.lifts.as_ref().map(|l| lift_board(l, ctx.now)) {
        None => {
            out.push_str("<section class=\"widget lift-widget\">\n<h2>Lift Lines</h2>\n");
            out.push_str("<p class=\"empty\">Lift status unavailable.</p>\n");
        }
        Some(LiftBoard::Closed { opens_at }) => {
            out.push_str("<section class=\"widget lift-widget lift-widget--closed\">\n<h2>Lift Lines</h2>\n");
            let _ = writeln!(
                out,
                "<p class=\"lifts-closed\">Lifts are closed. Opens at {}.</p>",
                format_time_12h(opens_at)
            );
        }
        Some(LiftBoard::Waits(rows)) if rows.is_empty() => {
            out.push_str("<section class=\"widget lift-widget\">\n<h2>Lift Lines</h2>\n");
            out.push_str("<p class=\"empty\">No lifts are open.</p>\n");
        }
        Some(LiftBoard::Waits(rows)) => {
            out.push_str("<section class=\"widget lift-widget\">\n<h2>Lift Lines</h2>\n<ol class=\"lift-rows\">\n");
            for lift in rows {
                let wait = lift
                    .wait_minutes
                    .map(|m| format!("{} min", m))
                    .unwrap_or_else(|| "--".to_string());
                let _ = writeln!(
                    out,
                    "<li class=\"lift-row\"><a href=\"lift.html?name={}\" class=\"lift-name\">{}</a><span class=\"lift-wait\">{}</span></li>",
                    escape(&lift.slug),
                    escape(&lift.name),
                    escape(&wait)
                );
            }
            out.push_str("</ol>\n");
        }
    }
    out.push_str("</section>\n");
    Some(out)
}

// ============================================================================
// Groomed trails
// ============================================================================

/// A trail groomed on the snapshot day.
#[derive(Debug, Clone, Copy)]
pub struct GroomedTrail<'a> {
    pub trail: &'a Trail,
    pub area: &'a str,
    /// Groomed today but not yesterday. Never set without a comparison day.
    pub is_new: bool,
}

/// Every trail groomed on the snapshot day, in document order.
pub fn groomed_trails(snapshot: &DaySnapshot) -> Vec<GroomedTrail<'_>> {
    let yesterday: Option<HashSet<&str>> = snapshot.yesterday.as_ref().map(|y| y.groomed_ids());

    snapshot
        .today
        .grooming_areas
        .iter()
        .flat_map(|area| {
            area.trails
                .iter()
                .filter(|t| t.is_groomed)
                .map(move |trail| (area.name.as_str(), trail))
        })
        .map(|(area, trail)| GroomedTrail {
            trail,
            area,
            is_new: yesterday
                .as_ref()
                .is_some_and(|ids| !ids.contains(trail.id.as_str())),
        })
        .collect()
}

/// Up to three newly groomed trails, or the first three groomed ones if none are new.
pub fn groomed_highlights(snapshot: &DaySnapshot) -> Vec<GroomedTrail<'_>> {
    let all = groomed_trails(snapshot);
    let fresh: Vec<GroomedTrail<'_>> = all
        .iter()
        .filter(|g| g.is_new)
        .take(GROOMED_HIGHLIGHTS)
        .copied()
        .collect();

    if fresh.is_empty() {
        all.into_iter().take(GROOMED_HIGHLIGHTS).collect()
    } else {
        fresh
    }
}

pub fn render_groomed_widget(snapshot: &DaySnapshot) -> String {
    let highlights = groomed_highlights(snapshot);

    let mut out = String::from("<section class=\"widget groomed-widget\">\n<h2>Groomed Highlights</h2>\n");
    if highlights.is_empty() {
        out.push_str("<p class=\"empty\">No grooming reported.</p>\n");
    } else {
        out.push_str("<ul class=\"groomed-list\">\n");
        for g in highlights {
            let difficulty = g.trail.difficulty.as_deref().unwrap_or("");
            let badge = if g.is_new {
                "<span class=\"badge badge--new\">NEW</span>"
            } else {
                ""
            };
            let _ = writeln!(
                out,
                "<li class=\"trail difficulty-{}\"><span class=\"trail-name\">{}</span><span class=\"trail-area\">{}</span>{}</li>",
                class_token(difficulty),
                escape(&g.trail.name),
                escape(g.area),
                badge
            );
        }
        out.push_str("</ul>\n");
    }
    out.push_str("</section>\n");
    out
}

// ============================================================================
// Morning brief
// ============================================================================

pub fn render_brief_widget(ctx: &OverviewContext<'_>) -> Option<String> {
    if !ctx.flags.daily_briefs || ctx.brief_dismissed {
        return None;
    }
    let brief = ctx.snapshot.brief.as_ref()?;

    let mut out = format!(
        "<section class=\"widget brief-widget\" data-resort=\"{}\">\n<header>\n",
        escape(&ctx.snapshot.resort)
    );
    if let Some(tag) = brief.tag() {
        let _ = writeln!(
            out,
            "<span class=\"brief-tag brief-tag--{}\">{}</span>",
            class_token(tag.label()),
            tag.label()
        );
    }
    let _ = writeln!(out, "<h2>{}</h2>", escape(&brief.headline));
    if ctx.flags.brief_dismissable {
        let _ = writeln!(
            out,
            "<button class=\"brief-dismiss\" data-dismiss-date=\"{}\" aria-label=\"Dismiss\">&times;</button>",
            ctx.today.format(DAY_FORMAT)
        );
    }
    out.push_str("</header>\n");

    for paragraph in brief.body.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let _ = writeln!(out, "<p>{}</p>", escape(paragraph));
    }

    if !brief.alerts().is_empty() {
        out.push_str("<ul class=\"brief-alerts\">\n");
        for alert in brief.alerts() {
            let _ = writeln!(out, "<li>{}</li>", escape(alert));
        }
        out.push_str("</ul>\n");
    }

    out.push_str("</section>\n");
    Some(out)
}
