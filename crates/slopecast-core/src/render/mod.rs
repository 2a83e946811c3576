//! HTML rendering.
//!
//! Pure functions from loaded data to HTML fragments. Nothing here touches the
//! network or the clock directly; "now" arrives through the render context.
//!
//! - `html`: escaping
//! - `overview`: snow, lift, groomed-highlights and morning-brief widgets
//! - `detail`: lift and trail history pages

pub mod detail;
pub mod html;
pub mod overview;

pub use detail::{render_lift_detail, render_trail_detail};
pub use html::escape;
pub use overview::{render_error, render_overview, OverviewContext, OverviewHtml};
