//! Date navigation and touch gestures.
//!
//! `DateCursor` walks the descending list of available dates: "previous"
//! means older (index goes up), "next" means newer (index goes down).
//! `GestureTracker` turns raw touch coordinates into pull-to-refresh and
//! swipe actions the loader can apply.

use chrono::NaiveDate;

use crate::utils::format_date_label;

/// Minimum downward drag, from the top of the page, that triggers a reload.
pub const PULL_THRESHOLD: f64 = 80.0;

/// Minimum horizontal travel for a swipe between dates.
pub const SWIPE_THRESHOLD: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Older date
    Previous,
    /// Newer date
    Next,
}

/// Position within the available dates, most recent first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateCursor {
    dates: Vec<NaiveDate>,
    index: usize,
}

impl DateCursor {
    /// Start at the most recent date. `None` when there are no dates.
    pub fn new(dates: Vec<NaiveDate>) -> Option<Self> {
        if dates.is_empty() {
            None
        } else {
            Some(Self { dates, index: 0 })
        }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> NaiveDate {
        self.dates[self.index]
    }

    pub fn label(&self) -> String {
        format_date_label(self.current())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    pub fn can_go_previous(&self) -> bool {
        self.index + 1 < self.dates.len()
    }

    pub fn can_go_next(&self) -> bool {
        self.index > 0
    }

    /// Target of a step without moving. `None` at either end.
    pub fn peek(&self, direction: Direction) -> Option<NaiveDate> {
        match direction {
            Direction::Previous if self.can_go_previous() => Some(self.dates[self.index + 1]),
            Direction::Next if self.can_go_next() => Some(self.dates[self.index - 1]),
            _ => None,
        }
    }

    /// Move one step. Out-of-range steps leave the cursor where it is.
    pub fn step(&mut self, direction: Direction) -> Option<NaiveDate> {
        let target = self.peek(direction)?;
        match direction {
            Direction::Previous => self.index += 1,
            Direction::Next => self.index -= 1,
        }
        Some(target)
    }

    /// Point at `date` if it is one of the available dates.
    pub fn seek(&mut self, date: NaiveDate) -> bool {
        match self.dates.iter().position(|d| *d == date) {
            Some(index) => {
                self.index = index;
                true
            }
            None => false,
        }
    }
}

/// What a completed touch gesture asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureAction {
    Refresh,
    Navigate(Direction),
}

#[derive(Debug, Clone, Copy)]
struct TouchStart {
    x: f64,
    y: f64,
    at_top: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GestureTracker {
    start: Option<TouchStart>,
    date_picker: bool,
}

impl GestureTracker {
    /// Swipes only navigate when the date picker is enabled.
    pub fn new(date_picker: bool) -> Self {
        Self {
            start: None,
            date_picker,
        }
    }

    pub fn set_date_picker(&mut self, enabled: bool) {
        self.date_picker = enabled;
    }

    pub fn touch_start(&mut self, x: f64, y: f64, scroll_top: f64) {
        self.start = Some(TouchStart {
            x,
            y,
            at_top: scroll_top <= 0.0,
        });
    }

    /// Current pull distance for the refresh indicator, clamped to the threshold.
    pub fn pull_progress(&self, y: f64) -> Option<f64> {
        let start = self.start.filter(|s| s.at_top)?;
        let pulled = y - start.y;
        (pulled > 0.0).then(|| pulled.min(PULL_THRESHOLD))
    }

    /// Finish the gesture. Drags short of either threshold do nothing.
    pub fn touch_end(&mut self, x: f64, y: f64) -> Option<GestureAction> {
        let start = self.start.take()?;
        let dx = x - start.x;
        let dy = y - start.y;

        if self.date_picker && dx.abs() > dy.abs() && dx.abs() > SWIPE_THRESHOLD {
            let direction = if dx > 0.0 {
                Direction::Previous
            } else {
                Direction::Next
            };
            return Some(GestureAction::Navigate(direction));
        }

        if start.at_top && dy > PULL_THRESHOLD {
            return Some(GestureAction::Refresh);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn cursor() -> DateCursor {
        DateCursor::new(vec![day("2024-01-05"), day("2024-01-04"), day("2024-01-02")]).unwrap()
    }

    #[test]
    fn test_cursor_starts_at_most_recent() {
        let cursor = cursor();
        assert_eq!(cursor.current(), day("2024-01-05"));
        assert!(!cursor.can_go_next());
        assert!(cursor.can_go_previous());
        assert_eq!(cursor.label(), "Fri, Jan 5");
    }

    #[test]
    fn test_cursor_steps_and_bounds() {
        let mut cursor = cursor();
        assert_eq!(cursor.step(Direction::Next), None);
        assert_eq!(cursor.index(), 0);

        assert_eq!(cursor.step(Direction::Previous), Some(day("2024-01-04")));
        assert_eq!(cursor.step(Direction::Previous), Some(day("2024-01-02")));
        assert_eq!(cursor.step(Direction::Previous), None);
        assert_eq!(cursor.index(), 2);

        assert_eq!(cursor.step(Direction::Next), Some(day("2024-01-04")));
        assert_eq!(cursor.index(), 1);
    }

    #[test]
    fn test_cursor_seek() {
        let mut cursor = cursor();
        assert!(cursor.seek(day("2024-01-02")));
        assert_eq!(cursor.index(), 2);
        assert!(!cursor.seek(day("2024-01-03")));
        assert_eq!(cursor.index(), 2);
        assert!(DateCursor::new(Vec::new()).is_none());
    }

    #[test]
    fn test_pull_to_refresh() {
        let mut tracker = GestureTracker::new(false);
        tracker.touch_start(100.0, 50.0, 0.0);
        assert_eq!(tracker.pull_progress(90.0), Some(40.0));
        assert_eq!(tracker.pull_progress(400.0), Some(PULL_THRESHOLD));
        assert_eq!(tracker.touch_end(102.0, 150.0), Some(GestureAction::Refresh));

        // Short drag resets without action
        tracker.touch_start(100.0, 50.0, 0.0);
        assert_eq!(tracker.touch_end(100.0, 120.0), None);
        assert_eq!(tracker.touch_end(100.0, 300.0), None);
    }

    #[test]
    fn test_pull_ignored_when_scrolled() {
        let mut tracker = GestureTracker::new(false);
        tracker.touch_start(100.0, 50.0, 240.0);
        assert_eq!(tracker.pull_progress(200.0), None);
        assert_eq!(tracker.touch_end(100.0, 250.0), None);
    }

    #[test]
    fn test_swipe_requires_date_picker() {
        let mut tracker = GestureTracker::new(false);
        tracker.touch_start(300.0, 50.0, 0.0);
        assert_eq!(tracker.touch_end(100.0, 60.0), None);

        tracker.set_date_picker(true);
        tracker.touch_start(300.0, 50.0, 0.0);
        assert_eq!(
            tracker.touch_end(100.0, 60.0),
            Some(GestureAction::Navigate(Direction::Next))
        );

        tracker.touch_start(100.0, 50.0, 0.0);
        assert_eq!(
            tracker.touch_end(300.0, 60.0),
            Some(GestureAction::Navigate(Direction::Previous))
        );

        // Mostly vertical: not a swipe
        tracker.touch_start(100.0, 50.0, 500.0);
        assert_eq!(tracker.touch_end(190.0, 250.0), None);
    }
}
