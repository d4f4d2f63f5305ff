//! Terminal status indicator

use console::style;
use onair_core::{IndicatorStatus, IndicatorView, StatusIndicator};
use std::time::Instant;

/// Prints a line each time the indicator changes
pub struct ConsoleIndicator {
    started: Instant,
    last: Option<IndicatorView>,
}

impl ConsoleIndicator {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            last: None,
        }
    }
}

impl Default for ConsoleIndicator {
    fn default() -> Self {
        Self::new()
    }
}

/// Plain text for one view
pub fn view_line(view: &IndicatorView) -> String {
    match view.viewers {
        Some(_) => format!("{} ({})", view.status.text(), view.viewers_text()),
        None => view.status.text().to_string(),
    }
}

impl StatusIndicator for ConsoleIndicator {
    fn render(&mut self, view: &IndicatorView) {
        if self.last.as_ref() == Some(view) {
            return;
        }
        self.last = Some(*view);

        let line = view_line(view);
        let styled = match view.status {
            IndicatorStatus::Live => style(line).green().bold(),
            IndicatorStatus::Offline => style(line).yellow(),
            IndicatorStatus::Unavailable => style(line).red(),
        };
        println!("[{:>8.1}s] {}", self.started.elapsed().as_secs_f64(), styled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_line() {
        let live = IndicatorView { status: IndicatorStatus::Live, viewers: Some(1) };
        assert_eq!(view_line(&live), "LIVE (1 viewer)");

        let offline = IndicatorView { status: IndicatorStatus::Offline, viewers: None };
        assert_eq!(view_line(&offline), "Offline - waiting for stream...");
    }

    #[test]
    fn test_repeated_view_is_remembered() {
        let mut indicator = ConsoleIndicator::new();
        let view = IndicatorView { status: IndicatorStatus::Offline, viewers: None };
        indicator.render(&view);
        indicator.render(&view);
        assert_eq!(indicator.last, Some(view));
    }
}
