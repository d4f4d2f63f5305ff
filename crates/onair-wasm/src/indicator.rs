//! Status and viewer-count elements

use onair_core::{IndicatorView, StatusIndicator};
use web_sys::Element;

pub struct DomIndicator {
    status: Element,
    viewers: Option<Element>,
}

impl DomIndicator {
    pub fn new(status: Element, viewers: Option<Element>) -> Self {
        Self { status, viewers }
    }
}

impl StatusIndicator for DomIndicator {
    fn render(&mut self, view: &IndicatorView) {
        self.status.set_text_content(Some(view.status.text()));
        self.status.set_class_name(view.status.css_class());
        if let Some(viewers) = &self.viewers {
            viewers.set_text_content(Some(&view.viewers_text()));
        }
    }
}
