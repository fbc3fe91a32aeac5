//! Opaque handle for embedding frameworks

use super::controller::{Collaborators, FeedbackWidget};
use crate::api::ApiClient;
use crate::capture::ScreenshotCapture;
use crate::config::WidgetConfig;
use crate::error::WidgetError;

/// A running widget
///
/// Framework wrappers only ever create and destroy it. Console capture is
/// installed for the lifetime of the handle. Dropping the handle destroys
/// the widget.
#[derive(Debug)]
pub struct WidgetHandle<A: ApiClient, S: ScreenshotCapture> {
    widget: Option<FeedbackWidget<A, S>>,
}

impl<A: ApiClient, S: ScreenshotCapture> WidgetHandle<A, S> {
    pub fn init(
        config: WidgetConfig,
        collaborators: Collaborators<A, S>,
    ) -> Result<Self, WidgetError> {
        let widget = FeedbackWidget::new(config, collaborators)?;
        widget.console().install();
        log::debug!("Feedback widget ready for board {}", widget.config().board_id);
        Ok(Self {
            widget: Some(widget),
        })
    }

    pub fn destroy(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(mut widget) = self.widget.take() {
            widget.destroy();
            widget.console().uninstall();
        }
    }
}

impl<A: ApiClient, S: ScreenshotCapture> Drop for WidgetHandle<A, S> {
    fn drop(&mut self) {
        self.teardown();
    }
}
