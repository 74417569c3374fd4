//! Stop handler: switches ongoing background activity off

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::detection::BackgroundModeController;
use crate::orchestrator::RequestState;

use super::{HandlerReply, ModeHandler};

/// Stops the background currency-detection worker
pub struct StopHandler {
    controller: Arc<BackgroundModeController>,
}

impl StopHandler {
    pub fn new(controller: Arc<BackgroundModeController>) -> Self {
        Self { controller }
    }
}

impl ModeHandler for StopHandler {
    fn run(&self, _request: &RequestState) -> Result<HandlerReply> {
        if !self.controller.is_running() {
            // Nothing active: stay silent rather than announce a non-event
            info!("no active background mode to stop");
            return Ok(HandlerReply::silent());
        }

        self.controller.stop();
        Ok(HandlerReply::say("Stopped."))
    }

    fn fallback_reply(&self) -> &'static str {
        "Could not stop."
    }
}
