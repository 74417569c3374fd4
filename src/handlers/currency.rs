//! Currency handler: switches continuous currency detection on

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::detection::BackgroundModeController;
use crate::orchestrator::RequestState;

use super::{HandlerReply, ModeHandler};

/// Starts the background currency-detection worker
pub struct CurrencyHandler {
    controller: Arc<BackgroundModeController>,
}

impl CurrencyHandler {
    pub fn new(controller: Arc<BackgroundModeController>) -> Self {
        Self { controller }
    }
}

impl ModeHandler for CurrencyHandler {
    fn run(&self, _request: &RequestState) -> Result<HandlerReply> {
        if self.controller.is_running() {
            // No redundant announcement for a mode that is already on
            info!("currency mode already active");
            return Ok(HandlerReply::silent());
        }

        self.controller.start();
        Ok(HandlerReply::say("Currency mode on."))
    }

    fn fallback_reply(&self) -> &'static str {
        "I could not start currency detection."
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::external::{DetectionEvent, DetectionStream, SpeechRenderer};
    use crate::speech::SpeechGate;

    struct NullRenderer(Mutex<Vec<String>>);

    impl SpeechRenderer for NullRenderer {
        fn render(&self, text: &str) -> Result<()> {
            self.0.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct IdleStream;

    impl DetectionStream for IdleStream {
        fn next_event(&self) -> Result<Option<DetectionEvent>> {
            std::thread::sleep(Duration::from_millis(5));
            Ok(None)
        }
    }

    fn controller() -> Arc<BackgroundModeController> {
        let gate = Arc::new(SpeechGate::new(Arc::new(NullRenderer(Mutex::new(vec![])))));
        Arc::new(BackgroundModeController::new(
            gate,
            Arc::new(IdleStream),
            Duration::from_secs(3),
            Duration::from_secs(2),
        ))
    }

    #[test]
    fn test_starts_worker_and_confirms() {
        let ctrl = controller();
        let handler = CurrencyHandler::new(ctrl.clone());

        let reply = handler.run(&RequestState::new("paisa dekho")).unwrap();
        assert_eq!(reply.text, "Currency mode on.");
        assert!(ctrl.is_running());

        ctrl.stop();
    }

    #[test]
    fn test_redundant_start_is_silent() {
        let ctrl = controller();
        let handler = CurrencyHandler::new(ctrl.clone());

        handler.run(&RequestState::new("paisa dekho")).unwrap();
        let reply = handler.run(&RequestState::new("paisa dekho")).unwrap();

        assert!(reply.text.is_empty());
        assert!(ctrl.is_running());

        ctrl.stop();
    }
}
