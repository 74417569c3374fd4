//! Reading handler: read all visible text through the vision backend

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::external::{FrameSource, VisionBackend};
use crate::orchestrator::RequestState;

use super::{HandlerReply, ModeHandler};

/// Full-text reading prompt. Asks for a complete read, never a summary.
const READING_PROMPT: &str = r#"You are a reading assistant for visually impaired users.

Read ALL visible text in this image completely. Do not skip or truncate anything.

Instructions:
- Read every single word exactly as written
- Read from top to bottom, left to right
- For medicine labels: name, dosage, instructions, warnings
- For receipts: every item, price, and total
- For documents: full text top to bottom
- For screens/phones: read all visible text
- Add brief context first e.g. "This is a medicine label" or "This is a receipt"
- If no text visible: say "I could not find any text. Please hold the document closer."
- Do NOT summarize - read the COMPLETE text

Read now:
"#;

/// Reads visible text from a captured frame
pub struct ReadingHandler {
    camera: Arc<dyn FrameSource>,
    vision: Arc<dyn VisionBackend>,
}

impl ReadingHandler {
    pub fn new(camera: Arc<dyn FrameSource>, vision: Arc<dyn VisionBackend>) -> Self {
        Self { camera, vision }
    }
}

impl ModeHandler for ReadingHandler {
    fn run(&self, _request: &RequestState) -> Result<HandlerReply> {
        info!("reading handler: capturing frame");

        let frame = match self.camera.capture() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(?e, "camera capture failed");
                return Ok(HandlerReply::say(
                    "I could not access the camera. Please check it is connected.",
                ));
            }
        };

        let text = self.vision.describe(&frame, READING_PROMPT)?;
        Ok(HandlerReply::say(text.trim()))
    }

    fn fallback_reply(&self) -> &'static str {
        "I could not read the text."
    }
}
