//! Scene handler: structured surroundings awareness, spoken as one sentence

use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::external::{FrameSource, VisionBackend};
use crate::intent::json::extract_object;
use crate::orchestrator::RequestState;

use super::{HandlerReply, ModeHandler};

/// Perception prompt: asks for structured awareness, not narration.
const PERCEPTION_PROMPT: &str = r#"Analyze the scene and return structured awareness.

Focus ONLY on:
- objects close to the camera
- objects in hand
- possible obstacles ahead
- general environment context

If unsure about objects, return empty lists.

Respond strictly in this JSON format with no extra text:
{"near": [], "in_hand": [], "obstacles": [], "context": "", "confidence": 0.0}
"#;

/// Structured scene payload returned by the vision backend
#[derive(Debug, Default, Deserialize)]
struct ScenePayload {
    #[serde(default)]
    near: Vec<String>,
    #[serde(default)]
    in_hand: Vec<String>,
    #[serde(default)]
    obstacles: Vec<String>,
    #[serde(default)]
    context: String,
    #[serde(default)]
    confidence: f64,
}

/// Describes the surroundings through the camera and vision backend
pub struct SceneHandler {
    camera: Arc<dyn FrameSource>,
    vision: Arc<dyn VisionBackend>,
}

impl SceneHandler {
    pub fn new(camera: Arc<dyn FrameSource>, vision: Arc<dyn VisionBackend>) -> Self {
        Self { camera, vision }
    }

    /// Parse the vision output; an unparsable payload degrades to speaking
    /// the raw text as plain context.
    fn parse_payload(raw: &str) -> ScenePayload {
        let parsed = extract_object(raw)
            .map_err(anyhow::Error::from)
            .and_then(|value| serde_json::from_value::<ScenePayload>(value).map_err(Into::into));

        match parsed {
            Ok(payload) => payload,
            Err(e) => {
                warn!(%e, "failed to parse scene payload, using raw text as context");
                ScenePayload {
                    context: raw.trim().to_string(),
                    confidence: 0.3,
                    ..ScenePayload::default()
                }
            }
        }
    }

    /// Convert the structured payload into one natural spoken sentence.
    fn to_speech(payload: &ScenePayload) -> String {
        let mut parts = Vec::new();

        let context = payload.context.trim();
        if !context.is_empty() {
            parts.push(context.to_string());
        }

        let list = |items: &[String]| -> Vec<String> {
            items
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        };

        let near = list(&payload.near);
        if !near.is_empty() {
            parts.push(format!("Nearby I can see: {}.", near.join(", ")));
        }

        let in_hand = list(&payload.in_hand);
        if !in_hand.is_empty() {
            parts.push(format!("You appear to be holding: {}.", in_hand.join(", ")));
        }

        let obstacles = list(&payload.obstacles);
        if !obstacles.is_empty() {
            parts.push(format!("Watch out for: {}.", obstacles.join(", ")));
        }

        if parts.is_empty() {
            return "I can see the scene but could not identify anything clearly.".to_string();
        }

        parts.join(" ")
    }
}

impl ModeHandler for SceneHandler {
    fn run(&self, _request: &RequestState) -> Result<HandlerReply> {
        info!("scene handler: capturing frame");

        let frame = match self.camera.capture() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(?e, "camera capture failed");
                return Ok(HandlerReply::say("I could not access the camera."));
            }
        };
        debug!(bytes = frame.0.len(), "frame captured");

        let raw = self.vision.describe(&frame, PERCEPTION_PROMPT)?;
        debug!(raw = %raw.chars().take(200).collect::<String>(), "raw perception output");

        let payload = Self::parse_payload(&raw);
        info!(
            confidence = payload.confidence,
            near = payload.near.len(),
            obstacles = payload.obstacles.len(),
            "scene awareness"
        );

        Ok(HandlerReply::say(Self::to_speech(&payload)))
    }

    fn fallback_reply(&self) -> &'static str {
        "I was unable to analyse the scene."
    }
}

#[cfg(test)]
mod tests {
    use anyhow::bail;

    use super::*;
    use crate::external::Frame;

    struct FixedCamera;

    impl FrameSource for FixedCamera {
        fn capture(&self) -> Result<Frame> {
            Ok(Frame(vec![0u8; 4]))
        }
    }

    struct BrokenCamera;

    impl FrameSource for BrokenCamera {
        fn capture(&self) -> Result<Frame> {
            bail!("camera not found")
        }
    }

    struct FixedVision(String);

    impl VisionBackend for FixedVision {
        fn describe(&self, _image: &Frame, _prompt: &str) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    fn request() -> RequestState {
        RequestState::new("describe my surroundings")
    }

    #[test]
    fn test_structured_payload_spoken() {
        let handler = SceneHandler::new(
            Arc::new(FixedCamera),
            Arc::new(FixedVision(
                r#"{"near": ["table"], "in_hand": ["cup"], "obstacles": ["chair"], "context": "You are in a cafe.", "confidence": 0.8}"#
                    .to_string(),
            )),
        );

        let reply = handler.run(&request()).unwrap();
        assert_eq!(
            reply.text,
            "You are in a cafe. Nearby I can see: table. You appear to be holding: cup. Watch out for: chair."
        );
        assert!(!reply.spoken);
    }

    #[test]
    fn test_unparsable_payload_uses_raw_context() {
        let handler = SceneHandler::new(
            Arc::new(FixedCamera),
            Arc::new(FixedVision("A quiet street with parked cars.".to_string())),
        );

        let reply = handler.run(&request()).unwrap();
        assert_eq!(reply.text, "A quiet street with parked cars.");
    }

    #[test]
    fn test_empty_payload_has_fallback_sentence() {
        let handler = SceneHandler::new(
            Arc::new(FixedCamera),
            Arc::new(FixedVision(
                r#"{"near": [], "in_hand": [], "obstacles": [], "context": "", "confidence": 0.2}"#
                    .to_string(),
            )),
        );

        let reply = handler.run(&request()).unwrap();
        assert_eq!(
            reply.text,
            "I can see the scene but could not identify anything clearly."
        );
    }

    #[test]
    fn test_camera_failure_is_spoken_not_error() {
        let handler = SceneHandler::new(
            Arc::new(BrokenCamera),
            Arc::new(FixedVision(String::new())),
        );

        let reply = handler.run(&request()).unwrap();
        assert_eq!(reply.text, "I could not access the camera.");
    }
}
