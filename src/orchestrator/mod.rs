//! Core request state machine
//!
//! One utterance makes one pass through Start -> Classified -> Decided ->
//! {Clarifying | Dispatching} -> Spoken -> Done. The orchestrator owns the
//! request state for the whole pass, applies the confidence policy, runs
//! exactly one handler (or none, on the clarification path), and hands all
//! output to the speech gate.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::events::PipelineEvent;
use crate::handlers::Handlers;
use crate::intent::{IntentRouter, Mode};
use crate::policy::{ConfidencePolicy, Zone};
use crate::speech::SpeechGate;

/// The phases of one request's pass through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Transcript received, nothing done yet
    Start,
    /// Intent router has produced a classification
    Classified,
    /// Confidence policy has been applied
    Decided,
    /// Low confidence or unknown mode: asking a yes/no question
    Clarifying,
    /// Exactly one handler is running
    Dispatching,
    /// Final output has been handed to the speech gate
    Spoken,
    /// Terminal
    Done,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Start => write!(f, "Start"),
            Phase::Classified => write!(f, "Classified"),
            Phase::Decided => write!(f, "Decided"),
            Phase::Clarifying => write!(f, "Clarifying"),
            Phase::Dispatching => write!(f, "Dispatching"),
            Phase::Spoken => write!(f, "Spoken"),
            Phase::Done => write!(f, "Done"),
        }
    }
}

/// Per-request state, owned exclusively by the orchestrator for the
/// duration of one request and never shared across requests.
#[derive(Debug, Clone)]
pub struct RequestState {
    /// Raw transcript as it entered the pipeline; never mutated
    pub raw_transcript: String,
    /// Normalized text, written once from the classification
    pub cleaned_transcript: String,
    /// Classified action category
    pub mode: Mode,
    /// Classifier confidence in [0,1]
    pub confidence: f64,
    /// Optional disambiguating fragment from the classifier
    pub extra_context: String,
    /// True when the policy routed this request to a clarification
    pub needs_clarification: bool,
    /// Text to be spoken; written by exactly one of policy or handler
    pub final_output: String,
    /// True when a handler already produced audio itself
    pub spoken: bool,
    /// Diagnostic: handler error text, reserved for future backoff
    pub error: Option<String>,
    /// Diagnostic: reserved for future retry policy
    pub retry_count: u32,
}

impl RequestState {
    pub fn new(transcript: &str) -> Self {
        let trimmed = transcript.trim();
        Self {
            raw_transcript: trimmed.to_string(),
            cleaned_transcript: trimmed.to_string(),
            mode: Mode::Unknown,
            confidence: 0.0,
            extra_context: String::new(),
            needs_clarification: false,
            final_output: String::new(),
            spoken: false,
            error: None,
            retry_count: 0,
        }
    }
}

/// Sequences router, policy, handler, and speech gate for each utterance
pub struct Orchestrator {
    router: IntentRouter,
    policy: ConfidencePolicy,
    handlers: Handlers,
    gate: Arc<SpeechGate>,
    event_tx: broadcast::Sender<PipelineEvent>,
}

impl Orchestrator {
    pub fn new(
        router: IntentRouter,
        policy: ConfidencePolicy,
        handlers: Handlers,
        gate: Arc<SpeechGate>,
        event_tx: broadcast::Sender<PipelineEvent>,
    ) -> Self {
        Self {
            router,
            policy,
            handlers,
            gate,
            event_tx,
        }
    }

    /// Process one utterance end to end. Never fails: every error inside
    /// the pipeline is absorbed and converted to a spoken or logged
    /// fallback. Returns the final request state for inspection.
    pub fn handle(&self, transcript: &str) -> RequestState {
        let started = Instant::now();
        let mut request = RequestState::new(transcript);
        let mut phase = Phase::Start;
        self.emit(PipelineEvent::RequestStarted);
        info!(transcript = %request.raw_transcript, "new request");

        // Start -> Classified
        let classification = self.router.classify(&request.raw_transcript);
        request.mode = classification.mode;
        request.confidence = classification.confidence;
        request.cleaned_transcript = classification.cleaned_transcript;
        request.extra_context = classification.extra_context;
        phase = self.transition(phase, Phase::Classified, started);
        self.emit(PipelineEvent::IntentClassified {
            mode: request.mode.label().to_string(),
            confidence: request.confidence,
        });

        // Classified -> Decided
        let zone = self.policy.zone(request.confidence);
        phase = self.transition(phase, Phase::Decided, started);

        if zone == Zone::Low || request.mode == Mode::Unknown {
            // Decided -> Clarifying: no handler runs
            request.needs_clarification = true;
            request.final_output = self.policy.clarification_question(request.mode).to_string();
            phase = self.transition(phase, Phase::Clarifying, started);
            self.emit(PipelineEvent::ClarificationAsked {
                mode: request.mode.label().to_string(),
            });
        } else {
            // Decided -> Dispatching: exactly one handler
            phase = self.transition(phase, Phase::Dispatching, started);
            if zone == Zone::Medium {
                // Prefix first, then the handler's own answer; two
                // sequential gate acquisitions, never concatenation
                let prefix = self.policy.medium_prefix(request.mode);
                if !prefix.is_empty() {
                    self.gate.speak(prefix);
                }
            }
            self.dispatch(&mut request);
        }

        // {Clarifying, Dispatching} -> Spoken
        if request.spoken {
            debug!("handler already spoke, skipping gate");
        } else {
            self.gate.speak(&request.final_output);
        }
        phase = self.transition(phase, Phase::Spoken, started);

        // Spoken -> Done
        let _ = self.transition(phase, Phase::Done, started);
        self.emit(PipelineEvent::RequestComplete {
            duration_ms: started.elapsed().as_millis() as u64,
        });
        info!(mode = %request.mode, "request complete");

        request
    }

    /// Run the handler for the request's mode, substituting the category
    /// apology on failure. The clarification path never reaches here, so
    /// the mode always has a handler.
    fn dispatch(&self, request: &mut RequestState) {
        let Some(handler) = self.handlers.for_mode(request.mode) else {
            // Unreachable by construction; kept as a spoken fallback
            error!(mode = %request.mode, "no handler for dispatched mode");
            request.final_output = "Sorry, I could not process that.".to_string();
            return;
        };

        self.emit(PipelineEvent::HandlerDispatched {
            mode: request.mode.label().to_string(),
        });

        match handler.run(request) {
            Ok(reply) => {
                request.final_output = reply.text;
                request.spoken = reply.spoken;
            }
            Err(e) => {
                error!(mode = %request.mode, ?e, "handler failed, substituting apology");
                request.error = Some(e.to_string());
                request.final_output = handler.fallback_reply().to_string();
                self.emit(PipelineEvent::HandlerFailed {
                    mode: request.mode.label().to_string(),
                });
            }
        }
    }

    fn transition(&self, from: Phase, to: Phase, started: Instant) -> Phase {
        debug!(
            from = %from,
            to = %to,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "phase transition"
        );
        to
    }

    fn emit(&self, event: PipelineEvent) {
        // Nobody listening is fine; the event log is observational only
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use anyhow::bail;

    use super::*;
    use crate::config::Config;
    use crate::detection::BackgroundModeController;
    use crate::external::{
        DetectionEvent, DetectionStream, Frame, FrameSource, IntentClassifier, KnowledgeBackend,
        SpeechRenderer, VisionBackend, WebSearch,
    };
    use crate::handlers::{
        CurrencyHandler, KnowledgeHandler, ReadingHandler, SceneHandler, StopHandler,
    };

    struct CapturingRenderer(Mutex<Vec<String>>);

    impl SpeechRenderer for CapturingRenderer {
        fn render(&self, text: &str) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct ScriptedOracle(Option<&'static str>);

    impl IntentClassifier for ScriptedOracle {
        fn classify_text(&self, _prompt: &str) -> anyhow::Result<String> {
            match self.0 {
                Some(response) => Ok(response.to_string()),
                None => bail!("oracle unreachable"),
            }
        }
    }

    struct FixedCamera;

    impl FrameSource for FixedCamera {
        fn capture(&self) -> anyhow::Result<Frame> {
            Ok(Frame(vec![0u8; 4]))
        }
    }

    struct FixedVision(&'static str);

    impl VisionBackend for FixedVision {
        fn describe(&self, _image: &Frame, _prompt: &str) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct BrokenVision;

    impl VisionBackend for BrokenVision {
        fn describe(&self, _image: &Frame, _prompt: &str) -> anyhow::Result<String> {
            bail!("inference backend down")
        }
    }

    struct EmptySearch;

    impl WebSearch for EmptySearch {
        fn search(&self, _query: &str) -> anyhow::Result<String> {
            Ok(String::new())
        }
    }

    struct EchoBackend;

    impl KnowledgeBackend for EchoBackend {
        fn answer(&self, query: &str, _web_context: &str) -> anyhow::Result<String> {
            Ok(format!("the answer to {}", query))
        }
    }

    struct IdleStream;

    impl DetectionStream for IdleStream {
        fn next_event(&self) -> anyhow::Result<Option<DetectionEvent>> {
            std::thread::sleep(Duration::from_millis(5));
            Ok(None)
        }
    }

    struct Fixture {
        orchestrator: Orchestrator,
        renderer: Arc<CapturingRenderer>,
        controller: Arc<BackgroundModeController>,
        event_rx: broadcast::Receiver<PipelineEvent>,
    }

    impl Fixture {
        fn spoken(&self) -> Vec<String> {
            self.renderer.0.lock().unwrap().clone()
        }

        fn events(&mut self) -> Vec<PipelineEvent> {
            let mut events = Vec::new();
            while let Ok(event) = self.event_rx.try_recv() {
                events.push(event);
            }
            events
        }
    }

    fn fixture_with_vision(
        oracle: ScriptedOracle,
        vision: Arc<dyn VisionBackend>,
    ) -> Fixture {
        let renderer = Arc::new(CapturingRenderer(Mutex::new(vec![])));
        let gate = Arc::new(SpeechGate::new(renderer.clone()));
        let controller = Arc::new(BackgroundModeController::new(
            gate.clone(),
            Arc::new(IdleStream),
            Duration::from_secs(3),
            Duration::from_secs(2),
        ));

        let camera: Arc<dyn FrameSource> = Arc::new(FixedCamera);
        let handlers = Handlers {
            scene: SceneHandler::new(camera.clone(), vision.clone()),
            reading: ReadingHandler::new(camera, vision),
            currency: CurrencyHandler::new(controller.clone()),
            stop: StopHandler::new(controller.clone()),
            knowledge: KnowledgeHandler::new(
                Arc::new(EmptySearch),
                Arc::new(EchoBackend),
                gate.clone(),
            ),
        };

        let config = Config::default();
        let (event_tx, event_rx) = broadcast::channel(64);
        let orchestrator = Orchestrator::new(
            IntentRouter::new(Arc::new(oracle)),
            ConfidencePolicy::new(&config),
            handlers,
            gate,
            event_tx,
        );

        Fixture {
            orchestrator,
            renderer,
            controller,
            event_rx,
        }
    }

    fn fixture(oracle: ScriptedOracle) -> Fixture {
        fixture_with_vision(oracle, Arc::new(FixedVision("A quiet room.")))
    }

    #[test]
    fn test_scenario_high_confidence_navigation() {
        let mut fx = fixture(ScriptedOracle(Some(
            r#"{"mode": "navigation_mode", "confidence": 0.92, "cleaned_text": "describe surroundings", "extra_context": ""}"#,
        )));

        let request = fx.orchestrator.handle("describe my surroundings");

        assert_eq!(request.mode, Mode::Navigation);
        assert!(!request.needs_clarification);
        // No prefix in the high zone: exactly one utterance
        assert_eq!(fx.spoken(), vec!["A quiet room."]);

        let events = fx.events();
        assert!(events
            .iter()
            .any(|e| matches!(e, PipelineEvent::HandlerDispatched { mode } if mode == "navigation_mode")));
        assert!(!events
            .iter()
            .any(|e| matches!(e, PipelineEvent::ClarificationAsked { .. })));
    }

    #[test]
    fn test_scenario_medium_confidence_currency() {
        let mut fx = fixture(ScriptedOracle(Some(
            r#"{"mode": "currency_mode", "confidence": 0.55, "cleaned_text": "check currency", "extra_context": ""}"#,
        )));

        let request = fx.orchestrator.handle("paisa dekho");

        assert_eq!(request.mode, Mode::Currency);
        // Prefix first, then the handler's confirmation
        assert_eq!(
            fx.spoken(),
            vec![
                "I think you want to check your currency.",
                "Currency mode on."
            ]
        );
        assert!(fx.controller.is_running());
        fx.controller.stop();

        let events = fx.events();
        assert!(events
            .iter()
            .any(|e| matches!(e, PipelineEvent::HandlerDispatched { mode } if mode == "currency_mode")));
    }

    #[test]
    fn test_scenario_low_confidence_clarifies() {
        let mut fx = fixture(ScriptedOracle(Some(
            r#"{"mode": "unknown", "confidence": 0.1, "cleaned_text": "", "extra_context": ""}"#,
        )));

        let request = fx.orchestrator.handle("asdkjh");

        assert!(request.needs_clarification);
        assert_eq!(
            fx.spoken(),
            vec!["I did not understand. Do you want a scene description, text reading, or currency check?"]
        );

        let events = fx.events();
        assert!(events
            .iter()
            .any(|e| matches!(e, PipelineEvent::ClarificationAsked { .. })));
        assert!(!events
            .iter()
            .any(|e| matches!(e, PipelineEvent::HandlerDispatched { .. })));
    }

    #[test]
    fn test_scenario_stop_while_idle_is_silent() {
        let fx = fixture(ScriptedOracle(Some(
            r#"{"mode": "stop_mode", "confidence": 0.95, "cleaned_text": "stop", "extra_context": ""}"#,
        )));

        let request = fx.orchestrator.handle("stop");

        assert_eq!(request.mode, Mode::Stop);
        assert!(request.final_output.is_empty());
        // Empty output never reaches the renderer
        assert!(fx.spoken().is_empty());
    }

    #[test]
    fn test_unknown_mode_clarifies_even_with_high_confidence() {
        let fx = fixture(ScriptedOracle(Some(
            r#"{"mode": "unknown", "confidence": 0.99, "cleaned_text": "", "extra_context": ""}"#,
        )));

        let request = fx.orchestrator.handle("something odd");
        assert!(request.needs_clarification);
    }

    #[test]
    fn test_oracle_failure_surfaces_as_clarification() {
        let fx = fixture(ScriptedOracle(None));

        let request = fx.orchestrator.handle("describe my surroundings");

        assert_eq!(request.mode, Mode::Unknown);
        assert!(request.needs_clarification);
        assert_eq!(fx.spoken().len(), 1);
    }

    #[test]
    fn test_handler_failure_substitutes_apology() {
        let mut fx = fixture_with_vision(
            ScriptedOracle(Some(
                r#"{"mode": "reading_mode", "confidence": 0.9, "cleaned_text": "read this", "extra_context": ""}"#,
            )),
            Arc::new(BrokenVision),
        );

        let request = fx.orchestrator.handle("read this");

        assert_eq!(request.final_output, "I could not read the text.");
        assert!(request.error.is_some());
        assert_eq!(request.retry_count, 0);
        assert_eq!(fx.spoken(), vec!["I could not read the text."]);

        let events = fx.events();
        assert!(events
            .iter()
            .any(|e| matches!(e, PipelineEvent::HandlerFailed { mode } if mode == "reading_mode")));
    }

    #[test]
    fn test_knowledge_handler_speaks_once() {
        let fx = fixture(ScriptedOracle(Some(
            r#"{"mode": "knowledge_mode", "confidence": 0.9, "cleaned_text": "what is the time", "extra_context": ""}"#,
        )));

        let request = fx.orchestrator.handle("what is the time");

        assert!(request.spoken);
        // The handler spoke; the orchestrator must not speak again
        assert_eq!(fx.spoken(), vec!["the answer to what is the time"]);
    }

    #[test]
    fn test_medium_zone_stop_has_no_prefix() {
        let fx = fixture(ScriptedOracle(Some(
            r#"{"mode": "stop_mode", "confidence": 0.6, "cleaned_text": "stop", "extra_context": ""}"#,
        )));

        fx.controller.start();
        let request = fx.orchestrator.handle("bas");

        // Stop has no medium prefix; only the confirmation is spoken
        assert_eq!(request.mode, Mode::Stop);
        assert_eq!(fx.spoken(), vec!["Stopped."]);
        assert!(!fx.controller.is_running());
    }

    #[test]
    fn test_empty_transcript_clarifies_without_dispatch() {
        let fx = fixture(ScriptedOracle(Some(
            r#"{"mode": "navigation_mode", "confidence": 0.9}"#,
        )));

        let request = fx.orchestrator.handle("   ");

        assert_eq!(request.mode, Mode::Unknown);
        assert!(request.needs_clarification);
    }

    #[test]
    fn test_async_subscriber_receives_events_in_order() {
        let mut fx = fixture(ScriptedOracle(Some(
            r#"{"mode": "navigation_mode", "confidence": 0.92, "cleaned_text": "describe", "extra_context": ""}"#,
        )));

        fx.orchestrator.handle("describe my surroundings");

        // The daemon's event logger consumes the broadcast channel from an
        // async task; receive the same way it does
        tokio_test::block_on(async {
            assert!(matches!(
                fx.event_rx.recv().await.unwrap(),
                PipelineEvent::RequestStarted
            ));
            assert!(matches!(
                fx.event_rx.recv().await.unwrap(),
                PipelineEvent::IntentClassified { .. }
            ));
            assert!(matches!(
                fx.event_rx.recv().await.unwrap(),
                PipelineEvent::HandlerDispatched { .. }
            ));
            assert!(matches!(
                fx.event_rx.recv().await.unwrap(),
                PipelineEvent::RequestComplete { .. }
            ));
        });
    }

    #[test]
    fn test_event_sequence_for_dispatch() {
        let mut fx = fixture(ScriptedOracle(Some(
            r#"{"mode": "navigation_mode", "confidence": 0.92, "cleaned_text": "describe", "extra_context": ""}"#,
        )));

        fx.orchestrator.handle("describe my surroundings");

        let events = fx.events();
        let kinds: Vec<&'static str> = events
            .iter()
            .map(|e| match e {
                PipelineEvent::RequestStarted => "started",
                PipelineEvent::IntentClassified { .. } => "classified",
                PipelineEvent::ClarificationAsked { .. } => "clarification",
                PipelineEvent::HandlerDispatched { .. } => "dispatched",
                PipelineEvent::HandlerFailed { .. } => "failed",
                PipelineEvent::RequestComplete { .. } => "complete",
            })
            .collect();
        assert_eq!(kinds, vec!["started", "classified", "dispatched", "complete"]);
    }
}
