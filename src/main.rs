//! saathi-daemon: voice-driven assistance daemon
//!
//! Turns one utterance into one action (describe surroundings, read text,
//! identify currency, answer a question, or stop an ongoing activity) and
//! speaks the response:
//! - Intent classification against an external oracle, with repair
//! - Confidence policy: act, confirm, or ask
//! - One handler per request, plus a start/stoppable detection worker
//! - A single speech gate so utterances never interleave
//!
//! The external collaborators (transcription, inference, rendering,
//! camera, search) are wired here; this build uses the console
//! placeholders, so transcripts come from stdin and speech goes to stdout.

mod config;
mod detection;
mod events;
mod external;
mod handlers;
mod intent;
mod lifecycle;
mod orchestrator;
mod policy;
mod speech;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::detection::BackgroundModeController;
use crate::events::PipelineEvent;
use crate::external::console::{ConsoleRenderer, StdinTranscriber, Unavailable};
use crate::external::{Transcriber, TranscribeError};
use crate::handlers::{
    CurrencyHandler, Handlers, KnowledgeHandler, ReadingHandler, SceneHandler, StopHandler,
};
use crate::intent::IntentRouter;
use crate::lifecycle::ShutdownSignal;
use crate::orchestrator::Orchestrator;
use crate::policy::ConfidencePolicy;
use crate::speech::SpeechGate;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "saathi-daemon starting"
    );

    // Load configuration
    let config = Config::load()?;
    info!(
        high = config.confidence_high,
        medium = config.confidence_medium,
        "configuration loaded"
    );

    // Speech output: the one gate every component speaks through
    let gate = Arc::new(SpeechGate::new(Arc::new(ConsoleRenderer)));

    // Background currency detection
    let controller = Arc::new(BackgroundModeController::new(
        gate.clone(),
        Arc::new(Unavailable::new("detection-stream")),
        config.announce_cooldown,
        config.worker_stop_timeout,
    ));

    // Handlers and their collaborators
    let camera = Arc::new(Unavailable::new("camera"));
    let vision = Arc::new(Unavailable::new("vision"));
    let handlers = Handlers {
        scene: SceneHandler::new(camera.clone(), vision.clone()),
        reading: ReadingHandler::new(camera, vision),
        currency: CurrencyHandler::new(controller.clone()),
        stop: StopHandler::new(controller.clone()),
        knowledge: KnowledgeHandler::new(
            Arc::new(Unavailable::new("web-search")),
            Arc::new(Unavailable::new("knowledge")),
            gate.clone(),
        ),
    };

    // The request pipeline
    let (event_tx, mut event_rx) = broadcast::channel::<PipelineEvent>(64);
    let router = IntentRouter::new(Arc::new(Unavailable::new("classifier")));
    let orchestrator = Arc::new(Orchestrator::new(
        router,
        ConfidencePolicy::new(&config),
        handlers,
        gate.clone(),
        event_tx,
    ));

    let shutdown = ShutdownSignal::new();

    info!("daemon initialized, entering listening loop");

    // Listening loop runs blocking calls, so it gets its own thread
    let loop_gate = gate.clone();
    let loop_orchestrator = orchestrator.clone();
    let listen_task =
        tokio::task::spawn_blocking(move || listen_loop(&StdinTranscriber, &loop_orchestrator, &loop_gate));

    tokio::select! {
        result = listen_task => {
            match result {
                Ok(()) => info!("listening loop exited"),
                Err(e) => error!(?e, "listening loop task failed"),
            }
        }

        // Log pipeline events as they flow
        _ = async {
            loop {
                match event_rx.recv().await {
                    Ok(event) => info!(event = %event, "pipeline event"),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "pipeline event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        } => {
            info!("pipeline event logger exited");
        }

        signal = shutdown.wait() => {
            info!(signal, "shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    if controller.is_running() {
        controller.stop();
    }
    let goodbye_gate = gate.clone();
    let _ = tokio::task::spawn_blocking(move || goodbye_gate.speak("Goodbye!")).await;

    info!("saathi-daemon stopped");

    Ok(())
}

/// Sequential listening loop: one utterance in, one pass through the
/// pipeline, in arrival order. Nothing that happens inside a request is
/// allowed to end this loop; only transcription device loss does.
fn listen_loop(transcriber: &dyn Transcriber, orchestrator: &Orchestrator, gate: &SpeechGate) {
    gate.speak("Assistant is ready. You can speak now.");

    loop {
        let transcript = match transcriber.transcribe() {
            Ok(transcript) => transcript,
            Err(TranscribeError::DeviceUnavailable) => {
                error!("transcription device unavailable, stopping listening loop");
                return;
            }
            Err(e) => {
                error!(?e, "transcription failed");
                gate.speak("Something went wrong. Please try again.");
                continue;
            }
        };

        if transcript.trim().is_empty() {
            continue;
        }

        // The pipeline absorbs its own failures; this is the last-resort
        // net so a panic cannot end the loop either
        let outcome = catch_unwind(AssertUnwindSafe(|| orchestrator.handle(&transcript)));
        if outcome.is_err() {
            error!("request pipeline panicked");
            gate.speak("Something went wrong. Please try again.");
        }
    }
}
