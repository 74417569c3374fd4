//! Knowledge handler: factual questions, answered and spoken directly
//!
//! Web search is a best-effort context boost. A failed or empty search
//! never blocks the answer; the backend falls back to its own knowledge.
//! This handler speaks its answer itself, so its reply carries the
//! spoken flag and the orchestrator does not speak again.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::external::{KnowledgeBackend, WebSearch};
use crate::orchestrator::RequestState;
use crate::speech::SpeechGate;

use super::{HandlerReply, ModeHandler};

/// Answers factual questions through the knowledge backend
pub struct KnowledgeHandler {
    search: Arc<dyn WebSearch>,
    backend: Arc<dyn KnowledgeBackend>,
    gate: Arc<SpeechGate>,
}

impl KnowledgeHandler {
    pub fn new(
        search: Arc<dyn WebSearch>,
        backend: Arc<dyn KnowledgeBackend>,
        gate: Arc<SpeechGate>,
    ) -> Self {
        Self {
            search,
            backend,
            gate,
        }
    }
}

impl ModeHandler for KnowledgeHandler {
    fn run(&self, request: &RequestState) -> Result<HandlerReply> {
        let query = request.cleaned_transcript.trim();
        info!(%query, "knowledge handler");

        let web_context = match self.search.search(query) {
            Ok(snippets) if !snippets.is_empty() => {
                info!("web search succeeded, using as context boost");
                snippets
            }
            Ok(_) => {
                warn!("web search empty, backend will use own knowledge");
                String::new()
            }
            Err(e) => {
                warn!(?e, "web search skipped");
                String::new()
            }
        };

        let answer = self.backend.answer(query, &web_context)?;
        self.gate.speak(&answer);

        Ok(HandlerReply::already_spoken())
    }

    fn fallback_reply(&self) -> &'static str {
        "Sorry, I could not process that."
    }
}
