//! Mode handlers: one per action category
//!
//! Exactly one handler runs per dispatched request. Handlers return their
//! reply text for the orchestrator to speak; a handler that already
//! produced audio itself marks the reply as spoken so the orchestrator
//! does not speak again.

mod currency;
mod knowledge;
mod reading;
mod scene;
mod stop;

pub use currency::CurrencyHandler;
pub use knowledge::KnowledgeHandler;
pub use reading::ReadingHandler;
pub use scene::SceneHandler;
pub use stop::StopHandler;

use anyhow::Result;

use crate::intent::Mode;
use crate::orchestrator::RequestState;

/// What a handler produced for one request
#[derive(Debug, Clone, Default)]
pub struct HandlerReply {
    /// Text for the orchestrator to speak; empty means nothing to say
    pub text: String,
    /// True when the handler already emitted audio itself
    pub spoken: bool,
}

impl HandlerReply {
    /// A reply that speaks `text`
    pub fn say(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            spoken: false,
        }
    }

    /// A deliberately silent reply (e.g. a redundant start/stop)
    pub fn silent() -> Self {
        Self::default()
    }

    /// A reply whose audio the handler already rendered itself
    pub fn already_spoken() -> Self {
        Self {
            text: String::new(),
            spoken: true,
        }
    }
}

/// One action category's executor
pub trait ModeHandler: Send + Sync {
    /// Execute the action for this request. Errors are caught at the
    /// orchestrator boundary and replaced with `fallback_reply`.
    fn run(&self, request: &RequestState) -> Result<HandlerReply>;

    /// Category-specific apology spoken when `run` fails
    fn fallback_reply(&self) -> &'static str;
}

/// The fixed mode-to-handler table
pub struct Handlers {
    pub scene: SceneHandler,
    pub reading: ReadingHandler,
    pub currency: CurrencyHandler,
    pub stop: StopHandler,
    pub knowledge: KnowledgeHandler,
}

impl Handlers {
    /// Select the handler for a mode. `Unknown` has no handler; it can
    /// only reach the clarification path.
    pub fn for_mode(&self, mode: Mode) -> Option<&dyn ModeHandler> {
        match mode {
            Mode::Navigation => Some(&self.scene),
            Mode::Reading => Some(&self.reading),
            Mode::Currency => Some(&self.currency),
            Mode::Stop => Some(&self.stop),
            Mode::Knowledge => Some(&self.knowledge),
            Mode::Unknown => None,
        }
    }
}
