//! Intents answered without the measurement service
//!
//! A flat dispatch over download, plot, greetings and link. The handler never
//! writes conversational state itself; its reply says whether the caller
//! should keep the state, re-display it, or reset everything.

use crate::answer::{ActionOutcome, AnswerBuilder};
use crate::error::ExportError;
use crate::export::{self, ExportSink};
use crate::plot::{PlotData, PlotState};
use crate::types::{GeneralIntent, Intent, Params};
use std::sync::Arc;

/// Sub-intent that ends the conversation
pub const FAREWELL: &str = "bye";

/// Display hints for re-showing the current plot
#[derive(Debug, Clone, PartialEq)]
pub struct Redisplay {
    /// Parameters of the turn that asked for it
    pub params: Params,
    /// Payload to draw again
    pub data: Option<PlotData>,
    /// `Some(true)` for log scale, `Some(false)` for linear, `None` to keep
    pub log_transform: Option<bool>,
}

/// What the caller should do besides showing the message
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyEffect {
    /// Show the message, keep the plot
    ReplyOnly,
    /// Show the message and draw the existing plot again
    Redisplay(Redisplay),
    /// Drop all conversational state
    Reset,
}

/// Reply to a no-API intent
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Text for the user (empty on reset)
    pub message: String,
    /// Follow-up for the caller
    pub effect: ReplyEffect,
    /// Set for download intents
    pub download_available: Option<bool>,
}

impl Reply {
    fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            effect: ReplyEffect::ReplyOnly,
            download_available: None,
        }
    }

    /// Whether the caller must reset conversational state
    #[inline]
    #[must_use]
    pub fn resets(&self) -> bool {
        matches!(self.effect, ReplyEffect::Reset)
    }
}

/// Handles download, plot, greetings and link intents
#[derive(Clone)]
pub struct NoApiHandler {
    answers: Arc<dyn AnswerBuilder>,
    sink: Arc<dyn ExportSink>,
}

impl std::fmt::Debug for NoApiHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoApiHandler").finish_non_exhaustive()
    }
}

impl NoApiHandler {
    /// Create handler
    #[inline]
    #[must_use]
    pub fn new(answers: Arc<dyn AnswerBuilder>, sink: Arc<dyn ExportSink>) -> Self {
        Self { answers, sink }
    }

    /// Handle a parsed intent
    #[must_use]
    pub fn handle_intent(&self, intent: &Intent, prior: Option<&PlotState>, params: &Params) -> Reply {
        self.handle(intent.general(), intent.sub(), intent, prior, params)
    }

    /// Handle by main and sub intent
    #[must_use]
    pub fn handle(
        &self,
        main: &GeneralIntent,
        sub: &str,
        intent: &Intent,
        prior: Option<&PlotState>,
        params: &Params,
    ) -> Reply {
        match main {
            GeneralIntent::Download => self.download(intent, prior),
            GeneralIntent::Plot => {
                let log_transform = match sub {
                    "log" => Some(true),
                    "unlog" => Some(false),
                    _ => None,
                };
                let shown = match (prior, log_transform) {
                    (Some(state), Some(flag)) => Some(state.with_log(flag)),
                    (state, _) => state.cloned(),
                };
                Reply {
                    message: self.answers.build(intent, shown.as_ref(), None),
                    effect: ReplyEffect::Redisplay(Redisplay {
                        params: params.clone(),
                        data: prior.map(|s| s.data.clone()),
                        log_transform,
                    }),
                    download_available: None,
                }
            }
            GeneralIntent::Greetings if sub == FAREWELL => {
                tracing::info!("Farewell received, resetting conversation");
                Reply {
                    message: String::new(),
                    effect: ReplyEffect::Reset,
                    download_available: None,
                }
            }
            GeneralIntent::Greetings | GeneralIntent::Link => {
                Reply::message(self.answers.build(intent, prior, None))
            }
            _ => {
                tracing::warn!("Unhandled intent: {}", intent);
                Reply::message("Unhandled intent")
            }
        }
    }

    fn download(&self, intent: &Intent, prior: Option<&PlotState>) -> Reply {
        let available = match export::export_displayed(prior, self.sink.as_ref()) {
            Ok(file) => {
                tracing::info!("Download ready: {}", file.file_name);
                true
            }
            Err(ExportError::NothingDisplayed) => {
                tracing::debug!("Download requested with nothing displayed");
                false
            }
            Err(e) => {
                tracing::warn!("Download failed: {}", e);
                false
            }
        };

        let outcome = if available {
            ActionOutcome::succeeded()
        } else {
            ActionOutcome::failed()
        };
        Reply {
            message: self.answers.build(intent, prior, Some(outcome)),
            effect: ReplyEffect::ReplyOnly,
            download_available: Some(available),
        }
    }
}
