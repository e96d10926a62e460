//! Conversation session
//!
//! Wires one conversation together: the store owns the plot state, no-API
//! intents go to the handler, everything else goes through the resolver and
//! is published under the turn's token.

use crate::answer::AnswerBuilder;
use crate::client::MeasurementClient;
use crate::export::ExportSink;
use crate::no_api::{NoApiHandler, Redisplay, ReplyEffect};
use crate::plot::PlotState;
use crate::resolver::{PlotStateResolver, Resolution, UnchangedReason};
use crate::store::{PlotStateStore, PublishOutcome};
use crate::types::ResolveRequest;
use std::sync::Arc;

/// Everything a turn produced
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Reply text
    pub message: String,
    /// What happened to the plot-state slot
    pub published: PublishOutcome,
    /// Conversation was reset
    pub reset: bool,
    /// Existing plot should be drawn again
    pub redisplay: Option<Redisplay>,
    /// Set for download intents
    pub download_available: Option<bool>,
}

impl TurnOutcome {
    fn reply(message: String, published: PublishOutcome) -> Self {
        Self {
            message,
            published,
            reset: false,
            redisplay: None,
            download_available: None,
        }
    }
}

/// One conversation
pub struct Session<C> {
    resolver: PlotStateResolver<C>,
    handler: NoApiHandler,
    answers: Arc<dyn AnswerBuilder>,
    store: PlotStateStore,
}

impl<C> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl<C: MeasurementClient> Session<C> {
    /// Create session with an empty plot-state slot
    #[must_use]
    pub fn new(
        resolver: PlotStateResolver<C>,
        answers: Arc<dyn AnswerBuilder>,
        sink: Arc<dyn ExportSink>,
    ) -> Self {
        Self {
            resolver,
            handler: NoApiHandler::new(answers.clone(), sink),
            answers,
            store: PlotStateStore::new(),
        }
    }

    /// Plot-state slot
    #[inline]
    #[must_use]
    pub fn store(&self) -> &PlotStateStore {
        &self.store
    }

    /// Currently displayed plot
    pub async fn current(&self) -> Option<PlotState> {
        self.store.current().await
    }

    /// Handle one classified turn
    pub async fn handle(&self, request: &ResolveRequest) -> TurnOutcome {
        let token = self.store.begin_turn().await;
        let prior = self.store.current().await;
        tracing::debug!("{} starts with intent {}", token, request.intent);

        if request.intent.general().is_no_api() {
            let reply = self
                .handler
                .handle_intent(&request.intent, prior.as_ref(), &request.params);

            return match reply.effect {
                ReplyEffect::Reset => {
                    self.store.reset().await;
                    TurnOutcome {
                        reset: true,
                        ..TurnOutcome::reply(reply.message, PublishOutcome::Unchanged)
                    }
                }
                ReplyEffect::Redisplay(redisplay) => {
                    let published = match (prior, redisplay.log_transform) {
                        (Some(state), Some(flag)) if state.has_log != flag => {
                            self.store
                                .publish(token, Resolution::Updated(state.with_log(flag)))
                                .await
                        }
                        _ => PublishOutcome::Unchanged,
                    };
                    TurnOutcome {
                        redisplay: Some(redisplay),
                        ..TurnOutcome::reply(reply.message, published)
                    }
                }
                ReplyEffect::ReplyOnly => TurnOutcome {
                    download_available: reply.download_available,
                    ..TurnOutcome::reply(reply.message, PublishOutcome::Unchanged)
                },
            };
        }

        let resolution = self.resolver.resolve(request, prior.as_ref()).await;
        let message = match &resolution {
            Resolution::Updated(state) => self.answers.build(&request.intent, Some(state), None),
            Resolution::Unchanged(UnchangedReason::Unrecognized(_)) => {
                self.handler
                    .handle_intent(&request.intent, prior.as_ref(), &request.params)
                    .message
            }
            Resolution::Unchanged(UnchangedReason::Failed(_)) => {
                self.answers.fetch_failed(&request.intent)
            }
        };

        let published = self.store.publish(token, resolution).await;
        if published == PublishOutcome::Stale {
            tracing::info!("{} resolved after a newer turn; result dropped", token);
        }
        TurnOutcome::reply(message, published)
    }
}
