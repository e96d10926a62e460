//! Conversational plot-state store
//!
//! Holds the single plot-state slot of a conversation. Only [`PlotStateStore::publish`]
//! and [`PlotStateStore::reset`] write to it. Each turn takes a token when it
//! starts; a resolution that lands after a newer turn has already published
//! is dropped, so the latest turn wins even if an older one resolves late.

use crate::plot::PlotState;
use crate::resolver::Resolution;
use serde::Serialize;
use tokio::sync::RwLock;

/// Sequence number handed out when a turn starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TurnToken(u64);

impl std::fmt::Display for TurnToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "turn#{}", self.0)
    }
}

/// What a publish call did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishOutcome {
    /// New state stored
    Applied,
    /// Resolution carried no state; slot untouched
    Unchanged,
    /// A newer turn already published; resolution dropped
    Stale,
}

#[derive(Debug, Default)]
struct Slot {
    state: Option<PlotState>,
    next_turn: u64,
    /// Tokens below this are stale
    floor: u64,
}

/// Owned plot-state slot with turn ordering
#[derive(Debug, Default)]
pub struct PlotStateStore {
    slot: RwLock<Slot>,
}

impl PlotStateStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a turn
    pub async fn begin_turn(&self) -> TurnToken {
        let mut slot = self.slot.write().await;
        let token = TurnToken(slot.next_turn);
        slot.next_turn += 1;
        token
    }

    /// Publish a turn's resolution
    pub async fn publish(&self, token: TurnToken, resolution: Resolution) -> PublishOutcome {
        let Resolution::Updated(state) = resolution else {
            return PublishOutcome::Unchanged;
        };

        let mut slot = self.slot.write().await;
        if token.0 < slot.floor {
            tracing::debug!("Dropping stale resolution from {}", token);
            return PublishOutcome::Stale;
        }

        tracing::debug!("Publishing {} plot from {}", state.plot_type, token);
        slot.state = Some(state);
        slot.floor = token.0 + 1;
        PublishOutcome::Applied
    }

    /// Snapshot of the displayed state
    pub async fn current(&self) -> Option<PlotState> {
        self.slot.read().await.state.clone()
    }

    /// Clear the displayed state
    ///
    /// Turns begun before the reset can no longer publish.
    pub async fn reset(&self) {
        let mut slot = self.slot.write().await;
        slot.state = None;
        slot.floor = slot.next_turn;
        tracing::info!("Conversation plot state reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plot::{PlotData, PlotType};
    use crate::resolver::UnchangedReason;

    fn organisms(intent: &str) -> Resolution {
        Resolution::Updated(PlotState::new(
            intent,
            PlotType::ShowOrganisms,
            PlotData::Organisms,
        ))
    }

    #[tokio::test]
    async fn tokens_increase() {
        let store = PlotStateStore::new();
        let a = store.begin_turn().await;
        let b = store.begin_turn().await;
        assert!(b > a);
    }

    #[tokio::test]
    async fn unchanged_keeps_previous_state() {
        let store = PlotStateStore::new();
        let t1 = store.begin_turn().await;
        assert_eq!(store.publish(t1, organisms("first")).await, PublishOutcome::Applied);

        let t2 = store.begin_turn().await;
        let outcome = store
            .publish(
                t2,
                Resolution::Unchanged(UnchangedReason::Unrecognized("foo.bar".to_string())),
            )
            .await;
        assert_eq!(outcome, PublishOutcome::Unchanged);
        assert_eq!(store.current().await.unwrap().intent, "first");
    }

    #[tokio::test]
    async fn late_older_turn_is_stale() {
        let store = PlotStateStore::new();
        let slow = store.begin_turn().await;
        let fast = store.begin_turn().await;

        assert_eq!(store.publish(fast, organisms("fast")).await, PublishOutcome::Applied);
        assert_eq!(store.publish(slow, organisms("slow")).await, PublishOutcome::Stale);
        assert_eq!(store.current().await.unwrap().intent, "fast");
    }

    #[tokio::test]
    async fn reset_blocks_turns_begun_before_it() {
        let store = PlotStateStore::new();
        let t1 = store.begin_turn().await;
        store.publish(t1, organisms("first")).await;

        let in_flight = store.begin_turn().await;
        store.reset().await;
        assert!(store.current().await.is_none());

        assert_eq!(
            store.publish(in_flight, organisms("late")).await,
            PublishOutcome::Stale
        );
        let next = store.begin_turn().await;
        assert_eq!(store.publish(next, organisms("fresh")).await, PublishOutcome::Applied);
    }
}
