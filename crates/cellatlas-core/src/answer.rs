//! Reply text
//!
//! The answer builder turns an intent and the displayed plot into the
//! conversational reply. Deployments may plug in their own phrasing; the
//! template implementation covers every intent the resolver knows.

use crate::plot::{PlotData, PlotState};
use crate::types::{GeneralIntent, Intent};

/// Result of a side-effecting action the reply should report on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Whether the action went through
    pub success: bool,
}

impl ActionOutcome {
    /// Successful action
    #[inline]
    #[must_use]
    pub fn succeeded() -> Self {
        Self { success: true }
    }

    /// Failed action
    #[inline]
    #[must_use]
    pub fn failed() -> Self {
        Self { success: false }
    }
}

/// Produces the reply text for a turn
pub trait AnswerBuilder: Send + Sync {
    /// Reply for `intent` given the plot now displayed
    fn build(&self, intent: &Intent, state: Option<&PlotState>, outcome: Option<ActionOutcome>)
        -> String;

    /// Reply when the data for `intent` could not be fetched
    fn fetch_failed(&self, intent: &Intent) -> String {
        format!(
            "Sorry, I couldn't get the data for that request ({}). The previous plot is still shown.",
            intent.general()
        )
    }
}

/// Fixed English templates
#[derive(Debug, Clone)]
pub struct TemplateAnswers {
    reference_link: String,
}

impl TemplateAnswers {
    /// Create with the link used for `link` intents
    #[inline]
    #[must_use]
    pub fn new(reference_link: impl Into<String>) -> Self {
        Self {
            reference_link: reference_link.into(),
        }
    }
}

impl Default for TemplateAnswers {
    fn default() -> Self {
        Self::new("https://atlasapprox.org")
    }
}

fn location(state: &PlotState) -> String {
    match &state.organ {
        Some(organ) => format!("{} {}", state.organism, organ),
        None => state.organism.clone(),
    }
}

impl AnswerBuilder for TemplateAnswers {
    fn build(
        &self,
        intent: &Intent,
        state: Option<&PlotState>,
        outcome: Option<ActionOutcome>,
    ) -> String {
        match (intent.general(), state) {
            (GeneralIntent::Download, state) => match (outcome, state) {
                (Some(ActionOutcome { success: true }), Some(state)) => {
                    format!("Your {} data has been downloaded.", state.plot_type)
                }
                _ => "Sorry, the current plot can't be downloaded.".to_string(),
            },
            (GeneralIntent::Plot, Some(state)) if state.has_log => {
                "Here's the plot again, on a log scale.".to_string()
            }
            (GeneralIntent::Plot, Some(_)) => "Here's the plot again.".to_string(),
            (GeneralIntent::Plot, None) => "There is no plot to show yet.".to_string(),
            (GeneralIntent::Greetings, Some(state)) if !state.organism.is_empty() => format!(
                "Hello again! We were looking at {}. What would you like to see next?",
                location(state)
            ),
            (GeneralIntent::Greetings, _) => {
                "Hi! Ask me about gene expression in any organism or organ in the atlas.".to_string()
            }
            (GeneralIntent::Link, _) => {
                format!("You can find more about the atlas at {}.", self.reference_link)
            }
            (GeneralIntent::Average, Some(state)) => format!(
                "Here's the average expression of {} in {}.",
                state.features,
                location(state)
            ),
            (GeneralIntent::FractionDetected, Some(state)) => format!(
                "Here's the fraction of cells expressing {} in {}.",
                state.features,
                location(state)
            ),
            (GeneralIntent::Markers, Some(state)) => format!(
                "The top markers are {}. Here's how they are expressed across {}.",
                state.features,
                location(state)
            ),
            (GeneralIntent::SimilarFeatures, Some(state)) => format!(
                "Features similar to {} are shown below.",
                state.features.first().unwrap_or_default()
            ),
            (GeneralIntent::HighestMeasurement, Some(state)) => format!(
                "These are the cell types with the highest expression of {} in {}.",
                state.features, state.organism
            ),
            (GeneralIntent::Add | GeneralIntent::Remove, Some(state)) => {
                format!("The plot now shows {}.", state.features)
            }
            (GeneralIntent::CelltypeXOrgan, Some(state)) => format!(
                "Here's which cell types are found in each organ of {}.",
                state.organism
            ),
            (GeneralIntent::Organisms, _) => {
                "These are the organisms available in the atlas.".to_string()
            }
            (GeneralIntent::Sequences, Some(state)) => match &state.data {
                PlotData::Sequences(seqs) => {
                    format!("Here are the sequences of {} features.", seqs.features.len())
                }
                _ => format!("Here are the sequences of {}.", state.features),
            },
            (GeneralIntent::Unknown(_), _) => "Unhandled intent".to_string(),
            (_, None) => self.fetch_failed(intent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plot::PlotType;

    fn organisms_state() -> PlotState {
        PlotState::new("organisms", PlotType::ShowOrganisms, PlotData::Organisms)
    }

    #[test]
    fn download_reply_follows_outcome() {
        let answers = TemplateAnswers::default();
        let intent = Intent::parse("download");
        let state = organisms_state();

        let ok = answers.build(&intent, Some(&state), Some(ActionOutcome::succeeded()));
        assert!(ok.contains("downloaded"));

        let failed = answers.build(&intent, Some(&state), Some(ActionOutcome::failed()));
        assert!(failed.starts_with("Sorry"));
    }

    #[test]
    fn link_reply_contains_link() {
        let answers = TemplateAnswers::new("https://example.org/atlas");
        let reply = answers.build(&Intent::parse("link.website"), None, None);
        assert!(reply.contains("https://example.org/atlas"));
    }

    #[test]
    fn greeting_mentions_context() {
        let answers = TemplateAnswers::default();
        let state = organisms_state().with_organism("m_musculus");
        let reply = answers.build(&Intent::parse("greetings.hello"), Some(&state), None);
        assert!(reply.contains("m_musculus"));
    }

    #[test]
    fn missing_state_reads_as_fetch_failure() {
        let answers = TemplateAnswers::default();
        let reply = answers.build(&Intent::parse("average.geneExpression"), None, None);
        assert!(reply.contains("couldn't get the data"));
    }
}
