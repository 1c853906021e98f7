//! Response composition: evidence bundles in, grounded reply out.
//!
//! The advisory content is rendered deterministically - hedging tracks
//! provenance, unresolved pairs are called out, and the standing safety
//! disclaimer is appended whenever the reply carries interaction evidence.
//! The chat model only contributes a conversational lead-in; if it fails,
//! the deterministic rendering stands alone. Composition can therefore
//! never fail a turn.

use std::sync::Arc;

use kava_providers::{ChatMessage, ChatModel, CompletionRequest};
use kava_types::{EvidenceBundle, PairOutcome, Provenance};

use crate::threads::{HistoryEntry, HistoryRole};

/// Standing safety disclaimer, present in every reply that contains
/// interaction evidence.
pub const SAFETY_DISCLAIMER: &str = "This is general safety information, not medical advice. \
Please check with your doctor or pharmacist before making any changes.";

/// A `Similar` record at or above this confidence reads as a near-match
/// and may be stated plainly; below it, the wording hedges.
const SIMILAR_DIRECT_CONFIDENCE: f32 = 0.9;

const COMPOSE_SYSTEM_PROMPT: &str = "\
You are a warm, plain-spoken health companion. The user logs what they eat \
and what medications they take, and a separate safety system checks for \
interactions. Reply with one or two friendly sentences acknowledging the \
user's message. Do NOT state, deny, or speculate about any drug or food \
interaction yourself - the safety findings are appended separately.";

const FALLBACK_LEAD_WITH_FINDINGS: &str = "Thanks, I've logged that. Here's what I found:";
const FALLBACK_LEAD_NO_FINDINGS: &str = "Thanks, I've logged that.";
const FALLBACK_LEAD_CONVERSATIONAL: &str =
    "I'm here to help you keep track of your foods and medications.";

pub(crate) struct Composer {
    chat: Arc<dyn ChatModel>,
}

impl Composer {
    pub fn new(chat: Arc<dyn ChatModel>) -> Self {
        Self { chat }
    }

    /// Compose the reply for one turn.
    pub async fn compose(
        &self,
        turn_text: &str,
        bundles: &[EvidenceBundle],
        history: &[HistoryEntry],
    ) -> String {
        let advisory = render_advisory(bundles);
        let lead = self.lead_in(turn_text, bundles, history, advisory.is_some()).await;

        match advisory {
            Some(advisory) => format!("{lead}\n\n{advisory}\n\n{SAFETY_DISCLAIMER}"),
            None => lead,
        }
    }

    async fn lead_in(
        &self,
        turn_text: &str,
        bundles: &[EvidenceBundle],
        history: &[HistoryEntry],
        has_advisory: bool,
    ) -> String {
        let mut messages = vec![ChatMessage::system(COMPOSE_SYSTEM_PROMPT)];
        for entry in history {
            messages.push(match entry.role {
                HistoryRole::User => ChatMessage::user(entry.text.clone()),
                HistoryRole::Assistant => ChatMessage::assistant(entry.text.clone()),
            });
        }
        messages.push(ChatMessage::user(turn_text));

        match self.chat.complete(CompletionRequest::new(messages)).await {
            Ok(response) if !response.content.trim().is_empty() => {
                response.content.trim().to_string()
            }
            Ok(_) => fallback_lead(bundles, has_advisory),
            Err(e) => {
                tracing::warn!(error = %e, "Lead-in completion failed, using fallback");
                fallback_lead(bundles, has_advisory)
            }
        }
    }
}

fn fallback_lead(bundles: &[EvidenceBundle], has_advisory: bool) -> String {
    if bundles.is_empty() {
        FALLBACK_LEAD_CONVERSATIONAL.to_string()
    } else if has_advisory {
        FALLBACK_LEAD_WITH_FINDINGS.to_string()
    } else {
        FALLBACK_LEAD_NO_FINDINGS.to_string()
    }
}

/// Render the advisory block, one line per checked pair. `None` when there
/// was nothing to check (a pure conversational turn).
fn render_advisory(bundles: &[EvidenceBundle]) -> Option<String> {
    let mut lines = Vec::new();

    for bundle in bundles {
        let subject = &bundle.subject.name;
        for pair in &bundle.pairs {
            let other = &pair.other;
            let line = match &pair.outcome {
                PairOutcome::Interaction { record } => match record.provenance {
                    Provenance::Exact => format!(
                        "- {subject} and {other} are known to interact ({} severity): {}",
                        record.severity, record.description
                    ),
                    Provenance::Similar => {
                        let confidence = record.confidence.unwrap_or(0.0);
                        if confidence >= SIMILAR_DIRECT_CONFIDENCE {
                            format!(
                                "- {subject} and {other} closely match a known interaction ({} severity): {}",
                                record.severity, record.description
                            )
                        } else {
                            format!(
                                "- {subject} and {other} may interact, based on a similar known case: {}",
                                record.description
                            )
                        }
                    }
                    Provenance::Web => format!(
                        "- Some sources suggest {subject} and {other} may interact: {}",
                        record.description
                    ),
                },
                PairOutcome::NoKnownInteraction => {
                    format!("- No known interaction found between {subject} and {other}.")
                }
                PairOutcome::Unresolved { reason } => format!(
                    "- {subject} and {other}: I couldn't retrieve interaction evidence right now ({reason}). Please ask again later."
                ),
            };
            lines.push(line);
        }
    }

    if lines.is_empty() {
        return None;
    }

    let mut advisory = String::from("Safety check:\n");
    advisory.push_str(&lines.join("\n"));
    Some(advisory)
}
