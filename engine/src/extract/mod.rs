//! Entity extraction: free text in, substance mentions out.
//!
//! The language model does the linguistic work - spotting substances and
//! their time phrases - and returns a JSON array. Everything that must be
//! deterministic happens here in Rust: name normalization, vocabulary
//! checks, and resolving relative time phrases against the turn's arrival
//! timestamp.
//!
//! A turn the model finds nothing in is not an error; it is an
//! informational turn and extraction returns an empty sequence.

mod time;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use kava_index::InteractionIndex;
use kava_providers::{ChatMessage, ChatModel, CompletionRequest};
use kava_types::{SubstanceCategory, SubstanceMention, SubstanceName, ThreadId};

const EXTRACT_SYSTEM_PROMPT: &str = "\
You extract food and medication mentions from a user's message.

Reply with ONLY a JSON array, no prose. Each element:
{\"name\": \"<substance>\", \"category\": \"food\"|\"drug\", \"when\": \"<time phrase from the message, or omit if none>\"}

Rules:
- Include every food, drink, medication, or supplement the user says they \
consumed or took. Ignore substances that are only asked about.
- Copy the user's own time phrase into \"when\" verbatim (e.g. \"today at 1pm\", \
\"2 hours ago\"). Omit the field when no time is given.
- If the message mentions nothing consumed or taken, reply with [].";

#[derive(Debug, Deserialize)]
struct RawCandidate {
    name: String,
    category: String,
    #[serde(default)]
    when: Option<String>,
}

/// LLM-backed extractor with deterministic post-processing.
pub(crate) struct Extractor {
    chat: Arc<dyn ChatModel>,
}

impl Extractor {
    pub fn new(chat: Arc<dyn ChatModel>) -> Self {
        Self { chat }
    }

    /// Extract mentions from one turn. Model failures and unparseable
    /// completions both yield an empty sequence - extraction is best
    /// effort, and "nothing found" is a legal answer.
    pub async fn extract(
        &self,
        thread: &ThreadId,
        text: &str,
        arrival: DateTime<Utc>,
        index: &InteractionIndex,
    ) -> Vec<SubstanceMention> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(EXTRACT_SYSTEM_PROMPT),
            ChatMessage::user(text),
        ]);

        let completion = match self.chat.complete(request).await {
            Ok(response) => response.content,
            Err(e) => {
                tracing::warn!(thread = %thread, error = %e, "Extraction completion failed");
                return Vec::new();
            }
        };

        let Some(candidates) = parse_candidates(&completion) else {
            tracing::debug!(thread = %thread, "No extractable entities in turn");
            return Vec::new();
        };

        let mut mentions = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let Ok(name) = SubstanceName::new(&candidate.name) else {
                continue;
            };
            let Some(category) = SubstanceCategory::parse(candidate.category.trim()) else {
                tracing::debug!(
                    name = %name,
                    category = %candidate.category,
                    "Skipping candidate with unknown category"
                );
                continue;
            };

            let resolution = time::resolve_phrase(candidate.when.as_deref(), arrival);
            let unknown_name = !index.knows(&name);
            if unknown_name {
                tracing::debug!(name = %name, "Substance not in curated vocabulary");
            }

            mentions.push(
                SubstanceMention::new(
                    thread.clone(),
                    name,
                    category,
                    candidate.name.trim(),
                    resolution.taken_at,
                )
                .with_low_confidence(resolution.ambiguous || unknown_name),
            );
        }

        mentions
    }
}

/// Pull the first JSON array out of a completion. Models wrap output in
/// prose or code fences often enough that strict parsing would throw away
/// good answers.
fn parse_candidates(completion: &str) -> Option<Vec<RawCandidate>> {
    let start = completion.find('[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in completion[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '[' if !in_string => depth += 1,
            ']' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    let slice = &completion[start..=start + offset];
                    return serde_json::from_str(slice).ok();
                }
            }
            _ => {}
        }
    }

    None
}
