//! Built-in units of work.
//!
//! A deterministic text analysis that needs no language model: it counts
//! words and sentences and picks out capitalised names. It backs the
//! `analyze` and `batch-analyze` kinds so the server is useful on its own.
//! Other kinds stay unavailable until a unit is registered for them.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use storyloom_core::error::DomainError;
use storyloom_core::task::TaskProgress;
use storyloom_core::work::{ProgressReporter, WorkFailure, WorkUnit};

/// Result of analysing one text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextAnalysis {
    /// Distinct capitalised names, in order of first appearance.
    pub characters: Vec<String>,
    /// Whitespace-separated words.
    pub words: usize,
    /// Sentences ending in `.`, `!` or `?` (or end of text).
    pub sentences: usize,
    /// Unicode scalar values in the text.
    pub chars: usize,
}

impl TextAnalysis {
    fn to_json(&self) -> Value {
        json!({
            "characters": self.characters,
            "words": self.words,
            "sentences": self.sentences,
            "chars": self.chars,
        })
    }
}

fn clean(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric())
}

fn is_capitalised(word: &str) -> bool {
    let mut chars = word.chars();
    chars.next().is_some_and(char::is_uppercase) && chars.next().is_some()
}

/// Analyses `text`. Names in `known` are recognised even at the start of a
/// sentence, where capitalisation alone proves nothing.
#[must_use]
pub fn analyze_text(text: &str, known: &[String]) -> TextAnalysis {
    let sentences: Vec<&str> = text
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    // Capitalised words seen mid-sentence are names wherever they appear.
    let mut names: HashSet<&str> = known.iter().map(String::as_str).collect();
    for sentence in &sentences {
        for word in sentence.split_whitespace().skip(1).map(clean) {
            if is_capitalised(word) {
                names.insert(word);
            }
        }
    }

    let mut seen = HashSet::new();
    let characters = sentences
        .iter()
        .flat_map(|s| s.split_whitespace().map(clean))
        .filter(|w| names.contains(w) && seen.insert(*w))
        .map(str::to_owned)
        .collect();

    TextAnalysis {
        characters,
        words: text.split_whitespace().count(),
        sentences: sentences.len(),
        chars: text.chars().count(),
    }
}

#[derive(Debug, Deserialize)]
struct TextPayload {
    text: String,
}

fn parse<T: for<'de> Deserialize<'de>>(payload: &Value) -> Result<T, DomainError> {
    T::deserialize(payload).map_err(|e| DomainError::Validation(format!("invalid payload: {e}")))
}

/// `analyze`: analyses the `text` field of the payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextAnalysisWork;

#[async_trait]
impl WorkUnit for TextAnalysisWork {
    fn validate(&self, payload: &Value) -> Result<(), DomainError> {
        let payload: TextPayload = parse(payload)?;
        if payload.text.trim().is_empty() {
            return Err(DomainError::Validation("text must not be empty".into()));
        }
        Ok(())
    }

    async fn run(&self, payload: Value, _progress: ProgressReporter) -> Result<Value, WorkFailure> {
        let payload: TextPayload =
            parse(&payload).map_err(|e| WorkFailure::Failed(e.to_string()))?;
        Ok(analyze_text(&payload.text, &[]).to_json())
    }
}

#[derive(Debug, Deserialize)]
struct StoryInput {
    #[serde(default)]
    title: String,
    content: String,
    #[serde(default)]
    year: i64,
}

#[derive(Debug, Deserialize)]
struct BatchPayload {
    stories: Vec<StoryInput>,
}

/// `batch-analyze`: analyses several stories in chronological order, carrying
/// the names found so far into each later story and reporting progress per
/// story.
#[derive(Debug, Clone, Copy)]
pub struct BatchAnalysisWork {
    max_stories: usize,
}

impl BatchAnalysisWork {
    /// Accepts at most `max_stories` stories per task.
    #[must_use]
    pub fn new(max_stories: usize) -> Self {
        Self { max_stories }
    }
}

#[async_trait]
impl WorkUnit for BatchAnalysisWork {
    fn validate(&self, payload: &Value) -> Result<(), DomainError> {
        let payload: BatchPayload = parse(payload)?;
        if payload.stories.is_empty() {
            return Err(DomainError::Validation("stories must not be empty".into()));
        }
        if payload.stories.len() > self.max_stories {
            return Err(DomainError::Validation(format!(
                "at most {} stories can be analysed at once, got {}",
                self.max_stories,
                payload.stories.len()
            )));
        }
        if payload.stories.iter().any(|s| s.content.trim().is_empty()) {
            return Err(DomainError::Validation(
                "every story needs non-empty content".into(),
            ));
        }
        Ok(())
    }

    async fn run(&self, payload: Value, progress: ProgressReporter) -> Result<Value, WorkFailure> {
        let mut payload: BatchPayload =
            parse(&payload).map_err(|e| WorkFailure::Failed(e.to_string()))?;
        payload.stories.sort_by_key(|s| s.year);

        let total = u32::try_from(payload.stories.len()).unwrap_or(u32::MAX);
        let mut known: Vec<String> = Vec::new();
        let mut analyzed = Vec::with_capacity(payload.stories.len());

        for (step, story) in (0..total).zip(&payload.stories) {
            progress
                .report(TaskProgress {
                    progress: step,
                    total,
                    current: Some(story.title.clone()),
                })
                .await
                .map_err(|e| WorkFailure::Failed(format!("could not report progress: {e}")))?;

            let analysis = analyze_text(&story.content, &known);
            debug!(title = %story.title, found = analysis.characters.len(), "story analysed");
            for name in &analysis.characters {
                if !known.contains(name) {
                    known.push(name.clone());
                }
            }
            analyzed.push(json!({
                "title": story.title,
                "characters": analysis.characters,
                "words": analysis.words,
                "sentences": analysis.sentences,
            }));
        }

        Ok(json!({
            "analyzed_stories": analyzed,
            "total_characters_found": known.len(),
            "message": format!(
                "analysed {} stories and found {} characters",
                analyzed.len(),
                known.len()
            ),
        }))
    }
}
