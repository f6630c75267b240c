//! Request and artifact value types exchanged with UI collaborators.
//!
//! A collaborator hands the pipeline a `(topic, GameSettings)` pair and gets
//! back a [`MiniGame`]. Internally the pair is frozen into a
//! [`GenerationRequest`] once per generation attempt; the raw topic the user
//! typed is kept verbatim so it can be echoed back unchanged, and any
//! enrichment happens only when the prompt is rendered.

use serde::{Deserialize, Serialize};

/// Requested difficulty of the generated game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// The lowercase identifier interpolated into prompts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// Primary language of the generated game copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Vi,
}

impl Language {
    /// Human-readable language name used in the prompt.
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Vi => "Vietnamese",
        }
    }
}

/// Settings a UI collaborator supplies alongside a topic.
///
/// `question_count` and `time_per_question` are optional knobs that only some
/// game shapes care about; when absent they are simply omitted from the
/// prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSettings {
    pub difficulty: Difficulty,
    pub category: String,
    pub language: Language,
    pub use_canvas: bool,
    pub question_count: Option<u32>,
    pub time_per_question: Option<u32>,
}

impl Default for GameSettings {
    fn default() -> Self {
        GameSettings {
            difficulty: Difficulty::Medium,
            category: "general".to_string(),
            language: Language::En,
            use_canvas: true,
            question_count: None,
            time_per_question: None,
        }
    }
}

/// One frozen generation attempt.
///
/// Constructed once per [`generate`](crate::GameGenerator::generate) call and
/// never mutated afterwards. `topic` is the user's input verbatim.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub topic: String,
    pub use_canvas: bool,
    pub language: Language,
    pub difficulty: Difficulty,
    pub category: String,
    pub question_count: Option<u32>,
    pub time_per_question: Option<u32>,
}

impl GenerationRequest {
    /// Freeze a `(topic, settings)` pair into a request.
    pub fn new(topic: &str, settings: &GameSettings) -> Self {
        GenerationRequest {
            topic: topic.to_string(),
            use_canvas: settings.use_canvas,
            language: settings.language,
            difficulty: settings.difficulty,
            category: settings.category.clone(),
            question_count: settings.question_count,
            time_per_question: settings.time_per_question,
        }
    }
}

/// The artifact returned by the pipeline: a self-contained HTML document and
/// the title extracted from (or synthesized for) it.
///
/// Treated as immutable once produced; the sandbox host only re-reads
/// `content` on retry, it never rewrites it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiniGame {
    pub title: String,
    /// A complete HTML document (doctype, head, body, inline style/script).
    pub content: String,
    pub use_canvas: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_keeps_topic_verbatim() {
        let settings = GameSettings::default();
        let request = GenerationRequest::new("  xếp hình  ", &settings);
        assert_eq!(request.topic, "  xếp hình  ");
    }

    #[test]
    fn default_settings_are_canvas_medium_english() {
        let settings = GameSettings::default();
        assert!(settings.use_canvas);
        assert_eq!(settings.difficulty.as_str(), "medium");
        assert_eq!(settings.language.display_name(), "English");
    }
}
