//! crates/book_companion_core/src/personalizer.rs
//!
//! Rewrites book content for one reader's experience level, known languages,
//! and interests. Personalization fails open: if the provider errors, the
//! original content is returned unchanged and the degradation is logged.

use std::sync::Arc;

use tracing::warn;

use crate::domain::{ChatTurn, JsonMap, PersonalizedChapter, Produced, TurnRole};
use crate::ports::CompletionService;

/// The three recognized experience levels from the signup questionnaire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl ExperienceLevel {
    fn parse(value: Option<&str>) -> Option<Self> {
        match value? {
            "beginner" => Some(Self::Beginner),
            "intermediate" => Some(Self::Intermediate),
            "advanced" => Some(Self::Advanced),
            _ => None,
        }
    }

    fn display_phrase(self) -> &'static str {
        match self {
            Self::Beginner => "Beginner (just starting out or learning)",
            Self::Intermediate => "Intermediate (have practical experience)",
            Self::Advanced => "Expert level (deep knowledge)",
        }
    }

    fn difficulty_hint(self) -> &'static str {
        match self {
            Self::Beginner => {
                "\u{1F4DA} This section is explained for beginners. Don't worry if some concepts are new!"
            }
            Self::Intermediate => {
                "\u{2699}\u{FE0F} This section assumes some development experience. Try to connect with your existing knowledge."
            }
            Self::Advanced => {
                "\u{1F680} This section covers advanced concepts and optimizations. Feel free to dive deep!"
            }
        }
    }
}

pub struct ContentPersonalizer {
    completions: Arc<dyn CompletionService>,
}

impl ContentPersonalizer {
    pub fn new(completions: Arc<dyn CompletionService>) -> Self {
        Self { completions }
    }

    /// Personalizes `content` for the given background.
    ///
    /// Returns `Produced::Degraded(content)` when the provider call fails.
    pub async fn personalize_content(
        &self,
        content: &str,
        background: &JsonMap,
        include_examples: bool,
    ) -> Produced {
        let system_prompt = personalization_prompt(background);

        let example_request = if include_examples {
            let languages = string_list(background, "programmingLanguages");
            let languages = if languages.is_empty() {
                "Python".to_string()
            } else {
                languages.join(", ")
            };
            format!(
                "\nAlso provide a practical example using one of these programming languages they know:\n{languages}\n"
            )
        } else {
            String::new()
        };

        let turns = vec![
            ChatTurn::new(TurnRole::System, system_prompt),
            ChatTurn::new(
                TurnRole::User,
                format!("Please personalize this content:\n\n{content}{example_request}"),
            ),
        ];

        match self.completions.complete(&turns, 0.7, 2000).await {
            Ok(text) => Produced::Generated(text),
            Err(e) => {
                warn!("personalization failed, returning original content: {e}");
                Produced::Degraded(content.to_string())
            }
        }
    }

    /// A fixed encouragement line matching the reader's experience level.
    /// Unrecognized levels get the beginner hint.
    pub fn difficulty_hint(&self, background: &JsonMap) -> &'static str {
        ExperienceLevel::parse(string_field(background, "softwareExperience"))
            .unwrap_or(ExperienceLevel::Beginner)
            .difficulty_hint()
    }

    pub async fn create_personalized_chapter(
        &self,
        chapter_content: &str,
        background: &JsonMap,
    ) -> PersonalizedChapter {
        let personalized = self
            .personalize_content(chapter_content, background, true)
            .await;

        PersonalizedChapter {
            original_content: chapter_content.to_string(),
            personalized_content: personalized.into_text(),
            difficulty_hint: self.difficulty_hint(background).to_string(),
            user_background: background.clone(),
        }
    }
}

/// A missing level defaults to the full beginner phrase; a present but
/// unrecognized value falls back to the bare word.
fn experience_phrase(background: &JsonMap, key: &str) -> &'static str {
    match string_field(background, key) {
        None => ExperienceLevel::Beginner.display_phrase(),
        Some(value) => ExperienceLevel::parse(Some(value))
            .map(ExperienceLevel::display_phrase)
            .unwrap_or("Beginner"),
    }
}

fn personalization_prompt(background: &JsonMap) -> String {
    let software = experience_phrase(background, "softwareExperience");
    let hardware = experience_phrase(background, "hardwareKnowledge");

    let languages = string_list(background, "programmingLanguages");
    let languages = if languages.is_empty() {
        "multiple languages".to_string()
    } else {
        languages.join(", ")
    };
    let interests = string_list(background, "interests");
    let interests = if interests.is_empty() {
        "general software".to_string()
    } else {
        interests.join(", ")
    };

    format!(
        "You are helping a developer with the following background:\n\
- Software Development Experience: {software}\n\
- Hardware/Systems Knowledge: {hardware}\n\
- Programming Languages Known: {languages}\n\
- Interest Areas: {interests}\n\
\n\
Tailor the following content to match their level and interests. \n\
- For beginners: provide more explanations and real-world analogies\n\
- For intermediate: focus on practical applications\n\
- For advanced: include optimization and advanced patterns\n\
- Focus on examples in languages they know\n"
    )
}

fn string_field<'a>(map: &'a JsonMap, key: &str) -> Option<&'a str> {
    map.get(key).and_then(|v| v.as_str())
}

fn string_list(map: &JsonMap, key: &str) -> Vec<String> {
    map.get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{PortError, PortResult};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct StubCompleter {
        reply: Option<String>,
        turns_seen: Mutex<Vec<ChatTurn>>,
    }

    impl StubCompleter {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
                turns_seen: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: None,
                turns_seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionService for StubCompleter {
        async fn complete(
            &self,
            turns: &[ChatTurn],
            _temperature: f32,
            _max_tokens: u32,
        ) -> PortResult<String> {
            *self.turns_seen.lock().unwrap() = turns.to_vec();
            self.reply
                .clone()
                .ok_or_else(|| PortError::Provider("completion unavailable".into()))
        }
    }

    fn background(level: &str) -> JsonMap {
        let value = json!({
            "softwareExperience": level,
            "hardwareKnowledge": "intermediate",
            "programmingLanguages": ["Rust", "C"],
            "interests": ["embedded"],
        });
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn prompt_reflects_background() {
        let completer = Arc::new(StubCompleter::replying("tailored"));
        let personalizer = ContentPersonalizer::new(completer.clone());

        let result = personalizer
            .personalize_content("some chapter", &background("advanced"), true)
            .await;

        assert_eq!(result, Produced::Generated("tailored".into()));
        let turns = completer.turns_seen.lock().unwrap();
        assert!(turns[0].content.contains("Expert level (deep knowledge)"));
        assert!(turns[0].content.contains("Rust, C"));
        assert!(turns[0].content.contains("embedded"));
        assert!(turns[1].content.contains("Rust, C"));
    }

    #[tokio::test]
    async fn empty_background_uses_defaults() {
        let completer = Arc::new(StubCompleter::replying("ok"));
        let personalizer = ContentPersonalizer::new(completer.clone());

        personalizer
            .personalize_content("text", &JsonMap::new(), true)
            .await;

        let turns = completer.turns_seen.lock().unwrap();
        assert!(turns[0].content.contains("multiple languages"));
        assert!(turns[0].content.contains("general software"));
        assert!(turns[1].content.contains("Python"));
    }

    #[tokio::test]
    async fn missing_levels_default_to_full_beginner_phrase() {
        let completer = Arc::new(StubCompleter::replying("ok"));
        let personalizer = ContentPersonalizer::new(completer.clone());

        personalizer
            .personalize_content("text", &JsonMap::new(), false)
            .await;

        let turns = completer.turns_seen.lock().unwrap();
        assert!(turns[0].content.contains(
            "- Software Development Experience: Beginner (just starting out or learning)\n"
        ));
        assert!(turns[0]
            .content
            .contains("- Hardware/Systems Knowledge: Beginner (just starting out or learning)\n"));
    }

    #[tokio::test]
    async fn unrecognized_level_uses_bare_word() {
        let completer = Arc::new(StubCompleter::replying("ok"));
        let personalizer = ContentPersonalizer::new(completer.clone());

        personalizer
            .personalize_content("text", &background("wizard"), false)
            .await;

        let turns = completer.turns_seen.lock().unwrap();
        assert!(turns[0]
            .content
            .contains("- Software Development Experience: Beginner\n"));
    }

    #[tokio::test]
    async fn provider_failure_fails_open() {
        let personalizer = ContentPersonalizer::new(Arc::new(StubCompleter::failing()));

        let result = personalizer
            .personalize_content("original text", &JsonMap::new(), false)
            .await;

        assert_eq!(result, Produced::Degraded("original text".into()));
        assert!(result.is_degraded());
    }

    #[tokio::test]
    async fn chapter_includes_hint_and_background() {
        let personalizer = ContentPersonalizer::new(Arc::new(StubCompleter::replying("rewritten")));
        let bg = background("intermediate");

        let chapter = personalizer
            .create_personalized_chapter("chapter body", &bg)
            .await;

        assert_eq!(chapter.original_content, "chapter body");
        assert_eq!(chapter.personalized_content, "rewritten");
        assert!(chapter.difficulty_hint.contains("development experience"));
        assert_eq!(chapter.user_background, bg);
    }

    #[test]
    fn unknown_level_falls_back_to_beginner_hint() {
        let personalizer = ContentPersonalizer::new(Arc::new(StubCompleter::failing()));
        let bg = background("wizard");
        assert!(personalizer.difficulty_hint(&bg).contains("beginners"));
    }
}
