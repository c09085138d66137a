//! crates/book_companion_core/src/translator.rs
//!
//! Translates book content into a fixed set of target languages through the
//! completion provider, with a bounded in-process cache. Translation fails
//! open: on provider error the original text is returned unchanged.

use std::collections::BTreeMap;
use std::sync::Arc;

use moka::sync::Cache;
use tracing::warn;

use crate::domain::{ChatTurn, Produced, TranslatedChapter, TurnRole};
use crate::ports::CompletionService;

/// Cached translations, keyed by target language plus the first 100
/// characters of the source text.
///
/// The truncated key is a deliberate approximation carried over from the
/// original design: texts that agree on their first 100 characters share one
/// cached translation. It works as approximate dedup for short strings such
/// as chapter titles and repeated UI snippets.
const CACHE_KEY_PREFIX_CHARS: usize = 100;

/// Upper bound on cached entries so the cache cannot grow without limit.
const CACHE_CAPACITY: u64 = 4096;

const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("urdu", "Urdu"),
    ("spanish", "Spanish"),
    ("french", "French"),
    ("chinese", "Chinese (Simplified)"),
    ("arabic", "Arabic"),
];

pub struct ContentTranslator {
    completions: Arc<dyn CompletionService>,
    cache: Cache<(String, String), String>,
}

impl ContentTranslator {
    pub fn new(completions: Arc<dyn CompletionService>) -> Self {
        Self {
            completions,
            cache: Cache::builder().max_capacity(CACHE_CAPACITY).build(),
        }
    }

    /// Resolves a language code to its display name. Unrecognized codes pass
    /// through as-is.
    fn language_name(target_language: &str) -> &str {
        let lowered = target_language.to_lowercase();
        SUPPORTED_LANGUAGES
            .iter()
            .find(|(code, _)| *code == lowered)
            .map(|(_, name)| *name)
            .unwrap_or(target_language)
    }

    fn cache_key(target_language: &str, text: &str) -> (String, String) {
        let prefix: String = text.chars().take(CACHE_KEY_PREFIX_CHARS).collect();
        (target_language.to_string(), prefix)
    }

    /// Translates `text` into the target language.
    ///
    /// With `preserve_code` set, fenced code blocks are left in their
    /// original form and only surrounding prose and comments are translated.
    /// Degraded (failed) results are returned but never cached.
    pub async fn translate(
        &self,
        text: &str,
        target_language: &str,
        preserve_code: bool,
    ) -> Produced {
        let key = Self::cache_key(target_language, text);
        if let Some(cached) = self.cache.get(&key) {
            return Produced::Generated(cached);
        }

        let language_name = Self::language_name(target_language);
        let system_prompt = if preserve_code {
            format!(
                "You are a professional translator. Translate the following text to {language_name}.\n\
IMPORTANT: Keep any code blocks (inside ``` markers) in their original English form.\n\
Only translate the regular text and comments, not the code itself.\n\
Preserve the structure and formatting."
            )
        } else {
            format!(
                "You are a professional translator. Translate the following text to {language_name}.\n\
Preserve all formatting and structure. Only provide the translation, no explanations."
            )
        };

        let turns = vec![
            ChatTurn::new(TurnRole::System, system_prompt),
            ChatTurn::new(TurnRole::User, text),
        ];
        let max_tokens = (text.chars().count() as u32).saturating_mul(2).min(2000);

        match self.completions.complete(&turns, 0.3, max_tokens).await {
            Ok(translated) => {
                self.cache.insert(key, translated.clone());
                Produced::Generated(translated)
            }
            Err(e) => {
                warn!("translation to {target_language} failed, returning original text: {e}");
                Produced::Degraded(text.to_string())
            }
        }
    }

    /// Translates a chapter title and body as two independent calls; either
    /// half may fall back to its original while the other succeeds.
    pub async fn translate_chapter(
        &self,
        chapter_title: &str,
        chapter_content: &str,
        target_language: &str,
    ) -> TranslatedChapter {
        let translated_title = self.translate(chapter_title, target_language, true).await;
        let translated_content = self.translate(chapter_content, target_language, true).await;

        TranslatedChapter {
            original_title: chapter_title.to_string(),
            translated_title: translated_title.into_text(),
            original_content: chapter_content.to_string(),
            translated_content: translated_content.into_text(),
            target_language: target_language.to_string(),
        }
    }

    /// Like `translate`, but prepends free-text context to the request and
    /// bypasses the cache. The prompt emphasizes terminology consistency.
    pub async fn translate_with_context(
        &self,
        text: &str,
        context: &str,
        target_language: &str,
    ) -> Produced {
        let language_name = Self::language_name(target_language);
        let system_prompt = format!(
            "You are a professional translator specializing in technical and educational content.\n\
Translate to {language_name}. \n\
Keep technical terms and code consistent.\n\
Preserve formatting and structure."
        );

        let turns = vec![
            ChatTurn::new(TurnRole::System, system_prompt),
            ChatTurn::new(
                TurnRole::User,
                format!("Context: {context}\n\nText to translate:\n{text}"),
            ),
        ];

        match self.completions.complete(&turns, 0.3, 2000).await {
            Ok(translated) => Produced::Generated(translated),
            Err(e) => {
                warn!("contextual translation to {target_language} failed: {e}");
                Produced::Degraded(text.to_string())
            }
        }
    }

    /// Requests translations for a set of technical terms in one completion,
    /// expecting a JSON object mapping each term to its translation.
    ///
    /// Falls back to an identity mapping when the provider fails or the
    /// response is not parseable JSON.
    pub async fn get_glossary(
        &self,
        terms: &[String],
        target_language: &str,
    ) -> BTreeMap<String, String> {
        let language_name = Self::language_name(target_language);
        let terms_list = terms
            .iter()
            .map(|t| format!("- {t}"))
            .collect::<Vec<_>>()
            .join("\n");

        let turns = vec![
            ChatTurn::new(
                TurnRole::System,
                format!(
                    "You are a technical translator. Provide {language_name} translations for technical terms.\n\
Format your response as JSON with term as key and translation as value."
                ),
            ),
            ChatTurn::new(
                TurnRole::User,
                format!("Translate these technical terms to {language_name}:\n{terms_list}"),
            ),
        ];

        let identity = || {
            terms
                .iter()
                .map(|t| (t.clone(), t.clone()))
                .collect::<BTreeMap<_, _>>()
        };

        match self.completions.complete(&turns, 0.2, 1000).await {
            Ok(response) => match parse_glossary(&response) {
                Some(glossary) => glossary,
                None => {
                    warn!("glossary response was not valid JSON, returning terms unchanged");
                    identity()
                }
            },
            Err(e) => {
                warn!("glossary generation failed: {e}");
                identity()
            }
        }
    }

    /// Translates each text independently and sequentially. There is no
    /// partial-failure aggregation; each element fails open on its own.
    pub async fn batch_translate(&self, texts: &[String], target_language: &str) -> Vec<Produced> {
        let mut translated = Vec::with_capacity(texts.len());
        for text in texts {
            translated.push(self.translate(text, target_language, true).await);
        }
        translated
    }
}

/// Parses a JSON object of string-to-string pairs, tolerating a fenced
/// ```json code block around it.
fn parse_glossary(response: &str) -> Option<BTreeMap<String, String>> {
    let trimmed = response.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let object = value.as_object()?;
    Some(
        object
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{PortError, PortResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replies with a numbered translation per call, or fails every call.
    struct CountingCompleter {
        calls: AtomicUsize,
        fail: bool,
        last_user_content: Mutex<String>,
        canned: Option<String>,
    }

    impl CountingCompleter {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
                last_user_content: Mutex::new(String::new()),
                canned: None,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }

        fn canned(reply: &str) -> Self {
            Self {
                canned: Some(reply.to_string()),
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl CompletionService for CountingCompleter {
        async fn complete(
            &self,
            turns: &[ChatTurn],
            _temperature: f32,
            _max_tokens: u32,
        ) -> PortResult<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PortError::Provider("completion unavailable".into()));
            }
            if let Some(last) = turns.last() {
                *self.last_user_content.lock().unwrap() = last.content.clone();
            }
            Ok(self
                .canned
                .clone()
                .unwrap_or_else(|| format!("translation #{n}")))
        }
    }

    #[tokio::test]
    async fn cache_key_is_truncated_to_100_chars() {
        let completer = Arc::new(CountingCompleter::new());
        let translator = ContentTranslator::new(completer.clone());

        let first = format!("{}A", "X".repeat(150));
        let second = format!("{}B", "X".repeat(150));

        let a = translator.translate(&first, "urdu", true).await;
        let b = translator.translate(&second, "urdu", true).await;

        // The second text differs only after character 100, so it hits the
        // cache entry populated by the first.
        assert_eq!(a, b);
        assert_eq!(completer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_languages_do_not_share_cache_entries() {
        let completer = Arc::new(CountingCompleter::new());
        let translator = ContentTranslator::new(completer.clone());

        translator.translate("hello", "urdu", true).await;
        translator.translate("hello", "french", true).await;

        assert_eq!(completer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn provider_failure_fails_open_and_is_not_cached() {
        let translator = ContentTranslator::new(Arc::new(CountingCompleter::failing()));

        let result = translator.translate("bonjour", "spanish", false).await;
        assert_eq!(result, Produced::Degraded("bonjour".into()));

        // A degraded result must not poison the cache.
        let again = translator.translate("bonjour", "spanish", false).await;
        assert!(again.is_degraded());
    }

    #[tokio::test]
    async fn unknown_language_code_passes_through() {
        let completer = Arc::new(CountingCompleter::new());
        let translator = ContentTranslator::new(completer.clone());

        translator.translate("text", "klingon", false).await;

        // The raw code appears in the prompt via the final user message's
        // system sibling; check through indirection is not possible here, so
        // assert on the resolver directly.
        assert_eq!(ContentTranslator::language_name("klingon"), "klingon");
        assert_eq!(
            ContentTranslator::language_name("Chinese"),
            "Chinese (Simplified)"
        );
    }

    #[tokio::test]
    async fn chapter_translates_title_and_content_independently() {
        let completer = Arc::new(CountingCompleter::new());
        let translator = ContentTranslator::new(completer.clone());

        let chapter = translator
            .translate_chapter("Title", "Content body", "arabic")
            .await;

        assert_eq!(chapter.original_title, "Title");
        assert_eq!(chapter.translated_title, "translation #0");
        assert_eq!(chapter.translated_content, "translation #1");
        assert_eq!(chapter.target_language, "arabic");
    }

    #[tokio::test]
    async fn glossary_parses_json_object() {
        let translator = ContentTranslator::new(Arc::new(CountingCompleter::canned(
            r#"{"cpu": "processeur", "memory": "mémoire"}"#,
        )));

        let glossary = translator
            .get_glossary(&["cpu".into(), "memory".into()], "french")
            .await;

        assert_eq!(glossary["cpu"], "processeur");
        assert_eq!(glossary["memory"], "mémoire");
    }

    #[tokio::test]
    async fn glossary_tolerates_fenced_json() {
        let translator = ContentTranslator::new(Arc::new(CountingCompleter::canned(
            "```json\n{\"cpu\": \"processeur\"}\n```",
        )));

        let glossary = translator.get_glossary(&["cpu".into()], "french").await;
        assert_eq!(glossary["cpu"], "processeur");
    }

    #[tokio::test]
    async fn glossary_identity_fallback_on_unstructured_reply() {
        let translator = ContentTranslator::new(Arc::new(CountingCompleter::canned(
            "Here are your translations: foo means bar",
        )));

        let glossary = translator
            .get_glossary(&["foo".into(), "bar".into()], "urdu")
            .await;

        assert_eq!(glossary["foo"], "foo");
        assert_eq!(glossary["bar"], "bar");
    }

    #[tokio::test]
    async fn glossary_identity_fallback_on_provider_failure() {
        let translator = ContentTranslator::new(Arc::new(CountingCompleter::failing()));

        let glossary = translator.get_glossary(&["foo".into()], "urdu").await;
        assert_eq!(glossary["foo"], "foo");
    }

    #[tokio::test]
    async fn batch_translate_handles_each_element_independently() {
        let completer = Arc::new(CountingCompleter::new());
        let translator = ContentTranslator::new(completer.clone());

        let results = translator
            .batch_translate(&["one".into(), "two".into()], "urdu")
            .await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.is_degraded()));
        assert_ne!(results[0], results[1]);
    }

    #[tokio::test]
    async fn contextual_translation_includes_context_block() {
        let completer = Arc::new(CountingCompleter::new());
        let translator = ContentTranslator::new(completer.clone());

        translator
            .translate_with_context("the text", "a chapter about CPUs", "urdu")
            .await;

        let seen = completer.last_user_content.lock().unwrap();
        assert!(seen.contains("Context: a chapter about CPUs"));
        assert!(seen.contains("Text to translate:\nthe text"));
    }
}
