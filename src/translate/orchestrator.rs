use tracing::warn;

use super::{Translator, TARGET_LANGUAGE};
use crate::ingestion::types::Story;

/// Outcome of translating one field of a story.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldTranslation {
    pub translated_text: String,
    pub is_translated: bool,
    pub detected_language: Option<String>,
}

impl FieldTranslation {
    fn untranslated() -> Self { Self::default() }
}

/// Per-story translation results.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StoryTranslation {
    pub headline: FieldTranslation,
    pub body: FieldTranslation,
    /// Provider calls that failed for this story.
    pub failures: usize,
}

pub struct TranslationOrchestrator<T: Translator> {
    translator: T,
    max_bytes: usize,
}

impl<T: Translator> TranslationOrchestrator<T> {
    pub fn new(translator: T, max_bytes: usize) -> Self {
        Self { translator, max_bytes }
    }

    #[cfg(test)]
    pub fn translator(&self) -> &T { &self.translator }

    pub async fn translate(&self, story: &Story) -> StoryTranslation {
        let mut failures = 0;
        let headline = self.translate_field("headline", &story.headline, &story.headline_language, &mut failures).await;
        let body = self.translate_field("body", &story.body_text, &story.body_language, &mut failures).await;
        StoryTranslation { headline, body, failures }
    }

    async fn translate_field(&self, field: &str, text: &str, language: &str, failures: &mut usize) -> FieldTranslation {
        if !needs_translation(text, language) {
            return FieldTranslation::untranslated();
        }
        let input = truncate_utf8(text, self.max_bytes);
        match self.translator.translate(input).await {
            Ok(t) => FieldTranslation {
                translated_text: t.text,
                is_translated: true,
                detected_language: t.detected_language,
            },
            Err(e) => {
                *failures += 1;
                warn!(field, language, error = %e, "translation failed; keeping original text");
                FieldTranslation::untranslated()
            }
        }
    }
}

/// Non-empty text whose language is anything other than English.
pub fn needs_translation(text: &str, language: &str) -> bool {
    !text.is_empty() && !language.trim().eq_ignore_ascii_case(TARGET_LANGUAGE)
}

/// Longest prefix of `s` that fits in `max_bytes` without splitting a character.
pub fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes { return s; }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) { end -= 1; }
    &s[..end]
}
