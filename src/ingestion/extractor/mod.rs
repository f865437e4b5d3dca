use thiserror::Error;
use tracing::warn;

use super::types::{Story, StoryEnvelope};

pub mod newsml;

pub use newsml::Representation;

/// Strategies in evaluation order. Every strategy runs; when more than one
/// finds a body, the later one overwrites the earlier (inline data beats
/// inline markup).
pub const EXTRACTION_ORDER: [Representation; 2] = [Representation::InlineXml, Representation::InlineData];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no story body found")]
    NoStoryBody,
}

#[derive(Clone, Debug)]
pub struct StoryExtractor {
    order: Vec<Representation>,
}

impl Default for StoryExtractor {
    fn default() -> Self { Self { order: EXTRACTION_ORDER.to_vec() } }
}

impl StoryExtractor {
    pub fn new() -> Self { Self::default() }

    /// Build with a custom strategy order; the last strategy that yields a body wins.
    #[cfg(test)]
    pub fn with_order(order: Vec<Representation>) -> Self { Self { order } }

    pub fn extract(&self, env: &StoryEnvelope) -> Result<Story, ExtractError> {
        let content = match newsml::parse_content_set(&env.raw_markup) {
            Ok(set) => set,
            Err(e) => {
                warn!(error = %e, "story markup failed to parse");
                newsml::ContentSet::default()
            }
        };

        let mut body: Option<(String, String, bool)> = None;
        for repr in &self.order {
            if let Some(found) = pick(&content, *repr, &env.headline_language) {
                body = Some(found);
            }
        }
        let (body_text, body_language, body_is_markup) =
            body.unwrap_or_else(|| (String::new(), env.headline_language.clone(), false));

        if body_text.is_empty() && env.headline.trim().is_empty() {
            return Err(ExtractError::NoStoryBody);
        }

        Ok(Story {
            headline: env.headline.clone(),
            headline_language: env.headline_language.clone(),
            body_text,
            body_language,
            body_is_markup,
        })
    }
}

fn pick(content: &newsml::ContentSet, repr: Representation, fallback_language: &str) -> Option<(String, String, bool)> {
    let node = content.get(repr)?;
    if node.text.is_empty() { return None; }
    let lang = node.lang.clone().unwrap_or_else(|| fallback_language.to_string());
    Some((node.text.clone(), lang, repr == Representation::InlineXml))
}
