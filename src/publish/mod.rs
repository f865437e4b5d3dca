use chrono::{DateTime, Utc};
use quick_xml::escape::escape;

use crate::ingestion::types::Story;
use crate::translate::orchestrator::StoryTranslation;

pub mod store;
pub mod template;
pub mod types;
pub mod variant;

pub use store::{FeedStore, StoreError};
pub use template::{Templates, DISPLAY_DATE_FORMAT};
pub use types::{ItemDraft, PublishedItem};
pub use variant::Variant;

/// Pick the variant for a translated story and lay out its template values.
///
/// Feed title and description prefer the English translation when one exists.
/// They stay plain text for the manifest writer; page fields are HTML-escaped
/// unless the body arrived as inline markup.
pub fn compose(story: &Story, tr: &StoryTranslation, date: DateTime<Utc>) -> ItemDraft {
    let variant = Variant::select(tr.headline.is_translated, tr.body.is_translated);

    let title = if tr.headline.is_translated { &tr.headline.translated_text } else { &story.headline };
    let description = if tr.body.is_translated { &tr.body.translated_text } else { &story.body_text };

    let html = |s: &str| escape(s).into_owned();
    let when = date.format(DISPLAY_DATE_FORMAT).to_string();
    let headline = html(&story.headline);
    let body = if story.body_is_markup { story.body_text.clone() } else { html(&story.body_text) };
    let en_headline = html(&tr.headline.translated_text);
    let en_body = html(&tr.body.translated_text);

    let fields = match variant {
        Variant::EnOnly => vec![headline, when, body],
        Variant::CnOnly => vec![headline, en_headline, when, body, en_body],
        Variant::EnhCnb => vec![headline, when, body, en_body],
        Variant::CnhEnb => vec![headline, en_headline, when, body],
    };

    ItemDraft { date, variant, title: title.clone(), description: description.clone(), fields }
}
