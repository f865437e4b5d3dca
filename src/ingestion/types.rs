use chrono::{DateTime, Utc};
use serde::Serialize;

/// One decoded unit of the wire stream.
#[derive(Clone, Debug, PartialEq)]
pub enum Envelope {
    /// Keep-alive; carries nothing.
    Heartbeat,
    Story(StoryEnvelope),
}

/// The JSON shell of a story frame, markup payload still unparsed.
#[derive(Clone, Debug, PartialEq)]
pub struct StoryEnvelope {
    pub raw_markup: String,
    pub headline_language: String,
    pub headline: String,
    pub story_date: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Story {
    pub headline: String,
    pub headline_language: String,
    pub body_text: String,
    pub body_language: String,
    /// Body came from inline markup and is already HTML.
    pub body_is_markup: bool,
}

#[derive(Serialize)]
pub struct CaptureResult { pub path: String, pub chunks: usize, pub bytes: usize }

#[derive(Serialize)]
pub struct StreamReport {
    pub source: String,
    pub feed_items: usize,
    pub totals: crate::pipeline::StreamTotals,
}
