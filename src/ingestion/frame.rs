use chrono::{NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{Deserializer, Value};
use thiserror::Error;

use super::types::{Envelope, StoryEnvelope};

pub const STORY_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

#[derive(Debug, Error)]
pub enum FrameError {
    /// Bytes that can never become JSON, no matter what follows.
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Valid JSON, but not a story shell we understand.
    #[error("unknown shell structure: {0}")]
    Schema(String),
}

#[derive(Deserialize)]
struct StoryShell {
    data: String,
    language: String,
    headline: String,
    storydate: String,
}

/// Reassembles envelopes from arbitrarily split stream chunks.
///
/// Frame boundaries are found only by a successful JSON decode of the
/// accumulated bytes; there is no length prefix or delimiter.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self { Self::default() }

    /// Append `chunk` and try to decode one envelope.
    ///
    /// `Ok(None)` means the buffered bytes are a truncated value; they are
    /// kept for the next call. On any decode (good or bad) the buffer is
    /// cleared, including trailing bytes from the same read.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Option<Envelope>, FrameError> {
        self.buf.extend_from_slice(chunk);

        let first = Deserializer::from_slice(&self.buf).into_iter::<Value>().next();
        let value = match first {
            None => return Ok(None),
            Some(Err(e)) if e.is_eof() => return Ok(None),
            Some(Err(e)) => {
                self.buf.clear();
                return Err(FrameError::Malformed(e));
            }
            Some(Ok(v)) => v,
        };
        self.buf.clear();

        decode_shell(value).map(Some)
    }

    /// Bytes of an incomplete frame currently held.
    pub fn pending(&self) -> usize { self.buf.len() }

    /// Drop a partial frame; returns how many bytes were discarded.
    pub fn reset(&mut self) -> usize {
        let n = self.buf.len();
        self.buf.clear();
        n
    }
}

fn decode_shell(value: Value) -> Result<Envelope, FrameError> {
    let Value::Object(map) = value else {
        return Err(FrameError::Schema("top-level value is not an object".to_string()));
    };
    if map.contains_key("tick") {
        return Ok(Envelope::Heartbeat);
    }

    let shell: StoryShell = serde_json::from_value(Value::Object(map))
        .map_err(|e| FrameError::Schema(e.to_string()))?;
    let naive = NaiveDateTime::parse_from_str(&shell.storydate, STORY_DATE_FORMAT)
        .map_err(|e| FrameError::Schema(format!("storydate {:?}: {}", shell.storydate, e)))?;

    Ok(Envelope::Story(StoryEnvelope {
        raw_markup: shell.data,
        headline_language: shell.language,
        headline: shell.headline,
        story_date: Utc.from_utc_datetime(&naive),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const STORY: &str = r#"{"language":"zh","headline":"新华社","storydate":"2020-01-01 00:00:00.123456","data":"<newsMessage/>"}"#;

    fn one_shot(s: &str) -> Envelope {
        FrameDecoder::new().feed(s.as_bytes()).unwrap().unwrap()
    }

    #[test]
    fn decodes_story_shell() {
        let Envelope::Story(env) = one_shot(STORY) else { panic!("expected story") };
        assert_eq!(env.headline, "新华社");
        assert_eq!(env.headline_language, "zh");
        assert_eq!(env.raw_markup, "<newsMessage/>");
        assert_eq!(env.story_date.year(), 2020);
        assert_eq!(env.story_date.nanosecond(), 123_456_000);
    }

    #[test]
    fn tick_is_heartbeat() {
        assert_eq!(one_shot(r#"{"tick": 12345}"#), Envelope::Heartbeat);
    }

    #[test]
    fn reassembles_for_every_split_size() {
        let expected = one_shot(STORY);
        let bytes = STORY.as_bytes();
        for size in 1..=bytes.len() {
            let mut dec = FrameDecoder::new();
            let mut got = Vec::new();
            for chunk in bytes.chunks(size) {
                if let Some(env) = dec.feed(chunk).unwrap() { got.push(env); }
            }
            assert_eq!(got, vec![expected.clone()], "split size {size}");
            assert_eq!(dec.pending(), 0);
        }
    }

    #[test]
    fn incomplete_keeps_buffer() {
        let mut dec = FrameDecoder::new();
        assert!(dec.feed(&STORY.as_bytes()[..10]).unwrap().is_none());
        assert_eq!(dec.pending(), 10);
        assert!(dec.feed(b"").unwrap().is_none());
        assert_eq!(dec.pending(), 10);
    }

    #[test]
    fn trailing_bytes_are_discarded() {
        let mut dec = FrameDecoder::new();
        let input = format!("{}{}", r#"{"tick":1}"#, r#"{"tick":"#);
        assert_eq!(dec.feed(input.as_bytes()).unwrap(), Some(Envelope::Heartbeat));
        assert_eq!(dec.pending(), 0);
    }

    #[test]
    fn missing_keys_is_schema_error_and_clears() {
        let mut dec = FrameDecoder::new();
        let err = dec.feed(br#"{"language":"en","headline":"x"}"#).unwrap_err();
        assert!(matches!(err, FrameError::Schema(_)));
        assert_eq!(dec.pending(), 0);
        // next frame starts fresh
        assert_eq!(dec.feed(br#"{"tick":true}"#).unwrap(), Some(Envelope::Heartbeat));
    }

    #[test]
    fn bad_storydate_is_schema_error() {
        let bad = r#"{"language":"en","headline":"x","storydate":"01/01/2020","data":""}"#;
        assert!(matches!(FrameDecoder::new().feed(bad.as_bytes()), Err(FrameError::Schema(_))));
    }

    #[test]
    fn garbage_is_malformed_and_clears() {
        let mut dec = FrameDecoder::new();
        assert!(matches!(dec.feed(b"}{ nope"), Err(FrameError::Malformed(_))));
        assert_eq!(dec.pending(), 0);
        assert!(matches!(dec.feed(b"[1,2]"), Err(FrameError::Schema(_))));
    }

    #[test]
    fn reset_discards_fragment() {
        let mut dec = FrameDecoder::new();
        dec.feed(b"{\"tick\"").unwrap();
        assert_eq!(dec.reset(), 7);
        assert_eq!(dec.pending(), 0);
    }
}
