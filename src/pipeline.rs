use serde::Serialize;
use thiserror::Error;
use tracing::Instrument;

use crate::ingestion::extractor::StoryExtractor;
use crate::ingestion::frame::{FrameDecoder, FrameError};
use crate::ingestion::types::Envelope;
use crate::publish::{self, FeedStore, PublishedItem, StoreError};
use crate::telemetry::{self, ctx::LogCtx, ops::stream::{Phase as StreamPhase, Stream}};
use crate::translate::{TranslationOrchestrator, Translator};

/// Only store failures stop the pipeline; everything else drops one envelope.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    MalformedFrame,
    UnknownShell,
    NoStoryBody,
}

#[derive(Debug, PartialEq)]
pub enum Outcome {
    Incomplete,
    Heartbeat,
    Dropped(DropReason),
    Published(PublishedItem),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StreamTotals {
    pub chunks: usize,
    pub heartbeats: usize,
    pub published: usize,
    pub dropped: usize,
    pub translation_failures: usize,
}

/// Decode → extract → translate → select variant → publish, one chunk at a time.
pub struct Pipeline<T: Translator> {
    decoder: FrameDecoder,
    extractor: StoryExtractor,
    orchestrator: TranslationOrchestrator<T>,
    store: FeedStore,
    totals: StreamTotals,
    log: LogCtx<Stream>,
}

impl<T: Translator> Pipeline<T> {
    pub fn new(extractor: StoryExtractor, orchestrator: TranslationOrchestrator<T>, store: FeedStore) -> Self {
        Self {
            decoder: FrameDecoder::new(),
            extractor,
            orchestrator,
            store,
            totals: StreamTotals::default(),
            log: telemetry::stream(),
        }
    }

    pub fn totals(&self) -> &StreamTotals { &self.totals }

    pub fn store(&self) -> &FeedStore { &self.store }

    /// Process one chunk to completion before the caller reads the next.
    pub async fn on_chunk(&mut self, chunk: &[u8]) -> Result<Outcome, PipelineError> {
        self.totals.chunks += 1;

        let decoded = {
            let _s = self.log.span(&StreamPhase::Decode).entered();
            self.decoder.feed(chunk)
        };
        let env = match decoded {
            Ok(None) => {
                self.log.debug(format!("frame incomplete, {} bytes buffered", self.decoder.pending()));
                return Ok(Outcome::Incomplete);
            }
            Ok(Some(Envelope::Heartbeat)) => {
                self.totals.heartbeats += 1;
                self.log.debug("heartbeat");
                return Ok(Outcome::Heartbeat);
            }
            Ok(Some(Envelope::Story(env))) => env,
            Err(e) => {
                let reason = match e {
                    FrameError::Malformed(_) => DropReason::MalformedFrame,
                    FrameError::Schema(_) => DropReason::UnknownShell,
                };
                self.log.warn_kv("⚠️ frame dropped", [("error", e.to_string())]);
                return Ok(self.drop_envelope(reason));
            }
        };

        let story = {
            let _s = self.log.span(&StreamPhase::Extract).entered();
            self.extractor.extract(&env)
        };
        let story = match story {
            Ok(s) => s,
            Err(e) => {
                self.log.warn_kv(&format!("⚠️ {e}"), [("headline", env.headline.clone())]);
                return Ok(self.drop_envelope(DropReason::NoStoryBody));
            }
        };

        let span = self.log.span_kv(&StreamPhase::Translate, [
            ("headline_language", story.headline_language.clone()),
            ("body_language", story.body_language.clone()),
        ]);
        let tr = self.orchestrator.translate(&story).instrument(span).await;
        self.totals.translation_failures += tr.failures;

        let draft = publish::compose(&story, &tr, env.story_date);
        let item = {
            let _s = self.log.span(&StreamPhase::Publish).entered();
            self.store.append(draft)?
        };
        self.totals.published += 1;
        self.log.published(&item.id, item.variant.code(), &item.title);
        Ok(Outcome::Published(item))
    }

    /// End of stream: any partial frame is discarded.
    pub fn finish(&mut self) -> StreamTotals {
        let discarded = self.decoder.reset();
        if discarded > 0 {
            self.log.debug(format!("discarding {discarded} bytes of an unfinished frame"));
        }
        self.log.totals(&self.totals);
        self.totals.clone()
    }

    fn drop_envelope(&mut self, reason: DropReason) -> Outcome {
        self.totals.dropped += 1;
        Outcome::Dropped(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedConfig;
    use crate::publish::{Templates, Variant};
    use crate::translate::{MockTranslator, TranslateError};
    use std::fs;
    use tempfile::TempDir;

    fn pipeline(dir: &TempDir, max_items: usize, mock: MockTranslator) -> Pipeline<MockTranslator> {
        let cfg = FeedConfig {
            doc_root: dir.path().to_path_buf(),
            url_root: "http://feeds.test/rss/".into(),
            feed_file: "feed.xml".into(),
            title: "Test".into(),
            description: "Test".into(),
            max_items,
        };
        let store = FeedStore::open(cfg, Templates::default()).unwrap();
        Pipeline::new(StoryExtractor::new(), TranslationOrchestrator::new(mock, 5000), store)
    }

    fn frame(lang: &str, headline: &str, body_lang: &str, body: &str) -> String {
        let markup = format!(
            r#"<newsMessage><itemSet><newsItem><contentSet><inlineData xml:lang="{body_lang}"><![CDATA[{body}]]></inlineData></contentSet></newsItem></itemSet></newsMessage>"#
        );
        serde_json::json!({
            "language": lang,
            "headline": headline,
            "storydate": "2020-01-01 00:00:00.000000",
            "data": markup,
        })
        .to_string()
    }

    #[tokio::test]
    async fn chinese_story_is_published_as_cn_only() {
        let dir = TempDir::new().unwrap();
        let mock = MockTranslator::new();
        mock.push_ok("Xinhua News Agency", "zh");
        mock.push_ok("Hello", "zh");
        let mut p = pipeline(&dir, 100, mock);

        let input = frame("zh", "新华社", "zh", "你好");
        let bytes = input.as_bytes();
        let (head, tail) = bytes.split_at(bytes.len() / 2);
        assert_eq!(p.on_chunk(head).await.unwrap(), Outcome::Incomplete);
        let Outcome::Published(item) = p.on_chunk(tail).await.unwrap() else { panic!("expected publish") };

        assert_eq!(item.variant, Variant::CnOnly);
        assert_eq!(item.title, "Xinhua News Agency");
        assert_eq!(item.description, "Hello");
        assert_eq!(p.store().len(), 1);
        let page = fs::read_to_string(item.rendered_path(dir.path())).unwrap();
        assert!(page.contains("新华社"));
        assert!(page.contains("2020-01-01 00:00:00"));
        assert!(page.contains("你好"));
        assert!(page.contains("Hello"));
    }

    #[tokio::test]
    async fn english_story_skips_translation() {
        let dir = TempDir::new().unwrap();
        let mut p = pipeline(&dir, 100, MockTranslator::new());
        let out = p.on_chunk(frame("en", "Markets", "en", "Stocks rose.").as_bytes()).await.unwrap();
        let Outcome::Published(item) = out else { panic!("expected publish") };
        assert_eq!(item.variant, Variant::EnOnly);
        assert_eq!(item.description, "Stocks rose.");
    }

    #[tokio::test]
    async fn translation_failure_degrades_variant() {
        let dir = TempDir::new().unwrap();
        let mock = MockTranslator::new();
        mock.push_ok("Headline", "zh");
        mock.push_response(Err(TranslateError::Timeout));
        let mut p = pipeline(&dir, 100, mock);

        let out = p.on_chunk(frame("zh", "标题", "zh", "正文").as_bytes()).await.unwrap();
        let Outcome::Published(item) = out else { panic!("expected publish") };
        assert_eq!(item.variant, Variant::CnhEnb);
        assert_eq!(p.totals().translation_failures, 1);
    }

    #[tokio::test]
    async fn bad_frames_are_dropped_and_stream_continues() {
        let dir = TempDir::new().unwrap();
        let mut p = pipeline(&dir, 100, MockTranslator::new());

        assert_eq!(p.on_chunk(br#"{"headline":"x"}"#).await.unwrap(), Outcome::Dropped(DropReason::UnknownShell));
        assert_eq!(p.on_chunk(b"]]garbage").await.unwrap(), Outcome::Dropped(DropReason::MalformedFrame));
        assert_eq!(p.on_chunk(br#"{"tick":1}"#).await.unwrap(), Outcome::Heartbeat);

        let empty = serde_json::json!({
            "language": "en", "headline": "", "storydate": "2020-01-01 00:00:00.0", "data": "<newsMessage/>"
        });
        assert_eq!(p.on_chunk(empty.to_string().as_bytes()).await.unwrap(), Outcome::Dropped(DropReason::NoStoryBody));

        let out = p.on_chunk(frame("en", "After", "en", "still works").as_bytes()).await.unwrap();
        assert!(matches!(out, Outcome::Published(_)));

        let totals = p.finish();
        assert_eq!(totals, StreamTotals { chunks: 5, heartbeats: 1, published: 1, dropped: 3, translation_failures: 0 });
        assert_eq!(p.store().len(), 1);
    }

    #[tokio::test]
    async fn feed_stays_bounded_across_many_stories() {
        let dir = TempDir::new().unwrap();
        let mut p = pipeline(&dir, 2, MockTranslator::new());
        for n in 0..5 {
            p.on_chunk(frame("en", &format!("story {n}"), "en", "text").as_bytes()).await.unwrap();
        }
        let titles: Vec<&str> = p.store().items().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["story 4", "story 3"]);
    }

    #[tokio::test]
    async fn finish_discards_partial_frame() {
        let dir = TempDir::new().unwrap();
        let mut p = pipeline(&dir, 2, MockTranslator::new());
        assert_eq!(p.on_chunk(br#"{"language":"en","#).await.unwrap(), Outcome::Incomplete);
        let totals = p.finish();
        assert_eq!(totals.chunks, 1);
        assert_eq!(totals.published, 0);
        assert!(p.store().is_empty());
    }
}
