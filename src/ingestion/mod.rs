use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::config::AppConfig;
use crate::pipeline::{Pipeline, PipelineError, StreamTotals};
use crate::publish::{FeedStore, Templates};
use crate::telemetry::{self, emit::Meta};
use crate::telemetry::ops::capture::Phase as CapturePhase;
use crate::telemetry::ops::stream::Phase as StreamPhase;
use crate::translate::{HttpTranslator, TranslationOrchestrator, Translator};

pub mod extractor;
pub mod frame;
pub mod source;
pub mod transport;
pub mod types;

use extractor::StoryExtractor;
use source::{write_record, ChunkSource, ReplayFile};
use types::{CaptureResult, StreamReport};

#[derive(Args, Debug)]
pub struct StreamCmd {
    /// Ask the server to replay recent stories (overrides STREAM_REPLAY)
    #[arg(long, default_value_t = false)] pub replay: bool,
}

#[derive(Args, Debug)]
pub struct ReplayCmd {
    /// File written by `capture`
    pub path: PathBuf,
}

#[derive(Args, Debug)]
pub struct CaptureCmd {
    pub output: PathBuf,
    /// Stop after this many bytes
    #[arg(long)] pub max_bytes: Option<usize>,
}

pub async fn run_stream(cfg: &AppConfig, args: StreamCmd) -> Result<()> {
    let t0 = Instant::now();
    let log = telemetry::stream();
    let mut stream_cfg = cfg.stream.clone();
    stream_cfg.replay |= args.replay;

    let _g = log.root_span_kv([
        ("endpoint", stream_cfg.endpoint()?.to_string()),
        ("replay", stream_cfg.replay.to_string()),
        ("verify_peer", stream_cfg.verify_peer.to_string()),
    ]).entered();
    if !stream_cfg.verify_peer {
        log.warn("⚠️ server certificate verification is disabled (set STREAM_VERIFY_PEER=true to enable)");
    }

    let mut pipeline = build_pipeline(cfg)?;
    let client = transport::build_client(&stream_cfg)?;
    let mut body = {
        let _s = log.span(&StreamPhase::Connect).entered();
        transport::connect(&client, &stream_cfg).await?
    };
    log.info(format!("🔌 connected to {}", body.describe()));

    let totals = drive(&mut pipeline, &mut body).await?;
    report(&body.describe(), &pipeline, totals, t0)
}

pub async fn run_replay(cfg: &AppConfig, args: ReplayCmd) -> Result<()> {
    let t0 = Instant::now();
    let log = telemetry::stream();
    let _g = log.root_span_kv([("path", args.path.display().to_string())]).entered();

    let mut pipeline = build_pipeline(cfg)?;
    let mut file = ReplayFile::open(&args.path).await?;
    let totals = drive(&mut pipeline, &mut file).await?;
    report(&file.describe(), &pipeline, totals, t0)
}

pub async fn run_capture(cfg: &AppConfig, args: CaptureCmd) -> Result<()> {
    let t0 = Instant::now();
    let log = telemetry::capture();
    let _g = log.root_span_kv([
        ("output", args.output.display().to_string()),
        ("max_bytes", format!("{:?}", args.max_bytes)),
    ]).entered();

    let client = transport::build_client(&cfg.stream)?;
    let mut body = {
        let _s = log.span(&CapturePhase::Connect).entered();
        transport::connect(&client, &cfg.stream).await?
    };

    let mut out = tokio::fs::File::create(&args.output)
        .await
        .with_context(|| format!("creating {}", args.output.display()))?;
    let (chunks, bytes) = {
        let _s = log.span(&CapturePhase::Write).entered();
        capture_to(&mut body, &mut out, args.max_bytes).await?
    };

    log.info(format!("💾 Captured {} bytes in {} chunks → {}", bytes, chunks, args.output.display()));
    if telemetry::config::json_mode() {
        let result = CaptureResult { path: args.output.display().to_string(), chunks, bytes };
        log.result(&result, Some(Meta { duration_ms: Some(t0.elapsed().as_millis()) }))?;
    }
    Ok(())
}

fn build_pipeline(cfg: &AppConfig) -> Result<Pipeline<HttpTranslator>> {
    let log = telemetry::stream();
    let templates = Templates::from_config(&cfg.templates);
    let store = {
        let _s = log.span_kv(&StreamPhase::Reopen, [("doc_root", cfg.feed.doc_root.display().to_string())]).entered();
        FeedStore::open(cfg.feed.clone(), templates)
            .with_context(|| format!("opening feed under {}", cfg.feed.doc_root.display()))?
    };
    log.info(format!("📂 Feed reopened with {} of at most {} items", store.len(), cfg.feed.max_items));

    let translator = HttpTranslator::new(cfg.translator.clone())?;
    let orchestrator = TranslationOrchestrator::new(translator, cfg.translate_max_bytes);
    Ok(Pipeline::new(StoryExtractor::new(), orchestrator, store))
}

/// Feed every chunk through the pipeline. A source error after connect ends the stream.
pub async fn drive<T, S>(pipeline: &mut Pipeline<T>, source: &mut S) -> Result<StreamTotals, PipelineError>
where
    T: Translator,
    S: ChunkSource + ?Sized,
{
    let log = telemetry::stream();
    loop {
        let chunk = match source.next_chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => {
                log.info("stream closed by server");
                break;
            }
            Err(e) => {
                log.warn_kv("⚠️ stream ended with error", [("error", format!("{e:#}"))]);
                break;
            }
        };
        pipeline.on_chunk(&chunk).await?;
    }
    Ok(pipeline.finish())
}

/// Record each body chunk verbatim behind a length header, optionally stopping
/// after `limit` payload bytes.
pub async fn capture_to<S, W>(source: &mut S, out: &mut W, limit: Option<usize>) -> Result<(usize, usize)>
where
    S: ChunkSource + ?Sized,
    W: AsyncWrite + Unpin,
{
    let log = telemetry::capture();
    let mut chunks = 0usize;
    let mut bytes = 0usize;
    loop {
        let chunk = match source.next_chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                log.warn_kv("⚠️ stream ended with error", [("error", format!("{e:#}"))]);
                break;
            }
        };
        let take = match limit {
            Some(max) => chunk.len().min(max - bytes),
            None => chunk.len(),
        };
        write_record(out, &chunk[..take]).await.context("writing capture")?;
        chunks += 1;
        bytes += take;
        if limit.is_some_and(|max| bytes >= max) { break; }
    }
    out.flush().await.context("flushing capture")?;
    Ok((chunks, bytes))
}

fn report<T: Translator>(source: &str, pipeline: &Pipeline<T>, totals: StreamTotals, t0: Instant) -> Result<()> {
    if telemetry::config::json_mode() {
        let result = StreamReport { source: source.to_string(), feed_items: pipeline.store().len(), totals };
        telemetry::stream().result(&result, Some(Meta { duration_ms: Some(t0.elapsed().as_millis()) }))?;
    }
    Ok(())
}
