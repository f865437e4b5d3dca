use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;

use crate::config::FeedConfig;
use crate::telemetry::{self};
use crate::telemetry::ops::purge::Phase as PurgePhase;
use crate::util::time::parse_cutoff_str;

#[derive(Args, Debug)]
pub struct PurgeCmd {
    #[arg(long, default_value_t = false)] pub apply: bool,
    /// Age window: "5d", "12h", a date, or an RFC3339 timestamp
    #[arg(long, default_value = "5d")] pub older_than: String,
    #[arg(long, default_value_t = 10)] pub plan_limit: usize,
}

/// A regular file under the document root old enough to delete.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Candidate {
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
    pub bytes: u64,
}

#[derive(Serialize)]
pub struct PurgePlan {
    pub cutoff: DateTime<Utc>,
    pub files: usize,
    pub bytes: u64,
    pub sample: Vec<Candidate>,
}

#[derive(Serialize, Default, Debug, PartialEq)]
pub struct PurgeResult {
    pub deleted: usize,
    pub failed: usize,
    pub bytes: u64,
}

pub fn run(feed: &FeedConfig, args: PurgeCmd) -> Result<()> {
    let cutoff = parse_cutoff_str(&args.older_than, Utc::now())
        .ok_or_else(|| anyhow!("invalid --older-than: {}", args.older_than))?;
    let mode = if args.apply { "apply" } else { "plan" };

    let log = telemetry::purge();
    let _g = log.root_span_kv([
        ("mode", mode.to_string()),
        ("doc_root", feed.doc_root.display().to_string()),
        ("cutoff", cutoff.to_rfc3339()),
    ]).entered();

    let candidates = {
        let _s = log.span(&PurgePhase::Scan).entered();
        scan(&feed.doc_root, &feed.manifest_path(), cutoff)?
    };
    let total_bytes: u64 = candidates.iter().map(|c| c.bytes).sum();

    if !args.apply {
        if telemetry::config::json_mode() {
            let plan = PurgePlan {
                cutoff,
                files: candidates.len(),
                bytes: total_bytes,
                sample: candidates.iter().take(args.plan_limit).cloned().collect(),
            };
            log.plan(&plan)?;
        } else {
            log.info(format!("📝 Purge plan — files={} bytes={} cutoff={}", candidates.len(), total_bytes, cutoff));
            for c in candidates.iter().take(args.plan_limit) { log.info(format!("  {} ({})", c.path.display(), c.modified)); }
            if candidates.len() > args.plan_limit { log.info(format!("  ... ({} more)", candidates.len() - args.plan_limit)); }
            log.info("   Use --apply to execute.");
        }
        return Ok(());
    }

    let result = {
        let _s = log.span(&PurgePhase::Delete).entered();
        delete(&candidates)
    };
    log.info(format!("🧹 Purged {} files ({} bytes), {} failed", result.deleted, result.bytes, result.failed));
    if telemetry::config::json_mode() { log.result(&result, None)?; }
    Ok(())
}

/// Regular files directly under `root` last modified before `cutoff`, oldest first.
/// The manifest is never a candidate. A missing root yields nothing.
pub fn scan(root: &Path, manifest: &Path, cutoff: DateTime<Utc>) -> Result<Vec<Candidate>> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("reading {}", root.display())),
    };
    let cutoff: SystemTime = cutoff.into();

    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("reading {}", root.display()))?;
        let path = entry.path();
        if path == manifest { continue; }
        // symlink_metadata so links are never followed out of the root
        let meta = match fs::symlink_metadata(&path) {
            Ok(m) => m,
            Err(_) => continue,
        };
        if !meta.file_type().is_file() { continue; }
        let Ok(modified) = meta.modified() else { continue };
        if modified < cutoff {
            out.push(Candidate { path, modified: modified.into(), bytes: meta.len() });
        }
    }
    out.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
    Ok(out)
}

/// Best effort; one failure does not stop the sweep.
pub fn delete(candidates: &[Candidate]) -> PurgeResult {
    let log = telemetry::purge();
    let mut res = PurgeResult::default();
    for c in candidates {
        match fs::remove_file(&c.path) {
            Ok(()) => {
                res.deleted += 1;
                res.bytes += c.bytes;
                log.debug(format!("deleted {}", c.path.display()));
            }
            Err(e) => {
                res.failed += 1;
                log.warn_kv("⚠️ delete failed", [("path", c.path.display().to_string()), ("error", e.to_string())]);
            }
        }
    }
    res
}
