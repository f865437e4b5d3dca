use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use rss::Channel;
use thiserror::Error;

use super::template::Templates;
use super::types::{item_id, ItemDraft, PublishedItem};
use crate::config::FeedConfig;

const NAME_ATTEMPTS: usize = 8;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o on {}: {source}", .path.display())]
    Io { path: PathBuf, #[source] source: io::Error },

    #[error("manifest {} is not a readable feed: {source}", .path.display())]
    Manifest { path: PathBuf, #[source] source: rss::Error },

    #[error("no free item file name after {0} attempts")]
    NameExhausted(usize),

    #[error("feed must hold at least one item")]
    ZeroCapacity,
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io { path: path.to_path_buf(), source }
}

/// Bounded, insertion-ordered feed backed by an RSS file plus one
/// rendered page per item.
///
/// Items are kept oldest first in memory; the manifest lists them newest
/// first. Every append rewrites the whole manifest through a temp file and
/// rename, so readers only ever see a complete feed.
#[derive(Debug)]
pub struct FeedStore {
    cfg: FeedConfig,
    templates: Templates,
    items: VecDeque<PublishedItem>,
}

impl FeedStore {
    /// Create the document root if needed and load any existing manifest.
    pub fn open(cfg: FeedConfig, templates: Templates) -> Result<Self, StoreError> {
        if cfg.max_items == 0 { return Err(StoreError::ZeroCapacity); }
        fs::create_dir_all(&cfg.doc_root).map_err(io_err(&cfg.doc_root))?;
        let mut store = FeedStore { cfg, templates, items: VecDeque::new() };
        store.reopen()?;
        Ok(store)
    }

    /// Seed from the manifest on disk, keeping the newest `max_items` entries.
    fn reopen(&mut self) -> Result<usize, StoreError> {
        let path = self.cfg.manifest_path();
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(io_err(&path)(e)),
        };
        let channel = Channel::read_from(BufReader::new(file))
            .map_err(|source| StoreError::Manifest { path: path.clone(), source })?;

        // file order is newest first
        let mut loaded: Vec<PublishedItem> = channel
            .items()
            .iter()
            .filter_map(PublishedItem::from_rss)
            .take(self.cfg.max_items)
            .collect();
        loaded.reverse();
        self.items = loaded.into();
        Ok(self.items.len())
    }

    pub fn len(&self) -> usize { self.items.len() }

    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Newest first, as rendered in the feed.
    pub fn items(&self) -> impl Iterator<Item = &PublishedItem> + '_ { self.items.iter().rev() }

    /// Render `draft` to its own file, evict the oldest entry if full, then
    /// rewrite the manifest. Memory is only updated once the manifest is on disk.
    pub fn append(&mut self, draft: ItemDraft) -> Result<PublishedItem, StoreError> {
        let body = self.templates.render(draft.variant, &draft.fields);
        let (id, file_name) = self.write_item_file(body.as_bytes())?;

        let item = PublishedItem {
            id,
            date: draft.date,
            variant: draft.variant,
            title: draft.title,
            description: draft.description,
            file_name,
        };

        let mut next = self.items.clone();
        while next.len() >= self.cfg.max_items {
            next.pop_front();
        }
        next.push_back(item.clone());

        self.write_manifest(&next)?;
        self.items = next;
        Ok(item)
    }

    /// Rewrite the manifest from the in-memory items.
    #[cfg(test)]
    pub fn persist(&self) -> Result<(), StoreError> { self.write_manifest(&self.items) }

    fn write_item_file(&self, content: &[u8]) -> Result<(String, String), StoreError> {
        for _ in 0..NAME_ATTEMPTS {
            let id = item_id(Utc::now());
            let file_name = format!("{id}.html");
            let path = self.cfg.doc_root.join(&file_name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut f) => {
                    f.write_all(content).map_err(io_err(&path))?;
                    return Ok((id, file_name));
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(io_err(&path)(e)),
            }
        }
        Err(StoreError::NameExhausted(NAME_ATTEMPTS))
    }

    fn channel(&self, items: &VecDeque<PublishedItem>) -> Channel {
        let mut channel = Channel::default();
        channel.set_title(self.cfg.title.clone());
        channel.set_link(self.cfg.feed_url());
        channel.set_description(self.cfg.description.clone());
        channel.set_items(items.iter().rev().map(|i| i.to_rss(&self.cfg.url_root)).collect::<Vec<_>>());
        channel
    }

    fn write_manifest(&self, items: &VecDeque<PublishedItem>) -> Result<(), StoreError> {
        let path = self.cfg.manifest_path();
        let bytes = self
            .channel(items)
            .write_to(Vec::new())
            .map_err(|source| StoreError::Manifest { path: path.clone(), source })?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.cfg.doc_root).map_err(io_err(&self.cfg.doc_root))?;
        tmp.write_all(&bytes).map_err(io_err(tmp.path()))?;
        tmp.as_file().sync_all().map_err(io_err(&path))?;
        tmp.persist(&path).map_err(|e| io_err(&path)(e.error))?;
        Ok(())
    }
}
