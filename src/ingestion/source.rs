use std::path::Path;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Every captured chunk is preceded by `Length=<bytes>\n`.
const RECORD_PREFIX: &str = "Length=";

/// Anything that yields the raw stream body one chunk at a time.
#[async_trait]
pub trait ChunkSource: Send {
    /// `Ok(None)` marks a clean end of stream.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>>;

    fn describe(&self) -> String;
}

/// Append one chunk to a capture, keeping its boundary.
pub async fn write_record<W: AsyncWrite + Unpin>(out: &mut W, chunk: &[u8]) -> Result<()> {
    out.write_all(format!("{RECORD_PREFIX}{}\n", chunk.len()).as_bytes()).await?;
    out.write_all(chunk).await?;
    Ok(())
}

/// A capture replayed chunk by chunk, exactly as it was received.
pub struct ReplayFile {
    reader: BufReader<File>,
    label: String,
    records: usize,
}

impl ReplayFile {
    pub async fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .await
            .with_context(|| format!("opening capture {}", path.display()))?;
        Ok(Self { reader: BufReader::new(file), label: path.display().to_string(), records: 0 })
    }

    fn record_err(&self, msg: &str) -> anyhow::Error {
        anyhow!("{} record {}: {}", self.label, self.records + 1, msg)
    }
}

#[async_trait]
impl ChunkSource for ReplayFile {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        let mut header = String::new();
        if self.reader.read_line(&mut header).await? == 0 {
            return Ok(None);
        }
        let len: usize = match header.trim_end_matches(['\r', '\n']).strip_prefix(RECORD_PREFIX) {
            Some(n) => n.parse().map_err(|_| self.record_err(&format!("bad length {n:?}")))?,
            None => return Err(self.record_err("missing Length= header")),
        };

        let mut buf = BytesMut::zeroed(len);
        self.reader
            .read_exact(&mut buf)
            .await
            .map_err(|_| self.record_err(&format!("truncated, expected {len} bytes")))?;
        self.records += 1;
        Ok(Some(buf.freeze()))
    }

    fn describe(&self) -> String { format!("replay:{}", self.label) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    async fn capture_of(chunks: &[&[u8]]) -> NamedTempFile {
        let mut raw = Vec::new();
        for c in chunks { write_record(&mut raw, c).await.unwrap(); }
        let tmp = NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), raw).unwrap();
        tmp
    }

    #[tokio::test]
    async fn replays_recorded_chunk_boundaries() {
        let tmp = capture_of(&[b"abcd", b"e\nLength=9\n", b"", "你好".as_bytes()]).await;
        let mut src = ReplayFile::open(tmp.path()).await.unwrap();
        let mut seen = Vec::new();
        while let Some(c) = src.next_chunk().await.unwrap() {
            seen.push(c.to_vec());
        }
        assert_eq!(seen, vec![b"abcd".to_vec(), b"e\nLength=9\n".to_vec(), Vec::new(), "你好".as_bytes().to_vec()]);
    }

    #[tokio::test]
    async fn record_header_counts_bytes() {
        let mut raw = Vec::new();
        write_record(&mut raw, "新".as_bytes()).await.unwrap();
        assert_eq!(raw, b"Length=3\n\xe6\x96\xb0");
    }

    #[tokio::test]
    async fn missing_header_is_an_error() {
        let tmp = NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), b"{\"tick\":1}").unwrap();
        let mut src = ReplayFile::open(tmp.path()).await.unwrap();
        let err = src.next_chunk().await.unwrap_err();
        assert!(err.to_string().contains("missing Length= header"));
    }

    #[tokio::test]
    async fn truncated_record_is_an_error() {
        let tmp = NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), b"Length=10\nabc").unwrap();
        let mut src = ReplayFile::open(tmp.path()).await.unwrap();
        assert!(src.next_chunk().await.is_err());
    }
}
