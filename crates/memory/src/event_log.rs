//! Crash-safe append-only log of document mutations, backing
//! [`crate::index::ChunkIndex::rebuild_from_log`]. Grounded directly on
//! `aigent_memory::event_log::MemoryEventLog`: `fsync`-on-append,
//! write-tmp-then-rename atomic overwrite, and a `.jsonl.corrupt` sidecar
//! for lines that fail to parse on load.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;
use vellum_core::{Error, Result};

use crate::schema::Document;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DocumentEvent {
    Upserted { document: Document },
    Deleted { document_id: Uuid },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentEventRecord {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub event: DocumentEvent,
}

impl DocumentEventRecord {
    pub fn new(event: DocumentEvent) -> Self {
        Self { event_id: Uuid::new_v4(), occurred_at: Utc::now(), event }
    }
}

fn io_err(e: std::io::Error) -> Error {
    Error::Processing { stage: "memory_event_log".into(), message: e.to_string() }
}

fn json_err(e: serde_json::Error) -> Error {
    Error::Corrupt { reason: e.to_string() }
}

#[derive(Debug, Clone)]
pub struct DocumentEventLog {
    path: PathBuf,
}

impl DocumentEventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, record: &DocumentEventRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(io_err)?;
        let line = serde_json::to_string(record).map_err(json_err)?;
        file.write_all(line.as_bytes()).await.map_err(io_err)?;
        file.write_all(b"\n").await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;
        file.sync_all().await.map_err(io_err)?;
        Ok(())
    }

    /// Atomically replaces the whole log: write to a `.tmp` sibling,
    /// `fsync`, then rename over the original. A crash before the rename
    /// leaves the original untouched; the `.tmp` file is removed on any
    /// error path.
    pub async fn overwrite(&self, records: &[DocumentEventRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let tmp_path = tmp_sibling(&self.path);

        let write_result: Result<()> = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)
                .await
                .map_err(io_err)?;
            for record in records {
                let line = serde_json::to_string(record).map_err(json_err)?;
                file.write_all(line.as_bytes()).await.map_err(io_err)?;
                file.write_all(b"\n").await.map_err(io_err)?;
            }
            file.flush().await.map_err(io_err)?;
            file.sync_all().await.map_err(io_err)?;
            Ok(())
        }
        .await;

        if let Err(err) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(err);
        }
        if let Err(err) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(io_err(err));
        }
        Ok(())
    }

    pub fn backup(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        std::fs::copy(&self.path, bak_sibling(&self.path)).map_err(io_err)?;
        Ok(())
    }

    pub fn load(&self) -> Result<Vec<DocumentEventRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::OpenOptions::new().read(true).open(&self.path).map_err(io_err)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();
        let mut corrupt_count = 0usize;

        for (line_idx, line_result) in reader.lines().enumerate() {
            let line = line_result.map_err(io_err)?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<DocumentEventRecord>(&line) {
                Ok(record) => records.push(record),
                Err(err) => {
                    corrupt_count += 1;
                    tracing::warn!(
                        line = line_idx + 1,
                        error = %err,
                        path = %self.path.display(),
                        "corrupt JSONL record — skipping line"
                    );
                    let corrupt_path = self.path.with_extension("jsonl.corrupt");
                    if let Ok(mut bad) = std::fs::OpenOptions::new().create(true).append(true).open(&corrupt_path) {
                        use std::io::Write as _;
                        let _ = writeln!(bad, "{line}");
                    }
                }
            }
        }

        if corrupt_count > 0 {
            tracing::warn!(corrupt_lines = corrupt_count, path = %self.path.display(), "event log loaded with skipped corrupt lines");
        }
        Ok(records)
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let filename = path.file_name().map(|f| f.to_string_lossy().to_string()).unwrap_or_else(|| "events.jsonl".into());
    path.with_file_name(format!("{filename}.tmp"))
}

fn bak_sibling(path: &Path) -> PathBuf {
    let filename = path.file_name().map(|f| f.to_string_lossy().to_string()).unwrap_or_else(|| "events.jsonl".into());
    path.with_file_name(format!("{filename}.bak"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_then_load_round_trips() {
        let dir = std::env::temp_dir().join(format!("vellum-memory-test-{}", Uuid::new_v4()));
        let log = DocumentEventLog::new(dir.join("events.jsonl"));
        let doc = Document::new("/docs", "file://a", "hello");
        log.append(&DocumentEventRecord::new(DocumentEvent::Upserted { document: doc.clone() })).await.unwrap();
        let loaded = log.load().unwrap();
        assert_eq!(loaded.len(), 1);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn overwrite_replaces_contents_atomically() {
        let dir = std::env::temp_dir().join(format!("vellum-memory-test-{}", Uuid::new_v4()));
        let log = DocumentEventLog::new(dir.join("events.jsonl"));
        let doc = Document::new("/docs", "file://a", "hello");
        log.append(&DocumentEventRecord::new(DocumentEvent::Upserted { document: doc.clone() })).await.unwrap();
        log.overwrite(&[]).await.unwrap();
        assert!(log.load().unwrap().is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
