//! Secondary chunk index backed by [`redb`], grounded on
//! `aigent_memory::index::MemoryIndex`'s table layout and LRU-cache shape.
//!
//! The [`crate::event_log`] is the canonical source of truth for *document*
//! mutations; this index caches the derived *chunks* (with embeddings) that
//! [`crate::search`] reads on every query, avoiding a full re-chunk/re-embed
//! on each lookup.
//!
//! # Tables
//!
//! | Name          | Key                        | Value                      |
//! |---------------|----------------------------|-----------------------------|
//! | `chunks`      | `"{doc_id}:{chunk_index}"` | bincode-serialised [`Chunk`] |
//! | `doc_chunks`  | doc id string              | newline-separated chunk indices |

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use uuid::Uuid;
use vellum_core::{Error, Result};

use crate::schema::Chunk;

const CHUNKS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("chunks");
const DOC_CHUNKS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("doc_chunks");

const LRU_CAPACITY: usize = 256;

#[derive(Debug, Clone, Default)]
pub struct IndexCacheStats {
    pub capacity: usize,
    pub len: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate_pct: f32,
}

fn chunk_key(doc_id: Uuid, chunk_index: u32) -> String {
    format!("{doc_id}:{chunk_index}")
}

fn redb_err(stage: &'static str) -> impl Fn(impl std::fmt::Display) -> Error + '_ {
    move |e| Error::Processing { stage: stage.into(), message: e.to_string() }
}

fn bincode_err(e: impl std::fmt::Display) -> Error {
    Error::Corrupt { reason: e.to_string() }
}

pub struct ChunkIndex {
    db: Database,
    path: PathBuf,
    cache: lru::LruCache<String, Chunk>,
    cache_hits: u64,
    cache_misses: u64,
}

impl ChunkIndex {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(redb_err("chunk_index_open"))?;
        }
        let db = Database::create(&path).map_err(redb_err("chunk_index_open"))?;
        {
            let tx = db.begin_write().map_err(redb_err("chunk_index_open"))?;
            tx.open_table(CHUNKS_TABLE).map_err(redb_err("chunk_index_open"))?;
            tx.open_table(DOC_CHUNKS_TABLE).map_err(redb_err("chunk_index_open"))?;
            tx.commit().map_err(redb_err("chunk_index_open"))?;
        }
        Ok(Self {
            db,
            path,
            cache: lru::LruCache::new(NonZeroUsize::new(LRU_CAPACITY).unwrap()),
            cache_hits: 0,
            cache_misses: 0,
        })
    }

    pub fn reset(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            std::fs::remove_file(path).map_err(redb_err("chunk_index_reset"))?;
        }
        Self::open(path)
    }

    /// Atomically replaces every chunk belonging to `doc_id`: removes the
    /// existing set, then inserts `chunks`, in a single write transaction —
    /// a reader never observes a partially-updated document.
    pub fn replace_document_chunks(&mut self, doc_id: Uuid, chunks: &[Chunk]) -> Result<()> {
        let doc_key = doc_id.to_string();
        {
            let tx = self.db.begin_write().map_err(redb_err("chunk_index_replace"))?;
            {
                let mut chunks_tbl = tx.open_table(CHUNKS_TABLE).map_err(redb_err("chunk_index_replace"))?;
                let mut doc_tbl = tx.open_table(DOC_CHUNKS_TABLE).map_err(redb_err("chunk_index_replace"))?;

                let existing = doc_tbl
                    .get(doc_key.as_str())
                    .map_err(redb_err("chunk_index_replace"))?
                    .map(|v| v.value().to_string())
                    .unwrap_or_default();
                for idx_str in existing.lines().filter(|s| !s.is_empty()) {
                    if let Ok(idx) = idx_str.parse::<u32>() {
                        let key = chunk_key(doc_id, idx);
                        chunks_tbl.remove(key.as_str()).map_err(redb_err("chunk_index_replace"))?;
                    }
                }

                let mut indices = Vec::with_capacity(chunks.len());
                for chunk in chunks {
                    let key = chunk_key(doc_id, chunk.chunk_index);
                    let bytes = bincode::serialize(chunk).map_err(bincode_err)?;
                    chunks_tbl.insert(key.as_str(), bytes.as_slice()).map_err(redb_err("chunk_index_replace"))?;
                    indices.push(chunk.chunk_index.to_string());
                }
                if indices.is_empty() {
                    doc_tbl.remove(doc_key.as_str()).map_err(redb_err("chunk_index_replace"))?;
                } else {
                    doc_tbl.insert(doc_key.as_str(), indices.join("\n").as_str()).map_err(redb_err("chunk_index_replace"))?;
                }
            }
            tx.commit().map_err(redb_err("chunk_index_replace"))?;
        }

        for chunk in chunks {
            self.cache.put(chunk_key(doc_id, chunk.chunk_index), chunk.clone());
        }
        Ok(())
    }

    pub fn remove_document(&mut self, doc_id: Uuid) -> Result<()> {
        self.replace_document_chunks(doc_id, &[])
    }

    pub fn chunks_for_document(&mut self, doc_id: Uuid) -> Result<Vec<Chunk>> {
        let doc_key = doc_id.to_string();
        let tx = self.db.begin_read().map_err(redb_err("chunk_index_read"))?;
        let doc_tbl = tx.open_table(DOC_CHUNKS_TABLE).map_err(redb_err("chunk_index_read"))?;
        let indices = doc_tbl
            .get(doc_key.as_str())
            .map_err(redb_err("chunk_index_read"))?
            .map(|v| v.value().to_string())
            .unwrap_or_default();
        drop(doc_tbl);
        let chunks_tbl = tx.open_table(CHUNKS_TABLE).map_err(redb_err("chunk_index_read"))?;

        let mut result = Vec::new();
        for idx_str in indices.lines().filter(|s| !s.is_empty()) {
            let Ok(idx) = idx_str.parse::<u32>() else { continue };
            let key = chunk_key(doc_id, idx);
            if let Some(cached) = self.cache.get(&key) {
                self.cache_hits += 1;
                result.push(cached.clone());
                continue;
            }
            self.cache_misses += 1;
            if let Some(bytes) = chunks_tbl.get(key.as_str()).map_err(redb_err("chunk_index_read"))? {
                let chunk: Chunk = bincode::deserialize(bytes.value()).map_err(bincode_err)?;
                self.cache.put(key, chunk.clone());
                result.push(chunk);
            }
        }
        Ok(result)
    }

    pub fn cache_stats(&self) -> IndexCacheStats {
        IndexCacheStats {
            capacity: LRU_CAPACITY,
            len: self.cache.len(),
            hits: self.cache_hits,
            misses: self.cache_misses,
            hit_rate_pct: if self.cache_hits + self.cache_misses == 0 {
                0.0
            } else {
                (self.cache_hits as f32 / (self.cache_hits + self.cache_misses) as f32) * 100.0
            },
        }
    }

    pub fn len(&self) -> Result<usize> {
        let tx = self.db.begin_read().map_err(redb_err("chunk_index_len"))?;
        let tbl = tx.open_table(CHUNKS_TABLE).map_err(redb_err("chunk_index_len"))?;
        Ok(tbl.len().map_err(redb_err("chunk_index_len"))? as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(doc_id: Uuid, index: u32, content: &str) -> Chunk {
        Chunk { doc_id, chunk_index: index, content: content.into(), embedding: None }
    }

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("vellum-chunk-index-{}.redb", Uuid::new_v4()))
    }

    #[test]
    fn replace_then_read_round_trips() {
        let path = temp_path();
        let mut index = ChunkIndex::open(&path).unwrap();
        let doc_id = Uuid::new_v4();
        index.replace_document_chunks(doc_id, &[chunk(doc_id, 0, "a"), chunk(doc_id, 1, "b")]).unwrap();
        let chunks = index.chunks_for_document(doc_id).unwrap();
        assert_eq!(chunks.len(), 2);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn replace_drops_stale_chunks_on_shrink() {
        let path = temp_path();
        let mut index = ChunkIndex::open(&path).unwrap();
        let doc_id = Uuid::new_v4();
        index.replace_document_chunks(doc_id, &[chunk(doc_id, 0, "a"), chunk(doc_id, 1, "b")]).unwrap();
        index.replace_document_chunks(doc_id, &[chunk(doc_id, 0, "a2")]).unwrap();
        let chunks = index.chunks_for_document(doc_id).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "a2");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn remove_document_clears_all_its_chunks() {
        let path = temp_path();
        let mut index = ChunkIndex::open(&path).unwrap();
        let doc_id = Uuid::new_v4();
        index.replace_document_chunks(doc_id, &[chunk(doc_id, 0, "a")]).unwrap();
        index.remove_document(doc_id).unwrap();
        assert!(index.chunks_for_document(doc_id).unwrap().is_empty());
        let _ = std::fs::remove_file(&path);
    }
}
