//! Reconciles a source document with the store: chunks, embeds, and indexes
//! only when content actually changed. Grounded on
//! `aigent_memory::manager::MemoryManager::record`'s idempotent-write shape,
//! re-keyed around content-hash comparison instead of a dedup `HashSet`.

use uuid::Uuid;
use vellum_core::Result;

use crate::chunking::chunk_text;
use crate::embedding::EmbeddingPipeline;
use crate::event_log::{DocumentEvent, DocumentEventLog, DocumentEventRecord};
use crate::index::ChunkIndex;
use crate::schema::{Chunk, ChunkingStrategy, Document};
use crate::store::DocumentStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

/// Upserts `document` into `store`, re-chunking and re-embedding only if its
/// content changed since the last sync. Idempotent: calling this twice in a
/// row with the same content leaves `unchanged` incremented and nothing else
/// touched.
pub async fn sync_document(
    document: Document,
    store: &mut DocumentStore,
    index: &mut ChunkIndex,
    event_log: &DocumentEventLog,
    embedder: &EmbeddingPipeline,
    strategy: &ChunkingStrategy,
) -> Result<SyncStats> {
    let mut stats = SyncStats::default();

    let previous = store.get(document.id).cloned();
    let content_changed = previous.as_ref().map(|p| p.content_hash != document.content_hash).unwrap_or(true);

    if !content_changed {
        stats.unchanged += 1;
        return Ok(stats);
    }

    if previous.is_some() {
        stats.updated += 1;
    } else {
        stats.added += 1;
    }

    let doc_id = document.id;
    let texts = chunk_text(strategy, &document.content);
    let raw_chunks: Vec<Chunk> = texts
        .into_iter()
        .enumerate()
        .map(|(i, content)| Chunk { doc_id, chunk_index: i as u32, content, embedding: None })
        .collect();
    let embedded_chunks = embedder.embed_chunks(raw_chunks).await?;

    index.replace_document_chunks(doc_id, &embedded_chunks)?;
    store.upsert(document.clone());
    event_log
        .append(&DocumentEventRecord::new(DocumentEvent::Upserted { document }))
        .await?;

    Ok(stats)
}

/// Removes a document and its chunks from both the store and the index,
/// recording the deletion in the event log.
pub async fn delete_document(
    document_id: Uuid,
    store: &mut DocumentStore,
    index: &mut ChunkIndex,
    event_log: &DocumentEventLog,
) -> Result<SyncStats> {
    let mut stats = SyncStats::default();
    if store.remove(document_id) {
        index.remove_document(document_id)?;
        event_log
            .append(&DocumentEventRecord::new(DocumentEvent::Deleted { document_id }))
            .await?;
        stats.deleted += 1;
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use vellum_core::{CompletionOptions, CompletionResult, Result as CoreResult};
    use vellum_provider::{CompletionStream, Provider};

    struct StubProvider;

    #[async_trait]
    impl Provider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }
        async fn complete(&self, _options: CompletionOptions) -> CoreResult<CompletionResult> {
            unimplemented!()
        }
        async fn stream(&self, _options: CompletionOptions) -> CoreResult<CompletionStream> {
            unimplemented!()
        }
        async fn embed(&self, input: Vec<String>) -> CoreResult<Vec<Vec<f32>>> {
            Ok(input.iter().map(|_| vec![0.5, 0.5]).collect())
        }
    }

    fn temp_index_path() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("vellum-sync-index-{}.redb", Uuid::new_v4()))
    }

    fn temp_log_path() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("vellum-sync-log-{}.jsonl", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn first_sync_adds_and_chunks_the_document() {
        let mut store = DocumentStore::default();
        let index_path = temp_index_path();
        let mut index = ChunkIndex::open(&index_path).unwrap();
        let log = DocumentEventLog::new(temp_log_path());
        let embedder = EmbeddingPipeline::new(Arc::new(StubProvider));
        let strategy = ChunkingStrategy::Simple { max_size: 100, overlap: 0 };

        let doc = Document::new("/docs", "file://a", "hello world");
        let stats = sync_document(doc.clone(), &mut store, &mut index, &log, &embedder, &strategy).await.unwrap();
        assert_eq!(stats.added, 1);
        assert_eq!(index.chunks_for_document(doc.id).unwrap().len(), 1);

        let _ = std::fs::remove_file(&index_path);
    }

    #[tokio::test]
    async fn repeated_sync_with_unchanged_content_is_idempotent() {
        let mut store = DocumentStore::default();
        let index_path = temp_index_path();
        let mut index = ChunkIndex::open(&index_path).unwrap();
        let log = DocumentEventLog::new(temp_log_path());
        let embedder = EmbeddingPipeline::new(Arc::new(StubProvider));
        let strategy = ChunkingStrategy::Simple { max_size: 100, overlap: 0 };

        let doc = Document::new("/docs", "file://a", "hello world");
        sync_document(doc.clone(), &mut store, &mut index, &log, &embedder, &strategy).await.unwrap();
        let stats = sync_document(doc.clone(), &mut store, &mut index, &log, &embedder, &strategy).await.unwrap();
        assert_eq!(stats.unchanged, 1);
        assert_eq!(stats.added, 0);

        let _ = std::fs::remove_file(&index_path);
    }

    #[tokio::test]
    async fn content_change_bumps_updated_and_rechunks() {
        let mut store = DocumentStore::default();
        let index_path = temp_index_path();
        let mut index = ChunkIndex::open(&index_path).unwrap();
        let log = DocumentEventLog::new(temp_log_path());
        let embedder = EmbeddingPipeline::new(Arc::new(StubProvider));
        let strategy = ChunkingStrategy::Simple { max_size: 100, overlap: 0 };

        let mut doc = Document::new("/docs", "file://a", "hello world");
        sync_document(doc.clone(), &mut store, &mut index, &log, &embedder, &strategy).await.unwrap();
        doc.update_content("a very different body of text entirely");
        let stats = sync_document(doc.clone(), &mut store, &mut index, &log, &embedder, &strategy).await.unwrap();
        assert_eq!(stats.updated, 1);

        let _ = std::fs::remove_file(&index_path);
    }
}
