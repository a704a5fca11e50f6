//! Batch embedding pipeline: turns a document's chunks into vectors via a
//! [`vellum_provider::Provider`], grounded on the teacher's `retrieval.rs`
//! embedding-similarity helpers but adapted to produce rather than consume
//! vectors.

use std::sync::Arc;

use vellum_core::Result;
use vellum_provider::Provider;

use crate::schema::Chunk;

#[derive(Debug, Clone)]
pub struct EmbeddingPipeline {
    provider: Arc<dyn Provider>,
}

impl EmbeddingPipeline {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    /// Embeds every chunk's content in one batched call, enforcing that the
    /// provider returns one vector per chunk and that every vector shares the
    /// same dimensionality — a mixed-dimension batch means the embedding
    /// model changed mid-run and the caller should not index it.
    pub async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<Chunk>> {
        if chunks.is_empty() {
            return Ok(chunks);
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.provider.embed(texts).await?;

        if vectors.len() != chunks.len() {
            return Err(vellum_core::Error::Processing {
                stage: "embedding".into(),
                message: format!(
                    "provider returned {} vectors for {} chunks",
                    vectors.len(),
                    chunks.len()
                ),
            });
        }

        let dim = vectors.first().map(|v| v.len()).unwrap_or(0);
        if let Some(mismatch) = vectors.iter().position(|v| v.len() != dim) {
            return Err(vellum_core::Error::Processing {
                stage: "embedding".into(),
                message: format!(
                    "embedding dimensionality mismatch at index {mismatch}: expected {dim}"
                ),
            });
        }

        Ok(chunks
            .into_iter()
            .zip(vectors)
            .map(|(mut chunk, vector)| {
                chunk.embedding = Some(vector);
                chunk
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use uuid::Uuid;
    use vellum_core::{CompletionOptions, CompletionResult, Result as CoreResult};
    use vellum_provider::CompletionStream;

    struct FixedDimProvider {
        dim: usize,
    }

    #[async_trait]
    impl Provider for FixedDimProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _options: CompletionOptions) -> CoreResult<CompletionResult> {
            unimplemented!()
        }

        async fn stream(&self, _options: CompletionOptions) -> CoreResult<CompletionStream> {
            unimplemented!()
        }

        async fn embed(&self, input: Vec<String>) -> CoreResult<Vec<Vec<f32>>> {
            Ok(input.iter().map(|_| vec![0.1; self.dim]).collect())
        }
    }

    fn chunk(doc_id: Uuid, index: u32, content: &str) -> Chunk {
        Chunk { doc_id, chunk_index: index, content: content.into(), embedding: None }
    }

    #[tokio::test]
    async fn embeds_every_chunk_with_matching_dimensionality() {
        let pipeline = EmbeddingPipeline::new(Arc::new(FixedDimProvider { dim: 4 }));
        let doc_id = Uuid::new_v4();
        let chunks = vec![chunk(doc_id, 0, "a"), chunk(doc_id, 1, "b")];
        let embedded = pipeline.embed_chunks(chunks).await.unwrap();
        assert_eq!(embedded.len(), 2);
        for c in &embedded {
            assert_eq!(c.embedding.as_ref().unwrap().len(), 4);
        }
    }

    #[tokio::test]
    async fn empty_input_short_circuits() {
        let pipeline = EmbeddingPipeline::new(Arc::new(FixedDimProvider { dim: 4 }));
        let embedded = pipeline.embed_chunks(vec![]).await.unwrap();
        assert!(embedded.is_empty());
    }
}
