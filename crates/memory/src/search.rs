//! Hybrid lexical + vector retrieval (spec §4.4, §8 invariant 9: a result's
//! score only increases as its lexical or vector match improves, all else
//! held equal). Lexical scoring and cosine similarity are grounded directly
//! on `aigent_memory::retrieval`'s `tokenize`/`lexical_relevance_score`/
//! `cosine_similarity` helpers; fusion and permission filtering are new.

use std::collections::{BTreeSet, HashMap};

use uuid::Uuid;

use crate::collection::{CollectionTree, UserAuthorization};
use crate::schema::{Chunk, Document};

/// How lexical and vector rankings are combined into one ordering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FusionStrategy {
    /// Reciprocal Rank Fusion: `sum(1 / (k + rank))` across both rankings.
    Rrf { k: u32 },
    /// Linear combination of the raw lexical overlap and cosine similarity.
    Weighted { lexical_weight: f32, vector_weight: f32 },
    VectorOnly,
    KeywordOnly,
}

impl Default for FusionStrategy {
    fn default() -> Self {
        FusionStrategy::Rrf { k: 60 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
}

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "was", "has", "are", "not", "this", "that", "with", "from", "have",
    "you", "can", "its", "will", "but", "they", "all", "been", "also", "into", "more", "than",
    "when", "who", "what", "how", "out", "our", "new", "now",
];

pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|t| t.len() >= 3)
        .map(|t| t.to_lowercase())
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

fn lexical_score(content: &str, query_terms: &BTreeSet<String>) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let content_terms = tokenize(content);
    let overlap = query_terms.intersection(&content_terms).count() as f32;
    overlap / query_terms.len() as f32
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    (dot / (mag_a * mag_b)).clamp(0.0, 1.0)
}

fn vector_score(chunk: &Chunk, query_embedding: Option<&[f32]>) -> f32 {
    match (chunk.embedding.as_deref(), query_embedding) {
        (Some(v), Some(q)) => cosine_similarity(v, q),
        _ => 0.0,
    }
}

/// Rescales `scores` to span `[0,1]` against their own observed min/max, so
/// a `Weighted` fusion doesn't let one signal dominate just because its raw
/// range happens to be narrower than the other's for this query (spec §4.4).
/// A constant list (min == max) normalizes to all zeros.
fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    let min = scores.iter().copied().fold(f32::INFINITY, f32::min);
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    if range <= f32::EPSILON {
        return vec![0.0; scores.len()];
    }
    scores.iter().map(|&s| (s - min) / range).collect()
}

/// Orders indices into `scores` by descending score, breaking ties by
/// `(chunk_index, doc_id)` so repeated queries return a stable order.
fn rank_indices(chunks: &[Chunk], scores: &[f32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..chunks.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .total_cmp(&scores[a])
            .then_with(|| chunks[a].chunk_index.cmp(&chunks[b].chunk_index))
            .then_with(|| chunks[a].doc_id.cmp(&chunks[b].doc_id))
    });
    order
}

/// Searches `chunks`, restricting to documents `auth` is authorized to
/// query via `tree` (spec §8 invariant 7), and returns the top `limit` hits
/// ordered by `strategy`.
pub fn search(
    chunks: &[Chunk],
    documents: &[Document],
    query: &str,
    query_embedding: Option<&[f32]>,
    strategy: FusionStrategy,
    limit: usize,
    tree: &CollectionTree<'_>,
    auth: &UserAuthorization,
) -> Vec<SearchHit> {
    let doc_collections: HashMap<Uuid, &str> =
        documents.iter().map(|d| (d.id, d.collection_path.as_str())).collect();

    let visible: Vec<Chunk> = chunks
        .iter()
        .filter(|c| {
            doc_collections
                .get(&c.doc_id)
                .map(|&path| tree.can_query(path, auth))
                .unwrap_or(false)
        })
        .cloned()
        .collect();

    if visible.is_empty() {
        return Vec::new();
    }

    let query_terms = tokenize(query);
    let lexical: Vec<f32> = visible.iter().map(|c| lexical_score(&c.content, &query_terms)).collect();
    let vector: Vec<f32> = visible.iter().map(|c| vector_score(c, query_embedding)).collect();

    let fused: Vec<f32> = match strategy {
        FusionStrategy::KeywordOnly => lexical.clone(),
        FusionStrategy::VectorOnly => vector.clone(),
        FusionStrategy::Weighted { lexical_weight, vector_weight } => {
            let lexical_norm = min_max_normalize(&lexical);
            let vector_norm = min_max_normalize(&vector);
            lexical_norm
                .iter()
                .zip(vector_norm.iter())
                .map(|(&l, &v)| l * lexical_weight + v * vector_weight)
                .collect()
        }
        FusionStrategy::Rrf { k } => {
            let lexical_order = rank_indices(&visible, &lexical);
            let vector_order = rank_indices(&visible, &vector);
            let mut rrf_score = vec![0.0f32; visible.len()];
            for (rank, &idx) in lexical_order.iter().enumerate() {
                rrf_score[idx] += 1.0 / (k as f32 + rank as f32 + 1.0);
            }
            for (rank, &idx) in vector_order.iter().enumerate() {
                rrf_score[idx] += 1.0 / (k as f32 + rank as f32 + 1.0);
            }
            rrf_score
        }
    };

    rank_indices(&visible, &fused)
        .into_iter()
        .take(limit)
        .map(|idx| SearchHit { chunk: visible[idx].clone(), score: fused[idx] })
        .collect()
}
