//! Data model for the Memory/Retrieval component (spec §3, §4.4):
//! `Document`s belong to a `Collection`, are split into `Chunk`s for
//! embedding and search, and `Collection`s form a permission tree.
//!
//! Grounded on `aigent_memory::schema::MemoryEntry`'s derive conventions
//! (`Debug, Clone, Serialize, Deserialize`, `Uuid`/`DateTime<Utc>` fields).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    /// Path of the [`Collection`] this document belongs to (retrieval
    /// collections are path-addressed, not id-addressed).
    pub collection_path: String,
    pub source_uri: String,
    pub content: String,
    pub content_hash: String,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        collection_path: impl Into<String>,
        source_uri: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            collection_path: collection_path.into(),
            source_uri: source_uri.into(),
            content_hash: content_hash(&content),
            content,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces `content`, bumping `version` and `content_hash` only if it
    /// actually changed — callers use this to decide whether re-chunking
    /// and re-embedding is necessary.
    pub fn update_content(&mut self, content: impl Into<String>) -> bool {
        let content = content.into();
        let hash = content_hash(&content);
        if hash == self.content_hash {
            return false;
        }
        self.content = content;
        self.content_hash = hash;
        self.version += 1;
        self.updated_at = Utc::now();
        true
    }
}

pub fn content_hash(content: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// One chunk of a document's content, keyed by `(doc_id, chunk_index)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub doc_id: Uuid,
    pub chunk_index: u32,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// How a document's content is split into chunks (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChunkingStrategy {
    /// Fixed-size character windows with overlap.
    Simple { max_size: usize, overlap: usize },
    /// Packs whole sentences up to `max_size` characters, carrying the
    /// last `overlap` sentences into the next chunk.
    Sentence { max_size: usize, overlap: usize },
    /// Splits on Markdown headings/blank-line paragraph boundaries,
    /// packing blocks up to `max_size` characters with `overlap` trailing
    /// characters carried forward.
    Markdown { max_size: usize, overlap: usize },
}

/// A node in the path-addressed collection tree (spec §3 "Collection
/// (retrieval)"). `queryable_by` empty means public *at this node*; the
/// actual effective audience is the intersection with every ancestor's
/// effective audience, computed by [`crate::collection::CollectionTree`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub path: String,
    pub parent_path: Option<String>,
    pub queryable_by: std::collections::HashSet<String>,
    pub is_leaf: bool,
    pub metadata: std::collections::HashMap<String, String>,
}

impl Collection {
    pub fn root(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            parent_path: None,
            queryable_by: std::collections::HashSet::new(),
            is_leaf: false,
            metadata: std::collections::HashMap::new(),
        }
    }

    pub fn child(path: impl Into<String>, parent_path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            parent_path: Some(parent_path.into()),
            queryable_by: std::collections::HashSet::new(),
            is_leaf: false,
            metadata: std::collections::HashMap::new(),
        }
    }

    pub fn with_queryable_by(mut self, principals: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.queryable_by = principals.into_iter().map(Into::into).collect();
        self
    }

    pub fn leaf(mut self) -> Self {
        self.is_leaf = true;
        self
    }
}
