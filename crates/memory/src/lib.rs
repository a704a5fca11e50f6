pub mod chunking;
pub mod collection;
pub mod embedding;
pub mod event_log;
pub mod index;
pub mod schema;
pub mod search;
pub mod store;
pub mod sync;

pub use chunking::chunk_text;
pub use collection::{CollectionTree, UserAuthorization};
pub use embedding::EmbeddingPipeline;
pub use event_log::{DocumentEvent, DocumentEventLog, DocumentEventRecord};
pub use index::{ChunkIndex, IndexCacheStats};
pub use schema::{Chunk, ChunkingStrategy, Collection, Document, content_hash};
pub use search::{FusionStrategy, SearchHit, search};
pub use store::DocumentStore;
pub use sync::{SyncStats, delete_document, sync_document};
