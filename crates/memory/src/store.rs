//! In-memory `Document` metadata store. Grounded on
//! `aigent_memory::store::MemoryStore`'s `Vec` + `HashSet` dedup +
//! `HashMap` id-index shape; chunk content lives in [`crate::index`]
//! instead of here.

use std::collections::HashMap;

use uuid::Uuid;

use crate::schema::Document;

#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: Vec<Document>,
    by_id: HashMap<Uuid, usize>,
}

impl DocumentStore {
    /// Inserts a new document, or overwrites the existing one with the
    /// same id in place (used after `Document::update_content`).
    pub fn upsert(&mut self, document: Document) {
        if let Some(&idx) = self.by_id.get(&document.id) {
            self.documents[idx] = document;
        } else {
            let idx = self.documents.len();
            self.by_id.insert(document.id, idx);
            self.documents.push(document);
        }
    }

    pub fn all(&self) -> &[Document] {
        &self.documents
    }

    pub fn get(&self, id: Uuid) -> Option<&Document> {
        self.by_id.get(&id).and_then(|&i| self.documents.get(i))
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut Document> {
        let idx = *self.by_id.get(&id)?;
        self.documents.get_mut(idx)
    }

    pub fn in_collection(&self, collection_path: &str) -> Vec<&Document> {
        self.documents.iter().filter(|d| d.collection_path == collection_path).collect()
    }

    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.documents.len();
        self.documents.retain(|d| d.id != id);
        if self.documents.len() < before {
            self.by_id = self.documents.iter().enumerate().map(|(i, d)| (d.id, i)).collect();
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_inserts_then_overwrites_in_place() {
        let mut store = DocumentStore::default();
        let mut doc = Document::new("/docs", "file://a", "v1");
        let id = doc.id;
        store.upsert(doc.clone());
        assert_eq!(store.len(), 1);

        doc.update_content("v2");
        store.upsert(doc.clone());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(id).unwrap().content, "v2");
    }

    #[test]
    fn remove_shrinks_store_and_invalidates_lookup() {
        let mut store = DocumentStore::default();
        let doc = Document::new("/docs", "file://a", "content");
        let id = doc.id;
        store.upsert(doc);
        assert!(store.remove(id));
        assert!(store.get(id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn in_collection_filters_by_collection_path() {
        let mut store = DocumentStore::default();
        store.upsert(Document::new("/docs/a", "a", "x"));
        store.upsert(Document::new("/docs/b", "b", "y"));
        assert_eq!(store.in_collection("/docs/a").len(), 1);
    }
}
