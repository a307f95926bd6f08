use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    CollectionPath, DocPath, DocStoreError, Result,
    store::{Document, DocumentStore, FieldOp, Filter, apply_field_ops, lookup_field, matches_filters},
};

/// In-memory document store implementation for testing.
///
/// All mutating operations run under a single write guard, so each
/// operation is atomic exactly like a single-document write against the
/// real database.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    docs: Arc<RwLock<HashMap<DocPath, Value>>>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of documents stored.
    pub async fn doc_count(&self) -> usize {
        self.docs.read().await.len()
    }

    /// Removes all documents.
    pub async fn clear(&self) {
        self.docs.write().await.clear();
    }

    /// Returns a full copy of the current document tree.
    ///
    /// Tests compare dumps taken before and after a failed saga to assert
    /// that rollback restored every document exactly.
    pub async fn dump(&self) -> HashMap<DocPath, Value> {
        self.docs.read().await.clone()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Value>> {
        Ok(self.docs.read().await.get(path).cloned())
    }

    async fn set(&self, path: &DocPath, data: Value) -> Result<()> {
        self.docs.write().await.insert(path.clone(), data);
        Ok(())
    }

    async fn update(&self, path: &DocPath, ops: Vec<FieldOp>) -> Result<()> {
        let mut docs = self.docs.write().await;
        let data = docs
            .get_mut(path)
            .ok_or_else(|| DocStoreError::NotFound(path.clone()))?;
        apply_field_ops(path, data, &ops)
    }

    async fn delete(&self, path: &DocPath) -> Result<()> {
        self.docs.write().await.remove(path);
        Ok(())
    }

    async fn add(&self, collection: &CollectionPath, data: Value) -> Result<DocPath> {
        let path = collection.doc(&Uuid::new_v4().simple().to_string());
        self.docs.write().await.insert(path.clone(), data);
        Ok(path)
    }

    async fn query(
        &self,
        collection: &CollectionPath,
        filters: Vec<Filter>,
    ) -> Result<Vec<Document>> {
        let docs = self.docs.read().await;
        let mut results: Vec<Document> = docs
            .iter()
            .filter(|(path, data)| {
                path.collection() == *collection && matches_filters(data, &filters)
            })
            .map(|(path, data)| Document {
                path: path.clone(),
                data: data.clone(),
            })
            .collect();
        results.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(results)
    }

    async fn increment(&self, path: &DocPath, field: &str, delta: i64) -> Result<i64> {
        let mut docs = self.docs.write().await;
        let data = docs
            .get_mut(path)
            .ok_or_else(|| DocStoreError::NotFound(path.clone()))?;
        apply_field_ops(path, data, &[FieldOp::increment(field, delta)])?;
        let new_value = lookup_field(data, field)
            .and_then(Value::as_i64)
            .ok_or_else(|| DocStoreError::FieldType {
                path: path.clone(),
                field: field.to_string(),
                expected: "integer",
            })?;
        Ok(new_value)
    }

    async fn increment_checked(
        &self,
        path: &DocPath,
        field: &str,
        delta: i64,
        floor: i64,
    ) -> Result<i64> {
        let mut docs = self.docs.write().await;
        let data = docs
            .get_mut(path)
            .ok_or_else(|| DocStoreError::NotFound(path.clone()))?;

        let current = match lookup_field(data, field) {
            None | Some(Value::Null) => 0,
            Some(value) => value.as_i64().ok_or_else(|| DocStoreError::FieldType {
                path: path.clone(),
                field: field.to_string(),
                expected: "integer",
            })?,
        };

        if current + delta < floor {
            return Err(DocStoreError::PreconditionFailed {
                path: path.clone(),
                field: field.to_string(),
                current,
                delta,
                floor,
            });
        }

        apply_field_ops(path, data, &[FieldOp::increment(field, delta)])?;
        Ok(current + delta)
    }
}
