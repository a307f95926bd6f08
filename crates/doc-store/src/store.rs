use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{DocStoreError, Result};
use crate::path::{CollectionPath, DocPath};

/// A document returned from a query: its path plus its raw payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: DocPath,
    pub data: Value,
}

/// A single field mutation applied as part of an update.
///
/// Fields are addressed by dotted paths (`stock.remaining`). The numeric
/// and array operations are commutative, which is what makes them safe to
/// apply under concurrent access without a cross-document transaction.
#[derive(Debug, Clone)]
pub enum FieldOp {
    /// Overwrite the field with a value.
    Set { field: String, value: Value },
    /// Add a signed delta to a numeric field, treating an absent field as 0.
    Increment { field: String, delta: i64 },
    /// Append a value to an array field unless an equal element is present.
    ArrayUnion { field: String, value: Value },
    /// Remove all elements equal to the value from an array field.
    ArrayRemove { field: String, value: Value },
}

impl FieldOp {
    pub fn set(field: impl Into<String>, value: Value) -> Self {
        Self::Set {
            field: field.into(),
            value,
        }
    }

    pub fn increment(field: impl Into<String>, delta: i64) -> Self {
        Self::Increment {
            field: field.into(),
            delta,
        }
    }

    pub fn array_union(field: impl Into<String>, value: Value) -> Self {
        Self::ArrayUnion {
            field: field.into(),
            value,
        }
    }

    pub fn array_remove(field: impl Into<String>, value: Value) -> Self {
        Self::ArrayRemove {
            field: field.into(),
            value,
        }
    }
}

/// An equality filter on a (possibly dotted) document field.
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub equals: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, equals: Value) -> Self {
        Self {
            field: field.into(),
            equals,
        }
    }
}

/// Core trait for document store backends.
///
/// All implementations must be thread-safe (`Send + Sync`), and each
/// individual operation must apply atomically: a failed operation leaves
/// the addressed document untouched.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads a document. Returns `None` if it does not exist.
    async fn get(&self, path: &DocPath) -> Result<Option<Value>>;

    /// Creates or fully replaces a document.
    async fn set(&self, path: &DocPath, data: Value) -> Result<()>;

    /// Applies partial field mutations to an existing document.
    ///
    /// Fails with [`DocStoreError::NotFound`] if the document does not
    /// exist; either all ops apply or none do.
    async fn update(&self, path: &DocPath, ops: Vec<FieldOp>) -> Result<()>;

    /// Deletes a document. Deleting a missing document is a no-op.
    async fn delete(&self, path: &DocPath) -> Result<()>;

    /// Adds a document with a generated id and returns its path.
    async fn add(&self, collection: &CollectionPath, data: Value) -> Result<DocPath>;

    /// Returns the documents in a collection matching all equality filters.
    async fn query(&self, collection: &CollectionPath, filters: Vec<Filter>)
    -> Result<Vec<Document>>;

    /// Atomically adds a delta to a numeric field and returns the new value.
    ///
    /// An absent field is treated as 0 and created.
    async fn increment(&self, path: &DocPath, field: &str, delta: i64) -> Result<i64>;

    /// Atomically adds a delta to a numeric field, but only if the result
    /// would stay at or above `floor`.
    ///
    /// Returns the new value on success. Fails with
    /// [`DocStoreError::PreconditionFailed`] (document untouched) when the
    /// delta would cross the floor. The availability check and the write
    /// are one operation, so concurrent callers cannot both observe the
    /// same headroom.
    async fn increment_checked(
        &self,
        path: &DocPath,
        field: &str,
        delta: i64,
        floor: i64,
    ) -> Result<i64>;
}

/// Extension trait providing the typed boundary over raw JSON payloads.
///
/// Every call site reads and writes an explicit schema struct; shape
/// mismatches surface here as serialization errors instead of propagating
/// duck-typed maps through the business logic.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Reads a document and deserializes it into a schema type.
    async fn get_as<T: DeserializeOwned + Send>(&self, path: &DocPath) -> Result<Option<T>> {
        match self.get(path).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Serializes a schema type and writes it as a document.
    async fn set_doc<T: Serialize + Sync>(&self, path: &DocPath, doc: &T) -> Result<()> {
        let value = serde_json::to_value(doc)?;
        self.set(path, value).await
    }

    /// Serializes a schema type and adds it with a generated id.
    async fn add_doc<T: Serialize + Sync>(
        &self,
        collection: &CollectionPath,
        doc: &T,
    ) -> Result<DocPath> {
        let value = serde_json::to_value(doc)?;
        self.add(collection, value).await
    }

    /// Appends a value to an array field unless already present.
    async fn array_union(&self, path: &DocPath, field: &str, value: Value) -> Result<()> {
        self.update(path, vec![FieldOp::array_union(field, value)])
            .await
    }

    /// Removes all elements equal to the value from an array field.
    async fn array_remove(&self, path: &DocPath, field: &str, value: Value) -> Result<()> {
        self.update(path, vec![FieldOp::array_remove(field, value)])
            .await
    }
}

// Blanket implementation for all DocumentStore implementations
impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}

/// Looks up a dotted field in a document payload.
pub(crate) fn lookup_field<'a>(data: &'a Value, field: &str) -> Option<&'a Value> {
    let mut current = data;
    for segment in field.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Resolves a dotted field to a mutable slot, creating intermediate
/// objects along the way.
fn resolve_slot<'a>(
    path: &DocPath,
    data: &'a mut Value,
    field: &str,
) -> Result<&'a mut serde_json::Map<String, Value>> {
    let mut current = data;
    let segments: Vec<&str> = field.split('.').collect();
    for segment in &segments[..segments.len() - 1] {
        let map = current
            .as_object_mut()
            .ok_or_else(|| DocStoreError::FieldType {
                path: path.clone(),
                field: field.to_string(),
                expected: "object",
            })?;
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
    current.as_object_mut().ok_or_else(|| DocStoreError::FieldType {
        path: path.clone(),
        field: field.to_string(),
        expected: "object",
    })
}

fn leaf_name(field: &str) -> &str {
    field.rsplit('.').next().unwrap_or(field)
}

/// Applies one field op to a document payload in place.
pub(crate) fn apply_field_op(path: &DocPath, data: &mut Value, op: &FieldOp) -> Result<()> {
    match op {
        FieldOp::Set { field, value } => {
            let slot = resolve_slot(path, data, field)?;
            slot.insert(leaf_name(field).to_string(), value.clone());
        }
        FieldOp::Increment { field, delta } => {
            let slot = resolve_slot(path, data, field)?;
            let leaf = leaf_name(field);
            let current = match slot.get(leaf) {
                None | Some(Value::Null) => 0,
                Some(value) => value.as_i64().ok_or_else(|| DocStoreError::FieldType {
                    path: path.clone(),
                    field: field.clone(),
                    expected: "integer",
                })?,
            };
            slot.insert(leaf.to_string(), Value::from(current + delta));
        }
        FieldOp::ArrayUnion { field, value } => {
            let slot = resolve_slot(path, data, field)?;
            let entry = slot
                .entry(leaf_name(field).to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            match entry {
                Value::Null => {
                    *entry = Value::Array(vec![value.clone()]);
                }
                Value::Array(items) => {
                    if !items.contains(value) {
                        items.push(value.clone());
                    }
                }
                _ => {
                    return Err(DocStoreError::FieldType {
                        path: path.clone(),
                        field: field.clone(),
                        expected: "array",
                    });
                }
            }
        }
        FieldOp::ArrayRemove { field, value } => {
            let slot = resolve_slot(path, data, field)?;
            let leaf = leaf_name(field);
            match slot.get_mut(leaf) {
                None | Some(Value::Null) => {}
                Some(Value::Array(items)) => {
                    items.retain(|item| item != value);
                }
                Some(_) => {
                    return Err(DocStoreError::FieldType {
                        path: path.clone(),
                        field: field.clone(),
                        expected: "array",
                    });
                }
            }
        }
    }
    Ok(())
}

/// Applies a batch of field ops, failing before any are applied if one is
/// invalid against the current payload.
pub(crate) fn apply_field_ops(path: &DocPath, data: &mut Value, ops: &[FieldOp]) -> Result<()> {
    // Dry-run against a copy so a failing op cannot leave a half-applied batch.
    let mut staged = data.clone();
    for op in ops {
        apply_field_op(path, &mut staged, op)?;
    }
    *data = staged;
    Ok(())
}

/// Returns true when the payload matches every equality filter.
pub(crate) fn matches_filters(data: &Value, filters: &[Filter]) -> bool {
    filters
        .iter()
        .all(|filter| lookup_field(data, &filter.field) == Some(&filter.equals))
}
