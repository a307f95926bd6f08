//! Slash-separated document and collection paths.
//!
//! A path with an even number of segments addresses a document
//! (`users/alice`, `collectibles/c1/collectors/bob`); an odd number of
//! segments addresses a collection (`users`, `collectibles/c1/collectors`).

use serde::{Deserialize, Serialize};

use crate::error::{DocStoreError, Result};

fn validate_segments(path: &str) -> Result<usize> {
    if path.is_empty() {
        return Err(DocStoreError::InvalidPath("empty path".to_string()));
    }
    let mut count = 0;
    for segment in path.split('/') {
        if segment.is_empty() {
            return Err(DocStoreError::InvalidPath(format!(
                "empty segment in '{path}'"
            )));
        }
        count += 1;
    }
    Ok(count)
}

/// Path addressing a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocPath(String);

impl DocPath {
    /// Parses a document path, rejecting empty segments and paths with
    /// an odd number of segments.
    pub fn parse(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let segments = validate_segments(&path)?;
        if segments % 2 != 0 {
            return Err(DocStoreError::InvalidPath(format!(
                "'{path}' addresses a collection, not a document"
            )));
        }
        Ok(Self(path))
    }

    /// Returns the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the document id (the last path segment).
    pub fn doc_id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Returns the collection containing this document.
    pub fn collection(&self) -> CollectionPath {
        let parent = match self.0.rfind('/') {
            Some(idx) => &self.0[..idx],
            None => &self.0,
        };
        CollectionPath(parent.to_string())
    }

    /// Returns a sub-collection of this document.
    pub fn sub_collection(&self, name: &str) -> CollectionPath {
        CollectionPath(format!("{}/{}", self.0, name))
    }
}

impl std::fmt::Display for DocPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Path addressing a collection of documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// Parses a collection path, rejecting empty segments and paths with
    /// an even number of segments.
    pub fn parse(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let segments = validate_segments(&path)?;
        if segments % 2 != 1 {
            return Err(DocStoreError::InvalidPath(format!(
                "'{path}' addresses a document, not a collection"
            )));
        }
        Ok(Self(path))
    }

    /// Builds a top-level collection from a static name.
    ///
    /// A single segment is a collection by definition, so this cannot
    /// fail for any well-formed literal.
    pub fn root(name: &'static str) -> Self {
        debug_assert!(!name.is_empty() && !name.contains('/'));
        Self(name.to_string())
    }

    /// Returns the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the path of the document with the given id in this collection.
    pub fn doc(&self, id: &str) -> DocPath {
        DocPath(format!("{}/{}", self.0, id))
    }
}

impl std::fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
