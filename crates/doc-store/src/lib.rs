//! Document store adapter: a thin, typed interface over a hierarchical
//! path-addressed document database.
//!
//! Two backends are provided: [`InMemoryDocumentStore`] for tests and
//! local development, and [`PostgresDocumentStore`] backed by a single
//! JSONB table.

pub mod error;
pub mod memory;
pub mod path;
pub mod postgres;
pub mod store;

pub use error::{DocStoreError, Result};
pub use memory::InMemoryDocumentStore;
pub use path::{CollectionPath, DocPath};
pub use postgres::PostgresDocumentStore;
pub use store::{Document, DocumentStore, DocumentStoreExt, FieldOp, Filter};
