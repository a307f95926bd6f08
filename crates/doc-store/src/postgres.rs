use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::{
    CollectionPath, DocPath, DocStoreError, Result,
    store::{Document, DocumentStore, FieldOp, Filter, apply_field_ops},
};
use async_trait::async_trait;
use serde_json::Value;

/// PostgreSQL-backed document store implementation.
///
/// Documents live in a single `documents` table keyed by path, with the
/// payload in a JSONB column. Numeric field ops compile to single
/// conditional `UPDATE` statements, so the check and the write are one
/// atomic operation on the database side.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn field_segments(field: &str) -> Vec<String> {
        field.split('.').map(str::to_string).collect()
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Value>> {
        let row = sqlx::query("SELECT data FROM documents WHERE path = $1")
            .bind(path.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("data")?)),
            None => Ok(None),
        }
    }

    async fn set(&self, path: &DocPath, data: Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (path, collection, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (path) DO UPDATE SET
                data = EXCLUDED.data,
                updated_at = now()
            "#,
        )
        .bind(path.as_str())
        .bind(path.collection().as_str())
        .bind(&data)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, path: &DocPath, ops: Vec<FieldOp>) -> Result<()> {
        // Array ops need read-modify-write semantics; a row lock keeps the
        // batch atomic against concurrent writers.
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT data FROM documents WHERE path = $1 FOR UPDATE")
            .bind(path.as_str())
            .fetch_optional(&mut *tx)
            .await?;

        let mut data: Value = row
            .ok_or_else(|| DocStoreError::NotFound(path.clone()))?
            .try_get("data")?;

        apply_field_ops(path, &mut data, &ops)?;

        sqlx::query("UPDATE documents SET data = $2, updated_at = now() WHERE path = $1")
            .bind(path.as_str())
            .bind(&data)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, path: &DocPath) -> Result<()> {
        sqlx::query("DELETE FROM documents WHERE path = $1")
            .bind(path.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn add(&self, collection: &CollectionPath, data: Value) -> Result<DocPath> {
        let path = collection.doc(&Uuid::new_v4().simple().to_string());

        sqlx::query("INSERT INTO documents (path, collection, data) VALUES ($1, $2, $3)")
            .bind(path.as_str())
            .bind(collection.as_str())
            .bind(&data)
            .execute(&self.pool)
            .await?;

        Ok(path)
    }

    async fn query(
        &self,
        collection: &CollectionPath,
        filters: Vec<Filter>,
    ) -> Result<Vec<Document>> {
        let mut sql = String::from("SELECT path, data FROM documents WHERE collection = $1");
        let mut param_count = 1;

        // Build dynamic equality filters against the JSONB payload
        for _ in &filters {
            sql.push_str(&format!(
                " AND data #> ${}::text[] = ${}::jsonb",
                param_count + 1,
                param_count + 2
            ));
            param_count += 2;
        }

        sql.push_str(" ORDER BY path ASC");

        let mut sqlx_query = sqlx::query(&sql).bind(collection.as_str());
        for filter in &filters {
            sqlx_query = sqlx_query
                .bind(Self::field_segments(&filter.field))
                .bind(&filter.equals);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;

        rows.into_iter()
            .map(|row| {
                let path: String = row.try_get("path")?;
                Ok(Document {
                    path: DocPath::parse(path)?,
                    data: row.try_get("data")?,
                })
            })
            .collect()
    }

    async fn increment(&self, path: &DocPath, field: &str, delta: i64) -> Result<i64> {
        let new_value: Option<Option<i64>> = sqlx::query_scalar(
            r#"
            UPDATE documents
            SET data = jsonb_set(
                    data, $2::text[],
                    to_jsonb(COALESCE((data #>> $2::text[])::bigint, 0) + $3),
                    true
                ),
                updated_at = now()
            WHERE path = $1
            RETURNING (data #>> $2::text[])::bigint
            "#,
        )
        .bind(path.as_str())
        .bind(Self::field_segments(field))
        .bind(delta)
        .fetch_optional(&self.pool)
        .await?;

        match new_value {
            Some(Some(value)) => Ok(value),
            Some(None) => Err(DocStoreError::FieldType {
                path: path.clone(),
                field: field.to_string(),
                expected: "integer",
            }),
            None => Err(DocStoreError::NotFound(path.clone())),
        }
    }

    async fn increment_checked(
        &self,
        path: &DocPath,
        field: &str,
        delta: i64,
        floor: i64,
    ) -> Result<i64> {
        let segments = Self::field_segments(field);

        let new_value: Option<Option<i64>> = sqlx::query_scalar(
            r#"
            UPDATE documents
            SET data = jsonb_set(
                    data, $2::text[],
                    to_jsonb(COALESCE((data #>> $2::text[])::bigint, 0) + $3),
                    true
                ),
                updated_at = now()
            WHERE path = $1
              AND COALESCE((data #>> $2::text[])::bigint, 0) + $3 >= $4
            RETURNING (data #>> $2::text[])::bigint
            "#,
        )
        .bind(path.as_str())
        .bind(&segments)
        .bind(delta)
        .bind(floor)
        .fetch_optional(&self.pool)
        .await?;

        match new_value {
            Some(Some(value)) => return Ok(value),
            Some(None) => {
                return Err(DocStoreError::FieldType {
                    path: path.clone(),
                    field: field.to_string(),
                    expected: "integer",
                });
            }
            None => {}
        }

        // No row updated: distinguish a missing document from a refused delta.
        let current: Option<Option<i64>> = sqlx::query_scalar(
            "SELECT (data #>> $2::text[])::bigint FROM documents WHERE path = $1",
        )
        .bind(path.as_str())
        .bind(&segments)
        .fetch_optional(&self.pool)
        .await?;

        match current {
            Some(current) => Err(DocStoreError::PreconditionFailed {
                path: path.clone(),
                field: field.to_string(),
                current: current.unwrap_or(0),
                delta,
                floor,
            }),
            None => Err(DocStoreError::NotFound(path.clone())),
        }
    }
}
