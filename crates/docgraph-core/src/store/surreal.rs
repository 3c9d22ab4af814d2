//! Embedded SurrealDB graph store.

use async_trait::async_trait;
use std::path::Path;
use surrealdb::engine::local::{Db, Mem, RocksDb};
use surrealdb::Surreal;

use super::{ApplySummary, GraphStore, StoreError};
use crate::config::{DEFAULT_DB_NAME, DEFAULT_DB_NAMESPACE};
use crate::emit::{render_script, Dialect, Statement};

/// Statements sent per round trip.
const CHUNK_SIZE: usize = 500;

pub struct SurrealStore {
    db: Surreal<Db>,
}

impl SurrealStore {
    /// Open or create a database at the given path.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let db = Surreal::new::<RocksDb>(path).await?;
        db.use_ns(DEFAULT_DB_NAMESPACE).use_db(DEFAULT_DB_NAME).await?;
        Ok(Self { db })
    }

    /// Throwaway in-memory database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let db = Surreal::new::<Mem>(()).await?;
        db.use_ns(DEFAULT_DB_NAMESPACE).use_db(DEFAULT_DB_NAME).await?;
        Ok(Self { db })
    }

    /// Number of records in a table.
    pub async fn count(&self, table: &str) -> Result<usize, StoreError> {
        let count: Option<i64> = self
            .db
            .query("SELECT count() AS n FROM type::table($table) GROUP ALL")
            .bind(("table", table.to_string()))
            .await?
            .take((0, "n"))?;
        Ok(count.unwrap_or(0).max(0) as usize)
    }
}

#[async_trait]
impl GraphStore for SurrealStore {
    fn dialect(&self) -> Dialect {
        Dialect::SurrealQl
    }

    async fn apply(&self, statements: &[Statement]) -> Result<ApplySummary, StoreError> {
        for chunk in statements.chunks(CHUNK_SIZE) {
            self.db.query(render_script(chunk)).await?.check()?;
            tracing::debug!(statements = chunk.len(), "applied chunk");
        }
        Ok(ApplySummary {
            statements: statements.len(),
        })
    }
}
