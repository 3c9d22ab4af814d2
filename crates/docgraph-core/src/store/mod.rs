//! Graph-store collaborator: runs emitted statements against a database.

#[cfg(feature = "surreal")]
mod surreal;

#[cfg(feature = "surreal")]
pub use surreal::SurrealStore;

use async_trait::async_trait;
use std::sync::Mutex;
use thiserror::Error;

use crate::emit::{Dialect, Statement};

/// Errors that can occur while applying statements.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection, query or statement failure reported by the database.
    #[error("Database error: {0}")]
    Database(String),

    /// Statements written for a different dialect.
    #[error("Store speaks {expected}, statements are {found}")]
    DialectMismatch { expected: Dialect, found: Dialect },
}

#[cfg(feature = "surreal")]
impl From<surrealdb::Error> for StoreError {
    fn from(err: surrealdb::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// What one `apply` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub statements: usize,
}

/// A database that executes statements of one dialect.
#[async_trait]
pub trait GraphStore: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Run statements in order. Statements are idempotent, so a failed call
    /// can be retried as a whole.
    async fn apply(&self, statements: &[Statement]) -> Result<ApplySummary, StoreError>;

    /// Fails unless `dialect` is what this store runs.
    fn expect_dialect(&self, dialect: Dialect) -> Result<(), StoreError> {
        if self.dialect() == dialect {
            Ok(())
        } else {
            Err(StoreError::DialectMismatch {
                expected: self.dialect(),
                found: dialect,
            })
        }
    }
}

/// Keeps every applied statement in memory. Used for dry runs.
#[derive(Debug)]
pub struct RecordingStore {
    dialect: Dialect,
    applied: Mutex<Vec<Statement>>,
}

impl RecordingStore {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            applied: Mutex::new(Vec::new()),
        }
    }

    /// Everything applied so far, in order.
    pub fn applied(&self) -> Vec<Statement> {
        match self.applied.lock() {
            Ok(applied) => applied.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl GraphStore for RecordingStore {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn apply(&self, statements: &[Statement]) -> Result<ApplySummary, StoreError> {
        let mut applied = self
            .applied
            .lock()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        applied.extend_from_slice(statements);
        Ok(ApplySummary {
            statements: statements.len(),
        })
    }
}
