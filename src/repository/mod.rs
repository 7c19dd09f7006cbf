// src/repository/mod.rs

//! Collaborators the session engine and the HTTP host call into.
//!
//! Each trait has an in-memory adapter (tests, local runs without `DATABASE_URL`)
//! and a PostgreSQL adapter.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    question::Question,
    session::{ProgressSnapshot, Submission, TestResult},
    survey::Survey,
    user::User,
};

pub use memory::{MemoryCatalogStore, MemoryProgressStore, MemorySubmissionService, MemoryUserStore};
pub use postgres::{PgCatalogStore, PgProgressStore, PgSubmissionService, PgUserStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// Retryable failure of a remote collaborator.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

/// Persists session progress for autosave, exit flush and resume.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn save(&self, snapshot: &ProgressSnapshot) -> Result<(), StoreError>;

    async fn load(&self, session_id: &str) -> Result<Option<ProgressSnapshot>, StoreError>;

    /// Removes stored progress. Clearing an absent session is not an error.
    async fn clear(&self, session_id: &str) -> Result<(), StoreError>;
}

/// Records a finished attempt.
#[async_trait]
pub trait SubmissionService: Send + Sync {
    async fn submit(&self, submission: &Submission) -> Result<TestResult, StoreError>;
}

/// Read-only question source and survey metadata.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn survey(&self, test_id: &str) -> Result<Option<Survey>, StoreError>;

    /// Active questions of the test, in presentation order.
    async fn questions(&self, test_id: &str) -> Result<Vec<Question>, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
}
