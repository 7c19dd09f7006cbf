// src/repository/memory.rs

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::{
    question::Question,
    session::{ProgressSnapshot, Submission, TestResult},
    survey::Survey,
    user::User,
};

use super::{CatalogStore, ProgressStore, StoreError, SubmissionService, UserStore};

/// Progress store kept in process memory.
/// Saves can be made to fail, to exercise the best-effort paths.
#[derive(Default)]
pub struct MemoryProgressStore {
    snapshots: RwLock<HashMap<String, ProgressSnapshot>>,
    failing: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn save(&self, snapshot: &ProgressSnapshot) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("progress store offline".to_string()));
        }
        self.snapshots
            .write()
            .await
            .insert(snapshot.session_id.clone(), snapshot.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<ProgressSnapshot>, StoreError> {
        Ok(self.snapshots.read().await.get(session_id).cloned())
    }

    async fn clear(&self, session_id: &str) -> Result<(), StoreError> {
        self.snapshots.write().await.remove(session_id);
        Ok(())
    }
}

/// Submission service that keeps accepted results in memory.
///
/// `fail_next` makes the next N calls fail with a retryable error and `latency`
/// holds every call open for a while, so an in-flight submit can be observed.
#[derive(Default)]
pub struct MemorySubmissionService {
    results: RwLock<Vec<TestResult>>,
    fail_next: AtomicUsize,
    calls: AtomicUsize,
    latency: Option<Duration>,
}

impl MemorySubmissionService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Number of submit calls received, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn results(&self) -> Vec<TestResult> {
        self.results.read().await.clone()
    }
}

#[async_trait]
impl SubmissionService for MemorySubmissionService {
    async fn submit(&self, submission: &Submission) -> Result<TestResult, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let failing = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Unavailable(
                "submission service unreachable".to_string(),
            ));
        }

        let result = submission.graded.clone();
        self.results.write().await.push(result.clone());
        Ok(result)
    }
}

/// Surveys and their question banks, keyed by test id.
#[derive(Default)]
pub struct MemoryCatalogStore {
    tests: RwLock<HashMap<String, (Survey, Vec<Question>)>>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, survey: Survey, questions: Vec<Question>) {
        self.tests
            .write()
            .await
            .insert(survey.id.clone(), (survey, questions));
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn survey(&self, test_id: &str) -> Result<Option<Survey>, StoreError> {
        Ok(self
            .tests
            .read()
            .await
            .get(test_id)
            .map(|(survey, _)| survey.clone()))
    }

    async fn questions(&self, test_id: &str) -> Result<Vec<Question>, StoreError> {
        Ok(self
            .tests
            .read()
            .await
            .get(test_id)
            .map(|(_, questions)| questions.iter().filter(|q| q.is_active).cloned().collect())
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.username.clone(), user);
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(username).cloned())
    }
}
