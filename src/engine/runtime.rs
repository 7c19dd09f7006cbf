// src/engine/runtime.rs

use std::{
    sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use tokio::{
    sync::{Mutex, broadcast},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

use crate::{
    models::{
        question::OptionTag,
        session::{ProgressSnapshot, SessionPhase, SessionView, Submission, TestResult},
    },
    repository::{ProgressStore, SubmissionService},
};

use super::{
    error::SessionError,
    session::{SessionStart, TestSession, TickOutcome},
};

/// Timing knobs of a live session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Countdown resolution. One tick removes one second of remaining time.
    pub tick_interval: Duration,
    pub autosave_interval: Duration,
    /// How long a settled session stays registered so its outcome can still be read.
    pub settled_retention: Duration,
    pub sweep_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            autosave_interval: Duration::from_secs(30),
            settled_retention: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Notifications for the host about things that happen without a request.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    TimeExpired { session_id: String },
    AutoSubmitted { result: TestResult },
    /// Fatal for the attempt; the host must show a blocking notice.
    AutoSubmitFailed { session_id: String, error: String },
    SaveFailed { session_id: String, error: String },
}

/// Timer and result slots hold no invariants a panic could break, so poisoning is ignored.
fn lock_slot<T>(slot: &StdMutex<T>) -> MutexGuard<'_, T> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Inner {
    session: Mutex<TestSession>,
    /// Serializes writes to the progress store so a stale snapshot never lands last.
    save_lock: Mutex<()>,
    progress: Arc<dyn ProgressStore>,
    submissions: Arc<dyn SubmissionService>,
    events: broadcast::Sender<SessionEvent>,
    timers: StdMutex<Vec<JoinHandle<()>>>,
    result: StdMutex<Option<TestResult>>,
    /// Set once the session needs nothing more from its timers.
    settled_at: StdMutex<Option<Instant>>,
    session_id: String,
}

impl Inner {
    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn cancel_timers(&self) {
        let handles = std::mem::take(&mut *lock_slot(&self.timers));
        for handle in handles {
            handle.abort();
        }
    }

    fn store_result(&self, result: &TestResult) {
        *lock_slot(&self.result) = Some(result.clone());
    }

    fn settle(&self) {
        *lock_slot(&self.settled_at) = Some(Instant::now());
    }

    async fn save(&self, snapshot: &ProgressSnapshot) -> Result<(), SessionError> {
        let _guard = self.save_lock.lock().await;
        self.progress
            .save(snapshot)
            .await
            .map_err(SessionError::Persistence)
    }

    /// Saves the current state unless the session has terminated.
    /// Failures are logged and published, never returned.
    async fn persist_latest(&self, reason: &str) {
        let _guard = self.save_lock.lock().await;
        let snapshot = {
            let session = self.session.lock().await;
            if session.is_terminated() {
                return;
            }
            session.snapshot()
        };
        match self.progress.save(&snapshot).await {
            Ok(()) => tracing::debug!("Saved progress of {} ({})", self.session_id, reason),
            Err(e) => {
                tracing::warn!(
                    "Failed to save progress of {} ({}): {}",
                    self.session_id,
                    reason,
                    e
                );
                self.publish(SessionEvent::SaveFailed {
                    session_id: self.session_id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    /// Sends a prepared submission and settles the session on the outcome.
    async fn complete_submission(&self, submission: Submission) -> Result<TestResult, SessionError> {
        self.persist_latest("pre-submit").await;

        match self.submissions.submit(&submission).await {
            Ok(result) => {
                self.session.lock().await.submit_succeeded();
                self.cancel_timers();
                self.store_result(&result);
                self.settle();
                {
                    let _guard = self.save_lock.lock().await;
                    if let Err(e) = self.progress.clear(&self.session_id).await {
                        tracing::warn!(
                            "Submitted {} but failed to clear its progress: {}",
                            self.session_id,
                            e
                        );
                    }
                }
                tracing::info!(
                    "Session {} submitted: {}/{} correct, {}%, passed={}",
                    self.session_id,
                    result.correct,
                    result.total_questions,
                    result.percentage,
                    result.passed
                );
                Ok(result)
            }
            Err(e) => {
                self.session.lock().await.submit_failed();
                // Progress was saved before the attempt, so a later resume can retry it.
                self.settle();
                tracing::warn!("Submission of {} failed: {}", self.session_id, e);
                Err(SessionError::Submission(e))
            }
        }
    }

    async fn auto_submit(&self) {
        let submission = match self.session.lock().await.begin_submit() {
            Ok(submission) => submission,
            Err(e) => {
                // A manual submit got there first.
                tracing::debug!("Skipping auto-submit of {}: {}", self.session_id, e);
                return;
            }
        };

        tracing::info!("Time is up for {}; submitting automatically", self.session_id);
        match self.complete_submission(submission).await {
            Ok(result) => self.publish(SessionEvent::AutoSubmitted { result }),
            Err(e) => {
                tracing::error!("Automatic submission of {} failed: {}", self.session_id, e);
                self.publish(SessionEvent::AutoSubmitFailed {
                    session_id: self.session_id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
}

async fn run_countdown(inner: Weak<Inner>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };

        let outcome = {
            let mut session = inner.session.lock().await;
            if session.is_terminated() {
                break;
            }
            session.tick()
        };

        if outcome == TickOutcome::Expired {
            inner.publish(SessionEvent::TimeExpired {
                session_id: inner.session_id.clone(),
            });
            // Runs outside this task so cancelling the countdown cannot interrupt it.
            tokio::spawn(async move { inner.auto_submit().await });
            break;
        }
    }
}

async fn run_autosave(inner: Weak<Inner>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await;

    loop {
        interval.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };

        let phase = inner.session.lock().await.phase();
        match phase {
            SessionPhase::Terminated => break,
            SessionPhase::Running => inner.persist_latest("autosave").await,
            _ => {}
        }
    }
}

/// Sole owner of a live test session.
///
/// All operations are serialized through one lock around the state machine.
/// Dropping the handle cancels its countdown and autosave tasks.
pub struct SessionHandle {
    inner: Arc<Inner>,
    session_id: String,
    test_id: String,
    user_id: i64,
}

impl SessionHandle {
    /// Starts or resumes a session. Prior progress is loaded from `progress`.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn start(
        start: SessionStart,
        progress: Arc<dyn ProgressStore>,
        submissions: Arc<dyn SubmissionService>,
        settings: &SessionSettings,
    ) -> Result<SessionHandle, SessionError> {
        let prior = progress
            .load(&start.session_id)
            .await
            .map_err(SessionError::Persistence)?;
        let resumed = prior.is_some();

        let session = TestSession::start(start, prior)?;
        let session_id = session.session_id().to_string();
        let test_id = session.test_id().to_string();
        let user_id = session.user_id();
        let expired_on_resume = session.phase() == SessionPhase::Submitting;

        let (events, _) = broadcast::channel(32);
        let inner = Arc::new(Inner {
            session: Mutex::new(session),
            save_lock: Mutex::new(()),
            progress,
            submissions,
            events,
            timers: StdMutex::new(Vec::new()),
            result: StdMutex::new(None),
            settled_at: StdMutex::new(None),
            session_id: session_id.clone(),
        });

        let countdown = tokio::spawn(run_countdown(Arc::downgrade(&inner), settings.tick_interval));
        let autosave = tokio::spawn(run_autosave(
            Arc::downgrade(&inner),
            settings.autosave_interval,
        ));
        lock_slot(&inner.timers).extend([countdown, autosave]);

        if expired_on_resume {
            let expired = inner.clone();
            tokio::spawn(async move { expired.auto_submit().await });
        }

        tracing::info!(
            "{} session {} for test {} (user {})",
            if resumed { "Resumed" } else { "Started" },
            session_id,
            test_id,
            user_id
        );

        Ok(SessionHandle {
            inner,
            session_id,
            test_id,
            user_id,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn test_id(&self) -> &str {
        &self.test_id
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub async fn view(&self) -> SessionView {
        self.inner.session.lock().await.view()
    }

    pub async fn phase(&self) -> SessionPhase {
        self.inner.session.lock().await.phase()
    }

    pub async fn remaining_seconds(&self) -> u64 {
        self.inner.session.lock().await.remaining_seconds()
    }

    /// When the session was submitted, exited, or gave up on its automatic submission.
    pub fn settled_at(&self) -> Option<Instant> {
        *lock_slot(&self.inner.settled_at)
    }

    /// Result of the submission that terminated this session, if any.
    pub fn result(&self) -> Option<TestResult> {
        lock_slot(&self.inner.result).clone()
    }

    /// Records an answer and schedules a save without waiting for it.
    pub async fn select_answer(&self, index: usize, option: OptionTag) -> Result<(), SessionError> {
        self.inner.session.lock().await.select_answer(index, option)?;

        let inner = self.inner.clone();
        tokio::spawn(async move { inner.persist_latest("answer").await });
        Ok(())
    }

    pub async fn toggle_review(&self, index: usize) -> Result<bool, SessionError> {
        self.inner.session.lock().await.toggle_review(index)
    }

    pub async fn navigate(&self, target: i64) -> Result<usize, SessionError> {
        self.inner.session.lock().await.navigate(target)
    }

    /// Applies a connectivity transition. Reconnecting flushes progress right away.
    pub async fn set_online(&self, online: bool) -> SessionPhase {
        let (changed, phase) = {
            let mut session = self.inner.session.lock().await;
            let changed = if online {
                session.connectivity_restored()
            } else {
                session.connectivity_lost()
            };
            (changed, session.phase())
        };

        if changed {
            tracing::info!(
                "Session {} {} after connectivity change",
                self.session_id,
                if online { "resumed" } else { "paused" }
            );
        }
        if online {
            self.inner.persist_latest("reconnect").await;
        }
        phase
    }

    pub async fn pause(&self) -> Result<(), SessionError> {
        self.inner.session.lock().await.pause_manual()?;
        tracing::info!("Session {} paused by a manager", self.session_id);
        Ok(())
    }

    pub async fn resume(&self) -> Result<SessionPhase, SessionError> {
        let phase = self.inner.session.lock().await.resume_manual()?;
        tracing::info!("Session {} resumed by a manager", self.session_id);
        Ok(phase)
    }

    /// Saves the current state now and reports the outcome to the caller.
    pub async fn save_now(&self) -> Result<(), SessionError> {
        let snapshot = {
            let session = self.inner.session.lock().await;
            if session.is_terminated() {
                return Err(SessionError::Terminated);
            }
            session.snapshot()
        };
        self.inner.save(&snapshot).await
    }

    /// Ends the session without a result, leaving a snapshot to resume from.
    ///
    /// A failed final save is reported as an event; the session terminates regardless.
    pub async fn exit(&self) -> Result<(), SessionError> {
        let snapshot = {
            let mut session = self.inner.session.lock().await;
            let snapshot = session.snapshot();
            session.exit()?;
            snapshot
        };
        self.inner.cancel_timers();
        self.inner.settle();

        if let Err(e) = self.inner.save(&snapshot).await {
            tracing::warn!("Final save of {} failed: {}", self.session_id, e);
            self.inner.publish(SessionEvent::SaveFailed {
                session_id: self.session_id.clone(),
                error: e.to_string(),
            });
        }
        tracing::info!("Session {} exited without submission", self.session_id);
        Ok(())
    }

    /// Submits the attempt.
    ///
    /// A concurrent call while one is in flight fails with `SubmissionInFlight`.
    /// A failed call leaves the session in `Submitting` so it can be retried.
    pub async fn submit(&self) -> Result<TestResult, SessionError> {
        let submission = self.inner.session.lock().await.begin_submit()?;
        self.inner.complete_submission(submission).await
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.inner.cancel_timers();
    }
}
