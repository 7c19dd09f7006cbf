// src/repository/postgres.rs

use async_trait::async_trait;
use sqlx::{PgPool, types::Json};

use crate::models::{
    question::{Difficulty, OptionTag, Question},
    session::{ProgressSnapshot, Submission, TestResult},
    survey::{Survey, SurveyStatus},
    user::{User, UserStatus},
};

use super::{CatalogStore, ProgressStore, StoreError, SubmissionService, UserStore};

fn to_u32(value: i32, column: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative {}: {}", column, value)))
}

/// Progress snapshots in the `test_progress` table, one row per session.
#[derive(Clone)]
pub struct PgProgressStore {
    pool: PgPool,
}

impl PgProgressStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ProgressRow {
    snapshot: Json<ProgressSnapshot>,
}

#[async_trait]
impl ProgressStore for PgProgressStore {
    async fn save(&self, snapshot: &ProgressSnapshot) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO test_progress (session_id, user_id, test_id, snapshot, saved_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (session_id) DO UPDATE SET
                snapshot = EXCLUDED.snapshot,
                saved_at = EXCLUDED.saved_at
            "#,
        )
        .bind(&snapshot.session_id)
        .bind(snapshot.user_id)
        .bind(&snapshot.test_id)
        .bind(Json(snapshot))
        .bind(snapshot.saved_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<ProgressSnapshot>, StoreError> {
        let row = sqlx::query_as::<_, ProgressRow>(
            "SELECT snapshot FROM test_progress WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.snapshot.0))
    }

    async fn clear(&self, session_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM test_progress WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Stores graded attempts in `test_results`.
///
/// Keyed by session id so a retried submit that already reached the database
/// does not record the attempt twice.
#[derive(Clone)]
pub struct PgSubmissionService {
    pool: PgPool,
}

impl PgSubmissionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubmissionService for PgSubmissionService {
    async fn submit(&self, submission: &Submission) -> Result<TestResult, StoreError> {
        let result = &submission.graded;

        sqlx::query(
            r#"
            INSERT INTO test_results (
                session_id, user_id, test_id, total_questions, attempted, correct,
                total_marks, obtained_marks, percentage, passed, time_taken_seconds,
                answers, section_scores, generated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (session_id) DO NOTHING
            "#,
        )
        .bind(&submission.session_id)
        .bind(submission.user_id)
        .bind(&submission.test_id)
        .bind(result.total_questions as i32)
        .bind(result.attempted as i32)
        .bind(result.correct as i32)
        .bind(result.total_marks as i32)
        .bind(result.obtained_marks as i32)
        .bind(result.percentage as i32)
        .bind(result.passed)
        .bind(result.time_taken_seconds as i64)
        .bind(Json(&submission.answers))
        .bind(Json(&result.section_scores))
        .bind(result.generated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to record result for {}: {:?}", submission.session_id, e);
            StoreError::Unavailable(e.to_string())
        })?;

        Ok(result.clone())
    }
}

#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SurveyRow {
    id: String,
    name: String,
    description: Option<String>,
    duration_minutes: i32,
    total_questions: i32,
    passing_percentage: i32,
    max_attempts: i32,
    status: String,
}

impl TryFrom<SurveyRow> for Survey {
    type Error = StoreError;

    fn try_from(row: SurveyRow) -> Result<Self, Self::Error> {
        let status = match row.status.as_str() {
            "draft" => SurveyStatus::Draft,
            "active" => SurveyStatus::Active,
            "inactive" => SurveyStatus::Inactive,
            "archived" => SurveyStatus::Archived,
            other => return Err(StoreError::Corrupt(format!("survey status '{}'", other))),
        };
        Ok(Survey {
            id: row.id,
            name: row.name,
            description: row.description,
            duration_minutes: to_u32(row.duration_minutes, "duration_minutes")?,
            total_questions: to_u32(row.total_questions, "total_questions")?,
            passing_percentage: to_u32(row.passing_percentage, "passing_percentage")?,
            max_attempts: to_u32(row.max_attempts, "max_attempts")?,
            status,
        })
    }
}

#[derive(sqlx::FromRow)]
struct QuestionRow {
    id: String,
    survey_id: String,
    section_id: String,
    question_text: String,
    option_a: String,
    option_b: String,
    option_c: String,
    option_d: String,
    correct_answer: String,
    complexity: String,
    marks: i32,
    explanation: Option<String>,
    topic: Option<String>,
    is_active: bool,
}

impl TryFrom<QuestionRow> for Question {
    type Error = StoreError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        let correct_answer = OptionTag::parse(&row.correct_answer).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "question {} has answer '{}'",
                row.id, row.correct_answer
            ))
        })?;
        let complexity = match row.complexity.as_str() {
            "easy" => Difficulty::Easy,
            "medium" => Difficulty::Medium,
            "hard" => Difficulty::Hard,
            other => return Err(StoreError::Corrupt(format!("complexity '{}'", other))),
        };
        Ok(Question {
            marks: to_u32(row.marks, "marks")?,
            id: row.id,
            survey_id: row.survey_id,
            section_id: row.section_id,
            question_text: row.question_text,
            options: [row.option_a, row.option_b, row.option_c, row.option_d],
            correct_answer,
            complexity,
            explanation: row.explanation,
            topic: row.topic,
            is_active: row.is_active,
        })
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn survey(&self, test_id: &str) -> Result<Option<Survey>, StoreError> {
        let row = sqlx::query_as::<_, SurveyRow>(
            r#"
            SELECT id, name, description, duration_minutes, total_questions,
                   passing_percentage, max_attempts, status
            FROM surveys
            WHERE id = $1
            "#,
        )
        .bind(test_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Survey::try_from).transpose()
    }

    async fn questions(&self, test_id: &str) -> Result<Vec<Question>, StoreError> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, survey_id, section_id, question_text,
                   option_a, option_b, option_c, option_d,
                   correct_answer, complexity, marks, explanation, topic, is_active
            FROM questions
            WHERE survey_id = $1 AND is_active = TRUE
            ORDER BY display_order, id
            "#,
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Question::try_from).collect()
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts the user unless the username is taken. Returns whether a row was created.
    pub async fn insert_if_absent(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, password, role, status)
            VALUES ($1, $2, $3, 'active')
            ON CONFLICT (username) DO NOTHING
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(role)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password: String,
    role: String,
    permissions: Option<Json<Vec<String>>>,
    status: String,
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, password, role, permissions, status
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            let status = UserStatus::parse(&r.status)
                .ok_or_else(|| StoreError::Corrupt(format!("user status '{}'", r.status)))?;
            Ok(User {
                id: r.id,
                username: r.username,
                password: r.password,
                role: r.role,
                permissions: r.permissions.map(|p| p.0),
                status,
            })
        })
        .transpose()
    }
}
