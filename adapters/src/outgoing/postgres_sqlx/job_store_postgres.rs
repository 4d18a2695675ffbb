use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use tracing::{debug, instrument};

use domain::{
    auth::UserId,
    job::{ExternalJobId, GenerationJob, JobId, JobStatus},
    provider::ProviderKind,
};
use reelforge_application::{
    error::{AppError, AppResult},
    ports::outgoing::job_store::{CountedSubmission, JobStorePort, NewJobRecord},
};

use super::utils::{PostgresExecutor, begin_transaction, commit_transaction};

const INSERT_JOB_SQL: &str = r"
    INSERT INTO generation_jobs (
        user_id, preset_id, external_job_id, provider, model, prompt,
        request_params, status, cost, duration_sec, aspect_ratio,
        generate_audio
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
    RETURNING
        id, user_id, preset_id, external_job_id, provider, model, prompt,
        request_params, status, cost, duration_sec, aspect_ratio,
        generate_audio, output_url, title, created_at
";

pub struct PostgresJobStoreAdapter {
    pool: PgPool,
    executor: PostgresExecutor,
}

impl PostgresJobStoreAdapter {
    pub fn new(pool: PgPool, query_timeout_secs: u64) -> Self {
        Self {
            pool,
            executor: PostgresExecutor::new(query_timeout_secs),
        }
    }
}

#[async_trait::async_trait]
impl JobStorePort for PostgresJobStoreAdapter {
    #[instrument(skip(self, record), fields(preset_id = %record.preset_id))]
    async fn insert_job(&self, record: NewJobRecord) -> AppResult<GenerationJob> {
        let row = self
            .executor
            .execute_with_timeout(
                || bind_new_job(&record).fetch_one(&self.pool),
                "Failed to insert generation job",
            )
            .await?;

        job_from_row(&row)
    }

    #[instrument(skip(self))]
    async fn find_by_external_id(
        &self,
        user_id: &UserId,
        external_job_id: &ExternalJobId,
    ) -> AppResult<Option<GenerationJob>> {
        let row = self
            .executor
            .execute_with_timeout(
                || {
                    sqlx::query(
                        r"
                    SELECT id, user_id, preset_id, external_job_id, provider, model,
                           prompt, request_params, status, cost, duration_sec,
                           aspect_ratio, generate_audio, output_url, title, created_at
                    FROM generation_jobs
                    WHERE user_id = $1 AND external_job_id = $2
                    ",
                    )
                    .bind(user_id.as_uuid())
                    .bind(external_job_id.as_str())
                    .fetch_optional(&self.pool)
                },
                "Failed to look up job by external id",
            )
            .await?;

        row.as_ref().map(job_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn mark_terminal(
        &self,
        user_id: &UserId,
        external_job_id: &ExternalJobId,
        status: JobStatus,
        output_url: Option<String>,
    ) -> AppResult<bool> {
        let result = self
            .executor
            .execute_with_timeout(
                || {
                    sqlx::query(
                        r"
                    UPDATE generation_jobs
                    SET status = $3, output_url = COALESCE($4, output_url)
                    WHERE user_id = $1
                      AND external_job_id = $2
                      AND status NOT IN ('succeeded', 'failed')
                    ",
                    )
                    .bind(user_id.as_uuid())
                    .bind(external_job_id.as_str())
                    .bind(status.as_str())
                    .bind(output_url.as_deref())
                    .execute(&self.pool)
                },
                "Failed to finalize job status",
            )
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn list_recent(
        &self,
        user_id: &UserId,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<GenerationJob>, i64)> {
        let rows = self
            .executor
            .execute_with_timeout(
                || {
                    sqlx::query(
                        r"
                    SELECT id, user_id, preset_id, external_job_id, provider, model,
                           prompt, request_params, status, cost, duration_sec,
                           aspect_ratio, generate_audio, output_url, title, created_at
                    FROM generation_jobs
                    WHERE user_id = $1
                    ORDER BY created_at DESC, id DESC
                    LIMIT $2 OFFSET $3
                    ",
                    )
                    .bind(user_id.as_uuid())
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.pool)
                },
                "Failed to list jobs",
            )
            .await?;

        let total_row = self
            .executor
            .execute_with_timeout(
                || {
                    sqlx::query(r"SELECT COUNT(*) AS total FROM generation_jobs WHERE user_id = $1")
                        .bind(user_id.as_uuid())
                        .fetch_one(&self.pool)
                },
                "Failed to count jobs",
            )
            .await?;
        let total: i64 = total_row.try_get("total").map_err(map_column_error)?;

        let jobs = rows
            .iter()
            .map(job_from_row)
            .collect::<AppResult<Vec<_>>>()?;
        Ok((jobs, total))
    }

    #[instrument(skip(self, title))]
    async fn set_title(
        &self,
        user_id: &UserId,
        job_id: JobId,
        title: &str,
    ) -> AppResult<Option<GenerationJob>> {
        let row = self
            .executor
            .execute_with_timeout(
                || {
                    sqlx::query(
                        r"
                    UPDATE generation_jobs
                    SET title = $3
                    WHERE user_id = $1 AND id = $2
                    RETURNING id, user_id, preset_id, external_job_id, provider, model,
                              prompt, request_params, status, cost, duration_sec,
                              aspect_ratio, generate_audio, output_url, title, created_at
                    ",
                    )
                    .bind(user_id.as_uuid())
                    .bind(job_id.0)
                    .bind(title)
                    .fetch_optional(&self.pool)
                },
                "Failed to rename job",
            )
            .await?;

        row.as_ref().map(job_from_row).transpose()
    }

    /// Hard delete. `library_asset_refs` rows go with the job through the
    /// foreign key's `ON DELETE CASCADE`.
    #[instrument(skip(self))]
    async fn delete_job(&self, user_id: &UserId, job_id: JobId) -> AppResult<bool> {
        let result = self
            .executor
            .execute_with_timeout(
                || {
                    sqlx::query(r"DELETE FROM generation_jobs WHERE id = $1 AND user_id = $2")
                        .bind(job_id.0)
                        .bind(user_id.as_uuid())
                        .execute(&self.pool)
                },
                "Failed to delete job",
            )
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn begin_counted_submission(
        &self,
        user_id: &UserId,
        preset_id: &str,
    ) -> AppResult<Box<dyn CountedSubmission>> {
        let mut tx = begin_transaction(&self.pool).await?;

        // Transaction-scoped lock so concurrent submissions against the same
        // (user, preset) pair serialize and observe consecutive run indexes.
        sqlx::query(r"SELECT pg_advisory_xact_lock(hashtext($1), hashtext($2))")
            .bind(preset_id)
            .bind(user_id.as_uuid().to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError {
                message: format!("Failed to acquire submission lock: {}", e),
            })?;

        let row = sqlx::query(
            r"SELECT COUNT(*) AS previous FROM generation_jobs WHERE user_id = $1 AND preset_id = $2",
        )
        .bind(user_id.as_uuid())
        .bind(preset_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError {
            message: format!("Failed to count prior submissions: {}", e),
        })?;
        let previous: i64 = row.try_get("previous").map_err(map_column_error)?;

        debug!(preset_id, run_index = previous + 1, "counted submission opened");
        Ok(Box::new(PostgresCountedSubmission {
            tx,
            run_index: previous + 1,
        }))
    }
}

/// Open transaction holding the advisory lock. Dropped without `commit`,
/// Postgres rolls back the charge and the job row together.
pub struct PostgresCountedSubmission {
    tx: Transaction<'static, Postgres>,
    run_index: i64,
}

#[async_trait::async_trait]
impl CountedSubmission for PostgresCountedSubmission {
    fn run_index(&self) -> i64 {
        self.run_index
    }

    async fn charge(&mut self, user_id: &UserId, amount: i64) -> AppResult<i64> {
        let row = sqlx::query(
            r"
            UPDATE user_balances
            SET credits = credits - $2, updated_at = now()
            WHERE user_id = $1 AND credits >= $2
            RETURNING credits
            ",
        )
        .bind(user_id.as_uuid())
        .bind(amount)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError {
            message: format!("Failed to charge inside submission: {}", e),
        })?;

        match row {
            Some(record) => record.try_get("credits").map_err(map_column_error),
            None => {
                let balance_row =
                    sqlx::query(r"SELECT credits FROM user_balances WHERE user_id = $1")
                        .bind(user_id.as_uuid())
                        .fetch_optional(&mut *self.tx)
                        .await
                        .map_err(|e| AppError::DatabaseError {
                            message: format!("Failed to read balance inside submission: {}", e),
                        })?;
                let balance = match balance_row {
                    Some(record) => record.try_get("credits").map_err(map_column_error)?,
                    None => 0,
                };
                Err(AppError::InsufficientCredits {
                    balance,
                    required: amount,
                })
            }
        }
    }

    async fn insert_job(&mut self, record: NewJobRecord) -> AppResult<GenerationJob> {
        let row = bind_new_job(&record)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| AppError::DatabaseError {
                message: format!("Failed to insert job inside submission: {}", e),
            })?;

        job_from_row(&row)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        commit_transaction(self.tx).await
    }
}

fn bind_new_job(
    record: &NewJobRecord,
) -> sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(INSERT_JOB_SQL)
        .bind(record.user_id.as_uuid())
        .bind(&record.preset_id)
        .bind(record.external_job_id.as_str())
        .bind(record.provider.as_str())
        .bind(&record.model)
        .bind(&record.prompt)
        .bind(&record.request_params)
        .bind(record.status.as_str())
        .bind(record.cost)
        .bind(record.duration_sec)
        .bind(record.aspect_ratio.as_deref())
        .bind(record.generate_audio)
}

fn job_from_row(row: &PgRow) -> AppResult<GenerationJob> {
    let provider_raw: String = row.try_get("provider").map_err(map_column_error)?;
    let status_raw: String = row.try_get("status").map_err(map_column_error)?;
    let external_job_id: Option<String> =
        row.try_get("external_job_id").map_err(map_column_error)?;

    Ok(GenerationJob {
        id: JobId(row.try_get("id").map_err(map_column_error)?),
        user_id: UserId(row.try_get("user_id").map_err(map_column_error)?),
        preset_id: row.try_get("preset_id").map_err(map_column_error)?,
        external_job_id: external_job_id.map(ExternalJobId),
        provider: ProviderKind::parse(&provider_raw)?,
        model: row.try_get("model").map_err(map_column_error)?,
        prompt: row.try_get("prompt").map_err(map_column_error)?,
        request_params: row.try_get("request_params").map_err(map_column_error)?,
        status: JobStatus::parse(&status_raw)?,
        cost: row.try_get("cost").map_err(map_column_error)?,
        duration_sec: row.try_get("duration_sec").map_err(map_column_error)?,
        aspect_ratio: row.try_get("aspect_ratio").map_err(map_column_error)?,
        generate_audio: row.try_get("generate_audio").map_err(map_column_error)?,
        output_url: row.try_get("output_url").map_err(map_column_error)?,
        title: row.try_get("title").map_err(map_column_error)?,
        created_at: row.try_get("created_at").map_err(map_column_error)?,
    })
}

fn map_column_error(err: sqlx::Error) -> AppError {
    AppError::DatabaseError {
        message: format!("Failed to decode job row: {}", err),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::env;

    use sqlx::postgres::PgPoolOptions;
    use uuid::Uuid;

    use super::*;

    async fn store() -> (PostgresJobStoreAdapter, PgPool) {
        let url = env::var("DATABASE_URL").unwrap();
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(&url)
            .await
            .unwrap();
        sqlx::migrate!("../migrations").run(&pool).await.unwrap();
        (PostgresJobStoreAdapter::new(pool.clone(), 10), pool)
    }

    fn record(user_id: &UserId) -> NewJobRecord {
        NewJobRecord {
            user_id: user_id.clone(),
            preset_id: "kling_o1_edit".to_string(),
            external_job_id: ExternalJobId(Uuid::new_v4().to_string()),
            provider: ProviderKind::FalQueue,
            model: "fal-ai/kling-video/o1/standard/video-to-video".to_string(),
            prompt: "a foggy harbor".to_string(),
            request_params: serde_json::json!({}),
            status: JobStatus::Processing,
            cost: 4,
            duration_sec: Some(5.0),
            aspect_ratio: None,
            generate_audio: None,
        }
    }

    #[tokio::test]
    #[ignore = "needs a live Postgres via DATABASE_URL"]
    async fn hard_delete_cascades_library_asset_refs() {
        let (store, pool) = store().await;
        let user = UserId::new();

        let job = store.insert_job(record(&user)).await.unwrap();
        sqlx::query(
            r"INSERT INTO library_asset_refs (user_id, job_id, asset_url) VALUES ($1, $2, $3)",
        )
        .bind(user.as_uuid())
        .bind(job.id.0)
        .bind("https://cdn.example.com/outputs/a.mp4")
        .execute(&pool)
        .await
        .unwrap();

        assert!(store.delete_job(&user, job.id).await.unwrap());

        let row = sqlx::query(r"SELECT COUNT(*) AS refs FROM library_asset_refs WHERE job_id = $1")
            .bind(job.id.0)
            .fetch_one(&pool)
            .await
            .unwrap();
        let refs: i64 = row.try_get("refs").unwrap();
        assert_eq!(refs, 0);
    }
}
