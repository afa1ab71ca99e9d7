use crate::{
    config::JobsConfig,
    error::{ApiError, Result},
    services::ledger_service::LedgerService,
};
use entity::sea_orm_active_enums::{JobStatus, LedgerEntryType};
use sea_orm::{entity::*, query::*, sea_query::Expr, DatabaseConnection, TransactionTrait};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Message written into jobs force-finalized by the stale sweep.
const SWEEP_ERROR_MESSAGE: &str = "System Timeout";

pub struct JobService {
    db: DatabaseConnection,
    ledger: Arc<LedgerService>,
    config: JobsConfig,
}

impl JobService {
    pub fn new(db: DatabaseConnection, ledger: Arc<LedgerService>, config: &JobsConfig) -> Self {
        Self {
            db,
            ledger,
            config: config.clone(),
        }
    }

    /// Debit the cost and insert the job row tracking that debit.
    ///
    /// If the insert fails after the debit succeeded, a compensating credit
    /// is issued before the error surfaces: money is never taken without
    /// either a tracked job or an immediate refund.
    #[instrument(skip(self, prompt))]
    pub async fn start_job(
        &self,
        user_id: Uuid,
        tool_id: &str,
        prompt: &str,
        cost: i32,
    ) -> Result<entity::generation_jobs::Model> {
        if cost <= 0 || cost > self.config.max_job_cost {
            return Err(ApiError::BadRequest(format!(
                "Job cost must be between 1 and {}",
                self.config.max_job_cost
            )));
        }

        let usage_log_id = self
            .ledger
            .debit(user_id, cost, &format!("{} generation", tool_id))
            .await?;

        match self
            .create_job(user_id, tool_id, prompt, cost, usage_log_id)
            .await
        {
            Ok(job) => Ok(job),
            Err(e) => {
                warn!(
                    "Job insert failed after debit (usage_log {}), issuing compensating credit",
                    usage_log_id
                );
                if let Err(refund_err) = self
                    .ledger
                    .credit(
                        user_id,
                        cost,
                        LedgerEntryType::Refund,
                        &format!("Refund: failed to create {} job", tool_id),
                    )
                    .await
                {
                    // The debit is now stranded; this must page someone.
                    error!(
                        "FAILED to refund {} credits to user {} after job insert failure: {:?}",
                        cost, user_id, refund_err
                    );
                }
                Err(e)
            }
        }
    }

    /// Insert the job row for an already-performed debit.
    pub async fn create_job(
        &self,
        user_id: Uuid,
        tool_id: &str,
        prompt: &str,
        cost: i32,
        usage_log_id: Uuid,
    ) -> Result<entity::generation_jobs::Model> {
        let now = time::OffsetDateTime::now_utc();
        let job = entity::generation_jobs::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            tool_id: Set(tool_id.to_string()),
            prompt: Set(prompt.to_string()),
            cost: Set(cost),
            usage_log_id: Set(usage_log_id),
            status: Set(JobStatus::Pending),
            result_url: Set(None),
            error_message: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let job = job.insert(&self.db).await?;

        info!(
            "Created job {} for user {} (tool {}, cost {})",
            job.id, user_id, tool_id, cost
        );

        Ok(job)
    }

    /// `pending -> processing`. No-op if the job already moved on.
    /// Also bumps `updated_at`, which doubles as the worker heartbeat the
    /// stale sweep measures against.
    #[instrument(skip(self))]
    pub async fn mark_processing(&self, job_id: Uuid) -> Result<bool> {
        let result = entity::generation_jobs::Entity::update_many()
            .col_expr(
                entity::generation_jobs::Column::Status,
                Expr::value(JobStatus::Processing),
            )
            .col_expr(
                entity::generation_jobs::Column::UpdatedAt,
                Expr::value(time::OffsetDateTime::now_utc()),
            )
            .filter(entity::generation_jobs::Column::Id.eq(job_id))
            .filter(entity::generation_jobs::Column::Status.eq(JobStatus::Pending))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Finalize to `completed`. Conditional on a non-terminal status, so a
    /// second call (or a racing sweep) becomes a no-op.
    #[instrument(skip(self))]
    pub async fn mark_completed(&self, job_id: Uuid, result_url: &str) -> Result<bool> {
        let result = entity::generation_jobs::Entity::update_many()
            .col_expr(
                entity::generation_jobs::Column::Status,
                Expr::value(JobStatus::Completed),
            )
            .col_expr(
                entity::generation_jobs::Column::ResultUrl,
                Expr::value(result_url),
            )
            .col_expr(
                entity::generation_jobs::Column::UpdatedAt,
                Expr::value(time::OffsetDateTime::now_utc()),
            )
            .filter(entity::generation_jobs::Column::Id.eq(job_id))
            .filter(
                entity::generation_jobs::Column::Status
                    .is_in([JobStatus::Pending, JobStatus::Processing]),
            )
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Finalize to `failed` and refund the job's cost.
    ///
    /// The refund rides in the same transaction as the status write and only
    /// happens when the conditional update wins, so a job refunds at most
    /// once no matter how many callers race.
    #[instrument(skip(self))]
    pub async fn mark_failed(&self, job_id: Uuid, error_message: &str) -> Result<bool> {
        let job = self.get_job(job_id).await?;
        self.finalize_failed(&job, error_message).await
    }

    /// Refund every job of this user stuck in `processing` past the TTL.
    /// Safe to run repeatedly and concurrently with live workers.
    #[instrument(skip(self))]
    pub async fn sweep_stale(&self, user_id: Uuid) -> Result<usize> {
        self.sweep(Some(user_id)).await
    }

    /// Global variant run by the background task.
    #[instrument(skip(self))]
    pub async fn sweep_stale_all(&self) -> Result<usize> {
        self.sweep(None).await
    }

    async fn sweep(&self, user_id: Option<Uuid>) -> Result<usize> {
        let cutoff = time::OffsetDateTime::now_utc()
            - time::Duration::minutes(self.config.stale_after_minutes);

        let mut query = entity::generation_jobs::Entity::find()
            .filter(entity::generation_jobs::Column::Status.eq(JobStatus::Processing))
            .filter(entity::generation_jobs::Column::UpdatedAt.lt(cutoff));
        if let Some(user_id) = user_id {
            query = query.filter(entity::generation_jobs::Column::UserId.eq(user_id));
        }

        let stale = query.all(&self.db).await?;
        let candidates = stale.len();

        let mut swept = 0;
        for job in stale {
            // A worker may finalize between the select and this write; the
            // conditional update decides who wins and the loser refunds nothing.
            if self.finalize_failed(&job, SWEEP_ERROR_MESSAGE).await? {
                swept += 1;
            }
        }

        if candidates > 0 {
            info!(
                "Stale sweep finalized {}/{} jobs past {}min TTL",
                swept, candidates, self.config.stale_after_minutes
            );
        }

        Ok(swept)
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<entity::generation_jobs::Model> {
        entity::generation_jobs::Entity::find_by_id(job_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Job {}", job_id)))
    }

    pub async fn list_jobs(
        &self,
        user_id: Uuid,
        limit: u64,
    ) -> Result<Vec<entity::generation_jobs::Model>> {
        let jobs = entity::generation_jobs::Entity::find()
            .filter(entity::generation_jobs::Column::UserId.eq(user_id))
            .order_by_desc(entity::generation_jobs::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await?;

        Ok(jobs)
    }

    async fn finalize_failed(
        &self,
        job: &entity::generation_jobs::Model,
        error_message: &str,
    ) -> Result<bool> {
        let txn = self.db.begin().await?;

        let result = entity::generation_jobs::Entity::update_many()
            .col_expr(
                entity::generation_jobs::Column::Status,
                Expr::value(JobStatus::Failed),
            )
            .col_expr(
                entity::generation_jobs::Column::ErrorMessage,
                Expr::value(error_message),
            )
            .col_expr(
                entity::generation_jobs::Column::UpdatedAt,
                Expr::value(time::OffsetDateTime::now_utc()),
            )
            .filter(entity::generation_jobs::Column::Id.eq(job.id))
            .filter(
                entity::generation_jobs::Column::Status
                    .is_in([JobStatus::Pending, JobStatus::Processing]),
            )
            .exec(&txn)
            .await?;

        let transitioned = result.rows_affected > 0;

        if transitioned {
            self.ledger
                .credit_in_txn(
                    job.user_id,
                    job.cost,
                    LedgerEntryType::Refund,
                    &format!("Refund for job {}: {}", job.id, error_message),
                    &txn,
                )
                .await?;
        }

        txn.commit().await?;

        if transitioned {
            info!(
                "Job {} failed ({}), refunded {} credits to user {}",
                job.id, error_message, job.cost, job.user_id
            );
        }

        Ok(transitioned)
    }
}
