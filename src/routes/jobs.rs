use axum::{
    extract::{Path, State},
    Json,
};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::{
    app_state::AppState,
    error::{ApiError, Result},
    middleware::UserIdentity,
    models::{
        common::SuccessResponse,
        jobs::{
            CompleteJobRequest, CreateJobRequest, FailJobRequest, JobListData, JobListResponse,
            JobResponse,
        },
    },
};

/// POST /api/v1/jobs
#[instrument(skip(state, request))]
pub async fn create_job(
    State(state): State<AppState>,
    identity: UserIdentity,
    Json(request): Json<CreateJobRequest>,
) -> Result<Json<JobResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    let job = state
        .job_service
        .start_job(
            identity.user_id,
            &request.tool_id,
            &request.prompt,
            request.cost,
        )
        .await?;

    Ok(Json(SuccessResponse::new(job.into())))
}

/// GET /api/v1/jobs
///
/// Listing doubles as the session-entry sweep: abandoned jobs of this user
/// are refunded before the list is read, so the returned balance-affecting
/// state is already settled.
#[instrument(skip(state, identity))]
pub async fn list_jobs(
    State(state): State<AppState>,
    identity: UserIdentity,
) -> Result<Json<JobListResponse>> {
    let swept = state.job_service.sweep_stale(identity.user_id).await?;

    let jobs = state.job_service.list_jobs(identity.user_id, 50).await?;

    Ok(Json(SuccessResponse::new(JobListData {
        jobs: jobs.into_iter().map(Into::into).collect(),
        swept,
    })))
}

/// GET /api/v1/jobs/{id}
#[instrument(skip(state, identity))]
pub async fn get_job(
    State(state): State<AppState>,
    identity: UserIdentity,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobResponse>> {
    let job = owned_job(&state, &identity, job_id).await?;
    Ok(Json(SuccessResponse::new(job.into())))
}

/// POST /api/v1/jobs/{id}/processing
#[instrument(skip(state, identity))]
pub async fn mark_processing(
    State(state): State<AppState>,
    identity: UserIdentity,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobResponse>> {
    owned_job(&state, &identity, job_id).await?;

    state.job_service.mark_processing(job_id).await?;

    let job = state.job_service.get_job(job_id).await?;
    Ok(Json(SuccessResponse::new(job.into())))
}

/// POST /api/v1/jobs/{id}/complete
#[instrument(skip(state, identity, request))]
pub async fn complete_job(
    State(state): State<AppState>,
    identity: UserIdentity,
    Path(job_id): Path<Uuid>,
    Json(request): Json<CompleteJobRequest>,
) -> Result<Json<JobResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    owned_job(&state, &identity, job_id).await?;

    state
        .job_service
        .mark_completed(job_id, &request.result_url)
        .await?;

    let job = state.job_service.get_job(job_id).await?;
    Ok(Json(SuccessResponse::new(job.into())))
}

/// POST /api/v1/jobs/{id}/fail
#[instrument(skip(state, identity, request))]
pub async fn fail_job(
    State(state): State<AppState>,
    identity: UserIdentity,
    Path(job_id): Path<Uuid>,
    Json(request): Json<FailJobRequest>,
) -> Result<Json<JobResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    owned_job(&state, &identity, job_id).await?;

    state
        .job_service
        .mark_failed(job_id, &request.error_message)
        .await?;

    let job = state.job_service.get_job(job_id).await?;
    Ok(Json(SuccessResponse::new(job.into())))
}

/// Jobs are only visible to their owner; anything else reads as absent.
async fn owned_job(
    state: &AppState,
    identity: &UserIdentity,
    job_id: Uuid,
) -> Result<entity::generation_jobs::Model> {
    let job = state.job_service.get_job(job_id).await?;
    if job.user_id != identity.user_id {
        return Err(ApiError::NotFound(format!("Job {}", job_id)));
    }
    Ok(job)
}
