use axum::extract::{Path, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use jobservitor_core::{Job, JobStatus, JobSubmission};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/jobs", post(submit).get(list))
        .route("/jobs/:id", get(get_job).delete(abort))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Serialize)]
struct SubmitResponse {
    id: Uuid,
}

/// `POST /jobs`. Validates the payload, assigns housekeeping fields, writes
/// the record *before* the queue entry -- a reader that observes the queue
/// member is guaranteed the record already exists.
async fn submit(
    State(state): State<AppState>,
    Json(submission): Json<JobSubmission>,
) -> Result<Json<SubmitResponse>, ApiError> {
    submission.validate()?;
    let job = Job::new(submission);

    state.store.put_job(&job).await?;
    state
        .store
        .enqueue(job.gpu_type, &job.dc, &job.region, job.id, job.score())
        .await?;

    Ok(Json(SubmitResponse { id: job.id }))
}

async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, ApiError> {
    let job = state
        .store
        .get_job(id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(job))
}

/// `GET /jobs`. Lists queued (i.e. still-pending) jobs only -- jobs that
/// have been claimed or finished no longer occupy a queue bucket, so they
/// don't appear here. Callers wanting a running/terminal job's state use
/// `GET /jobs/{id}`.
async fn list(State(state): State<AppState>) -> Result<Json<Vec<Job>>, ApiError> {
    let jobs = state.store.list_queued().await?;
    Ok(Json(jobs))
}

/// `DELETE /jobs/{id}`. A terminal job (including one already aborted)
/// rejects with 400. A pending job is fully finalized here, since no worker
/// will ever supervise it. A running job is only signaled -- the owning
/// worker kills the container and finalizes on its next poll.
async fn abort(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, ApiError> {
    let mut job = state
        .store
        .get_job(id)
        .await?
        .ok_or(ApiError::NotFound)?;

    match job.status {
        JobStatus::Pending => {
            state
                .store
                .remove(job.gpu_type, &job.dc, &job.region, job.id)
                .await?;
            job.abort_pending();
            state.store.put_job(&job).await?;
            if let Some(ttl) = state.record_ttl_seconds {
                state.store.expire_job(job.id, ttl).await?;
            }
        }
        JobStatus::Running => {
            job.signal_abort();
            state.store.put_job(&job).await?;
        }
        JobStatus::Succeeded | JobStatus::Failed | JobStatus::Aborted => {
            return Err(ApiError::Conflict(
                "Job already completed, cannot abort. sorry!".to_string(),
            ));
        }
    }

    Ok(Json(job))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
