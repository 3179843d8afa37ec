// HTTP route handlers for the Verdict API

use crate::auth::AuthUser;
use crate::{metrics, problems, ws, AppState};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;
use verdict_common::queue;
use verdict_common::types::{Job, Language, PushEnvelope, Submission, SubmissionStatus};

#[derive(Debug, Deserialize)]
pub struct CreateQuery {
    #[serde(rename = "problemId")]
    pub problem_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubmissionRequest {
    #[serde(default)]
    pub user_code: String,
    #[serde(default)]
    pub language: String,
}

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(serde_json::json!({ "message": text }))).into_response()
}

/// POST /api/submissions/create?problemId=…
///
/// Validates, snapshots the problem, persists the `Pending` submission,
/// and enqueues the grading job. Enqueue failures are logged but do not
/// fail the request: the submission is persisted and an operator can
/// requeue it.
pub async fn create_submission(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<CreateQuery>,
    Json(payload): Json<CreateSubmissionRequest>,
) -> Response {
    let Some(problem_id) = query.problem_id.filter(|id| !id.is_empty()) else {
        return message(StatusCode::BAD_REQUEST, "problemId is required");
    };
    if payload.user_code.trim().is_empty() {
        return message(StatusCode::BAD_REQUEST, "userCode is required");
    }
    let Some(language) = Language::from_tag(&payload.language) else {
        return message(StatusCode::BAD_REQUEST, "unknown language");
    };

    let problem = match problems::fetch_problem(
        &state.http,
        &state.config.problem_service_url,
        &problem_id,
    )
    .await
    {
        Ok(Some(problem)) => problem,
        Ok(None) => return message(StatusCode::NOT_FOUND, "Problem not found"),
        Err(e) => {
            error!(problem_id = %problem_id, error = %e, "problem fetch failed");
            return message(StatusCode::INTERNAL_SERVER_ERROR, "problem service error");
        }
    };

    if problem.testcases.is_empty() {
        return message(StatusCode::BAD_REQUEST, "problem has no test cases");
    }
    let Some(stub) = problem.stub_for(language) else {
        return message(StatusCode::BAD_REQUEST, "stub not found");
    };

    // Archive the framed source alongside the raw user code.
    let code = format!(
        "{}\n{}\n{}",
        stub.start_snippet, payload.user_code, stub.end_snippet
    );

    let submission = Submission {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.clone(),
        problem_id: problem_id.clone(),
        code,
        language,
        status: SubmissionStatus::Pending,
        results: vec![],
        passed_count: 0,
        total_count: problem.testcases.len() as u32,
        percent: 0,
        created_at: Utc::now(),
    };

    if let Err(e) = state.store.insert(&submission).await {
        error!(error = %e, "failed to persist submission");
        return message(StatusCode::INTERNAL_SERVER_ERROR, "storage error");
    }

    let job = Job {
        submission_id: submission.id.clone(),
        user_id,
        problem_id,
        language,
        user_code: payload.user_code,
        problem,
    };

    // Fire-and-forget enqueue.
    let mut conn = state.redis.clone();
    match queue::push_job(&mut conn, &job).await {
        Ok(()) => {
            info!(
                submission_id = %submission.id,
                language = %language,
                test_count = submission.total_count,
                "submission queued"
            );
        }
        Err(e) => {
            error!(
                submission_id = %submission.id,
                error = %e,
                "failed to enqueue job; submission persisted for retry"
            );
        }
    }

    metrics::SUBMISSIONS_CREATED.inc();
    (StatusCode::CREATED, Json(submission)).into_response()
}

/// GET /api/submissions/:id - owner-only read.
pub async fn get_submission(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Response {
    match state.store.find_by_id(&id).await {
        Ok(Some(submission)) if submission.user_id == user_id => {
            (StatusCode::OK, Json(submission)).into_response()
        }
        Ok(Some(_)) => message(StatusCode::FORBIDDEN, "not your submission"),
        Ok(None) => message(StatusCode::NOT_FOUND, "Submission not found"),
        Err(e) => {
            error!(submission_id = %id, error = %e, "failed to load submission");
            message(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        }
    }
}

/// GET /api/submissions/user - owner's submissions, newest first.
pub async fn list_user_submissions(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Response {
    match state.store.find_by_user(&user_id).await {
        Ok(submissions) => (StatusCode::OK, Json(submissions)).into_response(),
        Err(e) => {
            error!(user_id = %user_id, error = %e, "failed to list submissions");
            message(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        }
    }
}

/// POST /internal/push - worker-to-endpoint bridge. Delivers the event
/// to the locally held sessions of the target user.
pub async fn internal_push(
    State(state): State<Arc<AppState>>,
    Json(envelope): Json<PushEnvelope>,
) -> Response {
    let frame = ws::update_frame(&envelope.submission_id, &envelope.data);
    let delivered = state.sessions.deliver(&envelope.user_id, frame);
    if delivered > 0 {
        metrics::PUSH_EVENTS_DELIVERED.inc_by(delivered as u64);
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({ "delivered": delivered })),
    )
        .into_response()
}

/// GET /health - liveness probe.
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus text exposition.
pub async fn metrics_export() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        metrics::render(),
    )
}
