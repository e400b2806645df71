//! `POST /v1/feedback`, `GET`/`PUT /v1/feedback/status` (§6).

use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use gw_domain::auth::{Action, AuthTuple, AuthorizedActions};
use gw_domain::conversation::FeedbackRequest;
use gw_domain::error::{GatewayError, Result};
use gw_storage::FeedbackRecord;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct FeedbackStatusResponse {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetFeedbackStatusRequest {
    pub enabled: bool,
}

pub async fn submit_feedback(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthTuple>,
    Extension(authorized): Extension<AuthorizedActions>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>> {
    if !authorized.holds(Action::Feedback) {
        return Err(GatewayError::Forbidden);
    }
    req.validate()?;

    if !*state.feedback_enabled.read() {
        return Ok(Json(FeedbackResponse { status: "disabled" }));
    }

    let record = FeedbackRecord {
        user_id: auth.user_id.clone(),
        feedback: req,
    };
    state.feedback_writer.write(&record)?;

    Ok(Json(FeedbackResponse { status: "success" }))
}

pub async fn feedback_status(
    State(state): State<AppState>,
) -> Json<FeedbackStatusResponse> {
    Json(FeedbackStatusResponse {
        enabled: *state.feedback_enabled.read(),
    })
}

pub async fn set_feedback_status(
    State(state): State<AppState>,
    Extension(authorized): Extension<AuthorizedActions>,
    Json(req): Json<SetFeedbackStatusRequest>,
) -> Result<Json<FeedbackStatusResponse>> {
    if !authorized.holds(Action::Admin) {
        return Err(GatewayError::Forbidden);
    }
    *state.feedback_enabled.write() = req.enabled;
    Ok(Json(FeedbackStatusResponse { enabled: req.enabled }))
}
