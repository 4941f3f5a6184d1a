use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, warn};

use super::server::AppState;
use crate::submission::{RequestMetadata, ScoreSubmission, ValidationError};

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        warn!("Rejected submission: {}", self);

        let status = match self {
            ValidationError::Malformed(_) => StatusCode::BAD_REQUEST,
            ValidationError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// `POST /` with `{"name": string, "time": integer}`.
///
/// The body is parsed whatever the `Content-Type`. Once it validates, the
/// response is 200 even if the store write fails.
pub async fn submit_score(
    State(state): State<AppState>,
    metadata: RequestMetadata,
    body: Bytes,
) -> Result<StatusCode, ValidationError> {
    let submission = ScoreSubmission::from_json(&body)?;

    if let Err(e) = state.submissions.submit(&submission, &metadata).await {
        error!(
            "Can't save player {:?} from {:?} in store: {:#}",
            submission, metadata, e
        );
    }

    Ok(StatusCode::OK)
}
