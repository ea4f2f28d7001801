use axum::{
    Extension, Json,
    extract::{Path, State},
};
use tracing::info;

use bloodshare_db::Transition;
use bloodshare_types::api::ActionResponse;

use crate::auth::AppState;
use crate::error::AppError;
use crate::middleware::SessionUser;
use crate::with_db;

pub async fn accept_request(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(request_id): Path<i64>,
) -> Result<Json<ActionResponse>, AppError> {
    let user_id = user.id;
    let outcome = with_db(&state, move |db| db.accept_request(request_id, user_id)).await?;

    match outcome {
        Transition::Applied => {
            info!("User {} accepted request {}", user_id, request_id);
            Ok(Json(ActionResponse::ok("Request accepted successfully")))
        }
        Transition::OwnRequest => Err(AppError::BadRequest("Cannot accept your own request".into())),
        Transition::NotFound => Err(AppError::NotFound("Request not found".into())),
    }
}

pub async fn reject_request(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(request_id): Path<i64>,
) -> Result<Json<ActionResponse>, AppError> {
    let user_id = user.id;
    let outcome = with_db(&state, move |db| db.reject_request(request_id, user_id)).await?;

    match outcome {
        Transition::Applied => {
            info!("User {} rejected request {}", user_id, request_id);
            Ok(Json(ActionResponse::ok("Request rejected")))
        }
        Transition::OwnRequest => Err(AppError::BadRequest("Cannot reject your own request".into())),
        Transition::NotFound => Err(AppError::NotFound("Request not found".into())),
    }
}
