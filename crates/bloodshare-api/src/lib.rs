pub mod auth;
pub mod error;
pub mod flash;
pub mod forms;
pub mod middleware;
pub mod pages;
pub mod profile;
pub mod requests;
pub mod storage;
pub mod views;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use tower_http::services::ServeDir;
use tracing::error;

use bloodshare_db::Database;

use crate::auth::AppState;
use crate::error::AppError;
use crate::middleware::{require_api_session, require_session};

/// Room for the text fields of a multipart form on top of the avatar itself.
const FORM_OVERHEAD: usize = 64 * 1024;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(pages::landing))
        .route("/signup/", get(auth::signup_page).post(auth::signup))
        .route("/login/", get(auth::login_page).post(auth::login))
        .route("/logout/", post(auth::logout));

    let page_routes = Router::new()
        .route("/dashboard/", get(pages::dashboard).post(pages::create_request))
        .route("/profile/edit/", get(profile::edit_page).post(profile::edit))
        .route("/donor/", get(pages::donor))
        .route_layer(from_fn_with_state(state.clone(), require_session));

    let api_routes = Router::new()
        .route("/api/profile/toggle-availability/", post(profile::toggle_availability))
        .route("/api/requests/{request_id}/accept/", post(requests::accept_request))
        .route("/api/requests/{request_id}/reject/", post(requests::reject_request))
        .route_layer(from_fn_with_state(state.clone(), require_api_session));

    Router::new()
        .merge(public_routes)
        .merge(page_routes)
        .merge(api_routes)
        .nest_service("/media", ServeDir::new(state.avatars.root()))
        .layer(DefaultBodyLimit::max(state.max_avatar_bytes + FORM_OVERHEAD))
        .with_state(state)
}

/// Run blocking work (SQLite, password hashing) off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            AppError::Internal(e.into())
        })?
        .map_err(AppError::from)
}

pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, AppError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    blocking(move || f(&state.db)).await
}
