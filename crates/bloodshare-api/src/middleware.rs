use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::warn;

use bloodshare_types::api::Claims;

use crate::auth::AppState;
use crate::error::AppError;
use crate::with_db;

pub const SESSION_COOKIE: &str = "bloodshare_session";

/// The signed-in user, inserted into request extensions by the session layers.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
}

/// Decode and validate the session cookie, if any.
pub fn read_session(jar: &CookieJar, secret: &str) -> Option<SessionUser> {
    let token = jar.get(SESSION_COOKIE)?.value().to_string();

    let token_data = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;

    let id = token_data.claims.sub.parse().ok()?;
    Some(SessionUser {
        id,
        username: token_data.claims.username,
    })
}

/// A session whose token verifies and whose user still exists. Accounts can
/// disappear under a live cookie, e.g. when the sample data is reloaded.
async fn live_session(state: &AppState, jar: &CookieJar) -> Result<Option<SessionUser>, AppError> {
    let Some(user) = read_session(jar, &state.secret) else {
        return Ok(None);
    };
    let id = user.id;
    if with_db(state, move |db| db.get_user_by_id(id)).await?.is_none() {
        warn!("Session for missing user {}", id);
        return Ok(None);
    }
    Ok(Some(user))
}

/// Pages: anonymous visitors are sent to the login form, then back here.
/// A stale cookie is cleared on the way.
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    match live_session(&state, &jar).await? {
        Some(user) => {
            req.extensions_mut().insert(user);
            Ok(next.run(req).await)
        }
        None => {
            let login = Redirect::to(&login_url(req.uri().path()));
            if jar.get(SESSION_COOKIE).is_some() {
                let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
                return Ok((jar, login).into_response());
            }
            Ok(login.into_response())
        }
    }
}

/// JSON endpoints: anonymous callers get a 401 body instead of a redirect.
pub async fn require_api_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = live_session(&state, &jar).await?.ok_or(AppError::Unauthorized)?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Accept only local absolute paths made of URL-safe characters, so the value
/// can be echoed into a `Location` header or a query string as is.
pub fn safe_next(next: &str) -> Option<&str> {
    let local = next.starts_with('/') && !next.starts_with("//");
    let plain = next
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.'));
    (local && plain).then_some(next)
}

pub fn login_url(next: &str) -> String {
    match safe_next(next) {
        Some(path) => format!("/login/?next={}", path),
        None => "/login/".to_string(),
    }
}
