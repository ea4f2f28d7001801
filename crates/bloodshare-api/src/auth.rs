use std::collections::BTreeMap;
use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde::Deserialize;
use tracing::{info, warn};

use bloodshare_db::Database;
use bloodshare_db::models::{NewProfile, NewUser};
use bloodshare_db::Registration;
use bloodshare_types::api::Claims;

use crate::error::AppError;
use crate::flash::{self, Flash, Level};
use crate::forms::{
    EMAIL_TAKEN, FormErrors, INVALID_CREDENTIALS, SubmittedForm, validate_login, validate_signup,
};
use crate::middleware::{SESSION_COOKIE, read_session, safe_next};
use crate::storage::AvatarStore;
use crate::views::{Views, page_context, with_form};
use crate::{blocking, with_db};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    /// HMAC key for session tokens.
    pub secret: String,
    /// Lifetime of a session, and of the cookie when "remember me" is ticked.
    pub session_days: i64,
    pub max_avatar_bytes: usize,
    pub views: Views,
    pub avatars: AvatarStore,
}

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

// -- Signup --

pub async fn signup_page(State(state): State<AppState>, jar: CookieJar) -> Result<Response, AppError> {
    if read_session(&jar, &state.secret).is_some() {
        return Ok(Redirect::to("/dashboard/").into_response());
    }
    let (jar, messages) = flash::take(jar);
    render_signup(&state, jar, &messages, &BTreeMap::new(), &FormErrors::default())
}

pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    form: SubmittedForm,
) -> Result<Response, AppError> {
    if read_session(&jar, &state.secret).is_some() {
        return Ok(Redirect::to("/dashboard/").into_response());
    }

    let data = match validate_signup(&form, state.max_avatar_bytes) {
        Ok(data) => data,
        Err(errors) => return render_signup(&state, jar, &[], &form.echo(), &errors),
    };

    let email = data.email.clone();
    if with_db(&state, move |db| db.email_exists(&email)).await? {
        let mut errors = FormErrors::default();
        errors.add("email", EMAIL_TAKEN);
        return render_signup(&state, jar, &[], &form.echo(), &errors);
    }

    let password = data.password;
    let password_hash = blocking(move || hash_password(&password)).await?;

    let avatar = match &data.avatar {
        Some(upload) => Some(state.avatars.save(upload.extension, &upload.data).await?),
        None => None,
    };

    let user = NewUser {
        email: data.email.clone(),
        password_hash,
        first_name: data.first_name,
        last_name: data.last_name,
    };
    let profile = NewProfile {
        phone: data.phone,
        blood_group: data.blood_group,
        city: data.city,
        avatar: avatar.clone(),
        ..Default::default()
    };
    let outcome = with_db(&state, move |db| db.register_user(&user, &profile)).await?;

    match outcome {
        Registration::Created { user_id } => {
            info!("Registered user {} ({})", user_id, data.email);
            let token = create_token(&state.secret, user_id, &data.email, state.session_days)?;
            let jar = jar.add(session_cookie(token, Some(state.session_days)));
            let jar = flash::push(jar, Level::Success, "Account created successfully! Welcome to BloodShare.");
            Ok((jar, Redirect::to("/dashboard/")).into_response())
        }
        Registration::EmailTaken => {
            // Lost a race with a concurrent signup for the same address.
            if let Some(path) = avatar {
                state.avatars.delete(&path).await?;
            }
            let mut errors = FormErrors::default();
            errors.add("email", EMAIL_TAKEN);
            render_signup(&state, jar, &[], &form.echo(), &errors)
        }
    }
}

fn render_signup(
    state: &AppState,
    jar: CookieJar,
    messages: &[Flash],
    values: &BTreeMap<String, String>,
    errors: &FormErrors,
) -> Result<Response, AppError> {
    let mut ctx = page_context(false, messages);
    with_form(&mut ctx, values, errors);
    Ok((jar, state.views.render("signup.html", &ctx)?).into_response())
}

// -- Login --

pub async fn login_page(
    State(state): State<AppState>,
    Query(query): Query<NextQuery>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    if read_session(&jar, &state.secret).is_some() {
        return Ok(Redirect::to("/dashboard/").into_response());
    }
    let (jar, messages) = flash::take(jar);
    let next = query.next.as_deref().and_then(safe_next);
    render_login(&state, jar, &messages, next, &BTreeMap::new(), &FormErrors::default())
}

pub async fn login(
    State(state): State<AppState>,
    Query(query): Query<NextQuery>,
    jar: CookieJar,
    form: SubmittedForm,
) -> Result<Response, AppError> {
    if read_session(&jar, &state.secret).is_some() {
        return Ok(Redirect::to("/dashboard/").into_response());
    }
    let next = query.next.as_deref().and_then(safe_next);

    let creds = match validate_login(&form) {
        Ok(creds) => creds,
        Err(errors) => return render_login(&state, jar, &[], next, &form.echo(), &errors),
    };

    let email = creds.email.clone();
    let password = creds.password;
    let user = with_db(&state, move |db| {
        let Some(user) = db.get_user_by_email(&email)? else {
            return Ok(None);
        };
        Ok(verify_password(&password, &user.password).then_some(user))
    })
    .await?;

    let Some(user) = user else {
        warn!("Failed login for {}", creds.email);
        let messages = [Flash::error(INVALID_CREDENTIALS)];
        return render_login(&state, jar, &messages, next, &form.echo(), &FormErrors::default());
    };

    let user_id = user.id;
    with_db(&state, move |db| db.record_login(user_id)).await?;

    let user = user.into_user();
    let token = create_token(&state.secret, user.id, &user.username, state.session_days)?;
    let lifetime = creds.remember_me.then_some(state.session_days);
    let jar = jar.add(session_cookie(token, lifetime));
    let jar = flash::push(jar, Level::Success, format!("Welcome back, {}!", user.display_name()));
    info!("User {} logged in", user.id);

    Ok((jar, Redirect::to(next.unwrap_or("/dashboard/"))).into_response())
}

fn render_login(
    state: &AppState,
    jar: CookieJar,
    messages: &[Flash],
    next: Option<&str>,
    values: &BTreeMap<String, String>,
    errors: &FormErrors,
) -> Result<Response, AppError> {
    let mut ctx = page_context(false, messages);
    with_form(&mut ctx, values, errors);
    ctx.insert("next", &next);
    Ok((jar, state.views.render("login.html", &ctx)?).into_response())
}

// -- Logout --

pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    let jar = flash::push(jar, Level::Info, "You have been successfully logged out.");
    (jar, Redirect::to("/"))
}

// -- Passwords and tokens --

/// Argon2id hash in PHC string form.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Unreadable password hash: {}", e);
            return false;
        }
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

pub fn create_token(secret: &str, user_id: i64, username: &str, days: i64) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(days)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Session cookie. Without a lifetime it lasts until the browser closes.
pub fn session_cookie(token: String, lifetime_days: Option<i64>) -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    if let Some(days) = lifetime_days {
        cookie = cookie.max_age(time::Duration::days(days));
    }
    cookie.build()
}
