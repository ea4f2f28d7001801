use std::collections::BTreeMap;

use axum::{
    Extension, Json,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, info};

use bloodshare_db::models::ProfileUpdate;
use bloodshare_types::api::AvailabilityResponse;
use bloodshare_types::models::Profile;

use crate::auth::AppState;
use crate::error::AppError;
use crate::flash::{self, Flash, Level};
use crate::forms::{FormErrors, SubmittedForm, validate_profile};
use crate::middleware::SessionUser;
use crate::views::{page_context, with_form};
use crate::with_db;

pub async fn edit_page(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let user_id = user.id;
    let (user, profile) = with_db(&state, move |db| {
        let user = db
            .get_user_by_id(user_id)?
            .ok_or_else(|| anyhow::anyhow!("User {} not found", user_id))?;
        let profile = db.get_or_create_profile(user_id)?;
        Ok((user.into_user(), profile.into_profile()))
    })
    .await?;

    let mut values = BTreeMap::new();
    values.insert("full_name".to_string(), user.full_name());
    values.insert("phone".to_string(), profile.phone.clone());
    values.insert(
        "blood_group".to_string(),
        profile.blood_group.map(|g| g.to_string()).unwrap_or_default(),
    );
    values.insert("city".to_string(), profile.city.clone());
    values.insert(
        "last_donation_date".to_string(),
        profile
            .last_donation_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
    );

    let (jar, messages) = flash::take(jar);
    render_edit(&state, jar, &profile, &messages, &values, &FormErrors::default())
}

pub async fn edit(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    jar: CookieJar,
    form: SubmittedForm,
) -> Result<Response, AppError> {
    let user_id = user.id;

    let data = match validate_profile(&form, state.max_avatar_bytes) {
        Ok(data) => data,
        Err(errors) => {
            let profile = with_db(&state, move |db| db.get_or_create_profile(user_id)).await?;
            return render_edit(&state, jar, &profile.into_profile(), &[], &form.echo(), &errors);
        }
    };

    let avatar = match &data.avatar {
        Some(upload) => Some(state.avatars.save(upload.extension, &upload.data).await?),
        None => None,
    };

    let name = data.name;
    let update = ProfileUpdate {
        phone: data.phone,
        blood_group: data.blood_group,
        city: data.city,
        avatar,
        last_donation_date: data.last_donation_date,
    };
    let replaced = with_db(&state, move |db| {
        db.get_or_create_profile(user_id)?;
        if let Some((first_name, last_name)) = &name {
            db.update_user_name(user_id, first_name, last_name)?;
        }
        db.update_profile(user_id, &update)
    })
    .await?;

    if let Some(old) = replaced {
        // The new avatar is already stored; a leftover file is only clutter.
        if let Err(e) = state.avatars.delete(&old).await {
            error!("Failed to delete replaced avatar {}: {:#}", old, e);
        }
    }
    info!("User {} updated their profile", user_id);

    let jar = flash::push(jar, Level::Success, "Profile updated successfully!");
    Ok((jar, Redirect::to("/dashboard/")).into_response())
}

fn render_edit(
    state: &AppState,
    jar: CookieJar,
    profile: &Profile,
    messages: &[Flash],
    values: &BTreeMap<String, String>,
    errors: &FormErrors,
) -> Result<Response, AppError> {
    let mut ctx = page_context(true, messages);
    ctx.insert("avatar", &profile.avatar);
    with_form(&mut ctx, values, errors);
    Ok((jar, state.views.render("profile_edit.html", &ctx)?).into_response())
}

pub async fn toggle_availability(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let user_id = user.id;
    let is_available = with_db(&state, move |db| db.toggle_availability(user_id))
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".into()))?;

    info!("User {} availability is now {}", user_id, is_available);

    Ok(Json(AvailabilityResponse {
        success: true,
        is_available,
        message: "Availability updated successfully".into(),
    }))
}
