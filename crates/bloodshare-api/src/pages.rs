use std::collections::BTreeMap;

use axum::{
    Extension,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::info;

use bloodshare_db::models::{NewDonationRequest, RequestRow};
use bloodshare_types::models::{BloodGroup, DonationRequest, Profile};

use crate::auth::AppState;
use crate::error::AppError;
use crate::flash::{self, Flash, Level};
use crate::forms::{FormErrors, SubmittedForm, validate_request};
use crate::middleware::{SessionUser, read_session};
use crate::views::{page_context, with_form};
use crate::with_db;

const OWN_REQUESTS_SHOWN: u32 = 10;
const OPEN_REQUESTS_SHOWN: u32 = 20;
const DONORS_SHOWN: u32 = 50;

pub async fn landing(State(state): State<AppState>, jar: CookieJar) -> Result<Response, AppError> {
    let signed_in = read_session(&jar, &state.secret).is_some();
    let stats = with_db(&state, |db| db.site_stats()).await?;

    let (jar, messages) = flash::take(jar);
    let mut ctx = page_context(signed_in, &messages);
    ctx.insert("stats", &stats);
    Ok((jar, state.views.render("landing.html", &ctx)?).into_response())
}

// -- Dashboard --

struct DashboardData {
    user_name: String,
    profile: Profile,
    user_requests: Vec<DonationRequest>,
    all_requests: Vec<DonationRequest>,
}

async fn load_dashboard(state: &AppState, user_id: i64) -> Result<DashboardData, AppError> {
    with_db(state, move |db| {
        let user = db
            .get_user_by_id(user_id)?
            .ok_or_else(|| anyhow::anyhow!("User {} not found", user_id))?;
        let profile = db.get_or_create_profile(user_id)?;
        let user_requests = db.list_requests_by_requester(user_id, OWN_REQUESTS_SHOWN)?;
        let all_requests = db.list_open_requests(user_id, OPEN_REQUESTS_SHOWN)?;

        Ok(DashboardData {
            user_name: user.into_user().display_name(),
            profile: profile.into_profile(),
            user_requests: into_requests(user_requests),
            all_requests: into_requests(all_requests),
        })
    })
    .await
}

fn into_requests(rows: Vec<RequestRow>) -> Vec<DonationRequest> {
    rows.into_iter().filter_map(RequestRow::into_request).collect()
}

fn render_dashboard(
    state: &AppState,
    jar: CookieJar,
    data: DashboardData,
    messages: &[Flash],
    values: &BTreeMap<String, String>,
    errors: &FormErrors,
) -> Result<Response, AppError> {
    let mut ctx = page_context(true, messages);
    ctx.insert("user_name", &data.user_name);
    ctx.insert("profile", &data.profile);
    ctx.insert("user_requests", &data.user_requests);
    ctx.insert("all_requests", &data.all_requests);
    with_form(&mut ctx, values, errors);
    Ok((jar, state.views.render("dashboard.html", &ctx)?).into_response())
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let data = load_dashboard(&state, user.id).await?;
    let (jar, messages) = flash::take(jar);
    render_dashboard(&state, jar, data, &messages, &BTreeMap::new(), &FormErrors::default())
}

pub async fn create_request(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    jar: CookieJar,
    form: SubmittedForm,
) -> Result<Response, AppError> {
    let data = match validate_request(&form) {
        Ok(data) => data,
        Err(errors) => {
            let page = load_dashboard(&state, user.id).await?;
            return render_dashboard(&state, jar, page, &[], &form.echo(), &errors);
        }
    };

    let request = NewDonationRequest {
        name: data.name,
        blood_group_needed: data.blood_group_needed,
        city: data.city,
        details: data.details,
    };
    let user_id = user.id;
    let request_id = with_db(&state, move |db| db.create_request(user_id, &request)).await?;
    info!("User {} created donation request {}", user_id, request_id);

    let jar = flash::push(jar, Level::Success, "Donation request created successfully!");
    Ok((jar, Redirect::to("/dashboard/")).into_response())
}

// -- Donor directory --

#[derive(Debug, Deserialize)]
pub struct DonorFilter {
    pub blood_group: Option<String>,
    pub city: Option<String>,
}

pub async fn donor(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Query(filter): Query<DonorFilter>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    // Unknown groups are treated as "any" rather than rejected.
    let blood_group = filter
        .blood_group
        .as_deref()
        .and_then(|g| g.parse::<BloodGroup>().ok());
    let city = filter.city.as_deref().unwrap_or("").trim().to_string();

    let user_id = user.id;
    let query_city = city.clone();
    let donors = with_db(&state, move |db| {
        let city = (!query_city.is_empty()).then_some(query_city.as_str());
        db.list_available_donors(user_id, blood_group, city, DONORS_SHOWN)
    })
    .await?;
    let donors: Vec<_> = donors.into_iter().map(|d| d.into_donor()).collect();

    let (jar, messages) = flash::take(jar);
    let mut ctx = page_context(true, &messages);
    ctx.insert("donors", &donors);
    ctx.insert("filter_blood_group", blood_group.map(BloodGroup::as_str).unwrap_or(""));
    ctx.insert("filter_city", &city);
    Ok((jar, state.views.render("donor.html", &ctx)?).into_response())
}
