use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, StatusCode, header},
};
use tempfile::TempDir;
use tower::ServiceExt;

use bloodshare_api::auth::{AppStateInner, create_token, hash_password};
use bloodshare_api::middleware::SESSION_COOKIE;
use bloodshare_api::storage::AvatarStore;
use bloodshare_api::views::Views;
use bloodshare_db::Database;
use bloodshare_db::models::{NewDonationRequest, NewProfile, NewUser, ProfileUpdate};
use bloodshare_db::Registration;
use bloodshare_types::models::{BloodGroup, RequestStatus};

const SECRET: &str = "integration-test-secret";

struct TestApp {
    app: Router,
    state: Arc<AppStateInner>,
    _media: TempDir,
}

async fn test_app() -> TestApp {
    test_app_with_avatar_limit(1024 * 1024).await
}

async fn test_app_with_avatar_limit(max_avatar_bytes: usize) -> TestApp {
    let media = tempfile::tempdir().unwrap();
    let db = Database::open_in_memory().unwrap();

    let state = Arc::new(AppStateInner {
        db,
        secret: SECRET.to_string(),
        session_days: 14,
        max_avatar_bytes,
        views: Views::new().unwrap(),
        avatars: AvatarStore::new(media.path().to_path_buf()).await.unwrap(),
    });

    TestApp {
        app: bloodshare_api::router(state.clone()),
        state,
        _media: media,
    }
}

/// Register a user directly and return their id and session cookie.
fn register(state: &AppStateInner, email: &str, first_name: &str) -> (i64, String) {
    let user = NewUser {
        email: email.to_string(),
        password_hash: hash_password("SecurePass123!").unwrap(),
        first_name: first_name.to_string(),
        last_name: "Tester".to_string(),
    };
    let profile = NewProfile {
        blood_group: Some(BloodGroup::OPos),
        city: "Dhaka".to_string(),
        is_available: true,
        ..Default::default()
    };
    let Registration::Created { user_id } = state.db.register_user(&user, &profile).unwrap() else {
        panic!("email {} already registered", email);
    };
    let token = create_token(SECRET, user_id, email, 14).unwrap();
    (user_id, format!("{}={}", SESSION_COOKIE, token))
}

fn post_form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut req = Request::post(uri).header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    req.body(Body::from(body.to_string())).unwrap()
}

const BOUNDARY: &str = "bloodshare-test-boundary";

/// Build a `multipart/form-data` POST. Files are `(field, file name, bytes)`.
fn post_multipart(
    uri: &str,
    fields: &[(&str, &str)],
    files: &[(&str, &str, &[u8])],
    cookie: Option<&str>,
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    for (name, file_name, data) in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    let mut req = Request::post(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={}", BOUNDARY),
    );
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    req.body(Body::from(body)).unwrap()
}

/// A PNG signature followed by `len` bytes of padding.
fn png(len: usize) -> Vec<u8> {
    let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
    data.resize(data.len() + len, 0);
    data
}

const SIGNUP_FIELDS: &[(&str, &str)] = &[
    ("full_name", "New User"),
    ("email", "newuser@example.com"),
    ("password1", "SecurePass123!"),
    ("password2", "SecurePass123!"),
    ("phone", "+1234567890"),
    ("blood_group", "O+"),
    ("city", "Dhaka"),
    ("agree_to_terms", "on"),
];

const PROFILE_FIELDS: &[(&str, &str)] = &[
    ("full_name", "Dana Tester"),
    ("phone", ""),
    ("blood_group", "O+"),
    ("city", "Dhaka"),
    ("last_donation_date", ""),
];

fn clears_session_cookie(res: &Response<Body>) -> bool {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&format!("{}=", SESSION_COOKIE)) && v.contains("Max-Age=0"))
}

fn post_empty(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut req = Request::post(uri);
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    req.body(Body::empty()).unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut req = Request::get(uri);
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    req.body(Body::empty()).unwrap()
}

async fn body_text(res: Response<Body>) -> String {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(res: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(res: &Response<Body>) -> &str {
    res.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

fn sets_session_cookie(res: &Response<Body>) -> bool {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&format!("{}=", SESSION_COOKIE)) && !v.contains("Max-Age=0"))
}

fn create_request(state: &AppStateInner, requester_id: i64) -> i64 {
    let req = NewDonationRequest {
        name: "Jane Doe".to_string(),
        blood_group_needed: BloodGroup::APos,
        city: "Chittagong".to_string(),
        details: "Surgery on Friday".to_string(),
    };
    state.db.create_request(requester_id, &req).unwrap()
}

const SIGNUP_BODY: &str = "full_name=New+User&email=newuser%40example.com\
    &password1=SecurePass123%21&password2=SecurePass123%21\
    &phone=%2B1234567890&blood_group=O%2B&city=Dhaka&agree_to_terms=on";

// -- Signup --

#[tokio::test]
async fn signup_creates_user_and_profile_and_signs_in() {
    let t = test_app().await;

    let res = t.app.clone().oneshot(post_form("/signup/", SIGNUP_BODY, None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/dashboard/");
    assert!(sets_session_cookie(&res));

    assert_eq!(t.state.db.count_users_with_email("newuser@example.com").unwrap(), 1);
    let user = t.state.db.get_user_by_email("newuser@example.com").unwrap().unwrap();
    assert_eq!(user.username, "newuser@example.com");
    assert_eq!(user.first_name, "New");
    assert_eq!(user.last_name, "User");

    let profile = t.state.db.get_profile(user.id).unwrap().unwrap().into_profile();
    assert_eq!(profile.blood_group, Some(BloodGroup::OPos));
    assert_eq!(profile.city, "Dhaka");
    assert!(!profile.is_available);
}

#[tokio::test]
async fn signup_with_duplicate_email_is_rejected() {
    let t = test_app().await;
    register(&t.state, "newuser@example.com", "Existing");

    let res = t.app.clone().oneshot(post_form("/signup/", SIGNUP_BODY, None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(!sets_session_cookie(&res));
    let body = body_text(res).await;
    assert!(body.contains("already exists"));

    assert_eq!(t.state.db.count_users_with_email("newuser@example.com").unwrap(), 1);
}

#[tokio::test]
async fn signup_with_mismatched_passwords_is_rejected() {
    let t = test_app().await;
    let body = SIGNUP_BODY.replace("password2=SecurePass123%21", "password2=Different123%21");

    let res = t.app.clone().oneshot(post_form("/signup/", &body, None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_text(res).await;
    assert!(body.contains("didn&#x27;t match") || body.contains("didn't match"));
    assert!(t.state.db.get_user_by_email("newuser@example.com").unwrap().is_none());
}

#[tokio::test]
async fn signup_without_terms_is_rejected() {
    let t = test_app().await;
    let body = SIGNUP_BODY.replace("&agree_to_terms=on", "");

    let res = t.app.clone().oneshot(post_form("/signup/", &body, None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(t.state.db.get_user_by_email("newuser@example.com").unwrap().is_none());
}

#[tokio::test]
async fn signup_stores_an_uploaded_avatar() {
    let t = test_app().await;
    let avatar = png(512);

    let files = [("avatar", "me.png", avatar.as_slice())];
    let req = post_multipart("/signup/", SIGNUP_FIELDS, &files, None);
    let res = t.app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/dashboard/");

    let user = t.state.db.get_user_by_email("newuser@example.com").unwrap().unwrap();
    let profile = t.state.db.get_profile(user.id).unwrap().unwrap().into_profile();
    let path = profile.avatar.unwrap();
    assert!(path.starts_with("avatars/") && path.ends_with(".png"));
    assert_eq!(std::fs::read(t._media.path().join(&path)).unwrap(), avatar);
}

#[tokio::test]
async fn oversized_avatar_is_a_form_error() {
    let t = test_app_with_avatar_limit(16 * 1024).await;
    let avatar = png(200 * 1024);

    let files = [("avatar", "big.png", avatar.as_slice())];
    let req = post_multipart("/signup/", SIGNUP_FIELDS, &files, None);
    let res = t.app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let page = body_text(res).await;
    assert!(page.contains("Image files may be at most 16 KB."));
    assert!(page.contains("newuser@example.com"));
    assert!(t.state.db.get_user_by_email("newuser@example.com").unwrap().is_none());
}

// -- Login --

#[tokio::test]
async fn login_with_correct_credentials_redirects_to_dashboard() {
    let t = test_app().await;
    let (user_id, _) = register(&t.state, "donor@example.com", "Dana");

    let res = t
        .app
        .clone()
        .oneshot(post_form("/login/", "email=donor%40example.com&password=SecurePass123%21", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/dashboard/");
    assert!(sets_session_cookie(&res));

    let user = t.state.db.get_user_by_id(user_id).unwrap().unwrap();
    assert!(user.last_login.is_some());
}

#[tokio::test]
async fn login_honours_local_next_only() {
    let t = test_app().await;
    register(&t.state, "donor@example.com", "Dana");
    let creds = "email=donor%40example.com&password=SecurePass123%21";

    let res = t
        .app
        .clone()
        .oneshot(post_form("/login/?next=/donor/", creds, None))
        .await
        .unwrap();
    assert_eq!(location(&res), "/donor/");

    let res = t
        .app
        .clone()
        .oneshot(post_form("/login/?next=https://evil.example.com/", creds, None))
        .await
        .unwrap();
    assert_eq!(location(&res), "/dashboard/");
}

#[tokio::test]
async fn login_with_wrong_password_shows_error_without_session() {
    let t = test_app().await;
    register(&t.state, "donor@example.com", "Dana");

    let res = t
        .app
        .clone()
        .oneshot(post_form("/login/", "email=donor%40example.com&password=wrongpassword", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(!sets_session_cookie(&res));
    assert!(body_text(res).await.contains("Invalid email or password."));
}

#[tokio::test]
async fn logout_clears_session_and_returns_to_landing() {
    let t = test_app().await;
    let (_, cookie) = register(&t.state, "donor@example.com", "Dana");

    let res = t.app.clone().oneshot(post_empty("/logout/", Some(&cookie))).await.unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/");
    assert!(!sets_session_cookie(&res));
}

// -- Pages --

#[tokio::test]
async fn landing_page_shows_live_counts() {
    let t = test_app().await;
    register(&t.state, "donor@example.com", "Dana");

    let res = t.app.clone().oneshot(get("/", None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains("Available donors"));
}

#[tokio::test]
async fn dashboard_requires_a_session() {
    let t = test_app().await;

    let res = t.app.clone().oneshot(get("/dashboard/", None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/login/?next=/dashboard/");
}

#[tokio::test]
async fn session_for_deleted_user_is_cleared() {
    let t = test_app().await;
    let token = create_token(SECRET, 777, "ghost@example.com", 14).unwrap();
    let cookie = format!("{}={}", SESSION_COOKIE, token);

    let res = t.app.clone().oneshot(get("/profile/edit/", Some(&cookie))).await.unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/login/?next=/profile/edit/");
    assert!(clears_session_cookie(&res));

    let res = t
        .app
        .clone()
        .oneshot(post_form("/dashboard/", "name=Jane&blood_group_needed=A%2B&city=Dhaka", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert!(clears_session_cookie(&res));

    let (owner_id, _) = register(&t.state, "owner@example.com", "Olga");
    let request_id = create_request(&t.state, owner_id);
    let res = t
        .app
        .clone()
        .oneshot(post_empty(&format!("/api/requests/{}/accept/", request_id), Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let stored = t.state.db.get_request(request_id).unwrap().unwrap();
    assert_eq!(stored.status, "pending");
}

#[tokio::test]
async fn dashboard_greets_the_signed_in_user() {
    let t = test_app().await;
    let (_, cookie) = register(&t.state, "donor@example.com", "Dana");

    let res = t.app.clone().oneshot(get("/dashboard/", Some(&cookie))).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains("Welcome back, Dana Tester!"));
}

#[tokio::test]
async fn dashboard_post_creates_a_pending_request() {
    let t = test_app().await;
    let (user_id, cookie) = register(&t.state, "donor@example.com", "Dana");

    let res = t
        .app
        .clone()
        .oneshot(post_form(
            "/dashboard/",
            "name=Jane+Doe&blood_group_needed=A%2B&city=Chittagong&details=",
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/dashboard/");

    let requests = t.state.db.list_requests_by_requester(user_id, 10).unwrap();
    assert_eq!(requests.len(), 1);
    let request = requests.into_iter().next().unwrap().into_request().unwrap();
    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(request.blood_group_needed, BloodGroup::APos);
}

#[tokio::test]
async fn dashboard_post_with_missing_fields_re_renders() {
    let t = test_app().await;
    let (user_id, cookie) = register(&t.state, "donor@example.com", "Dana");

    let res = t
        .app
        .clone()
        .oneshot(post_form("/dashboard/", "name=&blood_group_needed=&city=", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains("This field is required."));
    assert!(t.state.db.list_requests_by_requester(user_id, 10).unwrap().is_empty());
}

#[tokio::test]
async fn donor_directory_lists_other_available_donors() {
    let t = test_app().await;
    let (_, cookie) = register(&t.state, "viewer@example.com", "Viola");
    register(&t.state, "donor@example.com", "Dana");

    let res = t.app.clone().oneshot(get("/donor/?blood_group=O%2B", Some(&cookie))).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_text(res).await;
    assert!(body.contains("Dana Tester"));
    assert!(!body.contains("Viola Tester"));
}

#[tokio::test]
async fn profile_edit_updates_name_and_city() {
    let t = test_app().await;
    let (user_id, cookie) = register(&t.state, "donor@example.com", "Dana");

    let res = t
        .app
        .clone()
        .oneshot(post_form(
            "/profile/edit/",
            "full_name=Dana+Marie+Smith&phone=&blood_group=B-&city=Sylhet&last_donation_date=2024-03-01",
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/dashboard/");

    let user = t.state.db.get_user_by_id(user_id).unwrap().unwrap();
    assert_eq!(user.first_name, "Dana");
    assert_eq!(user.last_name, "Marie Smith");
    let profile = t.state.db.get_profile(user_id).unwrap().unwrap().into_profile();
    assert_eq!(profile.city, "Sylhet");
    assert_eq!(profile.blood_group, Some(BloodGroup::BNeg));
    assert!(profile.last_donation_date.is_some());
}

/// Give the user a stored avatar and return its media path.
async fn store_avatar(t: &TestApp, user_id: i64) -> String {
    let path = t.state.avatars.save("png", &png(64)).await.unwrap();
    let update = ProfileUpdate {
        phone: String::new(),
        blood_group: Some(BloodGroup::OPos),
        city: "Dhaka".to_string(),
        avatar: Some(path.clone()),
        last_donation_date: None,
    };
    t.state.db.update_profile(user_id, &update).unwrap();
    path
}

#[tokio::test]
async fn profile_edit_replaces_avatar_and_removes_old_file() {
    let t = test_app().await;
    let (user_id, cookie) = register(&t.state, "donor@example.com", "Dana");
    let old = store_avatar(&t, user_id).await;
    let media = t._media.path();

    let new_image = png(256);
    let req = post_multipart(
        "/profile/edit/",
        PROFILE_FIELDS,
        &[("avatar", "new.png", new_image.as_slice())],
        Some(&cookie),
    );
    let res = t.app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);

    let profile = t.state.db.get_profile(user_id).unwrap().unwrap().into_profile();
    let new = profile.avatar.unwrap();
    assert_ne!(new, old);
    assert!(!media.join(&old).exists());
    assert_eq!(std::fs::read(media.join(&new)).unwrap(), new_image);
}

#[tokio::test]
async fn profile_edit_without_a_new_file_keeps_avatar() {
    let t = test_app().await;
    let (user_id, cookie) = register(&t.state, "donor@example.com", "Dana");
    let old = store_avatar(&t, user_id).await;

    let no_file = [("avatar", "", b"".as_slice())];
    let req = post_multipart("/profile/edit/", PROFILE_FIELDS, &no_file, Some(&cookie));
    let res = t.app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);

    let profile = t.state.db.get_profile(user_id).unwrap().unwrap().into_profile();
    assert_eq!(profile.avatar.as_deref(), Some(old.as_str()));
    assert!(t._media.path().join(&old).exists());
}

// -- JSON endpoints --

#[tokio::test]
async fn api_requires_a_session() {
    let t = test_app().await;

    let res = t
        .app
        .clone()
        .oneshot(post_empty("/api/profile/toggle-availability/", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(res).await;
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn toggling_twice_restores_availability() {
    let t = test_app().await;
    let (_, cookie) = register(&t.state, "donor@example.com", "Dana");
    let uri = "/api/profile/toggle-availability/";

    let res = t.app.clone().oneshot(post_empty(uri, Some(&cookie))).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["is_available"], false);
    assert_eq!(json["message"], "Availability updated successfully");

    let res = t.app.clone().oneshot(post_empty(uri, Some(&cookie))).await.unwrap();
    assert_eq!(body_json(res).await["is_available"], true);
}

#[tokio::test]
async fn accepting_own_request_is_refused() {
    let t = test_app().await;
    let (owner_id, owner_cookie) = register(&t.state, "owner@example.com", "Olive");
    let request_id = create_request(&t.state, owner_id);

    let uri = format!("/api/requests/{}/accept/", request_id);
    let res = t.app.clone().oneshot(post_empty(&uri, Some(&owner_cookie))).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let json = body_json(res).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Cannot accept your own request");

    let request = t.state.db.get_request(request_id).unwrap().unwrap().into_request().unwrap();
    assert_eq!(request.status, RequestStatus::Pending);
}

#[tokio::test]
async fn another_user_accepts_a_pending_request_once() {
    let t = test_app().await;
    let (owner_id, _) = register(&t.state, "owner@example.com", "Olive");
    let (donor_id, donor_cookie) = register(&t.state, "donor@example.com", "Dana");
    let request_id = create_request(&t.state, owner_id);

    let uri = format!("/api/requests/{}/accept/", request_id);
    let res = t.app.clone().oneshot(post_empty(&uri, Some(&donor_cookie))).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["message"], "Request accepted successfully");

    let request = t.state.db.get_request(request_id).unwrap().unwrap().into_request().unwrap();
    assert_eq!(request.status, RequestStatus::Accepted);
    assert_eq!(request.accepted_by, Some(donor_id));

    // No longer pending.
    let res = t.app.clone().oneshot(post_empty(&uri, Some(&donor_cookie))).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(res).await["error"], "Request not found");
}

#[tokio::test]
async fn rejecting_cancels_and_own_reject_is_refused() {
    let t = test_app().await;
    let (owner_id, owner_cookie) = register(&t.state, "owner@example.com", "Olive");
    let (_, donor_cookie) = register(&t.state, "donor@example.com", "Dana");
    let request_id = create_request(&t.state, owner_id);
    let uri = format!("/api/requests/{}/reject/", request_id);

    let res = t.app.clone().oneshot(post_empty(&uri, Some(&owner_cookie))).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["error"], "Cannot reject your own request");

    let res = t.app.clone().oneshot(post_empty(&uri, Some(&donor_cookie))).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["message"], "Request rejected");

    let request = t.state.db.get_request(request_id).unwrap().unwrap().into_request().unwrap();
    assert_eq!(request.status, RequestStatus::Cancelled);
    assert_eq!(request.accepted_by, None);
}

#[tokio::test]
async fn unknown_request_is_not_found() {
    let t = test_app().await;
    let (_, cookie) = register(&t.state, "donor@example.com", "Dana");

    let res = t
        .app
        .clone()
        .oneshot(post_empty("/api/requests/9999/accept/", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
