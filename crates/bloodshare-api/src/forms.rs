//! Submitted-form extraction and field validation.
//!
//! Every form validates into a typed value or a [`FormErrors`] map keyed by
//! field name, which the templates render next to the offending input.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use axum::{
    body::Bytes,
    extract::{Form, FromRequest, Multipart, Request, multipart::MultipartError},
    http::{StatusCode, header::CONTENT_TYPE},
};
use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use tracing::warn;

use bloodshare_types::models::BloodGroup;

use crate::error::AppError;
use crate::storage::image_extension;

pub const REQUIRED: &str = "This field is required.";
pub const PASSWORD_MISMATCH: &str = "The two password fields didn't match.";
pub const EMAIL_TAKEN: &str = "A user with this email already exists.";
pub const INVALID_CREDENTIALS: &str = "Invalid email or password.";

const PHONE_MESSAGE: &str =
    "Phone number must be entered in the format: '+999999999'. Up to 15 digits allowed.";
const MIN_PASSWORD_LEN: usize = 8;

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?1?\d{9,15}$").expect("phone pattern compiles"));
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$")
        .expect("email pattern compiles")
});

// -- Raw submission --

/// Fields of a urlencoded or multipart form body.
#[derive(Debug, Default)]
pub struct SubmittedForm {
    fields: HashMap<String, String>,
    files: HashMap<String, Bytes>,
    /// File field whose upload ran past the body limit. Parsing stops there.
    oversized: Option<String>,
}

impl SubmittedForm {
    pub fn from_fields<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            ..Default::default()
        }
    }

    pub fn with_file(mut self, name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.files.insert(name.into(), data.into());
        self
    }

    /// Trimmed text value, empty when absent.
    pub fn text(&self, name: &str) -> &str {
        self.fields.get(name).map(|v| v.trim()).unwrap_or("")
    }

    /// Untrimmed value, for passwords.
    pub fn raw(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }

    /// Checkbox semantics: present and not an explicit false.
    pub fn checked(&self, name: &str) -> bool {
        match self.fields.get(name) {
            Some(v) => !matches!(v.trim(), "" | "false" | "False" | "0" | "off"),
            None => false,
        }
    }

    pub fn file(&self, name: &str) -> Option<&Bytes> {
        self.files.get(name)
    }

    pub fn oversized(&self, name: &str) -> bool {
        self.oversized.as_deref() == Some(name)
    }

    /// Submitted text values to echo back into a re-rendered form.
    /// Password fields are never echoed.
    pub fn echo(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .filter(|(k, _)| !k.starts_with("password"))
            .map(|(k, v)| (k.clone(), v.trim().to_string()))
            .collect()
    }

    /// Keep what was read so far when a file upload hits the body limit;
    /// any other multipart failure rejects the request.
    fn cut_short(mut self, e: MultipartError, file_field: Option<String>) -> Result<Self, AppError> {
        match file_field {
            Some(name) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                warn!("Upload in field '{}' exceeded the body limit", name);
                self.oversized = Some(name);
                Ok(self)
            }
            _ => Err(AppError::BadRequest(e.body_text())),
        }
    }
}

impl<S> FromRequest<S> for SubmittedForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if !multipart {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            return Ok(Self::from_fields(fields));
        }

        let mut body = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        let mut form = Self::default();
        let mut last_file: Option<String> = None;

        loop {
            let field = match body.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(e) => return form.cut_short(e, last_file),
            };
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if let Some(file_name) = field.file_name().map(str::to_string) {
                last_file = Some(name.clone());
                let data = match field.bytes().await {
                    Ok(data) => data,
                    Err(e) => return form.cut_short(e, last_file),
                };
                // Browsers send an empty part when no file was chosen.
                if !file_name.is_empty() && !data.is_empty() {
                    form.files.insert(name, data);
                }
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }
}

// -- Errors --

#[derive(Debug, Default, Clone, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    fn into_result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

/// An accepted avatar upload.
#[derive(Debug, Clone)]
pub struct AvatarUpload {
    pub extension: &'static str,
    pub data: Bytes,
}

// -- Forms --

#[derive(Debug)]
pub struct SignupData {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    pub blood_group: Option<BloodGroup>,
    pub city: String,
    pub avatar: Option<AvatarUpload>,
}

pub fn validate_signup(form: &SubmittedForm, max_avatar_bytes: usize) -> Result<SignupData, FormErrors> {
    let mut errors = FormErrors::default();

    let full_name = required(&mut errors, form, "full_name", 150);
    let email = email(&mut errors, form, "email");

    let password1 = form.raw("password1");
    let password2 = form.raw("password2");
    if password1.is_empty() {
        errors.add("password1", REQUIRED);
    }
    if password2.is_empty() {
        errors.add("password2", REQUIRED);
    }
    if !password1.is_empty() && !password2.is_empty() {
        if password1 != password2 {
            errors.add("password2", PASSWORD_MISMATCH);
        } else {
            for problem in password_problems(password2) {
                errors.add("password2", problem);
            }
        }
    }

    let phone = phone(&mut errors, form, "phone");
    let blood_group = blood_group(&mut errors, form, "blood_group", false);
    let city = optional(&mut errors, form, "city", 100);
    let avatar = avatar(&mut errors, form, "avatar", max_avatar_bytes);

    if !form.checked("agree_to_terms") {
        errors.add("agree_to_terms", REQUIRED);
    }

    let (first_name, last_name) = split_full_name(&full_name);
    errors.into_result(SignupData {
        first_name,
        last_name,
        email,
        password: password1.to_string(),
        phone,
        blood_group,
        city,
        avatar,
    })
}

#[derive(Debug)]
pub struct LoginData {
    pub email: String,
    pub password: String,
    pub remember_me: bool,
}

pub fn validate_login(form: &SubmittedForm) -> Result<LoginData, FormErrors> {
    let mut errors = FormErrors::default();

    let email = email(&mut errors, form, "email");
    let password = form.raw("password");
    if password.is_empty() {
        errors.add("password", REQUIRED);
    }

    errors.into_result(LoginData {
        email,
        password: password.to_string(),
        remember_me: form.checked("remember_me"),
    })
}

#[derive(Debug)]
pub struct ProfileData {
    /// `None` when the name field was left blank: the stored name is kept.
    pub name: Option<(String, String)>,
    pub phone: String,
    pub blood_group: Option<BloodGroup>,
    pub city: String,
    pub avatar: Option<AvatarUpload>,
    pub last_donation_date: Option<NaiveDate>,
}

pub fn validate_profile(form: &SubmittedForm, max_avatar_bytes: usize) -> Result<ProfileData, FormErrors> {
    let mut errors = FormErrors::default();

    let full_name = optional(&mut errors, form, "full_name", 150);
    let phone = phone(&mut errors, form, "phone");
    let blood_group = blood_group(&mut errors, form, "blood_group", false);
    let city = optional(&mut errors, form, "city", 100);
    let avatar = avatar(&mut errors, form, "avatar", max_avatar_bytes);

    let raw_date = form.text("last_donation_date");
    let last_donation_date = if raw_date.is_empty() {
        None
    } else {
        match NaiveDate::parse_from_str(raw_date, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                errors.add("last_donation_date", "Enter a valid date.");
                None
            }
        }
    };

    let name = (!full_name.is_empty()).then(|| split_full_name(&full_name));
    errors.into_result(ProfileData {
        name,
        phone,
        blood_group,
        city,
        avatar,
        last_donation_date,
    })
}

#[derive(Debug)]
pub struct RequestData {
    pub name: String,
    pub blood_group_needed: BloodGroup,
    pub city: String,
    pub details: String,
}

pub fn validate_request(form: &SubmittedForm) -> Result<RequestData, FormErrors> {
    let mut errors = FormErrors::default();

    let name = required(&mut errors, form, "name", 200);
    let blood_group_needed = blood_group(&mut errors, form, "blood_group_needed", true);
    let city = required(&mut errors, form, "city", 100);
    let details = form.text("details").to_string();

    match blood_group_needed {
        Some(blood_group_needed) if errors.is_empty() => Ok(RequestData {
            name,
            blood_group_needed,
            city,
            details,
        }),
        _ => Err(errors),
    }
}

/// First whitespace-separated token is the first name, the rest the last name.
pub fn split_full_name(full_name: &str) -> (String, String) {
    let mut parts = full_name.split_whitespace();
    let first = parts.next().unwrap_or("").to_string();
    let last = parts.collect::<Vec<_>>().join(" ");
    (first, last)
}

// -- Field validators --

fn required(errors: &mut FormErrors, form: &SubmittedForm, field: &str, max_len: usize) -> String {
    let value = form.text(field);
    if value.is_empty() {
        errors.add(field, REQUIRED);
    } else {
        check_length(errors, field, value, max_len);
    }
    value.to_string()
}

fn optional(errors: &mut FormErrors, form: &SubmittedForm, field: &str, max_len: usize) -> String {
    let value = form.text(field);
    check_length(errors, field, value, max_len);
    value.to_string()
}

fn check_length(errors: &mut FormErrors, field: &str, value: &str, max_len: usize) {
    let len = value.chars().count();
    if len > max_len {
        errors.add(
            field,
            format!("Ensure this value has at most {} characters (it has {}).", max_len, len),
        );
    }
}

fn email(errors: &mut FormErrors, form: &SubmittedForm, field: &str) -> String {
    let value = form.text(field);
    if value.is_empty() {
        errors.add(field, REQUIRED);
    } else if value.len() > 254 || !EMAIL_RE.is_match(value) {
        errors.add(field, "Enter a valid email address.");
    }
    value.to_string()
}

fn phone(errors: &mut FormErrors, form: &SubmittedForm, field: &str) -> String {
    let value = form.text(field);
    if !value.is_empty() {
        if value.chars().count() > 15 {
            check_length(errors, field, value, 15);
        } else if !PHONE_RE.is_match(value) {
            errors.add(field, PHONE_MESSAGE);
        }
    }
    value.to_string()
}

fn blood_group(
    errors: &mut FormErrors,
    form: &SubmittedForm,
    field: &str,
    required: bool,
) -> Option<BloodGroup> {
    let value = form.text(field);
    if value.is_empty() {
        if required {
            errors.add(field, REQUIRED);
        }
        return None;
    }
    match value.parse() {
        Ok(group) => Some(group),
        Err(_) => {
            errors.add(
                field,
                format!("Select a valid choice. {} is not one of the available choices.", value),
            );
            None
        }
    }
}

fn avatar(
    errors: &mut FormErrors,
    form: &SubmittedForm,
    field: &str,
    max_bytes: usize,
) -> Option<AvatarUpload> {
    let too_large = format!("Image files may be at most {} KB.", max_bytes / 1024);
    if form.oversized(field) {
        errors.add(field, too_large);
        return None;
    }
    let data = form.file(field)?;
    if data.len() > max_bytes {
        errors.add(field, too_large);
        return None;
    }
    match image_extension(data) {
        Some(extension) => Some(AvatarUpload {
            extension,
            data: data.clone(),
        }),
        None => {
            errors.add(
                field,
                "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
            );
            None
        }
    }
}

fn password_problems(password: &str) -> Vec<&'static str> {
    let mut problems = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LEN {
        problems.push("This password is too short. It must contain at least 8 characters.");
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.");
    }
    problems
}
