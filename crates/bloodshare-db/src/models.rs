//! Database row types. These map directly to SQLite rows; the `into_*`
//! conversions lift them into the shared `bloodshare-types` records.

use bloodshare_types::models::{BloodGroup, DonationRequest, Donor, Profile, RequestStatus, User};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: String,
    pub last_login: Option<String>,
}

pub struct ProfileRow {
    pub id: i64,
    pub user_id: i64,
    pub phone: String,
    pub blood_group: String,
    pub city: String,
    pub avatar: Option<String>,
    pub is_available: bool,
    pub last_donation_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct RequestRow {
    pub id: i64,
    pub requester_id: i64,
    pub requester_name: String,
    pub accepted_by: Option<i64>,
    pub accepted_by_name: Option<String>,
    pub name: String,
    pub blood_group_needed: String,
    pub city: String,
    pub details: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct DonorRow {
    pub user_id: i64,
    pub name: String,
    pub blood_group: String,
    pub city: String,
    pub avatar: Option<String>,
    pub last_donation_date: Option<String>,
}

// -- Inputs --

pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Default)]
pub struct NewProfile {
    pub phone: String,
    pub blood_group: Option<BloodGroup>,
    pub city: String,
    pub avatar: Option<String>,
    pub is_available: bool,
    pub last_donation_date: Option<NaiveDate>,
}

/// Replacement values for an edited profile. `avatar: None` keeps the stored one.
pub struct ProfileUpdate {
    pub phone: String,
    pub blood_group: Option<BloodGroup>,
    pub city: String,
    pub avatar: Option<String>,
    pub last_donation_date: Option<NaiveDate>,
}

pub struct NewDonationRequest {
    pub name: String,
    pub blood_group_needed: BloodGroup,
    pub city: String,
    pub details: String,
}

// -- Conversions --

impl UserRow {
    pub fn into_user(self) -> User {
        User {
            created_at: parse_timestamp(&self.created_at),
            last_login: self.last_login.as_deref().map(parse_timestamp),
            id: self.id,
            username: self.username,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
        }
    }
}

impl ProfileRow {
    pub fn into_profile(self) -> Profile {
        Profile {
            blood_group: parse_blood_group(&self.blood_group),
            last_donation_date: self.last_donation_date.as_deref().and_then(parse_date),
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
            id: self.id,
            user_id: self.user_id,
            phone: self.phone,
            city: self.city,
            avatar: self.avatar,
            is_available: self.is_available,
        }
    }
}

impl RequestRow {
    /// `None` when the stored blood group is not one of the eight known labels.
    pub fn into_request(self) -> Option<DonationRequest> {
        let Some(blood_group_needed) = parse_blood_group(&self.blood_group_needed) else {
            warn!("Skipping request {} with corrupt blood group '{}'", self.id, self.blood_group_needed);
            return None;
        };
        let status = self.status.parse().unwrap_or_else(|e| {
            warn!("Corrupt status on request {}: {}", self.id, e);
            RequestStatus::Pending
        });

        Some(DonationRequest {
            blood_group_needed,
            status,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
            id: self.id,
            requester_id: self.requester_id,
            requester_name: self.requester_name,
            accepted_by: self.accepted_by,
            accepted_by_name: self.accepted_by_name,
            name: self.name,
            city: self.city,
            details: self.details,
        })
    }
}

impl DonorRow {
    pub fn into_donor(self) -> Donor {
        Donor {
            blood_group: parse_blood_group(&self.blood_group),
            last_donation_date: self.last_donation_date.as_deref().and_then(parse_date),
            user_id: self.user_id,
            name: self.name,
            city: self.city,
            avatar: self.avatar,
        }
    }
}

pub(crate) fn blood_group_column(group: Option<BloodGroup>) -> &'static str {
    group.map(BloodGroup::as_str).unwrap_or("")
}

fn parse_blood_group(raw: &str) -> Option<BloodGroup> {
    if raw.is_empty() {
        return None;
    }
    raw.parse()
        .map_err(|e| warn!("Corrupt blood group: {}", e))
        .ok()
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| warn!("Corrupt date '{}': {}", raw, e))
        .ok()
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by hand through sqlite3 use "YYYY-MM-DD HH:MM:SS".
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}
