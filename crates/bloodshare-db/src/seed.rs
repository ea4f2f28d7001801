use anyhow::Result;
use bloodshare_types::models::BloodGroup;
use chrono::{Duration, Utc};
use tracing::info;

use crate::Database;
use crate::models::{NewDonationRequest, NewProfile, NewUser};

/// Password every sample account is created with.
pub const SAMPLE_PASSWORD: &str = "SamplePass123!";

pub struct SampleUser {
    pub email: &'static str,
    pub first_name: &'static str,
    pub last_name: &'static str,
    pub phone: &'static str,
    pub blood_group: BloodGroup,
    pub city: &'static str,
    pub is_available: bool,
}

pub const SAMPLE_USERS: &[SampleUser] = &[
    SampleUser {
        email: "alice.johnson@example.com",
        first_name: "Alice",
        last_name: "Johnson",
        phone: "+15555550101",
        blood_group: BloodGroup::OPos,
        city: "New York",
        is_available: true,
    },
    SampleUser {
        email: "bob.smith@example.com",
        first_name: "Bob",
        last_name: "Smith",
        phone: "+15555550102",
        blood_group: BloodGroup::APos,
        city: "Los Angeles",
        is_available: true,
    },
    SampleUser {
        email: "charlie.brown@example.com",
        first_name: "Charlie",
        last_name: "Brown",
        phone: "+15555550103",
        blood_group: BloodGroup::BPos,
        city: "Chicago",
        is_available: false,
    },
    SampleUser {
        email: "diana.prince@example.com",
        first_name: "Diana",
        last_name: "Prince",
        phone: "+15555550104",
        blood_group: BloodGroup::AbPos,
        city: "Houston",
        is_available: true,
    },
    SampleUser {
        email: "edward.norton@example.com",
        first_name: "Edward",
        last_name: "Norton",
        phone: "+15555550105",
        blood_group: BloodGroup::ONeg,
        city: "Phoenix",
        is_available: true,
    },
];

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub users: usize,
    pub requests: usize,
}

impl Database {
    /// Replace the sample accounts (and everything they own) with fresh copies.
    /// `password_hash` is stored for every account.
    pub fn seed_sample_data(&self, password_hash: &str) -> Result<SeedReport> {
        let mut report = SeedReport::default();
        let last_donation = (Utc::now() - Duration::days(90)).date_naive();

        for sample in SAMPLE_USERS {
            if self.delete_user_by_email(sample.email)? {
                info!("Removed existing sample user {}", sample.email);
            }
        }

        let mut ids = Vec::with_capacity(SAMPLE_USERS.len());
        for sample in SAMPLE_USERS {
            let user_id = self.create_user(&NewUser {
                email: sample.email.to_string(),
                password_hash: password_hash.to_string(),
                first_name: sample.first_name.to_string(),
                last_name: sample.last_name.to_string(),
            })?;
            self.create_profile(
                user_id,
                &NewProfile {
                    phone: sample.phone.to_string(),
                    blood_group: Some(sample.blood_group),
                    city: sample.city.to_string(),
                    avatar: None,
                    is_available: sample.is_available,
                    last_donation_date: sample.is_available.then_some(last_donation),
                },
            )?;
            info!(
                "Created user: {} {} ({}) - {}",
                sample.first_name, sample.last_name, sample.blood_group, sample.city
            );
            ids.push(user_id);
            report.users += 1;
        }

        let requests = [
            (0, "John Doe", BloodGroup::OPos, "New York", "Urgent need for surgery"),
            (1, "Jane Smith", BloodGroup::APos, "Los Angeles", "Emergency transfusion needed"),
        ];
        for (owner, name, group, city, details) in requests {
            self.create_request(
                ids[owner],
                &NewDonationRequest {
                    name: name.to_string(),
                    blood_group_needed: group,
                    city: city.to_string(),
                    details: details.to_string(),
                },
            )?;
            report.requests += 1;
        }

        Ok(report)
    }
}
