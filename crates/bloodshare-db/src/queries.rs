use crate::Database;
use crate::models::{
    DonorRow, NewDonationRequest, NewProfile, NewUser, ProfileRow, ProfileUpdate, RequestRow,
    UserRow, blood_group_column,
};
use anyhow::Result;
use bloodshare_types::models::{BloodGroup, RequestStatus, SiteStats};
use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, Row, params};

/// Outcome of creating an account together with its profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Created { user_id: i64 },
    EmailTaken,
}

/// Outcome of an accept/reject attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// No such request, or it has already left `pending`.
    NotFound,
    /// The caller owns the request.
    OwnRequest,
}

const USER_COLUMNS: &str =
    "SELECT id, username, email, password, first_name, last_name, created_at, last_login FROM users";

const PROFILE_COLUMNS: &str = "SELECT id, user_id, phone, blood_group, city, avatar, is_available, \
     last_donation_date, created_at, updated_at FROM profiles";

// Requester/acceptor names fall back to the username when no name is set.
const REQUEST_COLUMNS: &str = "SELECT r.id, r.requester_id,
        COALESCE(NULLIF(TRIM(u.first_name || ' ' || u.last_name), ''), u.username),
        r.accepted_by,
        COALESCE(NULLIF(TRIM(a.first_name || ' ' || a.last_name), ''), a.username),
        r.name, r.blood_group_needed, r.city, r.details, r.status, r.created_at, r.updated_at
     FROM donation_requests r
     JOIN users u ON u.id = r.requester_id
     LEFT JOIN users a ON a.id = r.accepted_by";

impl Database {
    // -- Users --

    /// Create a user and its profile in one transaction.
    pub fn register_user(&self, user: &NewUser, profile: &NewProfile) -> Result<Registration> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if email_taken(&tx, &user.email)? {
                return Ok(Registration::EmailTaken);
            }

            let user_id = insert_user(&tx, user)?;
            insert_profile(&tx, user_id, profile)?;
            tx.commit()?;

            Ok(Registration::Created { user_id })
        })
    }

    pub fn create_user(&self, user: &NewUser) -> Result<i64> {
        self.with_conn_mut(|conn| insert_user(conn, user))
    }

    pub fn email_exists(&self, email: &str) -> Result<bool> {
        self.with_conn(|conn| email_taken(conn, email))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(&format!("{USER_COLUMNS} WHERE email = ?1"), [email], map_user)
                .optional()
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(&format!("{USER_COLUMNS} WHERE id = ?1"), [id], map_user)
                .optional()
        })
    }

    pub fn count_users_with_email(&self, email: &str) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM users WHERE email = ?1", [email], |r| r.get(0))?)
        })
    }

    pub fn record_login(&self, user_id: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute("UPDATE users SET last_login = ?2 WHERE id = ?1", params![user_id, now()])?;
            Ok(())
        })
    }

    pub fn update_user_name(&self, user_id: i64, first_name: &str, last_name: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET first_name = ?2, last_name = ?3 WHERE id = ?1",
                params![user_id, first_name, last_name],
            )?;
            Ok(())
        })
    }

    /// Delete a user by email; profiles and requests go with it.
    pub fn delete_user_by_email(&self, email: &str) -> Result<bool> {
        self.with_conn_mut(|conn| Ok(conn.execute("DELETE FROM users WHERE email = ?1", [email])? > 0))
    }

    // -- Profiles --

    /// Fails if the user already has a profile.
    pub fn create_profile(&self, user_id: i64, profile: &NewProfile) -> Result<i64> {
        self.with_conn_mut(|conn| insert_profile(conn, user_id, profile))
    }

    pub fn get_profile(&self, user_id: i64) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| query_profile(conn, user_id))
    }

    pub fn get_or_create_profile(&self, user_id: i64) -> Result<ProfileRow> {
        self.with_conn_mut(|conn| {
            let ts = now();
            conn.execute(
                "INSERT OR IGNORE INTO profiles (user_id, created_at, updated_at) VALUES (?1, ?2, ?2)",
                params![user_id, ts],
            )?;
            query_profile(conn, user_id)?
                .ok_or_else(|| anyhow::anyhow!("Profile for user {} vanished after insert", user_id))
        })
    }

    /// Apply an edit. Returns the avatar path that was replaced, if any.
    pub fn update_profile(&self, user_id: i64, update: &ProfileUpdate) -> Result<Option<String>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let previous: Option<String> = tx
                .query_row("SELECT avatar FROM profiles WHERE user_id = ?1", [user_id], |r| r.get(0))
                .optional()?
                .flatten();

            tx.execute(
                "UPDATE profiles
                 SET phone = ?2, blood_group = ?3, city = ?4, avatar = COALESCE(?5, avatar),
                     last_donation_date = ?6, updated_at = ?7
                 WHERE user_id = ?1",
                params![
                    user_id,
                    update.phone,
                    blood_group_column(update.blood_group),
                    update.city,
                    update.avatar,
                    update.last_donation_date.map(|d| d.format("%Y-%m-%d").to_string()),
                    now(),
                ],
            )?;
            tx.commit()?;

            let replaced = match (&update.avatar, previous) {
                (Some(new), Some(old)) if *new != old => Some(old),
                _ => None,
            };
            Ok(replaced)
        })
    }

    /// Flip `is_available` in place. `None` when the user has no profile.
    pub fn toggle_availability(&self, user_id: i64) -> Result<Option<bool>> {
        self.with_conn_mut(|conn| {
            conn.query_row(
                "UPDATE profiles SET is_available = NOT is_available, updated_at = ?2
                 WHERE user_id = ?1
                 RETURNING is_available",
                params![user_id, now()],
                |r| r.get(0),
            )
            .optional()
        })
    }

    pub fn list_available_donors(
        &self,
        exclude_user_id: i64,
        blood_group: Option<BloodGroup>,
        city: Option<&str>,
        limit: u32,
    ) -> Result<Vec<DonorRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.user_id,
                        COALESCE(NULLIF(TRIM(u.first_name || ' ' || u.last_name), ''), u.username),
                        p.blood_group, p.city, p.avatar, p.last_donation_date
                 FROM profiles p
                 JOIN users u ON u.id = p.user_id
                 WHERE p.is_available = 1
                   AND p.user_id <> ?1
                   AND (?2 = '' OR p.blood_group = ?2)
                   AND (?3 = '' OR p.city = ?3 COLLATE NOCASE)
                 ORDER BY p.created_at DESC, p.id DESC
                 LIMIT ?4",
            )?;

            let rows = stmt
                .query_map(
                    params![exclude_user_id, blood_group_column(blood_group), city.unwrap_or(""), limit],
                    |row| {
                        Ok(DonorRow {
                            user_id: row.get(0)?,
                            name: row.get(1)?,
                            blood_group: row.get(2)?,
                            city: row.get(3)?,
                            avatar: row.get(4)?,
                            last_donation_date: row.get(5)?,
                        })
                    },
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Donation requests --

    /// New requests always start out `pending`.
    pub fn create_request(&self, requester_id: i64, req: &NewDonationRequest) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let ts = now();
            conn.execute(
                "INSERT INTO donation_requests
                    (requester_id, name, blood_group_needed, city, details, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    requester_id,
                    req.name,
                    req.blood_group_needed.as_str(),
                    req.city,
                    req.details,
                    RequestStatus::Pending.as_str(),
                    ts,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_request(&self, id: i64) -> Result<Option<RequestRow>> {
        self.with_conn(|conn| {
            conn.query_row(&format!("{REQUEST_COLUMNS} WHERE r.id = ?1"), [id], map_request)
                .optional()
        })
    }

    /// All requests, newest first.
    pub fn list_requests(&self, limit: u32) -> Result<Vec<RequestRow>> {
        self.with_conn(|conn| {
            query_requests(
                conn,
                &format!("{REQUEST_COLUMNS} ORDER BY r.created_at DESC, r.id DESC LIMIT ?1"),
                params![limit],
            )
        })
    }

    pub fn list_requests_by_requester(&self, user_id: i64, limit: u32) -> Result<Vec<RequestRow>> {
        self.with_conn(|conn| {
            query_requests(
                conn,
                &format!(
                    "{REQUEST_COLUMNS} WHERE r.requester_id = ?1
                     ORDER BY r.created_at DESC, r.id DESC LIMIT ?2"
                ),
                params![user_id, limit],
            )
        })
    }

    /// Pending requests posted by anyone except `user_id`.
    pub fn list_open_requests(&self, user_id: i64, limit: u32) -> Result<Vec<RequestRow>> {
        self.with_conn(|conn| {
            query_requests(
                conn,
                &format!(
                    "{REQUEST_COLUMNS} WHERE r.status = 'pending' AND r.requester_id <> ?1
                     ORDER BY r.created_at DESC, r.id DESC LIMIT ?2"
                ),
                params![user_id, limit],
            )
        })
    }

    pub fn accept_request(&self, request_id: i64, user_id: i64) -> Result<Transition> {
        self.with_conn_mut(|conn| transition(conn, request_id, user_id, RequestStatus::Accepted))
    }

    pub fn reject_request(&self, request_id: i64, user_id: i64) -> Result<Transition> {
        self.with_conn_mut(|conn| transition(conn, request_id, user_id, RequestStatus::Cancelled))
    }

    // -- Stats --

    pub fn site_stats(&self) -> Result<SiteStats> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM profiles WHERE is_available = 1),
                    (SELECT COUNT(*) FROM donation_requests WHERE status IN ('accepted', 'fulfilled')),
                    (SELECT COUNT(*) FROM donation_requests WHERE status = 'pending')",
                [],
                |r| {
                    Ok(SiteStats {
                        available_donors: r.get(0)?,
                        requests_answered: r.get(1)?,
                        active_requests: r.get(2)?,
                    })
                },
            )?)
        })
    }
}

pub(crate) fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn email_taken(conn: &Connection, email: &str) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1 OR username = ?1)",
        [email],
        |r| r.get(0),
    )?)
}

fn insert_user(conn: &Connection, user: &NewUser) -> Result<i64> {
    conn.execute(
        "INSERT INTO users (username, email, password, first_name, last_name, created_at)
         VALUES (?1, ?1, ?2, ?3, ?4, ?5)",
        params![user.email, user.password_hash, user.first_name, user.last_name, now()],
    )?;
    Ok(conn.last_insert_rowid())
}

fn insert_profile(conn: &Connection, user_id: i64, profile: &NewProfile) -> Result<i64> {
    let ts = now();
    conn.execute(
        "INSERT INTO profiles
            (user_id, phone, blood_group, city, avatar, is_available, last_donation_date, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            user_id,
            profile.phone,
            blood_group_column(profile.blood_group),
            profile.city,
            profile.avatar,
            profile.is_available,
            profile.last_donation_date.map(|d| d.format("%Y-%m-%d").to_string()),
            ts,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn query_profile(conn: &Connection, user_id: i64) -> Result<Option<ProfileRow>> {
    conn.query_row(&format!("{PROFILE_COLUMNS} WHERE user_id = ?1"), [user_id], |row| {
        Ok(ProfileRow {
            id: row.get(0)?,
            user_id: row.get(1)?,
            phone: row.get(2)?,
            blood_group: row.get(3)?,
            city: row.get(4)?,
            avatar: row.get(5)?,
            is_available: row.get(6)?,
            last_donation_date: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    })
    .optional()
}

fn query_requests(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<RequestRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, map_request)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Guarded single-statement transition: the status check and the write
/// happen in one UPDATE, so two racing callers cannot both succeed.
fn transition(
    conn: &Connection,
    request_id: i64,
    actor_id: i64,
    target: RequestStatus,
) -> Result<Transition> {
    let changed = conn.execute(
        "UPDATE donation_requests
         SET status = ?3,
             accepted_by = CASE WHEN ?3 = 'accepted' THEN ?2 ELSE accepted_by END,
             updated_at = ?4
         WHERE id = ?1 AND status = 'pending' AND requester_id <> ?2",
        params![request_id, actor_id, target.as_str(), now()],
    )?;

    if changed > 0 {
        return Ok(Transition::Applied);
    }

    let owner: Option<i64> = conn
        .query_row(
            "SELECT requester_id FROM donation_requests WHERE id = ?1 AND status = 'pending'",
            [request_id],
            |r| r.get(0),
        )
        .optional()?;

    Ok(match owner {
        Some(owner) if owner == actor_id => Transition::OwnRequest,
        _ => Transition::NotFound,
    })
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        created_at: row.get(6)?,
        last_login: row.get(7)?,
    })
}

fn map_request(row: &Row<'_>) -> rusqlite::Result<RequestRow> {
    Ok(RequestRow {
        id: row.get(0)?,
        requester_id: row.get(1)?,
        requester_name: row.get(2)?,
        accepted_by: row.get(3)?,
        accepted_by_name: row.get(4)?,
        name: row.get(5)?,
        blood_group_needed: row.get(6)?,
        city: row.get(7)?,
        details: row.get(8)?,
        status: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
