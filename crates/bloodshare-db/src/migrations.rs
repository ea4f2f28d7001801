use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &mut Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (users, profiles, donation requests)");
        let tx = conn.transaction()?;
        tx.execute_batch(
            "
            CREATE TABLE users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                username    TEXT NOT NULL UNIQUE COLLATE NOCASE,
                email       TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password    TEXT NOT NULL,
                first_name  TEXT NOT NULL DEFAULT '',
                last_name   TEXT NOT NULL DEFAULT '',
                created_at  TEXT NOT NULL,
                last_login  TEXT
            );

            CREATE TABLE profiles (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id             INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
                phone               TEXT NOT NULL DEFAULT '',
                blood_group         TEXT NOT NULL DEFAULT '',
                city                TEXT NOT NULL DEFAULT '',
                avatar              TEXT,
                is_available        INTEGER NOT NULL DEFAULT 0,
                last_donation_date  TEXT,
                created_at          TEXT NOT NULL,
                updated_at          TEXT NOT NULL
            );

            CREATE TABLE donation_requests (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                requester_id        INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                accepted_by         INTEGER REFERENCES users(id) ON DELETE SET NULL,
                name                TEXT NOT NULL,
                blood_group_needed  TEXT NOT NULL,
                city                TEXT NOT NULL,
                details             TEXT NOT NULL DEFAULT '',
                status              TEXT NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending', 'accepted', 'fulfilled', 'cancelled')),
                created_at          TEXT NOT NULL,
                updated_at          TEXT NOT NULL
            );

            CREATE INDEX idx_requests_requester
                ON donation_requests(requester_id, created_at);

            CREATE INDEX idx_requests_status
                ON donation_requests(status, created_at);

            CREATE INDEX idx_profiles_available
                ON profiles(is_available, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
        tx.commit()?;
    }

    info!("Database migrations complete");
    Ok(())
}
