//! Load the sample donors and requests into the configured database.

use std::path::PathBuf;

use tracing::info;

use bloodshare_api::auth::hash_password;
use bloodshare_db::Database;
use bloodshare_db::seed::SAMPLE_PASSWORD;

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bloodshare_seed=info,bloodshare_db=info".into()),
        )
        .init();

    let db_path: PathBuf = std::env::var("BLOODSHARE_DB_PATH")
        .unwrap_or_else(|_| "bloodshare.db".into())
        .into();

    let db = Database::open(&db_path)?;
    let report = db.seed_sample_data(&hash_password(SAMPLE_PASSWORD)?)?;

    info!(
        "Seeded {} users and {} donation requests into {}",
        report.users,
        report.requests,
        db_path.display()
    );
    info!("Every sample account uses the password {}", SAMPLE_PASSWORD);
    Ok(())
}
