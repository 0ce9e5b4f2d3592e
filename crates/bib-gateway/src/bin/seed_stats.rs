//! Reset the follower counters to their initial values.
//!
//! Reads `DB_PATH` (default `./bitsinbinary.db`), clears `platform_stats`, inserts
//! the seed counts and logs the resulting summary.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bib_gateway::db::Database;
use bib_gateway::platform::{format_followers, format_total, Platform};

const SEED: &[(Platform, u64)] = &[
    (Platform::Instagram, 5000),
    (Platform::Youtube, 12),
    (Platform::Facebook, 21),
    (Platform::Twitter, 1),
    (Platform::Linkedin, 22),
    (Platform::Github, 1),
];

fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db_path = std::env::var("DB_PATH").unwrap_or_else(|_| "./bitsinbinary.db".to_string());

    if let Err(e) = seed(&db_path) {
        tracing::error!(error = %e, "seeding failed");
        std::process::exit(1);
    }
}

fn seed(db_path: &str) -> Result<(), bib_gateway::GatewayError> {
    let db = Database::new(db_path)?;

    db.replace_platform_stats(SEED)?;
    tracing::info!(path = %db_path, "cleared and seeded platform stats");

    let stats = db.list_platform_stats()?;
    let mut total = 0u64;
    for stat in &stats {
        total = total.saturating_add(stat.followers);
        tracing::info!(
            "{}: {} ({})",
            stat.platform,
            format_followers(stat.followers),
            stat.followers
        );
    }
    tracing::info!("Total: {} ({})", format_total(total), total);
    Ok(())
}
