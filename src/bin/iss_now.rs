//! One-shot variant of the bot's lookup: fetch the ISS position once
//! (resilient primary/fallback), reverse-geocode it, print both lines.

use std::path::PathBuf;

use anyhow::Result;

use spacebot::config::Config;
use spacebot::geocode::PlaceResolver;
use spacebot::location::ResilientFetcher;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    dotenvy::dotenv().ok();
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));
    let config = Config::load(&config_path)?;

    let client = reqwest::Client::new();
    let fetcher = ResilientFetcher::with_default_providers(&client);
    let resolver = PlaceResolver::new(client, config.geocode_key().map(str::to_string));

    let position = fetcher.fetch().await?;
    println!(
        "At {}, the ISS was at ({:.4}, {:.4})",
        position.human_utc(),
        position.latitude,
        position.longitude
    );

    let place = resolver.resolve(position.latitude, position.longitude).await;
    println!("Reverse geocode: {place}");

    Ok(())
}
