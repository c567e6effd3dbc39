use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spacebot::bot::PollLoop;
use spacebot::config::Config;
use spacebot::geocode::PlaceResolver;
use spacebot::location::ResilientFetcher;
use spacebot::webex::{pick_room_by_title, ChatGateway, WebexGateway};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,spacebot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration (.env, then config.toml, then env overrides)
    dotenvy::dotenv().ok();
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    config.require_webex_token()?;
    if config.geocode_key().is_none() {
        info!("No OPENWEATHER_KEY configured; replies will carry a diagnostic place string");
    }

    let client = reqwest::Client::new();
    let gateway = WebexGateway::new(client.clone(), config.webex.token.clone());
    let fetcher = ResilientFetcher::with_default_providers(&client);
    let resolver = PlaceResolver::new(client, config.geocode_key().map(str::to_string));

    // Show rooms and pick one
    let rooms = gateway.list_rooms().await?;
    println!("Your Webex rooms:");
    for room in &rooms {
        println!("- {:<6}  {}", room.kind, room.title);
    }

    print!("\nType the EXACT room title to monitor (for messages like /5): ");
    std::io::stdout().flush()?;
    let mut title = String::new();
    std::io::stdin().read_line(&mut title)?;

    let Some(room) = pick_room_by_title(&rooms, &title) else {
        bail!("Room not found. Re-run and pick a printed title.");
    };
    let room_id = room.id.clone();
    info!("Monitoring: {}", room.title);

    // Ctrl-C breaks the loop at the top of the next iteration
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, stopping");
            signal_cancel.cancel();
        }
    });

    PollLoop::new(gateway, fetcher, resolver, room_id)
        .run(cancel)
        .await?;

    Ok(())
}
