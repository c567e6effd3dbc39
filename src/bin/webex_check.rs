//! Webex connectivity check: list the rooms the token can see, prompt for a
//! title, and post a canned test message into it.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Result};

use spacebot::config::Config;
use spacebot::webex::{pick_room_by_title, ChatGateway, WebexGateway};

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
    config.require_webex_token()?;

    let gateway = WebexGateway::new(reqwest::Client::new(), config.webex.token.clone());

    let rooms = gateway.list_rooms().await?;
    println!("Your Webex rooms:");
    for room in &rooms {
        println!("- {:<6}  {}", room.kind, room.title);
    }

    print!("\nType the EXACT room title to post a test message: ");
    std::io::stdout().flush()?;
    let mut title = String::new();
    std::io::stdin().read_line(&mut title)?;

    let Some(room) = pick_room_by_title(&rooms, &title) else {
        bail!("Room not found. Check the title and try again.");
    };

    println!("Posting to: {}", room.title);
    gateway
        .post_message(&room.id, "Hello from spacebot connectivity check")
        .await?;
    println!("Posted.");

    Ok(())
}
