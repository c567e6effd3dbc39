use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

pub const WEBEX_BASE_URL: &str = "https://webexapis.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    Direct,
    Group,
    #[serde(other)]
    #[default]
    Other,
}

impl std::fmt::Display for RoomKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoomKind::Direct => write!(f, "direct"),
            RoomKind::Group => write!(f, "group"),
            RoomKind::Other => write!(f, "other"),
        }
    }
}

/// A read-only snapshot of a Webex room.
#[derive(Debug, Clone, Deserialize)]
pub struct Room {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: RoomKind,
}

/// The newest message in a room, trimmed text included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestMessage {
    pub id: String,
    pub text: String,
}

/// The three chat operations the bot needs from Webex.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn list_rooms(&self) -> Result<Vec<Room>>;
    async fn latest_message(&self, room_id: &str) -> Result<Option<LatestMessage>>;
    async fn post_message(&self, room_id: &str, text: &str) -> Result<()>;
}

/// Case-insensitive exact-title room selection.
pub fn pick_room_by_title<'a>(rooms: &'a [Room], title: &str) -> Option<&'a Room> {
    let want = title.trim().to_lowercase();
    rooms.iter().find(|r| r.title.trim().to_lowercase() == want)
}

#[derive(Debug, Deserialize)]
struct RoomList {
    #[serde(default)]
    items: Vec<Room>,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    items: Vec<MessageItem>,
}

#[derive(Debug, Deserialize)]
struct MessageItem {
    id: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct PostMessageBody<'a> {
    #[serde(rename = "roomId")]
    room_id: &'a str,
    text: &'a str,
}

pub struct WebexGateway {
    client: reqwest::Client,
    token: String,
    base_url: String,
    timeout: Duration,
}

impl WebexGateway {
    pub fn new(client: reqwest::Client, token: String) -> Self {
        Self::with_base_url(client, token, WEBEX_BASE_URL)
    }

    pub fn with_base_url(
        client: reqwest::Client,
        token: String,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            token,
            base_url: base_url.into(),
            timeout: Duration::from_secs(15),
        }
    }

    async fn check(response: reqwest::Response, doing: &'static str) -> Result<reqwest::Response> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized(doing));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatGateway for WebexGateway {
    async fn list_rooms(&self) -> Result<Vec<Room>> {
        let response = self
            .client
            .get(format!("{}/v1/rooms", self.base_url))
            .bearer_auth(&self.token)
            .timeout(self.timeout)
            .send()
            .await?;
        let response = Self::check(response, "listing rooms").await?;
        let rooms: RoomList = response.json().await?;
        debug!("Webex returned {} rooms", rooms.items.len());
        Ok(rooms.items)
    }

    async fn latest_message(&self, room_id: &str) -> Result<Option<LatestMessage>> {
        let response = self
            .client
            .get(format!("{}/v1/messages", self.base_url))
            .bearer_auth(&self.token)
            .query(&[("roomId", room_id), ("max", "1")])
            .timeout(self.timeout)
            .send()
            .await?;
        let response = Self::check(response, "reading messages").await?;
        let list: MessageList = response.json().await?;
        Ok(list.items.into_iter().next().map(|m| LatestMessage {
            id: m.id,
            text: m.text.unwrap_or_default().trim().to_string(),
        }))
    }

    async fn post_message(&self, room_id: &str, text: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .bearer_auth(&self.token)
            .json(&PostMessageBody { room_id, text })
            .timeout(self.timeout)
            .send()
            .await?;
        Self::check(response, "posting message").await?;
        Ok(())
    }
}
