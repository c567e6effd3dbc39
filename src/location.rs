use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub const OPEN_NOTIFY_BASE_URL: &str = "http://api.open-notify.org";
pub const WHERE_THE_ISS_BASE_URL: &str = "https://api.wheretheiss.at";

/// A timestamped ISS coordinate. Produced fresh per fetch, never cached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    /// `Tue Nov 14 22:13:20 2023 UTC` style rendering of the fetch timestamp.
    pub fn human_utc(&self) -> String {
        match Utc.timestamp_opt(self.timestamp, 0).single() {
            Some(t) => t.format("%a %b %d %H:%M:%S %Y UTC").to_string(),
            None => format!("epoch {}", self.timestamp),
        }
    }
}

/// One external service that can report the ISS's current coordinates.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch(&self) -> Result<Position>;
}

/// Open Notify, the primary provider: fast but known flaky, so it gets the
/// shorter request timeout. Latitude/longitude arrive as JSON strings.
pub struct OpenNotify {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct OpenNotifyResponse {
    timestamp: i64,
    iss_position: OpenNotifyPosition,
}

#[derive(Debug, Deserialize)]
struct OpenNotifyPosition {
    latitude: String,
    longitude: String,
}

impl OpenNotify {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, OPEN_NOTIFY_BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timeout: Duration::from_secs(6),
        }
    }
}

#[async_trait]
impl LocationProvider for OpenNotify {
    fn name(&self) -> &'static str {
        "open-notify"
    }

    async fn fetch(&self) -> Result<Position> {
        let url = format!("{}/iss-now.json", self.base_url);
        let response = self.client.get(&url).timeout(self.timeout).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let data: OpenNotifyResponse = response.json().await?;
        let latitude = data.iss_position.latitude.parse::<f64>().map_err(|e| {
            Error::ResponseFormat(format!("open-notify latitude {:?}: {e}", data.iss_position.latitude))
        })?;
        let longitude = data.iss_position.longitude.parse::<f64>().map_err(|e| {
            Error::ResponseFormat(format!(
                "open-notify longitude {:?}: {e}",
                data.iss_position.longitude
            ))
        })?;

        Ok(Position {
            timestamp: data.timestamp,
            latitude,
            longitude,
        })
    }
}

/// WhereTheISS.at, the fallback: stabler but slower, so it gets the longer
/// request timeout. Coordinates arrive as JSON numbers.
pub struct WhereTheIss {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct WhereTheIssResponse {
    timestamp: i64,
    latitude: f64,
    longitude: f64,
}

impl WhereTheIss {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, WHERE_THE_ISS_BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timeout: Duration::from_secs(8),
        }
    }
}

#[async_trait]
impl LocationProvider for WhereTheIss {
    fn name(&self) -> &'static str {
        "wheretheiss"
    }

    async fn fetch(&self) -> Result<Position> {
        // 25544 is the ISS's NORAD catalog number.
        let url = format!("{}/v1/satellites/25544", self.base_url);
        let response = self.client.get(&url).timeout(self.timeout).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let data: WhereTheIssResponse = response.json().await?;
        Ok(Position {
            timestamp: data.timestamp,
            latitude: data.latitude,
            longitude: data.longitude,
        })
    }
}

/// How many tries each provider gets, and the pause between its own attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            pause: Duration::from_millis(800),
        }
    }
}

/// Tries providers in priority order, giving each its full attempt budget
/// before moving on. Fails only when every provider exhausts every attempt.
pub struct ResilientFetcher {
    providers: Vec<Box<dyn LocationProvider>>,
    policy: RetryPolicy,
}

impl ResilientFetcher {
    pub fn new(providers: Vec<Box<dyn LocationProvider>>, policy: RetryPolicy) -> Self {
        Self { providers, policy }
    }

    /// Production wiring: Open Notify first, WhereTheISS.at as fallback.
    pub fn with_default_providers(client: &reqwest::Client) -> Self {
        Self::new(
            vec![
                Box::new(OpenNotify::new(client.clone())),
                Box::new(WhereTheIss::new(client.clone())),
            ],
            RetryPolicy::default(),
        )
    }

    pub async fn fetch(&self) -> Result<Position> {
        for provider in &self.providers {
            for attempt in 1..=self.policy.attempts {
                match provider.fetch().await {
                    Ok(position) => {
                        debug!(
                            "{} returned ({:.4}, {:.4}) at {}",
                            provider.name(),
                            position.latitude,
                            position.longitude,
                            position.timestamp
                        );
                        return Ok(position);
                    }
                    Err(e) => {
                        warn!(
                            "{} attempt {}/{} failed: {}",
                            provider.name(),
                            attempt,
                            self.policy.attempts,
                            e
                        );
                        if attempt < self.policy.attempts {
                            tokio::time::sleep(self.policy.pause).await;
                        }
                    }
                }
            }
        }
        Err(Error::ProvidersExhausted)
    }
}
