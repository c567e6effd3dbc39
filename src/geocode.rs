use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

pub const OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org";

/// Reverse-geocodes a coordinate via OpenWeatherMap. Resolution never fails:
/// every problem becomes a diagnostic display string, because the bot must
/// always produce a postable reply.
pub struct PlaceResolver {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct GeoPlace {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

impl PlaceResolver {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self::with_base_url(client, api_key, OPENWEATHER_BASE_URL)
    }

    pub fn with_base_url(
        client: reqwest::Client,
        api_key: Option<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub async fn resolve(&self, lat: f64, lon: f64) -> String {
        let Some(key) = self.api_key.as_deref() else {
            return "(No OPENWEATHER_KEY in config)".to_string();
        };

        let url = format!("{}/geo/1.0/reverse", self.base_url);
        let response = match self
            .client
            .get(&url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("limit", "1".to_string()),
                ("appid", key.to_string()),
            ])
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("reverse geocode request failed: {e}");
                return "(geocode error)".to_string();
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!("reverse geocode returned HTTP {status}");
            return format!("(geocode HTTP {})", status.as_u16());
        }

        let places: Vec<GeoPlace> = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                warn!("reverse geocode response unreadable: {e}");
                return "(geocode error)".to_string();
            }
        };

        let Some(place) = places.into_iter().next() else {
            debug!("reverse geocode empty for ({lat:.4}, {lon:.4})");
            return "(over ocean)".to_string();
        };

        let parts: Vec<&str> = [
            place.name.as_deref(),
            place.state.as_deref(),
            place.country.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|p| !p.is_empty())
        .collect();

        if parts.is_empty() {
            "(no name)".to_string()
        } else {
            parts.join(", ")
        }
    }
}
