use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::command::{self, Command};
use crate::error::{Error, Result};
use crate::geocode::PlaceResolver;
use crate::location::{Position, ResilientFetcher};
use crate::webex::ChatGateway;

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(10);
const ERROR_COOLDOWN: Duration = Duration::from_secs(5);

/// The newest message id the loop has already observed. Owned exclusively by
/// the loop; never persisted.
#[derive(Debug, Default)]
pub struct PollState {
    last_seen: Option<String>,
}

impl PollState {
    /// Returns true exactly once per distinct message id, so re-polling the
    /// same message can never re-trigger a dispatch.
    pub fn advance(&mut self, id: &str) -> bool {
        if self.last_seen.as_deref() == Some(id) {
            return false;
        }
        self.last_seen = Some(id.to_string());
        true
    }
}

/// The reply posted back to the room. Bit-exact contract: UTC timestamp,
/// coordinates to four decimal places.
pub fn format_reply(position: &Position, place: &str) -> String {
    format!(
        "On {}, the ISS was over {}. ({:.4}°, {:.4}°)",
        position.human_utc(),
        place,
        position.latitude,
        position.longitude
    )
}

/// The top-level driver: poll the room, dispatch recognized commands, reply.
///
/// One sequential cycle; a second command arriving mid-dispatch is only seen
/// on the next poll (latest wins, earlier ones are dropped).
pub struct PollLoop<G: ChatGateway> {
    gateway: G,
    fetcher: ResilientFetcher,
    resolver: PlaceResolver,
    room_id: String,
    state: PollState,
}

impl<G: ChatGateway> PollLoop<G> {
    pub fn new(
        gateway: G,
        fetcher: ResilientFetcher,
        resolver: PlaceResolver,
        room_id: String,
    ) -> Self {
        Self {
            gateway,
            fetcher,
            resolver,
            room_id,
            state: PollState::default(),
        }
    }

    /// One poll/dispatch/reply cycle.
    pub async fn poll_once(&mut self) -> Result<()> {
        let Some(msg) = self.gateway.latest_message(&self.room_id).await? else {
            return Ok(());
        };
        if !self.state.advance(&msg.id) {
            return Ok(());
        }

        info!("Latest: {}", msg.text);
        match command::parse(&msg.text) {
            Some(cmd) => self.dispatch(cmd).await,
            None => Ok(()),
        }
    }

    async fn dispatch(&self, cmd: Command) -> Result<()> {
        debug!("Dispatching in {}s", cmd.delay_secs);
        tokio::time::sleep(Duration::from_secs(cmd.delay_secs)).await;

        let position = self.fetcher.fetch().await?;
        let place = self.resolver.resolve(position.latitude, position.longitude).await;
        let reply = format_reply(&position, &place);

        self.gateway.post_message(&self.room_id, &reply).await?;
        info!("Posted response.");
        Ok(())
    }

    /// Poll until cancelled. Iteration failures are logged and followed by a
    /// cooldown; only cancellation or a 401 leaves the loop. Cancellation
    /// also interrupts an in-flight dispatch, command sleep included.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        info!("Monitoring room {}. Type /5 in that room to test.", self.room_id);
        loop {
            let pause = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Stopped.");
                    return Ok(());
                }
                result = self.poll_once() => match result {
                    Ok(()) => POLL_INTERVAL,
                    Err(e @ Error::Unauthorized(_)) => {
                        error!("{e}");
                        return Err(e);
                    }
                    Err(Error::RateLimited { status }) => {
                        warn!(
                            "HTTP {status}: rate limited, waiting {}s",
                            RATE_LIMIT_COOLDOWN.as_secs()
                        );
                        RATE_LIMIT_COOLDOWN
                    }
                    Err(e) => {
                        error!("Error: {e}. Waiting {}s.", ERROR_COOLDOWN.as_secs());
                        ERROR_COOLDOWN
                    }
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Stopped.");
                    return Ok(());
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{LocationProvider, RetryPolicy};
    use crate::webex::{LatestMessage, Room};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct StubPosition(Position);

    #[async_trait]
    impl LocationProvider for StubPosition {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn fetch(&self) -> Result<Position> {
            Ok(self.0)
        }
    }

    #[derive(Clone, Default)]
    struct StubGateway {
        latest: Arc<Mutex<Option<LatestMessage>>>,
        posted: Arc<Mutex<Vec<String>>>,
        fail_with_unauthorized: bool,
    }

    impl StubGateway {
        fn with_message(id: &str, text: &str) -> Self {
            let gateway = Self::default();
            gateway.set_message(id, text);
            gateway
        }

        fn set_message(&self, id: &str, text: &str) {
            *self.latest.lock().unwrap() = Some(LatestMessage {
                id: id.to_string(),
                text: text.to_string(),
            });
        }

        fn posted(&self) -> Vec<String> {
            self.posted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatGateway for StubGateway {
        async fn list_rooms(&self) -> Result<Vec<Room>> {
            Ok(Vec::new())
        }

        async fn latest_message(&self, _room_id: &str) -> Result<Option<LatestMessage>> {
            if self.fail_with_unauthorized {
                return Err(Error::Unauthorized("reading messages"));
            }
            Ok(self.latest.lock().unwrap().clone())
        }

        async fn post_message(&self, _room_id: &str, text: &str) -> Result<()> {
            self.posted.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn test_loop(gateway: StubGateway) -> PollLoop<StubGateway> {
        let position = Position {
            timestamp: 1700000000,
            latitude: 51.5,
            longitude: -0.12,
        };
        let fetcher = ResilientFetcher::new(
            vec![Box::new(StubPosition(position))],
            RetryPolicy {
                attempts: 2,
                pause: Duration::ZERO,
            },
        );
        // No API key: resolves to the diagnostic string without any network.
        let resolver = PlaceResolver::new(reqwest::Client::new(), None);
        PollLoop::new(gateway, fetcher, resolver, "room-1".to_string())
    }

    #[test]
    fn test_poll_state_advances_once_per_id() {
        let mut state = PollState::default();
        assert!(state.advance("m1"));
        assert!(!state.advance("m1"));
        assert!(state.advance("m2"));
        assert!(!state.advance("m2"));
    }

    #[test]
    fn test_reply_format_is_bit_exact() {
        let position = Position {
            timestamp: 1700000000,
            latitude: 51.5,
            longitude: -0.12,
        };
        assert_eq!(
            format_reply(&position, "London, GB"),
            "On Tue Nov 14 22:13:20 2023 UTC, the ISS was over London, GB. (51.5000°, -0.1200°)"
        );
    }

    #[tokio::test]
    async fn test_same_id_dispatches_once() {
        let gateway = StubGateway::with_message("m1", "/0");
        let mut poll = test_loop(gateway.clone());

        poll.poll_once().await.unwrap();
        poll.poll_once().await.unwrap();

        assert_eq!(gateway.posted().len(), 1);
        assert!(gateway.posted()[0].contains("(No OPENWEATHER_KEY in config)"));
    }

    #[tokio::test]
    async fn test_new_id_dispatches_again() {
        let gateway = StubGateway::with_message("m1", "/0");
        let mut poll = test_loop(gateway.clone());

        poll.poll_once().await.unwrap();
        gateway.set_message("m2", "/0");
        poll.poll_once().await.unwrap();

        assert_eq!(gateway.posted().len(), 2);
    }

    #[tokio::test]
    async fn test_non_command_posts_nothing() {
        let gateway = StubGateway::with_message("m1", "/abc");
        let mut poll = test_loop(gateway.clone());

        poll.poll_once().await.unwrap();

        assert!(gateway.posted().is_empty());
    }

    #[tokio::test]
    async fn test_empty_room_is_a_quiet_iteration() {
        let gateway = StubGateway::default();
        let mut poll = test_loop(gateway.clone());

        poll.poll_once().await.unwrap();

        assert!(gateway.posted().is_empty());
    }

    #[tokio::test]
    async fn test_slash_command_end_to_end() {
        use serde_json::json;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/geo/1.0/reverse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "London", "country": "GB"}
            ])))
            .mount(&server)
            .await;

        let gateway = StubGateway::with_message("m1", "/0");
        let mut poll = test_loop(gateway.clone());
        poll.resolver = PlaceResolver::with_base_url(
            reqwest::Client::new(),
            Some("k".to_string()),
            server.uri(),
        );

        poll.poll_once().await.unwrap();

        assert_eq!(
            gateway.posted(),
            vec![
                "On Tue Nov 14 22:13:20 2023 UTC, the ISS was over London, GB. (51.5000°, -0.1200°)"
                    .to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_run_stops_on_cancellation() {
        let gateway = StubGateway::default();
        let poll = test_loop(gateway);

        let cancel = CancellationToken::new();
        cancel.cancel();

        poll.run(cancel).await.unwrap();
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_inflight_dispatch() {
        // "/300" puts the loop into a five-minute command sleep; cancelling
        // must stop it promptly with nothing posted.
        let gateway = StubGateway::with_message("m1", "/300");
        let poll = test_loop(gateway.clone());

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(poll.run(cancel.clone()));
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();

        handle.await.unwrap().unwrap();
        assert!(gateway.posted().is_empty());
    }

    #[tokio::test]
    async fn test_run_propagates_unauthorized() {
        let gateway = StubGateway {
            fail_with_unauthorized: true,
            ..StubGateway::default()
        };
        let poll = test_loop(gateway);

        let err = poll.run(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }
}
