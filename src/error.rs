use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure taxonomy for the bot.
///
/// `ConfigMissing` and `Unauthorized` are fatal at their boundaries (startup
/// and the poll loop respectively); everything else is recovered with a
/// cooldown inside the loop.
#[derive(Debug, Error)]
pub enum Error {
    #[error("missing credential: set {0} in config.toml or the environment")]
    ConfigMissing(&'static str),

    #[error("401 Unauthorized while {0}: refresh your Webex token")]
    Unauthorized(&'static str),

    #[error("rate limited (HTTP {status})")]
    RateLimited { status: u16 },

    #[error("both ISS providers failed")]
    ProvidersExhausted,

    #[error("http error: {0}")]
    Http(String),

    #[error("api error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("unexpected response format: {0}")]
    ResponseFormat(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}
