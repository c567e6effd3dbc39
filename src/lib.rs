pub mod bot;
pub mod command;
pub mod config;
pub mod error;
pub mod geocode;
pub mod location;
pub mod webex;

pub use error::{Error, Result};
