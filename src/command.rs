use regex::Regex;
use std::sync::LazyLock;

/// Safety cap so a mistaken or malicious `/99999` cannot force an unbounded
/// sleep.
pub const MAX_DELAY_SECS: u64 = 300;

// The whole message must match: a slash, digits, optional trailing whitespace.
static COMMAND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/(\d+)\s*$").expect("command regex is valid"));

/// A recognized `/N` command: wait `delay_secs` before looking up the ISS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub delay_secs: u64,
}

/// Parse a chat message into a command. Anything that is not exactly
/// `/<digits>` yields `None` — an unrecognized message is not an error.
pub fn parse(text: &str) -> Option<Command> {
    let caps = COMMAND_RE.captures(text)?;
    // A digit run too wide for u64 is certainly past the cap.
    let delay = caps[1].parse::<u64>().unwrap_or(MAX_DELAY_SECS);
    Some(Command {
        delay_secs: delay.min(MAX_DELAY_SECS),
    })
}
