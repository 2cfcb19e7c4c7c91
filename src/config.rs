//! Runtime configuration. A plain, `Clone`-able struct built once at
//! process start rather than dynamic capability objects.

use clap::{Parser, ValueEnum};

/// Chrome's release channels, as accepted by `--channel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lower")]
pub enum ChromeChannel {
    Stable,
    Beta,
    Dev,
    Canary,
}

impl Default for ChromeChannel {
    fn default() -> Self {
        ChromeChannel::Stable
    }
}

/// How an unhandled JavaScript dialog (`window.alert`, etc.) should be
/// resolved, normalized from the W3C capability shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptBehavior {
    Accept,
    Dismiss,
    Ignore,
}

impl Default for PromptBehavior {
    fn default() -> Self {
        PromptBehavior::Dismiss
    }
}

impl PromptBehavior {
    pub fn as_wire_str(self) -> &'static str {
        match self {
            PromptBehavior::Accept => "accept",
            PromptBehavior::Dismiss => "dismiss",
            PromptBehavior::Ignore => "ignore",
        }
    }
}

/// Everything the translator needs to know about how to run, collected in
/// one place instead of scattered thread-local or global state.
#[derive(Parser, Debug, Clone)]
#[command(name = "bidicdp", about = "WebDriver BiDi server fronting a single Chrome instance")]
pub struct Config {
    /// Port the BiDi HTTP/WebSocket server listens on.
    #[arg(long, env = "BIDICDP_PORT", default_value_t = 9222)]
    pub port: u16,

    /// Launch Chrome without a visible window.
    #[arg(long, env = "BIDICDP_HEADLESS", default_value_t = true)]
    pub headless: bool,

    /// Which Chrome release channel to launch.
    #[arg(long, value_enum, env = "BIDICDP_CHANNEL", default_value_t = ChromeChannel::Stable)]
    pub channel: ChromeChannel,

    /// Enable verbose (debug-level) logging.
    #[arg(long, env = "BIDICDP_VERBOSE", default_value_t = false)]
    pub verbose: bool,

    /// Accept self-signed/invalid TLS certificates in the browser.
    #[arg(long, env = "BIDICDP_ACCEPT_INSECURE_CERTS", default_value_t = false)]
    pub accept_insecure_certs: bool,

    /// Extra flags forwarded verbatim to the Chrome process.
    #[arg(long = "chrome-arg")]
    pub chrome_args: Vec<String>,

    /// Path to a specific Chrome binary; overrides `channel` discovery.
    #[arg(long)]
    pub chrome_binary: Option<String>,
}

impl Config {
    /// The default unhandled-prompt-behavior when a session doesn't specify
    /// one, overridable per-session during capability negotiation.
    pub fn default_prompt_behavior(&self) -> PromptBehavior {
        PromptBehavior::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_args() {
        let cfg = Config::parse_from(["bidicdp"]);
        assert_eq!(cfg.port, 9222);
        assert!(cfg.headless);
        assert_eq!(cfg.channel, ChromeChannel::Stable);
    }

    #[test]
    fn parses_overrides() {
        let cfg = Config::parse_from([
            "bidicdp",
            "--port",
            "4444",
            "--headless=false",
            "--channel",
            "canary",
            "--verbose",
        ]);
        assert_eq!(cfg.port, 4444);
        assert!(!cfg.headless);
        assert_eq!(cfg.channel, ChromeChannel::Canary);
        assert!(cfg.verbose);
    }
}
