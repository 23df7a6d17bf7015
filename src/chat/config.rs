//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// File name used for stored tokens when no path is given.
const DEFAULT_TOKEN_FILE: &str = ".thalassist-tokens.json";

/// Command-line arguments for the thalassist-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Root of the ThalAssist API.
    #[arrrg(optional, "API base URL (default: $THALASSIST_API_URL or http://localhost:8000)", "URL")]
    pub api_url: Option<String>,

    /// Where tokens are kept between runs.
    #[arrrg(optional, "Token file (default: ~/.thalassist-tokens.json)", "PATH")]
    pub token_file: Option<String>,

    /// Which chat service answers messages.
    #[arrrg(optional, "Chat endpoint: advisor or assistant (default: advisor)", "ENDPOINT")]
    pub endpoint: Option<String>,

    /// City sent to the advisor.
    #[arrrg(optional, "City for localised advice", "CITY")]
    pub location: Option<String>,

    /// Request timeout in seconds.
    #[arrrg(optional, "Request timeout in seconds (default: 30)", "SECS")]
    pub timeout_secs: Option<u64>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// The chat service a session talks to.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum EndpointFlavor {
    /// `POST /api/chat`, with classification metadata.
    #[default]
    Advisor,
    /// `POST /api/chatbot/message`, text only.
    Assistant,
}

impl fmt::Display for EndpointFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointFlavor::Advisor => write!(f, "advisor"),
            EndpointFlavor::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for EndpointFlavor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "advisor" | "chat" => Ok(EndpointFlavor::Advisor),
            "assistant" | "chatbot" => Ok(EndpointFlavor::Assistant),
            other => Err(Error::validation(
                format!("unknown chat endpoint {other:?} (expected advisor or assistant)"),
                Some("endpoint".to_string()),
            )),
        }
    }
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Where the API lives and how long to wait for it.
    pub client: ClientConfig,

    /// Path of the durable token store.
    pub token_file: PathBuf,

    /// Which chat service answers messages.
    pub endpoint: EndpointFlavor,

    /// City sent to the advisor endpoint.
    pub location: Option<String>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - API: `$THALASSIST_API_URL`, else http://localhost:8000
    /// - Token file: `~/.thalassist-tokens.json`
    /// - Endpoint: advisor
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            client: ClientConfig::from_env(),
            token_file: default_token_file(),
            endpoint: EndpointFlavor::default(),
            location: None,
            use_color: true,
        }
    }

    /// Sets the client configuration.
    pub fn with_client(mut self, client: ClientConfig) -> Self {
        self.client = client;
        self
    }

    /// Sets the token file.
    pub fn with_token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_file = path.into();
        self
    }

    /// Sets the chat endpoint.
    pub fn with_endpoint(mut self, endpoint: EndpointFlavor) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Sets the advisor location.
    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<ChatArgs> for ChatConfig {
    type Error = Error;

    fn try_from(args: ChatArgs) -> Result<Self> {
        let mut config = ChatConfig::new();
        if let Some(url) = args.api_url {
            config.client = config.client.with_base_url(url);
        }
        if let Some(secs) = args.timeout_secs {
            if secs == 0 {
                return Err(Error::validation(
                    "timeout must be at least one second",
                    Some("timeout_secs".to_string()),
                ));
            }
            config.client = config.client.with_timeout(Duration::from_secs(secs));
        }
        if let Some(path) = args.token_file {
            config.token_file = PathBuf::from(path);
        }
        if let Some(endpoint) = args.endpoint {
            config.endpoint = endpoint.parse()?;
        }
        config.location = args.location.filter(|l| !l.trim().is_empty());
        config.use_color = !args.no_color;
        Ok(config)
    }
}

fn default_token_file() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(DEFAULT_TOKEN_FILE),
        None => PathBuf::from(DEFAULT_TOKEN_FILE),
    }
}
