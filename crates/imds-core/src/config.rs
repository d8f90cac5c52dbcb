//! Runtime configuration for the metadata mock.
//!
//! Every field is defaulted, so an empty `imds.toml` yields the same mock
//! as running the binary without flags.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Port used by the real metadata mock when none is configured.
pub const DEFAULT_PORT: u16 = 1338;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImdsConfig {
    /// Leave `tags/instance` out of the served document.
    pub exclude_instance_tags: bool,
    /// Require a valid session token on every metadata request (IMDSv2 only).
    pub strict_token_auth: bool,
    /// Pretty print JSON leaf values instead of compacting them.
    pub pretty_print_json: bool,
    pub simulate_spot: bool,
    pub spot_action: SpotActionEvent,
    pub port: u16,
    /// Tag name to value, served under `tags/instance`. Must stay the last
    /// field: TOML tables follow plain values.
    pub instance_tags: BTreeMap<String, String>,
}

impl Default for ImdsConfig {
    fn default() -> Self {
        Self {
            exclude_instance_tags: false,
            strict_token_auth: false,
            pretty_print_json: false,
            simulate_spot: false,
            spot_action: SpotActionEvent::default(),
            port: DEFAULT_PORT,
            instance_tags: BTreeMap::from([("Name".to_string(), "imds-mock-ec2".to_string())]),
        }
    }
}

impl ImdsConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Read(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// The interruption raised against a simulated spot instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpotAction {
    #[default]
    Terminate,
    Stop,
    Hibernate,
}

impl SpotAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Terminate => "terminate",
            Self::Stop => "stop",
            Self::Hibernate => "hibernate",
        }
    }
}

impl fmt::Display for SpotAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpotAction {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "terminate" => Ok(Self::Terminate),
            "stop" => Ok(Self::Stop),
            "hibernate" => Ok(Self::Hibernate),
            other => Err(ConfigError::UnsupportedSpotAction(other.to_string())),
        }
    }
}

/// A spot interruption and the delay before it is raised.
///
/// Written as `ACTION=DURATION` both on the command line and in TOML,
/// e.g. `terminate=2m` or `hibernate=500ms`. A zero delay raises the
/// interruption as the mock starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SpotActionEvent {
    pub action: SpotAction,
    pub delay: Duration,
}

impl SpotActionEvent {
    pub fn new(action: SpotAction, delay: Duration) -> Self {
        Self { action, delay }
    }

    pub fn is_immediate(&self) -> bool {
        self.delay.is_zero()
    }
}

impl fmt::Display for SpotActionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.action, humantime::format_duration(self.delay))
    }
}

impl FromStr for SpotActionEvent {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (action, delay) = s
            .split_once('=')
            .ok_or_else(|| ConfigError::SpotActionFormat(s.to_string()))?;

        let action = action.parse::<SpotAction>()?;
        let delay = humantime::parse_duration(delay)
            .map_err(|_| ConfigError::UnsupportedDuration(delay.to_string()))?;

        Ok(Self { action, delay })
    }
}

impl TryFrom<String> for SpotActionEvent {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SpotActionEvent> for String {
    fn from(event: SpotActionEvent) -> Self {
        event.to_string()
    }
}
