//! imds-core — shared types for the instance metadata mock.
//!
//! Holds the runtime configuration consumed by every other crate and the
//! session token service that gates IMDSv2 style access.

pub mod config;
pub mod error;
pub mod routes;
pub mod token;

pub use config::{ImdsConfig, SpotAction, SpotActionEvent};
pub use error::{ConfigError, TokenError};
pub use token::{AuthPolicy, SessionToken};
