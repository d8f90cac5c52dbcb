//! Session tokens for IMDSv2 style access.
//!
//! A token is nothing more than its expiry, serialized as JSON and base64
//! encoded for the wire:
//!
//! ```text
//! {"expire":"2022-08-10T06:49:05.415516Z"}  ->  eyJleHBpcmUiOi...
//! ```
//!
//! Tokens are never revoked; they simply stop validating once expired.
//! Validation fails closed: a missing, undecodable, unparseable or expired
//! token all collapse into the same "unauthorized" outcome.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TokenError;

/// Upper bound on a requested token TTL (6 hours).
pub const MAX_TTL_SECONDS: i64 = 21_600;

/// Request header carrying a session token.
pub const TOKEN_HEADER: &str = "X-aws-ec2-metadata-token";

/// Request header carrying the TTL for a new session token.
pub const TOKEN_TTL_HEADER: &str = "X-aws-ec2-metadata-token-ttl-seconds";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    pub expire: DateTime<Utc>,
}

impl SessionToken {
    /// Issue a token expiring `ttl_seconds` from now.
    pub fn issue(ttl_seconds: i64) -> Result<Self, TokenError> {
        if !(1..=MAX_TTL_SECONDS).contains(&ttl_seconds) {
            return Err(TokenError::InvalidTtl(ttl_seconds));
        }

        Ok(Self {
            expire: Utc::now() + TimeDelta::seconds(ttl_seconds),
        })
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expire
    }

    /// Wire form: base64 of the JSON document.
    pub fn encode(&self) -> Result<String, TokenError> {
        let json = serde_json::to_vec(self).map_err(|e| TokenError::Encode(e.to_string()))?;
        Ok(STANDARD.encode(json))
    }

    /// Parse the wire form, returning `None` on any decode failure.
    pub fn decode(wire: &str) -> Option<Self> {
        let json = STANDARD.decode(wire).ok()?;
        serde_json::from_slice(&json).ok()
    }
}

/// Issue a token and return its wire form.
pub fn issue_token(ttl_seconds: i64) -> Result<String, TokenError> {
    SessionToken::issue(ttl_seconds)?.encode()
}

/// Whether a wire token is present, decodes, and has not expired.
pub fn validate_token(wire: Option<&str>) -> bool {
    wire.filter(|t| !t.is_empty())
        .and_then(SessionToken::decode)
        .is_some_and(|token| !token.is_expired())
}

/// How metadata requests are gated on session tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthPolicy {
    /// IMDSv1 and IMDSv2: a token is only checked when one is supplied.
    #[default]
    Lenient,
    /// IMDSv2 only: every request must carry a valid token.
    Strict,
}

impl AuthPolicy {
    pub fn from_strict(strict: bool) -> Self {
        if strict { Self::Strict } else { Self::Lenient }
    }

    /// Decide whether a request carrying `header` may proceed.
    pub fn admits(&self, header: Option<&str>) -> bool {
        match (self, header) {
            (Self::Lenient, None) => true,
            (_, header) => validate_token(header),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // {"expire":"2022-08-10T06:49:05.415516+01:00"}
    const EXPIRED_TOKEN: &str = "eyJleHBpcmUiOiIyMDIyLTA4LTEwVDA2OjQ5OjA1LjQxNTUxNiswMTowMCJ9";

    // "hello, world"
    const NOT_A_TOKEN: &str = "aGVsbG8sIHdvcmxk";

    const NOT_BASE64: &str = "hello, world";

    fn token_expiring_in(secs: i64) -> String {
        let json = format!(
            r#"{{"expire":"{}"}}"#,
            (Utc::now() + TimeDelta::seconds(secs)).to_rfc3339()
        );
        STANDARD.encode(json)
    }

    #[test]
    fn issue_sets_expiry_from_ttl() {
        let token = SessionToken::issue(10).unwrap();
        let remaining = token.expire - Utc::now();
        assert!(remaining <= TimeDelta::seconds(10));
        assert!(remaining > TimeDelta::seconds(8));
        assert!(!token.is_expired());
    }

    #[test]
    fn issue_rejects_ttl_out_of_range() {
        assert_eq!(SessionToken::issue(0), Err(TokenError::InvalidTtl(0)));
        assert_eq!(SessionToken::issue(-5), Err(TokenError::InvalidTtl(-5)));
        assert_eq!(
            SessionToken::issue(MAX_TTL_SECONDS + 1),
            Err(TokenError::InvalidTtl(MAX_TTL_SECONDS + 1))
        );
        assert!(SessionToken::issue(1).is_ok());
        assert!(SessionToken::issue(MAX_TTL_SECONDS).is_ok());
    }

    #[test]
    fn issued_token_validates() {
        for ttl in [1, 60, MAX_TTL_SECONDS] {
            let wire = issue_token(ttl).unwrap();
            assert!(validate_token(Some(&wire)), "ttl {ttl}");
        }
    }

    #[test]
    fn token_expires_at_its_deadline() {
        let token = SessionToken::issue(30).unwrap();
        let deadline = token.expire;
        assert!(!token.is_expired_at(deadline - TimeDelta::milliseconds(1)));
        assert!(token.is_expired_at(deadline));
        assert!(token.is_expired_at(deadline + TimeDelta::seconds(1)));
    }

    #[test]
    fn short_lived_token_stops_validating() {
        let wire = issue_token(1).unwrap();
        assert!(validate_token(Some(&wire)));
        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert!(!validate_token(Some(&wire)));
    }

    #[test]
    fn validate_fails_closed() {
        assert!(!validate_token(None));
        assert!(!validate_token(Some("")));
        assert!(!validate_token(Some(EXPIRED_TOKEN)));
        assert!(!validate_token(Some(NOT_A_TOKEN)));
        assert!(!validate_token(Some(NOT_BASE64)));
        assert!(!validate_token(Some(&token_expiring_in(-1))));
        assert!(validate_token(Some(&token_expiring_in(2))));
    }

    #[test]
    fn decode_accepts_offset_timestamps() {
        let token = SessionToken::decode(EXPIRED_TOKEN).unwrap();
        assert_eq!(token.expire.to_rfc3339(), "2022-08-10T05:49:05.415516+00:00");
        assert!(token.is_expired());
    }

    #[test]
    fn lenient_policy() {
        let policy = AuthPolicy::from_strict(false);
        assert_eq!(policy, AuthPolicy::Lenient);
        assert!(policy.admits(None));
        assert!(policy.admits(Some(&token_expiring_in(5))));
        assert!(!policy.admits(Some("invalid")));
        assert!(!policy.admits(Some("")));
    }

    #[test]
    fn strict_policy() {
        let policy = AuthPolicy::from_strict(true);
        assert_eq!(policy, AuthPolicy::Strict);
        assert!(!policy.admits(None));
        assert!(!policy.admits(Some(EXPIRED_TOKEN)));
        assert!(policy.admits(Some(&token_expiring_in(5))));
    }
}
