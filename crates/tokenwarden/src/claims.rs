//! Token claims and issuance options.
//!
//! [`Claims`] is the identity payload carried inside a signed token. A value is
//! created once by [`TokenManager::issue`](crate::TokenManager::issue) and only
//! read afterwards; minting a different token always means building new claims.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

// =============================================================================
// Token Type
// =============================================================================

/// Kind of token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived token presented on every request.
    #[default]
    Access,
    /// Long-lived token used only to mint new access tokens.
    Refresh,
}

impl TokenType {
    /// Returns the token type as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Claims
// =============================================================================

/// Identity payload embedded in a token.
///
/// Invariant: `not_before <= issued_at < expires_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Principal the token was issued to.
    pub subject: String,

    /// Access or refresh.
    pub token_type: TokenType,

    /// Correlates an access/refresh pair. May be empty.
    pub session_id: String,

    /// Unique identifier of this token instance.
    pub token_id: String,

    /// When the token was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,

    /// Earliest instant the token is accepted.
    #[serde(with = "time::serde::rfc3339")]
    pub not_before: OffsetDateTime,

    /// First instant the token is no longer accepted.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// Additional attributes, opaque to the manager.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom: HashMap<String, serde_json::Value>,
}

impl Claims {
    /// Returns `true` if the token is expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    /// Returns `true` if the token is expired right now.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }

    /// Time left until expiry, zero once expired.
    #[must_use]
    pub fn remaining_ttl(&self) -> Duration {
        let remaining = self.expires_at - OffsetDateTime::now_utc();
        Duration::try_from(remaining).unwrap_or(Duration::ZERO)
    }

    /// Returns `true` if the not-before/issued/expiry ordering holds.
    #[must_use]
    pub fn has_consistent_times(&self) -> bool {
        self.not_before <= self.issued_at && self.issued_at < self.expires_at
    }

    /// Gets a custom attribute deserialized into `T`.
    pub fn get_custom<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.custom
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

// =============================================================================
// Issue Options
// =============================================================================

/// Options accepted by [`TokenManager::issue`](crate::TokenManager::issue).
///
/// Every field is optional; an empty value means "use the manager default".
#[derive(Debug, Clone, Default)]
pub struct IssueOptions {
    /// Token kind. Defaults to [`TokenType::Access`].
    pub token_type: TokenType,

    /// Lifetime. Defaults to the manager's access or refresh TTL by type.
    pub ttl: Option<Duration>,

    /// Session correlation id.
    pub session_id: String,

    /// Token id. Generated when empty.
    pub token_id: String,

    /// Additional attributes.
    pub custom: HashMap<String, serde_json::Value>,
}

impl IssueOptions {
    /// Options for an access token.
    #[must_use]
    pub fn access() -> Self {
        Self::default()
    }

    /// Options for a refresh token.
    #[must_use]
    pub fn refresh() -> Self {
        Self {
            token_type: TokenType::Refresh,
            ..Default::default()
        }
    }

    /// Sets the token type.
    #[must_use]
    pub fn with_token_type(mut self, token_type: TokenType) -> Self {
        self.token_type = token_type;
        self
    }

    /// Sets an explicit lifetime.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets the session id.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Sets the token id.
    #[must_use]
    pub fn with_token_id(mut self, token_id: impl Into<String>) -> Self {
        self.token_id = token_id.into();
        self
    }

    /// Adds a custom attribute. Values that fail to serialize are skipped.
    #[must_use]
    pub fn with_custom<V: Serialize>(mut self, key: impl Into<String>, value: V) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.custom.insert(key.into(), json_value);
        }
        self
    }
}
