//! Token lifecycle error types.
//!
//! Every operation on the [`TokenManager`](crate::TokenManager) reports failure
//! through [`TokenError`]. Callers that only need an authentication decision
//! can treat any error as "unauthenticated"; the variant is still available
//! for logging and auditing.

use std::fmt;

use crate::claims::TokenType;

/// Errors that can occur while issuing, validating, refreshing or revoking tokens.
///
/// The type is `Clone` because negative validation outcomes are memoized in the
/// [`ValidationCache`](crate::ValidationCache) and replayed on later lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// A token was requested for an empty subject.
    #[error("Subject must not be empty")]
    EmptySubject,

    /// The token failed the structural pre-check or could not be decoded.
    #[error("Invalid token format: {message}")]
    InvalidFormat {
        /// Description of why the token is malformed.
        message: String,
    },

    /// The token signature does not verify against the signing key.
    #[error("Invalid token signature")]
    SignatureInvalid,

    /// The token is past its expiry.
    #[error("Token expired")]
    Expired,

    /// The token's not-before time is still in the future.
    #[error("Token not yet valid")]
    NotYetValid,

    /// The token has been explicitly revoked.
    #[error("Token revoked")]
    Blacklisted,

    /// The token is valid but of the wrong kind for the operation.
    #[error("Wrong token type: expected {expected}, got {actual}")]
    WrongTokenType {
        /// The token type the operation requires.
        expected: TokenType,
        /// The token type found in the claims.
        actual: TokenType,
    },

    /// The signer failed to produce a token.
    #[error("Failed to sign token: {message}")]
    Signing {
        /// Description of the signing failure.
        message: String,
    },

    /// The manager or an issue request is misconfigured.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl TokenError {
    /// Creates a new `InvalidFormat` error.
    #[must_use]
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates a new `WrongTokenType` error.
    #[must_use]
    pub fn wrong_token_type(expected: TokenType, actual: TokenType) -> Self {
        Self::WrongTokenType { expected, actual }
    }

    /// Creates a new `Signing` error.
    #[must_use]
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns `true` if this error means the presented token must not be trusted.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidFormat { .. }
                | Self::SignatureInvalid
                | Self::Expired
                | Self::NotYetValid
                | Self::Blacklisted
                | Self::WrongTokenType { .. }
        )
    }

    /// Returns `true` if the caller supplied bad input.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::EmptySubject) || self.is_validation_error()
    }

    /// Returns `true` if the failure lies with the manager rather than the caller.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Signing { .. } | Self::Configuration { .. })
    }

    /// Returns `true` if the outcome depends on the current time and may change
    /// on a later attempt with the same token.
    #[must_use]
    pub fn is_time_dependent(&self) -> bool {
        matches!(self, Self::NotYetValid)
    }

    /// Returns the error category for logging/auditing purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::EmptySubject => ErrorCategory::Request,
            Self::InvalidFormat { .. } => ErrorCategory::Format,
            Self::SignatureInvalid => ErrorCategory::Signature,
            Self::Expired | Self::NotYetValid => ErrorCategory::Lifetime,
            Self::Blacklisted => ErrorCategory::Revocation,
            Self::WrongTokenType { .. } => ErrorCategory::Request,
            Self::Signing { .. } => ErrorCategory::Internal,
            Self::Configuration { .. } => ErrorCategory::Configuration,
        }
    }
}

impl From<crate::config::ConfigError> for TokenError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => Self::SignatureInvalid,
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::ImmatureSignature => Self::NotYetValid,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingAlgorithm => Self::invalid_format(err.to_string()),
            ErrorKind::InvalidKeyFormat
            | ErrorKind::InvalidRsaKey(_)
            | ErrorKind::InvalidEcdsaKey => Self::configuration(err.to_string()),
            _ => Self::invalid_format(err.to_string()),
        }
    }
}

/// Categories of token errors for logging and auditing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The request itself was unusable (empty subject, wrong token kind).
    Request,
    /// The token is structurally malformed.
    Format,
    /// The token signature did not verify.
    Signature,
    /// The token is outside its validity window.
    Lifetime,
    /// The token was revoked.
    Revocation,
    /// Configuration errors.
    Configuration,
    /// Internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => write!(f, "request"),
            Self::Format => write!(f, "format"),
            Self::Signature => write!(f, "signature"),
            Self::Lifetime => write!(f, "lifetime"),
            Self::Revocation => write!(f, "revocation"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(TokenError::EmptySubject.to_string(), "Subject must not be empty");
        assert_eq!(TokenError::Blacklisted.to_string(), "Token revoked");
        assert_eq!(
            TokenError::invalid_format("expected 3 segments").to_string(),
            "Invalid token format: expected 3 segments"
        );
        assert_eq!(
            TokenError::wrong_token_type(TokenType::Refresh, TokenType::Access).to_string(),
            "Wrong token type: expected refresh, got access"
        );
    }

    #[test]
    fn test_error_predicates() {
        assert!(TokenError::Expired.is_validation_error());
        assert!(TokenError::Blacklisted.is_client_error());
        assert!(!TokenError::Blacklisted.is_server_error());

        assert!(TokenError::EmptySubject.is_client_error());
        assert!(!TokenError::EmptySubject.is_validation_error());

        let err = TokenError::signing("key rejected");
        assert!(err.is_server_error());
        assert!(!err.is_client_error());

        assert!(TokenError::NotYetValid.is_time_dependent());
        assert!(!TokenError::Expired.is_time_dependent());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(TokenError::SignatureInvalid.category(), ErrorCategory::Signature);
        assert_eq!(TokenError::Expired.category(), ErrorCategory::Lifetime);
        assert_eq!(TokenError::Blacklisted.category(), ErrorCategory::Revocation);
        assert_eq!(
            TokenError::configuration("bad").category(),
            ErrorCategory::Configuration
        );
        assert_eq!(ErrorCategory::Revocation.to_string(), "revocation");
    }

    #[test]
    fn test_from_jsonwebtoken_error() {
        use jsonwebtoken::errors::{Error, ErrorKind};

        let err: TokenError = Error::from(ErrorKind::InvalidSignature).into();
        assert_eq!(err, TokenError::SignatureInvalid);

        let err: TokenError = Error::from(ErrorKind::ExpiredSignature).into();
        assert_eq!(err, TokenError::Expired);

        let err: TokenError = Error::from(ErrorKind::InvalidToken).into();
        assert!(matches!(err, TokenError::InvalidFormat { .. }));
    }
}
