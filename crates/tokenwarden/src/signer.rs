//! Token signing and verification.
//!
//! The [`TokenManager`](crate::TokenManager) treats signing as a black box:
//! [`Signer::sign`] turns [`Claims`] into an opaque string and
//! [`Signer::verify`] turns it back, or reports why it cannot.
//!
//! [`JwtSigner`] is the bundled implementation: compact JWTs signed with HMAC
//! (HS256, HS384 or HS512). Lifetime claims are carried in Unix milliseconds
//! so very short TTLs behave as configured.
//!
//! ## Example
//!
//! ```ignore
//! use tokenwarden::signer::{JwtSigner, SigningAlgorithm};
//!
//! let signer = JwtSigner::new(secret)?
//!     .with_algorithm(SigningAlgorithm::HS512)
//!     .with_kid("2026-10");
//!
//! let token = signer.sign(&claims)?;
//! let decoded = signer.verify(&token)?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::TokenResult;
use crate::claims::{Claims, TokenType};
use crate::error::TokenError;

/// Minimum accepted length of an HMAC secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

// ============================================================================
// Signer Trait
// ============================================================================

/// Converts claims to signed tokens and back.
///
/// Implementations must be usable from many threads at once.
pub trait Signer: Send + Sync {
    /// Signs the claims and returns the serialized token.
    ///
    /// # Errors
    /// Returns `TokenError::Signing` if the token cannot be produced.
    fn sign(&self, claims: &Claims) -> TokenResult<String>;

    /// Verifies the token and decodes its claims.
    ///
    /// # Errors
    /// Returns `InvalidFormat`, `SignatureInvalid`, `Expired` or `NotYetValid`.
    fn verify(&self, token: &str) -> TokenResult<Claims>;
}

// ============================================================================
// Signing Algorithm
// ============================================================================

/// Supported HMAC signing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    /// HMAC with SHA-256.
    #[default]
    HS256,
    /// HMAC with SHA-384.
    HS384,
    /// HMAC with SHA-512.
    HS512,
}

impl SigningAlgorithm {
    /// Converts to the `jsonwebtoken` Algorithm type.
    #[must_use]
    pub fn to_jwt_algorithm(self) -> Algorithm {
        match self {
            Self::HS256 => Algorithm::HS256,
            Self::HS384 => Algorithm::HS384,
            Self::HS512 => Algorithm::HS512,
        }
    }

    /// Returns the algorithm name as used in JWT headers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Wire Claims
// ============================================================================

/// JSON payload of a JWT produced by [`JwtSigner`].
///
/// Custom attributes live under `ext` so they can never shadow a
/// registered claim.
#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    sub: String,
    typ: TokenType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    sid: String,
    jti: String,
    iat_ms: i64,
    nbf_ms: i64,
    exp_ms: i64,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    ext: HashMap<String, serde_json::Value>,
}

impl WireClaims {
    fn from_claims(claims: &Claims) -> TokenResult<Self> {
        Ok(Self {
            sub: claims.subject.clone(),
            typ: claims.token_type,
            sid: claims.session_id.clone(),
            jti: claims.token_id.clone(),
            iat_ms: to_unix_millis(claims.issued_at)?,
            nbf_ms: to_unix_millis(claims.not_before)?,
            exp_ms: to_unix_millis(claims.expires_at)?,
            ext: claims.custom.clone(),
        })
    }

    fn into_claims(self) -> TokenResult<Claims> {
        let claims = Claims {
            subject: self.sub,
            token_type: self.typ,
            session_id: self.sid,
            token_id: self.jti,
            issued_at: from_unix_millis(self.iat_ms)?,
            not_before: from_unix_millis(self.nbf_ms)?,
            expires_at: from_unix_millis(self.exp_ms)?,
            custom: self.ext,
        };

        if claims.subject.is_empty() {
            return Err(TokenError::invalid_format("missing subject"));
        }
        if !claims.has_consistent_times() {
            return Err(TokenError::invalid_format(
                "inconsistent issued/not-before/expiry times",
            ));
        }

        Ok(claims)
    }
}

fn to_unix_millis(at: OffsetDateTime) -> TokenResult<i64> {
    i64::try_from(at.unix_timestamp_nanos() / 1_000_000)
        .map_err(|_| TokenError::signing("timestamp out of range"))
}

fn from_unix_millis(ms: i64) -> TokenResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .map_err(|e| TokenError::invalid_format(format!("timestamp out of range: {e}")))
}

// ============================================================================
// JWT Signer
// ============================================================================

/// HMAC JWT implementation of [`Signer`].
///
/// Expiry and not-before are checked here rather than by `jsonwebtoken`, at
/// millisecond precision and with an optional leeway.
pub struct JwtSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: SigningAlgorithm,
    kid: Option<String>,
    leeway: time::Duration,
}

impl JwtSigner {
    /// Creates a signer for the given HMAC secret using HS256.
    ///
    /// # Errors
    /// Returns `TokenError::Configuration` if the secret is shorter than
    /// [`MIN_SECRET_LEN`] bytes.
    pub fn new(secret: impl AsRef<[u8]>) -> TokenResult<Self> {
        let secret = secret.as_ref();
        if secret.len() < MIN_SECRET_LEN {
            return Err(TokenError::configuration(format!(
                "signing secret must be at least {MIN_SECRET_LEN} bytes, got {}",
                secret.len()
            )));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm: SigningAlgorithm::default(),
            kid: None,
            leeway: time::Duration::ZERO,
        })
    }

    /// Sets the signing algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: SigningAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sets the key id written to the JWT header.
    #[must_use]
    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    /// Sets the clock skew tolerated on expiry and not-before checks.
    #[must_use]
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = time::Duration::try_from(leeway).unwrap_or(time::Duration::MAX);
        self
    }

    /// Returns the signing algorithm.
    #[must_use]
    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    /// Returns the key id, if any.
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    /// Verifies the token as of `now`.
    ///
    /// # Errors
    /// See [`Signer::verify`].
    pub fn verify_at(&self, token: &str, now: OffsetDateTime) -> TokenResult<Claims> {
        let mut validation = Validation::new(self.algorithm.to_jwt_algorithm());
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data: TokenData<WireClaims> = decode(token, &self.decoding_key, &validation)?;
        let claims = data.claims.into_claims()?;

        if now >= claims.expires_at.saturating_add(self.leeway) {
            return Err(TokenError::Expired);
        }
        if now.saturating_add(self.leeway) < claims.not_before {
            return Err(TokenError::NotYetValid);
        }

        Ok(claims)
    }
}

impl Signer for JwtSigner {
    fn sign(&self, claims: &Claims) -> TokenResult<String> {
        let mut header = Header::new(self.algorithm.to_jwt_algorithm());
        header.kid = self.kid.clone();

        let wire = WireClaims::from_claims(claims)?;
        encode(&header, &wire, &self.encoding_key).map_err(|e| TokenError::signing(e.to_string()))
    }

    fn verify(&self, token: &str) -> TokenResult<Claims> {
        self.verify_at(token, OffsetDateTime::now_utc())
    }
}

impl fmt::Debug for JwtSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtSigner")
            .field("algorithm", &self.algorithm)
            .field("kid", &self.kid)
            .field("leeway", &self.leeway)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
