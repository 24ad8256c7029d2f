//! # tokenwarden
//!
//! In-process lifecycle manager for short-lived signed identity tokens.
//!
//! This crate provides:
//! - Token issuance for access and refresh tokens
//! - Validation with a bounded TTL cache of outcomes
//! - Revocation through a sharded, self-expiring blacklist
//! - Refresh of access tokens from refresh tokens
//! - A background maintenance loop reclaiming expired entries
//!
//! ## Overview
//!
//! A [`TokenManager`] is an owned value; several may coexist in one process,
//! each with its own stores. Signing is delegated to a [`Signer`];
//! [`JwtSigner`] provides HMAC-signed JWTs. Revocation state is process-local
//! and does not survive a restart.
//!
//! ## Modules
//!
//! - [`config`] - Manager configuration
//! - [`claims`] - Token claims and issue options
//! - [`signer`] - Signer trait and the JWT implementation
//! - [`revocation`] - Sharded revocation store
//! - [`cache`] - Validation outcome cache
//! - [`maintenance`] - Background sweep loop
//! - [`manager`] - The token manager itself

pub mod cache;
pub mod claims;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod maintenance;
pub mod manager;
pub mod revocation;
pub mod signer;

pub use cache::{CacheStats, CachedOutcome, ValidationCache};
pub use claims::{Claims, IssueOptions, TokenType};
pub use config::{CacheConfig, ConfigError, RevocationConfig, TokenManagerConfig};
pub use error::{ErrorCategory, TokenError};
pub use fingerprint::fingerprint;
pub use maintenance::{MaintenanceHandle, SweepReport};
pub use manager::{ManagerStats, TokenManager, TokenPair};
pub use revocation::RevocationStore;
pub use signer::{JwtSigner, Signer, SigningAlgorithm};

/// Type alias for token operation results.
pub type TokenResult<T> = Result<T, TokenError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use tokenwarden::prelude::*;
/// ```
pub mod prelude {
    pub use crate::TokenResult;
    pub use crate::claims::{Claims, IssueOptions, TokenType};
    pub use crate::config::{ConfigError, TokenManagerConfig};
    pub use crate::error::{ErrorCategory, TokenError};
    pub use crate::manager::{ManagerStats, TokenManager, TokenPair};
    pub use crate::signer::{JwtSigner, Signer, SigningAlgorithm};
}
