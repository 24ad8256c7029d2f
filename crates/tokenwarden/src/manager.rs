//! Token lifecycle manager.
//!
//! [`TokenManager`] issues, validates, refreshes and revokes tokens. It owns a
//! [`RevocationStore`], an optional [`ValidationCache`] and, when configured,
//! a background maintenance loop that reclaims expired entries from both.
//!
//! # Usage
//!
//! ```ignore
//! use tokenwarden::{IssueOptions, TokenManager, TokenManagerConfig};
//!
//! let manager = TokenManager::with_secret(TokenManagerConfig::default(), secret)?;
//!
//! let access = manager.issue("user-42", IssueOptions::access().with_session_id("s1"))?;
//! let claims = manager.validate(&access)?;
//!
//! manager.revoke(&access)?;
//! assert!(manager.is_revoked(&access));
//!
//! manager.shutdown().await;
//! ```
//!
//! A revoke that returns before a validate begins is always observed by that
//! validate. A validate running concurrently with a revoke of the same token
//! may see it either way.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::TokenResult;
use crate::cache::{CacheStats, ValidationCache};
use crate::claims::{Claims, IssueOptions, TokenType};
use crate::config::TokenManagerConfig;
use crate::error::TokenError;
use crate::fingerprint::fingerprint;
use crate::maintenance::{self, MaintenanceHandle, SweepReport};
use crate::revocation::RevocationStore;
use crate::signer::{JwtSigner, Signer};

/// An access token together with the refresh token that minted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    /// Newly issued access token.
    pub access_token: String,
    /// Refresh token presented to obtain it.
    pub refresh_token: String,
}

impl From<TokenPair> for (String, String) {
    fn from(pair: TokenPair) -> Self {
        (pair.access_token, pair.refresh_token)
    }
}

/// Snapshot of manager state for monitoring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManagerStats {
    /// Revocation entries currently held, expired ones included.
    pub revoked: usize,
    /// Validation cache statistics, `None` when the cache is disabled.
    pub cache: Option<CacheStats>,
    /// Whether the maintenance loop is running.
    pub maintenance_running: bool,
}

impl ManagerStats {
    /// Cached outcomes currently held.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.map_or(0, |stats| stats.size)
    }
}

/// Concurrent token lifecycle manager.
///
/// All operations take `&self`; share it across threads with an `Arc`.
pub struct TokenManager {
    config: TokenManagerConfig,
    signer: Arc<dyn Signer>,
    revocations: Arc<RevocationStore>,
    cache: Option<Arc<ValidationCache>>,
    maintenance: Mutex<Option<MaintenanceHandle>>,
}

impl TokenManager {
    /// Creates a manager using `signer` for token encoding.
    ///
    /// Starts the maintenance loop when `cleanup_interval` is non-zero, which
    /// requires a Tokio runtime.
    ///
    /// # Errors
    /// Returns `TokenError::Configuration` if the configuration is invalid or
    /// the maintenance loop cannot be started.
    pub fn new(config: TokenManagerConfig, signer: Arc<dyn Signer>) -> TokenResult<Self> {
        config.validate()?;

        let revocations = Arc::new(RevocationStore::new(config.revocation.shards));
        let cache = config
            .cache
            .enabled
            .then(|| Arc::new(ValidationCache::new(config.cache.max_entries, config.cache.ttl)));

        let maintenance = if config.maintenance_enabled() {
            Some(MaintenanceHandle::spawn(
                Arc::clone(&revocations),
                cache.clone(),
                config.cleanup_interval,
            )?)
        } else {
            None
        };

        tracing::debug!(
            shards = revocations.shard_count(),
            cache_enabled = cache.is_some(),
            maintenance = maintenance.is_some(),
            "Token manager created"
        );

        Ok(Self {
            config,
            signer,
            revocations,
            cache,
            maintenance: Mutex::new(maintenance),
        })
    }

    /// Creates a manager signing HS256 JWTs with `secret`.
    ///
    /// # Errors
    /// See [`new`](Self::new) and [`JwtSigner::new`].
    pub fn with_secret(config: TokenManagerConfig, secret: impl AsRef<[u8]>) -> TokenResult<Self> {
        let signer = JwtSigner::new(secret)?;
        Self::new(config, Arc::new(signer))
    }

    // =========================================================================
    // Issue
    // =========================================================================

    /// Issues a signed token for `subject`.
    ///
    /// # Errors
    /// - `EmptySubject` if `subject` is empty
    /// - `Configuration` if the TTL is below one millisecond
    /// - `Signing` if the signer fails
    pub fn issue(&self, subject: &str, options: IssueOptions) -> TokenResult<String> {
        if subject.is_empty() {
            return Err(TokenError::EmptySubject);
        }

        let ttl = options.ttl.unwrap_or(match options.token_type {
            TokenType::Access => self.config.access_token_ttl,
            TokenType::Refresh => self.config.refresh_token_ttl,
        });
        let ttl = time::Duration::try_from(ttl)
            .ok()
            .filter(|ttl| *ttl >= time::Duration::MILLISECOND)
            .ok_or_else(|| TokenError::configuration("token ttl must be at least 1ms"))?;

        let issued_at = truncate_to_millis(OffsetDateTime::now_utc());
        let expires_at = issued_at
            .checked_add(ttl)
            .ok_or_else(|| TokenError::configuration("token ttl out of range"))?;

        let token_id = if options.token_id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            options.token_id
        };

        let claims = Claims {
            subject: subject.to_owned(),
            token_type: options.token_type,
            session_id: options.session_id,
            token_id,
            issued_at,
            not_before: issued_at,
            expires_at,
            custom: options.custom,
        };

        let token = self.signer.sign(&claims)?;
        tracing::trace!(
            token_id = %claims.token_id,
            token_type = %claims.token_type,
            "Issued token"
        );
        Ok(token)
    }

    /// Issues an access token and a refresh token sharing one session id.
    ///
    /// A session id is generated when `session_id` is empty.
    ///
    /// # Errors
    /// See [`issue`](Self::issue).
    pub fn issue_pair(&self, subject: &str, session_id: &str) -> TokenResult<TokenPair> {
        let session_id = if session_id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            session_id.to_owned()
        };

        let access_token =
            self.issue(subject, IssueOptions::access().with_session_id(session_id.as_str()))?;
        let refresh_token = self.issue(subject, IssueOptions::refresh().with_session_id(session_id))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    // =========================================================================
    // Validate
    // =========================================================================

    /// Validates `token` and returns its claims.
    ///
    /// A cached outcome younger than the cache TTL is returned without
    /// consulting the revocation store or the signer, unless the token behind
    /// it has since expired. Revoking a token replaces its cache entry with a
    /// revoked marker, so a revocation is still observed immediately.
    ///
    /// # Errors
    /// `Blacklisted`, `InvalidFormat`, `SignatureInvalid`, `Expired` or
    /// `NotYetValid`.
    pub fn validate(&self, token: &str) -> TokenResult<Claims> {
        let now = OffsetDateTime::now_utc();

        if let Some(cache) = &self.cache {
            match cache.get_at(token, now) {
                Some(outcome) => {
                    tracing::trace!(token = %fingerprint(token), "Validation cache hit");
                    return outcome;
                }
                None => {
                    tracing::trace!(token = %fingerprint(token), "Validation cache miss");
                }
            }
        }

        if let Some(expires_at) = self.revocations.expiry_at(token, now) {
            tracing::debug!(token = %fingerprint(token), "Rejected revoked token");
            if let Some(cache) = &self.cache {
                cache.mark_revoked_at(token, expires_at, now);
            }
            return Err(TokenError::Blacklisted);
        }

        self.precheck(token)?;

        let outcome = self.signer.verify(token);

        if let Some(cache) = &self.cache {
            if !matches!(&outcome, Err(e) if e.is_time_dependent()) {
                cache.put(token, outcome.clone());
            }

            // A revoke may have landed between the blacklist check and the put
            if let Ok(claims) = &outcome {
                if self.revocations.contains(token) {
                    cache.mark_revoked(token, claims.expires_at);
                    tracing::debug!(token = %fingerprint(token), "Token revoked during validation");
                    return Err(TokenError::Blacklisted);
                }
            }
        }

        if let Err(e) = &outcome {
            tracing::debug!(
                token = %fingerprint(token),
                error = %e,
                category = %e.category(),
                "Token validation failed"
            );
        }

        outcome
    }

    /// Structural check before any cryptographic work.
    fn precheck(&self, token: &str) -> TokenResult<()> {
        if token.len() < self.config.min_token_length {
            return Err(TokenError::invalid_format(format!(
                "token shorter than {} bytes",
                self.config.min_token_length
            )));
        }

        let separators = token.bytes().filter(|b| *b == b'.').count();
        if separators != 2 {
            return Err(TokenError::invalid_format(format!(
                "expected 3 segments, found {}",
                separators + 1
            )));
        }

        Ok(())
    }

    // =========================================================================
    // Refresh
    // =========================================================================

    /// Exchanges a refresh token for a new access token.
    ///
    /// The new access token carries the refresh token's subject and session id.
    /// The refresh token itself is returned unchanged.
    ///
    /// # Errors
    /// Any error from [`validate`](Self::validate), or `WrongTokenType` if
    /// `refresh_token` is not a refresh token.
    pub fn refresh(&self, refresh_token: &str) -> TokenResult<TokenPair> {
        let claims = self.validate(refresh_token)?;

        if claims.token_type != TokenType::Refresh {
            tracing::debug!(
                token_id = %claims.token_id,
                token_type = %claims.token_type,
                "Refresh attempted with non-refresh token"
            );
            return Err(TokenError::wrong_token_type(
                TokenType::Refresh,
                claims.token_type,
            ));
        }

        let access_token = self.issue(
            &claims.subject,
            IssueOptions::access().with_session_id(claims.session_id.as_str()),
        )?;

        tracing::debug!(
            token_id = %claims.token_id,
            session_id = %claims.session_id,
            "Issued access token from refresh token"
        );

        Ok(TokenPair {
            access_token,
            refresh_token: refresh_token.to_owned(),
        })
    }

    // =========================================================================
    // Revoke
    // =========================================================================

    /// Revokes `token` until its natural expiry.
    ///
    /// # Errors
    /// Any error [`validate`](Self::validate) would return for the token,
    /// including `Blacklisted` if it is already revoked.
    pub fn revoke(&self, token: &str) -> TokenResult<()> {
        let claims = self.validate(token)?;

        self.revocations.add(token, claims.expires_at);
        if let Some(cache) = &self.cache {
            cache.mark_revoked(token, claims.expires_at);
        }

        tracing::debug!(
            token_id = %claims.token_id,
            token_type = %claims.token_type,
            expires_at = %claims.expires_at,
            "Token revoked"
        );
        Ok(())
    }

    /// Returns `true` if `token` is revoked and not past its expiry.
    #[must_use]
    pub fn is_revoked(&self, token: &str) -> bool {
        self.revocations.contains(token)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Sweeps expired entries from both stores now.
    pub fn run_maintenance(&self) -> SweepReport {
        maintenance::sweep(
            &self.revocations,
            self.cache.as_deref(),
            OffsetDateTime::now_utc(),
        )
    }

    /// Stops the maintenance loop and waits for it to exit.
    ///
    /// Safe to call more than once; later calls do nothing.
    pub async fn shutdown(&self) {
        let handle = self.maintenance.lock().take();
        match handle {
            Some(handle) => handle.stop().await,
            None => tracing::debug!("Maintenance loop not running, nothing to shut down"),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns a snapshot of the manager's state.
    #[must_use]
    pub fn stats(&self) -> ManagerStats {
        let maintenance_running = self
            .maintenance
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished());

        ManagerStats {
            revoked: self.revocations.len(),
            cache: self.cache.as_ref().map(|cache| cache.stats()),
            maintenance_running,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &TokenManagerConfig {
        &self.config
    }

    /// Returns the revocation store.
    #[must_use]
    pub fn revocations(&self) -> &RevocationStore {
        &self.revocations
    }

    /// Returns the validation cache, if enabled.
    #[must_use]
    pub fn cache(&self) -> Option<&ValidationCache> {
        self.cache.as_deref()
    }
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("config", &self.config)
            .field("revocations", &self.revocations.len())
            .field("cache", &self.cache.as_ref().map(|cache| cache.len()))
            .finish_non_exhaustive()
    }
}

fn truncate_to_millis(at: OffsetDateTime) -> OffsetDateTime {
    at.replace_millisecond(at.millisecond()).unwrap_or(at)
}
