use crate::application_port::AuthError;
use crate::domain_model::*;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    /// Predecessor revoked and successor inserted.
    Swapped,
    /// Predecessor was already revoked or gone; nothing written.
    Conflict,
}

/// Persistent storage for token pairs.
///
/// Pairs are never partially updated: the only mutations are inserting a new
/// pair, flipping `revoked` to true, and purging dead pairs. `rotate` is the one
/// primitive that must be applied atomically by the backend.
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    /// Insert a fresh pair. Reusing a token value is an error.
    async fn put(&self, pair: &TokenPair) -> Result<(), AuthError>;

    async fn find_by_access(
        &self,
        principal: &PrincipalKey,
        access_token: &AccessToken,
    ) -> Result<Option<TokenPair>, AuthError>;

    async fn find_by_refresh(
        &self,
        principal: &PrincipalKey,
        refresh_token: &RefreshToken,
    ) -> Result<Option<TokenPair>, AuthError>;

    /// Revoke the pair holding `old_refresh` iff it belongs to `principal` and is
    /// still not revoked, and insert `successor`, as one indivisible operation.
    async fn rotate(
        &self,
        principal: &PrincipalKey,
        old_refresh: &RefreshToken,
        successor: &TokenPair,
    ) -> Result<SwapOutcome, AuthError>;

    /// Idempotent. Returns whether a pair went from active to revoked.
    async fn revoke(
        &self,
        principal: &PrincipalKey,
        refresh_token: &RefreshToken,
    ) -> Result<bool, AuthError>;

    async fn active_pairs(
        &self,
        principal: &PrincipalKey,
        now: DateTime<Utc>,
    ) -> Result<Vec<TokenPair>, AuthError>;

    /// Drop revoked and fully expired pairs. Returns how many were removed.
    async fn purge(&self, now: DateTime<Utc>) -> Result<u64, AuthError>;
}
