use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

/// Token store kept in process memory.
///
/// Pairs are grouped per principal. Every mutation of a principal's sessions
/// happens under that principal's map entry lock, which makes `rotate` a single
/// atomic step without serializing unrelated principals.
#[derive(Clone, Default)]
pub struct MemoryTokenStore {
    sessions: Arc<DashMap<PrincipalKey, Vec<TokenPair>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored pairs, revoked ones included.
    pub fn len(&self) -> usize {
        self.sessions.iter().map(|e| e.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn collides(existing: &[TokenPair], pair: &TokenPair) -> bool {
        existing.iter().any(|p| {
            p.access_token == pair.access_token || p.refresh_token == pair.refresh_token
        })
    }
}

#[async_trait::async_trait]
impl TokenStore for MemoryTokenStore {
    async fn put(&self, pair: &TokenPair) -> Result<(), AuthError> {
        let mut pairs = self.sessions.entry(pair.principal.clone()).or_default();
        if Self::collides(&pairs, pair) {
            return Err(AuthError::StoreUnavailable("duplicate token value".to_string()));
        }
        pairs.push(pair.clone());
        Ok(())
    }

    async fn find_by_access(
        &self,
        principal: &PrincipalKey,
        access_token: &AccessToken,
    ) -> Result<Option<TokenPair>, AuthError> {
        Ok(self.sessions.get(principal).and_then(|pairs| {
            pairs
                .iter()
                .find(|p| p.access_token == *access_token)
                .cloned()
        }))
    }

    async fn find_by_refresh(
        &self,
        principal: &PrincipalKey,
        refresh_token: &RefreshToken,
    ) -> Result<Option<TokenPair>, AuthError> {
        Ok(self.sessions.get(principal).and_then(|pairs| {
            pairs
                .iter()
                .find(|p| p.refresh_token == *refresh_token)
                .cloned()
        }))
    }

    async fn rotate(
        &self,
        principal: &PrincipalKey,
        old_refresh: &RefreshToken,
        successor: &TokenPair,
    ) -> Result<SwapOutcome, AuthError> {
        let Some(mut pairs) = self.sessions.get_mut(principal) else {
            return Ok(SwapOutcome::Conflict);
        };

        if Self::collides(&pairs, successor) {
            return Err(AuthError::StoreUnavailable("duplicate token value".to_string()));
        }

        let Some(current) = pairs
            .iter_mut()
            .find(|p| p.refresh_token == *old_refresh && !p.revoked)
        else {
            return Ok(SwapOutcome::Conflict);
        };

        current.revoked = true;
        pairs.push(successor.clone());
        Ok(SwapOutcome::Swapped)
    }

    async fn revoke(
        &self,
        principal: &PrincipalKey,
        refresh_token: &RefreshToken,
    ) -> Result<bool, AuthError> {
        let Some(mut pairs) = self.sessions.get_mut(principal) else {
            return Ok(false);
        };
        match pairs
            .iter_mut()
            .find(|p| p.refresh_token == *refresh_token && !p.revoked)
        {
            Some(pair) => {
                pair.revoked = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn active_pairs(
        &self,
        principal: &PrincipalKey,
        now: DateTime<Utc>,
    ) -> Result<Vec<TokenPair>, AuthError> {
        Ok(self
            .sessions
            .get(principal)
            .map(|pairs| pairs.iter().filter(|p| p.is_active(now)).cloned().collect())
            .unwrap_or_default())
    }

    async fn purge(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let mut removed = 0u64;
        for mut entry in self.sessions.iter_mut() {
            let before = entry.len();
            entry.retain(|p| !p.is_dead(now));
            removed += (before - entry.len()) as u64;
        }
        self.sessions.retain(|_, pairs| !pairs.is_empty());
        Ok(removed)
    }
}
