use crate::application_impl::TokenIssuer;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::{Clock, SwapOutcome, TokenStore};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Retires a pair and issues its successor, with at most one successor per pair.
pub struct TokenRotator {
    issuer: Arc<TokenIssuer>,
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
}

impl TokenRotator {
    pub fn new(issuer: Arc<TokenIssuer>, store: Arc<dyn TokenStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            issuer,
            store,
            clock,
        }
    }

    #[instrument(skip_all, fields(principal = %request.principal))]
    pub async fn rotate(&self, request: RotateInput) -> Result<TokenPair, AuthError> {
        let RotateInput {
            principal,
            access_token,
            refresh_token,
        } = request;

        let result = self.try_rotate(&principal, &access_token, &refresh_token).await;
        match &result {
            Ok(pair) => info!(access_expires_at = %pair.access_expires_at, "token pair rotated"),
            Err(e) if e.is_server_side() => warn!(error = %e, "rotation failed"),
            Err(e) => info!(outcome = e.kind(), "rotation rejected"),
        }
        result
    }

    async fn try_rotate(
        &self,
        principal: &PrincipalKey,
        access_token: &AccessToken,
        refresh_token: &RefreshToken,
    ) -> Result<TokenPair, AuthError> {
        let current = self
            .store
            .find_by_refresh(principal, refresh_token)
            .await?
            .filter(|pair| pair.principal == *principal && pair.refresh_token == *refresh_token)
            .ok_or(AuthError::NoMatchingPair)?;

        if current.revoked {
            return Err(AuthError::Revoked);
        }
        if self.clock.now() >= current.refresh_expires_at {
            return Err(AuthError::RefreshExpired);
        }
        // Both tokens must come from the same pair.
        if current.access_token != *access_token {
            return Err(AuthError::TokenMismatch);
        }

        let successor = self.issuer.mint(principal)?;

        // The read above is advisory; this conditional swap is what decides the winner.
        match self
            .store
            .rotate(principal, refresh_token, &successor)
            .await?
        {
            SwapOutcome::Swapped => Ok(successor),
            SwapOutcome::Conflict => Err(AuthError::RotationConflict),
        }
    }

    /// Logout. Revoking an absent or already revoked pair is not an error.
    #[instrument(skip_all, fields(principal = %principal))]
    pub async fn revoke(
        &self,
        principal: &PrincipalKey,
        refresh_token: &RefreshToken,
    ) -> Result<(), AuthError> {
        let changed = self.store.revoke(principal, refresh_token).await?;
        info!(changed, "token pair revoked");
        Ok(())
    }
}
