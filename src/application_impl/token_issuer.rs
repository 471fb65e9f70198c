use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::{Clock, TokenStore};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Creates token pairs and persists them.
pub struct TokenIssuer {
    codec: Arc<dyn TokenCodec>,
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    pub fn new(
        codec: Arc<dyn TokenCodec>,
        store: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            codec,
            store,
            clock,
        }
    }

    /// Builds a fresh pair without persisting it. Both tokens carry their own
    /// random jti, so nothing about them is derived from earlier pairs.
    pub fn mint(&self, principal: &PrincipalKey) -> Result<TokenPair, AuthError> {
        let issued_at = self.clock.now();
        let (access_token, access_expires_at) =
            self.codec.issue_access_token(principal, issued_at)?;
        let (refresh_token, refresh_expires_at) =
            self.codec.issue_refresh_token(principal, issued_at)?;

        if access_expires_at >= refresh_expires_at {
            return Err(AuthError::InternalError(
                "access expiry must precede refresh expiry".to_string(),
            ));
        }

        Ok(TokenPair {
            principal: principal.clone(),
            access_token,
            refresh_token,
            issued_at,
            access_expires_at,
            refresh_expires_at,
            revoked: false,
        })
    }

    #[instrument(skip_all, fields(principal = %principal))]
    pub async fn issue(&self, principal: &PrincipalKey) -> Result<TokenPair, AuthError> {
        let pair = self.mint(principal)?;

        self.store
            .put(&pair)
            .await
            .inspect_err(|e| warn!(error = %e, "persisting token pair failed"))?;

        info!(access_expires_at = %pair.access_expires_at, "token pair issued");
        Ok(pair)
    }
}
