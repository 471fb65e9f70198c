use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::{Clock, TokenStore};
use std::sync::Arc;
use tracing::{debug, warn};

/// Answers "is this token usable". Never fails: every problem degrades to
/// "not accessible" / "expired".
pub struct TokenValidator {
    codec: Arc<dyn TokenCodec>,
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
}

impl TokenValidator {
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

    /// Storage-free check. Anything that does not decode counts as expired.
    pub fn is_expired(&self, token: &str) -> bool {
        match self.codec.decode(token) {
            Ok(claims) => {
                let expired = self.clock.now() >= claims.expires_at;
                debug!(jti = %claims.jti, principal = %claims.principal, expired, "expiry check");
                expired
            }
            Err(e) => {
                debug!(error = %e, "treating undecodable token as expired");
                true
            }
        }
    }

    pub async fn check_access(&self, principal: &PrincipalKey, access_token: &AccessToken) -> bool {
        let pair = match self.store.find_by_access(principal, access_token).await {
            Ok(Some(pair)) => pair,
            Ok(None) => {
                debug!(%principal, "access check: no such pair");
                return false;
            }
            Err(e) => {
                warn!(%principal, error = %e, "access check: store lookup failed");
                return false;
            }
        };

        let now = self.clock.now();
        let ok = pair.principal == *principal
            && pair.access_token == *access_token
            && pair.phase(now) == TokenPhase::AccessValid;
        debug!(%principal, ok, phase = ?pair.phase(now), "access check");
        ok
    }
}
