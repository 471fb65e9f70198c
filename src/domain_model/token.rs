use crate::domain_model::PrincipalKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(pub String);

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefreshToken(pub String);

// Token values are credentials; debug output only shows a digest prefix.
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken({}..)", &token_digest(&self.0)[..8])
    }
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RefreshToken({}..)", &token_digest(&self.0)[..8])
    }
}

impl AccessToken {
    pub fn digest(&self) -> String {
        token_digest(&self.0)
    }
}

impl RefreshToken {
    pub fn digest(&self) -> String {
        token_digest(&self.0)
    }
}

/// Hex SHA-256 of a token value. Stores index tokens by this digest.
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub principal: PrincipalKey,
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub issued_at: DateTime<Utc>,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub revoked: bool,
}

/// Temporal sub-state of a pair, derived from its timestamps and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPhase {
    AccessValid,
    AccessExpiredRefreshValid,
    FullyExpired,
    Revoked,
}

impl TokenPair {
    pub fn phase(&self, now: DateTime<Utc>) -> TokenPhase {
        if self.revoked {
            TokenPhase::Revoked
        } else if now < self.access_expires_at {
            TokenPhase::AccessValid
        } else if now < self.refresh_expires_at {
            TokenPhase::AccessExpiredRefreshValid
        } else {
            TokenPhase::FullyExpired
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.phase(now),
            TokenPhase::AccessValid | TokenPhase::AccessExpiredRefreshValid
        )
    }

    /// Revoked or past refresh expiry; safe to purge.
    pub fn is_dead(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.phase(now),
            TokenPhase::Revoked | TokenPhase::FullyExpired
        )
    }
}
