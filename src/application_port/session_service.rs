use crate::domain_model::*;
use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("no matching token pair")]
    NoMatchingPair,
    #[error("access token does not belong to the refresh token's pair")]
    TokenMismatch,
    #[error("token pair revoked")]
    Revoked,
    #[error("refresh token expired")]
    RefreshExpired,
    #[error("token pair already rotated")]
    RotationConflict,
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    /// Stable code used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "validation_error",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::NoMatchingPair => "no_matching_pair",
            AuthError::TokenMismatch => "token_mismatch",
            AuthError::Revoked => "revoked",
            AuthError::RefreshExpired => "refresh_expired",
            AuthError::RotationConflict => "rotation_conflict",
            AuthError::StoreUnavailable(_) => "store_unavailable",
            AuthError::InternalError(_) => "internal_error",
        }
    }

    /// Infrastructure failures, as opposed to rejected input.
    pub fn is_server_side(&self) -> bool {
        matches!(
            self,
            AuthError::StoreUnavailable(_) | AuthError::InternalError(_)
        )
    }
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub kind: PrincipalKind,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub principal: Principal,
    pub tokens: TokenPair,
}

#[derive(Debug, Clone)]
pub struct RotateInput {
    pub principal: PrincipalKey,
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
}

/// Decoded, signature-checked token contents.
#[derive(Debug, Clone)]
pub struct TokenClaims {
    pub principal: PrincipalKey,
    pub expires_at: DateTime<Utc>,
    pub jti: String,
}

pub trait TokenCodec: Send + Sync {
    fn issue_access_token(
        &self,
        principal: &PrincipalKey,
        issued_at: DateTime<Utc>,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError>;
    fn issue_refresh_token(
        &self,
        principal: &PrincipalKey,
        issued_at: DateTime<Utc>,
    ) -> Result<(RefreshToken, DateTime<Utc>), AuthError>;
    /// Checks signature, issuer and audience but not expiry.
    fn decode(&self, token: &str) -> Result<TokenClaims, AuthError>;
}

#[async_trait::async_trait]
pub trait SessionService: Send + Sync {
    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError>;
    async fn issue(&self, principal: &PrincipalKey) -> Result<TokenPair, AuthError>;
    async fn check_access(&self, principal: &PrincipalKey, access_token: &AccessToken) -> bool;
    fn is_expired(&self, token: &str) -> bool;
    async fn rotate(&self, request: RotateInput) -> Result<TokenPair, AuthError>;
    async fn revoke(
        &self,
        principal: &PrincipalKey,
        refresh_token: &RefreshToken,
    ) -> Result<(), AuthError>;
    async fn sessions(&self, principal: &PrincipalKey) -> Result<Vec<TokenPair>, AuthError>;
}
