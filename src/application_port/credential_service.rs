use crate::application_port::AuthError;
use crate::domain_model::*;

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

#[async_trait::async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// `Ok(None)` for any mismatch: unknown user, wrong password, inactive account.
    async fn verify(
        &self,
        kind: PrincipalKind,
        username: &str,
        password: &str,
    ) -> Result<Option<Principal>, AuthError>;
}
