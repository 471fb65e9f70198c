use crate::application_port::*;
use crate::domain_model::*;

#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub principal: Principal,
    pub password_hash: String,
    pub is_active: bool,
}

#[async_trait::async_trait]
pub trait CredentialRepo: Send + Sync {
    /// Fetch credentials by username within one principal kind (for login).
    async fn get_by_username(
        &self,
        kind: PrincipalKind,
        username: &str,
    ) -> Result<Option<CredentialRecord>, AuthError>;
}
