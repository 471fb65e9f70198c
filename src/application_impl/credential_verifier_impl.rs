use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::CredentialRepo;
use std::sync::Arc;
use tracing::debug;

pub struct RepoCredentialVerifier {
    repo: Arc<dyn CredentialRepo>,
    hasher: Arc<dyn CredentialHasher>,
}

impl RepoCredentialVerifier {
    pub fn new(repo: Arc<dyn CredentialRepo>, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self { repo, hasher }
    }
}

#[async_trait::async_trait]
impl CredentialVerifier for RepoCredentialVerifier {
    async fn verify(
        &self,
        kind: PrincipalKind,
        username: &str,
        password: &str,
    ) -> Result<Option<Principal>, AuthError> {
        let Some(rec) = self.repo.get_by_username(kind, username).await? else {
            debug!(%kind, "login for unknown username");
            return Ok(None);
        };

        if !rec.is_active {
            debug!(principal = %rec.principal.key, "login for inactive account");
            return Ok(None);
        }

        if !self
            .hasher
            .verify_password(password, &rec.password_hash)
            .await?
        {
            debug!(principal = %rec.principal.key, "password mismatch");
            return Ok(None);
        }

        Ok(Some(rec.principal))
    }
}
