use crate::application_impl::{TokenIssuer, TokenRotator, TokenValidator};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::{Clock, TokenStore};
use std::sync::Arc;
use tracing::{info, instrument};

pub struct RealSessionService {
    verifier: Arc<dyn CredentialVerifier>,
    issuer: Arc<TokenIssuer>,
    validator: TokenValidator,
    rotator: TokenRotator,
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
}

impl RealSessionService {
    pub fn new(
        verifier: Arc<dyn CredentialVerifier>,
        codec: Arc<dyn TokenCodec>,
        store: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let issuer = Arc::new(TokenIssuer::new(
            codec.clone(),
            store.clone(),
            clock.clone(),
        ));
        let validator = TokenValidator::new(codec, store.clone(), clock.clone());
        let rotator = TokenRotator::new(issuer.clone(), store.clone(), clock.clone());
        Self {
            verifier,
            issuer,
            validator,
            rotator,
            store,
            clock,
        }
    }
}

#[async_trait::async_trait]
impl SessionService for RealSessionService {
    #[instrument(skip_all, fields(kind = %request.kind))]
    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError> {
        let LoginInput {
            kind,
            username,
            password,
        } = request;

        if username.is_empty() || password.is_empty() {
            return Err(AuthError::Validation("username and password are required".into()));
        }

        let principal = self
            .verifier
            .verify(kind, &username, &password)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let tokens = self.issuer.issue(&principal.key).await?;
        info!(principal = %principal.key, "login succeeded");

        Ok(LoginResult { principal, tokens })
    }

    async fn issue(&self, principal: &PrincipalKey) -> Result<TokenPair, AuthError> {
        self.issuer.issue(principal).await
    }

    async fn check_access(&self, principal: &PrincipalKey, access_token: &AccessToken) -> bool {
        self.validator.check_access(principal, access_token).await
    }

    fn is_expired(&self, token: &str) -> bool {
        self.validator.is_expired(token)
    }

    async fn rotate(&self, request: RotateInput) -> Result<TokenPair, AuthError> {
        self.rotator.rotate(request).await
    }

    async fn revoke(
        &self,
        principal: &PrincipalKey,
        refresh_token: &RefreshToken,
    ) -> Result<(), AuthError> {
        self.rotator.revoke(principal, refresh_token).await
    }

    async fn sessions(&self, principal: &PrincipalKey) -> Result<Vec<TokenPair>, AuthError> {
        self.store.active_pairs(principal, self.clock.now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::test_support::*;
    use chrono::Duration;

    fn login_input(kind: PrincipalKind, username: &str, password: &str) -> LoginInput {
        LoginInput {
            kind,
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn login_issues_distinct_tokens_with_access_expiring_first() {
        let h = harness().await;

        let result = h
            .service
            .login(login_input(PrincipalKind::Admin, "root", "correct"))
            .await
            .unwrap();
        assert_eq!(result.principal.key, admin());
        assert_eq!(result.principal.username, "root");

        let pair = result.tokens;
        assert_ne!(pair.access_token.0, pair.refresh_token.0);
        assert!(pair.access_expires_at < pair.refresh_expires_at);
        assert_eq!(pair.access_expires_at, t0() + Duration::seconds(ACCESS_TTL_SECS));

        let second = login_admin(&h.service).await;
        assert_ne!(second.access_token, pair.access_token);
        assert_ne!(second.refresh_token, pair.refresh_token);
        assert_eq!(h.store.len(), 2);
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials_alike() {
        let h = harness().await;

        for (username, password) in [("root", "wrong"), ("nobody", "correct")] {
            let err = h
                .service
                .login(login_input(PrincipalKind::Admin, username, password))
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials), "{username}");
        }

        // Usernames are scoped to a kind.
        let err = h
            .service
            .login(login_input(PrincipalKind::Patient, "root", "correct"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let err = h
            .service
            .login(login_input(PrincipalKind::Admin, "", "correct"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn check_access_follows_the_access_ttl() {
        let h = harness().await;
        let pair = login_admin(&h.service).await;

        h.clock.advance(Duration::seconds(ACCESS_TTL_SECS - 1));
        assert!(h.service.check_access(&admin(), &pair.access_token).await);
        assert!(!h.service.is_expired(&pair.access_token.0));

        h.clock.advance(Duration::seconds(2));
        assert!(!h.service.check_access(&admin(), &pair.access_token).await);
        assert!(h.service.is_expired(&pair.access_token.0));
        assert!(!h.service.is_expired(&pair.refresh_token.0));
    }

    #[tokio::test]
    async fn is_expired_treats_garbage_as_expired() {
        let h = harness().await;
        assert!(h.service.is_expired("not-a-jwt"));
        assert!(h.service.is_expired(""));
    }

    #[tokio::test]
    async fn check_access_is_bound_to_the_principal() {
        let h = harness().await;
        let doctor = h
            .service
            .login(login_input(PrincipalKind::Doctor, "house", "vicodin"))
            .await
            .unwrap();

        let doctor_key = PrincipalKey::new(PrincipalKind::Doctor, "doctor1");
        assert!(h.service.check_access(&doctor_key, &doctor.tokens.access_token).await);

        let same_id_other_kind = PrincipalKey::new(PrincipalKind::Admin, "doctor1");
        assert!(
            !h.service
                .check_access(&same_id_other_kind, &doctor.tokens.access_token)
                .await
        );
        assert!(!h.service.check_access(&admin(), &doctor.tokens.access_token).await);
    }

    #[tokio::test]
    async fn revoked_pair_no_longer_grants_access() {
        let h = harness().await;
        let pair = login_admin(&h.service).await;

        h.service.revoke(&admin(), &pair.refresh_token).await.unwrap();
        assert!(!h.service.check_access(&admin(), &pair.access_token).await);
        // Logging out twice is fine.
        h.service.revoke(&admin(), &pair.refresh_token).await.unwrap();
        h.service
            .revoke(&admin(), &RefreshToken("never-issued".into()))
            .await
            .unwrap();

        let err = h
            .service
            .rotate(RotateInput {
                principal: admin(),
                access_token: pair.access_token,
                refresh_token: pair.refresh_token,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Revoked));
    }

    #[tokio::test]
    async fn sessions_lists_only_live_pairs() {
        let h = harness().await;
        let first = login_admin(&h.service).await;
        let second = login_admin(&h.service).await;
        h.service.revoke(&admin(), &first.refresh_token).await.unwrap();

        let sessions = h.service.sessions(&admin()).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].refresh_token, second.refresh_token);

        h.clock.advance(Duration::seconds(REFRESH_TTL_SECS));
        assert!(h.service.sessions(&admin()).await.unwrap().is_empty());
    }
}
