use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;

pub(crate) const ACCESS_TTL_SECS: i64 = 300;
pub(crate) const REFRESH_TTL_SECS: i64 = 3600;

pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

pub(crate) fn jwt_config() -> JwtConfig {
    JwtConfig {
        issuer: "consultation.auth".to_string(),
        audience: "consultation-client".to_string(),
        access_ttl: Duration::from_secs(ACCESS_TTL_SECS as u64),
        refresh_ttl: Duration::from_secs(REFRESH_TTL_SECS as u64),
        signing_key: b"test-signing-key".to_vec(),
    }
}

pub(crate) struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: MemoryTokenStore,
    pub service: Arc<RealSessionService>,
}

/// Session service over in-memory backends with `root/correct` (admin1) and
/// `house/vicodin` (doctor1), and the clock pinned at [`t0`].
pub(crate) async fn harness() -> Harness {
    let store = MemoryTokenStore::new();
    let (clock, service) = harness_with_store(Arc::new(store.clone())).await;
    Harness {
        clock,
        store,
        service,
    }
}

pub(crate) async fn harness_with_store(
    store: Arc<dyn TokenStore>,
) -> (Arc<ManualClock>, Arc<RealSessionService>) {
    let hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher);
    let repo = MemoryCredentialRepo::new();
    for (kind, id, username, password) in [
        (PrincipalKind::Admin, "admin1", "root", "correct"),
        (PrincipalKind::Doctor, "doctor1", "house", "vicodin"),
    ] {
        repo.insert(CredentialRecord {
            principal: Principal {
                key: PrincipalKey::new(kind, id),
                username: username.to_string(),
            },
            password_hash: hasher.hash_password(password).await.unwrap(),
            is_active: true,
        });
    }

    let clock = Arc::new(ManualClock::new(t0()));
    let verifier = Arc::new(RepoCredentialVerifier::new(Arc::new(repo), hasher));
    let codec = Arc::new(JwtHs256Codec::new(jwt_config()));
    let service = Arc::new(RealSessionService::new(
        verifier,
        codec,
        store,
        clock.clone(),
    ));
    (clock, service)
}

pub(crate) fn admin() -> PrincipalKey {
    PrincipalKey::new(PrincipalKind::Admin, "admin1")
}

pub(crate) async fn login_admin(service: &RealSessionService) -> TokenPair {
    service
        .login(LoginInput {
            kind: PrincipalKind::Admin,
            username: "root".to_string(),
            password: "correct".to_string(),
        })
        .await
        .unwrap()
        .tokens
}
