use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::server::TokenSweeper;
use crate::settings::{self, Settings};
use anyhow::{Context, anyhow};
use sqlx::{MySql, Pool};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[cfg(debug_assertions)]
const DEV_SIGNING_KEY: &str = "consultation-dev-signing-key";

pub struct Server {
    pub session_service: Arc<dyn SessionService>,
    sweeper_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    pools: Vec<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let mut pools = Vec::new();

        let jwt_config = JwtConfig {
            issuer: settings.auth.issuer.clone(),
            audience: settings.auth.audience.clone(),
            access_ttl: Duration::from_secs(settings.auth.access_ttl_secs),
            refresh_ttl: Duration::from_secs(settings.auth.refresh_ttl_secs),
            signing_key: signing_key(&settings.auth.signing_key_env)?,
        };
        jwt_config.validate()?;
        debug!(?jwt_config);
        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(jwt_config));

        let token_store: Arc<dyn TokenStore> = match settings.token_store.backend.as_str() {
            "memory" => Arc::new(MemoryTokenStore::new()),
            "redis" => {
                let dsn = settings
                    .token_store
                    .redis_dsn
                    .as_deref()
                    .ok_or_else(|| anyhow!("token_store.redis_dsn is required for redis"))?;
                let redis_client = redis::Client::open(dsn)?;
                let redis_manager = redis_client.get_connection_manager().await?;
                Arc::new(RedisTokenStore::new(
                    redis_manager,
                    settings.token_store.prefix.clone(),
                ))
            }
            "mysql" => {
                let dsn = settings
                    .token_store
                    .mysql_dsn
                    .as_deref()
                    .ok_or_else(|| anyhow!("token_store.mysql_dsn is required for mysql"))?;
                let pool = Pool::<MySql>::connect(dsn).await?;
                pools.push(pool.clone());
                Arc::new(MySqlTokenStore::new(pool))
            }
            other => return Err(anyhow!("Unknown token store backend: {}", other)),
        };

        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher);
        let credential_repo: Arc<dyn CredentialRepo> =
            match settings.credentials.backend.as_str() {
                "memory" => Arc::new(
                    seed_credentials(&settings.credentials.seed, credential_hasher.as_ref())
                        .await?,
                ),
                "mysql" => {
                    let dsn = settings
                        .credentials
                        .mysql_dsn
                        .as_deref()
                        .ok_or_else(|| anyhow!("credentials.mysql_dsn is required for mysql"))?;
                    let pool = Pool::<MySql>::connect(dsn).await?;
                    pools.push(pool.clone());
                    Arc::new(MySqlCredentialRepo::new(pool))
                }
                other => return Err(anyhow!("Unknown credentials backend: {}", other)),
            };

        let verifier: Arc<dyn CredentialVerifier> = Arc::new(RepoCredentialVerifier::new(
            credential_repo,
            credential_hasher,
        ));
        let session_service: Arc<dyn SessionService> = Arc::new(RealSessionService::new(
            verifier,
            token_codec,
            token_store.clone(),
            clock.clone(),
        ));

        let cancel = CancellationToken::new();
        let sweeper = TokenSweeper::new(
            token_store,
            clock,
            Duration::from_secs(settings.sweeper.interval_secs.max(1)),
            cancel.clone(),
        );
        let sweeper_handle = tokio::spawn(async move { sweeper.run().await });

        info!(
            token_store = %settings.token_store.backend,
            credentials = %settings.credentials.backend,
            "server started"
        );

        Ok(Self {
            session_service,
            sweeper_handle: Mutex::new(Some(sweeper_handle)),
            cancel,
            pools,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        let handle = self.sweeper_handle.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            let r = handle.await;
            info!("sweeper handle dropped: {:?}", r);
        }

        for pool in &self.pools {
            pool.close().await;
        }
    }
}

fn signing_key(env_name: &str) -> anyhow::Result<Vec<u8>> {
    match std::env::var(env_name) {
        Ok(key) => Ok(key.into_bytes()),
        #[cfg(debug_assertions)]
        Err(_) => {
            warn!("{} is not set, using the development signing key", env_name);
            Ok(DEV_SIGNING_KEY.as_bytes().to_vec())
        }
        #[cfg(not(debug_assertions))]
        Err(e) => Err(anyhow!(e)).with_context(|| format!("{} must be set", env_name)),
    }
}

async fn seed_credentials(
    seeds: &[settings::SeedAccount],
    hasher: &dyn CredentialHasher,
) -> anyhow::Result<MemoryCredentialRepo> {
    let repo = MemoryCredentialRepo::new();
    for seed in seeds {
        let kind: PrincipalKind = seed
            .kind
            .parse()
            .with_context(|| format!("credential seed {:?}", seed))?;
        let password_hash = hasher.hash_password(&seed.password).await?;
        repo.insert(CredentialRecord {
            principal: Principal {
                key: PrincipalKey::new(kind, seed.id.clone()),
                username: seed.username.clone(),
            },
            password_hash,
            is_active: true,
        });
    }
    info!(accounts = seeds.len(), "seeded in-memory credentials");
    Ok(repo)
}
