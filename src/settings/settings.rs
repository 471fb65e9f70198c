use anyhow::{Result, anyhow};
use config::{Config, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub auth: Auth,
    pub credentials: Credentials,
    pub http: Http,
    pub log: Log,
    pub sweeper: Sweeper,
    pub token_store: TokenStore,
}

#[derive(Debug, Deserialize)]
pub struct Auth {
    pub issuer: String,
    pub audience: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    /// Name of the environment variable holding the JWT signing key.
    pub signing_key_env: String,
}

#[derive(Deserialize)]
pub struct Credentials {
    pub backend: String, // "memory" or "mysql"
    pub mysql_dsn: Option<String>,
    #[serde(default)]
    pub seed: Vec<SeedAccount>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("backend", &self.backend)
            .field("mysql_dsn", &redacted(&self.mysql_dsn))
            .field("seed", &self.seed)
            .finish()
    }
}

/// Account loaded into the memory credential backend at startup.
#[derive(Deserialize)]
pub struct SeedAccount {
    pub kind: String,
    pub id: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for SeedAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedAccount")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    pub tls: Option<Tls>,
}

#[derive(Debug, Deserialize)]
pub struct Tls {
    pub cert_path: String,
    pub key_path: String,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct Sweeper {
    pub interval_secs: u64,
}

#[derive(Deserialize)]
pub struct TokenStore {
    pub backend: String, // "memory", "redis" or "mysql"
    pub redis_dsn: Option<String>,
    pub mysql_dsn: Option<String>,
    pub prefix: String,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("backend", &self.backend)
            .field("redis_dsn", &redacted(&self.redis_dsn))
            .field("mysql_dsn", &redacted(&self.mysql_dsn))
            .field("prefix", &self.prefix)
            .finish()
    }
}

/// DSNs may embed credentials; only their presence is shown.
fn redacted(dsn: &Option<String>) -> Option<&'static str> {
    dsn.as_ref().map(|_| "<redacted>")
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
