use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::collections::HashMap;

const TOKEN_PUT: &str = include_str!("token_put.lua");
const TOKEN_ROTATE: &str = include_str!("token_rotate.lua");
const TOKEN_REVOKE: &str = include_str!("token_revoke.lua");

/// Token store on Redis.
///
/// Layout under `prefix`:
/// - `pair:{refresh digest}` hash with the pair fields
/// - `access:{access digest}` string pointing at the refresh digest
/// - `owner:{kind}:{id}` set of the principal's refresh digests
///
/// Pair and index keys expire with the refresh token. Writes that must be
/// atomic run as Lua scripts.
pub struct RedisTokenStore {
    conn: ConnectionManager,
    prefix: String,
    put_script: Script,
    rotate_script: Script,
    revoke_script: Script,
}

fn store_err(e: redis::RedisError) -> AuthError {
    AuthError::StoreUnavailable(e.to_string())
}

impl RedisTokenStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisTokenStore {
            conn,
            prefix: prefix.into(),
            put_script: Script::new(TOKEN_PUT),
            rotate_script: Script::new(TOKEN_ROTATE),
            revoke_script: Script::new(TOKEN_REVOKE),
        }
    }

    fn pair_key(&self, refresh_digest: &str) -> String {
        format!("{}:pair:{}", self.prefix, refresh_digest)
    }

    fn access_key(&self, access_digest: &str) -> String {
        format!("{}:access:{}", self.prefix, access_digest)
    }

    fn owner_key(&self, principal: &PrincipalKey) -> String {
        format!("{}:owner:{}:{}", self.prefix, principal.kind, principal.id)
    }

    async fn load(&self, refresh_digest: &str) -> Result<Option<TokenPair>, AuthError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn
            .hgetall(self.pair_key(refresh_digest))
            .await
            .map_err(store_err)?;
        if fields.is_empty() {
            return Ok(None);
        }
        pair_from_fields(&fields).map(Some)
    }
}

fn pair_fields(pair: &TokenPair) -> Vec<String> {
    [
        ("kind", pair.principal.kind.as_str().to_string()),
        ("principal_id", pair.principal.id.0.clone()),
        ("access", pair.access_token.0.clone()),
        ("refresh", pair.refresh_token.0.clone()),
        ("issued_at", pair.issued_at.timestamp_millis().to_string()),
        ("access_exp", pair.access_expires_at.timestamp_millis().to_string()),
        ("refresh_exp", pair.refresh_expires_at.timestamp_millis().to_string()),
        ("revoked", if pair.revoked { "1" } else { "0" }.to_string()),
    ]
    .into_iter()
    .flat_map(|(k, v)| [k.to_string(), v])
    .collect()
}

fn pair_from_fields(fields: &HashMap<String, String>) -> Result<TokenPair, AuthError> {
    fn field<'a>(fields: &'a HashMap<String, String>, name: &str) -> Result<&'a str, AuthError> {
        fields
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| AuthError::StoreUnavailable(format!("pair record missing `{name}`")))
    }
    fn millis(fields: &HashMap<String, String>, name: &str) -> Result<DateTime<Utc>, AuthError> {
        field(fields, name)?
            .parse::<i64>()
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| AuthError::StoreUnavailable(format!("pair record has bad `{name}`")))
    }

    let kind = field(fields, "kind")?
        .parse::<PrincipalKind>()
        .map_err(|e| AuthError::StoreUnavailable(e.to_string()))?;

    Ok(TokenPair {
        principal: PrincipalKey::new(kind, field(fields, "principal_id")?),
        access_token: AccessToken(field(fields, "access")?.to_string()),
        refresh_token: RefreshToken(field(fields, "refresh")?.to_string()),
        issued_at: millis(fields, "issued_at")?,
        access_expires_at: millis(fields, "access_exp")?,
        refresh_expires_at: millis(fields, "refresh_exp")?,
        revoked: field(fields, "revoked")? == "1",
    })
}

#[async_trait::async_trait]
impl TokenStore for RedisTokenStore {
    async fn put(&self, pair: &TokenPair) -> Result<(), AuthError> {
        let refresh_digest = pair.refresh_token.digest();
        let mut conn = self.conn.clone();
        let inserted: i64 = self
            .put_script
            .key(self.pair_key(&refresh_digest))
            .key(self.access_key(&pair.access_token.digest()))
            .key(self.owner_key(&pair.principal))
            .arg(&refresh_digest)
            .arg(pair.refresh_expires_at.timestamp())
            .arg(pair_fields(pair))
            .invoke_async(&mut conn)
            .await
            .map_err(store_err)?;

        if inserted != 1 {
            return Err(AuthError::StoreUnavailable("duplicate token value".to_string()));
        }
        Ok(())
    }

    async fn find_by_access(
        &self,
        principal: &PrincipalKey,
        access_token: &AccessToken,
    ) -> Result<Option<TokenPair>, AuthError> {
        let mut conn = self.conn.clone();
        let refresh_digest: Option<String> = conn
            .get(self.access_key(&access_token.digest()))
            .await
            .map_err(store_err)?;
        let Some(refresh_digest) = refresh_digest else {
            return Ok(None);
        };

        Ok(self
            .load(&refresh_digest)
            .await?
            .filter(|p| p.principal == *principal && p.access_token == *access_token))
    }

    async fn find_by_refresh(
        &self,
        principal: &PrincipalKey,
        refresh_token: &RefreshToken,
    ) -> Result<Option<TokenPair>, AuthError> {
        Ok(self
            .load(&refresh_token.digest())
            .await?
            .filter(|p| p.principal == *principal && p.refresh_token == *refresh_token))
    }

    async fn rotate(
        &self,
        principal: &PrincipalKey,
        old_refresh: &RefreshToken,
        successor: &TokenPair,
    ) -> Result<SwapOutcome, AuthError> {
        let new_digest = successor.refresh_token.digest();
        let mut conn = self.conn.clone();
        let status: i64 = self
            .rotate_script
            .key(self.pair_key(&old_refresh.digest()))
            .key(self.pair_key(&new_digest))
            .key(self.access_key(&successor.access_token.digest()))
            .key(self.owner_key(principal))
            .arg(principal.kind.as_str())
            .arg(principal.id.as_str())
            .arg(&new_digest)
            .arg(successor.refresh_expires_at.timestamp())
            .arg(pair_fields(successor))
            .invoke_async(&mut conn)
            .await
            .map_err(store_err)?;

        match status {
            1 => Ok(SwapOutcome::Swapped),
            0 => Ok(SwapOutcome::Conflict),
            -1 => Err(AuthError::StoreUnavailable("duplicate token value".to_string())),
            other => Err(AuthError::StoreUnavailable(format!(
                "unknown rotate script status {other}"
            ))),
        }
    }

    async fn revoke(
        &self,
        principal: &PrincipalKey,
        refresh_token: &RefreshToken,
    ) -> Result<bool, AuthError> {
        let mut conn = self.conn.clone();
        let changed: i64 = self
            .revoke_script
            .key(self.pair_key(&refresh_token.digest()))
            .arg(principal.kind.as_str())
            .arg(principal.id.as_str())
            .invoke_async(&mut conn)
            .await
            .map_err(store_err)?;
        Ok(changed == 1)
    }

    async fn active_pairs(
        &self,
        principal: &PrincipalKey,
        now: DateTime<Utc>,
    ) -> Result<Vec<TokenPair>, AuthError> {
        let mut conn = self.conn.clone();
        let digests: Vec<String> = conn
            .smembers(self.owner_key(principal))
            .await
            .map_err(store_err)?;

        let mut active = Vec::new();
        for digest in digests {
            if let Some(pair) = self.load(&digest).await? {
                if pair.principal == *principal && pair.is_active(now) {
                    active.push(pair);
                }
            }
        }
        Ok(active)
    }

    async fn purge(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}:owner:*", self.prefix);
        let mut cursor: u64 = 0;
        let mut removed = 0u64;

        loop {
            let (next, owner_keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(store_err)?;

            for owner_key in owner_keys {
                let digests: Vec<String> = conn.smembers(&owner_key).await.map_err(store_err)?;
                for digest in digests {
                    match self.load(&digest).await? {
                        // Expired by Redis already; just drop the dangling member.
                        None => {}
                        Some(pair) if pair.is_dead(now) => {
                            let _: () = conn
                                .del(vec![
                                    self.pair_key(&digest),
                                    self.access_key(&pair.access_token.digest()),
                                ])
                                .await
                                .map_err(store_err)?;
                            removed += 1;
                        }
                        Some(_) => continue,
                    }
                    let _: () = conn.srem(&owner_key, &digest).await.map_err(store_err)?;
                }
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(removed)
    }
}
