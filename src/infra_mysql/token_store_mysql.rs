use super::util::is_dup_key;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, MySqlPool, Row};

const PAIR_COLUMNS: &str = "principal_kind, principal_id, access_token, refresh_token, \
     issued_at, access_expires_at, refresh_expires_at, revoked";

pub struct MySqlTokenStore {
    pool: MySqlPool,
}

fn store_err(e: sqlx::Error) -> AuthError {
    if is_dup_key(&e) {
        AuthError::StoreUnavailable("duplicate token value".to_string())
    } else {
        AuthError::StoreUnavailable(e.to_string())
    }
}

impl MySqlTokenStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlTokenStore { pool }
    }

    fn row_to_pair(row: MySqlRow) -> Result<TokenPair, AuthError> {
        let kind: String = row.try_get("principal_kind").map_err(store_err)?;
        let kind = kind
            .parse::<PrincipalKind>()
            .map_err(|e| AuthError::StoreUnavailable(e.to_string()))?;
        let principal_id: String = row.try_get("principal_id").map_err(store_err)?;

        Ok(TokenPair {
            principal: PrincipalKey::new(kind, principal_id),
            access_token: AccessToken(row.try_get("access_token").map_err(store_err)?),
            refresh_token: RefreshToken(row.try_get("refresh_token").map_err(store_err)?),
            issued_at: row.try_get("issued_at").map_err(store_err)?,
            access_expires_at: row.try_get("access_expires_at").map_err(store_err)?,
            refresh_expires_at: row.try_get("refresh_expires_at").map_err(store_err)?,
            revoked: row.try_get("revoked").map_err(store_err)?,
        })
    }

    async fn insert<'e, E>(exec: E, pair: &TokenPair) -> Result<(), AuthError>
    where
        E: sqlx::Executor<'e, Database = MySql>,
    {
        sqlx::query(
            r#"
INSERT INTO auth_token_pair
    (refresh_digest, access_digest, principal_kind, principal_id, access_token, refresh_token,
     issued_at, access_expires_at, refresh_expires_at, revoked)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#,
        )
        .bind(pair.refresh_token.digest())
        .bind(pair.access_token.digest())
        .bind(pair.principal.kind.as_str())
        .bind(pair.principal.id.as_str())
        .bind(&pair.access_token.0)
        .bind(&pair.refresh_token.0)
        .bind(pair.issued_at)
        .bind(pair.access_expires_at)
        .bind(pair.refresh_expires_at)
        .bind(pair.revoked)
        .execute(exec)
        .await
        .map_err(store_err)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl TokenStore for MySqlTokenStore {
    async fn put(&self, pair: &TokenPair) -> Result<(), AuthError> {
        Self::insert(&self.pool, pair).await
    }

    async fn find_by_access(
        &self,
        principal: &PrincipalKey,
        access_token: &AccessToken,
    ) -> Result<Option<TokenPair>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(&format!(
            "SELECT {PAIR_COLUMNS} FROM auth_token_pair \
             WHERE access_digest = ? AND principal_kind = ? AND principal_id = ?"
        ))
        .bind(access_token.digest())
        .bind(principal.kind.as_str())
        .bind(principal.id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row_opt
            .map(Self::row_to_pair)
            .transpose()?
            .filter(|p| p.access_token == *access_token))
    }

    async fn find_by_refresh(
        &self,
        principal: &PrincipalKey,
        refresh_token: &RefreshToken,
    ) -> Result<Option<TokenPair>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(&format!(
            "SELECT {PAIR_COLUMNS} FROM auth_token_pair \
             WHERE refresh_digest = ? AND principal_kind = ? AND principal_id = ?"
        ))
        .bind(refresh_token.digest())
        .bind(principal.kind.as_str())
        .bind(principal.id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row_opt
            .map(Self::row_to_pair)
            .transpose()?
            .filter(|p| p.refresh_token == *refresh_token))
    }

    async fn rotate(
        &self,
        principal: &PrincipalKey,
        old_refresh: &RefreshToken,
        successor: &TokenPair,
    ) -> Result<SwapOutcome, AuthError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        // The row lock taken here makes a concurrent rotation wait, then match zero rows.
        let revoked = sqlx::query(
            r#"
UPDATE auth_token_pair
SET revoked = 1
WHERE refresh_digest = ? AND principal_kind = ? AND principal_id = ? AND revoked = 0
"#,
        )
        .bind(old_refresh.digest())
        .bind(principal.kind.as_str())
        .bind(principal.id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        if revoked.rows_affected() != 1 {
            tx.rollback().await.map_err(store_err)?;
            return Ok(SwapOutcome::Conflict);
        }

        // Dropping `tx` on error rolls back the revocation as well.
        Self::insert(&mut *tx, successor).await?;
        tx.commit().await.map_err(store_err)?;

        Ok(SwapOutcome::Swapped)
    }

    async fn revoke(
        &self,
        principal: &PrincipalKey,
        refresh_token: &RefreshToken,
    ) -> Result<bool, AuthError> {
        let res = sqlx::query(
            r#"
UPDATE auth_token_pair
SET revoked = 1
WHERE refresh_digest = ? AND principal_kind = ? AND principal_id = ? AND revoked = 0
"#,
        )
        .bind(refresh_token.digest())
        .bind(principal.kind.as_str())
        .bind(principal.id.as_str())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(res.rows_affected() == 1)
    }

    async fn active_pairs(
        &self,
        principal: &PrincipalKey,
        now: DateTime<Utc>,
    ) -> Result<Vec<TokenPair>, AuthError> {
        let rows: Vec<MySqlRow> = sqlx::query(&format!(
            "SELECT {PAIR_COLUMNS} FROM auth_token_pair \
             WHERE principal_kind = ? AND principal_id = ? AND revoked = 0 \
               AND refresh_expires_at > ? \
             ORDER BY issued_at"
        ))
        .bind(principal.kind.as_str())
        .bind(principal.id.as_str())
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.into_iter().map(Self::row_to_pair).collect()
    }

    async fn purge(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let res = sqlx::query(
            r#"
DELETE FROM auth_token_pair
WHERE revoked = 1 OR refresh_expires_at <= ?
"#,
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(res.rows_affected())
    }
}
