use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

pub struct MySqlCredentialRepo {
    pool: MySqlPool,
}

impl MySqlCredentialRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlCredentialRepo { pool }
    }

    fn row_to_record(kind: PrincipalKind, row: MySqlRow) -> Result<CredentialRecord, AuthError> {
        let principal_id: String = row
            .try_get("principal_id")
            .map_err(|e| AuthError::StoreUnavailable(e.to_string()))?;
        let username: String = row
            .try_get("username")
            .map_err(|e| AuthError::StoreUnavailable(e.to_string()))?;
        let password_hash: String = row
            .try_get("password_hash")
            .map_err(|e| AuthError::StoreUnavailable(e.to_string()))?;
        let is_active: bool = row
            .try_get("is_active")
            .map_err(|e| AuthError::StoreUnavailable(e.to_string()))?;

        Ok(CredentialRecord {
            principal: Principal {
                key: PrincipalKey::new(kind, principal_id),
                username,
            },
            password_hash,
            is_active,
        })
    }
}

#[async_trait::async_trait]
impl CredentialRepo for MySqlCredentialRepo {
    async fn get_by_username(
        &self,
        kind: PrincipalKind,
        username: &str,
    ) -> Result<Option<CredentialRecord>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT principal_id, username, password_hash, is_active
FROM principal_credential
WHERE principal_kind = ? AND username = ?
"#,
        )
        .bind(kind.as_str())
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::StoreUnavailable(e.to_string()))?;

        row_opt.map(|row| Self::row_to_record(kind, row)).transpose()
    }
}
