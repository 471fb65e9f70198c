use crate::application_port::{AuthError, TokenClaims, TokenCodec};
use crate::domain_model::*;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub signing_key: Vec<u8>,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl JwtConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.signing_key.is_empty() {
            anyhow::bail!("jwt signing key is empty");
        }
        if self.access_ttl.as_secs() == 0 {
            anyhow::bail!("access ttl must be at least one second");
        }
        if self.access_ttl >= self.refresh_ttl {
            anyhow::bail!(
                "access ttl ({:?}) must be shorter than refresh ttl ({:?})",
                self.access_ttl,
                self.refresh_ttl
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    knd: PrincipalKind,
    typ: TokenType,
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
    jti: String,
}

pub struct JwtHs256Codec {
    cfg: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtHs256Codec {
    pub fn new(cfg: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(&cfg.signing_key);
        let decoding_key = DecodingKey::from_secret(&cfg.signing_key);
        JwtHs256Codec {
            cfg,
            encoding_key,
            decoding_key,
        }
    }

    #[inline]
    fn gen_jti() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn encode(
        &self,
        principal: &PrincipalKey,
        typ: TokenType,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<(String, DateTime<Utc>), AuthError> {
        // JWT timestamps are whole seconds; keep the returned expiry identical to `exp`.
        let iat = issued_at.timestamp();
        let exp = iat + ttl.as_secs() as i64;
        let exp_dt = DateTime::from_timestamp(exp, 0)
            .ok_or_else(|| AuthError::InternalError("expiry out of range".to_string()))?;

        let claims = Claims {
            sub: principal.id.0.clone(),
            knd: principal.kind,
            typ,
            exp,
            iat,
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
            jti: Self::gen_jti(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;
        Ok((token, exp_dt))
    }
}

impl TokenCodec for JwtHs256Codec {
    fn issue_access_token(
        &self,
        principal: &PrincipalKey,
        issued_at: DateTime<Utc>,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError> {
        let (token, exp) = self.encode(principal, TokenType::Access, issued_at, self.cfg.access_ttl)?;
        Ok((AccessToken(token), exp))
    }

    fn issue_refresh_token(
        &self,
        principal: &PrincipalKey,
        issued_at: DateTime<Utc>,
    ) -> Result<(RefreshToken, DateTime<Utc>), AuthError> {
        let (token, exp) =
            self.encode(principal, TokenType::Refresh, issued_at, self.cfg.refresh_ttl)?;
        Ok((RefreshToken(token), exp))
    }

    fn decode(&self, token: &str) -> Result<TokenClaims, AuthError> {
        // Expiry is judged against the injected clock by the caller.
        let mut v = Validation::new(Algorithm::HS256);
        v.validate_exp = false;
        v.set_audience(&[self.cfg.audience.clone()]);
        v.set_issuer(&[self.cfg.issuer.clone()]);

        let data = decode::<Claims>(token, &self.decoding_key, &v)
            .map_err(|e| AuthError::Validation(format!("undecodable token: {e}")))?;
        let claims = data.claims;
        let expires_at = DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| AuthError::Validation("exp out of range".to_string()))?;

        Ok(TokenClaims {
            principal: PrincipalKey {
                kind: claims.knd,
                id: PrincipalId(claims.sub),
            },
            expires_at,
            jti: claims.jti,
        })
    }
}
