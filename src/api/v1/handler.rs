use super::error::*;
use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};

type JsonReply = WithStatus<Json>;

fn reply(body: &Value, status: StatusCode) -> Result<JsonReply, warp::Rejection> {
    Ok(warp::reply::with_status(warp::reply::json(body), status))
}

fn present(field: Option<String>) -> Option<String> {
    field.filter(|s| !s.is_empty())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokensView {
    pub access: AccessToken,
    pub refresh: RefreshToken,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl From<&TokenPair> for TokensView {
    fn from(pair: &TokenPair) -> Self {
        TokensView {
            access: pair.access_token.clone(),
            refresh: pair.refresh_token.clone(),
            access_expires_at: pair.access_expires_at,
            refresh_expires_at: pair.refresh_expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub issued_at: DateTime<Utc>,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

pub async fn login(
    kind: PrincipalKind,
    body: LoginRequest,
    session_service: Arc<dyn SessionService>,
) -> Result<JsonReply, warp::Rejection> {
    let (Some(username), Some(password)) = (present(body.username), present(body.password))
    else {
        return reply(&json!({ "success": false }), StatusCode::BAD_REQUEST);
    };

    let login_input = LoginInput {
        kind,
        username,
        password,
    };
    match session_service.login(login_input).await {
        Ok(result) => reply(
            &json!({
                "success": true,
                kind.as_str(): result.principal,
                "tokens": TokensView::from(&result.tokens),
            }),
            StatusCode::OK,
        ),
        Err(e) => reply(&json!({ "success": false }), status_of(&e)),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CheckAccessQuery {
    pub token: Option<String>,
    pub id: Option<String>,
}

pub async fn check_access(
    kind: PrincipalKind,
    query: CheckAccessQuery,
    session_service: Arc<dyn SessionService>,
) -> Result<JsonReply, warp::Rejection> {
    let (Some(token), Some(id)) = (present(query.token), present(query.id)) else {
        return reply(&json!({ "isOk": false }), StatusCode::BAD_REQUEST);
    };

    let is_ok = session_service
        .check_access(&PrincipalKey::new(kind, id), &AccessToken(token))
        .await;
    let status = if is_ok {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    reply(&json!({ "isOk": is_ok }), status)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IsExpiredQuery {
    pub token: Option<String>,
}

pub async fn is_expired(
    query: IsExpiredQuery,
    session_service: Arc<dyn SessionService>,
) -> Result<JsonReply, warp::Rejection> {
    let Some(token) = present(query.token) else {
        return reply(&json!({ "expired": false }), StatusCode::BAD_REQUEST);
    };

    let expired = session_service.is_expired(&token);
    reply(&json!({ "expired": expired }), StatusCode::OK)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateTokensRequest {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(alias = "adminId", alias = "doctorId", alias = "patientId")]
    pub principal_id: Option<String>,
}

pub async fn update_tokens(
    kind: PrincipalKind,
    body: UpdateTokensRequest,
    session_service: Arc<dyn SessionService>,
) -> Result<JsonReply, warp::Rejection> {
    let (Some(access_token), Some(refresh_token), Some(principal_id)) = (
        present(body.access_token),
        present(body.refresh_token),
        present(body.principal_id),
    ) else {
        return reply(&json!({ "success": false }), StatusCode::NOT_IMPLEMENTED);
    };

    let rotate_input = RotateInput {
        principal: PrincipalKey::new(kind, principal_id),
        access_token: AccessToken(access_token),
        refresh_token: RefreshToken(refresh_token),
    };
    match session_service.rotate(rotate_input).await {
        Ok(pair) => reply(
            &json!({ "success": true, "tokens": TokensView::from(&pair) }),
            StatusCode::CREATED,
        ),
        Err(e) => reply(&json!({ "success": false }), status_of(&e)),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
    #[serde(alias = "adminId", alias = "doctorId", alias = "patientId")]
    pub principal_id: Option<String>,
}

pub async fn logout(
    kind: PrincipalKind,
    body: LogoutRequest,
    session_service: Arc<dyn SessionService>,
) -> Result<JsonReply, warp::Rejection> {
    let (Some(refresh_token), Some(principal_id)) =
        (present(body.refresh_token), present(body.principal_id))
    else {
        return reply(&json!({ "success": false }), StatusCode::BAD_REQUEST);
    };

    match session_service
        .revoke(
            &PrincipalKey::new(kind, principal_id),
            &RefreshToken(refresh_token),
        )
        .await
    {
        Ok(()) => reply(&json!({ "success": true }), StatusCode::OK),
        Err(e) => reply(&json!({ "success": false }), status_of(&e)),
    }
}

pub async fn list_sessions(
    principal: PrincipalKey,
    session_service: Arc<dyn SessionService>,
) -> Result<JsonReply, warp::Rejection> {
    match session_service.sessions(&principal).await {
        Ok(pairs) => {
            let sessions: Vec<SessionView> = pairs
                .iter()
                .map(|p| SessionView {
                    issued_at: p.issued_at,
                    access_expires_at: p.access_expires_at,
                    refresh_expires_at: p.refresh_expires_at,
                })
                .collect();
            reply(
                &json!({ "success": true, "sessions": sessions }),
                StatusCode::OK,
            )
        }
        Err(e) => reply(&json!({ "success": false }), status_of(&e)),
    }
}
