use super::error::*;
use super::handler;
use crate::application_port::SessionService;
use crate::domain_model::*;
use nanoid::nanoid;
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::debug;
use warp::hyper::body::Bytes;
use warp::{Filter, http, reject};

const MAX_BODY_BYTES: u64 = 16 * 1024;

/// Every principal kind gets the same set of session routes under `/{kind}`.
/// Paths are matched before methods so unknown paths answer 404, not 405.
pub fn routes(
    session_service: Arc<dyn SessionService>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let admin = principal_routes(PrincipalKind::Admin, session_service.clone());
    let doctor = principal_routes(PrincipalKind::Doctor, session_service.clone());
    let patient = principal_routes(PrincipalKind::Patient, session_service);

    admin
        .or(doctor)
        .or(patient)
        .with(warp::trace(|info| {
            tracing::info_span!(
                "request",
                request_id = %nanoid!(10),
                method = %info.method(),
                path = %info.path(),
            )
        }))
}

fn principal_routes(
    kind: PrincipalKind,
    session_service: Arc<dyn SessionService>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let login = warp::path("login")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_kind(kind))
        .and(json_body())
        .and(with(session_service.clone()))
        .and_then(handler::login);

    let check_access = warp::path!("token" / "check-access")
        .and(warp::get())
        .and(with_kind(kind))
        .and(warp::query::<handler::CheckAccessQuery>())
        .and(with(session_service.clone()))
        .and_then(handler::check_access);

    let is_expired = warp::path!("token" / "is-expired")
        .and(warp::get())
        .and(warp::query::<handler::IsExpiredQuery>())
        .and(with(session_service.clone()))
        .and_then(handler::is_expired);

    let update_tokens = warp::path!("token" / "update-tokens")
        .and(warp::post())
        .and(with_kind(kind))
        .and(json_body())
        .and(with(session_service.clone()))
        .and_then(handler::update_tokens);

    let logout = warp::path("logout")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_kind(kind))
        .and(json_body())
        .and(with(session_service.clone()))
        .and_then(handler::logout);

    let sessions = warp::path("sessions")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_access(kind, session_service.clone()))
        .and(with(session_service))
        .and_then(handler::list_sessions);

    warp::path(kind.as_str()).and(
        login
            .or(check_access)
            .or(is_expired)
            .or(update_tokens)
            .or(logout)
            .or(sessions),
    )
}

/// Lenient JSON body: an empty, unreadable or non-JSON body yields `T::default()`
/// so the handler's own missing-field answer applies.
fn json_body<T>() -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone
where
    T: DeserializeOwned + Default + Send,
{
    warp::header::optional::<u64>(http::header::CONTENT_LENGTH.as_ref())
        .and_then(|length: Option<u64>| async move {
            match length {
                Some(length) if length > MAX_BODY_BYTES => {
                    Err(reject::custom(ApiErrorCode::PayloadTooLarge))
                }
                _ => Ok(()),
            }
        })
        .untuple_one()
        .and(warp::body::bytes())
        .map(|body: Bytes| parse_body(&body))
}

fn parse_body<T>(body: &[u8]) -> T
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return T::default();
    }
    serde_json::from_slice(body).unwrap_or_else(|e| {
        debug!("unreadable request body: {}", e);
        T::default()
    })
}

/// Token from an `Authorization` value; the scheme is matched case-insensitively.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn with_kind(
    kind: PrincipalKind,
) -> impl Filter<Extract = (PrincipalKind,), Error = Infallible> + Clone {
    warp::any().map(move || kind)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

/// Resolves the caller from `Authorization: Bearer <access>` and `X-Principal-Id`.
fn with_access(
    kind: PrincipalKind,
    session_service: Arc<dyn SessionService>,
) -> impl Filter<Extract = (PrincipalKey,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>(http::header::AUTHORIZATION.as_ref())
        .and(warp::header::optional::<String>("x-principal-id"))
        .and_then(move |authorization: Option<String>, principal_id: Option<String>| {
            let session_service = session_service.clone();
            async move {
                let token = authorization.as_deref().and_then(bearer_token);
                let (Some(token), Some(principal_id)) = (token, principal_id) else {
                    return Err(reject::custom(ApiErrorCode::InvalidToken));
                };

                let principal = PrincipalKey::new(kind, principal_id);
                if session_service
                    .check_access(&principal, &AccessToken(token.to_string()))
                    .await
                {
                    Ok(principal)
                } else {
                    Err(reject::custom(ApiErrorCode::InvalidToken))
                }
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::v1::recover_error;
    use crate::application_impl::test_support::*;
    use chrono::Duration;
    use serde_json::{Value, json};
    use warp::http::StatusCode;

    fn api(
        session_service: Arc<dyn SessionService>,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = Infallible> + Clone {
        warp::path("api")
            .and(warp::path("v1"))
            .and(routes(session_service))
            .recover(recover_error)
    }

    fn body(res: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
        serde_json::from_slice(res.body()).unwrap()
    }

    fn str_field<'a>(value: &'a Value, pointer: &str) -> &'a str {
        value.pointer(pointer).and_then(Value::as_str).unwrap()
    }

    #[tokio::test]
    async fn login_check_and_rotate_over_http() {
        let h = harness().await;
        let api = api(h.service.clone());

        let res = warp::test::request()
            .method("POST")
            .path("/api/v1/admin/login")
            .json(&json!({ "username": "root", "password": "correct" }))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let login = body(&res);
        assert_eq!(login["success"], true);
        assert_eq!(login["admin"]["id"], "admin1");
        assert_eq!(login["admin"]["username"], "root");
        let a1 = str_field(&login, "/tokens/access").to_string();
        let r1 = str_field(&login, "/tokens/refresh").to_string();
        assert_ne!(a1, r1);

        let res = warp::test::request()
            .path(&format!("/api/v1/admin/token/check-access?token={a1}&id=admin1"))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body(&res), json!({ "isOk": true }));

        h.clock.advance(Duration::seconds(ACCESS_TTL_SECS + 1));
        let res = warp::test::request()
            .method("POST")
            .path("/api/v1/admin/token/update-tokens")
            .json(&json!({ "accessToken": a1, "refreshToken": r1, "adminId": "admin1" }))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let rotated = body(&res);
        assert_eq!(rotated["success"], true);
        let a2 = str_field(&rotated, "/tokens/access").to_string();
        assert_ne!(a2, a1);

        let res = warp::test::request()
            .path(&format!("/api/v1/admin/token/check-access?token={a1}&id=admin1"))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&res), json!({ "isOk": false }));

        let res = warp::test::request()
            .path(&format!("/api/v1/admin/token/check-access?token={a2}&id=admin1"))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);

        // The retired refresh token cannot be replayed.
        let res = warp::test::request()
            .method("POST")
            .path("/api/v1/admin/token/update-tokens")
            .json(&json!({ "accessToken": a1, "refreshToken": r1, "adminId": "admin1" }))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&res), json!({ "success": false }));
    }

    #[tokio::test]
    async fn rejects_bad_login_and_incomplete_requests() {
        let h = harness().await;
        let api = api(h.service.clone());

        let res = warp::test::request()
            .method("POST")
            .path("/api/v1/admin/login")
            .json(&json!({ "username": "root", "password": "nope" }))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&res), json!({ "success": false }));

        let res = warp::test::request()
            .method("POST")
            .path("/api/v1/admin/login")
            .json(&json!({ "username": "root" }))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = warp::test::request()
            .method("POST")
            .path("/api/v1/admin/token/update-tokens")
            .json(&json!({}))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::NOT_IMPLEMENTED);

        let res = warp::test::request()
            .method("POST")
            .path("/api/v1/admin/token/update-tokens")
            .json(&json!({
                "accessToken": "a",
                "refreshToken": "never-issued",
                "principalId": "admin1",
            }))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = warp::test::request()
            .path("/api/v1/doctor/token/check-access?id=doctor1")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&res), json!({ "isOk": false }));

        let res = warp::test::request()
            .method("POST")
            .path("/api/v1/admin/login")
            .header("content-type", "application/json")
            .body("{not json")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&res), json!({ "success": false }));
    }

    #[tokio::test]
    async fn is_expired_needs_no_session() {
        let h = harness().await;
        let api = api(h.service.clone());
        let pair = login_admin(&h.service).await;

        let res = warp::test::request()
            .path(&format!(
                "/api/v1/patient/token/is-expired?token={}",
                pair.refresh_token.0
            ))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body(&res), json!({ "expired": false }));

        let res = warp::test::request()
            .path("/api/v1/admin/token/is-expired?token=garbage")
            .reply(&api)
            .await;
        assert_eq!(body(&res), json!({ "expired": true }));

        let res = warp::test::request()
            .path("/api/v1/admin/token/is-expired")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&res), json!({ "expired": false }));
    }

    #[tokio::test]
    async fn logout_and_sessions() {
        let h = harness().await;
        let api = api(h.service.clone());
        let pair = login_admin(&h.service).await;
        let bearer = format!("Bearer {}", pair.access_token.0);

        let res = warp::test::request()
            .path("/api/v1/admin/sessions")
            .header("authorization", &bearer)
            .header("x-principal-id", "admin1")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let listed = body(&res);
        assert_eq!(listed["sessions"].as_array().map(Vec::len), Some(1));
        // Token values are never echoed back in the listing.
        assert!(listed["sessions"][0].get("access").is_none());

        let res = warp::test::request()
            .path("/api/v1/admin/sessions")
            .header("authorization", &bearer)
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = warp::test::request()
            .method("POST")
            .path("/api/v1/admin/logout")
            .json(&json!({ "refreshToken": pair.refresh_token.0, "adminId": "admin1" }))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body(&res), json!({ "success": true }));

        let res = warp::test::request()
            .path("/api/v1/admin/sessions")
            .header("authorization", &bearer)
            .header("x-principal-id", "admin1")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn odd_bodies_fall_through_to_missing_field_answers() {
        let h = harness().await;
        let api = api(h.service.clone());

        let res = warp::test::request()
            .method("POST")
            .path("/api/v1/admin/token/update-tokens")
            .header("content-type", "text/plain")
            .body("accessToken=a")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(body(&res), json!({ "success": false }));

        let res = warp::test::request()
            .method("POST")
            .path("/api/v1/admin/login")
            .header("content-type", "application/x-www-form-urlencoded")
            .body("username=root&password=correct")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&res), json!({ "success": false }));

        // No body and no Content-Length at all.
        let res = warp::test::request()
            .method("POST")
            .path("/api/v1/admin/token/update-tokens")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::NOT_IMPLEMENTED);

        let res = warp::test::request()
            .method("POST")
            .path("/api/v1/admin/token/update-tokens")
            .header("content-length", "0")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::NOT_IMPLEMENTED);

        let res = warp::test::request()
            .method("POST")
            .path("/api/v1/doctor/logout")
            .header("content-type", "application/json")
            .body("{not json")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn json_without_content_type_is_still_read() {
        let h = harness().await;
        let api = api(h.service.clone());

        let res = warp::test::request()
            .method("POST")
            .path("/api/v1/admin/login")
            .body(r#"{"username":"root","password":"correct"}"#)
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body(&res)["admin"]["id"], "admin1");
    }

    #[tokio::test]
    async fn oversized_body_is_413() {
        let h = harness().await;
        let api = api(h.service.clone());

        let res = warp::test::request()
            .method("POST")
            .path("/api/v1/admin/login")
            .body(vec![b' '; MAX_BODY_BYTES as usize + 1])
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body(&res), json!({ "success": false }));
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("BEARER  abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Bearer   "), None);
    }

    #[tokio::test]
    async fn sessions_accepts_lowercase_bearer() {
        let h = harness().await;
        let api = api(h.service.clone());
        let pair = login_admin(&h.service).await;

        let res = warp::test::request()
            .path("/api/v1/admin/sessions")
            .header("authorization", format!("bearer {}", pair.access_token.0))
            .header("x-principal-id", "admin1")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_routes_are_404() {
        let h = harness().await;
        let api = api(h.service.clone());

        for path in ["/api/v1/nurse/login", "/api/v1/admin/nope", "/api/v2/admin/login"] {
            let res = warp::test::request()
                .method("POST")
                .path(path)
                .json(&json!({}))
                .reply(&api)
                .await;
            assert_eq!(res.status(), StatusCode::NOT_FOUND, "{path}");
            assert_eq!(body(&res), json!({ "success": false }));
        }
    }
}
