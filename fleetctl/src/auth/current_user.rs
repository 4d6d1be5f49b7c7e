//! Token resolution and the authenticated-user extractors.
//!
//! A token is looked for in, in order: `Authorization: Bearer`, the `X-Access-Token` header and
//! the session cookie. The first source present wins; later ones are not consulted even when the
//! first carries a bad token.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use tracing::{debug, instrument, trace};

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::{
        cache::{CachedSession, TokenDigest, digest_token},
        csrf, session,
    },
    config::Config,
    db::handlers::Repository as _,
    errors::{Error, Result},
    types::{Operation, Permission},
};

pub const ACCESS_TOKEN_HEADER: &str = "x-access-token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Bearer,
    Header,
    Cookie,
}

/// Find the caller's token.
/// Returns:
/// - Ok(None): no credentials present
/// - Ok(Some((token, source))): the highest priority credential
/// - Err(BadRequest): an Authorization header that isn't a bearer token
pub fn resolve_token(headers: &HeaderMap, config: &Config) -> Result<Option<(String, TokenSource)>> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        let value = value.to_str().map_err(|e| Error::BadRequest {
            message: format!("Invalid authorization header: {e}"),
        })?;
        let token = value
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::BadRequest {
                message: "Authorization header must be of the form 'Bearer <token>'".to_string(),
            })?;
        return Ok(Some((token.to_string(), TokenSource::Bearer)));
    }

    if let Some(token) = headers
        .get(ACCESS_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return Ok(Some((token.to_string(), TokenSource::Header)));
    }

    Ok(cookie_value(headers, &config.auth.native.session.cookie_name).map(|token| (token, TokenSource::Cookie)))
}

/// Value of the first cookie called `name`, across every Cookie header.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|s| s.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(cookie_name, value)| *cookie_name == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// A resolved session: the user plus what is needed to end it.
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub user: CurrentUser,
    pub jti: uuid::Uuid,
    pub expires_at: i64,
    pub source: TokenSource,
    pub digest: TokenDigest,
}

/// Validate a token: revocation set, then cache, then JWT and a fresh user lookup.
#[instrument(skip_all, fields(source = ?source))]
pub async fn authenticate(state: &AppState, token: &str, source: TokenSource) -> Result<AuthenticatedSession> {
    let digest = digest_token(token);

    if let Some(cached) = state.auth_cache.get(&digest).await {
        if state.auth_cache.is_revoked(&cached.jti).await {
            state.auth_cache.remove(&digest).await;
            return Err(revoked());
        }
        trace!(user_id = %cached.user.id, "Auth cache hit");
        return Ok(AuthenticatedSession {
            user: cached.user,
            jti: cached.jti,
            expires_at: cached.expires_at,
            source,
            digest,
        });
    }

    let claims = session::verify_session_token(token, &state.config)?;
    if state.auth_cache.is_revoked(&claims.jti).await {
        return Err(revoked());
    }

    let user = state
        .stores
        .users
        .get_by_id(claims.sub)
        .await?
        .filter(|user| user.active)
        .ok_or_else(|| Error::Unauthenticated {
            message: Some("Account is not active".to_string()),
        })?;
    let user = CurrentUser::from(user);

    debug!(user_id = %user.id, "Session verified");
    state
        .auth_cache
        .insert(
            digest,
            CachedSession {
                user: user.clone(),
                jti: claims.jti,
                expires_at: claims.exp,
            },
        )
        .await;

    Ok(AuthenticatedSession {
        user,
        jti: claims.jti,
        expires_at: claims.exp,
        source,
        digest,
    })
}

fn revoked() -> Error {
    Error::Unauthenticated {
        message: Some("Session has been revoked".to_string()),
    }
}

/// Cookie sessions must echo their CSRF token on unsafe methods.
fn check_csrf(parts: &Parts, session: &AuthenticatedSession, config: &Config) -> Result<()> {
    if session.source != TokenSource::Cookie || !config.csrf_enabled() || !csrf::is_unsafe_method(&parts.method) {
        return Ok(());
    }
    let presented = parts
        .headers
        .get(config.auth.csrf.header_name.as_str())
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();
    let secret = config.secret_key.as_deref().unwrap_or_default();
    if csrf::verify_token(secret, session.jti, presented) {
        Ok(())
    } else {
        Err(Error::InsufficientPermissions {
            required: Permission::Any(vec![]),
            action: Operation::UpdateOwn,
            resource: "this resource without a valid CSRF token".to_string(),
        })
    }
}

impl FromRequestParts<AppState> for AuthenticatedSession {
    type Rejection = Error;

    #[instrument(skip_all, fields(method = %parts.method, path = %parts.uri.path()))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        // Several extractors in one handler share the first resolution
        if let Some(session) = parts.extensions.get::<AuthenticatedSession>() {
            return Ok(session.clone());
        }

        let (token, source) = resolve_token(&parts.headers, &state.config)?.ok_or(Error::Unauthenticated { message: None })?;
        let session = authenticate(state, &token, source).await?;
        check_csrf(parts, &session, &state.config)?;

        parts.extensions.insert(session.clone());
        Ok(session)
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        Ok(AuthenticatedSession::from_request_parts(parts, state).await?.user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use crate::db::handlers::Repository as _;
    use crate::test_utils::{create_test_state, create_test_user};
    use axum::http::{HeaderValue, Method, Request};

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                axum::http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_resolution_order() {
        let config = Config::default();
        let cookie = format!("other=1; {}=cookie-token", config.auth.native.session.cookie_name);

        let all = headers(&[
            ("authorization", "Bearer bearer-token"),
            ("x-access-token", "header-token"),
            ("cookie", &cookie),
        ]);
        assert_eq!(
            resolve_token(&all, &config).unwrap(),
            Some(("bearer-token".to_string(), TokenSource::Bearer))
        );

        let no_bearer = headers(&[("x-access-token", "header-token"), ("cookie", &cookie)]);
        assert_eq!(
            resolve_token(&no_bearer, &config).unwrap(),
            Some(("header-token".to_string(), TokenSource::Header))
        );

        let cookie_only = headers(&[("cookie", &cookie)]);
        assert_eq!(
            resolve_token(&cookie_only, &config).unwrap(),
            Some(("cookie-token".to_string(), TokenSource::Cookie))
        );

        assert_eq!(resolve_token(&HeaderMap::new(), &config).unwrap(), None);
    }

    #[test]
    fn test_malformed_authorization_is_bad_request() {
        let config = Config::default();
        for value in ["Basic dXNlcjpwYXNz", "Bearer ", "token"] {
            let err = resolve_token(&headers(&[("authorization", value)]), &config).unwrap_err();
            assert!(matches!(err, Error::BadRequest { .. }), "{value}");
        }
    }

    #[test]
    fn test_cookie_value_across_headers() {
        let map = headers(&[("cookie", "a=1"), ("cookie", "b=2; c=3")]);
        assert_eq!(cookie_value(&map, "c"), Some("3".to_string()));
        assert_eq!(cookie_value(&map, "d"), None);
    }

    async fn extract(state: &AppState, request: Request<()>) -> Result<AuthenticatedSession> {
        let (mut parts, _) = request.into_parts();
        AuthenticatedSession::from_request_parts(&mut parts, state).await
    }

    #[tokio::test]
    async fn test_cache_hit_skips_user_lookup() {
        let state = create_test_state().await;
        let user = create_test_user(&state, Role::Operator, None).await;
        let issued = session::create_session_token(&CurrentUser::from(user.clone()), &state.config).unwrap();

        let request = || {
            Request::builder()
                .header("authorization", format!("Bearer {}", issued.token))
                .body(())
                .unwrap()
        };
        let first = extract(&state, request()).await.unwrap();
        assert_eq!(first.user.id, user.id);
        assert_eq!(first.source, TokenSource::Bearer);

        // Gone from the store, still served from cache until invalidated
        state.stores.users.delete(user.id).await.unwrap();
        assert!(extract(&state, request()).await.is_ok());

        state.auth_cache.invalidate_user(user.id).await;
        assert!(extract(&state, request()).await.is_err());
    }

    #[tokio::test]
    async fn test_revoked_token_is_rejected() {
        let state = create_test_state().await;
        let user = create_test_user(&state, Role::Operator, None).await;
        let issued = session::create_session_token(&CurrentUser::from(user), &state.config).unwrap();
        let request = || Request::builder().header("x-access-token", &issued.token).body(()).unwrap();

        assert!(extract(&state, request()).await.is_ok());
        state.auth_cache.revoke(issued.claims.jti, issued.claims.exp).await;

        let err = extract(&state, request()).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));
    }

    #[tokio::test]
    async fn test_inactive_user_is_rejected() {
        let state = create_test_state().await;
        let user = create_test_user(&state, Role::Operator, None).await;
        state
            .stores
            .users
            .update(
                user.id,
                &crate::db::models::users::UserUpdateDBRequest {
                    active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let issued = session::create_session_token(&CurrentUser::from(user), &state.config).unwrap();
        let request = Request::builder().header("x-access-token", &issued.token).body(()).unwrap();
        assert!(matches!(extract(&state, request).await.unwrap_err(), Error::Unauthenticated { .. }));
    }

    #[tokio::test]
    async fn test_csrf_only_for_cookie_sessions_on_unsafe_methods() {
        let state = create_test_state().await;
        let user = create_test_user(&state, Role::Operator, None).await;
        let issued = session::create_session_token(&CurrentUser::from(user), &state.config).unwrap();
        let cookie = format!("{}={}", state.config.auth.native.session.cookie_name, issued.token);
        let csrf_token = csrf::issue_token(state.config.secret_key.as_deref().unwrap(), issued.claims.jti).unwrap();

        let cookie_request = |method: Method, csrf: Option<&str>| {
            let mut builder = Request::builder().method(method).header("cookie", &cookie);
            if let Some(csrf) = csrf {
                builder = builder.header("x-csrf-token", csrf);
            }
            builder.body(()).unwrap()
        };

        // Safe methods never need it
        assert!(extract(&state, cookie_request(Method::GET, None)).await.is_ok());

        let err = extract(&state, cookie_request(Method::POST, None)).await.unwrap_err();
        assert_eq!(err.status_code().as_u16(), 403);
        let err = extract(&state, cookie_request(Method::DELETE, Some("forged"))).await.unwrap_err();
        assert_eq!(err.status_code().as_u16(), 403);
        assert!(extract(&state, cookie_request(Method::POST, Some(&csrf_token))).await.is_ok());

        // Bearer tokens are exempt
        let bearer = Request::builder()
            .method(Method::POST)
            .header("authorization", format!("Bearer {}", issued.token))
            .body(())
            .unwrap();
        assert!(extract(&state, bearer).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let state = create_test_state().await;
        let err = extract(&state, Request::builder().body(()).unwrap()).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));
    }
}
