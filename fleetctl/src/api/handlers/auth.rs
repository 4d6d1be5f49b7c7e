use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;

use crate::{
    AppState,
    api::models::{
        auth::{AuthResponse, ChangePasswordRequest, CsrfResponse, CsrfTokenResponse, LoginRequest, LoginResponse, LogoutResponse},
        users::{CurrentUser, UserResponse},
    },
    auth::{csrf, current_user::AuthenticatedSession, password, session},
    config::Config,
    db::handlers::Repository as _,
    errors::Error,
};

fn invalid_credentials() -> Error {
    Error::Unauthenticated {
        message: Some("Invalid email or password".to_string()),
    }
}

fn secret(config: &Config) -> Result<&str, Error> {
    config.secret_key.as_deref().ok_or_else(|| Error::Internal {
        operation: "sign session: secret_key is required".to_string(),
    })
}

/// Session cookie, HttpOnly
pub(crate) fn session_cookie(token: &str, config: &Config) -> String {
    let session_config = &config.auth.native.session;
    let secure = if session_config.cookie_secure { "; Secure" } else { "" };
    format!(
        "{}={}; Path=/; HttpOnly{}; SameSite={}; Max-Age={}",
        session_config.cookie_name,
        token,
        secure,
        session_config.cookie_same_site,
        config.auth.security.jwt_expiry.as_secs()
    )
}

/// CSRF cookie, readable by the page so it can echo the value in a header
pub(crate) fn csrf_cookie(token: &str, config: &Config) -> String {
    let session_config = &config.auth.native.session;
    let secure = if session_config.cookie_secure { "; Secure" } else { "" };
    format!(
        "{}={}; Path=/{}; SameSite={}; Max-Age={}",
        config.auth.csrf.cookie_name,
        token,
        secure,
        session_config.cookie_same_site,
        config.auth.security.jwt_expiry.as_secs()
    )
}

fn expired_cookie(name: &str, http_only: bool) -> String {
    let http_only = if http_only { "; HttpOnly" } else { "" };
    format!("{name}=; Path=/{http_only}; Secure; SameSite=Strict; Max-Age=0")
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/authentication/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<LoginResponse, Error> {
    if !state.config.auth.native.enabled {
        return Err(Error::BadRequest {
            message: "Native authentication is disabled".to_string(),
        });
    }

    // Unknown email, wrong password and inactive accounts are indistinguishable
    let mut user = state
        .stores
        .users
        .get_user_by_email(&request.email)
        .await?
        .ok_or_else(invalid_credentials)?;

    if !password::verify_password(&request.password, user.password_hash.as_deref()).await? || !user.active {
        return Err(invalid_credentials());
    }

    let issued = session::create_session_token(&CurrentUser::from(user.clone()), &state.config)?;
    let csrf_token = csrf::issue_token(secret(&state.config)?, issued.claims.jti)?;

    state.stores.users.touch_last_login(user.id).await?;
    user.last_login = Some(Utc::now());

    tracing::info!(user_id = %user.id, "User logged in");
    let mut cookies = vec![session_cookie(&issued.token, &state.config)];
    if state.config.csrf_enabled() {
        cookies.push(csrf_cookie(&csrf_token, &state.config));
    }

    Ok(LoginResponse {
        auth_response: AuthResponse {
            user: UserResponse::from(user),
            expires_at: issued.claims.expires_at(),
            access_token: issued.token,
            csrf_token,
        },
        cookies,
    })
}

/// Log out, revoking the current token
#[utoipa::path(
    post,
    path = "/authentication/logout",
    tag = "authentication",
    responses(
        (status = 204, description = "Logout successful"),
        (status = 401, description = "Not authenticated"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %session.user.id))]
pub async fn logout(State(state): State<AppState>, session: AuthenticatedSession) -> Result<LogoutResponse, Error> {
    state.auth_cache.revoke(session.jti, session.expires_at).await;
    state.auth_cache.remove(&session.digest).await;

    Ok(LogoutResponse {
        cookies: vec![
            expired_cookie(&state.config.auth.native.session.cookie_name, true),
            expired_cookie(&state.config.auth.csrf.cookie_name, false),
        ],
    })
}

/// The authenticated user
#[utoipa::path(
    get,
    path = "/authentication/me",
    tag = "authentication",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn me(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<UserResponse>, Error> {
    let user = state
        .stores
        .users
        .get_by_id(current_user.id)
        .await?
        .ok_or(Error::Unauthenticated { message: None })?;
    Ok(Json(UserResponse::from(user)))
}

/// Change the current user's password
#[utoipa::path(
    post,
    path = "/authentication/password-change",
    request_body = ChangePasswordRequest,
    tag = "authentication",
    responses(
        (status = 204, description = "Password changed"),
        (status = 401, description = "Current password is incorrect"),
        (status = 422, description = "New password violates the password policy"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %session.user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    session: AuthenticatedSession,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<StatusCode, Error> {
    let user = state
        .stores
        .users
        .get_by_id(session.user.id)
        .await?
        .ok_or(Error::Unauthenticated { message: None })?;

    if !password::verify_password(&request.current_password, user.password_hash.as_deref()).await? {
        return Err(Error::Unauthenticated {
            message: Some("Current password is incorrect".to_string()),
        });
    }

    let password_config = &state.config.auth.native.password;
    password::check_policy("new_password", &request.new_password, password_config)?;
    let new_hash = password::hash_password(&request.new_password, password_config).await?;

    state.stores.users.set_password_hash(user.id, &new_hash).await?;
    state.auth_cache.invalidate_user(user.id).await;

    tracing::info!("Password changed");
    Ok(StatusCode::NO_CONTENT)
}

/// Reissue the CSRF token of the current session
#[utoipa::path(
    get,
    path = "/authentication/csrf",
    tag = "authentication",
    responses(
        (status = 200, description = "CSRF token", body = CsrfTokenResponse),
        (status = 401, description = "Not authenticated"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %session.user.id))]
pub async fn csrf_token(State(state): State<AppState>, session: AuthenticatedSession) -> Result<CsrfResponse, Error> {
    let token = csrf::issue_token(secret(&state.config)?, session.jti)?;
    Ok(CsrfResponse {
        cookie: csrf_cookie(&token, &state.config),
        body: CsrfTokenResponse { csrf_token: token },
    })
}

#[cfg(test)]
mod tests {
    use crate::api::models::auth::AuthResponse;
    use crate::api::models::users::{Role, UserResponse};
    use crate::test_utils::{TEST_PASSWORD, create_test_state, create_test_user, test_server};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_login_sets_cookies_and_returns_tokens() {
        let state = create_test_state().await;
        let user = create_test_user(&state, Role::Operator, None).await;
        let server = test_server(state.clone());

        let response = server
            .post("/authentication/login")
            .json(&json!({"email": user.email.to_uppercase(), "password": TEST_PASSWORD}))
            .await;
        response.assert_status_ok();

        let cookies: Vec<String> = response
            .headers()
            .get_all("set-cookie")
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies[0].starts_with("fleetctl_session="));
        assert!(cookies[0].contains("HttpOnly"));
        assert!(cookies[1].starts_with("fleetctl_csrf="));
        assert!(!cookies[1].contains("HttpOnly"));

        let body: AuthResponse = response.json();
        assert_eq!(body.user.id, user.id);
        assert!(body.user.last_login.is_some());
        assert!(!body.access_token.is_empty());
        assert!(!body.csrf_token.is_empty());
        assert!(body.expires_at > chrono::Utc::now());
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email_look_the_same() {
        let state = create_test_state().await;
        let user = create_test_user(&state, Role::Operator, None).await;
        let server = test_server(state);

        let wrong = server
            .post("/authentication/login")
            .json(&json!({"email": user.email, "password": "not-the-password"}))
            .await;
        wrong.assert_status(StatusCode::UNAUTHORIZED);

        let unknown = server
            .post("/authentication/login")
            .json(&json!({"email": "nobody@fleet.test", "password": TEST_PASSWORD}))
            .await;
        unknown.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(wrong.text(), unknown.text());
    }

    #[tokio::test]
    async fn test_me_and_logout_revokes_token() {
        let state = create_test_state().await;
        let user = create_test_user(&state, Role::CompanyManager, None).await;
        let server = test_server(state);

        let login: AuthResponse = server
            .post("/authentication/login")
            .json(&json!({"email": user.email, "password": TEST_PASSWORD}))
            .await
            .json();
        let bearer = format!("Bearer {}", login.access_token);

        let me: UserResponse = server.get("/authentication/me").add_header("authorization", &bearer).await.json();
        assert_eq!(me.id, user.id);

        server
            .post("/authentication/logout")
            .add_header("authorization", &bearer)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        server
            .get("/authentication/me")
            .add_header("authorization", &bearer)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_cookie_session_requires_csrf_on_post() {
        let state = create_test_state().await;
        let user = create_test_user(&state, Role::Operator, None).await;
        let server = test_server(state);

        let login: AuthResponse = server
            .post("/authentication/login")
            .json(&json!({"email": user.email, "password": TEST_PASSWORD}))
            .await
            .json();
        let cookie = format!("fleetctl_session={}", login.access_token);

        server
            .get("/authentication/me")
            .add_header("cookie", &cookie)
            .await
            .assert_status_ok();
        server
            .post("/authentication/logout")
            .add_header("cookie", &cookie)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .post("/authentication/logout")
            .add_header("cookie", &cookie)
            .add_header("x-csrf-token", &login.csrf_token)
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_password_change() {
        let state = create_test_state().await;
        let user = create_test_user(&state, Role::Operator, None).await;
        let server = test_server(state);

        let login: AuthResponse = server
            .post("/authentication/login")
            .json(&json!({"email": user.email, "password": TEST_PASSWORD}))
            .await
            .json();
        let bearer = format!("Bearer {}", login.access_token);

        server
            .post("/authentication/password-change")
            .add_header("authorization", &bearer)
            .json(&json!({"current_password": "wrong-password", "new_password": "brand-new-password"}))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        server
            .post("/authentication/password-change")
            .add_header("authorization", &bearer)
            .json(&json!({"current_password": TEST_PASSWORD, "new_password": "short"}))
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

        server
            .post("/authentication/password-change")
            .add_header("authorization", &bearer)
            .json(&json!({"current_password": TEST_PASSWORD, "new_password": "brand-new-password"}))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        server
            .post("/authentication/login")
            .json(&json!({"email": user.email, "password": "brand-new-password"}))
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_csrf_reissue_matches_login() {
        let state = create_test_state().await;
        let user = create_test_user(&state, Role::Operator, None).await;
        let server = test_server(state);

        let login: AuthResponse = server
            .post("/authentication/login")
            .json(&json!({"email": user.email, "password": TEST_PASSWORD}))
            .await
            .json();
        let reissued: serde_json::Value = server
            .get("/authentication/csrf")
            .add_header("authorization", format!("Bearer {}", login.access_token))
            .await
            .json();
        assert_eq!(reissued["csrf_token"], login.csrf_token);
    }
}
