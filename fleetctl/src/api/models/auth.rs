//! Request/response models for the authentication endpoints.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::models::users::UserResponse;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    /// Usable as a bearer token or `X-Access-Token` by non-browser clients
    pub access_token: String,
    /// Echo in the CSRF header on unsafe requests authenticated by cookie
    pub csrf_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CsrfTokenResponse {
    pub csrf_token: String,
}

/// Build a response with one `Set-Cookie` header per cookie.
fn with_cookies(status: StatusCode, cookies: &[String], body: Option<Response>) -> Response {
    let mut headers = HeaderMap::new();
    for cookie in cookies {
        match HeaderValue::from_str(cookie) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!("Invalid Set-Cookie value: {e}"),
        }
    }
    match body {
        Some(body) => (status, headers, body).into_response(),
        None => (status, headers).into_response(),
    }
}

/// Login response: JSON body plus the session and CSRF cookies.
pub struct LoginResponse {
    pub auth_response: AuthResponse,
    pub cookies: Vec<String>,
}

impl IntoResponse for LoginResponse {
    fn into_response(self) -> Response {
        with_cookies(StatusCode::OK, &self.cookies, Some(Json(self.auth_response).into_response()))
    }
}

/// 204 that clears the session and CSRF cookies.
pub struct LogoutResponse {
    pub cookies: Vec<String>,
}

impl IntoResponse for LogoutResponse {
    fn into_response(self) -> Response {
        with_cookies(StatusCode::NO_CONTENT, &self.cookies, None)
    }
}

/// CSRF token reissued for the current session, in the body and its cookie.
pub struct CsrfResponse {
    pub body: CsrfTokenResponse,
    pub cookie: String,
}

impl IntoResponse for CsrfResponse {
    fn into_response(self) -> Response {
        with_cookies(StatusCode::OK, std::slice::from_ref(&self.cookie), Some(Json(self.body).into_response()))
    }
}
