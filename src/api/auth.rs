use axum::{
    Json,
    extract::{FromRequestParts, State},
    http::{HeaderMap, StatusCode, request::Parts},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;

use super::{
    ApiError, ApiResponse, AppState, AuthResponse, LoginRequest, MessageResponse,
    RegisterRequest, VerifyResponse,
};
use crate::db::User;
use crate::services::{AuthError, LoginResult, NewAccount};

pub const SESSION_COOKIE: &str = "session_token";

// ============================================================================
// Token extraction
// ============================================================================

/// Read the session token from the `session_token` cookie, falling back to
/// an `Authorization: Bearer <token>` header.
pub fn extract_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE)
        && !cookie.value().is_empty()
    {
        return Some(cookie.value().to_string());
    }

    if let Some(auth_header) = headers.get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    None
}

/// Extractor for a present session token. A missing token is rejected with
/// the same 401 as an invalid one.
pub struct SessionToken(pub String);

impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        extract_token(&jar, &parts.headers)
            .map(Self)
            .ok_or(ApiError::Unauthorized)
    }
}

fn session_cookie(token: String, state: &AppState) -> Cookie<'static> {
    let config = &state.shared.config;
    let max_age = config.session.lifetime().num_seconds();

    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.server.secure_cookies)
        .max_age(time::Duration::seconds(max_age))
        .build()
}

fn issue(jar: CookieJar, state: &AppState, result: LoginResult, message: &str) -> (CookieJar, AuthResponse) {
    let LoginResult { user, session } = result;
    let expires_at = session.expires_at.clone();
    let jar = jar.add(session_cookie(session.session_token, state));

    (
        jar,
        AuthResponse {
            message: message.to_string(),
            user,
            expires_at,
        },
    )
}

fn record_user(user: &User) {
    tracing::Span::current().record("user_id", user.id);
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<ApiResponse<AuthResponse>>), ApiError> {
    let result = state
        .auth_service()
        .register(NewAccount {
            username: payload.username,
            email: payload.email,
            password: payload.password,
            full_name: payload.full_name,
        })
        .await?;

    record_user(&result.user);
    let (jar, body) = issue(jar, &state, result, "Registration successful");

    Ok((StatusCode::CREATED, jar, Json(ApiResponse::success(body))))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<ApiResponse<AuthResponse>>), ApiError> {
    let result = state
        .auth_service()
        .authenticate(&payload.username, &payload.password)
        .await?;

    record_user(&result.user);
    let (jar, body) = issue(jar, &state, result, "Login successful");

    Ok((jar, Json(ApiResponse::success(body))))
}

/// POST /api/auth/logout
/// Revokes the presented session, if any, and clears the cookie.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<(CookieJar, Json<ApiResponse<MessageResponse>>), ApiError> {
    if let Some(token) = extract_token(&jar, &headers) {
        state.auth_service().revoke(&token).await?;
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));

    Ok((
        jar,
        Json(ApiResponse::success(MessageResponse::new("Logout successful"))),
    ))
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    SessionToken(token): SessionToken,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let user = state.auth_service().validate(&token).await?;
    record_user(&user);
    Ok(Json(ApiResponse::success(user)))
}

/// GET /api/auth/verify
pub async fn verify(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<VerifyResponse>>, ApiError> {
    let Some(token) = extract_token(&jar, &headers) else {
        return Ok(Json(ApiResponse::success(VerifyResponse { valid: false })));
    };

    let valid = match state.auth_service().validate(&token).await {
        Ok(_) => true,
        Err(AuthError::InvalidCredentials) => false,
        Err(e) => return Err(e.into()),
    };

    Ok(Json(ApiResponse::success(VerifyResponse { valid })))
}
