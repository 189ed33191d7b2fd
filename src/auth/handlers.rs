use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRef, Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            ChangePasswordRequest, ForgotPasswordRequest, ForgotPasswordResponse,
            LoginHistoryResponse, LoginRequest, LoginResponse, MessageResponse, PublicUser,
            RegisterRequest, RegisterResponse, RegistrationsResponse, ResetPasswordRequest,
            UpdateProfileRequest,
        },
        extractors::AuthUser,
        password::{hash_password, verify_password},
        repo_types::{LoginAttempt, User},
        tokens::TokenKeys,
    },
    error::ApiError,
    state::AppState,
};

const DEFAULT_HISTORY_LIMIT: i64 = 10;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/submit", post(register))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/change-password", post(change_password))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/login-history", get(login_history))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/registrations", get(list_registrations))
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Proxy-aware client address: first X-Forwarded-For hop if present,
/// otherwise the socket peer.
fn client_ip(addr: &SocketAddr, headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| addr.ip().to_string())
}

fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let missing = payload.missing_fields();
    if !missing.is_empty() {
        warn!(?missing, "registration rejected, missing fields");
        return Err(ApiError::Validation(missing));
    }

    if payload.password != payload.confirm_password {
        return Err(ApiError::BadRequest("Passwords do not match"));
    }

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::BadRequest("Invalid email"));
    }

    if payload.password.len() < 8 {
        return Err(ApiError::BadRequest("Password too short"));
    }

    let digest = hash_password(&payload.password)?;
    let user = User::create(&state.db, &payload.into_new_user(digest)).await?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(Json(RegisterResponse {
        success: true,
        message: "Registration successful! You can now login with your credentials.".into(),
        user_id: user.id,
    }))
}

#[instrument(skip(state, headers, payload))]
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if payload.username.is_empty() || payload.password.is_empty() {
        return Err(ApiError::BadRequest("Username and password are required"));
    }

    let ip = client_ip(&addr, &headers);
    let agent = user_agent(&headers);

    // Absent user and wrong password answer identically so the response
    // does not reveal which one failed.
    let user = match User::find_by_identity(&state.db, &payload.username).await? {
        Some(user) => user,
        None => {
            LoginAttempt::record(&state.db, None, &ip, agent.as_deref(), false).await;
            warn!(identity = %payload.username, "login for unknown identity");
            return Err(ApiError::Unauthorized("Invalid username or password"));
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        LoginAttempt::record(&state.db, Some(user.id), &ip, agent.as_deref(), false).await;
        warn!(user_id = user.id, "login with invalid password");
        return Err(ApiError::Unauthorized("Invalid username or password"));
    }

    User::touch_last_login(&state.db, user.id).await?;
    LoginAttempt::record(&state.db, Some(user.id), &ip, agent.as_deref(), true).await;

    let keys = TokenKeys::from_ref(&state);
    let token = keys.issue_session(user.id, payload.remember_me)?;

    info!(user_id = user.id, username = %user.username, "user logged in");
    Ok(Json(LoginResponse {
        success: true,
        message: "Login successful".into(),
        token,
        user: user.into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if payload.current_password.is_empty() || payload.new_password.is_empty() {
        return Err(ApiError::BadRequest("All fields are required"));
    }

    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::Unauthorized("User not found"))?;

    if !verify_password(&payload.current_password, &user.password_hash)? {
        warn!(user_id, "change password with wrong current password");
        return Err(ApiError::Unauthorized("Current password is incorrect"));
    }

    if payload.new_password.len() < 8 {
        return Err(ApiError::BadRequest("Password too short"));
    }

    let digest = hash_password(&payload.new_password)?;
    User::set_password(&state.db, user_id, &digest).await?;

    info!(user_id, "password changed");
    Ok(Json(MessageResponse::ok("Password changed successfully")))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<ForgotPasswordResponse>, ApiError> {
    if payload.email.is_empty() {
        return Err(ApiError::BadRequest("Email is required"));
    }

    let user = User::find_by_identity(&state.db, &payload.email)
        .await?
        .ok_or(ApiError::BadRequest("Email not found in our system"))?;

    let keys = TokenKeys::from_ref(&state);
    let reset_token = keys.issue_reset(user.id)?;

    // Returned in-band; out-of-band delivery is outside this service.
    info!(user_id = user.id, "password reset requested");
    Ok(Json(ForgotPasswordResponse {
        success: true,
        message: "Email verified successfully".into(),
        reset_token,
        user_id: user.id,
    }))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if payload.email.is_empty() || payload.reset_token.is_empty() || payload.new_password.is_empty()
    {
        return Err(ApiError::BadRequest("All fields are required"));
    }

    let user = User::find_by_identity(&state.db, &payload.email)
        .await?
        .ok_or(ApiError::BadRequest("User not found"))?;

    let keys = TokenKeys::from_ref(&state);
    let claims = keys
        .verify_reset(&payload.reset_token)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired reset token"))?;

    // The token must belong to the account being reset.
    if claims.sub != user.id {
        warn!(user_id = user.id, token_sub = claims.sub, "reset token for wrong user");
        return Err(ApiError::Unauthorized("Invalid or expired reset token"));
    }

    if payload.new_password.len() < 8 {
        return Err(ApiError::BadRequest("Password too short"));
    }

    let digest = hash_password(&payload.new_password)?;
    User::set_password(&state.db, user.id, &digest).await?;

    info!(user_id = user.id, "password reset");
    Ok(Json(MessageResponse::ok("Password reset successfully")))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::Unauthorized("User not found"))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<PublicUser>, ApiError> {
    let missing = payload.missing_fields();
    if !missing.is_empty() {
        warn!(user_id, ?missing, "profile update rejected, missing fields");
        return Err(ApiError::Validation(missing));
    }

    if !is_valid_email(&payload.email) {
        return Err(ApiError::BadRequest("Invalid email"));
    }

    let user = User::update_profile(&state.db, user_id, &payload.into_update())
        .await?
        .ok_or(ApiError::Unauthorized("User not found"))?;

    info!(user_id, "profile updated");
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn list_registrations(
    State(state): State<AppState>,
) -> Result<Json<RegistrationsResponse>, ApiError> {
    let registrations = User::list_all(&state.db).await?;
    Ok(Json(RegistrationsResponse {
        count: registrations.len(),
        registrations,
    }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
}

#[instrument(skip(state))]
pub async fn login_history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<HistoryParams>,
) -> Result<Json<LoginHistoryResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, 100);
    let attempts = LoginAttempt::list_for_user(&state.db, user_id, limit).await?;
    Ok(Json(LoginHistoryResponse {
        count: attempts.len(),
        attempts,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@sub.example.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@x.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn client_ip_prefers_forwarded_header() {
        let addr: SocketAddr = "10.0.0.1:9999".parse().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.2".parse().unwrap());
        assert_eq!(client_ip(&addr, &headers), "203.0.113.7");

        let empty = HeaderMap::new();
        assert_eq!(client_ip(&addr, &empty), "10.0.0.1");
    }

    #[test]
    fn user_agent_is_optional() {
        let mut headers = HeaderMap::new();
        assert_eq!(user_agent(&headers), None);
        headers.insert(
            axum::http::header::USER_AGENT,
            "Mozilla/5.0".parse().unwrap(),
        );
        assert_eq!(user_agent(&headers).as_deref(), Some("Mozilla/5.0"));
    }
}
