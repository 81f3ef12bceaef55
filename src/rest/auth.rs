// rest/auth.rs — bearer-token extractor and the register/login/logout routes.

use axum::{
    extract::{FromRequestParts, State},
    http::{header, request::Parts},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::error::ApiError;
use crate::{auth, storage::UserRow, AppContext};

/// The authenticated caller, resolved from the `Authorization: Bearer` header.
/// Every protected route takes this extractor; unauthenticated calls are
/// rejected before handler logic runs.
pub struct CurrentUser {
    pub user: UserRow,
    pub token: String,
}

impl FromRequestParts<Arc<AppContext>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &Arc<AppContext>,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Authentication required.".to_string()))?;
        let token = auth::bearer_token(header_value)
            .ok_or_else(|| ApiError::Unauthorized("Authentication required.".to_string()))?;

        let session = ctx
            .storage
            .get_auth_session(token)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Invalid or expired session.".to_string()))?;
        let user = ctx
            .storage
            .get_user(&session.user_id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Invalid or expired session.".to_string()))?;

        Ok(CurrentUser {
            user,
            token: token.to_string(),
        })
    }
}

/// Public profile shape — never includes credential fields.
pub fn user_json(user: &UserRow) -> Value {
    json!({
        "id": user.id,
        "name": user.name,
        "email": user.email,
        "image": user.image,
        "createdAt": user.created_at,
    })
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

pub async fn register(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<Value>, ApiError> {
    let name = body.name.trim();
    // Trim once so the duplicate check and the insert see the same value.
    let email = body.email.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("Name is required.".to_string()));
    }
    if email.is_empty() {
        return Err(ApiError::Validation("Email is required.".to_string()));
    }
    if body.password.is_empty() {
        return Err(ApiError::Validation("Password is required.".to_string()));
    }
    if ctx.storage.get_user_by_email(email).await?.is_some() {
        return Err(ApiError::Validation(
            "An account with this email already exists.".to_string(),
        ));
    }

    let hashed = auth::hash_password(&body.password);
    let user = ctx
        .storage
        .create_user(name, email, &hashed.salt, &hashed.hash)
        .await?;

    let token = auth::generate_token();
    ctx.storage
        .create_auth_session(&token, &user.id, ctx.config.session_ttl_days)
        .await?;

    Ok(Json(json!({ "token": token, "user": user_json(&user) })))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = ctx
        .storage
        .get_user_by_email(&body.email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid email or password.".to_string()))?;

    if !auth::verify_password(&body.password, &user.password_salt, &user.password_hash) {
        return Err(ApiError::Unauthorized(
            "Invalid email or password.".to_string(),
        ));
    }

    let token = auth::generate_token();
    ctx.storage
        .create_auth_session(&token, &user.id, ctx.config.session_ttl_days)
        .await?;

    Ok(Json(json!({ "token": token, "user": user_json(&user) })))
}

pub async fn logout(
    State(ctx): State<Arc<AppContext>>,
    current: CurrentUser,
) -> Result<Json<Value>, ApiError> {
    ctx.storage.delete_auth_session(&current.token).await?;
    Ok(Json(json!({ "ok": true })))
}
