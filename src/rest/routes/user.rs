// rest/routes/user.rs — authenticated user's profile (backs the settings page).

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::rest::{
    auth::{user_json, CurrentUser},
    error::ApiError,
};
use crate::AppContext;

/// `GET /api/user`
pub async fn get_user(current: CurrentUser) -> Json<Value> {
    Json(user_json(&current.user))
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub image: Option<String>,
}

/// `PATCH /api/user` — partial profile update.
pub async fn update_user(
    State(ctx): State<Arc<AppContext>>,
    current: CurrentUser,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<Value>, ApiError> {
    if matches!(&body.name, Some(name) if name.trim().is_empty()) {
        return Err(ApiError::Validation("Name is required.".to_string()));
    }

    let user = ctx
        .storage
        .update_user(
            &current.user.id,
            body.name.as_deref(),
            body.image.as_deref(),
        )
        .await?
        .ok_or_else(|| ApiError::NotFound("The user does not exist.".to_string()))?;

    Ok(Json(user_json(&user)))
}
