// rest/routes/spaces.rs — space CRUD, the layout PUT, and invites.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::layout::{self, LayoutItem, Placement};
use crate::rest::{auth::CurrentUser, error::ApiError};
use crate::storage::SpaceRow;
use crate::AppContext;

const DEFAULT_LIMIT: i64 = 20;

fn space_json(space: &SpaceRow) -> Value {
    json!({
        "id": space.id,
        "name": space.name,
        "description": space.description,
        "icon": space.icon,
        "createdAt": space.created_at,
        "updatedAt": space.updated_at,
    })
}

fn placements_json(placements: &[crate::storage::SpacePluginRow]) -> Vec<Value> {
    placements
        .iter()
        .map(|p| {
            json!({
                "pluginId": p.plugin_id,
                "left": p.left,
                "top": p.top,
                "width": p.width,
                "height": p.height,
            })
        })
        .collect()
}

#[derive(Deserialize)]
pub struct ListSpacesQuery {
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

/// `GET /api/spaces?limit&page` — spaces the caller belongs to.
pub async fn list_spaces(
    State(ctx): State<Arc<AppContext>>,
    current: CurrentUser,
    Query(query): Query<ListSpacesQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).max(1);
    let page = query.page.unwrap_or(1).max(1);
    // Saturate: a huge page number is a valid request that should return an
    // empty page, not overflow the offset arithmetic.
    let offset = page.saturating_sub(1).saturating_mul(limit);

    let entity_count = ctx.storage.count_spaces_for_member(&current.user.id).await?;
    let entities = ctx
        .storage
        .list_spaces_for_member(&current.user.id, limit, offset)
        .await?;
    let page_count = if entity_count == 0 {
        1
    } else {
        entity_count.saturating_add(limit - 1) / limit
    };

    Ok(Json(json!({
        "entities": entities.iter().map(space_json).collect::<Vec<_>>(),
        "pagination": {
            "entityCount": entity_count,
            "pageCount": page_count,
            "page": page,
            "limit": limit,
        },
    })))
}

/// `GET /api/spaces/{id}` — membership-scoped detail with placements.
pub async fn get_space(
    State(ctx): State<Arc<AppContext>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let space = ctx
        .storage
        .get_space_for_member(&id, &current.user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("The space does not exist.".to_string()))?;
    let placements = ctx.storage.list_placements(&id).await?;

    let mut body = space_json(&space);
    body["plugins"] = json!(placements_json(&placements));
    Ok(Json(body))
}

#[derive(Deserialize)]
pub struct CreateSpaceRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// `POST /api/spaces` — the caller becomes the owner with full permissions.
pub async fn create_space(
    State(ctx): State<Arc<AppContext>>,
    current: CurrentUser,
    Json(body): Json<CreateSpaceRequest>,
) -> Result<Json<Value>, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::Validation("Space name is required.".to_string()));
    }
    let space = ctx
        .storage
        .create_space(&body.name, &body.description, &current.user.id)
        .await?;
    Ok(Json(space_json(&space)))
}

#[derive(Deserialize)]
pub struct UpdateSpaceRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
}

/// `PATCH /api/spaces/{id}` — partial update, membership-scoped.
pub async fn update_space(
    State(ctx): State<Arc<AppContext>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateSpaceRequest>,
) -> Result<Json<Value>, ApiError> {
    if matches!(&body.name, Some(name) if name.trim().is_empty()) {
        return Err(ApiError::Validation("Space name is required.".to_string()));
    }

    ctx.storage
        .get_space_for_member(&id, &current.user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("The space does not exist.".to_string()))?;

    let space = ctx
        .storage
        .update_space(
            &id,
            body.name.as_deref(),
            body.description.as_deref(),
            body.icon.as_deref(),
        )
        .await?
        .ok_or_else(|| ApiError::NotFound("The space does not exist.".to_string()))?;

    Ok(Json(space_json(&space)))
}

/// `PUT /api/spaces/{id}/plugins` — reconcile the submitted layout against the
/// persisted placements and apply the diff in one transaction.
pub async fn update_space_plugins(
    State(ctx): State<Arc<AppContext>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(submitted): Json<Vec<LayoutItem>>,
) -> Result<Json<Value>, ApiError> {
    ctx.storage
        .get_space_for_member(&id, &current.user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("The space does not exist.".to_string()))?;

    let existing: Vec<Placement> = ctx
        .storage
        .list_placements(&id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    let diff = layout::reconcile(&existing, &submitted);
    ctx.storage.apply_layout(&id, &diff).await?;

    // Re-fetch after the transaction: applying a non-empty diff bumps
    // updated_at.
    let space = ctx
        .storage
        .get_space(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("The space does not exist.".to_string()))?;
    let placements = ctx.storage.list_placements(&id).await?;
    let mut body = space_json(&space);
    body["plugins"] = json!(placements_json(&placements));
    Ok(Json(body))
}

#[derive(Deserialize)]
pub struct CreateInviteRequest {
    pub timeframe: String,
}

/// `POST /api/spaces/{id}/invite` — timeframe "1" | "3" | "7" sets the expiry
/// that many days out; anything else creates a never-expiring invite.
pub async fn generate_invite(
    State(ctx): State<Arc<AppContext>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<CreateInviteRequest>,
) -> Result<Json<Value>, ApiError> {
    ctx.storage
        .get_space(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("The space does not exist.".to_string()))?;

    let membership = ctx
        .storage
        .get_membership(&id, &current.user.id)
        .await?
        .ok_or_else(|| {
            ApiError::Unauthorized(
                "Users outside the space cannot generate invitations.".to_string(),
            )
        })?;
    if !membership.can_invite {
        return Err(ApiError::Unauthorized(
            "Only users with invite permisions can generate invitations.".to_string(),
        ));
    }

    let expire_days = match body.timeframe.as_str() {
        "1" => Some(1),
        "3" => Some(3),
        "7" => Some(7),
        _ => None,
    };
    let expires_at = expire_days.map(|days| (Utc::now() + Duration::days(days)).to_rfc3339());

    let invite = ctx
        .storage
        .create_invite(&id, expires_at.as_deref())
        .await?;
    Ok(Json(json!({
        "id": invite.id,
        "spaceId": invite.space_id,
        "expiresAt": invite.expires_at,
        "createdAt": invite.created_at,
    })))
}

/// `POST /api/invites/{id}/accept` — join the invite's space unless the
/// invite is expired or the caller already belongs.
pub async fn accept_invite(
    State(ctx): State<Arc<AppContext>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let invite = ctx
        .storage
        .get_invite(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("The invite does not exist.".to_string()))?;

    if let Some(expires_at) = &invite.expires_at {
        let expired = chrono::DateTime::parse_from_rfc3339(expires_at)
            .map(|ts| ts < Utc::now())
            .unwrap_or(true);
        if expired {
            return Err(ApiError::Validation("The invite has expired.".to_string()));
        }
    }

    let already_member = ctx
        .storage
        .get_membership(&invite.space_id, &current.user.id)
        .await?
        .is_some();
    if !already_member {
        ctx.storage
            .add_member(&invite.space_id, &current.user.id, true, false)
            .await?;
    }

    let space = ctx
        .storage
        .get_space(&invite.space_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("The space does not exist.".to_string()))?;
    Ok(Json(space_json(&space)))
}
