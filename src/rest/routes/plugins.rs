// rest/routes/plugins.rs — plugin catalog routes.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::rest::{auth::CurrentUser, error::ApiError};
use crate::AppContext;

const DEFAULT_LIMIT: i64 = 50;

#[derive(Deserialize)]
pub struct ListPluginsQuery {
    pub limit: Option<i64>,
    pub name: Option<String>,
}

/// `GET /api/plugins?limit&name` — catalog listing, newest-updated first.
/// `name` is a case-insensitive substring filter.
pub async fn list_plugins(
    State(ctx): State<Arc<AppContext>>,
    _current: CurrentUser,
    Query(query): Query<ListPluginsQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).max(0);
    let name_filter = query.name.as_deref().filter(|n| !n.is_empty());

    let entity_count = ctx.storage.count_published_plugins(name_filter).await?;
    let entities = ctx
        .storage
        .list_published_plugins(limit, name_filter)
        .await?;

    Ok(Json(json!({
        "entities": entities,
        "pagination": { "entityCount": entity_count, "limit": limit },
    })))
}

/// `GET /api/plugins/space/{id}` — the space's placements joined with plugin
/// metadata.
pub async fn plugins_in_space(
    State(ctx): State<Arc<AppContext>>,
    _current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let placements = ctx.storage.list_placements_with_plugin(&id).await?;
    let list: Vec<Value> = placements
        .iter()
        .map(|p| {
            json!({
                "pluginId": p.plugin_id,
                "left": p.left,
                "top": p.top,
                "width": p.width,
                "height": p.height,
                "plugin": {
                    "name": p.name,
                    "icon": p.icon,
                    "isDeleted": p.is_deleted,
                    "minWidth": p.min_width,
                    "maxWidth": p.max_width,
                    "minHeight": p.min_height,
                    "maxHeight": p.max_height,
                },
            })
        })
        .collect();
    Ok(Json(json!(list)))
}

/// `GET /api/plugins/{id}` — a single catalog plugin with its author's name.
pub async fn get_plugin(
    State(ctx): State<Arc<AppContext>>,
    _current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let plugin = ctx
        .storage
        .get_published_plugin_with_author(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("The plugin does not exist.".to_string()))?;

    Ok(Json(json!({
        "id": plugin.id,
        "name": plugin.name,
        "description": plugin.description,
        "icon": plugin.icon,
        "minWidth": plugin.min_width,
        "maxWidth": plugin.max_width,
        "minHeight": plugin.min_height,
        "maxHeight": plugin.max_height,
        "isDeleted": plugin.is_deleted,
        "createdAt": plugin.created_at,
        "updatedAt": plugin.updated_at,
        "author": { "name": plugin.author_name },
    })))
}
