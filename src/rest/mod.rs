// rest/mod.rs — Public REST API server.
//
// Axum HTTP server, bind address and port from config.
//
// Endpoints:
//   GET   /api/health
//   POST  /api/auth/register
//   POST  /api/auth/login
//   POST  /api/auth/logout
//   GET   /api/user
//   PATCH /api/user
//   GET   /api/plugins
//   GET   /api/plugins/space/{id}
//   GET   /api/plugins/{id}
//   GET   /api/spaces
//   POST  /api/spaces
//   GET   /api/spaces/{id}
//   PATCH /api/spaces/{id}
//   PUT   /api/spaces/{id}/plugins
//   POST  /api/spaces/{id}/invite
//   POST  /api/invites/{id}/accept

pub mod auth;
pub mod error;
pub mod routes;

use anyhow::Result;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::AppContext;

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("REST API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        // Health (no auth)
        .route("/api/health", get(routes::health::health))
        // Auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        // Current user profile
        .route(
            "/api/user",
            get(routes::user::get_user).patch(routes::user::update_user),
        )
        // Plugin catalog. The static /space segment takes priority over the
        // {id} capture.
        .route("/api/plugins", get(routes::plugins::list_plugins))
        .route(
            "/api/plugins/space/{id}",
            get(routes::plugins::plugins_in_space),
        )
        .route("/api/plugins/{id}", get(routes::plugins::get_plugin))
        // Spaces
        .route(
            "/api/spaces",
            get(routes::spaces::list_spaces).post(routes::spaces::create_space),
        )
        .route(
            "/api/spaces/{id}",
            get(routes::spaces::get_space).patch(routes::spaces::update_space),
        )
        .route(
            "/api/spaces/{id}/plugins",
            put(routes::spaces::update_space_plugins),
        )
        .route(
            "/api/spaces/{id}/invite",
            post(routes::spaces::generate_invite),
        )
        // Invites
        .route(
            "/api/invites/{id}/accept",
            post(routes::spaces::accept_invite),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
