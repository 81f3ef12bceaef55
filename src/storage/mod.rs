// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use chrono::{Duration, Utc};
use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};
use std::{path::Path, str::FromStr};
use uuid::Uuid;

use crate::layout::{Geometry, LayoutDiff, Placement};

/// Default timeout for individual SQLite queries.
/// Prevents hung queries from blocking the server indefinitely.
const QUERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Execute a future with the standard query timeout.
/// Returns an error if the operation takes longer than `QUERY_TIMEOUT`.
async fn with_timeout<T>(fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "database query timed out after {}s",
            QUERY_TIMEOUT.as_secs()
        )),
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub image: String,
    pub password_salt: String,
    pub password_hash: String,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuthSessionRow {
    pub token: String,
    pub user_id: String,
    pub created_at: String,
    /// NULL means the session never expires (session_ttl_days = 0).
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SpaceRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SpaceUserRow {
    pub space_id: String,
    pub user_id: String,
    pub is_owner: bool,
    pub can_edit: bool,
    pub can_invite: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SpacePluginRow {
    pub space_id: String,
    pub plugin_id: String,
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

impl From<SpacePluginRow> for Placement {
    fn from(row: SpacePluginRow) -> Self {
        Placement {
            plugin_id: row.plugin_id,
            geometry: Geometry {
                left: row.left,
                top: row.top,
                width: row.width,
                height: row.height,
            },
        }
    }
}

/// A placement joined with its catalog plugin's metadata.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SpacePluginDetailRow {
    pub plugin_id: String,
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
    pub name: String,
    pub icon: String,
    pub is_deleted: bool,
    pub min_width: i64,
    pub max_width: i64,
    pub min_height: i64,
    pub max_height: i64,
}

/// Serialized straight into the catalog listing response.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedPluginRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub min_width: i64,
    pub max_width: i64,
    pub min_height: i64,
    pub max_height: i64,
    pub author_id: String,
    pub is_deleted: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// A catalog plugin joined with its author's display name.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PluginWithAuthorRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub min_width: i64,
    pub max_width: i64,
    pub min_height: i64,
    pub max_height: i64,
    pub author_id: String,
    pub is_deleted: bool,
    pub created_at: String,
    pub updated_at: String,
    pub author_name: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InviteRow {
    pub id: String,
    pub space_id: String,
    /// NULL means the invite never expires (unrecognized timeframe).
    pub expires_at: Option<String>,
    pub created_at: String,
}

/// Fields accepted when seeding a catalog plugin.
#[derive(Debug, Clone)]
pub struct NewPublishedPlugin<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub icon: &'a str,
    pub min_width: i64,
    pub max_width: i64,
    pub min_height: i64,
    pub max_height: i64,
    pub author_id: &'a str,
}

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        Self::new_with_slow_query(data_dir, 0).await
    }

    /// Create storage with slow-query logging enabled.
    ///
    /// `slow_query_ms` is the threshold in milliseconds — queries exceeding it
    /// are logged at WARN level. Set to 0 to disable slow-query logging.
    pub async fn new_with_slow_query(data_dir: &Path, slow_query_ms: u64) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let db_path = data_dir.join("spaced.db");
        let mut opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .foreign_keys(true)
                .create_if_missing(true);

        if slow_query_ms > 0 {
            use sqlx::ConnectOptions as _;
            opts = opts.log_slow_statements(
                log::LevelFilter::Warn,
                std::time::Duration::from_millis(slow_query_ms),
            );
        }

        let pool = SqlitePool::connect_with(opts).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// Return a clone of the connection pool (cheap — Arc-backed).
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        sqlx::migrate!("src/storage/migrations")
            .run(pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    // ─── Users ──────────────────────────────────────────────────────────────

    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_salt: &str,
        password_hash: &str,
    ) -> Result<UserRow> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO users (id, name, email, image, password_salt, password_hash, created_at)
             VALUES (?, ?, ?, '', ?, ?, ?)",
        )
        .bind(&id)
        .bind(name)
        .bind(email)
        .bind(password_salt)
        .bind(password_hash)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        self.get_user(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("user not found after insert"))
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<UserRow>> {
        Ok(sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        Ok(sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Partial profile update; `None` fields are left untouched.
    pub async fn update_user(
        &self,
        id: &str,
        name: Option<&str>,
        image: Option<&str>,
    ) -> Result<Option<UserRow>> {
        sqlx::query(
            "UPDATE users SET name = COALESCE(?, name), image = COALESCE(?, image) WHERE id = ?",
        )
        .bind(name)
        .bind(image)
        .bind(id)
        .execute(&self.pool)
        .await?;
        self.get_user(id).await
    }

    // ─── Auth sessions ──────────────────────────────────────────────────────

    pub async fn create_auth_session(
        &self,
        token: &str,
        user_id: &str,
        ttl_days: u32,
    ) -> Result<AuthSessionRow> {
        let now = Utc::now();
        let expires_at = if ttl_days > 0 {
            Some((now + Duration::days(ttl_days as i64)).to_rfc3339())
        } else {
            None
        };
        sqlx::query(
            "INSERT INTO auth_sessions (token, user_id, created_at, expires_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(token)
        .bind(user_id)
        .bind(now.to_rfc3339())
        .bind(&expires_at)
        .execute(&self.pool)
        .await?;
        Ok(AuthSessionRow {
            token: token.to_string(),
            user_id: user_id.to_string(),
            created_at: now.to_rfc3339(),
            expires_at,
        })
    }

    /// Look up a session by token. Expired sessions are deleted on sight and
    /// reported as absent.
    pub async fn get_auth_session(&self, token: &str) -> Result<Option<AuthSessionRow>> {
        let session: Option<AuthSessionRow> =
            sqlx::query_as("SELECT * FROM auth_sessions WHERE token = ?")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;
        let Some(session) = session else {
            return Ok(None);
        };
        if let Some(expires_at) = &session.expires_at {
            if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(expires_at) {
                if ts < Utc::now() {
                    self.delete_auth_session(token).await?;
                    return Ok(None);
                }
            }
        }
        Ok(Some(session))
    }

    pub async fn delete_auth_session(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ─── Spaces ─────────────────────────────────────────────────────────────

    /// Create a space and its owner membership in one transaction.
    /// The owner gets all permission flags.
    pub async fn create_space(
        &self,
        name: &str,
        description: &str,
        owner_id: &str,
    ) -> Result<SpaceRow> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO spaces (id, name, description, icon, created_at, updated_at)
             VALUES (?, ?, ?, '', ?, ?)",
        )
        .bind(&id)
        .bind(name)
        .bind(description)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO space_users (space_id, user_id, is_owner, can_edit, can_invite, created_at)
             VALUES (?, ?, 1, 1, 1, ?)",
        )
        .bind(&id)
        .bind(owner_id)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        self.get_space(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("space not found after insert"))
    }

    /// Unscoped lookup — used by the invite flow, which checks membership
    /// separately to distinguish 404 from 401.
    pub async fn get_space(&self, id: &str) -> Result<Option<SpaceRow>> {
        Ok(sqlx::query_as("SELECT * FROM spaces WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Membership-scoped lookup: absent result means the space does not exist
    /// or the user is not a member — callers treat both as not-found.
    pub async fn get_space_for_member(&self, id: &str, user_id: &str) -> Result<Option<SpaceRow>> {
        Ok(sqlx::query_as(
            "SELECT s.* FROM spaces s
             JOIN space_users su ON su.space_id = s.id
             WHERE s.id = ? AND su.user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn list_spaces_for_member(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SpaceRow>> {
        with_timeout(async {
            Ok(sqlx::query_as(
                "SELECT s.* FROM spaces s
                 JOIN space_users su ON su.space_id = s.id
                 WHERE su.user_id = ?
                 ORDER BY s.created_at DESC
                 LIMIT ? OFFSET ?",
            )
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?)
        })
        .await
    }

    pub async fn count_spaces_for_member(&self, user_id: &str) -> Result<i64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM space_users WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }

    /// Partial update; `None` fields are left untouched.
    pub async fn update_space(
        &self,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
        icon: Option<&str>,
    ) -> Result<Option<SpaceRow>> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE spaces SET
                 name = COALESCE(?, name),
                 description = COALESCE(?, description),
                 icon = COALESCE(?, icon),
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(name)
        .bind(description)
        .bind(icon)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        self.get_space(id).await
    }

    // ─── Memberships ────────────────────────────────────────────────────────

    pub async fn get_membership(
        &self,
        space_id: &str,
        user_id: &str,
    ) -> Result<Option<SpaceUserRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM space_users WHERE space_id = ? AND user_id = ?")
                .bind(space_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    pub async fn add_member(
        &self,
        space_id: &str,
        user_id: &str,
        can_edit: bool,
        can_invite: bool,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO space_users (space_id, user_id, is_owner, can_edit, can_invite, created_at)
             VALUES (?, ?, 0, ?, ?, ?)",
        )
        .bind(space_id)
        .bind(user_id)
        .bind(can_edit)
        .bind(can_invite)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ─── Placements ─────────────────────────────────────────────────────────

    pub async fn list_placements(&self, space_id: &str) -> Result<Vec<SpacePluginRow>> {
        Ok(sqlx::query_as(
            "SELECT * FROM space_plugins WHERE space_id = ? ORDER BY plugin_id",
        )
        .bind(space_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Placements joined with catalog plugin metadata.
    pub async fn list_placements_with_plugin(
        &self,
        space_id: &str,
    ) -> Result<Vec<SpacePluginDetailRow>> {
        with_timeout(async {
            Ok(sqlx::query_as(
                "SELECT sp.plugin_id, sp.\"left\", sp.\"top\", sp.width, sp.height,
                        p.name, p.icon, p.is_deleted,
                        p.min_width, p.max_width, p.min_height, p.max_height
                 FROM space_plugins sp
                 JOIN published_plugins p ON p.id = sp.plugin_id
                 WHERE sp.space_id = ?
                 ORDER BY sp.plugin_id",
            )
            .bind(space_id)
            .fetch_all(&self.pool)
            .await?)
        })
        .await
    }

    /// Apply a reconciled layout diff in a single transaction:
    /// deletes, then updates, then inserts.
    pub async fn apply_layout(&self, space_id: &str, diff: &LayoutDiff) -> Result<()> {
        if diff.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for plugin_id in &diff.deleted {
            sqlx::query("DELETE FROM space_plugins WHERE space_id = ? AND plugin_id = ?")
                .bind(space_id)
                .bind(plugin_id)
                .execute(&mut *tx)
                .await?;
        }
        for placement in &diff.updated {
            sqlx::query(
                "UPDATE space_plugins
                 SET \"left\" = ?, \"top\" = ?, width = ?, height = ?
                 WHERE space_id = ? AND plugin_id = ?",
            )
            .bind(placement.geometry.left)
            .bind(placement.geometry.top)
            .bind(placement.geometry.width)
            .bind(placement.geometry.height)
            .bind(space_id)
            .bind(&placement.plugin_id)
            .execute(&mut *tx)
            .await?;
        }
        for placement in &diff.created {
            sqlx::query(
                "INSERT INTO space_plugins (space_id, plugin_id, \"left\", \"top\", width, height)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(space_id)
            .bind(&placement.plugin_id)
            .bind(placement.geometry.left)
            .bind(placement.geometry.top)
            .bind(placement.geometry.width)
            .bind(placement.geometry.height)
            .execute(&mut *tx)
            .await?;
        }
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE spaces SET updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(space_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    // ─── Plugin catalog ─────────────────────────────────────────────────────

    pub async fn count_published_plugins(&self, name_filter: Option<&str>) -> Result<i64> {
        let row: (i64,) = match name_filter {
            Some(name) => {
                sqlx::query_as(
                    "SELECT COUNT(*) FROM published_plugins
                     WHERE LOWER(name) LIKE '%' || LOWER(?) || '%'",
                )
                .bind(name)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT COUNT(*) FROM published_plugins")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(row.0)
    }

    /// Catalog listing, newest-updated first. `name_filter` is a
    /// case-insensitive substring match.
    pub async fn list_published_plugins(
        &self,
        limit: i64,
        name_filter: Option<&str>,
    ) -> Result<Vec<PublishedPluginRow>> {
        with_timeout(async {
            let rows = match name_filter {
                Some(name) => {
                    sqlx::query_as(
                        "SELECT * FROM published_plugins
                         WHERE LOWER(name) LIKE '%' || LOWER(?) || '%'
                         ORDER BY updated_at DESC
                         LIMIT ?",
                    )
                    .bind(name)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
                }
                None => {
                    sqlx::query_as(
                        "SELECT * FROM published_plugins ORDER BY updated_at DESC LIMIT ?",
                    )
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
                }
            };
            Ok(rows)
        })
        .await
    }

    pub async fn get_published_plugin_with_author(
        &self,
        id: &str,
    ) -> Result<Option<PluginWithAuthorRow>> {
        Ok(sqlx::query_as(
            "SELECT p.*, u.name AS author_name
             FROM published_plugins p
             JOIN users u ON u.id = p.author_id
             WHERE p.id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Seed a catalog plugin. There is no publishing API; this backs the
    /// seeding path and tests.
    pub async fn create_published_plugin(
        &self,
        plugin: NewPublishedPlugin<'_>,
    ) -> Result<PublishedPluginRow> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO published_plugins
                 (id, name, description, icon, min_width, max_width, min_height, max_height,
                  author_id, is_deleted, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(&id)
        .bind(plugin.name)
        .bind(plugin.description)
        .bind(plugin.icon)
        .bind(plugin.min_width)
        .bind(plugin.max_width)
        .bind(plugin.min_height)
        .bind(plugin.max_height)
        .bind(plugin.author_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        let row = sqlx::query_as("SELECT * FROM published_plugins WHERE id = ?")
            .bind(&id)
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or_else(|| anyhow::anyhow!("plugin not found after insert"))
    }

    // ─── Invites ────────────────────────────────────────────────────────────

    pub async fn create_invite(
        &self,
        space_id: &str,
        expires_at: Option<&str>,
    ) -> Result<InviteRow> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO invites (id, space_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(space_id)
        .bind(expires_at)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(InviteRow {
            id,
            space_id: space_id.to_string(),
            expires_at: expires_at.map(str::to_string),
            created_at: now,
        })
    }

    pub async fn get_invite(&self, id: &str) -> Result<Option<InviteRow>> {
        Ok(sqlx::query_as("SELECT * FROM invites WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }
}
