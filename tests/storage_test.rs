//! Storage-layer tests against a temporary SQLite database.

use spaced::{
    auth,
    layout::{self, LayoutItem, Placement},
    storage::{NewPublishedPlugin, Storage},
};

async fn test_storage() -> Storage {
    let data_dir = tempfile::tempdir().unwrap().keep();
    Storage::new(&data_dir).await.unwrap()
}

fn item(id: &str, left: i64, top: i64, width: i64, height: i64) -> LayoutItem {
    LayoutItem {
        id: id.to_string(),
        left,
        top,
        width,
        height,
    }
}

async fn seed_plugin(storage: &Storage, name: &str, author_id: &str) -> String {
    storage
        .create_published_plugin(NewPublishedPlugin {
            name,
            description: "",
            icon: "",
            min_width: 1,
            max_width: 12,
            min_height: 1,
            max_height: 12,
            author_id,
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_apply_layout_converges_placements() {
    let storage = test_storage().await;
    let hashed = auth::hash_password("pw");
    let user = storage
        .create_user("Alice", "alice@example.com", &hashed.salt, &hashed.hash)
        .await
        .unwrap();
    let space = storage
        .create_space("Lab", "", &user.id)
        .await
        .unwrap();
    let p1 = seed_plugin(&storage, "One", &user.id).await;
    let p2 = seed_plugin(&storage, "Two", &user.id).await;

    // First submission: two creates.
    let existing: Vec<Placement> = vec![];
    let diff = layout::reconcile(
        &existing,
        &[item(&p1, 0, 0, 1, 1), item(&p2, 2, 0, 2, 2)],
    );
    storage.apply_layout(&space.id, &diff).await.unwrap();
    assert_eq!(storage.list_placements(&space.id).await.unwrap().len(), 2);

    // Second submission: resize p1, drop p2.
    let existing: Vec<Placement> = storage
        .list_placements(&space.id)
        .await
        .unwrap()
        .into_iter()
        .map(Into::into)
        .collect();
    let diff = layout::reconcile(&existing, &[item(&p1, 0, 0, 2, 1)]);
    assert_eq!(diff.updated.len(), 1);
    assert_eq!(diff.deleted.len(), 1);
    storage.apply_layout(&space.id, &diff).await.unwrap();

    let rows = storage.list_placements(&space.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].plugin_id, p1);
    assert_eq!(rows[0].width, 2);

    // Re-applying the same submission is a no-op.
    let existing: Vec<Placement> = rows.into_iter().map(Into::into).collect();
    let diff = layout::reconcile(&existing, &[item(&p1, 0, 0, 2, 1)]);
    assert!(diff.is_empty());
}

#[tokio::test]
async fn test_owner_membership_created_with_space() {
    let storage = test_storage().await;
    let hashed = auth::hash_password("pw");
    let user = storage
        .create_user("Owner", "owner@example.com", &hashed.salt, &hashed.hash)
        .await
        .unwrap();
    let space = storage
        .create_space("Mine", "desc", &user.id)
        .await
        .unwrap();

    let membership = storage
        .get_membership(&space.id, &user.id)
        .await
        .unwrap()
        .expect("owner membership row");
    assert!(membership.is_owner);
    assert!(membership.can_edit);
    assert!(membership.can_invite);

    assert!(storage
        .get_space_for_member(&space.id, &user.id)
        .await
        .unwrap()
        .is_some());
    assert!(storage
        .get_space_for_member(&space.id, "someone-else")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_expired_auth_session_deleted_on_lookup() {
    let storage = test_storage().await;
    let hashed = auth::hash_password("pw");
    let user = storage
        .create_user("Alice", "alice@example.com", &hashed.salt, &hashed.hash)
        .await
        .unwrap();

    // ttl 0 = never expires.
    let token = auth::generate_token();
    storage
        .create_auth_session(&token, &user.id, 0)
        .await
        .unwrap();
    let session = storage.get_auth_session(&token).await.unwrap().unwrap();
    assert!(session.expires_at.is_none());

    // Backdate a session to yesterday; lookup reports it absent and removes it.
    let expired_token = auth::generate_token();
    storage
        .create_auth_session(&expired_token, &user.id, 1)
        .await
        .unwrap();
    let yesterday = (chrono::Utc::now() - chrono::Duration::days(1)).to_rfc3339();
    sqlx::query("UPDATE auth_sessions SET expires_at = ? WHERE token = ?")
        .bind(&yesterday)
        .bind(&expired_token)
        .execute(&storage.pool())
        .await
        .unwrap();
    assert!(storage
        .get_auth_session(&expired_token)
        .await
        .unwrap()
        .is_none());
    assert!(storage
        .get_auth_session(&expired_token)
        .await
        .unwrap()
        .is_none());
}
