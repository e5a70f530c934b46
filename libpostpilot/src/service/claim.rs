//! Claim protocol
//!
//! The only way into the fan-out engine. A post moves from `scheduled` to
//! `publishing` in one conditional write, so however many scheduler
//! processes race on the same due post, exactly one of them gets `true`.

use chrono::Utc;
use tracing::debug;

use crate::db::Database;

/// Try to take exclusive ownership of a due post
///
/// Conflicts and store errors both count as "not claimed"; neither is
/// surfaced to the caller.
pub async fn try_claim(db: &Database, post_id: &str) -> bool {
    match db.claim_scheduled_post(post_id, Utc::now().timestamp()).await {
        Ok(true) => true,
        Ok(false) => {
            debug!(post_id, "Post is no longer scheduled, skipping");
            false
        }
        Err(e) => {
            debug!(post_id, "Claim failed: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Post, PostStatus};
    use tempfile::TempDir;

    async fn create_test_db() -> (TempDir, Database) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
        (temp_dir, db)
    }

    #[tokio::test]
    async fn test_claim_then_reclaim() {
        let (_temp_dir, db) = create_test_db().await;
        let post = Post::new("u", vec!["facebook".to_string()], "m", "c").scheduled_for(Utc::now());
        db.create_post(&post).await.unwrap();

        assert!(try_claim(&db, &post.id).await);
        assert!(!try_claim(&db, &post.id).await);
    }

    #[tokio::test]
    async fn test_claim_non_scheduled_has_no_side_effect() {
        let (_temp_dir, db) = create_test_db().await;
        let mut post = Post::new("u", vec!["facebook".to_string()], "m", "c");
        post.status = PostStatus::Published;
        db.create_post(&post).await.unwrap();

        assert!(!try_claim(&db, &post.id).await);

        let loaded = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, PostStatus::Published);
        assert!(loaded.publishing_started_at.is_none());
    }

    #[tokio::test]
    async fn test_claim_unknown_post() {
        let (_temp_dir, db) = create_test_db().await;
        assert!(!try_claim(&db, "missing").await);
    }
}
