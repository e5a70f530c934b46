//! Races between schedulers sharing one database
//!
//! Separate `Database` handles on the same file stand in for separate
//! scheduler processes.

use anyhow::Result;
use chrono::{Duration, Utc};
use futures::future::join_all;
use libpostpilot::generation::MockGenerator;
use libpostpilot::platforms::mock::{MockAdapterFactory, MockConfig};
use libpostpilot::service::try_claim;
use libpostpilot::types::{Comment, PlatformKind};
use libpostpilot::{
    AutoresponderSetting, Database, Post, PostStatus, PostpilotService, Scheduler, SocialAccount,
};
use std::sync::Arc;
use tempfile::TempDir;

async fn create_test_db() -> Result<(TempDir, Database)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let db = Database::new(db_path.to_str().unwrap()).await?;
    Ok((temp_dir, db))
}

async fn open_again(temp_dir: &TempDir) -> Result<Database> {
    let db_path = temp_dir.path().join("test.db");
    Ok(Database::new(db_path.to_str().unwrap()).await?)
}

fn due_post() -> Post {
    Post::new(
        "user-1",
        vec!["facebook".to_string()],
        "https://cdn.example.com/photo.jpg",
        "race",
    )
    .scheduled_for(Utc::now() - Duration::seconds(5))
}

#[tokio::test]
async fn test_concurrent_claims_have_one_winner() -> Result<()> {
    let (_temp_dir, db) = create_test_db().await?;
    let post = due_post();
    db.create_post(&post).await?;

    let attempts = (0..10).map(|_| try_claim(&db, &post.id));
    let results = join_all(attempts).await;

    assert_eq!(results.iter().filter(|won| **won).count(), 1);
    assert_eq!(results.iter().filter(|won| !**won).count(), 9);

    let loaded = db.get_post(&post.id).await?.unwrap();
    assert_eq!(loaded.status, PostStatus::Publishing);
    assert!(loaded.publishing_started_at.is_some());

    Ok(())
}

#[tokio::test]
async fn test_claims_across_handles_have_one_winner() -> Result<()> {
    let (temp_dir, db) = create_test_db().await?;
    let other = open_again(&temp_dir).await?;

    let post = due_post();
    db.create_post(&post).await?;

    let (first, second) = tokio::join!(try_claim(&db, &post.id), try_claim(&other, &post.id));
    assert!(first ^ second, "exactly one handle must win the claim");

    Ok(())
}

#[tokio::test]
async fn test_two_schedulers_publish_once() -> Result<()> {
    let (temp_dir, db) = create_test_db().await?;
    let other = open_again(&temp_dir).await?;

    let mut account = SocialAccount::new("user-1", "facebook");
    account.page_id = Some("page-1".to_string());
    db.create_social_account(&account).await?;

    let posts: Vec<Post> = (0..5).map(|_| due_post()).collect();
    for post in &posts {
        db.create_post(post).await?;
    }

    // Both schedulers publish through the same mock so calls are counted once
    let facebook = MockConfig::named("facebook");
    let factory = MockAdapterFactory::new().with_platform(PlatformKind::Facebook, facebook.clone());

    let first = Scheduler::new(
        PostpilotService::new(db.clone(), Arc::new(factory.clone()), Arc::new(MockGenerator::replying("hi"))),
        std::time::Duration::from_secs(60),
    );
    let second = Scheduler::new(
        PostpilotService::new(other, Arc::new(factory), Arc::new(MockGenerator::replying("hi"))),
        std::time::Duration::from_secs(60),
    );

    let (a, b) = tokio::join!(first.trigger_once(), second.trigger_once());
    assert_eq!(a.claimed + b.claimed, posts.len());
    assert_eq!(facebook.publish_call_count(), posts.len());

    for post in &posts {
        let loaded = db.get_post(&post.id).await?.unwrap();
        assert_eq!(loaded.status, PostStatus::Published);
    }

    Ok(())
}

#[tokio::test]
async fn test_concurrent_reservations_have_one_winner() -> Result<()> {
    let (temp_dir, db) = create_test_db().await?;
    let other = open_again(&temp_dir).await?;
    let now = Utc::now().timestamp();

    let (first, second) = tokio::join!(
        db.reserve_comment("c-race", now),
        other.reserve_comment("c-race", now)
    );
    assert!(first? ^ second?);

    Ok(())
}

#[tokio::test]
async fn test_two_schedulers_reply_once() -> Result<()> {
    let (temp_dir, db) = create_test_db().await?;
    let other = open_again(&temp_dir).await?;

    let mut account = SocialAccount::new("user-1", "facebook");
    account.page_id = Some("page-1".to_string());
    db.create_social_account(&account).await?;

    let mut setting = AutoresponderSetting::new("post-1", "user-1");
    setting
        .social_post_ids
        .insert("facebook".to_string(), "fb-post-1".to_string());
    db.save_autoresponder_setting(&setting).await?;

    let facebook = MockConfig {
        delay: std::time::Duration::from_millis(20),
        ..MockConfig::named("facebook")
    };
    facebook.add_comments(
        "fb-post-1",
        (0..4)
            .map(|i| Comment {
                id: format!("c{}", i),
                text: format!("comment {}", i),
                author_id: None,
                author_name: None,
            })
            .collect(),
    );
    let factory = MockAdapterFactory::new().with_platform(PlatformKind::Facebook, facebook.clone());

    let first = Scheduler::new(
        PostpilotService::new(db.clone(), Arc::new(factory.clone()), Arc::new(MockGenerator::replying("Thanks"))),
        std::time::Duration::from_secs(60),
    );
    let second = Scheduler::new(
        PostpilotService::new(other, Arc::new(factory), Arc::new(MockGenerator::replying("Thanks"))),
        std::time::Duration::from_secs(60),
    );

    let (a, b) = tokio::join!(first.trigger_once(), second.trigger_once());
    assert_eq!(a.replies_posted + b.replies_posted, 4);
    assert_eq!(facebook.reply_call_count(), 4);

    let mut replied: Vec<String> = facebook.replies().into_iter().map(|(id, _)| id).collect();
    replied.sort();
    assert_eq!(replied, vec!["c0", "c1", "c2", "c3"]);

    Ok(())
}
