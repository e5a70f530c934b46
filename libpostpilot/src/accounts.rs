//! Account directory
//!
//! Linked social accounts are owned by the account-linking flow; this module
//! only reads them and decides which account serves which platform.

use crate::db::Database;
use crate::error::Result;
use crate::types::{PlatformKind, SocialAccount};

#[derive(Clone)]
pub struct AccountDirectory {
    db: Database,
}

impl AccountDirectory {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// All of a user's accounts with `is_active` set, in creation order
    pub async fn active_accounts(&self, user_id: &str) -> Result<Vec<SocialAccount>> {
        let accounts = self.db.get_accounts_for_user(user_id).await?;
        Ok(accounts.into_iter().filter(|a| a.is_active).collect())
    }
}

/// Pick the account that serves `platform`
///
/// Platform names compare case-insensitively. An Instagram business account
/// is usually attached to a Facebook page account, so for `instagram` any
/// account carrying an Instagram account id matches as well. First match wins.
pub fn resolve<'a>(accounts: &'a [SocialAccount], platform: &str) -> Option<&'a SocialAccount> {
    let wants_instagram = platform.eq_ignore_ascii_case(PlatformKind::Instagram.as_str());

    accounts.iter().find(|account| {
        account.platform.eq_ignore_ascii_case(platform)
            || (wants_instagram
                && account
                    .instagram_account_id
                    .as_deref()
                    .is_some_and(|id| !id.is_empty()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn account(platform: &str) -> SocialAccount {
        SocialAccount::new("user-1", platform)
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let accounts = vec![account("Facebook")];
        assert!(resolve(&accounts, "facebook").is_some());
        assert!(resolve(&accounts, "FACEBOOK").is_some());
        assert!(resolve(&accounts, "instagram").is_none());
    }

    #[test]
    fn test_resolve_instagram_through_facebook_page() {
        let mut fb = account("facebook");
        fb.instagram_account_id = Some("ig-biz-1".to_string());
        let accounts = vec![fb];

        let found = resolve(&accounts, "instagram").unwrap();
        assert_eq!(found.platform, "facebook");
        assert_eq!(found.instagram_account_id.as_deref(), Some("ig-biz-1"));
    }

    #[test]
    fn test_resolve_ignores_empty_instagram_id() {
        let mut fb = account("facebook");
        fb.instagram_account_id = Some(String::new());
        assert!(resolve(&[fb], "instagram").is_none());
    }

    #[test]
    fn test_resolve_first_match_wins() {
        let mut fb = account("facebook");
        fb.instagram_account_id = Some("ig-via-fb".to_string());
        let ig = account("instagram");
        let accounts = vec![fb, ig];

        let found = resolve(&accounts, "instagram").unwrap();
        assert_eq!(found.platform, "facebook");
    }

    #[test]
    fn test_resolve_empty_list() {
        assert!(resolve(&[], "facebook").is_none());
    }

    #[tokio::test]
    async fn test_active_accounts_filters_inactive() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(db_path.to_str().unwrap()).await.unwrap();

        let active = account("facebook");
        let mut inactive = account("instagram");
        inactive.is_active = false;
        db.create_social_account(&active).await.unwrap();
        db.create_social_account(&inactive).await.unwrap();

        let directory = AccountDirectory::new(db);
        let accounts = directory.active_accounts("user-1").await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].platform, "facebook");
    }
}
