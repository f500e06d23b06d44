//! Role checks.

use crate::{backend::RoleTable, models::Role};
use tracing::warn;
use uuid::Uuid;

/// Whether `user_id` holds the admin grant.
///
/// A failed lookup is logged and treated as "not an admin", so a broken role
/// table never widens access.
pub async fn is_admin(roles: &dyn RoleTable, user_id: Uuid) -> bool {
    match roles.find_grant(user_id, Role::Admin).await {
        Ok(grant) => grant.is_some(),
        Err(err) => {
            warn!(user_id = %user_id, error = %err, "role lookup failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestEnv;

    #[tokio::test]
    async fn only_granted_users_are_admins() {
        let env = TestEnv::new().await;
        let ada = env.user("ada").await;
        let root = env.admin("root").await;

        assert!(!is_admin(&env.db, ada.id).await);
        assert!(is_admin(&env.db, root.id).await);
        assert!(!is_admin(&env.db, Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn lookup_failure_means_not_admin() {
        let env = TestEnv::new().await;
        let root = env.admin("root").await;
        env.db.db.close().await;

        assert!(!is_admin(&env.db, root.id).await);
    }
}
