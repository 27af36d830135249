use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::UserRepository;
use crate::auth::password::{hash_password, verify_password};
use crate::error::AppError;
use crate::model::role::Role;
use crate::model::user::User;

pub const MIN_PASSWORD_LEN: usize = 6;

#[inline]
fn normalize(username: &str) -> String {
    username.trim().to_lowercase()
}

/// User accounts: lookup, password checks and the default-admin bootstrap.
pub struct CredentialStore {
    repo: Arc<dyn UserRepository>,
    hash_cost: u32,
}

impl CredentialStore {
    pub fn new(repo: Arc<dyn UserRepository>, hash_cost: u32) -> Self {
        Self { repo, hash_cost }
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self.repo.find_by_username(&normalize(username)).await?)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.repo.find_by_id(id).await?)
    }

    /// A stored hash that fails to parse counts as a mismatch.
    pub fn verify_password(&self, user: &User, plaintext: &str) -> bool {
        verify_password(plaintext, &user.password_hash).is_ok()
    }

    pub async fn create(
        &self,
        username: &str,
        plaintext: &str,
        role: Role,
        full_name: Option<String>,
    ) -> Result<User, AppError> {
        let username = normalize(username);
        if username.is_empty() || plaintext.is_empty() {
            return Err(AppError::validation("Username and password must not be empty"));
        }

        let user = User {
            id: Uuid::new_v4(),
            username,
            password_hash: hash_password(plaintext, self.hash_cost).map_err(AppError::internal)?,
            role,
            full_name,
            is_active: true,
            last_login: None,
            created_at: Utc::now(),
        };
        self.repo.insert(&user).await?;

        info!(user_id = %user.id, username = %user.username, role = %user.role, "User created");
        Ok(user)
    }

    pub async fn set_password(&self, user: &User, new_plaintext: &str) -> Result<(), AppError> {
        if new_plaintext.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let hash = hash_password(new_plaintext, self.hash_cost).map_err(AppError::internal)?;
        self.repo.update_password(user.id, &hash).await?;
        Ok(())
    }

    pub async fn touch_last_login(&self, user: &User) -> Result<(), AppError> {
        Ok(self.repo.touch_last_login(user.id, Utc::now()).await?)
    }

    /// Creates the default admin when no admin exists. Two instances racing
    /// this check at startup may both create one.
    pub async fn bootstrap_admin(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, AppError> {
        if self.repo.count_admins().await? > 0 {
            return Ok(None);
        }

        let admin = self
            .create(username, password, Role::Admin, Some("System Administrator".to_string()))
            .await?;

        warn!(
            username = %admin.username,
            "Default admin user created, change this password immediately"
        );
        Ok(Some(admin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryUserRepository;

    fn store() -> CredentialStore {
        CredentialStore::new(Arc::new(MemoryUserRepository::default()), 1)
    }

    #[actix_web::test]
    async fn usernames_are_case_normalized() {
        let creds = store();
        let user = creds.create("Ravi", "secret1", Role::User, None).await.unwrap();
        assert_eq!(user.username, "ravi");

        let found = creds.find_by_username("RAVI").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
    }

    #[actix_web::test]
    async fn duplicate_username_is_a_conflict() {
        let creds = store();
        creds.create("ravi", "secret1", Role::User, None).await.unwrap();
        let err = creds.create("Ravi", "secret2", Role::User, None).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[actix_web::test]
    async fn password_is_hashed_and_verifiable() {
        let creds = store();
        let user = creds.create("ravi", "secret1", Role::User, None).await.unwrap();
        assert_ne!(user.password_hash, "secret1");
        assert!(creds.verify_password(&user, "secret1"));
        assert!(!creds.verify_password(&user, "secret2"));
    }

    #[actix_web::test]
    async fn set_password_rejects_short_passwords() {
        let creds = store();
        let user = creds.create("ravi", "secret1", Role::User, None).await.unwrap();
        let err = creds.set_password(&user, "12345").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        creds.set_password(&user, "123456").await.unwrap();
        let reloaded = creds.find_by_id(user.id).await.unwrap().unwrap();
        assert!(creds.verify_password(&reloaded, "123456"));
        assert!(!creds.verify_password(&reloaded, "secret1"));
    }

    #[actix_web::test]
    async fn touch_last_login_records_a_time() {
        let creds = store();
        let user = creds.create("ravi", "secret1", Role::User, None).await.unwrap();
        assert!(user.last_login.is_none());
        creds.touch_last_login(&user).await.unwrap();
        let reloaded = creds.find_by_id(user.id).await.unwrap().unwrap();
        assert!(reloaded.last_login.is_some());
    }

    #[actix_web::test]
    async fn bootstrap_creates_exactly_one_admin() {
        let creds = store();
        let first = creds.bootstrap_admin("admin", "admin123").await.unwrap();
        let admin = first.expect("admin should be created on an empty store");
        assert_eq!(admin.username, "admin");
        assert_eq!(admin.role, Role::Admin);
        assert!(admin.is_active);

        let second = creds.bootstrap_admin("admin", "admin123").await.unwrap();
        assert!(second.is_none());
    }

    #[actix_web::test]
    async fn bootstrap_skips_when_another_admin_exists() {
        let creds = store();
        creds.create("owner", "secret1", Role::Admin, None).await.unwrap();
        assert!(creds.bootstrap_admin("admin", "admin123").await.unwrap().is_none());
        assert!(creds.find_by_username("admin").await.unwrap().is_none());
    }
}
