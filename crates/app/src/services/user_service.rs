//! User service — use-cases for managing platform accounts.

use visionhub_domain::error::{ValidationError, VisionHubError};
use visionhub_domain::id::UserId;
use visionhub_domain::user::{User, UserRole};

use crate::ports::UserRepository;

/// Input of [`UserService::create_user`].
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    /// Opaque credential material, stored as given.
    pub credential: String,
    pub full_name: Option<String>,
    pub role: Option<UserRole>,
}

/// Application service for user accounts.
pub struct UserService<R> {
    repo: R,
}

impl<R: UserRepository> UserService<R> {
    /// Create a new service backed by the given repository.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Create and persist a new user.
    ///
    /// # Errors
    ///
    /// Returns [`VisionHubError::Validation`] if invariants fail or the
    /// username is taken, or a storage error.
    #[tracing::instrument(skip(self, cmd), fields(username = %cmd.username))]
    pub async fn create_user(&self, cmd: CreateUser) -> Result<User, VisionHubError> {
        let mut builder = User::builder()
            .username(cmd.username)
            .email(cmd.email)
            .credential(cmd.credential)
            .role(cmd.role.unwrap_or_default());
        if let Some(full_name) = cmd.full_name {
            builder = builder.full_name(full_name);
        }
        let user = builder.build()?;

        if self.repo.find_by_username(&user.username).await?.is_some() {
            return Err(ValidationError::DuplicateUsername(user.username).into());
        }
        self.repo.save(&user).await?;
        tracing::info!(user_id = %user.id, "user created");
        Ok(user)
    }

    /// Look up a user by id.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn get_user(&self, id: UserId) -> Result<Option<User>, VisionHubError> {
        self.repo.find_by_id(id).await
    }

    /// List all users.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_users(&self) -> Result<Vec<User>, VisionHubError> {
        self.repo.find_all().await
    }

    /// Delete a user.
    ///
    /// # Errors
    ///
    /// Returns [`VisionHubError::NotFound`] for an unknown id, or a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn delete_user(&self, id: UserId) -> Result<(), VisionHubError> {
        self.repo.delete(id).await?;
        tracing::info!(user_id = %id, "user deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::InMemoryUserRepo;

    fn make_service() -> UserService<InMemoryUserRepo> {
        UserService::new(InMemoryUserRepo::default())
    }

    fn alice() -> CreateUser {
        CreateUser {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            credential: "opaque-digest".to_string(),
            full_name: Some("Alice Liddell".to_string()),
            role: None,
        }
    }

    #[tokio::test]
    async fn should_create_user_with_default_role() {
        let svc = make_service();
        let user = svc.create_user(alice()).await.unwrap();

        assert_eq!(user.role, UserRole::User);
        assert_eq!(user.full_name.as_deref(), Some("Alice Liddell"));
        let fetched = svc.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(fetched.username, "alice");
    }

    #[tokio::test]
    async fn should_reject_duplicate_username() {
        let svc = make_service();
        svc.create_user(alice()).await.unwrap();

        let result = svc.create_user(alice()).await;

        assert!(matches!(
            result,
            Err(VisionHubError::Validation(ValidationError::DuplicateUsername(name))) if name == "alice"
        ));
        assert_eq!(svc.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_reject_invalid_email() {
        let svc = make_service();
        let result = svc
            .create_user(CreateUser {
                email: "nope".to_string(),
                ..alice()
            })
            .await;
        assert!(matches!(
            result,
            Err(VisionHubError::Validation(ValidationError::InvalidEmail(_)))
        ));
    }

    #[tokio::test]
    async fn should_delete_user() {
        let svc = make_service();
        let user = svc.create_user(alice()).await.unwrap();

        svc.delete_user(user.id).await.unwrap();

        assert!(svc.get_user(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_return_not_found_when_deleting_unknown_user() {
        let svc = make_service();
        let result = svc.delete_user(UserId::new()).await;
        assert!(matches!(result, Err(VisionHubError::NotFound(_))));
    }
}
