//! User — an account known to the platform.
//!
//! Credentials are opaque: whatever the external auth collaborator hands in
//! is stored as-is and never serialized back out.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, VisionHubError};
use crate::id::UserId;
use crate::time::{Timestamp, now};

/// Coarse permission level of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    User,
}

impl UserRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(ValidationError::InvalidRole(other.to_string())),
        }
    }
}

/// A platform account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub credential: String,
    pub full_name: Option<String>,
    pub role: UserRole,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    /// Create a builder for constructing a [`User`].
    #[must_use]
    pub fn builder() -> UserBuilder {
        UserBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`VisionHubError::Validation`] when the username or credential
    /// is empty, or the email has no `@`.
    pub fn validate(&self) -> Result<(), VisionHubError> {
        if self.username.trim().is_empty() {
            return Err(ValidationError::EmptyUsername.into());
        }
        if !self.email.contains('@') {
            return Err(ValidationError::InvalidEmail(self.email.clone()).into());
        }
        if self.credential.is_empty() {
            return Err(ValidationError::EmptyCredential.into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`User`].
#[derive(Debug, Default)]
pub struct UserBuilder {
    id: Option<UserId>,
    username: Option<String>,
    email: Option<String>,
    credential: Option<String>,
    full_name: Option<String>,
    role: Option<UserRole>,
}

impl UserBuilder {
    #[must_use]
    pub fn id(mut self, id: UserId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    #[must_use]
    pub fn full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    #[must_use]
    pub fn role(mut self, role: UserRole) -> Self {
        self.role = Some(role);
        self
    }

    /// Consume the builder, validate, and return a [`User`].
    ///
    /// # Errors
    ///
    /// Returns [`VisionHubError::Validation`] if any invariant fails.
    pub fn build(self) -> Result<User, VisionHubError> {
        let ts = now();
        let user = User {
            id: self.id.unwrap_or_default(),
            username: self.username.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            credential: self.credential.unwrap_or_default(),
            full_name: self.full_name,
            role: self.role.unwrap_or_default(),
            created_at: ts,
            updated_at: ts,
        };
        user.validate()?;
        Ok(user)
    }
}
