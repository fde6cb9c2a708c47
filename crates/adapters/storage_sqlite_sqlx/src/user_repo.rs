//! `SQLite` implementation of [`UserRepository`].

use std::future::Future;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use visionhub_app::ports::UserRepository;
use visionhub_domain::error::{NotFoundError, ValidationError, VisionHubError};
use visionhub_domain::id::UserId;
use visionhub_domain::time::parse_rfc3339;
use visionhub_domain::user::{User, UserRole};

use crate::error::{StorageError, decode_error};

struct Wrapper(User);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let role: String = row.try_get("role")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        Ok(Self(User {
            id: UserId::from_str(&id).map_err(decode_error)?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            credential: row.try_get("credential")?,
            full_name: row.try_get("full_name")?,
            role: UserRole::from_str(&role).map_err(decode_error)?,
            created_at: parse_rfc3339(&created_at).map_err(decode_error)?,
            updated_at: parse_rfc3339(&updated_at).map_err(decode_error)?,
        }))
    }
}

const UPSERT: &str = r"
    INSERT INTO users (id, username, email, credential, full_name, role, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        username = excluded.username,
        email = excluded.email,
        credential = excluded.credential,
        full_name = excluded.full_name,
        role = excluded.role,
        updated_at = excluded.updated_at
";

const SELECT_BY_ID: &str = "SELECT * FROM users WHERE id = ?";
const SELECT_BY_USERNAME: &str = "SELECT * FROM users WHERE username = ?";
const SELECT_ALL: &str = "SELECT * FROM users ORDER BY username";
const DELETE_BY_ID: &str = "DELETE FROM users WHERE id = ?";

/// `SQLite`-backed user repository.
#[derive(Clone)]
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl UserRepository for SqliteUserRepository {
    fn save(&self, user: &User) -> impl Future<Output = Result<(), VisionHubError>> + Send {
        let pool = self.pool.clone();
        let user = user.clone();
        async move {
            sqlx::query(UPSERT)
                .bind(user.id.to_string())
                .bind(&user.username)
                .bind(&user.email)
                .bind(&user.credential)
                .bind(&user.full_name)
                .bind(user.role.as_str())
                .bind(user.created_at.to_rfc3339())
                .bind(user.updated_at.to_rfc3339())
                .execute(&pool)
                .await
                .map_err(|err| match err {
                    // `username` is the only unique column besides the key.
                    sqlx::Error::Database(db) if db.is_unique_violation() => {
                        VisionHubError::from(ValidationError::DuplicateUsername(user.username.clone()))
                    }
                    other => VisionHubError::from(StorageError::from(other)),
                })?;

            Ok(())
        }
    }

    fn find_by_id(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<User>, VisionHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(|w| w.0))
        }
    }

    fn find_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<User>, VisionHubError>> + Send {
        let pool = self.pool.clone();
        let username = username.to_string();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_USERNAME)
                .bind(username)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(|w| w.0))
        }
    }

    fn find_all(&self) -> impl Future<Output = Result<Vec<User>, VisionHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    fn delete(&self, id: UserId) -> impl Future<Output = Result<(), VisionHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let result = sqlx::query(DELETE_BY_ID)
                .bind(id.to_string())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            if result.rows_affected() == 0 {
                return Err(NotFoundError {
                    entity: "User",
                    id: id.to_string(),
                }
                .into());
            }
            Ok(())
        }
    }
}
