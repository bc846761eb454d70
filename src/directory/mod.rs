//! User Directory
//!
//! Account lookups owned by the surrounding application. The engine only reads.

use async_trait::async_trait;
use uuid::Uuid;

use crate::database::models::User;
use crate::database::queries::Queries;
use crate::database::{self, Database};
use crate::error::ContractError;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ContractError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, ContractError>;
}

/// Canonical form used for email lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Directory backed by the `users` table.
#[derive(Clone)]
pub struct SqlUserDirectory {
    database: Database,
}

impl SqlUserDirectory {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Create an account. Used by the surrounding application and by tests.
    pub async fn register_user(
        &self,
        email: &str,
        full_name: Option<&str>,
    ) -> Result<User, ContractError> {
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(ContractError::ValidationError(format!(
                "Invalid email address: {:?}",
                email
            )));
        }

        let user = User {
            id: Uuid::new_v4(),
            email,
            full_name: full_name.map(str::to_string),
            created_at: database::now(),
        };
        let mut conn = self.database.pool().acquire().await?;
        if Queries::find_user_by_email(&mut conn, &user.email).await?.is_some() {
            return Err(ContractError::ConflictError(format!(
                "An account for {} already exists",
                user.email
            )));
        }
        Queries::insert_user(&mut conn, &user).await?;
        Ok(user)
    }
}

#[async_trait]
impl UserDirectory for SqlUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ContractError> {
        let mut conn = self.database.pool().acquire().await?;
        Queries::find_user_by_email(&mut conn, &normalize_email(email)).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, ContractError> {
        let mut conn = self.database.pool().acquire().await?;
        Queries::find_user_by_id(&mut conn, id).await
    }
}
