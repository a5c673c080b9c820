use anyhow::Context;
use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use crate::auth::repo_types::{User, UserRow};
use crate::error::StoreError;

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_token(&self, token: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    /// Insert a new user; a taken email is reported as [`StoreError::Duplicate`].
    async fn insert(&self, user: &User) -> Result<(), StoreError>;
}

const USER_COLUMNS: &str =
    "id, email, username, avatar, newsletter, token, password_hash, password_salt, created_at";

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_one(&self, column: &str, value: impl ToString) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value.to_string())
            .fetch_optional(&self.db)
            .await
            .with_context(|| format!("find user by {column}"))?;
        Ok(row.map(User::from))
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.find_one("email", email).await
    }

    async fn find_by_token(&self, token: &str) -> anyhow::Result<Option<User>> {
        self.find_one("token", token).await
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(row.map(User::from))
    }

    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        let res = sqlx::query(
            r#"
            INSERT INTO users (id, email, username, avatar, newsletter, token,
                               password_hash, password_salt, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(user.avatar.as_ref().map(Json))
        .bind(user.newsletter)
        .bind(&user.token)
        .bind(&user.password_hash)
        .bind(&user.password_salt)
        .bind(user.created_at)
        .execute(&self.db)
        .await;

        match res {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                let what = match db.constraint() {
                    Some("users_token_key") => "token",
                    _ => "email",
                };
                Err(StoreError::Duplicate(what.into()))
            }
            Err(e) => Err(StoreError::Other(anyhow::Error::new(e).context("insert user"))),
        }
    }
}
