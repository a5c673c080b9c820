use serde::Serialize;
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::storage::ImageRef;

/// User record in the document store.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String, // trimmed, lowercased
    pub username: String,
    pub avatar: Option<ImageRef>,
    pub newsletter: bool,
    #[serde(skip_serializing)]
    pub token: String, // bearer credential, issued once
    #[serde(skip_serializing)]
    pub password_hash: String, // base64(sha256(password || salt))
    #[serde(skip_serializing)]
    pub password_salt: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub avatar: Option<Json<ImageRef>>,
    pub newsletter: bool,
    pub token: String,
    pub password_hash: String,
    pub password_salt: String,
    pub created_at: OffsetDateTime,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            email: r.email,
            username: r.username,
            avatar: r.avatar.map(|Json(a)| a),
            newsletter: r.newsletter,
            token: r.token,
            password_hash: r.password_hash,
            password_salt: r.password_salt,
            created_at: r.created_at,
        }
    }
}
