use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::dto::{AuthResponse, LoginInput, SignupInput};
use crate::auth::password::{generate_auth_token, generate_salt, hash_password, verify_password};
use crate::auth::repo_types::User;
use crate::error::{AppError, AppResult, StoreError};
use crate::images::services::{discard, upload_one, AVATAR_NAMESPACE};
use crate::state::AppState;

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[instrument(skip(st, input), fields(email = %input.email))]
pub async fn signup(st: &AppState, input: SignupInput) -> AppResult<AuthResponse> {
    let email = normalize_email(&input.email);

    if st.users.find_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(AppError::Conflict("This email already has an account".into()));
    }

    let salt = generate_salt();
    let token = generate_auth_token();
    let password_hash = hash_password(&input.password, &salt);

    let avatar = match input.avatar {
        Some(file) => Some(upload_one(st, file, AVATAR_NAMESPACE).await?),
        None => None,
    };

    let user = User {
        id: Uuid::new_v4(),
        email,
        username: input.username.trim().to_string(),
        avatar,
        newsletter: input.newsletter,
        token,
        password_hash,
        password_salt: salt,
        created_at: OffsetDateTime::now_utc(),
    };

    if let Err(e) = st.users.insert(&user).await {
        if let Some(avatar) = &user.avatar {
            discard(st, &[avatar.external_id.clone()], "signup aborted").await;
        }
        return Err(match e {
            StoreError::Duplicate(_) => {
                warn!(email = %user.email, "email registered concurrently");
                AppError::Conflict("This email already has an account".into())
            }
            other => other.into(),
        });
    }

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(AuthResponse::from(&user))
}

#[instrument(skip(st, input), fields(email = %input.email))]
pub async fn login(st: &AppState, input: LoginInput) -> AppResult<AuthResponse> {
    let email = normalize_email(&input.email);

    let Some(user) = st.users.find_by_email(&email).await? else {
        warn!(%email, "login unknown email");
        return Err(AppError::bad_request("No account for this email, please sign up"));
    };

    if !verify_password(&input.password, &user.password_salt, &user.password_hash) {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::bad_request("Incorrect password"));
    }

    info!(user_id = %user.id, "user logged in");
    Ok(AuthResponse::from(&user))
}
