use serde::Serialize;
use uuid::Uuid;

use crate::auth::repo_types::User;
use crate::error::{AppError, AppResult};
use crate::form::{FormData, UploadedFile};
use crate::storage::ImageRef;

const AVATAR_FIELDS: &[&str] = &["avatar", "picture", "image"];

/// Request body for signup.
#[derive(Debug)]
pub struct SignupInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub newsletter: bool,
    pub avatar: Option<UploadedFile>,
}

/// Request body for login.
#[derive(Debug)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

fn required(form: &FormData, name: &str) -> AppResult<String> {
    match form.text(name).map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(AppError::bad_request(format!("Missing parameter: {name}"))),
    }
}

fn truthy(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "on" | "yes")
}

impl SignupInput {
    pub fn from_form(mut form: FormData) -> AppResult<Self> {
        let username = required(&form, "username")?;
        let email = required(&form, "email")?;
        // Passwords are taken verbatim; only all-blank ones are refused.
        required(&form, "password")?;
        let password = form.owned("password").unwrap_or_default();
        let newsletter = form.text("newsletter").is_some_and(truthy);
        let avatar = form.take_files(AVATAR_FIELDS).into_iter().next();
        Ok(Self {
            username,
            email,
            password,
            newsletter,
            avatar,
        })
    }
}

impl LoginInput {
    pub fn from_form(form: FormData) -> AppResult<Self> {
        let email = required(&form, "email")?;
        required(&form, "password")?;
        Ok(Self {
            email,
            password: form.owned("password").unwrap_or_default(),
        })
    }
}

/// Public part of a user, embedded in auth responses and offer owners.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    pub username: String,
    pub avatar: Option<ImageRef>,
}

impl From<&User> for Account {
    fn from(u: &User) -> Self {
        Self {
            username: u.username.clone(),
            avatar: u.avatar.clone(),
        }
    }
}

/// Response returned after signup or login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub id: Uuid,
    pub token: String,
    pub account: Account,
}

impl From<&User> for AuthResponse {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            token: u.token.clone(),
            account: Account::from(u),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form(v: serde_json::Value) -> FormData {
        FormData::from_json(v).unwrap()
    }

    #[test]
    fn signup_checks_fields_in_order() {
        let err = SignupInput::from_form(form(json!({"email": "", "password": ""}))).unwrap_err();
        assert_eq!(err.to_string(), "Missing parameter: username");

        let err = SignupInput::from_form(form(json!({"username": "bob", "password": "x"})))
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing parameter: email");

        let err = SignupInput::from_form(form(json!({"username": "bob", "email": "b@x.io", "password": "   "})))
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing parameter: password");
    }

    #[test]
    fn signup_reads_newsletter_flag() {
        let input = SignupInput::from_form(form(json!({
            "username": " bob ", "email": "b@x.io", "password": "pw", "newsletter": true
        })))
        .unwrap();
        assert!(input.newsletter);
        assert_eq!(input.username, "bob");
        assert!(input.avatar.is_none());

        let input = SignupInput::from_form(form(json!({
            "username": "bob", "email": "b@x.io", "password": "pw"
        })))
        .unwrap();
        assert!(!input.newsletter);
    }

    #[test]
    fn login_requires_both_fields() {
        assert!(LoginInput::from_form(form(json!({"email": "a@b.c"}))).is_err());
        assert!(LoginInput::from_form(form(json!({"password": "pw"}))).is_err());
        let ok = LoginInput::from_form(form(json!({"email": "a@b.c", "password": " pw "}))).unwrap();
        assert_eq!(ok.password, " pw ");
    }
}
