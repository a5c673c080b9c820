use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{AuthResponse, LoginInput, SignupInput},
        services,
    },
    error::AppResult,
    form::FormData,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/user/signup", post(signup))
        .route("/user/login", post(login))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // avatar upload
}

#[instrument(skip(state, form))]
pub async fn signup(
    State(state): State<AppState>,
    form: FormData,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let input = SignupInput::from_form(form)?;
    let res = services::signup(&state, input).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[instrument(skip(state, form))]
pub async fn login(State(state): State<AppState>, form: FormData) -> AppResult<Json<AuthResponse>> {
    let input = LoginInput::from_form(form)?;
    Ok(Json(services::login(&state, input).await?))
}
