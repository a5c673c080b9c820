use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::CurrentUser,
    error::AppResult,
    form::FormData,
    state::AppState,
};

use super::dto::{
    CreateOfferInput, DeletedResponse, OfferView, SearchParams, SearchResult, UpdateOfferInput,
};
use super::services;

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/offers", get(list_offers))
        .route("/offers/:id", get(get_offer))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/offer/publish", post(publish_offer))
        .route("/offer/:id", put(update_offer).delete(delete_offer))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn list_offers(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<SearchResult>> {
    Ok(Json(services::search_offers(&state, params.into()).await?))
}

#[instrument(skip(state))]
pub async fn get_offer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<OfferView>> {
    Ok(Json(services::get_offer(&state, &id).await?))
}

/// POST /offer/publish (multipart: fields + picture files)
#[instrument(skip(state, user, form), fields(user_id = %user.id))]
pub async fn publish_offer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    form: FormData,
) -> AppResult<(StatusCode, HeaderMap, Json<OfferView>)> {
    let input = CreateOfferInput::from_form(form);
    let offer = services::create_offer(&state, &user, input).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/offers/{}", offer.id)) {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(offer)))
}

#[instrument(skip(state, user, form), fields(user_id = %user.id))]
pub async fn update_offer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    form: FormData,
) -> AppResult<Json<OfferView>> {
    let input = UpdateOfferInput::from_form(form);
    Ok(Json(services::update_offer(&state, &user, &id, input).await?))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_offer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<DeletedResponse>> {
    Ok(Json(services::delete_offer(&state, &user, &id).await?))
}
