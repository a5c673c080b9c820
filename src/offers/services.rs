use std::collections::HashMap;

use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::auth::dto::Account;
use crate::auth::repo_types::User;
use crate::error::{AppError, AppResult};
use crate::images::services::{ensure_supported, offer_namespace, upload_all};
use crate::state::AppState;

use super::dto::{
    CreateOfferInput, DeleteImages, DeletedResponse, OfferView, OwnerView, SearchQuery,
    SearchResult, UpdateOfferInput, PAGE_SIZE,
};
use super::repo_types::Offer;
use super::validation::{clamp_description, clamp_title, parse_price};

fn parse_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::bad_request("Invalid offer id"))
}

fn owner_of(user: &User) -> OwnerView {
    OwnerView {
        account: Account::from(user),
    }
}

async fn find_offer(st: &AppState, raw_id: &str) -> AppResult<Offer> {
    let id = parse_id(raw_id)?;
    st.offers
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("Offer not found"))
}

/// Loads an offer the actor is allowed to modify.
async fn find_owned(st: &AppState, actor: &User, raw_id: &str) -> AppResult<Offer> {
    let offer = find_offer(st, raw_id).await?;
    if offer.owner_id != actor.id {
        warn!(offer_id = %offer.id, user_id = %actor.id, "write attempt by non-owner");
        return Err(AppError::Forbidden(
            "Only the owner can modify this offer".into(),
        ));
    }
    Ok(offer)
}

#[instrument(skip(st, owner, input), fields(owner_id = %owner.id))]
pub async fn create_offer(
    st: &AppState,
    owner: &User,
    input: CreateOfferInput,
) -> AppResult<OfferView> {
    let title = clamp_title(input.title.as_deref().unwrap_or_default())?;
    let description = clamp_description(input.description.as_deref().unwrap_or_default());
    let price = parse_price(input.price.as_deref().unwrap_or_default())?;
    let details = input.details.build();
    if input.pictures.is_empty() {
        return Err(AppError::bad_request("At least one picture is required"));
    }

    // The offer id names the image namespace, so the record goes in first.
    let mut offer = Offer {
        id: Uuid::new_v4(),
        title,
        description,
        price,
        details,
        cover_image: None,
        images: Vec::new(),
        owner_id: owner.id,
        created_at: OffsetDateTime::now_utc(),
    };
    st.offers.insert(&offer).await?;

    let images = upload_all(st, input.pictures, &offer_namespace(offer.id)).await?;
    offer.cover_image = images.first().cloned();
    offer.images = images;
    st.offers.update(&offer).await?;

    info!(offer_id = %offer.id, images = offer.images.len(), "offer published");
    Ok(OfferView::new(offer, Some(owner_of(owner))))
}

#[instrument(skip(st, actor, input), fields(user_id = %actor.id))]
pub async fn update_offer(
    st: &AppState,
    actor: &User,
    raw_id: &str,
    input: UpdateOfferInput,
) -> AppResult<OfferView> {
    let mut offer = find_owned(st, actor, raw_id).await?;

    // Everything is validated before the image store is touched.
    if let Some(title) = &input.title {
        offer.title = clamp_title(title)?;
    }
    if let Some(description) = &input.description {
        offer.description = clamp_description(description);
    }
    if let Some(price) = &input.price {
        offer.price = parse_price(price)?;
    }
    let delete_ids = input
        .delete_images
        .map(DeleteImages::resolve)
        .transpose()?
        .unwrap_or_default();
    for picture in &input.pictures {
        ensure_supported(picture)?;
    }

    if input.details.any() {
        offer.details = input.details.build();
    }

    if !delete_ids.is_empty() {
        let (targeted, foreign): (Vec<String>, Vec<String>) = delete_ids
            .into_iter()
            .partition(|id| offer.images.iter().any(|img| &img.external_id == id));
        if !foreign.is_empty() {
            debug!(offer_id = %offer.id, ignored = ?foreign, "deleteImages ids not on this offer");
        }
        if !targeted.is_empty() {
            st.images.delete_many(&targeted).await?;
            offer.images.retain(|img| !targeted.contains(&img.external_id));
            let cover_removed = offer
                .cover_image
                .as_ref()
                .is_some_and(|c| targeted.contains(&c.external_id));
            if cover_removed {
                offer.cover_image = offer.images.first().cloned();
            }
        }
    }

    if !input.pictures.is_empty() {
        let added = upload_all(st, input.pictures, &offer_namespace(offer.id)).await?;
        if offer.cover_image.is_none() {
            offer.cover_image = added.first().cloned();
        }
        offer.images.extend(added);
    }

    st.offers.update(&offer).await?;
    info!(offer_id = %offer.id, "offer updated");
    Ok(OfferView::new(offer, Some(owner_of(actor))))
}

#[instrument(skip(st, actor), fields(user_id = %actor.id))]
pub async fn delete_offer(st: &AppState, actor: &User, raw_id: &str) -> AppResult<DeletedResponse> {
    let offer = find_owned(st, actor, raw_id).await?;

    let ids = offer.image_ids();
    if !ids.is_empty() {
        if let Err(e) = st.images.delete_many(&ids).await {
            warn!(offer_id = %offer.id, error = %format!("{e:#}"), "offer images not deleted");
        }
    }
    if let Err(e) = st.images.delete_namespace(&offer_namespace(offer.id)).await {
        warn!(offer_id = %offer.id, error = %format!("{e:#}"), "offer namespace not deleted");
    }

    st.offers.delete(offer.id).await?;
    info!(offer_id = %offer.id, "offer deleted");
    Ok(DeletedResponse {
        message: "Offer deleted".into(),
    })
}

async fn owner_view(st: &AppState, owner_id: Uuid) -> AppResult<Option<OwnerView>> {
    let owner = st.users.find_by_id(owner_id).await?;
    if owner.is_none() {
        warn!(%owner_id, "offer owner missing");
    }
    Ok(owner.as_ref().map(owner_of))
}

#[instrument(skip(st))]
pub async fn get_offer(st: &AppState, raw_id: &str) -> AppResult<OfferView> {
    let offer = find_offer(st, raw_id).await?;
    let owner = owner_view(st, offer.owner_id).await?;
    Ok(OfferView::new(offer, owner))
}

#[instrument(skip(st))]
pub async fn search_offers(st: &AppState, query: SearchQuery) -> AppResult<SearchResult> {
    let (count, offers) = st
        .offers
        .search(&query.filter, query.sort, query.offset(), PAGE_SIZE)
        .await?;

    let mut owners: HashMap<Uuid, Option<OwnerView>> = HashMap::new();
    let mut views = Vec::with_capacity(offers.len());
    for offer in offers {
        let owner = match owners.get(&offer.owner_id) {
            Some(cached) => cached.clone(),
            None => {
                let fetched = owner_view(st, offer.owner_id).await?;
                owners.insert(offer.owner_id, fetched.clone());
                fetched
            }
        };
        views.push(OfferView::new(offer, owner));
    }

    debug!(count, page = query.page, returned = views.len(), "offers searched");
    Ok(SearchResult {
        count,
        offers: views,
    })
}
