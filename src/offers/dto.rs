use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::dto::Account;
use crate::error::{AppError, AppResult};
use crate::form::{FormData, UploadedFile};
use crate::storage::ImageRef;

use super::repo::{OfferFilter, PriceSort};
use super::repo_types::{Detail, Offer};
use super::validation::DetailFields;

pub const PICTURE_FIELDS: &[&str] = &["picture", "pictures", "image"];
pub const PAGE_SIZE: u64 = 10;

fn detail_fields(form: &FormData) -> DetailFields {
    DetailFields {
        brand: form.owned("brand"),
        size: form.owned("size"),
        condition: form.owned("condition"),
        color: form.owned("color"),
        city: form.owned("city"),
    }
}

#[derive(Debug, Default)]
pub struct CreateOfferInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub details: DetailFields,
    pub pictures: Vec<UploadedFile>,
}

impl CreateOfferInput {
    pub fn from_form(mut form: FormData) -> Self {
        Self {
            title: form.owned("title"),
            description: form.owned("description"),
            price: form.owned("price"),
            details: detail_fields(&form),
            pictures: form.take_files(PICTURE_FIELDS),
        }
    }
}

/// Ids of images to drop from an offer, either already split into a list or
/// as a string holding a JSON array.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteImages {
    List(Vec<String>),
    Raw(String),
}

impl DeleteImages {
    pub fn from_form(form: &FormData) -> Option<Self> {
        const NAME: &str = "deleteImages";
        if form.is_list(NAME) {
            Some(Self::List(form.all(NAME)))
        } else {
            form.owned(NAME).map(Self::Raw)
        }
    }

    pub fn resolve(self) -> AppResult<Vec<String>> {
        match self {
            Self::List(ids) => Ok(ids),
            Self::Raw(raw) => serde_json::from_str::<Vec<String>>(&raw)
                .map_err(|_| AppError::bad_request("deleteImages must be a list of image ids")),
        }
    }
}

#[derive(Debug, Default)]
pub struct UpdateOfferInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub details: DetailFields,
    pub delete_images: Option<DeleteImages>,
    pub pictures: Vec<UploadedFile>,
}

impl UpdateOfferInput {
    pub fn from_form(mut form: FormData) -> Self {
        Self {
            title: form.owned("title"),
            description: form.owned("description"),
            price: form.owned("price"),
            details: detail_fields(&form),
            delete_images: DeleteImages::from_form(&form),
            pictures: form.take_files(PICTURE_FIELDS),
        }
    }
}

/// Owner of an offer as shown publicly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnerView {
    pub account: Account,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub details: Vec<Detail>,
    pub cover_image: Option<ImageRef>,
    pub images: Vec<ImageRef>,
    pub owner: Option<OwnerView>,
}

impl OfferView {
    pub fn new(offer: Offer, owner: Option<OwnerView>) -> Self {
        Self {
            id: offer.id,
            title: offer.title,
            description: offer.description,
            price: offer.price,
            details: offer.details,
            cover_image: offer.cover_image,
            images: offer.images,
            owner,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResult {
    pub count: u64,
    pub offers: Vec<OfferView>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub message: String,
}

/// Raw `GET /offers` query string.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub title: Option<String>,
    pub price_min: Option<String>,
    pub price_max: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub filter: OfferFilter,
    pub sort: Option<PriceSort>,
    /// 1-based.
    pub page: u64,
}

fn number(raw: Option<&str>) -> Option<f64> {
    raw?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

impl From<SearchParams> for SearchQuery {
    fn from(p: SearchParams) -> Self {
        let title = p.title.filter(|t| !t.is_empty());
        let sort = match p.sort.as_deref() {
            Some("price-asc") => Some(PriceSort::Asc),
            Some("price-desc") => Some(PriceSort::Desc),
            _ => None,
        };
        let page = p
            .page
            .as_deref()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(1) as u64;
        Self {
            filter: OfferFilter {
                title,
                price_min: number(p.price_min.as_deref()),
                price_max: number(p.price_max.as_deref()),
            },
            sort,
            page,
        }
    }
}

impl SearchQuery {
    /// Rows to skip; saturates so absurd page numbers just yield an empty page.
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(PAGE_SIZE)
    }
}
