use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::storage::ImageRef;

/// One labelled entry of an offer's details. Serializes as a single-key object,
/// e.g. `{"MARQUE": "Nike"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Detail {
    #[serde(rename = "MARQUE")]
    Brand(String),
    #[serde(rename = "TAILLE")]
    Size(String),
    #[serde(rename = "ÉTAT")]
    Condition(String),
    #[serde(rename = "COULEUR")]
    Color(String),
    #[serde(rename = "EMPLACEMENT")]
    City(String),
}

/// Offer record in the document store.
#[derive(Debug, Clone, PartialEq)]
pub struct Offer {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub details: Vec<Detail>,
    pub cover_image: Option<ImageRef>,
    pub images: Vec<ImageRef>,
    pub owner_id: Uuid,
    pub created_at: OffsetDateTime,
}

impl Offer {
    /// External ids of every image the offer references.
    pub fn image_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.images.iter().map(|i| i.external_id.clone()).collect();
        if let Some(cover) = &self.cover_image {
            if !ids.contains(&cover.external_id) {
                ids.push(cover.external_id.clone());
            }
        }
        ids
    }
}

#[derive(Debug, FromRow)]
pub struct OfferRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub details: Json<Vec<Detail>>,
    pub cover_image: Option<Json<ImageRef>>,
    pub images: Json<Vec<ImageRef>>,
    pub owner_id: Uuid,
    pub created_at: OffsetDateTime,
}

impl From<OfferRow> for Offer {
    fn from(r: OfferRow) -> Self {
        Self {
            id: r.id,
            title: r.title,
            description: r.description,
            price: r.price,
            details: r.details.0,
            cover_image: r.cover_image.map(|Json(c)| c),
            images: r.images.0,
            owner_id: r.owner_id,
            created_at: r.created_at,
        }
    }
}
