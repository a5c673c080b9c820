use anyhow::Context;
use async_trait::async_trait;
use sqlx::{types::Json, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::repo_types::{Offer, OfferRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSort {
    Asc,
    Desc,
}

/// Filter shared by the page query and the count query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OfferFilter {
    /// Case-insensitive substring of the title.
    pub title: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
}

impl OfferFilter {
    pub fn matches(&self, offer: &Offer) -> bool {
        if let Some(needle) = &self.title {
            if !offer.title.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        if self.price_min.is_some_and(|min| offer.price < min) {
            return false;
        }
        if self.price_max.is_some_and(|max| offer.price > max) {
            return false;
        }
        true
    }
}

#[async_trait]
pub trait OfferRepo: Send + Sync {
    async fn insert(&self, offer: &Offer) -> anyhow::Result<()>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Offer>>;
    /// Overwrites every mutable field of the stored offer.
    async fn update(&self, offer: &Offer) -> anyhow::Result<()>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<()>;
    /// Total matches, plus the `limit` matches after skipping `offset`.
    async fn search(
        &self,
        filter: &OfferFilter,
        sort: Option<PriceSort>,
        offset: u64,
        limit: u64,
    ) -> anyhow::Result<(u64, Vec<Offer>)>;
}

const OFFER_COLUMNS: &str =
    "id, title, description, price, details, cover_image, images, owner_id, created_at";

#[derive(Clone)]
pub struct PgOfferRepo {
    db: PgPool,
}

impl PgOfferRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &OfferFilter) {
    qb.push(" WHERE TRUE");
    if let Some(title) = &filter.title {
        qb.push(" AND title ILIKE ")
            .push_bind(format!("%{}%", escape_like(title)));
    }
    if let Some(min) = filter.price_min {
        qb.push(" AND price >= ").push_bind(min);
    }
    if let Some(max) = filter.price_max {
        qb.push(" AND price <= ").push_bind(max);
    }
}

#[async_trait]
impl OfferRepo for PgOfferRepo {
    async fn insert(&self, offer: &Offer) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO offers (id, title, description, price, details, cover_image,
                                images, owner_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(offer.id)
        .bind(&offer.title)
        .bind(&offer.description)
        .bind(offer.price)
        .bind(Json(&offer.details))
        .bind(offer.cover_image.as_ref().map(Json))
        .bind(Json(&offer.images))
        .bind(offer.owner_id)
        .bind(offer.created_at)
        .execute(&self.db)
        .await
        .context("insert offer")?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Offer>> {
        let row = sqlx::query_as::<_, OfferRow>(&format!(
            "SELECT {OFFER_COLUMNS} FROM offers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find offer by id")?;
        Ok(row.map(Offer::from))
    }

    async fn update(&self, offer: &Offer) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE offers
               SET title = $2, description = $3, price = $4, details = $5,
                   cover_image = $6, images = $7
             WHERE id = $1
            "#,
        )
        .bind(offer.id)
        .bind(&offer.title)
        .bind(&offer.description)
        .bind(offer.price)
        .bind(Json(&offer.details))
        .bind(offer.cover_image.as_ref().map(Json))
        .bind(Json(&offer.images))
        .execute(&self.db)
        .await
        .context("update offer")?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM offers WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete offer")?;
        Ok(())
    }

    async fn search(
        &self,
        filter: &OfferFilter,
        sort: Option<PriceSort>,
        offset: u64,
        limit: u64,
    ) -> anyhow::Result<(u64, Vec<Offer>)> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM offers");
        push_filter(&mut count_qb, filter);
        let count: i64 = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.db)
            .await
            .context("count offers")?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {OFFER_COLUMNS} FROM offers"));
        push_filter(&mut qb, filter);
        qb.push(match sort {
            Some(PriceSort::Asc) => " ORDER BY price ASC, created_at ASC",
            Some(PriceSort::Desc) => " ORDER BY price DESC, created_at ASC",
            None => " ORDER BY created_at ASC",
        });
        qb.push(" LIMIT ")
            .push_bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .push(" OFFSET ")
            .push_bind(i64::try_from(offset).unwrap_or(i64::MAX));

        let rows = qb
            .build_query_as::<OfferRow>()
            .fetch_all(&self.db)
            .await
            .context("search offers")?;

        Ok((count as u64, rows.into_iter().map(Offer::from).collect()))
    }
}
