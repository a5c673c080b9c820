//! In-process implementations of the store seams, used by `AppState::fake()`.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::repo::UserRepo;
use crate::auth::repo_types::User;
use crate::error::StoreError;
use crate::offers::repo::{OfferFilter, OfferRepo, PriceSort};
use crate::offers::repo_types::Offer;
use crate::storage::{image_format, ImageRef, ImageStore};

#[derive(Default)]
pub struct MemoryUserRepo {
    users: RwLock<Vec<User>>,
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_token(&self, token: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.token == token).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate("email".into()));
        }
        if users.iter().any(|u| u.token == user.token) {
            return Err(StoreError::Duplicate("token".into()));
        }
        users.push(user.clone());
        Ok(())
    }
}

/// Keeps offers in insertion order, which is the unsorted search order.
#[derive(Default)]
pub struct MemoryOfferRepo {
    offers: RwLock<Vec<Offer>>,
}

#[async_trait]
impl OfferRepo for MemoryOfferRepo {
    async fn insert(&self, offer: &Offer) -> anyhow::Result<()> {
        let mut offers = self.offers.write().await;
        anyhow::ensure!(
            offers.iter().all(|o| o.id != offer.id),
            "offer {} already stored",
            offer.id
        );
        offers.push(offer.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Offer>> {
        let offers = self.offers.read().await;
        Ok(offers.iter().find(|o| o.id == id).cloned())
    }

    async fn update(&self, offer: &Offer) -> anyhow::Result<()> {
        let mut offers = self.offers.write().await;
        if let Some(slot) = offers.iter_mut().find(|o| o.id == offer.id) {
            *slot = offer.clone();
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<()> {
        self.offers.write().await.retain(|o| o.id != id);
        Ok(())
    }

    async fn search(
        &self,
        filter: &OfferFilter,
        sort: Option<PriceSort>,
        offset: u64,
        limit: u64,
    ) -> anyhow::Result<(u64, Vec<Offer>)> {
        let offers = self.offers.read().await;
        let mut hits: Vec<Offer> = offers.iter().filter(|o| filter.matches(o)).cloned().collect();
        match sort {
            Some(PriceSort::Asc) => hits.sort_by(|a, b| a.price.total_cmp(&b.price)),
            Some(PriceSort::Desc) => hits.sort_by(|a, b| b.price.total_cmp(&a.price)),
            None => {}
        }
        let count = hits.len() as u64;
        let page = hits
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect();
        Ok((count, page))
    }
}

/// Image store keeping objects in memory. Deletions can be made to fail to
/// exercise best-effort cleanup paths.
#[derive(Default)]
pub struct MemoryImageStore {
    objects: RwLock<Vec<(String, String)>>, // (namespace, external id)
    fail_deletes: AtomicBool,
}

impl MemoryImageStore {
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub async fn ids_in(&self, namespace: &str) -> Vec<String> {
        self.objects
            .read()
            .await
            .iter()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, id)| id.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn upload(
        &self,
        body: Bytes,
        content_type: &str,
        namespace: &str,
    ) -> anyhow::Result<ImageRef> {
        let format = image_format(content_type)
            .ok_or_else(|| anyhow::anyhow!("unsupported media type {content_type}"))?;
        let external_id = format!("{}/{}.{}", namespace, Uuid::new_v4(), format);
        self.objects
            .write()
            .await
            .push((namespace.to_string(), external_id.clone()));
        Ok(ImageRef {
            url: format!("https://images.local/{external_id}"),
            external_id,
            format: format.to_string(),
            width: None,
            height: None,
            size_bytes: body.len() as u64,
            store_version: Some("1".into()),
        })
    }

    async fn delete_many(&self, external_ids: &[String]) -> anyhow::Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            anyhow::bail!("image store unavailable");
        }
        self.objects
            .write()
            .await
            .retain(|(_, id)| !external_ids.contains(id));
        Ok(())
    }

    async fn delete_namespace(&self, namespace: &str) -> anyhow::Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            anyhow::bail!("image store unavailable");
        }
        let objects = self.objects.read().await;
        if objects.iter().any(|(ns, _)| ns == namespace) {
            anyhow::bail!("namespace {namespace} is not empty");
        }
        Ok(())
    }
}
