use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::form::UploadedFile;
use crate::state::AppState;
use crate::storage::{image_format, ImageRef};

pub const AVATAR_NAMESPACE: &str = "users/avatars";

pub fn offer_namespace(offer_id: Uuid) -> String {
    format!("offers/{offer_id}")
}

pub fn ensure_supported(file: &UploadedFile) -> AppResult<&'static str> {
    image_format(&file.content_type).ok_or_else(|| {
        AppError::UnsupportedMediaType(format!(
            "unsupported image type {}, expected jpeg, png, webp or gif",
            file.content_type
        ))
    })
}

pub async fn upload_one(
    st: &AppState,
    file: UploadedFile,
    namespace: &str,
) -> AppResult<ImageRef> {
    ensure_supported(&file)?;
    let img = st
        .images
        .upload(file.body, &file.content_type, namespace)
        .await?;
    Ok(img)
}

/// Uploads `files` one after another into `namespace`, stopping at the first
/// failure. Images stored before the failure stay in the store unless
/// `upload_rollback` is enabled, in which case they are deleted again.
pub async fn upload_all(
    st: &AppState,
    files: Vec<UploadedFile>,
    namespace: &str,
) -> AppResult<Vec<ImageRef>> {
    let mut uploaded = Vec::with_capacity(files.len());
    for file in files {
        match upload_one(st, file, namespace).await {
            Ok(img) => uploaded.push(img),
            Err(e) => {
                if !uploaded.is_empty() {
                    if st.config.media.upload_rollback {
                        let ids: Vec<String> =
                            uploaded.iter().map(|i: &ImageRef| i.external_id.clone()).collect();
                        discard(st, &ids, "rollback of partial upload").await;
                    } else {
                        warn!(
                            namespace,
                            orphaned = uploaded.len(),
                            "upload failed partway; earlier images remain in the store"
                        );
                    }
                }
                return Err(e);
            }
        }
    }
    info!(namespace, count = uploaded.len(), "images uploaded");
    Ok(uploaded)
}

/// Best-effort bulk delete. Failures are logged and swallowed.
pub async fn discard(st: &AppState, external_ids: &[String], reason: &str) {
    if external_ids.is_empty() {
        return;
    }
    if let Err(e) = st.images.delete_many(external_ids).await {
        warn!(error = %format!("{e:#}"), reason, count = external_ids.len(), "image cleanup failed");
    }
}

#[cfg(test)]
mod image_tests {
    use std::sync::Arc;

    use super::*;
    use crate::memory::MemoryImageStore;

    fn png(n: u8) -> UploadedFile {
        UploadedFile::new("picture", "image/png", vec![n; 4])
    }

    #[test]
    fn ensure_supported_rejects_other_media_types() {
        assert_eq!(ensure_supported(&png(1)).unwrap(), "png");
        let pdf = UploadedFile::new("picture", "application/pdf", vec![0]);
        assert!(matches!(
            ensure_supported(&pdf),
            Err(AppError::UnsupportedMediaType(_))
        ));
    }

    #[tokio::test]
    async fn upload_all_keeps_input_order() {
        let images = Arc::new(MemoryImageStore::default());
        let st = AppState::fake_with(images.clone(), false);
        let refs = upload_all(&st, vec![png(1), png(2), png(3)], "offers/x")
            .await
            .unwrap();
        assert_eq!(refs.len(), 3);
        assert_eq!(
            images.ids_in("offers/x").await,
            refs.iter().map(|r| r.external_id.clone()).collect::<Vec<_>>()
        );
        assert_eq!(refs[1].size_bytes, 4);
    }

    #[tokio::test]
    async fn partial_upload_leaves_earlier_images_without_rollback() {
        let images = Arc::new(MemoryImageStore::default());
        let st = AppState::fake_with(images.clone(), false);
        let bad = UploadedFile::new("picture", "text/plain", "x");
        let err = upload_all(&st, vec![png(1), bad, png(3)], "offers/y")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedMediaType(_)));
        // accepted inconsistency: the first image is orphaned in the store
        assert_eq!(images.ids_in("offers/y").await.len(), 1);
    }

    #[tokio::test]
    async fn partial_upload_is_compensated_with_rollback() {
        let images = Arc::new(MemoryImageStore::default());
        let st = AppState::fake_with(images.clone(), true);
        let bad = UploadedFile::new("picture", "text/plain", "x");
        let err = upload_all(&st, vec![png(1), png(2), bad], "offers/z")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedMediaType(_)));
        assert!(images.ids_in("offers/z").await.is_empty());
    }

    #[tokio::test]
    async fn discard_swallows_store_failures() {
        let images = Arc::new(MemoryImageStore::default());
        let st = AppState::fake_with(images.clone(), false);
        let img = upload_one(&st, png(1), "offers/w").await.unwrap();
        images.fail_deletes(true);
        discard(&st, &[img.external_id.clone()], "test").await;
        assert_eq!(images.len().await, 1);
    }
}
