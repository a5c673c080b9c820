use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    types::{Delete, ObjectIdentifier},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::MediaConfig;

/// Metadata of an image hosted by the image store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub external_id: String,
    pub url: String,
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_version: Option<String>,
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Store `body` under `namespace` and describe the stored object.
    async fn upload(&self, body: Bytes, content_type: &str, namespace: &str)
        -> anyhow::Result<ImageRef>;
    async fn delete_many(&self, external_ids: &[String]) -> anyhow::Result<()>;
    /// Fails when the namespace still holds images.
    async fn delete_namespace(&self, namespace: &str) -> anyhow::Result<()>;
}

/// File extension for the media types images may be uploaded with.
pub fn image_format(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

#[derive(Clone)]
pub struct S3ImageStore {
    client: Client,
    bucket: String,
    public_url: String,
    root: String,
}

impl S3ImageStore {
    pub async fn new(cfg: &MediaConfig) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
            public_url: cfg.public_url.trim_end_matches('/').to_string(),
            root: cfg.root_folder.trim_matches('/').to_string(),
        })
    }

    fn prefix(&self, namespace: &str) -> String {
        let namespace = namespace.trim_matches('/');
        if self.root.is_empty() {
            namespace.to_string()
        } else {
            format!("{}/{}", self.root, namespace)
        }
    }
}

#[async_trait]
impl ImageStore for S3ImageStore {
    async fn upload(
        &self,
        body: Bytes,
        content_type: &str,
        namespace: &str,
    ) -> anyhow::Result<ImageRef> {
        let format = image_format(content_type)
            .with_context(|| format!("unsupported media type {content_type}"))?;
        let key = format!("{}/{}.{}", self.prefix(namespace), Uuid::new_v4(), format);
        let size_bytes = body.len() as u64;

        let out = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .with_context(|| format!("s3 put_object {key}"))?;

        let store_version = out
            .version_id()
            .or_else(|| out.e_tag())
            .map(|v| v.trim_matches('"').to_string());

        debug!(%key, size_bytes, "image stored");
        Ok(ImageRef {
            url: format!("{}/{}", self.public_url, key),
            external_id: key,
            format: format.to_string(),
            width: None,
            height: None,
            size_bytes,
            store_version,
        })
    }

    async fn delete_many(&self, external_ids: &[String]) -> anyhow::Result<()> {
        if external_ids.is_empty() {
            return Ok(());
        }
        let objects = external_ids
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .context("build object identifiers")?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .context("build delete request")?;

        self.client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .context("s3 delete_objects")?;
        Ok(())
    }

    async fn delete_namespace(&self, namespace: &str) -> anyhow::Result<()> {
        let prefix = format!("{}/", self.prefix(namespace));
        let listed = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&prefix)
            .max_keys(1)
            .send()
            .await
            .context("s3 list_objects_v2")?;
        if !listed.contents().is_empty() {
            anyhow::bail!("namespace {namespace} is not empty");
        }

        // Folder marker left behind by some S3 consoles.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&prefix)
            .send()
            .await
            .context("s3 delete_object")?;
        Ok(())
    }
}
