use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Base of the durable URLs handed back to clients.
    pub public_url: String,
    /// Prefix applied to every namespace.
    pub root_folder: String,
    /// Delete images already uploaded by a request when a later upload in it fails.
    pub upload_rollback: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub media: MediaConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;

        let endpoint = std::env::var("MINIO_ENDPOINT")?;
        let bucket = std::env::var("MINIO_BUCKET")?;
        let public_url = std::env::var("MEDIA_PUBLIC_URL")
            .unwrap_or_else(|_| format!("{}/{}", endpoint.trim_end_matches('/'), bucket));
        let media = MediaConfig {
            access_key: std::env::var("MINIO_ACCESS_KEY")?,
            secret_key: std::env::var("MINIO_SECRET_KEY")?,
            region: std::env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".into()),
            root_folder: std::env::var("MEDIA_ROOT_FOLDER").unwrap_or_else(|_| "offerbay".into()),
            upload_rollback: std::env::var("UPLOAD_ROLLBACK")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(false),
            endpoint,
            bucket,
            public_url,
        };

        Ok(Self {
            database_url,
            media,
        })
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
