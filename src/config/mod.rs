use std::env;
use std::str::FromStr;

/// Seven days: the longest lifetime S3-compatible stores accept for a presigned URL.
pub const MAX_PRESIGN_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    pub storage: StorageConfig,
}

/// Which object-store backend the gateway talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackendKind {
    S3,
    Memory,
    Disabled,
    /// A `STORAGE_BACKEND` value nothing understands; refused at gateway construction.
    Unrecognized(String),
}

impl FromStr for StorageBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s3" => Ok(Self::S3),
            "memory" => Ok(Self::Memory),
            "disabled" | "none" | "" => Ok(Self::Disabled),
            other => Err(format!("unknown storage backend '{other}'")),
        }
    }
}

/// Object-store settings. Credentials are only read for the S3 backend.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackendKind,
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub public_read: bool,
    pub presign_ttl_secs: u64,
}

impl StorageConfig {
    /// In-process store, used by local development and the test suites.
    pub fn memory(bucket: &str) -> Self {
        Self {
            backend: StorageBackendKind::Memory,
            endpoint: "memory://local".to_string(),
            region: "auto".to_string(),
            bucket: bucket.to_string(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            public_read: false,
            presign_ttl_secs: MAX_PRESIGN_TTL_SECS,
        }
    }

    fn from_env() -> Self {
        let raw_backend = env::var("STORAGE_BACKEND").unwrap_or_default();
        let backend = raw_backend
            .parse()
            .unwrap_or_else(|_| StorageBackendKind::Unrecognized(raw_backend.trim().to_string()));

        Self {
            backend,
            endpoint: env::var("STORAGE_ENDPOINT")
                .unwrap_or_else(|_| "https://storage.railway.app".to_string())
                .trim_end_matches('/')
                .to_string(),
            region: env::var("STORAGE_REGION").unwrap_or_else(|_| "auto".to_string()),
            bucket: env::var("STORAGE_BUCKET").unwrap_or_default(),
            access_key_id: env::var("STORAGE_ACCESS_KEY_ID").unwrap_or_default(),
            secret_access_key: env::var("STORAGE_SECRET_ACCESS_KEY").unwrap_or_default(),
            public_read: env::var("STORAGE_PUBLIC_READ")
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .unwrap_or(false),
            presign_ttl_secs: env::var("STORAGE_PRESIGN_TTL_SECS")
                .unwrap_or_else(|_| MAX_PRESIGN_TTL_SECS.to_string())
                .parse::<u64>()
                .unwrap_or(MAX_PRESIGN_TTL_SECS)
                .clamp(1, MAX_PRESIGN_TTL_SECS),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            host: env::var("BACKEND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("BACKEND_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .unwrap_or_else(|_| (25 * 1024 * 1024).to_string())
                .parse()
                .unwrap_or(25 * 1024 * 1024),
            storage: StorageConfig::from_env(),
        })
    }
}
