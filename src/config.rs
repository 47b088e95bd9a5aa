//! Configuration management for PDF Shelf Server

use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Default upload ceiling: 50MB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Environment configuration that cannot be turned into a [`Config`]
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {name}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub provider: StorageProvider,
    /// Root directory for the local provider
    pub upload_dir: PathBuf,
    pub s3: Option<S3Config>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    Local,
    Minio,
    R2,
    S3,
    B2,
}

impl StorageProvider {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "local" => Some(StorageProvider::Local),
            "minio" => Some(StorageProvider::Minio),
            "r2" => Some(StorageProvider::R2),
            "s3" => Some(StorageProvider::S3),
            "b2" => Some(StorageProvider::B2),
            _ => None,
        }
    }

    pub fn is_object_store(self) -> bool {
        !matches!(self, StorageProvider::Local)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Bearer tokens accepted by the static authenticator, as `(token, user_id)`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    pub tokens: Vec<(String, String)>,
}

impl AuthConfig {
    /// Parse `token=user,token2=user2`; malformed entries are skipped.
    pub fn parse(raw: &str) -> Self {
        let tokens = raw
            .split(',')
            .filter_map(|pair| {
                let (token, user) = pair.split_once('=')?;
                let (token, user) = (token.trim(), user.trim());
                if token.is_empty() || user.is_empty() {
                    tracing::warn!("Ignoring malformed AUTH_TOKENS entry");
                    return None;
                }
                Some((token.to_string(), user.to_string()))
            })
            .collect();

        Self { tokens }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            },
            storage: StorageConfig {
                provider: StorageProvider::Local,
                upload_dir: PathBuf::from("./uploads"),
                s3: None,
            },
            database: DatabaseConfig {
                url: "sqlite:./pdfshelf.db".to_string(),
            },
            auth: AuthConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from any variable source.
    ///
    /// Unset variables fall back to defaults; set but unusable ones are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::Missing(name));

        let provider = match lookup("STORAGE_PROVIDER") {
            Some(value) => StorageProvider::parse(&value).ok_or(ConfigError::Invalid {
                name: "STORAGE_PROVIDER",
                value,
            })?,
            None => defaults.storage.provider,
        };

        let s3 = if provider.is_object_store() {
            Some(S3Config {
                endpoint: required("S3_ENDPOINT")?,
                bucket: required("S3_BUCKET")?,
                access_key: required("S3_ACCESS_KEY")?,
                secret_key: required("S3_SECRET_KEY")?,
                region: lookup("S3_REGION"),
            })
        } else {
            None
        };

        Ok(Config {
            server: ServerConfig {
                host: lookup("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_or("SERVER_PORT", lookup("SERVER_PORT"), defaults.server.port)?,
                max_upload_bytes: parse_or(
                    "MAX_UPLOAD_BYTES",
                    lookup("MAX_UPLOAD_BYTES"),
                    defaults.server.max_upload_bytes,
                )?,
            },
            storage: StorageConfig {
                provider,
                upload_dir: lookup("UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.upload_dir),
                s3,
            },
            database: DatabaseConfig {
                url: lookup("DATABASE_URL").unwrap_or(defaults.database.url),
            },
            auth: AuthConfig::parse(&lookup("AUTH_TOKENS").unwrap_or_default()),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
