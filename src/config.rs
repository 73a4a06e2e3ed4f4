//! Environment-sourced configuration.
//!
//! All settings come from environment variables. A `.env` file is loaded
//! first (see [`load_env_file`]); variables already present in the process
//! environment take precedence over the file.
//!
//! | Variable | Required | Default |
//! |----------|----------|---------|
//! | `BIND_ADDR` | no | `0.0.0.0:5000` |
//! | `APPWRITE_ENDPOINT` | yes | |
//! | `APPWRITE_PROJECT_ID` | yes | |
//! | `APPWRITE_API_KEY` | yes | |
//! | `APPWRITE_DATABASE_ID` | yes | |
//! | `APPWRITE_POST_COLLECTION_ID` | yes | |
//! | `APPWRITE_DETAILS_COLLECTION_ID` | yes | |
//! | `APPWRITE_STORAGE_BUCKET_ID` | yes | |
//! | `AWS_REGION` | no | `us-east-1` |
//! | `AWS_ACCESS_KEY_ID` | yes | |
//! | `AWS_SECRET_ACCESS_KEY` | yes | |
//! | `AWS_SESSION_TOKEN` | no | |
//! | `REKOGNITION_ENDPOINT` | no | regional AWS endpoint |
//! | `REKOGNITION_MAX_LABELS` | no | `10` |
//! | `REKOGNITION_MIN_CONFIDENCE` | no | `75` |
//! | `SEARCH_LIMIT` | no | `25` |
//! | `MAX_UPLOAD_BYTES` | no | `10485760` |
//! | `HTTP_TIMEOUT_SECS` | no | `30` |

use anyhow::{bail, Context, Result};
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

use crate::sigv4::AwsCredentials;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub appwrite: AppwriteConfig,
    pub aws: AwsConfig,
    pub labeling: LabelingConfig,
    pub search: SearchConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct AppwriteConfig {
    /// API base URL including the version segment, without trailing slash.
    pub endpoint: String,
    pub project_id: String,
    pub api_key: String,
    pub database_id: String,
    pub post_collection_id: String,
    pub details_collection_id: String,
    pub bucket_id: String,
}

#[derive(Debug, Clone)]
pub struct AwsConfig {
    pub region: String,
    pub credentials: AwsCredentials,
    /// Custom Rekognition endpoint (LocalStack etc.).
    pub rekognition_endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LabelingConfig {
    pub max_labels: u32,
    pub min_confidence: f32,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

const DEFAULT_BIND: &str = "0.0.0.0:5000";
const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_MAX_LABELS: u32 = 10;
const DEFAULT_MIN_CONFIDENCE: f32 = 75.0;
const DEFAULT_SEARCH_LIMIT: usize = 25;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Load variables from a `.env` file.
///
/// With an explicit `path` the file must exist. Without one, `./.env` is
/// loaded if present and silently skipped otherwise.
pub fn load_env_file(path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("Failed to load env file: {}", path.display()))?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }
    Ok(())
}

/// Log filter from `RUST_LOG`, defaulting to `info`.
///
/// Call after [`load_env_file`] so a `RUST_LOG` set in the env file applies.
pub fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &str| {
            get(key).with_context(|| format!("{} environment variable not set", key))
        };

        let config = Config {
            server: ServerConfig {
                bind: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND.to_string()),
                max_upload_bytes: parse_or(
                    get("MAX_UPLOAD_BYTES"),
                    "MAX_UPLOAD_BYTES",
                    DEFAULT_MAX_UPLOAD_BYTES,
                )?,
            },
            appwrite: AppwriteConfig {
                endpoint: required("APPWRITE_ENDPOINT")?
                    .trim_end_matches('/')
                    .to_string(),
                project_id: required("APPWRITE_PROJECT_ID")?,
                api_key: required("APPWRITE_API_KEY")?,
                database_id: required("APPWRITE_DATABASE_ID")?,
                post_collection_id: required("APPWRITE_POST_COLLECTION_ID")?,
                details_collection_id: required("APPWRITE_DETAILS_COLLECTION_ID")?,
                bucket_id: required("APPWRITE_STORAGE_BUCKET_ID")?,
            },
            aws: AwsConfig {
                region: get("AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
                credentials: AwsCredentials {
                    access_key_id: required("AWS_ACCESS_KEY_ID")?,
                    secret_access_key: required("AWS_SECRET_ACCESS_KEY")?,
                    session_token: get("AWS_SESSION_TOKEN"),
                },
                rekognition_endpoint: get("REKOGNITION_ENDPOINT"),
            },
            labeling: LabelingConfig {
                max_labels: parse_or(
                    get("REKOGNITION_MAX_LABELS"),
                    "REKOGNITION_MAX_LABELS",
                    DEFAULT_MAX_LABELS,
                )?,
                min_confidence: parse_or(
                    get("REKOGNITION_MIN_CONFIDENCE"),
                    "REKOGNITION_MIN_CONFIDENCE",
                    DEFAULT_MIN_CONFIDENCE,
                )?,
            },
            search: SearchConfig {
                limit: parse_or(get("SEARCH_LIMIT"), "SEARCH_LIMIT", DEFAULT_SEARCH_LIMIT)?,
            },
            http: HttpConfig {
                timeout_secs: parse_or(
                    get("HTTP_TIMEOUT_SECS"),
                    "HTTP_TIMEOUT_SECS",
                    DEFAULT_TIMEOUT_SECS,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.appwrite.endpoint.starts_with("http://")
            && !self.appwrite.endpoint.starts_with("https://")
        {
            bail!(
                "APPWRITE_ENDPOINT must be an http(s) URL, got '{}'",
                self.appwrite.endpoint
            );
        }
        if self.labeling.max_labels == 0 {
            bail!("REKOGNITION_MAX_LABELS must be >= 1");
        }
        if !(0.0..=100.0).contains(&self.labeling.min_confidence) {
            bail!("REKOGNITION_MIN_CONFIDENCE must be in [0, 100]");
        }
        if self.search.limit == 0 {
            bail!("SEARCH_LIMIT must be >= 1");
        }
        if self.server.max_upload_bytes == 0 {
            bail!("MAX_UPLOAD_BYTES must be >= 1");
        }
        Ok(())
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        Some(value) => value
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", key, value, e)),
        None => Ok(default),
    }
}
