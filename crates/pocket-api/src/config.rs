//! Server configuration read from the environment.
//!
//! `.env` is loaded by the binary before [`AppConfig::from_env`] runs; every
//! default comes from [`pocket_core::defaults`].

use pocket_core::{defaults, Error, Result};

/// Which generative model backend serves categorization requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceProvider {
    Gemini,
    OpenAI,
}

/// Where uploaded images are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    /// Local directory; downloads go through `/api/storage/*key` with an
    /// HMAC-signed query string.
    Filesystem {
        path: String,
        /// `None` means a random key per process: signed URLs do not
        /// survive a restart.
        signing_key: Option<String>,
    },
    /// Supabase-Storage-compatible REST service.
    Http { url: String, service_key: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Externally visible base URL, used for signed download links.
    pub public_base_url: String,
    pub allowed_origins: Vec<String>,
    pub session_ttl_hours: i64,
    /// Add `Secure` to the session cookie.
    pub cookie_secure: bool,
    pub inference_provider: InferenceProvider,
    pub storage: StorageConfig,
    pub bucket: String,
    pub db_max_connections: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup (the environment in
    /// production, a map in tests). Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url =
            get("DATABASE_URL").ok_or_else(|| Error::Config("DATABASE_URL is not set".into()))?;

        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(get("PORT"), "PORT", defaults::SERVER_PORT)?;

        let public_base_url = get("PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();

        let allowed_origins = get("ALLOWED_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_else(|| vec!["http://localhost:3000".to_string()]);

        let session_ttl_hours = parse_or(
            get("SESSION_TTL_HOURS"),
            "SESSION_TTL_HOURS",
            defaults::SESSION_TTL_HOURS,
        )?;
        if session_ttl_hours <= 0 {
            return Err(Error::Config("SESSION_TTL_HOURS must be positive".into()));
        }

        let cookie_secure = get("COOKIE_SECURE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let inference_provider = match get("INFERENCE_PROVIDER")
            .map(|v| v.to_ascii_lowercase())
            .as_deref()
        {
            None | Some("gemini") => InferenceProvider::Gemini,
            Some("openai") => InferenceProvider::OpenAI,
            Some(other) => {
                return Err(Error::Config(format!(
                    "Unknown INFERENCE_PROVIDER '{}' (expected gemini or openai)",
                    other
                )))
            }
        };

        let storage = match get("STORAGE_BACKEND")
            .map(|v| v.to_ascii_lowercase())
            .as_deref()
        {
            None | Some("filesystem") => StorageConfig::Filesystem {
                path: get("STORAGE_PATH").unwrap_or_else(|| defaults::STORAGE_PATH.to_string()),
                signing_key: get("STORAGE_SIGNING_KEY"),
            },
            Some("http") => StorageConfig::Http {
                url: get("STORAGE_URL").ok_or_else(|| {
                    Error::Config("STORAGE_URL is required when STORAGE_BACKEND=http".into())
                })?,
                service_key: get("STORAGE_SERVICE_KEY").ok_or_else(|| {
                    Error::Config(
                        "STORAGE_SERVICE_KEY is required when STORAGE_BACKEND=http".into(),
                    )
                })?,
            },
            Some(other) => {
                return Err(Error::Config(format!(
                    "Unknown STORAGE_BACKEND '{}' (expected filesystem or http)",
                    other
                )))
            }
        };

        Ok(Self {
            database_url,
            host,
            port,
            public_base_url,
            allowed_origins,
            session_ttl_hours,
            cookie_secure,
            inference_provider,
            storage,
            bucket: get("STORAGE_BUCKET").unwrap_or_else(|| defaults::IMAGE_BUCKET.to_string()),
            db_max_connections: parse_or(
                get("DB_MAX_CONNECTIONS"),
                "DB_MAX_CONNECTIONS",
                defaults::DB_MAX_CONNECTIONS,
            )?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value '{}'", key, v))),
    }
}
