//! Object storage for uploaded images.
//!
//! Two backends implement [`StorageBackend`]:
//!
//! - [`FilesystemBackend`] keeps objects under a local directory and issues
//!   HMAC-signed download URLs served by the API's storage route.
//! - [`HttpObjectStore`] talks to a Supabase-Storage-compatible REST service.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pocket_db::object_storage::{FilesystemBackend, StorageBackend};
//!
//! # async fn example(bytes: Vec<u8>) -> pocket_db::Result<()> {
//! let storage = FilesystemBackend::new(
//!     "./data/objects",
//!     "user-images",
//!     "http://localhost:3000",
//!     b"signing-key".to_vec(),
//! );
//! storage.put("u/recipes/1.png", &bytes, "image/png").await?;
//! let url = storage.signed_url("u/recipes/1.png", 3600).await?;
//! # let _ = url;
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use sha2::Sha256;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use pocket_core::{defaults, Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Storage backend trait for object stores holding uploaded images.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Bucket objects are written to.
    fn bucket(&self) -> &str;

    /// Store an object. Fails with `Error::Conflict` if the key already exists.
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<()>;

    /// Read an object.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Delete an object. Missing objects are not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Time-limited download URL for an object.
    async fn signed_url(&self, key: &str, ttl_secs: u64) -> Result<String>;
}

/// Reject keys that could escape the storage root.
pub fn validate_object_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && !key.starts_with('/')
        && !key.contains('\\')
        && key
            .split('/')
            .all(|seg| !seg.is_empty() && seg != "." && seg != "..");

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("Invalid object key: {}", key)))
    }
}

// =============================================================================
// Filesystem backend
// =============================================================================

/// Filesystem storage backend.
///
/// Objects live at `{base_path}/{bucket}/{key}`. Signed URLs have the form
/// `{public_base}/api/storage/{key}?expires={unix}&sig={hex}` where `sig` is
/// HMAC-SHA256 over `"{key}:{expires}"`.
pub struct FilesystemBackend {
    base_path: PathBuf,
    bucket: String,
    public_base_url: String,
    signing_key: Vec<u8>,
}

impl FilesystemBackend {
    pub fn new(
        base_path: impl Into<PathBuf>,
        bucket: impl Into<String>,
        public_base_url: impl Into<String>,
        signing_key: Vec<u8>,
    ) -> Self {
        Self {
            base_path: base_path.into(),
            bucket: bucket.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            signing_key,
        }
    }

    fn full_path(&self, key: &str) -> Result<PathBuf> {
        validate_object_key(key)?;
        Ok(self.base_path.join(&self.bucket).join(key))
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.signing_key)
            .map_err(|e| Error::Config(format!("Invalid storage signing key: {}", e)))
    }

    /// Signature for `key` valid until `expires` (unix seconds).
    pub fn sign(&self, key: &str, expires: i64) -> Result<String> {
        let mut mac = self.mac()?;
        mac.update(format!("{}:{}", key, expires).as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Check a download signature. Expired or malformed signatures fail.
    pub fn verify(&self, key: &str, expires: i64, sig: &str) -> bool {
        if expires < Utc::now().timestamp() {
            return false;
        }
        let Ok(expected) = hex::decode(sig) else {
            return false;
        };
        let Ok(mut mac) = self.mac() else {
            return false;
        };
        mac.update(format!("{}:{}", key, expires).as_bytes());
        mac.verify_slice(&expected).is_ok()
    }

    /// Validate that the backend can write, read, and delete files.
    ///
    /// Run at startup to surface permission or mount problems early.
    pub async fn validate(&self) -> std::result::Result<(), String> {
        let test_dir = self.base_path.join(".health-check");
        let test_file = test_dir.join(".write-check");

        fs::create_dir_all(&test_dir)
            .await
            .map_err(|e| format!("create_dir_all({:?}): {}", test_dir, e))?;

        let data = b"storage-health-check";
        fs::write(&test_file, data)
            .await
            .map_err(|e| format!("write({:?}): {}", test_file, e))?;

        let read_back = fs::read(&test_file)
            .await
            .map_err(|e| format!("read({:?}): {}", test_file, e))?;
        if read_back != data {
            return Err("read-back mismatch".to_string());
        }

        fs::remove_file(&test_file)
            .await
            .map_err(|e| format!("remove_file({:?}): {}", test_file, e))?;
        let _ = fs::remove_dir(&test_dir).await;

        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put(&self, key: &str, data: &[u8], _content_type: &str) -> Result<()> {
        let full_path = self.full_path(key)?;
        debug!(
            subsystem = "storage",
            component = "filesystem",
            op = "put",
            object_key = %key,
            size = data.len(),
            "Writing object"
        );

        if fs::try_exists(&full_path).await? {
            return Err(Error::Conflict(format!("Object already exists: {}", key)));
        }

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(subsystem = "storage", component = "filesystem", parent = %parent.display(), error = %e, "create_dir_all failed");
                e
            })?;
        }

        // Atomic write: temp file + rename
        let temp_path = full_path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&temp_path, &full_path).await {
            warn!(subsystem = "storage", component = "filesystem", to = %full_path.display(), error = %e, "rename failed");
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&full_path, std::fs::Permissions::from_mode(0o644)).await?;
        }

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let full_path = self.full_path(key)?;
        match fs::read(&full_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("Object not found: {}", key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let full_path = self.full_path(key)?;
        if fs::try_exists(&full_path).await? {
            fs::remove_file(full_path).await?;
        }
        Ok(())
    }

    async fn signed_url(&self, key: &str, ttl_secs: u64) -> Result<String> {
        validate_object_key(key)?;
        let expires = Utc::now().timestamp() + ttl_secs as i64;
        let sig = self.sign(key, expires)?;
        Ok(format!(
            "{}/api/storage/{}?expires={}&sig={}",
            self.public_base_url, key, expires, sig
        ))
    }
}

// =============================================================================
// HTTP object store
// =============================================================================

/// Supabase-Storage-compatible REST backend.
pub struct HttpObjectStore {
    client: Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

impl HttpObjectStore {
    /// `base_url` is the storage API root, e.g. `https://x.supabase.co/storage/v1`.
    pub fn new(
        base_url: impl Into<String>,
        service_key: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(defaults::IMAGE_FETCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build storage client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            bucket: bucket.into(),
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/object/{}/{}", self.base_url, self.bucket, key)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
    }

    async fn check(response: reqwest::Response, op: &str, key: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!(
            subsystem = "storage",
            component = "http",
            op = op,
            object_key = %key,
            status = status.as_u16(),
            error = %body,
            "Object store request failed"
        );
        Err(match status {
            StatusCode::NOT_FOUND => Error::NotFound(format!("Object not found: {}", key)),
            StatusCode::CONFLICT => Error::Conflict(format!("Object already exists: {}", key)),
            _ => Error::Storage(format!("{} {} failed: {} {}", op, key, status, body)),
        })
    }
}

#[async_trait]
impl StorageBackend for HttpObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<()> {
        validate_object_key(key)?;
        debug!(
            subsystem = "storage",
            component = "http",
            op = "put",
            object_key = %key,
            size = data.len(),
            "Uploading object"
        );

        let response = self
            .authed(self.client.post(self.object_url(key)))
            .header("content-type", content_type)
            .header("x-upsert", "false")
            .header(
                "cache-control",
                format!("max-age={}", defaults::OBJECT_CACHE_SECS),
            )
            .body(data.to_vec())
            .send()
            .await?;

        Self::check(response, "put", key).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        validate_object_key(key)?;
        let response = self
            .authed(self.client.get(self.object_url(key)))
            .send()
            .await?;
        let response = Self::check(response, "get", key).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_object_key(key)?;
        let response = self
            .authed(self.client.delete(self.object_url(key)))
            .send()
            .await?;
        match Self::check(response, "delete", key).await {
            Ok(_) | Err(Error::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn signed_url(&self, key: &str, ttl_secs: u64) -> Result<String> {
        validate_object_key(key)?;
        let url = format!("{}/object/sign/{}/{}", self.base_url, self.bucket, key);
        let response = self
            .authed(self.client.post(url))
            .json(&serde_json::json!({ "expiresIn": ttl_secs }))
            .send()
            .await?;
        let response = Self::check(response, "sign", key).await?;
        let signed: SignResponse = response.json().await?;

        if signed.signed_url.starts_with("http") {
            Ok(signed.signed_url)
        } else {
            Ok(format!("{}{}", self.base_url, signed.signed_url))
        }
    }
}
