//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};

use pocket_core::{defaults, Error, GenerationBackend, Result};
use pocket_db::{Database, FilesystemBackend, HttpObjectStore, StorageBackend};
use pocket_inference::{Categorizer, GeminiBackend, OpenAIBackend, OpenAIConfig};

use crate::config::{AppConfig, InferenceProvider, StorageConfig};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub categorizer: Categorizer,
    /// Object store for image bytes.
    pub storage: Arc<dyn StorageBackend>,
    /// Set when images live on the local filesystem; the download route
    /// verifies signatures against it.
    pub local_storage: Option<Arc<FilesystemBackend>>,
    /// Client for fetching remote images by URL.
    pub http: reqwest::Client,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: Database,
        backend: Arc<dyn GenerationBackend>,
    ) -> Result<Self> {
        let (storage, local_storage) = build_storage(&config)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(defaults::IMAGE_FETCH_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            db,
            categorizer: Categorizer::new(backend),
            storage,
            local_storage,
            http,
            config: Arc::new(config),
        })
    }
}

/// Construct the configured generative model backend.
pub fn build_generation_backend(config: &AppConfig) -> Result<Arc<dyn GenerationBackend>> {
    let backend: Arc<dyn GenerationBackend> = match config.inference_provider {
        InferenceProvider::Gemini => Arc::new(GeminiBackend::from_env()?),
        InferenceProvider::OpenAI => Arc::new(OpenAIBackend::new(OpenAIConfig::from_env())?),
    };
    info!(
        subsystem = "api",
        model = %backend.model_name(),
        provider = ?config.inference_provider,
        "Generation backend ready"
    );
    Ok(backend)
}

type StorageHandles = (Arc<dyn StorageBackend>, Option<Arc<FilesystemBackend>>);

fn build_storage(config: &AppConfig) -> Result<StorageHandles> {
    match &config.storage {
        StorageConfig::Filesystem { path, signing_key } => {
            let key = match signing_key {
                Some(key) => key.as_bytes().to_vec(),
                None => {
                    warn!(
                        subsystem = "api",
                        "STORAGE_SIGNING_KEY not set; signed image URLs will not survive a restart"
                    );
                    rand::thread_rng().gen::<[u8; 32]>().to_vec()
                }
            };
            let fs = Arc::new(FilesystemBackend::new(
                path.as_str(),
                config.bucket.as_str(),
                config.public_base_url.as_str(),
                key,
            ));
            let storage: Arc<dyn StorageBackend> = fs.clone();
            Ok((storage, Some(fs)))
        }
        StorageConfig::Http { url, service_key } => {
            let store =
                HttpObjectStore::new(url.as_str(), service_key.as_str(), config.bucket.as_str())?;
            let storage: Arc<dyn StorageBackend> = Arc::new(store);
            Ok((storage, None))
        }
    }
}
