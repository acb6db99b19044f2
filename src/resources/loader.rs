//! Resource loaders: the only code that moves an image out of `Pending`.
//!
//! A loader is asked to fetch an image at its current source and publishes
//! the outcome on the image handle from a spawned task. `load` must be called
//! from within a tokio runtime.

use super::image::ImageResource;
use base64::Engine as Base64Engine;
use image::RgbaImage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Starts fetches for image resources.
pub trait ResourceLoader: Send + Sync {
    /// Begin fetching `image` at its current source.
    fn load(&self, image: &ImageResource);
}

/// Source without query string or fragment; cache-busting parameters are
/// meaningless for anything but HTTP.
pub fn strip_query(src: &str) -> &str {
    let end = src.find(['?', '#']).unwrap_or(src.len());
    &src[..end]
}

fn decode(bytes: &[u8]) -> Result<RgbaImage, String> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| format!("decode failed: {}", e))
}

/// Decode a `data:<mime>;base64,<payload>` URI.
pub fn decode_data_uri(src: &str) -> Result<Vec<u8>, String> {
    let rest = src
        .strip_prefix("data:")
        .ok_or_else(|| "not a data URI".to_string())?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| "data URI has no payload".to_string())?;
    if !meta.ends_with(";base64") {
        return Err("only base64 data URIs are supported".into());
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| format!("invalid base64 payload: {}", e))
}

/// Publish a fetch result unless the source changed while it was in flight.
fn publish(image: &ImageResource, requested: &str, result: Result<RgbaImage, String>) {
    if image.src() != requested {
        log::debug!("discarding stale load of {}", requested);
        return;
    }
    match result {
        Ok(pixels) => {
            log::debug!("loaded {} ({}x{})", requested, pixels.width(), pixels.height());
            image.complete(pixels);
        }
        Err(reason) => {
            log::warn!("failed to load {}: {}", requested, reason);
            image.fail();
        }
    }
}

/// Loads `data:` URIs and files relative to a base directory.
#[derive(Debug, Clone)]
pub struct LocalLoader {
    base_dir: PathBuf,
}

impl LocalLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    fn resolve(&self, src: &str) -> PathBuf {
        let path = strip_query(src);
        let path = path.strip_prefix("file://").unwrap_or(path);
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.base_dir.join(p)
        }
    }
}

impl ResourceLoader for LocalLoader {
    fn load(&self, image: &ImageResource) {
        let image = image.clone();
        let requested = image.src();
        let path = self.resolve(&requested);
        tokio::spawn(async move {
            let src = requested.clone();
            let result = tokio::task::spawn_blocking(move || {
                let bytes = if src.starts_with("data:") {
                    decode_data_uri(&src)?
                } else {
                    std::fs::read(&path).map_err(|e| format!("{}: {}", path.display(), e))?
                };
                decode(&bytes)
            })
            .await
            .unwrap_or_else(|join| Err(format!("loader task failed: {}", join)));
            publish(&image, &requested, result);
        });
    }
}

/// Fetches http(s) images with an async reqwest client.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpLoader {
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpLoader {
    pub fn new(timeout: std::time::Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| crate::Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[cfg(feature = "http")]
impl ResourceLoader for HttpLoader {
    fn load(&self, image: &ImageResource) {
        let image = image.clone();
        let client = self.client.clone();
        tokio::spawn(async move {
            let requested = image.src();
            let result = async {
                let res = client
                    .get(&requested)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| format!("HTTP GET failed: {}", e))?;
                let body = res
                    .bytes()
                    .await
                    .map_err(|e| format!("Failed to read response body: {}", e))?;
                decode(&body)
            }
            .await;
            publish(&image, &requested, result);
        });
    }
}

/// Dispatches on the source scheme: http(s) to [`HttpLoader`] (with the
/// `http` feature), everything else to [`LocalLoader`].
pub struct DefaultLoader {
    local: LocalLoader,
    #[cfg(feature = "http")]
    http: HttpLoader,
}

impl DefaultLoader {
    pub fn new(base_dir: impl AsRef<Path>, timeout: std::time::Duration) -> crate::Result<Self> {
        #[cfg(not(feature = "http"))]
        let _ = timeout;
        Ok(Self {
            local: LocalLoader::new(base_dir),
            #[cfg(feature = "http")]
            http: HttpLoader::new(timeout)?,
        })
    }
}

impl ResourceLoader for DefaultLoader {
    fn load(&self, image: &ImageResource) {
        #[cfg(feature = "http")]
        {
            if image.is_remote() {
                return self.http.load(image);
            }
        }
        #[cfg(not(feature = "http"))]
        {
            if image.is_remote() {
                log::warn!("http support disabled, cannot load {}", image.src());
                image.fail();
                return;
            }
        }
        self.local.load(image)
    }
}

/// In-memory loader keyed by source path (query stripped). Unknown sources
/// never complete, which models a hung request.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    entries: HashMap<String, Option<Arc<RgbaImage>>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `pixels` for `src`.
    pub fn with_image(mut self, src: &str, pixels: RgbaImage) -> Self {
        self.entries.insert(src.to_string(), Some(Arc::new(pixels)));
        self
    }

    /// Fail every load of `src`.
    pub fn with_failure(mut self, src: &str) -> Self {
        self.entries.insert(src.to_string(), None);
        self
    }
}

impl ResourceLoader for MemoryLoader {
    fn load(&self, image: &ImageResource) {
        let requested = image.src();
        let entry = match self.entries.get(strip_query(&requested)) {
            Some(entry) => entry.clone(),
            None => return,
        };
        let image = image.clone();
        tokio::spawn(async move {
            let result = entry
                .map(|px| (*px).clone())
                .ok_or_else(|| "no such resource".to_string());
            publish(&image, &requested, result);
        });
    }
}
