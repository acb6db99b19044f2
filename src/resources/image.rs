//! Shared image resource state
//!
//! An `ImageResource` is a cheap, cloneable handle. Its load state lives in a
//! `tokio::sync::watch` channel: loaders publish transitions, the readiness
//! tracker subscribes while it waits and drops the subscription afterwards.

use image::RgbaImage;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

/// Load state of one image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Pending,
    Loaded { width: u32, height: u32 },
    Failed,
}

impl LoadState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoadState::Pending)
    }
}

/// Cross-origin request mode of an image element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossOrigin {
    Anonymous,
    UseCredentials,
}

#[derive(Debug)]
struct Inner {
    src: Mutex<String>,
    cross_origin: Mutex<Option<CrossOrigin>>,
    pixels: Mutex<Option<Arc<RgbaImage>>>,
    state: watch::Sender<LoadState>,
}

/// Handle to one embedded photo
#[derive(Debug, Clone)]
pub struct ImageResource {
    inner: Arc<Inner>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ImageResource {
    pub fn new(src: &str) -> Self {
        let (state, _) = watch::channel(LoadState::Pending);
        Self {
            inner: Arc::new(Inner {
                src: Mutex::new(src.to_string()),
                cross_origin: Mutex::new(None),
                pixels: Mutex::new(None),
                state,
            }),
        }
    }

    pub fn src(&self) -> String {
        lock(&self.inner.src).clone()
    }

    /// Replace the source locator. A changed source discards the previous
    /// load result and returns the image to `Pending`.
    pub fn set_src(&self, src: &str) -> bool {
        let mut cur = lock(&self.inner.src);
        if *cur == src {
            return false;
        }
        *cur = src.to_string();
        *lock(&self.inner.pixels) = None;
        self.inner.state.send_replace(LoadState::Pending);
        true
    }

    pub fn cross_origin(&self) -> Option<CrossOrigin> {
        *lock(&self.inner.cross_origin)
    }

    /// Returns whether the mode changed.
    pub fn set_cross_origin(&self, mode: CrossOrigin) -> bool {
        let mut cur = lock(&self.inner.cross_origin);
        let changed = *cur != Some(mode);
        *cur = Some(mode);
        changed
    }

    /// Drop any load result so the image is fetched again.
    pub fn invalidate(&self) {
        *lock(&self.inner.pixels) = None;
        self.inner.state.send_replace(LoadState::Pending);
    }

    pub fn state(&self) -> LoadState {
        *self.inner.state.borrow()
    }

    /// Loaded with non-zero natural dimensions.
    pub fn is_complete(&self) -> bool {
        matches!(self.state(), LoadState::Loaded { width, height } if width > 0 && height > 0)
    }

    /// Natural pixel dimensions, once loaded.
    pub fn natural_size(&self) -> Option<(u32, u32)> {
        match self.state() {
            LoadState::Loaded { width, height } => Some((width, height)),
            _ => None,
        }
    }

    pub fn pixels(&self) -> Option<Arc<RgbaImage>> {
        lock(&self.inner.pixels).clone()
    }

    /// Whether the source points at another origin (absolute http(s) URL).
    pub fn is_remote(&self) -> bool {
        let src = self.src();
        src.starts_with("http://") || src.starts_with("https://")
    }

    /// Publish a successful load. Loaders call this exactly once per fetch.
    pub fn complete(&self, pixels: RgbaImage) {
        let (width, height) = pixels.dimensions();
        *lock(&self.inner.pixels) = Some(Arc::new(pixels));
        self.inner.state.send_replace(LoadState::Loaded { width, height });
    }

    /// Publish a failed load.
    pub fn fail(&self) {
        *lock(&self.inner.pixels) = None;
        self.inner.state.send_replace(LoadState::Failed);
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<LoadState> {
        self.inner.state.subscribe()
    }

    /// Number of readiness listeners currently attached.
    pub fn listener_count(&self) -> usize {
        self.inner.state.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_src_resets_state_only_on_change() {
        let img = ImageResource::new("a.jpg");
        img.complete(RgbaImage::new(4, 3));
        assert!(img.is_complete());
        assert!(!img.set_src("a.jpg"));
        assert!(img.is_complete());
        assert!(img.set_src("a.jpg?t=1"));
        assert_eq!(img.state(), LoadState::Pending);
        assert!(img.pixels().is_none());
    }

    #[test]
    fn zero_sized_load_is_not_complete() {
        let img = ImageResource::new("empty.png");
        img.complete(RgbaImage::new(0, 0));
        assert!(!img.is_complete());
        assert_eq!(img.natural_size(), Some((0, 0)));
    }

    #[test]
    fn clones_share_state() {
        let img = ImageResource::new("https://cdn.example/p.jpg");
        let other = img.clone();
        other.fail();
        assert_eq!(img.state(), LoadState::Failed);
        assert!(img.is_remote());
    }
}
