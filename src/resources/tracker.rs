//! Image readiness tracking

use super::image::{ImageResource, LoadState};
use std::time::Duration;

/// How a readiness wait ended. Every variant means "proceed".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Already loaded when the wait started; no listener was attached
    AlreadyLoaded,
    Loaded,
    Failed,
    TimedOut,
}

impl Readiness {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Readiness::AlreadyLoaded | Readiness::Loaded)
    }
}

/// Wait until `image` is loaded, has failed, or `timeout` elapses.
///
/// Never fails: a missing photo must not block the report. The listener is
/// released on every path when the receiver goes out of scope.
pub async fn wait_until_ready(image: &ImageResource, timeout: Duration) -> Readiness {
    if image.is_complete() {
        return Readiness::AlreadyLoaded;
    }

    let mut rx = image.subscribe();
    let outcome = match tokio::time::timeout(timeout, rx.wait_for(LoadState::is_terminal)).await {
        Ok(Ok(state)) => match *state {
            LoadState::Loaded { width, height } if width > 0 && height > 0 => Readiness::Loaded,
            _ => Readiness::Failed,
        },
        // The resource was dropped while we waited.
        Ok(Err(_)) => Readiness::Failed,
        Err(_) => Readiness::TimedOut,
    };
    drop(rx);

    if !outcome.is_loaded() {
        log::warn!("image {} not ready ({:?}), continuing", image.src(), outcome);
    }
    outcome
}
