//! Image resources: state, loading, readiness and preloading

pub mod image;
pub mod loader;
pub mod preload;
pub mod tracker;

pub use self::image::{CrossOrigin, ImageResource, LoadState};
pub use loader::{DefaultLoader, LocalLoader, MemoryLoader, ResourceLoader};
pub use preload::{bust_cache, preload_images, PreloadSummary};
pub use tracker::{wait_until_ready, Readiness};

#[cfg(feature = "http")]
pub use loader::HttpLoader;
