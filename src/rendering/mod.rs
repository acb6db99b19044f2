//! Rendering: layout of report trees, paint commands and the software
//! capture backend.

pub mod layout;
pub mod paint;
pub mod raster;

pub use layout::{LayoutOptions, Rect};
pub use raster::SoftwareBackend;
