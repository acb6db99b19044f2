//! Capture capability: rasterize a report subtree to a bitmap.
//!
//! The pipeline only depends on [`CaptureBackend`]; the concrete renderer is
//! injected. [`crate::rendering::raster::SoftwareBackend`] is the built-in
//! implementation.

use crate::error::CaptureError;
use crate::report::{NodeId, RenderedReport};
use futures::future::BoxFuture;
use image::{Rgb, RgbImage};
use std::time::Duration;

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// How the capture surface is filled before painting
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Background {
    /// Opaque fill that also replaces any transparent page background
    Forced(Rgb<u8>),
    /// Plain fill painted underneath the page
    Fill(Rgb<u8>),
}

impl Background {
    pub fn color(&self) -> Rgb<u8> {
        match self {
            Background::Forced(c) | Background::Fill(c) => *c,
        }
    }
}

/// Options for one capture call
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOptions {
    /// Device pixels per CSS pixel
    pub scale: f32,
    pub background: Background,
    /// Request cross-origin images in CORS mode
    pub use_cors: bool,
    /// Draw cross-origin images that would taint the surface
    pub allow_taint: bool,
    /// Capture viewport in CSS pixels
    pub width: u32,
    pub height: u32,
    /// How long to wait for an unfinished image before drawing a placeholder
    pub image_timeout: Duration,
    /// Treat every image in the cloned capture surface as CORS-anonymous
    pub normalize_cross_origin: bool,
}

impl CaptureOptions {
    /// Size of the output bitmap in device pixels.
    pub fn surface_size(&self) -> (u32, u32) {
        (
            (self.width as f32 * self.scale).round() as u32,
            (self.height as f32 * self.scale).round() as u32,
        )
    }
}

/// A captured page
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub pixels: RgbImage,
}

impl Bitmap {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Renders a report subtree to a bitmap.
///
/// Implementations may suspend for the duration of the capture. The pipeline
/// never issues two captures at once.
pub trait CaptureBackend: Send + Sync {
    fn capture<'a>(
        &'a self,
        report: &'a RenderedReport,
        node: NodeId,
        options: &'a CaptureOptions,
    ) -> BoxFuture<'a, std::result::Result<Bitmap, CaptureError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_size_applies_scale() {
        let opts = CaptureOptions {
            scale: 1.2,
            background: Background::Forced(WHITE),
            use_cors: true,
            allow_taint: false,
            width: 800,
            height: 1123,
            image_timeout: Duration::from_millis(20000),
            normalize_cross_origin: true,
        };
        assert_eq!(opts.surface_size(), (960, 1348));
    }
}
