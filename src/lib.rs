//! Vistoria report export
//!
//! Turns a laid-out inspection report ("vistoria") into a paginated A4 PDF.
//! The pipeline preloads every embedded photo in small batches, discovers
//! the page-marker nodes, captures each page to a JPEG frame through a
//! pluggable [`capture::CaptureBackend`], and places one frame per PDF page.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vistoria_pdf::{ExportConfig, ReportExporter};
//! use vistoria_pdf::rendering::raster::SoftwareBackend;
//! use vistoria_pdf::resources::LocalLoader;
//!
//! # async fn run() -> vistoria_pdf::Result<()> {
//! let html = std::fs::read_to_string("report.html")?;
//! let report = vistoria_pdf::report::html::parse_report(&html, &Default::default())?;
//!
//! let exporter = ReportExporter::new(
//!     ExportConfig::default(),
//!     Arc::new(SoftwareBackend::new()),
//!     Arc::new(LocalLoader::new(".")),
//! );
//! let pdf = exporter.export_report(&report).await?;
//! std::fs::write("report.pdf", pdf)?;
//! # Ok(())
//! # }
//! ```

use serde::Deserialize;

pub mod error;
pub use error::{user_message, CaptureError, Error, Result};

pub mod capture;
pub mod document;
pub mod events;
pub mod inspection;
pub mod pages;
pub mod pipeline;
pub mod rasterizer;
pub mod rendering;
pub mod report;
pub mod resources;

pub use pipeline::ReportExporter;
pub use report::{Element, RenderedReport};

/// Configuration for a report export
///
/// The defaults reproduce the production timings: photos are preloaded three
/// at a time, capture runs at 1.2x with JPEG quality 0.8, and the first page
/// may be salvaged at 1x / 0.7 when the primary capture fails.
///
/// # Examples
///
/// ```
/// let cfg = vistoria_pdf::ExportConfig::default();
/// assert_eq!(cfg.batch_size, 3);
/// assert_eq!(cfg.page_marker_class, "pdf-page");
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Class that marks one physical page in the report tree
    pub page_marker_class: String,
    /// Number of images awaited concurrently during preload
    pub batch_size: usize,
    /// Delay between preload batches in milliseconds
    pub batch_settle_ms: u64,
    /// Delay after the last preload batch in milliseconds
    pub final_settle_ms: u64,
    /// Delay before capturing each page after the first
    pub page_settle_ms: u64,
    /// Per-image readiness timeout during preload
    pub image_timeout_ms: u64,
    /// Per-image timeout handed to the capture backend
    pub capture_image_timeout_ms: u64,
    pub primary_scale: f32,
    pub primary_quality: f32,
    pub fallback_scale: f32,
    pub fallback_quality: f32,
    /// Smallest capture viewport
    pub min_viewport: Viewport,
    /// Height above which the diagnostic scan reports a node as page-like
    pub fallback_min_height_px: u32,
    /// Query parameter used to defeat image caches
    pub cache_bust_param: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            page_marker_class: "pdf-page".to_string(),
            batch_size: 3,
            batch_settle_ms: 500,
            final_settle_ms: 2000,
            page_settle_ms: 100,
            image_timeout_ms: 15000,
            capture_image_timeout_ms: 20000,
            primary_scale: 1.2,
            primary_quality: 0.8,
            fallback_scale: 1.0,
            fallback_quality: 0.7,
            min_viewport: Viewport::default(),
            fallback_min_height_px: 500,
            cache_bust_param: "t".to_string(),
        }
    }
}

impl ExportConfig {
    /// Read a JSON config; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| Error::ConfigError(format!("invalid config: {}", e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_marker_class.trim().is_empty() {
            return Err(Error::ConfigError("page_marker_class cannot be empty".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::ConfigError("batch_size must be at least 1".into()));
        }
        for (name, q) in [
            ("primary_quality", self.primary_quality),
            ("fallback_quality", self.fallback_quality),
        ] {
            if !(q > 0.0 && q <= 1.0) {
                return Err(Error::ConfigError(format!("{} must be in (0, 1]", name)));
            }
        }
        if self.primary_scale <= 0.0 || self.fallback_scale <= 0.0 {
            return Err(Error::ConfigError("capture scale must be positive".into()));
        }
        Ok(())
    }
}

/// Viewport dimensions in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExportConfig::default();
        assert_eq!(config.min_viewport.width, 800);
        assert_eq!(config.min_viewport.height, 600);
        assert_eq!(config.image_timeout_ms, 15000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = ExportConfig::from_json(r#"{"batch_size": 5, "final_settle_ms": 0}"#).unwrap();
        assert_eq!(cfg.batch_size, 5);
        assert_eq!(cfg.final_settle_ms, 0);
        assert_eq!(cfg.batch_settle_ms, 500);
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(ExportConfig::from_json(r#"{"batch_size": 0}"#).is_err());
        assert!(ExportConfig::from_json(r#"{"primary_quality": 1.5}"#).is_err());
        assert!(matches!(
            ExportConfig::from_json("not json"),
            Err(Error::ConfigError(_))
        ));
    }
}
