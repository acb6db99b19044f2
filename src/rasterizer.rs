//! Page rasterization with a first-page fallback

use crate::capture::{Background, Bitmap, CaptureBackend, CaptureOptions, WHITE};
use crate::error::CaptureError;
use crate::events::{EventSink, Outcome, PipelineEvent, Stage};
use crate::pages::PageRef;
use crate::report::{NodeId, RenderedReport};
use crate::{Error, ExportConfig, Result};
use base64::Engine as Base64Engine;
use image::codecs::jpeg::JpegEncoder;
use std::time::Duration;
use tokio::time::Instant;

const JPEG_DATA_PREFIX: &str = "data:image/jpeg;base64,";

/// One rasterized page, JPEG-encoded as a data URL
#[derive(Debug, Clone, PartialEq)]
pub struct RasterFrame {
    pub data_url: String,
    pub width: u32,
    pub height: u32,
    /// JPEG quality in (0, 1] the frame was encoded with
    pub quality: f32,
}

impl RasterFrame {
    /// The raw JPEG stream carried by the data URL.
    pub fn jpeg_bytes(&self) -> Result<Vec<u8>> {
        let payload = self
            .data_url
            .strip_prefix(JPEG_DATA_PREFIX)
            .ok_or_else(|| Error::Encode("frame is not a JPEG data URL".into()))?;
        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| Error::Encode(format!("invalid frame payload: {}", e)))
    }
}

/// Encode a bitmap as JPEG at `quality` (0, 1].
pub fn encode_frame(bitmap: &Bitmap, quality: f32) -> std::result::Result<RasterFrame, CaptureError> {
    let q = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, q)
        .encode_image(&bitmap.pixels)
        .map_err(|e| CaptureError::Render(format!("JPEG encoding failed: {}", e)))?;
    Ok(RasterFrame {
        data_url: format!(
            "{}{}",
            JPEG_DATA_PREFIX,
            base64::engine::general_purpose::STANDARD.encode(&jpeg)
        ),
        width: bitmap.width(),
        height: bitmap.height(),
        quality,
    })
}

fn viewport(report: &RenderedReport, node: NodeId, config: &ExportConfig) -> (u32, u32) {
    let (w, h) = report.scroll_size(node);
    (w.max(config.min_viewport.width), h.max(config.min_viewport.height))
}

/// Full-quality capture options for a page.
pub fn primary_options(report: &RenderedReport, node: NodeId, config: &ExportConfig) -> CaptureOptions {
    let (width, height) = viewport(report, node, config);
    CaptureOptions {
        scale: config.primary_scale,
        background: Background::Forced(WHITE),
        use_cors: true,
        allow_taint: false,
        width,
        height,
        image_timeout: Duration::from_millis(config.capture_image_timeout_ms),
        normalize_cross_origin: true,
    }
}

/// Degraded options used to salvage the first page.
pub fn fallback_options(report: &RenderedReport, node: NodeId, config: &ExportConfig) -> CaptureOptions {
    let (width, height) = viewport(report, node, config);
    CaptureOptions {
        scale: config.fallback_scale,
        background: Background::Fill(WHITE),
        use_cors: false,
        allow_taint: true,
        width,
        height,
        image_timeout: Duration::from_millis(config.capture_image_timeout_ms),
        normalize_cross_origin: false,
    }
}

async fn capture_and_encode(
    backend: &dyn CaptureBackend,
    report: &RenderedReport,
    node: NodeId,
    options: &CaptureOptions,
    quality: f32,
) -> std::result::Result<RasterFrame, CaptureError> {
    let bitmap = backend.capture(report, node, options).await?;
    encode_frame(&bitmap, quality)
}

/// Rasterize one page.
///
/// Hidden pages fail with [`Error::PageHidden`]. Page 0 gets one degraded
/// retry; any other capture failure is returned as is.
pub async fn rasterize_page(
    backend: &dyn CaptureBackend,
    report: &RenderedReport,
    page: PageRef,
    config: &ExportConfig,
    sink: &dyn EventSink,
) -> Result<RasterFrame> {
    let started = Instant::now();
    let event = |stage, outcome| PipelineEvent::new(stage, Some(page.index), started.elapsed(), outcome);

    if !report.is_rendered(page.node) {
        sink.record(&event(Stage::Rasterize, Outcome::Failed("page is hidden".into())));
        return Err(Error::PageHidden { index: page.index });
    }

    sink.record(&event(Stage::Rasterize, Outcome::Started));
    let primary = primary_options(report, page.node, config);
    let err = match capture_and_encode(backend, report, page.node, &primary, config.primary_quality).await {
        Ok(frame) => {
            log::debug!("page {} captured at {}x{}", page.index, frame.width, frame.height);
            sink.record(&event(Stage::Rasterize, Outcome::Completed));
            return Ok(frame);
        }
        Err(err) => err,
    };

    if page.index != 0 {
        sink.record(&event(Stage::Rasterize, Outcome::Failed(err.to_string())));
        return Err(Error::CaptureFailed {
            index: page.index,
            source: err,
        });
    }

    log::warn!("first page capture failed ({}), retrying degraded", err);
    sink.record(&event(Stage::Rasterize, Outcome::Tolerated(err.to_string())));
    let fallback = fallback_options(report, page.node, config);
    match capture_and_encode(backend, report, page.node, &fallback, config.fallback_quality).await {
        Ok(frame) => {
            sink.record(&event(Stage::Fallback, Outcome::Completed));
            Ok(frame)
        }
        Err(fallback_err) => {
            sink.record(&event(Stage::Fallback, Outcome::Failed(fallback_err.to_string())));
            Err(Error::CriticalFirstPage {
                primary: err,
                fallback: fallback_err,
            })
        }
    }
}
