//! Export orchestration: preload, discover, rasterize, assemble.

use crate::capture::CaptureBackend;
use crate::document::DocumentAssembler;
use crate::events::{EventSink, LogSink, Outcome, PipelineEvent, Stage};
use crate::pages::discover_pages;
use crate::rasterizer::rasterize_page;
use crate::report::RenderedReport;
use crate::resources::{preload_images, ResourceLoader};
use crate::{user_message, ExportConfig, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::{sleep, Instant};

/// Runs report exports.
///
/// The exporter holds no per-run state; every call works on the report it is
/// given and builds its own document. It does not guard against overlapping
/// runs, which would contend for the same capture backend.
pub struct ReportExporter {
    config: ExportConfig,
    backend: Arc<dyn CaptureBackend>,
    loader: Arc<dyn ResourceLoader>,
    sink: Arc<dyn EventSink>,
}

impl ReportExporter {
    pub fn new(
        config: ExportConfig,
        backend: Arc<dyn CaptureBackend>,
        loader: Arc<dyn ResourceLoader>,
    ) -> Self {
        Self {
            config,
            backend,
            loader,
            sink: Arc::new(LogSink),
        }
    }

    /// Replace the default [`LogSink`].
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Export `report` to PDF bytes.
    ///
    /// Either every discovered page is captured and placed, in order, or the
    /// run fails and no document is produced.
    pub async fn export_report(&self, report: &RenderedReport) -> Result<Vec<u8>> {
        let started = Instant::now();
        let sink = self.sink.as_ref();

        let preload = preload_images(
            report,
            report.root(),
            self.loader.as_ref(),
            &self.config,
            &run_stamp(),
            sink,
        )
        .await;
        if preload.loaded < preload.total {
            sink.record(&PipelineEvent::new(
                Stage::Preload,
                None,
                started.elapsed(),
                Outcome::Tolerated(format!(
                    "{} of {} photos ready ({} failed, {} timed out)",
                    preload.loaded, preload.total, preload.failed, preload.timed_out
                )),
            ));
        }

        let pages = discover_pages(report, &self.config, sink)?;
        let mut assembler = DocumentAssembler::new();
        for page in &pages {
            if page.index > 0 {
                sleep(Duration::from_millis(self.config.page_settle_ms)).await;
            }
            let frame = rasterize_page(self.backend.as_ref(), report, *page, &self.config, sink).await?;
            assembler.add_frame(&frame, page.index == 0)?;
            sink.record(&PipelineEvent::new(
                Stage::Assemble,
                Some(page.index),
                started.elapsed(),
                Outcome::Completed,
            ));
        }

        let finalize_started = Instant::now();
        let bytes = assembler.finalize()?;
        sink.record(&PipelineEvent::new(
            Stage::Finalize,
            None,
            finalize_started.elapsed(),
            Outcome::Completed,
        ));
        log::info!(
            "exported {} pages ({} bytes, {}/{} photos ready) in {:?}",
            pages.len(),
            bytes.len(),
            preload.loaded,
            preload.total,
            started.elapsed()
        );
        Ok(bytes)
    }

    /// Export and write the document under `filename`, appending `.pdf` unless
    /// the name already ends in it. Returns the written path.
    pub async fn export_to_file(&self, report: &RenderedReport, filename: impl AsRef<Path>) -> Result<PathBuf> {
        let bytes = self.export_report(report).await?;
        let path = pdf_filename(filename.as_ref());
        tokio::fs::write(&path, &bytes).await?;
        log::info!("saved {}", path.display());
        Ok(path)
    }

    /// Export, translating any failure into its user-facing message.
    pub async fn export_for_display(&self, report: &RenderedReport) -> std::result::Result<Vec<u8>, String> {
        self.export_report(report).await.map_err(|err| {
            log::error!("export failed: {}", err);
            user_message(&err).into_owned()
        })
    }
}

fn pdf_filename(name: &Path) -> PathBuf {
    match name.extension() {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => name.to_path_buf(),
        _ => {
            let mut s = name.as_os_str().to_owned();
            s.push(".pdf");
            PathBuf::from(s)
        }
    }
}

/// Cache-busting token for one run.
fn run_stamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_extension_is_appended_when_missing() {
        assert_eq!(pdf_filename(Path::new("vistoria-12")), PathBuf::from("vistoria-12.pdf"));
        assert_eq!(pdf_filename(Path::new("out/report.PDF")), PathBuf::from("out/report.PDF"));
        assert_eq!(pdf_filename(Path::new("report.2024")), PathBuf::from("report.2024.pdf"));
    }

    #[test]
    fn run_stamp_is_numeric() {
        assert!(run_stamp().chars().all(|c| c.is_ascii_digit()));
    }
}
