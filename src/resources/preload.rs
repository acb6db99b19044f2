//! Batched image preloading ahead of capture

use super::image::{CrossOrigin, ImageResource};
use super::loader::ResourceLoader;
use super::tracker::{wait_until_ready, Readiness};
use crate::events::{EventSink, Outcome, PipelineEvent, Stage};
use crate::report::{NodeId, RenderedReport};
use crate::ExportConfig;
use futures::future::join_all;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use url::Url;

/// Tally of one preload pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreloadSummary {
    pub total: usize,
    pub loaded: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub batches: usize,
}

/// Append `param=stamp` to `src` so the next fetch bypasses caches.
///
/// Returns `None` when the source is left as is: it already carries `param`,
/// or it is an inline (`data:`/`blob:`) or otherwise non-fetchable locator.
pub fn bust_cache(src: &str, param: &str, stamp: &str) -> Option<String> {
    if src.is_empty() || src.starts_with("data:") || src.starts_with("blob:") {
        return None;
    }

    if let Ok(mut url) = Url::parse(src) {
        if !matches!(url.scheme(), "http" | "https" | "file") {
            return None;
        }
        if url.query_pairs().any(|(k, _)| k == param) {
            return None;
        }
        url.query_pairs_mut().append_pair(param, stamp);
        return Some(url.to_string());
    }

    // Relative locator: edit the query by hand, keeping any fragment.
    let (path, fragment) = match src.split_once('#') {
        Some((p, f)) => (p, Some(f)),
        None => (src, None),
    };
    let query = path.split_once('?').map(|(_, q)| q);
    let present = query
        .map(|q| q.split('&').any(|kv| kv.split('=').next() == Some(param)))
        .unwrap_or(false);
    if present {
        return None;
    }
    let sep = if query.is_some() { '&' } else { '?' };
    let mut out = format!("{}{}{}={}", path, sep, param, stamp);
    if let Some(f) = fragment {
        out.push('#');
        out.push_str(f);
    }
    Some(out)
}

/// Rewrite one image for a fresh, CORS-safe fetch and start it if needed.
fn prepare(image: &ImageResource, loader: &dyn ResourceLoader, config: &ExportConfig, stamp: &str) {
    let origin_changed = image.set_cross_origin(CrossOrigin::Anonymous);
    let src_changed = match bust_cache(&image.src(), &config.cache_bust_param, stamp) {
        Some(busted) => image.set_src(&busted),
        None => false,
    };
    if origin_changed && !src_changed {
        image.invalidate();
    }
    if src_changed || origin_changed || !image.is_complete() {
        loader.load(image);
    }
}

/// Preload every image under `root` in batches of `config.batch_size`.
///
/// Fetches are started per batch so at most one batch is in flight. Members
/// of a batch are awaited concurrently; failures and timeouts are tolerated.
/// A settle delay separates batches and a longer one follows the last batch.
pub async fn preload_images(
    report: &RenderedReport,
    root: NodeId,
    loader: &dyn ResourceLoader,
    config: &ExportConfig,
    stamp: &str,
    sink: &dyn EventSink,
) -> PreloadSummary {
    let started = Instant::now();
    sink.record(&PipelineEvent::new(Stage::Preload, None, Duration::ZERO, Outcome::Started));

    let images = report.images_in(root);
    let timeout = Duration::from_millis(config.image_timeout_ms);
    let mut summary = PreloadSummary {
        total: images.len(),
        ..Default::default()
    };

    for (i, batch) in images.chunks(config.batch_size.max(1)).enumerate() {
        if i > 0 {
            sleep(Duration::from_millis(config.batch_settle_ms)).await;
        }
        for image in batch {
            prepare(image, loader, config, stamp);
        }

        let batch_started = Instant::now();
        let results = join_all(batch.iter().map(|img| wait_until_ready(img, timeout))).await;
        for (image, readiness) in batch.iter().zip(results) {
            match readiness {
                Readiness::AlreadyLoaded | Readiness::Loaded => summary.loaded += 1,
                Readiness::Failed => summary.failed += 1,
                Readiness::TimedOut => summary.timed_out += 1,
            }
            if !readiness.is_loaded() {
                sink.record(&PipelineEvent::new(
                    Stage::ImageWait,
                    None,
                    batch_started.elapsed(),
                    Outcome::Tolerated(format!("{} {:?}", image.src(), readiness)),
                ));
            }
        }
        summary.batches += 1;
    }

    sleep(Duration::from_millis(config.final_settle_ms)).await;

    log::info!(
        "preloaded {} images in {} batches ({} failed, {} timed out)",
        summary.total,
        summary.batches,
        summary.failed,
        summary.timed_out
    );
    sink.record(&PipelineEvent::new(
        Stage::Preload,
        None,
        started.elapsed(),
        Outcome::Completed,
    ));
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;
    use crate::rendering::layout::LayoutOptions;
    use crate::report::Element;
    use crate::resources::loader::MemoryLoader;
    use image::RgbaImage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn report_with(srcs: &[&str]) -> RenderedReport {
        let page = Element::page("pdf-page").children(srcs.iter().map(|s| Element::image(s)));
        RenderedReport::layout(Element::new("body").child(page), &LayoutOptions::default())
    }

    /// Serves every request immediately and records peak in-flight loads.
    struct CountingLoader {
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        requested: Mutex<Vec<String>>,
    }

    impl ResourceLoader for CountingLoader {
        fn load(&self, image: &ImageResource) {
            self.requested.lock().unwrap().push(image.src());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let image = image.clone();
            let in_flight = self.in_flight.clone();
            tokio::spawn(async move {
                sleep(Duration::from_millis(50)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                image.complete(RgbaImage::new(2, 2));
            });
        }
    }

    #[test]
    fn bust_cache_appends_once() {
        assert_eq!(bust_cache("a.jpg", "t", "1").as_deref(), Some("a.jpg?t=1"));
        assert_eq!(bust_cache("a.jpg?w=3", "t", "1").as_deref(), Some("a.jpg?w=3&t=1"));
        assert_eq!(bust_cache("a.jpg?t=0", "t", "1"), None);
        assert_eq!(bust_cache("a.jpg#top", "t", "1").as_deref(), Some("a.jpg?t=1#top"));
        assert_eq!(
            bust_cache("https://cdn.example/p.jpg", "t", "9").as_deref(),
            Some("https://cdn.example/p.jpg?t=9")
        );
        assert_eq!(bust_cache("https://cdn.example/p.jpg?t=2", "t", "9"), None);
        assert_eq!(bust_cache("data:image/png;base64,AAAA", "t", "9"), None);
    }

    #[test]
    fn bust_cache_is_idempotent() {
        let once = bust_cache("photos/x.png", "t", "5").unwrap();
        assert_eq!(bust_cache(&once, "t", "6"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn batches_bound_in_flight_loads() {
        let report = report_with(&["1.jpg", "2.jpg", "3.jpg", "4.jpg", "5.jpg", "6.jpg", "7.jpg"]);
        let loader = CountingLoader {
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            requested: Mutex::new(Vec::new()),
        };
        let config = ExportConfig::default();
        let sink = RecordingSink::new();
        let start = Instant::now();
        let summary = preload_images(&report, report.root(), &loader, &config, "42", &sink).await;

        assert_eq!(summary.total, 7);
        assert_eq!(summary.loaded, 7);
        assert_eq!(summary.batches, 3);
        assert_eq!(loader.peak.load(Ordering::SeqCst), 3);
        // 3 batches x 50ms load + 2 x 500ms settle + 2000ms final settle
        assert!(start.elapsed() >= Duration::from_millis(3150));
        let requested = loader.requested.lock().unwrap().clone();
        assert_eq!(requested[0], "1.jpg?t=42");
        assert_eq!(requested[6], "7.jpg?t=42");
        assert!(report
            .images_in(report.root())
            .iter()
            .all(|i| i.cross_origin() == Some(CrossOrigin::Anonymous)));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_and_timeouts_are_tolerated() {
        let report = report_with(&["ok.jpg", "bad.jpg", "hang.jpg"]);
        let loader = MemoryLoader::new()
            .with_image("ok.jpg", RgbaImage::new(4, 4))
            .with_failure("bad.jpg");
        let sink = RecordingSink::new();
        let summary =
            preload_images(&report, report.root(), &loader, &ExportConfig::default(), "1", &sink)
                .await;
        assert_eq!(summary.loaded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.timed_out, 1);
        assert_eq!(sink.of_stage(Stage::ImageWait).len(), 2);
        assert_eq!(sink.of_stage(Stage::Preload).last().map(|e| e.outcome.clone()), Some(Outcome::Completed));
    }

    #[tokio::test(start_paused = true)]
    async fn second_pass_reuses_loaded_images() {
        let report = report_with(&["a.jpg", "b.jpg"]);
        let loader = MemoryLoader::new()
            .with_image("a.jpg", RgbaImage::new(1, 1))
            .with_image("b.jpg", RgbaImage::new(1, 1));
        let config = ExportConfig::default();
        let sink = RecordingSink::new();
        preload_images(&report, report.root(), &loader, &config, "1", &sink).await;
        let srcs: Vec<String> = report.images_in(report.root()).iter().map(|i| i.src()).collect();
        preload_images(&report, report.root(), &loader, &config, "2", &sink).await;
        let again: Vec<String> = report.images_in(report.root()).iter().map(|i| i.src()).collect();
        assert_eq!(srcs, again);
        assert!(report.images_in(report.root()).iter().all(|i| i.is_complete()));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_report_still_settles() {
        let report = report_with(&[]);
        let start = Instant::now();
        let summary = preload_images(
            &report,
            report.root(),
            &MemoryLoader::new(),
            &ExportConfig::default(),
            "1",
            &RecordingSink::new(),
        )
        .await;
        assert_eq!(summary, PreloadSummary::default());
        assert!(start.elapsed() >= Duration::from_millis(2000));
    }
}
