//! Page discovery and validation

use crate::events::{EventSink, Outcome, PipelineEvent, Stage};
use crate::report::{NodeId, RenderedReport};
use crate::{Error, ExportConfig, Result};
use tokio::time::Instant;

/// One discovered page: its node and position in the output document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRef {
    pub index: usize,
    pub node: NodeId,
}

/// Return the report's page nodes in document order.
///
/// Fails with [`Error::NoPagesFound`] when no node carries the marker class.
/// Before failing, page-sized nodes are listed for diagnosis only.
pub fn discover_pages(
    report: &RenderedReport,
    config: &ExportConfig,
    sink: &dyn EventSink,
) -> Result<Vec<PageRef>> {
    let started = Instant::now();
    let pages: Vec<PageRef> = report
        .find_by_class(&config.page_marker_class)
        .into_iter()
        .enumerate()
        .map(|(index, node)| PageRef { index, node })
        .collect();

    if pages.is_empty() {
        let candidates = diagnostic_scan(report, config.fallback_min_height_px);
        log::error!(
            "no `.{}` nodes in report ({} nodes); {} page-sized candidates: {:?}",
            config.page_marker_class,
            report.len(),
            candidates.len(),
            candidates
                .iter()
                .map(|id| describe(report, *id))
                .collect::<Vec<_>>()
        );
        sink.record(&PipelineEvent::new(
            Stage::Discovery,
            None,
            started.elapsed(),
            Outcome::Failed(format!(
                "no page markers; {} page-sized candidates",
                candidates.len()
            )),
        ));
        return Err(Error::NoPagesFound);
    }

    log::info!("found {} report pages", pages.len());
    sink.record(&PipelineEvent::new(
        Stage::Discovery,
        None,
        started.elapsed(),
        Outcome::Completed,
    ));
    Ok(pages)
}

/// Nodes taller than `min_height`, in document order.
pub fn diagnostic_scan(report: &RenderedReport, min_height: u32) -> Vec<NodeId> {
    report
        .nodes()
        .filter(|(_, n)| n.rect.height > min_height)
        .map(|(id, _)| id)
        .collect()
}

fn describe(report: &RenderedReport, id: NodeId) -> String {
    let node = report.node(id);
    format!(
        "<{} class=\"{}\"> {}x{}",
        node.tag,
        node.classes.join(" "),
        node.rect.width,
        node.rect.height
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;
    use crate::rendering::layout::LayoutOptions;
    use crate::report::Element;

    #[test]
    fn pages_are_indexed_in_document_order() {
        let root = Element::new("body").children([
            Element::page("pdf-page").size(100, 100).text("cover"),
            Element::new("div").child(Element::page("pdf-page").size(100, 100)),
            Element::page("pdf-page").size(100, 100),
        ]);
        let report = RenderedReport::layout(root, &LayoutOptions::default());
        let pages = discover_pages(&report, &ExportConfig::default(), &RecordingSink::new()).unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(pages.iter().map(|p| p.index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(pages.windows(2).all(|w| w[0].node < w[1].node));
    }

    #[test]
    fn missing_markers_fail_even_with_page_sized_candidates() {
        let root = Element::new("body").children([
            Element::new("div").class("page").size(794, 1123),
            Element::new("div").class("page").size(794, 1123),
        ]);
        let report = RenderedReport::layout(root, &LayoutOptions::default());
        assert_eq!(diagnostic_scan(&report, 500).len(), 3);

        let sink = RecordingSink::new();
        let err = discover_pages(&report, &ExportConfig::default(), &sink).unwrap_err();
        assert!(matches!(err, Error::NoPagesFound));
        let events = sink.of_stage(Stage::Discovery);
        assert!(matches!(events[0].outcome, Outcome::Failed(_)));
    }
}
