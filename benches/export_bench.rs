use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::RgbImage;
use vistoria_pdf::capture::{Bitmap, CaptureBackend, WHITE};
use vistoria_pdf::document::DocumentAssembler;
use vistoria_pdf::inspection::{Environment, Inspection, PhotoMeta};
use vistoria_pdf::rasterizer::{encode_frame, primary_options};
use vistoria_pdf::rendering::layout::LayoutOptions;
use vistoria_pdf::rendering::raster::SoftwareBackend;
use vistoria_pdf::report::template::{render_report_html, ReportContext, TemplateOptions};
use vistoria_pdf::{ExportConfig, RenderedReport};

fn sample_context() -> ReportContext {
    let environments = (0..4)
        .map(|e| Environment {
            name: format!("Ambiente {e}"),
            photos: (0..9)
                .map(|p| PhotoMeta {
                    file_locator: format!("fotos/{e}-{p}.jpg"),
                    description: Some(format!("Foto {p} do ambiente {e}")),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        })
        .collect();
    ReportContext {
        inspection: Inspection {
            title: "Vistoria de benchmark".into(),
            environments,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn bench_parse(c: &mut Criterion) {
    let html = render_report_html(&sample_context(), &TemplateOptions::default());
    let layout = LayoutOptions::default();
    c.bench_function("parse_and_layout_report", |b| {
        b.iter(|| RenderedReport::from_html(black_box(&html), &layout).unwrap())
    });
}

fn bench_capture(c: &mut Criterion) {
    let html = render_report_html(&sample_context(), &TemplateOptions::default());
    let report = RenderedReport::from_html(&html, &LayoutOptions::default()).unwrap();
    let page = report.find_by_class("pdf-page")[1];
    let mut options = primary_options(&report, page, &ExportConfig::default());
    // Unloaded photos become placeholders without waiting.
    options.image_timeout = std::time::Duration::ZERO;
    let backend = SoftwareBackend::new();
    let rt = tokio::runtime::Runtime::new().unwrap();
    c.bench_function("software_capture_page", |b| {
        b.iter(|| rt.block_on(backend.capture(&report, page, &options)).unwrap())
    });
}

fn bench_assemble(c: &mut Criterion) {
    let frame = encode_frame(
        &Bitmap {
            pixels: RgbImage::from_pixel(960, 1348, WHITE),
        },
        0.8,
    )
    .unwrap();
    c.bench_function("assemble_ten_pages", |b| {
        b.iter(|| {
            let mut asm = DocumentAssembler::new();
            for i in 0..10 {
                asm.add_frame(black_box(&frame), i == 0).unwrap();
            }
            asm.finalize().unwrap()
        })
    });
}

criterion_group!(benches, bench_parse, bench_capture, bench_assemble);
criterion_main!(benches);
