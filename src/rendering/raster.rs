/// Software capture backend
///
/// Paints a report subtree into an RGB surface. Photos are drawn from their
/// decoded pixels; images that never finished loading become a grey
/// placeholder. Text is drawn as solid glyph cells on the layout grid, which
/// keeps captures deterministic without a font stack.
use crate::capture::{Background, Bitmap, CaptureBackend, CaptureOptions};
use crate::error::CaptureError;
use crate::rendering::layout::LayoutOptions;
use crate::rendering::paint::{paint_subtree, PaintCommand};
use crate::report::{NodeId, RenderedReport};
use crate::resources::tracker::wait_until_ready;
use crate::resources::ImageResource;
use futures::future::BoxFuture;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage, RgbaImage};

const PLACEHOLDER_FILL: Rgb<u8> = Rgb([224, 224, 224]);
const PLACEHOLDER_EDGE: Rgb<u8> = Rgb([160, 160, 160]);

#[derive(Debug, Clone)]
pub struct SoftwareBackend {
    layout: LayoutOptions,
    max_pixels: u64,
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self {
            layout: LayoutOptions::default(),
            max_pixels: 16384 * 16384,
        }
    }

    /// Use the text grid the report was laid out with.
    pub fn with_layout(mut self, layout: LayoutOptions) -> Self {
        self.layout = layout;
        self
    }

    /// Refuse surfaces larger than `max_pixels`.
    pub fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = max_pixels;
        self
    }

    async fn render(
        &self,
        report: &RenderedReport,
        node: NodeId,
        options: &CaptureOptions,
    ) -> Result<Bitmap, CaptureError> {
        let (width, height) = options.surface_size();
        if width == 0 || height == 0 {
            return Err(CaptureError::Render(format!(
                "empty capture surface {}x{}",
                width, height
            )));
        }
        if width as u64 * height as u64 > self.max_pixels {
            return Err(CaptureError::CanvasTooLarge { width, height });
        }

        let forced = matches!(options.background, Background::Forced(_));
        let commands = paint_subtree(report, node, &self.layout, !forced);

        for cmd in &commands {
            if let PaintCommand::Image { image, .. } = cmd {
                check_taint(image, options)?;
                if !image.is_complete() {
                    wait_until_ready(image, options.image_timeout).await;
                }
            }
        }

        let mut surface = RgbImage::from_pixel(width, height, options.background.color());
        let s = options.scale;
        for cmd in &commands {
            match cmd {
                PaintCommand::SolidRect {
                    x,
                    y,
                    width,
                    height,
                    rgb,
                } => fill_rect(&mut surface, scale_rect(*x, *y, *width, *height, s), *rgb),
                PaintCommand::Image {
                    x,
                    y,
                    width,
                    height,
                    image,
                } => {
                    let area = scale_rect(*x, *y, *width, *height, s);
                    match image.pixels() {
                        Some(px) if px.width() > 0 && px.height() > 0 => {
                            draw_image(&mut surface, area, &px)
                        }
                        _ => draw_placeholder(&mut surface, area),
                    }
                }
                PaintCommand::Text { x, y, text, rgb } => {
                    draw_text(&mut surface, *x, *y, text, *rgb, &self.layout, s)
                }
            }
        }

        Ok(Bitmap { pixels: surface })
    }
}

impl CaptureBackend for SoftwareBackend {
    fn capture<'a>(
        &'a self,
        report: &'a RenderedReport,
        node: NodeId,
        options: &'a CaptureOptions,
    ) -> BoxFuture<'a, Result<Bitmap, CaptureError>> {
        Box::pin(self.render(report, node, options))
    }
}

/// A remote image without CORS consent taints the surface unless tainting is
/// allowed or the capture clone re-marks every image as anonymous.
fn check_taint(image: &ImageResource, options: &CaptureOptions) -> Result<(), CaptureError> {
    let cors_safe = options.normalize_cross_origin || image.cross_origin().is_some();
    if image.is_remote() && options.use_cors && !cors_safe && !options.allow_taint {
        return Err(CaptureError::Tainted(image.src()));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Area {
    x: i64,
    y: i64,
    w: u32,
    h: u32,
}

fn scale_rect(x: i32, y: i32, width: u32, height: u32, s: f32) -> Area {
    Area {
        x: (x as f32 * s).round() as i64,
        y: (y as f32 * s).round() as i64,
        w: (width as f32 * s).round() as u32,
        h: (height as f32 * s).round() as u32,
    }
}

fn fill_rect(surface: &mut RgbImage, area: Area, rgb: Rgb<u8>) {
    let (sw, sh) = (surface.width() as i64, surface.height() as i64);
    let x0 = area.x.clamp(0, sw);
    let y0 = area.y.clamp(0, sh);
    let x1 = (area.x + area.w as i64).clamp(0, sw);
    let y1 = (area.y + area.h as i64).clamp(0, sh);
    for py in y0..y1 {
        for px in x0..x1 {
            surface.put_pixel(px as u32, py as u32, rgb);
        }
    }
}

fn draw_placeholder(surface: &mut RgbImage, area: Area) {
    fill_rect(surface, area, PLACEHOLDER_EDGE);
    if area.w > 2 && area.h > 2 {
        let inner = Area {
            x: area.x + 1,
            y: area.y + 1,
            w: area.w - 2,
            h: area.h - 2,
        };
        fill_rect(surface, inner, PLACEHOLDER_FILL);
    }
}

/// Stretch `pixels` over `area`, blending alpha onto the surface.
fn draw_image(surface: &mut RgbImage, area: Area, pixels: &RgbaImage) {
    if area.w == 0 || area.h == 0 {
        return;
    }
    let scaled = imageops::resize(pixels, area.w, area.h, FilterType::Triangle);
    let (sw, sh) = (surface.width() as i64, surface.height() as i64);
    for (ix, iy, px) in scaled.enumerate_pixels() {
        let tx = area.x + ix as i64;
        let ty = area.y + iy as i64;
        if tx < 0 || ty < 0 || tx >= sw || ty >= sh {
            continue;
        }
        let [r, g, b, a] = px.0;
        let dst = surface.get_pixel_mut(tx as u32, ty as u32);
        let alpha = a as u32;
        for (d, s) in dst.0.iter_mut().zip([r, g, b]) {
            *d = ((s as u32 * alpha + *d as u32 * (255 - alpha)) / 255) as u8;
        }
    }
}

fn draw_text(
    surface: &mut RgbImage,
    x: i32,
    y: i32,
    text: &str,
    rgb: Rgb<u8>,
    layout: &LayoutOptions,
    s: f32,
) {
    let cell_w = layout.char_width;
    let glyph_w = (cell_w * 3 / 4).max(1);
    let glyph_h = (layout.line_height / 2).max(1);
    let top = y + (layout.line_height / 4) as i32;
    for (i, ch) in text.chars().enumerate() {
        if ch.is_whitespace() {
            continue;
        }
        let gx = x + (i as u32 * cell_w) as i32;
        fill_rect(surface, scale_rect(gx, top, glyph_w, glyph_h, s), rgb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::WHITE;
    use crate::report::{Element, Style};
    use crate::resources::CrossOrigin;
    use image::Rgba;
    use std::time::Duration;

    fn options(width: u32, height: u32, scale: f32) -> CaptureOptions {
        CaptureOptions {
            scale,
            background: Background::Forced(WHITE),
            use_cors: true,
            allow_taint: false,
            width,
            height,
            image_timeout: Duration::from_millis(10),
            normalize_cross_origin: true,
        }
    }

    fn page_with_image(src: &str) -> RenderedReport {
        let root = Element::page("pdf-page")
            .size(100, 100)
            .child(Element::image(src).size(50, 50));
        RenderedReport::layout(root, &LayoutOptions::default())
    }

    #[tokio::test]
    async fn loaded_photo_is_drawn_scaled() {
        let report = page_with_image("red.png");
        let img = &report.images_in(report.root())[0];
        img.complete(RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])));

        let bmp = SoftwareBackend::new()
            .capture(&report, report.root(), &options(100, 100, 2.0))
            .await
            .unwrap();
        assert_eq!((bmp.width(), bmp.height()), (200, 200));
        assert_eq!(bmp.pixels.get_pixel(50, 50), &Rgb([255, 0, 0]));
        assert_eq!(bmp.pixels.get_pixel(150, 150), &WHITE);
    }

    #[tokio::test]
    async fn unfinished_photo_becomes_placeholder() {
        let report = page_with_image("never.png");
        let bmp = SoftwareBackend::new()
            .capture(&report, report.root(), &options(100, 100, 1.0))
            .await
            .unwrap();
        assert_eq!(bmp.pixels.get_pixel(25, 25), &PLACEHOLDER_FILL);
        assert_eq!(bmp.pixels.get_pixel(0, 0), &PLACEHOLDER_EDGE);
    }

    #[tokio::test]
    async fn forced_background_overrides_page_colour() {
        let root = Element::page("pdf-page").style(Style {
            width: Some(40),
            height: Some(40),
            background: Some(Rgb([0, 0, 255])),
            ..Default::default()
        });
        let report = RenderedReport::layout(root, &LayoutOptions::default());
        let backend = SoftwareBackend::new();

        let forced = backend.capture(&report, report.root(), &options(40, 40, 1.0)).await.unwrap();
        assert_eq!(forced.pixels.get_pixel(10, 10), &WHITE);

        let mut fill = options(40, 40, 1.0);
        fill.background = Background::Fill(WHITE);
        let filled = backend.capture(&report, report.root(), &fill).await.unwrap();
        assert_eq!(filled.pixels.get_pixel(10, 10), &Rgb([0, 0, 255]));
    }

    #[tokio::test]
    async fn remote_image_without_cors_taints_strict_capture() {
        let report = page_with_image("https://cdn.example/p.jpg");
        let backend = SoftwareBackend::new();
        let mut strict = options(100, 100, 1.0);
        strict.normalize_cross_origin = false;
        let err = backend.capture(&report, report.root(), &strict).await.unwrap_err();
        assert!(matches!(err, CaptureError::Tainted(_)));

        let relaxed = CaptureOptions {
            use_cors: false,
            allow_taint: true,
            ..strict.clone()
        };
        assert!(backend.capture(&report, report.root(), &relaxed).await.is_ok());

        report.images_in(report.root())[0].set_cross_origin(CrossOrigin::Anonymous);
        assert!(backend.capture(&report, report.root(), &strict).await.is_ok());
    }

    #[tokio::test]
    async fn oversized_surface_is_rejected() {
        let report = page_with_image("a.png");
        let backend = SoftwareBackend::new().with_max_pixels(1000);
        let err = backend
            .capture(&report, report.root(), &options(100, 100, 1.0))
            .await
            .unwrap_err();
        assert_eq!(err, CaptureError::CanvasTooLarge { width: 100, height: 100 });
    }
}
