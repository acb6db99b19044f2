/// Paint command list for a report subtree
use crate::rendering::layout::{wrap_text, LayoutOptions};
use crate::report::{NodeId, RenderedReport};
use crate::resources::ImageResource;
use image::Rgb;

pub const TEXT_COLOR: Rgb<u8> = Rgb([34, 34, 34]);

/// Coordinates are CSS pixels relative to the painted root's origin.
#[derive(Debug, Clone)]
pub enum PaintCommand {
    SolidRect {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        rgb: Rgb<u8>,
    },
    Text {
        x: i32,
        y: i32,
        text: String,
        rgb: Rgb<u8>,
    },
    Image {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        image: ImageResource,
    },
}

/// Paint `root` and its rendered descendants in document order.
///
/// The root's own background is only emitted when `include_root_background`
/// is set, so a capture can force its own surface colour.
pub fn paint_subtree(
    report: &RenderedReport,
    root: NodeId,
    options: &LayoutOptions,
    include_root_background: bool,
) -> Vec<PaintCommand> {
    let origin = report.node(root).rect;
    let mut commands = Vec::new();

    for id in report.subtree(root) {
        if !report.is_rendered(id) {
            continue;
        }
        let node = report.node(id);
        let x = node.rect.x - origin.x;
        let y = node.rect.y - origin.y;

        if let Some(bg) = node.style.background {
            if id != root || include_root_background {
                commands.push(PaintCommand::SolidRect {
                    x,
                    y,
                    width: node.rect.width,
                    height: node.rect.height,
                    rgb: bg,
                });
            }
        }

        if let Some(image) = &node.image {
            commands.push(PaintCommand::Image {
                x,
                y,
                width: node.rect.width,
                height: node.rect.height,
                image: image.clone(),
            });
        }

        if let Some(text) = &node.text {
            let pad = node.style.padding as i32;
            let inner_w = node.rect.width.saturating_sub(node.style.padding * 2);
            let rgb = node.style.color.unwrap_or(TEXT_COLOR);
            for (i, line) in wrap_text(text, inner_w, options.char_width).into_iter().enumerate() {
                commands.push(PaintCommand::Text {
                    x: x + pad,
                    y: y + pad + (i as u32 * options.line_height) as i32,
                    text: line,
                    rgb,
                });
            }
        }
    }

    commands
}
