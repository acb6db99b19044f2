/// Layout primitives for report trees
///
/// The layout model is deliberately small: blocks stack vertically, `flex`
/// containers place children left to right and wrap, text wraps on a fixed
/// character grid, and explicit `width`/`height` always win over content.
use crate::report::{Display, Element, Node, NodeId, RenderedReport};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }
}

/// Layout parameters. The defaults match an A4 sheet at 96 dpi.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    /// Width available to the root element
    pub viewport_width: u32,
    /// Height of one wrapped text line
    pub line_height: u32,
    /// Advance of one character on the text grid
    pub char_width: u32,
    /// Size of an image without explicit dimensions
    pub image_width: u32,
    pub image_height: u32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            viewport_width: 794,
            line_height: 16,
            char_width: 8,
            image_width: 240,
            image_height: 180,
        }
    }
}

/// Lay out `root` into a node arena in document order.
pub fn layout_tree(root: Element, options: &LayoutOptions) -> Vec<Node> {
    let mut nodes = Vec::new();
    place(root, None, 0, 0, options.viewport_width, false, options, &mut nodes);
    nodes
}

/// Wrap `text` into lines that fit `width` on the character grid.
pub fn wrap_text(text: &str, width: u32, char_width: u32) -> Vec<String> {
    let chars_per_line = if char_width > 0 && width >= char_width {
        (width / char_width) as usize
    } else {
        1
    };
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut cur = String::new();
        for word in paragraph.split_whitespace() {
            if !cur.is_empty() && cur.chars().count() + word.chars().count() + 1 > chars_per_line {
                lines.push(std::mem::take(&mut cur));
            }
            if !cur.is_empty() {
                cur.push(' ');
            }
            cur.push_str(word);
        }
        if !cur.is_empty() {
            lines.push(cur);
        }
    }
    lines
}

/// Outer width an element will claim before it is placed.
fn outer_width(el: &Element, avail: u32, options: &LayoutOptions) -> u32 {
    if el.style.display == Display::None {
        return 0;
    }
    let fallback = if el.image_src.is_some() {
        options.image_width
    } else {
        avail.saturating_sub(el.style.margin * 2)
    };
    el.style.width.unwrap_or(fallback) + el.style.margin * 2
}

/// Place one element with its outer box at (`x`, `y`). Returns the node id
/// and the outer height consumed, margins included.
#[allow(clippy::too_many_arguments)]
fn place(
    el: Element,
    parent: Option<NodeId>,
    x: i32,
    y: i32,
    avail: u32,
    collapsed: bool,
    options: &LayoutOptions,
    nodes: &mut Vec<Node>,
) -> (NodeId, u32) {
    let Element {
        tag,
        classes,
        style,
        text,
        image_src,
        cross_origin,
        children,
    } = el;

    let collapsed = collapsed || style.display == Display::None;
    let id = NodeId(nodes.len());
    let image = image_src
        .as_deref()
        .map(|src| RenderedReport::make_image(src, cross_origin));
    let is_image = image.is_some();
    nodes.push(Node {
        tag,
        classes,
        style: style.clone(),
        rect: Rect::default(),
        text: text.clone(),
        image,
        parent,
        children: Vec::new(),
    });
    if let Some(p) = parent {
        nodes[p.0].children.push(id);
    }

    if collapsed {
        // Hidden subtrees keep their nodes but occupy no space.
        for child in children {
            place(child, Some(id), x, y, 0, true, options, nodes);
        }
        nodes[id.0].rect = Rect { x, y, width: 0, height: 0 };
        return (id, 0);
    }

    let margin = style.margin;
    let bx = x + margin as i32;
    let by = y + margin as i32;
    let width = style.width.unwrap_or(if is_image {
        options.image_width
    } else {
        avail.saturating_sub(margin * 2)
    });
    let pad = style.padding;
    let inner_w = width.saturating_sub(pad * 2);
    let content_x = bx + pad as i32;
    let mut cursor_y = by + pad as i32;

    if let Some(text) = &text {
        let lines = wrap_text(text, inner_w, options.char_width).len() as u32;
        cursor_y += (lines * options.line_height) as i32;
    }

    match style.display {
        Display::Flex => {
            let share = inner_w / (children.len().max(1) as u32);
            let (mut row_x, mut row_y, mut row_h) = (content_x, cursor_y, 0u32);
            for child in children {
                let ow = outer_width(&child, share, options);
                if row_x > content_x && row_x + ow as i32 > content_x + inner_w as i32 {
                    row_y += row_h as i32;
                    row_x = content_x;
                    row_h = 0;
                }
                let (_, oh) = place(child, Some(id), row_x, row_y, share, false, options, nodes);
                row_x += ow as i32;
                row_h = row_h.max(oh);
            }
            cursor_y = row_y + row_h as i32;
        }
        _ => {
            for child in children {
                let (_, oh) = place(child, Some(id), content_x, cursor_y, inner_w, false, options, nodes);
                cursor_y += oh as i32;
            }
        }
    }

    let content_h = (cursor_y - by) as u32 + pad;
    let height = style.height.unwrap_or(if is_image {
        options.image_height
    } else {
        content_h
    });
    nodes[id.0].rect = Rect {
        x: bx,
        y: by,
        width,
        height,
    };
    (id, height + margin * 2)
}
