//! Rendered report tree
//!
//! A `RenderedReport` is an arena of laid-out nodes. It is produced from an
//! [`Element`] description (built by hand or parsed from HTML by
//! [`html::parse_report`]) and is immutable apart from style toggles used to
//! show or hide nodes. Node order in the arena is document (pre-order) order.

pub mod html;
pub mod template;

use crate::rendering::layout::{self, LayoutOptions, Rect};
use crate::resources::image::{CrossOrigin, ImageResource};
use image::Rgb;

/// Index of a node inside a [`RenderedReport`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Display {
    #[default]
    Block,
    /// Children are laid out left to right, wrapping at the content width
    Flex,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// The subset of computed style the layout and capture passes understand
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Style {
    pub display: Display,
    /// `None` inherits from the parent
    pub visibility: Option<Visibility>,
    pub background: Option<Rgb<u8>>,
    pub color: Option<Rgb<u8>>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub padding: u32,
    pub margin: u32,
}

/// Unlaid element description used to build a report tree
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub tag: String,
    pub classes: Vec<String>,
    pub style: Style,
    pub text: Option<String>,
    pub image_src: Option<String>,
    pub cross_origin: Option<CrossOrigin>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    /// A block carrying the given page-marker class
    pub fn page(marker_class: &str) -> Self {
        Self::new("div").class(marker_class)
    }

    pub fn image(src: &str) -> Self {
        Self {
            image_src: Some(src.to_string()),
            ..Self::new("img")
        }
    }

    pub fn class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.style.width = Some(width);
        self.style.height = Some(height);
        self
    }

    pub fn display(mut self, display: Display) -> Self {
        self.style.display = display;
        self
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children);
        self
    }
}

/// One laid-out node of the report tree
#[derive(Debug, Clone)]
pub struct Node {
    pub tag: String,
    pub classes: Vec<String>,
    pub style: Style,
    pub rect: Rect,
    pub text: Option<String>,
    pub image: Option<ImageResource>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// A fully laid-out report, ready to be exported
#[derive(Debug, Clone)]
pub struct RenderedReport {
    nodes: Vec<Node>,
}

impl RenderedReport {
    /// Lay out `root` and build the report arena.
    pub fn layout(root: Element, options: &LayoutOptions) -> Self {
        Self {
            nodes: layout::layout_tree(root, options),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// The node and all of its descendants, in document order.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            out.push(cur);
            // Push children in reverse so the traversal preserves document order.
            stack.extend(self.nodes[cur.0].children.iter().rev().copied());
        }
        out
    }

    /// All nodes carrying `class`, in document order.
    pub fn find_by_class(&self, class: &str) -> Vec<NodeId> {
        self.nodes()
            .filter(|(_, n)| n.has_class(class))
            .map(|(id, _)| id)
            .collect()
    }

    /// Image resources embedded under `id` (inclusive), in document order.
    pub fn images_in(&self, id: NodeId) -> Vec<ImageResource> {
        self.subtree(id)
            .into_iter()
            .filter_map(|n| self.nodes[n.0].image.clone())
            .collect()
    }

    /// Width and height of the area covered by the node and its descendants,
    /// measured from the node's own origin.
    pub fn scroll_size(&self, id: NodeId) -> (u32, u32) {
        let origin = &self.nodes[id.0].rect;
        let mut right = origin.x + origin.width as i32;
        let mut bottom = origin.y + origin.height as i32;
        for n in self.subtree(id) {
            let r = &self.nodes[n.0].rect;
            if r.width == 0 && r.height == 0 {
                continue;
            }
            right = right.max(r.x + r.width as i32);
            bottom = bottom.max(r.y + r.height as i32);
        }
        (
            (right - origin.x).max(0) as u32,
            (bottom - origin.y).max(0) as u32,
        )
    }

    /// Whether the node would be painted: no `display:none` on it or any
    /// ancestor, and a computed visibility of visible.
    pub fn is_rendered(&self, id: NodeId) -> bool {
        let mut visibility = None;
        let mut cur = Some(id);
        while let Some(n) = cur {
            let node = &self.nodes[n.0];
            if node.style.display == Display::None {
                return false;
            }
            if visibility.is_none() {
                visibility = node.style.visibility;
            }
            cur = node.parent;
        }
        visibility != Some(Visibility::Hidden)
    }

    /// Change a node's display after layout, as a UI toggling a section would.
    /// Geometry is left untouched.
    pub fn set_display(&mut self, id: NodeId, display: Display) {
        self.nodes[id.0].style.display = display;
    }

    pub fn set_visibility(&mut self, id: NodeId, visibility: Option<Visibility>) {
        self.nodes[id.0].style.visibility = visibility;
    }

    /// Build an image resource for a laid-out `img` node.
    pub(crate) fn make_image(src: &str, cross_origin: Option<CrossOrigin>) -> ImageResource {
        let image = ImageResource::new(src);
        if let Some(mode) = cross_origin {
            image.set_cross_origin(mode);
        }
        image
    }
}
