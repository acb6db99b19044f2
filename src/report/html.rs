//! HTML to report tree
//!
//! Understands the markup the report template produces: block elements,
//! `display:flex` photo grids, `<img>` nodes, and inline `style` attributes
//! carrying pixel sizes, colours, display and visibility. Inline elements
//! (`span`, `strong`, ...) contribute their text to the enclosing block.

use super::{Display, Element, RenderedReport, Style, Visibility};
use crate::rendering::layout::LayoutOptions;
use crate::resources::CrossOrigin;
use crate::{Error, Result};
use image::Rgb;
use scraper::{ElementRef, Html, Selector};

const INLINE_TAGS: &[&str] = &[
    "a", "b", "em", "i", "label", "small", "span", "strong", "sub", "sup", "time", "u",
];
const SKIPPED_TAGS: &[&str] = &["head", "script", "style", "template", "noscript", "br"];

impl RenderedReport {
    /// Parse and lay out report markup.
    pub fn from_html(html: &str, options: &LayoutOptions) -> Result<Self> {
        parse_report(html, options)
    }
}

/// Parse report markup into a laid-out [`RenderedReport`]. The `<body>`
/// element becomes the root.
pub fn parse_report(html: &str, options: &LayoutOptions) -> Result<RenderedReport> {
    if html.trim().is_empty() {
        return Err(Error::InvalidReport("empty document".into()));
    }
    let document = Html::parse_document(html);
    let body_sel = Selector::parse("body")
        .map_err(|e| Error::InvalidReport(format!("selector error: {:?}", e)))?;
    let root = document
        .select(&body_sel)
        .next()
        .unwrap_or_else(|| document.root_element());
    Ok(RenderedReport::layout(convert(root), options))
}

fn convert(el: ElementRef) -> Element {
    let value = el.value();
    let tag = value.name().to_ascii_lowercase();
    let mut out = Element::new(&tag);
    out.classes = value.classes().map(|c| c.to_string()).collect();
    out.style = parse_style(value.attr("style").unwrap_or(""));
    if value.attr("hidden").is_some() {
        out.style.display = Display::None;
    }

    if tag == "img" {
        out.image_src = value.attr("src").map(|s| s.to_string());
        out.cross_origin = value.attr("crossorigin").map(|v| match v {
            "use-credentials" => CrossOrigin::UseCredentials,
            _ => CrossOrigin::Anonymous,
        });
        if out.style.width.is_none() {
            out.style.width = value.attr("width").and_then(parse_px);
        }
        if out.style.height.is_none() {
            out.style.height = value.attr("height").and_then(parse_px);
        }
        return out;
    }

    let mut text = String::new();
    for child in el.children() {
        if let Some(t) = child.value().as_text() {
            push_text(&mut text, t);
            continue;
        }
        let Some(child_el) = ElementRef::wrap(child) else {
            continue;
        };
        let child_tag = child_el.value().name().to_ascii_lowercase();
        if SKIPPED_TAGS.contains(&child_tag.as_str()) {
            continue;
        }
        if INLINE_TAGS.contains(&child_tag.as_str()) {
            push_text(&mut text, &child_el.text().collect::<String>());
        } else {
            out.children.push(convert(child_el));
        }
    }
    if !text.is_empty() {
        out.text = Some(text);
    }
    out
}

fn push_text(buf: &mut String, raw: &str) {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return;
    }
    if !buf.is_empty() {
        buf.push(' ');
    }
    buf.push_str(&collapsed);
}

/// Parse the supported subset of an inline `style` attribute.
pub fn parse_style(style: &str) -> Style {
    let mut out = Style::default();
    for decl in style.split(';') {
        let Some((key, value)) = decl.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim().trim_end_matches("!important").trim().to_ascii_lowercase();
        match key.as_str() {
            "display" => {
                out.display = match value.as_str() {
                    "none" => Display::None,
                    "flex" | "inline-flex" | "grid" => Display::Flex,
                    _ => Display::Block,
                }
            }
            "visibility" => {
                out.visibility = match value.as_str() {
                    "hidden" | "collapse" => Some(Visibility::Hidden),
                    "visible" => Some(Visibility::Visible),
                    _ => None,
                }
            }
            "width" => out.width = parse_px(&value),
            "height" | "min-height" => {
                if let Some(h) = parse_px(&value) {
                    out.height = Some(out.height.map_or(h, |cur| cur.max(h)));
                }
            }
            "background" | "background-color" => {
                out.background = value.split_whitespace().find_map(parse_color)
            }
            "color" => out.color = parse_color(&value),
            "padding" => out.padding = first_px(&value).unwrap_or(0),
            "margin" => out.margin = first_px(&value).unwrap_or(0),
            _ => {}
        }
    }
    out
}

/// `"12px"` or `"12"` → 12. Other units are not supported.
pub fn parse_px(value: &str) -> Option<u32> {
    let v = value.trim();
    let num = v.strip_suffix("px").unwrap_or(v).trim();
    num.parse::<f32>()
        .ok()
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n.round() as u32)
}

fn first_px(value: &str) -> Option<u32> {
    value.split_whitespace().next().and_then(parse_px)
}

pub fn parse_color(value: &str) -> Option<Rgb<u8>> {
    let v = value.trim();
    if let Some(hex) = v.strip_prefix('#') {
        let digits: Vec<u8> = hex
            .chars()
            .map(|c| c.to_digit(16).map(|d| d as u8))
            .collect::<Option<Vec<_>>>()?;
        return match digits.len() {
            3 => Some(Rgb([digits[0] * 17, digits[1] * 17, digits[2] * 17])),
            6 => Some(Rgb([
                digits[0] * 16 + digits[1],
                digits[2] * 16 + digits[3],
                digits[4] * 16 + digits[5],
            ])),
            _ => None,
        };
    }
    match v {
        "white" => Some(Rgb([255, 255, 255])),
        "black" => Some(Rgb([0, 0, 0])),
        "gray" | "grey" => Some(Rgb([128, 128, 128])),
        "lightgray" | "lightgrey" => Some(Rgb([211, 211, 211])),
        "red" => Some(Rgb([255, 0, 0])),
        "green" => Some(Rgb([0, 128, 0])),
        "blue" => Some(Rgb([0, 0, 255])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"<!DOCTYPE html>
<html>
<head><title>Vistoria</title><style>.x{}</style></head>
<body>
  <div class="pdf-page" style="width:794px;height:1123px;background:#fff">
    <h1>Vistoria <strong>Bloco A</strong></h1>
    <div class="photo-grid" style="display:flex">
      <img src="photos/1.jpg" width="200" height="150">
      <img src="https://cdn.example/2.jpg" crossorigin="anonymous">
    </div>
  </div>
  <div class="pdf-page" style="width:794px;height:1123px;display:none"></div>
  <div class="pdf-page" hidden></div>
</body>
</html>"#;

    #[test]
    fn parses_pages_images_and_text() {
        let report = parse_report(REPORT, &LayoutOptions::default()).unwrap();
        assert_eq!(report.node(report.root()).tag, "body");
        let pages = report.find_by_class("pdf-page");
        assert_eq!(pages.len(), 3);
        assert_eq!(report.node(pages[0]).rect.height, 1123);
        assert_eq!(report.node(pages[0]).style.background, Some(Rgb([255, 255, 255])));

        let h1 = report
            .nodes()
            .find(|(_, n)| n.tag == "h1")
            .map(|(_, n)| n.clone())
            .unwrap();
        assert_eq!(h1.text.as_deref(), Some("Vistoria Bloco A"));

        let images = report.images_in(pages[0]);
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].src(), "photos/1.jpg");
        assert_eq!(images[1].cross_origin(), Some(CrossOrigin::Anonymous));
        let img_node = report.nodes().find(|(_, n)| n.image.is_some()).unwrap().1;
        assert_eq!((img_node.rect.width, img_node.rect.height), (200, 150));

        assert!(report.is_rendered(pages[0]));
        assert!(!report.is_rendered(pages[1]));
        assert!(!report.is_rendered(pages[2]));
    }

    #[test]
    fn style_parser_handles_units_and_colours() {
        let s = parse_style("width: 120px; height:40; color:#333; padding: 8px 4px; visibility:hidden");
        assert_eq!(s.width, Some(120));
        assert_eq!(s.height, Some(40));
        assert_eq!(s.color, Some(Rgb([0x33, 0x33, 0x33])));
        assert_eq!(s.padding, 8);
        assert_eq!(s.visibility, Some(Visibility::Hidden));
        assert_eq!(parse_px("10em"), None);
        assert_eq!(parse_color("#12ab34"), Some(Rgb([0x12, 0xab, 0x34])));
        assert_eq!(parse_color("transparent"), None);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            parse_report("   ", &LayoutOptions::default()),
            Err(Error::InvalidReport(_))
        ));
    }
}
