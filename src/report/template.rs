//! Inspection report markup
//!
//! Produces one fixed-size `pdf-page` block for the header and, per
//! environment, one block for every `photos_per_page` photos. The markup uses
//! only the style subset [`super::html::parse_report`] understands.

use crate::inspection::{
    AuthContext, Condominium, Environment, Inspection, InspectionSource, PhotoMeta, UserProfile,
};
use crate::Result;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateOptions {
    pub photos_per_page: usize,
    pub marker_class: String,
    pub page_width: u32,
    pub page_height: u32,
    pub photo_width: u32,
    pub photo_height: u32,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            photos_per_page: 6,
            marker_class: "pdf-page".to_string(),
            page_width: 794,
            page_height: 1123,
            photo_width: 230,
            photo_height: 172,
        }
    }
}

/// An inspection with its header lookups resolved
#[derive(Debug, Clone, Default)]
pub struct ReportContext {
    pub inspection: Inspection,
    pub condominium: Option<Condominium>,
    pub inspector: Option<UserProfile>,
}

impl ReportContext {
    /// Look up an inspection and its header records.
    ///
    /// When the stored inspector is unknown the signed-in user is named instead.
    pub fn resolve(
        source: &dyn InspectionSource,
        auth: &dyn AuthContext,
        inspection_id: &str,
    ) -> Result<Self> {
        let inspection = source.inspection(inspection_id)?;
        let condominium = source.condominium(&inspection.condominium_id)?;
        let inspector = match source.user(&inspection.inspector_id)? {
            Some(user) => Some(user),
            None => auth.current_user(),
        };
        Ok(Self {
            inspection,
            condominium,
            inspector,
        })
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Number of page blocks `env` will occupy.
pub fn environment_page_count(env: &Environment, photos_per_page: usize) -> usize {
    let per_page = photos_per_page.max(1);
    env.all_photos().len().div_ceil(per_page).max(1)
}

/// Render the complete report document.
pub fn render_report_html(ctx: &ReportContext, options: &TemplateOptions) -> String {
    let mut html = String::new();
    let insp = &ctx.inspection;
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body style=\"background:#ffffff\">\n",
        escape_html(&insp.title)
    );

    open_page(&mut html, options);
    let _ = writeln!(html, "<h1 style=\"margin:8px\">{}</h1>", escape_html(&insp.title));
    if let Some(c) = &ctx.condominium {
        let _ = writeln!(html, "<p>Condominium: {}</p>", escape_html(&c.name));
        if !c.address.is_empty() {
            let _ = writeln!(html, "<p>Address: {}</p>", escape_html(&c.address));
        }
    }
    if let Some(u) = &ctx.inspector {
        let _ = writeln!(html, "<p>Inspector: {}</p>", escape_html(&u.name));
    }
    let _ = writeln!(html, "<p>Date: {}</p>", escape_html(&insp.date));
    if let Some(w) = &insp.weather_note {
        let _ = writeln!(html, "<p>Weather: {}</p>", escape_html(w));
    }
    let _ = writeln!(html, "<p>Environments: {}</p>", insp.environments.len());
    html.push_str("</div>\n");

    for env in &insp.environments {
        render_environment(&mut html, env, options);
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn open_page(html: &mut String, options: &TemplateOptions) {
    let _ = writeln!(
        html,
        "<div class=\"{}\" style=\"width:{}px;height:{}px;padding:24px;background:#ffffff\">",
        escape_html(&options.marker_class),
        options.page_width,
        options.page_height
    );
}

fn render_environment(html: &mut String, env: &Environment, options: &TemplateOptions) {
    let photos = env.all_photos();
    let per_page = options.photos_per_page.max(1);
    let pages = environment_page_count(env, per_page);
    for page in 0..pages {
        open_page(html, options);
        let suffix = if pages > 1 {
            format!(" ({}/{})", page + 1, pages)
        } else {
            String::new()
        };
        let _ = writeln!(html, "<h2>{}{}</h2>", escape_html(&env.name), suffix);
        if page == 0 {
            render_items(html, env);
        }
        let chunk = photos.iter().skip(page * per_page).take(per_page);
        html.push_str("<div class=\"photo-grid\" style=\"display:flex\">\n");
        for photo in chunk {
            render_photo(html, photo, options);
        }
        html.push_str("</div>\n</div>\n");
    }
}

fn render_items(html: &mut String, env: &Environment) {
    for group in &env.groups {
        let _ = writeln!(html, "<h3>{}</h3>", escape_html(&group.name));
        for item in &group.items {
            let mut line = escape_html(&item.name);
            if let Some(cond) = &item.condition {
                let _ = write!(line, ": {}", escape_html(cond));
            }
            if let Some(notes) = &item.notes {
                let _ = write!(line, " ({})", escape_html(notes));
            }
            let _ = writeln!(html, "<p>{}</p>", line);
        }
    }
}

fn render_photo(html: &mut String, photo: &PhotoMeta, options: &TemplateOptions) {
    let _ = writeln!(
        html,
        "<div class=\"photo\" style=\"width:{}px;margin:4px\"><img src=\"{}\" crossorigin=\"anonymous\" width=\"{}\" height=\"{}\">",
        options.photo_width,
        escape_html(&photo.file_locator),
        options.photo_width,
        options.photo_height
    );
    let caption = photo
        .description
        .as_deref()
        .filter(|d| !d.is_empty())
        .unwrap_or(&photo.display_name);
    if !caption.is_empty() {
        let _ = writeln!(html, "<p>{}</p>", escape_html(caption));
    }
    html.push_str("</div>\n");
}
