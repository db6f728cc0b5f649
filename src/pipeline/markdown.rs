//! Markdown → HTML body, via comrak.
//!
//! Enabled syntax: tables, fenced code with class-based syntax highlighting,
//! heading anchors, `---` front matter and MultiMarkdown metadata (parsed,
//! never rendered), definition lists, footnotes, raw HTML passthrough,
//! Markdown inside `markdown="1"` elements and `{: …}` attribute lists. A
//! paragraph consisting of just `[TOC]` is replaced by a nested list linking
//! every heading.
//!
//! Conversion is total: any input yields some HTML.

use super::extensions::{self, AttrList};
use comrak::html::collect_text;
use comrak::nodes::{AstNode, NodeValue};
use comrak::plugins::syntect::SyntectAdapter;
use comrak::{format_html_with_plugins, parse_document, Anchorizer, Arena, Options, Plugins};
use once_cell::sync::Lazy;
use tracing::warn;

/// Marker paragraph replaced by the table of contents.
pub const TOC_MARKER: &str = "<p>[TOC]</p>";

// Loading the bundled syntax definitions takes tens of milliseconds.
static HIGHLIGHTER: Lazy<SyntectAdapter> = Lazy::new(|| SyntectAdapter::new(None));

/// Parser and renderer options used for every document.
pub fn default_options() -> Options<'static> {
    let mut options = Options::default();
    configure_extensions(&mut options);
    options
}

fn configure_extensions(options: &mut Options<'static>) {
    let ext = &mut options.extension;
    ext.table = true;
    ext.footnotes = true;
    ext.description_lists = true;
    ext.front_matter_delimiter = Some("---".to_string());
    ext.header_ids = Some(String::new());

    let render = &mut options.render;
    render.github_pre_lang = true;
    render.unsafe_ = true;
}

/// Render Markdown to an HTML fragment (no `<html>`/`<body>` wrapper).
pub fn markdown_to_html(markdown: &str) -> String {
    render_fragment(extensions::strip_metadata(markdown))
}

/// Everything but metadata stripping, which only applies at the top of a
/// document and not to Markdown nested inside HTML.
fn render_fragment(markdown: &str) -> String {
    let (markdown, blocks) = extensions::extract_markdown_blocks(markdown);

    let options = default_options();
    let arena = Arena::new();
    let root = parse_document(&arena, &markdown, &options);
    let attr_lists = extensions::lift_attr_lists(&arena, root);

    let mut plugins = Plugins::default();
    plugins.render.codefence_syntax_highlighter = Some(&*HIGHLIGHTER);

    let mut buf = Vec::with_capacity(markdown.len() * 2);
    if let Err(e) = format_html_with_plugins(root, &options, &mut buf, &plugins) {
        warn!("HTML rendering stopped early: {}", e);
    }
    let html = String::from_utf8(buf)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());
    let mut html = extensions::apply_attr_lists(&html, &attr_lists);

    if html.contains(TOC_MARKER) {
        let toc = render_toc(&collect_headings(root, &attr_lists));
        html = html.replace(TOC_MARKER, &toc);
    }

    if blocks.is_empty() {
        return html;
    }
    let rendered: Vec<String> = blocks
        .iter()
        .map(|block| block.wrap(&render_fragment(&block.content)))
        .collect();
    extensions::splice_markdown_blocks(&html, &rendered)
}

// ── Table of contents ────────────────────────────────────────────────────

/// One heading as it appears in the rendered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub level: u8,
    /// Anchor id, identical to the one comrak emits for the heading.
    pub id: String,
    pub text: String,
}

/// Headings in document order, anchorized the same way the renderer does.
/// An `{: #id}` on the heading wins over the generated id.
fn collect_headings<'a>(root: &'a AstNode<'a>, attr_lists: &[AttrList]) -> Vec<TocEntry> {
    let mut anchorizer = Anchorizer::new();
    root.descendants()
        .filter_map(|node| {
            let level = match node.data.borrow().value {
                NodeValue::Heading(ref h) => h.level,
                _ => return None,
            };
            let mut raw = Vec::new();
            collect_text(node, &mut raw);
            let text = String::from_utf8_lossy(&raw).into_owned();
            let generated = anchorizer.anchorize(text.clone());
            let id = explicit_id(node, attr_lists).unwrap_or(generated);
            Some(TocEntry { level, id, text })
        })
        .collect()
}

fn explicit_id<'a>(heading: &'a AstNode<'a>, attr_lists: &[AttrList]) -> Option<String> {
    let first = heading.first_child()?;
    let index = match first.data.borrow().value {
        NodeValue::HtmlInline(ref literal) => extensions::attr_marker_index(literal)?,
        _ => return None,
    };
    attr_lists.get(index)?.id.clone()
}

/// Nested `<ul>` list of links; deeper headings nest inside the preceding
/// shallower one.
pub fn render_toc(entries: &[TocEntry]) -> String {
    let mut out = String::from("<div class=\"toc\">\n");
    let mut open: Vec<u8> = Vec::new();

    for entry in entries {
        match open.last().copied() {
            None => {
                out.push_str("<ul>\n");
                open.push(entry.level);
            }
            Some(top) if entry.level > top => {
                out.push_str("\n<ul>\n");
                open.push(entry.level);
            }
            Some(_) => {
                out.push_str("</li>\n");
                while open.len() > 1 && open.last().is_some_and(|&top| entry.level < top) {
                    open.pop();
                    out.push_str("</ul>\n</li>\n");
                }
            }
        }
        out.push_str(&format!(
            "<li><a href=\"#{}\">{}</a>",
            html_escape::encode_double_quoted_attribute(&entry.id),
            html_escape::encode_text(&entry.text)
        ));
    }

    if !open.is_empty() {
        out.push_str("</li>\n");
        while open.pop().is_some() {
            out.push_str("</ul>\n");
            if !open.is_empty() {
                out.push_str("</li>\n");
            }
        }
    }

    out.push_str("</div>");
    out
}
