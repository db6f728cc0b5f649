//! Markdown syntax that comrak has no option for.
//!
//! - **Metadata header**: a leading block of MultiMarkdown `Key: value` lines
//!   is dropped before parsing. `---` front matter stays with comrak.
//! - **Markdown in HTML**: the content of a block-level element carrying
//!   `markdown="1"` (or `"block"`, `"span"`) is rendered as Markdown.
//! - **Attribute lists**: `{: #id .class key=value}` at the end of a heading
//!   or table cell, on the last line of a paragraph, or right after an image
//!   becomes attributes of that element.
//!
//! Both element rewrites work with placeholders. Markdown blocks are cut out
//! of the source and replaced by a comment line; attribute lists are lifted
//! out of the AST and leave a marker comment at the start of the element.
//! After rendering, [`splice_markdown_blocks`] and [`apply_attr_lists`] swap
//! the placeholders for real HTML.

use comrak::nodes::{AstNode, NodeValue};
use comrak::Arena;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::ops::Range;

const ATTR_MARKER_PREFIX: &str = "<!--md2pdf-attr:";
const BLOCK_MARKER_PREFIX: &str = "<!--md2pdf-block:";

// ── Metadata header ──────────────────────────────────────────────────────────

static RE_META_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^ {0,3}[A-Za-z0-9_-]+:").unwrap());
static RE_META_MORE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^ {4,}\S").unwrap());
static RE_META_BEGIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-{3}(\s.*)?$").unwrap());
static RE_META_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(-{3}|\.{3})(\s.*)?$").unwrap());

/// Drop a leading metadata block.
///
/// The block is a run of `Key: value` lines, each optionally followed by
/// lines indented four or more spaces, optionally opened by `---` and closed
/// by `---` or `...`. It ends at the first blank line or at the first line
/// that is neither a key nor a continuation; that line is kept.
///
/// A `---` block with a closing `---` line is left for comrak's front matter
/// support.
pub fn strip_metadata(markdown: &str) -> &str {
    let mut lines = markdown.split_inclusive('\n').peekable();
    let mut offset = 0;

    if let Some(first) = lines.peek() {
        if RE_META_BEGIN.is_match(first.trim_end()) {
            let closed = markdown
                .lines()
                .skip(1)
                .any(|line| line.trim_end() == "---");
            if closed {
                return markdown;
            }
            offset += first.len();
            lines.next();
        }
    }

    let mut seen_key = false;
    for line in lines {
        let text = line.trim_end_matches(['\r', '\n']);
        if RE_META_END.is_match(text) {
            offset += line.len();
            break;
        }
        if text.trim().is_empty() {
            break;
        }
        if RE_META_KEY.is_match(text) {
            seen_key = true;
        } else if !(seen_key && RE_META_MORE.is_match(text)) {
            break;
        }
        offset += line.len();
    }

    &markdown[offset..]
}

// ── Markdown inside HTML blocks ──────────────────────────────────────────────

static RE_BLOCK_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^ {0,3}<([A-Za-z][A-Za-z0-9-]*)(\s[^>]*)?>").unwrap());
static RE_MARKDOWN_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\s+markdown\s*=\s*(?:"(1|block|span)"|'(1|block|span)'|(1|block|span)\b)"#)
        .unwrap()
});
static RE_ANY_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(/?)([A-Za-z][A-Za-z0-9-]*)\b[^>]*?(/?)>").unwrap());
static RE_BLOCK_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<!--md2pdf-block:(\d+)-->").unwrap());

/// An element whose content must be rendered as Markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownBlock {
    /// Element name as written.
    pub tag: String,
    /// Opening tag without the `markdown` attribute.
    pub open_tag: String,
    /// Raw Markdown between the opening and closing tags.
    pub content: String,
    /// `markdown="span"`: render inline, without a wrapping paragraph.
    pub span: bool,
}

impl MarkdownBlock {
    /// The element with `inner_html` as its content.
    pub fn wrap(&self, inner_html: &str) -> String {
        if self.span {
            format!("{}{}</{}>", self.open_tag, unwrap_paragraph(inner_html), self.tag)
        } else {
            format!("{}\n{}</{}>", self.open_tag, inner_html, self.tag)
        }
    }
}

/// Cut every top-level `markdown="…"` element out of `markdown`.
///
/// Each element is replaced by a placeholder comment on its own line, which
/// comrak passes through as an HTML block. Elements inside fenced code,
/// elements that are never closed and self-closing tags are left alone.
pub fn extract_markdown_blocks(markdown: &str) -> (String, Vec<MarkdownBlock>) {
    let fenced = fenced_ranges(markdown);
    let mut out = String::with_capacity(markdown.len());
    let mut blocks = Vec::new();
    let mut cursor = 0;

    for caps in RE_BLOCK_OPEN.captures_iter(markdown) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() < cursor || fenced.iter().any(|r| r.contains(&whole.start())) {
            continue;
        }
        let attrs = caps.get(2).map_or("", |m| m.as_str());
        let Some(mode) = RE_MARKDOWN_ATTR.captures(attrs) else {
            continue;
        };
        if attrs.trim_end().ends_with('/') {
            continue;
        }
        let name = &caps[1];
        let Some(close) = find_closing_tag(markdown, whole.end(), name) else {
            continue;
        };

        out.push_str(&markdown[cursor..whole.start()]);
        out.push('\n');
        out.push_str(&format!("{BLOCK_MARKER_PREFIX}{}-->\n\n", blocks.len()));
        blocks.push(MarkdownBlock {
            tag: name.to_string(),
            open_tag: format!("<{name}{}>", RE_MARKDOWN_ATTR.replace(attrs, "")),
            content: markdown[whole.end()..close.start].to_string(),
            span: mode.iter().skip(1).flatten().any(|m| m.as_str() == "span"),
        });
        cursor = close.end;
    }

    out.push_str(&markdown[cursor..]);
    (out, blocks)
}

/// Replace each block placeholder with the matching entry of `rendered`.
pub fn splice_markdown_blocks(html: &str, rendered: &[String]) -> String {
    RE_BLOCK_MARKER
        .replace_all(html, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| rendered.get(i))
                .cloned()
                .unwrap_or_default()
        })
        .into_owned()
}

/// Span of the closing tag that balances an opening `name` tag ending at `from`.
fn find_closing_tag(text: &str, from: usize, name: &str) -> Option<Range<usize>> {
    let mut depth = 1usize;
    for caps in RE_ANY_TAG.captures_iter(&text[from..]) {
        if !caps[2].eq_ignore_ascii_case(name) {
            continue;
        }
        let m = caps.get(0)?;
        if &caps[1] == "/" {
            depth -= 1;
            if depth == 0 {
                return Some(from + m.start()..from + m.end());
            }
        } else if &caps[3] != "/" {
            depth += 1;
        }
    }
    None
}

/// Byte ranges covered by fenced code blocks, fences included.
fn fenced_ranges(markdown: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut open: Option<(usize, char, usize)> = None;
    let mut pos = 0;

    for line in markdown.split_inclusive('\n') {
        let trimmed = line.trim_start_matches(' ');
        let indented = line.len() - trimmed.len() > 3;
        let run = |c: char| trimmed.chars().take_while(|&x| x == c).count();

        match open {
            None if !indented => {
                open = ['`', '~']
                    .into_iter()
                    .map(|c| (c, run(c)))
                    .find(|&(_, n)| n >= 3)
                    .map(|(c, n)| (pos, c, n));
            }
            Some((start, c, n)) if !indented && run(c) >= n && trimmed[run(c)..].trim().is_empty() => {
                ranges.push(start..pos + line.len());
                open = None;
            }
            _ => {}
        }
        pos += line.len();
    }

    if let Some((start, ..)) = open {
        ranges.push(start..markdown.len());
    }
    ranges
}

fn unwrap_paragraph(html: &str) -> &str {
    let trimmed = html.trim();
    match trimmed.strip_prefix("<p>").and_then(|s| s.strip_suffix("</p>")) {
        Some(inner) if !inner.contains("<p>") => inner,
        _ => trimmed,
    }
}

// ── Attribute lists ──────────────────────────────────────────────────────────

static RE_TRAILING_ATTRS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+\{:?\s*([^}\s][^}]*?)\s*\}\s*$").unwrap());
static RE_WHOLE_ATTRS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\{:?\s*([^}\s][^}]*?)\s*\}\s*$").unwrap());
static RE_LEADING_ATTRS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{:?\s*([^}\s][^}]*?)\s*\}").unwrap());
static RE_ATTR_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([#.])([^\s#.}]+)|([A-Za-z_:][\w:.-]*)=(?:"([^"]*)"|'([^']*)'|([^\s}]+))"#)
        .unwrap()
});
static RE_ATTRS_ON_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r##"<(h[1-6]|p|li|td|th|dt|dd)((?:\s[^>]*)?)>(<a inert href="#[^"]*" aria-hidden="true" class="anchor" id="[^"]*"></a>)?<!--md2pdf-attr:(\d+)-->"##,
    )
    .unwrap()
});
static RE_ATTRS_ON_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<img\b([^>]*?)\s*/?><!--md2pdf-attr:(\d+)-->").unwrap());
static RE_ATTR_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"<!--md2pdf-attr:\d+-->").unwrap());

/// Attributes parsed from one `{: …}` list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttrList {
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub pairs: Vec<(String, String)>,
}

impl AttrList {
    /// Parse the text between the braces. `None` when no token is recognised,
    /// so prose in braces is never swallowed.
    pub fn parse(source: &str) -> Option<Self> {
        let mut list = Self::default();
        for caps in RE_ATTR_TOKEN.captures_iter(source) {
            if let Some(sigil) = caps.get(1) {
                let value = caps[2].to_string();
                if sigil.as_str() == "#" {
                    list.id = Some(value);
                } else {
                    list.classes.push(value);
                }
            } else if let Some(key) = caps.get(3) {
                let value = caps
                    .get(4)
                    .or_else(|| caps.get(5))
                    .or_else(|| caps.get(6))
                    .map_or("", |m| m.as_str())
                    .to_string();
                match key.as_str() {
                    "id" => list.id = Some(value),
                    "class" => list.classes.extend(value.split_whitespace().map(String::from)),
                    _ => list.pairs.push((key.as_str().to_string(), value)),
                }
            }
        }
        (list.id.is_some() || !list.classes.is_empty() || !list.pairs.is_empty()).then_some(list)
    }

    /// Attribute text with a leading space, ready to go inside a tag.
    pub fn to_attributes(&self, with_id: bool) -> String {
        let mut out = String::new();
        if with_id {
            if let Some(id) = &self.id {
                out.push_str(&format!(" id=\"{}\"", html_escape::encode_double_quoted_attribute(id)));
            }
        }
        if !self.classes.is_empty() {
            let classes = self.classes.join(" ");
            out.push_str(&format!(
                " class=\"{}\"",
                html_escape::encode_double_quoted_attribute(&classes)
            ));
        }
        for (key, value) in &self.pairs {
            out.push_str(&format!(
                " {key}=\"{}\"",
                html_escape::encode_double_quoted_attribute(value)
            ));
        }
        out
    }
}

/// Where an element's attribute list is written.
#[derive(Debug, Clone, Copy)]
enum Placement {
    Trailing,
    LastLine,
    After,
}

/// Index carried by an attribute marker, if `literal` is one.
pub fn attr_marker_index(literal: &str) -> Option<usize> {
    literal
        .strip_prefix(ATTR_MARKER_PREFIX)?
        .strip_suffix("-->")?
        .parse()
        .ok()
}

/// Remove attribute lists from the tree and mark the elements they belong to.
///
/// The returned lists are indexed by the number in each marker.
pub fn lift_attr_lists<'a>(arena: &'a Arena<AstNode<'a>>, root: &'a AstNode<'a>) -> Vec<AttrList> {
    // Snapshot first so the walk never visits the markers it inserts.
    let nodes: Vec<&'a AstNode<'a>> = root.descendants().collect();
    let mut lists = Vec::new();

    for node in nodes {
        let placement = match node.data.borrow().value {
            NodeValue::Heading(_) | NodeValue::TableCell => Placement::Trailing,
            NodeValue::Paragraph => Placement::LastLine,
            NodeValue::Image(_) => Placement::After,
            _ => continue,
        };
        let lifted = match placement {
            Placement::Trailing => lift_trailing(node),
            Placement::LastLine => lift_last_line(node),
            Placement::After => lift_after(node),
        };

        if let Some(list) = lifted {
            let marker: &'a AstNode<'a> = arena.alloc(
                NodeValue::HtmlInline(format!("{ATTR_MARKER_PREFIX}{}-->", lists.len())).into(),
            );
            match placement {
                Placement::After => node.insert_after(marker),
                _ => node.prepend(marker),
            }
            lists.push(list);
        }
    }
    lists
}

/// `## Title {: .x}`: the list closes the element's last text run.
fn lift_trailing<'a>(node: &'a AstNode<'a>) -> Option<AttrList> {
    let last = node.last_child()?;
    let mut data = last.data.borrow_mut();
    let NodeValue::Text(ref mut text) = data.value else {
        return None;
    };
    let (start, list) = {
        let caps = RE_TRAILING_ATTRS.captures(text.as_str())?;
        (caps.get(0)?.start(), AttrList::parse(&caps[1])?)
    };
    text.truncate(start);
    Some(list)
}

/// `Text\n{: .x}`: the list is the paragraph's whole last line.
fn lift_last_line<'a>(node: &'a AstNode<'a>) -> Option<AttrList> {
    let last = node.last_child()?;
    let brk = last.previous_sibling()?;
    if !matches!(
        brk.data.borrow().value,
        NodeValue::SoftBreak | NodeValue::LineBreak
    ) {
        return None;
    }
    let list = match last.data.borrow().value {
        NodeValue::Text(ref text) => AttrList::parse(RE_WHOLE_ATTRS.captures(text)?.get(1)?.as_str())?,
        _ => return None,
    };
    last.detach();
    brk.detach();
    Some(list)
}

/// `![alt](src){: .x}`: the list opens the text that follows the image.
fn lift_after<'a>(node: &'a AstNode<'a>) -> Option<AttrList> {
    let next = node.next_sibling()?;
    let mut data = next.data.borrow_mut();
    let NodeValue::Text(ref mut text) = data.value else {
        return None;
    };
    let (end, list) = {
        let caps = RE_LEADING_ATTRS.captures(text.as_str())?;
        (caps.get(0)?.end(), AttrList::parse(&caps[1])?)
    };
    text.replace_range(..end, "");
    Some(list)
}

/// Move each marked list onto its element's tag.
///
/// On a heading the id goes to comrak's anchor, which is the link target
/// the table of contents uses. Unmatched markers are removed.
pub fn apply_attr_lists(html: &str, lists: &[AttrList]) -> String {
    if lists.is_empty() {
        return html.to_string();
    }
    let lookup = |index: &str| index.parse::<usize>().ok().and_then(|i| lists.get(i));

    let html = RE_ATTRS_ON_BLOCK.replace_all(html, |caps: &Captures| {
        let Some(list) = lookup(&caps[4]) else {
            return caps[0].to_string();
        };
        let tag = &caps[1];
        let existing = caps.get(2).map_or("", |m| m.as_str());
        match (caps.get(3), &list.id) {
            (Some(_), Some(id)) => {
                let id = html_escape::encode_double_quoted_attribute(id);
                format!(
                    "<{tag}{existing}{}><a inert href=\"#{id}\" aria-hidden=\"true\" class=\"anchor\" id=\"{id}\"></a>",
                    list.to_attributes(false)
                )
            }
            (Some(anchor), None) => {
                format!("<{tag}{existing}{}>{}", list.to_attributes(false), anchor.as_str())
            }
            (None, _) => format!("<{tag}{existing}{}>", list.to_attributes(true)),
        }
    });

    let html = RE_ATTRS_ON_IMAGE.replace_all(&html, |caps: &Captures| match lookup(&caps[2]) {
        Some(list) => format!("<img{}{} />", &caps[1], list.to_attributes(true)),
        None => caps[0].to_string(),
    });

    RE_ATTR_MARKER.replace_all(&html, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Metadata ─────────────────────────────────────────────────────────

    #[test]
    fn metadata_block_is_dropped() {
        assert_eq!(
            strip_metadata("Title: Hidden\nAuthor: me\n\n# Shown\n"),
            "\n# Shown\n"
        );
    }

    #[test]
    fn metadata_continuation_lines() {
        let md = "Authors: Ada\n    Grace\nDate: 2024\n\nBody\n";
        assert_eq!(strip_metadata(md), "\nBody\n");
    }

    #[test]
    fn metadata_with_dot_terminator() {
        assert_eq!(strip_metadata("---\nTitle: x\n...\nBody\n"), "Body\n");
    }

    #[test]
    fn closed_front_matter_is_left_for_comrak() {
        let md = "---\ntitle: Hidden\n---\n\n# Shown\n";
        assert_eq!(strip_metadata(md), md);
    }

    #[test]
    fn documents_without_metadata_are_untouched() {
        for md in ["# Title\n\nText: more\n", "Plain paragraph.\n", "", "[TOC]\n"] {
            assert_eq!(strip_metadata(md), md);
        }
    }

    #[test]
    fn metadata_stops_at_non_key_line() {
        assert_eq!(strip_metadata("Title: x\nHello world\n"), "Hello world\n");
    }

    // ── Markdown in HTML ─────────────────────────────────────────────────

    #[test]
    fn markdown_block_is_cut_out() {
        let (md, blocks) = extract_markdown_blocks("Intro\n\n<div class=\"note\" markdown=\"1\">\n**bold**\n</div>\nAfter\n");
        assert!(md.contains("<!--md2pdf-block:0-->"), "got: {md}");
        assert!(!md.contains("**bold**"));
        assert!(md.contains("After"));
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].open_tag, "<div class=\"note\">");
        assert_eq!(blocks[0].content, "\n**bold**\n");
        assert!(!blocks[0].span);
    }

    #[test]
    fn nested_same_tag_is_balanced() {
        let (_, blocks) =
            extract_markdown_blocks("<div markdown=\"1\">\n<div>inner</div>\n*x*\n</div>\n");
        assert_eq!(blocks[0].content, "\n<div>inner</div>\n*x*\n");
    }

    #[test]
    fn plain_html_and_fenced_code_are_ignored() {
        let md = "<div class=\"a\">\n**raw**\n</div>\n\n```html\n<div markdown=\"1\">\n*x*\n</div>\n```\n";
        let (out, blocks) = extract_markdown_blocks(md);
        assert!(blocks.is_empty());
        assert_eq!(out, md);
    }

    #[test]
    fn unclosed_element_is_ignored() {
        let (out, blocks) = extract_markdown_blocks("<div markdown=\"1\">\n*x*\n");
        assert!(blocks.is_empty());
        assert_eq!(out, "<div markdown=\"1\">\n*x*\n");
    }

    #[test]
    fn span_mode_drops_the_paragraph() {
        let block = MarkdownBlock {
            tag: "span".into(),
            open_tag: "<span>".into(),
            content: String::new(),
            span: true,
        };
        assert_eq!(block.wrap("<p><em>x</em></p>\n"), "<span><em>x</em></span>");
    }

    #[test]
    fn splice_replaces_markers() {
        let html = "<p>a</p>\n<!--md2pdf-block:0-->\n<p>b</p>";
        assert_eq!(
            splice_markdown_blocks(html, &["<div>x</div>".to_string()]),
            "<p>a</p>\n<div>x</div>\n<p>b</p>"
        );
    }

    // ── Attribute lists ──────────────────────────────────────────────────

    #[test]
    fn parses_ids_classes_and_pairs() {
        let list = AttrList::parse(r#"#scope .lead .wide width=200 title="Two words""#).unwrap();
        assert_eq!(list.id.as_deref(), Some("scope"));
        assert_eq!(list.classes, ["lead", "wide"]);
        assert_eq!(
            list.pairs,
            [
                ("width".to_string(), "200".to_string()),
                ("title".to_string(), "Two words".to_string())
            ]
        );
        assert_eq!(
            list.to_attributes(true),
            r#" id="scope" class="lead wide" width="200" title="Two words""#
        );
    }

    #[test]
    fn prose_in_braces_is_not_a_list() {
        assert_eq!(AttrList::parse("a: b"), None);
    }

    #[test]
    fn marker_index_roundtrip() {
        assert_eq!(attr_marker_index("<!--md2pdf-attr:7-->"), Some(7));
        assert_eq!(attr_marker_index("<!-- note -->"), None);
    }

    #[test]
    fn applies_to_paragraph_and_image() {
        let lists = vec![
            AttrList::parse(".note").unwrap(),
            AttrList::parse("width=\"120\"").unwrap(),
        ];
        let html = "<p><!--md2pdf-attr:0-->Intro <img src=\"a.png\" alt=\"A\" /><!--md2pdf-attr:1--></p>";
        assert_eq!(
            apply_attr_lists(html, &lists),
            "<p class=\"note\">Intro <img src=\"a.png\" alt=\"A\" width=\"120\" /></p>"
        );
    }

    #[test]
    fn heading_id_moves_to_anchor() {
        let lists = vec![AttrList::parse("#scope .lead").unwrap()];
        let html = "<h2><a inert href=\"#release\" aria-hidden=\"true\" class=\"anchor\" id=\"release\"></a><!--md2pdf-attr:0-->Release</h2>";
        assert_eq!(
            apply_attr_lists(html, &lists),
            "<h2 class=\"lead\"><a inert href=\"#scope\" aria-hidden=\"true\" class=\"anchor\" id=\"scope\"></a>Release</h2>"
        );
    }

    #[test]
    fn stray_markers_are_removed() {
        let lists = vec![AttrList::parse(".x").unwrap()];
        assert_eq!(
            apply_attr_lists("<li><input type=\"checkbox\" /><!--md2pdf-attr:0-->a</li>", &lists),
            "<li><input type=\"checkbox\" />a</li>"
        );
    }
}
