//! Post-processing: the two text passes applied to the rendered HTML body.
//!
//! ## Rule Order
//!
//! 1. Stray `![alt](src)` tokens that survived Markdown rendering (inside
//!    raw HTML blocks, for example) become `<img>` tags capped at 40px high.
//! 2. Every `src="…"` that is not an `http://`, `https://` or root-absolute
//!    reference is rewritten to an absolute `file://` URL, resolved against
//!    the Markdown file's directory.
//!
//! Rule 2 must run after rule 1 so the tags rule 1 creates are rewritten too.
//! Both rules are pure text substitutions; neither parses HTML.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::path::{Component, Path, PathBuf};

/// Apply both passes, in order.
pub fn postprocess_body(html: &str, base_dir: &Path) -> String {
    let s = inline_stray_images(html);
    absolutize_src_paths(&s, base_dir)
}

// ── Rule 1: Inline stray image tokens ────────────────────────────────────────

static RE_IMAGE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").unwrap());

/// `![alt](src)` → `<img src="src" alt="alt" style="max-height: 40px;">`.
///
/// Captured text is inserted verbatim.
pub fn inline_stray_images(html: &str) -> String {
    RE_IMAGE_TOKEN
        .replace_all(html, r#"<img src="$2" alt="$1" style="max-height: 40px;">"#)
        .into_owned()
}

// ── Rule 2: Absolutize relative src attributes ───────────────────────────────

static RE_SRC_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"src="([^"]+)""#).unwrap());

/// Rewrite relative `src="…"` values to `file://` URLs under `base_dir`.
///
/// Values starting with `http://`, `https://` or `/` are left unchanged. Only
/// double-quoted attributes are considered.
pub fn absolutize_src_paths(html: &str, base_dir: &Path) -> String {
    RE_SRC_ATTR
        .replace_all(html, |caps: &Captures| {
            let value = &caps[1];
            if is_absolute_reference(value) {
                caps[0].to_string()
            } else {
                let resolved = resolve_path(&base_dir.join(value));
                format!("src=\"file://{}\"", resolved.display())
            }
        })
        .into_owned()
}

fn is_absolute_reference(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://") || value.starts_with('/')
}

/// Absolute form of `path`: canonical when it exists, otherwise made
/// absolute against the working directory and lexically normalised.
pub fn resolve_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    normalize_lexically(&absolute)
}

/// Drop `.` components and fold `..` into its parent without touching the
/// filesystem. `..` at the root stays at the root.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_inline_stray_image() {
        let out = inline_stray_images("<p>Logo: ![hanaML](images/logo.png)</p>");
        assert_eq!(
            out,
            r#"<p>Logo: <img src="images/logo.png" alt="hanaML" style="max-height: 40px;"></p>"#
        );
    }

    #[test]
    fn test_inline_stray_image_empty_alt() {
        let out = inline_stray_images("![](a.png)");
        assert_eq!(out, r#"<img src="a.png" alt="" style="max-height: 40px;">"#);
    }

    #[test]
    fn test_inline_requires_non_empty_src() {
        assert_eq!(inline_stray_images("![alt]()"), "![alt]()");
    }

    #[test]
    fn test_absolute_references_untouched() {
        let html = r#"<img src="https://x.org/a.png"><img src="http://x.org/b.png"><img src="/abs/c.png">"#;
        assert_eq!(absolutize_src_paths(html, Path::new("/docs")), html);
    }

    #[test]
    fn test_relative_src_rewritten() {
        let out = absolutize_src_paths(r#"<img src="images/x.png">"#, Path::new("/docs/templates"));
        assert_eq!(out, r#"<img src="file:///docs/templates/images/x.png">"#);
    }

    #[test]
    fn test_parent_segments_normalised() {
        let out = absolutize_src_paths(r#"<img src="../images/x.png">"#, Path::new("/docs/templates"));
        assert_eq!(out, r#"<img src="file:///docs/images/x.png">"#);
    }

    #[test]
    fn test_existing_file_is_canonicalised() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("images")).unwrap();
        std::fs::write(dir.path().join("images/logo.png"), b"png").unwrap();
        let expected = std::fs::canonicalize(dir.path().join("images/logo.png")).unwrap();

        let out = absolutize_src_paths(r#"<img src="./images/logo.png">"#, dir.path());
        assert_eq!(out, format!("<img src=\"file://{}\">", expected.display()));
    }

    #[test]
    fn test_single_quoted_src_untouched() {
        let html = "<img src='images/x.png'>";
        assert_eq!(absolutize_src_paths(html, Path::new("/docs")), html);
    }

    #[test]
    fn test_passes_compose_in_order() {
        let out = postprocess_body("<div>![Badge](badge.svg)</div>", Path::new("/docs"));
        assert_eq!(
            out,
            r#"<div><img src="file:///docs/badge.svg" alt="Badge" style="max-height: 40px;"></div>"#
        );
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("/a/./b/../c")),
            PathBuf::from("/a/c")
        );
        assert_eq!(normalize_lexically(Path::new("/../x")), PathBuf::from("/x"));
    }
}
