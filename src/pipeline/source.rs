//! Source loading: read a Markdown file and derive its display title.

use crate::error::DocumentError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A Markdown document ready for conversion.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Full path the Markdown was read from.
    pub path: PathBuf,
    /// Directory relative image paths are resolved against.
    pub base_dir: PathBuf,
    pub markdown: String,
    pub title: String,
}

/// Read `path` and derive its title, falling back to `output_name`.
///
/// A missing file is reported as [`DocumentError::SourceNotFound`] carrying
/// `display_path` (the path as written in the manifest).
pub async fn load_source(
    path: &Path,
    display_path: &Path,
    output_name: &str,
) -> Result<SourceDocument, DocumentError> {
    let markdown = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            DocumentError::SourceNotFound {
                path: display_path.to_path_buf(),
            }
        } else {
            DocumentError::SourceUnreadable {
                path: display_path.to_path_buf(),
                detail: e.to_string(),
            }
        }
    })?;

    let title = derive_title(&markdown, output_name);
    debug!("Loaded {} ({} bytes), title {:?}", path.display(), markdown.len(), title);

    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    Ok(SourceDocument {
        path: path.to_path_buf(),
        base_dir,
        markdown,
        title,
    })
}

/// Title of a document: the text of the first line starting with `"# "`,
/// trimmed; otherwise [`fallback_title`] of the output name.
///
/// Only that exact prefix counts. `#Title`, `## Title` and setext headings
/// do not.
pub fn derive_title(markdown: &str, output_name: &str) -> String {
    markdown
        .lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(|rest| rest.trim().to_string())
        .unwrap_or_else(|| fallback_title(output_name))
}

/// `Release-Plan-ATCS-NG-v2.5.0.pdf` → `Release Plan ATCS NG v2.5.0`.
pub fn fallback_title(output_name: &str) -> String {
    output_name.replace(".pdf", "").replace('-', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn title_from_first_h1() {
        let md = "intro\n# Product Requirements  \n# Second\n";
        assert_eq!(derive_title(md, "PRD.pdf"), "Product Requirements");
    }

    #[test]
    fn title_ignores_other_heading_forms() {
        let md = "## Sub\n#NoSpace\nSetext\n======\n";
        assert_eq!(
            derive_title(md, "Release-Plan-ATCS-NG-v2.5.0.pdf"),
            "Release Plan ATCS NG v2.5.0"
        );
    }

    #[test]
    fn indented_heading_is_not_a_title() {
        assert_eq!(derive_title("  # Indented\n", "A-B.pdf"), "A B");
    }

    #[test]
    fn fallback_strips_every_pdf_occurrence() {
        assert_eq!(fallback_title("x.pdf-notes.pdf"), "x notes");
    }

    #[tokio::test]
    async fn load_source_reads_and_titles() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.md");
        std::fs::write(&path, "# Design Document\n\nBody").unwrap();

        let doc = load_source(&path, Path::new("doc.md"), "Design.pdf")
            .await
            .unwrap();
        assert_eq!(doc.title, "Design Document");
        assert_eq!(doc.base_dir, dir.path());
        assert!(doc.markdown.contains("Body"));
    }

    #[tokio::test]
    async fn load_source_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = load_source(&dir.path().join("nope.md"), Path::new("nope.md"), "N.pdf")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DocumentError::SourceNotFound {
                path: PathBuf::from("nope.md")
            }
        );
    }

    #[tokio::test]
    async fn load_source_rejects_invalid_utf8() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bin.md");
        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        let err = load_source(&path, Path::new("bin.md"), "B.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::SourceUnreadable { .. }));
    }
}
