//! The manifest: which Markdown files to convert and what to call the PDFs.
//!
//! A [`Manifest`] is an ordered list of named [`DocumentGroup`]s. Groups are
//! processed in order and reported separately; entries inside a group share
//! identical processing logic. [`Manifest::builtin`] reproduces the fixed
//! documentation suite; [`Manifest::load`] reads the same shape from JSON:
//!
//! ```json
//! {
//!   "groups": [
//!     {
//!       "name": "Main Documents",
//!       "entries": [
//!         { "source": "design-document.md", "output": "Design-Document.pdf" }
//!       ]
//!     }
//!   ]
//! }
//! ```

use crate::error::Md2PdfError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// One (source Markdown, output PDF filename) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Markdown path relative to the documentation root.
    pub source: PathBuf,
    /// PDF file name written into the output directory.
    pub output: String,
}

impl ManifestEntry {
    pub fn new(source: impl Into<PathBuf>, output: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
        }
    }

    /// Name of the intermediate HTML artifact (`.pdf` → `.html`).
    pub fn html_name(&self) -> String {
        self.output.replace(".pdf", ".html")
    }
}

/// A named, ordered group of entries ("Main Documents", "Template Documents").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentGroup {
    pub name: String,
    pub entries: Vec<ManifestEntry>,
}

impl DocumentGroup {
    pub fn new(name: impl Into<String>, entries: Vec<ManifestEntry>) -> Self {
        Self {
            name: name.into(),
            entries,
        }
    }
}

/// The full batch definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub groups: Vec<DocumentGroup>,
}

impl Manifest {
    /// The built-in documentation suite: four main documents followed by
    /// their four templates.
    pub fn builtin() -> Self {
        Self {
            groups: vec![
                DocumentGroup::new(
                    "Main Documents",
                    vec![
                        ManifestEntry::new(
                            "product-requirements-document.md",
                            "PRD-ATCS-NG-v2.5.0.pdf",
                        ),
                        ManifestEntry::new(
                            "design-document.md",
                            "Design-Document-ATCS-NG-v2.5.0.pdf",
                        ),
                        ManifestEntry::new(
                            "technical-specification.md",
                            "Technical-Specification-ATCS-NG-v2.5.0.pdf",
                        ),
                        ManifestEntry::new("release-plan.md", "Release-Plan-ATCS-NG-v2.5.0.pdf"),
                    ],
                ),
                DocumentGroup::new(
                    "Template Documents",
                    vec![
                        ManifestEntry::new(
                            "templates/TEMPLATE-product-requirements-document.md",
                            "TEMPLATE-PRD.pdf",
                        ),
                        ManifestEntry::new(
                            "templates/TEMPLATE-design-document.md",
                            "TEMPLATE-Design-Document.pdf",
                        ),
                        ManifestEntry::new(
                            "templates/TEMPLATE-technical-specification.md",
                            "TEMPLATE-Technical-Specification.pdf",
                        ),
                        ManifestEntry::new(
                            "templates/TEMPLATE-release-plan.md",
                            "TEMPLATE-Release-Plan.pdf",
                        ),
                    ],
                ),
            ],
        }
    }

    /// Read and validate a JSON manifest from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Md2PdfError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Md2PdfError::ManifestNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                Md2PdfError::ManifestRead {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        Self::from_json_str(&text)
    }

    /// Parse and validate a JSON manifest.
    pub fn from_json_str(json: &str) -> Result<Self, Md2PdfError> {
        let manifest: Manifest = serde_json::from_str(json)
            .map_err(|e| Md2PdfError::InvalidManifest(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Total number of documents across all groups.
    pub fn total_documents(&self) -> usize {
        self.groups.iter().map(|g| g.entries.len()).sum()
    }

    /// Check that the manifest can be executed.
    ///
    /// Every output must be a `.pdf` name without directory components, and
    /// no two entries may write the same file.
    pub fn validate(&self) -> Result<(), Md2PdfError> {
        if self.total_documents() == 0 {
            return Err(Md2PdfError::InvalidManifest(
                "manifest contains no documents".into(),
            ));
        }

        let mut seen = HashSet::new();
        for entry in self.groups.iter().flat_map(|g| &g.entries) {
            if !entry.output.ends_with(".pdf") {
                return Err(Md2PdfError::InvalidManifest(format!(
                    "output '{}' must end with .pdf",
                    entry.output
                )));
            }
            if entry.output.contains('/') || entry.output.contains('\\') {
                return Err(Md2PdfError::InvalidManifest(format!(
                    "output '{}' must be a file name, not a path",
                    entry.output
                )));
            }
            if !seen.insert(entry.output.as_str()) {
                return Err(Md2PdfError::InvalidManifest(format!(
                    "output '{}' appears more than once",
                    entry.output
                )));
            }
        }
        Ok(())
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Self::builtin()
    }
}
