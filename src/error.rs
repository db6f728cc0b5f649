//! Error types for the edgequake-md2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Md2PdfError`] is **fatal**: the batch cannot run at all (unreadable
//!   manifest, output directory cannot be created, invalid configuration).
//!   Returned as `Err(Md2PdfError)` from the top-level `run_batch*` functions.
//!
//! * [`DocumentError`] is **non-fatal**: a single document failed (missing
//!   source, renderer crash, timeout) but every other document is still
//!   attempted. Stored inside [`crate::output::DocumentOutcome`] and counted
//!   as a failure in the report.
//!
//! [`RenderFailure`] is the renderer's own error: it keeps the timeout /
//! non-zero exit / invocation distinction for diagnostics even though the
//! batch driver treats all three the same way.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-md2pdf library.
#[derive(Debug, Error)]
pub enum Md2PdfError {
    // ── Output errors ─────────────────────────────────────────────────────
    /// The output directory does not exist and could not be created.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Manifest errors ───────────────────────────────────────────────────
    /// Manifest file was not found at the given path.
    #[error("Manifest file not found: '{path}'\nCheck the path exists and is readable.")]
    ManifestNotFound { path: PathBuf },

    /// Manifest file exists but could not be read.
    #[error("Failed to read manifest '{path}': {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Manifest parsed but is not usable (bad JSON, duplicate outputs, …).
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why an external renderer invocation did not produce a PDF.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RenderFailure {
    /// The renderer exceeded its wall-clock limit and was killed.
    #[error("PDF generation timed out after {secs}s")]
    TimedOut { secs: u64 },

    /// The renderer ran but exited unsuccessfully.
    #[error("renderer exited with status {}: {stderr_excerpt}", exit_code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    NonZeroExit {
        exit_code: Option<i32>,
        stderr_excerpt: String,
    },

    /// The renderer could not be started at all (binary missing, permissions).
    #[error("{detail}")]
    Invocation { detail: String },
}

/// A non-fatal error for a single document.
///
/// Stored alongside [`crate::output::DocumentOutcome`]. The batch always
/// continues with the next manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DocumentError {
    /// The Markdown source does not exist.
    #[error("{path} (file not found)")]
    SourceNotFound { path: PathBuf },

    /// The Markdown source exists but could not be read as UTF-8 text.
    #[error("failed to read {path}: {detail}")]
    SourceUnreadable { path: PathBuf, detail: String },

    /// The intermediate HTML file could not be written.
    #[error("failed to write {path}: {detail}")]
    HtmlWriteFailed { path: PathBuf, detail: String },

    /// The external renderer failed.
    #[error(transparent)]
    Render(#[from] RenderFailure),
}
