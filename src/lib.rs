//! # edgequake-md2pdf
//!
//! Batch-convert a manifest of Markdown documents into styled PDFs.
//!
//! Each document is rendered to a standalone HTML page (theme stylesheet
//! inlined, relative images made absolute, generation footer appended) and
//! handed to an external HTML-to-PDF renderer, `wkhtmltopdf` by default.
//! Failures are per document: one bad file never stops the batch, and the
//! final [`BatchReport`] says what succeeded.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Manifest (groups of source.md → Output.pdf)
//!  │
//!  ├─ 1. Source    read Markdown, derive title from the first "# " line
//!  ├─ 2. Markdown  comrak: tables, footnotes, code highlighting, [TOC]
//!  ├─ 3. Polish    stray ![alt](src) → <img>, relative src → file://
//!  ├─ 4. Document  HTML5 shell + theme CSS + footer, written to disk
//!  ├─ 5. Render    wkhtmltopdf under a timeout
//!  └─ 6. Report    per-group counts, generated PDFs with sizes
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_md2pdf::{run_batch, BatchConfig, Manifest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // docs/*.md → docs/pdf/*.pdf, themed by docs/styles/pdf-theme.css
//!     let config = BatchConfig::default();
//!     let report = run_batch(&Manifest::builtin(), &config).await?;
//!     println!("{}/{} PDFs generated", report.total_successful(), report.total_expected());
//!     std::process::exit(report.exit_code());
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-md2pdf = { version = "0.1", default-features = false }
//! ```
//!
//! ## Renderer lookup
//!
//! Unless a path or a custom [`PdfRenderer`] is configured, `wkhtmltopdf` is
//! taken from `WKHTMLTOPDF_PATH`, then from `PATH`.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{list_generated_pdfs, run_batch, run_batch_sync};
pub use config::{BatchConfig, BatchConfigBuilder, PageLayout};
pub use error::{DocumentError, Md2PdfError, RenderFailure};
pub use manifest::{DocumentGroup, Manifest, ManifestEntry};
pub use output::{BatchReport, DocumentOutcome, GeneratedPdf, GroupReport};
pub use pipeline::render::{PdfRenderer, WkhtmltopdfRenderer};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{run_batch_stream, OutcomeStream};
