//! Progress-callback trait for per-group and per-document batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::BatchConfigBuilder::progress_callback`] to receive events
//! as the batch walks the manifest. The command-line tool uses this to print
//! its per-document report lines and drive a progress bar; library callers
//! can forward events anywhere.
//!
//! # Example
//!
//! ```rust
//! use edgequake_md2pdf::{BatchConfig, BatchProgressCallback, DocumentOutcome};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     created: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, outcome: &DocumentOutcome) {
//!         if outcome.success() {
//!             self.created.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { created: AtomicUsize::new(0) });
//! let config = BatchConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::manifest::ManifestEntry;
use crate::output::{BatchReport, DocumentOutcome, GroupReport};
use std::sync::Arc;

/// Called by the batch driver as it processes the manifest.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// With `concurrency > 1`, `on_document_start` and `on_document_complete`
/// may be called concurrently for documents of the same group. Group events
/// are always serialised: a group's `on_group_complete` fires before the
/// next group's `on_group_start`.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before any group is processed.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called when a group begins.
    fn on_group_start(&self, group: &str, document_count: usize) {
        let _ = (group, document_count);
    }

    /// Called after the source file was found, just before it is converted.
    ///
    /// Not called for entries whose source is missing; those go straight to
    /// [`on_document_complete`](Self::on_document_complete) with a
    /// `SourceNotFound` error.
    fn on_document_start(&self, group: &str, entry: &ManifestEntry) {
        let _ = (group, entry);
    }

    /// Called once per manifest entry with its final outcome.
    fn on_document_complete(&self, outcome: &DocumentOutcome) {
        let _ = outcome;
    }

    /// Called when every entry of a group has been attempted.
    fn on_group_complete(&self, report: &GroupReport) {
        let _ = report;
    }

    /// Called once after all groups, with the final report.
    fn on_batch_complete(&self, report: &BatchReport) {
        let _ = report;
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BatchConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
