//! Streaming batch API: emit document outcomes as they complete.
//!
//! Unlike the eager [`crate::batch::run_batch`], which returns only after
//! every group finishes, [`run_batch_stream`] yields each
//! [`DocumentOutcome`] as soon as its PDF is written (or fails). Groups are
//! still processed in manifest order; within a group, outcomes arrive in
//! completion order when `concurrency > 1` (sort by `index` if order
//! matters).
//!
//! Progress callbacks are not invoked on this path; the stream is the
//! progress signal. The output directory listing is not produced either;
//! call [`crate::batch::list_generated_pdfs`] when the stream ends.

use crate::batch::{prepare_output_dir, process_document, resolve_renderer};
use crate::config::BatchConfig;
use crate::error::Md2PdfError;
use crate::manifest::Manifest;
use crate::output::DocumentOutcome;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of document outcomes.
pub type OutcomeStream = Pin<Box<dyn Stream<Item = DocumentOutcome> + Send>>;

/// Convert the manifest, streaming outcomes as they are ready.
///
/// # Returns
/// - `Ok(OutcomeStream)`: one item per manifest entry
/// - `Err(Md2PdfError)`: fatal error (invalid manifest, output directory)
///
/// # Example
/// ```rust,no_run
/// use edgequake_md2pdf::{run_batch_stream, BatchConfig, Manifest};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = BatchConfig::default();
/// let mut outcomes = run_batch_stream(&Manifest::builtin(), &config).await?;
/// while let Some(outcome) = outcomes.next().await {
///     match &outcome.error {
///         None => println!("created {}", outcome.output),
///         Some(e) => eprintln!("failed {}: {e}", outcome.output),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn run_batch_stream(
    manifest: &Manifest,
    config: &BatchConfig,
) -> Result<OutcomeStream, Md2PdfError> {
    manifest.validate()?;
    let output_dir = Arc::new(prepare_output_dir(config).await?);
    let renderer = resolve_renderer(config);
    info!(
        "Starting streaming batch: {} documents → {}",
        manifest.total_documents(),
        output_dir.display()
    );

    let mut config = config.clone();
    config.progress_callback = None;
    let config = Arc::new(config);
    let concurrency = config.concurrency;

    let s = stream::iter(manifest.groups.clone()).flat_map(move |group| {
        let config = Arc::clone(&config);
        let renderer = Arc::clone(&renderer);
        let output_dir = Arc::clone(&output_dir);
        let name = group.name;
        stream::iter(group.entries.into_iter().enumerate().map(move |(index, entry)| {
            let config = Arc::clone(&config);
            let renderer = Arc::clone(&renderer);
            let output_dir = Arc::clone(&output_dir);
            let name = name.clone();
            async move {
                process_document(&name, index, &entry, &config, renderer.as_ref(), &output_dir).await
            }
        }))
        .buffer_unordered(concurrency)
    });

    Ok(Box::pin(s))
}
