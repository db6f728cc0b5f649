//! Eager batch conversion: walk the manifest, convert every entry, report.
//!
//! [`run_batch`] waits for every group and returns a [`BatchReport`]. Use
//! [`crate::stream::run_batch_stream`] instead to receive outcomes as they
//! complete.
//!
//! A document failure never stops the batch. Only problems that make the
//! whole run impossible (invalid manifest, output directory cannot be
//! created) are returned as `Err`.

use crate::config::BatchConfig;
use crate::error::{DocumentError, Md2PdfError};
use crate::manifest::{DocumentGroup, Manifest, ManifestEntry};
use crate::output::{BatchReport, DocumentOutcome, GeneratedPdf, GroupReport};
use crate::pipeline::render::{PdfRenderer, UnavailableRenderer, WkhtmltopdfRenderer};
use crate::pipeline::{document, markdown, postprocess, source};
use crate::progress::{BatchProgressCallback, NoopProgressCallback};
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

static NOOP_CALLBACK: NoopProgressCallback = NoopProgressCallback;

/// Convert every manifest entry and return the full report.
///
/// # Errors
/// Returns `Err(Md2PdfError)` only for fatal errors:
/// - the manifest is empty or has clashing outputs
/// - the output directory cannot be created
///
/// Individual document failures are recorded in the report; check
/// [`BatchReport::all_succeeded`] or [`BatchReport::exit_code`].
pub async fn run_batch(manifest: &Manifest, config: &BatchConfig) -> Result<BatchReport, Md2PdfError> {
    let total_start = Instant::now();
    manifest.validate()?;

    // ── Step 1: Prepare output directory ─────────────────────────────────
    let output_dir = prepare_output_dir(config).await?;

    // ── Step 2: Resolve renderer ─────────────────────────────────────────
    let renderer = resolve_renderer(config);

    let cb = callback(config);
    let total = manifest.total_documents();
    info!(
        "Starting batch: {} documents in {} groups → {}",
        total,
        manifest.groups.len(),
        output_dir.display()
    );
    cb.on_batch_start(total);

    // ── Step 3: Process groups in manifest order ─────────────────────────
    let mut groups = Vec::with_capacity(manifest.groups.len());
    for group in &manifest.groups {
        cb.on_group_start(&group.name, group.entries.len());
        let report = process_group(group, config, renderer.as_ref(), &output_dir).await;
        info!(
            "{}: {}/{} successful",
            report.name, report.successful, report.expected
        );
        cb.on_group_complete(&report);
        groups.push(report);
    }

    // ── Step 4: List what is on disk ─────────────────────────────────────
    let generated = list_generated_pdfs(&output_dir).await;

    let report = BatchReport {
        groups,
        output_dir,
        generated,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Batch complete: {}/{} PDFs generated, {}ms total",
        report.total_successful(),
        report.total_expected(),
        report.total_duration_ms
    );
    cb.on_batch_complete(&report);

    Ok(report)
}

/// Synchronous wrapper around [`run_batch`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_batch_sync(manifest: &Manifest, config: &BatchConfig) -> Result<BatchReport, Md2PdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Md2PdfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run_batch(manifest, config))
}

/// Every `*.pdf` file directly inside `dir`, sorted by name.
///
/// Listing problems are logged and yield whatever was collected so far.
pub async fn list_generated_pdfs(dir: &Path) -> Vec<GeneratedPdf> {
    let mut pdfs = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Cannot list output directory");
            return pdfs;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Output directory listing interrupted");
                break;
            }
        };
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("pdf") {
            continue;
        }
        match entry.metadata().await {
            Ok(meta) if meta.is_file() => pdfs.push(GeneratedPdf {
                name: entry.file_name().to_string_lossy().into_owned(),
                size_bytes: meta.len(),
            }),
            Ok(_) => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Cannot stat PDF"),
        }
    }

    pdfs.sort_by(|a, b| a.name.cmp(&b.name));
    pdfs
}

// ── Internal helpers ─────────────────────────────────────────────────────

pub(crate) fn callback(config: &BatchConfig) -> &dyn BatchProgressCallback {
    config.progress_callback.as_deref().unwrap_or(&NOOP_CALLBACK)
}

/// Create the output directory (idempotent) and return its path.
pub(crate) async fn prepare_output_dir(config: &BatchConfig) -> Result<PathBuf, Md2PdfError> {
    let output_dir = config.output_dir();
    tokio::fs::create_dir_all(&output_dir)
        .await
        .map_err(|e| Md2PdfError::OutputDir {
            path: output_dir.clone(),
            source: e,
        })?;
    Ok(output_dir)
}

/// Pick the renderer, from most-specific to least-specific.
///
/// 1. A pre-built renderer on the config (tests, custom backends).
/// 2. wkhtmltopdf at `config.renderer_path`, or located on the system.
///
/// When wkhtmltopdf cannot be found the batch still runs; every document
/// fails with the lookup error.
pub(crate) fn resolve_renderer(config: &BatchConfig) -> Arc<dyn PdfRenderer> {
    if let Some(ref renderer) = config.renderer {
        return Arc::clone(renderer);
    }
    match WkhtmltopdfRenderer::from_config(config) {
        Ok(renderer) => {
            debug!("Using renderer {}", renderer.executable().display());
            Arc::new(renderer)
        }
        Err(e) => {
            warn!(error = %e, "No PDF renderer available; every document will fail");
            Arc::new(UnavailableRenderer::new(e.to_string()))
        }
    }
}

/// Convert one group; at most `config.concurrency` documents at a time.
async fn process_group(
    group: &DocumentGroup,
    config: &BatchConfig,
    renderer: &dyn PdfRenderer,
    output_dir: &Path,
) -> GroupReport {
    info!("Processing {} ({} documents)", group.name, group.entries.len());
    let outcomes: Vec<DocumentOutcome> =
        stream::iter(group.entries.iter().enumerate().map(|(index, entry)| {
            process_document(&group.name, index, entry, config, renderer, output_dir)
        }))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;
    GroupReport::from_outcomes(&group.name, outcomes)
}

/// Run one manifest entry through every pipeline stage.
pub(crate) async fn process_document(
    group: &str,
    index: usize,
    entry: &ManifestEntry,
    config: &BatchConfig,
    renderer: &dyn PdfRenderer,
    output_dir: &Path,
) -> DocumentOutcome {
    let started = Instant::now();
    let cb = callback(config);
    let mut outcome = DocumentOutcome {
        group: group.to_string(),
        index,
        source: entry.source.clone(),
        output: entry.output.clone(),
        pdf_path: output_dir.join(&entry.output),
        html_path: None,
        title: None,
        duration_ms: 0,
        error: None,
    };

    let source_path = config.source_path(&entry.source);
    let missing = match tokio::fs::try_exists(&source_path).await {
        Ok(true) => None,
        Ok(false) => {
            warn!(source = %entry.source.display(), "Source not found, skipping");
            Some(DocumentError::SourceNotFound {
                path: entry.source.clone(),
            })
        }
        Err(e) => {
            warn!(source = %entry.source.display(), error = %e, "Source cannot be checked, skipping");
            Some(DocumentError::SourceUnreadable {
                path: entry.source.clone(),
                detail: e.to_string(),
            })
        }
    };
    if let Some(error) = missing {
        outcome.error = Some(error);
        cb.on_document_complete(&outcome);
        return outcome;
    }

    cb.on_document_start(group, entry);
    debug!("Converting {}", entry.source.display());

    if let Err(e) = convert_document(entry, config, renderer, output_dir, &source_path, &mut outcome).await {
        warn!(
            source = %entry.source.display(),
            output = %entry.output,
            error = %e,
            "Document failed"
        );
        outcome.error = Some(e);
    } else {
        info!("Created {}", outcome.pdf_path.display());
    }

    outcome.duration_ms = started.elapsed().as_millis() as u64;
    cb.on_document_complete(&outcome);
    outcome
}

async fn convert_document(
    entry: &ManifestEntry,
    config: &BatchConfig,
    renderer: &dyn PdfRenderer,
    output_dir: &Path,
    source_path: &Path,
    outcome: &mut DocumentOutcome,
) -> Result<(), DocumentError> {
    // ── Read source ──────────────────────────────────────────────────────
    let doc = source::load_source(source_path, &entry.source, &entry.output).await?;
    outcome.title = Some(doc.title.clone());

    // ── Transform ────────────────────────────────────────────────────────
    let css = document::load_theme(&config.theme_path()).await;
    let body = markdown::markdown_to_html(&doc.markdown);
    let body = postprocess::postprocess_body(&body, &doc.base_dir);
    let html = document::assemble_html(
        &doc.title,
        &css,
        &body,
        &config.brand,
        &document::generation_timestamp(),
    );

    // ── Write HTML, then render ──────────────────────────────────────────
    if config.keep_html {
        let html_path = output_dir.join(entry.html_name());
        tokio::fs::write(&html_path, &html)
            .await
            .map_err(|e| DocumentError::HtmlWriteFailed {
                path: html_path.clone(),
                detail: e.to_string(),
            })?;
        outcome.html_path = Some(html_path.clone());
        renderer.render(&html_path, &outcome.pdf_path).await?;
    } else {
        // Removed when `tmp` drops, whether or not rendering succeeded.
        let tmp = write_temp_html(output_dir, &html)?;
        renderer.render(tmp.path(), &outcome.pdf_path).await?;
    }
    Ok(())
}

fn write_temp_html(output_dir: &Path, html: &str) -> Result<tempfile::NamedTempFile, DocumentError> {
    let write_failed = |e: std::io::Error| DocumentError::HtmlWriteFailed {
        path: output_dir.to_path_buf(),
        detail: e.to_string(),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".md2pdf-")
        .suffix(".html")
        .tempfile_in(output_dir)
        .map_err(write_failed)?;
    tmp.write_all(html.as_bytes()).map_err(write_failed)?;
    tmp.flush().map_err(write_failed)?;
    Ok(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderFailure;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Writes a tiny PDF, remembering which HTML it was handed.
    #[derive(Default)]
    struct RecordingRenderer {
        seen: Mutex<Vec<(PathBuf, String)>>,
    }

    #[async_trait]
    impl PdfRenderer for RecordingRenderer {
        async fn render(&self, html_path: &Path, pdf_path: &Path) -> Result<(), RenderFailure> {
            let html = std::fs::read_to_string(html_path).map_err(|e| RenderFailure::Invocation {
                detail: e.to_string(),
            })?;
            self.seen.lock().unwrap().push((html_path.to_path_buf(), html));
            std::fs::write(pdf_path, b"%PDF-1.4\n").unwrap();
            Ok(())
        }
    }

    fn docs_with(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, body) in files {
            let path = dir.path().join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, body).unwrap();
        }
        dir
    }

    fn manifest(entries: &[(&str, &str)]) -> Manifest {
        Manifest {
            groups: vec![DocumentGroup::new(
                "Guides",
                entries.iter().map(|(s, o)| ManifestEntry::new(*s, *o)).collect(),
            )],
        }
    }

    #[tokio::test]
    async fn converts_and_keeps_html() {
        let docs = docs_with(&[
            ("guide.md", "# User Guide\n\n![logo](img/logo.png)\n"),
            ("styles/pdf-theme.css", "body { margin: 0; }"),
        ]);
        let renderer = Arc::new(RecordingRenderer::default());
        let config = BatchConfig::builder()
            .docs_dir(docs.path())
            .renderer(renderer.clone())
            .build()
            .unwrap();

        let report = run_batch(&manifest(&[("guide.md", "Guide.pdf")]), &config)
            .await
            .unwrap();

        assert_eq!(report.exit_code(), 0);
        let outcome = &report.groups[0].outcomes[0];
        assert_eq!(outcome.title.as_deref(), Some("User Guide"));
        let html_path = outcome.html_path.clone().unwrap();
        assert_eq!(html_path, docs.path().join("pdf/Guide.html"));
        assert!(html_path.exists());

        let seen = renderer.seen.lock().unwrap();
        let html = &seen[0].1;
        assert!(html.contains("<title>User Guide</title>"));
        assert!(html.contains("body { margin: 0; }"));
        assert!(html.contains("src=\"file://"));
        assert_eq!(report.generated.len(), 1);
        assert_eq!(report.generated[0].name, "Guide.pdf");
    }

    #[tokio::test]
    async fn markdown_extensions_reach_the_rendered_html() {
        let docs = docs_with(&[(
            "guide.md",
            "Title: Internal\n\n# Guide {: .cover}\n\n<div class=\"note\" markdown=\"1\">\n![logo](img/logo.png)\n</div>\n",
        )]);
        let renderer = Arc::new(RecordingRenderer::default());
        let config = BatchConfig::builder()
            .docs_dir(docs.path())
            .renderer(renderer.clone())
            .build()
            .unwrap();

        let report = run_batch(&manifest(&[("guide.md", "Guide.pdf")]), &config)
            .await
            .unwrap();

        assert_eq!(report.exit_code(), 0);
        let seen = renderer.seen.lock().unwrap();
        let html = &seen[0].1;
        assert!(!html.contains("Internal"));
        assert!(html.contains("<h1 class=\"cover\">"));
        assert!(html.contains("<div class=\"note\">"));
        assert!(!html.contains("markdown="));
        assert!(html.contains("src=\"file://"));
    }

    #[tokio::test]
    async fn missing_source_is_counted_not_fatal() {
        let docs = docs_with(&[("a.md", "# A")]);
        let config = BatchConfig::builder()
            .docs_dir(docs.path())
            .renderer(Arc::new(RecordingRenderer::default()))
            .build()
            .unwrap();

        let report = run_batch(&manifest(&[("a.md", "A.pdf"), ("b.md", "B.pdf")]), &config)
            .await
            .unwrap();

        let group = &report.groups[0];
        assert_eq!((group.successful, group.expected), (1, 2));
        assert_eq!(
            group.outcomes[1].error,
            Some(DocumentError::SourceNotFound { path: "b.md".into() })
        );
        assert_eq!(report.exit_code(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn uncheckable_source_is_unreadable_not_missing() {
        // A regular file used as a directory makes the existence check fail.
        let docs = docs_with(&[("blocker", "a file, not a dir")]);
        let config = BatchConfig::builder()
            .docs_dir(docs.path())
            .renderer(Arc::new(RecordingRenderer::default()))
            .build()
            .unwrap();

        let report = run_batch(&manifest(&[("blocker/a.md", "A.pdf")]), &config)
            .await
            .unwrap();

        let outcome = &report.groups[0].outcomes[0];
        assert!(
            matches!(
                &outcome.error,
                Some(DocumentError::SourceUnreadable { path, .. }) if path == Path::new("blocker/a.md")
            ),
            "got: {:?}",
            outcome.error
        );
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test]
    async fn discarded_html_leaves_no_files() {
        let docs = docs_with(&[("a.md", "no heading here")]);
        let renderer = Arc::new(RecordingRenderer::default());
        let config = BatchConfig::builder()
            .docs_dir(docs.path())
            .keep_html(false)
            .renderer(renderer.clone())
            .build()
            .unwrap();

        let report = run_batch(&manifest(&[("a.md", "Alpha-Notes.pdf")]), &config)
            .await
            .unwrap();

        assert_eq!(report.groups[0].outcomes[0].title.as_deref(), Some("Alpha Notes"));
        assert!(report.groups[0].outcomes[0].html_path.is_none());
        let leftovers: Vec<_> = std::fs::read_dir(docs.path().join("pdf"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(leftovers, vec!["Alpha-Notes.pdf".to_string()]);
        // The renderer did get a real .html file.
        assert_eq!(
            renderer.seen.lock().unwrap()[0].0.extension().and_then(|e| e.to_str()),
            Some("html")
        );
    }

    #[tokio::test]
    async fn output_dir_failure_is_fatal() {
        let docs = docs_with(&[("a.md", "# A"), ("blocker", "a file, not a dir")]);
        let config = BatchConfig::builder()
            .docs_dir(docs.path())
            .output_dir(docs.path().join("blocker/pdf"))
            .renderer(Arc::new(RecordingRenderer::default()))
            .build()
            .unwrap();
        let err = run_batch(&manifest(&[("a.md", "A.pdf")]), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, Md2PdfError::OutputDir { .. }));
    }

    #[tokio::test]
    async fn listing_is_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.pdf"), vec![0u8; 2048]).unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"x").unwrap();
        std::fs::write(dir.path().join("a.html"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("dir.pdf")).unwrap();

        let pdfs = list_generated_pdfs(dir.path()).await;
        let names: Vec<&str> = pdfs.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "b.pdf"]);
        assert_eq!(pdfs[1].size_bytes, 2048);
    }

    #[tokio::test]
    async fn listing_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(list_generated_pdfs(&dir.path().join("nope")).await.is_empty());
    }

    #[test]
    fn explicit_renderer_path_is_trusted() {
        let config = BatchConfig::builder()
            .renderer_path("/definitely/not/here/wkhtmltopdf")
            .build()
            .unwrap();
        // An explicit path is trusted; failure surfaces at spawn time.
        assert_eq!(resolve_renderer(&config).name(), "wkhtmltopdf");
    }
}
