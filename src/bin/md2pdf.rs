//! CLI binary for edgequake-md2pdf.
//!
//! A thin shim over the library crate that maps CLI flags to `BatchConfig`,
//! prints the conversion report on stdout and exits 0 only when every
//! document was converted.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_md2pdf::{
    run_batch, BatchConfig, BatchProgressCallback, BatchReport, DocumentError, DocumentOutcome,
    GroupReport, Manifest, ManifestEntry, ProgressCallback, RenderFailure,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const RULE_WIDTH: usize = 60;
const GROUP_RULE_WIDTH: usize = 40;

// ── Console report ───────────────────────────────────────────────────────────

/// Prints the per-group and per-document report lines on stdout and, when
/// enabled, keeps a progress bar on stderr. Lines are printed through
/// [`ProgressBar::suspend`] so the bar never tears them.
struct ConsoleReporter {
    brand: String,
    bar: Option<ProgressBar>,
}

impl ConsoleReporter {
    fn new(brand: String, show_progress: bool) -> Arc<Self> {
        let bar = show_progress.then(|| {
            let bar = ProgressBar::new(0);
            let style = ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>2}/{len} documents  ⏱ {elapsed_precise}  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
            bar.set_style(style);
            bar.set_prefix("Rendering");
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        Arc::new(Self { brand, bar })
    }

    fn line(&self, text: impl AsRef<str>) {
        let text = text.as_ref();
        match &self.bar {
            Some(bar) => bar.suspend(|| println!("{text}")),
            None => println!("{text}"),
        }
    }
}

impl BatchProgressCallback for ConsoleReporter {
    fn on_batch_start(&self, total_documents: usize) {
        if let Some(bar) = &self.bar {
            bar.set_length(total_documents as u64);
        }
        self.line(banner(&self.brand));
    }

    fn on_group_start(&self, group: &str, _document_count: usize) {
        self.line(group_header(group));
    }

    fn on_document_start(&self, _group: &str, entry: &ManifestEntry) {
        if let Some(bar) = &self.bar {
            bar.set_message(entry.output.clone());
        }
        self.line(format!("  Converting: {}", entry.source.display()));
    }

    fn on_document_complete(&self, outcome: &DocumentOutcome) {
        self.line(document_report(outcome));
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    fn on_group_complete(&self, report: &GroupReport) {
        self.line(group_summary(report));
    }

    fn on_batch_complete(&self, _report: &BatchReport) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

// ── Report lines ─────────────────────────────────────────────────────────────
// Each function returns the text of one report item; the reporter and
// `main` decide where it goes.

fn banner(brand: &str) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    format!("\n{rule}\n  {brand} Documentation PDF Generator\n{rule}\n")
}

fn group_header(group: &str) -> String {
    format!("Processing {group}:\n{}", "-".repeat(GROUP_RULE_WIDTH))
}

/// What a finished document prints: `Created:`, `Skipping:`, or a diagnostic
/// followed by `Failed:`.
fn document_report(outcome: &DocumentOutcome) -> String {
    match &outcome.error {
        None => format!("  Created: {}", outcome.output),
        Some(DocumentError::SourceNotFound { path }) => {
            format!("  Skipping: {} (file not found)", path.display())
        }
        Some(err) => format!("{}\n  Failed: {}", diagnostic_line(err), outcome.output),
    }
}

/// The line printed before `Failed:` for a document that was attempted.
fn diagnostic_line(err: &DocumentError) -> String {
    match err {
        DocumentError::Render(RenderFailure::TimedOut { .. }) => {
            "  Error: PDF generation timed out".to_string()
        }
        DocumentError::Render(RenderFailure::NonZeroExit { stderr_excerpt, .. }) => {
            format!("  Warning: {stderr_excerpt}")
        }
        DocumentError::Render(RenderFailure::Invocation { detail }) => format!("  Error: {detail}"),
        other => format!("  Error: {other}"),
    }
}

fn group_summary(report: &GroupReport) -> String {
    format!(
        "\n{}: {}/{} successful\n",
        report.name, report.successful, report.expected
    )
}

/// Totals block and the listing of PDFs in the output directory.
fn summary(report: &BatchReport) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = format!(
        "{rule}\n  Total: {}/{} PDFs generated\n  Output: {}\n{rule}\n\n",
        report.total_successful(),
        report.total_expected(),
        report.output_dir.display()
    );
    if !report.generated.is_empty() {
        out.push_str("Generated PDFs:\n");
        for pdf in &report.generated {
            out.push_str(&format!("  - {} ({:.1} KB)\n", pdf.name, pdf.size_kb()));
        }
    }
    out
}

// ── CLI definition ───────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert the built-in documentation suite (docs/*.md → docs/pdf/*.pdf)
  md2pdf

  # Another documentation root, four documents at a time
  md2pdf --docs-dir handbook --jobs 4

  # Custom manifest, PDFs only (no intermediate HTML kept)
  md2pdf --manifest manifest.json --discard-html

  # Machine-readable report
  md2pdf --json > report.json

MANIFEST FORMAT:
  {
    "groups": [
      { "name": "Main Documents",
        "entries": [ { "source": "guide.md", "output": "Guide.pdf" } ] }
    ]
  }
  Sources are relative to --docs-dir; outputs are file names in --output-dir.

ENVIRONMENT VARIABLES:
  WKHTMLTOPDF_PATH    Path to the wkhtmltopdf executable (else searched on PATH)
  RUST_LOG            Log filter, overrides --verbose / --quiet

EXIT STATUS:
  0 when every document was converted, 1 otherwise.
  A manifest with no documents is rejected as invalid and also exits 1;
  there is no empty 0/0 run.
"#;

/// Batch-convert Markdown documents to styled PDFs with wkhtmltopdf.
#[derive(Parser, Debug)]
#[command(
    name = "md2pdf",
    version,
    about = "Batch-convert Markdown documents to styled PDFs with wkhtmltopdf",
    long_about = "Convert every document in a manifest from Markdown to a themed PDF. Each \
document is rendered to standalone HTML (theme CSS inlined, relative images made absolute, \
generation footer added) and printed to PDF by wkhtmltopdf. A failing document never stops \
the batch.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Documentation root; manifest sources are relative to it.
    #[arg(long, env = "MD2PDF_DOCS_DIR", default_value = "docs")]
    docs_dir: PathBuf,

    /// Output directory for HTML and PDF files [default: <DOCS_DIR>/pdf].
    #[arg(short, long, env = "MD2PDF_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Theme stylesheet [default: <DOCS_DIR>/styles/pdf-theme.css].
    #[arg(long, env = "MD2PDF_THEME")]
    theme: Option<PathBuf>,

    /// JSON manifest to use instead of the built-in documentation suite.
    #[arg(short, long, env = "MD2PDF_MANIFEST")]
    manifest: Option<PathBuf>,

    /// wkhtmltopdf executable [default: $WKHTMLTOPDF_PATH, then PATH].
    #[arg(long, env = "MD2PDF_RENDERER")]
    renderer: Option<PathBuf>,

    /// Per-document renderer timeout in seconds.
    #[arg(long, env = "MD2PDF_TIMEOUT", default_value_t = 120,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Documents rendered at once within a group.
    #[arg(short, long, env = "MD2PDF_JOBS", default_value_t = 1)]
    jobs: usize,

    /// Delete the intermediate HTML once each PDF is rendered.
    #[arg(long, env = "MD2PDF_DISCARD_HTML")]
    discard_html: bool,

    /// Label for the footer badge and the report banner.
    #[arg(long, env = "MD2PDF_BRAND", default_value = "hanaML")]
    brand: String,

    /// Running page header [default: "<BRAND> Documentation"].
    #[arg(long, env = "MD2PDF_HEADER_TEXT")]
    header_text: Option<String>,

    /// Print the report as JSON instead of text.
    #[arg(long, env = "MD2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "MD2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MD2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress the report; only errors and the exit status remain.
    #[arg(short, long, env = "MD2PDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = cli.shows_progress();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_log_filter(&cli))),
        )
        .with_writer(io::stderr)
        .init();

    // ── Manifest ─────────────────────────────────────────────────────────
    let manifest = match &cli.manifest {
        Some(path) => Manifest::load(path)
            .with_context(|| format!("Failed to load manifest {}", path.display()))?,
        None => Manifest::builtin(),
    };

    // ── Build config ─────────────────────────────────────────────────────
    let reporter: Option<ProgressCallback> = if cli.quiet || cli.json {
        None
    } else {
        let cb = ConsoleReporter::new(cli.brand.clone(), show_progress);
        Some(cb as Arc<dyn BatchProgressCallback>)
    };
    let config = build_config(&cli, reporter)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let report = run_batch(&manifest, &config)
        .await
        .context("Batch conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        print!("{}", summary(&report));
    }

    Ok(if report.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

impl Cli {
    fn shows_progress(&self) -> bool {
        !self.quiet && !self.no_progress && !self.json
    }
}

/// Log filter used when `RUST_LOG` is unset.
///
/// The text report already says what INFO logs would, so only warnings get
/// through while it is on screen. The JSON report leaves stderr to the logs.
fn default_log_filter(cli: &Cli) -> &'static str {
    if cli.verbose {
        "debug"
    } else if cli.quiet || cli.shows_progress() {
        "error"
    } else if !cli.json {
        "warn"
    } else {
        "info"
    }
}

/// Map CLI args to `BatchConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<BatchConfig> {
    let header_text = cli
        .header_text
        .clone()
        .unwrap_or_else(|| format!("{} Documentation", cli.brand));

    let mut builder = BatchConfig::builder()
        .docs_dir(&cli.docs_dir)
        .brand(&cli.brand)
        .header_text(header_text)
        .render_timeout_secs(cli.timeout)
        .concurrency(cli.jobs)
        .keep_html(!cli.discard_html);

    if let Some(ref dir) = cli.output_dir {
        builder = builder.output_dir(dir);
    }
    if let Some(ref theme) = cli.theme {
        builder = builder.theme_path(theme);
    }
    if let Some(ref renderer) = cli.renderer {
        builder = builder.renderer_path(renderer);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use edgequake_md2pdf::GeneratedPdf;

    fn outcome(output: &str, error: Option<DocumentError>) -> DocumentOutcome {
        DocumentOutcome {
            group: "Main Documents".into(),
            index: 0,
            source: "guide.md".into(),
            output: output.into(),
            pdf_path: PathBuf::from("docs/pdf").join(output),
            html_path: None,
            title: None,
            duration_ms: 0,
            error,
        }
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("md2pdf").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn banner_names_the_brand() {
        let text = banner("hanaML");
        assert!(text.contains("  hanaML Documentation PDF Generator\n"), "got: {text}");
        assert!(text.contains(&"=".repeat(RULE_WIDTH)));
    }

    #[test]
    fn group_header_is_ruled() {
        assert_eq!(
            group_header("Templates"),
            format!("Processing Templates:\n{}", "-".repeat(GROUP_RULE_WIDTH))
        );
    }

    #[test]
    fn created_line() {
        assert_eq!(document_report(&outcome("Guide.pdf", None)), "  Created: Guide.pdf");
    }

    #[test]
    fn skipping_line_for_missing_source() {
        let missing = DocumentError::SourceNotFound {
            path: "templates/nda.md".into(),
        };
        assert_eq!(
            document_report(&outcome("NDA.pdf", Some(missing))),
            "  Skipping: templates/nda.md (file not found)"
        );
    }

    #[test]
    fn warning_line_for_renderer_exit() {
        let err = DocumentError::Render(RenderFailure::NonZeroExit {
            exit_code: Some(1),
            stderr_excerpt: "Exit with code 1 due to network error".into(),
        });
        assert_eq!(
            document_report(&outcome("Guide.pdf", Some(err))),
            "  Warning: Exit with code 1 due to network error\n  Failed: Guide.pdf"
        );
    }

    #[test]
    fn timeout_line() {
        let err = DocumentError::Render(RenderFailure::TimedOut { secs: 120 });
        assert_eq!(diagnostic_line(&err), "  Error: PDF generation timed out");
        assert!(document_report(&outcome("Guide.pdf", Some(err))).ends_with("  Failed: Guide.pdf"));
    }

    #[test]
    fn other_errors_use_their_message() {
        let err = DocumentError::SourceUnreadable {
            path: "guide.md".into(),
            detail: "invalid UTF-8".into(),
        };
        assert_eq!(diagnostic_line(&err), "  Error: failed to read guide.md: invalid UTF-8");
    }

    #[test]
    fn group_tally_line() {
        let report = GroupReport::from_outcomes(
            "Main Documents",
            vec![
                outcome("A.pdf", None),
                outcome("B.pdf", Some(DocumentError::SourceNotFound { path: "b.md".into() })),
            ],
        );
        assert_eq!(group_summary(&report), "\nMain Documents: 1/2 successful\n");
    }

    #[test]
    fn summary_totals_and_listing() {
        let report = BatchReport {
            groups: vec![GroupReport::from_outcomes("Main Documents", vec![outcome("A.pdf", None)])],
            output_dir: "docs/pdf".into(),
            generated: vec![
                GeneratedPdf {
                    name: "A.pdf".into(),
                    size_bytes: 52_531,
                },
                GeneratedPdf {
                    name: "Old.pdf".into(),
                    size_bytes: 0,
                },
            ],
            total_duration_ms: 10,
        };
        let text = summary(&report);
        assert!(text.contains("  Total: 1/1 PDFs generated\n"), "got: {text}");
        assert!(text.contains("  Output: docs/pdf\n"), "got: {text}");
        assert!(text.contains("Generated PDFs:\n  - A.pdf (51.3 KB)\n  - Old.pdf (0.0 KB)\n"), "got: {text}");
    }

    #[test]
    fn summary_without_pdfs_has_no_listing() {
        let report = BatchReport {
            groups: Vec::new(),
            output_dir: "out".into(),
            generated: Vec::new(),
            total_duration_ms: 0,
        };
        assert!(!summary(&report).contains("Generated PDFs:"));
    }

    #[test]
    fn log_filter_stays_quiet_under_text_report() {
        assert_eq!(default_log_filter(&cli(&[])), "error");
        assert_eq!(default_log_filter(&cli(&["--no-progress"])), "warn");
        assert_eq!(default_log_filter(&cli(&["--quiet"])), "error");
        assert_eq!(default_log_filter(&cli(&["--json"])), "info");
        assert_eq!(default_log_filter(&cli(&["--no-progress", "--verbose"])), "debug");
    }

    #[test]
    fn help_mentions_empty_manifest_exit_status() {
        let help = Cli::command().render_long_help().to_string();
        assert!(help.contains("A manifest with no documents is rejected"), "got: {help}");
    }
}
