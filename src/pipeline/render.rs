//! HTML → PDF via an external renderer process.
//!
//! [`PdfRenderer`] is the seam between the batch driver and whatever turns
//! HTML into PDF. The production implementation, [`WkhtmltopdfRenderer`],
//! spawns `wkhtmltopdf` with the configured [`PageLayout`] and enforces a
//! wall-clock limit: on expiry the child is killed and the document is
//! reported as timed out.
//!
//! Every failure is classified as a [`RenderFailure`] so callers can print
//! the right diagnostic, but none of them is fatal to a batch.

use crate::config::{BatchConfig, PageLayout};
use crate::error::RenderFailure;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};
use wkhtmltopdf_locate::{locate_wkhtmltopdf, LocateError};

/// Longest stderr excerpt carried in a [`RenderFailure::NonZeroExit`].
pub const STDERR_EXCERPT_CHARS: usize = 200;

/// Converts an HTML file on disk into a PDF file on disk.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    /// Render `html_path` into `pdf_path`, overwriting it.
    ///
    /// Must return within a bounded time.
    async fn render(&self, html_path: &Path, pdf_path: &Path) -> Result<(), RenderFailure>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "renderer"
    }
}

/// Runs the `wkhtmltopdf` executable.
#[derive(Debug, Clone)]
pub struct WkhtmltopdfRenderer {
    executable: PathBuf,
    layout: PageLayout,
    timeout: Duration,
}

impl WkhtmltopdfRenderer {
    pub fn new(executable: impl Into<PathBuf>, layout: PageLayout, timeout: Duration) -> Self {
        Self {
            executable: executable.into(),
            layout,
            timeout,
        }
    }

    /// Use `config.renderer_path`, or locate wkhtmltopdf via
    /// `WKHTMLTOPDF_PATH` / `PATH`.
    pub fn from_config(config: &BatchConfig) -> Result<Self, LocateError> {
        let executable = match &config.renderer_path {
            Some(path) => path.clone(),
            None => locate_wkhtmltopdf()?,
        };
        Ok(Self::new(
            executable,
            config.layout.clone(),
            Duration::from_secs(config.render_timeout_secs),
        ))
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Full argument list: layout options, then the input and output paths.
    pub fn command_args(&self, html_path: &Path, pdf_path: &Path) -> Vec<OsString> {
        let l = &self.layout;
        let mut args: Vec<OsString> = [
            "--enable-local-file-access".to_string(),
            "--page-size".to_string(),
            l.page_size.clone(),
            "--margin-top".to_string(),
            format!("{}mm", l.margin_top_mm),
            "--margin-bottom".to_string(),
            format!("{}mm", l.margin_bottom_mm),
            "--margin-left".to_string(),
            format!("{}mm", l.margin_left_mm),
            "--margin-right".to_string(),
            format!("{}mm", l.margin_right_mm),
            "--header-spacing".to_string(),
            l.header_spacing_mm.to_string(),
            "--footer-spacing".to_string(),
            l.footer_spacing_mm.to_string(),
            "--footer-center".to_string(),
            l.footer_text.clone(),
            "--footer-font-size".to_string(),
            l.footer_font_size.to_string(),
            "--header-center".to_string(),
            l.header_text.clone(),
            "--header-font-size".to_string(),
            l.header_font_size.to_string(),
            "--header-font-name".to_string(),
            l.header_font_name.clone(),
            "--encoding".to_string(),
            "UTF-8".to_string(),
            "--print-media-type".to_string(),
            "--no-stop-slow-scripts".to_string(),
            "--javascript-delay".to_string(),
            l.javascript_delay_ms.to_string(),
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(html_path.as_os_str().to_owned());
        args.push(pdf_path.as_os_str().to_owned());
        args
    }
}

#[async_trait]
impl PdfRenderer for WkhtmltopdfRenderer {
    async fn render(&self, html_path: &Path, pdf_path: &Path) -> Result<(), RenderFailure> {
        let started_at = Instant::now();
        let child = Command::new(&self.executable)
            .args(self.command_args(html_path, pdf_path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                warn!(
                    op = "render::spawn",
                    result = "error",
                    executable = %self.executable.display(),
                    error = %err,
                    "Failed to spawn renderer"
                );
                RenderFailure::Invocation {
                    detail: format!("failed to run {}: {err}", self.executable.display()),
                }
            })?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                return Err(RenderFailure::Invocation {
                    detail: format!("failed waiting for {}: {err}", self.executable.display()),
                })
            }
            Err(_) => {
                warn!(
                    op = "render::wait",
                    result = "timeout",
                    timeout_secs = self.timeout.as_secs(),
                    html = %html_path.display(),
                    "Renderer timed out; killed"
                );
                return Err(RenderFailure::TimedOut {
                    secs: self.timeout.as_secs(),
                });
            }
        };

        if !output.status.success() {
            let stderr_excerpt = stderr_excerpt(&output.stderr);
            warn!(
                op = "render::wait",
                result = "error",
                exit_code = output.status.code().map(i64::from).unwrap_or(-1),
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                stderr = %stderr_excerpt,
                "Renderer exited unsuccessfully"
            );
            return Err(RenderFailure::NonZeroExit {
                exit_code: output.status.code(),
                stderr_excerpt,
            });
        }

        debug!(
            op = "render::wait",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            pdf = %pdf_path.display(),
            "Renderer finished"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "wkhtmltopdf"
    }
}

/// Stand-in used when no renderer executable could be found: every
/// document fails with the lookup error instead of the batch aborting.
#[derive(Debug, Clone)]
pub struct UnavailableRenderer {
    reason: String,
}

impl UnavailableRenderer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl PdfRenderer for UnavailableRenderer {
    async fn render(&self, _html_path: &Path, _pdf_path: &Path) -> Result<(), RenderFailure> {
        Err(RenderFailure::Invocation {
            detail: self.reason.clone(),
        })
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

/// First [`STDERR_EXCERPT_CHARS`] characters of stderr, or `Unknown error`.
pub fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    if text.is_empty() {
        "Unknown error".to_string()
    } else {
        text.chars().take(STDERR_EXCERPT_CHARS).collect()
    }
}
