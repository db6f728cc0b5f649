//! Configuration types for batch Markdown-to-PDF conversion.
//!
//! All batch behaviour is controlled through [`BatchConfig`], built via its
//! [`BatchConfigBuilder`]. The defaults reproduce the fixed documentation
//! pipeline exactly: `docs/` as the source root, `docs/pdf/` for output,
//! `docs/styles/pdf-theme.css` as the theme, A4 pages rendered by
//! wkhtmltopdf with a 120-second limit per document.

use crate::error::Md2PdfError;
use crate::pipeline::render::PdfRenderer;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default documentation root.
pub const DEFAULT_DOCS_DIR: &str = "docs";
/// Output directory, relative to the documentation root.
pub const DEFAULT_OUTPUT_SUBDIR: &str = "pdf";
/// Theme stylesheet, relative to the documentation root.
pub const DEFAULT_THEME_PATH: &str = "styles/pdf-theme.css";
/// Label shown in the HTML footer badge and the console banner.
pub const DEFAULT_BRAND: &str = "hanaML";

/// Configuration for a batch run.
///
/// Built via [`BatchConfig::builder()`] or using [`BatchConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_md2pdf::BatchConfig;
///
/// let config = BatchConfig::builder()
///     .docs_dir("handbook")
///     .render_timeout_secs(60)
///     .keep_html(false)
///     .build()
///     .unwrap();
/// assert_eq!(config.output_dir(), std::path::Path::new("handbook/pdf"));
/// ```
#[derive(Clone)]
pub struct BatchConfig {
    /// Root that manifest `source` paths are resolved against. Default: `docs`.
    pub docs_dir: PathBuf,

    /// Where HTML and PDF files are written. Default: `<docs_dir>/pdf`.
    pub output_dir: Option<PathBuf>,

    /// CSS theme embedded in every document. Default:
    /// `<docs_dir>/styles/pdf-theme.css`. A missing file yields unstyled
    /// output, not an error.
    pub theme_path: Option<PathBuf>,

    /// Brand label for the footer badge. Default: `hanaML`.
    pub brand: String,

    /// Page geometry and running header/footer passed to the renderer.
    pub layout: PageLayout,

    /// Wall-clock limit per renderer invocation, in seconds. Default: 120.
    pub render_timeout_secs: u64,

    /// Keep the intermediate `.html` next to each PDF. Default: true.
    ///
    /// When false the HTML is written to a temporary file in the output
    /// directory and removed as soon as the renderer returns.
    pub keep_html: bool,

    /// Documents rendered at once within a group. Default: 1 (sequential).
    pub concurrency: usize,

    /// Explicit renderer executable. If None, wkhtmltopdf is located via
    /// `WKHTMLTOPDF_PATH` or `PATH`.
    pub renderer_path: Option<PathBuf>,

    /// Pre-constructed renderer. Takes precedence over `renderer_path`.
    pub renderer: Option<Arc<dyn PdfRenderer>>,

    /// Receives per-group and per-document events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from(DEFAULT_DOCS_DIR),
            output_dir: None,
            theme_path: None,
            brand: DEFAULT_BRAND.to_string(),
            layout: PageLayout::default(),
            render_timeout_secs: 120,
            keep_html: true,
            concurrency: 1,
            renderer_path: None,
            renderer: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("docs_dir", &self.docs_dir)
            .field("output_dir", &self.output_dir)
            .field("theme_path", &self.theme_path)
            .field("brand", &self.brand)
            .field("layout", &self.layout)
            .field("render_timeout_secs", &self.render_timeout_secs)
            .field("keep_html", &self.keep_html)
            .field("concurrency", &self.concurrency)
            .field("renderer_path", &self.renderer_path)
            .field("renderer", &self.renderer.as_ref().map(|_| "<dyn PdfRenderer>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl BatchConfig {
    /// Create a new builder for `BatchConfig`.
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: Self::default(),
        }
    }

    /// Effective output directory.
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| self.docs_dir.join(DEFAULT_OUTPUT_SUBDIR))
    }

    /// Effective theme stylesheet path.
    pub fn theme_path(&self) -> PathBuf {
        self.theme_path
            .clone()
            .unwrap_or_else(|| self.docs_dir.join(DEFAULT_THEME_PATH))
    }

    /// Resolve a manifest `source` against the documentation root.
    pub fn source_path(&self, source: &Path) -> PathBuf {
        self.docs_dir.join(source)
    }
}

/// Builder for [`BatchConfig`].
#[derive(Debug)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn docs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.docs_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(dir.into());
        self
    }

    pub fn theme_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.theme_path = Some(path.into());
        self
    }

    pub fn brand(mut self, brand: impl Into<String>) -> Self {
        self.config.brand = brand.into();
        self
    }

    pub fn layout(mut self, layout: PageLayout) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn header_text(mut self, text: impl Into<String>) -> Self {
        self.config.layout.header_text = text.into();
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs.max(1);
        self
    }

    pub fn keep_html(mut self, v: bool) -> Self {
        self.config.keep_html = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn renderer_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.renderer_path = Some(path.into());
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn PdfRenderer>) -> Self {
        self.config.renderer = Some(renderer);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BatchConfig, Md2PdfError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(Md2PdfError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.render_timeout_secs == 0 {
            return Err(Md2PdfError::InvalidConfig(
                "Render timeout must be ≥ 1 second".into(),
            ));
        }
        if c.layout.page_size.trim().is_empty() {
            return Err(Md2PdfError::InvalidConfig(
                "Page size must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Page layout ──────────────────────────────────────────────────────────

/// Page geometry and running header/footer handed to the renderer.
///
/// Defaults match the documentation suite: A4, 20/25/15/15 mm margins,
/// `[page] / [topage]` centred in the footer and the suite title centred in
/// the header, both at 9 pt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_size: String,
    pub margin_top_mm: u32,
    pub margin_bottom_mm: u32,
    pub margin_left_mm: u32,
    pub margin_right_mm: u32,
    pub header_spacing_mm: u32,
    pub footer_spacing_mm: u32,
    /// Footer text; wkhtmltopdf substitutes `[page]` and `[topage]`.
    pub footer_text: String,
    pub footer_font_size: u32,
    pub header_text: String,
    pub header_font_size: u32,
    pub header_font_name: String,
    /// Delay before capture so embedded scripts and web fonts settle.
    pub javascript_delay_ms: u64,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            page_size: "A4".to_string(),
            margin_top_mm: 20,
            margin_bottom_mm: 25,
            margin_left_mm: 15,
            margin_right_mm: 15,
            header_spacing_mm: 5,
            footer_spacing_mm: 5,
            footer_text: "[page] / [topage]".to_string(),
            footer_font_size: 9,
            header_text: format!("{DEFAULT_BRAND} Documentation"),
            header_font_size: 9,
            header_font_name: "Inter".to_string(),
            javascript_delay_ms: 1000,
        }
    }
}
