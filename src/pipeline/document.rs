//! Standalone HTML assembly: theme stylesheet, body and generation footer.

use chrono::{DateTime, Local};
use std::path::Path;
use tracing::{debug, warn};

/// Timestamp format used in the footer.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Read the theme stylesheet verbatim.
///
/// A missing theme is normal for ad-hoc runs and yields an empty string;
/// any other read error is logged and also yields an empty string.
pub async fn load_theme(path: &Path) -> String {
    match tokio::fs::read_to_string(path).await {
        Ok(css) => css,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No theme at {}, rendering unstyled", path.display());
            String::new()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Theme unreadable, rendering unstyled");
            String::new()
        }
    }
}

/// Local wall-clock time formatted for the footer.
pub fn generation_timestamp() -> String {
    format_timestamp(&Local::now())
}

pub fn format_timestamp(at: &DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Wrap `body` in an HTML5 document with the theme inlined and a footer
/// carrying `brand` and `timestamp`.
///
/// `title` and `brand` are HTML-escaped; `css` and `body` are inserted as-is.
pub fn assemble_html(title: &str, css: &str, body: &str, brand: &str, timestamp: &str) -> String {
    let title = html_escape::encode_text(title);
    let brand = html_escape::encode_text(brand);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
{css}
    </style>
</head>
<body>
{body}
    <div class="footer">
        <span class="badge">{brand}</span>
        <p>Generated on {timestamp}</p>
    </div>
</body>
</html>"#
    )
}
