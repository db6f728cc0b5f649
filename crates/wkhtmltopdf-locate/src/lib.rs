//! # wkhtmltopdf-locate
//!
//! Find the [wkhtmltopdf](https://wkhtmltopdf.org/) executable so callers can
//! spawn it with an absolute path and report a precise error when it is
//! missing, instead of a bare `No such file or directory` from the OS.
//!
//! ## Resolution order
//!
//! 1. `WKHTMLTOPDF_PATH`: an explicit path to the executable. If it is set
//!    but does not point at a file, resolution fails rather than silently
//!    falling back to a different binary.
//! 2. Every directory in `PATH`, in order, looking for `wkhtmltopdf`
//!    (`wkhtmltopdf.exe` on Windows).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use wkhtmltopdf_locate::locate_wkhtmltopdf;
//!
//! let exe = locate_wkhtmltopdf().expect("wkhtmltopdf not installed");
//! println!("using {}", exe.display());
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Environment variable holding an explicit path to the executable.
pub const WKHTMLTOPDF_PATH_ENV: &str = "WKHTMLTOPDF_PATH";

/// File name of the executable on the current platform.
#[cfg(windows)]
pub const EXECUTABLE_NAME: &str = "wkhtmltopdf.exe";
#[cfg(not(windows))]
pub const EXECUTABLE_NAME: &str = "wkhtmltopdf";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned while locating the executable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocateError {
    /// `WKHTMLTOPDF_PATH` is set but does not name an existing file.
    #[error("{WKHTMLTOPDF_PATH_ENV} points to '{path}', which is not a file")]
    OverrideMissing { path: PathBuf },

    /// No directory on `PATH` contains the executable.
    #[error(
        "{EXECUTABLE_NAME} was not found on PATH.\n\
Install it from https://wkhtmltopdf.org/downloads.html or set {WKHTMLTOPDF_PATH_ENV}."
    )]
    NotFound,
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Resolve the executable using the process environment.
pub fn locate_wkhtmltopdf() -> Result<PathBuf, LocateError> {
    let override_path = std::env::var_os(WKHTMLTOPDF_PATH_ENV);
    let search_path = std::env::var_os("PATH");
    locate_in(override_path.as_deref(), search_path.as_deref())
}

/// Returns `true` when [`locate_wkhtmltopdf`] would succeed.
pub fn is_wkhtmltopdf_available() -> bool {
    locate_wkhtmltopdf().is_ok()
}

/// Resolve the executable from explicit inputs.
///
/// `override_path` plays the role of `WKHTMLTOPDF_PATH` and `search_path`
/// the role of `PATH`. An empty override is treated as unset.
pub fn locate_in(
    override_path: Option<&OsStr>,
    search_path: Option<&OsStr>,
) -> Result<PathBuf, LocateError> {
    if let Some(raw) = override_path.filter(|p| !p.is_empty()) {
        let path = PathBuf::from(raw);
        if path.is_file() {
            return Ok(path);
        }
        return Err(LocateError::OverrideMissing { path });
    }

    let Some(search_path) = search_path else {
        return Err(LocateError::NotFound);
    };

    std::env::split_paths(search_path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(EXECUTABLE_NAME))
        .find(|candidate| is_executable(candidate))
        .ok_or(LocateError::NotFound)
}

// ── Internal helpers ─────────────────────────────────────────────────────────

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
