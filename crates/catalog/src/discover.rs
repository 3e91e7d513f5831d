use crate::error::{ErrorKind, Result};
use std::path::{Path, PathBuf};

const EXECUTABLE: &str = "calibredb";

/// Install locations checked when the tool is not on `PATH`.
const KNOWN_LOCATIONS: &[&str] = &[
    "/opt/calibre/calibredb",
    "/usr/bin/calibredb",
    "/Applications/calibre.app/Contents/MacOS/calibredb",
    r"C:\Program Files\Calibre2\calibredb.exe",
    r"C:\Program Files (x86)\Calibre2\calibredb.exe",
];

/// Locates the catalog tool.
///
/// An explicitly configured executable always wins; it may be a path or a
/// bare name to resolve on `PATH`. Otherwise `PATH` is searched, then the
/// default install locations.
///
/// # Errors
/// [`ErrorKind::ToolNotFound`] if nothing usable was found.
pub fn discover(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(explicit) = explicit {
        if explicit.is_file() {
            return Ok(explicit.to_path_buf());
        }
        if let Ok(path) = which::which(explicit) {
            return Ok(path);
        }
        tracing::warn!(path = %explicit.display(), "Configured catalog tool does not exist");
        exn::bail!(ErrorKind::ToolNotFound);
    }
    if let Ok(path) = which::which(EXECUTABLE) {
        return Ok(path);
    }
    tracing::info!("Catalog tool not found in PATH; checking default install locations");
    for candidate in KNOWN_LOCATIONS.iter().map(Path::new) {
        if candidate.is_file() {
            tracing::trace!(path = %candidate.display(), "Discovered catalog tool");
            return Ok(candidate.to_path_buf());
        }
    }
    exn::bail!(ErrorKind::ToolNotFound);
}
