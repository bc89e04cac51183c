//! Platform-specific path helpers.

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Returns the current user's home directory.
///
/// # Errors
///
/// Returns [`Error::NoHomeDir`] if the home directory cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    home::home_dir().ok_or(Error::NoHomeDir)
}

/// Expands a leading `~` or `~/` to the home directory.
///
/// # Errors
///
/// Returns [`Error::NoHomeDir`] if the path starts with `~` and the home
/// directory cannot be determined.
pub fn expand_tilde(path: &str) -> Result<PathBuf> {
    if path == "~" {
        return home_dir();
    }
    match path.strip_prefix("~/") {
        Some(rest) => Ok(home_dir()?.join(rest)),
        None => Ok(PathBuf::from(path)),
    }
}

/// Name of the current user, from `$USER` or `$USERNAME`.
#[must_use]
pub fn user_name() -> Option<String> {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|name| !name.is_empty())
}
