//! Per-user directory resolution.

use std::path::{Path, PathBuf};

use crate::scheme::SchemeFamily;

/// `$HOME/.cache`, or `None` when no home directory is known.
pub fn default_cache_root() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".cache"))
}

/// `<cache_root>/ibus/<family dir>`
pub fn user_dir(cache_root: &Path, family: SchemeFamily) -> PathBuf {
    cache_root.join("ibus").join(family.user_dir_name())
}

/// Create the family's user directory (mode 0700) if it is missing.
///
/// Failure is not fatal: the caller continues without a user directory.
pub fn prepare_user_dir(cache_root: &Path, family: SchemeFamily) -> Option<PathBuf> {
    let dir = user_dir(cache_root, family);
    match create_private_dir(&dir) {
        Ok(()) => Some(dir),
        Err(e) => {
            tracing::warn!(
                family = %family,
                path = %dir.display(),
                error = %e,
                "cannot create user directory, continuing without one"
            );
            None
        }
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}
