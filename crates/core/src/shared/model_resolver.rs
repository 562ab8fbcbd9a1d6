use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("model file does not exist: {0}")]
    MissingExplicit(PathBuf),
    #[error("model {name} not found in any of: {searched:?}")]
    NotFound { name: String, searched: Vec<PathBuf> },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Resolve a model file by name.
///
/// Resolution order:
/// 1. Explicit path supplied by the caller (must exist)
/// 2. User cache directory (platform-specific)
/// 3. Bundled directory (for development / pre-packaged installs)
///
/// Models are never fetched over the network; a miss is reported with the
/// list of locations that were searched.
pub fn resolve(
    name: &str,
    explicit: Option<&Path>,
    bundled_dir: Option<&Path>,
) -> Result<PathBuf, ModelResolveError> {
    let mut search_dirs = Vec::new();
    match model_cache_dir() {
        Ok(dir) => search_dirs.push(dir),
        Err(e) => log::debug!("Skipping cache lookup for {name}: {e}"),
    }
    if let Some(dir) = bundled_dir {
        search_dirs.push(dir.to_path_buf());
    }
    resolve_in(name, explicit, &search_dirs)
}

/// Same as [`resolve`] with an explicit list of directories to search.
pub fn resolve_in(
    name: &str,
    explicit: Option<&Path>,
    search_dirs: &[PathBuf],
) -> Result<PathBuf, ModelResolveError> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(ModelResolveError::MissingExplicit(path.to_path_buf()));
    }

    let mut searched = Vec::with_capacity(search_dirs.len());
    for dir in search_dirs {
        let candidate = dir.join(name);
        if candidate.is_file() {
            log::debug!("Resolved model {name} at {}", candidate.display());
            return Ok(candidate);
        }
        searched.push(candidate);
    }

    Err(ModelResolveError::NotFound {
        name: name.to_string(),
        searched,
    })
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/Facemood/models/`
/// - Linux: `$XDG_CACHE_HOME/Facemood/models/` or `~/.cache/Facemood/models/`
/// - Windows: `%LOCALAPPDATA%/Facemood/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join("Facemood").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join("Facemood").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}
