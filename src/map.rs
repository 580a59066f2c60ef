//! Lookup of the pre-rendered station map.
//!
//! The map is produced elsewhere; it is located among candidate paths and
//! handed over as opaque bytes for verbatim embedding.

use snafu::ResultExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{IoSnafu, Result};

/// A located map artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapArtifact {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// Returns the first candidate that exists, without reading it.
pub fn find_map(candidates: &[PathBuf]) -> Option<&Path> {
    candidates
        .iter()
        .map(PathBuf::as_path)
        .find(|p| p.is_file())
}

/// Reads the first existing candidate. `Ok(None)` when none exists.
pub fn load_map(candidates: &[PathBuf]) -> Result<Option<MapArtifact>> {
    let Some(path) = find_map(candidates) else {
        debug!(candidates = candidates.len(), "No map artifact found");
        return Ok(None);
    };

    let bytes = std::fs::read(path).context(IoSnafu { path })?;
    info!(path = %path.display(), bytes = bytes.len(), "Map artifact loaded");
    Ok(Some(MapArtifact {
        path: path.to_path_buf(),
        bytes,
    }))
}
