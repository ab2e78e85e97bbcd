//! JSON document persistence for the cache and advisory files.
//!
//! Reads treat a missing file as "no document yet". Writes go to a sibling
//! temp file which is renamed over the target, so a failed run never leaves
//! a truncated document behind.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::error::{PersistenceError, Result};

/// Read and parse a JSON document, returning `None` if the file does not exist.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "document absent");
            return Ok(None);
        }
        Err(source) => {
            return Err(PersistenceError::Read {
                path: path.to_path_buf(),
                source,
            }
            .into());
        }
    };

    let value = serde_json::from_str(&data).map_err(|source| PersistenceError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(value))
}

/// Serialize `value` as pretty JSON (two-space indent) and atomically replace `path`.
#[instrument(skip(value), fields(path = %path.display()))]
pub fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut json = serde_json::to_string_pretty(value).map_err(|source| PersistenceError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    json.push('\n');

    let write_err = |source| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let temp_path = path.with_extension("tmp");
    if let Err(e) = replace_with(&temp_path, path, json.as_bytes()) {
        let _ = fs::remove_file(&temp_path);
        return Err(write_err(e).into());
    }

    debug!(bytes = json.len(), "document written");
    Ok(())
}

fn replace_with(temp_path: &Path, path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(temp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);
    fs::rename(temp_path, path)
}
