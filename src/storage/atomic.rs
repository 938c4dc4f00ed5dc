//! Whole-file JSON persistence with atomic replace-on-write.
//!
//! Writers serialize the full document into a temporary file next to the
//! target, sync it and rename it over the target. Readers never observe a
//! partially written cache, and two writers racing on the same value leave
//! one complete copy of it.

use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::Path;

/// Reads a JSON document, returning `None` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path, operation: &str) -> Result<Option<T>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(Error::operation(
                operation,
                format!("failed to read {}: {err}", path.display()),
            ));
        },
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&raw).map(Some).map_err(|err| {
        Error::operation(
            operation,
            format!("failed to parse {}: {err}", path.display()),
        )
    })
}

/// Serializes `value` as pretty JSON and atomically replaces `path`.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T, operation: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|err| {
        Error::operation(
            operation,
            format!("failed to create {}: {err}", parent.display()),
        )
    })?;

    let mut payload = serde_json::to_vec_pretty(value).map_err(|err| {
        Error::operation(
            operation,
            format!("failed to serialize {}: {err}", path.display()),
        )
    })?;
    payload.push(b'\n');

    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|err| Error::operation(operation, format!("failed to create temp file: {err}")))?;
    temp.write_all(&payload)
        .map_err(|err| Error::operation(operation, format!("failed to write temp file: {err}")))?;
    temp.as_file()
        .sync_all()
        .map_err(|err| Error::operation(operation, format!("failed to sync temp file: {err}")))?;
    temp.persist(path).map_err(|err| {
        Error::operation(
            operation,
            format!("failed to persist {}: {err}", path.display()),
        )
    })?;

    tracing::debug!(path = %path.display(), bytes = payload.len(), "Wrote cache file");
    Ok(())
}
