//! Atomic document persistence.
//!
//! Results are coordinated between workers and the aggregator purely through
//! the filesystem, so every document is written to a temporary sibling and
//! renamed into place. A reader sees either the whole document or nothing.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::errors::{MinerError, Result};

/// Serialize `value` as pretty-printed JSON and atomically write it to `path`.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_vec_pretty(value)
        .map_err(|e| MinerError::serialization("document serialization", e))?;
    write_bytes_atomic(path, &content)
}

/// Atomically write raw bytes to `path` via a temporary sibling file.
pub fn write_bytes_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            MinerError::io(
                format!("Failed to create directory: {}", parent.display()),
                e,
            )
        })?;
    }

    let temp_path = temp_sibling(path);
    fs::write(&temp_path, content).map_err(|e| {
        MinerError::io(
            format!("Failed to write temporary file: {}", temp_path.display()),
            e,
        )
    })?;

    fs::rename(&temp_path, path).map_err(|e| {
        MinerError::io(format!("Failed to rename into place: {}", path.display()), e)
    })
}

fn temp_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    path.with_file_name(format!(".{file_name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Doc {
        name: String,
        count: u32,
    }

    #[test]
    fn writes_valid_json_and_removes_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let doc = Doc {
            name: "a".into(),
            count: 3,
        };

        write_json_atomic(&path, &doc).unwrap();

        let read: Doc = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(read, doc);
        assert!(!dir.path().join(".doc.json.tmp").exists());
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/doc.json");
        write_json_atomic(&path, &42u32).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn overwrites_existing_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        write_json_atomic(&path, &1u32).unwrap();
        write_json_atomic(&path, &2u32).unwrap();
        let read: u32 = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(read, 2);
    }
}
