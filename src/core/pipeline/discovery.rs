//! Source file discovery inside a checked-out worktree.
//!
//! A checkout contains exactly the committed tree (the checkout step removes
//! untracked residue), so discovery is a plain filesystem walk: every
//! regular file ending in `.java`, skipping anything under a `.git`
//! directory. Paths are worktree-relative with `/` separators and the
//! result is sorted, which downstream ordering guarantees build on.

use std::ffi::OsStr;
use std::path::Path;

use walkdir::WalkDir;

use crate::core::errors::{MinerError, Result};
use crate::io::cache;

/// One Java source file discovered at a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the worktree root, `/`-separated.
    pub rel_path: String,
    /// 128-bit content hash of the file bytes on disk.
    pub content_hash: String,
}

/// Discover and hash every `.java` file beneath `root`, sorted by path.
pub fn discover_java_files(root: &Path) -> Result<Vec<SourceFile>> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != OsStr::new(".git"));

    for entry in walker {
        let entry = entry.map_err(|e| {
            MinerError::pipeline(
                "discovery",
                format!("walk of {} failed: {e}", root.display()),
            )
        })?;

        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("java") {
            continue;
        }

        let rel_path = path
            .strip_prefix(root)
            .map_err(|_| {
                MinerError::pipeline(
                    "discovery",
                    format!("path escapes worktree: {}", path.display()),
                )
            })?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        files.push(SourceFile {
            rel_path,
            content_hash: cache::hash_file(path)?,
        });
    }

    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(files)
}
