//! File utilities for reading, writing and discovering site files.
//!
//! Pages are read with lossy UTF-8 fallback, written atomically, and
//! discovered in sorted order so batch runs are reproducible.

use std::fs;
use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::core::errors::{LearningHubError, Result};

/// Safe file reading with UTF-8 validation and fallback handling
pub struct FileReader;

impl FileReader {
    /// Read a file to string, handling non-UTF-8 files gracefully
    pub fn read_to_string(file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                let bytes = fs::read(file_path).map_err(|err| {
                    LearningHubError::io(
                        format!("Failed to read file as bytes: {}", file_path.display()),
                        err,
                    )
                })?;
                warn!(
                    "File contained invalid UTF-8, converted with lossy encoding: {}",
                    file_path.display()
                );
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
            Err(e) => Err(LearningHubError::io(
                format!("Failed to read file: {}", file_path.display()),
                e,
            )),
        }
    }

    /// Read and deserialize a JSON file
    pub fn read_json<T: serde::de::DeserializeOwned>(file_path: &Path) -> Result<T> {
        let content = Self::read_to_string(file_path)?;
        serde_json::from_str(&content).map_err(|e| {
            LearningHubError::parse_in_file("json", e.to_string(), file_path)
        })
    }
}

/// Atomic writes: the content lands in a sibling temp file that is then
/// renamed over the target.
pub struct FileWriter;

impl FileWriter {
    /// Write `content` to `path`, creating parent directories as needed
    pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LearningHubError::io(
                    format!("Failed to create directory: {}", parent.display()),
                    e,
                )
            })?;
        }

        let mut temp = path.as_os_str().to_owned();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        fs::write(&temp, content).map_err(|e| {
            LearningHubError::io(format!("Failed to write file: {}", temp.display()), e)
        })?;
        fs::rename(&temp, path).map_err(|e| {
            LearningHubError::io(format!("Failed to replace file: {}", path.display()), e)
        })
    }

    /// Serialize `value` as pretty JSON and write it atomically
    pub fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
        let content = serde_json::to_string_pretty(value)?;
        Self::write_atomic(path, &content)
    }
}

/// Sorted, filtered discovery of site files
pub struct SiteWalker {
    skip_dirs: Vec<String>,
}

impl SiteWalker {
    /// Walker that never descends into directories with the given names
    pub fn new(skip_dirs: &[String]) -> Self {
        Self {
            skip_dirs: skip_dirs.to_vec(),
        }
    }

    fn is_skipped(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .map(|name| self.skip_dirs.iter().any(|skip| skip == name))
                .unwrap_or(false)
    }

    /// All files under `dir` whose file name matches `pattern` (glob syntax)
    pub fn files_matching(&self, dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
        let pattern = glob::Pattern::new(pattern)?;
        let mut files = Vec::new();

        if !dir.exists() {
            debug!("Directory does not exist, nothing to scan: {}", dir.display());
            return Ok(files);
        }

        for entry in WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_skipped(e))
        {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let matches = entry
                .file_name()
                .to_str()
                .map(|name| pattern.matches(name))
                .unwrap_or(false);
            if matches {
                files.push(entry.into_path());
            }
        }

        debug!("Found {} files matching {} in {}", files.len(), pattern, dir.display());
        Ok(files)
    }

    /// All `.html` files under `dir`
    pub fn html_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        self.files_matching(dir, "*.html")
    }
}

/// Files in `dir` (non-recursive) matching a glob file-name pattern, sorted
pub fn files_in_dir(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = dir.join(pattern);
    let full = full.to_string_lossy();
    let mut files: Vec<PathBuf> = glob::glob(&full)?
        .filter_map(|entry| match entry {
            Ok(path) if path.is_file() => Some(path),
            Ok(_) => None,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .collect();
    files.sort();
    Ok(files)
}

/// `path` relative to `base`, joined with forward slashes
pub fn relative_slash_path(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Some(parts.join("/"))
}

/// Lowercase hex SHA-256 of a byte slice
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_valid_utf8() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("lectia1.html");
        fs::write(&file_path, "<title>Lecția 1</title>").unwrap();

        let content = FileReader::read_to_string(&file_path).unwrap();
        assert_eq!(content, "<title>Lecția 1</title>");
    }

    #[test]
    fn test_read_invalid_utf8_is_lossy() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("legacy.html");
        fs::write(&file_path, [b'a', 0xff, b'b']).unwrap();

        let content = FileReader::read_to_string(&file_path).unwrap();
        assert!(content.starts_with('a'));
        assert!(content.ends_with('b'));
    }

    #[test]
    fn test_write_atomic_creates_parents() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("nested/dir/out.json");
        FileWriter::write_atomic(&target, "{}").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "{}");
        assert!(!temp_dir.path().join("nested/dir/out.json.tmp").exists());
    }

    #[test]
    fn test_walker_skips_dirs_and_sorts() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("cls5/m1")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("cls5/m1/lectia2.html"), "").unwrap();
        fs::write(root.join("cls5/m1/lectia1.html"), "").unwrap();
        fs::write(root.join("cls5/m1/notes.txt"), "").unwrap();
        fs::write(root.join("node_modules/pkg/index.html"), "").unwrap();

        let walker = SiteWalker::new(&["node_modules".to_string()]);
        let files = walker.html_files(root).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("lectia1.html"));
        assert!(files[1].ends_with("lectia2.html"));

        let lessons = walker.files_matching(root, "lectia*.html").unwrap();
        assert_eq!(lessons.len(), 2);
    }

    #[test]
    fn test_files_in_dir_is_flat() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.json"), "{}").unwrap();
        fs::create_dir(temp_dir.path().join("sub")).unwrap();
        fs::write(temp_dir.path().join("sub/b.json"), "{}").unwrap();

        let files = files_in_dir(temp_dir.path(), "*.json").unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_relative_slash_path() {
        let base = Path::new("/site");
        let path = Path::new("/site/content/tic/cls5/index.html");
        assert_eq!(
            relative_slash_path(base, path).as_deref(),
            Some("content/tic/cls5/index.html")
        );
        assert_eq!(relative_slash_path(Path::new("/other"), path), None);
    }

    #[test]
    fn test_sha256_hex_known_value() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
