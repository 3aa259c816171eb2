//! Path identity and directory conventions.
//!
//! Every file the importer touches is keyed by a [PathKey]: an absolute path with `.` and `..`
//! folded lexically. Relative references inside schema and content files are resolved against
//! the directory of the file that contains them, so two spellings of the same target always land
//! on the same key.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Component, Path, PathBuf},
};
use walkdir::WalkDir;

use crate::error::ImportError;

static LEADING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\.").expect("leading number pattern is valid"));

#[derive(Clone, Debug, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct PathKey(PathBuf);

impl PathKey {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        PathKey(normalize(path.as_ref()))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Directory containing this path.
    pub fn dir(&self) -> &Path {
        self.0.parent().unwrap_or_else(|| Path::new(""))
    }

    /// Resolves `relative` against the directory containing this path.
    pub fn resolve(&self, relative: &str) -> PathKey {
        PathKey::new(self.dir().join(relative))
    }

    /// The same-named sibling directory: `a/b.md` -> `a/b`.
    pub fn companion_dir(&self) -> PathBuf {
        self.0.with_extension("")
    }

    /// The schema file describing a directory: `a/b` -> `a/b.yaml`.
    pub fn companion_file(dir: &Path, extension: &str) -> PathKey {
        let mut name = dir.as_os_str().to_owned();
        name.push(".");
        name.push(extension);
        PathKey::new(PathBuf::from(name))
    }

    pub fn file_name(&self) -> String {
        self.0
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn has_extension(&self, extension: &str) -> bool {
        has_extension(&self.0, extension)
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for PathKey {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// Folds `.` and `..` components without touching the file system. `..` above the root is
/// dropped.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if can_pop {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Makes an import root absolute and normalized.
pub fn absolute_root<P: AsRef<Path>>(root: P) -> Result<PathBuf, ImportError> {
    let absolute = std::path::absolute(root.as_ref())?;
    if !absolute.is_dir() {
        return Err(ImportError::NotFound(format!(
            "Import root {} is not a directory",
            absolute.display()
        )));
    }
    Ok(normalize(&absolute))
}

pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

/// Immediate children of a directory, split into files and sub-directories, each sorted by file
/// name. Hidden entries are skipped.
#[derive(Debug, Default)]
pub struct DirListing {
    pub files: Vec<PathBuf>,
    pub dirs: Vec<PathBuf>,
}

impl DirListing {
    pub fn files_with_extension<'a>(
        &'a self,
        extension: &'a str,
    ) -> impl Iterator<Item = &'a PathBuf> + 'a {
        self.files
            .iter()
            .filter(move |path| has_extension(path, extension))
    }
}

pub fn list_dir(dir: &Path) -> Result<DirListing, ImportError> {
    let mut listing = DirListing::default();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if is_hidden(entry.path()) {
            continue;
        }
        if entry.file_type().is_dir() {
            listing.dirs.push(entry.into_path());
        } else if entry.file_type().is_file() {
            listing.files.push(entry.into_path());
        }
    }
    Ok(listing)
}

/// Number prefix of a file name such as `12.Fix login.md`.
pub fn leading_number(file_name: &str) -> Option<u64> {
    LEADING_NUMBER
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Best-effort content type from a file extension.
pub fn content_type(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "zip" => "application/zip",
        "md" => "text/markdown",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "yaml" | "yml" => "application/yaml",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn resolve_folds_parent_components() {
        let key = PathKey::new("/ws/types/person.yaml");
        assert_eq!(
            key.resolve("../enums/./color.yaml"),
            PathKey::new("/ws/enums/color.yaml")
        );
        assert_eq!(key.resolve("./other.yaml"), key.resolve("other.yaml"));
    }

    #[test]
    fn companion_paths() {
        let key = PathKey::new("/ws/people/alice.md");
        assert_eq!(key.companion_dir(), PathBuf::from("/ws/people/alice"));
        assert_eq!(
            PathKey::companion_file(Path::new("/ws/people"), "yaml"),
            PathKey::new("/ws/people.yaml")
        );
    }

    #[test]
    fn leading_numbers() {
        assert_eq!(leading_number("5.Crash on start.md"), Some(5));
        assert_eq!(leading_number("Crash.md"), None);
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type("photo.JPG"), "image/jpeg");
        assert_eq!(content_type("blob"), "application/octet-stream");
    }

    #[test]
    fn list_dir_is_sorted_and_skips_hidden() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.md"), "").unwrap();
        std::fs::write(dir.path().join("a.md"), "").unwrap();
        std::fs::write(dir.path().join(".hidden.md"), "").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let listing = list_dir(dir.path()).unwrap();
        let names: Vec<_> = listing
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.md", "b.md"]);
        assert_eq!(listing.dirs.len(), 1);
    }
}
