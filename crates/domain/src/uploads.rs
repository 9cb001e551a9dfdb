//! Upload validation: extension blocking, size/count/depth limits, and
//! path-traversal checks applied before a folder manifest is accepted.

use std::path::Path;

use crate::config::{UploadsConfig, BLOCKED_EXTENSIONS};
use crate::{Error, Result};

/// Maximum accepted relative-path length.
const MAX_PATH_LEN: usize = 500;

/// A file entry submitted for folder-upload validation.
#[derive(Debug, Clone)]
pub struct UploadEntry {
    pub relative_path: String,
    pub file_size: u64,
}

/// Summary returned by [`validate_folder`] for a valid manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderSummary {
    pub total_files: usize,
    pub total_size: u64,
    pub max_depth: u32,
}

/// Extract the lower-cased extension (with leading dot) from a filename.
fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
}

/// Reject extensions on the executable/installer block list.
pub fn validate_extension(filename: &str) -> Result<()> {
    if let Some(ext) = extension_of(filename) {
        if BLOCKED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(Error::Validation(format!(
                "file type '{ext}' is not allowed for security reasons"
            )));
        }
    }
    Ok(())
}

/// Reject zero-length and over-limit files.
pub fn validate_file_size(file_size: u64, max_size: u64) -> Result<()> {
    if file_size == 0 {
        return Err(Error::Validation("file size must be greater than 0".into()));
    }
    if file_size > max_size {
        return Err(Error::Validation(format!(
            "file size ({:.2}MB) exceeds maximum allowed ({:.0}MB)",
            file_size as f64 / (1024.0 * 1024.0),
            max_size as f64 / (1024.0 * 1024.0),
        )));
    }
    Ok(())
}

/// Reject unsafe relative paths: NUL bytes, over-long paths, absolute
/// paths, and any `..` traversal component.
pub fn validate_relative_path(relative_path: &str) -> Result<()> {
    if relative_path.contains('\0') {
        return Err(Error::Validation("null bytes in path are not allowed".into()));
    }
    if relative_path.len() > MAX_PATH_LEN {
        return Err(Error::Validation(format!(
            "path too long (max {MAX_PATH_LEN} characters)"
        )));
    }
    let path = Path::new(relative_path);
    if path.is_absolute() {
        return Err(Error::Validation("absolute paths are not allowed".into()));
    }
    if path
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return Err(Error::Validation("path traversal (..) is not allowed".into()));
    }
    Ok(())
}

/// Directory depth of a relative path (0 for root-level files).
pub fn depth_of(relative_path: &str) -> u32 {
    if relative_path.is_empty() {
        return 0;
    }
    relative_path.trim_end_matches('/').matches('/').count() as u32
}

/// Parent directory of a relative path, empty for root-level files.
pub fn parent_path_of(relative_path: &str) -> String {
    match relative_path.rsplit_once('/') {
        Some((parent, _)) => parent.to_string(),
        None => String::new(),
    }
}

/// Validate a whole folder manifest against the configured limits.
pub fn validate_folder(entries: &[UploadEntry], limits: &UploadsConfig) -> Result<FolderSummary> {
    if entries.is_empty() {
        return Err(Error::Validation("no files provided".into()));
    }
    if entries.len() > limits.max_files_per_folder {
        return Err(Error::Validation(format!(
            "too many files ({}); maximum allowed: {}",
            entries.len(),
            limits.max_files_per_folder,
        )));
    }

    let mut total_size = 0u64;
    let mut max_depth = 0u32;

    for entry in entries {
        validate_relative_path(&entry.relative_path)?;

        let filename = entry
            .relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&entry.relative_path);
        validate_extension(filename)?;
        validate_file_size(entry.file_size, limits.max_file_size)?;

        max_depth = max_depth.max(depth_of(&entry.relative_path));
        total_size += entry.file_size;
    }

    if total_size > limits.max_folder_size {
        return Err(Error::Validation(format!(
            "total size ({:.2}MB) exceeds maximum allowed ({:.0}MB)",
            total_size as f64 / (1024.0 * 1024.0),
            limits.max_folder_size as f64 / (1024.0 * 1024.0),
        )));
    }
    if max_depth > limits.max_folder_depth {
        return Err(Error::Validation(format!(
            "folder depth ({max_depth}) exceeds maximum allowed ({})",
            limits.max_folder_depth,
        )));
    }

    Ok(FolderSummary {
        total_files: entries.len(),
        total_size,
        max_depth,
    })
}

/// MIME type for a filename, defaulting to `application/octet-stream`.
pub fn content_type_for(filename: &str) -> &'static str {
    match extension_of(filename).as_deref() {
        Some(".py") => "text/x-python",
        Some(".js") => "application/javascript",
        Some(".ts") => "text/typescript",
        Some(".json") => "application/json",
        Some(".yaml") | Some(".yml") => "application/x-yaml",
        Some(".md") => "text/markdown",
        Some(".html") | Some(".htm") => "text/html",
        Some(".css") => "text/css",
        Some(".sql") => "application/sql",
        Some(".csv") => "text/csv",
        Some(".txt") => "text/plain",
        Some(".xml") => "application/xml",
        Some(".pdf") => "application/pdf",
        Some(".png") => "image/png",
        Some(".jpg") | Some(".jpeg") => "image/jpeg",
        Some(".gif") => "image/gif",
        Some(".svg") => "image/svg+xml",
        Some(".webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, size: u64) -> UploadEntry {
        UploadEntry {
            relative_path: path.into(),
            file_size: size,
        }
    }

    #[test]
    fn blocked_extension_rejected() {
        let err = validate_extension("malware.exe").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains(".exe"));
    }

    #[test]
    fn blocked_extension_case_insensitive() {
        assert!(validate_extension("SETUP.MSI").is_err());
    }

    #[test]
    fn script_extensions_allowed() {
        assert!(validate_extension("deploy.sh").is_ok());
        assert!(validate_extension("build.bat").is_ok());
        assert!(validate_extension("main.rs").is_ok());
    }

    #[test]
    fn no_extension_allowed() {
        assert!(validate_extension("Makefile").is_ok());
    }

    #[test]
    fn traversal_rejected() {
        assert!(validate_relative_path("../etc/passwd").is_err());
        assert!(validate_relative_path("docs/../../secret").is_err());
    }

    #[test]
    fn absolute_path_rejected() {
        assert!(validate_relative_path("/etc/passwd").is_err());
    }

    #[test]
    fn nul_byte_rejected() {
        assert!(validate_relative_path("a\0b.txt").is_err());
    }

    #[test]
    fn long_path_rejected() {
        let long = "a/".repeat(300);
        assert!(validate_relative_path(&long).is_err());
    }

    #[test]
    fn plain_relative_path_ok() {
        assert!(validate_relative_path("docs/readme.md").is_ok());
    }

    #[test]
    fn depth_and_parent_derivation() {
        assert_eq!(depth_of("a.txt"), 0);
        assert_eq!(depth_of("a/b.txt"), 1);
        assert_eq!(depth_of("a/b/c/d.txt"), 3);
        assert_eq!(parent_path_of("a.txt"), "");
        assert_eq!(parent_path_of("a/b/c.txt"), "a/b");
    }

    #[test]
    fn folder_happy_path() {
        let limits = UploadsConfig::default();
        let summary =
            validate_folder(&[entry("a.txt", 10), entry("docs/b.md", 20)], &limits).unwrap();
        assert_eq!(
            summary,
            FolderSummary {
                total_files: 2,
                total_size: 30,
                max_depth: 1,
            }
        );
    }

    #[test]
    fn folder_too_many_files() {
        let limits = UploadsConfig {
            max_files_per_folder: 2,
            ..UploadsConfig::default()
        };
        let entries: Vec<_> = (0..3).map(|i| entry(&format!("f{i}.txt"), 1)).collect();
        let err = validate_folder(&entries, &limits).unwrap_err();
        assert!(err.to_string().contains("too many files"));
    }

    #[test]
    fn folder_too_deep() {
        let limits = UploadsConfig::default();
        let deep = format!("{}f.txt", "d/".repeat(11));
        let err = validate_folder(&[entry(&deep, 1)], &limits).unwrap_err();
        assert!(err.to_string().contains("depth"));
    }

    #[test]
    fn folder_total_size_limit() {
        let limits = UploadsConfig {
            max_folder_size: 100,
            ..UploadsConfig::default()
        };
        let err = validate_folder(&[entry("a.bin2", 60), entry("b.bin2", 60)], &limits)
            .unwrap_err();
        assert!(err.to_string().contains("total size"));
    }

    #[test]
    fn folder_empty_rejected() {
        let limits = UploadsConfig::default();
        assert!(validate_folder(&[], &limits).is_err());
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for("notes.md"), "text/markdown");
        assert_eq!(content_type_for("data.csv"), "text/csv");
        assert_eq!(content_type_for("blob.unknown"), "application/octet-stream");
    }
}
