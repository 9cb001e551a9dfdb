use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// File upload limits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Extensions rejected outright (executables and installers).
pub const BLOCKED_EXTENSIONS: &[&str] = &[
    ".exe", ".dll", ".so", ".dylib", ".msi", ".dmg", ".pkg", ".deb", ".rpm", ".com", ".scr",
    ".pif", ".vbs", ".vbe", ".jse", ".ws", ".wsf", ".hta", ".cpl", ".jar", ".app", ".elf",
    ".bin", ".run",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadsConfig {
    /// Per-file limit in bytes (default 50 MiB).
    #[serde(default = "d_max_file_size")]
    pub max_file_size: u64,
    /// Whole-folder limit in bytes (default 500 MiB).
    #[serde(default = "d_max_folder_size")]
    pub max_folder_size: u64,
    #[serde(default = "d_max_depth")]
    pub max_folder_depth: u32,
    #[serde(default = "d_max_files")]
    pub max_files_per_folder: usize,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            max_file_size: d_max_file_size(),
            max_folder_size: d_max_folder_size(),
            max_folder_depth: d_max_depth(),
            max_files_per_folder: d_max_files(),
        }
    }
}

fn d_max_file_size() -> u64 {
    50 * 1024 * 1024
}
fn d_max_folder_size() -> u64 {
    500 * 1024 * 1024
}
fn d_max_depth() -> u32 {
    10
}
fn d_max_files() -> usize {
    1000
}
