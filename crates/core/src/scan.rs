//! Folder content helpers shared by the classifier and the extractor.

use crate::config::SurveyConfig;
use crate::constants::{IGNORED_FILE_PREFIX, IGNORED_SYSTEM_FILES};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Whether `name` is operating-system bookkeeping rather than study content.
pub(crate) fn is_system_file(name: &str) -> bool {
    IGNORED_SYSTEM_FILES.contains(&name) || name.starts_with(IGNORED_FILE_PREFIX)
}

/// Whether `name` carries one of the configured image extensions.
pub(crate) fn is_image_name(name: &str, cfg: &SurveyConfig) -> bool {
    if is_system_file(name) {
        return false;
    }
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            cfg.image_extensions().iter().any(|known| *known == e)
        })
        .unwrap_or(false)
}

/// Top-level content of a folder, split into image files and everything else.
#[derive(Debug, Default)]
pub(crate) struct FolderContent {
    /// Image files sorted by file name.
    pub images: Vec<PathBuf>,
    /// Regular files that are neither system files nor images.
    pub other_files: usize,
    /// Directories directly inside the folder.
    pub subfolders: usize,
}

impl FolderContent {
    pub fn file_count(&self) -> usize {
        self.images.len() + self.other_files
    }
}

/// Lists the regular files directly inside `dir`.
///
/// System files are ignored entirely; subdirectories are counted but not descended into.
pub(crate) fn folder_content(dir: &Path, cfg: &SurveyConfig) -> io::Result<FolderContent> {
    let mut content = FolderContent::default();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            content.subfolders += 1;
            continue;
        }
        if !path.is_file() {
            continue;
        }

        let name = entry.file_name();
        let name = name.to_string_lossy();
        if is_system_file(&name) {
            continue;
        }

        if is_image_name(&name, cfg) {
            content.images.push(path);
        } else {
            content.other_files += 1;
        }
    }

    content.images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(content)
}
