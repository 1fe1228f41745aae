use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use crate::{Error, XpResult};

/// List the files to analyze.
///
/// A directory yields every regular file directly inside it whose extension is exactly
/// `ext`, sorted by file name. When `allow_file` is set, a file with that extension yields
/// itself.
///
/// # Errors
/// * [`Error::InvalidPath`] if `path` is neither a readable directory nor an acceptable file.
/// * [`Error::NoInputFiles`] if the directory holds no matching file.
pub fn discover_inputs(
    path: impl AsRef<Path>,
    ext: &str,
    allow_file: bool,
) -> XpResult<Vec<PathBuf>> {
    let path = path.as_ref();

    if path.is_dir() {
        let entries = walkdir::WalkDir::new(path)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Error::InvalidPath(e.path().unwrap_or(path).to_path_buf()))?;

        let files = entries
            .into_iter()
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|p| has_extension(p, ext))
            .collect::<Vec<_>>();

        if files.is_empty() {
            return Err(Error::NoInputFiles {
                dir: path.to_path_buf(),
                ext: ext.to_string(),
            });
        }

        log::debug!(target: "discovery", "Found {} .{ext} files in {}", files.len(), path.display());
        Ok(files)
    } else if allow_file && path.is_file() && has_extension(path, ext) {
        Ok(vec![path.to_path_buf()])
    } else {
        Err(Error::InvalidPath(path.to_path_buf()))
    }
}

/// The name an experiment is known by: the file stem of its recording.
pub fn experiment_name(path: &Path) -> String {
    match path.file_stem() {
        Some(stem) => stem.to_string_lossy().into_owned(),
        None => path.display().to_string(),
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension() == Some(OsStr::new(ext))
}
