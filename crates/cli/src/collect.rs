//! Input expansion: files pass through, directories are walked.

use std::path::{Path, PathBuf};

use comfymeta_extract::format::has_supported_extension;
use walkdir::WalkDir;

/// Files to process plus inputs that could not be expanded.
#[derive(Debug, Default)]
pub struct CollectedInputs {
    pub files: Vec<PathBuf>,
    /// `(input, reason)` for each input that was skipped.
    pub rejected: Vec<(PathBuf, String)>,
}

/// Expand `inputs` into the list of files to process.
///
/// Explicit files are kept regardless of extension. Directories contribute
/// their files with a supported extension, one level deep unless
/// `recursive`, in file-name order.
pub fn collect_inputs(inputs: &[PathBuf], recursive: bool) -> CollectedInputs {
    let mut collected = CollectedInputs::default();

    for input in inputs {
        if input.is_file() {
            collected.files.push(input.clone());
        } else if input.is_dir() {
            walk_dir(input, recursive, &mut collected);
        } else {
            collected
                .rejected
                .push((input.clone(), "no such file or directory".to_string()));
        }
    }

    collected
}

fn walk_dir(dir: &Path, recursive: bool, collected: &mut CollectedInputs) {
    let walker = WalkDir::new(dir)
        .max_depth(if recursive { usize::MAX } else { 1 })
        .sort_by_file_name();

    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() && has_supported_extension(entry.path()) => {
                collected.files.push(entry.into_path());
            }
            Ok(_) => {}
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable entry");
                collected.rejected.push((path, e.to_string()));
            }
        }
    }
}
