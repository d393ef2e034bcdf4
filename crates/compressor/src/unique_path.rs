//! Output path collision avoidance.
//!
//! Compressed files are never written over something already present in the
//! destination folder; a numeric suffix is appended to the file stem instead.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Returns a path that does not exist at call time.
///
/// If `desired` is free it is returned unchanged. Otherwise `stem_1.ext`,
/// `stem_2.ext`, ... are probed in order and the first free one wins.
/// For example: `/out/clip.mov` -> `/out/clip_1.mov` when `clip.mov` exists.
///
/// Only an existence check is performed. Another process creating the
/// returned path before it is used is not guarded against.
pub fn resolve_unique_path(desired: &Path) -> PathBuf {
    if !desired.exists() {
        return desired.to_path_buf();
    }

    let parent = desired.parent().unwrap_or_else(|| Path::new(""));
    let stem = desired
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_default();
    let extension = desired.extension();

    let mut counter: u64 = 1;
    loop {
        let candidate = parent.join(numbered_name(&stem, extension, counter));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Builds `<stem>_<n>[.<ext>]`
fn numbered_name(stem: &OsString, extension: Option<&std::ffi::OsStr>, n: u64) -> OsString {
    let mut name = stem.clone();
    name.push(format!("_{}", n));
    if let Some(ext) = extension {
        name.push(".");
        name.push(ext);
    }
    name
}
