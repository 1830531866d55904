//! Remote path normalisation and local path resolution.
//!
//! Remote paths are POSIX-style regardless of the local platform. Every path
//! produced by a listing is cleaned with [`clean_remote_path`] and checked with
//! [`is_within_base`] before it is followed or recorded. [`resolve_local_path`]
//! maps a remote path into the job's target directory and refuses anything that
//! would land outside it.

use std::path::{Component, Path, PathBuf};

use super::DownloadError;

/// Lexically normalises a POSIX remote path.
///
/// Repeated separators and `.` segments are removed and `..` consumes the
/// preceding segment. A rooted path never climbs above `/`. An empty result is
/// `"."` for relative input and `"/"` for rooted input.
#[must_use]
pub fn clean_remote_path(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Joins a listing entry name onto its parent directory and cleans the result.
#[must_use]
pub fn join_remote_path(parent: &str, name: &str) -> String {
    if name.starts_with('/') {
        return clean_remote_path(name);
    }
    clean_remote_path(&format!("{parent}/{name}"))
}

/// Returns true if `path` is `base` or lies underneath it.
///
/// Both arguments must already be cleaned. The comparison is per segment, so
/// `/data2/x` is not inside `/data`.
#[must_use]
pub fn is_within_base(path: &str, base: &str) -> bool {
    match base {
        "/" => path.starts_with('/'),
        "." => !path.starts_with('/') && path != ".." && !path.starts_with("../"),
        _ => {
            path == base
                || path
                    .strip_prefix(base)
                    .is_some_and(|rest| rest.starts_with('/'))
        }
    }
}

/// Returns the final segment of a remote path.
#[must_use]
pub fn remote_file_name(path: &str) -> &str {
    path.rsplit('/').find(|segment| !segment.is_empty()).unwrap_or(path)
}

/// Resolves the local destination for `remote_path`.
///
/// The job's `base_path` prefix is stripped and the remainder is placed under
/// `target_dir`. A remote path that is not under the base keeps its full path
/// beneath `target_dir`. A remote path equal to the base keeps only its file
/// name. The returned path is absolute.
///
/// # Errors
///
/// Returns [`DownloadError::OutsideTarget`] if the relative remainder still
/// contains `..` or a platform prefix, and [`DownloadError::Io`] if the
/// current directory cannot be determined for a relative `target_dir`.
pub fn resolve_local_path(
    remote_path: &str,
    base_path: &str,
    target_dir: &Path,
) -> Result<PathBuf, DownloadError> {
    let cleaned = clean_remote_path(remote_path);
    let base = clean_remote_path(base_path);

    let relative = if cleaned == base {
        remote_file_name(&cleaned)
    } else if base != "/" && base != "." && is_within_base(&cleaned, &base) {
        &cleaned[base.len()..]
    } else {
        cleaned.as_str()
    };

    let mut local = target_dir.to_path_buf();
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(DownloadError::outside_target(remote_path)),
            name => {
                let mut components = Path::new(name).components();
                match (components.next(), components.next()) {
                    (Some(Component::Normal(part)), None) => local.push(part),
                    _ => return Err(DownloadError::outside_target(remote_path)),
                }
            }
        }
    }

    if local == target_dir {
        return Err(DownloadError::outside_target(remote_path));
    }

    std::path::absolute(&local).map_err(|source| DownloadError::io(&local, source))
}
