//! URL → relative path extraction and containment checks.

use std::path::{Component, Path, PathBuf};

use super::MapError;

/// File name used when the URL path ends in `/`.
pub const INDEX_FILENAME: &str = "index.html";

/// Path portion of an absolute URL (always starting with `/`) and its query, if any.
///
/// Fails for URLs without a host, such as `mailto:` or bare paths.
pub(crate) fn path_and_query(url: &str) -> Result<(String, Option<String>), MapError> {
    let parsed = url::Url::parse(url).map_err(|e| MapError::MalformedUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    if parsed.cannot_be_a_base() || parsed.host().is_none() {
        return Err(MapError::MalformedUrl {
            url: url.to_string(),
            reason: "URL has no host".to_string(),
        });
    }
    Ok((
        parsed.path().to_string(),
        parsed.query().map(str::to_string),
    ))
}

/// Join `relative` under `dir`, refusing anything that would leave `dir`.
///
/// A single leading `/` is dropped (URL paths are rooted); any remaining root,
/// `..` segment or empty result is an error, never clamped.
pub(crate) fn join_under(dir: &Path, relative: &str) -> Result<PathBuf, MapError> {
    let invalid = |reason: &str| MapError::InvalidPath {
        path: relative.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = relative.strip_prefix('/').unwrap_or(relative);
    let mut out = dir.to_path_buf();
    let mut depth = 0usize;
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => {
                out.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => return Err(invalid("contains a `..` segment")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("collapses to an absolute path"))
            }
        }
    }
    if depth == 0 {
        return Err(invalid("is empty after prefix stripping"));
    }
    Ok(out)
}
