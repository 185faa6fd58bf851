//! Prefix normalization, longest-match stripping and common-prefix detection.

/// Normalize a configured strip prefix.
///
/// A prefix given as an absolute URL (`https://host/base/`) contributes its
/// path; any other prefix is made rooted so it lines up with URL paths.
pub(crate) fn normalize_prefix(raw: &str) -> String {
    let raw = raw.trim();
    if let Ok(parsed) = url::Url::parse(raw) {
        if parsed.has_host() {
            return parsed.path().to_string();
        }
    }
    if raw.starts_with('/') {
        raw.to_string()
    } else {
        format!("/{}", raw)
    }
}

/// Remove the longest of `prefixes` that `path` starts with; unmodified if none match.
pub(crate) fn strip_longest<'a>(path: &'a str, prefixes: &[String]) -> &'a str {
    prefixes
        .iter()
        .filter(|p| path.starts_with(p.as_str()))
        .max_by_key(|p| p.len())
        .map(|p| &path[p.len()..])
        .unwrap_or(path)
}

/// Longest common prefix of `paths`, cut back to the last `/` so that it never
/// splits a segment (`/a/b/c.txt` + `/a/b/d.txt` → `/a/b/`).
///
/// Returns `None` for an empty input.
pub fn longest_common_prefix<'a, I>(paths: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut iter = paths.into_iter();
    let first = iter.next()?;
    let mut len = first.len();
    for p in iter {
        len = first
            .bytes()
            .zip(p.bytes())
            .take(len)
            .take_while(|(a, b)| a == b)
            .count();
    }
    let common = &first[..len];
    let cut = common.rfind('/').map(|i| i + 1).unwrap_or(0);
    Some(common[..cut].to_string())
}
