//! URL → destination path mapping.
//!
//! Strips scheme and host, optionally strips a prefix from the URL path, and
//! joins the rest under the download directory. Paths that would escape the
//! download directory are rejected.

mod path;
mod prefix;

pub use path::INDEX_FILENAME;
pub use prefix::longest_common_prefix;

use std::path::PathBuf;

/// Why a URL could not be mapped to a destination path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("malformed URL {url}: {reason}")]
    MalformedUrl { url: String, reason: String },
    #[error("destination path {path:?} {reason}")]
    InvalidPath { path: String, reason: String },
}

/// Prefix stripping configuration for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathMappingConfig {
    /// Prefixes to strip from URL paths; longest match wins.
    pub prefixes: Vec<String>,
    /// Strip the longest common path prefix of all URLs.
    pub auto_detect: bool,
}

/// The single strip strategy active for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StripStrategy {
    /// Keep the full URL path.
    None,
    /// Strip the longest matching configured prefix (normalized).
    Explicit(Vec<String>),
    /// Strip a prefix computed over the whole input set.
    Common(String),
}

impl StripStrategy {
    /// Pick the strategy for `config`. Explicit prefixes take precedence: when
    /// they are configured, auto-detection is skipped even if requested.
    ///
    /// For auto-detection this is the pre-pass over every URL and must run
    /// before any item is dispatched. Malformed URLs do not contribute.
    pub fn resolve<'a, I>(config: &PathMappingConfig, urls: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        if !config.prefixes.is_empty() {
            if config.auto_detect {
                tracing::warn!("explicit prefixes configured; ignoring prefix auto-detection");
            }
            let prefixes = config
                .prefixes
                .iter()
                .map(|p| prefix::normalize_prefix(p))
                .collect();
            return StripStrategy::Explicit(prefixes);
        }
        if !config.auto_detect {
            return StripStrategy::None;
        }

        let paths: Vec<String> = urls
            .into_iter()
            .filter_map(|u| baseline_path(u).ok())
            .map(|(path, _)| path)
            .collect();
        match longest_common_prefix(paths.iter().map(String::as_str)) {
            Some(common) => {
                tracing::info!(prefix = %common, "auto-detected common prefix");
                StripStrategy::Common(common)
            }
            None => StripStrategy::None,
        }
    }
}

/// Maps URLs to destination paths under a download directory.
#[derive(Debug, Clone)]
pub struct PathMapper {
    download_dir: PathBuf,
    strategy: StripStrategy,
}

impl PathMapper {
    pub fn new(download_dir: impl Into<PathBuf>, strategy: StripStrategy) -> Self {
        Self {
            download_dir: download_dir.into(),
            strategy,
        }
    }

    /// Build a mapper for a whole input set, running the auto-detect pre-pass if needed.
    pub fn for_urls<'a, I>(download_dir: impl Into<PathBuf>, config: &PathMappingConfig, urls: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::new(download_dir, StripStrategy::resolve(config, urls))
    }

    pub fn strategy(&self) -> &StripStrategy {
        &self.strategy
    }

    /// Destination path for `url`.
    ///
    /// # Examples
    ///
    /// - `https://host/a/b.txt` with no prefixes → `<dir>/a/b.txt`
    /// - `https://host/a/b.txt` with prefix `/a/` → `<dir>/b.txt`
    /// - `https://host/docs/` → `<dir>/docs/index.html`
    pub fn map(&self, url: &str) -> Result<PathBuf, MapError> {
        let (path, query) = baseline_path(url)?;
        let stripped = match &self.strategy {
            StripStrategy::None => path.as_str(),
            StripStrategy::Explicit(prefixes) => prefix::strip_longest(&path, prefixes),
            StripStrategy::Common(common) => path.strip_prefix(common.as_str()).unwrap_or(&path),
        };
        let relative = match query {
            Some(q) => format!("{}?{}", stripped, q),
            None => stripped.to_string(),
        };
        path::join_under(&self.download_dir, &relative)
    }
}

/// URL path with `index.html` appended for directory-like paths, plus the query.
fn baseline_path(url: &str) -> Result<(String, Option<String>), MapError> {
    let (mut path, query) = path::path_and_query(url)?;
    if path.ends_with('/') {
        path.push_str(INDEX_FILENAME);
    }
    Ok((path, query))
}
