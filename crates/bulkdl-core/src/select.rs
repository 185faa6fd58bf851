//! URL list loading, filtering and ordering.

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;

use crate::config::RunConfig;

/// Read a URL list: one URL per line, blank lines and `#` comments skipped.
pub fn read_url_list(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read URL list {}", path.display()))?;
    Ok(parse_url_list(&text).collect())
}

/// Lines of `text` that look like URLs, trimmed.
pub fn parse_url_list(text: &str) -> impl Iterator<Item = String> + '_ {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
}

/// Selects and orders the working set of URLs for a run.
#[derive(Debug, Clone, Default)]
pub struct UrlSelector {
    pattern: Option<Regex>,
    reverse: bool,
    randomize: bool,
}

impl UrlSelector {
    /// `reverse` keeps URLs that do *not* match `pattern`; it has no effect without one.
    pub fn new(pattern: Option<Regex>, reverse: bool, randomize: bool) -> Self {
        Self {
            pattern,
            reverse,
            randomize,
        }
    }

    pub fn from_config(cfg: &RunConfig) -> Self {
        Self::new(cfg.filter.clone(), cfg.reverse, cfg.randomize)
    }

    fn keeps(&self, url: &str) -> bool {
        match &self.pattern {
            Some(re) => re.is_match(url) != self.reverse,
            None => true,
        }
    }

    /// Filter and order `urls`. The result is single-pass; without
    /// randomization it is lazy and preserves input order. Exact duplicates
    /// are dropped after their first occurrence.
    pub fn select<'a, I>(&'a self, urls: I) -> Box<dyn Iterator<Item = String> + 'a>
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: 'a,
    {
        let mut seen = HashSet::new();
        let filtered = urls
            .into_iter()
            .filter(move |url| self.keeps(url))
            .filter(move |url| {
                let first = seen.insert(url.clone());
                if !first {
                    tracing::debug!(url = %url, "dropping duplicate URL");
                }
                first
            });

        if !self.randomize {
            return Box::new(filtered);
        }
        let mut all: Vec<String> = filtered.collect();
        all.shuffle(&mut rand::thread_rng());
        Box::new(all.into_iter())
    }
}
