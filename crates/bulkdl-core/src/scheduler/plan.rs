//! Pre-dispatch phase: map every URL to a destination and weed out the ones
//! that cannot be downloaded safely.

use std::path::Path;

use crate::outcome::{DownloadOutcome, WorkItem};
use crate::url_model::{PathMapper, PathMappingConfig};

use super::collision;

/// Work ready for dispatch plus outcomes for URLs rejected up front.
#[derive(Debug, Default)]
pub struct Plan {
    /// Dispatch order.
    pub items: Vec<WorkItem>,
    /// Malformed URLs, escaping paths and collisions; zero attempts each.
    pub rejected: Vec<DownloadOutcome>,
}

impl Plan {
    /// Map `urls` (already filtered and ordered) under `download_dir`.
    ///
    /// Auto-detection of the common prefix sees the full list before any
    /// path is resolved.
    pub fn prepare(urls: Vec<String>, mapping: &PathMappingConfig, download_dir: &Path) -> Self {
        let mapper = PathMapper::for_urls(download_dir, mapping, urls.iter().map(String::as_str));

        let mut items = Vec::with_capacity(urls.len());
        let mut rejected = Vec::new();
        for url in urls {
            match mapper.map(&url) {
                Ok(dest) => items.push(WorkItem::new(url, dest)),
                Err(e) => {
                    tracing::warn!(url = %url, "rejected: {}", e);
                    rejected.push(DownloadOutcome::rejected(url, None, e.into()));
                }
            }
        }

        let mut plan = Self::from_items(items);
        rejected.append(&mut plan.rejected);
        plan.rejected = rejected;
        plan
    }

    /// Plan over already-resolved work items; only collision detection runs.
    pub fn from_items(items: Vec<WorkItem>) -> Self {
        let (items, rejected) = collision::partition(items);
        Self { items, rejected }
    }

    /// Number of outcomes this plan will produce if run to completion.
    pub fn len(&self) -> usize {
        self.items.len() + self.rejected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
