//! Destination collision detection, run before anything is dispatched.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;

use crate::outcome::{DownloadOutcome, FailureReason, WorkItem};
use crate::storage;

/// Split `items` into those safe to dispatch and `Failed(Collision)` outcomes.
///
/// Two items collide when they share a destination, when one destination is
/// an ancestor directory of the other, or when one destination is the other's
/// temporary `.part` path. Every item involved in a collision fails; order of
/// the survivors is preserved.
pub(crate) fn partition(items: Vec<WorkItem>) -> (Vec<WorkItem>, Vec<DownloadOutcome>) {
    let conflict = find_conflicts(&items);
    if conflict.iter().all(Option::is_none) {
        return (items, Vec::new());
    }

    let urls: Vec<String> = items.iter().map(|i| i.url().to_string()).collect();
    let mut clean = Vec::with_capacity(items.len());
    let mut failed = Vec::new();
    for (item, other) in items.into_iter().zip(conflict) {
        match other {
            None => clean.push(item),
            Some(j) => {
                tracing::warn!(
                    url = %item.url(),
                    dest = %item.destination().display(),
                    "destination collides with {}",
                    urls[j]
                );
                failed.push(DownloadOutcome::rejected(
                    item.url(),
                    Some(item.destination().to_path_buf()),
                    FailureReason::Collision(urls[j].clone()),
                ));
            }
        }
    }
    (clean, failed)
}

/// For each item, the index of one item it collides with.
fn find_conflicts(items: &[WorkItem]) -> Vec<Option<usize>> {
    let mut conflict: Vec<Option<usize>> = vec![None; items.len()];
    let mut by_dest: HashMap<&Path, usize> = HashMap::with_capacity(items.len());

    for (i, item) in items.iter().enumerate() {
        match by_dest.entry(item.destination()) {
            Entry::Occupied(e) => {
                let j = *e.get();
                conflict[i].get_or_insert(j);
                conflict[j].get_or_insert(i);
            }
            Entry::Vacant(e) => {
                e.insert(i);
            }
        }
    }

    for (i, item) in items.iter().enumerate() {
        let temp = storage::temp_path(item.destination());
        let blockers = item
            .destination()
            .ancestors()
            .skip(1)
            .chain(std::iter::once(temp.as_path()));
        for blocker in blockers {
            if let Some(&j) = by_dest.get(blocker) {
                if j != i {
                    conflict[i].get_or_insert(j);
                    conflict[j].get_or_insert(i);
                }
            }
        }
    }
    conflict
}
