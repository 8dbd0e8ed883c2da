//! Element and changeset updaters. Each element updater queues parsed
//! entities without touching the store, then flushes whole batches through
//! a lock/verify/update/history cycle when the handler transitions state.

mod changeset;
mod node;
mod relation;
mod way;

pub use changeset::*;
pub use node::*;
pub use relation::*;
pub use way::*;

use crate::{
    error::{ErrorOrigin, UploadError},
    tracker::IdMapping,
};
use meridian_primitives::{ObjectId, SignedObjectId};
use std::collections::BTreeMap;

/// Split a batch into the minimum number of packages such that every id
/// appears at most once per package. Clients may send several sequential
/// edits of the same element in one modify block; packages preserve the
/// intended version chain.
pub(crate) fn build_packages<T: Clone>(items: &[T], id_of: impl Fn(&T) -> ObjectId) -> Vec<Vec<T>> {
    let mut result: Vec<Vec<T>> = Vec::new();
    let mut id_to_package: BTreeMap<ObjectId, usize> = BTreeMap::new();

    for item in items {
        let package = id_to_package
            .entry(id_of(item))
            .and_modify(|p| *p += 1)
            .or_insert(0);

        if *package + 1 > result.len() {
            result.push(Vec::new());
        }
        result[*package].push(item.clone());
    }

    result
}

/// Build the placeholder resolution map for one element type. Duplicate
/// placeholders in the mapping fail the upload.
pub(crate) fn placeholder_map(
    mappings: &[IdMapping],
    kind: &str,
    origin: ErrorOrigin,
) -> Result<BTreeMap<SignedObjectId, ObjectId>, UploadError> {
    let mut map = BTreeMap::new();
    for mapping in mappings {
        if map.insert(mapping.old_id, mapping.new_id).is_some() {
            return Err(UploadError::bad_request(
                origin,
                format!("Duplicate {kind} placeholder id {}.", mapping.old_id),
            ));
        }
    }
    Ok(map)
}

/// Ascending, de-duplicated id list for locking and diagnostics.
pub(crate) fn sorted_unique_ids(ids: impl IntoIterator<Item = ObjectId>) -> Vec<ObjectId> {
    let mut ids: Vec<ObjectId> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}
