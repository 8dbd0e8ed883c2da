use crate::{
    db::{NodeRow, Transaction},
    element::TagList,
    error::{ErrorOrigin, UploadError},
    tracker::{ChangeTracker, IdMapping},
    updater::{build_packages, placeholder_map, sorted_unique_ids},
};
use meridian_primitives::{
    Bbox, ChangesetId, ObjectId, ObjectType, Operation, SignedObjectId, TileId, Version, join_ids,
    scale_coordinate, tile_for_point,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

///
/// NodeUpdater
///
/// Queues node operations during parsing and flushes them in batches:
/// id allocation and history writes for creates, lock/version/update cycles
/// for modifies, and the referenced/already-deleted analysis for deletes.
///

#[derive(Debug, Default)]
pub struct NodeUpdater {
    bbox: Bbox,
    create_nodes: Vec<QueuedNode>,
    modify_nodes: Vec<QueuedNode>,
    delete_nodes: Vec<QueuedNode>,
    create_placeholder_ids: BTreeSet<SignedObjectId>,
}

#[derive(Clone, Debug)]
struct QueuedNode {
    id: ObjectId,
    version: Version,
    lat: i64,
    lon: i64,
    tile: TileId,
    changeset: ChangesetId,
    old_id: SignedObjectId,
    tags: Vec<(String, String)>,
    if_unused: bool,
}

impl NodeUpdater {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn bbox(&self) -> Bbox {
        self.bbox
    }

    // ======================================================================
    // Queue operations (no store access)
    // ======================================================================

    pub fn add_node(
        &mut self,
        lat: f64,
        lon: f64,
        changeset: ChangesetId,
        old_id: SignedObjectId,
        tags: &TagList,
        tracker: &mut ChangeTracker,
    ) {
        self.create_nodes.push(QueuedNode {
            id: 0,
            version: 1,
            lat: scale_coordinate(lat),
            lon: scale_coordinate(lon),
            tile: tile_for_point(lat, lon),
            changeset,
            old_id,
            tags: tags.clone().into_inner(),
            if_unused: false,
        });

        tracker.push_sequence_entry(Operation::Create, ObjectType::Node, old_id, 0, false);
    }

    pub fn modify_node(
        &mut self,
        lat: f64,
        lon: f64,
        changeset: ChangesetId,
        id: SignedObjectId,
        version: Version,
        tags: &TagList,
        tracker: &mut ChangeTracker,
    ) {
        self.modify_nodes.push(QueuedNode {
            id: unsigned_or_zero(id),
            version,
            lat: scale_coordinate(lat),
            lon: scale_coordinate(lon),
            tile: tile_for_point(lat, lon),
            changeset,
            old_id: id,
            tags: tags.clone().into_inner(),
            if_unused: false,
        });

        tracker.push_sequence_entry(Operation::Modify, ObjectType::Node, id, version, false);
    }

    pub fn delete_node(
        &mut self,
        changeset: ChangesetId,
        id: SignedObjectId,
        version: Version,
        if_unused: bool,
        tracker: &mut ChangeTracker,
    ) {
        self.delete_nodes.push(QueuedNode {
            id: unsigned_or_zero(id),
            version,
            lat: 0,
            lon: 0,
            tile: 0,
            changeset,
            old_id: id,
            tags: Vec::new(),
            if_unused,
        });

        tracker.push_sequence_entry(Operation::Delete, ObjectType::Node, id, version, if_unused);
    }

    // ======================================================================
    // Flush: create
    // ======================================================================

    pub fn process_new_nodes(
        &mut self,
        txn: &mut Transaction<'_>,
        tracker: &mut ChangeTracker,
    ) -> Result<(), UploadError> {
        self.check_unique_placeholder_ids()?;

        debug!(count = self.create_nodes.len(), "flushing node creates");

        for queued in &self.create_nodes {
            let new_id = txn.next_node_id();

            txn.insert_node(NodeRow {
                id: new_id,
                lat: queued.lat,
                lon: queued.lon,
                changeset: queued.changeset,
                visible: true,
                timestamp: txn.now(),
                tile: queued.tile,
                version: 1,
                tags: queued.tags.clone(),
            });
            txn.append_node_history(new_id)?;

            tracker.created_node_ids.push(IdMapping {
                old_id: queued.old_id,
                new_id,
                new_version: 1,
            });

            self.bbox.expand_point(queued.lat, queued.lon);
        }

        self.create_nodes.clear();
        Ok(())
    }

    // ======================================================================
    // Flush: modify
    // ======================================================================

    pub fn process_modify_nodes(
        &mut self,
        txn: &mut Transaction<'_>,
        tracker: &mut ChangeTracker,
    ) -> Result<(), UploadError> {
        replace_old_ids_in_nodes(&mut self.modify_nodes, &tracker.created_node_ids)?;

        let ids = sorted_unique_ids(self.modify_nodes.iter().map(|n| n.id));
        lock_current_nodes(txn, &ids)?;

        let packages = build_packages(&self.modify_nodes, |n| n.id);

        for package in packages {
            check_current_node_versions(txn, &package)?;

            // old coordinates count towards the changeset bbox so movements
            // stay covered
            for item in &package {
                if let Some(row) = txn.node(item.id) {
                    self.bbox.expand_point(row.lat, row.lon);
                }
            }

            for item in &package {
                let now = txn.now();
                let new_version = {
                    let row = txn.node_mut(item.id).ok_or_else(|| row_vanished(item.id))?;
                    row.lat = item.lat;
                    row.lon = item.lon;
                    row.tile = item.tile;
                    row.changeset = item.changeset;
                    row.visible = true;
                    row.timestamp = now;
                    row.version += 1;
                    row.tags = item.tags.clone();
                    row.version
                };
                txn.append_node_history(item.id)?;

                tracker.modified_node_ids.push(IdMapping {
                    old_id: item.old_id,
                    new_id: item.id,
                    new_version,
                });

                self.bbox.expand_point(item.lat, item.lon);
            }
        }

        self.modify_nodes.clear();
        Ok(())
    }

    // ======================================================================
    // Flush: delete
    // ======================================================================

    pub fn process_delete_nodes(
        &mut self,
        txn: &mut Transaction<'_>,
        tracker: &mut ChangeTracker,
    ) -> Result<(), UploadError> {
        replace_old_ids_in_nodes(&mut self.delete_nodes, &tracker.created_node_ids)?;

        let ids = sorted_unique_ids(self.delete_nodes.iter().map(|n| n.id));
        lock_current_nodes(txn, &ids)?;

        let already_deleted =
            determine_already_deleted_nodes(txn, &self.delete_nodes, tracker)?;

        // one candidate per id, first occurrence wins
        let mut seen = BTreeSet::new();
        let candidates: Vec<QueuedNode> = self
            .delete_nodes
            .iter()
            .filter(|n| !already_deleted.contains(&n.id) && seen.insert(n.id))
            .cloned()
            .collect();

        check_current_node_versions(txn, &candidates)?;

        let skipped = is_node_still_referenced(txn, &candidates, tracker)?;

        for item in candidates {
            if skipped.contains(&item.id) {
                continue;
            }

            let now = txn.now();
            {
                let row = txn.node_mut(item.id).ok_or_else(|| row_vanished(item.id))?;
                self.bbox.expand_point(row.lat, row.lon);
                row.visible = false;
                row.changeset = item.changeset;
                row.timestamp = now;
                row.version += 1;
                row.tags.clear();
            }
            txn.append_node_history(item.id)?;

            tracker.deleted_node_ids.push(item.old_id);
        }

        self.delete_nodes.clear();
        Ok(())
    }

    fn check_unique_placeholder_ids(&mut self) -> Result<(), UploadError> {
        for queued in &self.create_nodes {
            if !self.create_placeholder_ids.insert(queued.old_id) {
                return Err(UploadError::bad_request(
                    ErrorOrigin::NodeUpdater,
                    "Placeholder IDs must be unique for created elements.",
                ));
            }
        }
        Ok(())
    }
}

// Rewrite placeholder ids using the mapping established by the preceding
// node-create flush.
fn replace_old_ids_in_nodes(
    nodes: &mut [QueuedNode],
    created_node_ids: &[IdMapping],
) -> Result<(), UploadError> {
    let map = placeholder_map(created_node_ids, "node", ErrorOrigin::NodeUpdater)?;

    for node in nodes {
        if node.old_id < 0 {
            let new_id = map.get(&node.old_id).ok_or_else(|| {
                UploadError::bad_request(
                    ErrorOrigin::NodeUpdater,
                    format!("Placeholder id not found for node reference {}", node.old_id),
                )
            })?;
            node.id = *new_id;
        }
    }

    Ok(())
}

fn lock_current_nodes(txn: &mut Transaction<'_>, ids: &[ObjectId]) -> Result<(), UploadError> {
    let missing = txn.lock_rows_exclusive(ObjectType::Node, ids);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(UploadError::not_found(
            ErrorOrigin::NodeUpdater,
            format!("The following node ids are unknown: {}", join_ids(missing)),
        ))
    }
}

fn check_current_node_versions(
    txn: &Transaction<'_>,
    nodes: &[QueuedNode],
) -> Result<(), UploadError> {
    for item in nodes {
        let row = txn.node(item.id).ok_or_else(|| row_vanished(item.id))?;
        if row.version != item.version {
            return Err(UploadError::conflict(
                ErrorOrigin::NodeUpdater,
                format!(
                    "Version mismatch: Provided {}, server had: {} of Node {}",
                    item.version, row.version, item.id
                ),
            ));
        }
    }
    Ok(())
}

// Nodes already invisible in the current table: an error without if-unused,
// a recorded skip with it.
fn determine_already_deleted_nodes(
    txn: &Transaction<'_>,
    nodes: &[QueuedNode],
    tracker: &mut ChangeTracker,
) -> Result<BTreeSet<ObjectId>, UploadError> {
    let mut ids_if_unused = BTreeSet::new();
    let mut ids_without_if_unused = BTreeSet::new();
    let mut id_to_old_id = BTreeMap::new();

    for node in nodes {
        if node.if_unused {
            ids_if_unused.insert(node.id);
        } else {
            ids_without_if_unused.insert(node.id);
        }
        id_to_old_id.insert(node.id, node.old_id);
    }

    let mut result = BTreeSet::new();

    for (&id, &old_id) in &id_to_old_id {
        let Some(row) = txn.node(id) else { continue };
        if row.visible {
            continue;
        }

        if ids_without_if_unused.contains(&id) {
            return Err(UploadError::gone(
                ErrorOrigin::NodeUpdater,
                format!("The node with the id {id} has already been deleted"),
            ));
        }

        result.insert(id);

        if ids_if_unused.contains(&id) {
            tracker.skip_deleted_node_ids.push(IdMapping {
                old_id,
                new_id: id,
                new_version: row.version,
            });
        }
    }

    Ok(result)
}

// Deletion targets still referenced by visible ways or relations: an error
// without if-unused, otherwise moved to the skip set.
fn is_node_still_referenced(
    txn: &Transaction<'_>,
    nodes: &[QueuedNode],
    tracker: &mut ChangeTracker,
) -> Result<BTreeSet<ObjectId>, UploadError> {
    let mut skipped = BTreeSet::new();

    for item in nodes {
        let ways = txn.ways_referencing_node(item.id);
        if ways.is_empty() {
            continue;
        }

        if !item.if_unused {
            return Err(UploadError::precondition_failed(
                ErrorOrigin::NodeUpdater,
                format!(
                    "Node {} is still used by ways {}.",
                    item.id,
                    join_ids(ways)
                ),
            ));
        }

        skipped.insert(item.id);
    }

    for item in nodes {
        if skipped.contains(&item.id) {
            continue;
        }

        let relations = txn.relations_referencing(ObjectType::Node, item.id);
        if relations.is_empty() {
            continue;
        }

        if !item.if_unused {
            return Err(UploadError::precondition_failed(
                ErrorOrigin::NodeUpdater,
                format!(
                    "Node {} is still used by relations {}.",
                    item.id,
                    join_ids(relations)
                ),
            ));
        }

        skipped.insert(item.id);
    }

    for &id in &skipped {
        let row = txn.node(id).ok_or_else(|| row_vanished(id))?;
        let old_id = nodes
            .iter()
            .find(|n| n.id == id)
            .map_or(0, |n| n.old_id);
        tracker.skip_deleted_node_ids.push(IdMapping {
            old_id,
            new_id: id,
            new_version: row.version,
        });
    }

    Ok(skipped)
}

fn row_vanished(id: ObjectId) -> UploadError {
    UploadError::internal(
        ErrorOrigin::NodeUpdater,
        format!("locked node {id} vanished from the current table"),
    )
}

#[allow(clippy::cast_sign_loss)]
const fn unsigned_or_zero(id: SignedObjectId) -> ObjectId {
    if id < 0 { 0 } else { id as ObjectId }
}
