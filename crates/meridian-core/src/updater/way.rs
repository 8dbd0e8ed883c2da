use crate::{
    db::{Transaction, WayRow},
    element::TagList,
    error::{ErrorOrigin, UploadError},
    tracker::{ChangeTracker, IdMapping},
    updater::{build_packages, placeholder_map, sorted_unique_ids},
};
use meridian_primitives::{
    Bbox, ChangesetId, ObjectId, ObjectType, Operation, SignedObjectId, Version, join_ids,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

///
/// WayUpdater
///
/// Way batches add node-reference handling on top of the node updater's
/// cycle: placeholder resolution against both the node and way mappings,
/// and share locks on every referenced node for the rest of the
/// transaction.
///

#[derive(Debug, Default)]
pub struct WayUpdater {
    bbox: Bbox,
    create_ways: Vec<QueuedWay>,
    modify_ways: Vec<QueuedWay>,
    delete_ways: Vec<QueuedWay>,
    create_placeholder_ids: BTreeSet<SignedObjectId>,
}

#[derive(Clone, Debug)]
struct QueuedWayNode {
    node_id: ObjectId,
    old_node_id: SignedObjectId,
}

#[derive(Clone, Debug)]
struct QueuedWay {
    id: ObjectId,
    version: Version,
    changeset: ChangesetId,
    old_id: SignedObjectId,
    tags: Vec<(String, String)>,
    way_nodes: Vec<QueuedWayNode>,
    if_unused: bool,
}

impl WayUpdater {
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

    pub fn add_way(
        &mut self,
        changeset: ChangesetId,
        old_id: SignedObjectId,
        nodes: &[SignedObjectId],
        tags: &TagList,
        tracker: &mut ChangeTracker,
    ) {
        self.create_ways.push(QueuedWay {
            id: 0,
            version: 1,
            changeset,
            old_id,
            tags: tags.clone().into_inner(),
            way_nodes: queued_way_nodes(nodes),
            if_unused: false,
        });

        tracker.push_sequence_entry(Operation::Create, ObjectType::Way, old_id, 0, false);
    }

    pub fn modify_way(
        &mut self,
        changeset: ChangesetId,
        id: SignedObjectId,
        version: Version,
        nodes: &[SignedObjectId],
        tags: &TagList,
        tracker: &mut ChangeTracker,
    ) {
        self.modify_ways.push(QueuedWay {
            id: unsigned_or_zero(id),
            version,
            changeset,
            old_id: id,
            tags: tags.clone().into_inner(),
            way_nodes: queued_way_nodes(nodes),
            if_unused: false,
        });

        tracker.push_sequence_entry(Operation::Modify, ObjectType::Way, id, version, false);
    }

    pub fn delete_way(
        &mut self,
        changeset: ChangesetId,
        id: SignedObjectId,
        version: Version,
        if_unused: bool,
        tracker: &mut ChangeTracker,
    ) {
        self.delete_ways.push(QueuedWay {
            id: unsigned_or_zero(id),
            version,
            changeset,
            old_id: id,
            tags: Vec::new(),
            way_nodes: Vec::new(),
            if_unused,
        });

        tracker.push_sequence_entry(Operation::Delete, ObjectType::Way, id, version, if_unused);
    }

    // ======================================================================
    // Flush: create
    // ======================================================================

    pub fn process_new_ways(
        &mut self,
        txn: &mut Transaction<'_>,
        tracker: &mut ChangeTracker,
    ) -> Result<(), UploadError> {
        self.check_unique_placeholder_ids()?;

        debug!(count = self.create_ways.len(), "flushing way creates");

        // allocate ids up front so later batches can resolve references
        for queued in &mut self.create_ways {
            queued.id = txn.next_way_id();
            tracker.created_way_ids.push(IdMapping {
                old_id: queued.old_id,
                new_id: queued.id,
                new_version: 1,
            });
        }

        replace_old_ids_in_ways(
            &mut self.create_ways,
            &tracker.created_node_ids,
            &tracker.created_way_ids,
        )?;

        lock_future_nodes(txn, &self.create_ways)?;

        let ids = sorted_unique_ids(self.create_ways.iter().map(|w| w.id));

        for queued in &self.create_ways {
            txn.insert_way(WayRow {
                id: queued.id,
                changeset: queued.changeset,
                timestamp: txn.now(),
                visible: true,
                version: 1,
                tags: queued.tags.clone(),
                nodes: queued.way_nodes.iter().map(|wn| wn.node_id).collect(),
            });
            txn.append_way_history(queued.id)?;
        }

        let bbox = calc_way_bbox(txn, &ids);
        self.bbox.expand(bbox);

        self.create_ways.clear();
        Ok(())
    }

    // ======================================================================
    // Flush: modify
    // ======================================================================

    pub fn process_modify_ways(
        &mut self,
        txn: &mut Transaction<'_>,
        tracker: &mut ChangeTracker,
    ) -> Result<(), UploadError> {
        replace_old_ids_in_ways(
            &mut self.modify_ways,
            &tracker.created_node_ids,
            &tracker.created_way_ids,
        )?;

        let ids = sorted_unique_ids(self.modify_ways.iter().map(|w| w.id));
        lock_current_ways(txn, &ids)?;

        let packages = build_packages(&self.modify_ways, |w| w.id);

        for package in packages {
            let package_ids = sorted_unique_ids(package.iter().map(|w| w.id));

            check_current_way_versions(txn, &package)?;
            lock_future_nodes(txn, &package)?;

            // both the old and the new node sets contribute to the bbox
            let old_bbox = calc_way_bbox(txn, &package_ids);
            self.bbox.expand(old_bbox);

            for item in &package {
                let now = txn.now();
                let new_version = {
                    let row = txn.way_mut(item.id).ok_or_else(|| row_vanished(item.id))?;
                    row.changeset = item.changeset;
                    row.visible = true;
                    row.timestamp = now;
                    row.version += 1;
                    row.tags = item.tags.clone();
                    row.nodes = item.way_nodes.iter().map(|wn| wn.node_id).collect();
                    row.version
                };
                txn.append_way_history(item.id)?;

                tracker.modified_way_ids.push(IdMapping {
                    old_id: item.old_id,
                    new_id: item.id,
                    new_version,
                });
            }

            let new_bbox = calc_way_bbox(txn, &package_ids);
            self.bbox.expand(new_bbox);
        }

        self.modify_ways.clear();
        Ok(())
    }

    // ======================================================================
    // Flush: delete
    // ======================================================================

    pub fn process_delete_ways(
        &mut self,
        txn: &mut Transaction<'_>,
        tracker: &mut ChangeTracker,
    ) -> Result<(), UploadError> {
        replace_old_ids_in_ways(
            &mut self.delete_ways,
            &tracker.created_node_ids,
            &tracker.created_way_ids,
        )?;

        let ids = sorted_unique_ids(self.delete_ways.iter().map(|w| w.id));
        lock_current_ways(txn, &ids)?;

        let already_deleted = determine_already_deleted_ways(txn, &self.delete_ways, tracker)?;

        let mut seen = BTreeSet::new();
        let candidates: Vec<QueuedWay> = self
            .delete_ways
            .iter()
            .filter(|w| !already_deleted.contains(&w.id) && seen.insert(w.id))
            .cloned()
            .collect();

        check_current_way_versions(txn, &candidates)?;

        let skipped = is_way_still_referenced(txn, &candidates, tracker)?;

        let doomed_ids: Vec<ObjectId> = candidates
            .iter()
            .filter(|w| !skipped.contains(&w.id))
            .map(|w| w.id)
            .collect();
        let doomed_bbox = calc_way_bbox(txn, &doomed_ids);
        self.bbox.expand(doomed_bbox);

        for item in candidates {
            if skipped.contains(&item.id) {
                continue;
            }

            let now = txn.now();
            {
                let row = txn.way_mut(item.id).ok_or_else(|| row_vanished(item.id))?;
                row.visible = false;
                row.changeset = item.changeset;
                row.timestamp = now;
                row.version += 1;
                row.tags.clear();
                row.nodes.clear();
            }
            txn.append_way_history(item.id)?;

            tracker.deleted_way_ids.push(item.old_id);
        }

        self.delete_ways.clear();
        Ok(())
    }

    fn check_unique_placeholder_ids(&mut self) -> Result<(), UploadError> {
        for queued in &self.create_ways {
            if !self.create_placeholder_ids.insert(queued.old_id) {
                return Err(UploadError::bad_request(
                    ErrorOrigin::WayUpdater,
                    "Placeholder IDs must be unique for created elements.",
                ));
            }
        }
        Ok(())
    }
}

fn queued_way_nodes(nodes: &[SignedObjectId]) -> Vec<QueuedWayNode> {
    nodes
        .iter()
        .map(|&old_node_id| QueuedWayNode {
            node_id: unsigned_or_zero(old_node_id),
            old_node_id,
        })
        .collect()
}

// Rewrite the way id and its node references using the create mappings.
fn replace_old_ids_in_ways(
    ways: &mut [QueuedWay],
    created_node_ids: &[IdMapping],
    created_way_ids: &[IdMapping],
) -> Result<(), UploadError> {
    let way_map = placeholder_map(created_way_ids, "way", ErrorOrigin::WayUpdater)?;
    let node_map = placeholder_map(created_node_ids, "node", ErrorOrigin::WayUpdater)?;

    for way in ways {
        if way.old_id < 0 && way.id == 0 {
            let new_id = way_map.get(&way.old_id).ok_or_else(|| {
                UploadError::bad_request(
                    ErrorOrigin::WayUpdater,
                    format!("Placeholder id not found for way reference {}", way.old_id),
                )
            })?;
            way.id = *new_id;
        }

        for way_node in &mut way.way_nodes {
            if way_node.old_node_id < 0 {
                let new_id = node_map.get(&way_node.old_node_id).ok_or_else(|| {
                    UploadError::bad_request(
                        ErrorOrigin::WayUpdater,
                        format!(
                            "Placeholder node not found for reference {} in way {}",
                            way_node.old_node_id, way.old_id
                        ),
                    )
                })?;
                way_node.node_id = *new_id;
            }
        }
    }

    Ok(())
}

fn lock_current_ways(txn: &mut Transaction<'_>, ids: &[ObjectId]) -> Result<(), UploadError> {
    let missing = txn.lock_rows_exclusive(ObjectType::Way, ids);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(UploadError::not_found(
            ErrorOrigin::WayUpdater,
            format!("The following way ids are unknown: {}", join_ids(missing)),
        ))
    }
}

// Share-lock every node the batch is about to reference; a missing or
// invisible node fails the upload naming the first offending way.
fn lock_future_nodes(txn: &mut Transaction<'_>, ways: &[QueuedWay]) -> Result<(), UploadError> {
    let node_ids =
        sorted_unique_ids(ways.iter().flat_map(|w| w.way_nodes.iter().map(|wn| wn.node_id)));

    if node_ids.is_empty() {
        return Ok(());
    }

    let absent = txn.lock_rows_share_visible(ObjectType::Node, &node_ids);
    if absent.is_empty() {
        return Ok(());
    }

    let absent: BTreeSet<ObjectId> = absent.into_iter().collect();
    let mut absent_way_node_ids: BTreeMap<SignedObjectId, BTreeSet<ObjectId>> = BTreeMap::new();

    for way in ways {
        for way_node in &way.way_nodes {
            if absent.contains(&way_node.node_id) {
                absent_way_node_ids
                    .entry(way.old_id)
                    .or_default()
                    .insert(way_node.node_id);
            }
        }
    }

    let (way_old_id, node_ids) = absent_way_node_ids
        .first_key_value()
        .ok_or_else(|| row_vanished(0))?;

    Err(UploadError::precondition_failed(
        ErrorOrigin::WayUpdater,
        format!(
            "Way {way_old_id} requires the nodes with id in {}, which either do not exist, or are not visible.",
            join_ids(node_ids.iter().copied())
        ),
    ))
}

fn check_current_way_versions(
    txn: &Transaction<'_>,
    ways: &[QueuedWay],
) -> Result<(), UploadError> {
    for item in ways {
        let row = txn.way(item.id).ok_or_else(|| row_vanished(item.id))?;
        if row.version != item.version {
            return Err(UploadError::conflict(
                ErrorOrigin::WayUpdater,
                format!(
                    "Version mismatch: Provided {}, server had: {} of Way {}",
                    item.version, row.version, item.id
                ),
            ));
        }
    }
    Ok(())
}

fn determine_already_deleted_ways(
    txn: &Transaction<'_>,
    ways: &[QueuedWay],
    tracker: &mut ChangeTracker,
) -> Result<BTreeSet<ObjectId>, UploadError> {
    let mut ids_if_unused = BTreeSet::new();
    let mut ids_without_if_unused = BTreeSet::new();
    let mut id_to_old_id = BTreeMap::new();

    for way in ways {
        if way.if_unused {
            ids_if_unused.insert(way.id);
        } else {
            ids_without_if_unused.insert(way.id);
        }
        id_to_old_id.insert(way.id, way.old_id);
    }

    let mut result = BTreeSet::new();

    for (&id, &old_id) in &id_to_old_id {
        let Some(row) = txn.way(id) else { continue };
        if row.visible {
            continue;
        }

        if ids_without_if_unused.contains(&id) {
            return Err(UploadError::gone(
                ErrorOrigin::WayUpdater,
                format!("The way with the id {id} has already been deleted"),
            ));
        }

        result.insert(id);

        if ids_if_unused.contains(&id) {
            tracker.skip_deleted_way_ids.push(IdMapping {
                old_id,
                new_id: id,
                new_version: row.version,
            });
        }
    }

    Ok(result)
}

fn is_way_still_referenced(
    txn: &Transaction<'_>,
    ways: &[QueuedWay],
    tracker: &mut ChangeTracker,
) -> Result<BTreeSet<ObjectId>, UploadError> {
    let mut skipped = BTreeSet::new();

    for item in ways {
        let relations = txn.relations_referencing(ObjectType::Way, item.id);
        if relations.is_empty() {
            continue;
        }

        if !item.if_unused {
            return Err(UploadError::precondition_failed(
                ErrorOrigin::WayUpdater,
                format!(
                    "Way {} is still used by relations {}.",
                    item.id,
                    join_ids(relations)
                ),
            ));
        }

        skipped.insert(item.id);

        let row = txn.way(item.id).ok_or_else(|| row_vanished(item.id))?;
        tracker.skip_deleted_way_ids.push(IdMapping {
            old_id: item.old_id,
            new_id: item.id,
            new_version: row.version,
        });
    }

    Ok(skipped)
}

// Bounding box of every node referenced by the given ways, in their current
// table state.
fn calc_way_bbox(txn: &Transaction<'_>, ids: &[ObjectId]) -> Bbox {
    let mut bbox = Bbox::default();

    for &id in ids {
        let Some(way) = txn.way(id) else { continue };
        for &node_id in &way.nodes {
            if let Some(node) = txn.node(node_id) {
                bbox.expand_point(node.lat, node.lon);
            }
        }
    }

    bbox
}

fn row_vanished(id: ObjectId) -> UploadError {
    UploadError::internal(
        ErrorOrigin::WayUpdater,
        format!("locked way {id} vanished from the current table"),
    )
}

#[allow(clippy::cast_sign_loss)]
const fn unsigned_or_zero(id: SignedObjectId) -> ObjectId {
    if id < 0 { 0 } else { id as ObjectId }
}
