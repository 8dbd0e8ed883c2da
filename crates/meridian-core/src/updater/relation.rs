use crate::{
    db::{MemberRow, RelationRow, Transaction},
    element::{Member, TagList},
    error::{ErrorOrigin, UploadError},
    tracker::{ChangeTracker, IdMapping},
    updater::{build_packages, placeholder_map, sorted_unique_ids},
};
use meridian_primitives::{
    Bbox, ChangesetId, ObjectId, ObjectType, Operation, SequenceId, SignedObjectId, Version,
    join_ids,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

///
/// RelationUpdater
///
/// Relations reference nodes, ways and other relations, may form cycles,
/// and carry their own bounding-box rules. Creates refuse forward
/// references between relations; deletes run a closed-world
/// still-referenced analysis over the delete set.
///

#[derive(Debug, Default)]
pub struct RelationUpdater {
    bbox: Bbox,
    create_relations: Vec<QueuedRelation>,
    modify_relations: Vec<QueuedRelation>,
    delete_relations: Vec<QueuedRelation>,
    create_placeholder_ids: BTreeSet<SignedObjectId>,
}

#[derive(Clone, Debug)]
struct QueuedMember {
    member_type: ObjectType,
    member_id: ObjectId,
    member_role: String,
    sequence_id: SequenceId,
    old_member_id: SignedObjectId,
}

#[derive(Clone, Debug)]
struct QueuedRelation {
    id: ObjectId,
    version: Version,
    changeset: ChangesetId,
    old_id: SignedObjectId,
    tags: Vec<(String, String)>,
    members: Vec<QueuedMember>,
    if_unused: bool,
}

impl RelationUpdater {
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

    pub fn add_relation(
        &mut self,
        changeset: ChangesetId,
        old_id: SignedObjectId,
        members: &[Member],
        tags: &TagList,
        tracker: &mut ChangeTracker,
    ) {
        self.create_relations.push(QueuedRelation {
            id: 0,
            version: 1,
            changeset,
            old_id,
            tags: tags.clone().into_inner(),
            members: queued_members(members),
            if_unused: false,
        });

        tracker.push_sequence_entry(Operation::Create, ObjectType::Relation, old_id, 0, false);
    }

    pub fn modify_relation(
        &mut self,
        changeset: ChangesetId,
        id: SignedObjectId,
        version: Version,
        members: &[Member],
        tags: &TagList,
        tracker: &mut ChangeTracker,
    ) {
        self.modify_relations.push(QueuedRelation {
            id: unsigned_or_zero(id),
            version,
            changeset,
            old_id: id,
            tags: tags.clone().into_inner(),
            members: queued_members(members),
            if_unused: false,
        });

        tracker.push_sequence_entry(Operation::Modify, ObjectType::Relation, id, version, false);
    }

    pub fn delete_relation(
        &mut self,
        changeset: ChangesetId,
        id: SignedObjectId,
        version: Version,
        if_unused: bool,
        tracker: &mut ChangeTracker,
    ) {
        self.delete_relations.push(QueuedRelation {
            id: unsigned_or_zero(id),
            version,
            changeset,
            old_id: id,
            tags: Vec::new(),
            members: Vec::new(),
            if_unused,
        });

        tracker.push_sequence_entry(
            Operation::Delete,
            ObjectType::Relation,
            id,
            version,
            if_unused,
        );
    }

    // ======================================================================
    // Flush: create
    // ======================================================================

    pub fn process_new_relations(
        &mut self,
        txn: &mut Transaction<'_>,
        tracker: &mut ChangeTracker,
    ) -> Result<(), UploadError> {
        self.check_unique_placeholder_ids()?;
        check_forward_relation_placeholders(&self.create_relations)?;

        debug!(count = self.create_relations.len(), "flushing relation creates");

        for queued in &mut self.create_relations {
            queued.id = txn.next_relation_id();
            tracker.created_relation_ids.push(IdMapping {
                old_id: queued.old_id,
                new_id: queued.id,
                new_version: 1,
            });
        }

        replace_old_ids_in_relations(
            &mut self.create_relations,
            &tracker.created_node_ids,
            &tracker.created_way_ids,
            &tracker.created_relation_ids,
        )?;

        let ids = sorted_unique_ids(self.create_relations.iter().map(|r| r.id));
        lock_future_members(txn, &self.create_relations, &ids)?;

        for queued in &self.create_relations {
            txn.insert_relation(RelationRow {
                id: queued.id,
                changeset: queued.changeset,
                timestamp: txn.now(),
                visible: true,
                version: 1,
                tags: queued.tags.clone(),
                members: member_rows(&queued.members),
            });
            txn.append_relation_history(queued.id)?;
        }

        let bbox = calc_relation_bbox(txn, &ids);
        self.bbox.expand(bbox);

        self.create_relations.clear();
        Ok(())
    }

    // ======================================================================
    // Flush: modify
    // ======================================================================

    pub fn process_modify_relations(
        &mut self,
        txn: &mut Transaction<'_>,
        tracker: &mut ChangeTracker,
    ) -> Result<(), UploadError> {
        replace_old_ids_in_relations(
            &mut self.modify_relations,
            &tracker.created_node_ids,
            &tracker.created_way_ids,
            &tracker.created_relation_ids,
        )?;

        let all_ids = sorted_unique_ids(self.modify_relations.iter().map(|r| r.id));
        lock_current_relations(txn, &all_ids)?;

        let packages = build_packages(&self.modify_relations, |r| r.id);

        for package in packages {
            check_current_relation_versions(txn, &package)?;
            lock_future_members(txn, &package, &all_ids)?;

            // Rule A: a new relation-typed member or any tag change counts
            // the full member bbox; Rule B: only added/removed node and way
            // members count. Both are evaluated against the pre-image now
            // and against the post-image after the write.
            let full_ids = {
                let mut ids = relations_with_new_relation_members(txn, &package);
                ids.extend(relations_with_changed_relation_tags(txn, &package));
                ids.into_iter().collect::<Vec<_>>()
            };
            let member_diff = relations_with_changed_way_node_members(txn, &package);

            let pre_full = calc_relation_bbox(txn, &full_ids);
            self.bbox.expand(pre_full);
            let pre_diff = calc_member_difference_bbox(txn, &member_diff, false);
            self.bbox.expand(pre_diff);

            for item in &package {
                let now = txn.now();
                let new_version = {
                    let row = txn
                        .relation_mut(item.id)
                        .ok_or_else(|| row_vanished(item.id))?;
                    row.changeset = item.changeset;
                    row.visible = true;
                    row.timestamp = now;
                    row.version += 1;
                    row.tags = item.tags.clone();
                    row.members = member_rows(&item.members);
                    row.version
                };
                txn.append_relation_history(item.id)?;

                tracker.modified_relation_ids.push(IdMapping {
                    old_id: item.old_id,
                    new_id: item.id,
                    new_version,
                });
            }

            let post_full = calc_relation_bbox(txn, &full_ids);
            self.bbox.expand(post_full);
            let post_diff = calc_member_difference_bbox(txn, &member_diff, true);
            self.bbox.expand(post_diff);
        }

        self.modify_relations.clear();
        Ok(())
    }

    // ======================================================================
    // Flush: delete
    // ======================================================================

    pub fn process_delete_relations(
        &mut self,
        txn: &mut Transaction<'_>,
        tracker: &mut ChangeTracker,
    ) -> Result<(), UploadError> {
        replace_old_ids_in_relations(
            &mut self.delete_relations,
            &tracker.created_node_ids,
            &tracker.created_way_ids,
            &tracker.created_relation_ids,
        )?;

        let ids = sorted_unique_ids(self.delete_relations.iter().map(|r| r.id));
        lock_current_relations(txn, &ids)?;

        let already_deleted =
            determine_already_deleted_relations(txn, &self.delete_relations, tracker)?;

        let mut seen = BTreeSet::new();
        let visible: Vec<QueuedRelation> = self
            .delete_relations
            .iter()
            .filter(|r| !already_deleted.contains(&r.id) && seen.insert(r.id))
            .cloned()
            .collect();

        check_current_relation_versions(txn, &visible)?;

        let unreferenced = is_relation_still_referenced(txn, visible, tracker)?;

        // every requested relation contributes its member bbox, including
        // ones that end up skipped
        let bbox = calc_relation_bbox(txn, &ids);
        self.bbox.expand(bbox);

        for item in unreferenced {
            let now = txn.now();
            {
                let row = txn
                    .relation_mut(item.id)
                    .ok_or_else(|| row_vanished(item.id))?;
                row.visible = false;
                row.changeset = item.changeset;
                row.timestamp = now;
                row.version += 1;
                row.tags.clear();
                row.members.clear();
            }
            txn.append_relation_history(item.id)?;

            tracker.deleted_relation_ids.push(item.old_id);
        }

        self.delete_relations.clear();
        Ok(())
    }

    fn check_unique_placeholder_ids(&mut self) -> Result<(), UploadError> {
        for queued in &self.create_relations {
            if !self.create_placeholder_ids.insert(queued.old_id) {
                return Err(UploadError::bad_request(
                    ErrorOrigin::RelationUpdater,
                    "Placeholder IDs must be unique for created elements.",
                ));
            }
        }
        Ok(())
    }
}

fn queued_members(members: &[Member]) -> Vec<QueuedMember> {
    members
        .iter()
        .enumerate()
        .map(|(seq, member)| QueuedMember {
            member_type: member.member_type(),
            member_id: unsigned_or_zero(member.member_ref()),
            member_role: member.role().to_owned(),
            sequence_id: seq as SequenceId,
            old_member_id: member.member_ref(),
        })
        .collect()
}

fn member_rows(members: &[QueuedMember]) -> Vec<MemberRow> {
    members
        .iter()
        .map(|m| MemberRow {
            member_type: m.member_type,
            member_id: m.member_id,
            member_role: m.member_role.clone(),
            sequence_id: m.sequence_id,
        })
        .collect()
}

// Child relations must be provided before their parents; a relation member
// may only refer to a placeholder introduced earlier in the batch, and
// never to its own relation.
fn check_forward_relation_placeholders(
    create_relations: &[QueuedRelation],
) -> Result<(), UploadError> {
    let mut placeholder_ids = BTreeSet::new();

    for relation in create_relations {
        for member in &relation.members {
            if member.old_member_id < 0
                && member.member_type == ObjectType::Relation
                && !placeholder_ids.contains(&member.old_member_id)
            {
                return Err(UploadError::bad_request(
                    ErrorOrigin::RelationUpdater,
                    format!(
                        "Placeholder relation not found for reference {} in relation {}",
                        member.old_member_id, relation.old_id
                    ),
                ));
            }
        }
        if relation.old_id < 0 {
            placeholder_ids.insert(relation.old_id);
        }
    }

    Ok(())
}

fn replace_old_ids_in_relations(
    relations: &mut [QueuedRelation],
    created_node_ids: &[IdMapping],
    created_way_ids: &[IdMapping],
    created_relation_ids: &[IdMapping],
) -> Result<(), UploadError> {
    let relation_map =
        placeholder_map(created_relation_ids, "relation", ErrorOrigin::RelationUpdater)?;
    let way_map = placeholder_map(created_way_ids, "way", ErrorOrigin::RelationUpdater)?;
    let node_map = placeholder_map(created_node_ids, "node", ErrorOrigin::RelationUpdater)?;

    for relation in relations {
        if relation.old_id < 0 && relation.id == 0 {
            let new_id = relation_map.get(&relation.old_id).ok_or_else(|| {
                UploadError::bad_request(
                    ErrorOrigin::RelationUpdater,
                    format!(
                        "Placeholder id not found for relation reference {}",
                        relation.old_id
                    ),
                )
            })?;
            relation.id = *new_id;
        }

        for member in &mut relation.members {
            if member.old_member_id >= 0 {
                continue;
            }

            let (map, kind) = match member.member_type {
                ObjectType::Node => (&node_map, "node"),
                ObjectType::Way => (&way_map, "way"),
                ObjectType::Relation => (&relation_map, "relation"),
            };

            let new_id = map.get(&member.old_member_id).ok_or_else(|| {
                UploadError::bad_request(
                    ErrorOrigin::RelationUpdater,
                    format!(
                        "Placeholder {kind} not found for reference {} in relation {}",
                        member.old_member_id, relation.old_id
                    ),
                )
            })?;
            member.member_id = *new_id;
        }
    }

    Ok(())
}

fn lock_current_relations(txn: &mut Transaction<'_>, ids: &[ObjectId]) -> Result<(), UploadError> {
    let missing = txn.lock_rows_exclusive(ObjectType::Relation, ids);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(UploadError::not_found(
            ErrorOrigin::RelationUpdater,
            format!(
                "The following relation ids are unknown: {}",
                join_ids(missing)
            ),
        ))
    }
}

// Share-lock future members in three rounds (nodes, ways, relations) so a
// missing member produces a specific error naming the offending relation.
// Relation ids already exclusively locked by this batch are left alone.
fn lock_future_members(
    txn: &mut Transaction<'_>,
    relations: &[QueuedRelation],
    already_locked_relations: &[ObjectId],
) -> Result<(), UploadError> {
    let mut node_ids = Vec::new();
    let mut way_ids = Vec::new();
    let mut relation_ids = Vec::new();

    for relation in relations {
        for member in &relation.members {
            match member.member_type {
                ObjectType::Node => node_ids.push(member.member_id),
                ObjectType::Way => way_ids.push(member.member_id),
                ObjectType::Relation => {
                    // the exclusive lock is strictly stronger; no downgrade
                    if !already_locked_relations.contains(&member.member_id) {
                        relation_ids.push(member.member_id);
                    }
                }
            }
        }
    }

    if node_ids.is_empty() && way_ids.is_empty() && relation_ids.is_empty() {
        return Ok(());
    }

    lock_future_members_round(txn, relations, ObjectType::Node, node_ids, "nodes")?;
    lock_future_members_round(txn, relations, ObjectType::Way, way_ids, "ways")?;
    lock_future_members_round(txn, relations, ObjectType::Relation, relation_ids, "relations")
}

fn lock_future_members_round(
    txn: &mut Transaction<'_>,
    relations: &[QueuedRelation],
    member_type: ObjectType,
    member_ids: Vec<ObjectId>,
    kind_plural: &str,
) -> Result<(), UploadError> {
    let member_ids = sorted_unique_ids(member_ids);
    if member_ids.is_empty() {
        return Ok(());
    }

    let absent = txn.lock_rows_share_visible(member_type, &member_ids);
    if absent.is_empty() {
        return Ok(());
    }

    let absent: BTreeSet<ObjectId> = absent.into_iter().collect();
    let mut absent_per_relation: BTreeMap<SignedObjectId, BTreeSet<ObjectId>> = BTreeMap::new();

    for relation in relations {
        for member in &relation.members {
            if member.member_type == member_type && absent.contains(&member.member_id) {
                absent_per_relation
                    .entry(relation.old_id)
                    .or_default()
                    .insert(member.member_id);
            }
        }
    }

    let (relation_old_id, ids) = absent_per_relation
        .first_key_value()
        .ok_or_else(|| row_vanished(0))?;

    Err(UploadError::precondition_failed(
        ErrorOrigin::RelationUpdater,
        format!(
            "Relation {relation_old_id} requires the {kind_plural} with id in {}, which either do not exist, or are not visible.",
            join_ids(ids.iter().copied())
        ),
    ))
}

fn check_current_relation_versions(
    txn: &Transaction<'_>,
    relations: &[QueuedRelation],
) -> Result<(), UploadError> {
    for item in relations {
        let row = txn.relation(item.id).ok_or_else(|| row_vanished(item.id))?;
        if row.version != item.version {
            return Err(UploadError::conflict(
                ErrorOrigin::RelationUpdater,
                format!(
                    "Version mismatch: Provided {}, server had: {} of Relation {}",
                    item.version, row.version, item.id
                ),
            ));
        }
    }
    Ok(())
}

fn determine_already_deleted_relations(
    txn: &Transaction<'_>,
    relations: &[QueuedRelation],
    tracker: &mut ChangeTracker,
) -> Result<BTreeSet<ObjectId>, UploadError> {
    let mut ids_if_unused = BTreeSet::new();
    let mut ids_without_if_unused = BTreeSet::new();
    let mut id_to_old_id = BTreeMap::new();

    for relation in relations {
        if relation.if_unused {
            ids_if_unused.insert(relation.id);
        } else {
            ids_without_if_unused.insert(relation.id);
        }
        id_to_old_id.insert(relation.id, relation.old_id);
    }

    let mut result = BTreeSet::new();

    for (&id, &old_id) in &id_to_old_id {
        let Some(row) = txn.relation(id) else { continue };
        if row.visible {
            continue;
        }

        if ids_without_if_unused.contains(&id) {
            return Err(UploadError::gone(
                ErrorOrigin::RelationUpdater,
                format!("The relation with the id {id} has already been deleted"),
            ));
        }

        result.insert(id);

        if ids_if_unused.contains(&id) {
            tracker.skip_deleted_relation_ids.push(IdMapping {
                old_id,
                new_id: id,
                new_version: row.version,
            });
        }
    }

    Ok(result)
}

// ==========================================================================
// Bbox rules
// ==========================================================================

// Rule A trigger: a relation-typed member that is not in the current member
// set of the relation.
fn relations_with_new_relation_members(
    txn: &Transaction<'_>,
    relations: &[QueuedRelation],
) -> BTreeSet<ObjectId> {
    let mut result = BTreeSet::new();

    for relation in relations {
        let current: BTreeSet<ObjectId> = txn.relation_member_relations(relation.id);

        for member in &relation.members {
            if member.member_type == ObjectType::Relation && !current.contains(&member.member_id) {
                result.insert(relation.id);
                break;
            }
        }
    }

    result
}

// Rule A trigger: the staged tag set differs from the current one.
fn relations_with_changed_relation_tags(
    txn: &Transaction<'_>,
    relations: &[QueuedRelation],
) -> BTreeSet<ObjectId> {
    let mut result = BTreeSet::new();

    for relation in relations {
        let staged: BTreeSet<(&str, &str)> = relation
            .tags
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let current: BTreeSet<(&str, &str)> = txn
            .relation(relation.id)
            .map(|row| {
                row.tags
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect()
            })
            .unwrap_or_default();

        if staged != current {
            result.insert(relation.id);
        }
    }

    result
}

#[derive(Clone, Copy, Debug)]
struct MemberDifference {
    member_type: ObjectType,
    member_id: ObjectId,
    new_member: bool,
}

// Rule B inputs: node/way members added to or removed from the staged
// member lists, compared against the current table.
fn relations_with_changed_way_node_members(
    txn: &Transaction<'_>,
    relations: &[QueuedRelation],
) -> Vec<MemberDifference> {
    let mut result = Vec::new();

    for relation in relations {
        let staged: BTreeSet<(ObjectType, ObjectId)> = relation
            .members
            .iter()
            .filter(|m| m.member_type != ObjectType::Relation)
            .map(|m| (m.member_type, m.member_id))
            .collect();

        let current: BTreeSet<(ObjectType, ObjectId)> = txn
            .relation(relation.id)
            .map(|row| {
                row.members
                    .iter()
                    .filter(|m| m.member_type != ObjectType::Relation)
                    .map(|m| (m.member_type, m.member_id))
                    .collect()
            })
            .unwrap_or_default();

        for &(member_type, member_id) in staged.difference(&current) {
            result.push(MemberDifference {
                member_type,
                member_id,
                new_member: true,
            });
        }
        for &(member_type, member_id) in current.difference(&staged) {
            result.push(MemberDifference {
                member_type,
                member_id,
                new_member: false,
            });
        }
    }

    result
}

fn calc_member_difference_bbox(
    txn: &Transaction<'_>,
    diff: &[MemberDifference],
    process_new_elements: bool,
) -> Bbox {
    let mut bbox = Bbox::default();

    for d in diff {
        if d.new_member != process_new_elements {
            continue;
        }

        match d.member_type {
            ObjectType::Node => {
                if let Some(node) = txn.node(d.member_id) {
                    bbox.expand_point(node.lat, node.lon);
                }
            }
            ObjectType::Way => {
                if let Some(way) = txn.way(d.member_id) {
                    for &node_id in &way.nodes {
                        if let Some(node) = txn.node(node_id) {
                            bbox.expand_point(node.lat, node.lon);
                        }
                    }
                }
            }
            ObjectType::Relation => {}
        }
    }

    bbox
}

// Full member bbox of the given relations, one level deep: direct node
// members and every node of way members. Relation-typed members contribute
// nothing themselves.
fn calc_relation_bbox(txn: &Transaction<'_>, ids: &[ObjectId]) -> Bbox {
    let mut bbox = Bbox::default();

    for &id in ids {
        let Some(relation) = txn.relation(id) else {
            continue;
        };

        for member in &relation.members {
            match member.member_type {
                ObjectType::Node => {
                    if let Some(node) = txn.node(member.member_id) {
                        bbox.expand_point(node.lat, node.lon);
                    }
                }
                ObjectType::Way => {
                    if let Some(way) = txn.way(member.member_id) {
                        for &node_id in &way.nodes {
                            if let Some(node) = txn.node(node_id) {
                                bbox.expand_point(node.lat, node.lon);
                            }
                        }
                    }
                }
                ObjectType::Relation => {}
            }
        }
    }

    bbox
}

// ==========================================================================
// Still-referenced analysis
// ==========================================================================

// Relations may be deleted together with their referrers as long as no
// relation outside the delete set still points at them. Blocked relations
// with if-unused become skips, and the block extends to their relation
// children inside the delete set; the closure makes cycles safe.
fn is_relation_still_referenced(
    txn: &Transaction<'_>,
    relations: Vec<QueuedRelation>,
    tracker: &mut ChangeTracker,
) -> Result<Vec<QueuedRelation>, UploadError> {
    if relations.is_empty() {
        return Ok(relations);
    }

    let mut ids = BTreeSet::new();
    let mut ids_if_unused = BTreeSet::new();
    let mut ids_without_if_unused = BTreeSet::new();
    let mut id_to_old_id = BTreeMap::new();

    for relation in &relations {
        ids.insert(relation.id);
        if relation.if_unused {
            ids_if_unused.insert(relation.id);
        } else {
            ids_without_if_unused.insert(relation.id);
        }
        id_to_old_id.insert(relation.id, relation.old_id);
    }

    let mut exclude_from_deletion = BTreeSet::new();
    let mut direct_relation_ids = BTreeSet::new();

    // relations in the delete set that a visible relation outside the set
    // still references
    for &id in &ids {
        let external_parents: Vec<ObjectId> = txn
            .relations_referencing(ObjectType::Relation, id)
            .into_iter()
            .filter(|parent| !ids.contains(parent))
            .collect();

        if external_parents.is_empty() {
            continue;
        }

        if ids_without_if_unused.contains(&id) {
            return Err(UploadError::precondition_failed(
                ErrorOrigin::RelationUpdater,
                format!(
                    "The relation {id} is used in relations {}.",
                    join_ids(external_parents)
                ),
            ));
        }

        exclude_from_deletion.insert(id);
        direct_relation_ids.insert(id);
    }

    // the children of a blocked relation cannot be deleted either; walk the
    // membership edges until the extension stops growing
    let transitive_children = collect_recursive_relation_members(txn, &direct_relation_ids);
    for child in transitive_children {
        if ids_if_unused.contains(&child) {
            exclude_from_deletion.insert(child);
        }
    }

    // skipped deletions are reported back with their current version
    for &id in &exclude_from_deletion {
        let row = txn.relation(id).ok_or_else(|| row_vanished(id))?;
        tracker.skip_deleted_relation_ids.push(IdMapping {
            old_id: id_to_old_id.get(&id).copied().unwrap_or(0),
            new_id: id,
            new_version: row.version,
        });
    }

    Ok(relations
        .into_iter()
        .filter(|relation| !exclude_from_deletion.contains(&relation.id))
        .collect())
}

// Transitive closure of relation-typed members starting from the given set.
// Each step only discovers ids that exist in the current table, so the
// iteration terminates even on cyclic membership graphs.
fn collect_recursive_relation_members(
    txn: &Transaction<'_>,
    start: &BTreeSet<ObjectId>,
) -> BTreeSet<ObjectId> {
    let mut seen = BTreeSet::new();
    let mut frontier: BTreeSet<ObjectId> = start.clone();

    while !frontier.is_empty() {
        let mut next = BTreeSet::new();

        for &id in &frontier {
            for child in txn.relation_member_relations(id) {
                if seen.insert(child) {
                    next.insert(child);
                }
            }
        }

        frontier = next;
    }

    seen
}

fn row_vanished(id: ObjectId) -> UploadError {
    UploadError::internal(
        ErrorOrigin::RelationUpdater,
        format!("locked relation {id} vanished from the current table"),
    )
}

#[allow(clippy::cast_sign_loss)]
const fn unsigned_or_zero(id: SignedObjectId) -> ObjectId {
    if id < 0 { 0 } else { id as ObjectId }
}
