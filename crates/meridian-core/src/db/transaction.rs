use crate::{
    db::{
        ChangesetRow, Database, DatabaseState, HistoryRow, LockMode, LockSet, NodeRow,
        RelationRow, WayRow,
    },
    error::{ErrorOrigin, UploadError},
};
use meridian_primitives::{ChangesetId, ObjectId, ObjectType, Timestamp};
use std::collections::BTreeSet;
use tracing::debug;

///
/// Transaction
///
/// Scoped unit of work over a private snapshot of the database state.
/// `commit` publishes the snapshot; dropping the transaction without
/// committing discards every change, which is what unwinds uploads on any
/// propagated failure.
///

pub struct Transaction<'db> {
    db: &'db mut Database,
    work: DatabaseState,
    locks: LockSet,
    now: Timestamp,
}

impl<'db> Transaction<'db> {
    pub(crate) fn new(db: &'db mut Database) -> Self {
        let work = db.state.clone();
        Self {
            db,
            work,
            locks: LockSet::new(),
            now: Timestamp::now(),
        }
    }

    /// Publish the working snapshot as the committed state.
    pub fn commit(self) {
        debug!(
            nodes = self.work.nodes.len(),
            ways = self.work.ways.len(),
            relations = self.work.relations.len(),
            "transaction commit"
        );
        self.db.state = self.work;
    }

    /// Row timestamp shared by every write of this transaction.
    #[must_use]
    pub const fn now(&self) -> Timestamp {
        self.now
    }

    #[must_use]
    pub const fn locks(&self) -> &LockSet {
        &self.locks
    }

    // ======================================================================
    // Sequences
    // ======================================================================

    pub(crate) fn next_node_id(&mut self) -> ObjectId {
        let id = self.work.sequences.next_node;
        self.work.sequences.next_node += 1;
        id
    }

    pub(crate) fn next_way_id(&mut self) -> ObjectId {
        let id = self.work.sequences.next_way;
        self.work.sequences.next_way += 1;
        id
    }

    pub(crate) fn next_relation_id(&mut self) -> ObjectId {
        let id = self.work.sequences.next_relation;
        self.work.sequences.next_relation += 1;
        id
    }

    pub(crate) fn next_changeset_id(&mut self) -> ChangesetId {
        let id = self.work.sequences.next_changeset;
        self.work.sequences.next_changeset += 1;
        id
    }

    // ======================================================================
    // Current-table access
    // ======================================================================

    pub(crate) fn node(&self, id: ObjectId) -> Option<&NodeRow> {
        self.work.nodes.get(&id)
    }

    pub(crate) fn node_mut(&mut self, id: ObjectId) -> Option<&mut NodeRow> {
        self.work.nodes.get_mut(&id)
    }

    pub(crate) fn insert_node(&mut self, row: NodeRow) {
        // inserting implies the row lock
        self.locks
            .lock_element(ObjectType::Node, row.id, LockMode::Exclusive);
        self.work.nodes.insert(row.id, row);
    }

    pub(crate) fn way(&self, id: ObjectId) -> Option<&WayRow> {
        self.work.ways.get(&id)
    }

    pub(crate) fn way_mut(&mut self, id: ObjectId) -> Option<&mut WayRow> {
        self.work.ways.get_mut(&id)
    }

    pub(crate) fn insert_way(&mut self, row: WayRow) {
        self.locks
            .lock_element(ObjectType::Way, row.id, LockMode::Exclusive);
        self.work.ways.insert(row.id, row);
    }

    pub(crate) fn relation(&self, id: ObjectId) -> Option<&RelationRow> {
        self.work.relations.get(&id)
    }

    pub(crate) fn relation_mut(&mut self, id: ObjectId) -> Option<&mut RelationRow> {
        self.work.relations.get_mut(&id)
    }

    pub(crate) fn insert_relation(&mut self, row: RelationRow) {
        self.locks
            .lock_element(ObjectType::Relation, row.id, LockMode::Exclusive);
        self.work.relations.insert(row.id, row);
    }

    pub(crate) fn changeset(&self, id: ChangesetId) -> Option<&ChangesetRow> {
        self.work.changesets.get(&id)
    }

    pub(crate) fn changeset_mut(&mut self, id: ChangesetId) -> Option<&mut ChangesetRow> {
        self.work.changesets.get_mut(&id)
    }

    pub(crate) fn insert_changeset(&mut self, row: ChangesetRow) {
        self.locks.lock_changeset(row.id);
        self.work.changesets.insert(row.id, row);
    }

    // ======================================================================
    // History
    // ======================================================================

    /// Copy the current node row (with its tags) into the history table.
    pub(crate) fn append_node_history(&mut self, id: ObjectId) -> Result<(), UploadError> {
        let row = self
            .work
            .nodes
            .get(&id)
            .cloned()
            .ok_or_else(|| history_source_missing(ObjectType::Node, id))?;
        self.work
            .node_history
            .insert((id, row.version), HistoryRow::new(row));
        Ok(())
    }

    pub(crate) fn append_way_history(&mut self, id: ObjectId) -> Result<(), UploadError> {
        let row = self
            .work
            .ways
            .get(&id)
            .cloned()
            .ok_or_else(|| history_source_missing(ObjectType::Way, id))?;
        self.work
            .way_history
            .insert((id, row.version), HistoryRow::new(row));
        Ok(())
    }

    pub(crate) fn append_relation_history(&mut self, id: ObjectId) -> Result<(), UploadError> {
        let row = self
            .work
            .relations
            .get(&id)
            .cloned()
            .ok_or_else(|| history_source_missing(ObjectType::Relation, id))?;
        self.work
            .relation_history
            .insert((id, row.version), HistoryRow::new(row));
        Ok(())
    }

    // ======================================================================
    // Locking
    // ======================================================================

    pub(crate) fn lock_changeset_row(&mut self, id: ChangesetId) -> bool {
        if self.work.changesets.contains_key(&id) {
            self.locks.lock_changeset(id);
            true
        } else {
            false
        }
    }

    /// Exclusive-lock current rows regardless of visibility; returns the ids
    /// that have no row at all, in ascending order.
    pub(crate) fn lock_rows_exclusive(
        &mut self,
        obj_type: ObjectType,
        ids: &[ObjectId],
    ) -> Vec<ObjectId> {
        let mut missing = Vec::new();
        for &id in ids {
            if self.row_exists(obj_type, id) {
                self.locks.lock_element(obj_type, id, LockMode::Exclusive);
            } else {
                missing.push(id);
            }
        }
        missing.sort_unstable();
        missing.dedup();
        missing
    }

    /// Share-lock current rows that are visible; returns the ids that are
    /// missing or invisible, in ascending order.
    pub(crate) fn lock_rows_share_visible(
        &mut self,
        obj_type: ObjectType,
        ids: &[ObjectId],
    ) -> Vec<ObjectId> {
        let mut absent = Vec::new();
        for &id in ids {
            if self.row_visible(obj_type, id) {
                self.locks.lock_element(obj_type, id, LockMode::Share);
            } else {
                absent.push(id);
            }
        }
        absent.sort_unstable();
        absent.dedup();
        absent
    }

    fn row_exists(&self, obj_type: ObjectType, id: ObjectId) -> bool {
        match obj_type {
            ObjectType::Node => self.work.nodes.contains_key(&id),
            ObjectType::Way => self.work.ways.contains_key(&id),
            ObjectType::Relation => self.work.relations.contains_key(&id),
        }
    }

    fn row_visible(&self, obj_type: ObjectType, id: ObjectId) -> bool {
        match obj_type {
            ObjectType::Node => self.work.nodes.get(&id).is_some_and(|r| r.visible),
            ObjectType::Way => self.work.ways.get(&id).is_some_and(|r| r.visible),
            ObjectType::Relation => self.work.relations.get(&id).is_some_and(|r| r.visible),
        }
    }

    // ======================================================================
    // Reference scans
    // ======================================================================

    /// Visible ways whose node list contains `node_id`.
    pub(crate) fn ways_referencing_node(&self, node_id: ObjectId) -> BTreeSet<ObjectId> {
        self.work
            .ways
            .values()
            .filter(|way| way.visible && way.nodes.contains(&node_id))
            .map(|way| way.id)
            .collect()
    }

    /// Visible relations with a member of the given type and id.
    pub(crate) fn relations_referencing(
        &self,
        member_type: ObjectType,
        member_id: ObjectId,
    ) -> BTreeSet<ObjectId> {
        self.work
            .relations
            .values()
            .filter(|rel| {
                rel.visible
                    && rel
                        .members
                        .iter()
                        .any(|m| m.member_type == member_type && m.member_id == member_id)
            })
            .map(|rel| rel.id)
            .collect()
    }

    /// Relation-typed member ids of one visible relation.
    pub(crate) fn relation_member_relations(&self, id: ObjectId) -> BTreeSet<ObjectId> {
        self.work
            .relations
            .get(&id)
            .map(|rel| {
                rel.members
                    .iter()
                    .filter(|m| m.member_type == ObjectType::Relation)
                    .map(|m| m.member_id)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn history_source_missing(obj_type: ObjectType, id: ObjectId) -> UploadError {
    UploadError::internal(
        ErrorOrigin::Store,
        format!("cannot copy {obj_type} {id} to history: current row missing"),
    )
}
