use meridian_primitives::{ObjectId, ObjectType, Operation, SignedObjectId, Version};

///
/// IdMapping
///
/// Outcome of one create/modify/skip for a single element: the wire id the
/// client used, the persisted id, and the version the element now carries.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IdMapping {
    pub old_id: SignedObjectId,
    pub new_id: ObjectId,
    pub new_version: Version,
}

///
/// OrigEntry
///
/// One parsed entity in document order; the sole source of truth for
/// diffResult ordering.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OrigEntry {
    pub op: Operation,
    pub obj_type: ObjectType,
    pub orig_id: SignedObjectId,
    pub orig_version: Version,
    pub if_unused: bool,
}

///
/// ChangeTracker
///
/// Per-upload record of everything the updaters did. Created mappings are
/// kept per type for placeholder resolution; skip-deleted entries capture
/// if-unused deletes that were bypassed.
///

#[derive(Debug, Default)]
pub struct ChangeTracker {
    pub created_node_ids: Vec<IdMapping>,
    pub created_way_ids: Vec<IdMapping>,
    pub created_relation_ids: Vec<IdMapping>,

    pub modified_node_ids: Vec<IdMapping>,
    pub modified_way_ids: Vec<IdMapping>,
    pub modified_relation_ids: Vec<IdMapping>,

    pub deleted_node_ids: Vec<SignedObjectId>,
    pub deleted_way_ids: Vec<SignedObjectId>,
    pub deleted_relation_ids: Vec<SignedObjectId>,

    pub skip_deleted_node_ids: Vec<IdMapping>,
    pub skip_deleted_way_ids: Vec<IdMapping>,
    pub skip_deleted_relation_ids: Vec<IdMapping>,

    pub orig_sequence: Vec<OrigEntry>,
}

impl ChangeTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one parsed entity in document order.
    pub fn push_sequence_entry(
        &mut self,
        op: Operation,
        obj_type: ObjectType,
        orig_id: SignedObjectId,
        orig_version: Version,
        if_unused: bool,
    ) {
        self.orig_sequence.push(OrigEntry {
            op,
            obj_type,
            orig_id,
            orig_version,
            if_unused,
        });
    }

    #[must_use]
    pub fn created_for(&self, obj_type: ObjectType) -> &[IdMapping] {
        match obj_type {
            ObjectType::Node => &self.created_node_ids,
            ObjectType::Way => &self.created_way_ids,
            ObjectType::Relation => &self.created_relation_ids,
        }
    }

    #[must_use]
    pub fn modified_for(&self, obj_type: ObjectType) -> &[IdMapping] {
        match obj_type {
            ObjectType::Node => &self.modified_node_ids,
            ObjectType::Way => &self.modified_way_ids,
            ObjectType::Relation => &self.modified_relation_ids,
        }
    }

    #[must_use]
    pub fn deleted_for(&self, obj_type: ObjectType) -> &[SignedObjectId] {
        match obj_type {
            ObjectType::Node => &self.deleted_node_ids,
            ObjectType::Way => &self.deleted_way_ids,
            ObjectType::Relation => &self.deleted_relation_ids,
        }
    }

    #[must_use]
    pub fn skip_deleted_for(&self, obj_type: ObjectType) -> &[IdMapping] {
        match obj_type {
            ObjectType::Node => &self.skip_deleted_node_ids,
            ObjectType::Way => &self.skip_deleted_way_ids,
            ObjectType::Relation => &self.skip_deleted_relation_ids,
        }
    }

    /// Total number of changes the upload performed; skipped deletes do not
    /// count.
    #[must_use]
    pub fn num_changes(&self) -> u32 {
        let total = self.created_node_ids.len()
            + self.created_way_ids.len()
            + self.created_relation_ids.len()
            + self.modified_node_ids.len()
            + self.modified_way_ids.len()
            + self.modified_relation_ids.len()
            + self.deleted_node_ids.len()
            + self.deleted_way_ids.len()
            + self.deleted_relation_ids.len();

        u32::try_from(total).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn num_changes_ignores_skipped_deletes() {
        let mut tracker = ChangeTracker::new();
        tracker.created_node_ids.push(IdMapping {
            old_id: -1,
            new_id: 1,
            new_version: 1,
        });
        tracker.deleted_way_ids.push(7);
        tracker.skip_deleted_node_ids.push(IdMapping {
            old_id: 5,
            new_id: 5,
            new_version: 2,
        });

        assert_eq!(tracker.num_changes(), 2);
    }

    #[test]
    fn sequence_entries_keep_document_order() {
        let mut tracker = ChangeTracker::new();
        tracker.push_sequence_entry(Operation::Create, ObjectType::Node, -1, 0, false);
        tracker.push_sequence_entry(Operation::Delete, ObjectType::Way, 9, 3, true);

        assert_eq!(tracker.orig_sequence.len(), 2);
        assert_eq!(tracker.orig_sequence[0].orig_id, -1);
        assert!(tracker.orig_sequence[1].if_unused);
    }
}
