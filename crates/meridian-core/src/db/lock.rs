use meridian_primitives::{ChangesetId, ObjectId, ObjectType};
use std::collections::{BTreeMap, BTreeSet};

///
/// LockMode
///

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum LockMode {
    Share,
    Exclusive,
}

///
/// LockSet
///
/// Row-lock bookkeeping for one transaction. The exclusive `&mut Database`
/// borrow already serializes writers; the set preserves the locking
/// discipline of the updaters (exclusive on targets, share on referenced
/// members, never downgrade) and makes it observable to tests.
///

#[derive(Debug, Default)]
pub struct LockSet {
    changesets: BTreeSet<ChangesetId>,
    elements: BTreeMap<(ObjectType, ObjectId), LockMode>,
}

impl LockSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock_changeset(&mut self, id: ChangesetId) {
        self.changesets.insert(id);
    }

    /// Record a row lock. Share requests against an exclusively locked row
    /// are no-ops; exclusive requests upgrade an existing share lock.
    pub(crate) fn lock_element(&mut self, obj_type: ObjectType, id: ObjectId, mode: LockMode) {
        self.elements
            .entry((obj_type, id))
            .and_modify(|held| {
                if *held < mode {
                    *held = mode;
                }
            })
            .or_insert(mode);
    }

    #[must_use]
    pub fn holds_changeset(&self, id: ChangesetId) -> bool {
        self.changesets.contains(&id)
    }

    #[must_use]
    pub fn element_mode(&self, obj_type: ObjectType, id: ObjectId) -> Option<LockMode> {
        self.elements.get(&(obj_type, id)).copied()
    }

    #[must_use]
    pub fn is_exclusive(&self, obj_type: ObjectType, id: ObjectId) -> bool {
        self.element_mode(obj_type, id) == Some(LockMode::Exclusive)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.changesets.is_empty()
    }
}
