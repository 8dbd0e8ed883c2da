use crate::db::{ChangesetRow, HistoryRow, NodeRow, RelationRow, Transaction, WayRow};
use meridian_primitives::{ChangesetId, ObjectId, Version};
use std::collections::BTreeMap;

///
/// Sequences
///
/// Monotonic id allocators, one per table with server-assigned ids.
///

#[derive(Clone, Debug)]
pub(crate) struct Sequences {
    pub(crate) next_node: ObjectId,
    pub(crate) next_way: ObjectId,
    pub(crate) next_relation: ObjectId,
    pub(crate) next_changeset: ChangesetId,
}

impl Default for Sequences {
    fn default() -> Self {
        Self {
            next_node: 1,
            next_way: 1,
            next_relation: 1,
            next_changeset: 1,
        }
    }
}

///
/// DatabaseState
///
/// The complete logical content of the store. Cloneable so a transaction
/// can work on a private snapshot.
///

#[derive(Clone, Debug, Default)]
pub struct DatabaseState {
    pub(crate) nodes: BTreeMap<ObjectId, NodeRow>,
    pub(crate) ways: BTreeMap<ObjectId, WayRow>,
    pub(crate) relations: BTreeMap<ObjectId, RelationRow>,

    pub(crate) node_history: BTreeMap<(ObjectId, Version), HistoryRow<NodeRow>>,
    pub(crate) way_history: BTreeMap<(ObjectId, Version), HistoryRow<WayRow>>,
    pub(crate) relation_history: BTreeMap<(ObjectId, Version), HistoryRow<RelationRow>>,

    pub(crate) changesets: BTreeMap<ChangesetId, ChangesetRow>,

    pub(crate) sequences: Sequences,
}

///
/// Database
///
/// Owner of the committed state. All mutation goes through [`Transaction`];
/// the accessors below expose committed rows for callers and tests.
///

#[derive(Debug, Default)]
pub struct Database {
    pub(crate) state: DatabaseState,
}

impl Database {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a transaction over a snapshot of the current state.
    pub fn begin(&mut self) -> Transaction<'_> {
        Transaction::new(self)
    }

    // ======================================================================
    // Committed-state accessors
    // ======================================================================

    #[must_use]
    pub fn node(&self, id: ObjectId) -> Option<&NodeRow> {
        self.state.nodes.get(&id)
    }

    #[must_use]
    pub fn way(&self, id: ObjectId) -> Option<&WayRow> {
        self.state.ways.get(&id)
    }

    #[must_use]
    pub fn relation(&self, id: ObjectId) -> Option<&RelationRow> {
        self.state.relations.get(&id)
    }

    #[must_use]
    pub fn changeset(&self, id: ChangesetId) -> Option<&ChangesetRow> {
        self.state.changesets.get(&id)
    }

    /// All history rows for one node, ordered by version.
    pub fn node_history(&self, id: ObjectId) -> impl Iterator<Item = &HistoryRow<NodeRow>> {
        self.state
            .node_history
            .range((id, Version::MIN)..=(id, Version::MAX))
            .map(|(_, row)| row)
    }

    /// All history rows for one way, ordered by version.
    pub fn way_history(&self, id: ObjectId) -> impl Iterator<Item = &HistoryRow<WayRow>> {
        self.state
            .way_history
            .range((id, Version::MIN)..=(id, Version::MAX))
            .map(|(_, row)| row)
    }

    /// All history rows for one relation, ordered by version.
    pub fn relation_history(
        &self,
        id: ObjectId,
    ) -> impl Iterator<Item = &HistoryRow<RelationRow>> {
        self.state
            .relation_history
            .range((id, Version::MIN)..=(id, Version::MAX))
            .map(|(_, row)| row)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.state.nodes.len()
    }

    #[must_use]
    pub fn way_count(&self) -> usize {
        self.state.ways.len()
    }

    #[must_use]
    pub fn relation_count(&self) -> usize {
        self.state.relations.len()
    }
}
