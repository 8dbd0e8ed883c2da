use crate::{
    db::Transaction,
    element::{Node, Relation, Way},
    error::{ErrorOrigin, UploadError},
    parser::ParserCallback,
    tracker::ChangeTracker,
    updater::{NodeUpdater, RelationUpdater, WayUpdater},
};
use meridian_primitives::{Bbox, ChangesetId, Operation, SignedObjectId, Version};
use tracing::debug;

///
/// OsmChangeHandler
///
/// Parser callback that batches entities by (operation, type) and flushes
/// each batch to the right updater when the incoming stream switches state.
/// Creates flush in node, way, relation order so later batches can resolve
/// placeholder references; deletes flush dependents before dependencies;
/// all modifies share one state because member updates may point at
/// anything created earlier in the document.
///

pub struct OsmChangeHandler<'a, 'db> {
    txn: &'a mut Transaction<'db>,
    tracker: &'a mut ChangeTracker,
    changeset: ChangesetId,
    current_state: State,
    node_updater: NodeUpdater,
    way_updater: WayUpdater,
    relation_updater: RelationUpdater,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    Initial,
    CreateNode,
    CreateWay,
    CreateRelation,
    Modify,
    DeleteNode,
    DeleteWay,
    DeleteRelation,
    Finished,
}

impl<'a, 'db> OsmChangeHandler<'a, 'db> {
    pub fn new(
        txn: &'a mut Transaction<'db>,
        tracker: &'a mut ChangeTracker,
        changeset: ChangesetId,
    ) -> Self {
        Self {
            txn,
            tracker,
            changeset,
            current_state: State::Initial,
            node_updater: NodeUpdater::new(),
            way_updater: WayUpdater::new(),
            relation_updater: RelationUpdater::new(),
        }
    }

    /// Number of changes the upload performed across all updaters.
    #[must_use]
    pub fn get_num_changes(&self) -> u32 {
        self.tracker.num_changes()
    }

    /// Union of the per-updater bounding boxes.
    #[must_use]
    pub fn get_bbox(&self) -> Bbox {
        let mut bbox = Bbox::default();
        bbox.expand(self.node_updater.bbox());
        bbox.expand(self.way_updater.bbox());
        bbox.expand(self.relation_updater.bbox());
        bbox
    }

    // every entity must name the changeset from the request URL
    fn check_changeset(&self, changeset: Option<ChangesetId>) -> Result<(), UploadError> {
        let provided = changeset.unwrap_or(0);
        if provided == self.changeset {
            Ok(())
        } else {
            Err(UploadError::conflict(
                ErrorOrigin::Handler,
                format!(
                    "Changeset mismatch: Provided {provided} but only {} is allowed",
                    self.changeset
                ),
            ))
        }
    }

    fn handle_new_state(&mut self, new_state: State) -> Result<(), UploadError> {
        if new_state == self.current_state {
            return Ok(());
        }

        debug!(from = ?self.current_state, to = ?new_state, "handler state transition");

        // flush the batch buffered for the state we are leaving
        match self.current_state {
            State::Initial | State::Finished => {}
            State::CreateNode => self.node_updater.process_new_nodes(self.txn, self.tracker)?,
            State::CreateWay => self.way_updater.process_new_ways(self.txn, self.tracker)?,
            State::CreateRelation => self
                .relation_updater
                .process_new_relations(self.txn, self.tracker)?,
            State::Modify => {
                self.node_updater
                    .process_modify_nodes(self.txn, self.tracker)?;
                self.way_updater
                    .process_modify_ways(self.txn, self.tracker)?;
                self.relation_updater
                    .process_modify_relations(self.txn, self.tracker)?;
            }
            State::DeleteNode => self
                .node_updater
                .process_delete_nodes(self.txn, self.tracker)?,
            State::DeleteWay => self.way_updater.process_delete_ways(self.txn, self.tracker)?,
            State::DeleteRelation => self
                .relation_updater
                .process_delete_relations(self.txn, self.tracker)?,
        }

        self.current_state = new_state;
        Ok(())
    }

    fn require<T>(value: Option<T>, what: &str) -> Result<T, UploadError> {
        value.ok_or_else(|| {
            UploadError::internal(
                ErrorOrigin::Handler,
                format!("incomplete entity reached the handler: missing {what}"),
            )
        })
    }

    fn require_id(id: Option<SignedObjectId>) -> Result<SignedObjectId, UploadError> {
        Self::require(id, "id")
    }

    fn require_version(version: Option<Version>) -> Result<Version, UploadError> {
        Self::require(version, "version")
    }
}

impl ParserCallback for OsmChangeHandler<'_, '_> {
    fn start_document(&mut self) -> Result<(), UploadError> {
        Ok(())
    }

    fn end_document(&mut self) -> Result<(), UploadError> {
        self.handle_new_state(State::Finished)
    }

    fn process_node(
        &mut self,
        node: &Node,
        op: Operation,
        if_unused: bool,
    ) -> Result<(), UploadError> {
        self.check_changeset(node.core().changeset())?;

        let id = Self::require_id(node.core().id())?;

        match op {
            Operation::Create => {
                self.handle_new_state(State::CreateNode)?;
                self.node_updater.add_node(
                    Self::require(node.lat(), "lat")?,
                    Self::require(node.lon(), "lon")?,
                    self.changeset,
                    id,
                    node.core().tags(),
                    self.tracker,
                );
            }
            Operation::Modify => {
                self.handle_new_state(State::Modify)?;
                self.node_updater.modify_node(
                    Self::require(node.lat(), "lat")?,
                    Self::require(node.lon(), "lon")?,
                    self.changeset,
                    id,
                    Self::require_version(node.core().version())?,
                    node.core().tags(),
                    self.tracker,
                );
            }
            Operation::Delete => {
                self.handle_new_state(State::DeleteNode)?;
                self.node_updater.delete_node(
                    self.changeset,
                    id,
                    Self::require_version(node.core().version())?,
                    if_unused,
                    self.tracker,
                );
            }
        }

        Ok(())
    }

    fn process_way(&mut self, way: &Way, op: Operation, if_unused: bool) -> Result<(), UploadError> {
        self.check_changeset(way.core().changeset())?;

        let id = Self::require_id(way.core().id())?;

        match op {
            Operation::Create => {
                self.handle_new_state(State::CreateWay)?;
                self.way_updater.add_way(
                    self.changeset,
                    id,
                    way.nodes(),
                    way.core().tags(),
                    self.tracker,
                );
            }
            Operation::Modify => {
                self.handle_new_state(State::Modify)?;
                self.way_updater.modify_way(
                    self.changeset,
                    id,
                    Self::require_version(way.core().version())?,
                    way.nodes(),
                    way.core().tags(),
                    self.tracker,
                );
            }
            Operation::Delete => {
                self.handle_new_state(State::DeleteWay)?;
                self.way_updater.delete_way(
                    self.changeset,
                    id,
                    Self::require_version(way.core().version())?,
                    if_unused,
                    self.tracker,
                );
            }
        }

        Ok(())
    }

    fn process_relation(
        &mut self,
        relation: &Relation,
        op: Operation,
        if_unused: bool,
    ) -> Result<(), UploadError> {
        self.check_changeset(relation.core().changeset())?;

        let id = Self::require_id(relation.core().id())?;

        match op {
            Operation::Create => {
                self.handle_new_state(State::CreateRelation)?;
                self.relation_updater.add_relation(
                    self.changeset,
                    id,
                    relation.members(),
                    relation.core().tags(),
                    self.tracker,
                );
            }
            Operation::Modify => {
                self.handle_new_state(State::Modify)?;
                self.relation_updater.modify_relation(
                    self.changeset,
                    id,
                    Self::require_version(relation.core().version())?,
                    relation.members(),
                    relation.core().tags(),
                    self.tracker,
                );
            }
            Operation::Delete => {
                self.handle_new_state(State::DeleteRelation)?;
                self.relation_updater.delete_relation(
                    self.changeset,
                    id,
                    Self::require_version(relation.core().version())?,
                    if_unused,
                    self.tracker,
                );
            }
        }

        Ok(())
    }
}
