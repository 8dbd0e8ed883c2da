use crate::{
    config::UploadLimits,
    element::{ElementCore, parse_integer, payload_error},
    error::{ErrorOrigin, UploadError},
};
use meridian_primitives::{ObjectType, Operation, SignedObjectId};

///
/// Way
///
/// Parse-time way: the common element attributes plus the ordered node
/// reference list. References may be negative placeholders.
///

#[derive(Clone, Debug)]
pub struct Way {
    core: ElementCore,
    nodes: Vec<SignedObjectId>,
}

impl Default for Way {
    fn default() -> Self {
        Self::new()
    }
}

impl Way {
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: ElementCore::new(ObjectType::Way),
            nodes: Vec::new(),
        }
    }

    #[must_use]
    pub const fn core(&self) -> &ElementCore {
        &self.core
    }

    pub const fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    #[must_use]
    pub fn nodes(&self) -> &[SignedObjectId] {
        &self.nodes
    }

    pub fn add_node(&mut self, node_ref: SignedObjectId) -> Result<(), UploadError> {
        if node_ref == 0 {
            return Err(payload_error("Way node value may not be 0"));
        }
        self.nodes.push(node_ref);
        Ok(())
    }

    pub fn add_node_str(&mut self, node_ref: &str) -> Result<(), UploadError> {
        let value = parse_integer(
            node_ref,
            "Way node is not numeric",
            "Way node value is too large",
        )?;
        self.add_node(value)
    }

    /// Operation-specific completeness; the node-list size rules only apply
    /// to create and modify.
    pub fn is_valid(&self, op: Operation, limits: &UploadLimits) -> Result<bool, UploadError> {
        self.core.check_core(limits)?;

        if op == Operation::Delete {
            return Ok(self.core.is_complete());
        }

        if self.nodes.is_empty() {
            return Err(UploadError::precondition_failed(
                ErrorOrigin::Element,
                format!("Way {} must have at least one node", self.core.id_or(0)),
            ));
        }

        if self.nodes.len() > limits.way_max_nodes as usize {
            return Err(payload_error(format!(
                "You tried to add {} nodes to way {}, however only {} are allowed",
                self.nodes.len(),
                self.core.id_or(0),
                limits.way_max_nodes
            )));
        }

        Ok(self.core.is_complete())
    }
}
