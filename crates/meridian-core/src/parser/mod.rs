//! osmChange front-ends. Both encodings stream entities into the same
//! [`ParserCallback`], so the handler and its tests can be driven without
//! any wire format involved.

mod json;
#[cfg(test)]
mod tests;
mod xml;

pub use json::*;
pub use xml::*;

use crate::{
    element::{ElementCore, Node, Relation, Way, payload_error},
    error::UploadError,
};
use meridian_primitives::Operation;

///
/// ParserCallback
///
/// Receiver for the typed entity stream produced by the parsers.
/// `if_unused` is only ever `true` for delete operations.
///

pub trait ParserCallback {
    fn start_document(&mut self) -> Result<(), UploadError>;

    fn end_document(&mut self) -> Result<(), UploadError>;

    fn process_node(
        &mut self,
        node: &Node,
        op: Operation,
        if_unused: bool,
    ) -> Result<(), UploadError>;

    fn process_way(&mut self, way: &Way, op: Operation, if_unused: bool)
    -> Result<(), UploadError>;

    fn process_relation(
        &mut self,
        relation: &Relation,
        op: Operation,
        if_unused: bool,
    ) -> Result<(), UploadError>;
}

/// Common attribute checks once an entity has been fully populated: id and
/// changeset are mandatory, create forces version 0, modify/delete require a
/// positive version, and a delete may only carry `visible="false"`.
pub(crate) fn check_common_attributes(
    core: &mut ElementCore,
    op: Operation,
) -> Result<(), UploadError> {
    if core.id().is_none() {
        return Err(payload_error("Mandatory field id missing in object"));
    }

    if core.changeset().is_none() {
        return Err(payload_error(format!(
            "Changeset id is missing for {}",
            core.label()
        )));
    }

    match op {
        Operation::Create => {
            // version is not mandatory on create and always overridden
            core.set_version(0)?;
        }
        Operation::Modify | Operation::Delete => {
            let Some(version) = core.version() else {
                return Err(payload_error(format!(
                    "Version is required when updating {}",
                    core.label()
                )));
            };
            if version < 1 {
                return Err(payload_error(format!(
                    "Invalid version number {version} in {}",
                    core.label()
                )));
            }
        }
    }

    if op == Operation::Delete && core.visible() == Some(true) {
        return Err(payload_error(format!(
            "Visible attribute may only be false when deleting {}",
            core.label()
        )));
    }

    Ok(())
}
