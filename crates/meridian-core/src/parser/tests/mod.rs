mod xml;

use crate::{
    config::UploadLimits,
    element::{Node, Relation, Way},
    error::UploadError,
    parser::{OsmChangeJsonParser, OsmChangeXmlParser, ParserCallback},
};
use meridian_primitives::Operation;

///
/// RecordingCallback
///
/// Captures the typed entity stream so the tests can assert on exactly
/// what the parsers dispatched.
///

#[derive(Default, Debug)]
pub(crate) struct RecordingCallback {
    pub start_executed: bool,
    pub end_executed: bool,
    pub nodes: Vec<(Node, Operation, bool)>,
    pub ways: Vec<(Way, Operation, bool)>,
    pub relations: Vec<(Relation, Operation, bool)>,
}

impl RecordingCallback {
    pub fn element_count(&self) -> usize {
        self.nodes.len() + self.ways.len() + self.relations.len()
    }
}

impl ParserCallback for RecordingCallback {
    fn start_document(&mut self) -> Result<(), UploadError> {
        self.start_executed = true;
        Ok(())
    }

    fn end_document(&mut self) -> Result<(), UploadError> {
        self.end_executed = true;
        Ok(())
    }

    fn process_node(
        &mut self,
        node: &Node,
        op: Operation,
        if_unused: bool,
    ) -> Result<(), UploadError> {
        self.nodes.push((node.clone(), op, if_unused));
        Ok(())
    }

    fn process_way(
        &mut self,
        way: &Way,
        op: Operation,
        if_unused: bool,
    ) -> Result<(), UploadError> {
        self.ways.push((way.clone(), op, if_unused));
        Ok(())
    }

    fn process_relation(
        &mut self,
        relation: &Relation,
        op: Operation,
        if_unused: bool,
    ) -> Result<(), UploadError> {
        self.relations.push((relation.clone(), op, if_unused));
        Ok(())
    }
}

pub(crate) fn parse_xml(payload: &str) -> Result<RecordingCallback, UploadError> {
    parse_xml_limits(payload, &UploadLimits::default())
}

pub(crate) fn parse_xml_limits(
    payload: &str,
    limits: &UploadLimits,
) -> Result<RecordingCallback, UploadError> {
    let mut callback = RecordingCallback::default();
    OsmChangeXmlParser::new(&mut callback, limits).parse(payload.as_bytes())?;
    Ok(callback)
}

pub(crate) fn parse_json(payload: &str) -> Result<RecordingCallback, UploadError> {
    parse_json_limits(payload, &UploadLimits::default())
}

pub(crate) fn parse_json_limits(
    payload: &str,
    limits: &UploadLimits,
) -> Result<RecordingCallback, UploadError> {
    let mut callback = RecordingCallback::default();
    OsmChangeJsonParser::new(&mut callback, limits).parse(payload.as_bytes())?;
    Ok(callback)
}
