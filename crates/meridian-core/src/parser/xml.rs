use crate::{
    config::UploadLimits,
    element::{Element, ElementCore, Member},
    error::{ErrorKind, ErrorOrigin, UploadError},
    parser::{ParserCallback, check_common_attributes},
};
use meridian_primitives::{ObjectType, Operation};
use xml::attribute::OwnedAttribute;
use xml::common::{Position, TextPosition};
use xml::reader::{ParserConfig, XmlEvent};

///
/// OsmChangeXmlParser
///
/// Streaming XML front-end. A context stack tracks where in the document
/// the parser is; entities are validated and dispatched to the callback on
/// their end tag. All failures surface as BadRequest with the input
/// line/column appended.
///

pub struct OsmChangeXmlParser<'a> {
    callback: &'a mut dyn ParserCallback,
    limits: &'a UploadLimits,
    context: Vec<Context>,
    operation: Option<Operation>,
    if_unused: bool,
    current: Option<Element>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Context {
    Root,
    Top,
    InCreate,
    InModify,
    InDelete,
    Node,
    Way,
    Relation,
    InObject,
}

impl<'a> OsmChangeXmlParser<'a> {
    pub fn new(callback: &'a mut dyn ParserCallback, limits: &'a UploadLimits) -> Self {
        Self {
            callback,
            limits,
            context: vec![Context::Root],
            operation: None,
            if_unused: false,
            current: None,
        }
    }

    /// Parse a complete osmChange payload, driving the callback.
    pub fn parse(mut self, payload: &[u8]) -> Result<(), UploadError> {
        let mut reader = ParserConfig::new()
            .trim_whitespace(true)
            .ignore_comments(true)
            .cdata_to_characters(true)
            .create_reader(payload);

        loop {
            match reader.next() {
                Ok(XmlEvent::StartElement {
                    name, attributes, ..
                }) => {
                    let pos = reader.position();
                    self.start_element(&name.local_name, &attributes)
                        .map_err(|err| with_location(err, pos))?;
                }
                Ok(XmlEvent::EndElement { name }) => {
                    let pos = reader.position();
                    self.end_element(&name.local_name)
                        .map_err(|err| with_location(err, pos))?;
                }
                Ok(XmlEvent::EndDocument) => break,
                Ok(_) => {}
                Err(err) => {
                    return Err(UploadError::bad_request(ErrorOrigin::Parser, err.to_string()));
                }
            }
        }

        Ok(())
    }

    fn start_element(
        &mut self,
        element: &str,
        attributes: &[OwnedAttribute],
    ) -> Result<(), UploadError> {
        match self.context_top() {
            Context::Root => {
                if element == "osmChange" {
                    self.callback.start_document()?;
                } else {
                    return Err(parse_error(format!(
                        "Unknown top-level element {element}, expecting osmChange"
                    )));
                }
                self.context.push(Context::Top);
            }

            Context::Top => match element {
                "create" => {
                    self.context.push(Context::InCreate);
                    self.operation = Some(Operation::Create);
                }
                "modify" => {
                    self.context.push(Context::InModify);
                    self.operation = Some(Operation::Modify);
                }
                "delete" => {
                    // presence of the attribute is what counts, not its value
                    self.if_unused = attr(attributes, "if-unused").is_some();
                    self.context.push(Context::InDelete);
                    self.operation = Some(Operation::Delete);
                }
                _ => {
                    return Err(parse_error(format!(
                        "Unknown action {element}, choices are create, modify, delete"
                    )));
                }
            },

            Context::InCreate | Context::InModify | Context::InDelete => match element {
                "node" => {
                    let mut node = Element::new(ObjectType::Node);
                    self.init_object(node.core_mut(), attributes)?;
                    if let Element::Node(ref mut n) = node {
                        if let Some(lat) = attr(attributes, "lat") {
                            n.set_lat_str(lat)?;
                        }
                        if let Some(lon) = attr(attributes, "lon") {
                            n.set_lon_str(lon)?;
                        }
                    }
                    self.current = Some(node);
                    self.context.push(Context::Node);
                }
                "way" => {
                    let mut way = Element::new(ObjectType::Way);
                    self.init_object(way.core_mut(), attributes)?;
                    self.current = Some(way);
                    self.context.push(Context::Way);
                }
                "relation" => {
                    let mut relation = Element::new(ObjectType::Relation);
                    self.init_object(relation.core_mut(), attributes)?;
                    self.current = Some(relation);
                    self.context.push(Context::Relation);
                }
                _ => {
                    return Err(parse_error(format!(
                        "Unknown element {element}, expecting node, way or relation"
                    )));
                }
            },

            Context::Node => {
                self.context.push(Context::InObject);
                if element == "tag" {
                    self.add_tag(attributes)?;
                }
            }

            Context::Way => {
                self.context.push(Context::InObject);
                if element == "nd" {
                    let Element::Way(way) = self.active()? else {
                        return Err(out_of_sync());
                    };
                    match attr(attributes, "ref") {
                        Some(node_ref) => way.add_node_str(node_ref)?,
                        None => {
                            let label = way.core().label();
                            return Err(parse_error(format!(
                                "Missing mandatory ref field on way node {label}"
                            )));
                        }
                    }
                } else if element == "tag" {
                    self.add_tag(attributes)?;
                }
            }

            Context::Relation => {
                self.context.push(Context::InObject);
                if element == "member" {
                    let mut member = Member::default();
                    if let Some(member_type) = attr(attributes, "type") {
                        member.set_type(member_type)?;
                    }
                    if let Some(member_ref) = attr(attributes, "ref") {
                        member.set_ref_str(member_ref)?;
                    }
                    if let Some(role) = attr(attributes, "role") {
                        member.set_role(role.to_owned())?;
                    }

                    let Element::Relation(relation) = self.active()? else {
                        return Err(out_of_sync());
                    };
                    relation.add_member(member)?;
                } else if element == "tag" {
                    self.add_tag(attributes)?;
                }
            }

            Context::InObject => {
                return Err(parse_error("xml file nested too deep"));
            }
        }

        Ok(())
    }

    fn end_element(&mut self, _element: &str) -> Result<(), UploadError> {
        match self.context_top() {
            Context::Root => Err(out_of_sync()),

            Context::Top => {
                self.context.pop();
                self.operation = None;
                self.callback.end_document()
            }

            Context::InCreate | Context::InModify => {
                self.context.pop();
                self.operation = None;
                Ok(())
            }

            Context::InDelete => {
                self.context.pop();
                self.operation = None;
                self.if_unused = false;
                Ok(())
            }

            Context::Node => {
                let op = self.operation()?;
                let Some(Element::Node(node)) = self.current.take() else {
                    return Err(out_of_sync());
                };
                if !node.is_valid(op, self.limits)? {
                    return Err(parse_error(format!(
                        "{} does not include all mandatory fields",
                        node.core().label()
                    )));
                }
                self.callback.process_node(&node, op, self.if_unused)?;
                self.context.pop();
                Ok(())
            }

            Context::Way => {
                let op = self.operation()?;
                let Some(Element::Way(way)) = self.current.take() else {
                    return Err(out_of_sync());
                };
                if !way.is_valid(op, self.limits)? {
                    return Err(parse_error(format!(
                        "{} does not include all mandatory fields",
                        way.core().label()
                    )));
                }
                self.callback.process_way(&way, op, self.if_unused)?;
                self.context.pop();
                Ok(())
            }

            Context::Relation => {
                let op = self.operation()?;
                let Some(Element::Relation(relation)) = self.current.take() else {
                    return Err(out_of_sync());
                };
                if !relation.is_valid(op, self.limits)? {
                    return Err(parse_error(format!(
                        "{} does not include all mandatory fields",
                        relation.core().label()
                    )));
                }
                self.callback.process_relation(&relation, op, self.if_unused)?;
                self.context.pop();
                Ok(())
            }

            Context::InObject => {
                self.context.pop();
                Ok(())
            }
        }
    }

    fn init_object(
        &mut self,
        core: &mut ElementCore,
        attributes: &[OwnedAttribute],
    ) -> Result<(), UploadError> {
        if let Some(id) = attr(attributes, "id") {
            core.set_id_str(id)?;
        }
        if let Some(changeset) = attr(attributes, "changeset") {
            core.set_changeset_str(changeset)?;
        }
        if let Some(version) = attr(attributes, "version") {
            core.set_version_str(version)?;
        }
        if let Some(visible) = attr(attributes, "visible") {
            core.set_visible_str(visible)?;
        }
        // any other attribute is ignored

        check_common_attributes(core, self.operation()?)
    }

    fn add_tag(&mut self, attributes: &[OwnedAttribute]) -> Result<(), UploadError> {
        let k = attr(attributes, "k");
        let v = attr(attributes, "v");
        let core = self.active()?.core_mut();

        let Some(k) = k else {
            return Err(parse_error(format!(
                "Mandatory field k missing in tag element for {}",
                core.label()
            )));
        };
        let Some(v) = v else {
            return Err(parse_error(format!(
                "Mandatory field v missing in tag element for {}",
                core.label()
            )));
        };

        core.add_tag(k.to_owned(), v.to_owned())
    }

    fn active(&mut self) -> Result<&mut Element, UploadError> {
        self.current.as_mut().ok_or_else(out_of_sync)
    }

    fn operation(&self) -> Result<Operation, UploadError> {
        self.operation.ok_or_else(out_of_sync)
    }

    fn context_top(&self) -> Context {
        self.context.last().copied().unwrap_or(Context::Root)
    }
}

fn parse_error(message: impl Into<String>) -> UploadError {
    UploadError::bad_request(ErrorOrigin::Parser, message)
}

fn out_of_sync() -> UploadError {
    UploadError::internal(ErrorOrigin::Parser, "parser context out of sync")
}

fn attr<'x>(attributes: &'x [OwnedAttribute], name: &str) -> Option<&'x str> {
    attributes
        .iter()
        .find(|a| a.name.local_name == name)
        .map(|a| a.value.as_str())
}

// Parse failures carry the input location; semantic errors raised by the
// callback pass through untouched.
fn with_location(err: UploadError, pos: TextPosition) -> UploadError {
    match (err.kind, err.origin) {
        (ErrorKind::BadRequest, ErrorOrigin::Parser | ErrorOrigin::Element) => UploadError::new(
            err.kind,
            err.origin,
            format!(
                "{} at line {}, column {}",
                err.message,
                pos.row + 1,
                pos.column + 1
            ),
        ),
        _ => err,
    }
}
