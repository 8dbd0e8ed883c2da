use crate::{
    config::UploadLimits,
    element::{Member, Node, Relation, Way},
    error::{ErrorOrigin, UploadError},
    parser::{ParserCallback, check_common_attributes},
};
use meridian_primitives::Operation;
use serde_json::Value;

///
/// OsmChangeJsonParser
///
/// JSON front-end over a parsed document tree. The payload is an object
/// `{version, generator?, osmChange: [...]}`; unknown keys anywhere are
/// ignored for forward compatibility, while per-type key exclusivity
/// (lat/lon vs nodes vs members) is enforced.
///

pub struct OsmChangeJsonParser<'a> {
    callback: &'a mut dyn ParserCallback,
    limits: &'a UploadLimits,
}

impl<'a> OsmChangeJsonParser<'a> {
    pub fn new(callback: &'a mut dyn ParserCallback, limits: &'a UploadLimits) -> Self {
        Self { callback, limits }
    }

    /// Parse a complete osmChange JSON payload, driving the callback.
    pub fn parse(mut self, payload: &[u8]) -> Result<(), UploadError> {
        if payload.iter().all(u8::is_ascii_whitespace) {
            return Err(parse_error("Empty JSON payload"));
        }

        let doc: Value = serde_json::from_slice(payload)
            .map_err(|err| parse_error(err.to_string()))?;

        let Value::Object(root) = &doc else {
            return Err(parse_error("JSON payload root must be an object"));
        };

        self.check_version(root.get("version"))?;

        let elements = match root.get("osmChange") {
            Some(Value::Array(elements)) => elements,
            Some(_) => return Err(parse_error("osmChange attribute must be an array")),
            None => return Err(parse_error("Mandatory osmChange attribute is missing")),
        };

        if elements.is_empty() {
            return Err(parse_error("osmChange array is empty"));
        }

        self.callback.start_document()?;

        for element in elements {
            self.process_element(element)?;
        }

        self.callback.end_document()
    }

    fn check_version(&self, version: Option<&Value>) -> Result<(), UploadError> {
        match version {
            Some(Value::String(v)) if v == "0.6" => Ok(()),
            Some(Value::String(v)) => Err(parse_error(format!(
                r#"Unsupported version "{v}", expecting "0.6""#
            ))),
            Some(_) => Err(parse_error("Version attribute must be a string")),
            None => Err(parse_error("Mandatory version attribute is missing")),
        }
    }

    fn process_element(&mut self, element: &Value) -> Result<(), UploadError> {
        let Value::Object(obj) = element else {
            return Err(parse_error("osmChange element must be an object"));
        };

        let op = self.process_action(obj)?;
        let if_unused = self.process_if_unused(obj, op)?;

        let element_type = match obj.get("type") {
            Some(Value::String(t)) => t.as_str(),
            Some(_) => return Err(parse_error("Element type attribute must be a string")),
            None => {
                return Err(parse_error(
                    "Mandatory type attribute missing in osmChange element",
                ));
            }
        };

        match element_type {
            "node" => self.process_node(obj, op, if_unused, element_type),
            "way" => self.process_way(obj, op, if_unused, element_type),
            "relation" => self.process_relation(obj, op, if_unused, element_type),
            _ => Err(parse_error(format!(
                "Unknown element {element_type}, expecting node, way or relation"
            ))),
        }
    }

    fn process_action(
        &self,
        obj: &serde_json::Map<String, Value>,
    ) -> Result<Operation, UploadError> {
        let action = match obj.get("action") {
            Some(Value::String(a)) => a.as_str(),
            Some(_) => return Err(parse_error("Element action attribute must be a string")),
            None => {
                return Err(parse_error(
                    "Mandatory action attribute missing in osmChange element",
                ));
            }
        };

        match action {
            "create" => Ok(Operation::Create),
            "modify" => Ok(Operation::Modify),
            "delete" => Ok(Operation::Delete),
            _ => Err(parse_error(format!(
                "Unknown action {action}, choices are create, modify, delete"
            ))),
        }
    }

    fn process_if_unused(
        &self,
        obj: &serde_json::Map<String, Value>,
        op: Operation,
    ) -> Result<bool, UploadError> {
        match obj.get("if-unused") {
            None => Ok(false),
            Some(Value::Bool(flag)) => {
                if op == Operation::Delete {
                    Ok(*flag)
                } else {
                    Err(parse_error(format!(
                        "if-unused attribute is not allowed for {op} action"
                    )))
                }
            }
            Some(_) => Err(parse_error("if-unused attribute must be a boolean")),
        }
    }

    // ======================================================================
    // Per-type element processing
    // ======================================================================

    fn process_node(
        &mut self,
        obj: &serde_json::Map<String, Value>,
        op: Operation,
        if_unused: bool,
        element_type: &str,
    ) -> Result<(), UploadError> {
        self.reject_key(obj, "nodes", element_type, "has way nodes, but it is not a way")?;
        self.reject_key(
            obj,
            "members",
            element_type,
            "has relation members, but it is not a relation",
        )?;

        let mut node = Node::new();
        self.init_object(node.core_mut(), obj, op)?;

        if let Some(lat) = obj.get("lat") {
            node.set_lat(number_field(lat, "Latitude is not numeric")?)?;
        }
        if let Some(lon) = obj.get("lon") {
            node.set_lon(number_field(lon, "Longitude is not numeric")?)?;
        }

        self.process_tags(node.core_mut(), obj)?;

        if !node.is_valid(op, self.limits)? {
            return Err(parse_error(format!(
                "{} does not include all mandatory fields",
                node.core().label()
            )));
        }

        self.callback.process_node(&node, op, if_unused)
    }

    fn process_way(
        &mut self,
        obj: &serde_json::Map<String, Value>,
        op: Operation,
        if_unused: bool,
        element_type: &str,
    ) -> Result<(), UploadError> {
        self.reject_key(obj, "lat", element_type, "has lat, but it is not a node")?;
        self.reject_key(obj, "lon", element_type, "has lon, but it is not a node")?;
        self.reject_key(
            obj,
            "members",
            element_type,
            "has relation members, but it is not a relation",
        )?;

        let mut way = Way::new();
        self.init_object(way.core_mut(), obj, op)?;

        match obj.get("nodes") {
            Some(Value::Array(refs)) => {
                for node_ref in refs {
                    way.add_node(integer_field(
                        node_ref,
                        "Way node is not numeric",
                        "Way node value is too large",
                    )?)?;
                }
            }
            Some(_) => return Err(parse_error("nodes attribute must be an array")),
            None => {}
        }

        self.process_tags(way.core_mut(), obj)?;

        if !way.is_valid(op, self.limits)? {
            return Err(parse_error(format!(
                "{} does not include all mandatory fields",
                way.core().label()
            )));
        }

        self.callback.process_way(&way, op, if_unused)
    }

    fn process_relation(
        &mut self,
        obj: &serde_json::Map<String, Value>,
        op: Operation,
        if_unused: bool,
        element_type: &str,
    ) -> Result<(), UploadError> {
        self.reject_key(obj, "lat", element_type, "has lat, but it is not a node")?;
        self.reject_key(obj, "lon", element_type, "has lon, but it is not a node")?;
        self.reject_key(obj, "nodes", element_type, "has way nodes, but it is not a way")?;

        let mut relation = Relation::new();
        self.init_object(relation.core_mut(), obj, op)?;
        self.process_members(&mut relation, obj, op, element_type)?;
        self.process_tags(relation.core_mut(), obj)?;

        if !relation.is_valid(op, self.limits)? {
            return Err(parse_error(format!(
                "{} does not include all mandatory fields",
                relation.core().label()
            )));
        }

        self.callback.process_relation(&relation, op, if_unused)
    }

    // The member list attribute is mandatory for create and modify (an empty
    // array is fine); delete must not carry one.
    fn process_members(
        &mut self,
        relation: &mut Relation,
        obj: &serde_json::Map<String, Value>,
        op: Operation,
        element_type: &str,
    ) -> Result<(), UploadError> {
        if op == Operation::Delete {
            if obj.contains_key("members") {
                return Err(parse_error("members attribute is not allowed for delete action"));
            }
            return Ok(());
        }

        let members = match obj.get("members") {
            Some(Value::Array(members)) => members,
            Some(_) => return Err(parse_error("members attribute must be an array")),
            None => {
                return Err(parse_error(format!(
                    "Element {element_type}/{} has no relation member attribute",
                    element_id(obj)
                )));
            }
        };

        for entry in members {
            let Value::Object(m) = entry else {
                return Err(parse_error("Relation member must be an object"));
            };

            let mut member = Member::default();

            match m.get("type") {
                Some(Value::String(t)) => member.set_type(t)?,
                Some(_) => {
                    return Err(parse_error(
                        "Relation member 'type' attribute must be a string",
                    ));
                }
                None => {}
            }
            if let Some(r) = m.get("ref") {
                member.set_ref(integer_field(
                    r,
                    "Relation member 'ref' attribute is not numeric",
                    "Relation member 'ref' attribute value is too large",
                )?)?;
            }
            match m.get("role") {
                Some(Value::String(role)) => member.set_role(role.clone())?,
                Some(_) => {
                    return Err(parse_error(
                        "Relation member 'role' attribute must be a string",
                    ));
                }
                None => {}
            }

            relation.add_member(member)?;
        }

        Ok(())
    }

    fn process_tags(
        &self,
        core: &mut crate::element::ElementCore,
        obj: &serde_json::Map<String, Value>,
    ) -> Result<(), UploadError> {
        match obj.get("tags") {
            None => Ok(()),
            Some(Value::Object(tags)) => {
                for (key, value) in tags {
                    let Value::String(value) = value else {
                        return Err(parse_error(format!(
                            "Tag value for key {key} must be a string"
                        )));
                    };
                    core.add_tag(key.clone(), value.clone())?;
                }
                Ok(())
            }
            Some(_) => Err(parse_error("tags attribute must be an object")),
        }
    }

    fn init_object(
        &self,
        core: &mut crate::element::ElementCore,
        obj: &serde_json::Map<String, Value>,
        op: Operation,
    ) -> Result<(), UploadError> {
        if let Some(id) = obj.get("id") {
            core.set_id(integer_field(id, "Id is not numeric", "Id number is too large")?)?;
        }
        if let Some(version) = obj.get("version") {
            core.set_version(integer_field(
                version,
                "Version is not numeric",
                "Version value is too large",
            )?)?;
        }
        if let Some(changeset) = obj.get("changeset") {
            core.set_changeset(integer_field(
                changeset,
                "Changeset is not numeric",
                "Changeset number is too large",
            )?)?;
        }
        match obj.get("visible") {
            Some(Value::Bool(visible)) => core.set_visible(*visible),
            Some(_) => return Err(parse_error("Visible attribute is not a boolean")),
            None => {}
        }

        check_common_attributes(core, op)
    }

    fn reject_key(
        &self,
        obj: &serde_json::Map<String, Value>,
        key: &str,
        element_type: &str,
        reason: &str,
    ) -> Result<(), UploadError> {
        if obj.contains_key(key) {
            return Err(parse_error(format!(
                "Element {element_type}/{} {reason}",
                element_id(obj)
            )));
        }
        Ok(())
    }
}

fn parse_error(message: impl Into<String>) -> UploadError {
    UploadError::bad_request(ErrorOrigin::Parser, message)
}

// Diagnostic id for exclusivity messages; 0 when the element has no usable id.
fn element_id(obj: &serde_json::Map<String, Value>) -> i64 {
    obj.get("id").and_then(Value::as_i64).unwrap_or(0)
}

fn integer_field(value: &Value, not_numeric: &str, too_large: &str) -> Result<i64, UploadError> {
    value.as_i64().ok_or_else(|| {
        // an integral JSON number that is not an i64 can only be oversized
        if value.is_u64() {
            parse_error(too_large)
        } else {
            parse_error(not_numeric)
        }
    })
}

fn number_field(value: &Value, not_numeric: &str) -> Result<f64, UploadError> {
    value.as_f64().ok_or_else(|| parse_error(not_numeric))
}
