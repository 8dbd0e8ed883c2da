//! diffResult assembly and serialization. The response lists one entry per
//! input entity, in the exact order the osmChange document supplied them;
//! clients rely on that order to reconcile placeholder ids.

use crate::{
    error::{ErrorOrigin, UploadError},
    tracker::ChangeTracker,
};
use meridian_primitives::{ObjectId, ObjectType, Operation, SignedObjectId, Version};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use xml::writer::{EmitterConfig, XmlEvent};

///
/// DiffResultEntry
///
/// Outcome for one input entity. Deletes that were performed carry neither
/// a new id nor a new version; skipped if-unused deletes report both.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DiffResultEntry {
    pub op: Operation,
    pub obj_type: ObjectType,
    pub old_id: SignedObjectId,
    pub new_id: Option<ObjectId>,
    pub new_version: Option<Version>,
    pub deletion_skipped: bool,
}

///
/// DiffResult
///

#[derive(Clone, Debug, Default)]
pub struct DiffResult {
    pub entries: Vec<DiffResultEntry>,
}

/// Reconstruct the per-input-entity result map from the tracker, in the
/// original document order. An entity missing from every mapping means an
/// updater failed to account for it; that is an internal error.
pub fn assemble_diffresult(tracker: &ChangeTracker) -> Result<DiffResult, UploadError> {
    // lookup maps, keyed the way each operation resolves
    let mut map_create_ids: BTreeMap<(ObjectType, SignedObjectId), (ObjectId, Version)> =
        BTreeMap::new();
    let mut map_modify_ids: BTreeMap<(ObjectType, SignedObjectId, Version), (ObjectId, Version)> =
        BTreeMap::new();
    let mut map_skip_delete_ids: BTreeMap<(ObjectType, SignedObjectId), (ObjectId, Version)> =
        BTreeMap::new();
    let mut set_delete_ids: BTreeSet<(ObjectType, SignedObjectId)> = BTreeSet::new();

    for obj_type in [ObjectType::Node, ObjectType::Way, ObjectType::Relation] {
        for mapping in tracker.created_for(obj_type) {
            map_create_ids.insert(
                (obj_type, mapping.old_id),
                (mapping.new_id, mapping.new_version),
            );
        }
        for mapping in tracker.modified_for(obj_type) {
            // keyed by new version to disambiguate repeated ids in one upload
            map_modify_ids.insert(
                (obj_type, mapping.old_id, mapping.new_version),
                (mapping.new_id, mapping.new_version),
            );
        }
        for mapping in tracker.skip_deleted_for(obj_type) {
            map_skip_delete_ids.insert(
                (obj_type, mapping.old_id),
                (mapping.new_id, mapping.new_version),
            );
        }
        for &old_id in tracker.deleted_for(obj_type) {
            set_delete_ids.insert((obj_type, old_id));
        }
    }

    let mut entries = Vec::with_capacity(tracker.orig_sequence.len());

    for item in &tracker.orig_sequence {
        let entry = match item.op {
            Operation::Create => {
                let (new_id, new_version) = map_create_ids
                    .get(&(item.obj_type, item.orig_id))
                    .ok_or_else(unprocessed_element)?;
                DiffResultEntry {
                    op: item.op,
                    obj_type: item.obj_type,
                    old_id: item.orig_id,
                    new_id: Some(*new_id),
                    new_version: Some(*new_version),
                    deletion_skipped: false,
                }
            }

            Operation::Modify => {
                let (new_id, new_version) = map_modify_ids
                    .get(&(item.obj_type, item.orig_id, item.orig_version + 1))
                    .ok_or_else(unprocessed_element)?;
                DiffResultEntry {
                    op: item.op,
                    obj_type: item.obj_type,
                    old_id: item.orig_id,
                    new_id: Some(*new_id),
                    new_version: Some(*new_version),
                    deletion_skipped: false,
                }
            }

            Operation::Delete => {
                let skipped = item
                    .if_unused
                    .then(|| map_skip_delete_ids.get(&(item.obj_type, item.orig_id)))
                    .flatten();

                if let Some((new_id, new_version)) = skipped {
                    DiffResultEntry {
                        op: item.op,
                        obj_type: item.obj_type,
                        old_id: item.orig_id,
                        new_id: Some(*new_id),
                        new_version: Some(*new_version),
                        deletion_skipped: true,
                    }
                } else {
                    if !set_delete_ids.contains(&(item.obj_type, item.orig_id)) {
                        return Err(unprocessed_element());
                    }
                    DiffResultEntry {
                        op: item.op,
                        obj_type: item.obj_type,
                        old_id: item.orig_id,
                        new_id: None,
                        new_version: None,
                        deletion_skipped: false,
                    }
                }
            }
        };

        entries.push(entry);
    }

    Ok(DiffResult { entries })
}

impl DiffResult {
    /// Serialize as the `<diffResult>` XML document.
    pub fn to_xml(&self, generator: &str) -> Result<String, UploadError> {
        let mut output = Vec::new();
        let mut writer = EmitterConfig::new()
            .perform_indent(true)
            .create_writer(&mut output);

        let emit = |err: xml::writer::Error| {
            UploadError::internal(
                ErrorOrigin::DiffResult,
                format!("diffResult serialization failed: {err}"),
            )
        };

        writer
            .write(
                XmlEvent::start_element("diffResult")
                    .attr("version", "0.6")
                    .attr("generator", generator),
            )
            .map_err(emit)?;

        for entry in &self.entries {
            let old_id = entry.old_id.to_string();
            let element = XmlEvent::start_element(entry.obj_type.wire_name())
                .attr("old_id", old_id.as_str());

            match (entry.new_id, entry.new_version) {
                (Some(new_id), Some(new_version)) => {
                    let new_id = new_id.to_string();
                    let new_version = new_version.to_string();
                    writer
                        .write(
                            element
                                .attr("new_id", new_id.as_str())
                                .attr("new_version", new_version.as_str()),
                        )
                        .map_err(emit)?;
                }
                _ => {
                    writer.write(element).map_err(emit)?;
                }
            }

            writer.write(XmlEvent::end_element()).map_err(emit)?;
        }

        writer.write(XmlEvent::end_element()).map_err(emit)?;

        String::from_utf8(output).map_err(|err| {
            UploadError::internal(
                ErrorOrigin::DiffResult,
                format!("diffResult serialization produced invalid utf-8: {err}"),
            )
        })
    }

    /// Serialize as the JSON equivalent of the XML document.
    #[must_use]
    pub fn to_json(&self, generator: &str) -> Value {
        let entries: Vec<Value> = self
            .entries
            .iter()
            .map(|entry| {
                let mut obj = json!({
                    "type": entry.obj_type.wire_name(),
                    "old_id": entry.old_id,
                });
                if let Some(new_id) = entry.new_id {
                    obj["new_id"] = json!(new_id);
                }
                if let Some(new_version) = entry.new_version {
                    obj["new_version"] = json!(new_version);
                }
                obj
            })
            .collect();

        json!({
            "version": "0.6",
            "generator": generator,
            "diffResult": entries,
        })
    }
}

fn unprocessed_element() -> UploadError {
    UploadError::internal(
        ErrorOrigin::DiffResult,
        "Element in osmChange message was not processed",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::IdMapping;

    fn tracker_with_create() -> ChangeTracker {
        let mut tracker = ChangeTracker::new();
        tracker.created_node_ids.push(IdMapping {
            old_id: -5,
            new_id: 1,
            new_version: 1,
        });
        tracker.push_sequence_entry(Operation::Create, ObjectType::Node, -5, 0, false);
        tracker
    }

    #[test]
    fn create_entries_resolve_via_the_create_map() {
        let tracker = tracker_with_create();
        let result = assemble_diffresult(&tracker).unwrap();

        assert_eq!(result.entries.len(), 1);
        let entry = result.entries[0];
        assert_eq!(entry.old_id, -5);
        assert_eq!(entry.new_id, Some(1));
        assert_eq!(entry.new_version, Some(1));
        assert!(!entry.deletion_skipped);
    }

    #[test]
    fn modify_entries_are_keyed_by_next_version() {
        let mut tracker = ChangeTracker::new();
        tracker.modified_node_ids.push(IdMapping {
            old_id: 9,
            new_id: 9,
            new_version: 3,
        });
        tracker.push_sequence_entry(Operation::Modify, ObjectType::Node, 9, 2, false);

        let result = assemble_diffresult(&tracker).unwrap();
        assert_eq!(result.entries[0].new_version, Some(3));
    }

    #[test]
    fn performed_deletes_have_no_new_id() {
        let mut tracker = ChangeTracker::new();
        tracker.deleted_way_ids.push(4);
        tracker.push_sequence_entry(Operation::Delete, ObjectType::Way, 4, 1, false);

        let result = assemble_diffresult(&tracker).unwrap();
        let entry = result.entries[0];
        assert_eq!(entry.new_id, None);
        assert_eq!(entry.new_version, None);
        assert!(!entry.deletion_skipped);
    }

    #[test]
    fn skipped_deletes_report_current_id_and_version() {
        let mut tracker = ChangeTracker::new();
        tracker.skip_deleted_relation_ids.push(IdMapping {
            old_id: 7,
            new_id: 7,
            new_version: 2,
        });
        tracker.push_sequence_entry(Operation::Delete, ObjectType::Relation, 7, 2, true);

        let result = assemble_diffresult(&tracker).unwrap();
        let entry = result.entries[0];
        assert_eq!(entry.new_id, Some(7));
        assert_eq!(entry.new_version, Some(2));
        assert!(entry.deletion_skipped);
    }

    #[test]
    fn unprocessed_entities_are_internal_errors() {
        let mut tracker = ChangeTracker::new();
        tracker.push_sequence_entry(Operation::Create, ObjectType::Node, -1, 0, false);

        let err = assemble_diffresult(&tracker).unwrap_err();
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn xml_output_contains_all_three_row_shapes() {
        let mut tracker = tracker_with_create();
        tracker.deleted_way_ids.push(4);
        tracker.push_sequence_entry(Operation::Delete, ObjectType::Way, 4, 1, false);
        tracker.skip_deleted_relation_ids.push(IdMapping {
            old_id: 7,
            new_id: 7,
            new_version: 2,
        });
        tracker.push_sequence_entry(Operation::Delete, ObjectType::Relation, 7, 2, true);

        let xml = assemble_diffresult(&tracker).unwrap().to_xml("meridian").unwrap();

        assert!(xml.contains(r#"<diffResult version="0.6" generator="meridian">"#));
        assert!(xml.contains(r#"<node old_id="-5" new_id="1" new_version="1""#));
        assert!(xml.contains(r#"<way old_id="4""#));
        assert!(!xml.contains(r#"<way old_id="4" new_id"#));
        assert!(xml.contains(r#"<relation old_id="7" new_id="7" new_version="2""#));
    }

    #[test]
    fn json_output_mirrors_the_xml_shapes() {
        let mut tracker = tracker_with_create();
        tracker.deleted_way_ids.push(4);
        tracker.push_sequence_entry(Operation::Delete, ObjectType::Way, 4, 1, false);

        let doc = assemble_diffresult(&tracker).unwrap().to_json("meridian");

        assert_eq!(doc["version"], "0.6");
        let rows = doc["diffResult"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["old_id"], -5);
        assert_eq!(rows[0]["new_id"], 1);
        assert!(rows[1].get("new_id").is_none());
    }
}
