use super::{parse_xml, parse_xml_limits};
use crate::config::UploadLimits;
use meridian_primitives::{ObjectType, Operation};

// ==========================================================================
// osmChange structure
// ==========================================================================

#[test]
fn invalid_xml_is_a_bad_request() {
    for payload in ["<osmChange>", "bla", "</osmChange>"] {
        let err = parse_xml(payload).unwrap_err();
        assert_eq!(err.status_code(), 400, "payload: {payload}");
    }
}

#[test]
fn xml_without_any_changes_is_fine() {
    let cb = parse_xml("<osmChange/>").unwrap();
    assert!(cb.start_executed);
    assert!(cb.end_executed);
    assert_eq!(cb.element_count(), 0);
}

#[test]
fn misspelled_osmchange_root_is_rejected() {
    let err = parse_xml("<osmChange2/>").unwrap_err();
    assert!(
        err.message
            .starts_with("Unknown top-level element osmChange2, expecting osmChange"),
        "{}",
        err.message
    );
}

#[test]
fn unknown_action_is_rejected_with_location() {
    let err = parse_xml("<osmChange><dummy/></osmChange>").unwrap_err();
    assert!(
        err.message
            .starts_with("Unknown action dummy, choices are create, modify, delete at line 1"),
        "{}",
        err.message
    );
}

#[test]
fn empty_action_blocks_are_fine() {
    for action in ["create", "modify", "delete"] {
        let cb = parse_xml(&format!("<osmChange><{action}/></osmChange>")).unwrap();
        assert_eq!(cb.element_count(), 0);
    }
}

#[test]
fn unknown_entity_in_create_is_rejected() {
    let err = parse_xml("<osmChange><create><bla/></create></osmChange>").unwrap_err();
    assert!(
        err.message
            .starts_with("Unknown element bla, expecting node, way or relation"),
        "{}",
        err.message
    );
}

#[test]
fn overly_nested_entity_children_are_rejected() {
    let err = parse_xml(
        r#"<osmChange><create><node id="-1" changeset="1" lat="1" lon="1"><x><y/></x></node></create></osmChange>"#,
    )
    .unwrap_err();
    assert!(err.message.starts_with("xml file nested too deep"), "{}", err.message);
}

// ==========================================================================
// Node attributes
// ==========================================================================

#[test]
fn create_node_produces_a_typed_entity() {
    let cb = parse_xml(
        r#"<osmChange><create><node id="-5" changeset="123" lat="46.0" lon="11.0">
             <tag k="highway" v="bus_stop"/></node></create></osmChange>"#,
    )
    .unwrap();

    assert_eq!(cb.nodes.len(), 1);
    let (node, op, if_unused) = &cb.nodes[0];
    assert_eq!(*op, Operation::Create);
    assert!(!if_unused);
    assert_eq!(node.core().id(), Some(-5));
    assert_eq!(node.core().changeset(), Some(123));
    // create always forces version 0 on the wire
    assert_eq!(node.core().version(), Some(0));
    assert_eq!(node.lat(), Some(46.0));
    assert_eq!(node.lon(), Some(11.0));
    assert_eq!(
        node.core().tags().first(),
        Some(&("highway".to_string(), "bus_stop".to_string()))
    );
}

#[test]
fn create_node_without_details_is_rejected() {
    let err = parse_xml("<osmChange><create><node/></create></osmChange>").unwrap_err();
    assert!(
        err.message.starts_with("Mandatory field id missing in object"),
        "{}",
        err.message
    );
}

#[test]
fn node_without_changeset_is_rejected() {
    let err =
        parse_xml(r#"<osmChange><create><node id="-1"/></create></osmChange>"#).unwrap_err();
    assert!(
        err.message.starts_with("Changeset id is missing for Node -1"),
        "{}",
        err.message
    );
}

#[test]
fn node_without_coordinates_is_incomplete() {
    let err = parse_xml(r#"<osmChange><create><node id="-1" changeset="1"/></create></osmChange>"#)
        .unwrap_err();
    assert!(
        err.message.starts_with("Node -1 does not include all mandatory fields"),
        "{}",
        err.message
    );
}

#[test]
fn node_coordinate_range_violations_are_rejected() {
    let err = parse_xml(
        r#"<osmChange><create><node id="-1" changeset="1" lat="90.01" lon="0"/></create></osmChange>"#,
    )
    .unwrap_err();
    assert!(err.message.starts_with("Latitude outside of valid range"), "{}", err.message);

    let err = parse_xml(
        r#"<osmChange><create><node id="-1" changeset="1" lat="0" lon="x"/></create></osmChange>"#,
    )
    .unwrap_err();
    assert!(err.message.starts_with("Longitude is not numeric"), "{}", err.message);
}

#[test]
fn zero_id_is_rejected() {
    let err = parse_xml(
        r#"<osmChange><create><node id="0" changeset="1" lat="1" lon="1"/></create></osmChange>"#,
    )
    .unwrap_err();
    assert!(err.message.starts_with("Id must be different from 0"), "{}", err.message);
}

#[test]
fn non_positive_changeset_is_rejected() {
    let err = parse_xml(
        r#"<osmChange><create><node id="-1" changeset="0" lat="1" lon="1"/></create></osmChange>"#,
    )
    .unwrap_err();
    assert!(
        err.message.starts_with("Changeset must be a positive number"),
        "{}",
        err.message
    );
}

// ==========================================================================
// Version rules
// ==========================================================================

#[test]
fn modify_requires_a_version() {
    let err = parse_xml(
        r#"<osmChange><modify><node id="1" changeset="1" lat="1" lon="1"/></modify></osmChange>"#,
    )
    .unwrap_err();
    assert!(
        err.message.starts_with("Version is required when updating Node 1"),
        "{}",
        err.message
    );
}

#[test]
fn modify_with_version_zero_is_rejected() {
    let err = parse_xml(
        r#"<osmChange><modify><node id="1" changeset="1" version="0" lat="1" lon="1"/></modify></osmChange>"#,
    )
    .unwrap_err();
    assert!(
        err.message.starts_with("Invalid version number 0 in Node 1"),
        "{}",
        err.message
    );
}

#[test]
fn negative_version_is_rejected() {
    let err = parse_xml(
        r#"<osmChange><modify><node id="1" changeset="1" version="-2" lat="1" lon="1"/></modify></osmChange>"#,
    )
    .unwrap_err();
    assert!(err.message.starts_with("Version may not be negative"), "{}", err.message);
}

#[test]
fn create_overrides_any_supplied_version() {
    let cb = parse_xml(
        r#"<osmChange><create><node id="-1" changeset="1" version="17" lat="1" lon="1"/></create></osmChange>"#,
    )
    .unwrap();
    assert_eq!(cb.nodes[0].0.core().version(), Some(0));
}

// ==========================================================================
// visible attribute on delete
// ==========================================================================

#[test]
fn delete_with_visible_true_is_rejected() {
    let err = parse_xml(
        r#"<osmChange><delete><node id="1" changeset="1" version="1" visible="true"/></delete></osmChange>"#,
    )
    .unwrap_err();
    assert!(
        err.message
            .starts_with("Visible attribute may only be false when deleting Node 1"),
        "{}",
        err.message
    );
}

#[test]
fn delete_with_visible_false_is_fine() {
    let cb = parse_xml(
        r#"<osmChange><delete><node id="1" changeset="1" version="1" visible="false"/></delete></osmChange>"#,
    )
    .unwrap();
    assert_eq!(cb.nodes.len(), 1);
    assert_eq!(cb.nodes[0].1, Operation::Delete);
}

// ==========================================================================
// Tags
// ==========================================================================

#[test]
fn tag_without_key_or_value_is_rejected() {
    let err = parse_xml(
        r#"<osmChange><create><node id="-1" changeset="1" lat="1" lon="1"><tag v="x"/></node></create></osmChange>"#,
    )
    .unwrap_err();
    assert!(
        err.message
            .starts_with("Mandatory field k missing in tag element for Node -1"),
        "{}",
        err.message
    );

    let err = parse_xml(
        r#"<osmChange><create><node id="-1" changeset="1" lat="1" lon="1"><tag k="x"/></node></create></osmChange>"#,
    )
    .unwrap_err();
    assert!(
        err.message
            .starts_with("Mandatory field v missing in tag element for Node -1"),
        "{}",
        err.message
    );
}

#[test]
fn duplicate_tag_keys_are_rejected() {
    let err = parse_xml(
        r#"<osmChange><create><node id="-1" changeset="1" lat="1" lon="1">
              <tag k="a" v="1"/><tag k="a" v="2"/></node></create></osmChange>"#,
    )
    .unwrap_err();
    assert!(
        err.message.starts_with("Node -1 has duplicate tags with key a"),
        "{}",
        err.message
    );
}

#[test]
fn overlong_tag_key_is_rejected() {
    let key = "k".repeat(256);
    let err = parse_xml(&format!(
        r#"<osmChange><create><node id="-1" changeset="1" lat="1" lon="1"><tag k="{key}" v="v"/></node></create></osmChange>"#
    ))
    .unwrap_err();
    assert!(
        err.message
            .starts_with("Key has more than 255 unicode characters in Node -1"),
        "{}",
        err.message
    );
}

#[test]
fn multibyte_tag_value_at_the_limit_is_accepted() {
    let value = "ü".repeat(255);
    let cb = parse_xml(&format!(
        r#"<osmChange><create><node id="-1" changeset="1" lat="1" lon="1"><tag k="name" v="{value}"/></node></create></osmChange>"#
    ))
    .unwrap();
    assert_eq!(cb.nodes[0].0.core().tags().len(), 1);
}

#[test]
fn tag_count_limit_applies_at_parse_time() {
    let limits = UploadLimits {
        element_max_tags: Some(1),
        ..UploadLimits::default()
    };
    let err = parse_xml_limits(
        r#"<osmChange><create><node id="-1" changeset="1" lat="1" lon="1">
              <tag k="a" v="1"/><tag k="b" v="2"/></node></create></osmChange>"#,
        &limits,
    )
    .unwrap_err();
    assert!(
        err.message.starts_with("OSM element exceeds limit of 1 tags"),
        "{}",
        err.message
    );
}

// ==========================================================================
// Ways
// ==========================================================================

#[test]
fn way_node_refs_are_collected_in_order() {
    let cb = parse_xml(
        r#"<osmChange><create><way id="-10" changeset="1"><nd ref="-5"/><nd ref="-6"/></way></create></osmChange>"#,
    )
    .unwrap();
    assert_eq!(cb.ways[0].0.nodes(), &[-5, -6]);
}

#[test]
fn way_nd_without_ref_is_rejected() {
    let err = parse_xml(
        r#"<osmChange><create><way id="-10" changeset="1"><nd/></way></create></osmChange>"#,
    )
    .unwrap_err();
    assert!(
        err.message
            .starts_with("Missing mandatory ref field on way node Way -10"),
        "{}",
        err.message
    );
}

#[test]
fn empty_way_create_fails_precondition() {
    let err =
        parse_xml(r#"<osmChange><create><way id="-10" changeset="1"/></create></osmChange>"#)
            .unwrap_err();
    assert_eq!(err.status_code(), 412);
    assert_eq!(err.message, "Way -10 must have at least one node");
}

#[test]
fn way_node_limit_applies_at_parse_time() {
    let limits = UploadLimits {
        way_max_nodes: 1,
        ..UploadLimits::default()
    };
    let err = parse_xml_limits(
        r#"<osmChange><create><way id="-10" changeset="1"><nd ref="1"/><nd ref="2"/></way></create></osmChange>"#,
        &limits,
    )
    .unwrap_err();
    assert!(
        err.message
            .starts_with("You tried to add 2 nodes to way -10, however only 1 are allowed"),
        "{}",
        err.message
    );
}

#[test]
fn way_delete_needs_no_nodes() {
    let cb = parse_xml(
        r#"<osmChange><delete><way id="10" changeset="1" version="2"/></delete></osmChange>"#,
    )
    .unwrap();
    assert_eq!(cb.ways[0].1, Operation::Delete);
}

// ==========================================================================
// Relations
// ==========================================================================

#[test]
fn relation_members_are_parsed_with_roles() {
    let cb = parse_xml(
        r#"<osmChange><create><relation id="-2" changeset="1">
             <member type="nOdE" ref="-5" role="stop"/>
             <member type="way" ref="7"/>
             <tag k="type" v="route"/></relation></create></osmChange>"#,
    )
    .unwrap();

    let relation = &cb.relations[0].0;
    assert_eq!(relation.members().len(), 2);
    assert_eq!(relation.members()[0].member_type(), ObjectType::Node);
    assert_eq!(relation.members()[0].member_ref(), -5);
    assert_eq!(relation.members()[0].role(), "stop");
    assert_eq!(relation.members()[1].member_type(), ObjectType::Way);
    assert_eq!(relation.members()[1].role(), "");
}

#[test]
fn relation_member_without_type_is_rejected() {
    let err = parse_xml(
        r#"<osmChange><create><relation id="-2" changeset="1"><member ref="-5"/></relation></create></osmChange>"#,
    )
    .unwrap_err();
    assert!(
        err.message.starts_with("Missing 'type' attribute in Relation member"),
        "{}",
        err.message
    );
}

#[test]
fn relation_member_without_ref_is_rejected() {
    let err = parse_xml(
        r#"<osmChange><create><relation id="-2" changeset="1"><member type="node"/></relation></create></osmChange>"#,
    )
    .unwrap_err();
    assert!(
        err.message.starts_with("Missing 'ref' attribute in Relation member"),
        "{}",
        err.message
    );
}

#[test]
fn relation_member_with_invalid_type_is_rejected() {
    let err = parse_xml(
        r#"<osmChange><create><relation id="-2" changeset="1"><member type="area" ref="1"/></relation></create></osmChange>"#,
    )
    .unwrap_err();
    assert!(
        err.message.starts_with("Invalid type area in member relation"),
        "{}",
        err.message
    );
}

#[test]
fn relation_member_limit_applies_at_parse_time() {
    let limits = UploadLimits {
        relation_max_members: Some(1),
        ..UploadLimits::default()
    };
    let err = parse_xml_limits(
        r#"<osmChange><create><relation id="-2" changeset="1">
              <member type="node" ref="1"/><member type="node" ref="2"/></relation></create></osmChange>"#,
        &limits,
    )
    .unwrap_err();
    assert!(
        err.message
            .starts_with("You tried to add 2 members to relation -2, however only 1 are allowed"),
        "{}",
        err.message
    );
}

#[test]
fn relation_without_members_is_fine_on_create() {
    let cb = parse_xml(
        r#"<osmChange><create><relation id="-2" changeset="1"/></create></osmChange>"#,
    )
    .unwrap();
    assert!(cb.relations[0].0.members().is_empty());
}

// ==========================================================================
// if-unused
// ==========================================================================

#[test]
fn if_unused_is_carried_on_delete_blocks() {
    let cb = parse_xml(
        r#"<osmChange><delete if-unused="true"><node id="1" changeset="1" version="1"/></delete>
           <delete><node id="2" changeset="1" version="1"/></delete></osmChange>"#,
    )
    .unwrap();

    assert!(cb.nodes[0].2);
    assert!(!cb.nodes[1].2);
}

#[test]
fn if_unused_presence_counts_not_its_value() {
    let cb = parse_xml(
        r#"<osmChange><delete if-unused="false"><node id="1" changeset="1" version="1"/></delete></osmChange>"#,
    )
    .unwrap();
    assert!(cb.nodes[0].2);
}

#[test]
fn multiple_blocks_keep_document_order() {
    let cb = parse_xml(
        r#"<osmChange>
             <create><node id="-1" changeset="1" lat="1" lon="1"/></create>
             <modify><node id="5" changeset="1" version="2" lat="2" lon="2"/></modify>
             <create><node id="-2" changeset="1" lat="3" lon="3"/></create>
           </osmChange>"#,
    )
    .unwrap();

    assert_eq!(cb.nodes.len(), 3);
    assert_eq!(cb.nodes[0].1, Operation::Create);
    assert_eq!(cb.nodes[1].1, Operation::Modify);
    assert_eq!(cb.nodes[2].1, Operation::Create);
}

#[test]
fn unknown_entity_children_are_ignored() {
    // unknown child elements inside an entity are skipped, matching the
    // wire format's forward compatibility
    let cb = parse_xml(
        r#"<osmChange><create><node id="-1" changeset="1" lat="1" lon="1"><center/></node></create></osmChange>"#,
    )
    .unwrap();
    assert_eq!(cb.nodes.len(), 1);
}
