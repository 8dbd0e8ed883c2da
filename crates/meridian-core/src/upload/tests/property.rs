use crate::test_support::{db_with_changeset, upload_xml};
use meridian_primitives::{ObjectType, Operation, scale_coordinate};
use proptest::prelude::*;
use std::collections::BTreeSet;

///
/// CreateSpec
///
/// One generated node create: a unique placeholder with coordinates.
///

#[derive(Clone, Debug)]
struct CreateSpec {
    placeholder: i64,
    lat: f64,
    lon: f64,
}

fn arb_creates() -> impl Strategy<Value = Vec<CreateSpec>> {
    // unique placeholders in -1..-40, a couple of decimal places on the
    // coordinates so scaling stays exact
    (1usize..12, any::<u64>()).prop_map(|(count, seed)| {
        (0..count)
            .map(|i| {
                let wobble = (seed.wrapping_mul(i as u64 + 1) % 17_000) as f64;
                CreateSpec {
                    placeholder: -(i as i64 + 1),
                    lat: -85.0 + (wobble % 170.0),
                    lon: -179.0 + (wobble % 358.0),
                }
            })
            .collect()
    })
}

fn creates_document(cs: i64, creates: &[CreateSpec]) -> String {
    let mut body = String::from("<osmChange><create>");
    for spec in creates {
        body.push_str(&format!(
            r#"<node id="{}" changeset="{cs}" lat="{}" lon="{}"/>"#,
            spec.placeholder, spec.lat, spec.lon
        ));
    }
    body.push_str("</create></osmChange>");
    body
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Round-trip creates: every placeholder maps to exactly one fresh id at
    // version 1, and the stored row carries the input coordinates.
    #[test]
    fn created_nodes_round_trip(creates in arb_creates()) {
        let (mut db, cs) = db_with_changeset();
        let result = upload_xml(&mut db, cs, &creates_document(cs, &creates)).unwrap();

        prop_assert_eq!(result.entries.len(), creates.len());

        let mut new_ids = BTreeSet::new();
        for (entry, spec) in result.entries.iter().zip(&creates) {
            prop_assert_eq!(entry.op, Operation::Create);
            prop_assert_eq!(entry.old_id, spec.placeholder);
            prop_assert_eq!(entry.new_version, Some(1));

            let new_id = entry.new_id.unwrap();
            prop_assert!(new_ids.insert(new_id), "duplicate new id {}", new_id);

            let row = db.node(new_id).unwrap();
            prop_assert_eq!(row.version, 1);
            prop_assert!(row.visible);
            prop_assert_eq!(row.lat, scale_coordinate(spec.lat));
            prop_assert_eq!(row.lon, scale_coordinate(spec.lon));
        }
    }

    // DiffResult order: per position, (op, type, old_id) equals the input
    // document order.
    #[test]
    fn diffresult_preserves_document_order(creates in arb_creates()) {
        let (mut db, cs) = db_with_changeset();
        let result = upload_xml(&mut db, cs, &creates_document(cs, &creates)).unwrap();

        for (entry, spec) in result.entries.iter().zip(&creates) {
            prop_assert_eq!(entry.obj_type, ObjectType::Node);
            prop_assert_eq!(entry.old_id, spec.placeholder);
        }
    }

    // Bbox inclusivity: the committed changeset bbox contains every created
    // coordinate.
    #[test]
    fn changeset_bbox_covers_all_created_nodes(creates in arb_creates()) {
        let (mut db, cs) = db_with_changeset();
        upload_xml(&mut db, cs, &creates_document(cs, &creates)).unwrap();

        let bbox = db.changeset(cs).unwrap().bbox.unwrap();
        for spec in &creates {
            prop_assert!(
                bbox.contains_point(scale_coordinate(spec.lat), scale_coordinate(spec.lon)),
                "bbox {} misses ({}, {})", bbox, spec.lat, spec.lon
            );
        }
    }

    // Version monotonicity: n sequential modifies of one node in a single
    // document produce versions 2..=n+1 and a complete history chain.
    #[test]
    fn version_chain_is_dense(modifies in 1usize..6) {
        let (mut db, cs) = db_with_changeset();
        let node = crate::test_support::seed_node(&mut db, cs, 10.0, 10.0);

        let mut body = String::from("<osmChange><modify>");
        for i in 0..modifies {
            body.push_str(&format!(
                r#"<node id="{node}" changeset="{cs}" version="{}" lat="{}" lon="0"/>"#,
                i + 1,
                i + 1,
            ));
        }
        body.push_str("</modify></osmChange>");

        let result = upload_xml(&mut db, cs, &body).unwrap();

        for (i, entry) in result.entries.iter().enumerate() {
            prop_assert_eq!(entry.new_version, Some(i as u32 + 2));
        }

        let row = db.node(node).unwrap();
        prop_assert_eq!(row.version as usize, modifies + 1);

        let versions: Vec<u32> = db.node_history(node).map(|h| h.element.version).collect();
        let expected: Vec<u32> = (1..=modifies as u32 + 1).collect();
        prop_assert_eq!(versions, expected);
    }

    // Bbox inclusivity for modified relations (rule A∪B): a tag change
    // counts the full member bbox before and after the write, and dropped
    // members count from their pre-write state, so every member the
    // relation ever had during the upload lands in the changeset bbox.
    #[test]
    fn modified_relation_bbox_covers_member_bbox(
        creates in arb_creates(),
        drop_every in 2usize..5,
    ) {
        let (mut db, cs) = db_with_changeset();
        let result = upload_xml(&mut db, cs, &creates_document(cs, &creates)).unwrap();
        let node_ids: Vec<u64> = result
            .entries
            .iter()
            .map(|entry| entry.new_id.unwrap())
            .collect();

        let members: String = node_ids
            .iter()
            .map(|id| format!(r#"<member type="node" ref="{id}"/>"#))
            .collect();
        let body = format!(
            r#"<osmChange><create><relation id="-1" changeset="{cs}">{members}<tag k="type" v="route"/></relation></create></osmChange>"#
        );
        let rel = upload_xml(&mut db, cs, &body).unwrap().entries[0].new_id.unwrap();

        // a fresh changeset isolates the modify's bbox contribution
        let cs2 = crate::test_support::create_changeset(&mut db, crate::test_support::TEST_USER);
        let kept: String = node_ids
            .iter()
            .enumerate()
            .filter(|(i, _)| i % drop_every != 0)
            .map(|(_, id)| format!(r#"<member type="node" ref="{id}"/>"#))
            .collect();
        let body = format!(
            r#"<osmChange><modify><relation id="{rel}" changeset="{cs2}" version="1">{kept}<tag k="type" v="route"/><tag k="name" v="renamed"/></relation></modify></osmChange>"#
        );
        upload_xml(&mut db, cs2, &body).unwrap();

        let bbox = db.changeset(cs2).unwrap().bbox.unwrap();
        for spec in &creates {
            prop_assert!(
                bbox.contains_point(scale_coordinate(spec.lat), scale_coordinate(spec.lon)),
                "bbox {} misses member at ({}, {})", bbox, spec.lat, spec.lon
            );
        }
    }

    // Atomicity: appending one duplicate placeholder to an otherwise valid
    // document must leave the store untouched.
    #[test]
    fn duplicate_placeholder_rolls_back_everything(creates in arb_creates()) {
        let (mut db, cs) = db_with_changeset();

        let mut body = String::from("<osmChange><create>");
        for spec in &creates {
            body.push_str(&format!(
                r#"<node id="{}" changeset="{cs}" lat="{}" lon="{}"/>"#,
                spec.placeholder, spec.lat, spec.lon
            ));
        }
        // duplicate of the first placeholder
        body.push_str(&format!(
            r#"<node id="{}" changeset="{cs}" lat="0" lon="0"/>"#,
            creates[0].placeholder
        ));
        body.push_str("</create></osmChange>");

        let err = upload_xml(&mut db, cs, &body).unwrap_err();
        prop_assert_eq!(err.status_code(), 400);
        prop_assert_eq!(db.node_count(), 0);
        prop_assert_eq!(db.changeset(cs).unwrap().num_changes, 0);
    }
}
