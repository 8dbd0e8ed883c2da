mod property;

use crate::{
    config::UploadLimits,
    db::Database,
    test_support::{db_with_changeset, upload_xml},
    upload::{PayloadFormat, UploadRequest, Uploader, UserContext},
};

fn request<'a>(
    cs: i64,
    user: Option<UserContext>,
    payload: &'a str,
) -> UploadRequest<'a> {
    UploadRequest {
        changeset: cs,
        user,
        format: PayloadFormat::Xml,
        payload: payload.as_bytes(),
    }
}

#[test]
fn uploads_without_a_user_are_unauthorized() {
    let (mut db, cs) = db_with_changeset();
    let limits = UploadLimits::default();

    let err = Uploader::new(&mut db, &limits)
        .upload(&request(cs, None, "<osmChange/>"))
        .unwrap_err();

    assert_eq!(err.status_code(), 401);
}

#[test]
fn blocked_users_are_forbidden() {
    let (mut db, cs) = db_with_changeset();
    let limits = UploadLimits::default();

    let user = UserContext {
        id: crate::test_support::TEST_USER,
        api_write: true,
        blocked: true,
    };
    let err = Uploader::new(&mut db, &limits)
        .upload(&request(cs, Some(user), "<osmChange/>"))
        .unwrap_err();

    assert_eq!(err.status_code(), 403);
    assert!(err.message.starts_with("Your access to the API has been blocked"));
}

#[test]
fn users_without_api_write_are_forbidden() {
    let (mut db, cs) = db_with_changeset();
    let limits = UploadLimits::default();

    let user = UserContext {
        id: crate::test_support::TEST_USER,
        api_write: false,
        blocked: false,
    };
    let err = Uploader::new(&mut db, &limits)
        .upload(&request(cs, Some(user), "<osmChange/>"))
        .unwrap_err();

    assert_eq!(err.status_code(), 403);
    assert_eq!(err.message, "You have not granted the modify map permission");
}

#[test]
fn json_payload_under_xml_content_type_is_a_bad_request() {
    let (mut db, cs) = db_with_changeset();
    let limits = UploadLimits::default();

    let user = UserContext::with_write(crate::test_support::TEST_USER);
    let err = Uploader::new(&mut db, &limits)
        .upload(&request(cs, Some(user), r#"{"version": "0.6", "osmChange": []}"#))
        .unwrap_err();

    assert_eq!(err.status_code(), 400);
    assert_eq!(db.node_count(), 0);
}

#[test]
fn empty_osmchange_document_commits_nothing_but_succeeds() {
    let (mut db, cs) = db_with_changeset();

    let result = upload_xml(&mut db, cs, "<osmChange/>").unwrap();

    assert!(result.entries.is_empty());
    assert_eq!(db.changeset(cs).unwrap().num_changes, 0);
}

#[test]
fn diffresult_serializes_after_a_real_upload() {
    let (mut db, cs) = db_with_changeset();

    let body = format!(
        r#"<osmChange>
             <create><node id="-5" changeset="{cs}" lat="46" lon="11"/></create>
           </osmChange>"#
    );
    let result = upload_xml(&mut db, cs, &body).unwrap();

    let xml = result.to_xml("meridian tests").unwrap();
    assert!(xml.contains(r#"old_id="-5""#));
    assert!(xml.contains(r#"new_id="1""#));

    let json = result.to_json("meridian tests");
    assert_eq!(json["diffResult"][0]["old_id"], -5);
}

#[test]
fn failed_uploads_leave_previous_state_intact() {
    let mut db = Database::new();
    let cs = crate::test_support::create_changeset(&mut db, crate::test_support::TEST_USER);
    let node = crate::test_support::seed_node(&mut db, cs, 46.0, 11.0);

    // second entity fails on a version conflict; the first must not stick
    let body = format!(
        r#"<osmChange>
             <create><node id="-1" changeset="{cs}" lat="1" lon="1"/></create>
             <modify><node id="{node}" changeset="{cs}" version="9" lat="2" lon="2"/></modify>
           </osmChange>"#
    );
    let err = upload_xml(&mut db, cs, &body).unwrap_err();

    assert_eq!(err.status_code(), 409);
    assert_eq!(db.node_count(), 1);
    assert_eq!(db.node(node).unwrap().version, 1);
    assert_eq!(db.node(node).unwrap().lat, meridian_primitives::scale_coordinate(46.0));
}
