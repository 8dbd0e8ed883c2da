//! Shared helpers for the in-crate test suites: database fixtures and
//! one-call upload wrappers.

use crate::{
    config::UploadLimits,
    db::Database,
    diffresult::DiffResult,
    error::UploadError,
    updater::ChangesetUpdater,
    upload::{PayloadFormat, UploadRequest, Uploader, UserContext},
};
use meridian_primitives::{ChangesetId, ObjectId, Timestamp, UserId};

pub(crate) const TEST_USER: UserId = 31;

/// Fresh database plus an open changeset owned by [`TEST_USER`].
pub(crate) fn db_with_changeset() -> (Database, ChangesetId) {
    let mut db = Database::new();
    let cs = create_changeset(&mut db, TEST_USER);
    (db, cs)
}

pub(crate) fn create_changeset(db: &mut Database, user: UserId) -> ChangesetId {
    let limits = UploadLimits::default();
    let mut txn = db.begin();
    let cs = ChangesetUpdater::api_create_changeset(&mut txn, user, Vec::new(), &limits);
    txn.commit();
    cs
}

/// Force a changeset into the closed state.
pub(crate) fn close_changeset(db: &mut Database, cs: ChangesetId) {
    let row = db
        .state
        .changesets
        .get_mut(&cs)
        .expect("changeset fixture exists");
    row.closed_at = Timestamp::from_unix(0);
}

/// Pre-load the change counter, e.g. to exercise the element quota.
pub(crate) fn set_num_changes(db: &mut Database, cs: ChangesetId, num_changes: u32) {
    let row = db
        .state
        .changesets
        .get_mut(&cs)
        .expect("changeset fixture exists");
    row.num_changes = num_changes;
}

pub(crate) fn upload_xml(
    db: &mut Database,
    cs: ChangesetId,
    body: &str,
) -> Result<DiffResult, UploadError> {
    upload_xml_limits(db, cs, body, &UploadLimits::default())
}

pub(crate) fn upload_xml_limits(
    db: &mut Database,
    cs: ChangesetId,
    body: &str,
    limits: &UploadLimits,
) -> Result<DiffResult, UploadError> {
    upload_as(db, cs, body, limits, PayloadFormat::Xml, TEST_USER)
}

pub(crate) fn upload_json(
    db: &mut Database,
    cs: ChangesetId,
    body: &str,
) -> Result<DiffResult, UploadError> {
    upload_as(
        db,
        cs,
        body,
        &UploadLimits::default(),
        PayloadFormat::Json,
        TEST_USER,
    )
}

pub(crate) fn upload_as(
    db: &mut Database,
    cs: ChangesetId,
    body: &str,
    limits: &UploadLimits,
    format: PayloadFormat,
    user: UserId,
) -> Result<DiffResult, UploadError> {
    let request = UploadRequest {
        changeset: cs,
        user: Some(UserContext::with_write(user)),
        format,
        payload: body.as_bytes(),
    };
    Uploader::new(db, limits).upload(&request)
}

/// Create one node via an upload and return its id.
pub(crate) fn seed_node(db: &mut Database, cs: ChangesetId, lat: f64, lon: f64) -> ObjectId {
    let body = format!(
        r#"<osmChange><create><node id="-1" changeset="{cs}" lat="{lat}" lon="{lon}"/></create></osmChange>"#
    );
    let result = upload_xml(db, cs, &body).expect("node fixture upload");
    result.entries[0].new_id.expect("created node id")
}

/// Create one way over the given nodes and return its id.
pub(crate) fn seed_way(db: &mut Database, cs: ChangesetId, nodes: &[ObjectId]) -> ObjectId {
    let nds: String = nodes
        .iter()
        .map(|id| format!(r#"<nd ref="{id}"/>"#))
        .collect();
    let body = format!(
        r#"<osmChange><create><way id="-1" changeset="{cs}">{nds}</way></create></osmChange>"#
    );
    let result = upload_xml(db, cs, &body).expect("way fixture upload");
    result.entries[0].new_id.expect("created way id")
}
