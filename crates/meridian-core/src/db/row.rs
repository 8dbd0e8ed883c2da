use meridian_primitives::{
    Bbox, ChangesetId, ObjectId, ObjectType, SequenceId, TileId, Timestamp, UserId, Version,
};

///
/// NodeRow
///
/// Current-table node. Coordinates are scaled integers; `tile` is derived
/// from them at write time for spatial indexing.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodeRow {
    pub id: ObjectId,
    pub lat: i64,
    pub lon: i64,
    pub changeset: ChangesetId,
    pub visible: bool,
    pub timestamp: Timestamp,
    pub tile: TileId,
    pub version: Version,
    pub tags: Vec<(String, String)>,
}

///
/// WayRow
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WayRow {
    pub id: ObjectId,
    pub changeset: ChangesetId,
    pub timestamp: Timestamp,
    pub visible: bool,
    pub version: Version,
    pub tags: Vec<(String, String)>,
    pub nodes: Vec<ObjectId>,
}

///
/// MemberRow
///
/// One persisted relation member, ordered by `sequence_id`.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MemberRow {
    pub member_type: ObjectType,
    pub member_id: ObjectId,
    pub member_role: String,
    pub sequence_id: SequenceId,
}

///
/// RelationRow
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RelationRow {
    pub id: ObjectId,
    pub changeset: ChangesetId,
    pub timestamp: Timestamp,
    pub visible: bool,
    pub version: Version,
    pub tags: Vec<(String, String)>,
    pub members: Vec<MemberRow>,
}

///
/// HistoryRow
///
/// History-table entry: a full copy of the element at one version plus the
/// redaction pass-through column. The upload path never sets it.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HistoryRow<T> {
    pub element: T,
    pub redaction_id: Option<u64>,
}

impl<T> HistoryRow<T> {
    pub const fn new(element: T) -> Self {
        Self {
            element,
            redaction_id: None,
        }
    }
}

///
/// ChangesetRow
///

#[derive(Clone, Debug)]
pub struct ChangesetRow {
    pub id: ChangesetId,
    pub user_id: UserId,
    pub created_at: Timestamp,
    pub closed_at: Timestamp,
    pub num_changes: u32,
    pub bbox: Option<Bbox>,
    pub tags: Vec<(String, String)>,
    pub subscribers: Vec<UserId>,
}
