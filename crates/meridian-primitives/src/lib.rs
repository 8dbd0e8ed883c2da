//! Domain vocabulary for the Meridian changeset upload engine: identifier
//! types, the osmChange operation and object-type enums, scaled bounding
//! boxes, quad-tile indexing, and timestamps.

mod bbox;
mod tile;
mod timestamp;

pub use bbox::*;
pub use tile::*;
pub use timestamp::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-side user id.
pub type UserId = u64;

/// Changeset id; positive for every persisted changeset.
pub type ChangesetId = i64;

/// Persisted node/way/relation id; never zero.
pub type ObjectId = u64;

/// Wire-side node/way/relation id; negative values are client placeholders.
pub type SignedObjectId = i64;

/// Element version; the first persisted version of a created object is 1.
pub type Version = u32;

/// Ordering of a node within a way or a member within a relation.
pub type SequenceId = u32;

/// Spatial bucket derived from a node's coordinates.
pub type TileId = u32;

/// Scale factor between degrees and the integer coordinates kept in the
/// current/history tables (and in [`Bbox`]).
pub const COORDINATE_SCALE: i64 = 10_000_000;

///
/// Operation
///
/// Action an osmChange block applies to the entities it contains.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Modify,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Modify => "modify",
            Self::Delete => "delete",
        })
    }
}

///
/// ObjectType
///
/// Kind of versioned element an upload operates on.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Node,
    Way,
    Relation,
}

impl ObjectType {
    /// Lowercase name as used in wire documents (`node`, `way`, `relation`).
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Node => "Node",
            Self::Way => "Way",
            Self::Relation => "Relation",
        })
    }
}

/// Format a list of ids the way diagnostics expect: `1,5,17`.
#[must_use]
pub fn join_ids<I>(ids: I) -> String
where
    I: IntoIterator,
    I::Item: fmt::Display,
{
    let mut out = String::new();
    for (i, id) in ids.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&id.to_string());
    }
    out
}
