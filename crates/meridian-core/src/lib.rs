//! Core engine for Meridian: osmChange parsing, the upload handler state
//! machine, element and changeset updaters over the embedded versioned
//! store, and diffResult assembly.

pub mod config;
pub mod db;
#[cfg(test)]
pub(crate) mod test_support;
pub mod diffresult;
pub mod element;
pub mod error;
pub mod handler;
pub mod parser;
pub mod tracker;
pub mod updater;
pub mod upload;

///
/// Prelude
///
/// Domain vocabulary only; no stores, updaters or helpers are re-exported.
///

pub mod prelude {
    pub use crate::{
        config::UploadLimits,
        db::Database,
        diffresult::DiffResult,
        error::{ErrorKind, UploadError},
        upload::{PayloadFormat, UploadRequest, Uploader, UserContext},
    };
    pub use meridian_primitives::{
        Bbox, ChangesetId, ObjectId, ObjectType, Operation, SignedObjectId, Timestamp, UserId,
        Version,
    };
}
