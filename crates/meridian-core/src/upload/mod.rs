//! Upload entry point: wires the parsers, handler, updaters and the
//! changeset bookkeeping into one atomic operation against the store.

#[cfg(test)]
mod tests;

use crate::{
    config::UploadLimits,
    db::Database,
    diffresult::{DiffResult, assemble_diffresult},
    error::{ErrorOrigin, UploadError},
    handler::OsmChangeHandler,
    parser::{OsmChangeJsonParser, OsmChangeXmlParser},
    tracker::ChangeTracker,
    updater::ChangesetUpdater,
};
use meridian_primitives::{ChangesetId, UserId};
use tracing::{info, warn};

///
/// PayloadFormat
///
/// Wire encoding of the request body, taken from the Content-Type header
/// by the HTTP layer.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PayloadFormat {
    Xml,
    Json,
}

///
/// UserContext
///
/// The authenticated user as resolved by the boundary. The engine only
/// needs identity, the api_write scope, and the block status.
///

#[derive(Clone, Copy, Debug)]
pub struct UserContext {
    pub id: UserId,
    pub api_write: bool,
    pub blocked: bool,
}

impl UserContext {
    /// An unblocked user with full write access.
    #[must_use]
    pub const fn with_write(id: UserId) -> Self {
        Self {
            id,
            api_write: true,
            blocked: false,
        }
    }
}

///
/// UploadRequest
///

#[derive(Clone, Copy, Debug)]
pub struct UploadRequest<'a> {
    pub changeset: ChangesetId,
    pub user: Option<UserContext>,
    pub format: PayloadFormat,
    pub payload: &'a [u8],
}

///
/// Uploader
///
/// One upload call parses the payload, applies every operation inside a
/// single transaction, enforces the changeset quotas, and either commits
/// everything or leaves the store untouched.
///

pub struct Uploader<'a> {
    db: &'a mut Database,
    limits: &'a UploadLimits,
}

impl<'a> Uploader<'a> {
    pub fn new(db: &'a mut Database, limits: &'a UploadLimits) -> Self {
        Self { db, limits }
    }

    pub fn upload(&mut self, request: &UploadRequest<'_>) -> Result<DiffResult, UploadError> {
        let user = check_user(request.user)?;

        let mut txn = self.db.begin();
        let mut tracker = ChangeTracker::new();

        let mut changeset_updater = ChangesetUpdater::new(request.changeset, user.id);
        changeset_updater.lock_current_changeset(&mut txn, true, self.limits)?;

        let (new_changes, upload_bbox) = {
            let mut handler = OsmChangeHandler::new(&mut txn, &mut tracker, request.changeset);

            match request.format {
                PayloadFormat::Xml => {
                    OsmChangeXmlParser::new(&mut handler, self.limits).parse(request.payload)?;
                }
                PayloadFormat::Json => {
                    OsmChangeJsonParser::new(&mut handler, self.limits).parse(request.payload)?;
                }
            }

            (handler.get_num_changes(), handler.get_bbox())
        };

        let diffresult = assemble_diffresult(&tracker)?;

        if let Some(max_changes) = self.limits.upload_rate_limit
            && new_changes > max_changes
        {
            warn!(
                changes = new_changes,
                user = user.id,
                changeset = request.changeset,
                max = max_changes,
                "upload blocked due to rate limiting"
            );
            return Err(UploadError::too_many_requests(
                ErrorOrigin::Upload,
                "Upload has been blocked due to rate limiting. Please try again later.",
            ));
        }

        changeset_updater.update_changeset(&mut txn, new_changes, upload_bbox, self.limits)?;

        if let Some(max_bbox_size) = self.limits.bbox_size_limit {
            let cs_bbox = changeset_updater.get_bbox();
            if !cs_bbox.is_unset() && cs_bbox.linear_size() > max_bbox_size {
                warn!(
                    changes = new_changes,
                    user = user.id,
                    changeset = request.changeset,
                    size = cs_bbox.linear_size(),
                    "upload blocked due to bbox size limit"
                );
                return Err(UploadError::payload_too_large(
                    ErrorOrigin::Upload,
                    "Changeset bounding box size limit exceeded.",
                ));
            }
        }

        txn.commit();

        info!(
            changeset = request.changeset,
            user = user.id,
            changes = new_changes,
            "changeset upload committed"
        );

        Ok(diffresult)
    }
}

fn check_user(user: Option<UserContext>) -> Result<UserContext, UploadError> {
    let Some(user) = user else {
        return Err(UploadError::unauthorized(
            ErrorOrigin::Upload,
            "No valid authorization token provided",
        ));
    };

    if user.blocked {
        return Err(UploadError::forbidden(
            ErrorOrigin::Upload,
            "Your access to the API has been blocked. Please log-in to the web interface to find out more.",
        ));
    }

    if !user.api_write {
        return Err(UploadError::forbidden(
            ErrorOrigin::Upload,
            "You have not granted the modify map permission",
        ));
    }

    Ok(user)
}
