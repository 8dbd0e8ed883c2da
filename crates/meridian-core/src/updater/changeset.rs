use crate::{
    config::UploadLimits,
    db::{ChangesetRow, Transaction},
    error::{ErrorOrigin, UploadError},
};
use meridian_primitives::{Bbox, ChangesetId, Timestamp, UserId};
use tracing::debug;

///
/// ChangesetUpdater
///
/// Owns the changeset row for the duration of an upload: acquires the row
/// lock, enforces ownership and quotas, and writes back change counts and
/// the accumulated bounding box. The lifecycle operations used outside the
/// upload core serialize on the same row lock.
///

pub struct ChangesetUpdater {
    changeset: ChangesetId,
    user_id: UserId,
    cs_num_changes: u32,
    cs_bbox: Bbox,
}

impl ChangesetUpdater {
    #[must_use]
    pub fn new(changeset: ChangesetId, user_id: UserId) -> Self {
        Self {
            changeset,
            user_id,
            cs_num_changes: 0,
            cs_bbox: Bbox::default(),
        }
    }

    /// Exclusive-lock the changeset row and verify it can take this upload.
    /// With `check_max_elements_limit` unset only existence and ownership
    /// are checked.
    pub fn lock_current_changeset(
        &mut self,
        txn: &mut Transaction<'_>,
        check_max_elements_limit: bool,
        limits: &UploadLimits,
    ) -> Result<(), UploadError> {
        if !txn.lock_changeset_row(self.changeset) {
            return Err(UploadError::not_found(
                ErrorOrigin::Changeset,
                format!("Changeset {} not found", self.changeset),
            ));
        }

        let now = txn.now();
        let row = self.row(txn)?;

        if row.user_id != self.user_id {
            return Err(UploadError::conflict(
                ErrorOrigin::Changeset,
                "The user doesn't own that changeset",
            ));
        }

        // closed_at is inclusive: a changeset closed in this very second no
        // longer accepts uploads
        if row.closed_at <= now {
            return Err(closed_error(self.changeset, row.closed_at));
        }

        if check_max_elements_limit && row.num_changes >= limits.changeset_max_elements {
            // a full changeset is treated as closed right now
            return Err(closed_error(self.changeset, now));
        }

        self.cs_num_changes = row.num_changes;
        self.cs_bbox = row.bbox.unwrap_or_default();

        Ok(())
    }

    /// Fold this upload's changes into the changeset row: bump the change
    /// count, widen the stored bbox, and keep an active changeset open by
    /// extending `closed_at` up to the maximum open duration.
    pub fn update_changeset(
        &mut self,
        txn: &mut Transaction<'_>,
        num_new_changes: u32,
        bbox: Bbox,
        limits: &UploadLimits,
    ) -> Result<(), UploadError> {
        // reaching the limit exactly is fine; only exceeding it fails
        if self.cs_num_changes + num_new_changes > limits.changeset_max_elements {
            let now = txn.now();
            return Err(closed_error(self.changeset, now));
        }

        self.cs_num_changes += num_new_changes;

        if !bbox.is_unset() {
            self.cs_bbox.expand(bbox);
        }

        let now = txn.now();
        let num_changes = self.cs_num_changes;
        let cs_bbox = self.cs_bbox;

        let idle = limits.changeset_idle_timeout_secs;
        let max_open = limits.changeset_max_open_secs;

        let row = self.row_mut(txn)?;
        row.num_changes = num_changes;
        if !cs_bbox.is_unset() {
            row.bbox = Some(cs_bbox);
        }
        row.closed_at = now
            .plus_seconds(idle)
            .min(row.created_at.plus_seconds(max_open));

        debug!(
            changeset = self.changeset,
            num_changes, "changeset updated"
        );

        Ok(())
    }

    /// Accumulated changeset bbox after `update_changeset`.
    #[must_use]
    pub const fn get_bbox(&self) -> Bbox {
        self.cs_bbox
    }

    #[must_use]
    pub const fn num_changes(&self) -> u32 {
        self.cs_num_changes
    }

    // ======================================================================
    // Lifecycle operations (used outside the upload core)
    // ======================================================================

    /// Open a fresh changeset for the authenticated user.
    pub fn api_create_changeset(
        txn: &mut Transaction<'_>,
        user_id: UserId,
        tags: Vec<(String, String)>,
        limits: &UploadLimits,
    ) -> ChangesetId {
        let id = txn.next_changeset_id();
        let now = txn.now();

        txn.insert_changeset(ChangesetRow {
            id,
            user_id,
            created_at: now,
            closed_at: now.plus_seconds(limits.changeset_idle_timeout_secs),
            num_changes: 0,
            bbox: None,
            tags,
            subscribers: vec![user_id],
        });

        debug!(changeset = id, user = user_id, "changeset created");

        id
    }

    /// Replace the changeset tags.
    pub fn api_update_changeset(
        &mut self,
        txn: &mut Transaction<'_>,
        tags: Vec<(String, String)>,
        limits: &UploadLimits,
    ) -> Result<(), UploadError> {
        self.lock_current_changeset(txn, false, limits)?;
        let row = self.row_mut(txn)?;
        row.tags = tags;
        Ok(())
    }

    /// Close the changeset now.
    pub fn api_close_changeset(
        &mut self,
        txn: &mut Transaction<'_>,
        limits: &UploadLimits,
    ) -> Result<(), UploadError> {
        self.lock_current_changeset(txn, false, limits)?;
        let now = txn.now();
        let row = self.row_mut(txn)?;
        row.closed_at = now;
        Ok(())
    }

    // ======================================================================
    // Row access
    // ======================================================================

    fn row<'t>(&self, txn: &'t Transaction<'_>) -> Result<&'t ChangesetRow, UploadError> {
        txn.changeset(self.changeset)
            .ok_or_else(|| changeset_row_vanished(self.changeset))
    }

    fn row_mut<'t>(
        &self,
        txn: &'t mut Transaction<'_>,
    ) -> Result<&'t mut ChangesetRow, UploadError> {
        txn.changeset_mut(self.changeset)
            .ok_or_else(|| changeset_row_vanished(self.changeset))
    }
}

fn closed_error(changeset: ChangesetId, closed_at: Timestamp) -> UploadError {
    UploadError::conflict(
        ErrorOrigin::Changeset,
        format!("The changeset {changeset} was closed at {closed_at}"),
    )
}

fn changeset_row_vanished(changeset: ChangesetId) -> UploadError {
    UploadError::internal(
        ErrorOrigin::Changeset,
        format!("changeset {changeset} row vanished while locked"),
    )
}
