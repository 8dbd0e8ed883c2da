///
/// UploadLimits
///
/// Immutable configuration record built once at process start and passed by
/// reference into parsers, updaters and the upload entry point. Optional
/// limits are disabled when `None`.
///

#[derive(Clone, Debug)]
pub struct UploadLimits {
    /// Maximum number of tags per element.
    pub element_max_tags: Option<u32>,
    /// Maximum number of node references per way.
    pub way_max_nodes: u32,
    /// Maximum number of members per relation.
    pub relation_max_members: Option<u32>,
    /// Maximum number of changes a changeset may accumulate.
    pub changeset_max_elements: u32,
    /// Maximum linear size (scaled integer) of a changeset bounding box.
    pub bbox_size_limit: Option<i64>,
    /// Maximum number of changes a single upload may carry.
    pub upload_rate_limit: Option<u32>,
    /// Idle window after which an untouched changeset closes, in seconds.
    pub changeset_idle_timeout_secs: i64,
    /// Hard ceiling on changeset lifetime, in seconds.
    pub changeset_max_open_secs: i64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            element_max_tags: None,
            way_max_nodes: 2_000,
            relation_max_members: Some(32_000),
            changeset_max_elements: 10_000,
            bbox_size_limit: None,
            upload_rate_limit: None,
            changeset_idle_timeout_secs: 60 * 60,
            changeset_max_open_secs: 24 * 60 * 60,
        }
    }
}
