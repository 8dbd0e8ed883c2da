//! Parse-time element model. Setters validate value ranges and lengths as
//! the values arrive off the wire, so a fully built element only needs the
//! operation-specific completeness check before it is dispatched.

mod node;
mod relation;
mod way;

pub use node::*;
pub use relation::*;
pub use way::*;

use crate::{
    config::UploadLimits,
    error::{ErrorOrigin, UploadError},
};
use derive_more::{Deref, DerefMut};
use meridian_primitives::{ChangesetId, ObjectType, SignedObjectId, Version};
use std::num::IntErrorKind;

/// Maximum length of tag keys, tag values and member roles, in Unicode
/// code points.
pub const MAX_VALUE_LENGTH: usize = 255;

///
/// TagList
///
/// Tag mapping with unique keys; kept as an insertion-ordered list since
/// the store rewrites the full set on every change.
///

#[derive(Clone, Debug, Default, Deref, DerefMut, Eq, PartialEq)]
pub struct TagList(Vec<(String, String)>);

impl TagList {
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    pub(crate) fn push_unchecked(&mut self, key: String, value: String) {
        self.0.push((key, value));
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<(String, String)> {
        self.0
    }
}

impl FromIterator<(String, String)> for TagList {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

///
/// ElementCore
///
/// Attributes common to nodes, ways and relations, plus the object type so
/// diagnostics can name the element they refer to.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ElementCore {
    object_type: ObjectType,
    changeset: Option<ChangesetId>,
    id: Option<SignedObjectId>,
    version: Option<Version>,
    visible: Option<bool>,
    tags: TagList,
}

impl ElementCore {
    #[must_use]
    pub fn new(object_type: ObjectType) -> Self {
        Self {
            object_type,
            changeset: None,
            id: None,
            version: None,
            visible: None,
            tags: TagList::default(),
        }
    }

    // ======================================================================
    // Setters
    // ======================================================================

    pub fn set_changeset(&mut self, changeset: ChangesetId) -> Result<(), UploadError> {
        if changeset <= 0 {
            return Err(payload_error("Changeset must be a positive number"));
        }
        self.changeset = Some(changeset);
        Ok(())
    }

    pub fn set_changeset_str(&mut self, changeset: &str) -> Result<(), UploadError> {
        let value = parse_integer(changeset, "Changeset is not numeric", "Changeset number is too large")?;
        self.set_changeset(value)
    }

    pub fn set_version(&mut self, version: i64) -> Result<(), UploadError> {
        if version < 0 {
            return Err(payload_error("Version may not be negative"));
        }
        let version =
            Version::try_from(version).map_err(|_| payload_error("Version value is too large"))?;
        self.version = Some(version);
        Ok(())
    }

    pub fn set_version_str(&mut self, version: &str) -> Result<(), UploadError> {
        let value = parse_integer(version, "Version is not numeric", "Version value is too large")?;
        self.set_version(value)
    }

    pub fn set_id(&mut self, id: SignedObjectId) -> Result<(), UploadError> {
        if id == 0 {
            return Err(payload_error("Id must be different from 0"));
        }
        self.id = Some(id);
        Ok(())
    }

    pub fn set_id_str(&mut self, id: &str) -> Result<(), UploadError> {
        let value = parse_integer(id, "Id is not numeric", "Id number is too large")?;
        self.set_id(value)
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = Some(visible);
    }

    pub fn set_visible_str(&mut self, visible: &str) -> Result<(), UploadError> {
        match visible {
            "true" => self.set_visible(true),
            "false" => self.set_visible(false),
            _ => return Err(payload_error("Visible attribute is not a boolean")),
        }
        Ok(())
    }

    pub fn add_tag(&mut self, key: String, value: String) -> Result<(), UploadError> {
        if key.is_empty() {
            return Err(payload_error(format!("Key may not be empty in {}", self.label())));
        }

        if key.chars().count() > MAX_VALUE_LENGTH {
            return Err(payload_error(format!(
                "Key has more than {MAX_VALUE_LENGTH} unicode characters in {}",
                self.label()
            )));
        }

        if value.chars().count() > MAX_VALUE_LENGTH {
            return Err(payload_error(format!(
                "Value has more than {MAX_VALUE_LENGTH} unicode characters in {}",
                self.label()
            )));
        }

        if self.tags.contains_key(&key) {
            return Err(payload_error(format!(
                "{} has duplicate tags with key {key}",
                self.label()
            )));
        }

        self.tags.push_unchecked(key, value);
        Ok(())
    }

    // ======================================================================
    // Accessors
    // ======================================================================

    #[must_use]
    pub const fn object_type(&self) -> ObjectType {
        self.object_type
    }

    #[must_use]
    pub const fn changeset(&self) -> Option<ChangesetId> {
        self.changeset
    }

    #[must_use]
    pub const fn id(&self) -> Option<SignedObjectId> {
        self.id
    }

    /// Wire id, or `default` when the element never carried one.
    #[must_use]
    pub fn id_or(&self, default: SignedObjectId) -> SignedObjectId {
        self.id.unwrap_or(default)
    }

    #[must_use]
    pub const fn version(&self) -> Option<Version> {
        self.version
    }

    #[must_use]
    pub const fn visible(&self) -> Option<bool> {
        self.visible
    }

    #[must_use]
    pub const fn tags(&self) -> &TagList {
        &self.tags
    }

    /// Diagnostic label, e.g. `Node 5`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.object_type, self.id_or(0))
    }

    // ======================================================================
    // Validation
    // ======================================================================

    /// True once every mandatory common attribute has been supplied.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.changeset.is_some() && self.id.is_some() && self.version.is_some()
    }

    /// Checks common to all element kinds: a changeset reference must be
    /// present and the tag count must stay within the configured limit.
    pub fn check_core(&self, limits: &UploadLimits) -> Result<(), UploadError> {
        if self.changeset.is_none() {
            return Err(payload_error(
                "You need to supply a changeset to be able to make a change",
            ));
        }

        if let Some(max_tags) = limits.element_max_tags
            && self.tags.len() > max_tags as usize
        {
            return Err(payload_error(format!(
                "OSM element exceeds limit of {max_tags} tags"
            )));
        }

        Ok(())
    }
}

///
/// Element
///
/// Tagged sum over the three element kinds; the active entity of a parser.
///

#[derive(Clone, Debug)]
pub enum Element {
    Node(Node),
    Way(Way),
    Relation(Relation),
}

impl Element {
    #[must_use]
    pub fn new(object_type: ObjectType) -> Self {
        match object_type {
            ObjectType::Node => Self::Node(Node::new()),
            ObjectType::Way => Self::Way(Way::new()),
            ObjectType::Relation => Self::Relation(Relation::new()),
        }
    }

    #[must_use]
    pub const fn core(&self) -> &ElementCore {
        match self {
            Self::Node(n) => n.core(),
            Self::Way(w) => w.core(),
            Self::Relation(r) => r.core(),
        }
    }

    pub const fn core_mut(&mut self) -> &mut ElementCore {
        match self {
            Self::Node(n) => n.core_mut(),
            Self::Way(w) => w.core_mut(),
            Self::Relation(r) => r.core_mut(),
        }
    }

    #[must_use]
    pub const fn object_type(&self) -> ObjectType {
        match self {
            Self::Node(_) => ObjectType::Node,
            Self::Way(_) => ObjectType::Way,
            Self::Relation(_) => ObjectType::Relation,
        }
    }
}

// Shared by all the element setters; every violation is a BadRequest
// raised against the payload.
pub(crate) fn payload_error(message: impl Into<String>) -> UploadError {
    UploadError::bad_request(ErrorOrigin::Element, message)
}

pub(crate) fn parse_integer(
    input: &str,
    not_numeric: &str,
    too_large: &str,
) -> Result<i64, UploadError> {
    input.parse::<i64>().map_err(|err| match err.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => payload_error(too_large),
        _ => payload_error(not_numeric),
    })
}
