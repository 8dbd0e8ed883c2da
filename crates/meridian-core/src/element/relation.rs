use crate::{
    config::UploadLimits,
    element::{ElementCore, MAX_VALUE_LENGTH, parse_integer, payload_error},
    error::UploadError,
};
use meridian_primitives::{ObjectType, Operation, SignedObjectId};

///
/// Member
///
/// One entry of a relation's ordered member list. Built incrementally by
/// the parsers; `is_valid` gates the mandatory fields before the member is
/// attached to its relation.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Member {
    member_type: Option<ObjectType>,
    member_ref: Option<SignedObjectId>,
    role: String,
}

impl Member {
    #[must_use]
    pub fn new(member_type: ObjectType, member_ref: SignedObjectId, role: impl Into<String>) -> Self {
        Self {
            member_type: Some(member_type),
            member_ref: Some(member_ref),
            role: role.into(),
        }
    }

    pub fn set_type(&mut self, member_type: &str) -> Result<(), UploadError> {
        // case-insensitive per the wire format
        self.member_type = Some(if member_type.eq_ignore_ascii_case("Node") {
            ObjectType::Node
        } else if member_type.eq_ignore_ascii_case("Way") {
            ObjectType::Way
        } else if member_type.eq_ignore_ascii_case("Relation") {
            ObjectType::Relation
        } else {
            return Err(payload_error(format!(
                "Invalid type {member_type} in member relation"
            )));
        });
        Ok(())
    }

    pub fn set_role(&mut self, role: String) -> Result<(), UploadError> {
        if role.chars().count() > MAX_VALUE_LENGTH {
            return Err(payload_error(
                "Relation Role has more than 255 unicode characters",
            ));
        }
        self.role = role;
        Ok(())
    }

    pub fn set_ref(&mut self, member_ref: SignedObjectId) -> Result<(), UploadError> {
        if member_ref == 0 {
            return Err(payload_error("Relation member 'ref' attribute may not be 0"));
        }
        self.member_ref = Some(member_ref);
        Ok(())
    }

    pub fn set_ref_str(&mut self, member_ref: &str) -> Result<(), UploadError> {
        let value = parse_integer(
            member_ref,
            "Relation member 'ref' attribute is not numeric",
            "Relation member 'ref' attribute value is too large",
        )?;
        self.set_ref(value)
    }

    pub fn is_valid(&self) -> Result<bool, UploadError> {
        if self.member_type.is_none() {
            return Err(payload_error("Missing 'type' attribute in Relation member"));
        }
        if self.member_ref.is_none() {
            return Err(payload_error("Missing 'ref' attribute in Relation member"));
        }
        Ok(true)
    }

    #[must_use]
    pub fn member_type(&self) -> ObjectType {
        self.member_type.expect("validated member")
    }

    #[must_use]
    pub fn member_ref(&self) -> SignedObjectId {
        self.member_ref.expect("validated member")
    }

    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }
}

///
/// Relation
///

#[derive(Clone, Debug)]
pub struct Relation {
    core: ElementCore,
    members: Vec<Member>,
}

impl Default for Relation {
    fn default() -> Self {
        Self::new()
    }
}

impl Relation {
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: ElementCore::new(ObjectType::Relation),
            members: Vec::new(),
        }
    }

    #[must_use]
    pub const fn core(&self) -> &ElementCore {
        &self.core
    }

    pub const fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    #[must_use]
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn add_member(&mut self, member: Member) -> Result<(), UploadError> {
        if !member.is_valid()? {
            return Err(payload_error(
                "Relation member does not include all mandatory fields",
            ));
        }
        self.members.push(member);
        Ok(())
    }

    pub fn is_valid(&self, op: Operation, limits: &UploadLimits) -> Result<bool, UploadError> {
        self.core.check_core(limits)?;

        if op == Operation::Delete {
            return Ok(self.core.is_complete());
        }

        if let Some(max_members) = limits.relation_max_members
            && self.members.len() > max_members as usize
        {
            return Err(payload_error(format!(
                "You tried to add {} members to relation {}, however only {} are allowed",
                self.members.len(),
                self.core.id_or(0),
                max_members
            )));
        }

        Ok(self.core.is_complete())
    }
}
