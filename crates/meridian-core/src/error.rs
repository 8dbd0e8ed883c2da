use std::fmt;
use thiserror::Error as ThisError;

///
/// UploadError
///
/// Classified upload failure. Every error carries the HTTP-facing kind, the
/// component it originated in, and a single-sentence diagnostic; parse
/// errors additionally embed the input line/column in the message when the
/// location is known.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct UploadError {
    pub kind: ErrorKind,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl UploadError {
    pub fn new(kind: ErrorKind, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin,
            message: message.into(),
        }
    }

    pub fn bad_request(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, origin, message)
    }

    pub fn conflict(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, origin, message)
    }

    pub fn not_found(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, origin, message)
    }

    pub fn gone(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Gone, origin, message)
    }

    pub fn precondition_failed(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PreconditionFailed, origin, message)
    }

    pub fn payload_too_large(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PayloadTooLarge, origin, message)
    }

    pub fn too_many_requests(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TooManyRequests, origin, message)
    }

    pub fn unauthorized(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, origin, message)
    }

    pub fn forbidden(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, origin, message)
    }

    pub fn internal(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, origin, message)
    }

    /// HTTP status this error maps to at the boundary.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    #[must_use]
    pub fn display_with_kind(&self) -> String {
        format!("{}:{}: {}", self.origin, self.kind, self.message)
    }
}

///
/// ErrorKind
///
/// Design-level error taxonomy, one variant per HTTP-facing outcome.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    Gone,
    PreconditionFailed,
    PayloadTooLarge,
    TooManyRequests,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Gone => 410,
            Self::PreconditionFailed => 412,
            Self::PayloadTooLarge => 413,
            Self::TooManyRequests => 429,
            Self::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BadRequest => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Gone => "gone",
            Self::PreconditionFailed => "precondition_failed",
            Self::PayloadTooLarge => "payload_too_large",
            Self::TooManyRequests => "too_many_requests",
            Self::Internal => "internal",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
///
/// Component that raised the error; diagnostic classification only.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Parser,
    Element,
    Handler,
    Changeset,
    NodeUpdater,
    WayUpdater,
    RelationUpdater,
    Store,
    DiffResult,
    Upload,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Parser => "parser",
            Self::Element => "element",
            Self::Handler => "handler",
            Self::Changeset => "changeset",
            Self::NodeUpdater => "node_updater",
            Self::WayUpdater => "way_updater",
            Self::RelationUpdater => "relation_updater",
            Self::Store => "store",
            Self::DiffResult => "diffresult",
            Self::Upload => "upload",
        };
        write!(f, "{label}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_boundary_table() {
        assert_eq!(ErrorKind::BadRequest.status_code(), 400);
        assert_eq!(ErrorKind::Conflict.status_code(), 409);
        assert_eq!(ErrorKind::Gone.status_code(), 410);
        assert_eq!(ErrorKind::PreconditionFailed.status_code(), 412);
        assert_eq!(ErrorKind::PayloadTooLarge.status_code(), 413);
        assert_eq!(ErrorKind::Internal.status_code(), 500);
    }

    #[test]
    fn display_with_kind_prefixes_origin_and_kind() {
        let err = UploadError::conflict(ErrorOrigin::Changeset, "The user doesn't own that changeset");
        assert_eq!(
            err.display_with_kind(),
            "changeset:conflict: The user doesn't own that changeset"
        );
        assert_eq!(err.to_string(), "The user doesn't own that changeset");
    }
}
