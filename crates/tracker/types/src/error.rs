use thiserror::Error;

/// Failures converting between wire/relational encodings and domain types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown permission: {0}")]
    UnknownPermission(String),

    #[error("unknown grantee type: {0}")]
    UnknownGranteeType(String),

    #[error("invalid grantee: {0}")]
    InvalidGrantee(String),

    #[error("unknown global role: {0}")]
    UnknownGlobalRole(String),

    #[error("unknown status category: {0}")]
    UnknownStatusCategory(String),

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("field {field} cannot hold value {found}")]
    FieldType { field: String, found: String },
}
