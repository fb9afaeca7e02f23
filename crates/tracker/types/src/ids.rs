//! Surrogate identifiers for every persisted row.
//!
//! Each identifier is an opaque string newtype. Freshly created rows get a
//! random v4 UUID; rows imported from elsewhere may carry any stable key.

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn short(&self) -> &str {
                match self.0.char_indices().nth(8) {
                    Some((end, _)) => &self.0[..end],
                    None => &self.0,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

define_id!(
    /// Authenticated principal, supplied by the identity layer.
    UserId
);
define_id!(
    /// Flat user group.
    GroupId
);
define_id!(ProjectId);
define_id!(IssueId);
define_id!(IssueTypeId);
define_id!(PermissionSchemeId);
define_id!(
    /// Row id of a single scheme grant.
    GrantId
);
define_id!(
    /// Project role (named actor set).
    RoleId
);
define_id!(GlobalRoleId);
define_id!(GlobalGrantId);
define_id!(WorkflowId);
define_id!(StatusId);
define_id!(TransitionId);
define_id!(WorkflowSchemeId);
define_id!(ScreenId);
define_id!(
    /// Custom field definition.
    CustomFieldId
);
define_id!(
    /// Row id shared by conditions, validators and post-functions.
    RuleId
);
define_id!(CommentId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(IssueId::generate(), IssueId::generate());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = StatusId::new("todo");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"todo\"");
        let back: StatusId = serde_json::from_str("\"todo\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn short_form_truncates() {
        assert_eq!(UserId::new("abcdefghijk").short(), "abcdefgh");
        assert_eq!(UserId::new("abc").short(), "abc");
    }
}
