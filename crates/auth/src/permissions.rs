use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission scope granted to a session.
///
/// Scopes are opaque strings of the form `"<resource>.<action>"`
/// (e.g. `"employee.read"`, `"holiday.delete"`). Comparison is exact and
/// case-sensitive; there is no wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resource part (everything before the last `.`), if the scope has one.
    pub fn resource(&self) -> Option<&str> {
        self.as_str().rsplit_once('.').map(|(resource, _)| resource)
    }

    /// Action part (everything after the last `.`), if the scope has one.
    pub fn action(&self) -> Option<&str> {
        self.as_str().rsplit_once('.').map(|(_, action)| action)
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl core::borrow::Borrow<str> for Permission {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<str> for Permission {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<&'static str> for Permission {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Permission {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_resource_and_action() {
        let p = Permission::new("employee.read");
        assert_eq!(p.resource(), Some("employee"));
        assert_eq!(p.action(), Some("read"));

        let nested = Permission::new("admin.users.delete");
        assert_eq!(nested.resource(), Some("admin.users"));
        assert_eq!(nested.action(), Some("delete"));
    }

    #[test]
    fn scope_without_separator_has_no_parts() {
        let p = Permission::new("superuser");
        assert_eq!(p.resource(), None);
        assert_eq!(p.action(), None);
    }

    #[test]
    fn equality_is_case_sensitive() {
        assert_ne!(Permission::new("employee.read"), Permission::new("Employee.Read"));
        assert_eq!(Permission::new("employee.read"), Permission::from("employee.read".to_string()));
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&Permission::new("role.update")).unwrap();
        assert_eq!(json, "\"role.update\"");
    }
}
