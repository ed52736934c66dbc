use serde::{Deserialize, Serialize};
use std::fmt;

pub type ConnectionId = u64;
pub type CommandId = u32;

/// Display name given to participants who join without one.
pub const ANONYMOUS: &str = "Anonymous";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Shared secret of a room. Opaque, compared byte for byte.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl From<&str> for Credential {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Edit,
    #[serde(alias = "read-only", alias = "readonly")]
    View,
}

impl Default for Permission {
    fn default() -> Self {
        Permission::Edit
    }
}

impl Permission {
    pub fn is_editable(self) -> bool {
        self == Permission::Edit
    }
}

/// Trims the requested name, falling back to [`ANONYMOUS`] when nothing is left.
pub fn normalize_display_name(name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_owned(),
        _ => ANONYMOUS.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_falls_back_to_anonymous() {
        assert_eq!(normalize_display_name(None), "Anonymous");
        assert_eq!(normalize_display_name(Some("   ")), "Anonymous");
        assert_eq!(normalize_display_name(Some(" alice ")), "alice");
    }

    #[test]
    fn it_hides_credential_in_debug_output() {
        let credential = Credential::new("hunter2");
        assert!(!format!("{:?}", credential).contains("hunter2"));
    }

    #[test]
    fn it_defaults_to_edit_permission() {
        assert!(Permission::default().is_editable());
        assert!(!Permission::View.is_editable());
    }
}
