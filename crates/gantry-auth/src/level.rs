//! Permission levels.

use serde::{Deserialize, Serialize};

/// The kind of access requested on a twin element.
///
/// Levels are independent parameters of an authorization decision; they
/// are **not** compared with each other. An engine may grant `Read`
/// without `Describe` or `Act` without `Read`.
///
/// | Level | Used by |
/// |-------|---------|
/// | `Describe` | descriptions, snapshots, lifecycle notifications |
/// | `Read` | value/metadata reads, data/metadata notifications |
/// | `Update` | value/metadata writes, provider links |
/// | `Act` | action invocation, action notifications |
///
/// # Example
///
/// ```
/// use gantry_auth::PermissionLevel;
///
/// assert_eq!(PermissionLevel::Read.as_str(), "READ");
/// assert_eq!(PermissionLevel::Act.verb(), "act on");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionLevel {
    /// See that an element exists and how it is shaped.
    Describe,
    /// Read current values and metadata.
    Read,
    /// Write values and metadata.
    Update,
    /// Invoke actions.
    Act,
}

impl PermissionLevel {
    /// All levels, in declaration order.
    pub const ALL: [PermissionLevel; 4] = [Self::Describe, Self::Read, Self::Update, Self::Act];

    /// Returns the wire name of this level.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Describe => "DESCRIBE",
            Self::Read => "READ",
            Self::Update => "UPDATE",
            Self::Act => "ACT",
        }
    }

    /// Returns the verb used in permission error messages.
    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Describe => "describe",
            Self::Read => "read",
            Self::Update => "update",
            Self::Act => "act on",
        }
    }
}

impl std::fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_match_serde() {
        for level in PermissionLevel::ALL {
            let json = serde_json::to_string(&level).expect("serialize level");
            assert_eq!(json, format!("\"{}\"", level.as_str()));
        }
    }

    #[test]
    fn display_uses_wire_name() {
        assert_eq!(PermissionLevel::Describe.to_string(), "DESCRIBE");
        assert_eq!(PermissionLevel::Update.to_string(), "UPDATE");
    }
}
