//! Caller identity and the privilege ladder used by every entry point.

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Privilege tiers, lowest first. Ordering is meaningful: a caller holding
/// `Admin` satisfies any check that requires `ContentEditor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Viewer,
    ContentEditor,
    Admin,
    Owner,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::ContentEditor => "content_editor",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "viewer" => Ok(Role::Viewer),
            "content_editor" | "editor" => Ok(Role::ContentEditor),
            "admin" => Ok(Role::Admin),
            "owner" => Ok(Role::Owner),
            _ => Err(CoreError::UnknownVariant {
                kind: "role",
                value: s.to_string(),
            }),
        }
    }
}

/// Authenticated caller attached to a request or CLI invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Caller {
    pub id: String,
    pub role: Role,
}

impl Caller {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    /// Local operator identity used by the CLI and scheduled jobs.
    #[must_use]
    pub fn system() -> Self {
        Self::new("system", Role::Owner)
    }

    /// # Errors
    ///
    /// Returns [`CoreError::Forbidden`] when the caller's role is below `required`.
    pub fn require(&self, required: Role) -> Result<(), CoreError> {
        if self.role >= required {
            Ok(())
        } else {
            Err(CoreError::Forbidden {
                caller: self.id.clone(),
                actual: self.role,
                required,
            })
        }
    }
}
