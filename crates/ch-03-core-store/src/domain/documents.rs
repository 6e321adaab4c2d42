//! Document layout
//!
//! ```text
//! <root>/<name>.xml                     global document
//! <root>/users/<user>/<category>.xml    per-user document
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{StoreError, StoreResult};

/// File extension of persisted documents.
pub const DOCUMENT_EXT: &str = "xml";

/// Directory under the store root holding per-user documents.
pub const USERS_DIR: &str = "users";

/// Per-user document categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserCategory {
    Profile,
    Preferences,
    Contacts,
    Friends,
    Groups,
    History,
    DeviceSettings,
    Announcements,
}

impl UserCategory {
    pub const ALL: [UserCategory; 8] = [
        Self::Profile,
        Self::Preferences,
        Self::Contacts,
        Self::Friends,
        Self::Groups,
        Self::History,
        Self::DeviceSettings,
        Self::Announcements,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Preferences => "preferences",
            Self::Contacts => "contacts",
            Self::Friends => "friends",
            Self::Groups => "groups",
            Self::History => "history",
            Self::DeviceSettings => "device-settings",
            Self::Announcements => "announcements",
        }
    }
}

impl fmt::Display for UserCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserCategory {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| StoreError::InvalidPath {
                path: s.to_string(),
                message: "unknown user document category".into(),
            })
    }
}

/// Reject anything that is not a single plain path segment.
pub fn validate_segment(segment: &str) -> StoreResult<()> {
    let bad = segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains(['/', '\\', '\0']);
    if bad {
        return Err(StoreError::InvalidPath {
            path: segment.to_string(),
            message: "must be a single non-empty path segment".into(),
        });
    }
    Ok(())
}

/// Relative path of a global document.
pub fn global_path(name: &str) -> StoreResult<String> {
    validate_segment(name)?;
    Ok(format!("{name}.{DOCUMENT_EXT}"))
}

/// Relative path of a user's directory.
pub fn user_dir_path(user: &str) -> StoreResult<String> {
    validate_segment(user)?;
    Ok(format!("{USERS_DIR}/{user}"))
}

/// Relative path of a per-user document.
pub fn user_path(user: &str, category: UserCategory) -> StoreResult<String> {
    Ok(format!("{}/{}.{DOCUMENT_EXT}", user_dir_path(user)?, category.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(global_path("settings").unwrap(), "settings.xml");
        assert_eq!(
            user_path("alice", UserCategory::DeviceSettings).unwrap(),
            "users/alice/device-settings.xml"
        );
    }

    #[test]
    fn test_traversal_rejected() {
        assert!(global_path("../etc/passwd").is_err());
        assert!(user_path("..", UserCategory::Profile).is_err());
        assert!(user_path("", UserCategory::Profile).is_err());
    }

    #[test]
    fn test_category_parse() {
        for c in UserCategory::ALL {
            assert_eq!(c.as_str().parse::<UserCategory>().unwrap(), c);
        }
        assert!("wallet".parse::<UserCategory>().is_err());
    }
}
