//! Acting user.

use serde::{Deserialize, Serialize};

/// Role of the acting user. Only used for tagging and display.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Clinician,
    Staff,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Clinician => "clinician",
            UserRole::Staff => "staff",
        }
    }

    /// Parse a role name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "clinician" => Some(UserRole::Clinician),
            "staff" => Some(UserRole::Staff),
            _ => None,
        }
    }
}

/// The user whose name is stamped on reports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    #[serde(default)]
    pub role: UserRole,
    pub name: String,
}

impl User {
    pub fn new(name: impl Into<String>, role: UserRole) -> Self {
        Self {
            role,
            name: name.into(),
        }
    }
}

impl Default for User {
    fn default() -> Self {
        Self::new("Dr. Smith", UserRole::Clinician)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!(UserRole::parse("Clinician"), Some(UserRole::Clinician));
        assert_eq!(UserRole::parse("staff"), Some(UserRole::Staff));
        assert_eq!(UserRole::parse("admin"), None);
    }

    #[test]
    fn test_user_json() {
        let json = serde_json::to_value(User::default()).unwrap();
        assert_eq!(json["role"], "clinician");
        assert_eq!(json["name"], "Dr. Smith");
    }
}
