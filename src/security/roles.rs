//! Roles and their dashboards.

use std::fmt;

/// A caller's role, as carried in the session token.
///
/// The set is closed; any value the gate does not know becomes
/// [`RoleId::Unrecognized`], which has no dashboard and is routed like an
/// unusable identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoleId {
    HeadAdmin,
    Manager,
    Student,
    Partner,
    Reviewer,
    Unrecognized(String),
}

impl RoleId {
    /// Parse a wire role name. Never fails; unknown names are preserved.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "head_admin" => Self::HeadAdmin,
            "manager" => Self::Manager,
            "student" => Self::Student,
            "partner" => Self::Partner,
            "reviewer" => Self::Reviewer,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    /// Wire name of the role.
    pub fn as_str(&self) -> &str {
        match self {
            Self::HeadAdmin => "head_admin",
            Self::Manager => "manager",
            Self::Student => "student",
            Self::Partner => "partner",
            Self::Reviewer => "reviewer",
            Self::Unrecognized(raw) => raw,
        }
    }

    /// Default landing path for the role.
    pub fn dashboard(&self) -> Option<&'static str> {
        match self {
            Self::HeadAdmin => Some("/admin-dashboard"),
            Self::Manager => Some("/manager-dashboard"),
            Self::Student => Some("/student-dashboard"),
            Self::Partner => Some("/partner-dashboard"),
            Self::Reviewer => Some("/reviewer-dashboard"),
            Self::Unrecognized(_) => None,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_roles_round_trip_names() {
        for name in ["head_admin", "manager", "student", "partner", "reviewer"] {
            let role = RoleId::parse(name);
            assert!(role.is_recognized());
            assert_eq!(role.as_str(), name);
            assert!(role.dashboard().is_some());
        }
    }

    #[test]
    fn test_unknown_role_has_no_dashboard() {
        let role = RoleId::parse("superuser");
        assert_eq!(role, RoleId::Unrecognized("superuser".into()));
        assert_eq!(role.dashboard(), None);
        assert_eq!(role.to_string(), "superuser");
    }

    #[test]
    fn test_role_names_are_case_sensitive() {
        assert!(!RoleId::parse("Student").is_recognized());
    }

    #[test]
    fn test_dashboards() {
        assert_eq!(RoleId::HeadAdmin.dashboard(), Some("/admin-dashboard"));
        assert_eq!(RoleId::Student.dashboard(), Some("/student-dashboard"));
    }
}
