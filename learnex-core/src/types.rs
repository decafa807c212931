//! Core data type definitions

use serde::{Deserialize, Serialize};

/// Role of a LearnEx user
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// School administrator
    Admin,
    /// Teaching staff
    Teacher,
    /// Enrolled student
    #[default]
    Student,
    /// Parent or guardian of a student
    Parent,
}

impl Role {
    /// All roles, in display order
    pub const ALL: [Role; 4] = [Role::Admin, Role::Teacher, Role::Student, Role::Parent];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
            Role::Parent => "parent",
        }
    }

    /// Resource name of the dashboard this role lands on after login
    pub fn home_resource(&self) -> &'static str {
        match self {
            Role::Admin => "admin-dashboard",
            Role::Teacher => "teacher-dashboard",
            Role::Student => "student-dashboard",
            Role::Parent => "parent-dashboard",
        }
    }

    /// Whether an anonymous visitor may register an account with this role
    pub fn is_self_registrable(&self) -> bool {
        matches!(self, Role::Student | Role::Parent)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            "parent" => Ok(Role::Parent),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// How the access table treats resources it has no rule for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPolicy {
    /// Unlisted resources are denied
    #[default]
    FailClosed,
    /// Unlisted resources are public
    FailOpen,
}

impl std::fmt::Display for AccessPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessPolicy::FailClosed => write!(f, "fail_closed"),
            AccessPolicy::FailOpen => write!(f, "fail_open"),
        }
    }
}

impl std::str::FromStr for AccessPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "fail_closed" | "closed" => Ok(AccessPolicy::FailClosed),
            "fail_open" | "open" => Ok(AccessPolicy::FailOpen),
            _ => Err(format!("Unknown access policy: {}", s)),
        }
    }
}
