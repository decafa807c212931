//! Access Control Table
//!
//! Static mapping of resource name to the roles allowed to open it. Loaded
//! once and never mutated afterwards; resource names are case-insensitive.

use learnex_core::{AccessPolicy, AccessSettings, Role};
use std::collections::{HashMap, HashSet};
use tracing::debug;

const ALL_ROLES: &[Role] = &Role::ALL;

/// Built-in LearnEx rules
const DEFAULT_RULES: &[(&str, &[Role])] = &[
    ("users", &[Role::Admin]),
    ("settings", &[Role::Admin]),
    ("reports", &[Role::Admin]),
    ("admin-dashboard", &[Role::Admin]),
    ("teacher-dashboard", &[Role::Teacher]),
    ("student-dashboard", &[Role::Student]),
    ("parent-dashboard", &[Role::Parent]),
    ("courses", &[Role::Admin, Role::Teacher, Role::Student]),
    ("grades", ALL_ROLES),
    ("attendance", &[Role::Admin, Role::Teacher, Role::Parent]),
    ("assignments", &[Role::Teacher, Role::Student]),
    ("children", &[Role::Parent]),
    ("profile", ALL_ROLES),
];

/// Resource → allowed roles, plus the policy for unlisted resources
#[derive(Debug, Clone)]
pub struct AccessControlTable {
    rules: HashMap<String, HashSet<Role>>,
    policy: AccessPolicy,
}

impl Default for AccessControlTable {
    fn default() -> Self {
        Self::learnex_default()
    }
}

impl AccessControlTable {
    /// Empty table
    pub fn new(policy: AccessPolicy) -> Self {
        Self {
            rules: HashMap::new(),
            policy,
        }
    }

    /// The LearnEx table, fail-closed
    pub fn learnex_default() -> Self {
        DEFAULT_RULES
            .iter()
            .fold(Self::new(AccessPolicy::FailClosed), |table, (resource, roles)| {
                table.with_rule(resource, roles.iter().copied())
            })
    }

    /// Table from configuration; no configured rules means the LearnEx table
    pub fn from_settings(settings: &AccessSettings) -> Self {
        let table = if settings.rules.is_empty() {
            Self::learnex_default()
        } else {
            settings
                .rules
                .iter()
                .fold(Self::new(settings.policy), |table, (resource, roles)| {
                    table.with_rule(resource, roles.iter().copied())
                })
        };

        let table = table.with_policy(settings.policy);
        debug!(
            "Access table loaded: {} rules, policy {}",
            table.rules.len(),
            table.policy
        );
        table
    }

    /// Add (or replace) the rule for `resource`
    pub fn with_rule(mut self, resource: &str, roles: impl IntoIterator<Item = Role>) -> Self {
        self.rules.insert(resource_key(resource), roles.into_iter().collect());
        self
    }

    pub fn with_policy(mut self, policy: AccessPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> AccessPolicy {
        self.policy
    }

    /// Whether `role` may open `resource`. Unlisted resources follow the policy.
    pub fn can_access(&self, resource: &str, role: Role) -> bool {
        match self.rules.get(&resource_key(resource)) {
            Some(roles) => roles.contains(&role),
            None => self.policy == AccessPolicy::FailOpen,
        }
    }

    /// Roles listed for `resource`, in [`Role::ALL`] order
    pub fn allowed_roles(&self, resource: &str) -> Option<Vec<Role>> {
        self.rules.get(&resource_key(resource)).map(|roles| {
            Role::ALL
                .iter()
                .copied()
                .filter(|role| roles.contains(role))
                .collect()
        })
    }

    pub fn is_listed(&self, resource: &str) -> bool {
        self.rules.contains_key(&resource_key(resource))
    }

    /// Listed resources `role` may open, sorted
    pub fn resources_for(&self, role: Role) -> Vec<String> {
        let mut resources: Vec<String> = self
            .rules
            .iter()
            .filter(|(_, roles)| roles.contains(&role))
            .map(|(resource, _)| resource.clone())
            .collect();
        resources.sort();
        resources
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn resource_key(resource: &str) -> String {
    resource.trim().to_lowercase()
}
