//! JSON view layer
//!
//! Renders resources as JSON documents for the front end. The login prompt
//! and access-denied notice are carried by the HTTP error responses, so those
//! hooks only log.

use learnex_auth::{AccessControlTable, Principal, Role, ViewLayer};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct DashboardViews {
    access: Arc<AccessControlTable>,
}

impl DashboardViews {
    pub fn new(access: Arc<AccessControlTable>) -> Self {
        Self { access }
    }

    /// Resources the principal can navigate to, dashboards excluded
    fn navigation(&self, role: Role) -> Vec<String> {
        self.access
            .resources_for(role)
            .into_iter()
            .filter(|resource| !resource.ends_with("-dashboard"))
            .collect()
    }
}

/// Human title for a resource name: `admin-dashboard` → `Admin Dashboard`
pub fn title_for(resource: &str) -> String {
    resource
        .split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl ViewLayer for DashboardViews {
    type View = Value;

    fn render_view(&self, resource: &str, principal: &Principal) -> Value {
        let resource = resource.trim().to_lowercase();
        json!({
            "resource": resource,
            "title": title_for(&resource),
            "user": principal,
            "home": principal.role.home_resource(),
            "navigation": self.navigation(principal.role),
        })
    }

    fn show_login_prompt(&self) {
        debug!("Directing client to login");
    }

    fn show_access_denied(&self, resource: &str, role: Role) {
        debug!("Showing access denied for {} to {}", resource, role);
    }
}
