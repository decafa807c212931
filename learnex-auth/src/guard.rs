//! Route Guard - the authorization checkpoint in front of every resource

use crate::access::AccessControlTable;
use crate::session::{Principal, SessionManager};
use crate::{AuthError, AuthResult};
use learnex_core::Role;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Presentation collaborator driven by the guard
pub trait ViewLayer: Send + Sync {
    /// Whatever rendering a resource produces
    type View;

    fn render_view(&self, resource: &str, principal: &Principal) -> Self::View;

    fn show_login_prompt(&self);

    fn show_access_denied(&self, resource: &str, role: Role);
}

/// Result of a guarded navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome<T> {
    /// The action ran and produced `T`
    Granted(T),
    /// No valid session; `expired` distinguishes a timed-out session from none at all
    RedirectToLogin { expired: bool },
    AccessDenied { resource: String, role: Role },
}

impl<T> GuardOutcome<T> {
    /// Whether the guarded action executed
    pub fn executed(&self) -> bool {
        matches!(self, GuardOutcome::Granted(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> GuardOutcome<U> {
        match self {
            GuardOutcome::Granted(value) => GuardOutcome::Granted(f(value)),
            GuardOutcome::RedirectToLogin { expired } => GuardOutcome::RedirectToLogin { expired },
            GuardOutcome::AccessDenied { resource, role } => {
                GuardOutcome::AccessDenied { resource, role }
            }
        }
    }

    pub fn into_result(self) -> AuthResult<T> {
        match self {
            GuardOutcome::Granted(value) => Ok(value),
            GuardOutcome::RedirectToLogin { expired: true } => Err(AuthError::SessionExpired),
            GuardOutcome::RedirectToLogin { expired: false } => Err(AuthError::NotAuthenticated),
            GuardOutcome::AccessDenied { resource, role } => {
                Err(AuthError::AccessDenied { resource, role })
            }
        }
    }
}

/// Gates navigation on a valid session and the access table
pub struct RouteGuard<V> {
    sessions: SessionManager,
    access: Arc<AccessControlTable>,
    view: Arc<V>,
}

impl<V> Clone for RouteGuard<V> {
    fn clone(&self) -> Self {
        Self {
            sessions: self.sessions.clone(),
            access: self.access.clone(),
            view: self.view.clone(),
        }
    }
}

impl<V: ViewLayer> RouteGuard<V> {
    pub fn new(sessions: SessionManager, access: Arc<AccessControlTable>, view: Arc<V>) -> Self {
        Self {
            sessions,
            access,
            view,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn access(&self) -> &AccessControlTable {
        &self.access
    }

    /// Run `action` if the current user may open `resource`. Otherwise drive
    /// the view layer to the login prompt or the access-denied notice.
    ///
    /// Session store failures are returned as `Err` and leave the session in
    /// place; they are not a reason to send the user back to the login page.
    pub async fn guard<T, F>(&self, resource: &str, action: F) -> AuthResult<GuardOutcome<T>>
    where
        F: FnOnce(&Principal) -> T,
    {
        let principal = match self.resolve_principal().await? {
            Ok(principal) => principal,
            Err(outcome) => return Ok(outcome),
        };

        Ok(self.authorize(resource, &principal, action).await)
    }

    /// Render `resource` through the view layer, guarded
    pub async fn navigate(&self, resource: &str) -> AuthResult<GuardOutcome<V::View>> {
        self.guard(resource, |principal| self.view.render_view(resource, principal))
            .await
    }

    /// Render the current user's home dashboard, guarded
    pub async fn navigate_home(&self) -> AuthResult<GuardOutcome<V::View>> {
        let principal = match self.resolve_principal().await? {
            Ok(principal) => principal,
            Err(outcome) => return Ok(outcome),
        };

        let resource = principal.role.home_resource();
        Ok(self
            .authorize(resource, &principal, |principal| {
                self.view.render_view(resource, principal)
            })
            .await)
    }

    async fn resolve_principal<T>(&self) -> AuthResult<Result<Principal, GuardOutcome<T>>> {
        match self.sessions.require_session().await {
            Ok(session) => Ok(Ok(session.user)),
            Err(e @ (AuthError::SessionExpired | AuthError::NotAuthenticated)) => {
                let expired = matches!(e, AuthError::SessionExpired);
                self.view.show_login_prompt();
                Ok(Err(GuardOutcome::RedirectToLogin { expired }))
            }
            Err(e) => {
                error!("Session check failed: {}", e);
                Err(e)
            }
        }
    }

    async fn authorize<T, F>(
        &self,
        resource: &str,
        principal: &Principal,
        action: F,
    ) -> GuardOutcome<T>
    where
        F: FnOnce(&Principal) -> T,
    {
        if !self.access.can_access(resource, principal.role) {
            warn!(
                "Access denied: {} ({}) -> {}",
                principal.identifier, principal.role, resource
            );
            self.view.show_access_denied(resource, principal.role);
            return GuardOutcome::AccessDenied {
                resource: resource.to_string(),
                role: principal.role,
            };
        }

        self.sessions.touch().await;
        debug!("Access granted: {} -> {}", principal.identifier, resource);
        GuardOutcome::Granted(action(principal))
    }
}
