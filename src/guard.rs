//! Role-gated navigation.
//!
//! The guard never decides on a session that is still being restored; it
//! reports `Loading` until the session store marks it ready.

use std::fmt;

use crate::auth::role::{home_for, LOGIN_PATH};
use crate::auth::{Role, Session};

/// What a route requires of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Anyone, logged in or not.
    Public,
    /// Any logged-in session.
    Authenticated,
    /// A session of exactly this role.
    Role(Role),
}

/// Path prefixes and the access they require. First match wins.
static PROTECTED_PREFIXES: [(&str, Option<Role>); 5] = [
    ("/admin", Some(Role::Admin)),
    ("/company", Some(Role::Company)),
    ("/user", Some(Role::User)),
    ("/notifications", None),
    ("/profile", None),
];

impl Access {
    /// Access level required by a path.
    pub fn for_path(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        for (prefix, role) in &PROTECTED_PREFIXES {
            if matches_prefix(path, prefix) {
                return match role {
                    Some(role) => Access::Role(role.clone()),
                    None => Access::Authenticated,
                };
            }
        }
        Access::Public
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Public => write!(f, "public"),
            Access::Authenticated => write!(f, "authenticated"),
            Access::Role(role) => write!(f, "role:{role}"),
        }
    }
}

/// `/admin` matches `/admin` and `/admin/...` but not `/administrators`.
fn matches_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Outcome of a guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session not ready yet; show a placeholder.
    Loading,
    /// Navigate elsewhere instead.
    Redirect(String),
    /// Render the protected content.
    Render,
}

impl fmt::Display for GuardDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardDecision::Loading => write!(f, "loading"),
            GuardDecision::Redirect(path) => write!(f, "redirect {path}"),
            GuardDecision::Render => write!(f, "render"),
        }
    }
}

pub struct RouteGuard;

impl RouteGuard {
    pub fn check(session: &Session, access: &Access) -> GuardDecision {
        if !session.ready {
            return GuardDecision::Loading;
        }

        match access {
            Access::Public => GuardDecision::Render,
            _ if session.token.is_none() => GuardDecision::Redirect(LOGIN_PATH.to_string()),
            Access::Role(required) if session.role.as_ref() != Some(required) => {
                let home = home_for(session.role.as_ref());
                tracing::debug!(%required, home, "Role mismatch, redirecting");
                GuardDecision::Redirect(home.to_string())
            }
            _ => GuardDecision::Render,
        }
    }

    /// Checks a concrete path.
    pub fn check_path(session: &Session, path: &str) -> GuardDecision {
        Self::check(session, &Access::for_path(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: Option<Role>) -> Session {
        Session {
            token: Some("tok".to_string()),
            role,
            profile: None,
            ready: true,
        }
    }

    #[test]
    fn test_loading_until_ready() {
        let pending = Session::empty();
        for access in [
            Access::Public,
            Access::Authenticated,
            Access::Role(Role::Admin),
        ] {
            assert_eq!(RouteGuard::check(&pending, &access), GuardDecision::Loading);
        }
    }

    #[test]
    fn test_public_always_renders() {
        assert_eq!(
            RouteGuard::check(&Session::cleared(), &Access::Public),
            GuardDecision::Render
        );
    }

    #[test]
    fn test_no_token_redirects_to_login() {
        let cleared = Session::cleared();
        assert_eq!(
            RouteGuard::check(&cleared, &Access::Authenticated),
            GuardDecision::Redirect("/login".to_string())
        );
        assert_eq!(
            RouteGuard::check(&cleared, &Access::Role(Role::User)),
            GuardDecision::Redirect("/login".to_string())
        );
    }

    #[test]
    fn test_role_mismatch_redirects_home() {
        let company = session(Some(Role::Company));
        assert_eq!(
            RouteGuard::check(&company, &Access::Role(Role::Admin)),
            GuardDecision::Redirect("/company/dashboard".to_string())
        );

        let admin = session(Some(Role::Admin));
        assert_eq!(
            RouteGuard::check(&admin, &Access::Role(Role::User)),
            GuardDecision::Redirect("/admin/dashboard".to_string())
        );
    }

    #[test]
    fn test_unknown_or_missing_role_redirects_to_login() {
        let odd = session(Some(Role::Unknown("moderator".to_string())));
        assert_eq!(
            RouteGuard::check(&odd, &Access::Role(Role::User)),
            GuardDecision::Redirect("/login".to_string())
        );
        assert_eq!(
            RouteGuard::check(&session(None), &Access::Role(Role::User)),
            GuardDecision::Redirect("/login".to_string())
        );
    }

    #[test]
    fn test_matching_role_renders() {
        let user = session(Some(Role::User));
        assert_eq!(
            RouteGuard::check(&user, &Access::Role(Role::User)),
            GuardDecision::Render
        );
        assert_eq!(
            RouteGuard::check(&user, &Access::Authenticated),
            GuardDecision::Render
        );
    }

    #[test]
    fn test_access_for_path() {
        assert_eq!(Access::for_path("/admin"), Access::Role(Role::Admin));
        assert_eq!(
            Access::for_path("/admin/users?page=2"),
            Access::Role(Role::Admin)
        );
        assert_eq!(
            Access::for_path("/company/jobs/new"),
            Access::Role(Role::Company)
        );
        assert_eq!(Access::for_path("/user/dashboard"), Access::Role(Role::User));
        assert_eq!(Access::for_path("/notifications"), Access::Authenticated);
        assert_eq!(Access::for_path("/profile/edit"), Access::Authenticated);
        assert_eq!(Access::for_path("/login"), Access::Public);
        assert_eq!(Access::for_path("/jobs/42"), Access::Public);
        assert_eq!(Access::for_path("/"), Access::Public);
        assert_eq!(Access::for_path("/administrators"), Access::Public);
        assert_eq!(Access::for_path("/users"), Access::Public);
    }

    #[test]
    fn test_check_path() {
        let user = session(Some(Role::User));
        assert_eq!(
            RouteGuard::check_path(&user, "/company/dashboard"),
            GuardDecision::Redirect("/user/dashboard".to_string())
        );
    }
}
