//! Role-based routing decisions.
//!
//! # Responsibilities
//! - Combine a path classification with the outcome of token verification
//! - Pick the caller's dashboard (token override first, role default second)
//! - Build sign-in redirects that carry the original path
//!
//! # Design Decisions
//! - Pure function; no I/O, no clock, no shared state
//! - Every verification failure is matched explicitly
//! - A misconfigured secret wins over every other outcome on gated paths
//! - Unrecognised roles are treated as unauthenticated

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::routing::classifier::{normalize_path, PathClassification};
use crate::security::{RoleId, SessionPayload, TokenError};

/// Characters left alone by `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// What the gate does with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision {
    /// Forward unchanged.
    Allow,
    /// Forward with trusted identity headers.
    AllowWithHeaders { subject_id: String, role: RoleId },
    /// Answer with a redirect, optionally invalidating the session cookie.
    RedirectTo { location: String, clear_cookie: bool },
    /// The gate cannot verify anything; answer 500.
    ConfigError,
}

impl RoutingDecision {
    /// Label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::AllowWithHeaders { .. } => "allow_with_headers",
            Self::RedirectTo { .. } => "redirect",
            Self::ConfigError => "config_error",
        }
    }

    fn redirect(location: impl Into<String>, clear_cookie: bool) -> Self {
        Self::RedirectTo {
            location: location.into(),
            clear_cookie,
        }
    }
}

/// Paths the router needs to know about.
#[derive(Debug, Clone)]
pub struct RouterPaths {
    pub sign_in: String,
}

impl RouterPaths {
    /// Sign-in URL that sends the caller back to `path` afterwards.
    pub fn sign_in_returning_to(&self, path: &str) -> String {
        format!(
            "{}?redirect={}",
            self.sign_in,
            utf8_percent_encode(path, URI_COMPONENT)
        )
    }

    /// The dashboard a verified caller belongs on, if any.
    pub fn dashboard_for(&self, payload: &SessionPayload) -> Option<String> {
        let default = payload.role.dashboard()?;
        match payload.dashboard_override.as_deref() {
            Some(custom) if self.is_safe_dashboard(custom) => Some(custom.to_string()),
            _ => Some(default.to_string()),
        }
    }

    /// A bare, already-canonical path below `/` that is not the sign-in page.
    /// Anything else could redirect off-site or never match the request path.
    fn is_safe_dashboard(&self, candidate: &str) -> bool {
        candidate.starts_with('/')
            && candidate != "/"
            && !candidate.contains(|c: char| c == '?' || c == '#')
            && candidate.chars().all(|c| c.is_ascii_graphic() && c != '\\')
            && normalize_path(candidate) == candidate
            && candidate != self.sign_in
    }
}

/// True when `path` is `root` or below it.
fn is_within(path: &str, root: &str) -> bool {
    let root = root.trim_end_matches('/');
    match path.strip_prefix(root) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Decide what to do with a request.
///
/// `path` must already be normalised.
pub fn route(
    path: &str,
    classification: PathClassification,
    verification: &Result<SessionPayload, TokenError>,
    paths: &RouterPaths,
) -> RoutingDecision {
    match classification {
        PathClassification::StaticAsset => RoutingDecision::Allow,

        PathClassification::Public => match verification {
            Ok(payload) if path == paths.sign_in => match paths.dashboard_for(payload) {
                Some(dashboard) => RoutingDecision::redirect(dashboard, false),
                None => RoutingDecision::Allow,
            },
            _ => RoutingDecision::Allow,
        },

        PathClassification::ApiRoute => match verification {
            Err(TokenError::Config(_)) => RoutingDecision::ConfigError,
            Ok(payload) if payload.role.is_recognized() => RoutingDecision::AllowWithHeaders {
                subject_id: payload.subject_id.clone(),
                role: payload.role.clone(),
            },
            Ok(_) => RoutingDecision::Allow,
            Err(TokenError::Missing)
            | Err(TokenError::Malformed)
            | Err(TokenError::InvalidSignature)
            | Err(TokenError::Expired) => RoutingDecision::Allow,
        },

        PathClassification::Protected => match verification {
            Err(TokenError::Config(_)) => RoutingDecision::ConfigError,
            Err(TokenError::Missing) => {
                RoutingDecision::redirect(paths.sign_in_returning_to(path), false)
            }
            Err(TokenError::Malformed)
            | Err(TokenError::InvalidSignature)
            | Err(TokenError::Expired) => {
                RoutingDecision::redirect(paths.sign_in_returning_to(path), true)
            }
            Ok(payload) => match paths.dashboard_for(payload) {
                None => RoutingDecision::redirect(paths.sign_in.clone(), true),
                Some(dashboard) if is_within(path, &dashboard) => RoutingDecision::Allow,
                Some(dashboard) => RoutingDecision::redirect(dashboard, false),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::SecretError;

    const ROLES: [RoleId; 5] = [
        RoleId::HeadAdmin,
        RoleId::Manager,
        RoleId::Student,
        RoleId::Partner,
        RoleId::Reviewer,
    ];

    fn paths() -> RouterPaths {
        RouterPaths {
            sign_in: "/sign-in".into(),
        }
    }

    fn session(role: RoleId) -> Result<SessionPayload, TokenError> {
        Ok(SessionPayload {
            subject_id: "subject-7".into(),
            role,
            dashboard_override: None,
            expires_at: u64::MAX,
        })
    }

    fn session_with_override(role: RoleId, dashboard: &str) -> Result<SessionPayload, TokenError> {
        session(role).map(|mut p| {
            p.dashboard_override = Some(dashboard.into());
            p
        })
    }

    fn redirect(location: &str, clear_cookie: bool) -> RoutingDecision {
        RoutingDecision::RedirectTo {
            location: location.into(),
            clear_cookie,
        }
    }

    #[test]
    fn test_worked_examples() {
        let p = paths();
        assert_eq!(
            route("/admin-dashboard", PathClassification::Protected, &session(RoleId::Student), &p),
            redirect("/student-dashboard", false)
        );
        assert_eq!(
            route("/", PathClassification::Protected, &session(RoleId::HeadAdmin), &p),
            redirect("/admin-dashboard", false)
        );
        assert_eq!(
            route(
                "/admin-dashboard/users",
                PathClassification::Protected,
                &Err(TokenError::Missing),
                &p
            ),
            redirect("/sign-in?redirect=%2Fadmin-dashboard%2Fusers", false)
        );
    }

    #[test]
    fn test_signed_in_users_skip_sign_in_page() {
        let p = paths();
        for role in ROLES {
            let dashboard = role.dashboard().unwrap();
            assert_eq!(
                route("/sign-in", PathClassification::Public, &session(role.clone()), &p),
                redirect(dashboard, false)
            );
        }
    }

    #[test]
    fn test_public_paths_allowed() {
        let p = paths();
        let outcomes = [
            session(RoleId::Student),
            Err(TokenError::Missing),
            Err(TokenError::Expired),
            Err(TokenError::Config(SecretError::Absent)),
            session(RoleId::Unrecognized("ghost".into())),
        ];
        for outcome in &outcomes {
            assert_eq!(route("/sign-up", PathClassification::Public, outcome, &p), RoutingDecision::Allow);
            assert_eq!(
                route("/_next/app.js", PathClassification::StaticAsset, outcome, &p),
                RoutingDecision::Allow
            );
        }
        // Unusable identities may still see the sign-in page.
        assert_eq!(
            route("/sign-in", PathClassification::Public, &outcomes[4], &p),
            RoutingDecision::Allow
        );
        assert_eq!(
            route("/sign-in", PathClassification::Public, &outcomes[2], &p),
            RoutingDecision::Allow
        );
    }

    #[test]
    fn test_dashboard_and_below_allowed() {
        let p = paths();
        for role in ROLES {
            let dashboard = role.dashboard().unwrap();
            assert_eq!(
                route(dashboard, PathClassification::Protected, &session(role.clone()), &p),
                RoutingDecision::Allow
            );
            let below = format!("{}/settings", dashboard);
            assert_eq!(
                route(&below, PathClassification::Protected, &session(role.clone()), &p),
                RoutingDecision::Allow
            );
            let sibling = format!("{}-old", dashboard);
            assert_eq!(
                route(&sibling, PathClassification::Protected, &session(role.clone()), &p),
                redirect(dashboard, false)
            );
        }
    }

    #[test]
    fn test_bad_tokens_clear_cookie() {
        let p = paths();
        for err in [TokenError::Malformed, TokenError::InvalidSignature, TokenError::Expired] {
            assert_eq!(
                route("/student-dashboard", PathClassification::Protected, &Err(err), &p),
                redirect("/sign-in?redirect=%2Fstudent-dashboard", true)
            );
        }
    }

    #[test]
    fn test_unrecognized_role_goes_to_sign_in() {
        let p = paths();
        let outcome = session(RoleId::Unrecognized("janitor".into()));
        assert_eq!(
            route("/admin-dashboard", PathClassification::Protected, &outcome, &p),
            redirect("/sign-in", true)
        );
        // An override does not rescue an unknown role.
        let outcome = session_with_override(RoleId::Unrecognized("janitor".into()), "/somewhere");
        assert_eq!(
            route("/somewhere", PathClassification::Protected, &outcome, &p),
            redirect("/sign-in", true)
        );
    }

    #[test]
    fn test_config_error_on_gated_paths() {
        let p = paths();
        let outcome = Err(TokenError::Config(SecretError::TooShort { len: 8 }));
        assert_eq!(
            route("/admin-dashboard", PathClassification::Protected, &outcome, &p),
            RoutingDecision::ConfigError
        );
        assert_eq!(
            route("/api/users", PathClassification::ApiRoute, &outcome, &p),
            RoutingDecision::ConfigError
        );
    }

    #[test]
    fn test_api_routes() {
        let p = paths();
        assert_eq!(
            route("/api/proposals", PathClassification::ApiRoute, &session(RoleId::Reviewer), &p),
            RoutingDecision::AllowWithHeaders {
                subject_id: "subject-7".into(),
                role: RoleId::Reviewer,
            }
        );
        for err in [
            TokenError::Missing,
            TokenError::Malformed,
            TokenError::InvalidSignature,
            TokenError::Expired,
        ] {
            assert_eq!(
                route("/api/proposals", PathClassification::ApiRoute, &Err(err), &p),
                RoutingDecision::Allow
            );
        }
        assert_eq!(
            route(
                "/api/proposals",
                PathClassification::ApiRoute,
                &session(RoleId::Unrecognized("x".into())),
                &p
            ),
            RoutingDecision::Allow
        );
    }

    #[test]
    fn test_dashboard_override_precedence() {
        let p = paths();
        let outcome = session_with_override(RoleId::Partner, "/partner-dashboard/acme");
        assert_eq!(
            route("/partner-dashboard", PathClassification::Protected, &outcome, &p),
            redirect("/partner-dashboard/acme", false)
        );
        assert_eq!(
            route("/partner-dashboard/acme/files", PathClassification::Protected, &outcome, &p),
            RoutingDecision::Allow
        );
        assert_eq!(
            route("/sign-in", PathClassification::Public, &outcome, &p),
            redirect("/partner-dashboard/acme", false)
        );
    }

    #[test]
    fn test_unsafe_override_ignored() {
        let p = paths();
        for bad in [
            "https://evil.example",
            "//evil.example",
            "/sign-in",
            "/sign-in/",
            "/sign-in?x=1",
            "/sign-in#top",
            "/",
            "relative",
            "/\\evil",
            "/a b",
            "/partner/../sign-in",
            "/partner-dashboard?org=acme",
            "/partner-dashboard#files",
        ] {
            let outcome = session_with_override(RoleId::Student, bad);
            assert_eq!(
                route("/", PathClassification::Protected, &outcome, &p),
                redirect("/student-dashboard", false),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_override_with_query_does_not_loop() {
        let p = paths();
        let outcome = session_with_override(RoleId::Partner, "/partner-dashboard?org=acme");
        assert_eq!(
            route("/reports", PathClassification::Protected, &outcome, &p),
            redirect("/partner-dashboard", false)
        );
        // Following the redirect lands on an allowed page.
        assert_eq!(
            route("/partner-dashboard", PathClassification::Protected, &outcome, &p),
            RoutingDecision::Allow
        );

        let outcome = session_with_override(RoleId::Partner, "/sign-in?x=1");
        assert_eq!(
            route("/sign-in", PathClassification::Public, &outcome, &p),
            redirect("/partner-dashboard", false)
        );
        assert_eq!(
            route("/partner-dashboard", PathClassification::Protected, &outcome, &p),
            RoutingDecision::Allow
        );
    }

    #[test]
    fn test_redirect_parameter_encoding() {
        let p = paths();
        assert_eq!(p.sign_in_returning_to("/"), "/sign-in?redirect=%2F");
        assert_eq!(
            p.sign_in_returning_to("/proposals/a b&c"),
            "/sign-in?redirect=%2Fproposals%2Fa%20b%26c"
        );
        assert_eq!(
            p.sign_in_returning_to("/student-dashboard/draft_1.v2"),
            "/sign-in?redirect=%2Fstudent-dashboard%2Fdraft_1.v2"
        );
    }
}
