//! # Security Module
//!
//! The security policy is the gate every request passes between route parsing
//! and dispatch. The dispatcher resolves it by name (configuration key
//! `SECURITY_POLICY`) from the [`Registry`](crate::registry::Registry) and asks
//! it to authorize the parsed [`RouteTarget`].
//!
//! A policy may rewrite the target (send an anonymous user to a login page,
//! inject parameters) by returning a different one, or deny the request by
//! returning `None`; a denial ends on the recoverable error path with the
//! "not authorized" message.
//!
//! ```rust
//! use mvc_dispatch::route::RouteTarget;
//! use mvc_dispatch::security::{Authentication, SecurityRequest};
//!
//! struct LoginWall;
//!
//! impl Authentication for LoginWall {
//!     fn authenticate(
//!         &mut self,
//!         target: RouteTarget,
//!         req: &mut SecurityRequest<'_>,
//!     ) -> Option<RouteTarget> {
//!         if req.get_header("x-user").is_some() {
//!             Some(target)
//!         } else {
//!             Some(target.redirect_to("login", "index"))
//!         }
//!     }
//! }
//! ```

use http::HeaderMap;
use serde_json::Value;

use crate::config::ConfigResolver;
use crate::route::RouteTarget;
use crate::session::SessionStore;

/// Request context handed to the security policy.
pub struct SecurityRequest<'a> {
    /// Request headers.
    pub headers: &'a HeaderMap,
    /// Resolved configuration of the request.
    pub config: &'a ConfigResolver,
    /// Session, when the request runs with one.
    pub session: Option<&'a mut dyn SessionStore>,
}

impl<'a> SecurityRequest<'a> {
    /// Get a header by name (case-insensitive)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Read a session value.
    #[must_use]
    pub fn session_value(&self, key: &str) -> Option<&Value> {
        self.session.as_deref().and_then(|s| s.get(key))
    }

    /// Mutable access to the session, if any.
    pub fn session_mut(&mut self) -> Option<&mut (dyn SessionStore + 'a)> {
        self.session.as_deref_mut()
    }
}

/// Security policy consulted once per request.
pub trait Authentication: Send {
    /// Authorize `target`.
    ///
    /// Returns the target to dispatch (possibly rewritten), or `None` to deny
    /// the request.
    fn authenticate(
        &mut self,
        target: RouteTarget,
        req: &mut SecurityRequest<'_>,
    ) -> Option<RouteTarget>;

    /// Drop pooled low-level connections.
    ///
    /// Called after a fatal error unless
    /// `DROP_CONNECTION_POOLS_ON_FATAL_ERROR` is off.
    fn drop_connection_pools(&mut self) {}
}

/// Policy authorizing every request unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authentication for AllowAll {
    fn authenticate(
        &mut self,
        target: RouteTarget,
        _req: &mut SecurityRequest<'_>,
    ) -> Option<RouteTarget> {
        Some(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::Parameters;
    use crate::session::MemorySession;
    use http::HeaderValue;
    use serde_json::json;

    #[test]
    fn test_security_request_accessors() {
        let mut headers = HeaderMap::new();
        headers.insert("X-User", HeaderValue::from_static("alice"));
        let config = ConfigResolver::default();
        let mut session = MemorySession::new();
        session.insert("seen".to_string(), json!(true));

        let mut req = SecurityRequest {
            headers: &headers,
            config: &config,
            session: Some(&mut session),
        };
        assert_eq!(req.get_header("x-user"), Some("alice"));
        assert_eq!(req.session_value("seen"), Some(&json!(true)));
        if let Some(s) = req.session_mut() {
            s.insert("visits".to_string(), json!(1));
        }
        assert_eq!(session.get("visits"), Some(&json!(1)));
    }

    #[test]
    fn test_allow_all_keeps_target() {
        let headers = HeaderMap::new();
        let config = ConfigResolver::default();
        let mut req = SecurityRequest {
            headers: &headers,
            config: &config,
            session: None,
        };
        let target = RouteTarget::new("blog", "show", Parameters::default());
        let out = AllowAll.authenticate(target, &mut req).unwrap();
        assert_eq!(out.controller, "blog");
        assert_eq!(out.action, "show");
    }
}
