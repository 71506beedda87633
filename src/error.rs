//! # Error taxonomy
//!
//! Two tiers of failure leave a controller action:
//!
//! - [`RoutingError`]: expected, user-facing (bad URL, access denied, failed
//!   assertion, or an error raised on purpose by the application). Rendered
//!   through the application's error controller; session and connection pools
//!   survive.
//! - [`DispatchError::Fatal`]: anything else. Logged, rendered with a generic
//!   message, then the session and connection pools are dropped.
//!
//! Panics form a third, "internal" class. They never travel as values: the
//! dispatcher catches them at its boundary and either converts them into
//! [`DispatchError::Fatal`] or resumes unwinding, depending on configuration.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::assert::AssertionFailure;

/// User-facing message for a denied request.
pub const MSG_NOT_AUTHORIZED: &str = "You are not authorized to access this page.";
/// User-facing message for an unknown controller or action.
pub const MSG_INVALID_URL: &str = "The URL is invalid.";
/// User-facing message shown in place of an unclassified failure.
pub const MSG_INTERNAL_ERROR: &str = "Internal error. Please restart the application.";

/// Why a request ended on the recoverable path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingErrorKind {
    /// The security policy refused the route.
    NotAuthorized,
    /// No controller or no action matches the route.
    InvalidUrl,
    /// An invariant checked through the assertion gate did not hold.
    Assertion,
    /// Raised deliberately by application code.
    Application,
}

impl fmt::Display for RoutingErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoutingErrorKind::NotAuthorized => "not_authorized",
            RoutingErrorKind::InvalidUrl => "invalid_url",
            RoutingErrorKind::Assertion => "assertion",
            RoutingErrorKind::Application => "application",
        };
        f.write_str(name)
    }
}

/// Expected, user-facing failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingError {
    pub kind: RoutingErrorKind,
    pub message: String,
}

impl RoutingError {
    #[must_use]
    pub fn new(kind: RoutingErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_authorized() -> Self {
        Self::new(RoutingErrorKind::NotAuthorized, MSG_NOT_AUTHORIZED)
    }

    #[must_use]
    pub fn invalid_url() -> Self {
        Self::new(RoutingErrorKind::InvalidUrl, MSG_INVALID_URL)
    }

    /// Generic message standing in for a fatal failure.
    #[must_use]
    pub fn internal() -> Self {
        Self::new(RoutingErrorKind::Application, MSG_INTERNAL_ERROR)
    }

    /// Error raised by application code; an empty message is replaced by a
    /// generic one.
    #[must_use]
    pub fn application(message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            "Treatment interrupted. Please restart the application.".to_string()
        } else {
            message
        };
        Self::new(RoutingErrorKind::Application, message)
    }
}

impl fmt::Display for RoutingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for RoutingError {}

impl From<AssertionFailure> for RoutingError {
    fn from(failure: AssertionFailure) -> Self {
        RoutingError::new(RoutingErrorKind::Assertion, failure.to_string())
    }
}

/// Error returned by controller actions and by the dispatch pipeline.
#[derive(Debug)]
pub enum DispatchError {
    /// Recoverable, rendered through the error controller.
    Routing(RoutingError),
    /// Unclassified; triggers logging and cleanup.
    Fatal(anyhow::Error),
}

impl DispatchError {
    /// Wrap any error as fatal.
    pub fn fatal<E>(err: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        DispatchError::Fatal(err.into())
    }

    #[must_use]
    pub fn is_routing(&self) -> bool {
        matches!(self, DispatchError::Routing(_))
    }

    #[must_use]
    pub fn as_routing(&self) -> Option<&RoutingError> {
        match self {
            DispatchError::Routing(e) => Some(e),
            DispatchError::Fatal(_) => None,
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Routing(e) => write!(f, "routing error ({}): {}", e.kind, e.message),
            DispatchError::Fatal(e) => write!(f, "fatal error: {e:#}"),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::Routing(e) => Some(e),
            DispatchError::Fatal(e) => Some(&**e),
        }
    }
}

impl From<RoutingError> for DispatchError {
    fn from(err: RoutingError) -> Self {
        DispatchError::Routing(err)
    }
}

impl From<AssertionFailure> for DispatchError {
    fn from(failure: AssertionFailure) -> Self {
        DispatchError::Routing(failure.into())
    }
}

impl From<anyhow::Error> for DispatchError {
    fn from(err: anyhow::Error) -> Self {
        DispatchError::Fatal(err)
    }
}

/// One entry of the list handed to the error controller.
#[derive(Debug, Clone)]
pub enum ErrorRecord {
    /// Expected failure, or the generic message standing in for a fatal one.
    Recoverable(RoutingError),
    /// Underlying cause of a fatal failure, attached for logging only.
    Fatal(Arc<anyhow::Error>),
}

impl ErrorRecord {
    /// Text safe to show to the user; fatal causes are never shown.
    #[must_use]
    pub fn user_message(&self) -> Option<&str> {
        match self {
            ErrorRecord::Recoverable(e) => Some(&e.message),
            ErrorRecord::Fatal(_) => None,
        }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorRecord::Recoverable(e) => write!(f, "{e}"),
            ErrorRecord::Fatal(e) => write!(f, "{e:#}"),
        }
    }
}

/// Failure the dispatcher could not absorb and must hand back to its host.
pub(crate) enum Escalation {
    Error(DispatchError),
    Panic(Box<dyn Any + Send + 'static>),
}

impl ErrorRecord {
    pub(crate) fn from_escalation(escalation: Escalation) -> Self {
        match escalation {
            Escalation::Error(DispatchError::Routing(e)) => ErrorRecord::Recoverable(e),
            Escalation::Error(DispatchError::Fatal(e)) => ErrorRecord::Fatal(Arc::new(e)),
            Escalation::Panic(payload) => ErrorRecord::Fatal(Arc::new(anyhow::anyhow!(
                "panic: {}",
                panic_message(payload.as_ref())
            ))),
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assertion_failure_is_recoverable() {
        let err: DispatchError = AssertionFailure::new("nope").into();
        let routing = err.as_routing().unwrap();
        assert_eq!(routing.kind, RoutingErrorKind::Assertion);
        assert_eq!(routing.message, "nope");
    }

    #[test]
    fn test_anyhow_is_fatal() {
        let err: DispatchError = anyhow::anyhow!("db down").into();
        assert!(!err.is_routing());
        assert_eq!(err.to_string(), "fatal error: db down");
    }

    #[test]
    fn test_application_error_default_message() {
        assert_eq!(
            RoutingError::application("  ").message,
            "Treatment interrupted. Please restart the application."
        );
        assert_eq!(RoutingError::application("stop").message, "stop");
    }

    #[test]
    fn test_fatal_record_has_no_user_message() {
        let record = ErrorRecord::Fatal(Arc::new(anyhow::anyhow!("secret detail")));
        assert_eq!(record.user_message(), None);
        let record = ErrorRecord::Recoverable(RoutingError::invalid_url());
        assert_eq!(record.user_message(), Some(MSG_INVALID_URL));
    }

    #[test]
    fn test_escalation_to_record() {
        let record = ErrorRecord::from_escalation(Escalation::Panic(Box::new("boom")));
        assert_eq!(record.to_string(), "panic: boom");
        let record = ErrorRecord::from_escalation(Escalation::Error(DispatchError::Routing(
            RoutingError::invalid_url(),
        )));
        assert_eq!(record.user_message(), Some(MSG_INVALID_URL));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
