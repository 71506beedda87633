use std::fmt;

use http::{HeaderMap, StatusCode};
use serde::Serialize;

/// Header marking a request issued by client-side script.
pub const AJAX_HEADER: &str = "x-requested-with";
/// Expected value of [`AJAX_HEADER`], compared case-insensitively.
pub const AJAX_MARKER: &str = "xmlhttprequest";

/// Request as seen by the dispatcher.
///
/// `route` is the path portion identifying controller, action and
/// parameters, already extracted by the host. `None` means no route was
/// given at all and selects the default controller and action.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub route: Option<String>,
    pub headers: HeaderMap,
}

impl Request {
    #[must_use]
    pub fn new(route: Option<&str>) -> Self {
        Self {
            route: route.map(str::to_string),
            headers: HeaderMap::new(),
        }
    }

    /// Get a header by name (case-insensitive)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Whether the request was issued by client-side script.
    #[must_use]
    pub fn is_ajax(&self) -> bool {
        self.get_header(AJAX_HEADER)
            .is_some_and(|v| v.eq_ignore_ascii_case(AJAX_MARKER))
    }
}

/// Response produced by one dispatch.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Bytes delivered to the client.
    pub body: Vec<u8>,
}

impl Response {
    /// Get a header by name (case-insensitive)
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body as text, invalid UTF-8 replaced.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Lifecycle states of one dispatch.
///
/// ```text
/// Init -> RouteParsed -> Authenticated -> Dispatching -> Completed
///                                                     \-> ErrorRecoverable -> ErrorRendered
///                                                     \-> ErrorFatal -> CleanedUp
/// ```
///
/// A failure before dispatch (bad configuration, denied access) jumps to the
/// error states from wherever it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    Init,
    RouteParsed,
    Authenticated,
    Dispatching,
    Completed,
    ErrorRecoverable,
    ErrorRendered,
    ErrorFatal,
    CleanedUp,
}

impl DispatchState {
    /// Whether the dispatch has finished, successfully or not.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DispatchState::Completed | DispatchState::ErrorRendered | DispatchState::CleanedUp
        )
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchState::Init => "init",
            DispatchState::RouteParsed => "route_parsed",
            DispatchState::Authenticated => "authenticated",
            DispatchState::Dispatching => "dispatching",
            DispatchState::Completed => "completed",
            DispatchState::ErrorRecoverable => "error_recoverable",
            DispatchState::ErrorRendered => "error_rendered",
            DispatchState::ErrorFatal => "error_fatal",
            DispatchState::CleanedUp => "cleaned_up",
        };
        f.write_str(name)
    }
}
