//! # mvc-dispatch
//!
//! **mvc-dispatch** is the request dispatch lifecycle of a small MVC
//! framework: it turns one route string (`controller/action/param/...`) into
//! a validated call to an application controller, with consistent output
//! buffering and error recovery whatever the outcome.
//!
//! ## Architecture
//!
//! - **[`codec`]** - segment encoding that survives web-server URL rewriting,
//!   route splitting and URL building
//! - **[`buffer`]** - nested output buffer frames in front of the client
//! - **[`config`]** - three-tier configuration lookup (configuration object,
//!   process constants, caller default)
//! - **[`assert`]** - invariant checks with lazily formatted messages
//! - **[`error`]** - recoverable routing errors vs fatal errors
//! - **[`route`]** - route targets and parameter bags
//! - **[`registry`]** - `(kind, name)` to factory table for controllers,
//!   security policies and dependencies
//! - **[`controller`]** - the controller contract
//! - **[`security`]** - the security policy contract
//! - **[`session`]** - the session contract
//! - **[`dispatcher`]** - the per-request state machine
//! - **[`app`]** - process-wide state shared by every request
//! - **[`logging`]** - subscriber setup and the error sink
//!
//! ## Outcomes
//!
//! | Outcome | Output | Status | Cleanup |
//! |---|---|---|---|
//! | success | flushed | as set by the action | none |
//! | routing error | error page | 500 for script callers | none |
//! | fatal error | error page, generic message | 500 for script callers | pools and session dropped |
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use mvc_dispatch::app::Application;
//! use mvc_dispatch::config::MapConfiguration;
//! use mvc_dispatch::dispatcher::Request;
//! use mvc_dispatch::registry::Registry;
//! use mvc_dispatch::security::AllowAll;
//!
//! let config = MapConfiguration::new()
//!     .with("CLIENT_CHARSET", "UTF-8")
//!     .with("CLIENT_LANGUAGE", "en_GB")
//!     .with("SECURITY_POLICY", "open")
//!     .with("DEFAULT_CONTROLLER", "home")
//!     .with("DEFAULT_ACTION", "index")
//!     .with("ERROR_CONTROLLER", "error")
//!     .with("ERROR_ACTION", "index")
//!     .with("ERROR_AJAX_ACTION", "ajax");
//!
//! let app = Application::new(Registry::new().security_policy("open", || AllowAll))
//!     .with_configuration(Arc::new(config));
//!
//! // No controller is registered: the route is invalid, and the error
//! // controller is missing too, so the failure comes back to the host.
//! assert!(app.handle(Request::new(Some("blog/show")), None).is_err());
//! ```

pub mod app;
pub mod assert;
pub mod buffer;
pub mod codec;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod logging;
pub mod messages;
pub mod registry;
pub mod route;
pub mod security;
pub mod session;

pub use app::Application;
pub use controller::{Action, Controller};
pub use dispatcher::{DispatchState, Dispatcher, Request, Response};
pub use error::{DispatchError, ErrorRecord, RoutingError, RoutingErrorKind};
pub use registry::{Registry, ResourceKind};
pub use route::{Parameters, RouteTarget};
