//! # Dispatcher Module
//!
//! The dispatcher turns one request into a call to a controller action and
//! guarantees consistent output and error-recovery behavior whatever the
//! outcome.
//!
//! ## Lifecycle
//!
//! 1. **Init** - resolve `CLIENT_CHARSET` and set `Content-Type`, apply extra
//!    headers, load the `SECURITY_POLICY`, select the message catalog from
//!    `CLIENT_LANGUAGE`, check nothing was sent yet, open the request's own
//!    output buffer.
//! 2. **Route parsing** - split and decode the route into controller, action
//!    and parameters (associative `key/value` pairs or positional values,
//!    per `URL_ASSOCIATIVE_PARAMS`). Missing parts fall back to
//!    `DEFAULT_CONTROLLER` / `DEFAULT_ACTION`.
//! 3. **Authentication** - the security policy accepts, rewrites or denies
//!    the target.
//! 4. **Dispatch** - resolve the controller through the registry, build it,
//!    run the action, flush every buffer.
//!
//! ## Failure handling
//!
//! - A [`RoutingError`](crate::error::RoutingError) discards pending output
//!   and renders `ERROR_CONTROLLER` / `ERROR_ACTION` (or `ERROR_AJAX_ACTION`
//!   for script callers, with status 500) inside a fresh buffer.
//! - A fatal error is logged, rendered with a generic message, then followed
//!   by cleanup: connection pools are dropped through the security policy and
//!   the session is destroyed, each unless disabled by configuration.
//! - When the error page itself fails, its output is discarded and the
//!   failure is logged to the [`ErrorSink`](crate::logging::ErrorSink), or
//!   handed back to the host when there is no sink (or when it is a panic
//!   and `CATCH_INTERNAL_ERRORS` is off).
//!
//! ## Example
//!
//! ```rust
//! use std::io::Write;
//! use std::sync::Arc;
//! use mvc_dispatch::config::MapConfiguration;
//! use mvc_dispatch::controller::{Action, Controller};
//! use mvc_dispatch::dispatcher::{Dispatcher, Request};
//! use mvc_dispatch::error::DispatchError;
//! use mvc_dispatch::registry::Registry;
//! use mvc_dispatch::route::Parameters;
//! use mvc_dispatch::security::AllowAll;
//!
//! struct Home;
//!
//! impl Home {
//!     fn index(&mut self, d: &mut Dispatcher, _: &Parameters) -> Result<(), DispatchError> {
//!         d.output().write_all(b"welcome").map_err(DispatchError::fatal)
//!     }
//! }
//!
//! impl Controller for Home {
//!     fn create(_: &mut Dispatcher) -> Result<Self, DispatchError> {
//!         Ok(Home)
//!     }
//!
//!     fn action(name: &str) -> Option<Action<Self>> {
//!         (name == "index").then_some(Home::index as Action<Self>)
//!     }
//! }
//!
//! let registry = Registry::new()
//!     .controller::<Home>("home")
//!     .security_policy("open", || AllowAll);
//! let config = MapConfiguration::new()
//!     .with("CLIENT_CHARSET", "UTF-8")
//!     .with("CLIENT_LANGUAGE", "en_GB")
//!     .with("SECURITY_POLICY", "open")
//!     .with("DEFAULT_CONTROLLER", "home")
//!     .with("DEFAULT_ACTION", "index");
//!
//! let mut dispatcher = Dispatcher::builder(Arc::new(registry))
//!     .configuration(Arc::new(config))
//!     .build();
//! let response = dispatcher.run(Request::new(None)).unwrap();
//! assert_eq!(response.body, b"welcome");
//! ```

mod builder;
mod core;
mod request;

pub use builder::DispatcherBuilder;
pub use core::{Dispatcher, REQUEST_ID_HEADER};
pub use request::{DispatchState, Request, Response, AJAX_HEADER, AJAX_MARKER};
