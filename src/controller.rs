//! # Controller Contract
//!
//! A controller is a type built once per call from the dispatcher, exposing
//! named actions. Each action receives the dispatcher back (for `call`,
//! `forward`, configuration and output) plus the request parameters.
//!
//! ```rust
//! use std::io::Write;
//! use mvc_dispatch::controller::{Action, Controller};
//! use mvc_dispatch::dispatcher::Dispatcher;
//! use mvc_dispatch::error::DispatchError;
//! use mvc_dispatch::route::Parameters;
//!
//! struct Blog;
//!
//! impl Blog {
//!     fn show(&mut self, d: &mut Dispatcher, params: &Parameters) -> Result<(), DispatchError> {
//!         write!(d.output(), "post {}", params.get("id").unwrap_or("?"))
//!             .map_err(DispatchError::fatal)
//!     }
//! }
//!
//! impl Controller for Blog {
//!     fn create(_: &mut Dispatcher) -> Result<Self, DispatchError> {
//!         Ok(Blog)
//!     }
//!
//!     fn action(name: &str) -> Option<Action<Self>> {
//!         match name {
//!             "show" => Some(Blog::show),
//!             _ => None,
//!         }
//!     }
//! }
//! ```

use std::sync::Arc;

use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;
use crate::registry::ControllerFactory;
use crate::route::Parameters;

/// Action method of controller `C`.
pub type Action<C> = fn(&mut C, &mut Dispatcher, &Parameters) -> Result<(), DispatchError>;

/// Application controller.
pub trait Controller: Sized + 'static {
    /// Build the controller for one call.
    fn create(dispatcher: &mut Dispatcher) -> Result<Self, DispatchError>;

    /// Look up an action. `name` arrives in ASCII lowercase.
    fn action(name: &str) -> Option<Action<Self>>;

    /// Runs after the action returns, whatever its outcome.
    fn finish(&mut self, _dispatcher: &mut Dispatcher) {}
}

/// Controller instance with its type erased.
pub trait Handler {
    /// Run `action`; `None` when the controller has no such action.
    fn invoke(
        &mut self,
        dispatcher: &mut Dispatcher,
        action: &str,
        params: &Parameters,
    ) -> Option<Result<(), DispatchError>>;

    fn finish(&mut self, dispatcher: &mut Dispatcher);
}

struct Bound<C>(C);

impl<C: Controller> Handler for Bound<C> {
    fn invoke(
        &mut self,
        dispatcher: &mut Dispatcher,
        action: &str,
        params: &Parameters,
    ) -> Option<Result<(), DispatchError>> {
        C::action(action).map(|method| method(&mut self.0, dispatcher, params))
    }

    fn finish(&mut self, dispatcher: &mut Dispatcher) {
        self.0.finish(dispatcher);
    }
}

/// Factory building `C` behind the [`Handler`] interface.
pub(crate) fn bind<C: Controller>() -> ControllerFactory {
    Arc::new(|dispatcher: &mut Dispatcher| {
        let controller = C::create(dispatcher)?;
        Ok(Box::new(Bound(controller)) as Box<dyn Handler>)
    })
}
