//! # Application
//!
//! Process-wide state shared by every request: the registry, the constants
//! environment, the configuration object and the error sink. The host keeps
//! one `Application` (it is `Send + Sync`) and calls
//! [`Application::handle`] from whatever worker serves the request; each call
//! gets its own [`Dispatcher`] and therefore its own configuration resolver,
//! output stack and security policy instance.
//!
//! The registry sits behind an [`ArcSwap`]: [`Application::swap_registry`]
//! replaces it without blocking requests already in flight, which keep the
//! registry they started with.

use std::sync::Arc;

use arc_swap::ArcSwap;
use http::{HeaderMap, HeaderName, HeaderValue};
use tracing::info;

use crate::config::{Configuration, Environment};
use crate::dispatcher::{Dispatcher, DispatcherBuilder, Request, Response};
use crate::error::DispatchError;
use crate::logging::ErrorSink;
use crate::registry::Registry;
use crate::session::SessionStore;

/// Shared host state.
pub struct Application {
    registry: ArcSwap<Registry>,
    environment: Arc<Environment>,
    configuration: Option<Arc<dyn Configuration>>,
    sink: Option<Arc<dyn ErrorSink>>,
    headers: HeaderMap,
}

impl Application {
    #[must_use]
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: ArcSwap::from_pointee(registry),
            environment: Arc::new(Environment::new()),
            configuration: None,
            sink: None,
            headers: HeaderMap::new(),
        }
    }

    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Arc::new(environment);
        self
    }

    #[must_use]
    pub fn with_configuration(mut self, configuration: Arc<dyn Configuration>) -> Self {
        self.configuration = Some(configuration);
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Header added to every response.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Current registry.
    #[must_use]
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.load_full()
    }

    /// Replace the registry; returns the previous one.
    pub fn swap_registry(&self, registry: Registry) -> Arc<Registry> {
        let entries = registry.len();
        let previous = self.registry.swap(Arc::new(registry));
        info!(
            entries,
            previous_entries = previous.len(),
            "Registry replaced"
        );
        previous
    }

    /// Builder preloaded with the shared state, for hosts that need to
    /// adjust one request (custom output stack, fixed request id).
    #[must_use]
    pub fn dispatcher(&self) -> DispatcherBuilder {
        let mut builder = Dispatcher::builder(self.registry())
            .environment(Arc::clone(&self.environment))
            .headers(self.headers.clone());
        if let Some(configuration) = &self.configuration {
            builder = builder.configuration(Arc::clone(configuration));
        }
        if let Some(sink) = &self.sink {
            builder = builder.sink(Arc::clone(sink));
        }
        builder
    }

    /// Dispatch one request.
    pub fn handle(
        &self,
        request: Request,
        session: Option<Box<dyn SessionStore>>,
    ) -> Result<Response, DispatchError> {
        let mut builder = self.dispatcher();
        if let Some(session) = session {
            builder = builder.session(session);
        }
        builder.build().run(request)
    }
}
