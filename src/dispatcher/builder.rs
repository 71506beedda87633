use std::sync::Arc;

use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

use super::core::Dispatcher;
use super::request::{DispatchState, Request};
use crate::buffer::OutputBuffers;
use crate::config::{ConfigResolver, Configuration, Environment};
use crate::ids::RequestId;
use crate::logging::ErrorSink;
use crate::messages::Catalog;
use crate::registry::Registry;
use crate::session::SessionStore;

/// Collects everything one request needs before it runs.
pub struct DispatcherBuilder {
    registry: Arc<Registry>,
    configuration: Option<Arc<dyn Configuration>>,
    environment: Arc<Environment>,
    session: Option<Box<dyn SessionStore>>,
    sink: Option<Arc<dyn ErrorSink>>,
    output: OutputBuffers,
    headers: HeaderMap,
    request_id: Option<RequestId>,
}

impl Dispatcher {
    /// Start building a dispatcher over `registry`.
    #[must_use]
    pub fn builder(registry: Arc<Registry>) -> DispatcherBuilder {
        DispatcherBuilder {
            registry,
            configuration: None,
            environment: Arc::new(Environment::new()),
            session: None,
            sink: None,
            output: OutputBuffers::new(),
            headers: HeaderMap::new(),
            request_id: None,
        }
    }
}

impl DispatcherBuilder {
    /// Configuration object consulted first for every key.
    #[must_use]
    pub fn configuration(mut self, configuration: Arc<dyn Configuration>) -> Self {
        self.configuration = Some(configuration);
        self
    }

    /// Process-wide constants consulted when the configuration object has no
    /// value.
    #[must_use]
    pub fn environment(mut self, environment: Arc<Environment>) -> Self {
        self.environment = environment;
        self
    }

    #[must_use]
    pub fn session(mut self, session: Box<dyn SessionStore>) -> Self {
        self.session = Some(session);
        self
    }

    /// Sink receiving the records of failures the error page could not
    /// absorb.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Output stack as left by the host (frames it opened, bytes it sent).
    #[must_use]
    pub fn output(mut self, output: OutputBuffers) -> Self {
        self.output = output;
        self
    }

    /// Header added to every response, after `Content-Type`.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replace every additional header at once.
    #[must_use]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Correlation id; a valid `X-Request-Id` request header still wins.
    #[must_use]
    pub fn request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    #[must_use]
    pub fn build(self) -> Dispatcher {
        let mut config = ConfigResolver::new(self.environment);
        if let Some(configuration) = self.configuration {
            config.set_configuration(configuration);
        }
        Dispatcher {
            registry: self.registry,
            config,
            request: Request::default(),
            request_id: self.request_id.unwrap_or_default(),
            output: self.output,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            extra_headers: self.headers,
            session: self.session,
            authentication: None,
            sink: self.sink,
            catalog: Catalog::default(),
            state: DispatchState::Init,
        }
    }
}
