//! Dispatcher core: the per-request lifecycle.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use http::header::{CONTENT_TYPE, LOCATION};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use tracing::{debug, error, info, warn};

use super::request::{DispatchState, Request, Response};
use crate::assert::AssertionFailure;
use crate::buffer::OutputBuffers;
use crate::codec::{build_url, split_route};
use crate::config::{keys, ConfigResolver};
use crate::ensure_false;
use crate::error::{
    panic_message, DispatchError, ErrorRecord, Escalation, RoutingError, RoutingErrorKind,
};
use crate::ids::RequestId;
use crate::logging::ErrorSink;
use crate::messages::{Catalog, Message};
use crate::registry::Registry;
use crate::route::{Parameters, RouteTarget};
use crate::security::{Authentication, SecurityRequest};
use crate::session::SessionStore;

/// Header carrying a client-supplied correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Drives one request from raw route to response.
///
/// Built with [`Dispatcher::builder`], run once with [`Dispatcher::run`].
/// Controllers receive it back as `&mut Dispatcher` and use it to write
/// output, read configuration, chain calls and redirect.
pub struct Dispatcher {
    pub(super) registry: Arc<Registry>,
    pub(super) config: ConfigResolver,
    pub(super) request: Request,
    pub(super) request_id: RequestId,
    pub(super) output: OutputBuffers,
    pub(super) status: StatusCode,
    pub(super) headers: HeaderMap,
    pub(super) extra_headers: HeaderMap,
    pub(super) session: Option<Box<dyn SessionStore>>,
    pub(super) authentication: Option<Box<dyn Authentication>>,
    pub(super) sink: Option<Arc<dyn ErrorSink>>,
    pub(super) catalog: Catalog,
    pub(super) state: DispatchState,
}

impl Dispatcher {
    /// Execute the whole lifecycle for `request`.
    ///
    /// Expected failures (denied access, unknown route, failed assertions)
    /// and unexpected ones both end in a rendered error page and `Ok`. `Err`
    /// is returned only when the error page itself failed and no
    /// [`ErrorSink`] is configured to record it. Panics are resumed unless
    /// `CATCH_INTERNAL_ERRORS` is set.
    pub fn run(&mut self, request: Request) -> Result<Response, DispatchError> {
        if let Some(id) = RequestId::from_header(request.get_header(REQUEST_ID_HEADER)) {
            self.request_id = id;
        }
        self.request = request;
        self.state = DispatchState::Init;

        info!(
            request_id = %self.request_id,
            route = ?self.request.route,
            ajax = self.request.is_ajax(),
            "Dispatch started"
        );

        match self.guarded(Self::route_request) {
            Ok(()) => {
                self.output.close_buffers(0, true);
                self.transition(DispatchState::Completed);
            }
            Err(Escalation::Error(DispatchError::Routing(err))) => {
                info!(
                    request_id = %self.request_id,
                    kind = %err.kind,
                    message = %err.message,
                    "Request ended on recoverable error"
                );
                self.transition(DispatchState::ErrorRecoverable);
                self.end_on_error(vec![ErrorRecord::Recoverable(err)], true)
                    .map_err(escalate)?;
                self.transition(DispatchState::ErrorRendered);
            }
            Err(Escalation::Error(DispatchError::Fatal(cause))) => {
                self.fail_fatal(cause).map_err(escalate)?;
            }
            Err(Escalation::Panic(payload)) => {
                let message = panic_message(payload.as_ref());
                if !self.catch_internal_errors() {
                    error!(
                        request_id = %self.request_id,
                        panic_message = %message,
                        "Handler panicked - resuming unwind"
                    );
                    self.transition(DispatchState::ErrorFatal);
                    self.output.close_buffers(0, false);
                    self.cleanup_on_fatal_error();
                    self.transition(DispatchState::CleanedUp);
                    panic::resume_unwind(payload);
                }
                self.fail_fatal(anyhow::anyhow!("panic: {message}"))
                    .map_err(escalate)?;
            }
        }

        info!(
            request_id = %self.request_id,
            state = %self.state,
            status = self.status.as_u16(),
            "Dispatch finished"
        );
        Ok(self.response())
    }

    /// Call `action` of `controller` with `params`.
    ///
    /// Names are matched case-insensitively. An unknown controller or action
    /// is reported as the generic "invalid URL" error, whichever of the two
    /// was missing.
    pub fn call(
        &mut self,
        controller: &str,
        action: &str,
        params: &Parameters,
    ) -> Result<(), DispatchError> {
        debug!(
            request_id = %self.request_id,
            controller,
            action,
            params = params.len(),
            "Calling controller action"
        );

        let factory = match self.registry.controller_factory(controller) {
            Ok(factory) => factory,
            Err(err) => {
                debug!(request_id = %self.request_id, error = %err, "Controller not found");
                return Err(self.routing_error(RoutingErrorKind::InvalidUrl).into());
            }
        };

        let mut handler = factory(self)?;
        let outcome = handler.invoke(self, &action.to_ascii_lowercase(), params);
        handler.finish(self);

        match outcome {
            Some(result) => result,
            None => {
                debug!(
                    request_id = %self.request_id,
                    controller,
                    action,
                    "Action not found"
                );
                Err(self.routing_error(RoutingErrorKind::InvalidUrl).into())
            }
        }
    }

    /// Redirect the client to another controller action.
    ///
    /// With `clear_buffers`, pending output is discarded first. Fails when
    /// bytes already reached the client, since the redirect could no longer
    /// take effect. Execution continues afterwards; the caller is expected to
    /// return.
    pub fn forward(
        &mut self,
        controller: &str,
        action: &str,
        params: &Parameters,
        clear_buffers: bool,
    ) -> Result<(), DispatchError> {
        if clear_buffers {
            self.output.close_buffers(0, false);
        }
        ensure_false!(
            self.output.headers_sent(),
            "{}",
            self.catalog.text(Message::HeadersSent)
        );

        let url = self.url(controller, action, params);
        let location = HeaderValue::from_str(&url).map_err(|_| {
            AssertionFailure::new(format!(
                "The redirect target '{url}' is not a valid header value."
            ))
        })?;
        self.headers.insert(LOCATION, location);
        self.status = StatusCode::FOUND;

        info!(request_id = %self.request_id, location = %url, "Redirect issued");
        Ok(())
    }

    /// Message catalog selected by `CLIENT_LANGUAGE`; English until
    /// initialization succeeded.
    #[must_use]
    pub fn catalog(&self) -> Catalog {
        self.catalog
    }

    /// URL of a controller action under the configured base URL.
    #[must_use]
    pub fn url(&self, controller: &str, action: &str, params: &Parameters) -> String {
        let base = self.config.get_str(keys::URL, "/");
        let associative = self.config.get_bool(keys::URL_ASSOCIATIVE_PARAMS, true);
        build_url(&base, controller, action, params, associative)
    }

    /// Whether the current request was issued by client-side script.
    #[must_use]
    pub fn is_ajax_call(&self) -> bool {
        self.request.is_ajax()
    }

    /// Load a dependency registered under `name`.
    ///
    /// A missing name, or a value of another type than `T`, is an assertion
    /// failure.
    pub fn load_dependency<T: 'static>(&mut self, name: &str) -> Result<T, DispatchError> {
        let factory = self
            .registry
            .dependency_factory(name)
            .map_err(AssertionFailure::from)?;
        let value = factory(self)?;
        match value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(_) => Err(AssertionFailure::new(format!(
                "The dependency '{name}' is not of type '{}'.",
                std::any::type_name::<T>()
            ))
            .into()),
        }
    }

    /// Set a response header. Refused once bytes reached the client.
    pub fn set_header(
        &mut self,
        name: HeaderName,
        value: HeaderValue,
    ) -> Result<(), AssertionFailure> {
        ensure_false!(
            self.output.headers_sent(),
            "{}",
            self.catalog.text(Message::HeadersSent)
        );
        self.headers.insert(name, value);
        Ok(())
    }

    /// Set the response status. Refused once bytes reached the client.
    pub fn set_status(&mut self, status: StatusCode) -> Result<(), AssertionFailure> {
        ensure_false!(
            self.output.headers_sent(),
            "{}",
            self.catalog.text(Message::HeadersSent)
        );
        self.status = status;
        Ok(())
    }

    /// Output stack controllers write into.
    pub fn output(&mut self) -> &mut OutputBuffers {
        &mut self.output
    }

    #[must_use]
    pub fn buffers(&self) -> &OutputBuffers {
        &self.output
    }

    #[must_use]
    pub fn config(&self) -> &ConfigResolver {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ConfigResolver {
        &mut self.config
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    #[must_use]
    pub fn state(&self) -> DispatchState {
        self.state
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn session(&self) -> Option<&(dyn SessionStore + 'static)> {
        self.session.as_deref()
    }

    pub fn session_mut(&mut self) -> Option<&mut (dyn SessionStore + 'static)> {
        self.session.as_deref_mut()
    }

    /// Hand the session back to the host.
    pub fn take_session(&mut self) -> Option<Box<dyn SessionStore>> {
        self.session.take()
    }

    /// Security policy loaded for this request, once initialization ran.
    pub fn authentication_mut(&mut self) -> Option<&mut (dyn Authentication + 'static)> {
        self.authentication.as_deref_mut()
    }

    fn routing_error(&self, kind: RoutingErrorKind) -> RoutingError {
        let message = match kind {
            RoutingErrorKind::NotAuthorized => Message::NotAuthorized,
            RoutingErrorKind::InvalidUrl => Message::InvalidUrl,
            RoutingErrorKind::Assertion | RoutingErrorKind::Application => Message::InternalError,
        };
        RoutingError::new(kind, self.catalog.text(message))
    }

    fn route_request(&mut self) -> Result<(), DispatchError> {
        self.init()?;
        let target = self.parse_route()?;
        self.transition(DispatchState::RouteParsed);
        let target = self.authenticate(target)?;
        self.transition(DispatchState::Authenticated);
        self.transition(DispatchState::Dispatching);
        self.call(&target.controller, &target.action, &target.parameters)
    }

    fn init(&mut self) -> Result<(), DispatchError> {
        let charset = self.config.required_str(keys::CLIENT_CHARSET)?;
        let language = self.config.required_str(keys::CLIENT_LANGUAGE)?;
        let content_type =
            HeaderValue::from_str(&format!("text/html; charset={charset}")).map_err(|_| {
                AssertionFailure::new(format!(
                    "The client charset '{charset}' is not a valid header value."
                ))
            })?;
        self.set_header(CONTENT_TYPE, content_type)?;
        self.headers.extend(self.extra_headers.clone());

        let policy = self.config.required_str(keys::SECURITY_POLICY)?;
        let factory = self
            .registry
            .security_factory(&policy)
            .map_err(AssertionFailure::from)?;
        self.authentication = Some(factory());

        let Some(catalog) = Catalog::from_locale(&language) else {
            return Err(AssertionFailure::new(format!(
                "The locale '{language}' could not be set."
            ))
            .into());
        };
        self.catalog = catalog;

        ensure_false!(
            self.output.headers_sent(),
            "{}",
            self.catalog.text(Message::HeadersSent)
        );
        self.output.start();

        debug!(
            request_id = %self.request_id,
            charset = %charset,
            language = catalog.code(),
            policy = %policy,
            buffer_level = self.output.level(),
            "Dispatcher initialized"
        );
        Ok(())
    }

    fn parse_route(&self) -> Result<RouteTarget, DispatchError> {
        let associative = self.config.get_bool(keys::URL_ASSOCIATIVE_PARAMS, true);

        let Some(route) = self.request.route.as_deref() else {
            let controller = self.config.required_str(keys::DEFAULT_CONTROLLER)?;
            let action = self.config.required_str(keys::DEFAULT_ACTION)?;
            let parameters = if associative {
                Parameters::associative()
            } else {
                Parameters::positional()
            };
            return Ok(RouteTarget::new(controller, action, parameters));
        };

        let mut segments = split_route(route).into_iter();
        let controller = match segments.next().filter(|s| !s.is_empty()) {
            Some(controller) => controller,
            None => self.config.required_str(keys::DEFAULT_CONTROLLER)?,
        };
        let action = match segments.next().filter(|s| !s.is_empty()) {
            Some(action) => action,
            None => self.config.required_str(keys::DEFAULT_ACTION)?,
        };
        let parameters = if associative {
            Parameters::pair_segments(segments)
        } else {
            Parameters::Positional(segments.collect())
        };

        debug!(
            request_id = %self.request_id,
            controller = %controller,
            action = %action,
            params = parameters.len(),
            associative,
            "Route parsed"
        );
        Ok(RouteTarget::new(controller, action, parameters))
    }

    fn authenticate(&mut self, target: RouteTarget) -> Result<RouteTarget, DispatchError> {
        let Some(authentication) = self.authentication.as_mut() else {
            let message = self.catalog.text(Message::NoSecurityPolicy);
            return Err(AssertionFailure::new(message).into());
        };

        let controller = target.controller.clone();
        let action = target.action.clone();
        let mut req = SecurityRequest {
            headers: &self.request.headers,
            config: &self.config,
            session: match self.session.as_mut() {
                Some(session) => Some(&mut **session),
                None => None,
            },
        };

        match authentication.authenticate(target, &mut req) {
            Some(target) => {
                if target.controller != controller || target.action != action {
                    debug!(
                        request_id = %self.request_id,
                        from_controller = %controller,
                        from_action = %action,
                        to_controller = %target.controller,
                        to_action = %target.action,
                        "Route rewritten by security policy"
                    );
                }
                Ok(target)
            }
            None => {
                info!(
                    request_id = %self.request_id,
                    controller = %controller,
                    action = %action,
                    "Access denied by security policy"
                );
                Err(self.routing_error(RoutingErrorKind::NotAuthorized).into())
            }
        }
    }

    /// Serve the error page for `records`.
    ///
    /// `routing` tells whether the request failed on the recoverable path;
    /// the original records are then logged too if the page itself fails.
    fn end_on_error(
        &mut self,
        records: Vec<ErrorRecord>,
        routing: bool,
    ) -> Result<(), Escalation> {
        let ajax = self.is_ajax_call();
        if !self.output.headers_sent() {
            // A redirect issued before the failure must not outlive it.
            self.headers.remove(LOCATION);
            self.status = if ajax {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::OK
            };
        }

        self.output.close_buffers(0, false);
        self.output.start();

        let params = Parameters::Errors(records);
        let rendered = self.guarded(|d| {
            let controller = d.config.required_str(keys::ERROR_CONTROLLER)?;
            let action_key = if ajax {
                keys::ERROR_AJAX_ACTION
            } else {
                keys::ERROR_ACTION
            };
            let action = d.config.required_str(action_key)?;
            d.call(&controller, &action, &params)
        });

        let escalation = match rendered {
            Ok(()) => {
                self.output.close_buffers(0, true);
                return Ok(());
            }
            Err(escalation) => escalation,
        };

        self.output.close_buffers(0, false);
        self.status = StatusCode::INTERNAL_SERVER_ERROR;

        if matches!(escalation, Escalation::Panic(_)) && !self.catch_internal_errors() {
            warn!(request_id = %self.request_id, "Error page panicked - escalating");
            return Err(escalation);
        }
        let Some(sink) = self.sink.clone() else {
            warn!(
                request_id = %self.request_id,
                "Error page failed and no error sink is configured - escalating"
            );
            return Err(escalation);
        };

        let failure = ErrorRecord::from_escalation(escalation);
        error!(
            request_id = %self.request_id,
            error = %failure,
            "Error page rendering failed"
        );
        sink.log_error(&self.request_id, &failure);
        if routing {
            for record in params.errors() {
                sink.log_error(&self.request_id, record);
            }
        }
        Ok(())
    }

    fn fail_fatal(&mut self, cause: anyhow::Error) -> Result<(), Escalation> {
        self.transition(DispatchState::ErrorFatal);

        let cause = Arc::new(cause);
        let record = ErrorRecord::Fatal(Arc::clone(&cause));
        error!(
            request_id = %self.request_id,
            error = %format!("{cause:#}"),
            "Unhandled error during dispatch"
        );
        if let Some(sink) = &self.sink {
            sink.log_error(&self.request_id, &record);
        }

        let internal = RoutingError::new(
            RoutingErrorKind::Application,
            self.catalog.text(Message::InternalError),
        );
        let records = vec![ErrorRecord::Recoverable(internal), record];
        let rendered = self.end_on_error(records, false);

        self.cleanup_on_fatal_error();
        self.transition(DispatchState::CleanedUp);
        rendered
    }

    /// Drop pooled connections and the session after an unexpected failure.
    fn cleanup_on_fatal_error(&mut self) {
        let drop_pools = self
            .config
            .get_bool(keys::DROP_CONNECTION_POOLS_ON_FATAL_ERROR, true);
        let drop_session = self.config.get_bool(keys::CREATE_SESSION, true)
            && self.config.get_bool(keys::DROP_SESSION_ON_FATAL_ERROR, true);

        if drop_pools {
            if let Some(authentication) = self.authentication.as_mut() {
                let dropped = panic::catch_unwind(AssertUnwindSafe(|| {
                    authentication.drop_connection_pools();
                }));
                if dropped.is_err() {
                    warn!(request_id = %self.request_id, "Dropping connection pools panicked");
                }
            }
        }

        if drop_session {
            if let Some(session) = self.session.as_mut().filter(|s| s.is_active()) {
                let destroyed = panic::catch_unwind(AssertUnwindSafe(|| session.destroy()));
                if destroyed.is_err() {
                    warn!(request_id = %self.request_id, "Destroying session panicked");
                }
            }
        }

        info!(
            request_id = %self.request_id,
            drop_pools,
            drop_session,
            "Cleanup after fatal error"
        );
    }

    fn catch_internal_errors(&self) -> bool {
        self.config.get_bool(keys::CATCH_INTERNAL_ERRORS, false)
    }

    /// Run `f`, turning both error returns and panics into an [`Escalation`].
    fn guarded<F>(&mut self, f: F) -> Result<(), Escalation>
    where
        F: FnOnce(&mut Self) -> Result<(), DispatchError>,
    {
        match panic::catch_unwind(AssertUnwindSafe(|| f(self))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(Escalation::Error(err)),
            Err(payload) => Err(Escalation::Panic(payload)),
        }
    }

    fn transition(&mut self, next: DispatchState) {
        debug!(
            request_id = %self.request_id,
            from = %self.state,
            to = %next,
            "Dispatch state transition"
        );
        self.state = next;
    }

    fn response(&self) -> Response {
        Response {
            status: self.status,
            headers: self.headers.clone(),
            body: self.output.client_bytes().to_vec(),
        }
    }
}

/// Hand an escalation back to the host: errors are returned, panics resumed.
fn escalate(escalation: Escalation) -> DispatchError {
    match escalation {
        Escalation::Error(err) => err,
        Escalation::Panic(payload) => panic::resume_unwind(payload),
    }
}
