#![allow(dead_code)]

pub mod fixtures {
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use mvc_dispatch::config::MapConfiguration;
    use mvc_dispatch::controller::{Action, Controller};
    use mvc_dispatch::dispatcher::Dispatcher;
    use mvc_dispatch::error::{DispatchError, ErrorRecord, RoutingError};
    use mvc_dispatch::ids::RequestId;
    use mvc_dispatch::logging::ErrorSink;
    use mvc_dispatch::registry::Registry;
    use mvc_dispatch::route::{Parameters, RouteTarget};
    use mvc_dispatch::security::{Authentication, SecurityRequest};
    use mvc_dispatch::{ensure_true, Request};

    /// Shared observation point for controllers, policies and tests.
    #[derive(Default)]
    pub struct Recorder {
        events: Mutex<Vec<String>>,
        params: Mutex<Vec<(String, String)>>,
        errors: Mutex<Vec<String>>,
        pub pools_dropped: AtomicUsize,
    }

    impl Recorder {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn record(&self, event: &str) {
            self.events.lock().unwrap().push(event.to_string());
        }

        pub fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        pub fn saw(&self, event: &str) -> bool {
            self.events().iter().any(|e| e == event)
        }

        /// Parameters of the last recorded action.
        pub fn params(&self) -> Vec<(String, String)> {
            self.params.lock().unwrap().clone()
        }

        fn store_params(&self, params: &Parameters) {
            *self.params.lock().unwrap() = params
                .pairs()
                .map(|(k, v)| (k.into_owned(), v.to_string()))
                .collect();
        }

        /// Records received by the last error page, as text.
        pub fn errors(&self) -> Vec<String> {
            self.errors.lock().unwrap().clone()
        }

        fn store_errors(&self, records: &[ErrorRecord]) {
            *self.errors.lock().unwrap() = records.iter().map(ToString::to_string).collect();
        }

        pub fn pools_dropped(&self) -> usize {
            self.pools_dropped.load(Ordering::SeqCst)
        }
    }

    /// Sink keeping every record as text.
    #[derive(Default)]
    pub struct RecordingSink {
        records: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn records(&self) -> Vec<String> {
            self.records.lock().unwrap().clone()
        }
    }

    impl ErrorSink for RecordingSink {
        fn log_error(&self, _request_id: &RequestId, record: &ErrorRecord) {
            self.records.lock().unwrap().push(record.to_string());
        }
    }

    #[derive(Clone, Copy)]
    pub enum PolicyMode {
        Allow,
        Deny,
        /// Send every request to `home/index`.
        Login,
    }

    pub struct RecordingPolicy {
        recorder: Arc<Recorder>,
        mode: PolicyMode,
    }

    impl Authentication for RecordingPolicy {
        fn authenticate(
            &mut self,
            target: RouteTarget,
            req: &mut SecurityRequest<'_>,
        ) -> Option<RouteTarget> {
            self.recorder.record("auth");
            if let Some(user) = req.get_header("x-user") {
                self.recorder.record(&format!("user:{user}"));
            }
            match self.mode {
                PolicyMode::Allow => Some(target),
                PolicyMode::Deny => None,
                PolicyMode::Login => Some(target.redirect_to("home", "index")),
            }
        }

        fn drop_connection_pools(&mut self) {
            self.recorder.pools_dropped.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn recorder_of(d: &mut Dispatcher) -> Result<Arc<Recorder>, DispatchError> {
        d.load_dependency::<Arc<Recorder>>("recorder")
    }

    fn write(d: &mut Dispatcher, text: &str) -> Result<(), DispatchError> {
        d.output()
            .write_all(text.as_bytes())
            .map_err(DispatchError::fatal)
    }

    pub struct Home {
        recorder: Arc<Recorder>,
    }

    impl Home {
        fn index(&mut self, d: &mut Dispatcher, params: &Parameters) -> Result<(), DispatchError> {
            self.recorder.record("home.index");
            self.recorder.store_params(params);
            write(d, "home")
        }
    }

    impl Controller for Home {
        fn create(d: &mut Dispatcher) -> Result<Self, DispatchError> {
            Ok(Home { recorder: recorder_of(d)? })
        }

        fn action(name: &str) -> Option<Action<Self>> {
            match name {
                "index" => Some(Home::index),
                _ => None,
            }
        }
    }

    pub struct Blog {
        recorder: Arc<Recorder>,
    }

    impl Blog {
        fn show(&mut self, d: &mut Dispatcher, params: &Parameters) -> Result<(), DispatchError> {
            self.recorder.record("blog.show");
            self.recorder.store_params(params);
            write(d, &format!("post {}", params.get("id").unwrap_or("-")))
        }

        fn latest(&mut self, d: &mut Dispatcher, _: &Parameters) -> Result<(), DispatchError> {
            write(d, "discarded")?;
            let mut params = Parameters::associative();
            params.insert("a", "x y");
            d.forward("home", "index", &params, true)
        }

        fn late(&mut self, d: &mut Dispatcher, _: &Parameters) -> Result<(), DispatchError> {
            write(d, "early ")?;
            d.output().close_buffers(0, true);
            d.forward("home", "index", &Parameters::default(), false)
        }

        fn redirected(&mut self, d: &mut Dispatcher, _: &Parameters) -> Result<(), DispatchError> {
            d.forward("home", "index", &Parameters::default(), true)?;
            Err(anyhow::anyhow!("lost after redirect").into())
        }

        fn chain(&mut self, d: &mut Dispatcher, _: &Parameters) -> Result<(), DispatchError> {
            write(d, "chain>")?;
            d.call("HOME", "Index", &Parameters::default())
        }

        fn fail(&mut self, _: &mut Dispatcher, _: &Parameters) -> Result<(), DispatchError> {
            self.recorder.record("blog.fail");
            Err(anyhow::anyhow!("database unreachable").into())
        }

        fn explode(&mut self, d: &mut Dispatcher, _: &Parameters) -> Result<(), DispatchError> {
            write(d, "half a page")?;
            panic!("kaboom");
        }

        fn check(&mut self, _: &mut Dispatcher, params: &Parameters) -> Result<(), DispatchError> {
            ensure_true!(params.get("id").is_some(), "Post {} needs an id.", params.len());
            Ok(())
        }

        fn stop(&mut self, _: &mut Dispatcher, _: &Parameters) -> Result<(), DispatchError> {
            Err(RoutingError::application("Stopped on purpose.").into())
        }

        fn mistyped(&mut self, d: &mut Dispatcher, _: &Parameters) -> Result<(), DispatchError> {
            let _value: String = d.load_dependency("recorder")?;
            Ok(())
        }

        fn session(&mut self, d: &mut Dispatcher, _: &Parameters) -> Result<(), DispatchError> {
            let visits = d
                .session()
                .and_then(|s| s.get("visits"))
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            if let Some(session) = d.session_mut() {
                session.insert("visits".to_string(), serde_json::json!(visits + 1));
            }
            write(d, &format!("visits {}", visits + 1))
        }
    }

    impl Controller for Blog {
        fn create(d: &mut Dispatcher) -> Result<Self, DispatchError> {
            Ok(Blog { recorder: recorder_of(d)? })
        }

        fn action(name: &str) -> Option<Action<Self>> {
            match name {
                "show" => Some(Blog::show),
                "latest" => Some(Blog::latest),
                "late" => Some(Blog::late),
                "redirected" => Some(Blog::redirected),
                "chain" => Some(Blog::chain),
                "fail" => Some(Blog::fail),
                "explode" => Some(Blog::explode),
                "check" => Some(Blog::check),
                "stop" => Some(Blog::stop),
                "mistyped" => Some(Blog::mistyped),
                "session" => Some(Blog::session),
                _ => None,
            }
        }

        fn finish(&mut self, _: &mut Dispatcher) {
            self.recorder.record("blog.finish");
        }
    }

    /// Error controller printing the user-facing messages.
    pub struct ErrorPage {
        recorder: Arc<Recorder>,
    }

    impl ErrorPage {
        fn render(
            &mut self,
            d: &mut Dispatcher,
            prefix: &str,
            params: &Parameters,
        ) -> Result<(), DispatchError> {
            self.recorder.record(prefix);
            self.recorder.store_errors(params.errors());
            let messages: Vec<&str> = params
                .errors()
                .iter()
                .filter_map(ErrorRecord::user_message)
                .collect();
            write(d, &format!("{prefix}:{}", messages.join("|")))
        }

        fn index(&mut self, d: &mut Dispatcher, params: &Parameters) -> Result<(), DispatchError> {
            self.render(d, "error", params)
        }

        fn ajax(&mut self, d: &mut Dispatcher, params: &Parameters) -> Result<(), DispatchError> {
            self.render(d, "ajax", params)
        }
    }

    impl Controller for ErrorPage {
        fn create(d: &mut Dispatcher) -> Result<Self, DispatchError> {
            Ok(ErrorPage { recorder: recorder_of(d)? })
        }

        fn action(name: &str) -> Option<Action<Self>> {
            match name {
                "index" => Some(ErrorPage::index),
                "ajax" => Some(ErrorPage::ajax),
                _ => None,
            }
        }
    }

    /// Error controller that cannot render anything.
    pub struct BrokenErrorPage;

    impl BrokenErrorPage {
        fn index(&mut self, d: &mut Dispatcher, _: &Parameters) -> Result<(), DispatchError> {
            write(d, "partial error page")?;
            Err(anyhow::anyhow!("template missing").into())
        }

        fn ajax(&mut self, _: &mut Dispatcher, _: &Parameters) -> Result<(), DispatchError> {
            panic!("error page exploded");
        }
    }

    impl Controller for BrokenErrorPage {
        fn create(_: &mut Dispatcher) -> Result<Self, DispatchError> {
            Ok(BrokenErrorPage)
        }

        fn action(name: &str) -> Option<Action<Self>> {
            match name {
                "index" => Some(BrokenErrorPage::index),
                "ajax" => Some(BrokenErrorPage::ajax),
                _ => None,
            }
        }
    }

    pub fn registry(recorder: &Arc<Recorder>) -> Registry {
        let shared = Arc::clone(recorder);
        let allow = Arc::clone(recorder);
        let deny = Arc::clone(recorder);
        let login = Arc::clone(recorder);
        Registry::new()
            .dependency("recorder", move |_| Ok(Arc::clone(&shared)))
            .controller::<Home>("home")
            .controller::<Blog>("blog")
            .controller::<ErrorPage>("error")
            .controller::<BrokenErrorPage>("broken")
            .security_policy("open", move || RecordingPolicy {
                recorder: Arc::clone(&allow),
                mode: PolicyMode::Allow,
            })
            .security_policy("deny", move || RecordingPolicy {
                recorder: Arc::clone(&deny),
                mode: PolicyMode::Deny,
            })
            .security_policy("login", move || RecordingPolicy {
                recorder: Arc::clone(&login),
                mode: PolicyMode::Login,
            })
    }

    /// Every required key, with the open policy.
    pub fn base_config() -> MapConfiguration {
        MapConfiguration::new()
            .with("CLIENT_CHARSET", "UTF-8")
            .with("CLIENT_LANGUAGE", "en_GB")
            .with("SECURITY_POLICY", "open")
            .with("DEFAULT_CONTROLLER", "home")
            .with("DEFAULT_ACTION", "index")
            .with("ERROR_CONTROLLER", "error")
            .with("ERROR_ACTION", "index")
            .with("ERROR_AJAX_ACTION", "ajax")
            .with("URL", "/app/")
    }

    pub fn request(route: Option<&str>) -> Request {
        Request::new(route)
    }

    pub fn ajax_request(route: Option<&str>) -> Request {
        let mut request = Request::new(route);
        request.headers.insert(
            "X-Requested-With",
            http::HeaderValue::from_static("XMLHttpRequest"),
        );
        request
    }
}

pub mod harness {
    use std::sync::Arc;

    use mvc_dispatch::config::MapConfiguration;
    use mvc_dispatch::dispatcher::{Dispatcher, DispatcherBuilder};
    use mvc_dispatch::session::{MemorySession, SessionStore};

    use super::fixtures::{registry, Recorder};

    /// Builder over the fixture registry with `config` and a live session.
    pub fn builder(recorder: &Arc<Recorder>, config: MapConfiguration) -> DispatcherBuilder {
        let mut session = MemorySession::new();
        session.insert("user".to_string(), serde_json::json!("alice"));
        Dispatcher::builder(Arc::new(registry(recorder)))
            .configuration(Arc::new(config))
            .session(Box::new(session))
    }

    pub fn dispatcher(recorder: &Arc<Recorder>, config: MapConfiguration) -> Dispatcher {
        builder(recorder, config).build()
    }

    pub fn session_active(dispatcher: &Dispatcher) -> bool {
        dispatcher.session().is_some_and(|s| s.is_active())
    }
}
