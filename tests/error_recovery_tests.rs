//! Integration tests for fatal errors, panics and error page failures
//!
//! # Test Coverage
//!
//! - fatal errors render a generic page, reach the sink and trigger cleanup
//! - cleanup toggles (`DROP_CONNECTION_POOLS_ON_FATAL_ERROR`,
//!   `DROP_SESSION_ON_FATAL_ERROR`, `CREATE_SESSION`)
//! - panics resumed or caught per `CATCH_INTERNAL_ERRORS`
//! - an error page that fails: logged when a sink exists, returned otherwise
//! - output stacks left behind by the host
//!
//! # Key Test Cases
//!
//! - `test_cleanup_runs_when_error_page_fails`: the fatal cleanup is never
//!   skipped, whatever happens while rendering

mod common;

use std::panic::{self, AssertUnwindSafe};

use common::fixtures::{ajax_request, base_config, request, Recorder, RecordingSink};
use common::harness::{builder, dispatcher, session_active};
use http::header::LOCATION;
use http::StatusCode;
use mvc_dispatch::buffer::{BufferFlags, OutputBuffers};
use mvc_dispatch::error::{MSG_INTERNAL_ERROR, MSG_NOT_AUTHORIZED};
use mvc_dispatch::messages::{Catalog, Message};
use mvc_dispatch::{DispatchError, DispatchState};

#[test]
fn test_fatal_error_renders_generic_page_and_cleans_up() {
    let recorder = Recorder::new();
    let sink = RecordingSink::new();
    let mut d = builder(&recorder, base_config()).sink(sink.clone()).build();

    let response = d.run(request(Some("blog/fail"))).unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body_text(), format!("error:{MSG_INTERNAL_ERROR}"));
    assert!(!response.body_text().contains("database"));

    // Generic message first, then the cause for logging.
    let errors = recorder.errors();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0], MSG_INTERNAL_ERROR);
    assert_eq!(errors[1], "database unreachable");

    assert_eq!(sink.records(), vec!["database unreachable".to_string()]);
    assert_eq!(recorder.pools_dropped(), 1);
    assert!(!session_active(&d));
    assert_eq!(d.state(), DispatchState::CleanedUp);
}

#[test]
fn test_fatal_error_page_uses_client_language() {
    let recorder = Recorder::new();
    let config = base_config().with("CLIENT_LANGUAGE", "fr-FR");
    let mut d = dispatcher(&recorder, config);

    let response = d.run(request(Some("blog/fail"))).unwrap();

    let generic = Catalog::French.text(Message::InternalError);
    assert_eq!(response.body_text(), format!("error:{generic}"));
    assert_eq!(recorder.errors()[0], generic);
}

#[test]
fn test_redirect_before_failure_is_dropped_from_error_page() {
    let recorder = Recorder::new();
    let mut d = dispatcher(&recorder, base_config());

    let response = d.run(request(Some("blog/redirected"))).unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.get_header(LOCATION.as_str()), None);
    assert_eq!(response.body_text(), format!("error:{MSG_INTERNAL_ERROR}"));
    assert_eq!(d.state(), DispatchState::CleanedUp);
}

#[test]
fn test_redirect_before_ajax_failure_gets_500() {
    let recorder = Recorder::new();
    let mut d = dispatcher(&recorder, base_config());

    let response = d.run(ajax_request(Some("blog/redirected"))).unwrap();

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.get_header(LOCATION.as_str()), None);
    assert_eq!(response.body_text(), format!("ajax:{MSG_INTERNAL_ERROR}"));
}

#[test]
fn test_fatal_ajax_error_gets_500() {
    let recorder = Recorder::new();
    let mut d = dispatcher(&recorder, base_config());

    let response = d.run(ajax_request(Some("blog/fail"))).unwrap();

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body_text(), format!("ajax:{MSG_INTERNAL_ERROR}"));
}

#[test]
fn test_cleanup_can_be_disabled() {
    let recorder = Recorder::new();
    let config = base_config()
        .with("DROP_CONNECTION_POOLS_ON_FATAL_ERROR", false)
        .with("DROP_SESSION_ON_FATAL_ERROR", "off");
    let mut d = dispatcher(&recorder, config);

    d.run(request(Some("blog/fail"))).unwrap();

    assert_eq!(recorder.pools_dropped(), 0);
    assert!(session_active(&d));
    assert_eq!(d.state(), DispatchState::CleanedUp);
}

#[test]
fn test_session_kept_when_sessions_are_disabled() {
    let recorder = Recorder::new();
    let config = base_config().with("CREATE_SESSION", false);
    let mut d = dispatcher(&recorder, config);

    d.run(request(Some("blog/fail"))).unwrap();

    assert_eq!(recorder.pools_dropped(), 1);
    assert!(session_active(&d));
}

#[test]
fn test_cleanup_runs_when_error_page_fails() {
    let recorder = Recorder::new();
    let sink = RecordingSink::new();
    let config = base_config().with("ERROR_CONTROLLER", "broken");
    let mut d = builder(&recorder, config).sink(sink.clone()).build();

    let response = d.run(request(Some("blog/fail"))).unwrap();

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.body.is_empty());
    assert_eq!(
        sink.records(),
        vec![
            "database unreachable".to_string(),
            "template missing".to_string()
        ]
    );
    assert_eq!(recorder.pools_dropped(), 1);
    assert!(!session_active(&d));
    assert_eq!(d.state(), DispatchState::CleanedUp);
}

#[test]
fn test_failed_error_page_without_sink_returns_error() {
    let recorder = Recorder::new();
    let config = base_config().with("ERROR_CONTROLLER", "broken");
    let mut d = dispatcher(&recorder, config);

    let err = d.run(request(Some("blog/fail"))).unwrap_err();

    assert!(matches!(err, DispatchError::Fatal(_)));
    assert!(err.to_string().contains("template missing"));
    // Cleanup ran before the error was handed back.
    assert_eq!(recorder.pools_dropped(), 1);
    assert!(!session_active(&d));
    assert_eq!(d.state(), DispatchState::CleanedUp);
    assert!(d.buffers().client_bytes().is_empty());
}

#[test]
fn test_failed_error_page_logs_original_routing_error() {
    let recorder = Recorder::new();
    let sink = RecordingSink::new();
    let config = base_config()
        .with("SECURITY_POLICY", "deny")
        .with("ERROR_CONTROLLER", "broken");
    let mut d = builder(&recorder, config).sink(sink.clone()).build();

    let response = d.run(request(Some("blog/show"))).unwrap();

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.body.is_empty());
    assert_eq!(
        sink.records(),
        vec!["template missing".to_string(), MSG_NOT_AUTHORIZED.to_string()]
    );
    // Recoverable path: no cleanup.
    assert_eq!(recorder.pools_dropped(), 0);
    assert!(session_active(&d));
    assert_eq!(d.state(), DispatchState::ErrorRendered);
}

#[test]
fn test_failed_error_page_on_routing_error_without_sink() {
    let recorder = Recorder::new();
    let config = base_config()
        .with("SECURITY_POLICY", "deny")
        .with("ERROR_CONTROLLER", "broken");
    let mut d = dispatcher(&recorder, config);

    let err = d.run(request(Some("blog/show"))).unwrap_err();

    assert!(!err.is_routing());
    assert_eq!(recorder.pools_dropped(), 0);
    assert_eq!(d.state(), DispatchState::ErrorRecoverable);
}

#[test]
fn test_missing_error_controller_setting_without_sink() {
    let recorder = Recorder::new();
    let config = base_config()
        .with("SECURITY_POLICY", "deny")
        .with("ERROR_CONTROLLER", serde_json::Value::Null);
    let mut d = dispatcher(&recorder, config);

    let err = d.run(request(None)).unwrap_err();

    let routing = err.as_routing().unwrap();
    assert!(routing.message.contains("ERROR_CONTROLLER"));
}

#[test]
fn test_panic_is_resumed_by_default() {
    let recorder = Recorder::new();
    let sink = RecordingSink::new();
    let mut d = builder(&recorder, base_config()).sink(sink.clone()).build();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| d.run(request(Some("blog/explode")))));

    let payload = outcome.unwrap_err();
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"kaboom"));
    // Cleanup still ran and the partial page never reached the client.
    assert_eq!(recorder.pools_dropped(), 1);
    assert!(!session_active(&d));
    assert_eq!(d.state(), DispatchState::CleanedUp);
    assert!(d.buffers().client_bytes().is_empty());
    assert!(sink.records().is_empty());
}

#[test]
fn test_panic_is_caught_when_enabled() {
    let recorder = Recorder::new();
    let sink = RecordingSink::new();
    let config = base_config().with("CATCH_INTERNAL_ERRORS", true);
    let mut d = builder(&recorder, config).sink(sink.clone()).build();

    let response = d.run(request(Some("blog/explode"))).unwrap();

    assert_eq!(response.body_text(), format!("error:{MSG_INTERNAL_ERROR}"));
    assert_eq!(sink.records(), vec!["panic: kaboom".to_string()]);
    assert_eq!(recorder.pools_dropped(), 1);
    assert_eq!(d.state(), DispatchState::CleanedUp);
}

#[test]
fn test_error_page_panic_is_resumed_by_default() {
    let recorder = Recorder::new();
    let sink = RecordingSink::new();
    let config = base_config()
        .with("SECURITY_POLICY", "deny")
        .with("ERROR_CONTROLLER", "broken");
    let mut d = builder(&recorder, config).sink(sink.clone()).build();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| d.run(ajax_request(None))));

    let payload = outcome.unwrap_err();
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"error page exploded"));
    assert!(sink.records().is_empty());
}

#[test]
fn test_error_page_panic_is_logged_when_caught() {
    let recorder = Recorder::new();
    let sink = RecordingSink::new();
    let config = base_config()
        .with("SECURITY_POLICY", "deny")
        .with("ERROR_CONTROLLER", "broken")
        .with("CATCH_INTERNAL_ERRORS", "yes");
    let mut d = builder(&recorder, config).sink(sink.clone()).build();

    let response = d.run(ajax_request(None)).unwrap();

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        sink.records(),
        vec![
            "panic: error page exploded".to_string(),
            MSG_NOT_AUTHORIZED.to_string()
        ]
    );
}

#[test]
fn test_host_frame_without_remove_capability_is_kept() {
    let recorder = Recorder::new();
    let mut output = OutputBuffers::new();
    output.start_with(BufferFlags::FLUSHABLE | BufferFlags::CLEANABLE);
    let mut d = builder(&recorder, base_config()).output(output).build();

    let response = d.run(request(None)).unwrap();

    assert!(response.body.is_empty());
    assert_eq!(d.buffers().level(), 1);
    assert_eq!(d.buffers().contents(), Some(&b"home"[..]));
    assert_eq!(d.state(), DispatchState::Completed);
}

#[test]
fn test_output_already_sent_fails_initialization() {
    let recorder = Recorder::new();
    let mut output = OutputBuffers::new();
    output.write_bytes(b"preamble|");
    let mut d = builder(&recorder, base_config()).output(output).build();

    let response = d.run(request(None)).unwrap();

    assert!(!recorder.saw("home.index"));
    assert_eq!(
        response.body_text(),
        "preamble|error:HTTP headers have already been sent."
    );
    assert_eq!(d.state(), DispatchState::ErrorRendered);
}
