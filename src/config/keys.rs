//! Well-known configuration keys read by the dispatcher.

/// Controller used when the route names none. Required.
pub const DEFAULT_CONTROLLER: &str = "DEFAULT_CONTROLLER";
/// Action used when the route names none. Required.
pub const DEFAULT_ACTION: &str = "DEFAULT_ACTION";
/// Controller rendering error pages. Required.
pub const ERROR_CONTROLLER: &str = "ERROR_CONTROLLER";
/// Error action for regular requests. Required.
pub const ERROR_ACTION: &str = "ERROR_ACTION";
/// Error action for AJAX requests. Required.
pub const ERROR_AJAX_ACTION: &str = "ERROR_AJAX_ACTION";
/// Name of the registered security policy. Required.
pub const SECURITY_POLICY: &str = "SECURITY_POLICY";
/// Charset announced in the `Content-Type` header. Required.
pub const CLIENT_CHARSET: &str = "CLIENT_CHARSET";
/// Locale selecting the message catalog (`en_GB`, `fr-FR`, ...). Required.
pub const CLIENT_LANGUAGE: &str = "CLIENT_LANGUAGE";
/// Base URL prefixed to redirect targets. Default `/`.
pub const URL: &str = "URL";
/// Pair route parameters into `key/value` (true) or keep them positional.
/// Default true.
pub const URL_ASSOCIATIVE_PARAMS: &str = "URL_ASSOCIATIVE_PARAMS";
/// Whether requests run with a session. Default true.
pub const CREATE_SESSION: &str = "CREATE_SESSION";
/// Destroy the session after a fatal error. Default true.
pub const DROP_SESSION_ON_FATAL_ERROR: &str = "DROP_SESSION_ON_FATAL_ERROR";
/// Drop pooled connections after a fatal error. Default true.
pub const DROP_CONNECTION_POOLS_ON_FATAL_ERROR: &str = "DROP_CONNECTION_POOLS_ON_FATAL_ERROR";
/// Convert panics into fatal errors instead of resuming them. Default false.
pub const CATCH_INTERNAL_ERRORS: &str = "CATCH_INTERNAL_ERRORS";
