//! # Configuration
//!
//! Settings are resolved through three tiers, first hit wins:
//!
//! 1. the [`Configuration`] object registered for the current request;
//! 2. the process-wide [`Environment`] (named constants, optionally seeded
//!    from environment variables);
//! 3. the default supplied by the caller.
//!
//! A key read through [`ConfigResolver::required`] has no tier 3: an absent
//! (or `null`) value is a deployment error reported as an
//! [`AssertionFailure`](crate::assert::AssertionFailure), never a silent
//! default.
//!
//! ## Data Flow
//!
//! ```text
//! config file (YAML/TOML/JSON)
//!     → MapConfiguration::from_file (parse & deserialize)
//!     → Arc<dyn Configuration>, shared by the Application
//!     → ConfigResolver, one per request (owned by the Dispatcher)
//! ```
//!
//! The resolver lives in the per-request dispatcher rather than in a global
//! slot, so concurrent requests never observe each other's configuration.

mod environment;
pub mod keys;
mod resolver;
mod source;

pub use environment::Environment;
pub use resolver::{value_as_bool, ConfigResolver};
pub use source::{ConfigError, Configuration, MapConfiguration};
