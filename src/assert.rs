//! # Assertion Gate
//!
//! Turns a boolean invariant into either a no-op or an [`AssertionFailure`].
//! The message is only built on the failure path: callers hand over a thunk
//! (or use the [`ensure_true!`](crate::ensure_true) /
//! [`ensure_false!`](crate::ensure_false) macros, which wrap their format
//! arguments in one).
//!
//! ```rust
//! use mvc_dispatch::assert::{is_true, AssertionFailure};
//!
//! fn check(depth: usize) -> Result<(), AssertionFailure> {
//!     is_true(depth < 4, || format!("nesting depth {depth} exceeds 3"))
//! }
//!
//! assert!(check(1).is_ok());
//! assert_eq!(check(9).unwrap_err().to_string(), "nesting depth 9 exceeds 3");
//! ```

use std::fmt;

/// Raised when an invariant checked through the gate does not hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssertionFailure {
    message: Option<String>,
}

impl AssertionFailure {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }

    /// Failure without a message (zero-argument form).
    #[must_use]
    pub fn bare() -> Self {
        Self { message: None }
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(m) => f.write_str(m),
            None => f.write_str("assertion failed"),
        }
    }
}

impl std::error::Error for AssertionFailure {}

/// Fail unless `condition == expected`; `message` runs only on failure.
pub fn require<F>(condition: bool, expected: bool, message: F) -> Result<(), AssertionFailure>
where
    F: FnOnce() -> String,
{
    if condition == expected {
        Ok(())
    } else {
        Err(AssertionFailure::new(message()))
    }
}

/// Fail unless `condition` holds.
pub fn is_true<F>(condition: bool, message: F) -> Result<(), AssertionFailure>
where
    F: FnOnce() -> String,
{
    require(condition, true, message)
}

/// Fail if `condition` holds.
pub fn is_false<F>(condition: bool, message: F) -> Result<(), AssertionFailure>
where
    F: FnOnce() -> String,
{
    require(condition, false, message)
}

/// Return early with an [`AssertionFailure`] unless the condition holds.
///
/// - `ensure_true!(cond)` fails without a message;
/// - `ensure_true!(cond, "text")` uses the literal as is;
/// - `ensure_true!(cond, "fmt {}", args..)` formats only on failure.
///
/// The failure goes through `Into`, so the macro works in functions
/// returning `Result<_, AssertionFailure>` or `Result<_, DispatchError>`.
#[macro_export]
macro_rules! ensure_true {
    ($cond:expr $(,)?) => {
        if !($cond) {
            return Err($crate::assert::AssertionFailure::bare().into());
        }
    };
    ($cond:expr, $msg:literal $(,)?) => {
        if !($cond) {
            return Err($crate::assert::AssertionFailure::new($msg).into());
        }
    };
    ($cond:expr, $fmt:literal, $($arg:tt)+) => {
        if !($cond) {
            return Err($crate::assert::AssertionFailure::new(format!($fmt, $($arg)+)).into());
        }
    };
}

/// Return early with an [`AssertionFailure`] if the condition holds.
///
/// Same argument forms as [`ensure_true!`](crate::ensure_true).
#[macro_export]
macro_rules! ensure_false {
    ($cond:expr $(,)?) => {
        $crate::ensure_true!(!($cond))
    };
    ($cond:expr, $msg:literal $(,)?) => {
        $crate::ensure_true!(!($cond), $msg)
    };
    ($cond:expr, $fmt:literal, $($arg:tt)+) => {
        $crate::ensure_true!(!($cond), $fmt, $($arg)+)
    };
}
