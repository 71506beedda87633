//! Route targets and the parameter bag handed to controller actions.

use std::borrow::Cow;

use serde::Serialize;
use smallvec::SmallVec;

use crate::codec::SegmentVec;
use crate::error::ErrorRecord;

/// Maximum number of parameters kept inline before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Ordered key/value storage for associative parameters.
pub type ParamVec = SmallVec<[(String, String); MAX_INLINE_PARAMS]>;

/// Parameters passed to a controller action as its single argument.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Parameters {
    /// `key/value` pairs taken two route segments at a time.
    Associative(ParamVec),
    /// Route segments kept in order.
    Positional(SegmentVec),
    /// Error records handed to the error controller.
    #[serde(skip)]
    Errors(Vec<ErrorRecord>),
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters::Associative(ParamVec::new())
    }
}

impl Parameters {
    /// Empty associative bag.
    #[must_use]
    pub fn associative() -> Self {
        Parameters::Associative(ParamVec::new())
    }

    /// Empty positional bag.
    #[must_use]
    pub fn positional() -> Self {
        Parameters::Positional(SegmentVec::new())
    }

    /// Pair consecutive segments into `key → value`.
    ///
    /// An unmatched trailing key maps to the empty string. A repeated key
    /// keeps its first position and takes the later value.
    #[must_use]
    pub fn pair_segments<I>(segments: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut params = Parameters::associative();
        let mut iter = segments.into_iter();
        while let Some(key) = iter.next() {
            let value = iter.next().unwrap_or_default();
            params.insert(key, value);
        }
        params
    }

    /// Insert a value.
    ///
    /// Associative bags replace an existing key in place; positional bags
    /// append the value and ignore the key; error bags are left untouched.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        match self {
            Parameters::Associative(pairs) => {
                let key = key.into();
                let value = value.into();
                if let Some(slot) = pairs.iter_mut().find(|(k, _)| *k == key) {
                    slot.1 = value;
                } else {
                    pairs.push((key, value));
                }
            }
            Parameters::Positional(values) => values.push(value.into()),
            Parameters::Errors(_) => {}
        }
    }

    /// Look up an associative parameter by name.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        match self {
            Parameters::Associative(pairs) => pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// Look up a parameter by position.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<&str> {
        match self {
            Parameters::Associative(pairs) => pairs.get(index).map(|(_, v)| v.as_str()),
            Parameters::Positional(values) => values.get(index).map(String::as_str),
            Parameters::Errors(_) => None,
        }
    }

    /// Error records, when this bag was built for the error controller.
    #[must_use]
    pub fn errors(&self) -> &[ErrorRecord] {
        match self {
            Parameters::Errors(records) => records,
            _ => &[],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Parameters::Associative(pairs) => pairs.len(),
            Parameters::Positional(values) => values.len(),
            Parameters::Errors(records) => records.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate `(key, value)`; positional keys are the indices.
    /// Error bags yield nothing.
    pub fn pairs(&self) -> Box<dyn Iterator<Item = (Cow<'_, str>, &str)> + '_> {
        match self {
            Parameters::Associative(pairs) => Box::new(
                pairs
                    .iter()
                    .map(|(k, v)| (Cow::Borrowed(k.as_str()), v.as_str())),
            ),
            Parameters::Positional(values) => Box::new(
                values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (Cow::Owned(i.to_string()), v.as_str())),
            ),
            Parameters::Errors(_) => Box::new(std::iter::empty()),
        }
    }
}

/// Controller, action and parameters resolved from one request.
///
/// Built once from the parsed route; the security policy may replace it with
/// a rewritten target before dispatch consumes it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RouteTarget {
    pub controller: String,
    pub action: String,
    pub parameters: Parameters,
}

impl RouteTarget {
    #[must_use]
    pub fn new(
        controller: impl Into<String>,
        action: impl Into<String>,
        parameters: Parameters,
    ) -> Self {
        Self {
            controller: controller.into(),
            action: action.into(),
            parameters,
        }
    }

    /// Same target with another controller/action, parameters kept.
    #[must_use]
    pub fn redirect_to(mut self, controller: impl Into<String>, action: impl Into<String>) -> Self {
        self.controller = controller.into();
        self.action = action.into();
        self
    }
}
