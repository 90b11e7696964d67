#![forbid(unsafe_code)]

//! Shape classification and deep merge over the JSON form of a value.
//!
//! A box stores a typed `T`, but merging and path lookup are structural
//! operations. Both work on the [`serde_json::Value`] a `T` serializes to.
//!
//! # Merge rules
//!
//! 1. Record into record: keys are merged recursively; keys absent from the
//!    source keep the target's value.
//! 2. Sequence into sequence: elements are merged index by index; extra source
//!    elements are appended, extra target elements are kept.
//! 3. Anything else: the source value replaces the target (including `null`).

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{BoxError, Result};

/// A partial record value, the unit of accumulation for deferred merges.
pub type Patch = Map<String, Value>;

/// Structural category of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// A keyed record (struct, map). The only shape eligible for merges.
    Record,
    /// An ordered sequence (`Vec`, array, tuple).
    Sequence,
    /// Everything else: numbers, strings, booleans, unit and `None`.
    Scalar,
}

impl Shape {
    #[must_use]
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Object(_) => Self::Record,
            Value::Array(_) => Self::Sequence,
            _ => Self::Scalar,
        }
    }

    #[must_use]
    pub const fn is_record(self) -> bool {
        matches!(self, Self::Record)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Record => "record",
            Self::Sequence => "sequence",
            Self::Scalar => "scalar",
        })
    }
}

/// Serialize `value` and require the result to be a record.
///
/// `what` names the value in the error message.
pub fn to_patch<P: Serialize + ?Sized>(value: &P, what: &str) -> Result<Patch> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(BoxError::not_record(what, Shape::of(&other))),
    }
}

/// Merge `source` into `target` in place.
pub fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(dst), Value::Object(src)) => merge_patch(dst, src),
        (Value::Array(dst), Value::Array(src)) => {
            for (index, item) in src.into_iter().enumerate() {
                match dst.get_mut(index) {
                    Some(slot) => deep_merge(slot, item),
                    None => dst.push(item),
                }
            }
        }
        (slot, src) => *slot = src,
    }
}

/// Merge the keys of `source` into `target` in place.
pub fn merge_patch(target: &mut Patch, source: Patch) {
    for (key, value) in source {
        match target.get_mut(&key) {
            Some(slot) => deep_merge(slot, value),
            None => {
                target.insert(key, value);
            }
        }
    }
}
