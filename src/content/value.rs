use super::{Content, Record};
use crate::datatypes::Scalar;
use crate::error::{Error, Result};
use crate::selector::Selector;
use std::fmt;

/// What selecting one element yields.
#[derive(Clone, Debug)]
pub enum Value {
    /// A missing element of an option-type array.
    None,
    Scalar(Scalar),
    /// A sub-array, such as one list of a list array.
    Array(Content),
    Record(Record),
}

impl Value {
    /// Returns a short name for the kind of value, for error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Scalar(_) => "scalar",
            Self::Array(_) => "array",
            Self::Record(_) => "record",
        }
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    #[must_use]
    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Self::Scalar(scalar) => Some(*scalar),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        self.as_scalar().and_then(Scalar::as_f64)
    }

    /// Unwraps a sub-array.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not an array.
    pub fn into_content(self) -> Result<Content> {
        match self {
            Self::Array(content) => Ok(content),
            other => Err(Error::NotAnArray(other.kind().to_string())),
        }
    }

    /// Applies the remaining selectors to this value.
    ///
    /// # Errors
    ///
    /// Returns an error if a selector needs a dimension this value does not
    /// have.
    pub fn getitem(&self, selectors: &[Selector]) -> Result<Value> {
        let (head, rest) = match selectors.split_first() {
            Some(split) => split,
            None => return Ok(self.clone()),
        };
        match (self, head) {
            (Self::Array(content), _) => content.getitem(selectors),
            (Self::Record(record), Selector::Field(key)) => record.field(key)?.getitem(rest),
            _ => Err(Error::TooManyDimensions),
        }
    }

    /// Converts the value into JSON, materializing virtual nodes.
    ///
    /// # Errors
    ///
    /// Returns an error if materialization fails.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        match self {
            Self::None => Ok(serde_json::Value::Null),
            Self::Scalar(scalar) => Ok(scalar.to_json()),
            Self::Array(content) => content.to_list(),
            Self::Record(record) => record.to_json(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_json() {
            Ok(json) => write!(f, "{}", json),
            Err(e) => write!(f, "<{}: {}>", self.kind(), e),
        }
    }
}

/// Iterates over the elements of a concrete array.
#[derive(Debug)]
pub struct ContentIter {
    content: Content,
    at: usize,
    length: usize,
}

impl ContentIter {
    pub(super) fn new(content: Content) -> Result<Self> {
        let length = content.length()?;
        Ok(Self {
            content,
            at: 0,
            length,
        })
    }
}

impl Iterator for ContentIter {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.at >= self.length {
            return None;
        }
        let item = self.content.getitem_at_nowrap(self.at);
        self.at += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.length - self.at;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ContentIter {}
