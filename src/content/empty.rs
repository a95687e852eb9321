use super::{Content, Value};
use crate::error::{Error, Result};
use crate::form::{EmptyForm, Form, Parameters};
use crate::selector::{FieldKey, Selector};

/// An array with no elements and no type.
#[derive(Clone, Debug, Default)]
pub struct EmptyArray {
    pub(super) parameters: Parameters,
}

impl EmptyArray {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        true
    }

    #[must_use]
    pub fn form(&self) -> Form {
        Form::from(EmptyForm::new()).with_parameters(self.parameters.clone())
    }

    pub(super) fn getitem_at_nowrap(&self, at: usize) -> Result<Value> {
        Err(Error::IndexOutOfBounds {
            index: i64::try_from(at).unwrap_or(i64::MAX),
            length: 0,
        })
    }

    pub(super) fn range_nowrap(&self, _start: usize, _stop: usize) -> Result<Content> {
        Ok(Content::Empty(self.clone()))
    }

    pub(super) fn carry(&self, positions: &[usize]) -> Result<Content> {
        match positions.first() {
            None => Ok(Content::Empty(self.clone())),
            Some(&at) => self.getitem_at_nowrap(at).map(|_| Content::Empty(self.clone())),
        }
    }

    /// An empty array has every field, all of them empty.
    pub(super) fn getitem_field(&self, _key: &FieldKey) -> Result<Content> {
        Ok(Content::Empty(self.clone()))
    }

    pub(super) fn getitem_next(&self, _head: &Selector, _tail: &[Selector]) -> Result<Content> {
        Ok(Content::Empty(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty() {
        let empty = Content::from(EmptyArray::new());
        assert_eq!(empty.length().unwrap(), 0);
        assert_eq!(empty.to_list().unwrap(), json!([]));
        assert!(empty.getitem_at(0).unwrap_err().is_index_error());
        assert!(empty.getitem_field(&"x".into()).is_ok());
        assert_eq!(empty.array_type().unwrap().to_string(), "0 * unknown");
    }
}
