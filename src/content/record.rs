use super::indexed::with_head;
use super::{Content, Value};
use crate::error::{Error, Result};
use crate::form::{Form, Parameters, RecordForm};
use crate::selector::{FieldKey, Selector};
use itertools::Itertools;
use std::fmt;

/// Records whose fields are stored as separate, aligned arrays.
///
/// Without keys the record is a tuple and fields are named by position.
#[derive(Clone, Debug)]
pub struct RecordArray {
    keys: Option<Vec<String>>,
    contents: Vec<Content>,
    length: usize,
    pub(super) parameters: Parameters,
}

impl RecordArray {
    /// Creates a record array with named fields. Its length is that of the
    /// shortest field.
    ///
    /// # Errors
    ///
    /// Returns an error if a key repeats or a field length cannot be
    /// determined.
    pub fn new<K: Into<String>>(fields: Vec<(K, Content)>) -> Result<Self> {
        let (keys, contents): (Vec<String>, Vec<Content>) =
            fields.into_iter().map(|(k, c)| (k.into(), c)).unzip();
        if let Some(key) = keys.iter().duplicates().next() {
            return Err(Error::InvalidLayout(format!("duplicate field {:?}", key)));
        }
        let length = shortest(&contents)?;
        Ok(Self {
            keys: Some(keys),
            contents,
            length,
            parameters: Parameters::new(),
        })
    }

    /// Creates a tuple array. Its length is that of the shortest field.
    ///
    /// # Errors
    ///
    /// Returns an error if a field length cannot be determined.
    pub fn tuple(contents: Vec<Content>) -> Result<Self> {
        let length = shortest(&contents)?;
        Ok(Self {
            keys: None,
            contents,
            length,
            parameters: Parameters::new(),
        })
    }

    /// Overrides the length, which is required for records without fields.
    ///
    /// # Errors
    ///
    /// Returns an error if a field is shorter than `length`.
    pub fn with_length(mut self, length: usize) -> Result<Self> {
        for content in &self.contents {
            super::check_content_length("RecordArray", content, length)?;
        }
        self.length = length;
        Ok(self)
    }

    #[must_use]
    pub fn keys(&self) -> Option<&[String]> {
        self.keys.as_deref()
    }

    #[must_use]
    pub fn is_tuple(&self) -> bool {
        self.keys.is_none()
    }

    #[must_use]
    pub fn contents(&self) -> &[Content] {
        &self.contents
    }

    /// Returns the field names, using positions for tuples.
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        match &self.keys {
            Some(keys) => keys.clone(),
            None => (0..self.contents.len()).map(|i| i.to_string()).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.length
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    #[must_use]
    pub fn form(&self) -> Form {
        let form = match &self.keys {
            Some(keys) => RecordForm::new_unchecked(
                keys.clone(),
                self.contents.iter().map(Content::form).collect(),
            ),
            None => RecordForm::tuple(self.contents.iter().map(Content::form).collect()),
        };
        Form::from(form).with_parameters(self.parameters.clone())
    }

    /// Returns the field selected by `key`, trimmed to this array's length.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no such field.
    pub fn field(&self, key: &FieldKey) -> Result<Content> {
        let i = key.resolve(self.keys(), self.contents.len())?;
        let content = &self.contents[i];
        if content.length_hint() == Some(self.length) {
            Ok(content.clone())
        } else {
            content.range_nowrap(0, self.length)
        }
    }

    fn rebuild(&self, contents: Vec<Content>, length: usize) -> Content {
        Content::Record(Self {
            keys: self.keys.clone(),
            contents,
            length,
            parameters: self.parameters.clone(),
        })
    }

    pub(super) fn getitem_at_nowrap(&self, at: usize) -> Result<Value> {
        Ok(Value::Record(Record {
            array: self.clone(),
            at,
        }))
    }

    pub(super) fn range_nowrap(&self, start: usize, stop: usize) -> Result<Content> {
        let contents = self
            .contents
            .iter()
            .map(|c| c.range_nowrap(start, stop))
            .collect::<Result<_>>()?;
        Ok(self.rebuild(contents, stop - start))
    }

    pub(super) fn carry(&self, positions: &[usize]) -> Result<Content> {
        let contents = self
            .contents
            .iter()
            .map(|c| c.carry(positions))
            .collect::<Result<_>>()?;
        Ok(self.rebuild(contents, positions.len()))
    }

    pub(super) fn getitem_field(&self, key: &FieldKey) -> Result<Content> {
        self.field(key)
    }

    pub(super) fn getitem_next(&self, head: &Selector, tail: &[Selector]) -> Result<Content> {
        let selectors = with_head(head, tail);
        let contents = self
            .contents
            .iter()
            .map(|c| c.range_nowrap(0, self.length)?.getitem_next(&selectors))
            .collect::<Result<_>>()?;
        Ok(self.rebuild(contents, self.length))
    }
}

fn shortest(contents: &[Content]) -> Result<usize> {
    let mut length: Option<usize> = None;
    for content in contents {
        let n = content.length()?;
        length = Some(length.map_or(n, |l| l.min(n)));
    }
    Ok(length.unwrap_or(0))
}

/// One element of a `RecordArray`.
#[derive(Clone, Debug)]
pub struct Record {
    array: RecordArray,
    at: usize,
}

impl Record {
    #[must_use]
    pub fn array(&self) -> &RecordArray {
        &self.array
    }

    #[must_use]
    pub fn at(&self) -> usize {
        self.at
    }

    #[must_use]
    pub fn keys(&self) -> Option<&[String]> {
        self.array.keys()
    }

    /// Returns the value of one field.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no such field.
    pub fn field(&self, key: &FieldKey) -> Result<Value> {
        let i = key.resolve(self.array.keys(), self.array.contents.len())?;
        self.array.contents[i].getitem_at_nowrap(self.at)
    }

    /// Returns the values of every field, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if a virtual field fails to materialize.
    pub fn values(&self) -> Result<Vec<Value>> {
        self.array
            .contents
            .iter()
            .map(|c| c.getitem_at_nowrap(self.at))
            .collect()
    }

    /// Converts the record into a JSON object, or an array for tuples.
    ///
    /// # Errors
    ///
    /// Returns an error if a virtual field fails to materialize.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let values = self
            .values()?
            .iter()
            .map(Value::to_json)
            .collect::<Result<Vec<_>>>()?;
        Ok(match self.array.keys() {
            Some(keys) => serde_json::Value::Object(keys.iter().cloned().zip(values).collect()),
            None => serde_json::Value::Array(values),
        })
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_json() {
            Ok(json) => write!(f, "{}", json),
            Err(e) => write!(f, "<record: {}>", e),
        }
    }
}
