use super::{check_content_length, to_position, Content, Value};
use crate::datatypes::IndexType;
use crate::error::{Error, Result};
use crate::form::{Form, IndexedForm, IndexedOptionForm, Parameters};
use crate::index::Index;
use crate::selector::{FieldKey, Selector};

/// Element `i` is `content[index[i]]`.
#[derive(Clone, Debug)]
pub struct IndexedArray {
    index: Index,
    content: Box<Content>,
    pub(super) parameters: Parameters,
}

impl IndexedArray {
    /// # Errors
    ///
    /// Returns an error if the index type is not 32 or 64 bits wide, or a
    /// position is negative or past the end of `content`.
    pub fn new(index: Index, content: Content) -> Result<Self> {
        if !matches!(index.kind(), IndexType::I32 | IndexType::U32 | IndexType::I64) {
            return Err(Error::InvalidLayout(format!(
                "IndexedArray does not support {} indexes",
                index.kind()
            )));
        }
        let mut required = 0;
        for value in index.iter() {
            required = required.max(to_position(value, "IndexedArray index")? + 1);
        }
        check_content_length("IndexedArray", &content, required)?;
        Ok(Self {
            index,
            content: Box::new(content),
            parameters: Parameters::new(),
        })
    }

    #[must_use]
    pub fn index(&self) -> &Index {
        &self.index
    }

    #[must_use]
    pub fn content(&self) -> &Content {
        &self.content
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[must_use]
    pub fn form(&self) -> Form {
        Form::from(IndexedForm::new_unchecked(self.index.kind(), self.content.form()))
            .with_parameters(self.parameters.clone())
    }

    fn rebuild(&self, index: Index, content: Content) -> Content {
        Content::Indexed(Self {
            index,
            content: Box::new(content),
            parameters: self.parameters.clone(),
        })
    }

    /// Resolves the indirection into a plain gather of `content`.
    pub fn project(&self) -> Result<Content> {
        let positions = self
            .index
            .iter()
            .map(|v| to_position(v, "IndexedArray index"))
            .collect::<Result<Vec<_>>>()?;
        self.content.carry(&positions)
    }

    pub(super) fn getitem_at_nowrap(&self, at: usize) -> Result<Value> {
        let position = to_position(self.index.get(at), "IndexedArray index")?;
        self.content.getitem_at_nowrap(position)
    }

    pub(super) fn range_nowrap(&self, start: usize, stop: usize) -> Result<Content> {
        Ok(self.rebuild(self.index.range(start, stop), (*self.content).clone()))
    }

    pub(super) fn carry(&self, positions: &[usize]) -> Result<Content> {
        Ok(self.rebuild(self.index.carry(positions), (*self.content).clone()))
    }

    pub(super) fn getitem_field(&self, key: &FieldKey) -> Result<Content> {
        Ok(self.rebuild(self.index.clone(), self.content.getitem_field(key)?))
    }

    pub(super) fn getitem_next(&self, head: &Selector, tail: &[Selector]) -> Result<Content> {
        self.project()?.getitem_next(&with_head(head, tail))
    }
}

/// Element `i` is missing if `index[i]` is negative, else `content[index[i]]`.
#[derive(Clone, Debug)]
pub struct IndexedOptionArray {
    index: Index,
    content: Box<Content>,
    pub(super) parameters: Parameters,
}

impl IndexedOptionArray {
    /// # Errors
    ///
    /// Returns an error if the index type is not `i32` or `i64`, or a
    /// position is past the end of `content`.
    pub fn new(index: Index, content: Content) -> Result<Self> {
        if !matches!(index.kind(), IndexType::I32 | IndexType::I64) {
            return Err(Error::InvalidLayout(format!(
                "IndexedOptionArray does not support {} indexes",
                index.kind()
            )));
        }
        let required = index
            .iter()
            .filter_map(|v| usize::try_from(v).ok())
            .map(|p| p + 1)
            .max()
            .unwrap_or(0);
        check_content_length("IndexedOptionArray", &content, required)?;
        Ok(Self {
            index,
            content: Box::new(content),
            parameters: Parameters::new(),
        })
    }

    #[must_use]
    pub fn index(&self) -> &Index {
        &self.index
    }

    #[must_use]
    pub fn content(&self) -> &Content {
        &self.content
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[must_use]
    pub fn form(&self) -> Form {
        Form::from(IndexedOptionForm::new_unchecked(self.index.kind(), self.content.form()))
            .with_parameters(self.parameters.clone())
    }

    fn rebuild(&self, index: Index, content: Content) -> Content {
        Content::IndexedOption(Self {
            index,
            content: Box::new(content),
            parameters: self.parameters.clone(),
        })
    }

    fn valid(&self) -> Vec<Option<usize>> {
        self.index.iter().map(|v| usize::try_from(v).ok()).collect()
    }

    pub(super) fn getitem_at_nowrap(&self, at: usize) -> Result<Value> {
        match usize::try_from(self.index.get(at)) {
            Ok(position) => self.content.getitem_at_nowrap(position),
            Err(_) => Ok(Value::None),
        }
    }

    pub(super) fn range_nowrap(&self, start: usize, stop: usize) -> Result<Content> {
        Ok(self.rebuild(self.index.range(start, stop), (*self.content).clone()))
    }

    pub(super) fn carry(&self, positions: &[usize]) -> Result<Content> {
        Ok(self.rebuild(self.index.carry(positions), (*self.content).clone()))
    }

    pub(super) fn getitem_field(&self, key: &FieldKey) -> Result<Content> {
        Ok(self.rebuild(self.index.clone(), self.content.getitem_field(key)?))
    }

    pub(super) fn getitem_next(&self, head: &Selector, tail: &[Selector]) -> Result<Content> {
        option_getitem_next(&self.valid(), &self.content, head, tail)
    }
}

pub(super) fn with_head(head: &Selector, tail: &[Selector]) -> Vec<Selector> {
    let mut selectors = Vec::with_capacity(tail.len() + 1);
    selectors.push(head.clone());
    selectors.extend_from_slice(tail);
    selectors
}

/// Applies the selection to the present elements only and keeps the missing
/// ones missing. `valid[i]` is the content position of element `i`.
pub(super) fn option_getitem_next(
    valid: &[Option<usize>],
    content: &Content,
    head: &Selector,
    tail: &[Selector],
) -> Result<Content> {
    let positions: Vec<usize> = valid.iter().flatten().copied().collect();
    let next = content
        .carry(&positions)?
        .getitem_next(&with_head(head, tail))?;
    let mut count = 0_i64;
    let index: Vec<i64> = valid
        .iter()
        .map(|v| match v {
            Some(_) => {
                count += 1;
                count - 1
            }
            None => -1,
        })
        .collect();
    Ok(Content::IndexedOption(IndexedOptionArray {
        index: Index::from(index),
        content: Box::new(next),
        parameters: Parameters::new(),
    }))
}
