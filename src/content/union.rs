use super::indexed::with_head;
use super::{check_content_length, to_position, Content, Value};
use crate::datatypes::IndexType;
use crate::error::{Error, Result};
use crate::form::{Form, Parameters, UnionForm};
use crate::index::Index;
use crate::selector::{FieldKey, Selector};

/// Element `i` is `contents[tags[i]][index[i]]`.
#[derive(Clone, Debug)]
pub struct UnionArray {
    tags: Index,
    index: Index,
    contents: Vec<Content>,
    pub(super) parameters: Parameters,
}

impl UnionArray {
    /// # Errors
    ///
    /// Returns an error if the tags are not `i8`, `index` is shorter than
    /// `tags`, a tag names a missing content, or a position is out of range.
    pub fn new(tags: Index, index: Index, contents: Vec<Content>) -> Result<Self> {
        if tags.kind() != IndexType::I8 {
            return Err(Error::InvalidLayout(format!(
                "UnionArray tags must be i8, not {}",
                tags.kind()
            )));
        }
        if !matches!(index.kind(), IndexType::I32 | IndexType::U32 | IndexType::I64) {
            return Err(Error::InvalidLayout(format!(
                "UnionArray does not support {} indexes",
                index.kind()
            )));
        }
        if index.len() < tags.len() {
            return Err(Error::InvalidLayout(
                "UnionArray index must be at least as long as tags".to_string(),
            ));
        }
        let mut required = vec![0; contents.len()];
        for (tag, position) in tags.iter().zip(index.iter()) {
            let tag = to_position(tag, "UnionArray tags")?;
            let position = to_position(position, "UnionArray index")?;
            let slot = required.get_mut(tag).ok_or_else(|| {
                Error::InvalidLayout(format!("UnionArray has no content for tag {}", tag))
            })?;
            *slot = (*slot).max(position + 1);
        }
        for (content, required) in contents.iter().zip(required) {
            check_content_length("UnionArray", content, required)?;
        }
        Ok(Self {
            tags,
            index,
            contents,
            parameters: Parameters::new(),
        })
    }

    #[must_use]
    pub fn tags(&self) -> &Index {
        &self.tags
    }

    #[must_use]
    pub fn index(&self) -> &Index {
        &self.index
    }

    #[must_use]
    pub fn contents(&self) -> &[Content] {
        &self.contents
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    #[must_use]
    pub fn form(&self) -> Form {
        Form::from(UnionForm::new(
            self.tags.kind(),
            self.index.kind(),
            self.contents.iter().map(Content::form).collect(),
        ))
        .with_parameters(self.parameters.clone())
    }

    fn rebuild(&self, tags: Index, index: Index, contents: Vec<Content>) -> Content {
        Content::Union(Self {
            tags,
            index,
            contents,
            parameters: self.parameters.clone(),
        })
    }

    fn entry(&self, at: usize) -> Result<(usize, usize)> {
        Ok((
            to_position(self.tags.get(at), "UnionArray tags")?,
            to_position(self.index.get(at), "UnionArray index")?,
        ))
    }

    pub(super) fn getitem_at_nowrap(&self, at: usize) -> Result<Value> {
        let (tag, position) = self.entry(at)?;
        self.contents[tag].getitem_at_nowrap(position)
    }

    pub(super) fn range_nowrap(&self, start: usize, stop: usize) -> Result<Content> {
        Ok(self.rebuild(
            self.tags.range(start, stop),
            self.index.range(start, stop),
            self.contents.clone(),
        ))
    }

    pub(super) fn carry(&self, positions: &[usize]) -> Result<Content> {
        Ok(self.rebuild(
            self.tags.carry(positions),
            self.index.carry(positions),
            self.contents.clone(),
        ))
    }

    pub(super) fn getitem_field(&self, key: &FieldKey) -> Result<Content> {
        let contents = self
            .contents
            .iter()
            .map(|c| c.getitem_field(key))
            .collect::<Result<_>>()?;
        Ok(self.rebuild(self.tags.clone(), self.index.clone(), contents))
    }

    /// Gathers each content's selected elements, applies the selection to
    /// them, and re-points the index at the compacted results.
    pub(super) fn getitem_next(&self, head: &Selector, tail: &[Selector]) -> Result<Content> {
        let selectors = with_head(head, tail);
        let mut positions: Vec<Vec<usize>> = vec![Vec::new(); self.contents.len()];
        let mut index = Vec::with_capacity(self.len());
        for at in 0..self.len() {
            let (tag, position) = self.entry(at)?;
            index.push(positions[tag].len() as i64);
            positions[tag].push(position);
        }
        let contents = self
            .contents
            .iter()
            .zip(&positions)
            .map(|(content, positions)| content.carry(positions)?.getitem_next(&selectors))
            .collect::<Result<_>>()?;
        Ok(self.rebuild(
            self.tags.range(0, self.len()),
            Index::from(index),
            contents,
        ))
    }
}
