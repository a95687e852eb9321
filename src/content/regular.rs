use super::{list, Content, Value};
use crate::error::{Error, Result};
use crate::form::{Form, Parameters, RegularForm};
use crate::selector::{FieldKey, Selector};

/// Lists of equal size `size` laid out back to back in `content`.
#[derive(Clone, Debug)]
pub struct RegularArray {
    content: Box<Content>,
    size: usize,
    length: usize,
    pub(super) parameters: Parameters,
}

impl RegularArray {
    /// Groups `content` into lists of `size` elements. A trailing partial
    /// list is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if `size` is zero, or if the content length cannot be
    /// determined.
    pub fn new(content: Content, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidLayout(
                "a RegularArray of size 0 needs an explicit length".to_string(),
            ));
        }
        let length = content.length()? / size;
        Ok(Self {
            content: Box::new(content),
            size,
            length,
            parameters: Parameters::new(),
        })
    }

    /// Groups `content` into `length` lists of `size` elements.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is too short.
    pub fn with_length(content: Content, size: usize, length: usize) -> Result<Self> {
        super::check_content_length("RegularArray", &content, size * length)?;
        Ok(Self {
            content: Box::new(content),
            size,
            length,
            parameters: Parameters::new(),
        })
    }

    #[must_use]
    pub fn content(&self) -> &Content {
        &self.content
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
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
        Form::from(RegularForm::new(self.content.form(), self.size))
            .with_parameters(self.parameters.clone())
    }

    fn rebuild(&self, content: Content, length: usize) -> Content {
        Content::Regular(Self {
            content: Box::new(content),
            size: self.size,
            length,
            parameters: self.parameters.clone(),
        })
    }

    pub(super) fn getitem_at_nowrap(&self, at: usize) -> Result<Value> {
        let start = at * self.size;
        Ok(Value::Array(self.content.range_nowrap(start, start + self.size)?))
    }

    pub(super) fn range_nowrap(&self, start: usize, stop: usize) -> Result<Content> {
        let content = self
            .content
            .range_nowrap(start * self.size, stop * self.size)?;
        Ok(self.rebuild(content, stop - start))
    }

    pub(super) fn carry(&self, positions: &[usize]) -> Result<Content> {
        let size = self.size;
        let expanded: Vec<usize> = positions
            .iter()
            .flat_map(|p| (p * size)..((p + 1) * size))
            .collect();
        Ok(self.rebuild(self.content.carry(&expanded)?, positions.len()))
    }

    pub(super) fn getitem_field(&self, key: &FieldKey) -> Result<Content> {
        Ok(self.rebuild(self.content.getitem_field(key)?, self.length))
    }

    pub(super) fn getitem_next(&self, head: &Selector, tail: &[Selector]) -> Result<Content> {
        let size = self.size;
        let rows: Vec<(usize, usize)> = (0..self.length)
            .map(|i| (i * size, (i + 1) * size))
            .collect();
        list::getitem_next_rows(&rows, &self.content, head, tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::NumpyArray;
    use serde_json::json;

    fn pairs() -> Content {
        let content = NumpyArray::from((0..7_i64).collect::<Vec<_>>());
        RegularArray::new(content.into(), 2).unwrap().into()
    }

    #[test]
    fn drops_partial_list() {
        let array = pairs();
        assert_eq!(array.length().unwrap(), 3);
        assert_eq!(array.to_list().unwrap(), json!([[0, 1], [2, 3], [4, 5]]));
        assert_eq!(array.array_type().unwrap().to_string(), "3 * 2 * int64");
    }

    #[test]
    fn slicing() {
        let array = pairs();
        assert_eq!(
            array.slice(&Selector::Take(vec![2, 0])).unwrap().to_list().unwrap(),
            json!([[4, 5], [0, 1]])
        );
        assert_eq!(
            array.slice(&Selector::range(Some(1), None)).unwrap().to_list().unwrap(),
            json!([[2, 3], [4, 5]])
        );
        let seconds = array
            .getitem(&[Selector::range(None, None), Selector::At(-1)])
            .unwrap();
        assert_eq!(seconds.to_json().unwrap(), json!([1, 3, 5]));
    }

    #[test]
    fn zero_size() {
        let content = NumpyArray::from(Vec::<f64>::new());
        assert!(RegularArray::new(content.clone().into(), 0).is_err());
        let array: Content = RegularArray::with_length(content.into(), 0, 4).unwrap().into();
        assert_eq!(array.to_list().unwrap(), json!([[], [], [], []]));
        assert!(RegularArray::with_length(NumpyArray::from(vec![1.0]).into(), 1, 2).is_err());
    }
}
