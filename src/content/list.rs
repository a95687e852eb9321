use super::{check_content_length, to_position, Content, NumpyArray, Value};
use crate::datatypes::IndexType;
use crate::error::{Error, Result};
use crate::form::{Form, ListForm, ListOffsetForm, Parameters};
use crate::index::Index;
use crate::selector::{self, wrap_index, FieldKey, Selector};
use serde_json::json;

/// Variable-length lists; list `i` is `content[offsets[i]..offsets[i + 1]]`.
#[derive(Clone, Debug)]
pub struct ListOffsetArray {
    offsets: Index,
    content: Box<Content>,
    pub(super) parameters: Parameters,
}

impl ListOffsetArray {
    /// # Errors
    ///
    /// Returns an error if `offsets` is empty, decreasing, negative, of an
    /// unsupported type, or points past the end of `content`.
    pub fn new(offsets: Index, content: Content) -> Result<Self> {
        check_list_index("ListOffsetArray", offsets.kind())?;
        let first = offsets.iter().next().ok_or_else(|| {
            Error::InvalidLayout("ListOffsetArray offsets must not be empty".to_string())
        })?;
        to_position(first, "ListOffsetArray offsets")?;
        if offsets.as_slice().windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::InvalidLayout(
                "ListOffsetArray offsets must not decrease".to_string(),
            ));
        }
        let last = to_position(offsets.get(offsets.len() - 1), "ListOffsetArray offsets")?;
        check_content_length("ListOffsetArray", &content, last)?;
        Ok(Self {
            offsets,
            content: Box::new(content),
            parameters: Parameters::new(),
        })
    }

    /// Builds an array of strings: lists of `uint8` marked as text.
    #[must_use]
    pub fn strings<S: AsRef<str>>(values: &[S]) -> Self {
        let mut offsets = Vec::with_capacity(values.len() + 1);
        let mut bytes = Vec::new();
        offsets.push(0_i64);
        for value in values {
            bytes.extend_from_slice(value.as_ref().as_bytes());
            offsets.push(bytes.len() as i64);
        }
        let chars = NumpyArray::from(bytes).with_parameters(parameters(json!({"__array__": "char"})));
        Self {
            offsets: Index::from(offsets),
            content: Box::new(chars.into()),
            parameters: parameters(json!({"__array__": "string"})),
        }
    }

    #[must_use]
    pub fn offsets(&self) -> &Index {
        &self.offsets
    }

    #[must_use]
    pub fn content(&self) -> &Content {
        &self.content
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn form(&self) -> Form {
        Form::from(ListOffsetForm::new_unchecked(self.offsets.kind(), self.content.form()))
            .with_parameters(self.parameters.clone())
    }

    fn row(&self, at: usize) -> Result<(usize, usize)> {
        Ok((
            to_position(self.offsets.get(at), "ListOffsetArray offsets")?,
            to_position(self.offsets.get(at + 1), "ListOffsetArray offsets")?,
        ))
    }

    pub(super) fn getitem_at_nowrap(&self, at: usize) -> Result<Value> {
        let (start, stop) = self.row(at)?;
        Ok(Value::Array(self.content.range_nowrap(start, stop)?))
    }

    pub(super) fn range_nowrap(&self, start: usize, stop: usize) -> Result<Content> {
        Ok(Content::ListOffset(Self {
            offsets: self.offsets.range(start, stop + 1),
            content: self.content.clone(),
            parameters: self.parameters.clone(),
        }))
    }

    /// Gathering lists breaks contiguity, so the result is a `ListArray`
    /// over the same content.
    pub(super) fn carry(&self, positions: &[usize]) -> Result<Content> {
        let stops: Vec<usize> = positions.iter().map(|p| p + 1).collect();
        Ok(Content::List(ListArray {
            starts: self.offsets.carry(positions),
            stops: self.offsets.carry(&stops),
            content: self.content.clone(),
            parameters: self.parameters.clone(),
        }))
    }

    pub(super) fn getitem_field(&self, key: &FieldKey) -> Result<Content> {
        Ok(Content::ListOffset(Self {
            offsets: self.offsets.clone(),
            content: Box::new(self.content.getitem_field(key)?),
            parameters: self.parameters.clone(),
        }))
    }

    pub(super) fn getitem_next(&self, head: &Selector, tail: &[Selector]) -> Result<Content> {
        let rows = (0..self.len())
            .map(|i| self.row(i))
            .collect::<Result<Vec<_>>>()?;
        getitem_next_rows(&rows, &self.content, head, tail)
    }
}

/// Variable-length lists; list `i` is `content[starts[i]..stops[i]]`.
#[derive(Clone, Debug)]
pub struct ListArray {
    starts: Index,
    stops: Index,
    content: Box<Content>,
    pub(super) parameters: Parameters,
}

impl ListArray {
    /// # Errors
    ///
    /// Returns an error if `stops` is shorter than `starts`, a list ends
    /// before it starts, or a list points past the end of `content`.
    pub fn new(starts: Index, stops: Index, content: Content) -> Result<Self> {
        check_list_index("ListArray", starts.kind())?;
        check_list_index("ListArray", stops.kind())?;
        if stops.len() < starts.len() {
            return Err(Error::InvalidLayout(
                "ListArray stops must be at least as long as starts".to_string(),
            ));
        }
        let mut required = 0;
        for (start, stop) in starts.iter().zip(stops.iter()) {
            let start = to_position(start, "ListArray starts")?;
            let stop = to_position(stop, "ListArray stops")?;
            if stop < start {
                return Err(Error::InvalidLayout(format!(
                    "ListArray list ends at {} before it starts at {}",
                    stop, start
                )));
            }
            if stop > start {
                required = required.max(stop);
            }
        }
        check_content_length("ListArray", &content, required)?;
        Ok(Self {
            starts,
            stops,
            content: Box::new(content),
            parameters: Parameters::new(),
        })
    }

    #[must_use]
    pub fn starts(&self) -> &Index {
        &self.starts
    }

    #[must_use]
    pub fn stops(&self) -> &Index {
        &self.stops
    }

    #[must_use]
    pub fn content(&self) -> &Content {
        &self.content
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    #[must_use]
    pub fn form(&self) -> Form {
        Form::from(ListForm::new_unchecked(
            self.starts.kind(),
            self.stops.kind(),
            self.content.form(),
        ))
        .with_parameters(self.parameters.clone())
    }

    fn row(&self, at: usize) -> Result<(usize, usize)> {
        Ok((
            to_position(self.starts.get(at), "ListArray starts")?,
            to_position(self.stops.get(at), "ListArray stops")?,
        ))
    }

    pub(super) fn getitem_at_nowrap(&self, at: usize) -> Result<Value> {
        let (start, stop) = self.row(at)?;
        Ok(Value::Array(self.content.range_nowrap(start, stop)?))
    }

    pub(super) fn range_nowrap(&self, start: usize, stop: usize) -> Result<Content> {
        Ok(Content::List(Self {
            starts: self.starts.range(start, stop),
            stops: self.stops.range(start, stop),
            content: self.content.clone(),
            parameters: self.parameters.clone(),
        }))
    }

    pub(super) fn carry(&self, positions: &[usize]) -> Result<Content> {
        Ok(Content::List(Self {
            starts: self.starts.carry(positions),
            stops: self.stops.carry(positions),
            content: self.content.clone(),
            parameters: self.parameters.clone(),
        }))
    }

    pub(super) fn getitem_field(&self, key: &FieldKey) -> Result<Content> {
        Ok(Content::List(Self {
            starts: self.starts.clone(),
            stops: self.stops.clone(),
            content: Box::new(self.content.getitem_field(key)?),
            parameters: self.parameters.clone(),
        }))
    }

    pub(super) fn getitem_next(&self, head: &Selector, tail: &[Selector]) -> Result<Content> {
        let rows = (0..self.len())
            .map(|i| self.row(i))
            .collect::<Result<Vec<_>>>()?;
        getitem_next_rows(&rows, &self.content, head, tail)
    }
}

fn check_list_index(node: &str, kind: IndexType) -> Result<()> {
    match kind {
        IndexType::I32 | IndexType::U32 | IndexType::I64 => Ok(()),
        IndexType::I8 | IndexType::U8 => Err(Error::InvalidLayout(format!(
            "{} does not support {} indexes",
            node, kind
        ))),
    }
}

fn parameters(value: serde_json::Value) -> Parameters {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Parameters::new(),
    }
}

/// Applies `head` to each row `content[start..stop]`, then `tail` below it.
///
/// An integer picks one element per row and drops the dimension. A range or
/// list of positions picks several and yields a `ListOffsetArray`.
pub(super) fn getitem_next_rows(
    rows: &[(usize, usize)],
    content: &Content,
    head: &Selector,
    tail: &[Selector],
) -> Result<Content> {
    match head {
        Selector::At(at) => {
            let positions = rows
                .iter()
                .map(|&(start, stop)| Ok(start + wrap_index(*at, stop - start)?))
                .collect::<Result<Vec<_>>>()?;
            content.carry(&positions)?.getitem_next(tail)
        }
        Selector::Range(_) | Selector::Take(_) => {
            let mut offsets = Vec::with_capacity(rows.len() + 1);
            let mut positions = Vec::new();
            offsets.push(0_i64);
            for &(start, stop) in rows {
                let picked = selector::positions(head, stop - start)?;
                positions.extend(picked.into_iter().map(|p| start + p));
                offsets.push(positions.len() as i64);
            }
            let next = content.carry(&positions)?.getitem_next(tail)?;
            Ok(Content::ListOffset(ListOffsetArray {
                offsets: Index::from(offsets),
                content: Box::new(next),
                parameters: Parameters::new(),
            }))
        }
        Selector::Mask(_) => Err(Error::Unsupported(
            "boolean masks are only supported in the first dimension".to_string(),
        )),
        Selector::Field(key) => content.getitem_field(key)?.getitem_next(tail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jagged() -> ListOffsetArray {
        let content = NumpyArray::from(vec![0.0, 1.1, 2.2, 3.3, 4.4, 5.5, 6.6]);
        ListOffsetArray::new(Index::from(vec![0_i64, 3, 3, 5, 7]), content.into()).unwrap()
    }

    #[test]
    fn validation() {
        let content = || Content::from(NumpyArray::from(vec![1.0, 2.0]));
        assert!(ListOffsetArray::new(Index::from(Vec::<i64>::new()), content()).is_err());
        assert!(ListOffsetArray::new(Index::from(vec![0_i64, 2, 1]), content()).is_err());
        assert!(ListOffsetArray::new(Index::from(vec![0_i64, 3]), content()).is_err());
        assert!(ListOffsetArray::new(Index::from(vec![0_u8, 1]), content()).is_err());
        assert!(ListArray::new(Index::from(vec![1_i64]), Index::from(vec![0_i64]), content()).is_err());
        assert!(ListArray::new(Index::from(vec![5_i64]), Index::from(vec![5_i64]), content()).is_ok());
    }

    #[test]
    fn carry_becomes_list_array() {
        let array = Content::from(jagged());
        let carried = array.carry(&[3, 0]).unwrap();
        assert!(matches!(carried, Content::List(_)));
        assert_eq!(carried.form(), array.form().carried());
        assert_eq!(carried.to_list().unwrap(), json!([[5.5, 6.6], [0.0, 1.1, 2.2]]));

        let again = carried.carry(&[1, 1]).unwrap();
        assert!(matches!(again, Content::List(_)));
        assert_eq!(again.to_list().unwrap(), json!([[0.0, 1.1, 2.2], [0.0, 1.1, 2.2]]));
        assert_eq!(
            again.range_nowrap(1, 2).unwrap().to_list().unwrap(),
            json!([[0.0, 1.1, 2.2]])
        );
    }

    #[test]
    fn per_row_selection() {
        let array = Content::from(jagged());
        let tails = array
            .getitem(&[Selector::Take(vec![0, 3]), Selector::range(Some(1), None)])
            .unwrap();
        assert_eq!(tails.to_json().unwrap(), json!([[1.1, 2.2], [6.6]]));

        let picked = array
            .getitem(&[Selector::Take(vec![0, 2]), Selector::Take(vec![-1, 0])])
            .unwrap();
        assert_eq!(picked.to_json().unwrap(), json!([[2.2, 0.0], [4.4, 3.3]]));
    }

    #[test]
    fn strings() {
        let words = ListOffsetArray::strings(&["one", "two", "three"]);
        assert_eq!(words.len(), 3);
        assert_eq!(
            words.parameters().get("__array__"),
            Some(&json!("string"))
        );
        let third = Content::from(words).getitem_at(2).unwrap().into_content().unwrap();
        assert_eq!(third.length().unwrap(), 5);
        assert_eq!(third.parameter("__array__"), Some(&json!("char")));
    }
}
