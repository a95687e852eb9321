use super::indexed::{option_getitem_next, with_head};
use super::{check_content_length, Content, IndexedOptionArray, Value};
use crate::datatypes::IndexType;
use crate::error::{Error, Result};
use crate::form::{BitMaskedForm, ByteMaskedForm, Form, Parameters, UnmaskedForm};
use crate::index::Index;
use crate::selector::{FieldKey, Selector};

/// Element `i` is present if `(mask[i] != 0) == valid_when`.
#[derive(Clone, Debug)]
pub struct ByteMaskedArray {
    mask: Index,
    content: Box<Content>,
    valid_when: bool,
    pub(super) parameters: Parameters,
}

impl ByteMaskedArray {
    /// # Errors
    ///
    /// Returns an error if `content` is shorter than `mask`.
    pub fn new(mask: Index, content: Content, valid_when: bool) -> Result<Self> {
        check_content_length("ByteMaskedArray", &content, mask.len())?;
        Ok(Self {
            mask,
            content: Box::new(content),
            valid_when,
            parameters: Parameters::new(),
        })
    }

    #[must_use]
    pub fn mask(&self) -> &Index {
        &self.mask
    }

    #[must_use]
    pub fn content(&self) -> &Content {
        &self.content
    }

    #[must_use]
    pub fn valid_when(&self) -> bool {
        self.valid_when
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mask.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mask.is_empty()
    }

    #[must_use]
    pub fn is_valid(&self, at: usize) -> bool {
        (self.mask.get(at) != 0) == self.valid_when
    }

    #[must_use]
    pub fn form(&self) -> Form {
        Form::from(ByteMaskedForm::new(
            self.mask.kind(),
            self.content.form(),
            self.valid_when,
        ))
        .with_parameters(self.parameters.clone())
    }

    fn rebuild(&self, mask: Index, content: Content) -> Content {
        Content::ByteMasked(Self {
            mask,
            content: Box::new(content),
            valid_when: self.valid_when,
            parameters: self.parameters.clone(),
        })
    }

    pub(super) fn getitem_at_nowrap(&self, at: usize) -> Result<Value> {
        if self.is_valid(at) {
            self.content.getitem_at_nowrap(at)
        } else {
            Ok(Value::None)
        }
    }

    pub(super) fn range_nowrap(&self, start: usize, stop: usize) -> Result<Content> {
        Ok(self.rebuild(
            self.mask.range(start, stop),
            self.content.range_nowrap(start, stop)?,
        ))
    }

    pub(super) fn carry(&self, positions: &[usize]) -> Result<Content> {
        Ok(self.rebuild(self.mask.carry(positions), self.content.carry(positions)?))
    }

    pub(super) fn getitem_field(&self, key: &FieldKey) -> Result<Content> {
        Ok(self.rebuild(self.mask.clone(), self.content.getitem_field(key)?))
    }

    pub(super) fn getitem_next(&self, head: &Selector, tail: &[Selector]) -> Result<Content> {
        let valid: Vec<Option<usize>> = (0..self.len())
            .map(|i| if self.is_valid(i) { Some(i) } else { None })
            .collect();
        option_getitem_next(&valid, &self.content, head, tail)
    }
}

/// Element `i` is present if bit `i` of `mask` equals `valid_when`.
///
/// Bits are read least-significant first when `lsb_order` is set.
#[derive(Clone, Debug)]
pub struct BitMaskedArray {
    mask: Index,
    content: Box<Content>,
    valid_when: bool,
    lsb_order: bool,
    bit_offset: usize,
    length: usize,
    pub(super) parameters: Parameters,
}

impl BitMaskedArray {
    /// # Errors
    ///
    /// Returns an error if `mask` is not a byte buffer or holds fewer than
    /// `length` bits, or if `content` is shorter than `length`.
    pub fn new(
        mask: Index,
        content: Content,
        valid_when: bool,
        lsb_order: bool,
        length: usize,
    ) -> Result<Self> {
        if !matches!(mask.kind(), IndexType::U8 | IndexType::I8) {
            return Err(Error::InvalidLayout(format!(
                "BitMaskedArray mask must hold bytes, not {}",
                mask.kind()
            )));
        }
        if mask.len() * 8 < length {
            return Err(Error::InvalidLayout(format!(
                "BitMaskedArray mask of {} bytes cannot cover {} elements",
                mask.len(),
                length
            )));
        }
        check_content_length("BitMaskedArray", &content, length)?;
        Ok(Self {
            mask,
            content: Box::new(content),
            valid_when,
            lsb_order,
            bit_offset: 0,
            length,
            parameters: Parameters::new(),
        })
    }

    #[must_use]
    pub fn mask(&self) -> &Index {
        &self.mask
    }

    #[must_use]
    pub fn content(&self) -> &Content {
        &self.content
    }

    #[must_use]
    pub fn valid_when(&self) -> bool {
        self.valid_when
    }

    #[must_use]
    pub fn lsb_order(&self) -> bool {
        self.lsb_order
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
    pub fn is_valid(&self, at: usize) -> bool {
        let bit = self.bit_offset + at;
        let byte = self.mask.get(bit / 8) & 0xff;
        let shift = if self.lsb_order { bit % 8 } else { 7 - bit % 8 };
        ((byte >> shift) & 1 == 1) == self.valid_when
    }

    #[must_use]
    pub fn form(&self) -> Form {
        Form::from(BitMaskedForm::new(
            self.mask.kind(),
            self.content.form(),
            self.valid_when,
            self.lsb_order,
        ))
        .with_parameters(self.parameters.clone())
    }

    /// Converts the mask into an option index over the same content.
    ///
    /// # Errors
    ///
    /// Returns an error if the content no longer covers the mask.
    pub fn to_indexed_option(&self) -> Result<IndexedOptionArray> {
        let positions: Vec<usize> = (0..self.length).collect();
        self.gather(&positions)
    }

    fn gather(&self, positions: &[usize]) -> Result<IndexedOptionArray> {
        let index: Vec<i64> = positions
            .iter()
            .map(|&p| if self.is_valid(p) { p as i64 } else { -1 })
            .collect();
        Ok(
            IndexedOptionArray::new(Index::from(index), (*self.content).clone())?
                .with_parameters(self.parameters.clone()),
        )
    }

    pub(super) fn getitem_at_nowrap(&self, at: usize) -> Result<Value> {
        if self.is_valid(at) {
            self.content.getitem_at_nowrap(at)
        } else {
            Ok(Value::None)
        }
    }

    pub(super) fn range_nowrap(&self, start: usize, stop: usize) -> Result<Content> {
        Ok(Content::BitMasked(Self {
            mask: self.mask.clone(),
            content: Box::new(self.content.range_nowrap(start, stop)?),
            valid_when: self.valid_when,
            lsb_order: self.lsb_order,
            bit_offset: self.bit_offset + start,
            length: stop - start,
            parameters: self.parameters.clone(),
        }))
    }

    /// Bits cannot be gathered in place, so the result is an
    /// `IndexedOptionArray` over the same content.
    pub(super) fn carry(&self, positions: &[usize]) -> Result<Content> {
        Ok(Content::IndexedOption(self.gather(positions)?))
    }

    pub(super) fn getitem_field(&self, key: &FieldKey) -> Result<Content> {
        Ok(Content::BitMasked(Self {
            mask: self.mask.clone(),
            content: Box::new(self.content.getitem_field(key)?),
            valid_when: self.valid_when,
            lsb_order: self.lsb_order,
            bit_offset: self.bit_offset,
            length: self.length,
            parameters: self.parameters.clone(),
        }))
    }

    pub(super) fn getitem_next(&self, head: &Selector, tail: &[Selector]) -> Result<Content> {
        let valid: Vec<Option<usize>> = (0..self.length)
            .map(|i| if self.is_valid(i) { Some(i) } else { None })
            .collect();
        option_getitem_next(&valid, &self.content, head, tail)
    }
}

/// An option type whose elements are all present.
#[derive(Clone, Debug)]
pub struct UnmaskedArray {
    content: Box<Content>,
    length: usize,
    pub(super) parameters: Parameters,
}

impl UnmaskedArray {
    /// # Errors
    ///
    /// Returns an error if the content length cannot be determined.
    pub fn new(content: Content) -> Result<Self> {
        let length = content.length()?;
        Ok(Self {
            content: Box::new(content),
            length,
            parameters: Parameters::new(),
        })
    }

    #[must_use]
    pub fn content(&self) -> &Content {
        &self.content
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
        Form::from(UnmaskedForm::new(self.content.form())).with_parameters(self.parameters.clone())
    }

    fn rebuild(&self, content: Content, length: usize) -> Content {
        Content::Unmasked(Self {
            content: Box::new(content),
            length,
            parameters: self.parameters.clone(),
        })
    }

    pub(super) fn getitem_at_nowrap(&self, at: usize) -> Result<Value> {
        self.content.getitem_at_nowrap(at)
    }

    pub(super) fn range_nowrap(&self, start: usize, stop: usize) -> Result<Content> {
        Ok(self.rebuild(self.content.range_nowrap(start, stop)?, stop - start))
    }

    pub(super) fn carry(&self, positions: &[usize]) -> Result<Content> {
        Ok(self.rebuild(self.content.carry(positions)?, positions.len()))
    }

    pub(super) fn getitem_field(&self, key: &FieldKey) -> Result<Content> {
        Ok(self.rebuild(self.content.getitem_field(key)?, self.length))
    }

    pub(super) fn getitem_next(&self, head: &Selector, tail: &[Selector]) -> Result<Content> {
        let next = self.content.getitem_next(&with_head(head, tail))?;
        Ok(self.rebuild(next, self.length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{NumpyArray, RegularArray};
    use serde_json::json;

    fn values() -> Content {
        NumpyArray::from(vec![0.0, 1.1, 2.2, 3.3, 4.4, 5.5, 6.6, 7.7, 8.8, 9.9]).into()
    }

    #[test]
    fn byte_masked() {
        let mask = Index::from(vec![0_i8, 1, 1, 0, 1]);
        let array: Content = ByteMaskedArray::new(mask, values(), false).unwrap().into();
        assert_eq!(array.to_list().unwrap(), json!([0.0, null, null, 3.3, null]));
        assert_eq!(array.array_type().unwrap().to_string(), "5 * ?float64");
        let sliced = array.slice(&Selector::range(Some(2), Some(4))).unwrap();
        assert_eq!(sliced.to_list().unwrap(), json!([null, 3.3]));
        let carried = array.carry(&[3, 1, 0]).unwrap();
        assert_eq!(carried.form(), array.form().carried());
        assert_eq!(carried.to_list().unwrap(), json!([3.3, null, 0.0]));
    }

    #[test]
    fn bit_masked_orders() {
        let mask = || Index::from(vec![0b0000_0101_u8, 0b0000_0001]);
        let lsb: Content = BitMaskedArray::new(mask(), values(), true, true, 10)
            .unwrap()
            .into();
        assert_eq!(
            lsb.to_list().unwrap(),
            json!([0.0, null, 2.2, null, null, null, null, null, 8.8, null])
        );
        let msb: Content = BitMaskedArray::new(mask(), values(), true, false, 10)
            .unwrap()
            .into();
        assert_eq!(
            msb.to_list().unwrap(),
            json!([null, null, null, null, null, 5.5, null, 7.7, null, null])
        );
        assert!(BitMaskedArray::new(mask(), values(), true, true, 17).is_err());
    }

    #[test]
    fn bit_masked_slicing() {
        let mask = Index::from(vec![0b1010_1010_u8, 0b0000_0011]);
        let array: Content = BitMaskedArray::new(mask, values(), true, true, 10)
            .unwrap()
            .into();
        let sliced = array.range_nowrap(7, 10).unwrap();
        assert_eq!(sliced.form(), array.form());
        assert_eq!(sliced.to_list().unwrap(), json!([7.7, 8.8, 9.9]));

        let carried = array.carry(&[1, 0, 9]).unwrap();
        assert_eq!(carried.form(), array.form().carried());
        assert_eq!(carried.to_list().unwrap(), json!([1.1, null, 9.9]));

        if let Content::BitMasked(bits) = &array {
            assert_eq!(
                Content::from(bits.to_indexed_option().unwrap()).to_list().unwrap(),
                array.to_list().unwrap()
            );
        }
    }

    #[test]
    fn unmasked_and_nested_selection() {
        let pairs: Content = RegularArray::new(values(), 2).unwrap().into();
        let array: Content = UnmaskedArray::new(pairs).unwrap().into();
        assert_eq!(array.array_type().unwrap().to_string(), "5 * option[2 * float64]");
        let seconds = array
            .getitem(&[Selector::range(None, None), Selector::At(1)])
            .unwrap();
        assert_eq!(seconds.to_json().unwrap(), json!([1.1, 3.3, 5.5, 7.7, 9.9]));

        let mask = Index::from(vec![1_i8, 0, 1, 1, 0]);
        let pairs: Content = RegularArray::new(values(), 2).unwrap().into();
        let masked: Content = ByteMaskedArray::new(mask, pairs, true).unwrap().into();
        let firsts = masked
            .getitem(&[Selector::range(None, None), Selector::At(0)])
            .unwrap();
        assert_eq!(firsts.to_json().unwrap(), json!([0.0, null, 4.4, 6.6, null]));
    }
}
