use crate::datatypes::IndexType;
use crate::error::{Error, Result};
use num_traits::ToPrimitive;
use std::fmt;
use std::sync::Arc;

/// An immutable buffer of integers backing offsets, indexes, tags and masks.
///
/// Values are widened to `i64` in memory; `kind` records the declared type,
/// which is what a `Form` reports. Ranges share the underlying buffer.
#[derive(Clone)]
pub struct Index {
    kind: IndexType,
    data: Arc<[i64]>,
    offset: usize,
    len: usize,
}

impl Index {
    /// Creates an index of the given type.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is not representable in `kind`.
    pub fn new(kind: IndexType, values: Vec<i64>) -> Result<Self> {
        if let Some(v) = values.iter().find(|v| !kind.holds(**v)) {
            return Err(Error::InvalidLayout(format!(
                "value {} does not fit in index type {}",
                v, kind
            )));
        }
        let len = values.len();
        Ok(Self {
            kind,
            data: values.into(),
            offset: 0,
            len,
        })
    }

    fn from_native<T: ToPrimitive>(kind: IndexType, values: Vec<T>) -> Self {
        let values: Vec<i64> = values
            .into_iter()
            .map(|v| v.to_i64().unwrap_or_default())
            .collect();
        let len = values.len();
        Self {
            kind,
            data: values.into(),
            offset: 0,
            len,
        }
    }

    #[must_use]
    pub fn kind(&self) -> IndexType {
        self.kind
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the value at `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of bound.
    #[must_use]
    pub fn get(&self, i: usize) -> i64 {
        assert!(i < self.len, "index out of bound");
        self.data[self.offset + i]
    }

    #[must_use]
    pub fn as_slice(&self) -> &[i64] {
        &self.data[self.offset..self.offset + self.len]
    }

    pub fn iter(&self) -> std::iter::Copied<std::slice::Iter<'_, i64>> {
        self.as_slice().iter().copied()
    }

    /// Returns a view of `start..stop` sharing this buffer.
    #[must_use]
    pub(crate) fn range(&self, start: usize, stop: usize) -> Self {
        debug_assert!(start <= stop && stop <= self.len);
        Self {
            kind: self.kind,
            data: self.data.clone(),
            offset: self.offset + start,
            len: stop - start,
        }
    }

    /// Gathers the values at `positions` into a new buffer of the same type.
    #[must_use]
    pub(crate) fn carry(&self, positions: &[usize]) -> Self {
        let slice = self.as_slice();
        let values: Vec<i64> = positions.iter().map(|&p| slice[p]).collect();
        Self {
            kind: self.kind,
            len: values.len(),
            data: values.into(),
            offset: 0,
        }
    }
}

impl From<Vec<i64>> for Index {
    fn from(values: Vec<i64>) -> Self {
        Self::from_native(IndexType::I64, values)
    }
}

impl From<Vec<i32>> for Index {
    fn from(values: Vec<i32>) -> Self {
        Self::from_native(IndexType::I32, values)
    }
}

impl From<Vec<u32>> for Index {
    fn from(values: Vec<u32>) -> Self {
        Self::from_native(IndexType::U32, values)
    }
}

impl From<Vec<i8>> for Index {
    fn from(values: Vec<i8>) -> Self {
        Self::from_native(IndexType::I8, values)
    }
}

impl From<Vec<u8>> for Index {
    fn from(values: Vec<u8>) -> Self {
        Self::from_native(IndexType::U8, values)
    }
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Index<{}>", self.kind)?;
        f.debug_list().entries(self.iter()).finish()
    }
}

impl PartialEq for Index {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.as_slice() == other.as_slice()
    }
}
