use super::{Content, RegularArray, Value};
use crate::datatypes::{NativeType, PrimitiveType, Scalar};
use crate::error::{Error, Result};
use crate::form::{Form, NumpyForm, Parameters};
use crate::selector::{FieldKey, Selector};
use std::fmt;
use std::sync::Arc;

macro_rules! numpy_data {
    ($($variant:ident($native:ty)),* $(,)?) => {
        /// Typed element storage shared between slices of the same array.
        #[derive(Clone)]
        enum Data {
            $($variant(Arc<[$native]>),)*
        }

        impl Data {
            fn primitive(&self) -> PrimitiveType {
                match self {
                    $(Self::$variant(_) => PrimitiveType::$variant,)*
                }
            }

            fn scalar(&self, i: usize) -> Scalar {
                match self {
                    $(Self::$variant(values) => values[i].into_scalar(),)*
                }
            }

            fn gather(&self, positions: impl Iterator<Item = usize>) -> Self {
                match self {
                    $(Self::$variant(values) => Self::$variant(positions.map(|p| values[p]).collect()),)*
                }
            }
        }

        $(
            impl From<Vec<$native>> for NumpyArray {
                fn from(values: Vec<$native>) -> Self {
                    let len = values.len();
                    Self::from_data(Data::$variant(values.into()), len)
                }
            }
        )*
    };
}

numpy_data!(
    Bool(bool),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
);

/// A contiguous array of fixed-width values, optionally with fixed-size
/// inner dimensions.
#[derive(Clone)]
pub struct NumpyArray {
    data: Data,
    offset: usize,
    len: usize,
    inner_shape: Vec<usize>,
    pub(super) parameters: Parameters,
}

impl NumpyArray {
    fn from_data(data: Data, len: usize) -> Self {
        Self {
            data,
            offset: 0,
            len,
            inner_shape: Vec::new(),
            parameters: Parameters::new(),
        }
    }

    /// Reshapes the values so that each element is a block of
    /// `inner_shape` values.
    ///
    /// # Errors
    ///
    /// Returns an error if the number of values is not a multiple of the
    /// block size.
    pub fn with_inner_shape(mut self, inner_shape: Vec<usize>) -> Result<Self> {
        let flat = self.len * self.stride();
        let stride: usize = inner_shape.iter().product();
        if stride == 0 || flat % stride != 0 {
            return Err(Error::InvalidLayout(format!(
                "{} values cannot be shaped into blocks of {:?}",
                flat, inner_shape
            )));
        }
        self.len = flat / stride;
        self.inner_shape = inner_shape;
        Ok(self)
    }

    /// Number of values in one element.
    fn stride(&self) -> usize {
        self.inner_shape.iter().product()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn primitive(&self) -> PrimitiveType {
        self.data.primitive()
    }

    #[must_use]
    pub fn inner_shape(&self) -> &[usize] {
        &self.inner_shape
    }

    /// Returns the `i`-th value of a one-dimensional array.
    #[must_use]
    pub fn scalar(&self, i: usize) -> Option<Scalar> {
        if self.inner_shape.is_empty() && i < self.len {
            Some(self.data.scalar(self.offset + i))
        } else {
            None
        }
    }

    #[must_use]
    pub fn form(&self) -> Form {
        Form::from(NumpyForm::new(self.primitive()).with_inner_shape(self.inner_shape.clone()))
            .with_parameters(self.parameters.clone())
    }

    pub(super) fn getitem_at_nowrap(&self, at: usize) -> Result<Value> {
        match self.inner_shape.split_first() {
            None => Ok(Value::Scalar(self.data.scalar(self.offset + at))),
            Some((_, rest)) => {
                let stride = self.stride();
                Ok(Value::Array(Content::Numpy(Self {
                    data: self.data.clone(),
                    offset: self.offset + at * stride,
                    len: self.inner_shape[0],
                    inner_shape: rest.to_vec(),
                    parameters: Parameters::new(),
                })))
            }
        }
    }

    pub(super) fn range_nowrap(&self, start: usize, stop: usize) -> Result<Content> {
        Ok(Content::Numpy(Self {
            data: self.data.clone(),
            offset: self.offset + start * self.stride(),
            len: stop - start,
            inner_shape: self.inner_shape.clone(),
            parameters: self.parameters.clone(),
        }))
    }

    pub(super) fn carry(&self, positions: &[usize]) -> Result<Content> {
        let stride = self.stride();
        let offset = self.offset;
        let data = self
            .data
            .gather(positions.iter().flat_map(|p| (0..stride).map(move |k| offset + p * stride + k)));
        Ok(Content::Numpy(Self {
            data,
            offset: 0,
            len: positions.len(),
            inner_shape: self.inner_shape.clone(),
            parameters: self.parameters.clone(),
        }))
    }

    pub(super) fn getitem_field(&self, key: &FieldKey) -> Result<Content> {
        Err(Error::FieldNotFound(key.to_string()))
    }

    pub(super) fn getitem_next(&self, head: &Selector, tail: &[Selector]) -> Result<Content> {
        self.to_regular()?.getitem_next(head, tail)
    }

    /// Views the outermost inner dimension as a `RegularArray`.
    fn to_regular(&self) -> Result<RegularArray> {
        let (size, rest) = self
            .inner_shape
            .split_first()
            .ok_or(Error::TooManyDimensions)?;
        let content = Self {
            data: self.data.clone(),
            offset: self.offset,
            len: self.len * size,
            inner_shape: rest.to_vec(),
            parameters: Parameters::new(),
        };
        RegularArray::with_length(content.into(), *size, self.len)
    }
}

impl fmt::Debug for NumpyArray {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "NumpyArray<{}>", self.primitive())?;
        if !self.inner_shape.is_empty() {
            write!(f, "{:?}", self.inner_shape)?;
        }
        let stride = self.stride();
        f.debug_list()
            .entries((0..self.len * stride).map(|i| self.data.scalar(self.offset + i)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars() {
        let array = NumpyArray::from(vec![1_i32, 2, 3]);
        assert_eq!(array.primitive(), PrimitiveType::Int32);
        assert_eq!(array.scalar(1), Some(Scalar::Int(2)));
        assert_eq!(array.scalar(3), None);
        assert_eq!(format!("{:?}", array), "NumpyArray<int32>[Int(1), Int(2), Int(3)]");
    }

    #[test]
    fn ranges_share_values() {
        let array = NumpyArray::from(vec![0.0, 1.1, 2.2, 3.3]);
        let sliced = array.range_nowrap(1, 3).unwrap();
        assert_eq!(sliced.to_list().unwrap(), json!([1.1, 2.2]));
        let carried = sliced.carry(&[1, 0, 1]).unwrap();
        assert_eq!(carried.to_list().unwrap(), json!([2.2, 1.1, 2.2]));
    }

    #[test]
    fn inner_shape() {
        let array = NumpyArray::from((0..12_i64).collect::<Vec<_>>())
            .with_inner_shape(vec![2, 3])
            .unwrap();
        assert_eq!(array.len(), 2);
        let content = Content::from(array.clone());
        assert_eq!(content.array_type().unwrap().to_string(), "2 * 2 * 3 * int64");
        assert_eq!(
            content.getitem_at(1).unwrap().to_json().unwrap(),
            json!([[6, 7, 8], [9, 10, 11]])
        );
        assert_eq!(
            content.carry(&[1]).unwrap().to_list().unwrap(),
            json!([[[6, 7, 8], [9, 10, 11]]])
        );
        let column = content
            .getitem(&[Selector::range(None, None), Selector::At(1), Selector::At(0)])
            .unwrap();
        assert_eq!(column.to_json().unwrap(), json!([3, 9]));
        assert!(NumpyArray::from(vec![1_i32, 2, 3]).with_inner_shape(vec![2]).is_err());
    }

    #[test]
    fn flat_array_has_one_dimension() {
        let content = Content::from(NumpyArray::from(vec![1.0, 2.0]));
        assert!(matches!(
            content.getitem(&[Selector::range(None, None), Selector::At(0)]),
            Err(Error::TooManyDimensions)
        ));
        assert!(content.getitem_field(&"x".into()).is_err());
    }
}
