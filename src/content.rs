//! The recursive array layout.
//!
//! A `Content` is a tree of nodes. Leaves hold values (`NumpyArray`,
//! `EmptyArray`); inner nodes describe lists, records, unions, missing values
//! and indirection over their children. `VirtualArray` defers producing its
//! subtree until values are needed.

mod empty;
mod indexed;
mod list;
mod masked;
mod numpy;
mod record;
mod regular;
mod union;
mod value;

pub use empty::EmptyArray;
pub use indexed::{IndexedArray, IndexedOptionArray};
pub use list::{ListArray, ListOffsetArray};
pub use masked::{BitMaskedArray, ByteMaskedArray, UnmaskedArray};
pub use numpy::NumpyArray;
pub use record::{Record, RecordArray};
pub use regular::RegularArray;
pub use union::UnionArray;
pub use value::{ContentIter, Value};

use crate::error::{Error, Result};
use crate::form::{Form, Parameters};
use crate::lazy::VirtualArray;
use crate::selector::{self, FieldKey, Selector};
use crate::types::ArrayType;

/// A node of the array layout.
#[derive(Clone, Debug)]
pub enum Content {
    Empty(EmptyArray),
    Numpy(NumpyArray),
    Regular(RegularArray),
    ListOffset(ListOffsetArray),
    List(ListArray),
    Indexed(IndexedArray),
    IndexedOption(IndexedOptionArray),
    ByteMasked(ByteMaskedArray),
    BitMasked(BitMaskedArray),
    Unmasked(UnmaskedArray),
    Record(RecordArray),
    Union(UnionArray),
    Virtual(VirtualArray),
}

/// Matches every concrete variant with one body and `Virtual` with another.
macro_rules! dispatch {
    ($content:expr, $array:ident => $concrete:expr, $virtual:ident => $lazy:expr) => {
        match $content {
            Content::Empty($array) => $concrete,
            Content::Numpy($array) => $concrete,
            Content::Regular($array) => $concrete,
            Content::ListOffset($array) => $concrete,
            Content::List($array) => $concrete,
            Content::Indexed($array) => $concrete,
            Content::IndexedOption($array) => $concrete,
            Content::ByteMasked($array) => $concrete,
            Content::BitMasked($array) => $concrete,
            Content::Unmasked($array) => $concrete,
            Content::Record($array) => $concrete,
            Content::Union($array) => $concrete,
            Content::Virtual($virtual) => $lazy,
        }
    };
}

macro_rules! content_from {
    ($($variant:ident($array:ident)),* $(,)?) => {
        $(
            impl From<$array> for Content {
                fn from(array: $array) -> Self {
                    Self::$variant(array)
                }
            }
        )*
    };
}

content_from!(
    Empty(EmptyArray),
    Numpy(NumpyArray),
    Regular(RegularArray),
    ListOffset(ListOffsetArray),
    List(ListArray),
    Indexed(IndexedArray),
    IndexedOption(IndexedOptionArray),
    ByteMasked(ByteMaskedArray),
    BitMasked(BitMaskedArray),
    Unmasked(UnmaskedArray),
    Record(RecordArray),
    Union(UnionArray),
    Virtual(VirtualArray),
);

/// Adds `parameters` and `with_parameters` to array nodes.
macro_rules! impl_parameters {
    ($($array:ident),* $(,)?) => {
        $(
            impl $array {
                #[must_use]
                pub fn parameters(&self) -> &Parameters {
                    &self.parameters
                }

                #[must_use]
                pub fn with_parameters(mut self, parameters: Parameters) -> Self {
                    self.parameters = parameters;
                    self
                }
            }
        )*
    };
}

impl_parameters!(
    EmptyArray,
    NumpyArray,
    RegularArray,
    ListOffsetArray,
    ListArray,
    IndexedArray,
    IndexedOptionArray,
    ByteMaskedArray,
    BitMaskedArray,
    UnmaskedArray,
    RecordArray,
    UnionArray,
);

impl Content {
    /// Returns the number of elements, materializing a virtual node whose
    /// length is not known yet.
    ///
    /// # Errors
    ///
    /// Returns an error if materialization fails.
    pub fn length(&self) -> Result<usize> {
        dispatch!(self, array => Ok(array.len()), virtual_array => virtual_array.length())
    }

    /// Returns the length if it is known without materializing anything.
    #[must_use]
    pub fn length_hint(&self) -> Option<usize> {
        dispatch!(self, array => Some(array.len()), virtual_array => virtual_array.known_length())
    }

    /// Returns the form of this node. Never materializes.
    #[must_use]
    pub fn form(&self) -> Form {
        dispatch!(self, array => array.form(), virtual_array => virtual_array.form())
    }

    #[must_use]
    pub fn parameters(&self) -> &Parameters {
        dispatch!(self, array => array.parameters(), virtual_array => virtual_array.parameters())
    }

    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&serde_json::Value> {
        self.parameters().get(name)
    }

    #[must_use]
    pub fn is_virtual(&self) -> bool {
        matches!(self, Self::Virtual(_))
    }

    #[must_use]
    pub fn as_virtual(&self) -> Option<&VirtualArray> {
        match self {
            Self::Virtual(array) => Some(array),
            _ => None,
        }
    }

    /// Returns the length and element type of this array.
    ///
    /// # Errors
    ///
    /// Returns an error if a virtual node without a declared contract fails
    /// to materialize.
    pub fn array_type(&self) -> Result<ArrayType> {
        match self {
            Self::Virtual(array) => array.array_type(),
            _ => Ok(ArrayType::new(self.length()?, self.form().to_type())),
        }
    }

    /// Returns the element at `at`; negative positions count from the end.
    ///
    /// # Errors
    ///
    /// Returns an error if `at` is out of bounds.
    pub fn getitem_at(&self, at: i64) -> Result<Value> {
        match self {
            Self::Virtual(array) => array.getitem_at(at),
            _ => {
                let at = selector::wrap_index(at, self.length()?)?;
                self.getitem_at_nowrap(at)
            }
        }
    }

    pub(crate) fn getitem_at_nowrap(&self, at: usize) -> Result<Value> {
        dispatch!(
            self,
            array => array.getitem_at_nowrap(at),
            virtual_array => virtual_array.materialize()?.getitem_at_nowrap(at)
        )
    }

    /// Applies one shape-preserving selector to the outermost dimension.
    ///
    /// A virtual node returns a new virtual node without materializing.
    /// Integer selectors drop a dimension and are rejected with
    /// `NotShapePreserving`; use `getitem_at` or `getitem` for them.
    ///
    /// # Errors
    ///
    /// Returns an error for an integer selector, an out-of-range position, a
    /// mask of the wrong length, or a missing field.
    pub fn slice(&self, selector: &Selector) -> Result<Content> {
        match (self, selector) {
            (Self::Virtual(array), _) => Ok(Self::Virtual(array.slice(selector)?)),
            (_, Selector::At(_)) => Err(Error::NotShapePreserving),
            (_, Selector::Field(key)) => self.getitem_field(key),
            (_, Selector::Range(range)) => {
                let resolved = range.resolve(self.length()?)?;
                match resolved.contiguous() {
                    Some((start, stop)) => self.range_nowrap(start, stop),
                    None => self.carry(&resolved.positions()),
                }
            }
            _ => self.carry(&selector::positions(selector, self.length()?)?),
        }
    }

    /// Applies a multi-dimensional selection, left to right.
    ///
    /// Field selectors project without consuming a dimension. The first
    /// selector acts on the outer dimension; the rest act on the dimensions
    /// below it, element by element.
    ///
    /// # Errors
    ///
    /// Returns an error if any component is invalid for the dimension it
    /// applies to.
    pub fn getitem(&self, selectors: &[Selector]) -> Result<Value> {
        let (head, tail) = match selectors.split_first() {
            Some(split) => split,
            None => return Ok(Value::Array(self.clone())),
        };
        match head {
            Selector::Field(key) => self.getitem_field(key)?.getitem(tail),
            Selector::At(at) => self.getitem_at(*at)?.getitem(tail),
            _ => {
                let sliced = self.slice(head)?;
                if tail.is_empty() {
                    Ok(Value::Array(sliced))
                } else {
                    Ok(Value::Array(sliced.getitem_next(tail)?))
                }
            }
        }
    }

    /// Applies `selectors` to the elements of this array, starting one
    /// dimension below the outermost.
    pub(crate) fn getitem_next(&self, selectors: &[Selector]) -> Result<Content> {
        let (head, tail) = match selectors.split_first() {
            Some(split) => split,
            None => return Ok(self.clone()),
        };
        if let Selector::Field(key) = head {
            return self.getitem_field(key)?.getitem_next(tail);
        }
        dispatch!(
            self,
            array => array.getitem_next(head, tail),
            virtual_array => virtual_array.materialize()?.getitem_next(selectors)
        )
    }

    /// Returns elements `start..stop`, which must be in bounds.
    pub(crate) fn range_nowrap(&self, start: usize, stop: usize) -> Result<Content> {
        dispatch!(
            self,
            array => array.range_nowrap(start, stop),
            virtual_array => Ok(Self::Virtual(virtual_array.range_nowrap(start, stop)))
        )
    }

    /// Gathers the elements at `positions`, which must be in bounds.
    pub(crate) fn carry(&self, positions: &[usize]) -> Result<Content> {
        dispatch!(
            self,
            array => array.carry(positions),
            virtual_array => Ok(Self::Virtual(virtual_array.carry(positions)))
        )
    }

    /// Projects one field of the records below this node.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no record with that field.
    pub fn getitem_field(&self, key: &FieldKey) -> Result<Content> {
        dispatch!(
            self,
            array => array.getitem_field(key),
            virtual_array => Ok(Self::Virtual(virtual_array.getitem_field(key)?))
        )
    }

    /// Iterates over the elements, materializing a virtual node once.
    ///
    /// # Errors
    ///
    /// Returns an error if materialization fails.
    pub fn iter(&self) -> Result<ContentIter> {
        let content = match self {
            Self::Virtual(array) => array.materialize()?,
            _ => self.clone(),
        };
        ContentIter::new(content)
    }

    /// Converts the whole array into JSON, materializing virtual nodes.
    ///
    /// # Errors
    ///
    /// Returns an error if materialization fails.
    pub fn to_list(&self) -> Result<serde_json::Value> {
        if self.parameter("__array__").and_then(serde_json::Value::as_str) == Some("string") {
            return self
                .iter()?
                .map(|item| match item? {
                    Value::Array(chars) => Ok(serde_json::Value::String(chars.to_text()?)),
                    other => other.to_json(),
                })
                .collect::<Result<Vec<_>>>()
                .map(serde_json::Value::Array);
        }
        self.iter()?
            .map(|item| item?.to_json())
            .collect::<Result<Vec<_>>>()
            .map(serde_json::Value::Array)
    }

    /// Decodes a list of `uint8` values as UTF-8 text.
    fn to_text(&self) -> Result<String> {
        let bytes = self
            .iter()?
            .map(|item| match item? {
                Value::Scalar(scalar) => scalar
                    .as_i64()
                    .and_then(|byte| u8::try_from(byte).ok())
                    .ok_or_else(|| Error::InvalidLayout(format!("{} is not a byte", scalar))),
                other => Err(Error::InvalidLayout(format!(
                    "expected a byte, found {}",
                    other.kind()
                ))),
            })
            .collect::<Result<Vec<u8>>>()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Checks that a child of length `available` can back `required` elements.
fn check_content_length(
    node: &str,
    content: &Content,
    required: usize,
) -> Result<()> {
    match content.length_hint() {
        Some(available) if available < required => Err(Error::InvalidLayout(format!(
            "{} needs {} content elements, but its content has {}",
            node, required, available
        ))),
        _ => Ok(()),
    }
}

/// Converts a stored index value into a position.
fn to_position(value: i64, node: &str) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| Error::InvalidLayout(format!("negative position {} in {}", value, node)))
}
