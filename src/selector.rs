//! Selectors accepted by `getitem`-style slicing.

use crate::error::{Error, Result};
use std::fmt;

/// One component of a (possibly multi-dimensional) selection.
#[derive(Clone, Debug, PartialEq)]
pub enum Selector {
    /// A single position; negative values count from the end. Drops a dimension.
    At(i64),
    /// A Python-style `start:stop:step` range.
    Range(SliceRange),
    /// Positions to gather, in order, with repetition allowed.
    Take(Vec<i64>),
    /// Keeps the positions whose flag is `true`.
    Mask(Vec<bool>),
    /// Projects one field of a record.
    Field(FieldKey),
}

impl Selector {
    #[must_use]
    pub fn range(start: Option<i64>, stop: Option<i64>) -> Self {
        Self::Range(SliceRange::new(start, stop, None))
    }

    #[must_use]
    pub fn field(key: impl Into<FieldKey>) -> Self {
        Self::Field(key.into())
    }

    /// Returns `true` if the selector keeps the number of dimensions.
    #[must_use]
    pub fn is_shape_preserving(&self) -> bool {
        !matches!(self, Self::At(_))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(i) => write!(f, "{}", i),
            Self::Range(r) => write!(f, "{}", r),
            Self::Take(positions) => write!(f, "{:?}", positions),
            Self::Mask(mask) => write!(f, "{:?}", mask),
            Self::Field(key) => write!(f, "{}", key),
        }
    }
}

/// `start:stop:step` with Python semantics: bounds clamp, negatives wrap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SliceRange {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: Option<i64>,
}

impl SliceRange {
    #[must_use]
    pub fn new(start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Self {
        Self { start, stop, step }
    }

    /// Resolves the range against an array of length `len`.
    ///
    /// # Errors
    ///
    /// Returns an error if the step is zero.
    pub fn resolve(&self, len: usize) -> Result<ResolvedRange> {
        let step = self.step.unwrap_or(1);
        if step == 0 {
            return Err(Error::ZeroStep);
        }
        let len = i64::try_from(len).unwrap_or(i64::MAX);
        let clamp = |bound: i64, low: i64, high: i64| {
            let bound = if bound < 0 { bound + len } else { bound };
            bound.clamp(low, high)
        };
        let (start, stop) = if step > 0 {
            (
                self.start.map_or(0, |s| clamp(s, 0, len)),
                self.stop.map_or(len, |s| clamp(s, 0, len)),
            )
        } else {
            (
                self.start.map_or(len - 1, |s| clamp(s, -1, len - 1)),
                self.stop.map_or(-1, |s| clamp(s, -1, len - 1)),
            )
        };
        Ok(ResolvedRange { start, stop, step })
    }
}

impl fmt::Display for SliceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(start) = self.start {
            write!(f, "{}", start)?;
        }
        write!(f, ":")?;
        if let Some(stop) = self.stop {
            write!(f, "{}", stop)?;
        }
        if let Some(step) = self.step {
            write!(f, ":{}", step)?;
        }
        Ok(())
    }
}

/// A range whose bounds have been resolved against a length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedRange {
    start: i64,
    stop: i64,
    step: i64,
}

impl ResolvedRange {
    /// Returns `Some((start, stop))` when the range is contiguous.
    #[must_use]
    pub fn contiguous(&self) -> Option<(usize, usize)> {
        if self.step != 1 {
            return None;
        }
        let start = usize::try_from(self.start).unwrap_or(0);
        let stop = usize::try_from(self.stop).unwrap_or(0).max(start);
        Some((start, stop))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        let span = if self.step > 0 {
            self.stop - self.start
        } else {
            self.start - self.stop
        };
        if span <= 0 {
            0
        } else {
            let step = self.step.abs();
            usize::try_from((span + step - 1) / step).unwrap_or(0)
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns every selected position, in order.
    #[must_use]
    pub fn positions(&self) -> Vec<usize> {
        (0..self.len())
            .filter_map(|i| {
                let i = i64::try_from(i).ok()?;
                usize::try_from(self.start + i * self.step).ok()
            })
            .collect()
    }
}

/// Names a record field either by key or by position.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FieldKey {
    Name(String),
    Position(usize),
}

impl From<&str> for FieldKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for FieldKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<usize> for FieldKey {
    fn from(position: usize) -> Self {
        Self::Position(position)
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{}", name),
            Self::Position(i) => write!(f, "{}", i),
        }
    }
}

impl FieldKey {
    /// Finds the position of this key among `keys` (`None` for tuples).
    ///
    /// Tuple fields are named by their position, so `"1"` selects the second
    /// slot of a tuple.
    ///
    /// # Errors
    ///
    /// Returns an error if no field matches.
    pub fn resolve(&self, keys: Option<&[String]>, arity: usize) -> Result<usize> {
        let found = match (self, keys) {
            (Self::Position(i), _) => Some(*i).filter(|i| *i < arity),
            (Self::Name(name), Some(keys)) => keys.iter().position(|k| k == name),
            (Self::Name(name), None) => name.parse::<usize>().ok().filter(|i| *i < arity),
        };
        found.ok_or_else(|| Error::FieldNotFound(self.to_string()))
    }
}

/// Resolves a possibly negative position against `len`.
///
/// # Errors
///
/// Returns an error if the position is out of bounds.
pub(crate) fn wrap_index(index: i64, len: usize) -> Result<usize> {
    let signed_len = i64::try_from(len).unwrap_or(i64::MAX);
    let wrapped = if index < 0 { index + signed_len } else { index };
    if wrapped < 0 || wrapped >= signed_len {
        return Err(Error::IndexOutOfBounds { index, length: len });
    }
    usize::try_from(wrapped).map_err(|_| Error::IndexOutOfBounds { index, length: len })
}

/// Positions selected by a shape-preserving selector over `len` elements.
///
/// # Errors
///
/// Returns an error on out-of-range positions, mismatched masks, or a
/// selector that is not a range, list or mask.
pub(crate) fn positions(selector: &Selector, len: usize) -> Result<Vec<usize>> {
    match selector {
        Selector::Range(range) => Ok(range.resolve(len)?.positions()),
        Selector::Take(indices) => indices.iter().map(|&i| wrap_index(i, len)).collect(),
        Selector::Mask(mask) => {
            if mask.len() != len {
                return Err(Error::MaskLength {
                    mask: mask.len(),
                    length: len,
                });
            }
            Ok(mask
                .iter()
                .enumerate()
                .filter_map(|(i, keep)| if *keep { Some(i) } else { None })
                .collect())
        }
        Selector::At(_) => Err(Error::NotShapePreserving),
        Selector::Field(_) => Err(Error::Unsupported(format!(
            "field {} does not select positions",
            selector
        ))),
    }
}
