use thiserror::Error;

/// Errors raised while building, slicing, decoding or materializing arrays.
#[derive(Debug, Error)]
pub enum Error {
    #[error("index {index} is out of bounds for length {length}")]
    IndexOutOfBounds { index: i64, length: usize },
    #[error("boolean mask of length {mask} does not match array length {length}")]
    MaskLength { mask: usize, length: usize },
    #[error("slice step cannot be zero")]
    ZeroStep,
    #[error("no field {0:?} in record")]
    FieldNotFound(String),
    #[error("too many dimensions in slice")]
    TooManyDimensions,
    #[error("expected an array, found {0}")]
    NotAnArray(String),
    #[error("an integer selector drops a dimension and cannot be derived lazily")]
    NotShapePreserving,
    #[error("unsupported selection: {0}")]
    Unsupported(String),
    #[error("invalid layout: {0}")]
    InvalidLayout(String),
    #[error("generated array has length {actual}, but {expected} was declared")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("generated array has form {actual}, which does not match declared form {expected}")]
    FormMismatch { expected: String, actual: String },
    #[error("cannot decode form: {message} in {fragment}")]
    Decode { message: String, fragment: String },
    #[error("generator failed: {0}")]
    Generator(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wraps a failure raised inside a generator function.
    pub fn generator<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Generator(error.into())
    }

    pub(crate) fn decode(message: impl Into<String>, fragment: &serde_json::Value) -> Self {
        Self::Decode {
            message: message.into(),
            fragment: fragment.to_string(),
        }
    }

    /// Returns `true` for out-of-range positions and mismatched masks.
    #[must_use]
    pub fn is_index_error(&self) -> bool {
        matches!(
            self,
            Self::IndexOutOfBounds { .. } | Self::MaskLength { .. }
        )
    }

    #[must_use]
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
