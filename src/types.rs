//! High-level types, the user-facing view of a `Form`.

use crate::datatypes::PrimitiveType;
use itertools::Itertools;
use std::fmt;

/// The type of one element of an array.
#[derive(Clone, Debug, PartialEq)]
pub enum Type {
    /// No element has been seen yet; matches any type.
    Unknown,
    Primitive(PrimitiveType),
    /// Variable-length lists.
    List(Box<Type>),
    /// Fixed-size lists.
    Regular(Box<Type>, usize),
    Option(Box<Type>),
    /// Named fields, or a tuple when `keys` is `None`.
    Record {
        keys: Option<Vec<String>>,
        contents: Vec<Type>,
    },
    Union(Vec<Type>),
}

impl Type {
    /// Wraps `inner` in an option unless it already is one.
    #[must_use]
    pub fn option(inner: Type) -> Self {
        match inner {
            Self::Option(_) => inner,
            _ => Self::Option(Box::new(inner)),
        }
    }

    /// Returns `true` if values of the two types are interchangeable.
    #[must_use]
    pub fn is_compatible(&self, other: &Type) -> bool {
        match (self, other) {
            (Self::Unknown, _) | (_, Self::Unknown) => true,
            (Self::Primitive(a), Self::Primitive(b)) => a == b,
            (Self::List(a), Self::List(b)) | (Self::Option(a), Self::Option(b)) => {
                a.is_compatible(b)
            }
            (Self::Regular(a, n), Self::Regular(b, m)) => n == m && a.is_compatible(b),
            (
                Self::Record {
                    keys: ka,
                    contents: ca,
                },
                Self::Record {
                    keys: kb,
                    contents: cb,
                },
            ) => ka == kb && all_compatible(ca, cb),
            (Self::Union(a), Self::Union(b)) => all_compatible(a, b),
            _ => false,
        }
    }
}

fn all_compatible(a: &[Type], b: &[Type]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.is_compatible(y))
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Primitive(p) => write!(f, "{}", p),
            Self::List(inner) => write!(f, "var * {}", inner),
            Self::Regular(inner, size) => write!(f, "{} * {}", size, inner),
            Self::Option(inner) => match inner.as_ref() {
                Self::Primitive(_) | Self::Unknown => write!(f, "?{}", inner),
                _ => write!(f, "option[{}]", inner),
            },
            Self::Record {
                keys: Some(keys),
                contents,
            } => write!(
                f,
                "{{{}}}",
                keys.iter()
                    .zip(contents)
                    .map(|(k, t)| format!("{}: {}", k, t))
                    .join(", ")
            ),
            Self::Record {
                keys: None,
                contents,
            } => write!(f, "({})", contents.iter().join(", ")),
            Self::Union(contents) => write!(f, "union[{}]", contents.iter().join(", ")),
        }
    }
}

/// The type of a whole array: its length and element type.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayType {
    length: usize,
    content: Type,
}

impl ArrayType {
    #[must_use]
    pub fn new(length: usize, content: Type) -> Self {
        Self { length, content }
    }

    #[must_use]
    pub fn length(&self) -> usize {
        self.length
    }

    #[must_use]
    pub fn content(&self) -> &Type {
        &self.content
    }
}

impl fmt::Display for ArrayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} * {}", self.length, self.content)
    }
}
