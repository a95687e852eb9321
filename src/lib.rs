pub mod content;
mod datatypes;
mod error;
pub mod form;
mod index;
pub mod lazy;
mod selector;
mod types;

pub use content::{Content, Value};
pub use datatypes::{IndexType, NativeType, PrimitiveType, Scalar};
pub use error::{Error, Result};
pub use form::{Form, Parameters};
pub use index::Index;
pub use lazy::{ArrayCache, ArrayGenerator, BoundedCache, MemoryCache, VirtualArray};
pub use selector::{FieldKey, ResolvedRange, SliceRange, Selector};
pub use types::{ArrayType, Type};
