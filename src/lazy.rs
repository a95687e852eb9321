//! Deferred array production.
//!
//! An `ArrayGenerator` knows how to build a `Content` and, optionally, what
//! its length and form will be. A `VirtualArray` wraps a generator as a node
//! of the layout, answering length, form and shape-preserving slices from
//! that declared contract, and materializing through an optional
//! `ArrayCache` when values are needed.

mod array;
mod cache;
mod generator;

pub use array::{VirtualArray, VirtualArrayBuilder};
pub use cache::{ArrayCache, BoundedCache, MemoryCache};
pub use generator::ArrayGenerator;
