//! Minimized word-graph construction.
//!
//! [`DawgBuilder`] turns a sorted key/value stream into a [`Dawg`], the
//! intermediate graph the double-array layout consumes. Most callers go
//! through [`DoubleArray::build`](crate::DoubleArray::build) instead and
//! never touch this module directly.

mod builder;
mod node;

pub use builder::{Dawg, DawgBuilder};
