//! The packed double-array representation and its layout pass.

mod builder;
mod unit;

pub use unit::{DoubleArrayUnit, UNIT_SIZE};

pub(crate) use builder::DoubleArrayBuilder;
