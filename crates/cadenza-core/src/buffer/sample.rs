//! Sample types a [`SampleBuffer`](super::SampleBuffer) can be viewed as.

use crate::format::SampleRepresentation;

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
    impl Sealed for i16 {}
    impl Sealed for i32 {}
}

/// A primitive sample type matching one [`SampleRepresentation`].
///
/// `i32` is the 8.24 fixed-point representation.
pub trait Sample: sealed::Sealed + Copy + Default + PartialEq + Send + Sync + 'static {
    const REPRESENTATION: SampleRepresentation;
}

impl Sample for f32 {
    const REPRESENTATION: SampleRepresentation = SampleRepresentation::Float32;
}

impl Sample for f64 {
    const REPRESENTATION: SampleRepresentation = SampleRepresentation::Float64;
}

impl Sample for i16 {
    const REPRESENTATION: SampleRepresentation = SampleRepresentation::Int16;
}

impl Sample for i32 {
    const REPRESENTATION: SampleRepresentation = SampleRepresentation::Fixed824;
}
