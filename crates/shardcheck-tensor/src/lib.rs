//! Host tensors, shard placement and content digests.
//!
//! - [`ShardKey`] names a shard's logical array and its placement.
//! - [`ShardAssembler`] rebuilds full arrays from shard groups.
//! - [`ContentHasher`] digests an array's canonical bytes.
//!
//! All tensors are held in one canonical layout (contiguous, row-major,
//! little-endian); anything else goes through [`Materialize`] first.

pub use self::assemble::{
    AssemblyOptions, Coverage, GapPolicy, KeyFailure, OverlapPolicy, ReconstructedArray,
    Reconstruction, ShardAssembler,
};
pub use self::dtype::{DType, Element};
pub use self::error::{Error, Result, ShapeError};
pub use self::hash::ContentHasher;
pub use self::key::ShardKey;
pub use self::shape::Shape;
pub use self::tensor::Tensor;
pub use self::view::{Materialize, StridedView};

mod assemble;
mod dtype;
mod error;
mod hash;
mod key;
mod shape;
mod tensor;
mod view;
