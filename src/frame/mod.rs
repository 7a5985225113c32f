//! Frame layouts and frame state transfer
//!
//! At every bytecode index where an interpreter may suspend or resume an activation, the static
//! type of each local and stack slot is known from verification. A [`FrameDescriptor`] freezes
//! that layout, and uses it to copy an activation to and from a flat [`Snapshot`]. Descriptors are
//! produced by a [`FrameBuilder`], which follows the verifier through a method body and merges
//! the states flowing into join points.
//!
//! Resuming from a snapshot that came from somewhere else (for instance from a serialized
//! continuation) first goes through [`FrameDescriptor::validate_import`], so that a forged
//! snapshot cannot put an object of the wrong class in a typed slot.

mod activation;
mod builder;
mod descriptor;
mod errors;
mod merge;
mod slot;
mod snapshot;
mod validate;

pub use activation::*;
pub use builder::*;
pub use descriptor::*;
pub use errors::*;
pub use slot::*;
pub use snapshot::*;
pub use validate::*;
