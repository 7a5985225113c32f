//! Frame states of a method, from its stack map table
//!
//! The verifier records the expected frame at the start of every basic block reached by a jump,
//! as a compressed `StackMapTable` attribute. Replaying that table from the method's entry frame
//! yields a [`crate::frame::FrameBuilder`] per recorded bytecode offset. Those are the join
//! points into which other states get merged, and the places where descriptors are frozen.

mod errors;
mod listing;
mod stack_map_frame;
mod table;
mod verification;

pub use errors::*;
pub use listing::*;
pub use stack_map_frame::*;
pub use table::*;
pub use verification::*;
