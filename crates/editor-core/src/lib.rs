//! Line-oriented document model backed by memory-mapped files.
//!
//! A document is a [`segment_chain::chain::SegmentChain`]: an ordered run of
//! segments, each naming a byte range in a mapped file or in the shared
//! [`scratch::ScratchStore`] plus the lengths of the lines inside it. Edits
//! only ever append to the scratch store and relink segments, so opening a
//! large file costs one pass over its separators and nothing is copied.

pub mod codec;
pub mod errors;
pub mod line_cache;
pub mod scratch;
pub mod segment_chain;
pub mod text;
