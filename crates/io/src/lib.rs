//! Byte sources backing document segments: memory-mapped originals and the
//! append-only scratch log.
pub mod mmap;
pub mod scratch;
