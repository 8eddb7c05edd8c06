/// # Segment Chain Module.
///
/// A document is an ordered chain of segments, each describing up to
/// [`MAX_SEGMENT_LINES`] consecutive lines and where their bytes live.
/// The chain always ends in a zero-line sentinel.
pub mod chain;
pub mod position;
pub mod segment;

/// Most lines a single segment may describe.
pub const MAX_SEGMENT_LINES: usize = 127;

/// Default byte budget after which loading closes a segment.
pub const DEFAULT_SEGMENT_BYTES: u64 = 4000;

/// Line separator. It is stored as part of every line's length.
pub const SEPARATOR: u8 = b'\n';
