/// Stable handle to a slot in a [`crate::segment_chain::chain::SegmentChain`].
///
/// Ids stay valid until the segment is spliced out; a freed id may later be
/// reused for a different segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SegmentId(pub(crate) usize);

/// A segment together with the absolute number of its first line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SegmentPosition {
    pub segment: SegmentId,
    pub first_line: usize,
}

/// Result of positioning the chain on a line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Located {
    /// The segment holds the line.
    Within(SegmentPosition),
    /// The line is past the last line; the position names the sentinel.
    BeyondEnd(SegmentPosition),
}

impl Located {
    #[inline]
    #[must_use]
    pub fn position(&self) -> SegmentPosition {
        match self {
            Located::Within(pos) | Located::BeyondEnd(pos) => *pos,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_beyond_end(&self) -> bool {
        matches!(self, Located::BeyondEnd(_))
    }
}

/// Result of [`crate::segment_chain::chain::SegmentChain::split`]. Both
/// variants carry the segment that now starts at the requested line (the
/// sentinel when the line is the end of the document).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitOutcome {
    /// A boundary was found or cut without adding lines.
    Clean(SegmentId),
    /// Blank lines were appended so the document reaches the line.
    Extended(SegmentId),
}

impl SplitOutcome {
    #[inline]
    #[must_use]
    pub fn segment(&self) -> SegmentId {
        match self {
            SplitOutcome::Clean(id) | SplitOutcome::Extended(id) => *id,
        }
    }
}
