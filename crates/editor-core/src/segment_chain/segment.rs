/// Where a segment's bytes live.
///
/// File-backed variants hold a counted handle, never a raw descriptor, so a
/// source cannot be closed while a segment still points into it.
#[derive(Clone, Debug)]
pub enum Source {
    /// An original file, read through its mapping.
    File(std::rc::Rc<io::mmap::MmapFile>),
    /// The shared append-only scratch log.
    Scratch(std::rc::Rc<io::scratch::ScratchFile>),
    /// Blank lines with no stored bytes; every line is a lone separator.
    Synthetic,
}

impl Source {
    #[inline]
    #[must_use]
    pub fn is_file_backed(&self) -> bool {
        !matches!(self, Source::Synthetic)
    }

    /// Whether both sources are the very same handle.
    #[must_use]
    pub fn same_as(&self, other: &Source) -> bool {
        match (self, other) {
            (Source::File(a), Source::File(b)) => std::rc::Rc::ptr_eq(a, b),
            (Source::Scratch(a), Source::Scratch(b)) => std::rc::Rc::ptr_eq(a, b),
            (Source::Synthetic, Source::Synthetic) => true,
            _ => false,
        }
    }

    /// Appends `len` bytes starting at `offset` to `out`.
    ///
    /// On failure `out` is left as it was.
    ///
    /// # Errors
    ///
    /// - `std::io::Error` if the range cannot be read from the source.
    pub fn read_into(&self, offset: u64, len: u64, out: &mut Vec<u8>) -> std::io::Result<()> {
        let len_usize = <u64 as TryInto<usize>>::try_into(len)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        match self {
            Source::File(file) => out.extend_from_slice(file.read_exact_at(offset, len)?),
            Source::Scratch(file) => {
                let start = out.len();

                out.resize(start + len_usize, 0);

                if let Err(e) = file.read_exact_at(offset, &mut out[start..]) {
                    out.truncate(start);

                    return Err(e);
                }
            }
            Source::Synthetic => {
                out.resize(out.len() + len_usize, crate::segment_chain::SEPARATOR);
            }
        }

        Ok(())
    }
}

/// Immutable-once-built descriptor of a run of lines from one source.
///
/// Line lengths include the separator and are kept encoded with
/// [`crate::codec`]; finding a line inside a segment is a decode walk over at
/// most [`crate::segment_chain::MAX_SEGMENT_LINES`] entries.
#[derive(Clone, Debug)]
pub struct Segment {
    source: Source,
    base_offset: u64,
    lengths: Vec<u8>,
    line_count: usize,
    total_bytes: u64,
}

/*

====================================
========= CREATION METHODS =========
====================================

*/

impl Segment {
    pub(crate) fn new(
        source: Source,
        base_offset: u64,
        line_lengths: impl IntoIterator<Item = u64>,
    ) -> Self {
        let mut lengths = Vec::new();
        let mut line_count = 0usize;
        let mut total_bytes = 0u64;

        for len in line_lengths {
            crate::codec::encode(len, &mut lengths);
            line_count += 1;
            total_bytes += len;
        }

        debug_assert!(line_count <= crate::segment_chain::MAX_SEGMENT_LINES);

        Self {
            source,
            base_offset,
            lengths,
            line_count,
            total_bytes,
        }
    }

    /// `count` blank lines, no bytes stored.
    pub(crate) fn blank(count: usize) -> Self {
        Self::new(Source::Synthetic, 0, std::iter::repeat_n(1, count))
    }

    pub(crate) fn sentinel() -> Self {
        Self::blank(0)
    }
}

/*

====================================
========= INLINE METHODS  ==========
====================================

*/

impl Segment {
    #[inline]
    #[must_use]
    pub fn source(&self) -> &Source {
        &self.source
    }

    #[inline]
    #[must_use]
    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    #[inline]
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_count
    }

    /// Sum of all line lengths, separators included.
    #[inline]
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    #[inline]
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        matches!(self.source, Source::Synthetic)
    }

    #[inline]
    #[must_use]
    pub fn line_lengths(&self) -> crate::codec::LineLengths<'_> {
        crate::codec::LineLengths::new(&self.lengths)
    }

    /// Encoded form of the line lengths.
    #[inline]
    #[must_use]
    pub fn encoded_lengths(&self) -> &[u8] {
        &self.lengths
    }

    /// Byte offset (relative to `base_offset`) and length of line `rel`.
    #[must_use]
    pub fn line_span(&self, rel: usize) -> Option<(u64, u64)> {
        let mut offset = 0u64;

        for (idx, len) in self.line_lengths().enumerate() {
            if idx == rel {
                return Some((offset, len));
            }

            offset += len;
        }

        None
    }
}

/*

=====================================
========= SPLIT / MERGE  ============
=====================================

*/

impl Segment {
    /// Cuts this segment so it keeps lines `..at` and returns lines `at..`
    /// as a new segment of the same source.
    ///
    /// `at` must be strictly inside the segment.
    pub(crate) fn split_off(&mut self, at: usize) -> Segment {
        debug_assert!(at > 0 && at < self.line_count);

        let mut walker = self.line_lengths();
        let consumed: u64 = walker.by_ref().take(at).sum();
        let cut = walker.cursor();
        let tail_lengths = self.lengths.split_off(cut);
        let tail_bytes = self.total_bytes - consumed;

        let tail = Segment {
            source: self.source.clone(),
            base_offset: self.base_offset + consumed,
            lengths: tail_lengths,
            line_count: self.line_count - at,
            total_bytes: tail_bytes,
        };

        self.line_count = at;
        self.total_bytes = consumed;

        tail
    }

    /// Whether `next` can be folded onto the end of this segment: both
    /// file-backed from the same handle, byte-contiguous, and small enough
    /// together.
    #[must_use]
    pub fn can_absorb(&self, next: &Segment) -> bool {
        self.source.is_file_backed()
            && self.source.same_as(&next.source)
            && self.line_count > 0
            && next.line_count > 0
            && self.line_count + next.line_count <= crate::segment_chain::MAX_SEGMENT_LINES
            && self.base_offset + self.total_bytes == next.base_offset
    }

    /// Whether this segment holds the byte at `offset` of `source`.
    #[must_use]
    pub fn covers(&self, source: &Source, offset: u64) -> bool {
        self.source.same_as(source)
            && !self.is_synthetic()
            && offset >= self.base_offset
            && offset < self.base_offset + self.total_bytes
    }

    pub(crate) fn absorb(&mut self, next: Segment) {
        debug_assert!(self.can_absorb(&next));

        self.lengths.extend_from_slice(&next.lengths);
        self.line_count += next.line_count;
        self.total_bytes += next.total_bytes;
    }
}
