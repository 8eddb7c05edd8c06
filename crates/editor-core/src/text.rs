/// # The Core Philosophies of This API
///
/// - Line-Based: callers think in line numbers. The `TextBuffer` resolves
///   them through the segment chain and never materialises the whole file.
/// - Immutability for Reads: queries (`read_line`, `total_line_count`) take
///   `&self`; the chain's position cache is interior.
/// - Ownership of State: the `TextBuffer` owns the chain and the line cache so
///   they never drift out of sync. Bulk edits flush the cache first and then
///   invalidate it, since they shift line numbers under it.
#[derive(Debug)]
pub struct TextBuffer {
    chain: crate::segment_chain::chain::SegmentChain,
    line_cache: crate::line_cache::LineCache,
    scratch: crate::scratch::ScratchStore,

    /// Byte budget per segment when loading from a source.
    segment_bytes: u64,

    /// Tracks if the buffer has unsaved changes.
    is_modified: bool,

    /// Whether the buffer may be written back to its origin.
    is_writable: bool,
}

/*

==================================
===== CREATION & LOADING =========
==================================

*/

impl TextBuffer {
    /// Creates an empty buffer whose edits go to `scratch`.
    #[must_use]
    pub fn new(scratch: crate::scratch::ScratchStore) -> Self {
        Self {
            chain: crate::segment_chain::chain::SegmentChain::new(),
            line_cache: crate::line_cache::LineCache::new(),
            scratch,
            segment_bytes: crate::segment_chain::DEFAULT_SEGMENT_BYTES,
            is_modified: false,
            is_writable: true,
        }
    }

    /// Sets the byte budget used by [`TextBuffer::load_from_source`].
    #[must_use]
    pub fn with_segment_bytes(mut self, segment_bytes: u64) -> Self {
        self.segment_bytes = segment_bytes.max(1);
        self
    }

    /// Creates a buffer holding `lines`, stored in the scratch store.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if a line holds a separator.
    /// - `Io` if the scratch store cannot be written.
    pub fn from_lines<T: AsRef<[u8]>>(
        scratch: crate::scratch::ScratchStore,
        lines: &[T],
    ) -> crate::errors::ChainResult<Self> {
        let mut buffer = Self::new(scratch);
        let segments = buffer.scratch.append_lines(lines)?;

        buffer.chain.insert(segments, 0)?;

        Ok(buffer)
    }

    /// Maps `path` and loads its lines.
    ///
    /// # Errors
    ///
    /// - `Io` if the file cannot be opened or mapped.
    pub fn open<P: AsRef<std::path::Path>>(
        scratch: crate::scratch::ScratchStore,
        path: P,
    ) -> crate::errors::ChainResult<Self> {
        let file = std::rc::Rc::new(io::mmap::MmapFile::open(path)?);
        let mut buffer = Self::new(scratch);

        buffer.load_from_source(file)?;

        Ok(buffer)
    }

    /// Discards the current content (including an unflushed line) and loads
    /// `file` instead.
    ///
    /// # Errors
    ///
    /// - `Io` if an unterminated final line cannot be stored.
    pub fn load_from_source(
        &mut self,
        file: std::rc::Rc<io::mmap::MmapFile>,
    ) -> crate::errors::ChainResult<()> {
        self.line_cache.invalidate();
        self.chain
            .load_from_source(file, &self.scratch, self.segment_bytes)?;
        self.is_modified = false;

        Ok(())
    }
}

/*

==========================
===== INLINE METHODS =====
==========================

*/

impl TextBuffer {
    /// Number of lines, counting a held line written past the end.
    #[inline]
    #[must_use]
    pub fn total_line_count(&self) -> usize {
        let chain_lines = self.chain.line_count();

        match self.line_cache.line() {
            Some(line) if self.line_cache.is_dirty() => chain_lines.max(line + 1),
            _ => chain_lines,
        }
    }

    #[inline]
    #[must_use]
    pub fn has_content(&self) -> bool {
        self.total_line_count() > 0
    }

    #[inline]
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.is_modified
    }

    /// Clears the modified flag after the content has been persisted.
    #[inline]
    pub fn mark_saved(&mut self) {
        self.is_modified = false;
    }

    #[inline]
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.is_writable
    }

    #[inline]
    pub fn set_writable(&mut self, writable: bool) {
        self.is_writable = writable;
    }

    #[inline]
    #[must_use]
    pub fn segment_bytes(&self) -> u64 {
        self.segment_bytes
    }

    #[inline]
    #[must_use]
    pub fn chain(&self) -> &crate::segment_chain::chain::SegmentChain {
        &self.chain
    }

    #[inline]
    #[must_use]
    pub fn scratch(&self) -> &crate::scratch::ScratchStore {
        &self.scratch
    }

    /// Blank-line segments for [`TextBuffer::insert_segments`].
    #[inline]
    #[must_use]
    pub fn make_blank_lines(count: usize) -> Vec<crate::segment_chain::segment::Segment> {
        crate::segment_chain::chain::SegmentChain::make_blank_lines(count)
    }
}

/*

===========================
========= GETTERS =========
===========================

*/

impl TextBuffer {
    /// Reads a line without its separator, seeing unflushed edits.
    ///
    /// # Errors
    ///
    /// - `OutOfRange` if the line is past the end.
    /// - `Io` if its source cannot be read.
    pub fn read_line(&self, line: usize) -> crate::errors::ChainResult<Vec<u8>> {
        if self.line_cache.line() == Some(line) && self.line_cache.is_dirty() {
            return Ok(self.line_cache.content().to_vec());
        }

        match self.chain.read_line(line) {
            Err(e) if e.is_out_of_range() && line < self.total_line_count() => Ok(Vec::new()),
            other => other,
        }
    }

    /// Lossy UTF-8 view of [`TextBuffer::read_line`].
    ///
    /// # Errors
    ///
    /// Same as [`TextBuffer::read_line`].
    pub fn read_line_string(&self, line: usize) -> crate::errors::ChainResult<String> {
        Ok(String::from_utf8_lossy(&self.read_line(line)?).into_owned())
    }
}

/*

========================================
========= LINE EDITING (CACHED) ========
========================================

*/

impl TextBuffer {
    /// Loads `line` into the line cache and returns it.
    ///
    /// # Errors
    ///
    /// See [`crate::line_cache::LineCache::load`].
    pub fn line(&mut self, line: usize) -> crate::errors::ChainResult<&[u8]> {
        self.line_cache.load(&mut self.chain, &self.scratch, line)
    }

    /// Replaces the content of `line`, growing the document with blank lines
    /// if it is past the end. The change reaches the chain on the next flush.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `content` holds a separator.
    /// - Whatever loading `line` returns.
    pub fn set_line(
        &mut self,
        line: usize,
        content: impl Into<Vec<u8>>,
    ) -> crate::errors::ChainResult<()> {
        self.line_cache.load(&mut self.chain, &self.scratch, line)?;
        self.line_cache.set(content)?;
        self.is_modified = true;

        Ok(())
    }

    /// Writes the cached line back into the chain.
    ///
    /// # Errors
    ///
    /// See [`crate::line_cache::LineCache::flush`].
    pub fn flush(&mut self) -> crate::errors::ChainResult<bool> {
        self.line_cache.flush(&mut self.chain, &self.scratch)
    }

    fn settle_cache(&mut self) -> crate::errors::ChainResult<()> {
        self.flush()?;
        self.line_cache.invalidate();

        Ok(())
    }
}

/*

========================================
========= INSERTION & DELETION =========
========================================

*/

impl TextBuffer {
    /// Splices pre-built segments so they start at line `at`.
    ///
    /// # Errors
    ///
    /// - Whatever flushing the line cache returns.
    pub fn insert_segments(
        &mut self,
        segments: Vec<crate::segment_chain::segment::Segment>,
        at: usize,
    ) -> crate::errors::ChainResult<()> {
        if segments.iter().all(|segment| segment.line_count() == 0) {
            return Ok(());
        }

        self.settle_cache()?;
        self.chain.insert(segments, at)?;
        self.is_modified = true;

        Ok(())
    }

    /// Stores `lines` in the scratch store and inserts them at `at`.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if a line holds a separator.
    /// - `Io` if the scratch store cannot be written.
    pub fn insert_lines<T: AsRef<[u8]>>(
        &mut self,
        at: usize,
        lines: &[T],
    ) -> crate::errors::ChainResult<()> {
        let segments = self.scratch.append_lines(lines)?;

        self.insert_segments(segments, at)
    }

    /// Inserts `count` blank lines at `at`.
    ///
    /// # Errors
    ///
    /// - Whatever flushing the line cache returns.
    pub fn insert_blank_lines(&mut self, at: usize, count: usize) -> crate::errors::ChainResult<()> {
        self.insert_segments(Self::make_blank_lines(count), at)
    }

    /// Deletes lines `from..=to`, returning how many were removed.
    ///
    /// # Errors
    ///
    /// - Whatever flushing the line cache returns.
    pub fn delete_lines(&mut self, from: usize, to: usize) -> crate::errors::ChainResult<usize> {
        self.settle_cache()?;

        let removed = self.chain.delete(from, to)?;

        if removed > 0 {
            self.is_modified = true;
        }

        Ok(removed)
    }
}

/*

========================
========= SAVE =========
========================

*/

impl TextBuffer {
    /// Flushes the line cache and streams the document to `dest`.
    ///
    /// # Errors
    ///
    /// - Whatever flushing the line cache returns.
    /// - `Io` if writing to `dest` fails.
    pub fn write_all<W: std::io::Write>(
        &mut self,
        dest: &mut W,
    ) -> crate::errors::ChainResult<crate::segment_chain::chain::WriteReport> {
        self.flush()?;
        self.chain.write_all(dest)
    }
}

impl std::fmt::Display for TextBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let total = self.total_line_count();

        for line in 0..total {
            let text = self.read_line_string(line).map_err(|_| std::fmt::Error)?;

            f.write_str(&text)?;

            if line + 1 < total || self.chain.final_separator() {
                f.write_str("\n")?;
            }
        }

        Ok(())
    }
}
