use crate::segment_chain::position::{Located, SegmentId, SegmentPosition, SplitOutcome};
use crate::segment_chain::segment::{Segment, Source};

#[derive(Debug)]
struct Slot {
    segment: Segment,
    prev: Option<SegmentId>,
    next: Option<SegmentId>,
}

/// Ordered chain of segments describing one document.
///
/// Segments live in an arena of slots linked by [`SegmentId`], so splicing is
/// O(1) and ids handed out to callers stay stable across unrelated edits.
/// The last slot in chain order is always the zero-line sentinel.
#[derive(Debug)]
pub struct SegmentChain {
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    head: SegmentId,
    sentinel: SegmentId,
    line_count: usize,
    /// Whether the document's final line is terminated by a separator.
    final_separator: bool,
    /// Scratch copy of a source line that had no separator, by its source
    /// and byte offset. Removing that line restores `final_separator`.
    unterminated: Option<(Source, u64)>,
    /// Advisory: last resolved position. Every mutation updates or clears it.
    cache: std::cell::Cell<Option<SegmentPosition>>,
}

/// Outcome of [`SegmentChain::write_all`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub bytes_written: u64,
    pub segments_written: usize,
    /// Segments whose source could not be read; their bytes are missing.
    pub segments_skipped: usize,
}

/// Fails fast on a broken structural invariant.
///
/// Recovery (such as saving what is still readable elsewhere) belongs to the
/// embedding application, which can install a panic hook; the chain itself
/// must not keep running on a corrupted structure.
#[cold]
#[track_caller]
fn corrupt(what: &str) -> ! {
    panic!("segment chain corrupted: {what}")
}

/*

====================================
========= CREATION METHOD ==========
====================================

*/

impl Default for SegmentChain {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentChain {
    /// An empty document: just the sentinel.
    #[must_use]
    pub fn new() -> Self {
        let sentinel = SegmentId(0);

        Self {
            slots: vec![Some(Slot {
                segment: Segment::sentinel(),
                prev: None,
                next: None,
            })],
            free: Vec::new(),
            head: sentinel,
            sentinel,
            line_count: 0,
            final_separator: true,
            unterminated: None,
            cache: std::cell::Cell::new(None),
        }
    }

    /// Blank-line segments covering `count` lines.
    #[must_use]
    pub fn make_blank_lines(count: usize) -> Vec<Segment> {
        let mut segments =
            Vec::with_capacity(count.div_ceil(crate::segment_chain::MAX_SEGMENT_LINES));
        let mut left = count;

        while left > 0 {
            let chunk = left.min(crate::segment_chain::MAX_SEGMENT_LINES);

            segments.push(Segment::blank(chunk));
            left -= chunk;
        }

        segments
    }
}

/*

====================================
========= INLINE METHODS  ==========
====================================

*/

impl SegmentChain {
    #[inline]
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_count
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.line_count == 0
    }

    /// Number of segments, sentinel excluded.
    #[inline]
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.slots.len() - self.free.len() - 1
    }

    #[inline]
    #[must_use]
    pub fn sentinel(&self) -> SegmentId {
        self.sentinel
    }

    #[inline]
    #[must_use]
    pub fn final_separator(&self) -> bool {
        self.final_separator
    }

    /// Overrides the final-separator state. The unterminated line loaded
    /// from the source, if any, is forgotten.
    #[inline]
    pub fn set_final_separator(&mut self, value: bool) {
        self.final_separator = value;
        self.unterminated = None;
    }

    #[inline]
    #[must_use]
    pub fn get(&self, id: SegmentId) -> Option<&Segment> {
        self.slots
            .get(id.0)
            .and_then(Option::as_ref)
            .map(|slot| &slot.segment)
    }

    #[inline]
    #[must_use]
    pub fn next(&self, id: SegmentId) -> Option<SegmentId> {
        self.slots.get(id.0).and_then(Option::as_ref)?.next
    }

    #[inline]
    #[must_use]
    pub fn prev(&self, id: SegmentId) -> Option<SegmentId> {
        self.slots.get(id.0).and_then(Option::as_ref)?.prev
    }

    /// Last position resolved by [`SegmentChain::position`] or left behind
    /// by a mutation.
    #[inline]
    #[must_use]
    pub fn cached_position(&self) -> Option<SegmentPosition> {
        self.cache.get()
    }

    /// Segments in document order, sentinel excluded.
    pub fn iter(&self) -> impl Iterator<Item = (SegmentId, &Segment)> + '_ {
        let mut cursor = Some(self.head);

        std::iter::from_fn(move || {
            let id = cursor?;

            if id == self.sentinel {
                cursor = None;

                return None;
            }

            let slot = self.slot(id);

            cursor = slot.next;

            Some((id, &slot.segment))
        })
    }
}

/*

====================================
=========== ARENA HELPERS ==========
====================================

*/

impl SegmentChain {
    #[inline]
    #[track_caller]
    fn slot(&self, id: SegmentId) -> &Slot {
        self.slots
            .get(id.0)
            .and_then(Option::as_ref)
            .unwrap_or_else(|| corrupt("dangling segment id"))
    }

    #[inline]
    #[track_caller]
    fn slot_mut(&mut self, id: SegmentId) -> &mut Slot {
        self.slots
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .unwrap_or_else(|| corrupt("dangling segment id"))
    }

    fn alloc(&mut self, slot: Slot) -> SegmentId {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(slot);

                SegmentId(idx)
            }
            None => {
                self.slots.push(Some(slot));

                SegmentId(self.slots.len() - 1)
            }
        }
    }

    fn link_before(&mut self, at: SegmentId, segment: Segment) -> SegmentId {
        let prev = self.slot(at).prev;
        let id = self.alloc(Slot {
            segment,
            prev,
            next: Some(at),
        });

        self.slot_mut(at).prev = Some(id);

        match prev {
            Some(prev) => self.slot_mut(prev).next = Some(id),
            None => self.head = id,
        }

        id
    }

    fn link_after(&mut self, at: SegmentId, segment: Segment) -> SegmentId {
        let next = self
            .slot(at)
            .next
            .unwrap_or_else(|| corrupt("cannot link after the sentinel"));

        self.link_before(next, segment)
    }

    fn unlink(&mut self, id: SegmentId) -> Segment {
        if id == self.sentinel {
            corrupt("attempted to remove the sentinel");
        }

        let slot = self.slots[id.0]
            .take()
            .unwrap_or_else(|| corrupt("segment removed twice"));

        match slot.prev {
            Some(prev) => self.slot_mut(prev).next = slot.next,
            None => {
                self.head = slot
                    .next
                    .unwrap_or_else(|| corrupt("head without successor"));
            }
        }

        if let Some(next) = slot.next {
            self.slot_mut(next).prev = slot.prev;
        }

        self.free.push(id.0);

        slot.segment
    }

    /// Drops every segment, leaving a fresh sentinel.
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

/*

====================================
============ POSITIONING ===========
====================================

*/

impl SegmentChain {
    /// Resolves the segment holding `line`, walking from whichever of the
    /// cached position, the head, or the sentinel is nearest.
    ///
    /// A line at or past the end yields [`Located::BeyondEnd`] pointing at the
    /// sentinel; that is a normal answer, not an error.
    pub fn position(&self, line: usize) -> Located {
        let mut pos = self.walk_start(line);

        while line < pos.first_line {
            let prev = self
                .slot(pos.segment)
                .prev
                .unwrap_or_else(|| corrupt("walked backwards past the head"));
            let count = self.slot(prev).segment.line_count();

            pos = SegmentPosition {
                segment: prev,
                first_line: pos
                    .first_line
                    .checked_sub(count)
                    .unwrap_or_else(|| corrupt("negative first line")),
            };
        }

        while pos.segment != self.sentinel {
            let slot = self.slot(pos.segment);
            let count = slot.segment.line_count();

            if line < pos.first_line + count {
                break;
            }

            pos = SegmentPosition {
                segment: slot
                    .next
                    .unwrap_or_else(|| corrupt("chain ends without a sentinel")),
                first_line: pos.first_line + count,
            };
        }

        self.cache.set(Some(pos));

        if pos.segment == self.sentinel {
            if pos.first_line != self.line_count {
                corrupt("sentinel position disagrees with line count");
            }

            Located::BeyondEnd(pos)
        } else {
            Located::Within(pos)
        }
    }

    fn walk_start(&self, line: usize) -> SegmentPosition {
        let head = SegmentPosition {
            segment: self.head,
            first_line: 0,
        };
        let tail = SegmentPosition {
            segment: self.sentinel,
            first_line: self.line_count,
        };
        let mut best = if line <= self.line_count / 2 { head } else { tail };

        if let Some(cached) = self.cache.get()
            && self.get(cached.segment).is_some()
            && cached.first_line.abs_diff(line) < best.first_line.abs_diff(line)
        {
            best = cached;
        }

        best
    }
}

/*

=====================================
========= SPLIT / MERGE  ============
=====================================

*/

impl SegmentChain {
    /// Makes sure a segment boundary sits exactly at `line`.
    ///
    /// With `extend` set, a line past the end is reached by appending blank
    /// lines first. Without it, any line at or past the end fails with
    /// [`crate::errors::ChainError::OutOfRange`] and nothing changes.
    ///
    /// An [`SplitOutcome::Extended`] split appends blanks for
    /// `line_count()..line` only: `line` itself still does not exist, and the
    /// returned boundary is the sentinel. Callers insert at it to create it.
    ///
    /// # Errors
    ///
    /// - `OutOfRange` if `line >= line_count()` and `extend` is false.
    pub fn split(&mut self, line: usize, extend: bool) -> crate::errors::ChainResult<SplitOutcome> {
        match self.position(line) {
            Located::BeyondEnd(_) if !extend => Err(crate::errors::ChainError::OutOfRange {
                line,
                line_count: self.line_count,
            }),
            Located::BeyondEnd(_) if line == self.line_count => {
                Ok(SplitOutcome::Clean(self.sentinel))
            }
            Located::BeyondEnd(_) => {
                let missing = line - self.line_count;

                for segment in Self::make_blank_lines(missing) {
                    self.link_before(self.sentinel, segment);
                }

                self.line_count = line;
                self.cache.set(Some(SegmentPosition {
                    segment: self.sentinel,
                    first_line: line,
                }));

                tracing::trace!(line, missing, "extended chain with blank lines");

                Ok(SplitOutcome::Extended(self.sentinel))
            }
            Located::Within(pos) if pos.first_line == line => Ok(SplitOutcome::Clean(pos.segment)),
            Located::Within(pos) => {
                let tail = self
                    .slot_mut(pos.segment)
                    .segment
                    .split_off(line - pos.first_line);
                let id = self.link_after(pos.segment, tail);

                self.cache.set(Some(SegmentPosition {
                    segment: id,
                    first_line: line,
                }));

                Ok(SplitOutcome::Clean(id))
            }
        }
    }

    /// Folds `id` into its predecessor when both come from the same file
    /// handle, are byte-contiguous, and fit in one segment together.
    ///
    /// Returns whether the merge happened. A cache entry on `id` moves onto
    /// the merged segment; any other entry is still accurate and is kept.
    pub fn merge_with_previous(&mut self, id: SegmentId) -> bool {
        if id == self.sentinel || self.get(id).is_none() {
            return false;
        }

        let Some(prev) = self.slot(id).prev else {
            return false;
        };

        if !self.slot(prev).segment.can_absorb(&self.slot(id).segment) {
            return false;
        }

        let prev_count = self.slot(prev).segment.line_count();
        let cache = match self.cache.get() {
            Some(pos) if pos.segment == id => {
                pos.first_line
                    .checked_sub(prev_count)
                    .map(|first_line| SegmentPosition {
                        segment: prev,
                        first_line,
                    })
            }
            other => other,
        };
        let segment = self.unlink(id);

        self.slot_mut(prev).segment.absorb(segment);
        self.cache.set(cache);
        self.debug_validate();

        true
    }

    /// [`SegmentChain::merge_with_previous`] applied to the successor of `id`.
    pub fn merge_with_next(&mut self, id: SegmentId) -> bool {
        match self.next(id) {
            Some(next) if next != self.sentinel => self.merge_with_previous(next),
            _ => false,
        }
    }
}

/*

=====================================
========= INSERT / DELETE  ==========
=====================================

*/

impl SegmentChain {
    /// Splices `segments` so their first line becomes line `at`, appending
    /// blank lines first if `at` is past the end.
    ///
    /// Returns the id of the first inserted segment, or `None` when there was
    /// nothing to insert.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the split it relies on always extends.
    pub fn insert(
        &mut self,
        segments: Vec<Segment>,
        at: usize,
    ) -> crate::errors::ChainResult<Option<SegmentId>> {
        let mut segments = segments
            .into_iter()
            .filter(|segment| segment.line_count() > 0)
            .peekable();

        if segments.peek().is_none() {
            return Ok(None);
        }

        let boundary = self.split(at, true)?.segment();
        let mut first = None;
        let mut added = 0usize;

        for segment in segments {
            added += segment.line_count();

            let id = self.link_before(boundary, segment);

            first.get_or_insert(id);
        }

        self.line_count += added;
        self.cache.set(first.map(|segment| SegmentPosition {
            segment,
            first_line: at,
        }));
        self.debug_validate();

        Ok(first)
    }

    /// Removes lines `from..=to`.
    ///
    /// Empty or out-of-range requests are no-ops; `to` is clamped to the last
    /// line so a deletion never grows the document. Returns the number of
    /// lines removed.
    ///
    /// # Errors
    ///
    /// Never fails in practice; both splits are inside the document.
    pub fn delete(&mut self, from: usize, to: usize) -> crate::errors::ChainResult<usize> {
        if from > to || from >= self.line_count {
            return Ok(0);
        }

        let to = to.min(self.line_count - 1);
        let end = self.split(to + 1, true)?.segment();
        let mut cursor = Some(self.split(from, true)?.segment());
        let mut removed = 0usize;

        while let Some(id) = cursor
            && id != end
        {
            cursor = self.slot(id).next;

            let segment = self.unlink(id);

            if let Some((source, offset)) = &self.unterminated
                && segment.covers(source, *offset)
            {
                self.final_separator = true;
                self.unterminated = None;
            }

            removed += segment.line_count();
        }

        if removed != to - from + 1 {
            corrupt("deleted line count does not match the requested range");
        }

        self.line_count -= removed;

        if self.line_count == 0 {
            self.final_separator = true;
            self.unterminated = None;
        }

        self.cache.set(Some(SegmentPosition {
            segment: end,
            first_line: from,
        }));
        self.debug_validate();

        Ok(removed)
    }

    /// Swaps line `line` for `segments`, growing the document with blank
    /// lines if `line` is past the end.
    ///
    /// # Errors
    ///
    /// Never fails in practice; see [`SegmentChain::insert`].
    pub fn replace(
        &mut self,
        line: usize,
        segments: Vec<Segment>,
    ) -> crate::errors::ChainResult<Option<SegmentId>> {
        if line < self.line_count {
            self.delete(line, line)?;
        }

        self.insert(segments, line)
    }
}

/*

====================================
============ READ / WRITE ===========
====================================

*/

impl SegmentChain {
    /// Reads line `line` without its separator.
    ///
    /// # Errors
    ///
    /// - `OutOfRange` if the line is past the end (a blank line inside the
    ///   document reads as an empty vector instead).
    /// - `Io` if the source cannot be read.
    pub fn read_line(&self, line: usize) -> crate::errors::ChainResult<Vec<u8>> {
        let pos = match self.position(line) {
            Located::Within(pos) => pos,
            Located::BeyondEnd(_) => {
                return Err(crate::errors::ChainError::OutOfRange {
                    line,
                    line_count: self.line_count,
                });
            }
        };
        let segment = &self.slot(pos.segment).segment;
        let (offset, len) = segment
            .line_span(line - pos.first_line)
            .unwrap_or_else(|| corrupt("cached segment does not hold the line"));

        if segment.is_synthetic() {
            return Ok(Vec::new());
        }

        let mut out = Vec::with_capacity(<u64 as TryInto<usize>>::try_into(len).unwrap_or(0));

        segment
            .source()
            .read_into(segment.base_offset() + offset, len, &mut out)?;

        if out.last() == Some(&crate::segment_chain::SEPARATOR) {
            out.pop();
        }

        Ok(out)
    }

    /// Streams the whole document to `dest`, walking from the head.
    ///
    /// A segment whose source cannot be read is skipped and counted in the
    /// report instead of aborting the write. Failures writing to `dest`
    /// are returned.
    ///
    /// # Errors
    ///
    /// - `Io` if writing to `dest` fails.
    pub fn write_all<W: std::io::Write>(
        &self,
        dest: &mut W,
    ) -> crate::errors::ChainResult<WriteReport> {
        let mut report = WriteReport::default();
        let last = self.slot(self.sentinel).prev;
        let mut buf = Vec::new();

        for (id, segment) in self.iter() {
            let mut len = segment.total_bytes();

            if !self.final_separator && Some(id) == last {
                len = len.saturating_sub(1);
            }

            let read = match segment.source() {
                Source::File(file) => file.read_exact_at(segment.base_offset(), len),
                source => {
                    buf.clear();
                    source
                        .read_into(segment.base_offset(), len, &mut buf)
                        .map(|()| buf.as_slice())
                }
            };

            match read {
                Ok(bytes) => {
                    dest.write_all(bytes)?;
                    report.bytes_written += len;
                    report.segments_written += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        base_offset = segment.base_offset(),
                        len,
                        error = %e,
                        "skipping unreadable segment during write-out"
                    );
                    report.segments_skipped += 1;
                }
            }
        }

        dest.flush()?;

        Ok(report)
    }
}

/*

====================================
=============== LOAD ===============
====================================

*/

impl SegmentChain {
    /// Replaces the chain with the lines of `file`.
    ///
    /// Lines are grouped into segments of at most
    /// [`crate::segment_chain::MAX_SEGMENT_LINES`] lines, closing a segment
    /// early once it reaches `byte_budget` bytes. An unterminated final line
    /// is copied into `scratch` with a separator so every line in the chain
    /// carries one; [`SegmentChain::final_separator`] remembers the
    /// difference for write-out.
    ///
    /// # Errors
    ///
    /// - `Io` if the unterminated final line cannot be stored in `scratch`;
    ///   the chain is left empty.
    pub fn load_from_source(
        &mut self,
        file: std::rc::Rc<io::mmap::MmapFile>,
        scratch: &crate::scratch::ScratchStore,
        byte_budget: u64,
    ) -> crate::errors::ChainResult<()> {
        self.clear();

        let bytes = file.as_slice();
        let budget = byte_budget.max(1);
        let mut lengths = Vec::with_capacity(crate::segment_chain::MAX_SEGMENT_LINES);
        let mut segment_start = 0u64;
        let mut segment_bytes = 0u64;
        let mut last_position = 0u64;

        for line_position in memchr::memchr_iter(crate::segment_chain::SEPARATOR, bytes) {
            let next_line_position = line_position as u64 + 1;
            let len = next_line_position - last_position;

            lengths.push(len);
            segment_bytes += len;
            last_position = next_line_position;

            if lengths.len() == crate::segment_chain::MAX_SEGMENT_LINES || segment_bytes >= budget
            {
                self.push_loaded(&file, segment_start, &mut lengths);
                segment_start = last_position;
                segment_bytes = 0;
            }
        }

        if !lengths.is_empty() {
            self.push_loaded(&file, segment_start, &mut lengths);
        }

        let bytes_len = bytes.len() as u64;

        if last_position < bytes_len {
            let tail = &bytes[<u64 as TryInto<usize>>::try_into(last_position)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?..];

            match scratch.append_line(tail) {
                Ok(segment) => {
                    self.unterminated = Some((segment.source().clone(), segment.base_offset()));
                    self.link_before(self.sentinel, segment);
                    self.line_count += 1;
                    self.final_separator = false;
                }
                Err(e) => {
                    self.clear();

                    return Err(e);
                }
            }
        }

        tracing::debug!(
            path = %file.path().display(),
            lines = self.line_count,
            segments = self.segment_count(),
            final_separator = self.final_separator,
            "loaded source"
        );

        Ok(())
    }

    fn push_loaded(
        &mut self,
        file: &std::rc::Rc<io::mmap::MmapFile>,
        base_offset: u64,
        lengths: &mut Vec<u64>,
    ) {
        let segment = Segment::new(Source::File(file.clone()), base_offset, lengths.drain(..));

        self.line_count += segment.line_count();
        self.link_before(self.sentinel, segment);
    }
}

/*

====================================
============ VALIDATION ============
====================================

*/

impl SegmentChain {
    /// Runs [`SegmentChain::validate`] after a mutation in debug builds.
    #[inline]
    fn debug_validate(&self) {
        if cfg!(debug_assertions)
            && let Err(e) = self.validate()
        {
            panic!("{e}");
        }
    }

    /// Walks the whole chain and checks every structural invariant: links
    /// agree in both directions, every segment but the sentinel holds
    /// 1..=127 lines, the sentinel is last and empty, line counts add up, no
    /// slot is orphaned, and the position cache (if any) is accurate.
    ///
    /// # Errors
    ///
    /// - `CorruptChain` describing the first violation found.
    pub fn validate(&self) -> crate::errors::ChainResult<()> {
        let fail = |msg: String| Err(crate::errors::ChainError::CorruptChain(msg));
        let mut cursor = Some(self.head);
        let mut prev: Option<SegmentId> = None;
        let mut first_line = 0usize;
        let mut visited = 0usize;
        let mut cache_seen = false;
        let cache = self.cache.get();

        if self.get(self.head).is_none_or(|_| self.slot(self.head).prev.is_some()) {
            return fail("head is missing or has a predecessor".to_string());
        }

        while let Some(id) = cursor {
            let Some(slot) = self.slots.get(id.0).and_then(Option::as_ref) else {
                return fail(format!("link to freed slot {}", id.0));
            };

            if slot.prev != prev {
                return fail(format!("slot {} has a broken back link", id.0));
            }

            if let Some(pos) = cache
                && pos.segment == id
            {
                if pos.first_line != first_line {
                    return fail(format!(
                        "cache says slot {} starts at line {}, chain says {first_line}",
                        id.0, pos.first_line
                    ));
                }

                cache_seen = true;
            }

            visited += 1;

            if id == self.sentinel {
                if slot.next.is_some() {
                    return fail("sentinel is not the last segment".to_string());
                }

                if slot.segment.line_count() != 0 {
                    return fail("sentinel holds lines".to_string());
                }

                break;
            }

            let count = slot.segment.line_count();

            if count == 0 || count > crate::segment_chain::MAX_SEGMENT_LINES {
                return fail(format!("slot {} holds {count} lines", id.0));
            }

            first_line += count;
            prev = Some(id);
            cursor = slot.next;

            if cursor.is_none() {
                return fail("chain ends without reaching the sentinel".to_string());
            }
        }

        if first_line != self.line_count {
            return fail(format!(
                "segments hold {first_line} lines, chain claims {}",
                self.line_count
            ));
        }

        if visited != self.slots.len() - self.free.len() {
            return fail("orphaned slots outside the chain".to_string());
        }

        if cache.is_some() && !cache_seen {
            return fail("cache points outside the chain".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod segment_chain_tests {
    use std::io::Write;

    use crate::scratch::ScratchStore;
    use crate::segment_chain::chain::SegmentChain;
    use crate::segment_chain::position::{Located, SplitOutcome};

    fn mapped(content: &[u8]) -> std::rc::Rc<io::mmap::MmapFile> {
        let mut temp = tempfile::NamedTempFile::new().unwrap();
        temp.write_all(content).unwrap();
        temp.as_file().sync_all().unwrap();

        std::rc::Rc::new(io::mmap::MmapFile::open(temp.path()).unwrap())
    }

    fn loaded(content: &[u8], budget: u64) -> (SegmentChain, ScratchStore) {
        let scratch = ScratchStore::new().unwrap();
        let mut chain = SegmentChain::new();

        chain
            .load_from_source(mapped(content), &scratch, budget)
            .unwrap();

        (chain, scratch)
    }

    fn lines_of(chain: &SegmentChain) -> Vec<String> {
        (0..chain.line_count())
            .map(|line| String::from_utf8(chain.read_line(line).unwrap()).unwrap())
            .collect()
    }

    fn written(chain: &SegmentChain) -> Vec<u8> {
        let mut out = Vec::new();
        chain.write_all(&mut out).unwrap();
        out
    }

    fn numbered(count: usize) -> Vec<u8> {
        (0..count).map(|i| format!("line {i}\n")).collect::<String>().into_bytes()
    }

    #[test]
    fn new_chain_has_only_sentinel() {
        let chain = SegmentChain::new();

        assert_eq!(chain.line_count(), 0);
        assert_eq!(chain.segment_count(), 0);
        assert!(chain.position(0).is_beyond_end());
        chain.validate().unwrap();
    }

    #[test]
    fn read_after_load() {
        let (chain, _scratch) = loaded(b"a\nb\nc\n", 4000);

        assert_eq!(chain.line_count(), 3);
        assert_eq!(lines_of(&chain), vec!["a", "b", "c"]);
        assert!(chain.read_line(3).unwrap_err().is_out_of_range());
        chain.validate().unwrap();
    }

    #[test]
    fn load_respects_line_and_byte_limits() {
        let (chain, _scratch) = loaded(&numbered(300), 4000);

        assert_eq!(chain.line_count(), 300);
        assert!(chain.iter().all(|(_, s)| s.line_count() <= 127));
        assert_eq!(chain.segment_count(), 3);

        let (chain, _scratch) = loaded(&numbered(20), 16);

        // Each "line N\n" is 7 bytes, so a 16-byte budget closes after 3 lines.
        assert!(chain.iter().all(|(_, s)| s.line_count() <= 3));
        assert_eq!(chain.line_count(), 20);
        chain.validate().unwrap();
    }

    #[test]
    fn unterminated_final_line_round_trips() {
        let (chain, _scratch) = loaded(b"one\ntwo", 4000);

        assert_eq!(lines_of(&chain), vec!["one", "two"]);
        assert!(!chain.final_separator());
        assert_eq!(written(&chain), b"one\ntwo");
    }

    #[test]
    fn save_fidelity_without_edits() {
        let cases: Vec<Vec<u8>> = vec![
            Vec::new(),
            b"\n".to_vec(),
            b"x".to_vec(),
            b"a\r\nb\r\n".to_vec(),
            numbered(1000),
        ];

        for content in cases {
            let (chain, _scratch) = loaded(&content, 64);

            assert_eq!(written(&chain), content);
        }
    }

    #[test]
    fn position_walks_both_ways() {
        let (chain, _scratch) = loaded(&numbered(50), 21);

        for line in [0, 49, 7, 6, 30, 3, 48] {
            let Located::Within(pos) = chain.position(line) else {
                panic!("line {line} should be inside the document");
            };
            let count = chain.get(pos.segment).unwrap().line_count();

            assert!(pos.first_line <= line && line < pos.first_line + count);
            chain.validate().unwrap();
        }

        assert_eq!(
            chain.position(50),
            Located::BeyondEnd(crate::segment_chain::position::SegmentPosition {
                segment: chain.sentinel(),
                first_line: 50,
            })
        );
    }

    #[test]
    fn split_beyond_end_without_extend_changes_nothing() {
        let (mut chain, _scratch) = loaded(b"a\nb\n", 4000);
        let before = chain.segment_count();

        let err = chain.split(2, false).unwrap_err();

        assert!(err.is_out_of_range());
        assert_eq!(chain.segment_count(), before);
        assert_eq!(chain.line_count(), 2);
    }

    #[test]
    fn split_cuts_inside_segment() {
        let (mut chain, _scratch) = loaded(&numbered(10), 4000);

        assert_eq!(chain.segment_count(), 1);

        let outcome = chain.split(4, false).unwrap();

        assert!(matches!(outcome, SplitOutcome::Clean(_)));
        assert_eq!(chain.segment_count(), 2);
        assert_eq!(chain.get(outcome.segment()).unwrap().line_count(), 6);

        // Splitting on an existing boundary is a no-op.
        assert_eq!(chain.split(4, false).unwrap(), outcome);
        assert_eq!(chain.segment_count(), 2);
        assert_eq!(lines_of(&chain)[4], "line 4");
        chain.validate().unwrap();
    }

    #[test]
    fn split_with_extend_appends_blank_lines() {
        let mut chain = SegmentChain::new();

        let outcome = chain.split(3, true).unwrap();

        assert_eq!(outcome, SplitOutcome::Extended(chain.sentinel()));
        assert_eq!(chain.line_count(), 3);
        assert_eq!(lines_of(&chain), vec!["", "", ""]);
        assert_eq!(chain.split(3, true).unwrap(), SplitOutcome::Clean(chain.sentinel()));
        chain.validate().unwrap();
    }

    #[test]
    fn merge_restores_split_segment() {
        let (mut chain, _scratch) = loaded(&numbered(10), 4000);
        let (_, original) = chain.iter().next().unwrap();
        let original = original.clone();

        let tail = chain.split(4, false).unwrap().segment();

        assert!(chain.merge_with_previous(tail));
        assert_eq!(chain.segment_count(), 1);

        let (_, merged) = chain.iter().next().unwrap();

        assert_eq!(merged.encoded_lengths(), original.encoded_lengths());
        assert_eq!(merged.base_offset(), original.base_offset());
        assert_eq!(merged.total_bytes(), original.total_bytes());
        chain.validate().unwrap();
    }

    #[test]
    fn merge_refuses_foreign_or_oversized_neighbours() {
        let scratch = ScratchStore::new().unwrap();
        let mut chain = SegmentChain::new();

        chain.load_from_source(mapped(&numbered(5)), &scratch, 4000).unwrap();

        let pasted = scratch.append_lines(&["p", "q"]).unwrap();
        let pasted_id = chain.insert(pasted, 5).unwrap().unwrap();

        assert!(!chain.merge_with_previous(pasted_id));
        assert_eq!(chain.segment_count(), 2);

        let (mut chain, _scratch) = loaded(&numbered(200), 1 << 20);
        let second = chain.position(127).position().segment;

        assert!(!chain.merge_with_previous(second), "127 + 73 lines is too many");
        assert_eq!(chain.segment_count(), 2);
        chain.validate().unwrap();
    }

    #[test]
    fn insert_shifts_indices() {
        let (mut chain, _scratch) = loaded(b"a\nb\nc\n", 4000);

        chain.insert(SegmentChain::make_blank_lines(2), 1).unwrap();

        assert_eq!(chain.line_count(), 5);
        assert_eq!(lines_of(&chain), vec!["a", "", "", "b", "c"]);
        assert_eq!(written(&chain), b"a\n\n\nb\nc\n");
        chain.validate().unwrap();
    }

    #[test]
    fn insert_nothing_is_noop() {
        let (mut chain, _scratch) = loaded(b"a\n", 4000);

        assert_eq!(chain.insert(Vec::new(), 7).unwrap(), None);
        assert_eq!(chain.line_count(), 1);
    }

    #[test]
    fn delete_shifts_indices() {
        let (mut chain, _scratch) = loaded(b"a\nb\nc\nd\ne\n", 4000);

        assert_eq!(chain.delete(1, 2).unwrap(), 2);
        assert_eq!(lines_of(&chain), vec!["a", "d", "e"]);
        chain.validate().unwrap();
    }

    #[test]
    fn delete_out_of_range_is_noop_or_clamped() {
        let (mut chain, _scratch) = loaded(b"a\nb\nc\n", 4000);

        assert_eq!(chain.delete(2, 1).unwrap(), 0);
        assert_eq!(chain.delete(3, 9).unwrap(), 0);
        assert_eq!(chain.delete(1, 9).unwrap(), 2);
        assert_eq!(lines_of(&chain), vec!["a"]);

        let mut empty = SegmentChain::new();

        assert_eq!(empty.delete(0, 0).unwrap(), 0);
        chain.validate().unwrap();
    }

    #[test]
    fn delete_across_many_segments() {
        let (mut chain, _scratch) = loaded(&numbered(100), 30);

        assert_eq!(chain.delete(5, 94).unwrap(), 90);
        assert_eq!(chain.line_count(), 10);
        assert_eq!(lines_of(&chain)[5], "line 95");
        chain.validate().unwrap();
    }

    #[test]
    fn replace_fills_gaps() {
        let scratch = ScratchStore::new().unwrap();
        let mut chain = SegmentChain::new();
        let segment = scratch.append_line(b"value").unwrap();

        chain.replace(2, vec![segment]).unwrap();

        assert_eq!(lines_of(&chain), vec!["", "", "value"]);
        assert_eq!(written(&chain), b"\n\nvalue\n");
        chain.validate().unwrap();
    }

    #[test]
    fn write_skips_unreadable_segments() {
        let (mut chain, _scratch) = loaded(b"keep\n", 4000);
        let foreign = crate::segment_chain::segment::Segment::new(
            crate::segment_chain::segment::Source::File(mapped(b"tiny\n")),
            1000,
            [4],
        );

        chain.insert(vec![foreign], 1).unwrap();

        let mut out = Vec::new();
        let report = chain.write_all(&mut out).unwrap();

        assert_eq!(out, b"keep\n");
        assert_eq!(report.segments_written, 1);
        assert_eq!(report.segments_skipped, 1);
    }

    #[test]
    fn edits_after_unterminated_tail_keep_final_state() {
        let (mut chain, scratch) = loaded(b"one\ntwo", 4000);
        let extra = scratch.append_lines(&["three"]).unwrap();

        chain.insert(extra, 2).unwrap();

        assert_eq!(written(&chain), b"one\ntwo\nthree");
    }

    #[test]
    fn deleting_unterminated_line_restores_separator() {
        let (mut chain, _scratch) = loaded(b"a\nb", 4000);

        assert_eq!(chain.delete(1, 1).unwrap(), 1);

        assert!(chain.final_separator());
        assert_eq!(written(&chain), b"a\n");
    }

    #[test]
    fn deleting_other_lines_keeps_missing_separator() {
        let (mut chain, _scratch) = loaded(b"a\nb", 4000);

        chain.delete(0, 0).unwrap();

        assert!(!chain.final_separator());
        assert_eq!(written(&chain), b"b");
    }

    #[test]
    fn rewriting_every_line_terminates_new_content() {
        let (mut chain, scratch) = loaded(b"a\nb", 4000);

        chain.delete(0, 1).unwrap();
        assert!(chain.is_empty());
        assert!(chain.final_separator());

        chain
            .insert(scratch.append_lines(&["fresh", "text"]).unwrap(), 0)
            .unwrap();

        assert_eq!(written(&chain), b"fresh\ntext\n");
    }

    #[test]
    fn replacing_unterminated_line_terminates_it() {
        let (mut chain, scratch) = loaded(b"a\nb", 4000);

        chain
            .replace(1, vec![scratch.append_line(b"B").unwrap()])
            .unwrap();

        assert_eq!(written(&chain), b"a\nB\n");
    }

    #[test]
    fn unterminated_line_is_tracked_through_merges() {
        let (mut chain, scratch) = loaded(b"a\nb", 4000);
        let tail = chain.prev(chain.sentinel()).unwrap();

        // Appended right after the scratch copy of "b", so the two merge.
        chain
            .insert(scratch.append_lines(&["c"]).unwrap(), 2)
            .unwrap();
        assert!(chain.merge_with_next(tail));
        assert_eq!(written(&chain), b"a\nb\nc");

        chain.delete(1, 1).unwrap();

        assert_eq!(lines_of(&chain), vec!["a", "c"]);
        assert_eq!(written(&chain), b"a\nc\n");
    }

    #[test]
    #[should_panic(expected = "segment chain corrupted")]
    fn removing_the_sentinel_fails_fast() {
        let mut chain = SegmentChain::new();
        let sentinel = chain.sentinel();

        chain.unlink(sentinel);
    }

    #[test]
    fn validate_reports_broken_bookkeeping() {
        let (mut chain, _scratch) = loaded(b"a\nb\n", 4000);

        chain.cache.set(Some(crate::segment_chain::position::SegmentPosition {
            segment: chain.head,
            first_line: 1,
        }));

        assert!(matches!(
            chain.validate(),
            Err(crate::errors::ChainError::CorruptChain(_))
        ));

        chain.cache.set(None);
        chain.line_count += 1;

        assert!(chain.validate().is_err());
    }
}
