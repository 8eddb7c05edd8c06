/// Staging buffer for the line currently being edited.
///
/// Keystrokes mutate `content` in memory; the chain only sees the line again
/// when a different line is loaded or [`LineCache::flush`] is called, so
/// typing on one line costs one scratch append and one splice in total.
#[derive(Debug, Default)]
pub struct LineCache {
    line: Option<usize>,
    content: Vec<u8>,
    dirty: bool,
}

impl LineCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn line(&self) -> Option<usize> {
        self.line
    }

    #[inline]
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Makes `line` the held line and returns its content.
    ///
    /// A dirty line held under another number is flushed first. A line past
    /// the end loads as empty so it can be written to.
    ///
    /// # Errors
    ///
    /// - Whatever [`LineCache::flush`] or the chain read returns. On error
    ///   the previously held line is kept, still dirty if it was.
    pub fn load(
        &mut self,
        chain: &mut crate::segment_chain::chain::SegmentChain,
        scratch: &crate::scratch::ScratchStore,
        line: usize,
    ) -> crate::errors::ChainResult<&[u8]> {
        if self.line == Some(line) {
            return Ok(&self.content);
        }

        self.flush(chain, scratch)?;

        let content = match chain.read_line(line) {
            Ok(content) => content,
            Err(e) if e.is_out_of_range() => Vec::new(),
            Err(e) => return Err(e),
        };

        self.line = Some(line);
        self.content = content;
        self.dirty = false;

        Ok(&self.content)
    }

    /// Replaces the held line's content.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if no line is loaded or `content` holds a
    ///   separator.
    pub fn set(&mut self, content: impl Into<Vec<u8>>) -> crate::errors::ChainResult<()> {
        let content = content.into();

        if self.line.is_none() {
            return Err(crate::errors::ChainError::InvalidArgument(
                "no line is loaded".into(),
            ));
        }

        if memchr::memchr(crate::segment_chain::SEPARATOR, &content).is_some() {
            return Err(crate::errors::ChainError::InvalidArgument(
                "a line cannot contain a separator".into(),
            ));
        }

        self.content = content;
        self.dirty = true;

        Ok(())
    }

    /// Mutable access to the held content. Marks the line dirty.
    pub fn content_mut(&mut self) -> &mut Vec<u8> {
        self.dirty = true;

        &mut self.content
    }

    /// Writes a dirty line back into the chain through the scratch store,
    /// then tries to merge the new segment with its neighbours.
    ///
    /// Returns whether anything was written.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the content gained a separator through
    ///   [`LineCache::content_mut`].
    /// - `Io` if the scratch store cannot be written. The line stays dirty.
    pub fn flush(
        &mut self,
        chain: &mut crate::segment_chain::chain::SegmentChain,
        scratch: &crate::scratch::ScratchStore,
    ) -> crate::errors::ChainResult<bool> {
        let Some(line) = self.line else {
            return Ok(false);
        };

        if !self.dirty {
            return Ok(false);
        }

        let segment = scratch.append_line(&self.content)?;

        if let Some(id) = chain.replace(line, vec![segment])? {
            chain.merge_with_next(id);
            chain.merge_with_previous(id);
        }

        self.dirty = false;

        Ok(true)
    }

    /// Forgets the held line without writing it. Used after bulk edits have
    /// shifted line numbers underneath the cache.
    pub fn invalidate(&mut self) {
        if self.dirty {
            tracing::warn!(line = ?self.line, "discarding unflushed line");
        }

        self.line = None;
        self.content.clear();
        self.dirty = false;
    }
}
