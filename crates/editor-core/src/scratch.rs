/// Shared append-only store for edited and pasted lines.
///
/// Cloning is cheap and every clone appends to the same log, so one store
/// can serve all documents open in a process. Bytes are never reclaimed:
/// lines that drop out of every chain simply stay behind in the log.
#[derive(Clone, Debug)]
pub struct ScratchStore {
    file: std::rc::Rc<io::scratch::ScratchFile>,
}

impl ScratchStore {
    /// # Errors
    ///
    /// - `Io` if the backing temporary file cannot be created.
    pub fn new() -> crate::errors::ChainResult<Self> {
        Ok(Self {
            file: std::rc::Rc::new(io::scratch::ScratchFile::new()?),
        })
    }

    /// # Errors
    ///
    /// - `Io` if the backing file cannot be created inside `dir`.
    pub fn new_in(dir: impl AsRef<std::path::Path>) -> crate::errors::ChainResult<Self> {
        Ok(Self {
            file: std::rc::Rc::new(io::scratch::ScratchFile::new_in(dir)?),
        })
    }

    /// Offset the next append will land at.
    #[inline]
    #[must_use]
    pub fn end_offset(&self) -> u64 {
        self.file.len()
    }

    /// Stores one line and returns a one-line segment describing it.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `text` holds a separator before its last byte.
    /// - `Io` if the store cannot be written; the caller must not use any
    ///   segment for this text.
    pub fn append_line(
        &self,
        text: &[u8],
    ) -> crate::errors::ChainResult<crate::segment_chain::segment::Segment> {
        self.append_lines(&[text])?.pop().ok_or_else(|| {
            crate::errors::ChainError::CorruptChain("append produced no segment".into())
        })
    }

    /// Stores `texts` with one physical write and returns the segments that
    /// cover them, in order. An empty slice yields no segments.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if any text holds a separator before its last byte;
    ///   nothing is written in that case.
    /// - `Io` if the store cannot be written.
    pub fn append_lines<T: AsRef<[u8]>>(
        &self,
        texts: &[T],
    ) -> crate::errors::ChainResult<Vec<crate::segment_chain::segment::Segment>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut bytes = Vec::new();
        let mut lengths = Vec::with_capacity(texts.len());

        for (idx, text) in texts.iter().enumerate() {
            let text = text.as_ref();
            let body = text
                .strip_suffix(&[crate::segment_chain::SEPARATOR])
                .unwrap_or(text);

            if memchr::memchr(crate::segment_chain::SEPARATOR, body).is_some() {
                return Err(crate::errors::ChainError::InvalidArgument(format!(
                    "text {idx} spans more than one line"
                )));
            }

            bytes.extend_from_slice(body);
            bytes.push(crate::segment_chain::SEPARATOR);
            lengths.push(body.len() as u64 + 1);
        }

        let mut base_offset = self.file.append(&bytes)?;
        let source = crate::segment_chain::segment::Source::Scratch(self.file.clone());
        let segments = lengths
            .chunks(crate::segment_chain::MAX_SEGMENT_LINES)
            .map(|chunk| {
                let segment = crate::segment_chain::segment::Segment::new(
                    source.clone(),
                    base_offset,
                    chunk.iter().copied(),
                );

                base_offset += segment.total_bytes();

                segment
            })
            .collect();

        tracing::trace!(lines = texts.len(), bytes = bytes.len(), "appended to scratch store");

        Ok(segments)
    }
}
