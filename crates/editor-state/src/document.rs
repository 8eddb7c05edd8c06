/// One open file: its buffer plus the path it is bound to.
#[derive(Debug)]
pub struct Document {
    buffer: editor_core::text::TextBuffer,

    /// `None` for a document that has never been saved.
    path: Option<std::path::PathBuf>,
}

impl Document {
    /// An untitled, empty document.
    #[must_use]
    pub fn new(scratch: editor_core::scratch::ScratchStore, segment_bytes: u64) -> Self {
        Self {
            buffer: editor_core::text::TextBuffer::new(scratch).with_segment_bytes(segment_bytes),
            path: None,
        }
    }

    /// Opens `path`, mapping it and loading its lines.
    ///
    /// A path that does not exist yet gives an empty document bound to it,
    /// so the first save creates the file. Writability follows the file's
    /// permissions.
    ///
    /// # Errors
    ///
    /// - `Io` if the file exists but cannot be inspected, opened or mapped.
    /// - `Chain` if an unterminated final line cannot be stored.
    pub fn open<P: AsRef<std::path::Path>>(
        scratch: editor_core::scratch::ScratchStore,
        path: P,
        segment_bytes: u64,
    ) -> crate::errors::DocumentResult<Self> {
        let path = path.as_ref();
        let mut document = Self::new(scratch, segment_bytes);

        document.path = Some(path.to_path_buf());

        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "opening new file");

                return Ok(document);
            }
            Err(e) => return Err(e.into()),
        };

        let file = std::rc::Rc::new(io::mmap::MmapFile::open(path)?);

        document.buffer.load_from_source(file)?;
        document
            .buffer
            .set_writable(!metadata.permissions().readonly());

        tracing::debug!(
            path = %path.display(),
            lines = document.buffer.total_line_count(),
            writable = document.buffer.is_writable(),
            "opened document"
        );

        Ok(document)
    }
}

/*

==========================
===== INLINE METHODS =====
==========================

*/

impl Document {
    #[inline]
    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        self.path.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn buffer(&self) -> &editor_core::text::TextBuffer {
        &self.buffer
    }

    #[inline]
    pub fn buffer_mut(&mut self) -> &mut editor_core::text::TextBuffer {
        &mut self.buffer
    }

    #[inline]
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.buffer.is_modified()
    }

    /// File name for display, or a placeholder for untitled documents.
    #[must_use]
    pub fn title(&self) -> String {
        self.path
            .as_deref()
            .and_then(std::path::Path::file_name)
            .map_or_else(
                || "untitled".to_string(),
                |name| name.to_string_lossy().into_owned(),
            )
    }
}

/*

========================
========= SAVE =========
========================

*/

impl Document {
    /// Writes the document back to its path.
    ///
    /// The content goes to a temporary file in the same directory which is
    /// synced and renamed over the target. The previous file stays mapped
    /// until the buffer is reloaded from the new one, so segments never see
    /// their bytes change underneath them.
    ///
    /// # Errors
    ///
    /// - `ReadOnly` if the buffer is not writable.
    /// - `NoPath` if the document was never bound to a path.
    /// - `Io` or `Chain` if writing, syncing or renaming fails.
    pub fn save(&mut self) -> crate::errors::DocumentResult<editor_core::segment_chain::chain::WriteReport> {
        let path = self.path.clone().ok_or(crate::errors::DocumentError::NoPath)?;

        if !self.buffer.is_writable() {
            return Err(crate::errors::DocumentError::ReadOnly(path));
        }

        self.write_to(&path)
    }

    /// Binds the document to `path` and saves it there.
    ///
    /// Saving under a new name is allowed for read-only documents; the copy
    /// is writable afterwards. An existing read-only target is refused.
    ///
    /// # Errors
    ///
    /// - `ReadOnly` if `path` exists and is read-only.
    /// - Same as [`Document::save`] otherwise.
    pub fn save_as<P: AsRef<std::path::Path>>(
        &mut self,
        path: P,
    ) -> crate::errors::DocumentResult<editor_core::segment_chain::chain::WriteReport> {
        let path = path.as_ref().to_path_buf();

        if std::fs::metadata(&path).is_ok_and(|metadata| metadata.permissions().readonly()) {
            return Err(crate::errors::DocumentError::ReadOnly(path));
        }

        let report = self.write_to(&path)?;

        self.path = Some(path);
        self.buffer.set_writable(true);

        Ok(report)
    }

    fn write_to(
        &mut self,
        path: &std::path::Path,
    ) -> crate::errors::DocumentResult<editor_core::segment_chain::chain::WriteReport> {
        // Temp file must share the target's filesystem for the rename.
        let parent_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => std::path::Path::new("."),
        };
        let mut temp_save_file = tempfile::Builder::new()
            .prefix(".segline_save_")
            .tempfile_in(parent_dir)?;

        let report = {
            let mut writer = std::io::BufWriter::new(temp_save_file.as_file_mut());

            self.buffer.write_all(&mut writer)?
        };

        if report.segments_skipped > 0 {
            tracing::warn!(
                path = %path.display(),
                skipped = report.segments_skipped,
                "saved with unreadable segments missing"
            );
        }

        temp_save_file.as_file().sync_all()?;

        if let Ok(metadata) = std::fs::metadata(path) {
            std::fs::set_permissions(temp_save_file.path(), metadata.permissions())?;
        }

        temp_save_file.persist(path).map_err(|e| e.error)?;

        self.reload_after_save(path);
        self.buffer.mark_saved();

        tracing::debug!(
            path = %path.display(),
            bytes = report.bytes_written,
            segments = report.segments_written,
            "saved document"
        );

        Ok(report)
    }

    /// Swaps the chain for one over the freshly written file, collapsing the
    /// edit history into a few large segments. On failure the current chain
    /// is kept; it still describes the saved content.
    fn reload_after_save(&mut self, path: &std::path::Path) {
        let reloaded = io::mmap::MmapFile::open(path)
            .map_err(editor_core::errors::ChainError::from)
            .and_then(|file| {
                let mut fresh = editor_core::text::TextBuffer::new(self.buffer.scratch().clone())
                    .with_segment_bytes(self.buffer.segment_bytes());

                fresh.load_from_source(std::rc::Rc::new(file))?;

                Ok(fresh)
            });

        match reloaded {
            Ok(mut fresh) => {
                fresh.set_writable(self.buffer.is_writable());
                self.buffer = fresh;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "keeping pre-save chain");
            }
        }
    }
}
