/// Process-wide editing context: the configuration and the one scratch store
/// every document appends its edits to.
#[derive(Debug)]
pub struct Workspace {
    config: crate::config::EditorConfig,
    scratch: editor_core::scratch::ScratchStore,
}

impl Workspace {
    /// # Errors
    ///
    /// - `Io` if the configured scratch directory cannot be created, or the
    ///   scratch file cannot be created inside it.
    pub fn new(config: crate::config::EditorConfig) -> crate::errors::DocumentResult<Self> {
        let scratch = match &config.scratch_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                editor_core::scratch::ScratchStore::new_in(dir)?
            }
            None => editor_core::scratch::ScratchStore::new()?,
        };

        tracing::debug!(?config, "workspace ready");

        Ok(Self { config, scratch })
    }

    /// Opens `path` as a document sharing this workspace's scratch store.
    ///
    /// # Errors
    ///
    /// See [`crate::document::Document::open`].
    pub fn open<P: AsRef<std::path::Path>>(
        &self,
        path: P,
    ) -> crate::errors::DocumentResult<crate::document::Document> {
        let mut document = crate::document::Document::open(
            self.scratch.clone(),
            path,
            self.config.segment_bytes,
        )?;

        if self.config.read_only {
            document.buffer_mut().set_writable(false);
        }

        Ok(document)
    }

    #[must_use]
    pub fn new_document(&self) -> crate::document::Document {
        crate::document::Document::new(self.scratch.clone(), self.config.segment_bytes)
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &crate::config::EditorConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn scratch(&self) -> &editor_core::scratch::ScratchStore {
        &self.scratch
    }
}
