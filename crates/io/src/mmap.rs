/// Read-only view of an original file on disk.
///
/// Segments loaded from a file share one `MmapFile` through an `Rc`, so the
/// mapping lives exactly as long as the last segment that points into it.
/// The mapping stays valid after the path is replaced or unlinked, which is
/// what lets a document be saved over its own source.
#[derive(Debug)]
pub struct MmapFile {
    _file: std::fs::File,
    /// `None` for zero-length files, which cannot be mapped portably.
    mmap: Option<memmap2::Mmap>,
    path: std::path::PathBuf,
}

impl MmapFile {
    /// # Errors
    ///
    /// - `std::io::Error` if the file cannot be opened, inspected, or mapped.
    pub fn open(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let path_buf = path.as_ref().to_path_buf();
        let file = std::fs::File::open(&path_buf)?;
        let len = file.metadata()?.len();

        let mmap = if len == 0 {
            None
        } else {
            // SAFETY:
            // - File is opened read-only
            // - We keep the file handle alive in struct
            // - Caller only gets immutable &[u8]
            Some(unsafe { memmap2::Mmap::map(&file)? })
        };

        tracing::debug!(path = %path_buf.display(), len, "mapped source file");

        Ok(Self {
            _file: file,
            mmap,
            path: path_buf,
        })
    }

    /// STRICT: Gets an exact slice of bytes.
    /// Returns `None` if the requested range goes out of bounds or overflows.
    #[inline]
    #[must_use]
    pub fn get_bytes_exact(&self, start: u64, length: u64) -> Option<&[u8]> {
        let start = <u64 as TryInto<usize>>::try_into(start).ok()?;
        let length = <u64 as TryInto<usize>>::try_into(length).ok()?;
        let end = start.checked_add(length)?;

        self.as_slice().get(start..end)
    }

    /// Same as [`MmapFile::get_bytes_exact`] but reported as an I/O error, for
    /// callers that propagate failures with `?`.
    ///
    /// # Errors
    ///
    /// - `UnexpectedEof` if the range is not fully inside the mapping.
    pub fn read_exact_at(&self, start: u64, length: u64) -> std::io::Result<&[u8]> {
        self.get_bytes_exact(start, length).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "range {start}+{length} is outside {} ({} bytes)",
                    self.path.display(),
                    self.len()
                ),
            )
        })
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        match &self.mmap {
            Some(mmap) => mmap,
            None => &[],
        }
    }

    /// File length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Whether file is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Path of mapped file.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}
