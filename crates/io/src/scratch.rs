use std::io::{Read, Seek, Write};

/// Append-only backing file for edited text.
///
/// All methods take `&self`: the file is written through `&File` and the end
/// cursor lives in a `Cell`, so one `ScratchFile` can be shared by every
/// segment that points into it. Bytes below `end` are never rewritten.
#[derive(Debug)]
pub struct ScratchFile {
    file: std::fs::File,
    end: std::cell::Cell<u64>,
}

impl ScratchFile {
    /// Creates an anonymous scratch file in the system temp directory.
    ///
    /// # Errors
    ///
    /// - `std::io::Error` if the temporary file cannot be created.
    pub fn new() -> std::io::Result<Self> {
        Ok(Self::from_file(tempfile::tempfile()?))
    }

    /// Creates an anonymous scratch file inside `dir`.
    ///
    /// # Errors
    ///
    /// - `std::io::Error` if `dir` is not writable.
    pub fn new_in(dir: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        Ok(Self::from_file(tempfile::tempfile_in(dir)?))
    }

    fn from_file(file: std::fs::File) -> Self {
        Self {
            file,
            end: std::cell::Cell::new(0),
        }
    }

    /// Number of bytes ever appended, including abandoned ones.
    #[inline]
    #[must_use]
    pub fn len(&self) -> u64 {
        self.end.get()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends `bytes` at the end cursor and returns the offset they start at.
    ///
    /// On failure the cursor still moves past anything that reached the file,
    /// so a later append never lands on top of a half-written record.
    ///
    /// # Errors
    ///
    /// - `std::io::Error` if seeking or writing fails (disk full, closed handle).
    pub fn append(&self, bytes: &[u8]) -> std::io::Result<u64> {
        let start = self.end.get();
        let mut file = &self.file;

        file.seek(std::io::SeekFrom::Start(start))?;

        let mut written = 0usize;

        while written < bytes.len() {
            match file.write(&bytes[written..]) {
                Ok(0) => {
                    self.abandon(start, written);

                    return Err(std::io::Error::new(
                        std::io::ErrorKind::WriteZero,
                        "scratch file refused further bytes",
                    ));
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => {
                    self.abandon(start, written);

                    return Err(e);
                }
            }
        }

        self.end.set(start + bytes.len() as u64);

        Ok(start)
    }

    fn abandon(&self, start: u64, written: usize) {
        if written > 0 {
            tracing::warn!(start, written, "abandoning partially written scratch bytes");
            self.end.set(start + written as u64);
        }
    }

    /// Fills `buf` from `offset`.
    ///
    /// # Errors
    ///
    /// - `UnexpectedEof` if the range reaches past the end cursor.
    /// - `std::io::Error` if seeking or reading fails.
    pub fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
        let in_bounds = offset
            .checked_add(buf.len() as u64)
            .is_some_and(|end| end <= self.end.get());

        if !in_bounds {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "scratch range {offset}+{} is past the end ({})",
                    buf.len(),
                    self.end.get()
                ),
            ));
        }

        let mut file = &self.file;

        file.seek(std::io::SeekFrom::Start(offset))?;
        file.read_exact(buf)
    }
}
