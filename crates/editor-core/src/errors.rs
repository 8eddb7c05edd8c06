pub type ChainResult<T> = Result<T, ChainError>;

#[derive(thiserror::Error, Debug)]
pub enum ChainError {
    /// The caller handed over something the chain cannot represent.
    /// Nothing was mutated.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The line lies past the end of the document and the operation was not
    /// allowed to extend it. This is an expected outcome, not a failure.
    #[error("line {line} is beyond the end of the document ({line_count} lines)")]
    OutOfRange { line: usize, line_count: usize },

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// A structural invariant no longer holds. Continuing would corrupt the
    /// document.
    #[error("segment chain corrupted: {0}")]
    CorruptChain(String),
}

impl ChainError {
    #[inline]
    #[must_use]
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, ChainError::OutOfRange { .. })
    }
}
