pub type DocumentResult<T> = Result<T, DocumentError>;

#[derive(thiserror::Error, Debug)]
pub enum DocumentError {
    #[error(transparent)]
    Chain(#[from] editor_core::errors::ChainError),

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("document has no path; use save_as")]
    NoPath,

    #[error("{} is read-only", .0.display())]
    ReadOnly(std::path::PathBuf),
}
