use thiserror::Error;

/// Stable, public error surface. Internal recursive control-flow signals
/// (split-page, empty-page) never reach here — see `engine::InsertOutcome`
/// and `engine::RemoveOutcome`.
#[derive(Debug, Error)]
pub enum BpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to open backing file: {0}")]
    File(String),

    #[error("short read at offset {offset}: expected {expected} bytes, file is {filesize} bytes")]
    FileReadOob { offset: u64, expected: u64, filesize: u64 },

    #[error("positional read failed: {0}")]
    FileRead(String),

    #[error("append write failed: {0}")]
    FileWrite(String),

    #[error("rename during compaction failed: {0}")]
    FileRename(String),

    #[error("compaction target already exists: {0}")]
    CompactExists(String),

    #[error("compression failed: {0}")]
    Comp(String),

    #[error("decompression failed: {0}")]
    Decomp(String),

    #[error("key not found")]
    NotFound,
}

pub type Result<T> = std::result::Result<T, BpError>;
