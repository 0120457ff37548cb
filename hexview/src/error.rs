use crate::operation::OperationKind;
use hexviewlib::HexViewError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a [`crate::HexSession`] and its background operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    HexView(#[from] HexViewError),

    #[error("HexViewer is already {0}")]
    AlreadyRunning(OperationKind),

    #[error("No operation is running")]
    NoActiveOperation,

    #[error("File is too big to convert ({size_kb} KB, limit is {max_kb} KB)")]
    FileTooLarge { size_kb: u64, max_kb: u64 },

    #[error("Nothing is loaded")]
    NotLoaded,

    #[error("Unknown hash algorithm '{0}'")]
    UnknownAlgorithm(String),

    #[error("Background operation stopped without a result")]
    WorkerLost,

    #[error("Line {0} does not exist")]
    LineOutOfRange(usize),

    #[error("Address 0x{0:08x} is outside of the data")]
    AddressOutOfRange(u64),

    #[error("Directory does not exist: {}", .0.display())]
    MissingDirectory(PathBuf),
}
