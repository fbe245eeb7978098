use std::io;
use thiserror::Error;

/// Result type alias for buffer and allocator operations
pub type Result<T> = std::result::Result<T, BufferError>;

#[derive(Debug, Error)]
pub enum BufferError {
    /// The buffer was never acquired, or has been released already.
    #[error("buffer empty")]
    EmptyBuffer,

    #[error("offset {offset} is out of range for a slab of capacity {capacity}")]
    OutOfRange { offset: usize, capacity: usize },

    /// The sink accepted fewer bytes than offered. The drain cursor moved by `written` only.
    #[error("short write: {written} of {offered} bytes accepted")]
    ShortWrite { written: usize, offered: usize },

    #[error("invalid write count: sink reported {reported} bytes for {offered} offered")]
    InvalidWriteCount { reported: usize, offered: usize },

    #[error("invalid read count: source reported {reported} bytes into a {window} bytes window")]
    InvalidReadCount { reported: usize, window: usize },

    #[error("invalid cap size: {capacity}")]
    UnrecognizedCapacity { capacity: usize },

    #[error("in-use buffer is being checked out again")]
    DoubleCheckout,

    #[error("buffer released while not in use")]
    DoubleFree,

    #[error("invalid allocator config: {0}")]
    InvalidConfig(String),

    /// A stream collaborator failed after `transferred` bytes had already moved.
    #[error("I/O error after {transferred} bytes: {source}")]
    Io {
        transferred: u64,
        #[source]
        source: io::Error,
    },
}

impl BufferError {
    pub(crate) fn io(transferred: u64, source: io::Error) -> Self {
        BufferError::Io {
            transferred,
            source,
        }
    }

    /// Bytes moved before the failure, if the error happened in the middle of a transfer.
    pub fn transferred(&self) -> Option<u64> {
        match self {
            BufferError::Io { transferred, .. } => Some(*transferred),
            BufferError::ShortWrite { written, .. } => Some(*written as u64),
            _ => None,
        }
    }
}

impl From<BufferError> for io::Error {
    fn from(err: BufferError) -> Self {
        let kind = match &err {
            BufferError::Io { source, .. } => source.kind(),
            BufferError::ShortWrite { .. } => io::ErrorKind::WriteZero,
            BufferError::OutOfRange { .. } => io::ErrorKind::InvalidInput,
            BufferError::EmptyBuffer => io::ErrorKind::NotConnected,
            _ => io::ErrorKind::InvalidData,
        };

        io::Error::new(kind, err)
    }
}
