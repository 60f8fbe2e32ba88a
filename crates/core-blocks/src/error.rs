//! Error taxonomy shared by blocks, the region manager, and waits.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum BlocksError {
    /// Operation on an already closed block or region manager.
    #[error("block or region already closed")]
    Closed,
    /// Flush requested on a block that was never registered with a manager.
    #[error("block not assigned to a region manager")]
    NotAssigned,
    /// Block registered twice.
    #[error("block already assigned to a region manager")]
    AlreadyAssigned,
    /// The context passed to a wait was canceled.
    #[error("context canceled")]
    Canceled,
    /// The context passed to a wait reached its deadline.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
    /// Writing a paint pass to the output failed.
    #[error("output write failed: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, BlocksError>;

impl BlocksError {
    /// Recover a `BlocksError` carried inside an `io::Error` produced by the
    /// `io::Write` implementation of a block.
    pub fn from_io(err: &io::Error) -> Option<&BlocksError> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<BlocksError>())
    }
}

impl From<BlocksError> for io::Error {
    fn from(err: BlocksError) -> Self {
        match err {
            BlocksError::Io(inner) => inner,
            other => io::Error::other(other),
        }
    }
}
