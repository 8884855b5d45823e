use std::io;

use thiserror::Error;

/// Failures surfaced by the facade API.
///
/// Per-operation failures travel to the operation's [`Receiver`] as plain
/// [`io::Error`] values; this type covers the failures that happen before an
/// operation exists.
///
/// [`Receiver`]: crate::Receiver
#[derive(Debug, Error)]
pub enum Error {
    /// A descriptor handed to [`SocketHandle::from_raw`] did not answer the
    /// `SO_TYPE` probe.
    ///
    /// [`SocketHandle::from_raw`]: crate::SocketHandle::from_raw
    #[error("invalid socket handle")]
    InvalidSocket(#[source] io::Error),

    /// The executor behind a [`SocketDialog`] has been dropped.
    ///
    /// [`SocketDialog`]: crate::SocketDialog
    #[error("executor has been dropped")]
    InvalidExecutor,

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
