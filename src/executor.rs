use std::io;
use std::sync::Arc;
use std::time::Duration;

use crate::handle::SocketHandle;
use crate::interest::Interest;
use crate::operation::Sender;
use crate::poll::Multiplexer;

/// Owns a multiplexer and prepares sockets for asynchronous use.
///
/// Dialogs hold this by weak reference; every sender it issues holds the
/// multiplexer by shared reference, so in-flight operations stay safe even
/// after the executor itself goes away.
pub struct Executor {
    mux: Multiplexer,
}

impl Executor {
    pub fn new() -> Executor {
        Executor {
            mux: Multiplexer::new(),
        }
    }

    /// Builds a sender for a readiness-gated operation on `socket`.
    ///
    /// See [`Multiplexer::set`] for the retry-closure contract.
    pub fn set<T, F>(&self, socket: Arc<SocketHandle>, interest: Interest, func: F) -> Sender<F>
    where
        F: FnMut() -> io::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.mux.set(socket, interest, func)
    }

    /// Takes ownership of a handle, switches it to non-blocking mode, and
    /// shares it.
    pub fn adopt(&self, socket: SocketHandle) -> io::Result<Arc<SocketHandle>> {
        socket.set_nonblocking(true)?;
        Ok(Arc::new(socket))
    }

    /// Runs one poll cycle. See [`Multiplexer::wait_for`].
    pub fn wait_for(&self, timeout: Option<Duration>) -> io::Result<usize> {
        self.mux.wait_for(timeout)
    }

    /// Runs one poll cycle with no timeout.
    pub fn wait(&self) -> io::Result<usize> {
        self.mux.wait_for(None)
    }
}

impl Default for Executor {
    fn default() -> Executor {
        Executor::new()
    }
}
