use std::sync::{Arc, Weak};
use std::time::Duration;

use libc::c_int;

use crate::dialog::SocketDialog;
use crate::error::Result;
use crate::executor::Executor;
use crate::handle::SocketHandle;

/// The entry point of the crate: owns an executor and vends
/// [`SocketDialog`]s bound to it.
///
/// Sockets handed out by the facade are switched to non-blocking mode, so
/// the asynchronous verbs never stall the driving thread. Drop the facade
/// and every dialog's weak executor reference expires; operations already
/// parked keep their shared multiplexer alive until they complete.
pub struct Triggers {
    executor: Arc<Executor>,
}

impl Triggers {
    pub fn new() -> Triggers {
        Triggers {
            executor: Arc::new(Executor::new()),
        }
    }

    /// Adopts an existing handle as a dialog on this executor.
    pub fn push(&self, socket: SocketHandle) -> Result<SocketDialog> {
        let socket = self.executor.adopt(socket)?;
        Ok(SocketDialog {
            executor: Arc::downgrade(&self.executor),
            socket,
        })
    }

    /// Creates a fresh socket and wraps it as a dialog.
    pub fn emplace(&self, domain: c_int, ty: c_int, protocol: c_int) -> Result<SocketDialog> {
        self.push(SocketHandle::new(domain, ty, protocol)?)
    }

    /// Creates both ends of a socketpair as dialogs.
    pub fn pair(
        &self,
        domain: c_int,
        ty: c_int,
        protocol: c_int,
    ) -> Result<(SocketDialog, SocketDialog)> {
        let (a, b) = SocketHandle::pair(domain, ty, protocol)?;
        Ok((self.push(a)?, self.push(b)?))
    }

    /// Runs one poll cycle, dispatching whatever became ready.
    ///
    /// Returns the number of descriptors that reported events; zero on
    /// timeout expiry or when nothing is armed.
    pub fn wait_for(&self, timeout: Option<Duration>) -> Result<usize> {
        Ok(self.executor.wait_for(timeout)?)
    }

    /// Runs one poll cycle with no timeout.
    pub fn wait(&self) -> Result<usize> {
        Ok(self.executor.wait()?)
    }

    /// A weak reference to the executor, for building dialogs by hand.
    pub fn executor(&self) -> Weak<Executor> {
        Arc::downgrade(&self.executor)
    }
}

impl Default for Triggers {
    fn default() -> Triggers {
        Triggers::new()
    }
}
