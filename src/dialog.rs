use std::cmp::Ordering;
use std::net::Shutdown;
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::{Arc, Weak};
use std::{fmt, io};

use libc::c_int;

use crate::addr::SocketAddress;
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::handle::SocketHandle;
use crate::interest::Interest;
use crate::message::SocketMessage;
use crate::operation::Sender;
use crate::option::SocketOption;

/// A socket paired with the executor that drives it.
///
/// Dialogs are the target of the asynchronous verbs: each verb resolves the
/// executor (failing with [`Error::InvalidExecutor`] once the executor has
/// been dropped) and returns a [`Sender`] whose retry closure performs the
/// actual syscall when readiness fires. The synchronous verbs forward
/// straight to the handle.
///
/// The dialog holds the executor weakly and the handle strongly; cloning a
/// dialog is cheap and clones share the socket.
#[derive(Clone)]
pub struct SocketDialog {
    pub(crate) executor: Weak<Executor>,
    pub(crate) socket: Arc<SocketHandle>,
}

impl SocketDialog {
    /// The shared socket handle.
    pub fn socket(&self) -> &Arc<SocketHandle> {
        &self.socket
    }

    /// Whether both the executor and the socket are still alive.
    pub fn is_valid(&self) -> bool {
        self.executor.strong_count() > 0 && self.socket.is_valid()
    }

    fn executor(&self) -> Result<Arc<Executor>> {
        self.executor.upgrade().ok_or(Error::InvalidExecutor)
    }

    /// Asynchronously accepts one connection on a listening socket.
    ///
    /// Completes with the accepted handle and the peer address. The
    /// accepted socket is still in blocking mode; push it into a
    /// [`Triggers`] facade to drive it asynchronously.
    ///
    /// [`Triggers`]: crate::Triggers
    pub fn accept(
        &self,
    ) -> Result<Sender<impl FnMut() -> io::Result<(SocketHandle, SocketAddress)> + Send + 'static>>
    {
        let executor = self.executor()?;
        let socket = Arc::clone(&self.socket);

        Ok(executor.set(Arc::clone(&self.socket), Interest::readable(), move || {
            socket.accept()
        }))
    }

    /// Asynchronously connects to a remote address.
    ///
    /// The syscall is issued eagerly; an in-progress indication is expected
    /// on a non-blocking socket and ignored, while any other failure is
    /// latched on the handle and delivered when the operation starts. The
    /// returned sender completes once the socket reports writability.
    pub fn connect(
        &self,
        addr: &SocketAddress,
    ) -> Result<Sender<impl FnMut() -> io::Result<()> + Send + 'static>> {
        let executor = self.executor()?;

        if let Err(e) = self.socket.connect(addr) {
            match e.raw_os_error() {
                Some(libc::EINPROGRESS)
                | Some(libc::EAGAIN)
                | Some(libc::EALREADY)
                | Some(libc::EISCONN) => {}
                Some(code) => self.socket.set_error(code),
                None => self.socket.set_error(libc::EIO),
            }
        }

        Ok(executor.set(Arc::clone(&self.socket), Interest::writable(), || Ok(())))
    }

    /// Asynchronously sends a message.
    ///
    /// The operation owns the message while parked and hands it back in the
    /// completion together with the transferred byte count. On a partial
    /// transfer, advance the buffer (`msg.buffers += n`) and submit another
    /// send.
    pub fn sendmsg(
        &self,
        msg: SocketMessage,
        flags: c_int,
    ) -> Result<Sender<impl FnMut() -> io::Result<(usize, SocketMessage)> + Send + 'static>> {
        let executor = self.executor()?;
        let socket = Arc::clone(&self.socket);
        let mut msg = Some(msg);

        Ok(executor.set(Arc::clone(&self.socket), Interest::writable(), move || {
            let len = match msg.as_mut() {
                Some(m) => socket.sendmsg(m, flags)?,
                None => return Err(io::Error::from_raw_os_error(libc::EINVAL)),
            };

            match msg.take() {
                Some(m) => Ok((len, m)),
                None => Err(io::Error::from_raw_os_error(libc::EINVAL)),
            }
        }))
    }

    /// Asynchronously receives a message.
    ///
    /// Completes with the transferred byte count and the message; a count
    /// of zero is end-of-stream. Leave `msg.address` as a default
    /// [`SocketAddress`] to capture the sender of a datagram.
    pub fn recvmsg(
        &self,
        msg: SocketMessage,
        flags: c_int,
    ) -> Result<Sender<impl FnMut() -> io::Result<(usize, SocketMessage)> + Send + 'static>> {
        let executor = self.executor()?;
        let socket = Arc::clone(&self.socket);
        let mut msg = Some(msg);

        Ok(executor.set(Arc::clone(&self.socket), Interest::readable(), move || {
            let len = match msg.as_mut() {
                Some(m) => socket.recvmsg(m, flags)?,
                None => return Err(io::Error::from_raw_os_error(libc::EINVAL)),
            };

            match msg.take() {
                Some(m) => Ok((len, m)),
                None => Err(io::Error::from_raw_os_error(libc::EINVAL)),
            }
        }))
    }

    pub fn bind(&self, addr: &SocketAddress) -> io::Result<()> {
        self.socket.bind(addr)
    }

    pub fn listen(&self, backlog: c_int) -> io::Result<()> {
        self.socket.listen(backlog)
    }

    pub fn getsockname(&self) -> io::Result<SocketAddress> {
        self.socket.getsockname()
    }

    pub fn getpeername(&self) -> io::Result<SocketAddress> {
        self.socket.getpeername()
    }

    pub fn getsockopt<T: Copy>(&self, level: c_int, name: c_int) -> io::Result<SocketOption<T>> {
        self.socket.getsockopt(level, name)
    }

    pub fn setsockopt<T: Copy>(
        &self,
        level: c_int,
        name: c_int,
        opt: &SocketOption<T>,
    ) -> io::Result<()> {
        self.socket.setsockopt(level, name, opt)
    }

    pub fn shutdown(&self, how: Shutdown) -> io::Result<()> {
        self.socket.shutdown(how)
    }

    pub fn fcntl(&self, cmd: c_int, arg: c_int) -> io::Result<c_int> {
        self.socket.fcntl(cmd, arg)
    }
}

impl AsRawFd for SocketDialog {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.raw()
    }
}

impl PartialEq for SocketDialog {
    fn eq(&self, other: &SocketDialog) -> bool {
        self.socket == other.socket
    }
}

impl Eq for SocketDialog {}

impl PartialOrd for SocketDialog {
    fn partial_cmp(&self, other: &SocketDialog) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SocketDialog {
    fn cmp(&self, other: &SocketDialog) -> Ordering {
        self.socket.cmp(&other.socket)
    }
}

impl PartialEq<SocketHandle> for SocketDialog {
    fn eq(&self, other: &SocketHandle) -> bool {
        *self.socket == *other
    }
}

impl PartialEq<RawFd> for SocketDialog {
    fn eq(&self, other: &RawFd) -> bool {
        self.socket.raw() == *other
    }
}

impl fmt::Debug for SocketDialog {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("SocketDialog")
            .field("fd", &self.socket.raw())
            .field("executor", &self.executor.strong_count())
            .finish()
    }
}
