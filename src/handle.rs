use std::cmp::Ordering;
use std::net::Shutdown;
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicI32, Ordering::Relaxed};
use std::sync::Mutex;
use std::{fmt, io, ptr};

use libc::{c_int, socklen_t};

use crate::addr::SocketAddress;
use crate::error::{Error, Result};
use crate::message::{self, SocketMessage};
use crate::option::SocketOption;
use crate::sys::socket as sys;

/// A thread-safe, move-only RAII wrapper around a native socket descriptor.
///
/// Exactly one live handle owns a given descriptor; dropping the handle
/// closes it exactly once. The descriptor and the latched error slot are
/// atomics, so both can be read without taking the handle's mutex; the
/// mutex serializes close and swap.
///
/// The error slot is how the multiplexer reports socket-level failures it
/// observes out-of-band (`POLLERR`/`POLLNVAL`): the error is latched here
/// and delivered to the next operation started on the socket.
pub struct SocketHandle {
    fd: AtomicI32,
    error: AtomicI32,
    mutex: Mutex<()>,
}

impl SocketHandle {
    /// Creates a new socket with `socket(2)`.
    pub fn new(domain: c_int, ty: c_int, protocol: c_int) -> io::Result<SocketHandle> {
        let fd = sys::socket(domain, ty, protocol)?;
        Ok(SocketHandle::from_owned(fd))
    }

    /// Adopts an existing descriptor, validating it with a
    /// `getsockopt(SO_TYPE)` probe.
    pub fn from_raw(fd: RawFd) -> Result<SocketHandle> {
        if fd == sys::INVALID_SOCKET {
            return Ok(SocketHandle::from_owned(fd));
        }

        match sys::socket_type(fd) {
            Ok(_) => Ok(SocketHandle::from_owned(fd)),
            Err(e) => Err(Error::InvalidSocket(e)),
        }
    }

    /// Creates both ends of a `socketpair(2)`.
    pub fn pair(
        domain: c_int,
        ty: c_int,
        protocol: c_int,
    ) -> io::Result<(SocketHandle, SocketHandle)> {
        let (a, b) = sys::socketpair(domain, ty, protocol)?;
        Ok((SocketHandle::from_owned(a), SocketHandle::from_owned(b)))
    }

    pub(crate) fn from_owned(fd: RawFd) -> SocketHandle {
        SocketHandle {
            fd: AtomicI32::new(fd),
            error: AtomicI32::new(0),
            mutex: Mutex::new(()),
        }
    }

    /// The native descriptor, or the invalid sentinel after close.
    pub fn raw(&self) -> RawFd {
        self.fd.load(Relaxed)
    }

    /// A handle is valid while it owns a live descriptor.
    pub fn is_valid(&self) -> bool {
        self.raw() != sys::INVALID_SOCKET
    }

    /// Latches an asynchronous error on the handle.
    pub fn set_error(&self, error: i32) {
        self.error.store(error, Relaxed);
    }

    /// The latched error, if any.
    pub fn error(&self) -> Option<i32> {
        match self.error.load(Relaxed) {
            0 => None,
            error => Some(error),
        }
    }

    /// Reads and clears the pending socket error (`SO_ERROR`).
    pub fn take_error(&self) -> io::Result<Option<io::Error>> {
        let opt: SocketOption<c_int> = self.getsockopt(libc::SOL_SOCKET, libc::SO_ERROR)?;
        match *opt.value() {
            0 => Ok(None),
            raw => Ok(Some(io::Error::from_raw_os_error(raw))),
        }
    }

    /// Exchanges the descriptors and error slots of two handles.
    ///
    /// Both mutexes are taken in address order so concurrent swaps cannot
    /// deadlock.
    pub fn swap(&self, other: &SocketHandle) {
        if ptr::eq(self, other) {
            return;
        }

        let (first, second) = if (self as *const SocketHandle) < (other as *const SocketHandle) {
            (self, other)
        } else {
            (other, self)
        };

        let _first = first.mutex.lock().unwrap();
        let _second = second.mutex.lock().unwrap();

        let fd = self.fd.swap(other.fd.load(Relaxed), Relaxed);
        other.fd.store(fd, Relaxed);

        let error = self.error.swap(other.error.load(Relaxed), Relaxed);
        other.error.store(error, Relaxed);
    }

    pub fn bind(&self, addr: &SocketAddress) -> io::Result<()> {
        sys::bind(self.raw(), addr.as_ptr(), addr.raw_len())
    }

    pub fn listen(&self, backlog: c_int) -> io::Result<()> {
        sys::listen(self.raw(), backlog)
    }

    pub fn connect(&self, addr: &SocketAddress) -> io::Result<()> {
        sys::connect(self.raw(), addr.as_ptr(), addr.raw_len())
    }

    /// Accepts one pending connection, returning the new handle and the
    /// peer address.
    pub fn accept(&self) -> io::Result<(SocketHandle, SocketAddress)> {
        let mut addr = SocketAddress::default();
        let mut len = addr.raw_len();

        let fd = sys::accept(self.raw(), addr.as_mut_ptr(), &mut len)?;
        addr.set_len(len);

        Ok((SocketHandle::from_owned(fd), addr))
    }

    /// Sends a message, returning the number of bytes transferred.
    pub fn sendmsg(&self, msg: &mut SocketMessage, flags: c_int) -> io::Result<usize> {
        let fd = self.raw();
        message::with_msghdr(msg, |hdr| sys::sendmsg(fd, hdr, flags))
    }

    /// Receives a message, returning the number of bytes transferred. Zero
    /// means end-of-stream on connection-oriented sockets.
    pub fn recvmsg(&self, msg: &mut SocketMessage, flags: c_int) -> io::Result<usize> {
        let fd = self.raw();
        message::with_msghdr(msg, |hdr| sys::recvmsg(fd, hdr, flags))
    }

    pub fn getsockname(&self) -> io::Result<SocketAddress> {
        let mut addr = SocketAddress::default();
        let mut len = addr.raw_len();

        sys::getsockname(self.raw(), addr.as_mut_ptr(), &mut len)?;
        addr.set_len(len);

        Ok(addr)
    }

    pub fn getpeername(&self) -> io::Result<SocketAddress> {
        let mut addr = SocketAddress::default();
        let mut len = addr.raw_len();

        sys::getpeername(self.raw(), addr.as_mut_ptr(), &mut len)?;
        addr.set_len(len);

        Ok(addr)
    }

    pub fn getsockopt<T: Copy>(&self, level: c_int, name: c_int) -> io::Result<SocketOption<T>> {
        let mut opt = SocketOption::<T>::default();
        let mut len = opt.len() as socklen_t;

        sys::getsockopt(self.raw(), level, name, opt.as_mut_ptr() as *mut _, &mut len)?;
        opt.set_len(len);

        Ok(opt)
    }

    pub fn setsockopt<T: Copy>(
        &self,
        level: c_int,
        name: c_int,
        opt: &SocketOption<T>,
    ) -> io::Result<()> {
        sys::setsockopt(
            self.raw(),
            level,
            name,
            opt.as_ptr() as *const _,
            opt.len() as socklen_t,
        )
    }

    pub fn shutdown(&self, how: Shutdown) -> io::Result<()> {
        let how = match how {
            Shutdown::Read => libc::SHUT_RD,
            Shutdown::Write => libc::SHUT_WR,
            Shutdown::Both => libc::SHUT_RDWR,
        };
        sys::shutdown(self.raw(), how)
    }

    pub fn fcntl(&self, cmd: c_int, arg: c_int) -> io::Result<c_int> {
        sys::fcntl(self.raw(), cmd, arg)
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        sys::set_nonblocking(self.raw(), nonblocking)
    }

    fn close(&mut self) {
        let fd = self.fd.swap(sys::INVALID_SOCKET, Relaxed);
        if fd != sys::INVALID_SOCKET {
            let _ = sys::close(fd);
        }
    }
}

impl Drop for SocketHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl AsRawFd for SocketHandle {
    fn as_raw_fd(&self) -> RawFd {
        self.raw()
    }
}

impl PartialEq for SocketHandle {
    fn eq(&self, other: &SocketHandle) -> bool {
        self.raw() == other.raw()
    }
}

impl Eq for SocketHandle {}

impl PartialOrd for SocketHandle {
    fn partial_cmp(&self, other: &SocketHandle) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SocketHandle {
    fn cmp(&self, other: &SocketHandle) -> Ordering {
        self.raw().cmp(&other.raw())
    }
}

impl fmt::Debug for SocketHandle {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("SocketHandle")
            .field("fd", &self.raw())
            .field("error", &self.error.load(Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity_follows_the_sentinel() {
        let (a, b) = SocketHandle::pair(libc::AF_UNIX, libc::SOCK_STREAM, 0).unwrap();

        assert!(a.is_valid());
        assert!(b.is_valid());

        let placeholder = SocketHandle::from_raw(sys::INVALID_SOCKET).unwrap();
        assert!(!placeholder.is_valid());

        a.swap(&placeholder);
        assert!(!a.is_valid());
        assert_eq!(a.raw(), sys::INVALID_SOCKET);
        assert!(placeholder.is_valid());
    }

    #[test]
    fn error_slot_round_trips() {
        let handle = SocketHandle::new(libc::AF_UNIX, libc::SOCK_STREAM, 0).unwrap();

        assert_eq!(handle.error(), None);
        handle.set_error(libc::ECONNRESET);
        assert_eq!(handle.error(), Some(libc::ECONNRESET));
    }

    #[test]
    fn from_raw_rejects_non_sockets() {
        match SocketHandle::from_raw(i32::MAX) {
            Err(Error::InvalidSocket(_)) => {}
            other => panic!("expected InvalidSocket, got {:?}", other.map(|h| h.raw())),
        }
    }

    #[test]
    fn ordering_follows_the_descriptor() {
        let (a, b) = SocketHandle::pair(libc::AF_UNIX, libc::SOCK_STREAM, 0).unwrap();

        if a.raw() < b.raw() {
            assert!(a < b);
        } else {
            assert!(b < a);
        }
        assert_eq!(a, a);
    }

    #[test]
    fn swap_exchanges_descriptor_and_error() {
        let (a, b) = SocketHandle::pair(libc::AF_UNIX, libc::SOCK_STREAM, 0).unwrap();
        let (fd_a, fd_b) = (a.raw(), b.raw());

        a.set_error(libc::EPIPE);
        a.swap(&b);

        assert_eq!(a.raw(), fd_b);
        assert_eq!(b.raw(), fd_a);
        assert_eq!(a.error(), None);
        assert_eq!(b.error(), Some(libc::EPIPE));
    }

    #[test]
    fn take_error_is_none_on_fresh_socket() {
        let handle = SocketHandle::new(libc::AF_UNIX, libc::SOCK_STREAM, 0).unwrap();
        assert!(handle.take_error().unwrap().is_none());
    }
}
