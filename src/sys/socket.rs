use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;
use std::{cmp, mem};

use libc::{c_int, c_void, socklen_t};

use super::syscall;

/// The sentinel value of a descriptor slot that holds no socket.
pub const INVALID_SOCKET: RawFd = -1;

pub fn socket(domain: c_int, ty: c_int, protocol: c_int) -> io::Result<RawFd> {
    syscall!(socket(domain, ty, protocol))
}

pub fn socketpair(domain: c_int, ty: c_int, protocol: c_int) -> io::Result<(RawFd, RawFd)> {
    let mut fds = [0, 0];
    syscall!(socketpair(domain, ty, protocol, fds.as_mut_ptr()))?;
    Ok((fds[0], fds[1]))
}

pub fn close(fd: RawFd) -> io::Result<()> {
    syscall!(close(fd)).map(|_| ())
}

pub fn bind(fd: RawFd, addr: *const libc::sockaddr, len: socklen_t) -> io::Result<()> {
    syscall!(bind(fd, addr, len)).map(|_| ())
}

pub fn listen(fd: RawFd, backlog: c_int) -> io::Result<()> {
    syscall!(listen(fd, backlog)).map(|_| ())
}

pub fn connect(fd: RawFd, addr: *const libc::sockaddr, len: socklen_t) -> io::Result<()> {
    syscall!(connect(fd, addr, len)).map(|_| ())
}

pub fn accept(
    fd: RawFd,
    storage: *mut libc::sockaddr,
    len: *mut socklen_t,
) -> io::Result<RawFd> {
    syscall!(accept(fd, storage, len))
}

pub fn sendmsg(fd: RawFd, msg: *const libc::msghdr, flags: c_int) -> io::Result<usize> {
    let len = syscall!(sendmsg(fd, msg, flags))?;
    Ok(len as usize)
}

pub fn recvmsg(fd: RawFd, msg: *mut libc::msghdr, flags: c_int) -> io::Result<usize> {
    let len = syscall!(recvmsg(fd, msg, flags))?;
    Ok(len as usize)
}

pub fn getsockname(
    fd: RawFd,
    storage: *mut libc::sockaddr,
    len: *mut socklen_t,
) -> io::Result<()> {
    syscall!(getsockname(fd, storage, len)).map(|_| ())
}

pub fn getpeername(
    fd: RawFd,
    storage: *mut libc::sockaddr,
    len: *mut socklen_t,
) -> io::Result<()> {
    syscall!(getpeername(fd, storage, len)).map(|_| ())
}

pub fn getsockopt(
    fd: RawFd,
    level: c_int,
    name: c_int,
    value: *mut c_void,
    len: &mut socklen_t,
) -> io::Result<()> {
    syscall!(getsockopt(fd, level, name, value, len)).map(|_| ())
}

pub fn setsockopt(
    fd: RawFd,
    level: c_int,
    name: c_int,
    value: *const c_void,
    len: socklen_t,
) -> io::Result<()> {
    syscall!(setsockopt(fd, level, name, value, len)).map(|_| ())
}

pub fn shutdown(fd: RawFd, how: c_int) -> io::Result<()> {
    syscall!(shutdown(fd, how)).map(|_| ())
}

pub fn fcntl(fd: RawFd, cmd: c_int, arg: c_int) -> io::Result<c_int> {
    syscall!(fcntl(fd, cmd, arg))
}

pub fn set_nonblocking(fd: RawFd, nonblocking: bool) -> io::Result<()> {
    let flags = syscall!(fcntl(fd, libc::F_GETFL))?;
    let flags = if nonblocking {
        flags | libc::O_NONBLOCK
    } else {
        flags & !libc::O_NONBLOCK
    };
    syscall!(fcntl(fd, libc::F_SETFL, flags)).map(|_| ())
}

/// Probes a descriptor with `getsockopt(SO_TYPE)`. A descriptor is adoptable
/// as a socket handle only when the probe answers.
pub fn socket_type(fd: RawFd) -> io::Result<c_int> {
    let mut ty: c_int = 0;
    let mut len = mem::size_of::<c_int>() as socklen_t;
    getsockopt(
        fd,
        libc::SOL_SOCKET,
        libc::SO_TYPE,
        &mut ty as *mut _ as *mut _,
        &mut len,
    )?;
    Ok(ty)
}

/// Reads the pending error on a socket via `SO_ERROR`.
///
/// When the probe itself fails with `EBADF` or `ENOTSOCK` the descriptor has
/// been torn down underneath us, and that errno is the error to report.
pub fn pending_error(fd: RawFd) -> i32 {
    let mut error: c_int = 0;
    let mut len = mem::size_of::<c_int>() as socklen_t;

    match getsockopt(
        fd,
        libc::SOL_SOCKET,
        libc::SO_ERROR,
        &mut error as *mut _ as *mut _,
        &mut len,
    ) {
        Ok(()) => error,
        Err(e) => e.raw_os_error().unwrap_or(libc::EBADF),
    }
}

/// Waits for readiness on a set of poll entries.
///
/// `EINTR` restarts the call; any other failure is returned to the caller.
pub fn poll(fds: &mut [libc::pollfd], timeout: Option<Duration>) -> io::Result<usize> {
    let timeout = timeout
        .map(|to| cmp::min(to.as_millis(), c_int::MAX as u128) as c_int)
        .unwrap_or(-1);

    loop {
        let ret = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout) };
        if ret >= 0 {
            return Ok(ret as usize);
        }

        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}
