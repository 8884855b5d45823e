use std::net::{self, Ipv4Addr, Ipv6Addr, SocketAddrV4, SocketAddrV6};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::{fmt, io, mem, slice};

use libc::socklen_t;

use crate::option::SocketOption;

/// A platform-independent socket address.
///
/// Storage is a `sockaddr_storage`, sized for the largest address family the
/// platform supports; the logical size tracks the family actually stored. A
/// default-constructed address has its logical size at full capacity, which
/// makes it directly usable as the out-parameter of `recvmsg`,
/// `getsockname`, and friends.
///
/// # Examples
///
/// ```
/// use parley_io::SocketAddress;
///
/// let addr = SocketAddress::from("127.0.0.1:8080".parse::<std::net::SocketAddr>().unwrap());
///
/// assert_eq!(addr.family(), libc::AF_INET as libc::sa_family_t);
/// assert_eq!(addr.to_socket_addr().unwrap().port(), 8080);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct SocketAddress {
    inner: SocketOption<libc::sockaddr_storage>,
}

impl SocketAddress {
    /// Creates a zero-filled address with the given logical size.
    pub fn with_len(len: usize) -> SocketAddress {
        SocketAddress {
            inner: SocketOption::with_len(len),
        }
    }

    /// Copies a raw address representation.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` exceeds the storage capacity.
    pub fn from_bytes(bytes: &[u8]) -> SocketAddress {
        SocketAddress {
            inner: SocketOption::from_bytes(bytes),
        }
    }

    /// Copies a platform address structure, e.g. a `libc::sockaddr_in`.
    pub fn from_sockaddr<T: Copy>(addr: &T) -> SocketAddress {
        let bytes =
            unsafe { slice::from_raw_parts(addr as *const T as *const u8, mem::size_of::<T>()) };
        SocketAddress::from_bytes(bytes)
    }

    /// Builds an `AF_UNIX` address from a filesystem path.
    pub fn unix<P: AsRef<Path>>(path: P) -> io::Result<SocketAddress> {
        let bytes = path.as_ref().as_os_str().as_bytes();

        let mut sun: libc::sockaddr_un = unsafe { mem::zeroed() };
        if bytes.len() >= sun.sun_path.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "path must be shorter than SUN_LEN",
            ));
        }

        sun.sun_family = libc::AF_UNIX as libc::sa_family_t;
        for (dst, src) in sun.sun_path.iter_mut().zip(bytes) {
            *dst = *src as libc::c_char;
        }

        let base = &sun as *const _ as usize;
        let path_offset = &sun.sun_path as *const _ as usize - base;

        let mut addr = SocketAddress::from_sockaddr(&sun);
        addr.inner.set_len((path_offset + bytes.len() + 1) as socklen_t);
        Ok(addr)
    }

    /// The address family of the stored value.
    pub fn family(&self) -> libc::sa_family_t {
        self.inner.value().ss_family
    }

    /// The logical size in bytes.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// The storage capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    /// The logical-size byte prefix of the stored address.
    pub fn as_bytes(&self) -> &[u8] {
        self.inner.as_bytes()
    }

    /// Converts back to a standard library address, when the stored family
    /// has one.
    pub fn to_socket_addr(&self) -> Option<net::SocketAddr> {
        match self.family() as libc::c_int {
            libc::AF_INET if self.len() >= mem::size_of::<libc::sockaddr_in>() => {
                let sin = unsafe { *(self.inner.as_ptr() as *const libc::sockaddr_in) };
                let ip = Ipv4Addr::from(sin.sin_addr.s_addr.to_ne_bytes());
                Some(net::SocketAddr::V4(SocketAddrV4::new(
                    ip,
                    u16::from_be(sin.sin_port),
                )))
            }
            libc::AF_INET6 if self.len() >= mem::size_of::<libc::sockaddr_in6>() => {
                let sin6 = unsafe { *(self.inner.as_ptr() as *const libc::sockaddr_in6) };
                let ip = Ipv6Addr::from(sin6.sin6_addr.s6_addr);
                Some(net::SocketAddr::V6(SocketAddrV6::new(
                    ip,
                    u16::from_be(sin6.sin6_port),
                    sin6.sin6_flowinfo,
                    sin6.sin6_scope_id,
                )))
            }
            _ => None,
        }
    }

    pub(crate) fn as_ptr(&self) -> *const libc::sockaddr {
        self.inner.as_ptr() as *const libc::sockaddr
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut libc::sockaddr {
        self.inner.as_mut_ptr() as *mut libc::sockaddr
    }

    pub(crate) fn raw_len(&self) -> socklen_t {
        self.len() as socklen_t
    }

    pub(crate) fn set_len(&mut self, len: socklen_t) {
        let len = (len as usize).min(self.capacity());
        self.inner.set_len(len as socklen_t);
    }
}

impl From<net::SocketAddr> for SocketAddress {
    fn from(addr: net::SocketAddr) -> SocketAddress {
        match addr {
            net::SocketAddr::V4(v4) => {
                let sin = libc::sockaddr_in {
                    sin_family: libc::AF_INET as libc::sa_family_t,
                    sin_port: v4.port().to_be(),
                    sin_addr: libc::in_addr {
                        s_addr: u32::from_ne_bytes(v4.ip().octets()),
                    },
                    sin_zero: [0; 8],
                };
                SocketAddress::from_sockaddr(&sin)
            }
            net::SocketAddr::V6(v6) => {
                let mut sin6: libc::sockaddr_in6 = unsafe { mem::zeroed() };
                sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
                sin6.sin6_port = v6.port().to_be();
                sin6.sin6_flowinfo = v6.flowinfo();
                sin6.sin6_addr = libc::in6_addr {
                    s6_addr: v6.ip().octets(),
                };
                sin6.sin6_scope_id = v6.scope_id();
                SocketAddress::from_sockaddr(&sin6)
            }
        }
    }
}

impl fmt::Debug for SocketAddress {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self.to_socket_addr() {
            Some(addr) => fmt.debug_tuple("SocketAddress").field(&addr).finish(),
            None => fmt
                .debug_struct("SocketAddress")
                .field("family", &self.family())
                .field("len", &self.len())
                .finish(),
        }
    }
}
