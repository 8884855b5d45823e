use std::{fmt, ops};

/// A set of readiness directions an operation waits on.
///
/// `Interest` tells the multiplexer which poll events must fire before a
/// parked operation is worth retrying. Values combine with the bitwise or
/// operator.
///
/// # Examples
///
/// ```
/// use parley_io::Interest;
///
/// let interest = Interest::readable() | Interest::writable();
///
/// assert!(interest.is_readable());
/// assert!(interest.is_writable());
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Interest(u8);

const READABLE: u8 = 0b01;
const WRITABLE: u8 = 0b10;

impl Interest {
    /// Returns an `Interest` for read readiness.
    #[inline]
    pub fn readable() -> Interest {
        Interest(READABLE)
    }

    /// Returns an `Interest` for write readiness.
    #[inline]
    pub fn writable() -> Interest {
        Interest(WRITABLE)
    }

    #[inline]
    pub fn is_readable(self) -> bool {
        self.0 & READABLE != 0
    }

    #[inline]
    pub fn is_writable(self) -> bool {
        self.0 & WRITABLE != 0
    }

    /// The poll event mask this interest arms.
    pub(crate) fn to_poll_events(self) -> libc::c_short {
        let mut events = 0;

        if self.is_readable() {
            events |= libc::POLLIN;
        }

        if self.is_writable() {
            events |= libc::POLLOUT;
        }

        events
    }
}

impl ops::BitOr for Interest {
    type Output = Interest;

    #[inline]
    fn bitor(self, other: Interest) -> Interest {
        Interest(self.0 | other.0)
    }
}

impl ops::BitOrAssign for Interest {
    #[inline]
    fn bitor_assign(&mut self, other: Interest) {
        self.0 |= other.0;
    }
}

impl fmt::Debug for Interest {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let mut one = false;
        let flags = [(Interest(READABLE), "Readable"), (Interest(WRITABLE), "Writable")];

        for (flag, msg) in flags {
            if self.0 & flag.0 != 0 {
                if one {
                    write!(fmt, " | ")?
                }
                write!(fmt, "{}", msg)?;
                one = true;
            }
        }

        if !one {
            fmt.write_str("(empty)")?;
        }

        Ok(())
    }
}
