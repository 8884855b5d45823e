use std::collections::{vec_deque, VecDeque};
use std::{fmt, mem, ops};

use crate::addr::SocketAddress;

/// One scatter/gather segment. `start` is the number of bytes already
/// drained from the front.
struct Segment {
    data: Vec<u8>,
    start: usize,
}

impl Segment {
    fn remaining(&self) -> usize {
        self.data.len() - self.start
    }

    fn tail(&self) -> &[u8] {
        &self.data[self.start..]
    }

    fn tail_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.start..]
    }
}

/// An ordered scatter/gather buffer, consumed from the front.
///
/// Segments own their bytes so that a parked operation can carry the buffer
/// across its suspension; the platform `iovec` array is materialized only
/// for the duration of each syscall. `+= n` implements the partial-transfer
/// arithmetic: after a transfer of `n` bytes, the first `n` bytes of the
/// buffer are gone, fully drained segments are dropped, and a partially
/// drained one keeps its tail.
///
/// # Examples
///
/// ```
/// use parley_io::MessageBuffer;
///
/// let mut buffer = MessageBuffer::new();
/// buffer.push_back(b"hello ".to_vec());
/// buffer.push_back(b"world".to_vec());
///
/// buffer += 8;
///
/// assert_eq!(buffer.total_len(), 3);
/// assert_eq!(buffer.iter().next(), Some(&b"rld"[..]));
/// ```
#[derive(Default)]
pub struct MessageBuffer {
    segments: VecDeque<Segment>,
}

impl MessageBuffer {
    pub fn new() -> MessageBuffer {
        MessageBuffer {
            segments: VecDeque::new(),
        }
    }

    /// Appends a segment to the back of the buffer.
    pub fn push_back(&mut self, data: Vec<u8>) {
        self.segments.push_back(Segment { data, start: 0 });
    }

    /// The number of live segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Total remaining bytes across all segments.
    pub fn total_len(&self) -> usize {
        self.segments.iter().map(Segment::remaining).sum()
    }

    /// A buffer is empty when no bytes remain, regardless of how many
    /// segments are still present.
    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }

    /// Iterates over the remaining bytes of each segment.
    pub fn iter(&self) -> BufferViews<'_> {
        BufferViews {
            inner: self.segments.iter(),
        }
    }

    /// The remaining bytes of the `index`-th segment.
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.segments.get(index).map(Segment::tail)
    }

    pub(crate) fn fill_iovecs(&mut self, iov: &mut Vec<libc::iovec>) {
        for segment in self.segments.iter_mut() {
            let tail = segment.tail_mut();
            iov.push(libc::iovec {
                iov_base: tail.as_mut_ptr() as *mut libc::c_void,
                iov_len: tail.len(),
            });
        }
    }
}

impl ops::AddAssign<usize> for MessageBuffer {
    /// Drains `len` bytes from the front of the buffer.
    ///
    /// Advancing past the total leaves the buffer empty; advancing by
    /// exactly the total drops every segment.
    fn add_assign(&mut self, mut len: usize) {
        while let Some(front) = self.segments.front_mut() {
            let remaining = front.remaining();
            if len < remaining {
                front.start += len;
                return;
            }

            len -= remaining;
            self.segments.pop_front();
        }
    }
}

impl From<Vec<u8>> for MessageBuffer {
    fn from(data: Vec<u8>) -> MessageBuffer {
        let mut buffer = MessageBuffer::new();
        buffer.push_back(data);
        buffer
    }
}

impl fmt::Debug for MessageBuffer {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("MessageBuffer")
            .field("segments", &self.len())
            .field("total_len", &self.total_len())
            .finish()
    }
}

/// Iterator over the remaining byte span of each segment in a
/// [`MessageBuffer`].
///
/// Each item is a freshly borrowed view; the iterator holds no state beyond
/// its position.
pub struct BufferViews<'a> {
    inner: vec_deque::Iter<'a, Segment>,
}

impl<'a> Iterator for BufferViews<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        self.inner.next().map(Segment::tail)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a> DoubleEndedIterator for BufferViews<'a> {
    fn next_back(&mut self) -> Option<&'a [u8]> {
        self.inner.next_back().map(Segment::tail)
    }
}

impl<'a> ExactSizeIterator for BufferViews<'a> {}

/// A complete socket message: optional peer address, scatter/gather
/// buffers, ancillary data, and flags.
///
/// All fields are public; the message converts to a platform `msghdr` for
/// the duration of a `sendmsg`/`recvmsg` call. For receives, leave
/// `address` as a default [`SocketAddress`] to capture the sender, or
/// `None` to discard it.
#[derive(Debug, Default)]
pub struct SocketMessage {
    pub address: Option<SocketAddress>,
    pub buffers: MessageBuffer,
    pub control: Vec<u8>,
    pub flags: libc::c_int,
}

impl SocketMessage {
    pub fn new() -> SocketMessage {
        SocketMessage::default()
    }
}

impl From<Vec<u8>> for SocketMessage {
    fn from(data: Vec<u8>) -> SocketMessage {
        SocketMessage {
            buffers: MessageBuffer::from(data),
            ..SocketMessage::default()
        }
    }
}

/// Runs `f` with a `msghdr` view of the message, then writes the
/// kernel-reported name length and flags back into the owned storage.
pub(crate) fn with_msghdr<R>(
    msg: &mut SocketMessage,
    f: impl FnOnce(&mut libc::msghdr) -> R,
) -> R {
    let mut iov: Vec<libc::iovec> = Vec::with_capacity(msg.buffers.len());
    msg.buffers.fill_iovecs(&mut iov);

    let mut hdr: libc::msghdr = unsafe { mem::zeroed() };

    if let Some(addr) = msg.address.as_mut() {
        hdr.msg_name = addr.as_mut_ptr() as *mut libc::c_void;
        hdr.msg_namelen = addr.raw_len();
    }

    hdr.msg_iov = iov.as_mut_ptr();
    hdr.msg_iovlen = iov.len() as _;

    if !msg.control.is_empty() {
        hdr.msg_control = msg.control.as_mut_ptr() as *mut _;
        hdr.msg_controllen = msg.control.len() as _;
    }

    hdr.msg_flags = msg.flags;

    let ret = f(&mut hdr);

    if let Some(addr) = msg.address.as_mut() {
        addr.set_len(hdr.msg_namelen);
    }
    msg.flags = hdr.msg_flags;

    ret
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_drains_front_to_back() {
        let mut buffer = MessageBuffer::new();
        buffer.push_back(vec![1, 2, 3]);
        buffer.push_back(vec![4, 5]);

        buffer += 1;
        assert_eq!(buffer.total_len(), 4);
        assert_eq!(buffer.get(0), Some(&[2, 3][..]));

        buffer += 3;
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.get(0), Some(&[5][..]));
    }

    #[test]
    fn advance_by_total_drops_all_segments() {
        let mut buffer = MessageBuffer::new();
        buffer.push_back(vec![0; 7]);
        buffer.push_back(vec![0; 3]);

        buffer += 10;

        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn advance_past_total_leaves_empty() {
        let mut buffer = MessageBuffer::from(vec![0; 4]);

        buffer += 100;

        assert!(buffer.is_empty());
        assert_eq!(buffer.total_len(), 0);
    }

    #[test]
    fn push_then_advance_by_size_yields_empty() {
        let data = b"hello".to_vec();
        let mut buffer = MessageBuffer::new();
        buffer.push_back(data);

        buffer += 5;

        assert!(buffer.is_empty());
    }

    #[test]
    fn emptiness_counts_bytes_not_segments() {
        let mut buffer = MessageBuffer::new();
        buffer.push_back(Vec::new());

        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn views_are_remaining_spans() {
        let mut buffer = MessageBuffer::new();
        buffer.push_back(b"abc".to_vec());
        buffer.push_back(b"defg".to_vec());
        buffer += 2;

        let views: Vec<&[u8]> = buffer.iter().collect();
        assert_eq!(views, [&b"c"[..], &b"defg"[..]]);
        assert_eq!(buffer.iter().len(), 2);
        assert_eq!(buffer.iter().next_back(), Some(&b"defg"[..]));
    }

    #[test]
    fn msghdr_points_at_segment_tails() {
        let mut msg = SocketMessage::from(b"abcdef".to_vec());
        msg.buffers += 2;

        with_msghdr(&mut msg, |hdr| {
            assert_eq!(hdr.msg_iovlen as usize, 1);
            assert!(hdr.msg_name.is_null());
            assert!(hdr.msg_control.is_null());
            let iov = unsafe { *hdr.msg_iov };
            assert_eq!(iov.iov_len, 4);
        });
    }
}
