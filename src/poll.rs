use std::collections::VecDeque;
use std::os::unix::io::RawFd;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use std::{io, mem};

use indexmap::IndexMap;
use log::{debug, trace};

use crate::handle::SocketHandle;
use crate::interest::Interest;
use crate::operation::{Dispatch, Sender, Task};
use crate::sys::socket as sys;

const ERROR_EVENTS: libc::c_short = libc::POLLERR | libc::POLLNVAL;
const READ_EVENTS: libc::c_short = libc::POLLIN | libc::POLLHUP;

/// Per-descriptor operation queues.
///
/// Tasks wait in FIFO order; `socket` tracks the handle of whichever task
/// parked most recently, so that a socket-level error observed by the poll
/// can be latched even before the tasks are dispatched.
#[derive(Default)]
struct Demux {
    read_queue: VecDeque<Box<dyn Task>>,
    write_queue: VecDeque<Box<dyn Task>>,
    socket: Weak<SocketHandle>,
}

struct Inner {
    /// The interest list handed to `poll(2)`, kept sorted ascending by fd.
    /// Each entry's mask is the union of the directions awaited by the
    /// tasks parked on the matching `Demux`.
    interest: Vec<libc::pollfd>,
    demux: IndexMap<RawFd, Demux>,
}

/// A readiness multiplexer over `poll(2)`.
///
/// The multiplexer keeps one sorted poll-event list and, per descriptor, a
/// pair of FIFO queues of parked operations. [`set`] builds senders that
/// park themselves here; [`wait_for`] runs one poll cycle and dispatches
/// whatever became ready.
///
/// A single mutex guards the interest list and the queues. The intended
/// usage is one driving thread per multiplexer; the locking makes enqueue
/// from other threads safe, but dispatch happens only inside [`wait_for`].
///
/// Cloning a multiplexer is cheap and clones share the same interest list
/// and queues; every sender keeps a clone, so parked operations hold the
/// state alive however the executor itself fares.
///
/// [`set`]: Multiplexer::set
/// [`wait_for`]: Multiplexer::wait_for
#[derive(Clone)]
pub struct Multiplexer {
    inner: Arc<Mutex<Inner>>,
}

impl Multiplexer {
    pub fn new() -> Multiplexer {
        Multiplexer {
            inner: Arc::new(Mutex::new(Inner {
                interest: Vec::new(),
                demux: IndexMap::new(),
            })),
        }
    }

    /// Builds a sender that completes when `socket` is ready in the
    /// `interest` direction and `func` stops reporting `WouldBlock`.
    ///
    /// Construction is pure: nothing is registered until the sender is
    /// connected to a receiver.
    pub fn set<T, F>(&self, socket: Arc<SocketHandle>, interest: Interest, func: F) -> Sender<F>
    where
        F: FnMut() -> io::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        Sender::new(self.clone(), socket, interest, func)
    }

    /// Inserts or merges a poll event for `fd` into the sorted interest
    /// list.
    pub(crate) fn register_interest(&self, fd: RawFd, interest: Interest) {
        let mut inner = self.inner.lock().unwrap();
        insert_or_merge(&mut inner.interest, fd, interest.to_poll_events());
    }

    /// Parks a task on its descriptor's queue, re-arming the interest mask.
    ///
    /// Write-direction tasks go on the write queue, everything else on the
    /// read queue.
    pub(crate) fn park(&self, task: Box<dyn Task>) {
        let mut inner = self.inner.lock().unwrap();
        let inner = &mut *inner;

        let fd = task.fd();
        insert_or_merge(&mut inner.interest, fd, task.interest().to_poll_events());

        let demux = inner.demux.entry(fd).or_default();
        demux.socket = Arc::downgrade(task.socket());

        if task.interest().is_writable() {
            demux.write_queue.push_back(task);
        } else {
            demux.read_queue.push_back(task);
        }
    }

    /// Runs one poll cycle: snapshot the armed interest entries, wait for
    /// readiness, clear the reported directions, detach the ready queues,
    /// and dispatch them outside the lock.
    ///
    /// Returns the number of descriptors that reported any event. An empty
    /// interest list returns `Ok(0)` without sleeping; a timeout expiry
    /// returns `Ok(0)` and leaves every parked operation parked.
    pub fn wait_for(&self, timeout: Option<Duration>) -> io::Result<usize> {
        let mut events: Vec<libc::pollfd> = {
            let inner = self.inner.lock().unwrap();
            inner
                .interest
                .iter()
                .filter(|event| event.events != 0)
                .copied()
                .collect()
        };

        if events.is_empty() {
            return Ok(0);
        }

        trace!("polling {} descriptors", events.len());
        sys::poll(&mut events, timeout)?;

        events.retain(|event| event.revents != 0);

        let ready = {
            let mut inner = self.inner.lock().unwrap();
            let inner = &mut *inner;

            for event in &events {
                if let Ok(pos) = inner
                    .interest
                    .binary_search_by_key(&event.fd, |entry| entry.fd)
                {
                    let entry = &mut inner.interest[pos];
                    if event.revents & ERROR_EVENTS != 0 {
                        entry.events = 0;
                    }
                    entry.events &= !event.revents;
                }
            }

            let mut ready: Vec<VecDeque<Box<dyn Task>>> = Vec::with_capacity(2 * events.len());
            for event in &events {
                if let Some(demux) = inner.demux.get_mut(&event.fd) {
                    gather(event, demux, &mut ready);
                }
            }
            ready
        };

        for mut queue in ready {
            while let Some(task) = queue.pop_front() {
                match task.run() {
                    Dispatch::Completed => {}
                    Dispatch::Park(task) => self.park(task),
                }
            }
        }

        Ok(events.len())
    }

    #[cfg(test)]
    fn interest_snapshot(&self) -> Vec<(RawFd, libc::c_short)> {
        let inner = self.inner.lock().unwrap();
        inner
            .interest
            .iter()
            .map(|event| (event.fd, event.events))
            .collect()
    }
}

impl Default for Multiplexer {
    fn default() -> Multiplexer {
        Multiplexer::new()
    }
}

fn insert_or_merge(list: &mut Vec<libc::pollfd>, fd: RawFd, events: libc::c_short) {
    match list.binary_search_by_key(&fd, |event| event.fd) {
        Ok(pos) => list[pos].events |= events,
        Err(pos) => list.insert(
            pos,
            libc::pollfd {
                fd,
                events,
                revents: 0,
            },
        ),
    }
}

/// Detaches the queues a readiness report makes runnable.
///
/// An error condition latches `SO_ERROR` on the owning socket first, then
/// drains both queues; otherwise `POLLOUT` drains the write queue and
/// `POLLIN`/`POLLHUP` the read queue. The write queue goes first.
fn gather(event: &libc::pollfd, demux: &mut Demux, ready: &mut Vec<VecDeque<Box<dyn Task>>>) {
    let revents = event.revents;

    if revents & ERROR_EVENTS != 0 {
        if let Some(socket) = demux.socket.upgrade() {
            let error = sys::pending_error(event.fd);
            debug!("latching error {} on fd {}", error, event.fd);
            socket.set_error(error);
        }
    }

    if revents & (libc::POLLOUT | ERROR_EVENTS) != 0 && !demux.write_queue.is_empty() {
        ready.push(mem::take(&mut demux.write_queue));
    }

    if revents & (READ_EVENTS | ERROR_EVENTS) != 0 && !demux.read_queue.is_empty() {
        ready.push(mem::take(&mut demux.read_queue));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interest_list_stays_sorted_and_merged() {
        let mux = Multiplexer::new();

        mux.register_interest(9, Interest::readable());
        mux.register_interest(3, Interest::writable());
        mux.register_interest(9, Interest::writable());
        mux.register_interest(5, Interest::readable());
        mux.register_interest(3, Interest::writable());

        let snapshot = mux.interest_snapshot();
        let fds: Vec<RawFd> = snapshot.iter().map(|(fd, _)| *fd).collect();

        assert_eq!(fds, [3, 5, 9]);
        assert_eq!(snapshot[0].1, libc::POLLOUT);
        assert_eq!(snapshot[1].1, libc::POLLIN);
        assert_eq!(snapshot[2].1, libc::POLLIN | libc::POLLOUT);
    }

    #[test]
    fn empty_interest_list_returns_zero_without_blocking() {
        let mux = Multiplexer::new();
        assert_eq!(mux.wait_for(None).unwrap(), 0);
    }
}
