use std::marker::PhantomData;
use std::os::unix::io::RawFd;
use std::sync::{mpsc, Arc};
use std::{fmt, io};

use crate::handle::SocketHandle;
use crate::interest::Interest;
use crate::poll::Multiplexer;

/// The completion side of an asynchronous operation.
///
/// Exactly one of [`set_value`] or [`set_error`] is invoked, exactly once,
/// when the operation completes. Both consume the receiver.
///
/// [`set_value`]: Receiver::set_value
/// [`set_error`]: Receiver::set_error
pub trait Receiver: Send {
    type Value;

    fn set_value(self, value: Self::Value);

    fn set_error(self, error: io::Error);
}

/// Channels make natural receivers: the completion is delivered as a
/// `Result` and picked up whenever the driving loop gets around to it.
impl<T: Send> Receiver for mpsc::Sender<io::Result<T>> {
    type Value = T;

    fn set_value(self, value: T) {
        let _ = self.send(Ok(value));
    }

    fn set_error(self, error: io::Error) {
        let _ = self.send(Err(error));
    }
}

/// Adapts a `FnOnce(io::Result<T>)` callback into a [`Receiver`].
pub struct FnReceiver<V, F> {
    func: F,
    _value: PhantomData<fn(V)>,
}

impl<V, F> FnReceiver<V, F>
where
    F: FnOnce(io::Result<V>) + Send,
{
    pub fn new(func: F) -> FnReceiver<V, F> {
        FnReceiver {
            func,
            _value: PhantomData,
        }
    }
}

impl<V, F> Receiver for FnReceiver<V, F>
where
    F: FnOnce(io::Result<V>) + Send,
{
    type Value = V;

    fn set_value(self, value: V) {
        (self.func)(Ok(value));
    }

    fn set_error(self, error: io::Error) {
        (self.func)(Err(error));
    }
}

/// The dispatch outcome of one parked task.
pub(crate) enum Dispatch {
    /// The task delivered its completion signal and is finished.
    Completed,
    /// The retry closure would block; the task goes back on its queue.
    Park(Box<dyn Task>),
}

/// A parked operation, type-erased for queue storage.
///
/// The box is the task node: its address is stable from the moment the
/// operation is parked until it completes, and ownership moves between the
/// multiplexer queue and the dispatcher, never back to the code that
/// created it.
pub(crate) trait Task: Send {
    fn run(self: Box<Self>) -> Dispatch;

    fn fd(&self) -> RawFd;

    fn socket(&self) -> &Arc<SocketHandle>;

    fn interest(&self) -> Interest;
}

/// A pending asynchronous operation, not yet linked to a receiver.
///
/// A sender captures the socket, the readiness direction, and the retry
/// closure that performs the actual syscall. Constructing one has no side
/// effects; [`connect`] links it into the multiplexer's interest list and
/// [`Operation::start`] parks it.
///
/// The retry closure reports its outcome through `io::Result`:
/// `Ok(v)` completes the operation with `v`, [`WouldBlock`] (or
/// [`Interrupted`]) re-parks it until the next readiness event, and any
/// other error completes the operation with that error.
///
/// [`connect`]: Sender::connect
/// [`WouldBlock`]: io::ErrorKind::WouldBlock
/// [`Interrupted`]: io::ErrorKind::Interrupted
pub struct Sender<F> {
    mux: Multiplexer,
    socket: Arc<SocketHandle>,
    fd: RawFd,
    interest: Interest,
    func: F,
}

impl<T, F> Sender<F>
where
    F: FnMut() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    pub(crate) fn new(
        mux: Multiplexer,
        socket: Arc<SocketHandle>,
        interest: Interest,
        func: F,
    ) -> Sender<F> {
        let fd = socket.raw();
        Sender {
            mux,
            socket,
            fd,
            interest,
            func,
        }
    }

    /// The socket this sender will operate on.
    pub fn socket(&self) -> &Arc<SocketHandle> {
        &self.socket
    }

    /// Links the sender to a receiver, producing a startable operation.
    ///
    /// Unless the socket already carries a latched error, the fd's poll
    /// event is inserted into (or merged with) the multiplexer's interest
    /// list here, so the operation is observable to `wait_for` from this
    /// point on.
    pub fn connect<R>(self, receiver: R) -> Operation<F, R>
    where
        R: Receiver<Value = T> + 'static,
    {
        if self.socket.error().is_none() {
            self.mux.register_interest(self.fd, self.interest);
        }

        Operation {
            mux: self.mux,
            socket: self.socket,
            fd: self.fd,
            interest: self.interest,
            func: self.func,
            receiver,
        }
    }

    /// Connects and starts in one step.
    pub fn submit<R>(self, receiver: R)
    where
        R: Receiver<Value = T> + 'static,
    {
        self.connect(receiver).start();
    }
}

impl<F> fmt::Debug for Sender<F> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("Sender")
            .field("fd", &self.fd)
            .field("interest", &self.interest)
            .finish()
    }
}

/// A connected operation, ready to start.
pub struct Operation<F, R> {
    mux: Multiplexer,
    socket: Arc<SocketHandle>,
    fd: RawFd,
    interest: Interest,
    func: F,
    receiver: R,
}

impl<T, F, R> Operation<F, R>
where
    F: FnMut() -> io::Result<T> + Send + 'static,
    R: Receiver<Value = T> + 'static,
    T: Send + 'static,
{
    /// Parks the operation on the multiplexer.
    ///
    /// If the socket already carries a latched error the operation
    /// completes immediately with it and no syscall is ever attempted.
    /// Otherwise the operation suspends until `wait_for` dispatches a
    /// readiness event for its descriptor.
    pub fn start(self) {
        if let Some(error) = self.socket.error() {
            return self.receiver.set_error(io::Error::from_raw_os_error(error));
        }

        let mux = self.mux.clone();
        mux.park(Box::new(self));
    }
}

impl<T, F, R> Task for Operation<F, R>
where
    F: FnMut() -> io::Result<T> + Send + 'static,
    R: Receiver<Value = T> + 'static,
    T: Send + 'static,
{
    fn run(mut self: Box<Self>) -> Dispatch {
        if let Some(error) = self.socket.error() {
            let this = *self;
            this.receiver
                .set_error(io::Error::from_raw_os_error(error));
            return Dispatch::Completed;
        }

        match (self.func)() {
            Ok(value) => {
                let this = *self;
                this.receiver.set_value(value);
                Dispatch::Completed
            }
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::Interrupted =>
            {
                Dispatch::Park(self)
            }
            Err(e) => {
                let this = *self;
                this.receiver.set_error(e);
                Dispatch::Completed
            }
        }
    }

    fn fd(&self) -> RawFd {
        self.fd
    }

    fn socket(&self) -> &Arc<SocketHandle> {
        &self.socket
    }

    fn interest(&self) -> Interest {
        self.interest
    }
}
