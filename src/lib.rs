//! Asynchronous Berkeley-sockets I/O on top of `poll(2)` readiness.
//!
//! This crate composes non-blocking socket operations as *senders* that
//! complete when the kernel reports the descriptor ready, then perform the
//! syscall eagerly and deliver its outcome to a *receiver*. There is no
//! hidden event loop: the application drives a [`Triggers`] facade, and one
//! call to [`Triggers::wait_for`] runs exactly one poll-dispatch cycle.
//!
//! ## Usage
//!
//! First, add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! parley-io = "0.1"
//! ```
//!
//! # Example
//!
//! An echo round-trip over an `AF_UNIX` socketpair:
//!
//! ```
//! use std::sync::mpsc;
//!
//! use parley_io::{SocketMessage, Triggers};
//!
//! fn main() -> parley_io::Result<()> {
//!     let triggers = Triggers::new();
//!     let (a, b) = triggers.pair(libc::AF_UNIX, libc::SOCK_STREAM, 0)?;
//!
//!     // Park a receive on one end, then queue a send on the other. The
//!     // channels collect the completions.
//!     let (recv_tx, recv_rx) = mpsc::channel();
//!     a.recvmsg(SocketMessage::from(vec![0; 16]), 0)?.submit(recv_tx);
//!
//!     let (send_tx, _send_rx) = mpsc::channel();
//!     b.sendmsg(SocketMessage::from(b"ping".to_vec()), 0)?.submit(send_tx);
//!
//!     // Drive the multiplexer until the receive completes.
//!     let (len, msg) = loop {
//!         triggers.wait_for(None)?;
//!         if let Ok(done) = recv_rx.try_recv() {
//!             break done?;
//!         }
//!     };
//!
//!     assert_eq!(len, 4);
//!     assert_eq!(&msg.buffers.get(0).unwrap()[..len], b"ping");
//!     Ok(())
//! }
//! ```

mod addr;
mod dialog;
mod error;
mod executor;
mod handle;
mod interest;
mod message;
mod operation;
mod option;
mod poll;
mod sys;
mod triggers;

pub use addr::SocketAddress;

pub use dialog::SocketDialog;

pub use error::{Error, Result};

pub use executor::Executor;

pub use handle::SocketHandle;

pub use interest::Interest;

pub use message::{BufferViews, MessageBuffer, SocketMessage};

pub use operation::{FnReceiver, Operation, Receiver, Sender};

pub use option::SocketOption;

pub use poll::Multiplexer;

pub use triggers::Triggers;
