use std::io;
use std::os::unix::io::AsRawFd;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use parley_io::{Error, Interest, SocketMessage, Triggers};

#[test]
fn external_close_latches_pollnval_error() {
    let _ = env_logger::try_init();

    let triggers = Triggers::new();
    let (a, _b) = triggers.pair(libc::AF_UNIX, libc::SOCK_STREAM, 0).unwrap();

    let (done, rx) = mpsc::channel::<io::Result<(usize, SocketMessage)>>();
    a.recvmsg(SocketMessage::from(vec![0u8; 4]), 0)
        .unwrap()
        .submit(done);

    // Close the descriptor out from under the handle, as a user who cast
    // the dialog down to the raw fd could.
    unsafe { libc::close(a.as_raw_fd()) };

    let error = loop {
        triggers
            .wait_for(Some(Duration::from_millis(100)))
            .unwrap();

        match rx.try_recv() {
            Ok(Err(e)) => break e,
            Ok(Ok(_)) => panic!("expected an error completion"),
            Err(_) => {}
        }
    };

    // The poll saw POLLNVAL, latched a non-zero error on the handle, and
    // the parked operation completed with it.
    assert_ne!(error.raw_os_error().unwrap_or(0), 0);
    assert!(a.socket().error().is_some());
}

#[test]
fn latched_error_completes_before_any_syscall() {
    let triggers = Triggers::new();
    let (a, _b) = triggers.pair(libc::AF_UNIX, libc::SOCK_STREAM, 0).unwrap();

    a.socket().set_error(libc::ECONNRESET);

    let (done, rx) = mpsc::channel();
    a.recvmsg(SocketMessage::from(vec![0u8; 4]), 0)
        .unwrap()
        .submit(done);

    // The completion is synchronous: start() observes the latched error.
    let error = rx.try_recv().unwrap().unwrap_err();
    assert_eq!(error.raw_os_error(), Some(libc::ECONNRESET));
}

#[test]
fn would_block_retry_is_reparked_not_lost() {
    let triggers = Triggers::new();
    let (a, _b) = triggers.pair(libc::AF_UNIX, libc::SOCK_STREAM, 0).unwrap();
    let executor = triggers.executor().upgrade().unwrap();

    let mut attempts = 0;
    let (done, rx) = mpsc::channel();
    executor
        .set(Arc::clone(a.socket()), Interest::writable(), move || {
            attempts += 1;
            if attempts < 3 {
                Err(io::Error::from(io::ErrorKind::WouldBlock))
            } else {
                Ok(attempts)
            }
        })
        .submit(done);

    let mut cycles = 0;
    let attempts = loop {
        triggers
            .wait_for(Some(Duration::from_millis(100)))
            .unwrap();
        cycles += 1;

        if let Ok(result) = rx.try_recv() {
            break result.unwrap();
        }

        assert!(cycles < 10, "re-parked operation was lost");
    };

    assert_eq!(attempts, 3);
}

#[test]
fn dead_executor_fails_synchronously() {
    let dialog = {
        let triggers = Triggers::new();
        let (a, _b) = triggers.pair(libc::AF_UNIX, libc::SOCK_STREAM, 0).unwrap();
        a
    };

    assert!(!dialog.is_valid());

    match dialog.accept() {
        Err(Error::InvalidExecutor) => {}
        _ => panic!("expected InvalidExecutor"),
    }
}
