use std::io;
use std::net::Shutdown;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use parley_io::{FnReceiver, SocketMessage, Triggers};

fn drive<T>(triggers: &Triggers, rx: &mpsc::Receiver<io::Result<T>>) -> io::Result<T> {
    for _ in 0..100 {
        triggers
            .wait_for(Some(Duration::from_millis(100)))
            .unwrap();

        if let Ok(result) = rx.try_recv() {
            return result;
        }
    }

    panic!("operation did not complete");
}

#[test]
fn unix_socketpair_echo_round_trip() {
    let _ = env_logger::try_init();

    let triggers = Triggers::new();
    let (a, b) = triggers.pair(libc::AF_UNIX, libc::SOCK_STREAM, 0).unwrap();

    let (recv_done, recv_rx) = mpsc::channel();
    a.recvmsg(SocketMessage::from(vec![0u8; 14]), 0)
        .unwrap()
        .submit(recv_done);

    let (send_done, send_rx) = mpsc::channel();
    b.sendmsg(SocketMessage::from(b"Hello, world!\0".to_vec()), 0)
        .unwrap()
        .submit(send_done);

    let (sent, _) = drive(&triggers, &send_rx).unwrap();
    assert_eq!(sent, 14);

    let (received, msg) = drive(&triggers, &recv_rx).unwrap();
    assert_eq!(received, 14);
    assert_eq!(msg.buffers.get(0), Some(&b"Hello, world!\0"[..]));
}

#[test]
fn peer_close_delivers_end_of_stream() {
    let triggers = Triggers::new();
    let (a, b) = triggers.pair(libc::AF_UNIX, libc::SOCK_STREAM, 0).unwrap();

    let (done, rx) = mpsc::channel();
    a.recvmsg(SocketMessage::from(vec![0u8; 8]), 0)
        .unwrap()
        .submit(done);

    // Closing the peer's write side makes the parked receive complete with
    // zero bytes, not with an error.
    b.shutdown(Shutdown::Write).unwrap();

    let (len, _msg) = drive(&triggers, &rx).unwrap();
    assert_eq!(len, 0);
}

#[test]
fn callback_receiver_runs_on_completion() {
    let triggers = Triggers::new();
    let (a, _b) = triggers.pair(libc::AF_UNIX, libc::SOCK_STREAM, 0).unwrap();

    let outcome = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&outcome);

    a.sendmsg(SocketMessage::from(vec![7u8]), 0)
        .unwrap()
        .connect(FnReceiver::new(move |result: io::Result<(usize, SocketMessage)>| {
            *seen.lock().unwrap() = Some(result.map(|(len, _)| len).ok());
        }))
        .start();

    for _ in 0..100 {
        if outcome.lock().unwrap().is_some() {
            break;
        }
        triggers
            .wait_for(Some(Duration::from_millis(100)))
            .unwrap();
    }

    assert_eq!(*outcome.lock().unwrap(), Some(Some(1)));
}

#[test]
fn sends_complete_in_enqueue_order() {
    let triggers = Triggers::new();
    let (a, b) = triggers.pair(libc::AF_UNIX, libc::SOCK_STREAM, 0).unwrap();

    let (done, rx) = mpsc::channel();
    for i in 0..100u8 {
        a.sendmsg(SocketMessage::from(vec![i]), 0)
            .unwrap()
            .submit(done.clone());
    }
    drop(done);

    let mut seen = Vec::new();
    for _ in 0..100 {
        if seen.len() == 100 {
            break;
        }

        triggers
            .wait_for(Some(Duration::from_millis(100)))
            .unwrap();

        while let Ok(result) = rx.try_recv() {
            let (len, msg) = result.unwrap();
            assert_eq!(len, 1);
            seen.push(msg.buffers.get(0).unwrap()[0]);
        }
    }

    assert_eq!(seen, (0..100u8).collect::<Vec<u8>>());
    drop(b);
}
