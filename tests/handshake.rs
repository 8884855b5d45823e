use std::io;
use std::net::SocketAddr;
use std::sync::mpsc;
use std::time::Duration;

use parley_io::{SocketAddress, SocketOption, Triggers};

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
fn accept_connect_handshake_over_loopback() {
    let _ = env_logger::try_init();

    let triggers = Triggers::new();

    let listener = triggers
        .emplace(libc::AF_INET, libc::SOCK_STREAM, 0)
        .unwrap();
    listener
        .setsockopt(libc::SOL_SOCKET, libc::SO_REUSEADDR, &SocketOption::new(1i32))
        .unwrap();

    let any: SocketAddr = "127.0.0.1:0".parse().unwrap();
    listener.bind(&SocketAddress::from(any)).unwrap();
    listener.listen(1).unwrap();

    // The kernel picked the port; read it back.
    let local = listener.getsockname().unwrap();
    assert_ne!(local.to_socket_addr().unwrap().port(), 0);

    let (accept_done, accept_rx) = mpsc::channel();
    listener.accept().unwrap().submit(accept_done);

    let client = triggers
        .emplace(libc::AF_INET, libc::SOCK_STREAM, 0)
        .unwrap();

    // The facade switched the socket to non-blocking when it was emplaced.
    let flags = client.fcntl(libc::F_GETFL, 0).unwrap();
    assert_ne!(flags & libc::O_NONBLOCK, 0);

    let (connect_done, connect_rx) = mpsc::channel();
    client.connect(&local).unwrap().submit(connect_done);

    drive(&triggers, &connect_rx).unwrap();
    let (accepted, peer) = drive(&triggers, &accept_rx).unwrap();

    assert!(accepted.is_valid());

    // The peer address reported by accept is the client's local address.
    let client_local = client.getsockname().unwrap();
    assert_eq!(peer.to_socket_addr(), client_local.to_socket_addr());

    // And from the accepted socket's point of view, the same via getpeername.
    assert_eq!(
        accepted.getpeername().unwrap().to_socket_addr(),
        client_local.to_socket_addr()
    );

    let ty: SocketOption<i32> = listener.getsockopt(libc::SOL_SOCKET, libc::SO_TYPE).unwrap();
    assert_eq!(*ty.value(), libc::SOCK_STREAM);
}
