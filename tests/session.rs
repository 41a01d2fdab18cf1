//! Loopback tests for TelnetSession

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use tnfilter::core::events::{ResizeEvent, TelnetEvent};
use tnfilter::core::filter::ReadStatus;
use tnfilter::core::handshake::{handshake_bytes, HandshakeOptions};
use tnfilter::core::session::{SessionOptions, TelnetSession};

const IAC: u8 = 0xFF;
const SB: u8 = 0xFA;
const SE: u8 = 0xF0;
const WILL: u8 = 0xFB;
const NAWS: u8 = 0x1F;

fn accept_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let client = TcpStream::connect(addr).unwrap();
    let (server, _) = listener.accept().unwrap();
    client
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    (server, client)
}

fn read_exact_from(client: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    client.read_exact(&mut buf).unwrap();
    buf
}

#[test]
fn handshake_then_filtered_input() {
    let (server, mut client) = accept_pair();
    let mut session = TelnetSession::start(1, server, &SessionOptions::default()).unwrap();

    let expected = handshake_bytes(&HandshakeOptions::default());
    assert_eq!(read_exact_from(&mut client, expected.len()), expected);

    // Peer agrees to NAWS, reports 80x24 split across two writes, then types
    client.write_all(&[IAC, WILL, NAWS, IAC, SB, NAWS, 0x00]).unwrap();
    client.flush().unwrap();
    thread::sleep(Duration::from_millis(50));
    client
        .write_all(&[0x50, 0x00, 0x18, IAC, SE, b'h', b'i', IAC, IAC])
        .unwrap();
    client.shutdown(std::net::Shutdown::Write).unwrap();

    let mut data = Vec::new();
    let mut events = Vec::new();
    let mut buf = [0u8; 64];
    loop {
        let n = session.read_blocking(&mut buf).unwrap();
        events.extend(session.take_events());
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }

    assert_eq!(data, vec![b'h', b'i', IAC]);
    let resizes: Vec<ResizeEvent> = events
        .into_iter()
        .filter_map(|e| match e {
            TelnetEvent::Resize(r) => Some(r),
            _ => None,
        })
        .collect();
    assert_eq!(resizes, vec![ResizeEvent { columns: 80, rows: 24 }]);
}

#[test]
fn output_is_iac_escaped() {
    let (server, mut client) = accept_pair();
    let options = SessionOptions {
        handshake: HandshakeOptions {
            echo_off: false,
            line_mode: false,
            window_size: false,
        },
        ..SessionOptions::default()
    };
    let mut session = TelnetSession::start(2, server, &options).unwrap();

    session.write(&[b'a', IAC, b'b']).unwrap();
    assert_eq!(read_exact_from(&mut client, 4), vec![b'a', IAC, IAC, b'b']);
}

#[test]
fn shutdown_handle_unblocks_reader() {
    let (server, _client) = accept_pair();
    let mut session = TelnetSession::start(3, server, &SessionOptions::default()).unwrap();
    let handle = session.shutdown_handle();

    let closer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        handle.shutdown().unwrap();
        // Second close is a no-op
        handle.shutdown().unwrap();
    });

    let mut buf = [0u8; 16];
    assert_eq!(session.read_blocking(&mut buf).unwrap(), 0);
    closer.join().unwrap();

    assert!(session.is_closed());
    assert_eq!(session.read_blocking(&mut buf).unwrap(), 0);
    assert_eq!(session.read(&mut buf).unwrap(), ReadStatus::Eof);
}

#[test]
fn close_is_idempotent() {
    let (server, mut client) = accept_pair();
    let mut session = TelnetSession::start(4, server, &SessionOptions::default()).unwrap();
    session.close().unwrap();
    session.close().unwrap();

    let mut buf = [0u8; 16];
    assert_eq!(session.read_blocking(&mut buf).unwrap(), 0);

    // Client sees the handshake, then end-of-stream
    let mut rest = Vec::new();
    client.read_to_end(&mut rest).unwrap();
    assert_eq!(rest, handshake_bytes(&HandshakeOptions::default()));
}

fn poll_read(session: &mut TelnetSession, buf: &mut [u8]) -> ReadStatus {
    for _ in 0..100 {
        match session.read(buf).unwrap() {
            ReadStatus::Data(0) => thread::sleep(Duration::from_millis(10)),
            other => return other,
        }
    }
    ReadStatus::Data(0)
}

#[test]
fn non_blocking_read_on_live_socket() {
    let (server, mut client) = accept_pair();
    let mut session = TelnetSession::start(5, server, &SessionOptions::default()).unwrap();
    let mut buf = [0u8; 16];

    // Nothing sent yet
    assert_eq!(session.read(&mut buf).unwrap(), ReadStatus::Data(0));
    assert_eq!(session.available_hint().unwrap(), 0);

    client.write_all(b"hi").unwrap();
    assert_eq!(poll_read(&mut session, &mut buf), ReadStatus::Data(2));
    assert_eq!(&buf[..2], b"hi");

    client.shutdown(std::net::Shutdown::Write).unwrap();
    assert_eq!(poll_read(&mut session, &mut buf), ReadStatus::Eof);
}

#[test]
fn readiness_check_leaves_socket_blocking() {
    let (server, mut client) = accept_pair();
    let mut session = TelnetSession::start(6, server, &SessionOptions::default()).unwrap();
    let mut buf = [0u8; 16];

    assert_eq!(session.read(&mut buf).unwrap(), ReadStatus::Data(0));
    assert_eq!(session.available_hint().unwrap(), 0);

    let writer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        client.write_all(b"ok").unwrap();
        client
    });

    // Would fail with WouldBlock if the peek had left the socket non-blocking
    assert_eq!(session.read_blocking(&mut buf).unwrap(), 2);
    assert_eq!(&buf[..2], b"ok");
    drop(writer.join().unwrap());
}
