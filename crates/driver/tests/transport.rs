//! Loopback transport tests: real sockets, the telnet machine, and line
//! assembly, without a full world.

use cinder_driver::net::Connections;
use cinder_driver::telnet::{DO, IAC, OPT_NAWS, OPT_TTYPE, SB, SE, WILL};
use serial_test::serial;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

fn connect(conns: &mut Connections) -> (TcpStream, usize) {
    let port = conns.local_port().unwrap();
    let client = TcpStream::connect(("127.0.0.1", port)).unwrap();
    client.set_nodelay(true).ok();
    // accept can need a few polls on a slow runner
    for _ in 0..50 {
        let fresh = conns.poll_accept(0);
        if let Some(idx) = fresh.first() {
            return (client, *idx);
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("connection never arrived");
}

fn pump(conns: &mut Connections, rounds: usize) {
    for _ in 0..rounds {
        conns.poll_io(0, &[]);
        conns.flush_tick();
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
#[serial]
fn greeting_offers_options_and_lines_assemble() {
    let mut conns = Connections::new(4);
    conns.listen(0).unwrap();
    let (mut client, idx) = connect(&mut conns);

    pump(&mut conns, 3);
    client
        .set_read_timeout(Some(Duration::from_millis(500)))
        .unwrap();
    let mut greeting = [0u8; 64];
    let n = client.read(&mut greeting).unwrap();
    let greeting = &greeting[..n];
    assert!(greeting.windows(3).any(|w| w == [IAC, DO, OPT_TTYPE]));
    assert!(greeting.windows(3).any(|w| w == [IAC, DO, OPT_NAWS]));

    client.write_all(b"look\r\nsay hi\n").unwrap();
    pump(&mut conns, 3);
    let conn = conns.get_mut(idx).unwrap();
    assert_eq!(conn.lines.pop_front().as_deref(), Some("look"));
    assert_eq!(conn.lines.pop_front().as_deref(), Some("say hi"));
    assert!(conn.lines.is_empty());
}

#[test]
#[serial]
fn naws_negotiation_reaches_the_connection_state() {
    let mut conns = Connections::new(4);
    conns.listen(0).unwrap();
    let (mut client, idx) = connect(&mut conns);

    client.write_all(&[IAC, WILL, OPT_NAWS]).unwrap();
    client
        .write_all(&[IAC, SB, OPT_NAWS, 0, 132, 0, 50, IAC, SE])
        .unwrap();
    pump(&mut conns, 3);

    let conn = conns.get(idx).unwrap();
    assert!(conn.telnet.naws);
    assert_eq!(conn.telnet.width, 132);
    assert_eq!(conn.telnet.height, 50);
}

#[test]
#[serial]
fn disconnects_are_reaped() {
    let mut conns = Connections::new(4);
    conns.listen(0).unwrap();
    let (client, idx) = connect(&mut conns);
    assert_eq!(conns.count(), 1);
    drop(client);
    pump(&mut conns, 5);
    let gone = conns.reap();
    assert_eq!(gone.len(), 1);
    assert_eq!(gone[0].0, idx);
    assert_eq!(conns.count(), 0);
}

#[test]
#[serial]
fn output_is_buffered_and_flushed() {
    let mut conns = Connections::new(4);
    conns.listen(0).unwrap();
    let (mut client, idx) = connect(&mut conns);
    pump(&mut conns, 2);
    // drain the greeting first
    client
        .set_read_timeout(Some(Duration::from_millis(500)))
        .unwrap();
    let mut sink = [0u8; 64];
    let _ = client.read(&mut sink);

    conns.send(idx, b"Welcome, traveller.\n");
    pump(&mut conns, 3);
    let mut buf = [0u8; 64];
    let n = client.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"Welcome, traveller.\n");
}
