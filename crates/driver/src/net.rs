//! Connection handling: one non-blocking listener, a registry of client
//! sockets, per-connection buffers and telnet state.
//!
//! Everything is polled from the tick loop; nothing blocks. Reads go
//! through the telnet state machine and accumulate into complete lines
//! (CR+LF or LF delimited); writes drain in bursts so one chatty object
//! cannot stall the tick.

use crate::driver::{Driver, unix_now};
use crate::telnet::{Telnet, mssp_reply};
use cinder_core::ObjRef;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use tracing::{debug, info};

/// Output buffered per connection is capped; overflow is dropped.
const MAX_OUTBUF: usize = 16_359;
/// Bytes written per connection per flush pass.
const WRITE_BURST: usize = 4096;

pub struct Conn {
    stream: TcpStream,
    pub peer: SocketAddr,
    pub telnet: Telnet,
    inbuf: Vec<u8>,
    pub lines: VecDeque<String>,
    outbuf: Vec<u8>,
    /// Object whose input handler owns this device.
    pub obj: Option<ObjRef>,
    pub conn_time: i64,
    pub last_input: i64,
    pub dead: bool,
}

impl Conn {
    fn new(stream: TcpStream, peer: SocketAddr, now: i64) -> Conn {
        Conn {
            stream,
            peer,
            telnet: Telnet::new(),
            inbuf: Vec::new(),
            lines: VecDeque::new(),
            outbuf: Vec::new(),
            obj: None,
            conn_time: now,
            last_input: now,
            dead: false,
        }
    }
}

#[derive(Default)]
pub struct Connections {
    listener: Option<TcpListener>,
    slots: Vec<Option<Conn>>,
    max: usize,
}

impl Connections {
    pub fn new(max: usize) -> Connections {
        Connections {
            listener: None,
            slots: Vec::new(),
            max,
        }
    }

    pub fn listen(&mut self, port: u16) -> io::Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        listener.set_nonblocking(true)?;
        info!(port = listener.local_addr().map(|a| a.port()).unwrap_or(port), "listening");
        self.listener = Some(listener);
        Ok(())
    }

    /// The bound port, once listening (port 0 asks the OS to pick).
    pub fn local_port(&self) -> Option<u16> {
        self.listener
            .as_ref()
            .and_then(|l| l.local_addr().ok())
            .map(|a| a.port())
    }

    pub fn get(&self, idx: usize) -> Option<&Conn> {
        self.slots.get(idx).and_then(|c| c.as_ref())
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut Conn> {
        self.slots.get_mut(idx).and_then(|c| c.as_mut())
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Conn)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().map(|c| (i, c)))
    }

    pub fn indexes(&self) -> Vec<usize> {
        self.iter().map(|(i, _)| i).collect()
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }

    /// Accept pending connections; returns the new slot indexes.
    pub fn poll_accept(&mut self, now: i64) -> Vec<usize> {
        let mut fresh = Vec::new();
        let Some(listener) = &self.listener else {
            return fresh;
        };
        loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    if self.count() >= self.max {
                        debug!(%peer, "connection refused: at capacity");
                        drop(stream);
                        continue;
                    }
                    if stream.set_nonblocking(true).is_err() {
                        continue;
                    }
                    let mut conn = Conn::new(stream, peer, now);
                    Telnet::greet(&mut conn.outbuf);
                    info!(%peer, "connected");
                    let idx = self
                        .slots
                        .iter()
                        .position(|c| c.is_none())
                        .unwrap_or_else(|| {
                            self.slots.push(None);
                            self.slots.len() - 1
                        });
                    self.slots[idx] = Some(conn);
                    fresh.push(idx);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    debug!(error = %e, "accept failed");
                    break;
                }
            }
        }
        fresh
    }

    /// Read every socket, assemble lines, answer MSSP requests from the
    /// driver's table.
    pub fn poll_io(&mut self, now: i64, mssp: &[(String, String)]) {
        let mut buf = [0u8; 2048];
        for slot in &mut self.slots {
            let Some(conn) = slot else { continue };
            if conn.dead {
                continue;
            }
            loop {
                match conn.stream.read(&mut buf) {
                    Ok(0) => {
                        conn.dead = true;
                        break;
                    }
                    Ok(n) => {
                        for &byte in &buf[..n] {
                            if let Some(data) = conn.telnet.feed(byte, &mut conn.outbuf) {
                                match data {
                                    b'\n' => {
                                        let text =
                                            String::from_utf8_lossy(&conn.inbuf).into_owned();
                                        conn.inbuf.clear();
                                        conn.lines.push_back(text);
                                        conn.last_input = now;
                                    }
                                    b'\r' => {}
                                    other => conn.inbuf.push(other),
                                }
                            }
                        }
                        if conn.telnet.mssp_requested {
                            conn.telnet.mssp_requested = false;
                            conn.outbuf.extend_from_slice(&mssp_reply(mssp));
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(_) => {
                        conn.dead = true;
                        break;
                    }
                }
            }
        }
    }

    pub fn send(&mut self, idx: usize, bytes: &[u8]) {
        if let Some(conn) = self.get_mut(idx) {
            let room = MAX_OUTBUF.saturating_sub(conn.outbuf.len());
            conn.outbuf.extend_from_slice(&bytes[..bytes.len().min(room)]);
        }
    }

    /// One burst of writes per connection.
    pub fn flush_tick(&mut self) {
        for slot in &mut self.slots {
            let Some(conn) = slot else { continue };
            flush_some(conn, WRITE_BURST);
        }
    }

    /// Drain one connection completely (the flush_device efun).
    pub fn flush_all(&mut self, idx: usize) {
        if let Some(conn) = self.get_mut(idx) {
            flush_some(conn, usize::MAX);
        }
    }

    /// Remove connections that died; returns their former objects.
    pub fn reap(&mut self) -> Vec<(usize, Option<ObjRef>)> {
        let mut gone = Vec::new();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.as_ref().is_some_and(|c| c.dead) {
                let conn = slot.take().unwrap();
                info!(peer = %conn.peer, "disconnected");
                gone.push((i, conn.obj));
            }
        }
        gone
    }

    pub fn close(&mut self, idx: usize) {
        if let Some(conn) = self.get_mut(idx) {
            flush_some(conn, usize::MAX);
            conn.dead = true;
        }
    }
}

fn flush_some(conn: &mut Conn, limit: usize) {
    let mut written = 0;
    while written < limit && !conn.outbuf.is_empty() {
        let n = conn.outbuf.len().min(limit - written).min(WRITE_BURST);
        match conn.stream.write(&conn.outbuf[..n]) {
            Ok(0) => {
                conn.dead = true;
                return;
            }
            Ok(n) => {
                conn.outbuf.drain(..n);
                written += n;
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => {
                conn.dead = true;
                return;
            }
        }
    }
}

// Device-facing helpers on the driver: scripts name objects, the
// connection table speaks slot indexes.
impl Driver {
    pub fn conn_of(&self, obj: ObjRef) -> Option<usize> {
        self.objects.get(obj).and_then(|o| o.conn)
    }

    pub fn send_to_object(&mut self, obj: ObjRef, text: &str) {
        if let Some(idx) = self.conn_of(obj) {
            self.conns.send(idx, text.as_bytes());
        }
    }

    /// Attach a connection to an object (both directions).
    pub fn attach_device(&mut self, idx: usize, obj: ObjRef) {
        if let Some(old) = self.conns.get(idx).and_then(|c| c.obj)
            && let Some(o) = self.objects.get_mut(old)
        {
            o.conn = None;
            o.interactive = false;
        }
        if let Some(conn) = self.conns.get_mut(idx) {
            conn.obj = Some(obj);
        }
        if let Some(o) = self.objects.get_mut(obj) {
            o.conn = Some(idx);
            o.interactive = true;
        }
    }

    /// Move the device from one object to another. Fails when the source
    /// has no device or the destination already has one.
    pub fn reconnect_device(&mut self, src: ObjRef, dst: ObjRef) -> bool {
        let Some(idx) = self.conn_of(src) else {
            return false;
        };
        if self.conn_of(dst).is_some() || !self.objects.is_live(dst) {
            return false;
        }
        self.attach_device(idx, dst);
        true
    }

    /// Flush and drop an object's device. The object stays alive.
    pub fn disconnect_device(&mut self, obj: ObjRef) {
        if let Some(idx) = self.conn_of(obj) {
            self.conns.close(idx);
            if let Some(conn) = self.conns.get_mut(idx) {
                conn.obj = None;
            }
        }
        if let Some(o) = self.objects.get_mut(obj) {
            o.conn = None;
            o.interactive = false;
        }
    }

    pub fn device_idle(&self, obj: ObjRef) -> i64 {
        self.conn_of(obj)
            .and_then(|i| self.conns.get(i))
            .map(|c| unix_now() - c.last_input)
            .unwrap_or(-1)
    }

    pub fn device_conntime(&self, obj: ObjRef) -> i64 {
        self.conn_of(obj)
            .and_then(|i| self.conns.get(i))
            .map(|c| unix_now() - c.conn_time)
            .unwrap_or(-1)
    }
}
