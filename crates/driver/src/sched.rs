//! The main loop: one tick at a time, strictly ordered.
//!
//! Per tick: poll sockets, hand each connection's next input line to its
//! redirect or the command queue, fire due alarms (stable order), fire
//! heart-beats, run one queued command per interactive object, run the
//! periodic reset/clean-up passes, write the transaction log, and drain
//! the destruct queue last. All script execution happens synchronously
//! inside these steps.

use crate::db;
use crate::driver::Driver;
use crate::interp;
use crate::driver::unix_now;
use cinder_core::{ObjRef, Value};
use std::collections::HashSet;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

/// Idle sleep between ticks.
const TICK_SLEEP_MS: u64 = 100;

/// Input text handed to scripts follows the empty-string convention.
fn line_value(s: &str) -> Value {
    if s.is_empty() {
        Value::Int(0)
    } else {
        Value::str(s)
    }
}

impl Driver {
    /// Run until shutdown; returns the exit code.
    pub fn run(&mut self) -> i32 {
        info!("entering main loop");
        loop {
            self.tick();
            if let Some(code) = self.shutdown {
                info!(code, "shutting down");
                let save = self.config.save_db.clone();
                if let Err(e) = db::save_snapshot(self, &save) {
                    error!(error = %e, "final snapshot failed");
                }
                let _ = std::fs::remove_file(&self.config.transact_log);
                return code;
            }
            thread::sleep(Duration::from_millis(TICK_SLEEP_MS));
        }
    }

    pub fn tick(&mut self) {
        self.now = unix_now();

        // 1. network events
        let fresh = self.conns.poll_accept(self.now);
        for idx in fresh {
            self.greet_connection(idx);
        }
        let mssp = self.mssp.clone();
        self.conns.poll_io(self.now, &mssp);
        for (_, obj) in self.conns.reap() {
            if let Some(obj) = obj.filter(|o| self.objects.is_live(*o)) {
                if let Some(o) = self.objects.get_mut(obj) {
                    o.conn = None;
                    o.interactive = false;
                }
                interp::call_named(self, obj, "disconnect", Vec::new(), Some(obj), None);
            }
        }

        // 2. one input line per connection
        for idx in self.conns.indexes() {
            let Some(conn) = self.conns.get_mut(idx) else {
                continue;
            };
            let Some(line) = conn.lines.pop_front() else {
                continue;
            };
            let Some(owner) = conn.obj.filter(|o| self.objects.is_live(*o)) else {
                continue;
            };
            self.deliver_input(owner, line);
        }

        // 3. alarms due now, in registration order among equals
        while self
            .alarms
            .first()
            .is_some_and(|alarm| alarm.due <= self.now)
        {
            let alarm = self.alarms.remove(0);
            if self.objects.is_live(alarm.obj) {
                interp::call_named(self, alarm.obj, &alarm.func, Vec::new(), None, None);
            }
        }

        // 4. heart beats
        for r in self.objects.refs() {
            let due = self.objects.get(r).is_some_and(|o| {
                o.heart_beat_interval > 0 && self.now - o.last_heart_beat >= o.heart_beat_interval
            });
            if due {
                if let Some(o) = self.objects.get_mut(r) {
                    o.last_heart_beat = self.now;
                }
                interp::call_named(self, r, "heart_beat", Vec::new(), None, None);
            }
        }

        // 5. one queued command per interactive object
        let mut ran: HashSet<ObjRef> = HashSet::new();
        let mut deferred = std::collections::VecDeque::new();
        while let Some(cmd) = self.commands.pop_front() {
            if ran.contains(&cmd.obj) {
                deferred.push_back(cmd);
                continue;
            }
            ran.insert(cmd.obj);
            if self.objects.is_live(cmd.obj) {
                self.run_command(cmd.obj, &cmd.line);
            }
        }
        self.commands = deferred;

        // 6. periodic passes
        if self.now - self.last_reset >= self.config.reset_interval {
            self.last_reset = self.now;
            self.reset_pass();
        }
        if self.now - self.last_cleanup >= self.config.cleanup_interval {
            self.last_cleanup = self.now;
            self.cleanup_pass();
        }

        // transaction log; an oversized log forces a snapshot
        let log_path = self.config.transact_log.clone();
        match db::append_transactions(self, &log_path) {
            Ok(size) if size > self.config.transact_log_limit => {
                self.save_requested = true;
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "transaction log write failed"),
        }
        if self.panic_requested {
            self.panic_requested = false;
            let path = self.config.panic_db.clone();
            if let Err(e) = db::save_snapshot(self, &path) {
                error!(error = %e, "panic snapshot failed");
            }
            self.shutdown = Some(1);
        }
        if self.save_requested {
            self.save_requested = false;
            let path = self.config.save_db.clone();
            match db::save_snapshot(self, &path) {
                Ok(()) => {
                    let _ = std::fs::remove_file(&self.config.transact_log);
                }
                Err(e) => error!(error = %e, "snapshot failed"),
            }
        }

        // 7. destructs, strictly after everything else
        self.process_destructs();

        self.conns.flush_tick();
    }

    /// A fresh connection is attached to the boot object, which is
    /// expected to clone a login object and transfer the device.
    fn greet_connection(&mut self, idx: usize) {
        let Some(boot) = self.boot else {
            self.conns.close(idx);
            return;
        };
        self.attach_device(idx, boot);
        interp::call_named(self, boot, "connect", Vec::new(), None, None);
        // the script normally reconnects the device away from boot; a
        // device still on boot means login setup failed
        if self.conns.get(idx).is_some_and(|c| c.obj == Some(boot)) {
            warn!("boot object kept the connection; closing it");
            if let Some(o) = self.objects.get_mut(boot) {
                o.conn = None;
                o.interactive = false;
            }
            self.conns.close(idx);
        }
    }

    /// Route one line of input: a pending redirect wins over the command
    /// queue; `input_to` diversions are consumed, sticky redirects stay.
    pub fn deliver_input(&mut self, owner: ObjRef, line: String) {
        let redirect = self
            .objects
            .get(owner)
            .and_then(|o| o.input_redirect.clone());
        match redirect {
            Some(r) => {
                if !r.sticky
                    && let Some(o) = self.objects.get_mut(owner)
                {
                    o.input_redirect = None;
                }
                if self.objects.is_live(r.target) {
                    interp::call_named(
                        self,
                        r.target,
                        &r.func,
                        vec![line_value(&line)],
                        Some(owner),
                        None,
                    );
                }
            }
            None => self.queue_command(owner, &line),
        }
    }

    /// Parse a typed line into verb and argument, find a handler, run it.
    /// Search order: the typing object, its inventory, its location, then
    /// siblings in the same container. A sibling with the local-verbs
    /// flag keeps its verbs to its own contents and is skipped.
    pub fn run_command(&mut self, obj: ObjRef, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((w, r)) => (w, r.trim_start()),
            None => (line, ""),
        };

        let mut candidates: Vec<ObjRef> = vec![obj];
        let mut cursor = self.objects.get(obj).and_then(|o| o.contents);
        while let Some(c) = cursor {
            candidates.push(c);
            cursor = self.objects.get(c).and_then(|o| o.next_object);
        }
        if let Some(location) = self.objects.get(obj).and_then(|o| o.location) {
            candidates.push(location);
            let mut cursor = self.objects.get(location).and_then(|o| o.contents);
            while let Some(c) = cursor {
                if c != obj && !self.objects.get(c).is_some_and(|o| o.local_verbs) {
                    candidates.push(c);
                }
                cursor = self.objects.get(c).and_then(|o| o.next_object);
            }
        }

        for candidate in candidates {
            let Some(hit) = self.objects.get(candidate).and_then(|o| {
                o.verbs
                    .iter()
                    .find(|v| {
                        if v.xverb {
                            word.starts_with(&v.name)
                        } else {
                            v.name == word
                        }
                    })
                    .map(|v| (v.func.clone(), v.xverb, v.name.clone()))
            }) else {
                continue;
            };
            let (func, xverb, verb_name) = hit;
            // an xverb hands the unmatched tail of the word plus the
            // rest of the line to its handler
            let arg = if xverb {
                let tail = &word[verb_name.len()..];
                if tail.is_empty() {
                    rest.to_string()
                } else if rest.is_empty() {
                    tail.to_string()
                } else {
                    format!("{tail} {rest}")
                }
            } else {
                rest.to_string()
            };
            interp::call_named(
                self,
                candidate,
                &func,
                vec![line_value(&arg)],
                Some(obj),
                Some(obj),
            );
            return;
        }
        // no verb matched; offer the object's own fallback, if any
        interp::call_named(
            self,
            obj,
            "unknown_command",
            vec![line_value(line)],
            Some(obj),
            None,
        );
    }

    fn reset_pass(&mut self) {
        let mut count = 0;
        for r in self.objects.refs() {
            if self.exempt_from_lifecycle(r) {
                continue;
            }
            if interp::call_named(self, r, "reset", Vec::new(), None, None).is_some() {
                count += 1;
            }
        }
        info!(count, "reset pass complete");
    }

    fn cleanup_pass(&mut self) {
        let mut offered = 0;
        let mut condemned = 0;
        for r in self.objects.refs() {
            if self.exempt_from_lifecycle(r) {
                continue;
            }
            let eligible = self.objects.get(r).is_some_and(|o| {
                o.location.is_none() && self.now - o.last_access >= self.config.cleanup_idle
            });
            if !eligible || self.contains_interactive(r) {
                continue;
            }
            let refs = self.count_references(r);
            let verdict =
                interp::call_named(self, r, "clean_up", vec![Value::Int(refs)], None, None);
            if verdict.is_some() {
                offered += 1;
            }
            if verdict.is_some_and(|v| v == Value::Int(1)) {
                self.queue_destruct(r);
                condemned += 1;
            }
        }
        info!(offered, condemned, "clean_up pass complete");
    }

    fn exempt_from_lifecycle(&self, r: ObjRef) -> bool {
        Some(r) == self.boot
            || Some(r) == self.auto
            || self.objects.get(r).is_none_or(|o| o.is_prototype)
    }

    fn contains_interactive(&self, r: ObjRef) -> bool {
        let mut cursor = self.objects.get(r).and_then(|o| o.contents);
        while let Some(c) = cursor {
            if self.objects.get(c).is_some_and(|o| o.interactive) {
                return true;
            }
            cursor = self.objects.get(c).and_then(|o| o.next_object);
        }
        false
    }

    /// How many global slots across the world still point at `target`.
    /// Containers are scanned a few levels deep; this feeds clean_up's
    /// refcount argument, nothing else.
    fn count_references(&self, target: ObjRef) -> i64 {
        fn scan(value: &Value, target: ObjRef, depth: usize) -> i64 {
            match value {
                Value::Object(r) if *r == target => 1,
                Value::Array(a) if depth > 0 => a
                    .borrow()
                    .elems
                    .iter()
                    .map(|v| scan(v, target, depth - 1))
                    .sum(),
                Value::Mapping(m) if depth > 0 => m
                    .borrow()
                    .entries
                    .values()
                    .map(|v| scan(v, target, depth - 1))
                    .sum(),
                _ => 0,
            }
        }
        self.objects
            .iter()
            .filter(|(r, _)| *r != target)
            .flat_map(|(_, o)| o.globals.iter())
            .map(|v| scan(v, target, 4))
            .sum()
    }

    /// Drain the destruct queue. Destruction during destruction only
    /// extends the queue, so this loops until it is empty.
    pub fn process_destructs(&mut self) {
        let mut guard = 0usize;
        while !self.destruct_queue.is_empty() {
            guard += 1;
            if guard > 10_000 {
                error!("destruct queue did not drain; giving up this tick");
                return;
            }
            let queue = std::mem::take(&mut self.destruct_queue);
            for obj in queue {
                self.destroy_object(obj);
            }
        }
    }

    fn destroy_object(&mut self, obj: ObjRef) {
        if !self.objects.is_live(obj) {
            return;
        }
        // spill contents into the container's own location (or nowhere)
        let spill_to = self.objects.get(obj).and_then(|o| o.location);
        let mut contents = Vec::new();
        let mut cursor = self.objects.get(obj).and_then(|o| o.contents);
        while let Some(c) = cursor {
            contents.push(c);
            cursor = self.objects.get(c).and_then(|o| o.next_object);
        }
        for c in contents {
            self.unlink_from_container(c);
            if let Some(dest) = spill_to {
                self.move_object(c, dest);
            }
        }
        self.unlink_from_container(obj);
        self.disconnect_device(obj);
        self.remove_alarm(obj, None);
        self.commands.retain(|c| c.obj != obj);

        // a destroyed prototype releases its registry entry; clones of
        // it keep their program
        let path = self.objects.get(obj).map(|o| o.program.path.to_string());
        if let Some(path) = path
            && self.protos.get(&path).is_some_and(|e| e.proto_obj == obj)
        {
            self.protos.remove(&path);
        }
        if self.boot == Some(obj) {
            self.boot = None;
        }
        if self.auto == Some(obj) {
            self.auto = None;
        }
        // releasing drops the globals vector; refcounted arrays and
        // mappings free recursively as handles reach zero
        self.objects.release(obj);
    }
}
