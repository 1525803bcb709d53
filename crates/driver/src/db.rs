//! Snapshot persistence and the transaction log.
//!
//! A snapshot is a plain-text stream: a header line, then one record per
//! live non-prototype object,
//!
//! ```text
//! /obj/thing#12 {
//! hp = 42;
//! name = "bob";
//! }
//! ```
//!
//! with globals in symbol-table order and values in the `save_value`
//! grammar. Object references inside values are `"path#refno"` strings
//! and are wired back to live objects in a second pass, after every
//! object from the snapshot exists. The transaction log is a sequence of
//! the same records appended for dirty objects between snapshots and
//! replayed over the snapshot at boot.

use crate::driver::Driver;
use crate::interp::RuntimeError;
use crate::serialize;
use cinder_core::{MapKey, ObjRef, Value};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

pub const DB_HEADER: &str = "cinder db format v1";

// ---- writing ----

fn object_record(d: &Driver, obj: ObjRef) -> Option<String> {
    let o = d.objects.get(obj)?;
    let mut out = format!("{}#{} {{\n", o.program.path, o.refno);
    for (name, value) in o.program.global_names.iter().zip(o.globals.iter()) {
        let text = serialize::save_value(d, value).ok()?;
        out.push_str(&format!("{name} = {text};\n"));
    }
    out.push_str("}\n");
    Some(out)
}

/// Write the whole world. Runs between ticks, so nothing executes
/// concurrently; the world is quiescent for the duration.
pub fn save_snapshot(d: &mut Driver, path: &Path) -> std::io::Result<()> {
    let mut out = String::from(DB_HEADER);
    out.push('\n');
    let mut count = 0usize;
    for (r, o) in d.objects.iter() {
        if o.is_prototype || o.program.path.starts_with("/.eval/") {
            continue;
        }
        if let Some(record) = object_record(d, r) {
            out.push_str(&record);
            count += 1;
        }
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &out)?;
    fs::rename(&tmp, path)?;
    info!(objects = count, path = %path.display(), "snapshot saved");
    for r in d.objects.refs() {
        if let Some(o) = d.objects.get_mut(r) {
            o.dirty = false;
        }
    }
    Ok(())
}

/// Append records for dirty objects; returns the log's new size.
pub fn append_transactions(d: &mut Driver, path: &Path) -> std::io::Result<u64> {
    let mut records = String::new();
    for r in d.objects.refs() {
        let skip = d
            .objects
            .get(r)
            .is_none_or(|o| !o.dirty || o.is_prototype || o.program.path.starts_with("/.eval/"));
        if skip {
            continue;
        }
        if let Some(record) = object_record(d, r) {
            records.push_str(&record);
        }
        if let Some(o) = d.objects.get_mut(r) {
            o.dirty = false;
        }
    }
    if !records.is_empty() {
        let mut f = fs::OpenOptions::new().create(true).append(true).open(path)?;
        f.write_all(records.as_bytes())?;
    }
    Ok(fs::metadata(path).map(|m| m.len()).unwrap_or(0))
}

// ---- reading ----

struct RawRecord {
    path: String,
    refno: i64,
    globals: Vec<(String, String)>,
}

fn parse_records(text: &str, expect_header: bool) -> Result<Vec<RawRecord>, String> {
    let mut lines = text.lines().enumerate();
    if expect_header {
        match lines.next() {
            Some((_, header)) if header.trim() == DB_HEADER => {}
            _ => return Err("bad snapshot header".to_string()),
        }
    }
    let mut records = Vec::new();
    let mut current: Option<RawRecord> = None;
    for (n, line) in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match &mut current {
            None => {
                let Some(head) = line.strip_suffix('{') else {
                    return Err(format!("line {}: expected an object record", n + 1));
                };
                let head = head.trim();
                let Some((path, refno)) = head.rsplit_once('#') else {
                    return Err(format!("line {}: malformed object name", n + 1));
                };
                let refno = refno
                    .parse()
                    .map_err(|_| format!("line {}: bad refno", n + 1))?;
                current = Some(RawRecord {
                    path: path.to_string(),
                    refno,
                    globals: Vec::new(),
                });
            }
            Some(record) => {
                if line == "}" {
                    records.push(current.take().unwrap());
                    continue;
                }
                let Some((name, value)) = line.split_once('=') else {
                    return Err(format!("line {}: expected name = value", n + 1));
                };
                let value = value.trim();
                let value = value.strip_suffix(';').unwrap_or(value);
                record
                    .globals
                    .push((name.trim().to_string(), value.trim().to_string()));
            }
        }
    }
    if current.is_some() {
        return Err("unterminated object record".to_string());
    }
    Ok(records)
}

/// Restore the world before the main loop starts. Malformed input is
/// fatal: the driver refuses to run a partial world.
pub fn load_snapshot(d: &mut Driver, path: &Path) -> Result<(), String> {
    let text =
        fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let records = parse_records(&text, true)?;
    apply_records(d, records, true)?;
    info!(path = %path.display(), objects = d.objects.len(), "snapshot restored");
    Ok(())
}

/// Replay a transaction log over the restored snapshot. Individual bad
/// records are skipped with a warning; a missing file is fine.
pub fn replay_transactions(d: &mut Driver, path: &Path) -> Result<(), String> {
    let Ok(text) = fs::read_to_string(path) else {
        return Ok(());
    };
    let records = parse_records(&text, false)?;
    apply_records(d, records, false)?;
    Ok(())
}

fn apply_records(d: &mut Driver, records: Vec<RawRecord>, strict: bool) -> Result<(), String> {
    // pass 1: make every object exist so references can resolve
    let mut targets: Vec<(ObjRef, Vec<(String, String)>)> = Vec::new();
    for record in records {
        let obj = match d.objects.find_by_refno(record.refno) {
            Some(existing) => existing,
            None => {
                if d.ensure_program(&record.path).is_err() {
                    let msg = format!("cannot compile {} for restore", record.path);
                    if strict {
                        return Err(msg);
                    }
                    warn!("{msg}");
                    continue;
                }
                let program = d
                    .program_of(&record.path)
                    .ok_or_else(|| format!("no program for {}", record.path))?;
                d.objects
                    .allocate_with_refno(record.refno, program, false, d.now)
            }
        };
        targets.push((obj, record.globals));
    }
    // pass 2: parse values and wire object references
    for (obj, globals) in targets {
        for (name, text) in globals {
            let value = match serialize::restore_value(&text) {
                Ok(v) => revive_objects(d, v),
                Err(e) => {
                    let msg = format!("bad value for {name}: {e}");
                    if strict {
                        return Err(msg);
                    }
                    warn!("{msg}");
                    continue;
                }
            };
            let Some(slot) = d
                .objects
                .get(obj)
                .and_then(|o| o.program.global_slot_by_name(&name))
            else {
                // the program lost this global since the snapshot
                continue;
            };
            if let Some(o) = d.objects.get_mut(obj) {
                o.globals[slot] = value;
                o.dirty = false;
            }
        }
    }
    Ok(())
}

/// Turn `"path#refno"` strings back into object references where such an
/// object exists. Plain strings that merely resemble one survive only
/// when no object matches.
fn revive_objects(d: &Driver, value: Value) -> Value {
    match value {
        Value::Str(s) if s.starts_with('/') && s.contains('#') => match d.object_by_name(&s) {
            Some(obj) => Value::Object(obj),
            None => Value::Str(s),
        },
        Value::Array(a) => {
            let revived: Vec<Value> = a
                .borrow()
                .elems
                .iter()
                .map(|v| revive_objects(d, v.clone()))
                .collect();
            a.borrow_mut().elems = revived;
            Value::Array(a)
        }
        Value::Mapping(m) => {
            let revived: HashMap<MapKey, Value> = m
                .borrow()
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), revive_objects(d, v.clone())))
                .collect();
            m.borrow_mut().entries = revived;
            Value::Mapping(m)
        }
        other => other,
    }
}

// ---- per-object records for save_object/restore_object ----

pub fn save_object_record(d: &Driver, obj: ObjRef) -> Result<String, RuntimeError> {
    let o = d
        .objects
        .get(obj)
        .ok_or_else(|| RuntimeError::new("save_object: no such object"))?;
    let mut out = String::new();
    for (name, value) in o.program.global_names.iter().zip(o.globals.iter()) {
        let text = serialize::save_value(d, value)?;
        out.push_str(&format!("{name} = {text};\n"));
    }
    Ok(out)
}

pub fn restore_object_record(d: &mut Driver, obj: ObjRef, text: &str) -> Result<(), RuntimeError> {
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once('=') else {
            return Err(RuntimeError::new("restore_object: expected name = value"));
        };
        let value = value.trim();
        let value = value.strip_suffix(';').unwrap_or(value);
        let parsed = serialize::restore_value(value.trim())?;
        let parsed = revive_objects(d, parsed);
        let Some(slot) = d
            .objects
            .get(obj)
            .and_then(|o| o.program.global_slot_by_name(name.trim()))
        else {
            continue;
        };
        if let Some(o) = d.objects.get_mut(obj) {
            o.globals[slot] = parsed;
            o.dirty = true;
        }
    }
    Ok(())
}
