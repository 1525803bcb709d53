//! Shared fixture: build a driver over a temporary script library.
#![allow(dead_code)]

use cinder_core::{ObjRef, Value};
use cinder_driver::config::Config;
use cinder_driver::{Driver, interp};
use std::fs;
use tempfile::TempDir;

/// Write `.ci` files under a fresh library root and boot a driver on it.
/// A `/boot` file is required by the fixture so master callbacks exist;
/// pass one (an empty `init() { }` body is enough).
pub fn world(files: &[(&str, &str)]) -> (TempDir, Driver) {
    let dir = TempDir::new().unwrap();
    for (path, source) in files {
        let host = dir.path().join(format!("{}.ci", path.trim_start_matches('/')));
        if let Some(parent) = host.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(host, source).unwrap();
    }
    let mut config = Config::default();
    config.lib_root = dir.path().to_path_buf();
    config.load_db = dir.path().join("world.db");
    config.save_db = dir.path().join("world.db");
    config.panic_db = dir.path().join("panic.db");
    config.transact_log = dir.path().join("transact.log");
    config.syslog = dir.path().join("syslog.txt");
    // keep runaway tests fast
    config.hard_cycle_limit = 200_000;
    config.soft_cycle_limit = 100_000;
    let mut driver = Driver::new(config);
    driver
        .load_boot_objects()
        .expect("fixture boot object compiles");
    (dir, driver)
}

pub const EMPTY_BOOT: (&str, &str) = ("/boot", "init() { }\n");

pub fn clone_obj(d: &mut Driver, path: &str) -> ObjRef {
    d.clone_object(path).expect("clone compiles")
}

pub fn call(d: &mut Driver, obj: ObjRef, name: &str, args: Vec<Value>) -> Value {
    interp::call_named(d, obj, name, args, None, None)
        .unwrap_or_else(|| panic!("no function {name}"))
}

pub fn array_of(v: &Value) -> Vec<Value> {
    match v {
        Value::Array(a) => a.borrow().elems.clone(),
        other => panic!("expected array, got {other:?}"),
    }
}
