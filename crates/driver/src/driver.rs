//! The driver value: every piece of runtime state, owned by the main loop.
//!
//! Program registry (prototypes), the object table, queues (alarms,
//! commands, destructs), connection table, and execution bookkeeping all
//! live here and are passed explicitly into the interpreter. Scripts
//! reach back in through efuns.

use crate::config::Config;
use crate::crypt::{CryptBackend, Sha256Crypt};
use crate::interp;
use crate::net::Connections;
use crate::object::ObjectTable;
use crate::vfs::Vfs;
use cinder_compiler::{CompileEnv, CompileError, compile_script};
use cinder_core::{ObjRef, Program, ProgramId, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Traceback bookkeeping, one entry per active interpreter invocation.
pub struct Frame {
    pub obj: ObjRef,
    pub program_path: Rc<str>,
    pub func: Rc<str>,
    pub line: u32,
}

/// Instruction budget for the current top-level call.
pub struct Cycles {
    pub soft: u64,
    pub hard: u64,
    pub use_soft: bool,
    pub use_hard: bool,
    pub soft_limit: u64,
    pub hard_limit: u64,
    /// Set once a limit trips so the abort is reported a single time.
    pub tripped: bool,
}

impl Cycles {
    fn new(config: &Config) -> Cycles {
        Cycles {
            soft: 0,
            hard: 0,
            use_soft: config.use_soft_cycles,
            use_hard: config.use_hard_cycles,
            soft_limit: config.soft_cycle_limit,
            hard_limit: config.hard_cycle_limit,
            tripped: false,
        }
    }

    pub fn reset(&mut self) {
        self.soft = 0;
        self.hard = 0;
        self.tripped = false;
    }
}

#[derive(Debug, Clone)]
pub struct Alarm {
    pub due: i64,
    pub obj: ObjRef,
    pub func: String,
}

#[derive(Debug, Clone)]
pub struct QueuedCommand {
    pub obj: ObjRef,
    pub line: String,
}

pub struct ProtoEntry {
    pub program: Rc<Program>,
    pub proto_obj: ObjRef,
}

pub struct Driver {
    pub config: Config,
    pub vfs: Vfs,
    pub objects: ObjectTable,
    pub protos: HashMap<String, ProtoEntry>,
    next_program_id: ProgramId,
    compiling: HashSet<String>,

    pub boot: Option<ObjRef>,
    pub auto: Option<ObjRef>,

    pub alarms: Vec<Alarm>,
    pub commands: VecDeque<QueuedCommand>,
    pub destruct_queue: Vec<ObjRef>,

    pub conns: Connections,
    pub mssp: Vec<(String, String)>,

    pub now: i64,
    pub start_time: i64,
    pub cycles: Cycles,
    pub call_stack: Vec<Frame>,
    pub eval_counter: u64,

    /// Exit code once shutdown was requested via sysctl.
    pub shutdown: Option<i32>,
    pub save_requested: bool,
    pub panic_requested: bool,

    pub crypt: Box<dyn CryptBackend>,

    pub last_reset: i64,
    pub last_cleanup: i64,
}

pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl Driver {
    pub fn new(config: Config) -> Driver {
        let now = unix_now();
        let vfs = Vfs::new(config.lib_root.clone());
        let conns = Connections::new(config.max_conns);
        let cycles = Cycles::new(&config);
        Driver {
            config,
            vfs,
            objects: ObjectTable::new(),
            protos: HashMap::new(),
            next_program_id: 1,
            compiling: HashSet::new(),
            boot: None,
            auto: None,
            alarms: Vec::new(),
            commands: VecDeque::new(),
            destruct_queue: Vec::new(),
            conns,
            mssp: Vec::new(),
            now,
            start_time: now,
            cycles,
            call_stack: Vec::new(),
            eval_counter: 0,
            shutdown: None,
            save_requested: false,
            panic_requested: false,
            crypt: Box::new(Sha256Crypt),
            last_reset: now,
            last_cleanup: now,
        }
    }

    /// Compile the auto object (if present) and the boot object. Called
    /// once at startup, before any snapshot restore.
    pub fn load_boot_objects(&mut self) -> Result<(), String> {
        let auto_path = self.config.auto_object.clone();
        if self.vfs.stat(&format!("{auto_path}.ci")) >= 0 {
            match self.ensure_program(&auto_path) {
                Ok(entry) => self.auto = Some(entry),
                Err(e) => return Err(format!("auto object: {e}")),
            }
        }
        let boot_path = self.config.boot_object.clone();
        match self.ensure_program(&boot_path) {
            Ok(entry) => self.boot = Some(entry),
            Err(e) => return Err(format!("boot object: {e}")),
        }
        // the system objects are born privileged; everything else earns
        // it through set_priv
        for obj in [self.boot, self.auto].into_iter().flatten() {
            if let Some(o) = self.objects.get_mut(obj) {
                o.privileged = true;
            }
        }
        Ok(())
    }

    // ---- programs and prototypes ----

    /// Find or compile the prototype for `path`; returns its prototype
    /// object. Compiling a file creates the prototype object, attaches
    /// the auto object, and runs `init()` on it.
    pub fn ensure_program(&mut self, path: &str) -> Result<ObjRef, CompileError> {
        let path = crate::vfs::normalize(path)
            .ok_or_else(|| CompileError::new(path, 0, "bad path"))?;
        if let Some(entry) = self.protos.get(&path) {
            return Ok(entry.proto_obj);
        }
        let program = self.compile_file(&path)?;
        Ok(self.install_program(&path, program))
    }

    fn compile_file(&mut self, path: &str) -> Result<Rc<Program>, CompileError> {
        if !self.compiling.insert(path.to_string()) {
            return Err(CompileError::new(path, 0, "inheritance cycle"));
        }
        let result = (|| {
            let source = self
                .vfs
                .read(&format!("{path}.ci"))
                .map_err(|_| CompileError::new(path, 0, "cannot read file"))?;
            compile_script(path, &source, self)
        })();
        self.compiling.remove(path);
        result
    }

    /// Replace (or create) the prototype entry and build its prototype
    /// object. Existing clones keep running the old program.
    fn install_program(&mut self, path: &str, program: Rc<Program>) -> ObjRef {
        let proto_obj = self.objects.allocate(program.clone(), true, self.now);
        self.attach_auto(proto_obj);
        self.protos.insert(
            path.to_string(),
            ProtoEntry {
                program,
                proto_obj,
            },
        );
        info!(path, "program loaded");
        interp::call_named(self, proto_obj, "init", Vec::new(), None, None);
        proto_obj
    }

    /// Recompile a file in place. Clones of the old program are
    /// untouched; the old prototype object is queued for destruction.
    pub fn recompile(&mut self, path: &str) -> Result<ObjRef, CompileError> {
        let path = crate::vfs::normalize(path)
            .ok_or_else(|| CompileError::new(path, 0, "bad path"))?;
        let old = self.protos.remove(&path);
        match self.compile_file(&path) {
            Ok(program) => {
                if let Some(old) = old {
                    self.queue_destruct(old.proto_obj);
                }
                Ok(self.install_program(&path, program))
            }
            Err(e) => {
                // keep the old program on compile failure
                if let Some(old) = old {
                    self.protos.insert(path, old);
                }
                Err(e)
            }
        }
    }

    pub fn program_of(&self, path: &str) -> Option<Rc<Program>> {
        self.protos.get(path).map(|e| e.program.clone())
    }

    pub fn clone_object(&mut self, path: &str) -> Result<ObjRef, CompileError> {
        let proto = self.ensure_program(path)?;
        let program = self
            .objects
            .get(proto)
            .map(|o| o.program.clone())
            .expect("prototype object exists");
        let clone = self.objects.allocate(program, false, self.now);
        self.attach_auto(clone);
        interp::call_named(self, clone, "init", Vec::new(), None, None);
        Ok(clone)
    }

    fn attach_auto(&mut self, obj: ObjRef) {
        if let Some(auto) = self.auto
            && auto != obj
            && let Some(o) = self.objects.get_mut(obj)
        {
            o.attachee = Some(auto);
        }
    }

    /// `compile_string`: build a transient program under `/.eval/<n>` and
    /// clone it. The program is invisible to snapshots and `get_dir` and
    /// dies with its object.
    pub fn compile_eval_string(&mut self, code: &str) -> Result<ObjRef, CompileError> {
        self.eval_counter += 1;
        let path = format!("/.eval/{}", self.eval_counter);
        let program = compile_script(&path, code, self)?;
        let obj = self.objects.allocate(program, false, self.now);
        self.attach_auto(obj);
        interp::call_named(self, obj, "init", Vec::new(), None, None);
        Ok(obj)
    }

    // ---- object identity ----

    pub fn path_of(&self, obj: ObjRef) -> Option<Rc<str>> {
        self.objects.get(obj).map(|o| o.program.path.clone())
    }

    /// `otoa` form: `path#refno`.
    pub fn object_name(&self, obj: ObjRef) -> Option<String> {
        self.objects
            .get(obj)
            .map(|o| format!("{}#{}", o.program.path, o.refno))
    }

    /// `atoo` form: `/path` names the prototype object, `path#refno`
    /// a specific object (checked against its path).
    pub fn object_by_name(&self, name: &str) -> Option<ObjRef> {
        match name.split_once('#') {
            Some((path, refno)) => {
                let refno: i64 = refno.parse().ok()?;
                let obj = self.objects.find_by_refno(refno)?;
                let path = crate::vfs::normalize(path)?;
                (self.objects.get(obj)?.program.path.as_ref() == path).then_some(obj)
            }
            None => {
                let path = crate::vfs::normalize(name)?;
                self.protos.get(&path).map(|e| e.proto_obj)
            }
        }
    }

    // ---- container linkage ----

    pub fn unlink_from_container(&mut self, obj: ObjRef) {
        let Some(location) = self.objects.get(obj).and_then(|o| o.location) else {
            return;
        };
        let next = self.objects.get(obj).and_then(|o| o.next_object);
        // walk the sibling chain and splice out
        let first = self.objects.get(location).and_then(|o| o.contents);
        if first == Some(obj) {
            if let Some(l) = self.objects.get_mut(location) {
                l.contents = next;
            }
        } else {
            let mut cursor = first;
            while let Some(c) = cursor {
                let c_next = self.objects.get(c).and_then(|o| o.next_object);
                if c_next == Some(obj) {
                    if let Some(co) = self.objects.get_mut(c) {
                        co.next_object = next;
                    }
                    break;
                }
                cursor = c_next;
            }
        }
        if let Some(o) = self.objects.get_mut(obj) {
            o.location = None;
            o.next_object = None;
        }
    }

    /// Move `obj` into `dest`. Refuses containment cycles.
    pub fn move_object(&mut self, obj: ObjRef, dest: ObjRef) -> bool {
        if obj == dest || !self.objects.is_live(obj) || !self.objects.is_live(dest) {
            return false;
        }
        // dest must not be inside obj
        let mut cursor = Some(dest);
        while let Some(c) = cursor {
            if c == obj {
                return false;
            }
            cursor = self.objects.get(c).and_then(|o| o.location);
        }
        self.unlink_from_container(obj);
        let old_head = self.objects.get(dest).and_then(|o| o.contents);
        if let Some(d) = self.objects.get_mut(dest) {
            d.contents = Some(obj);
        }
        if let Some(o) = self.objects.get_mut(obj) {
            o.location = Some(dest);
            o.next_object = old_head;
            o.last_access = self.now;
        }
        true
    }

    // ---- queues ----

    pub fn queue_destruct(&mut self, obj: ObjRef) {
        if self.destruct_queue.contains(&obj) || !self.objects.is_live(obj) {
            return;
        }
        if let Some(name) = self.object_name(obj) {
            info!(object = %name, "queued for destruction");
        }
        self.destruct_queue.push(obj);
    }

    pub fn queue_command(&mut self, obj: ObjRef, line: &str) {
        self.commands.push_back(QueuedCommand {
            obj,
            line: line.to_string(),
        });
    }

    /// Schedule `func` on `obj` after `delay` seconds. An alarm with the
    /// same object and function replaces the pending one. Insertion is
    /// stable: among equal due times, earlier registrations fire first.
    pub fn queue_alarm(&mut self, obj: ObjRef, delay: i64, func: &str) {
        if delay < 0 {
            return;
        }
        self.remove_alarm(obj, Some(func));
        let due = self.now + delay;
        let at = self
            .alarms
            .iter()
            .position(|a| a.due > due)
            .unwrap_or(self.alarms.len());
        self.alarms.insert(
            at,
            Alarm {
                due,
                obj,
                func: func.to_string(),
            },
        );
    }

    /// Cancel pending alarms. With a function name, returns the remaining
    /// delay of the removed alarm; without, removes all alarms for the
    /// object. Returns -1 when nothing matched.
    pub fn remove_alarm(&mut self, obj: ObjRef, func: Option<&str>) -> i64 {
        let mut remaining = -1;
        self.alarms.retain(|a| {
            let hit = a.obj == obj && func.is_none_or(|f| a.func == f);
            if hit && remaining < 0 {
                remaining = (a.due - self.now).max(0);
            }
            !hit
        });
        remaining
    }

    // ---- security callback ----

    /// Master gating for file operations: a NULL caller (system) and
    /// privileged objects bypass; everything else asks the boot object's
    /// valid_read/valid_write exactly once.
    pub fn valid_io(&mut self, path: &str, func: &str, caller: Option<ObjRef>, write: bool) -> bool {
        let Some(caller) = caller else {
            return true;
        };
        if self.objects.get(caller).is_some_and(|o| o.privileged) {
            return true;
        }
        let Some(boot) = self.boot else {
            return false;
        };
        let callback = if write { "valid_write" } else { "valid_read" };
        let owner = self
            .vfs
            .owner(path)
            .filter(|o| self.objects.is_live(*o))
            .map(Value::Object)
            .unwrap_or(Value::Int(0));
        let args = vec![
            Value::str(path),
            Value::str(func),
            Value::Object(caller),
            owner,
            Value::Int(self.vfs.stat(path)),
        ];
        match interp::call_named(self, boot, callback, args, None, Some(caller)) {
            Some(v) => v.is_truthy(),
            None => {
                warn!(callback, "master object does not define security callback");
                false
            }
        }
    }
}

/// The compiler sees the driver as its environment: includes come from
/// the virtual filesystem, inherited programs from the prototype
/// registry (compiling on demand), ids from the driver's counter.
impl CompileEnv for Driver {
    fn read_include(&mut self, path: &str) -> Option<String> {
        self.vfs.read(path).ok()
    }

    fn get_program(&mut self, path: &str) -> Result<Rc<Program>, CompileError> {
        let path = crate::vfs::normalize(path)
            .ok_or_else(|| CompileError::new(path, 0, "bad inherit path"))?;
        if let Some(entry) = self.protos.get(&path) {
            return Ok(entry.program.clone());
        }
        let program = self.compile_file(&path)?;
        self.install_program(&path, program.clone());
        Ok(program)
    }

    fn next_program_id(&mut self) -> ProgramId {
        let id = self.next_program_id;
        self.next_program_id += 1;
        id
    }
}
