//! Inheritance layout tests: flattened globals, diamond deduplication,
//! conflict detection, and qualified-call resolution.

use cinder_compiler::{CompileEnv, CompileError, compile_script};
use cinder_core::{Instr, Program, ProgramId};
use std::collections::HashMap;
use std::rc::Rc;

/// In-memory script library.
struct MapEnv {
    files: HashMap<&'static str, &'static str>,
    programs: HashMap<String, Rc<Program>>,
    compiling: std::collections::HashSet<String>,
    next_id: ProgramId,
}

impl MapEnv {
    fn new(files: &[(&'static str, &'static str)]) -> Self {
        MapEnv {
            files: files.iter().copied().collect(),
            programs: HashMap::new(),
            compiling: std::collections::HashSet::new(),
            next_id: 1,
        }
    }

    fn compile(&mut self, path: &'static str) -> Result<Rc<Program>, CompileError> {
        self.get_program(path)
    }
}

impl CompileEnv for MapEnv {
    fn read_include(&mut self, path: &str) -> Option<String> {
        self.files.get(path).map(|s| s.to_string())
    }

    fn get_program(&mut self, path: &str) -> Result<Rc<Program>, CompileError> {
        if let Some(p) = self.programs.get(path) {
            return Ok(p.clone());
        }
        if !self.compiling.insert(path.to_string()) {
            return Err(CompileError::new(path, 0, "inheritance cycle"));
        }
        let source = *self
            .files
            .get(path)
            .ok_or_else(|| CompileError::new(path, 0, "no such file"))?;
        let result = compile_script(path, source, self);
        self.compiling.remove(path);
        let program = result?;
        self.programs.insert(path.to_string(), program.clone());
        Ok(program)
    }

    fn next_program_id(&mut self) -> ProgramId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

#[test]
fn single_inheritance_appends_own_globals() {
    let mut env = MapEnv::new(&[
        ("/base", "int b;\nset_b(v) { b = v; }\nget_b() { return b; }\n"),
        (
            "/child",
            "inherit \"/base\";\nint c;\nget_c() { return c; }\n",
        ),
    ]);
    let child = env.compile("/child").unwrap();
    let base = env.compile("/base").unwrap();

    assert_eq!(child.num_globals(), 2);
    assert_eq!(child.own_var_offset, 1);
    // base's bytecode slot 0 resolves to slot 0 of a child clone
    assert_eq!(child.resolve_global(&base, 0), Some(0));
    // child's own global `c` is visible slot 1 and resolves to slot 1
    assert_eq!(child.global_slot_by_name("c"), Some(1));
    assert_eq!(child.resolve_global(&child, 1), Some(1));
}

#[test]
fn diamond_shares_one_copy_of_the_base() {
    let files = [
        ("/base", "int b;\nset_b(v) { b = v; }\nget_b() { return b; }\n"),
        ("/left", "inherit \"/base\";\nint l;\n"),
        ("/right", "inherit \"/base\";\nint r;\n"),
        (
            "/diamond",
            "inherit \"/left\";\ninherit \"/right\";\nint d;\n",
        ),
    ];
    let mut env = MapEnv::new(&files);
    let diamond = env.compile("/diamond").unwrap();
    let base = env.compile("/base").unwrap();
    let left = env.compile("/left").unwrap();
    let right = env.compile("/right").unwrap();

    // base appears once: b, l, r, d
    assert_eq!(diamond.num_globals(), 4);
    // base's own slot 0 has one home in the diamond...
    let b_slot = diamond.resolve_global(&base, 0).unwrap();
    // ...and both parents' views of it (their visible slot 0 is base.b)
    // land on the same storage
    assert_eq!(diamond.resolve_global(&left, 0), Some(b_slot));
    assert_eq!(diamond.resolve_global(&right, 0), Some(b_slot));
    // every program's own globals stay distinct
    let slots: Vec<_> = ["b", "l", "r", "d"]
        .iter()
        .map(|n| diamond.global_slot_by_name(n).unwrap())
        .collect();
    let mut dedup = slots.clone();
    dedup.sort_unstable();
    dedup.dedup();
    assert_eq!(dedup.len(), 4);
}

#[test]
fn variable_conflict_between_parents_is_rejected() {
    let mut env = MapEnv::new(&[
        ("/a", "int clash;\n"),
        ("/b", "int clash;\n"),
        ("/both", "inherit \"/a\";\ninherit \"/b\";\n"),
    ]);
    let err = env.compile("/both").unwrap_err();
    assert!(err.message.contains("clash"));
    assert!(err.message.contains("inherited from both"));
}

#[test]
fn shadowing_an_inherited_global_is_rejected() {
    let mut env = MapEnv::new(&[
        ("/base", "int hp;\n"),
        ("/child", "inherit \"/base\";\nint hp;\n"),
    ]);
    let err = env.compile("/child").unwrap_err();
    assert!(err.message.contains("shadows"));
}

#[test]
fn super_calls_resolve_against_the_right_parent() {
    let mut env = MapEnv::new(&[
        ("/left", "init() { return 1; }\n"),
        ("/right", "init() { return 2; }\n"),
        (
            "/child",
            "inherit \"/left\";\ninherit \"/right\";\ninit() { ::init(); right::init(); }\n",
        ),
    ]);
    let child = env.compile("/child").unwrap();
    let code = &child.functions[0].code;
    // ::init() binds to the first parent defining it
    assert!(code.iter().any(|i| matches!(
        i,
        Instr::CallSuper { inherit_idx: 0, name, .. } if name.as_ref() == "init"
    )));
    // right::init() binds to the named parent
    assert!(code.iter().any(|i| matches!(
        i,
        Instr::CallParentNamed { inherit_idx: 1, name, .. } if name.as_ref() == "init"
    )));
}

#[test]
fn named_super_call_against_unknown_parent_is_rejected() {
    let mut env = MapEnv::new(&[
        ("/base", "init() { }\n"),
        (
            "/child",
            "inherit \"/base\";\ninit() { elsewhere::init(); }\n",
        ),
    ]);
    let err = env.compile("/child").unwrap_err();
    assert!(err.message.contains("elsewhere"));
}

#[test]
fn inheritance_cycle_is_reported() {
    let mut env = MapEnv::new(&[
        ("/a", "inherit \"/b\";\n"),
        ("/b", "inherit \"/a\";\n"),
    ]);
    let err = env.compile("/a").unwrap_err();
    assert!(err.message.contains("cycle"));
}
