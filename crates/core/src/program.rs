//! Compiled programs (prototypes) and the multiple-inheritance layout.
//!
//! A `Program` is the shared, immutable result of compiling one script
//! file. Clones carry a flat globals vector laid out by flattening the
//! ancestor DAG with virtual deduplication: each ancestor program appears
//! exactly once, at a fixed variable base offset, no matter how many
//! inherit paths reach it.
//!
//! Bytecode compiled for program Q names globals by Q-relative slot. The
//! global symbol table (GST) translates such a slot to its owning program
//! and the slot's index inside that owner; the executing object's program
//! then locates the owner's base offset through its ancestor map. That
//! two-step dance is what makes diamond inheritance actually share storage.

use crate::bytecode::Instr;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Identity of a compiled program. Recompiling a file mints a fresh id;
/// clones built from the old program keep resolving against it.
pub type ProgramId = u64;

/// Declared shape of a variable (local or global). Drives auto-allocation
/// on first subscript and pre-allocation of fixed-size local arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalKind {
    /// `var`: fully dynamic.
    Dynamic,
    Int,
    Str,
    Object,
    Mapping,
    /// `int a[10]` is `size: Some(10)`; `int *a` is unlimited.
    Array { size: Option<u16> },
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: Rc<str>,
    pub kind: LocalKind,
}

/// One slot of the GST: which program owns the storage and where the slot
/// sits inside that owner's own-globals block.
#[derive(Debug, Clone, Copy)]
pub struct GstEntry {
    pub owner: ProgramId,
    pub owner_index: u16,
}

/// One direct `inherit` statement.
#[derive(Debug, Clone)]
pub struct InheritEntry {
    /// Basename of the inherited path, used to resolve `Name::f()`.
    pub label: Rc<str>,
    pub program: Rc<Program>,
    /// Base offset of this parent's flattened globals inside a clone.
    pub var_offset: u16,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: Rc<str>,
    /// Static functions are invisible to `call_other` and command routing.
    pub is_static: bool,
    pub num_params: u16,
    /// Parameter slots first, then declared locals.
    pub locals: Vec<VarDecl>,
    pub code: Vec<Instr>,
}

#[derive(Debug)]
pub struct Program {
    pub id: ProgramId,
    /// Virtual pathname without extension, e.g. `/obj/player`.
    pub path: Rc<str>,
    pub functions: Vec<Function>,
    fn_index: HashMap<Rc<str>, u16>,
    pub inherits: Vec<InheritEntry>,

    /// One entry per visible global slot; slot order equals the flattened
    /// layout, so for clones of this very program `resolve` is identity.
    pub gst: Vec<GstEntry>,
    /// Names aligned with `gst` (one name per flattened slot).
    pub global_names: Vec<Rc<str>>,
    /// Declarations aligned with `gst`, for subscript auto-allocation.
    pub global_decls: Vec<VarDecl>,
    /// Every ancestor (transitively, self included) to its variable base.
    pub ancestor_offsets: HashMap<ProgramId, u16>,
    /// Where this program's own globals start.
    pub own_var_offset: u16,

    /// Late-bound name resolution cache (own functions and inherited).
    lookup_cache: RefCell<HashMap<Rc<str>, Option<(Rc<Program>, u16)>>>,
}

impl Program {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ProgramId,
        path: Rc<str>,
        functions: Vec<Function>,
        inherits: Vec<InheritEntry>,
        gst: Vec<GstEntry>,
        global_names: Vec<Rc<str>>,
        global_decls: Vec<VarDecl>,
        ancestor_offsets: HashMap<ProgramId, u16>,
        own_var_offset: u16,
    ) -> Program {
        let fn_index = functions
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i as u16))
            .collect();
        Program {
            id,
            path,
            functions,
            fn_index,
            inherits,
            gst,
            global_names,
            global_decls,
            ancestor_offsets,
            own_var_offset,
            lookup_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Total flattened global count; sizes a clone's globals vector.
    pub fn num_globals(&self) -> usize {
        self.gst.len()
    }

    /// Index of a function defined in this program itself.
    pub fn find_function(&self, name: &str) -> Option<u16> {
        self.fn_index.get(name).copied()
    }

    /// Resolve a global slot of `definer`'s bytecode to an absolute slot in
    /// a clone of `self`. Returns `None` when `definer` is not an ancestor
    /// (stale program after recompilation, or corrupted bytecode).
    pub fn resolve_global(&self, definer: &Program, slot: u16) -> Option<usize> {
        let entry = definer.gst.get(slot as usize)?;
        let base = *self.ancestor_offsets.get(&entry.owner)?;
        let abs = base as usize + entry.owner_index as usize;
        if abs < self.num_globals() { Some(abs) } else { None }
    }

    /// Declaration for an absolute global slot.
    pub fn global_decl(&self, abs_slot: usize) -> Option<&VarDecl> {
        self.global_decls.get(abs_slot)
    }

    /// Absolute slot of a global by name (snapshot restore).
    pub fn global_slot_by_name(&self, name: &str) -> Option<usize> {
        self.global_names.iter().position(|n| n.as_ref() == name)
    }

    /// Is `other` this program or one of its ancestors?
    pub fn has_ancestor(&self, other: ProgramId) -> bool {
        self.ancestor_offsets.contains_key(&other)
    }
}

/// Late-bound function lookup over shared programs. Lives on the handle
/// because a hit must hand back an owning reference to the defining
/// program for the interpreter to execute against.
pub trait ProgramLookup {
    /// This program first, then the inherit list depth-first in
    /// declaration order. Memoized per name.
    fn lookup_function(&self, name: &str) -> Option<(Rc<Program>, u16)>;
}

impl ProgramLookup for Rc<Program> {
    fn lookup_function(&self, name: &str) -> Option<(Rc<Program>, u16)> {
        if let Some(hit) = self.lookup_cache.borrow().get(name) {
            return hit.clone();
        }
        let resolved = (|| {
            if let Some(idx) = self.find_function(name) {
                return Some((self.clone(), idx));
            }
            for inh in &self.inherits {
                if let Some(found) = inh.program.lookup_function(name) {
                    return Some(found);
                }
            }
            None
        })();
        self.lookup_cache
            .borrow_mut()
            .insert(Rc::from(name), resolved.clone());
        resolved
    }
}
