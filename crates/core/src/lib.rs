//! Cinder Core: the shared data model of the Cinder object runtime
//!
//! This crate holds everything the compiler produces and the driver
//! executes, with no policy of its own:
//!
//! - `value`: the tagged `Value` union, object handles, mapping keys
//! - `heap`: refcounted arrays and mappings with grow/merge/subtract rules
//! - `bytecode`: the instruction set and operator codes
//! - `efun`: the built-in function registry shared by compiler and driver
//! - `program`: compiled programs, functions, and the inheritance layout
//!   (global symbol table and ancestor map)

pub mod bytecode;
pub mod efun;
pub mod heap;
pub mod program;
pub mod value;

pub use bytecode::{BinOp, IncDec, Instr, UnOp};
pub use efun::Efun;
pub use heap::{ArrayRef, HeapError, MappingRef, new_array, new_mapping};
pub use program::{
    Function, GstEntry, InheritEntry, LocalKind, Program, ProgramId, ProgramLookup, VarDecl,
};
pub use value::{MapKey, ObjRef, Value};
