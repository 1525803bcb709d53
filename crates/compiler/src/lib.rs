//! Compiler for the Cinder scripting dialect.
//!
//! Pipeline: preprocess (`#include`/`#define`) → tokenize → parse →
//! resolve inheritance → generate bytecode. The output is a shared
//! [`cinder_core::Program`]; the driver owns the program registry and
//! feeds inherited programs back in through [`CompileEnv`].

pub mod ast;
pub mod codegen;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod preprocess;

use cinder_core::{Program, ProgramId};
use std::rc::Rc;

pub use codegen::compile_script;
pub use error::CompileError;
pub use preprocess::{NoIncludes, SourceLoader};

/// What the compiler needs from its host: include files, already-compiled
/// (or compilable) parent programs, and fresh program ids. The driver
/// implements this over its virtual filesystem and prototype registry.
pub trait CompileEnv {
    fn read_include(&mut self, path: &str) -> Option<String>;
    fn get_program(&mut self, path: &str) -> Result<Rc<Program>, CompileError>;
    fn next_program_id(&mut self) -> ProgramId;
}

/// Minimal environment for sources with no inherits or includes
/// (`compile_string`, unit tests).
pub struct SelfContained {
    next_id: ProgramId,
}

impl SelfContained {
    pub fn new(first_id: ProgramId) -> Self {
        SelfContained { next_id: first_id }
    }
}

impl CompileEnv for SelfContained {
    fn read_include(&mut self, _path: &str) -> Option<String> {
        None
    }

    fn get_program(&mut self, path: &str) -> Result<Rc<Program>, CompileError> {
        Err(CompileError::new(path, 0, "inheritance not available here"))
    }

    fn next_program_id(&mut self) -> ProgramId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}
