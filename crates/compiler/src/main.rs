//! Cinder compiler CLI
//!
//! Offline front end for the script compiler: check files for compile
//! errors and dump compiled programs, without booting a driver.

use cinder_compiler::{CompileEnv, CompileError, compile_script};
use cinder_core::{Program, ProgramId};
use clap::{Parser as ClapParser, Subcommand};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;

#[derive(ClapParser)]
#[command(name = "cinderc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cinder script compiler - check .ci files offline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile files and report errors
    Check {
        /// Script files to check (host paths)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Script library root; virtual paths (includes, inherits) resolve here
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },

    /// Compile one file and print its functions and globals
    Dump {
        /// Script file to dump (host path)
        file: PathBuf,

        /// Script library root
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Also print bytecode
        #[arg(long)]
        code: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Commands::Check { files, root } => {
            let mut failures = 0;
            for file in &files {
                match check_file(&root, file) {
                    Ok(program) => {
                        println!(
                            "{}: ok ({} function(s), {} global(s))",
                            file.display(),
                            program.functions.len(),
                            program.num_globals()
                        );
                    }
                    Err(report) => {
                        eprintln!("{report}");
                        failures += 1;
                    }
                }
            }
            if failures > 0 {
                process::exit(1);
            }
        }
        Commands::Dump { file, root, code } => match check_file(&root, &file) {
            Ok(program) => dump_program(&program, code),
            Err(report) => {
                eprintln!("{report}");
                process::exit(1);
            }
        },
    }
}

fn check_file(root: &Path, file: &Path) -> Result<Rc<Program>, String> {
    let source = std::fs::read_to_string(file)
        .map_err(|e| format!("{}: cannot read: {e}", file.display()))?;
    let virtual_path = virtual_path_for(root, file);
    let mut env = FsEnv::new(root.to_path_buf());
    compile_script(&virtual_path, &source, &mut env).map_err(|e| {
        // errors in inherited files render with their own source
        let source = env
            .sources
            .get(&e.path)
            .cloned()
            .unwrap_or_else(|| source.clone());
        e.render(&source)
    })
}

/// Map a host path to a virtual library path: strip the root prefix and
/// the .ci extension.
fn virtual_path_for(root: &Path, file: &Path) -> String {
    let rel = file.strip_prefix(root).unwrap_or(file);
    let mut virt = String::from("/");
    virt.push_str(&rel.to_string_lossy().replace('\\', "/"));
    let virt = virt.replace("//", "/");
    virt.strip_suffix(".ci").map(str::to_string).unwrap_or(virt)
}

fn dump_program(program: &Program, with_code: bool) {
    println!("program {} (id {})", program.path, program.id);
    for inh in &program.inherits {
        println!(
            "  inherit {} at var offset {}",
            inh.program.path, inh.var_offset
        );
    }
    for (i, name) in program.global_names.iter().enumerate() {
        println!("  global {i}: {name}");
    }
    for f in &program.functions {
        let qual = if f.is_static { "static " } else { "" };
        println!(
            "  {qual}{}({} param(s), {} local(s), {} instr(s))",
            f.name,
            f.num_params,
            f.locals.len(),
            f.code.len()
        );
        if with_code {
            for (i, instr) in f.code.iter().enumerate() {
                println!("    {i:4}: {instr:?}");
            }
        }
    }
}

/// Compile environment over the host filesystem: virtual paths resolve
/// under the library root, inherited programs compile on demand.
struct FsEnv {
    root: PathBuf,
    next_id: ProgramId,
    programs: HashMap<String, Rc<Program>>,
    compiling: HashSet<String>,
    /// Source text per virtual path, kept for error rendering.
    sources: HashMap<String, String>,
}

impl FsEnv {
    fn new(root: PathBuf) -> Self {
        FsEnv {
            root,
            next_id: 1,
            programs: HashMap::new(),
            compiling: HashSet::new(),
            sources: HashMap::new(),
        }
    }

    fn host_path(&self, virtual_path: &str) -> PathBuf {
        self.root.join(virtual_path.trim_start_matches('/'))
    }
}

impl CompileEnv for FsEnv {
    fn read_include(&mut self, path: &str) -> Option<String> {
        std::fs::read_to_string(self.host_path(path)).ok()
    }

    fn get_program(&mut self, path: &str) -> Result<Rc<Program>, CompileError> {
        if let Some(p) = self.programs.get(path) {
            return Ok(p.clone());
        }
        if !self.compiling.insert(path.to_string()) {
            return Err(CompileError::new(path, 0, "inheritance cycle"));
        }
        let host = self.host_path(&format!("{path}.ci"));
        let result = (|| {
            let source = std::fs::read_to_string(&host)
                .map_err(|_| CompileError::new(path, 0, "cannot read file"))?;
            self.sources.insert(path.to_string(), source.clone());
            compile_script(path, &source, self)
        })();
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
