//! Bytecode generation and inheritance layout.
//!
//! Layout rules for multiple inheritance: every program reachable through
//! the inherit DAG contributes its *own* globals block exactly once to the
//! flattened clone layout (virtual deduplication: a diamond shares one
//! copy of the common ancestor's storage). The GST built here records, per
//! visible slot, which program owns the storage; the ancestor map records
//! where each ancestor's block starts. Two parents defining the same
//! global name, or a program redeclaring an inherited name, are compile
//! errors.

use crate::ast::*;
use crate::error::CompileError;
use crate::lexer::tokenize;
use crate::parser::Parser;
use crate::preprocess::{SourceLoader, preprocess};
use crate::CompileEnv;
use cinder_core::{
    Efun, Function, GstEntry, InheritEntry, Instr, LocalKind, Program, ProgramId, ProgramLookup,
    VarDecl,
};
use std::collections::HashMap;
use std::rc::Rc;

/// Compile one script. `path` is the virtual pathname without extension.
pub fn compile_script(
    path: &str,
    source: &str,
    env: &mut dyn CompileEnv,
) -> Result<Rc<Program>, CompileError> {
    let lines = {
        let mut loader = EnvLoader(env);
        preprocess(path, source, &mut loader)?
    };
    let tokens = tokenize(path, &lines)?;
    let ast = Parser::new(path, tokens).parse()?;

    let mut inherits = Vec::new();
    for inh in &ast.inherits {
        let parent = env.get_program(&inh.path).map_err(|e| {
            // surface nested failures at the inherit line of this file
            CompileError::new(
                path,
                inh.line,
                format!("cannot inherit \"{}\": {}", inh.path, e.message),
            )
        })?;
        let label = inh
            .path
            .rsplit('/')
            .next()
            .unwrap_or(inh.path.as_str())
            .to_string();
        inherits.push((Rc::from(label.as_str()), parent, inh.line));
    }

    let id = env.next_program_id();
    let layout = GlobalLayout::build(path, id, &ast, &inherits)?;

    let mut r#gen = ProgramGen {
        path,
        layout: &layout,
        inherits: &inherits,
        fn_names: ast.functions.iter().map(|f| f.name.clone()).collect(),
    };

    let mut functions = Vec::with_capacity(ast.functions.len());
    for (i, f) in ast.functions.iter().enumerate() {
        if ast.functions[..i].iter().any(|g| g.name == f.name) {
            return Err(CompileError::new(
                path,
                f.line,
                format!("function {} defined twice", f.name),
            ));
        }
        functions.push(r#gen.compile_function(f)?);
    }

    let inherit_entries = inherits
        .iter()
        .map(|(label, program, _)| InheritEntry {
            label: label.clone(),
            program: program.clone(),
            var_offset: layout.ancestor_offsets[&program.id],
        })
        .collect();

    Ok(Rc::new(Program::new(
        id,
        Rc::from(path),
        functions,
        inherit_entries,
        layout.gst,
        layout.names,
        layout.decls,
        layout.ancestor_offsets,
        layout.own_var_offset,
    )))
}

struct EnvLoader<'a>(&'a mut dyn CompileEnv);

impl SourceLoader for EnvLoader<'_> {
    fn read_include(&mut self, path: &str) -> Option<String> {
        self.0.read_include(path)
    }
}

fn decl_kind(ty: &TypeAst) -> LocalKind {
    match ty {
        TypeAst::Dynamic => LocalKind::Dynamic,
        TypeAst::Int => LocalKind::Int,
        TypeAst::Str => LocalKind::Str,
        TypeAst::Object => LocalKind::Object,
        TypeAst::Mapping => LocalKind::Mapping,
        TypeAst::Array { size, .. } => LocalKind::Array { size: *size },
    }
}

/// Flattened globals of the program under compilation.
struct GlobalLayout {
    gst: Vec<GstEntry>,
    names: Vec<Rc<str>>,
    decls: Vec<VarDecl>,
    ancestor_offsets: HashMap<ProgramId, u16>,
    own_var_offset: u16,
    slot_by_name: HashMap<Rc<str>, u16>,
}

impl GlobalLayout {
    fn build(
        path: &str,
        own_id: ProgramId,
        ast: &ScriptAst,
        inherits: &[(Rc<str>, Rc<Program>, u32)],
    ) -> Result<GlobalLayout, CompileError> {
        let mut gst = Vec::new();
        let mut names: Vec<Rc<str>> = Vec::new();
        let mut decls = Vec::new();
        let mut ancestor_offsets: HashMap<ProgramId, u16> = HashMap::new();
        let mut owner_of: HashMap<Rc<str>, Rc<str>> = HashMap::new();

        for (_, parent, line) in inherits {
            // walk the parent's ancestry in its own placement order so the
            // child layout is deterministic
            let mut ancestry: Vec<(ProgramId, u16)> = parent
                .ancestor_offsets
                .iter()
                .map(|(id, off)| (*id, *off))
                .collect();
            ancestry.sort_by_key(|(_, off)| *off);
            for (ancestor_id, _) in ancestry {
                if ancestor_offsets.contains_key(&ancestor_id) {
                    // diamond: already placed through an earlier path
                    continue;
                }
                let ancestor = find_ancestor(parent, ancestor_id);
                let own_start = ancestor.own_var_offset as usize;
                let base = gst.len() as u16;
                ancestor_offsets.insert(ancestor_id, base);
                for (i, name) in ancestor.global_names[own_start..].iter().enumerate() {
                    if let Some(other) = owner_of.get(name) {
                        return Err(CompileError::new(
                            path,
                            *line,
                            format!(
                                "global variable {name} inherited from both {other} and {}",
                                ancestor.path
                            ),
                        ));
                    }
                    owner_of.insert(name.clone(), ancestor.path.clone());
                    gst.push(GstEntry {
                        owner: ancestor_id,
                        owner_index: i as u16,
                    });
                    names.push(name.clone());
                    decls.push(ancestor.global_decls[own_start + i].clone());
                }
            }
        }

        let own_var_offset = gst.len() as u16;
        ancestor_offsets.insert(own_id, own_var_offset);
        for (i, g) in ast.globals.iter().enumerate() {
            if ast.globals[..i].iter().any(|other| other.name == g.name) {
                return Err(CompileError::new(
                    path,
                    g.line,
                    format!("global variable {} declared twice", g.name),
                ));
            }
            let name: Rc<str> = Rc::from(g.name.as_str());
            if let Some(owner) = owner_of.get(&name) {
                return Err(CompileError::new(
                    path,
                    g.line,
                    format!("global variable {} shadows a global of {owner}", g.name),
                ));
            }
            gst.push(GstEntry {
                owner: own_id,
                owner_index: i as u16,
            });
            names.push(name.clone());
            decls.push(VarDecl {
                name,
                kind: decl_kind(&g.ty),
            });
        }

        if gst.len() > u16::MAX as usize {
            return Err(CompileError::new(path, 0, "too many global variables"));
        }
        let slot_by_name = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i as u16))
            .collect();
        Ok(GlobalLayout {
            gst,
            names,
            decls,
            ancestor_offsets,
            own_var_offset,
            slot_by_name,
        })
    }
}

/// Locate an ancestor program by id somewhere under `parent` (or `parent`
/// itself). Placement guarantees it exists.
fn find_ancestor(parent: &Rc<Program>, id: ProgramId) -> Rc<Program> {
    if parent.id == id {
        return parent.clone();
    }
    for inh in &parent.inherits {
        if inh.program.has_ancestor(id) {
            return find_ancestor(&inh.program, id);
        }
    }
    unreachable!("ancestor {id} listed in offsets but not reachable");
}

struct ProgramGen<'a> {
    path: &'a str,
    layout: &'a GlobalLayout,
    inherits: &'a [(Rc<str>, Rc<Program>, u32)],
    fn_names: Vec<String>,
}

impl ProgramGen<'_> {
    fn compile_function(&mut self, f: &FunctionAst) -> Result<Function, CompileError> {
        let mut fc = FnGen {
            r#gen: self,
            locals: Vec::new(),
            local_slots: HashMap::new(),
            code: Vec::new(),
            loops: Vec::new(),
            line: f.line,
        };
        for p in &f.params {
            fc.declare_local(p)?;
        }
        let num_params = f.params.len() as u16;
        fc.emit_stmts(&f.body)?;
        // implicit `return 0` at the end of every function body
        fc.code.push(Instr::PushInt(0));
        fc.code.push(Instr::Return);
        let FnGen { locals, code, .. } = fc;
        Ok(Function {
            name: Rc::from(f.name.as_str()),
            is_static: f.is_static,
            num_params,
            locals,
            code,
        })
    }
}

/// Per-function state: local slots, emitted code, open loops for
/// break/continue backpatching.
struct FnGen<'a, 'b> {
    r#gen: &'a ProgramGen<'b>,
    locals: Vec<VarDecl>,
    local_slots: HashMap<String, u16>,
    code: Vec<Instr>,
    loops: Vec<LoopFrame>,
    line: u32,
}

struct LoopFrame {
    /// Jump targets to backpatch to the loop end.
    breaks: Vec<usize>,
    /// Where `continue` lands (condition or step).
    continue_to: Option<u32>,
    /// `continue` sites waiting for a target (for-loops patch late).
    continues: Vec<usize>,
}

impl FnGen<'_, '_> {
    fn err(&self, message: impl Into<String>) -> CompileError {
        CompileError::new(self.r#gen.path, self.line, message)
    }

    fn declare_local(&mut self, decl: &DeclAst) -> Result<u16, CompileError> {
        if self.local_slots.contains_key(&decl.name) {
            self.line = decl.line;
            return Err(self.err(format!("variable {} declared twice", decl.name)));
        }
        if self.locals.len() >= u16::MAX as usize {
            return Err(self.err("too many local variables"));
        }
        let slot = self.locals.len() as u16;
        self.local_slots.insert(decl.name.clone(), slot);
        self.locals.push(VarDecl {
            name: Rc::from(decl.name.as_str()),
            kind: decl_kind(&decl.ty),
        });
        Ok(slot)
    }

    fn emit_stmts(&mut self, stmts: &[Stmt]) -> Result<(), CompileError> {
        for stmt in stmts {
            self.emit_stmt(stmt)?;
        }
        Ok(())
    }

    fn mark_line(&mut self, line: u32) {
        self.line = line;
        self.code.push(Instr::Line(line));
    }

    fn emit_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Decl { decls } => {
                for d in decls {
                    self.declare_local(d)?;
                }
            }
            Stmt::Expr { expr, line } => {
                self.mark_line(*line);
                self.emit_expr(expr)?;
                self.code.push(Instr::Discard);
            }
            Stmt::Return { value, line } => {
                self.mark_line(*line);
                match value {
                    Some(expr) => self.emit_expr(expr)?,
                    None => self.code.push(Instr::PushInt(0)),
                }
                self.code.push(Instr::Return);
            }
            Stmt::If {
                cond,
                then,
                otherwise,
                line,
            } => {
                self.mark_line(*line);
                self.emit_expr(cond)?;
                let to_else = self.emit_placeholder();
                self.emit_stmts(then)?;
                if otherwise.is_empty() {
                    self.patch_branch(to_else);
                } else {
                    let to_end = self.emit_jump_placeholder();
                    self.patch_branch(to_else);
                    self.emit_stmts(otherwise)?;
                    self.patch_jump(to_end);
                }
            }
            Stmt::While { cond, body, line } => {
                let top = self.here();
                self.mark_line(*line);
                self.emit_expr(cond)?;
                let exit = self.emit_placeholder();
                self.loops.push(LoopFrame {
                    breaks: Vec::new(),
                    continue_to: Some(top),
                    continues: Vec::new(),
                });
                self.emit_stmts(body)?;
                self.code.push(Instr::Jump(top));
                self.patch_branch(exit);
                self.close_loop(top);
            }
            Stmt::DoWhile { body, cond, line } => {
                let top = self.here();
                self.loops.push(LoopFrame {
                    breaks: Vec::new(),
                    continue_to: None,
                    continues: Vec::new(),
                });
                self.emit_stmts(body)?;
                let check = self.here();
                self.mark_line(*line);
                self.emit_expr(cond)?;
                let exit = self.emit_placeholder();
                self.code.push(Instr::Jump(top));
                self.patch_branch(exit);
                self.close_loop(check);
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
                line,
            } => {
                self.mark_line(*line);
                if let Some(init) = init {
                    self.emit_expr(init)?;
                    self.code.push(Instr::Discard);
                }
                let top = self.here();
                let exit = match cond {
                    Some(cond) => {
                        self.mark_line(*line);
                        self.emit_expr(cond)?;
                        Some(self.emit_placeholder())
                    }
                    None => None,
                };
                self.loops.push(LoopFrame {
                    breaks: Vec::new(),
                    continue_to: None,
                    continues: Vec::new(),
                });
                self.emit_stmts(body)?;
                let step_at = self.here();
                if let Some(step) = step {
                    self.mark_line(*line);
                    self.emit_expr(step)?;
                    self.code.push(Instr::Discard);
                }
                self.code.push(Instr::Jump(top));
                if let Some(exit) = exit {
                    self.patch_branch(exit);
                }
                self.close_loop(step_at);
            }
            Stmt::Break { line } => {
                self.line = *line;
                if self.loops.is_empty() {
                    return Err(self.err("break outside of a loop"));
                }
                let site = self.emit_jump_placeholder();
                self.loops.last_mut().unwrap().breaks.push(site);
            }
            Stmt::Continue { line } => {
                self.line = *line;
                let Some(frame) = self.loops.last_mut() else {
                    return Err(self.err("continue outside of a loop"));
                };
                match frame.continue_to {
                    Some(target) => self.code.push(Instr::Jump(target)),
                    None => {
                        let site = self.emit_jump_placeholder();
                        self.loops.last_mut().unwrap().continues.push(site);
                    }
                }
            }
        }
        Ok(())
    }

    fn emit_expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Int(n) => self.code.push(Instr::PushInt(*n)),
            Expr::Str(s) => self.code.push(Instr::PushStr(Rc::from(s.as_str()))),
            Expr::Var(name) => self.emit_var_lvalue(name)?,
            Expr::Assign { op, target, value } => {
                self.emit_lvalue(target)?;
                self.emit_expr(value)?;
                self.code.push(match op {
                    None => Instr::Assign,
                    Some(op) => Instr::AssignOp(*op),
                });
            }
            Expr::Binary { op, left, right } => {
                self.emit_expr(left)?;
                self.emit_expr(right)?;
                self.code.push(Instr::Bin(*op));
            }
            Expr::Unary { op, operand } => {
                self.emit_expr(operand)?;
                self.code.push(Instr::Un(*op));
            }
            Expr::IncDec { op, target } => {
                self.emit_lvalue(target)?;
                self.code.push(Instr::IncDec(*op));
            }
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                self.emit_expr(cond)?;
                let to_else = self.emit_placeholder();
                self.emit_expr(then)?;
                let to_end = self.emit_jump_placeholder();
                self.patch_branch(to_else);
                self.emit_expr(otherwise)?;
                self.patch_jump(to_end);
            }
            Expr::Comma(parts) => {
                let (last, rest) = parts.split_last().expect("comma has parts");
                for part in rest {
                    self.emit_expr(part)?;
                    self.code.push(Instr::Discard);
                }
                self.emit_expr(last)?;
            }
            Expr::Index { .. } => self.emit_lvalue(expr)?,
            Expr::Call { name, args } => self.emit_call(name, args)?,
            Expr::MethodCall {
                receiver,
                name,
                args,
            } => {
                if args.len() + 2 > u8::MAX as usize {
                    return Err(self.err("too many arguments"));
                }
                self.emit_expr(receiver)?;
                self.code.push(Instr::PushStr(Rc::from(name.as_str())));
                for arg in args {
                    self.emit_expr(arg)?;
                }
                self.code.push(Instr::CallEfun {
                    efun: Efun::CallOther,
                    argc: (args.len() + 2) as u8,
                });
            }
            Expr::SuperCall { parent, name, args } => {
                let argc = self.check_argc(args.len())?;
                let inherit_idx = self.resolve_super(parent.as_deref(), name)?;
                for arg in args {
                    self.emit_expr(arg)?;
                }
                let name = Rc::from(name.as_str());
                self.code.push(match parent {
                    None => Instr::CallSuper {
                        inherit_idx,
                        name,
                        argc,
                    },
                    Some(_) => Instr::CallParentNamed {
                        inherit_idx,
                        name,
                        argc,
                    },
                });
            }
            Expr::ArrayLit(elems) => {
                if elems.len() > u16::MAX as usize {
                    return Err(self.err("array literal too large"));
                }
                for elem in elems {
                    self.emit_expr(elem)?;
                }
                self.code.push(Instr::MakeArray {
                    n: elems.len() as u16,
                });
            }
            Expr::MappingLit(entries) => {
                if entries.len() > u16::MAX as usize {
                    return Err(self.err("mapping literal too large"));
                }
                for (k, v) in entries {
                    self.emit_expr(k)?;
                    self.emit_expr(v)?;
                }
                self.code.push(Instr::MakeMapping {
                    n: entries.len() as u16,
                });
            }
        }
        Ok(())
    }

    fn check_argc(&self, n: usize) -> Result<u8, CompileError> {
        if n > u8::MAX as usize {
            Err(self.err("too many arguments"))
        } else {
            Ok(n as u8)
        }
    }

    /// A bare name used as a value still compiles to its l-value; the
    /// interpreter resolves l-values wherever a value is consumed.
    fn emit_var_lvalue(&mut self, name: &str) -> Result<(), CompileError> {
        if let Some(slot) = self.local_slots.get(name) {
            self.code.push(Instr::PushLocal(*slot));
            return Ok(());
        }
        if let Some(slot) = self.r#gen.layout.slot_by_name.get(name) {
            self.code.push(Instr::PushGlobal(*slot));
            return Ok(());
        }
        Err(self.err(format!("unknown variable {name}")))
    }

    fn emit_lvalue(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Var(name) => self.emit_var_lvalue(name),
            Expr::Index { base, index } => {
                if let Expr::Var(name) = base.as_ref() {
                    if let Some(slot) = self.local_slots.get(name).copied() {
                        self.emit_expr(index)?;
                        self.code.push(Instr::SubscriptLocal(slot));
                        return Ok(());
                    }
                    if let Some(slot) = self.r#gen.layout.slot_by_name.get(name.as_str()).copied() {
                        self.emit_expr(index)?;
                        self.code.push(Instr::SubscriptGlobal(slot));
                        return Ok(());
                    }
                    return Err(self.err(format!("unknown variable {name}")));
                }
                self.emit_expr(base)?;
                self.emit_expr(index)?;
                self.code.push(Instr::SubscriptTop);
                Ok(())
            }
            _ => Err(self.err("expression is not assignable")),
        }
    }

    fn emit_call(&mut self, name: &str, args: &[Expr]) -> Result<(), CompileError> {
        let argc = self.check_argc(args.len())?;
        // own functions first, then efuns, then late binding against
        // inherited or attached programs
        if let Some(fidx) = self.r#gen.fn_names.iter().position(|n| n == name) {
            for arg in args {
                self.emit_expr(arg)?;
            }
            self.code.push(Instr::CallFunc {
                fidx: fidx as u16,
                argc,
            });
            return Ok(());
        }
        if let Some(efun) = Efun::from_name(name) {
            let (min, max) = efun.arity();
            if argc < min || argc > max {
                return Err(self.err(format!(
                    "{name} expects {} argument(s), got {argc}",
                    if min == max {
                        format!("{min}")
                    } else {
                        format!("{min} to {max}")
                    }
                )));
            }
            for arg in args {
                self.emit_expr(arg)?;
            }
            self.code.push(Instr::CallEfun { efun, argc });
            return Ok(());
        }
        for arg in args {
            self.emit_expr(arg)?;
        }
        self.code.push(Instr::CallName {
            name: Rc::from(name),
            argc,
        });
        Ok(())
    }

    fn resolve_super(&self, parent: Option<&str>, name: &str) -> Result<u16, CompileError> {
        match parent {
            Some(label) => {
                let idx = self
                    .r#gen
                    .inherits
                    .iter()
                    .position(|(l, _, _)| l.as_ref() == label)
                    .ok_or_else(|| self.err(format!("no inherited file named {label}")))?;
                let (_, program, _) = &self.r#gen.inherits[idx];
                if program.lookup_function(name).is_none() {
                    return Err(self.err(format!("{label} defines no function {name}")));
                }
                Ok(idx as u16)
            }
            None => self
                .r#gen
                .inherits
                .iter()
                .position(|(_, program, _)| program.lookup_function(name).is_some())
                .map(|i| i as u16)
                .ok_or_else(|| self.err(format!("no inherited definition of {name}"))),
        }
    }

    // ---- jump plumbing ----

    fn here(&self) -> u32 {
        self.code.len() as u32
    }

    /// Emit a `BranchFalse` whose target is patched later.
    fn emit_placeholder(&mut self) -> usize {
        self.code.push(Instr::BranchFalse(u32::MAX));
        self.code.len() - 1
    }

    fn emit_jump_placeholder(&mut self) -> usize {
        self.code.push(Instr::Jump(u32::MAX));
        self.code.len() - 1
    }

    fn patch_branch(&mut self, site: usize) {
        let target = self.here();
        match &mut self.code[site] {
            Instr::BranchFalse(t) | Instr::Jump(t) => *t = target,
            other => unreachable!("patching non-jump {other:?}"),
        }
    }

    fn patch_jump(&mut self, site: usize) {
        self.patch_branch(site);
    }

    fn close_loop(&mut self, continue_target: u32) {
        let frame = self.loops.pop().expect("loop frame");
        let end = self.here();
        for site in frame.breaks {
            match &mut self.code[site] {
                Instr::Jump(t) => *t = end,
                other => unreachable!("patching non-jump {other:?}"),
            }
        }
        for site in frame.continues {
            match &mut self.code[site] {
                Instr::Jump(t) => *t = continue_target,
                other => unreachable!("patching non-jump {other:?}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SelfContained;

    fn compile(src: &str) -> Rc<Program> {
        compile_script("/test/prog", src, &mut SelfContained::new(1)).unwrap()
    }

    fn compile_err(src: &str) -> CompileError {
        compile_script("/test/prog", src, &mut SelfContained::new(1)).unwrap_err()
    }

    #[test]
    fn test_simple_accessors_compile() {
        let p = compile("int x;\nset_x(v) { x = v; }\nget_x() { return x; }\n");
        assert_eq!(p.num_globals(), 1);
        assert_eq!(p.functions.len(), 2);
        let set_x = &p.functions[0];
        assert_eq!(set_x.num_params, 1);
        assert!(
            set_x
                .code
                .iter()
                .any(|i| matches!(i, Instr::PushGlobal(0)))
        );
        assert!(set_x.code.iter().any(|i| matches!(i, Instr::Assign)));
    }

    #[test]
    fn test_own_call_is_direct_and_unknown_is_late_bound() {
        let p = compile("helper() { return 1; }\nf() { helper(); mystery(); }\n");
        let f = &p.functions[1];
        assert!(
            f.code
                .iter()
                .any(|i| matches!(i, Instr::CallFunc { fidx: 0, .. }))
        );
        assert!(
            f.code
                .iter()
                .any(|i| matches!(i, Instr::CallName { name, .. } if name.as_ref() == "mystery"))
        );
    }

    #[test]
    fn test_efun_resolution_and_arity_check() {
        let p = compile("f() { return strlen(\"abc\"); }\n");
        assert!(p.functions[0].code.iter().any(
            |i| matches!(i, Instr::CallEfun { efun: Efun::Strlen, argc: 1 })
        ));
        let err = compile_err("f() { strlen(); }\n");
        assert!(err.message.contains("strlen expects"));
    }

    #[test]
    fn test_method_call_desugars_to_call_other() {
        let p = compile("f(p) { p.listen(\"hi\"); }\n");
        assert!(p.functions[0].code.iter().any(|i| matches!(
            i,
            Instr::CallEfun {
                efun: Efun::CallOther,
                argc: 3
            }
        )));
    }

    #[test]
    fn test_unknown_variable_rejected() {
        let err = compile_err("f() { return missing; }\n");
        assert!(err.message.contains("unknown variable missing"));
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_loop_backpatching_terminates_loops() {
        let p = compile("f() { int i; for (i = 0; i < 3; i++) { if (i == 1) break; } while (1) continue; }\n");
        // no placeholder targets survive
        for instr in &p.functions[0].code {
            match instr {
                Instr::Jump(t) | Instr::BranchFalse(t) => assert_ne!(*t, u32::MAX),
                _ => {}
            }
        }
    }

    #[test]
    fn test_break_outside_loop_rejected() {
        let err = compile_err("f() { break; }\n");
        assert!(err.message.contains("break outside"));
    }

    #[test]
    fn test_implicit_return_zero() {
        let p = compile("f() { }\n");
        let code = &p.functions[0].code;
        assert!(matches!(code[code.len() - 2], Instr::PushInt(0)));
        assert!(matches!(code[code.len() - 1], Instr::Return));
    }

    #[test]
    fn test_super_without_inherits_rejected() {
        let err = compile_err("f() { ::setup(); }\n");
        assert!(err.message.contains("no inherited definition"));
    }

    #[test]
    fn test_duplicate_global_rejected() {
        let err = compile_err("int x;\nstring x;\nf() { }\n");
        assert!(err.message.contains("declared twice"));
    }
}
