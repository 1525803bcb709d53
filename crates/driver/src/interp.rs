//! The bytecode interpreter.
//!
//! One invocation of [`call`] executes one function to completion over a
//! private evaluation stack of values and l-value tokens. Frames are
//! pushed on the driver's call stack for tracebacks only; locals live in
//! the Rust stack of the invocation.
//!
//! Error policy: a runtime error is reported (with traceback) where it
//! happens and makes the *current* function return integer 0 to its
//! caller. Nothing unwinds past one frame, so a broken admin command
//! cannot take the driver down. Cycle-limit trips behave the same but
//! keep aborting the enclosing frames because the counters stay tripped
//! until the next top-level call resets them.

use crate::driver::{Driver, Frame};
use crate::efuns::{self, EfunCtx};
use crate::report;
use cinder_core::heap::{self, ArrayRef, MappingRef};
use cinder_core::{
    BinOp, Efun, IncDec, Instr, LocalKind, MapKey, ObjRef, Program, ProgramLookup, UnOp, Value,
};
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub message: String,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> RuntimeError {
        RuntimeError {
            message: message.into(),
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for RuntimeError {}

/// Where a value can be stored through. Element l-values address cells as
/// (handle, index), so array growth never invalidates them.
#[derive(Debug, Clone)]
pub enum Lvalue {
    Local(u16),
    /// Absolute slot in the executing object's flattened globals.
    Global(usize),
    Elem(ArrayRef, usize),
    Entry(MappingRef, MapKey),
}

/// One evaluation-stack slot.
#[derive(Debug, Clone)]
enum Slot {
    Val(Value),
    Lv(Lvalue),
}

/// Call a function by name on an object, searching its program's
/// inheritance first and then the attachee chain (execution lands on the
/// attachee in that case). Returns `None` when no such function exists.
/// Entering with an empty call stack begins a fresh top-level call and
/// resets the cycle counters.
pub fn call_named(
    d: &mut Driver,
    obj: ObjRef,
    name: &str,
    args: Vec<Value>,
    player: Option<ObjRef>,
    caller: Option<ObjRef>,
) -> Option<Value> {
    let (target, program, fidx) = resolve_function(d, obj, name)?;
    Some(call(d, target, program, fidx, args, player, caller))
}

/// Resolve a late-bound name against an object: its own program and
/// inherits, then attached components.
pub fn resolve_function(
    d: &Driver,
    obj: ObjRef,
    name: &str,
) -> Option<(ObjRef, Rc<Program>, u16)> {
    let mut target = obj;
    for _ in 0..8 {
        let o = d.objects.get(target)?;
        if let Some((program, fidx)) = o.program.lookup_function(name) {
            return Some((target, program, fidx));
        }
        target = o.attachee?;
    }
    None
}

/// Execute `definer.functions[fidx]` on `obj`. Always yields a value;
/// runtime errors are reported and yield integer 0.
pub fn call(
    d: &mut Driver,
    obj: ObjRef,
    definer: Rc<Program>,
    fidx: u16,
    args: Vec<Value>,
    player: Option<ObjRef>,
    caller: Option<ObjRef>,
) -> Value {
    if d.call_stack.is_empty() {
        d.cycles.reset();
    }
    let func = &definer.functions[fidx as usize];
    let fname = func.name.clone();

    if d.call_stack.len() >= d.config.max_call_depth {
        report::runtime_error(
            d,
            player,
            obj,
            "call stack overflow - recursion too deep",
        );
        return Value::Int(0);
    }
    d.call_stack.push(Frame {
        obj,
        program_path: definer.path.clone(),
        func: fname,
        line: 0,
    });
    if let Some(o) = d.objects.get_mut(obj) {
        o.last_access = d.now;
    }

    let result = run(d, obj, &definer, fidx, args, player, caller);
    d.call_stack.pop();
    match result {
        Ok(value) => value,
        Err(e) => {
            // a tripped cycle counter is reported once, then keeps
            // aborting enclosing frames quietly
            if !d.cycles.tripped || !is_cycle_error(&e) {
                report::runtime_error(d, player, obj, &e.message);
            }
            if is_cycle_error(&e) {
                d.cycles.tripped = true;
            }
            Value::Int(0)
        }
    }
}

fn is_cycle_error(e: &RuntimeError) -> bool {
    e.message.contains("cycle")
}

fn run(
    d: &mut Driver,
    obj: ObjRef,
    definer: &Rc<Program>,
    fidx: u16,
    mut args: Vec<Value>,
    player: Option<ObjRef>,
    caller: Option<ObjRef>,
) -> Result<Value, RuntimeError> {
    let func = &definer.functions[fidx as usize];
    let mut locals: Vec<Value> = Vec::with_capacity(func.locals.len());
    for decl in &func.locals {
        // fixed-size array locals exist from the start
        locals.push(match decl.kind {
            LocalKind::Array { size: Some(n) } => {
                Value::Array(heap::new_array(n as usize, Some(n as usize)))
            }
            _ => Value::Int(0),
        });
    }
    if args.len() > locals.len() {
        return Err(RuntimeError::new("too many arguments"));
    }
    for (slot, arg) in args.drain(..).enumerate() {
        locals[slot] = arg;
    }

    let mut stack: Vec<Slot> = Vec::new();
    let mut pc: usize = 0;
    let code = &func.code;

    loop {
        if d.cycles.use_hard {
            d.cycles.hard += 1;
            if d.cycles.hard > d.cycles.hard_limit {
                return Err(RuntimeError::new("cycle hard maximum exceeded"));
            }
        }
        if d.cycles.use_soft {
            d.cycles.soft += 1;
            if d.cycles.soft > d.cycles.soft_limit {
                return Err(RuntimeError::new("cycle soft maximum exceeded"));
            }
        }
        let Some(instr) = code.get(pc) else {
            // codegen always terminates with Return; treat running off
            // the end as an implicit `return 0`
            return Ok(Value::Int(0));
        };
        pc += 1;
        match instr {
            Instr::PushInt(n) => stack.push(Slot::Val(Value::Int(*n))),
            Instr::PushStr(s) => stack.push(Slot::Val(Value::Str(s.clone()))),
            Instr::PushLocal(slot) => stack.push(Slot::Lv(Lvalue::Local(*slot))),
            Instr::PushGlobal(slot) => {
                let abs = resolve_global(d, obj, definer, *slot)?;
                stack.push(Slot::Lv(Lvalue::Global(abs)));
            }
            Instr::SubscriptLocal(slot) => {
                let key = pop_value(d, obj, &locals, &mut stack)?;
                let decl_kind = func.locals[*slot as usize].kind.clone();
                let base = locals[*slot as usize].clone();
                let (base, lv) =
                    subscript_variable(base, &decl_kind, key).map_err(with_subscript_context)?;
                if let Some(created) = base {
                    locals[*slot as usize] = created;
                }
                stack.push(Slot::Lv(lv));
            }
            Instr::SubscriptGlobal(slot) => {
                let abs = resolve_global(d, obj, definer, *slot)?;
                let key = pop_value(d, obj, &locals, &mut stack)?;
                let (decl_kind, base) = {
                    let o = d
                        .objects
                        .get(obj)
                        .ok_or_else(|| RuntimeError::new("executing object is gone"))?;
                    let kind = o
                        .program
                        .global_decl(abs)
                        .map(|dcl| dcl.kind.clone())
                        .unwrap_or(LocalKind::Dynamic);
                    (kind, o.globals[abs].clone())
                };
                let (created, lv) =
                    subscript_variable(base, &decl_kind, key).map_err(with_subscript_context)?;
                // the element l-value can mutate the container without
                // touching the object again, so mark dirty up front
                let o = d.objects.get_mut(obj).expect("checked above");
                if let Some(created) = created {
                    o.globals[abs] = created;
                }
                o.dirty = true;
                stack.push(Slot::Lv(lv));
            }
            Instr::SubscriptTop => {
                let key = pop_value(d, obj, &locals, &mut stack)?;
                let base = pop_value(d, obj, &locals, &mut stack)?;
                let (_, lv) = subscript_value(base, key).map_err(with_subscript_context)?;
                stack.push(Slot::Lv(lv));
            }
            Instr::Bin(op) => {
                let right = pop_value(d, obj, &locals, &mut stack)?;
                let left = pop_value(d, obj, &locals, &mut stack)?;
                stack.push(Slot::Val(binary_op(*op, left, right)?));
            }
            Instr::Un(op) => {
                let operand = pop_value(d, obj, &locals, &mut stack)?;
                stack.push(Slot::Val(unary_op(*op, operand)?));
            }
            Instr::Assign => {
                let value = pop_value(d, obj, &locals, &mut stack)?;
                let lv = pop_lvalue(&mut stack)?;
                store_lvalue(d, obj, &mut locals, &lv, value.clone())?;
                stack.push(Slot::Val(value));
            }
            Instr::AssignOp(op) => {
                let value = pop_value(d, obj, &locals, &mut stack)?;
                let lv = pop_lvalue(&mut stack)?;
                let current = read_lvalue(d, obj, &locals, &lv)?;
                let result = binary_op(*op, current, value)?;
                store_lvalue(d, obj, &mut locals, &lv, result.clone())?;
                stack.push(Slot::Val(result));
            }
            Instr::IncDec(op) => {
                let lv = pop_lvalue(&mut stack)?;
                let Value::Int(current) = read_lvalue(d, obj, &locals, &lv)? else {
                    return Err(RuntimeError::new("++/-- on a non-integer"));
                };
                let (next, pushed) = match op {
                    IncDec::PreInc => (current + 1, current + 1),
                    IncDec::PreDec => (current - 1, current - 1),
                    IncDec::PostInc => (current + 1, current),
                    IncDec::PostDec => (current - 1, current),
                };
                store_lvalue(d, obj, &mut locals, &lv, Value::Int(next))?;
                stack.push(Slot::Val(Value::Int(pushed)));
            }
            Instr::Discard => {
                stack.pop();
            }
            Instr::Jump(target) => pc = *target as usize,
            Instr::BranchFalse(target) => {
                let cond = pop_value(d, obj, &locals, &mut stack)?;
                if !cond.is_truthy() {
                    pc = *target as usize;
                }
            }
            Instr::Line(n) => {
                // statement boundary: sync the frame and drop leftovers
                if let Some(frame) = d.call_stack.last_mut() {
                    frame.line = *n;
                }
                stack.clear();
            }
            Instr::Return => {
                let value = match stack.pop() {
                    Some(slot) => resolve_slot(d, obj, &locals, slot)?,
                    None => return Err(RuntimeError::new("stack malformed on return")),
                };
                return Ok(value);
            }
            Instr::CallFunc { fidx, argc } => {
                let call_args = pop_args(d, obj, &locals, &mut stack, *argc as usize)?;
                let value = call(
                    d,
                    obj,
                    definer.clone(),
                    *fidx,
                    call_args,
                    player,
                    Some(obj),
                );
                stack.push(Slot::Val(value));
            }
            Instr::CallName { name, argc } => {
                let call_args = pop_args(d, obj, &locals, &mut stack, *argc as usize)?;
                let Some((target, program, fidx)) = resolve_function(d, obj, name) else {
                    return Err(RuntimeError::new(format!("unknown function {name}")));
                };
                let value = call(d, target, program, fidx, call_args, player, Some(obj));
                stack.push(Slot::Val(value));
            }
            Instr::CallSuper {
                inherit_idx,
                name,
                argc,
            }
            | Instr::CallParentNamed {
                inherit_idx,
                name,
                argc,
            } => {
                let call_args = pop_args(d, obj, &locals, &mut stack, *argc as usize)?;
                let parent = definer
                    .inherits
                    .get(*inherit_idx as usize)
                    .ok_or_else(|| RuntimeError::new("invalid inherit index"))?
                    .program
                    .clone();
                let Some((owner, fidx)) = parent.lookup_function(name) else {
                    return Err(RuntimeError::new(format!(
                        "parent function {name} disappeared"
                    )));
                };
                let value = call(d, obj, owner, fidx, call_args, player, Some(obj));
                stack.push(Slot::Val(value));
            }
            Instr::CallEfun { efun, argc } => {
                if *efun == Efun::Sscanf {
                    let value = sscanf_efun(d, obj, &mut locals, &mut stack, *argc)?;
                    stack.push(Slot::Val(value));
                } else {
                    let call_args = pop_args(d, obj, &locals, &mut stack, *argc as usize)?;
                    let cx = EfunCtx {
                        this: obj,
                        player,
                        caller,
                    };
                    let value = efuns::dispatch(d, &cx, *efun, call_args)?;
                    stack.push(Slot::Val(value));
                }
            }
            Instr::MakeArray { n } => {
                let elems = pop_args(d, obj, &locals, &mut stack, *n as usize)?;
                stack.push(Slot::Val(Value::Array(heap::array_from_elems(elems))));
            }
            Instr::MakeMapping { n } => {
                let mut flat = Vec::with_capacity(*n as usize * 2);
                for _ in 0..(*n as usize * 2) {
                    flat.push(pop_value(d, obj, &locals, &mut stack)?);
                }
                flat.reverse();
                let mapping = heap::new_mapping();
                {
                    let mut m = mapping.borrow_mut();
                    for pair in flat.chunks(2) {
                        let key = MapKey::from_value(&pair[0]).ok_or_else(|| {
                            RuntimeError::new("mapping keys must be integers, strings, or objects")
                        })?;
                        m.entries.insert(key, pair[1].clone());
                    }
                }
                stack.push(Slot::Val(Value::Mapping(mapping)));
            }
        }
    }
}

fn with_subscript_context(e: RuntimeError) -> RuntimeError {
    RuntimeError::new(format!("failed subscript reference: {}", e.message))
}

/// Translate a definer-relative global slot to an absolute slot in the
/// executing object's layout (the GST dance).
fn resolve_global(
    d: &Driver,
    obj: ObjRef,
    definer: &Rc<Program>,
    slot: u16,
) -> Result<usize, RuntimeError> {
    let o = d
        .objects
        .get(obj)
        .ok_or_else(|| RuntimeError::new("executing object is gone"))?;
    o.program.resolve_global(definer, slot).ok_or_else(|| {
        RuntimeError::new(format!(
            "global slot {slot} of {} does not map into {}",
            definer.path, o.program.path
        ))
    })
}

// ---- stack and l-value plumbing ----

fn pop_slot(stack: &mut Vec<Slot>) -> Result<Slot, RuntimeError> {
    stack
        .pop()
        .ok_or_else(|| RuntimeError::new("evaluation stack underflow"))
}

fn pop_lvalue(stack: &mut Vec<Slot>) -> Result<Lvalue, RuntimeError> {
    match pop_slot(stack)? {
        Slot::Lv(lv) => Ok(lv),
        Slot::Val(_) => Err(RuntimeError::new("assignment target is not assignable")),
    }
}

fn pop_value(
    d: &Driver,
    obj: ObjRef,
    locals: &[Value],
    stack: &mut Vec<Slot>,
) -> Result<Value, RuntimeError> {
    let slot = pop_slot(stack)?;
    resolve_slot(d, obj, locals, slot)
}

/// Pop `count` values pushed left-to-right.
fn pop_args(
    d: &Driver,
    obj: ObjRef,
    locals: &[Value],
    stack: &mut Vec<Slot>,
    count: usize,
) -> Result<Vec<Value>, RuntimeError> {
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        args.push(pop_value(d, obj, locals, stack)?);
    }
    args.reverse();
    Ok(args)
}

fn resolve_slot(
    d: &Driver,
    obj: ObjRef,
    locals: &[Value],
    slot: Slot,
) -> Result<Value, RuntimeError> {
    match slot {
        Slot::Val(v) => Ok(scrub(d, v)),
        Slot::Lv(lv) => read_lvalue(d, obj, locals, &lv),
    }
}

/// Dead object references read as integer 0.
fn scrub(d: &Driver, v: Value) -> Value {
    match v {
        Value::Object(r) if !d.objects.is_live(r) => Value::Int(0),
        other => other,
    }
}

pub fn read_lvalue(
    d: &Driver,
    obj: ObjRef,
    locals: &[Value],
    lv: &Lvalue,
) -> Result<Value, RuntimeError> {
    let value = match lv {
        Lvalue::Local(slot) => locals
            .get(*slot as usize)
            .cloned()
            .ok_or_else(|| RuntimeError::new("local variable index out of bounds"))?,
        Lvalue::Global(abs) => {
            let o = d
                .objects
                .get(obj)
                .ok_or_else(|| RuntimeError::new("executing object is gone"))?;
            o.globals
                .get(*abs)
                .cloned()
                .ok_or_else(|| RuntimeError::new("global variable index out of bounds"))?
        }
        Lvalue::Elem(array, index) => array
            .borrow()
            .elems
            .get(*index)
            .cloned()
            .unwrap_or(Value::Int(0)),
        Lvalue::Entry(mapping, key) => mapping
            .borrow()
            .entries
            .get(key)
            .cloned()
            .unwrap_or(Value::Int(0)),
    };
    Ok(scrub(d, value))
}

pub fn store_lvalue(
    d: &mut Driver,
    obj: ObjRef,
    locals: &mut [Value],
    lv: &Lvalue,
    value: Value,
) -> Result<(), RuntimeError> {
    match lv {
        Lvalue::Local(slot) => {
            *locals
                .get_mut(*slot as usize)
                .ok_or_else(|| RuntimeError::new("local variable index out of bounds"))? = value;
        }
        Lvalue::Global(abs) => {
            let o = d
                .objects
                .get_mut(obj)
                .ok_or_else(|| RuntimeError::new("executing object is gone"))?;
            *o.globals
                .get_mut(*abs)
                .ok_or_else(|| RuntimeError::new("global variable index out of bounds"))? = value;
            o.dirty = true;
        }
        Lvalue::Elem(array, index) => {
            let mut a = array.borrow_mut();
            if *index >= a.elems.len() {
                a.ensure_index(*index as i64)
                    .map_err(|e| RuntimeError::new(e.to_string()))?;
            }
            a.elems[*index] = value;
        }
        Lvalue::Entry(mapping, key) => {
            mapping.borrow_mut().entries.insert(key.clone(), value);
        }
    }
    Ok(())
}

/// Subscript a variable slot, auto-allocating on first use per its
/// declaration (arrays for array declarations, mappings otherwise).
/// Returns the container to write back when one was created.
fn subscript_variable(
    base: Value,
    decl: &LocalKind,
    key: Value,
) -> Result<(Option<Value>, Lvalue), RuntimeError> {
    match base {
        Value::Int(0) => {
            let created = match decl {
                LocalKind::Array { size } => {
                    let max = size.map(|n| n as usize);
                    Value::Array(heap::new_array(0, max))
                }
                _ => Value::Mapping(heap::new_mapping()),
            };
            let (_, lv) = subscript_value(created.clone(), key)?;
            Ok((Some(created), lv))
        }
        other => {
            let (_, lv) = subscript_value(other, key)?;
            Ok((None, lv))
        }
    }
}

/// Subscript an existing array or mapping value.
fn subscript_value(base: Value, key: Value) -> Result<(Value, Lvalue), RuntimeError> {
    match base {
        Value::Array(array) => {
            let Value::Int(index) = key else {
                return Err(RuntimeError::new("array index must be an integer"));
            };
            let index = array
                .borrow_mut()
                .ensure_index(index)
                .map_err(|e| RuntimeError::new(e.to_string()))?;
            Ok((Value::Array(array.clone()), Lvalue::Elem(array, index)))
        }
        Value::Mapping(mapping) => {
            let key = MapKey::from_value(&key).ok_or_else(|| {
                RuntimeError::new("mapping keys must be integers, strings, or objects")
            })?;
            mapping
                .borrow_mut()
                .entries
                .entry(key.clone())
                .or_insert(Value::Int(0));
            Ok((
                Value::Mapping(mapping.clone()),
                Lvalue::Entry(mapping, key),
            ))
        }
        other => Err(RuntimeError::new(format!(
            "subscript on a {} value",
            other.type_name()
        ))),
    }
}

// ---- operators ----

fn int_pair(left: &Value, right: &Value) -> Option<(i64, i64)> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some((*a, *b)),
        _ => None,
    }
}

/// The overloaded operator suite. String comparisons coerce integer 0 to
/// `""` on either side, matching the dialect's empty-string convention.
pub fn binary_op(op: BinOp, left: Value, right: Value) -> Result<Value, RuntimeError> {
    use BinOp::*;
    let type_err = |op: &str, l: &Value, r: &Value| {
        RuntimeError::new(format!(
            "bad operands for {op}: {} and {}",
            l.type_name(),
            r.type_name()
        ))
    };
    match op {
        Add => match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(*b))),
            (Value::Array(a), Value::Array(b)) => Ok(Value::Array(heap::array_concat(a, b))),
            (Value::Mapping(a), Value::Mapping(b)) => {
                Ok(Value::Mapping(heap::mapping_merge(a, b)))
            }
            _ => {
                // string concatenation with 0-as-"" on either side
                match (left.as_str_coerced(), right.as_str_coerced()) {
                    (Some(a), Some(b)) if matches!(&left, Value::Str(_)) || matches!(&right, Value::Str(_)) => {
                        let mut s = a.as_ref().to_string();
                        s.push_str(&b);
                        Ok(Value::str(s))
                    }
                    _ => Err(type_err("+", &left, &right)),
                }
            }
        },
        Sub => match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_sub(*b))),
            (Value::Array(a), Value::Array(b)) => Ok(Value::Array(heap::array_subtract(a, b))),
            (Value::Mapping(a), Value::Mapping(b)) => {
                Ok(Value::Mapping(heap::mapping_subtract(a, b)))
            }
            _ => Err(type_err("-", &left, &right)),
        },
        Mul | Div | Mod | BitAnd | BitOr | BitXor | Shl | Shr => {
            let (a, b) = int_pair(&left, &right)
                .ok_or_else(|| type_err(op_name(op), &left, &right))?;
            let result = match op {
                Mul => a.wrapping_mul(b),
                Div => {
                    if b == 0 {
                        return Err(RuntimeError::new("division by zero"));
                    }
                    a.wrapping_div(b)
                }
                Mod => {
                    if b == 0 {
                        return Err(RuntimeError::new("division by zero"));
                    }
                    a.wrapping_rem(b)
                }
                BitAnd => a & b,
                BitOr => a | b,
                BitXor => a ^ b,
                Shl => a.wrapping_shl(b as u32),
                Shr => a.wrapping_shr(b as u32),
                _ => unreachable!(),
            };
            Ok(Value::Int(result))
        }
        Eq | Ne => {
            let equal = match (&left, &right) {
                (Value::Str(_), _) | (_, Value::Str(_)) => {
                    match (left.as_str_coerced(), right.as_str_coerced()) {
                        (Some(a), Some(b)) => a == b,
                        _ => false,
                    }
                }
                (Value::Int(a), Value::Int(b)) => a == b,
                (Value::Object(a), Value::Object(b)) => a == b,
                (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
                (Value::Mapping(a), Value::Mapping(b)) => Rc::ptr_eq(a, b),
                _ => false,
            };
            Ok(Value::Int(i64::from(if op == Eq { equal } else { !equal })))
        }
        Lt | Le | Gt | Ge => {
            let ord = match (&left, &right) {
                (Value::Int(a), Value::Int(b)) => a.cmp(b),
                _ => match (left.as_str_coerced(), right.as_str_coerced()) {
                    (Some(a), Some(b)) => a.cmp(&b),
                    _ => return Err(type_err(op_name(op), &left, &right)),
                },
            };
            let result = match op {
                Lt => ord.is_lt(),
                Le => ord.is_le(),
                Gt => ord.is_gt(),
                Ge => ord.is_ge(),
                _ => unreachable!(),
            };
            Ok(Value::Int(i64::from(result)))
        }
        LogAnd => Ok(Value::Int(i64::from(
            left.is_truthy() && right.is_truthy(),
        ))),
        LogOr => Ok(Value::Int(i64::from(
            left.is_truthy() || right.is_truthy(),
        ))),
    }
}

fn op_name(op: BinOp) -> &'static str {
    use BinOp::*;
    match op {
        Add => "+",
        Sub => "-",
        Mul => "*",
        Div => "/",
        Mod => "%",
        BitAnd => "&",
        BitOr => "|",
        BitXor => "^",
        Shl => "<<",
        Shr => ">>",
        Eq => "==",
        Ne => "!=",
        Lt => "<",
        Le => "<=",
        Gt => ">",
        Ge => ">=",
        LogAnd => "&&",
        LogOr => "||",
    }
}

fn unary_op(op: UnOp, operand: Value) -> Result<Value, RuntimeError> {
    match op {
        UnOp::Not => Ok(Value::Int(i64::from(!operand.is_truthy()))),
        UnOp::BitNot => match operand {
            Value::Int(n) => Ok(Value::Int(!n)),
            other => Err(RuntimeError::new(format!(
                "bad operand for ~: {}",
                other.type_name()
            ))),
        },
        UnOp::Neg => match operand {
            Value::Int(n) => Ok(Value::Int(n.wrapping_neg())),
            other => Err(RuntimeError::new(format!(
                "bad operand for unary -: {}",
                other.type_name()
            ))),
        },
    }
}

/// `sscanf(input, format, lv...)` needs raw l-values for its output
/// arguments, so it bypasses the normal efun argument resolution.
fn sscanf_efun(
    d: &mut Driver,
    obj: ObjRef,
    locals: &mut Vec<Value>,
    stack: &mut Vec<Slot>,
    argc: u8,
) -> Result<Value, RuntimeError> {
    let mut slots = Vec::with_capacity(argc as usize);
    for _ in 0..argc {
        slots.push(pop_slot(stack)?);
    }
    slots.reverse();
    if slots.len() < 2 {
        return Err(RuntimeError::new("sscanf expects at least 2 arguments"));
    }
    let outputs: Vec<Slot> = slots.split_off(2);
    let format = resolve_slot(d, obj, locals, slots.pop().unwrap())?;
    let input = resolve_slot(d, obj, locals, slots.pop().unwrap())?;
    let (Some(input), Some(format)) = (input.as_str_coerced(), format.as_str_coerced()) else {
        return Err(RuntimeError::new("sscanf expects strings"));
    };
    let values = crate::sprintf::sscanf(&input, &format);
    let converted = values.len() as i64;
    for (slot, value) in outputs.into_iter().zip(values) {
        let Slot::Lv(lv) = slot else {
            return Err(RuntimeError::new("sscanf output is not assignable"));
        };
        store_lvalue(d, obj, locals, &lv, value)?;
    }
    Ok(Value::Int(converted))
}
