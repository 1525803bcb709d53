//! The efun suite: driver built-ins callable from scripts.
//!
//! One dispatch table routes every efun through handlers grouped by
//! domain. Argument counts are validated here against the registry;
//! individual handlers validate types. Handlers follow the dialect
//! conventions: integer 0 passes for an absent string or object, and
//! string results collapse to integer 0 when empty.

mod arrays;
mod device;
mod files;
mod mappings;
mod object_ops;
mod strings;
mod timing;
mod verbs;

use crate::driver::Driver;
use crate::interp::RuntimeError;
use cinder_core::{Efun, ObjRef, Value};
use std::rc::Rc;

/// Execution context an efun runs in.
#[derive(Debug, Clone, Copy)]
pub struct EfunCtx {
    /// The object whose code invoked the efun.
    pub this: ObjRef,
    pub player: Option<ObjRef>,
    pub caller: Option<ObjRef>,
}

pub fn dispatch(
    d: &mut Driver,
    cx: &EfunCtx,
    efun: Efun,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    let (min, max) = efun.arity();
    if args.len() < min as usize || args.len() > max as usize {
        return Err(RuntimeError::new(format!(
            "{} called with {} argument(s)",
            efun.name(),
            args.len()
        )));
    }
    use Efun::*;
    match efun {
        // identity and the object tree
        ThisObject | ThisPlayer | CallerObject | CloneObject | Destruct | MoveObject
        | Location | Contents | NextObject | Present | Attach | Detach | ThisComponent
        | Prototype | Children | Objects | AllInventory | Itoo | Otoi | SetPriv | Priv
        | SetInteractive | Interactive | InEditor | IsLegal | GetMaster | IsMaster | CallOther
        | Command | CompileObject | CompileString | Typeof | Random | Sysctl | Syslog
        | Syswrite | SaveValue | RestoreValue | SaveObject | RestoreObject => {
            object_ops::dispatch(d, cx, efun, args)
        }

        Strlen | Leftstr | Rightstr | Midstr | Subst | InStr | Upcase | Downcase | Atoi
        | Itoa | Otoa | Atoo | Sprintf | ReplaceString | Crypt | Chr | Asc => {
            strings::dispatch(d, cx, efun, args)
        }

        Sizeof | Implode | Explode | MemberArray | SortArray | Reverse | UniqueArray => {
            arrays::dispatch(d, cx, efun, args)
        }

        Keys | Values | Member | MapDelete => mappings::dispatch(d, cx, efun, args),

        ReadFile | WriteFile | Remove | Rename | GetDir | FileSize | Mkdir | Rmdir | Chmod
        | Chown | Fstat | Fowner => files::dispatch(d, cx, efun, args),

        Users | NextWho | Connected | GetDevconn | SendDevice | SendPrompt
        | ReconnectDevice | DisconnectDevice | FlushDevice | QueryTerminal | GetMssp
        | SetMssp | GetDevidle | GetConntime | GetDevport | RedirectInput | GetInputFunc
        | InputTo => device::dispatch(d, cx, efun, args),

        Time | Mktime | Alarm | RemoveAlarm | SetHeartBeat => timing::dispatch(d, cx, efun, args),

        AddVerb | AddXverb | RemoveVerb | NextVerb | SetLocalverbs | Localverbs => {
            verbs::dispatch(d, cx, efun, args)
        }

        // handled inside the interpreter (needs raw l-values)
        Sscanf => Err(RuntimeError::new("sscanf dispatched out of band")),
    }
}

// ---- argument helpers shared by the handler modules ----

fn bad_arg(efun: Efun, index: usize, wanted: &str, got: &Value) -> RuntimeError {
    RuntimeError::new(format!(
        "{}: argument {} must be {wanted}, got {}",
        efun.name(),
        index + 1,
        got.type_name()
    ))
}

/// String argument with the 0-for-"" coercion.
pub(crate) fn want_str(efun: Efun, args: &[Value], i: usize) -> Result<Rc<str>, RuntimeError> {
    let v = args.get(i).cloned().unwrap_or(Value::Int(0));
    v.as_str_coerced()
        .ok_or_else(|| bad_arg(efun, i, "a string", &v))
}

pub(crate) fn want_int(efun: Efun, args: &[Value], i: usize) -> Result<i64, RuntimeError> {
    match args.get(i) {
        Some(Value::Int(n)) => Ok(*n),
        Some(other) => Err(bad_arg(efun, i, "an integer", other)),
        None => Ok(0),
    }
}

/// Object argument; integer 0 and stale references yield `None`.
pub(crate) fn opt_obj(d: &Driver, args: &[Value], i: usize) -> Option<ObjRef> {
    match args.get(i) {
        Some(Value::Object(r)) if d.objects.is_live(*r) => Some(*r),
        _ => None,
    }
}

pub(crate) fn want_obj(
    d: &Driver,
    efun: Efun,
    args: &[Value],
    i: usize,
) -> Result<ObjRef, RuntimeError> {
    let v = args.get(i).cloned().unwrap_or(Value::Int(0));
    match v {
        Value::Object(r) if d.objects.is_live(r) => Ok(r),
        other => Err(bad_arg(efun, i, "an object", &other)),
    }
}

/// Empty strings become integer 0 in return position.
pub(crate) fn str_result(s: String) -> Value {
    if s.is_empty() {
        Value::Int(0)
    } else {
        Value::str(s)
    }
}

pub(crate) fn obj_result(obj: Option<ObjRef>) -> Value {
    match obj {
        Some(r) => Value::Object(r),
        None => Value::Int(0),
    }
}

pub(crate) fn bool_result(b: bool) -> Value {
    Value::Int(i64::from(b))
}
