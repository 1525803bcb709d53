//! Verb registration efuns. Verbs route typed commands to handler
//! functions; `xverb`s match as a prefix of the first word (directions,
//! say-shortcuts).

use super::{EfunCtx, bool_result, opt_obj, str_result, want_int, want_str};
use crate::driver::Driver;
use crate::interp::RuntimeError;
use crate::object::Verb;
use cinder_core::{Efun, Value};

pub fn dispatch(
    d: &mut Driver,
    cx: &EfunCtx,
    efun: Efun,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    use Efun::*;
    match efun {
        AddVerb | AddXverb => {
            let name = want_str(efun, &args, 0)?;
            let func = want_str(efun, &args, 1)?;
            if name.is_empty() || func.is_empty() {
                return Ok(Value::Int(0));
            }
            if let Some(o) = d.objects.get_mut(cx.this) {
                o.verbs.retain(|v| v.name != name.as_ref());
                o.verbs.push(Verb {
                    name: name.as_ref().to_string(),
                    func: func.as_ref().to_string(),
                    xverb: efun == AddXverb,
                });
            }
            Ok(Value::Int(1))
        }
        RemoveVerb => {
            let name = want_str(efun, &args, 0)?;
            let mut removed = false;
            if let Some(o) = d.objects.get_mut(cx.this) {
                let before = o.verbs.len();
                o.verbs.retain(|v| v.name != name.as_ref());
                removed = o.verbs.len() != before;
            }
            Ok(bool_result(removed))
        }
        NextVerb => {
            // walk an object's verb list; an empty name starts over
            let Some(obj) = opt_obj(d, &args, 0) else {
                return Ok(Value::Int(0));
            };
            let name = want_str(efun, &args, 1)?;
            let Some(o) = d.objects.get(obj) else {
                return Ok(Value::Int(0));
            };
            let next = if name.is_empty() {
                o.verbs.first()
            } else {
                o.verbs
                    .iter()
                    .position(|v| v.name == name.as_ref())
                    .and_then(|i| o.verbs.get(i + 1))
            };
            Ok(str_result(
                next.map(|v| v.name.clone()).unwrap_or_default(),
            ))
        }
        SetLocalverbs => {
            let flag = want_int(efun, &args, 0)? != 0;
            if let Some(o) = d.objects.get_mut(cx.this) {
                o.local_verbs = flag;
            }
            Ok(Value::Int(1))
        }
        Localverbs => Ok(bool_result(
            opt_obj(d, &args, 0)
                .and_then(|o| d.objects.get(o))
                .is_some_and(|o| o.local_verbs),
        )),
        other => Err(RuntimeError::new(format!(
            "{} routed to the wrong handler",
            other.name()
        ))),
    }
}
