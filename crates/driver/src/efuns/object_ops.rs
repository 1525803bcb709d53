//! Identity, lifecycle, dispatch, and administration efuns.

use super::{EfunCtx, bool_result, obj_result, opt_obj, str_result, want_int, want_obj, want_str};
use crate::driver::Driver;
use crate::interp::{self, RuntimeError};
use crate::report;
use crate::serialize;
use cinder_core::heap::array_from_elems;
use cinder_core::{Efun, Value};
use rand::Rng;
use tracing::info;

/// Driver version reported by `sysctl(8)`.
pub const DRIVER_VERSION: i64 = 300;

pub fn dispatch(
    d: &mut Driver,
    cx: &EfunCtx,
    efun: Efun,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    use Efun::*;
    match efun {
        ThisObject => Ok(Value::Object(cx.this)),
        ThisPlayer => Ok(obj_result(cx.player.filter(|p| d.objects.is_live(*p)))),
        CallerObject => Ok(obj_result(cx.caller.filter(|c| d.objects.is_live(*c)))),

        CloneObject => {
            let path = want_str(efun, &args, 0)?;
            match d.clone_object(&path) {
                Ok(obj) => Ok(Value::Object(obj)),
                Err(e) => {
                    report::compile_error(d, cx.player, &e);
                    Ok(Value::Int(0))
                }
            }
        }
        Destruct => {
            if let Some(obj) = opt_obj(d, &args, 0) {
                d.queue_destruct(obj);
            }
            Ok(Value::Int(0))
        }
        MoveObject => {
            let obj = want_obj(d, efun, &args, 0)?;
            let dest = want_obj(d, efun, &args, 1)?;
            Ok(bool_result(d.move_object(obj, dest)))
        }
        Location => {
            let obj = opt_obj(d, &args, 0);
            Ok(obj_result(
                obj.and_then(|o| d.objects.get(o)).and_then(|o| o.location),
            ))
        }
        Contents => {
            let obj = opt_obj(d, &args, 0);
            Ok(obj_result(
                obj.and_then(|o| d.objects.get(o)).and_then(|o| o.contents),
            ))
        }
        NextObject => {
            let obj = opt_obj(d, &args, 0);
            Ok(obj_result(
                obj.and_then(|o| d.objects.get(o))
                    .and_then(|o| o.next_object),
            ))
        }
        AllInventory => {
            let mut elems = Vec::new();
            let mut cursor = opt_obj(d, &args, 0)
                .and_then(|o| d.objects.get(o))
                .and_then(|o| o.contents);
            while let Some(c) = cursor {
                elems.push(Value::Object(c));
                cursor = d.objects.get(c).and_then(|o| o.next_object);
            }
            Ok(Value::Array(array_from_elems(elems)))
        }
        Present => {
            // with one argument, both the caller's inventory and its
            // surroundings are searched
            let containers: Vec<_> = match opt_obj(d, &args, 1) {
                Some(c) => vec![c],
                None => {
                    let mut v = vec![cx.this];
                    if let Some(loc) = d.objects.get(cx.this).and_then(|o| o.location) {
                        v.push(loc);
                    }
                    v
                }
            };
            match args.first() {
                Some(Value::Object(r)) => {
                    let found = d.objects.is_live(*r)
                        && d.objects
                            .get(*r)
                            .and_then(|o| o.location)
                            .is_some_and(|loc| containers.contains(&loc));
                    Ok(obj_result(found.then_some(*r)))
                }
                _ => {
                    let id = want_str(efun, &args, 0)?;
                    for container in containers {
                        let mut cursor = d.objects.get(container).and_then(|o| o.contents);
                        while let Some(c) = cursor {
                            let hit = interp::call_named(
                                d,
                                c,
                                "id",
                                vec![Value::Str(id.clone())],
                                cx.player,
                                Some(cx.this),
                            );
                            if hit.is_some_and(|v| v.is_truthy()) {
                                return Ok(Value::Object(c));
                            }
                            cursor = d.objects.get(c).and_then(|o| o.next_object);
                        }
                    }
                    Ok(Value::Int(0))
                }
            }
        }

        Attach => {
            let master = want_obj(d, efun, &args, 0)?;
            let allowed = interp::call_named(
                d,
                master,
                "allow_attach",
                Vec::new(),
                cx.player,
                Some(cx.this),
            );
            if allowed.is_some_and(|v| v.is_truthy()) {
                if let Some(o) = d.objects.get_mut(cx.this) {
                    o.attachee = Some(master);
                }
                Ok(Value::Int(1))
            } else {
                Ok(Value::Int(0))
            }
        }
        Detach => {
            let target = opt_obj(d, &args, 0).unwrap_or(cx.this);
            if let Some(o) = d.objects.get_mut(target) {
                // the auto object stays; detach only removes an explicit
                // attachment above it
                o.attachee = d.auto.filter(|a| Some(*a) != Some(target));
            }
            Ok(Value::Int(0))
        }
        ThisComponent => Ok(obj_result(
            d.objects.get(cx.this).and_then(|o| o.attachee),
        )),

        Prototype => Ok(bool_result(
            opt_obj(d, &args, 0)
                .and_then(|o| d.objects.get(o))
                .is_some_and(|o| o.is_prototype),
        )),
        Children => {
            let path = want_str(efun, &args, 0)?;
            let path = crate::vfs::normalize(&path).unwrap_or_default();
            let elems = d
                .objects
                .iter()
                .filter(|(_, o)| !o.is_prototype && o.program.path.as_ref() == path)
                .map(|(r, _)| Value::Object(r))
                .collect();
            Ok(Value::Array(array_from_elems(elems)))
        }
        Objects => {
            let elems = d.objects.iter().map(|(r, _)| Value::Object(r)).collect();
            Ok(Value::Array(array_from_elems(elems)))
        }

        Itoo => {
            let refno = want_int(efun, &args, 0)?;
            Ok(obj_result(d.objects.find_by_refno(refno)))
        }
        Otoi => Ok(Value::Int(
            opt_obj(d, &args, 0)
                .and_then(|o| d.objects.get(o))
                .map(|o| o.refno)
                .unwrap_or(0),
        )),

        SetPriv => {
            let target = want_obj(d, efun, &args, 0)?;
            let flag = want_int(efun, &args, 1)? != 0;
            let this_priv = d.objects.get(cx.this).is_some_and(|o| o.privileged);
            if !this_priv && Some(cx.this) != d.boot {
                return Err(RuntimeError::new("set_priv: permission denied"));
            }
            if let Some(o) = d.objects.get_mut(target) {
                o.privileged = flag;
            }
            Ok(Value::Int(1))
        }
        Priv => Ok(bool_result(
            opt_obj(d, &args, 0)
                .and_then(|o| d.objects.get(o))
                .is_some_and(|o| o.privileged),
        )),
        SetInteractive => {
            let target = want_obj(d, efun, &args, 0)?;
            let flag = want_int(efun, &args, 1)? != 0;
            if let Some(o) = d.objects.get_mut(target) {
                o.interactive = flag;
            }
            Ok(Value::Int(1))
        }
        Interactive => Ok(bool_result(
            opt_obj(d, &args, 0)
                .and_then(|o| d.objects.get(o))
                .is_some_and(|o| o.interactive),
        )),
        InEditor => Ok(Value::Int(0)),

        IsLegal => {
            let name = want_str(efun, &args, 0)?;
            let legal = !name.is_empty()
                && !name.contains("..")
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "_-./".contains(c));
            Ok(bool_result(legal))
        }
        GetMaster => Ok(obj_result(d.boot)),
        IsMaster => Ok(bool_result(opt_obj(d, &args, 0).is_some_and(|o| Some(o) == d.boot))),

        CallOther => {
            let target = match args.first() {
                Some(Value::Object(r)) if d.objects.is_live(*r) => *r,
                Some(Value::Str(path)) => {
                    // a path argument addresses the prototype, loading
                    // it on first use
                    match d.object_by_name(path) {
                        Some(obj) => obj,
                        None if !path.contains('#') => match d.ensure_program(path) {
                            Ok(proto) => proto,
                            Err(e) => {
                                report::compile_error(d, cx.player, &e);
                                return Ok(Value::Int(0));
                            }
                        },
                        None => return Ok(Value::Int(0)),
                    }
                }
                _ => return Ok(Value::Int(0)),
            };
            let func = want_str(efun, &args, 1)?;
            let call_args: Vec<Value> = args[2..].to_vec();
            let Some((exec, program, fidx)) = interp::resolve_function(d, target, &func) else {
                return Ok(Value::Int(0));
            };
            if program.functions[fidx as usize].is_static {
                return Ok(Value::Int(0));
            }
            Ok(interp::call(
                d,
                exec,
                program,
                fidx,
                call_args,
                cx.player,
                Some(cx.this),
            ))
        }
        Command => {
            let target = want_obj(d, efun, &args, 0)?;
            let line = want_str(efun, &args, 1)?;
            d.queue_command(target, &line);
            Ok(Value::Int(1))
        }
        CompileObject => {
            let path = want_str(efun, &args, 0)?;
            match d.recompile(&path) {
                Ok(proto) => Ok(Value::Object(proto)),
                Err(e) => {
                    report::compile_error(d, cx.player, &e);
                    Ok(Value::Int(0))
                }
            }
        }
        CompileString => {
            let code = want_str(efun, &args, 0)?;
            match d.compile_eval_string(&code) {
                Ok(obj) => Ok(Value::Object(obj)),
                Err(e) => {
                    report::compile_error(d, cx.player, &e);
                    Ok(Value::Int(0))
                }
            }
        }

        Typeof => Ok(Value::Int(
            args.first().map(|v| v.type_code()).unwrap_or(0),
        )),
        Random => {
            let n = want_int(efun, &args, 0)?;
            if n <= 0 {
                Ok(Value::Int(0))
            } else {
                Ok(Value::Int(rand::thread_rng().gen_range(0..n)))
            }
        }

        Sysctl => sysctl(d, cx, &args),
        Syslog => {
            let text = want_str(efun, &args, 0)?;
            let who = d.object_name(cx.this).unwrap_or_default();
            info!(target: "cinder::script", object = %who, "{text}");
            Ok(Value::Int(1))
        }
        Syswrite => {
            let text = want_str(efun, &args, 0)?;
            println!("{text}");
            info!(target: "cinder::script", "{text}");
            Ok(Value::Int(1))
        }

        SaveValue => {
            let value = args.first().cloned().unwrap_or(Value::Int(0));
            Ok(str_result(serialize::save_value(d, &value)?))
        }
        RestoreValue => {
            let text = want_str(efun, &args, 0)?;
            serialize::restore_value(&text)
        }
        SaveObject => {
            let path = want_str(efun, &args, 0)?;
            if !d.valid_io(&path, "save_object", Some(cx.this), true) {
                return Err(RuntimeError::new("save_object: permission denied"));
            }
            let text = crate::db::save_object_record(d, cx.this)?;
            d.vfs
                .write(&path, &text)
                .map_err(|e| RuntimeError::new(format!("save_object: {e}")))?;
            Ok(Value::Int(1))
        }
        RestoreObject => {
            let path = want_str(efun, &args, 0)?;
            if !d.valid_io(&path, "restore_object", Some(cx.this), false) {
                return Err(RuntimeError::new("restore_object: permission denied"));
            }
            let Ok(text) = d.vfs.read(&path) else {
                return Ok(Value::Int(0));
            };
            crate::db::restore_object_record(d, cx.this, &text)?;
            Ok(Value::Int(1))
        }

        other => Err(RuntimeError::new(format!(
            "{} routed to the wrong handler",
            other.name()
        ))),
    }
}

fn sysctl(d: &mut Driver, cx: &EfunCtx, args: &[Value]) -> Result<Value, RuntimeError> {
    let privileged =
        d.objects.get(cx.this).is_some_and(|o| o.privileged) || Some(cx.this) == d.boot;
    if !privileged {
        return Err(RuntimeError::new("sysctl: permission denied"));
    }
    let op = want_int(Efun::Sysctl, args, 0)?;
    match op {
        0 => {
            d.save_requested = true;
            Ok(Value::Int(1))
        }
        1 => {
            d.shutdown = Some(0);
            Ok(Value::Int(1))
        }
        2 => {
            d.panic_requested = true;
            Ok(Value::Int(1))
        }
        3 => {
            let mut s = String::new();
            for a in &d.alarms {
                let name = d.object_name(a.obj).unwrap_or_default();
                s.push_str(&format!("{} {} in {}s\n", name, a.func, a.due - d.now));
            }
            Ok(str_result(s))
        }
        4 => {
            let mut s = String::new();
            for c in &d.commands {
                let name = d.object_name(c.obj).unwrap_or_default();
                s.push_str(&format!("{name}: {}\n", c.line));
            }
            Ok(str_result(s))
        }
        5 => {
            let mut s = String::new();
            for obj in &d.destruct_queue {
                if let Some(name) = d.object_name(*obj) {
                    s.push_str(&name);
                    s.push('\n');
                }
            }
            Ok(str_result(s))
        }
        6 => {
            d.cycles.use_hard = false;
            Ok(Value::Int(1))
        }
        7 => {
            d.cycles.use_soft = false;
            Ok(Value::Int(1))
        }
        8 => Ok(Value::Int(DRIVER_VERSION)),
        _ => Ok(Value::Int(0)),
    }
}
