//! Connection and terminal efuns.

use super::{EfunCtx, bool_result, obj_result, opt_obj, str_result, want_obj, want_str};
use crate::driver::Driver;
use crate::interp::RuntimeError;
use crate::object::InputRedirect;
use cinder_core::heap::{array_from_elems, new_mapping};
use cinder_core::{Efun, MapKey, ObjRef, Value};

pub fn dispatch(
    d: &mut Driver,
    cx: &EfunCtx,
    efun: Efun,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    use Efun::*;
    match efun {
        Users => {
            let elems = d
                .conns
                .iter()
                .filter_map(|(_, c)| c.obj)
                .filter(|o| d.objects.is_live(*o))
                .map(Value::Object)
                .collect();
            Ok(Value::Array(array_from_elems(elems)))
        }
        NextWho => {
            // walk connected objects in connection order; 0 starts over
            let connected: Vec<ObjRef> = d
                .conns
                .iter()
                .filter_map(|(_, c)| c.obj)
                .filter(|o| d.objects.is_live(*o))
                .collect();
            match opt_obj(d, &args, 0) {
                None => Ok(obj_result(connected.first().copied())),
                Some(current) => {
                    let next = connected
                        .iter()
                        .position(|o| *o == current)
                        .and_then(|i| connected.get(i + 1))
                        .copied();
                    Ok(obj_result(next))
                }
            }
        }
        Connected => Ok(bool_result(
            opt_obj(d, &args, 0).is_some_and(|o| d.conn_of(o).is_some()),
        )),
        GetDevconn => {
            let Some(obj) = opt_obj(d, &args, 0) else {
                return Ok(Value::Int(0));
            };
            let addr = d
                .conn_of(obj)
                .and_then(|i| d.conns.get(i))
                .map(|c| c.peer.ip().to_string());
            Ok(str_result(addr.unwrap_or_default()))
        }
        SendDevice => {
            let obj = want_obj(d, efun, &args, 0)?;
            let text = want_str(efun, &args, 1)?;
            d.send_to_object(obj, &text);
            Ok(Value::Int(1))
        }
        SendPrompt => {
            // prompts are unflushed writes; the next tick carries them
            let obj = want_obj(d, efun, &args, 0)?;
            let text = want_str(efun, &args, 1)?;
            d.send_to_object(obj, &text);
            Ok(Value::Int(1))
        }
        ReconnectDevice => {
            let (src, dst) = if args.len() == 1 {
                (cx.this, want_obj(d, efun, &args, 0)?)
            } else {
                (want_obj(d, efun, &args, 0)?, want_obj(d, efun, &args, 1)?)
            };
            // shell convention: 0 on success, nonzero on failure
            Ok(bool_result(!d.reconnect_device(src, dst)))
        }
        DisconnectDevice => {
            let target = opt_obj(d, &args, 0).unwrap_or(cx.this);
            d.disconnect_device(target);
            Ok(Value::Int(1))
        }
        FlushDevice => {
            let target = opt_obj(d, &args, 0).unwrap_or(cx.this);
            if let Some(idx) = d.conn_of(target) {
                d.conns.flush_all(idx);
            }
            Ok(Value::Int(1))
        }
        QueryTerminal => {
            let Some(idx) = opt_obj(d, &args, 0).and_then(|o| d.conn_of(o)) else {
                return Ok(Value::Int(0));
            };
            let Some(conn) = d.conns.get(idx) else {
                return Ok(Value::Int(0));
            };
            let t = &conn.telnet;
            let m = new_mapping();
            {
                let mut entries = m.borrow_mut();
                let mut put = |k: &str, v: Value| {
                    entries.entries.insert(MapKey::Str(k.into()), v);
                };
                put("term_client", Value::str(t.term_client.clone()));
                put("term_type", Value::str(t.term_type.clone()));
                put("term_support", Value::Int(t.term_support));
                put("width", Value::Int(t.width));
                put("height", Value::Int(t.height));
                put("naws", Value::Int(i64::from(t.naws)));
                put("ttype", Value::Int(i64::from(t.ttype)));
                put("echo", Value::Int(i64::from(t.echo)));
                put("sga", Value::Int(i64::from(t.sga)));
            }
            Ok(Value::Mapping(m))
        }
        GetMssp => {
            let m = new_mapping();
            {
                let mut entries = m.borrow_mut();
                for (k, v) in &d.mssp {
                    entries
                        .entries
                        .insert(MapKey::Str(k.as_str().into()), Value::str(v.clone()));
                }
            }
            Ok(Value::Mapping(m))
        }
        SetMssp => match args.first() {
            Some(Value::Mapping(m)) => {
                let mut vars = Vec::new();
                for (k, v) in &m.borrow().entries {
                    let name = match k {
                        MapKey::Str(s) => s.as_ref().to_string(),
                        MapKey::Int(n) => n.to_string(),
                        MapKey::Object(_) => continue,
                    };
                    let value = match v {
                        Value::Str(s) => s.as_ref().to_string(),
                        Value::Int(n) => n.to_string(),
                        _ => continue,
                    };
                    vars.push((name, value));
                }
                vars.sort();
                d.mssp = vars;
                Ok(Value::Int(1))
            }
            Some(Value::Int(0)) => {
                d.mssp.clear();
                Ok(Value::Int(1))
            }
            _ => Ok(Value::Int(0)),
        },
        GetDevidle => {
            let Some(obj) = opt_obj(d, &args, 0) else {
                return Ok(Value::Int(-1));
            };
            Ok(Value::Int(d.device_idle(obj)))
        }
        GetConntime => {
            let Some(obj) = opt_obj(d, &args, 0) else {
                return Ok(Value::Int(-1));
            };
            Ok(Value::Int(d.device_conntime(obj)))
        }
        GetDevport => {
            let connected = opt_obj(d, &args, 0).is_some_and(|o| d.conn_of(o).is_some());
            Ok(Value::Int(if connected {
                i64::from(d.config.port)
            } else {
                -1
            }))
        }
        RedirectInput => {
            // persistent diversion of this object's own device; an empty
            // function name clears it
            let func = match args.first() {
                Some(Value::Int(0)) => None,
                _ => Some(want_str(efun, &args, 0)?),
            };
            if let Some(o) = d.objects.get_mut(cx.this) {
                o.input_redirect = func.map(|f| InputRedirect {
                    target: cx.this,
                    func: f.as_ref().to_string(),
                    sticky: true,
                });
            }
            Ok(Value::Int(1))
        }
        GetInputFunc => {
            let Some(obj) = opt_obj(d, &args, 0) else {
                return Ok(Value::Int(0));
            };
            let func = d
                .objects
                .get(obj)
                .and_then(|o| o.input_redirect.as_ref())
                .map(|r| r.func.clone());
            Ok(str_result(func.unwrap_or_default()))
        }
        InputTo => {
            // divert the player's next line to target.func
            let target = want_obj(d, efun, &args, 0)?;
            let func = want_str(efun, &args, 1)?;
            let Some(player) = cx.player.filter(|p| d.objects.is_live(*p)) else {
                return Ok(Value::Int(0));
            };
            if let Some(o) = d.objects.get_mut(player) {
                o.input_redirect = Some(InputRedirect {
                    target,
                    func: func.as_ref().to_string(),
                    sticky: false,
                });
                Ok(Value::Int(1))
            } else {
                Ok(Value::Int(0))
            }
        }
        other => Err(RuntimeError::new(format!(
            "{} routed to the wrong handler",
            other.name()
        ))),
    }
}
