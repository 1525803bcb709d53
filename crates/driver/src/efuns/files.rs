//! File efuns. Every operation passes through the master object's
//! valid_read/valid_write callback exactly once before touching the
//! virtual filesystem; privileged callers and system calls bypass.

use super::{EfunCtx, bool_result, obj_result, str_result, want_int, want_obj, want_str};
use crate::driver::Driver;
use crate::interp::RuntimeError;
use cinder_core::heap::array_from_elems;
use cinder_core::{Efun, Value};

pub fn dispatch(
    d: &mut Driver,
    cx: &EfunCtx,
    efun: Efun,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    use Efun::*;
    let path = want_str(efun, &args, 0)?;
    let write_op = matches!(
        efun,
        WriteFile | Remove | Rename | Mkdir | Rmdir | Chmod | Chown
    );
    if !d.valid_io(&path, efun.name(), Some(cx.this), write_op) {
        return Err(RuntimeError::new(format!(
            "{}: permission denied for {path}",
            efun.name()
        )));
    }
    match efun {
        ReadFile => {
            let Ok(text) = d.vfs.read(&path) else {
                return Ok(Value::Int(0));
            };
            if args.len() == 1 {
                return Ok(str_result(text));
            }
            let start = want_int(efun, &args, 1)?.max(1) as usize;
            let count = if args.len() > 2 {
                want_int(efun, &args, 2)?.max(0) as usize
            } else {
                usize::MAX
            };
            let mut out = String::new();
            for line in text.lines().skip(start - 1).take(count) {
                out.push_str(line);
                out.push('\n');
            }
            Ok(str_result(out))
        }
        WriteFile => {
            let text = want_str(efun, &args, 1)?;
            Ok(bool_result(d.vfs.append(&path, &text).is_ok()))
        }
        Remove => Ok(bool_result(d.vfs.remove(&path).is_ok())),
        Rename => {
            let to = want_str(efun, &args, 1)?;
            // the destination is a write too
            if !d.valid_io(&to, efun.name(), Some(cx.this), true) {
                return Err(RuntimeError::new(format!(
                    "rename: permission denied for {to}"
                )));
            }
            Ok(bool_result(d.vfs.rename(&path, &to).is_ok()))
        }
        GetDir => match d.vfs.get_dir(&path) {
            Some(names) => Ok(Value::Array(array_from_elems(
                names.into_iter().map(Value::str).collect(),
            ))),
            None => Ok(Value::Int(0)),
        },
        FileSize => Ok(Value::Int(d.vfs.file_size(&path))),
        Mkdir => Ok(bool_result(d.vfs.mkdir(&path).is_ok())),
        Rmdir => Ok(bool_result(d.vfs.rmdir(&path).is_ok())),
        Chmod => {
            let bits = want_int(efun, &args, 1)?;
            Ok(bool_result(d.vfs.set_perms(&path, bits)))
        }
        Chown => {
            let owner = want_obj(d, efun, &args, 1)?;
            Ok(bool_result(d.vfs.set_owner(&path, Some(owner))))
        }
        Fstat => Ok(Value::Int(d.vfs.stat(&path))),
        Fowner => Ok(obj_result(
            d.vfs.owner(&path).filter(|o| d.objects.is_live(*o)),
        )),
        other => Err(RuntimeError::new(format!(
            "{} routed to the wrong handler",
            other.name()
        ))),
    }
}
