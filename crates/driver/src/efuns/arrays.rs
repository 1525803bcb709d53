//! Array efuns. All of these build fresh arrays; only subscript stores
//! and `+=` mutate in place.

use super::{EfunCtx, str_result, want_str};
use crate::driver::Driver;
use crate::interp::RuntimeError;
use cinder_core::heap::array_from_elems;
use cinder_core::{Efun, Value};

pub fn dispatch(
    _d: &mut Driver,
    _cx: &EfunCtx,
    efun: Efun,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    use Efun::*;
    match efun {
        Sizeof => Ok(Value::Int(match args.first() {
            Some(Value::Array(a)) => a.borrow().elems.len() as i64,
            Some(Value::Mapping(m)) => m.borrow().entries.len() as i64,
            Some(Value::Str(s)) => s.chars().count() as i64,
            _ => 0,
        })),
        Implode => {
            let Some(Value::Array(a)) = args.first() else {
                return Err(RuntimeError::new("implode: first argument must be an array"));
            };
            let sep = want_str(efun, &args, 1)?;
            let mut parts = Vec::new();
            for elem in &a.borrow().elems {
                match elem {
                    Value::Str(s) => parts.push(s.as_ref().to_string()),
                    Value::Int(n) => parts.push(n.to_string()),
                    _ => {}
                }
            }
            Ok(str_result(parts.join(&sep)))
        }
        Explode => {
            let s = want_str(efun, &args, 0)?;
            let sep = want_str(efun, &args, 1)?;
            let parts: Vec<Value> = if sep.is_empty() {
                s.chars().map(|c| Value::str(c.to_string())).collect()
            } else {
                s.split(sep.as_ref()).map(Value::str).collect()
            };
            Ok(Value::Array(array_from_elems(parts)))
        }
        MemberArray => {
            let needle = args.first().cloned().unwrap_or(Value::Int(0));
            let Some(Value::Array(a)) = args.get(1) else {
                return Err(RuntimeError::new(
                    "member_array: second argument must be an array",
                ));
            };
            let idx = a
                .borrow()
                .elems
                .iter()
                .position(|v| *v == needle)
                .map(|i| i as i64)
                .unwrap_or(-1);
            Ok(Value::Int(idx))
        }
        SortArray => {
            let Some(Value::Array(a)) = args.first() else {
                return Err(RuntimeError::new("sort_array: first argument must be an array"));
            };
            let descending = matches!(args.get(1), Some(Value::Int(n)) if *n < 0);
            let mut elems = a.borrow().elems.clone();
            elems.sort_by(compare_values);
            if descending {
                elems.reverse();
            }
            Ok(Value::Array(array_from_elems(elems)))
        }
        Reverse => match args.first() {
            Some(Value::Array(a)) => {
                let mut elems = a.borrow().elems.clone();
                elems.reverse();
                Ok(Value::Array(array_from_elems(elems)))
            }
            Some(other) => {
                let s = other
                    .as_str_coerced()
                    .ok_or_else(|| RuntimeError::new("reverse: expected an array or string"))?;
                Ok(str_result(s.chars().rev().collect()))
            }
            None => Ok(Value::Int(0)),
        },
        UniqueArray => {
            let Some(Value::Array(a)) = args.first() else {
                return Err(RuntimeError::new(
                    "unique_array: first argument must be an array",
                ));
            };
            let mut elems: Vec<Value> = Vec::new();
            for v in &a.borrow().elems {
                if !elems.contains(v) {
                    elems.push(v.clone());
                }
            }
            Ok(Value::Array(array_from_elems(elems)))
        }
        other => Err(RuntimeError::new(format!(
            "{} routed to the wrong handler",
            other.name()
        ))),
    }
}

/// Sort order: integers first (numeric), then strings (lexicographic),
/// then everything else in stable positions.
fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Str(x), Value::Str(y)) => x.cmp(y),
        (Value::Int(_), _) => Ordering::Less,
        (_, Value::Int(_)) => Ordering::Greater,
        (Value::Str(_), _) => Ordering::Less,
        (_, Value::Str(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use cinder_core::ObjRef;

    fn run(efun: Efun, args: Vec<Value>) -> Value {
        let mut d = Driver::new(Config::default());
        let cx = EfunCtx {
            this: ObjRef {
                slot: 0,
                generation: 0,
            },
            player: None,
            caller: None,
        };
        dispatch(&mut d, &cx, efun, args).unwrap()
    }

    fn arr(values: &[i64]) -> Value {
        Value::Array(array_from_elems(values.iter().map(|n| Value::Int(*n)).collect()))
    }

    #[test]
    fn test_implode_explode() {
        let a = Value::Array(array_from_elems(vec![
            Value::str("a"),
            Value::str("b"),
            Value::Int(3),
        ]));
        assert_eq!(
            run(Efun::Implode, vec![a, Value::str(", ")]),
            Value::str("a, b, 3")
        );
        let exploded = run(Efun::Explode, vec![Value::str("a:b:c"), Value::str(":")]);
        let Value::Array(parts) = exploded else {
            panic!("expected array");
        };
        assert_eq!(parts.borrow().elems.len(), 3);
        assert_eq!(parts.borrow().elems[2], Value::str("c"));
    }

    #[test]
    fn test_member_array_deep_equality() {
        let haystack = Value::Array(array_from_elems(vec![
            Value::Int(1),
            Value::str("x"),
            Value::Int(3),
        ]));
        assert_eq!(
            run(Efun::MemberArray, vec![Value::str("x"), haystack.clone()]),
            Value::Int(1)
        );
        assert_eq!(
            run(Efun::MemberArray, vec![Value::Int(9), haystack]),
            Value::Int(-1)
        );
    }

    #[test]
    fn test_sort_and_reverse_leave_input_alone() {
        let input = arr(&[3, 1, 2]);
        let sorted = run(Efun::SortArray, vec![input.clone()]);
        assert_eq!(sorted, arr(&[1, 2, 3]));
        assert_eq!(input, arr(&[3, 1, 2]));
        assert_eq!(run(Efun::Reverse, vec![input.clone()]), arr(&[2, 1, 3]));
        let desc = run(Efun::SortArray, vec![input, Value::Int(-1)]);
        assert_eq!(desc, arr(&[3, 2, 1]));
    }

    #[test]
    fn test_unique_keeps_first_occurrence() {
        assert_eq!(
            run(Efun::UniqueArray, vec![arr(&[1, 2, 1, 3, 2])]),
            arr(&[1, 2, 3])
        );
    }

    #[test]
    fn test_sizeof_variants() {
        assert_eq!(run(Efun::Sizeof, vec![arr(&[1, 2])]), Value::Int(2));
        assert_eq!(run(Efun::Sizeof, vec![Value::str("abc")]), Value::Int(3));
        assert_eq!(run(Efun::Sizeof, vec![Value::Int(0)]), Value::Int(0));
    }

    #[test]
    fn test_reverse_string() {
        assert_eq!(
            run(Efun::Reverse, vec![Value::str("abc")]),
            Value::str("cba")
        );
    }
}
