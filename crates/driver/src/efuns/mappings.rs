//! Mapping efuns. `keys` and `values` take one snapshot each, index
//! aligned: `values(m)[i]` belongs to `keys(m)[i]`.

use super::EfunCtx;
use crate::driver::Driver;
use crate::interp::RuntimeError;
use cinder_core::heap::{array_from_elems, mapping_pairs};
use cinder_core::{Efun, MapKey, Value};

pub fn dispatch(
    _d: &mut Driver,
    _cx: &EfunCtx,
    efun: Efun,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    use Efun::*;
    let Some(Value::Mapping(m)) = args.first() else {
        // mapping efuns on a never-assigned variable see integer 0
        return Ok(match efun {
            Keys | Values => Value::Array(array_from_elems(Vec::new())),
            _ => Value::Int(0),
        });
    };
    match efun {
        Keys => {
            let (keys, _) = mapping_pairs(m);
            Ok(Value::Array(array_from_elems(keys)))
        }
        Values => {
            let (_, values) = mapping_pairs(m);
            Ok(Value::Array(array_from_elems(values)))
        }
        Member => {
            let key = args.get(1).cloned().unwrap_or(Value::Int(0));
            let Some(key) = MapKey::from_value(&key) else {
                return Ok(Value::Int(0));
            };
            Ok(Value::Int(i64::from(m.borrow().entries.contains_key(&key))))
        }
        MapDelete => {
            let key = args.get(1).cloned().unwrap_or(Value::Int(0));
            let Some(key) = MapKey::from_value(&key) else {
                return Ok(Value::Int(0));
            };
            let removed = m.borrow_mut().entries.remove(&key).is_some();
            Ok(Value::Int(i64::from(removed)))
        }
        other => Err(RuntimeError::new(format!(
            "{} routed to the wrong handler",
            other.name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use cinder_core::ObjRef;
    use cinder_core::heap::new_mapping;

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

    fn sample() -> Value {
        let m = new_mapping();
        for (k, v) in [("a", 1), ("b", 2), ("c", 3)] {
            m.borrow_mut()
                .entries
                .insert(MapKey::Str(k.into()), Value::Int(v));
        }
        Value::Mapping(m)
    }

    #[test]
    fn test_keys_values_alignment() {
        let m = sample();
        let Value::Array(keys) = run(Efun::Keys, vec![m.clone()]) else {
            panic!("expected array");
        };
        let Value::Array(values) = run(Efun::Values, vec![m.clone()]) else {
            panic!("expected array");
        };
        let keys = keys.borrow().elems.clone();
        let values = values.borrow().elems.clone();
        assert_eq!(keys.len(), 3);
        let Value::Mapping(m) = m else { unreachable!() };
        for (k, v) in keys.iter().zip(values.iter()) {
            let k = MapKey::from_value(k).unwrap();
            assert_eq!(m.borrow().entries[&k], *v);
        }
    }

    #[test]
    fn test_member_and_delete() {
        let m = sample();
        assert_eq!(
            run(Efun::Member, vec![m.clone(), Value::str("b")]),
            Value::Int(1)
        );
        assert_eq!(
            run(Efun::MapDelete, vec![m.clone(), Value::str("b")]),
            Value::Int(1)
        );
        assert_eq!(
            run(Efun::Member, vec![m.clone(), Value::str("b")]),
            Value::Int(0)
        );
        // deleting again reports failure
        assert_eq!(
            run(Efun::MapDelete, vec![m, Value::str("b")]),
            Value::Int(0)
        );
    }

    #[test]
    fn test_unallocated_mapping_is_empty() {
        let Value::Array(keys) = run(Efun::Keys, vec![Value::Int(0)]) else {
            panic!("expected array");
        };
        assert!(keys.borrow().elems.is_empty());
        assert_eq!(run(Efun::Member, vec![Value::Int(0), Value::str("x")]), Value::Int(0));
    }
}
