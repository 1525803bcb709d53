//! Refcounted heap containers: arrays and mappings.
//!
//! Both are `Rc<RefCell<..>>` handles with assign-by-reference semantics:
//! copying a value into another slot shares the handle, in-place mutation
//! is visible through every alias, and `+`/`-` build fresh handles. The
//! `Rc` strong count is the refcount the runtime invariants talk about.

use crate::value::{MapKey, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

pub type ArrayRef = Rc<RefCell<ArrayData>>;
pub type MappingRef = Rc<RefCell<MappingData>>;

#[derive(Debug, Clone, PartialEq)]
pub enum HeapError {
    /// Subscript past `max_size` on a bounded array.
    IndexBeyondMax { index: usize, max: usize },
    /// Negative subscript.
    NegativeIndex(i64),
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapError::IndexBeyondMax { index, max } => {
                write!(f, "array index {index} out of bounds (max size {max})")
            }
            HeapError::NegativeIndex(i) => write!(f, "negative array index {i}"),
        }
    }
}

/// Backing store of a script array.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayData {
    pub elems: Vec<Value>,
    /// `None` means unlimited: writes past the end grow the array.
    pub max_size: Option<usize>,
}

impl ArrayData {
    /// Grow so that `index` is addressable, filling new slots with `Int(0)`.
    /// Fails when the index falls outside a bounded array's `max_size`.
    pub fn ensure_index(&mut self, index: i64) -> Result<usize, HeapError> {
        if index < 0 {
            return Err(HeapError::NegativeIndex(index));
        }
        let index = index as usize;
        if let Some(max) = self.max_size
            && index >= max
        {
            return Err(HeapError::IndexBeyondMax { index, max });
        }
        if index >= self.elems.len() {
            self.elems.resize(index + 1, Value::Int(0));
        }
        Ok(index)
    }
}

/// Allocate an array of `size` zero slots. `max_size` of `None` is the
/// "unlimited" sentinel.
pub fn new_array(size: usize, max_size: Option<usize>) -> ArrayRef {
    Rc::new(RefCell::new(ArrayData {
        elems: vec![Value::Int(0); size],
        max_size,
    }))
}

pub fn array_from_elems(elems: Vec<Value>) -> ArrayRef {
    Rc::new(RefCell::new(ArrayData {
        elems,
        max_size: None,
    }))
}

/// `a + b`: fresh unlimited array holding a's elements then b's.
pub fn array_concat(a: &ArrayRef, b: &ArrayRef) -> ArrayRef {
    let mut elems = a.borrow().elems.clone();
    elems.extend(b.borrow().elems.iter().cloned());
    array_from_elems(elems)
}

/// `a - b`: fresh array with every occurrence of each element of `b`
/// removed from `a`.
pub fn array_subtract(a: &ArrayRef, b: &ArrayRef) -> ArrayRef {
    let b = b.borrow();
    let elems = a
        .borrow()
        .elems
        .iter()
        .filter(|v| !b.elems.contains(*v))
        .cloned()
        .collect();
    array_from_elems(elems)
}

/// Backing store of a script mapping. Insertion order is not preserved.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MappingData {
    pub entries: HashMap<MapKey, Value>,
}

pub fn new_mapping() -> MappingRef {
    Rc::new(RefCell::new(MappingData::default()))
}

pub fn mapping_from_entries(entries: HashMap<MapKey, Value>) -> MappingRef {
    Rc::new(RefCell::new(MappingData { entries }))
}

/// `a + b`: fresh mapping; on key collision the second operand wins.
pub fn mapping_merge(a: &MappingRef, b: &MappingRef) -> MappingRef {
    let mut entries = a.borrow().entries.clone();
    for (k, v) in &b.borrow().entries {
        entries.insert(k.clone(), v.clone());
    }
    mapping_from_entries(entries)
}

/// `a - b`: fresh mapping with b's keys removed (b's values are ignored).
pub fn mapping_subtract(a: &MappingRef, b: &MappingRef) -> MappingRef {
    let b = b.borrow();
    let entries = a
        .borrow()
        .entries
        .iter()
        .filter(|(k, _)| !b.entries.contains_key(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    mapping_from_entries(entries)
}

/// Index-aligned `(keys, values)` snapshot: `values[i]` is the value stored
/// under `keys[i]`. Both sides come from one iteration so the alignment
/// holds even though the mapping itself is unordered.
pub fn mapping_pairs(m: &MappingRef) -> (Vec<Value>, Vec<Value>) {
    let m = m.borrow();
    let mut keys = Vec::with_capacity(m.entries.len());
    let mut values = Vec::with_capacity(m.entries.len());
    for (k, v) in &m.entries {
        keys.push(k.to_value());
        values.push(v.clone());
    }
    (keys, values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_array_grows_in_place() {
        let a = new_array(0, None);
        let idx = a.borrow_mut().ensure_index(10).unwrap();
        a.borrow_mut().elems[idx] = Value::Int(99);
        assert_eq!(a.borrow().elems.len(), 11);
        assert_eq!(a.borrow().elems[10], Value::Int(99));
        assert_eq!(a.borrow().elems[3], Value::Int(0));
    }

    #[test]
    fn test_bounded_array_rejects_overflow() {
        let a = new_array(5, Some(5));
        assert!(a.borrow_mut().ensure_index(4).is_ok());
        assert_eq!(
            a.borrow_mut().ensure_index(5),
            Err(HeapError::IndexBeyondMax { index: 5, max: 5 })
        );
    }

    #[test]
    fn test_aliases_share_growth() {
        let a = new_array(0, None);
        let b = a.clone();
        let idx = a.borrow_mut().ensure_index(10).unwrap();
        a.borrow_mut().elems[idx] = Value::Int(99);
        assert_eq!(b.borrow().elems.len(), 11);
        assert_eq!(b.borrow().elems[10], Value::Int(99));
    }

    #[test]
    fn test_array_subtract_removes_all_occurrences() {
        let a = array_from_elems(vec![
            Value::Int(1),
            Value::Int(2),
            Value::Int(1),
            Value::Int(3),
        ]);
        let b = array_from_elems(vec![Value::Int(1)]);
        let c = array_subtract(&a, &b);
        assert_eq!(c.borrow().elems, vec![Value::Int(2), Value::Int(3)]);
        // operands untouched
        assert_eq!(a.borrow().elems.len(), 4);
    }

    #[test]
    fn test_mapping_merge_second_wins() {
        let a = new_mapping();
        let b = new_mapping();
        a.borrow_mut()
            .entries
            .insert(MapKey::Str("k".into()), Value::Int(1));
        b.borrow_mut()
            .entries
            .insert(MapKey::Str("k".into()), Value::Int(2));
        let c = mapping_merge(&a, &b);
        assert_eq!(
            c.borrow().entries.get(&MapKey::Str("k".into())),
            Some(&Value::Int(2))
        );
    }

    #[test]
    fn test_mapping_subtract_by_keys_only() {
        let a = new_mapping();
        for (k, v) in [("a", 1), ("b", 2), ("c", 3)] {
            a.borrow_mut()
                .entries
                .insert(MapKey::Str(k.into()), Value::Int(v));
        }
        let b = new_mapping();
        b.borrow_mut()
            .entries
            .insert(MapKey::Str("b".into()), Value::Int(0));
        let c = mapping_subtract(&a, &b);
        assert_eq!(c.borrow().entries.len(), 2);
        assert!(!c.borrow().entries.contains_key(&MapKey::Str("b".into())));
    }

    #[test]
    fn test_mapping_pairs_are_aligned() {
        let m = new_mapping();
        for i in 0..32 {
            m.borrow_mut()
                .entries
                .insert(MapKey::Int(i), Value::Int(i * 10));
        }
        let (keys, values) = mapping_pairs(&m);
        assert_eq!(keys.len(), 32);
        for (k, v) in keys.iter().zip(values.iter()) {
            let k = k.as_int().unwrap();
            assert_eq!(v.as_int().unwrap(), k * 10);
        }
    }
}
