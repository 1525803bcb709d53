//! The object table: arena slots with generational handles.
//!
//! Every live object sits in a table slot; its identity handed to scripts
//! is `(slot, generation)`. Destruction bumps the slot's generation, so
//! all outstanding references go stale at once and read as integer 0.
//! Slots are recycled through a free list; reference numbers are not.

use cinder_core::{ObjRef, Program, Value};
use std::rc::Rc;

/// A verb registered on an object. `xverb` verbs match as a prefix of the
/// typed word (directions, say-shortcuts); plain verbs match whole words.
#[derive(Debug, Clone)]
pub struct Verb {
    pub name: String,
    pub func: String,
    pub xverb: bool,
}

/// Pending input diversion: input lines go to `func` on `target` instead
/// of the command queue. `input_to` diversions are one-shot; the
/// `redirect_input` kind sticks until cleared.
#[derive(Debug, Clone)]
pub struct InputRedirect {
    pub target: ObjRef,
    pub func: String,
    pub sticky: bool,
}

#[derive(Debug)]
pub struct Object {
    pub refno: i64,
    pub program: Rc<Program>,
    pub globals: Vec<Value>,

    /// The prototype object of its file, as opposed to a clone.
    pub is_prototype: bool,
    pub privileged: bool,
    pub interactive: bool,
    pub local_verbs: bool,

    // container linkage: single-linked sibling chain, as scripts see it
    pub location: Option<ObjRef>,
    pub contents: Option<ObjRef>,
    pub next_object: Option<ObjRef>,

    pub verbs: Vec<Verb>,
    /// Composition hook; carries the auto-object on every clone.
    pub attachee: Option<ObjRef>,

    /// Connection slot when a device is attached.
    pub conn: Option<usize>,
    pub input_redirect: Option<InputRedirect>,

    /// Zero disables heart_beat.
    pub heart_beat_interval: i64,
    pub last_heart_beat: i64,

    pub dirty: bool,
    pub last_access: i64,
}

impl Object {
    fn new(refno: i64, program: Rc<Program>, is_prototype: bool, now: i64) -> Object {
        let globals = vec![Value::Int(0); program.num_globals()];
        Object {
            refno,
            program,
            globals,
            is_prototype,
            privileged: false,
            interactive: false,
            local_verbs: false,
            location: None,
            contents: None,
            next_object: None,
            verbs: Vec::new(),
            attachee: None,
            conn: None,
            input_redirect: None,
            heart_beat_interval: 0,
            last_heart_beat: 0,
            dirty: true,
            last_access: now,
        }
    }
}

struct Slot {
    generation: u32,
    object: Option<Object>,
}

/// Arena of objects. Generation checks make stale handles harmless.
#[derive(Default)]
pub struct ObjectTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
    next_refno: i64,
    live: usize,
}

impl ObjectTable {
    pub fn new() -> ObjectTable {
        ObjectTable::default()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn allocate(&mut self, program: Rc<Program>, is_prototype: bool, now: i64) -> ObjRef {
        let refno = self.next_refno;
        self.next_refno += 1;
        self.allocate_with_refno(refno, program, is_prototype, now)
    }

    /// Allocation with a caller-chosen refno; snapshot restore uses this
    /// to preserve identities. Keeps the refno counter ahead of the
    /// highest number ever seen so retired numbers never come back.
    pub fn allocate_with_refno(
        &mut self,
        refno: i64,
        program: Rc<Program>,
        is_prototype: bool,
        now: i64,
    ) -> ObjRef {
        self.next_refno = self.next_refno.max(refno + 1);
        let object = Object::new(refno, program, is_prototype, now);
        self.live += 1;
        match self.free.pop() {
            Some(slot) => {
                let entry = &mut self.slots[slot as usize];
                entry.object = Some(object);
                ObjRef {
                    slot,
                    generation: entry.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    object: Some(object),
                });
                ObjRef {
                    slot: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        }
    }

    pub fn get(&self, r: ObjRef) -> Option<&Object> {
        let slot = self.slots.get(r.slot as usize)?;
        if slot.generation != r.generation {
            return None;
        }
        slot.object.as_ref()
    }

    pub fn get_mut(&mut self, r: ObjRef) -> Option<&mut Object> {
        let slot = self.slots.get_mut(r.slot as usize)?;
        if slot.generation != r.generation {
            return None;
        }
        slot.object.as_mut()
    }

    pub fn is_live(&self, r: ObjRef) -> bool {
        self.get(r).is_some()
    }

    /// Remove the object and invalidate every outstanding handle to it.
    pub fn release(&mut self, r: ObjRef) -> Option<Object> {
        let slot = self.slots.get_mut(r.slot as usize)?;
        if slot.generation != r.generation || slot.object.is_none() {
            return None;
        }
        let object = slot.object.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(r.slot);
        self.live -= 1;
        object
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjRef, &Object)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.object.as_ref().map(|o| {
                (
                    ObjRef {
                        slot: i as u32,
                        generation: s.generation,
                    },
                    o,
                )
            })
        })
    }

    /// All live handles, in slot order. Snapshot and the lifecycle passes
    /// collect these up front so scripts can mutate the table mid-pass.
    pub fn refs(&self) -> Vec<ObjRef> {
        self.iter().map(|(r, _)| r).collect()
    }

    pub fn find_by_refno(&self, refno: i64) -> Option<ObjRef> {
        self.iter().find(|(_, o)| o.refno == refno).map(|(r, _)| r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_core::program::Program;
    use std::collections::HashMap;

    fn program(path: &str) -> Rc<Program> {
        Rc::new(Program::new(
            1,
            Rc::from(path),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            HashMap::from([(1, 0)]),
            0,
        ))
    }

    #[test]
    fn test_stale_handles_after_release() {
        let mut table = ObjectTable::new();
        let r = table.allocate(program("/thing"), false, 0);
        assert!(table.is_live(r));
        table.release(r).unwrap();
        assert!(!table.is_live(r));
        assert!(table.get(r).is_none());
    }

    #[test]
    fn test_slot_reuse_keeps_old_handles_stale() {
        let mut table = ObjectTable::new();
        let first = table.allocate(program("/a"), false, 0);
        table.release(first);
        let second = table.allocate(program("/b"), false, 0);
        // same slot, different generation
        assert_eq!(first.slot, second.slot);
        assert_ne!(first.generation, second.generation);
        assert!(table.get(first).is_none());
        assert!(table.is_live(second));
    }

    #[test]
    fn test_refnos_never_reused() {
        let mut table = ObjectTable::new();
        let a = table.allocate(program("/a"), false, 0);
        let a_refno = table.get(a).unwrap().refno;
        table.release(a);
        let b = table.allocate(program("/b"), false, 0);
        assert!(table.get(b).unwrap().refno > a_refno);
    }

    #[test]
    fn test_restore_preserves_refno_and_advances_counter() {
        let mut table = ObjectTable::new();
        let r = table.allocate_with_refno(41, program("/a"), false, 0);
        assert_eq!(table.get(r).unwrap().refno, 41);
        let next = table.allocate(program("/b"), false, 0);
        assert_eq!(table.get(next).unwrap().refno, 42);
        assert_eq!(table.find_by_refno(41), Some(r));
    }
}
