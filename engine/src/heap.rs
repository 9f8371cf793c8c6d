// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ### [4.7 Garbage collection](spec §4.7)
//!
//! Objects live in a [`generational_arena::Arena`] and are addressed by
//! [`ObjectHandle`] (an ABA-safe generational index, so a handle into a
//! freed-and-reused slot is detected rather than silently aliasing).
//! Collection is incremental mark-and-sweep: [`Heap::collect`] marks
//! from a root set the caller supplies, then frees every unmarked slot.

use generational_arena::{Arena, Index};

use crate::value::object::ObjectData;
use crate::value::Value;

pub type ObjectHandle = Index;

/// How many nested mark traversals [`Heap::collect`] can support at
/// once. The evaluator may need a temporary mark slot while walking a
/// structure that itself triggers a nested collection (e.g. a
/// `toString` callback invoked mid-trace); spec §4.7 bounds this at 5
/// rather than letting traversal depth be unbounded.
pub const TEMPORARY_MARK_SLOTS: usize = 5;

pub struct Heap {
    objects: Arena<ObjectData>,
    mark_stack: Vec<ObjectHandle>,
    marks_in_use: usize,
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            objects: Arena::new(),
            mark_stack: Vec::new(),
            marks_in_use: 0,
        }
    }

    pub fn alloc(&mut self, data: ObjectData) -> ObjectHandle {
        self.objects.insert(data)
    }

    pub fn get(&self, handle: ObjectHandle) -> &ObjectData {
        self.objects
            .get(handle)
            .expect("stale ObjectHandle used after collection")
    }

    pub fn get_mut(&mut self, handle: ObjectHandle) -> &mut ObjectData {
        self.objects
            .get_mut(handle)
            .expect("stale ObjectHandle used after collection")
    }

    pub fn contains(&self, handle: ObjectHandle) -> bool {
        self.objects.contains(handle)
    }

    /// Marks everything reachable from `roots`, then frees every
    /// unmarked slot. `roots` is supplied by the caller (the evaluator
    /// walks its scope chain and value stack; spec §4.7 leaves root
    /// enumeration to "whatever holds live references", since the core
    /// has no stack-scanning of its own).
    pub fn collect(&mut self, roots: impl IntoIterator<Item = ObjectHandle>) {
        assert!(
            self.marks_in_use < TEMPORARY_MARK_SLOTS,
            "nested Heap::collect exceeded the {TEMPORARY_MARK_SLOTS} temporary mark slots"
        );
        self.marks_in_use += 1;

        for (_, obj) in self.objects.iter_mut() {
            obj.marked = false;
        }
        self.mark_stack.clear();
        self.mark_stack.extend(roots);
        while let Some(handle) = self.mark_stack.pop() {
            let Some(obj) = self.objects.get_mut(handle) else {
                continue;
            };
            if obj.marked {
                continue;
            }
            obj.marked = true;
            let mut children = Vec::new();
            obj.collect_child_handles(&mut children);
            self.mark_stack.extend(children);
        }

        let dead: Vec<ObjectHandle> = self
            .objects
            .iter()
            .filter(|(_, obj)| !obj.marked)
            .map(|(idx, _)| idx)
            .collect();
        for handle in dead {
            self.objects.remove(handle);
        }

        self.marks_in_use -= 1;
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

/// A [`Value`]'s child handles, for marking. Non-object values have
/// none.
pub fn value_children(value: &Value, out: &mut Vec<ObjectHandle>) {
    if let Value::Object(h) = value {
        out.push(*h);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::object::{ObjectData, ObjectKind};

    #[test]
    fn collect_frees_unreachable_objects() {
        let mut heap = Heap::new();
        let root = heap.alloc(ObjectData::new(ObjectKind::Ordinary, None));
        let orphan = heap.alloc(ObjectData::new(ObjectKind::Ordinary, None));
        assert_eq!(heap.len(), 2);
        heap.collect([root]);
        assert_eq!(heap.len(), 1);
        assert!(heap.contains(root));
        assert!(!heap.contains(orphan));
    }

    #[test]
    fn collect_follows_prototype_chain() {
        let mut heap = Heap::new();
        let proto = heap.alloc(ObjectData::new(ObjectKind::Ordinary, None));
        let child = heap.alloc(ObjectData::new(ObjectKind::Ordinary, Some(proto)));
        heap.collect([child]);
        assert!(heap.contains(proto));
    }
}
