// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ### [4.4 Scope Chain](spec §4.4)
//!
//! A scope is an ordinary heap object (spec §3.4: "the scope chain is
//! itself a chain of `Link`-bearing values") whose own properties
//! *are* the bindings it holds, linked to its parent via the
//! `scope_parent` well-known symbol. Resolution walks that chain,
//! treating a `with` scope specially: the bound object (and its
//! prototype chain) is consulted before that scope's own properties.

use crate::heap::{Heap, ObjectHandle};
use crate::property_key::PropertyKey;
use crate::value::object::{ObjectData, ObjectKind, Property, ScopeKind};
use crate::value::Value;

/// Where a resolved identifier's binding actually lives: an ordinary
/// own property of a scope object, or a property (possibly inherited)
/// of a `with` statement's target object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Scope(ObjectHandle),
    WithTarget(ObjectHandle),
}

pub fn create_function_scope(
    heap: &mut Heap,
    parent: Option<ObjectHandle>,
    this: Value,
    new_target: Option<ObjectHandle>,
) -> ObjectHandle {
    let mut data = ObjectData::new(ObjectKind::Scope(ScopeKind::Function), None);
    data.set_scope_parent(parent);
    data.define_property(PropertyKey::from("this"), hidden(this));
    data.define_property(
        PropertyKey::from("new.target"),
        hidden(new_target.map(Value::Object).unwrap_or(Value::Undefined)),
    );
    heap.alloc(data)
}

pub fn create_let_scope(heap: &mut Heap, parent: Option<ObjectHandle>) -> ObjectHandle {
    let mut data = ObjectData::new(ObjectKind::Scope(ScopeKind::Let), None);
    data.set_scope_parent(parent);
    heap.alloc(data)
}

pub fn create_with_scope(heap: &mut Heap, parent: Option<ObjectHandle>, target: ObjectHandle) -> ObjectHandle {
    let mut data = ObjectData::new(ObjectKind::Scope(ScopeKind::With(target)), None);
    data.set_scope_parent(parent);
    heap.alloc(data)
}

fn hidden(value: Value) -> Property {
    Property::Data {
        value,
        writable: true,
        enumerable: false,
        configurable: false,
    }
}

/// Declares `name` as an own binding of `scope`, overwriting any
/// existing value. Used both for hoisting (`Value::Undefined` for
/// `var`, `Value::Uninitialized` for `let`/`const` pending their TDZ)
/// and for ordinary assignment once a binding has been located.
pub fn declare(heap: &mut Heap, scope: ObjectHandle, name: &str, value: Value) {
    heap.get_mut(scope).set_data(PropertyKey::from(name), value);
}

fn object_has_property(heap: &Heap, start: ObjectHandle, key: &PropertyKey) -> bool {
    let mut cur = Some(start);
    while let Some(h) = cur {
        let obj = heap.get(h);
        if obj.get_own(key).is_some() {
            return true;
        }
        cur = obj.prototype;
    }
    false
}

/// Walks the scope chain starting at `start` looking for `name`,
/// checking each `with` scope's target object (and its prototype
/// chain) before that scope's own bindings, per spec §4.4's
/// "with-scope delegation checked first" rule.
pub fn resolve(heap: &Heap, start: ObjectHandle, name: &str) -> Option<Binding> {
    let key = PropertyKey::from(name);
    let mut cur = Some(start);
    while let Some(h) = cur {
        let obj = heap.get(h);
        if let ObjectKind::Scope(ScopeKind::With(target)) = &obj.kind {
            if object_has_property(heap, *target, &key) {
                return Some(Binding::WithTarget(*target));
            }
        }
        if obj.get_own(&key).is_some() {
            return Some(Binding::Scope(h));
        }
        cur = obj.scope_parent();
    }
    None
}

/// The nearest enclosing `Function` scope's `this` binding, walking
/// past `Let`/`With` scopes — arrow functions don't introduce one, so
/// their body resolves `this` through their closure scope exactly like
/// any other identifier would resolve past non-function scopes.
pub fn resolve_this(heap: &Heap, start: ObjectHandle) -> Value {
    let mut cur = Some(start);
    while let Some(h) = cur {
        let obj = heap.get(h);
        if matches!(obj.kind, ObjectKind::Scope(ScopeKind::Function)) {
            if let Some(Property::Data { value, .. }) = obj.get_own(&PropertyKey::from("this")) {
                return value.clone();
            }
        }
        cur = obj.scope_parent();
    }
    Value::Undefined
}

pub fn resolve_new_target(heap: &Heap, start: ObjectHandle) -> Value {
    let mut cur = Some(start);
    while let Some(h) = cur {
        let obj = heap.get(h);
        if matches!(obj.kind, ObjectKind::Scope(ScopeKind::Function)) {
            if let Some(Property::Data { value, .. }) = obj.get_own(&PropertyKey::from("new.target")) {
                return value.clone();
            }
        }
        cur = obj.scope_parent();
    }
    Value::Undefined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Heap;

    #[test]
    fn resolves_through_parent_chain() {
        let mut heap = Heap::new();
        let outer = create_let_scope(&mut heap, None);
        declare(&mut heap, outer, "x", Value::int(1));
        let inner = create_let_scope(&mut heap, Some(outer));
        match resolve(&heap, inner, "x") {
            Some(Binding::Scope(h)) => assert_eq!(h, outer),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn with_scope_shadows_outer_binding() {
        let mut heap = Heap::new();
        let outer = create_let_scope(&mut heap, None);
        declare(&mut heap, outer, "x", Value::int(1));
        let target = heap.alloc(ObjectData::new(ObjectKind::Ordinary, None));
        heap.get_mut(target).set_data(PropertyKey::from("x"), Value::int(2));
        let withs = create_with_scope(&mut heap, Some(outer), target);
        match resolve(&heap, withs, "x") {
            Some(Binding::WithTarget(h)) => assert_eq!(h, target),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn this_resolves_past_let_scopes() {
        let mut heap = Heap::new();
        let func = create_function_scope(&mut heap, None, Value::int(42), None);
        let block = create_let_scope(&mut heap, Some(func));
        assert!(matches!(resolve_this(&heap, block), Value::Number(_)));
    }
}
