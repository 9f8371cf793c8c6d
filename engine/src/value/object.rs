// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ### [3.4 Link](spec §3.4) / object property storage
//!
//! A property vector kept sorted by [`PropertyKey`] (spec §3.2/§3.4),
//! so `ArrayIndex` entries form a contiguous prefix and `length` is
//! read off the last one instead of scanned for.

use crate::heap::{value_children, ObjectHandle};
use crate::property_key::PropertyKey;
use crate::symbol::well_known;
use crate::value::function::{BoundData, FnData, NativeFn};
use crate::value::generator::GeneratorData;
use crate::value::Value;

#[derive(Debug, Clone)]
pub enum Property {
    Data {
        value: Value,
        writable: bool,
        enumerable: bool,
        configurable: bool,
    },
    Accessor {
        get: Option<ObjectHandle>,
        set: Option<ObjectHandle>,
        enumerable: bool,
        configurable: bool,
    },
}

impl Property {
    pub fn data(value: Value) -> Self {
        Property::Data {
            value,
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    pub fn enumerable(&self) -> bool {
        match self {
            Property::Data { enumerable, .. } => *enumerable,
            Property::Accessor { enumerable, .. } => *enumerable,
        }
    }

    pub fn configurable(&self) -> bool {
        match self {
            Property::Data { configurable, .. } => *configurable,
            Property::Accessor { configurable, .. } => *configurable,
        }
    }
}

/// What an [`ObjectData`] *is*, beyond its property vector. Spec §3.5's
/// Function/Bound Function/Generator variants, plus the two bookkeeping
/// kinds (`Array`, whose `length` must stay coherent with its
/// `ArrayIndex` keys per §3.3, and `Scope`, which lets the scope chain
/// (spec §3.4/§4.4) reuse the same heap and GC machinery as ordinary
/// values instead of needing its own arena).
/// Which of the three scope kinds a `Scope`-kind object is (spec §4.4).
/// `Let` covers both `let` block scopes and the per-iteration clones a
/// `for (let ...)` loop makes; `Function` additionally carries `this`,
/// `arguments` and `new.target` as ordinary own properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Function,
    Let,
    With(ObjectHandle),
}

#[derive(Debug, Clone)]
pub enum ObjectKind {
    Ordinary,
    Array,
    Error,
    Regex {
        pattern: std::string::String,
        flags: std::string::String,
    },
    Function(FnData),
    Native(NativeFn),
    Bound(BoundData),
    Generator(GeneratorData),
    Scope(ScopeKind),
}

#[derive(Debug, Clone)]
pub struct ObjectData {
    pub kind: ObjectKind,
    pub prototype: Option<ObjectHandle>,
    pub extensible: bool,
    properties: Vec<(PropertyKey, Property)>,
    pub marked: bool,
}

impl ObjectData {
    pub fn new(kind: ObjectKind, prototype: Option<ObjectHandle>) -> Self {
        ObjectData {
            kind,
            prototype,
            extensible: true,
            properties: Vec::new(),
            marked: false,
        }
    }

    pub fn get_own(&self, key: &PropertyKey) -> Option<&Property> {
        self.properties
            .binary_search_by(|(k, _)| k.cmp(key))
            .ok()
            .map(|i| &self.properties[i].1)
    }

    pub fn own_keys(&self) -> impl Iterator<Item = &PropertyKey> {
        self.properties.iter().map(|(k, _)| k)
    }

    pub fn own_entries(&self) -> impl Iterator<Item = &(PropertyKey, Property)> {
        self.properties.iter()
    }

    /// Inserts or replaces a property, keeping the vector sorted. This
    /// is the only write path into `properties`, so the sort invariant
    /// can never be violated by a caller forgetting to re-sort.
    pub fn define_property(&mut self, key: PropertyKey, prop: Property) {
        match self.properties.binary_search_by(|(k, _)| k.cmp(&key)) {
            Ok(i) => self.properties[i].1 = prop,
            Err(i) => self.properties.insert(i, (key, prop)),
        }
        if matches!(self.kind, ObjectKind::Array) {
            self.fix_up_length();
        }
    }

    pub fn delete(&mut self, key: &PropertyKey) -> bool {
        match self.properties.binary_search_by(|(k, _)| k.cmp(key)) {
            Ok(i) => {
                if !self.properties[i].1.configurable() {
                    return false;
                }
                self.properties.remove(i);
                true
            }
            Err(_) => true,
        }
    }

    pub fn set_data(&mut self, key: impl Into<PropertyKey>, value: Value) {
        self.define_property(key.into(), Property::data(value));
    }

    /// The array's current `length`, per spec §3.3: one past the
    /// largest `ArrayIndex` key present, or `0` if none. `ArrayIndex`
    /// keys are a contiguous sorted prefix of `properties` by
    /// construction ([`crate::property_key`]'s ordering), so this is a
    /// single peek at the last `ArrayIndex` entry, not a scan.
    pub fn array_length(&self) -> u32 {
        self.properties
            .iter()
            .rev()
            .find_map(|(k, _)| match k {
                PropertyKey::ArrayIndex(i) => Some(*i + 1),
                _ => None,
            })
            .unwrap_or(0)
    }

    fn fix_up_length(&mut self) {
        // `length` itself is not stored as a property for Array kind;
        // it is always derived via `array_length`. Nothing to fix up
        // beyond keeping the vector sorted, which `define_property`
        // already guarantees.
    }

    /// Truncates the array down to `new_len`, dropping `ArrayIndex`
    /// keys `>= new_len` (the `length =` setter's contract, spec §3.3).
    /// Deletion proceeds from the highest index down, same as the
    /// reference `ArraySetLength` walk: the first non-configurable
    /// index encountered stops the truncation, and that index (plus
    /// everything still at or above `new_len` below it) stays, so the
    /// array's derived `length` ends up one past it rather than
    /// `new_len`.
    pub fn truncate_array(&mut self, new_len: u32) {
        for i in (new_len..self.array_length()).rev() {
            let key = PropertyKey::ArrayIndex(i);
            match self.get_own(&key) {
                Some(p) if p.configurable() => {
                    self.properties.retain(|(k, _)| k != &key);
                }
                Some(_) => break,
                None => {}
            }
        }
    }

    /// Marks every own property non-writable/non-configurable and the
    /// object itself non-extensible (the object-model operation the
    /// spec's `extensible` flag exists to support).
    pub fn freeze(&mut self) {
        self.extensible = false;
        for (_, prop) in self.properties.iter_mut() {
            match prop {
                Property::Data { writable, configurable, .. } => {
                    *writable = false;
                    *configurable = false;
                }
                Property::Accessor { configurable, .. } => {
                    *configurable = false;
                }
            }
        }
    }

    pub fn is_frozen(&self) -> bool {
        !self.extensible
            && self.properties.iter().all(|(_, p)| {
                !p.configurable()
                    && matches!(p, Property::Data { writable: false, .. } | Property::Accessor { .. })
            })
    }

    pub fn prevent_extensions(&mut self) {
        self.extensible = false;
    }

    pub fn scope_parent(&self) -> Option<ObjectHandle> {
        match self.get_own(&PropertyKey::Symbol(well_known().scope_parent)) {
            Some(Property::Data {
                value: Value::Object(h),
                ..
            }) => Some(*h),
            _ => None,
        }
    }

    pub fn set_scope_parent(&mut self, parent: Option<ObjectHandle>) {
        if let Some(parent) = parent {
            self.define_property(
                PropertyKey::Symbol(well_known().scope_parent),
                Property::data(Value::Object(parent)),
            );
        }
    }

    pub fn collect_child_handles(&self, out: &mut Vec<ObjectHandle>) {
        if let Some(p) = self.prototype {
            out.push(p);
        }
        for (_, prop) in &self.properties {
            match prop {
                Property::Data { value, .. } => value_children(value, out),
                Property::Accessor { get, set, .. } => {
                    out.extend(get.iter().chain(set.iter()).copied());
                }
            }
        }
        match &self.kind {
            ObjectKind::Function(f) => {
                if let Some(s) = f.closure_scope {
                    out.push(s);
                }
            }
            ObjectKind::Bound(b) => {
                out.push(b.target);
                out.extend(b.bound_args.iter().filter_map(|v| match v {
                    Value::Object(h) => Some(*h),
                    _ => None,
                }));
            }
            ObjectKind::Generator(g) => {
                if let Some(s) = g.scope {
                    out.push(s);
                }
            }
            ObjectKind::Scope(ScopeKind::With(target)) => out.push(*target),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_array_drops_configurable_indices_above_new_len() {
        let mut arr = ObjectData::new(ObjectKind::Array, None);
        arr.set_data(0u32, Value::int(0));
        arr.set_data(1u32, Value::int(1));
        arr.set_data(2u32, Value::int(2));
        arr.truncate_array(1);
        assert_eq!(arr.array_length(), 1);
        assert!(arr.get_own(&PropertyKey::ArrayIndex(1)).is_none());
        assert!(arr.get_own(&PropertyKey::ArrayIndex(2)).is_none());
    }

    #[test]
    fn truncate_array_stops_at_first_non_configurable_index() {
        let mut arr = ObjectData::new(ObjectKind::Array, None);
        arr.set_data(0u32, Value::int(0));
        arr.set_data(1u32, Value::int(1));
        arr.set_data(2u32, Value::int(2));
        // Index 1 is pinned non-configurable; truncating to 0 must stop
        // there rather than deleting through it.
        arr.define_property(
            PropertyKey::ArrayIndex(1),
            Property::Data { value: Value::int(1), writable: true, enumerable: true, configurable: false },
        );
        arr.truncate_array(0);
        assert!(arr.get_own(&PropertyKey::ArrayIndex(2)).is_none(), "index above the blocker is still removed");
        assert!(arr.get_own(&PropertyKey::ArrayIndex(1)).is_some(), "the non-configurable index itself survives");
        assert_eq!(arr.array_length(), 2, "length reflects the surviving non-configurable index, not new_len");
    }
}
