// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ### [4.3 Value operations — property lookup/assignment](spec §4.3)
//!
//! `find_child_with_prototype_chain` and the "assignment to a property"
//! algorithm, expressed over the heap's handle graph: no synthetic
//! `referenced_owner` link is needed the way the reference
//! implementation's work-pointer requires, since an inherited read and
//! an own-property write are just two different calls against the same
//! `ObjectHandle`.

use crate::error::ErrorKind;
use crate::eval::Completion;
use crate::heap::ObjectHandle;
use crate::property_key::{PropertyKey, MAX_ARRAY_INDEX};
use crate::symbol::well_known;
use crate::value::object::{ObjectData, ObjectKind, Property};
use crate::value::Value;
use crate::Engine;

impl Engine {
    pub fn new_object_with_proto(&mut self, proto: Option<ObjectHandle>) -> ObjectHandle {
        self.heap.alloc(ObjectData::new(ObjectKind::Ordinary, proto))
    }

    pub fn new_plain_object(&mut self) -> ObjectHandle {
        self.new_object_with_proto(Some(self.object_proto))
    }

    pub fn new_array(&mut self, items: impl IntoIterator<Item = Value>) -> Value {
        let handle = self.heap.alloc(ObjectData::new(ObjectKind::Array, Some(self.array_proto)));
        for (i, item) in items.into_iter().enumerate() {
            self.heap.get_mut(handle).set_data(i as u32, item);
        }
        Value::Object(handle)
    }

    pub(crate) fn make_error_value(&mut self, kind: ErrorKind, message: &str) -> Value {
        let proto = self.error_proto(kind);
        let handle = self.heap.alloc(ObjectData::new(ObjectKind::Error, Some(proto)));
        let loc = self.current_loc.clone();
        self.heap.get_mut(handle).set_data("message", Value::string(message));
        self.heap.get_mut(handle).set_data("fileName", Value::string(loc.file_name.clone()));
        self.heap.get_mut(handle).set_data("lineNumber", Value::int(loc.line as i32));
        self.heap.get_mut(handle).set_data("column", Value::int(loc.column as i32));
        Value::Object(handle)
    }

    pub(crate) fn error_proto(&self, kind: ErrorKind) -> ObjectHandle {
        self.error_protos[kind as usize]
    }

    /// `find_child_with_prototype_chain` + getter invocation, spec §4.3.
    pub fn get_property(&mut self, obj: ObjectHandle, key: &PropertyKey) -> Result<Value, Completion> {
        if matches!(key, PropertyKey::String(s) if s == "length") {
            if matches!(self.heap.get(obj).kind, ObjectKind::Array) {
                return Ok(Value::int(self.heap.get(obj).array_length() as i32));
            }
        }
        let mut cur = Some(obj);
        while let Some(h) = cur {
            let prop = self.heap.get(h).get_own(key).cloned();
            match prop {
                Some(Property::Data { value, .. }) => return Ok(value),
                Some(Property::Accessor { get: Some(getter), .. }) => {
                    return self.call(Value::Object(getter), Value::Object(obj), &[]);
                }
                Some(Property::Accessor { get: None, .. }) => return Ok(Value::Undefined),
                None => cur = self.heap.get(h).prototype,
            }
        }
        Ok(Value::Undefined)
    }

    /// "Assignment to a property", spec §4.3: own writable data mutates
    /// in place; an accessor (own or inherited) dispatches to its
    /// setter; otherwise a new own property is created if the receiver
    /// is extensible, else `TypeError`.
    pub fn set_property(&mut self, obj: ObjectHandle, key: PropertyKey, value: Value) -> Result<(), Completion> {
        if let PropertyKey::String(s) = &key {
            if s == "length" && matches!(self.heap.get(obj).kind, ObjectKind::Array) {
                let n = self.to_number(value)?;
                let new_len = n.to_uint32();
                self.heap.get_mut(obj).truncate_array(new_len);
                return Ok(());
            }
        }
        if let Some(own) = self.heap.get(obj).get_own(&key).cloned() {
            match own {
                Property::Data { writable: true, enumerable, configurable, .. } => {
                    self.heap.get_mut(obj).define_property(
                        key,
                        Property::Data { value, writable: true, enumerable, configurable },
                    );
                    return Ok(());
                }
                Property::Data { writable: false, .. } => {
                    return Err(self.throw(ErrorKind::TypeError, "cannot assign to read only property"));
                }
                Property::Accessor { set: Some(setter), .. } => {
                    self.call(Value::Object(setter), Value::Object(obj), &[value])?;
                    return Ok(());
                }
                Property::Accessor { set: None, .. } => {
                    return Err(self.throw(ErrorKind::TypeError, "cannot set property which only has a getter"));
                }
            }
        }
        // Inherited accessor still dispatches to its setter on the receiver.
        let mut cur = self.heap.get(obj).prototype;
        while let Some(h) = cur {
            if let Some(prop) = self.heap.get(h).get_own(&key).cloned() {
                match prop {
                    Property::Accessor { set: Some(setter), .. } => {
                        self.call(Value::Object(setter), Value::Object(obj), &[value])?;
                        return Ok(());
                    }
                    Property::Accessor { set: None, .. } => {
                        return Err(self.throw(ErrorKind::TypeError, "cannot set property which only has a getter"));
                    }
                    Property::Data { .. } => break,
                }
            }
            cur = self.heap.get(h).prototype;
        }
        if matches!(&key, PropertyKey::ArrayIndex(i) if *i > MAX_ARRAY_INDEX) {
            return Err(self.throw(ErrorKind::RangeError, "invalid array index"));
        }
        if !self.heap.get(obj).extensible {
            return Err(self.throw(ErrorKind::TypeError, "object is not extensible"));
        }
        self.heap.get_mut(obj).set_data(key, value);
        Ok(())
    }

    pub fn delete_property(&mut self, obj: ObjectHandle, key: &PropertyKey) -> bool {
        self.heap.get_mut(obj).delete(key)
    }

    /// Member access on any `Value`, not just objects: strings expose
    /// `length` and indexed characters and otherwise delegate to
    /// `String.prototype`; everything else that isn't an object throws.
    pub fn get_value_property(&mut self, base: &Value, key: &PropertyKey) -> Result<Value, Completion> {
        match base {
            Value::Object(h) => self.get_property(*h, key),
            Value::String(s) => {
                if matches!(key, PropertyKey::String(k) if k == "length") {
                    return Ok(Value::int(s.chars().count() as i32));
                }
                if let PropertyKey::ArrayIndex(i) = key {
                    return Ok(match s.chars().nth(*i as usize) {
                        Some(c) => Value::string(c.to_string()),
                        None => Value::Undefined,
                    });
                }
                self.get_property(self.string_proto, key)
            }
            Value::Number(_) => self.get_property(self.number_proto, key),
            Value::Boolean(_) => self.get_property(self.boolean_proto, key),
            Value::Undefined | Value::Uninitialized | Value::Null => {
                Err(self.throw(ErrorKind::TypeError, format!("cannot read property '{}' of {}", key.as_display_name(), base_name(base))))
            }
            Value::Symbol(_) => Ok(Value::Undefined),
        }
    }

    pub fn set_value_property(&mut self, base: &Value, key: PropertyKey, value: Value) -> Result<(), Completion> {
        match base {
            Value::Object(h) => self.set_property(*h, key, value),
            Value::Undefined | Value::Uninitialized | Value::Null => {
                Err(self.throw(ErrorKind::TypeError, format!("cannot set property '{}' of {}", key.as_display_name(), base_name(base))))
            }
            // Assigning a property onto a primitive string/number/boolean
            // silently does nothing, matching non-strict ECMAScript.
            _ => Ok(()),
        }
    }

    pub(crate) fn scope_parent_key() -> PropertyKey {
        PropertyKey::Symbol(well_known().scope_parent)
    }
}

fn base_name(v: &Value) -> &'static str {
    match v {
        Value::Undefined | Value::Uninitialized => "undefined",
        Value::Null => "null",
        _ => "value",
    }
}
