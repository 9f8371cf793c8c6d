// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ### Iteration protocol (spec §7/§9 `StopIteration`)
//!
//! `for...of`, array/object spread and destructuring rest-collection
//! all go through the same two operations: get an iterator object off
//! a value, then pull values from its `next()` until it throws the
//! `StopIteration` sentinel symbol — the pre-ES6 idiom spec §9 names
//! explicitly, rather than a `{done, value}` result record. Arrays and
//! strings get a default iterator synthesized on the fly so that core
//! `for...of` works over them without any `Array.prototype`/
//! `String.prototype` library content (excluded per spec's Non-goals)
//! needing to exist.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::ErrorKind;
use crate::eval::Flow;
use crate::heap::ObjectHandle;
use crate::property_key::PropertyKey;
use crate::symbol::well_known;
use crate::value::function::{NativeCallContext, NativeCallback, NativeFn};
use crate::value::object::{ObjectData, ObjectKind, Property};
use crate::value::Value;
use crate::Engine;

/// An iterator in progress: just the JS-level object exposing `next()`,
/// whether that's a generator, a synthesized default array/string
/// iterator, or a user object's own `symbol.iterator` result.
pub struct JsIterator(Value);

impl Engine {
    /// `get_iterator`, spec §7: generators are already iterators of
    /// themselves; arrays and strings get a default iterator
    /// synthesized on the fly; anything else must expose a callable
    /// `symbol.iterator` method.
    pub fn get_iterator(&mut self, value: Value) -> Flow<JsIterator> {
        if let Value::Object(h) = &value {
            if matches!(self.heap.get(*h).kind, ObjectKind::Generator(_)) {
                return Ok(JsIterator(value));
            }
            if matches!(self.heap.get(*h).kind, ObjectKind::Array) {
                return Ok(JsIterator(self.make_default_array_iterator(*h)));
            }
        }
        if let Value::String(s) = &value {
            return Ok(JsIterator(self.make_default_string_iterator(s.to_string())));
        }
        let key = PropertyKey::Symbol(well_known().iterator);
        let method = self.get_value_property(&value, &key)?;
        if method.is_nullish() {
            return Err(self.throw(ErrorKind::TypeError, "value is not iterable"));
        }
        let iter_obj = self.call(method, value, &[])?;
        Ok(JsIterator(iter_obj))
    }

    /// Pulls the next value, `None` once the iterator's `next()` throws
    /// `StopIteration`. Any other thrown value propagates normally.
    pub fn iterator_next(&mut self, it: &mut JsIterator) -> Flow<Option<Value>> {
        let next_fn = self.get_value_property(&it.0, &PropertyKey::from("next"))?;
        match self.call(next_fn, it.0.clone(), &[]) {
            Ok(v) => Ok(Some(v)),
            Err(crate::eval::Completion::Throw(Value::Symbol(s), _)) if s == well_known().stop_iteration => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn make_default_array_iterator(&mut self, array: ObjectHandle) -> Value {
        let handle = self.heap.alloc(ObjectData::new(ObjectKind::Ordinary, Some(self.object_proto)));
        let cursor = Rc::new(RefCell::new(0u32));
        let callback: Rc<NativeCallback> = Rc::new(move |ctx: &mut NativeCallContext| {
            let idx = *cursor.borrow();
            let len = ctx.engine.heap.get(array).array_length();
            if idx >= len {
                return Err(ctx.engine.stop_iteration_error());
            }
            let value = ctx
                .engine
                .get_property(array, &PropertyKey::ArrayIndex(idx))
                .map_err(|c| ctx.engine.completion_to_js_error(c))?;
            *cursor.borrow_mut() = idx + 1;
            Ok(value)
        });
        self.install_next(handle, callback)
    }

    fn make_default_string_iterator(&mut self, s: std::string::String) -> Value {
        let handle = self.heap.alloc(ObjectData::new(ObjectKind::Ordinary, Some(self.object_proto)));
        let chars: Vec<std::string::String> = s.chars().map(|c| c.to_string()).collect();
        let cursor = Rc::new(RefCell::new(0usize));
        let callback: Rc<NativeCallback> = Rc::new(move |ctx: &mut NativeCallContext| {
            let idx = *cursor.borrow();
            if idx >= chars.len() {
                return Err(ctx.engine.stop_iteration_error());
            }
            *cursor.borrow_mut() = idx + 1;
            Ok(Value::string(chars[idx].clone()))
        });
        self.install_next(handle, callback)
    }

    fn install_next(&mut self, handle: ObjectHandle, callback: Rc<NativeCallback>) -> Value {
        let native = NativeFn { name: "next".into(), arity: 0, callback };
        let native_handle = self.heap.alloc(ObjectData::new(ObjectKind::Native(native), Some(self.function_proto)));
        self.heap.get_mut(handle).define_property(
            PropertyKey::from("next"),
            Property::Data { value: Value::Object(native_handle), writable: false, enumerable: false, configurable: true },
        );
        Value::Object(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::parse_program;

    fn run(src: &str) -> Value {
        let mut engine = crate::new_engine(crate::Options::default());
        let program = parse_program(src, "test.js").expect("parse");
        engine.run_program(&program).expect("run")
    }

    #[test]
    fn for_of_walks_an_array() {
        let v = run("let sum = 0; for (let x of [1,2,3]) { sum = sum + x; } sum;");
        assert!(matches!(v, Value::Number(n) if n == crate::number::Number::Int32(6)));
    }

    #[test]
    fn for_of_walks_a_string() {
        let v = run("let out = ''; for (let ch of 'abc') { out = out + ch + '-'; } out;");
        assert!(matches!(v, Value::String(s) if &*s == "a-b-c-"));
    }

    #[test]
    fn spread_consumes_a_generator() {
        let v = run("function* g() { yield 1; yield 2; } let arr = [...g()]; arr.length;");
        assert!(matches!(v, Value::Number(n) if n == crate::number::Number::Int32(2)));
    }
}
