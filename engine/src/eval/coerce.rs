// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ### [4.3 Value operations — coercion](spec §4.3)
//!
//! `toPrimitive`/`toNumber`/`toString`/abstract equality all need to
//! *call* `valueOf`/`toString` methods, so they live here next to the
//! evaluator's call machinery rather than on [`crate::value::Value`]
//! itself.

use crate::error::ErrorKind;
use crate::eval::Completion;
use crate::number::Number;
use crate::property_key::PropertyKey;
use crate::value::object::ObjectKind;
use crate::value::Value;
use crate::Engine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    Number,
    String,
}

impl Engine {
    /// `toPrimitive(hint)`, spec §4.3: for objects, call `valueOf`
    /// (hint=number) or `toString` (hint=string) first; if that yields
    /// an object, try the other; `TypeError` if both yield non-primitive.
    pub fn to_primitive(&mut self, value: Value, hint: Hint) -> Result<Value, Completion> {
        let Value::Object(obj) = value else { return Ok(value) };
        let order: [&str; 2] = match hint {
            Hint::Number => ["valueOf", "toString"],
            Hint::String => ["toString", "valueOf"],
        };
        for method_name in order {
            if let Some(method) = self.lookup_callable_method(obj, method_name) {
                let result = self.call(method, Value::Object(obj), &[])?;
                if !result.is_object() {
                    return Ok(result);
                }
            }
        }
        Err(self.throw(ErrorKind::TypeError, "cannot convert object to primitive value"))
    }

    fn lookup_callable_method(&self, obj: crate::heap::ObjectHandle, name: &str) -> Option<Value> {
        let key = PropertyKey::from(name);
        let mut cur = Some(obj);
        while let Some(h) = cur {
            let data = self.heap.get(h);
            if let Some(prop) = data.get_own(&key) {
                if let crate::value::object::Property::Data { value, .. } = prop {
                    if let Value::Object(fh) = value {
                        if matches!(
                            self.heap.get(*fh).kind,
                            ObjectKind::Function(_) | ObjectKind::Native(_) | ObjectKind::Bound(_)
                        ) {
                            return Some(value.clone());
                        }
                    }
                }
                return None;
            }
            cur = data.prototype;
        }
        None
    }

    pub fn to_number(&mut self, value: Value) -> Result<Number, Completion> {
        match value {
            Value::Number(n) => Ok(n),
            Value::Boolean(b) => Ok(Number::Int32(if b { 1 } else { 0 })),
            Value::Null => Ok(Number::Int32(0)),
            Value::Undefined | Value::Uninitialized => Ok(Number::NaN),
            Value::String(s) => Ok(string_to_number(&s)),
            Value::Symbol(_) => Err(self.throw(ErrorKind::TypeError, "cannot convert a symbol to a number")),
            Value::Object(_) => {
                let prim = self.to_primitive(value, Hint::Number)?;
                self.to_number(prim)
            }
        }
    }

    pub fn to_string_value(&mut self, value: Value) -> Result<std::string::String, Completion> {
        match value {
            Value::String(s) => Ok(s.to_string()),
            Value::Undefined | Value::Uninitialized => Ok("undefined".into()),
            Value::Null => Ok("null".into()),
            Value::Boolean(b) => Ok(b.to_string()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Symbol(_) => Err(self.throw(ErrorKind::TypeError, "cannot convert a symbol to a string")),
            Value::Object(_) => {
                let prim = self.to_primitive(value, Hint::String)?;
                self.to_string_value(prim)
            }
        }
    }

    pub fn to_object(&mut self, value: Value) -> Result<crate::heap::ObjectHandle, Completion> {
        match value {
            Value::Object(h) => Ok(h),
            Value::Undefined | Value::Uninitialized | Value::Null => {
                Err(self.throw(ErrorKind::TypeError, "cannot convert undefined or null to object"))
            }
            _ => {
                // Boxing a primitive into a wrapper object is out of
                // scope; property access on primitives is handled
                // directly by `get_value_property` instead.
                Err(self.throw(ErrorKind::TypeError, "value has no object representation"))
            }
        }
    }

    /// `==`/`!=`'s abstract-equality ladder, spec §4.3.
    pub fn abstract_eq(&mut self, a: Value, b: Value) -> Result<bool, Completion> {
        use Value::*;
        match (&a, &b) {
            (Undefined | Uninitialized | Null, Undefined | Uninitialized | Null) => Ok(true),
            (Number(_), Number(_)) | (String(_), String(_)) | (Boolean(_), Boolean(_)) | (Symbol(_), Symbol(_)) | (Object(_), Object(_)) => {
                Ok(a.strict_eq(&b))
            }
            (Number(_), String(_)) => {
                let bn = self.to_number(b)?;
                Ok(a.strict_eq(&Value::Number(bn)))
            }
            (String(_), Number(_)) => {
                let an = self.to_number(a)?;
                Ok(Value::Number(an).strict_eq(&b))
            }
            (Boolean(_), _) => {
                let an = self.to_number(a)?;
                self.abstract_eq(Value::Number(an), b)
            }
            (_, Boolean(_)) => {
                let bn = self.to_number(b)?;
                self.abstract_eq(a, Value::Number(bn))
            }
            (Object(_), Number(_) | String(_)) => {
                let ap = self.to_primitive(a, Hint::Number)?;
                self.abstract_eq(ap, b)
            }
            (Number(_) | String(_), Object(_)) => {
                let bp = self.to_primitive(b, Hint::Number)?;
                self.abstract_eq(a, bp)
            }
            _ => Ok(false),
        }
    }
}

/// `ToNumber` on a string, spec §3.1/§4.3: trimmed decimal/hex/octal
/// literal, or `NaN` for anything else. Empty/whitespace-only is `0`.
fn string_to_number(s: &str) -> Number {
    let t = s.trim();
    if t.is_empty() {
        return Number::Int32(0);
    }
    if t == "Infinity" || t == "+Infinity" {
        return Number::Infinity(1);
    }
    if t == "-Infinity" {
        return Number::Infinity(-1);
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return match u64::from_str_radix(hex, 16) {
            Ok(v) => Number::from_f64(v as f64),
            Err(_) => Number::NaN,
        };
    }
    match t.parse::<f64>() {
        Ok(v) => Number::from_f64(v),
        Err(_) => Number::NaN,
    }
}
