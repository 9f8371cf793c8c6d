// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ### [4.5.1/4.5.2 Expression evaluation](spec §4.5.1, §4.5.2)
//!
//! Optional chaining (`?.`) needs an entire member/call chain to
//! short-circuit to `undefined` the moment any link hits a nullish
//! base, not just the one `?.` step itself — `eval_chain` models that
//! by returning `Flow<Option<Value>>` and threading `None` straight
//! back up through the recursive calls each nested `Member`/`Call`
//! node already makes, instead of a separate chain-walking pass.

use crate::error::ErrorKind;
use crate::eval::coerce::Hint;
use crate::eval::{Completion, Flow};
use crate::heap::ObjectHandle;
use crate::number::Number;
use crate::property_key::PropertyKey;
use crate::scope::{self, Binding};
use crate::tokenizer::tree::{AssignOp, BinOp, LogOp, MemberProp, Node, ObjectProp, UnOp, UpdateOp};
use crate::value::object::Property;
use crate::value::Value;
use crate::Engine;

impl Engine {
    pub(crate) fn eval_expr(&mut self, node: &Node, scope: ObjectHandle) -> Flow<Value> {
        match node {
            Node::NumberLit(n) => Ok(Value::Number(Number::from_f64(*n))),
            Node::StringLit(s) => Ok(Value::string(s.clone())),
            Node::BoolLit(b) => Ok(Value::Boolean(*b)),
            Node::NullLit => Ok(Value::Null),
            Node::UndefinedLit => Ok(Value::Undefined),
            Node::ThisExpr => Ok(scope::resolve_this(&self.heap, scope)),
            Node::NewTarget => Ok(scope::resolve_new_target(&self.heap, scope)),
            Node::Ident(name) => self.eval_ident(name, scope),
            Node::RegexLit { pattern, flags } => {
                let handle = self.heap.alloc(crate::value::object::ObjectData::new(
                    crate::value::object::ObjectKind::Regex { pattern: pattern.clone(), flags: flags.clone() },
                    Some(self.object_proto),
                ));
                Ok(Value::Object(handle))
            }
            Node::TemplateLiteral { quasis, exprs } => {
                let mut out = std::string::String::new();
                for (i, q) in quasis.iter().enumerate() {
                    out.push_str(q);
                    if let Some(e) = exprs.get(i) {
                        let v = self.eval_expr(e, scope)?;
                        let s = self.to_string_value(v)?;
                        out.push_str(&s);
                    }
                }
                Ok(Value::string(out))
            }
            Node::ArrayLit(elements) => self.eval_array_lit(elements, scope),
            Node::ObjectLit(props) => self.eval_object_lit(props, scope),
            Node::Function(body) | Node::FunctionExpr(body) => Ok(self.make_closure(body.clone(), Some(scope))),
            Node::Unary { op, expr } => self.eval_unary(*op, expr, scope),
            Node::Update { op, prefix, target } => self.eval_update(*op, *prefix, target, scope),
            Node::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs, scope),
            Node::Logical { op, lhs, rhs } => self.eval_logical(*op, lhs, rhs, scope),
            Node::Assign { op, target, value } => self.eval_assign(*op, target, value, scope),
            Node::Conditional { test, cons, alt } => {
                if self.eval_expr(test, scope)?.to_boolean() {
                    self.eval_expr(cons, scope)
                } else {
                    self.eval_expr(alt, scope)
                }
            }
            Node::Call { .. } | Node::Member { .. } => Ok(self.eval_chain(node, scope)?.unwrap_or(Value::Undefined)),
            Node::New { callee, args } => {
                let callee_val = self.eval_expr(callee, scope)?;
                let arg_vals = self.eval_args(args, scope)?;
                self.construct(callee_val, &arg_vals)
            }
            Node::Sequence(exprs) => {
                let mut last = Value::Undefined;
                for e in exprs {
                    last = self.eval_expr(e, scope)?;
                }
                Ok(last)
            }
            Node::Spread(_) => Err(self.throw(ErrorKind::SyntaxError, "unexpected spread outside a call/array/object")),
            Node::Yield { arg, delegate } => self.eval_yield(arg.as_deref(), *delegate, scope),
            other => Err(self.throw(ErrorKind::SyntaxError, format!("{other:?} is not a valid expression"))),
        }
    }

    fn eval_ident(&mut self, name: &str, scope: ObjectHandle) -> Flow<Value> {
        match scope::resolve(&self.heap, scope, name) {
            Some(Binding::Scope(h)) => {
                let v = match self.heap.get(h).get_own(&PropertyKey::from(name)) {
                    Some(Property::Data { value, .. }) => value.clone(),
                    _ => Value::Undefined,
                };
                if matches!(v, Value::Uninitialized) {
                    return Err(self.throw(ErrorKind::ReferenceError, format!("cannot access '{name}' before initialization")));
                }
                Ok(v)
            }
            Some(Binding::WithTarget(h)) => self.get_property(h, &PropertyKey::from(name)),
            None => Err(self.throw(ErrorKind::ReferenceError, format!("{name} is not defined"))),
        }
    }

    fn eval_array_lit(&mut self, elements: &[Option<Node>], scope: ObjectHandle) -> Flow<Value> {
        let arr_handle = match self.new_array(std::iter::empty()) {
            Value::Object(h) => h,
            _ => unreachable!(),
        };
        let mut idx = 0u32;
        for el in elements {
            match el {
                None => idx += 1,
                Some(Node::Spread(inner)) => {
                    let src = self.eval_expr(inner, scope)?;
                    let mut it = self.get_iterator(src)?;
                    while let Some(v) = self.iterator_next(&mut it)? {
                        self.heap.get_mut(arr_handle).set_data(idx, v);
                        idx += 1;
                    }
                }
                Some(n) => {
                    let v = self.eval_expr(n, scope)?;
                    self.heap.get_mut(arr_handle).set_data(idx, v);
                    idx += 1;
                }
            }
        }
        Ok(Value::Object(arr_handle))
    }

    fn eval_object_lit(&mut self, props: &[ObjectProp], scope: ObjectHandle) -> Flow<Value> {
        let obj = self.new_plain_object();
        for p in props {
            match p {
                ObjectProp::KeyValue { key, value, .. } => {
                    let k = self.pattern_key(key, scope)?;
                    let v = self.eval_expr(value, scope)?;
                    self.heap.get_mut(obj).set_data(k, v);
                }
                ObjectProp::Getter { key, body } => {
                    let k = self.pattern_key(key, scope)?;
                    let f = self.make_closure(body.clone(), Some(scope));
                    self.define_accessor(obj, k, Some(f), None);
                }
                ObjectProp::Setter { key, body } => {
                    let k = self.pattern_key(key, scope)?;
                    let f = self.make_closure(body.clone(), Some(scope));
                    self.define_accessor(obj, k, None, Some(f));
                }
                ObjectProp::Spread(node) => {
                    let src = self.eval_expr(node, scope)?;
                    self.spread_into_object(obj, src)?;
                }
            }
        }
        Ok(Value::Object(obj))
    }

    fn define_accessor(&mut self, obj: ObjectHandle, key: PropertyKey, get: Option<Value>, set: Option<Value>) {
        let existing = self.heap.get(obj).get_own(&key).cloned();
        let (mut g, mut s, enumerable, configurable) = match existing {
            Some(Property::Accessor { get, set, enumerable, configurable }) => (get, set, enumerable, configurable),
            _ => (None, None, true, true),
        };
        if let Some(f) = get {
            g = f.as_object();
        }
        if let Some(f) = set {
            s = f.as_object();
        }
        self.heap.get_mut(obj).define_property(key, Property::Accessor { get: g, set: s, enumerable, configurable });
    }

    fn spread_into_object(&mut self, obj: ObjectHandle, src: Value) -> Flow<()> {
        if let Value::Object(sh) = src {
            let entries: Vec<_> = self
                .heap
                .get(sh)
                .own_entries()
                .filter(|(k, p)| p.enumerable() && !matches!(k, PropertyKey::Symbol(_)))
                .map(|(k, p)| (k.clone(), p.clone()))
                .collect();
            for (k, p) in entries {
                let v = match p {
                    Property::Data { value, .. } => value,
                    Property::Accessor { get: Some(getter), .. } => self.call(Value::Object(getter), Value::Object(sh), &[])?,
                    Property::Accessor { get: None, .. } => Value::Undefined,
                };
                self.heap.get_mut(obj).set_data(k, v);
            }
        }
        Ok(())
    }

    pub(crate) fn eval_args(&mut self, args: &[Node], scope: ObjectHandle) -> Flow<Vec<Value>> {
        let mut out = Vec::with_capacity(args.len());
        for a in args {
            match a {
                Node::Spread(inner) => {
                    let src = self.eval_expr(inner, scope)?;
                    let mut it = self.get_iterator(src)?;
                    while let Some(v) = self.iterator_next(&mut it)? {
                        out.push(v);
                    }
                }
                other => out.push(self.eval_expr(other, scope)?),
            }
        }
        Ok(out)
    }

    fn member_key(&mut self, prop: &MemberProp, scope: ObjectHandle) -> Flow<PropertyKey> {
        match prop {
            MemberProp::Ident(name) => Ok(PropertyKey::from(name.as_str())),
            MemberProp::Computed(node) => {
                let v = self.eval_expr(node, scope)?;
                self.to_property_key(v)
            }
        }
    }

    /// Evaluates a `Member`/`Call` chain, short-circuiting to `None`
    /// the instant an optional (`?.`) step's base/callee is nullish —
    /// every enclosing `Member`/`Call` node in the chain propagates
    /// that `None` straight back up without evaluating its own step.
    fn eval_chain(&mut self, node: &Node, scope: ObjectHandle) -> Flow<Option<Value>> {
        match node {
            Node::Member { object, prop, optional } => {
                let Some(base) = self.eval_chain(object, scope)? else { return Ok(None) };
                if *optional && base.is_nullish() {
                    return Ok(None);
                }
                let key = self.member_key(prop, scope)?;
                Ok(Some(self.get_value_property(&base, &key)?))
            }
            Node::Call { callee, args, optional } => {
                let (this_val, callee_val) = match callee.as_ref() {
                    Node::Member { object, prop, optional: member_optional } => {
                        let Some(base) = self.eval_chain(object, scope)? else { return Ok(None) };
                        if *member_optional && base.is_nullish() {
                            return Ok(None);
                        }
                        let key = self.member_key(prop, scope)?;
                        let f = self.get_value_property(&base, &key)?;
                        (base, f)
                    }
                    other => {
                        let Some(f) = self.eval_chain(other, scope)? else { return Ok(None) };
                        (Value::Undefined, f)
                    }
                };
                if *optional && callee_val.is_nullish() {
                    return Ok(None);
                }
                let arg_vals = self.eval_args(args, scope)?;
                Ok(Some(self.call(callee_val, this_val, &arg_vals)?))
            }
            other => Ok(Some(self.eval_expr(other, scope)?)),
        }
    }

    fn eval_unary(&mut self, op: UnOp, expr: &Node, scope: ObjectHandle) -> Flow<Value> {
        match op {
            UnOp::TypeOf => {
                if let Node::Ident(name) = expr {
                    if scope::resolve(&self.heap, scope, name).is_none() {
                        return Ok(Value::string("undefined"));
                    }
                }
                let v = self.eval_expr(expr, scope)?;
                Ok(Value::string(v.type_of(&self.heap)))
            }
            UnOp::Void => {
                self.eval_expr(expr, scope)?;
                Ok(Value::Undefined)
            }
            UnOp::Delete => match expr {
                Node::Member { object, prop, .. } => {
                    let base = self.eval_expr(object, scope)?;
                    let key = self.member_key(prop, scope)?;
                    match base {
                        Value::Object(h) => Ok(Value::Boolean(self.delete_property(h, &key))),
                        _ => Ok(Value::Boolean(true)),
                    }
                }
                Node::Ident(_) => Err(self.throw(ErrorKind::ReferenceError, "delete of an unqualified identifier")),
                _ => {
                    self.eval_expr(expr, scope)?;
                    Ok(Value::Boolean(true))
                }
            },
            UnOp::Neg => {
                let v = self.eval_expr(expr, scope)?;
                let n = self.to_number(v)?;
                Ok(Value::Number(Number::from_f64(-n.as_f64())))
            }
            UnOp::Plus => {
                let v = self.eval_expr(expr, scope)?;
                let n = self.to_number(v)?;
                Ok(Value::Number(n))
            }
            UnOp::Not => {
                let v = self.eval_expr(expr, scope)?;
                Ok(Value::Boolean(!v.to_boolean()))
            }
            UnOp::BNot => {
                let v = self.eval_expr(expr, scope)?;
                let n = self.to_number(v)?;
                Ok(Value::Number(Number::from_f64(!n.to_int32() as f64)))
            }
        }
    }

    fn eval_update(&mut self, op: UpdateOp, prefix: bool, target: &Node, scope: ObjectHandle) -> Flow<Value> {
        let old_val = self.eval_expr(target, scope)?;
        let old = self.to_number(old_val)?;
        let new_n = match op {
            UpdateOp::Inc => Number::from_f64(old.as_f64() + 1.0),
            UpdateOp::Dec => Number::from_f64(old.as_f64() - 1.0),
        };
        self.assign_target(target, Value::Number(new_n), scope)?;
        Ok(Value::Number(if prefix { new_n } else { old }))
    }

    fn eval_binary(&mut self, op: BinOp, lhs: &Node, rhs: &Node, scope: ObjectHandle) -> Flow<Value> {
        let l = self.eval_expr(lhs, scope)?;
        let r = self.eval_expr(rhs, scope)?;
        self.binary_op(op, l, r)
    }

    pub(crate) fn binary_op(&mut self, op: BinOp, l: Value, r: Value) -> Flow<Value> {
        match op {
            BinOp::Add => self.add_values(l, r),
            BinOp::Sub => self.numeric_op(l, r, |a, b| a - b),
            BinOp::Mul => self.numeric_op(l, r, |a, b| a * b),
            BinOp::Div => self.numeric_op(l, r, |a, b| a / b),
            BinOp::Mod => self.numeric_op(l, r, |a, b| a % b),
            BinOp::Pow => self.numeric_op(l, r, f64::powf),
            BinOp::ShiftLeft => {
                let ln = self.to_number(l)?;
                let rn = self.to_number(r)?;
                Ok(Value::Number(Number::from_f64((ln.to_int32() << (rn.to_uint32() & 31)) as f64)))
            }
            BinOp::ShiftRight => {
                let ln = self.to_number(l)?;
                let rn = self.to_number(r)?;
                Ok(Value::Number(Number::from_f64((ln.to_int32() >> (rn.to_uint32() & 31)) as f64)))
            }
            BinOp::UShiftRight => {
                let ln = self.to_number(l)?;
                let rn = self.to_number(r)?;
                Ok(Value::Number(Number::from_f64((ln.to_uint32() >> (rn.to_uint32() & 31)) as f64)))
            }
            BinOp::BAnd => {
                let ln = self.to_number(l)?;
                let rn = self.to_number(r)?;
                Ok(Value::Number(Number::from_f64((ln.to_int32() & rn.to_int32()) as f64)))
            }
            BinOp::BOr => {
                let ln = self.to_number(l)?;
                let rn = self.to_number(r)?;
                Ok(Value::Number(Number::from_f64((ln.to_int32() | rn.to_int32()) as f64)))
            }
            BinOp::BXor => {
                let ln = self.to_number(l)?;
                let rn = self.to_number(r)?;
                Ok(Value::Number(Number::from_f64((ln.to_int32() ^ rn.to_int32()) as f64)))
            }
            BinOp::Lt => self.relational(l, r, Ordering::less()),
            BinOp::Lte => self.relational(l, r, Ordering::less_eq()),
            BinOp::Gt => self.relational(l, r, Ordering::greater()),
            BinOp::Gte => self.relational(l, r, Ordering::greater_eq()),
            BinOp::Eq => Ok(Value::Boolean(self.abstract_eq(l, r)?)),
            BinOp::NotEq => Ok(Value::Boolean(!self.abstract_eq(l, r)?)),
            BinOp::StrictEq => Ok(Value::Boolean(l.strict_eq(&r))),
            BinOp::StrictNotEq => Ok(Value::Boolean(!l.strict_eq(&r))),
            BinOp::In => {
                let key = self.to_property_key(r.clone())?;
                match r {
                    Value::Object(h) => Ok(Value::Boolean(self.has_property(h, &key))),
                    _ => Err(self.throw(ErrorKind::TypeError, "cannot use 'in' on a non-object")),
                }
            }
            BinOp::InstanceOf => self.instance_of(l, r),
        }
    }

    fn add_values(&mut self, l: Value, r: Value) -> Flow<Value> {
        let lp = self.to_primitive(l, Hint::Number)?;
        let rp = self.to_primitive(r, Hint::Number)?;
        if matches!(lp, Value::String(_)) || matches!(rp, Value::String(_)) {
            let ls = self.plus_stringify(lp)?;
            let rs = self.plus_stringify(rp)?;
            Ok(Value::string(format!("{ls}{rs}")))
        } else {
            let ln = self.to_number(lp)?;
            let rn = self.to_number(rp)?;
            Ok(Value::Number(ln.op(rn, |a, b| a + b)))
        }
    }

    /// `ToString` for the `+` operator specifically maps `null` to `""`
    /// rather than `"null"` — the documented string-concat anomaly
    /// (SPEC_FULL §11) the reference implementation's `+` carries.
    fn plus_stringify(&mut self, v: Value) -> Flow<std::string::String> {
        if matches!(v, Value::Null) {
            return Ok(std::string::String::new());
        }
        self.to_string_value(v)
    }

    fn numeric_op(&mut self, l: Value, r: Value, f: impl Fn(f64, f64) -> f64) -> Flow<Value> {
        let ln = self.to_number(l)?;
        let rn = self.to_number(r)?;
        Ok(Value::Number(ln.op(rn, f)))
    }

    fn relational(&mut self, l: Value, r: Value, cmp: Ordering) -> Flow<Value> {
        let lp = self.to_primitive(l, Hint::Number)?;
        let rp = self.to_primitive(r, Hint::Number)?;
        if let (Value::String(a), Value::String(b)) = (&lp, &rp) {
            let ord = a.as_ref().cmp(b.as_ref());
            return Ok(Value::Boolean(cmp.matches(ord)));
        }
        let ln = self.to_number(lp)?;
        let rn = self.to_number(rp)?;
        match ln.partial_cmp(&rn) {
            Some(ord) => Ok(Value::Boolean(cmp.matches(ord))),
            None => Ok(Value::Boolean(false)),
        }
    }

    fn has_property(&self, obj: ObjectHandle, key: &PropertyKey) -> bool {
        let mut cur = Some(obj);
        while let Some(h) = cur {
            let data = self.heap.get(h);
            if data.get_own(key).is_some() {
                return true;
            }
            cur = data.prototype;
        }
        false
    }

    fn instance_of(&mut self, l: Value, r: Value) -> Flow<Value> {
        let Value::Object(ctor) = r else {
            return Err(self.throw(ErrorKind::TypeError, "right-hand side of 'instanceof' is not callable"));
        };
        if !matches!(
            self.heap.get(ctor).kind,
            crate::value::object::ObjectKind::Function(_) | crate::value::object::ObjectKind::Native(_) | crate::value::object::ObjectKind::Bound(_)
        ) {
            return Err(self.throw(ErrorKind::TypeError, "right-hand side of 'instanceof' is not callable"));
        }
        let proto = match self.get_property(ctor, &PropertyKey::from("prototype"))? {
            Value::Object(h) => h,
            _ => return Ok(Value::Boolean(false)),
        };
        let Value::Object(mut cur) = l else { return Ok(Value::Boolean(false)) };
        loop {
            let Some(next) = self.heap.get(cur).prototype else { return Ok(Value::Boolean(false)) };
            if next == proto {
                return Ok(Value::Boolean(true));
            }
            cur = next;
        }
    }

    fn eval_logical(&mut self, op: LogOp, lhs: &Node, rhs: &Node, scope: ObjectHandle) -> Flow<Value> {
        let l = self.eval_expr(lhs, scope)?;
        match op {
            LogOp::And => {
                if l.to_boolean() {
                    self.eval_expr(rhs, scope)
                } else {
                    Ok(l)
                }
            }
            LogOp::Or => {
                if l.to_boolean() {
                    Ok(l)
                } else {
                    self.eval_expr(rhs, scope)
                }
            }
            LogOp::Nullish => {
                if l.is_nullish() {
                    self.eval_expr(rhs, scope)
                } else {
                    Ok(l)
                }
            }
        }
    }

    fn eval_assign(&mut self, op: AssignOp, target: &Node, value: &Node, scope: ObjectHandle) -> Flow<Value> {
        match op {
            AssignOp::Assign => {
                let v = self.eval_expr(value, scope)?;
                self.assign_target(target, v.clone(), scope)?;
                Ok(v)
            }
            AssignOp::And | AssignOp::Or | AssignOp::Nullish => {
                let old = self.eval_expr(target, scope)?;
                let should_assign = match op {
                    AssignOp::And => old.to_boolean(),
                    AssignOp::Or => !old.to_boolean(),
                    AssignOp::Nullish => old.is_nullish(),
                    _ => unreachable!(),
                };
                if should_assign {
                    let v = self.eval_expr(value, scope)?;
                    self.assign_target(target, v.clone(), scope)?;
                    Ok(v)
                } else {
                    Ok(old)
                }
            }
            _ => {
                let old = self.eval_expr(target, scope)?;
                let rhs_val = self.eval_expr(value, scope)?;
                let bin_op = compound_to_binary(op);
                let result = self.binary_op(bin_op, old, rhs_val)?;
                self.assign_target(target, result.clone(), scope)?;
                Ok(result)
            }
        }
    }

    fn assign_target(&mut self, target: &Node, value: Value, scope: ObjectHandle) -> Flow<()> {
        match target {
            Node::Ident(name) => self.assign_ident(name, value, scope),
            Node::Member { object, prop, .. } => {
                let base = self.eval_expr(object, scope)?;
                let key = self.member_key(prop, scope)?;
                self.set_value_property(&base, key, value)
            }
            Node::ArrayLit(elements) => self.destructure_array_target(elements, value, scope),
            Node::ObjectLit(props) => self.destructure_object_target(props, value, scope),
            _ => Err(self.throw(ErrorKind::ReferenceError, "invalid assignment target")),
        }
    }

    fn assign_ident(&mut self, name: &str, value: Value, scope: ObjectHandle) -> Flow<()> {
        match scope::resolve(&self.heap, scope, name) {
            Some(Binding::Scope(h)) => {
                if let Some(Property::Data { writable: false, .. }) = self.heap.get(h).get_own(&PropertyKey::from(name)) {
                    return Err(self.throw(ErrorKind::TypeError, format!("assignment to constant variable '{name}'")));
                }
                scope::declare(&mut self.heap, h, name, value);
                Ok(())
            }
            Some(Binding::WithTarget(h)) => self.set_property(h, PropertyKey::from(name), value),
            None => {
                // Non-strict fallback: an assignment to an undeclared
                // name creates it on the global scope (documented Open
                // Question resolution, see DESIGN.md).
                scope::declare(&mut self.heap, self.global_scope, name, value);
                Ok(())
            }
        }
    }

    fn destructure_array_target(&mut self, elements: &[Option<Node>], value: Value, scope: ObjectHandle) -> Flow<()> {
        let mut it = self.get_iterator(value)?;
        for el in elements {
            match el {
                None => {
                    self.iterator_next(&mut it)?;
                }
                Some(Node::Spread(inner)) => {
                    let mut rest = Vec::new();
                    while let Some(v) = self.iterator_next(&mut it)? {
                        rest.push(v);
                    }
                    let arr = self.new_array(rest);
                    self.assign_target(inner, arr, scope)?;
                    return Ok(());
                }
                Some(Node::Assign { op: AssignOp::Assign, target: inner, value: default }) => {
                    let v = self.iterator_next(&mut it)?.unwrap_or(Value::Undefined);
                    let v = if matches!(v, Value::Undefined) { self.eval_expr(default, scope)? } else { v };
                    self.assign_target(inner, v, scope)?;
                }
                Some(n) => {
                    let v = self.iterator_next(&mut it)?.unwrap_or(Value::Undefined);
                    self.assign_target(n, v, scope)?;
                }
            }
        }
        Ok(())
    }

    fn destructure_object_target(&mut self, props: &[ObjectProp], value: Value, scope: ObjectHandle) -> Flow<()> {
        if value.is_nullish() {
            return Err(self.throw(ErrorKind::TypeError, "cannot destructure null or undefined"));
        }
        let mut used = Vec::new();
        for p in props {
            match p {
                ObjectProp::KeyValue { key, value: target, .. } => {
                    let k = self.pattern_key(key, scope)?;
                    used.push(k.clone());
                    let v = self.get_value_property(&value, &k)?;
                    match target {
                        Node::Assign { op: AssignOp::Assign, target: inner, value: default } => {
                            let v = if matches!(v, Value::Undefined) { self.eval_expr(default, scope)? } else { v };
                            self.assign_target(inner, v, scope)?;
                        }
                        other => self.assign_target(other, v, scope)?,
                    }
                }
                ObjectProp::Spread(inner) => {
                    let rest_obj = self.new_plain_object();
                    if let Value::Object(src) = &value {
                        let entries: Vec<_> = self
                            .heap
                            .get(*src)
                            .own_entries()
                            .filter(|(k, p)| p.enumerable() && !used.contains(k) && !matches!(k, PropertyKey::Symbol(_)))
                            .map(|(k, p)| (k.clone(), p.clone()))
                            .collect();
                        for (k, p) in entries {
                            if let Property::Data { value, .. } = p {
                                self.heap.get_mut(rest_obj).set_data(k, value);
                            }
                        }
                    }
                    self.assign_target(inner, Value::Object(rest_obj), scope)?;
                }
                ObjectProp::Getter { .. } | ObjectProp::Setter { .. } => {
                    return Err(self.throw(ErrorKind::SyntaxError, "invalid destructuring target"));
                }
            }
        }
        Ok(())
    }

    fn eval_yield(&mut self, arg: Option<&Node>, delegate: bool, scope: ObjectHandle) -> Flow<Value> {
        if delegate {
            let inner = match arg {
                Some(e) => self.eval_expr(e, scope)?,
                None => Value::Undefined,
            };
            let mut it = self.get_iterator(inner)?;
            let mut last = Value::Undefined;
            while let Some(v) = self.iterator_next(&mut it)? {
                last = self.do_yield(v)?;
            }
            Ok(last)
        } else {
            let v = match arg {
                Some(e) => self.eval_expr(e, scope)?,
                None => Value::Undefined,
            };
            self.do_yield(v)
        }
    }
}

fn compound_to_binary(op: AssignOp) -> BinOp {
    match op {
        AssignOp::Add => BinOp::Add,
        AssignOp::Sub => BinOp::Sub,
        AssignOp::Mul => BinOp::Mul,
        AssignOp::Div => BinOp::Div,
        AssignOp::Mod => BinOp::Mod,
        AssignOp::Pow => BinOp::Pow,
        AssignOp::ShiftLeft => BinOp::ShiftLeft,
        AssignOp::ShiftRight => BinOp::ShiftRight,
        AssignOp::UShiftRight => BinOp::UShiftRight,
        AssignOp::BAnd => BinOp::BAnd,
        AssignOp::BOr => BinOp::BOr,
        AssignOp::BXor => BinOp::BXor,
        AssignOp::Assign | AssignOp::And | AssignOp::Or | AssignOp::Nullish => unreachable!("handled separately"),
    }
}

/// Tiny comparison-direction helper so the four relational operators
/// share one implementation instead of four near-identical copies.
#[derive(Clone, Copy)]
struct Ordering {
    allow_less: bool,
    allow_eq: bool,
    allow_greater: bool,
}

impl Ordering {
    fn less() -> Self {
        Ordering { allow_less: true, allow_eq: false, allow_greater: false }
    }
    fn less_eq() -> Self {
        Ordering { allow_less: true, allow_eq: true, allow_greater: false }
    }
    fn greater() -> Self {
        Ordering { allow_less: false, allow_eq: false, allow_greater: true }
    }
    fn greater_eq() -> Self {
        Ordering { allow_less: false, allow_eq: true, allow_greater: true }
    }
    fn matches(self, ord: core::cmp::Ordering) -> bool {
        match ord {
            core::cmp::Ordering::Less => self.allow_less,
            core::cmp::Ordering::Equal => self.allow_eq,
            core::cmp::Ordering::Greater => self.allow_greater,
        }
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
    fn optional_chain_short_circuits_whole_tail() {
        let v = run("let o = {a: null}; o.a?.b.c;");
        assert!(matches!(v, Value::Undefined));
    }

    #[test]
    fn plus_concatenates_null_as_empty_string() {
        let v = run("'x' + null;");
        assert!(matches!(v, Value::String(s) if &*s == "x"));
    }

    #[test]
    fn array_destructuring_assignment_swaps_values() {
        let v = run("let a = 1, b = 2; [a, b] = [b, a]; a;");
        assert!(matches!(v, Value::Number(n) if n == crate::number::Number::Int32(2)));
    }

    #[test]
    fn const_reassignment_throws_type_error() {
        let mut engine = crate::new_engine(crate::Options::default());
        let program = parse_program("const x = 1; x = 2;", "test.js").expect("parse");
        let err = engine.run_program(&program).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
    }

    #[test]
    fn relational_compares_strings_lexicographically() {
        let v = run("'apple' < 'banana';");
        assert!(matches!(v, Value::Boolean(true)));
    }
}
