// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ### [3.5/4.5.4 Function invocation](spec §3.5, §4.5.4) / [4.5.5 Generators](spec §4.5.5)
//!
//! `call`/`construct` dispatch on `ObjectKind`; formal-parameter binding
//! reuses the same [`bind_pattern`](Engine::bind_pattern) destructuring
//! walk that `var`/`let`/`const` declarations and `catch` clauses use,
//! since spec §3.6's `Fnc.arguments` is just a list of patterns.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::ErrorKind;
use crate::eval::{Completion, Flow};
use crate::heap::ObjectHandle;
use crate::property_key::PropertyKey;
use crate::scope;
use crate::tokenizer::tree::{FuncBody, Pattern, PropKeyPat};
use crate::value::function::{BoundData, FnData, NativeCallContext, NativeCallback, NativeFn};
use crate::value::generator::{CoroutineHandle, CoroutineHost, GeneratorControl, GeneratorData, GeneratorState, GeneratorStep, ResumeInput};
use crate::value::object::{ObjectData, ObjectKind, Property};
use crate::value::Value;
use crate::Engine;

/// A concrete wrapper turning the already-erased `Box<dyn CoroutineHandle>`
/// a [`CoroutineHost`] hands back into something `Rc<RefCell<_>>` can be
/// built from directly at a point where the compiler still knows the
/// concrete type, and then unsize-coerced to `dyn CoroutineHandle` —
/// `GeneratorData::handle` needs `Rc<RefCell<dyn CoroutineHandle>>`
/// specifically (not `Box<dyn CoroutineHandle>`) so that `#[derive(Clone)]`
/// on `ObjectData` keeps working: `Rc::clone` never requires `T: Clone`,
/// while `Box<dyn Trait>` has no blanket `Clone` impl at all.
struct BoxedHandle(Box<dyn CoroutineHandle>);

impl std::fmt::Debug for BoxedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl CoroutineHandle for BoxedHandle {
    fn resume(&mut self, input: ResumeInput) -> GeneratorStep {
        self.0.resume(input)
    }
}

/// Carries a generator's resume state across the spawned coroutine
/// thread boundary. `Rc<FuncBody>` and the raw `*mut Engine` are not
/// actually `Send`; this is sound under the same strict-handoff
/// discipline the generator module's own `AssertSend` documents — only
/// one of {driver thread, body thread} ever runs at a time.
struct SendGeneratorBody {
    engine_ptr: *mut Engine,
    scope: ObjectHandle,
    body: Rc<FuncBody>,
}
unsafe impl Send for SendGeneratorBody {}

impl Engine {
    /// The stack-depth guard standing in for the reference
    /// implementation's `stackBase`/margin pointer comparison (spec
    /// §4.7 "recursion guard"): safe Rust has no portable way to read
    /// the OS stack pointer, so a call-depth counter bounded by
    /// `Options::max_call_depth` is the idiomatic substitute (recorded
    /// in DESIGN.md).
    pub(crate) fn check_stack_depth(&mut self) -> Flow<()> {
        if self.call_depth >= self.max_call_depth {
            return Err(self.throw(ErrorKind::RangeError, "too much recursion"));
        }
        Ok(())
    }

    pub fn call(&mut self, callee: Value, this: Value, args: &[Value]) -> Flow<Value> {
        let Value::Object(fh) = callee else {
            return Err(self.throw(ErrorKind::TypeError, "value is not callable"));
        };
        let kind = self.heap.get(fh).kind.clone();
        match kind {
            ObjectKind::Function(fn_data) => self.call_user_function(fh, &fn_data, this, args, None),
            ObjectKind::Native(native) => self.call_native(&native, this, args, None),
            ObjectKind::Bound(bound) => {
                let mut full_args = bound.bound_args.clone();
                full_args.extend_from_slice(args);
                self.call(Value::Object(bound.target), bound.bound_this.clone(), &full_args)
            }
            _ => Err(self.throw(ErrorKind::TypeError, "value is not callable")),
        }
    }

    pub fn construct(&mut self, callee: Value, args: &[Value]) -> Flow<Value> {
        let Value::Object(fh) = callee else {
            return Err(self.throw(ErrorKind::TypeError, "value is not a constructor"));
        };
        let kind = self.heap.get(fh).kind.clone();
        match kind {
            ObjectKind::Function(fn_data) => {
                if fn_data.body.is_arrow {
                    return Err(self.throw(ErrorKind::TypeError, "arrow functions cannot be used with new"));
                }
                if fn_data.body.is_generator {
                    return Err(self.throw(ErrorKind::TypeError, "generator functions cannot be used with new"));
                }
                let proto = match self.get_property(fh, &PropertyKey::from("prototype"))? {
                    Value::Object(h) => h,
                    _ => self.object_proto,
                };
                let instance = self.new_object_with_proto(Some(proto));
                let ret = self.call_user_function(fh, &fn_data, Value::Object(instance), args, Some(fh))?;
                Ok(if ret.is_object() { ret } else { Value::Object(instance) })
            }
            ObjectKind::Native(native) => {
                let instance = self.new_plain_object();
                let ret = self.call_native(&native, Value::Object(instance), args, Some(instance))?;
                Ok(if ret.is_object() { ret } else { Value::Object(instance) })
            }
            ObjectKind::Bound(bound) => {
                let mut full_args = bound.bound_args.clone();
                full_args.extend_from_slice(args);
                self.construct(Value::Object(bound.target), &full_args)
            }
            _ => Err(self.throw(ErrorKind::TypeError, "value is not a constructor")),
        }
    }

    fn call_user_function(&mut self, fh: ObjectHandle, fn_data: &FnData, this: Value, args: &[Value], new_target: Option<ObjectHandle>) -> Flow<Value> {
        self.check_stack_depth()?;
        let body = fn_data.body.clone();
        let closure = fn_data.closure_scope;
        let is_arrow = body.is_arrow;
        let fn_scope = if is_arrow {
            scope::create_let_scope(&mut self.heap, closure)
        } else {
            scope::create_function_scope(&mut self.heap, closure, this, new_target)
        };
        for (i, pat) in body.params.iter().enumerate() {
            let arg_val = args.get(i).cloned().unwrap_or(Value::Undefined);
            self.bind_pattern(pat, arg_val, fn_scope)?;
        }
        if let Some(rest_pat) = &body.rest_param {
            let rest_vals: Vec<Value> = if args.len() > body.params.len() { args[body.params.len()..].to_vec() } else { Vec::new() };
            let arr = self.new_array(rest_vals);
            self.bind_pattern(rest_pat, arr, fn_scope)?;
        }
        if !is_arrow {
            let arguments_obj = self.new_array(args.iter().cloned());
            scope::declare(&mut self.heap, fn_scope, "arguments", arguments_obj);
            let fn_val = Value::Object(fh);
            scope::declare(&mut self.heap, fn_scope, "callee", fn_val);
        }
        if body.is_generator {
            return Ok(self.make_generator(body, fn_scope));
        }
        self.call_depth += 1;
        let result = self.exec_block(&body.body, fn_scope);
        self.call_depth -= 1;
        match result {
            Ok(_) => Ok(Value::Undefined),
            Err(Completion::Return(v)) => Ok(v),
            Err(e) => Err(e),
        }
    }

    fn call_native(&mut self, native: &NativeFn, this: Value, args: &[Value], new_target: Option<ObjectHandle>) -> Flow<Value> {
        self.check_stack_depth()?;
        self.call_depth += 1;
        let result = {
            let mut ctx = NativeCallContext { engine: self, this, args, new_target };
            (native.callback)(&mut ctx)
        };
        self.call_depth -= 1;
        result.map_err(|e| self.js_error_to_completion(e))
    }

    pub(crate) fn js_error_to_completion(&mut self, err: crate::error::JsError) -> Completion {
        match err.thrown {
            Some(v) => Completion::Throw(v, err.at),
            None => {
                let v = self.make_error_value(err.kind, &err.message);
                Completion::Throw(v, err.at)
            }
        }
    }

    /// Builds a closure value from a function body: the `Function`-kind
    /// object plus (for non-arrows) its `prototype` child with a
    /// back-`constructor` link, per spec §3.5.
    pub(crate) fn make_closure(&mut self, body: Rc<FuncBody>, closure_scope: Option<ObjectHandle>) -> Value {
        let is_arrow = body.is_arrow;
        let name = body.name.clone().unwrap_or_default();
        let arity = {
            let fd = FnData::new(body.clone(), closure_scope);
            fd.arity() as i32
        };
        let fn_data = FnData::new(body, closure_scope);
        let handle = self.heap.alloc(ObjectData::new(ObjectKind::Function(fn_data), Some(self.function_proto)));
        if !is_arrow {
            let proto_obj = self.new_plain_object();
            self.heap.get_mut(proto_obj).define_property(
                PropertyKey::from("constructor"),
                Property::Data { value: Value::Object(handle), writable: true, enumerable: false, configurable: true },
            );
            self.heap.get_mut(handle).define_property(
                PropertyKey::from("prototype"),
                Property::Data { value: Value::Object(proto_obj), writable: true, enumerable: false, configurable: false },
            );
        }
        self.heap.get_mut(handle).define_property(
            PropertyKey::from("name"),
            Property::Data { value: Value::string(name), writable: false, enumerable: false, configurable: true },
        );
        self.heap.get_mut(handle).define_property(
            PropertyKey::from("length"),
            Property::Data { value: Value::int(arity), writable: false, enumerable: false, configurable: true },
        );
        Value::Object(handle)
    }

    /// Creates the generator value a generator function call returns
    /// without running any of its body (spec §4.5.5: "returns a
    /// Generator value wrapping the prepared scope; does not execute
    /// the body until the first `.next()`"). The `.next`/`.throw`/
    /// `.return`/`.send`/`.close` methods are installed as ordinary
    /// own `Native` properties on the generator object itself, reusing
    /// the same call machinery as host-registered natives rather than
    /// inventing a separate internal-dispatch path.
    fn make_generator(&mut self, body: Rc<FuncBody>, fn_scope: ObjectHandle) -> Value {
        let data = GeneratorData::new(Some(fn_scope), body);
        let handle = self.heap.alloc(ObjectData::new(ObjectKind::Generator(data), Some(self.object_proto)));
        self.install_generator_method(handle, "next", GeneratorVerb::Next);
        self.install_generator_method(handle, "send", GeneratorVerb::Next);
        self.install_generator_method(handle, "throw", GeneratorVerb::Throw);
        self.install_generator_method(handle, "return", GeneratorVerb::Close);
        self.install_generator_method(handle, "close", GeneratorVerb::Close);
        Value::Object(handle)
    }

    fn install_generator_method(&mut self, generator: ObjectHandle, name: &str, verb: GeneratorVerb) {
        let callback: Rc<NativeCallback> = Rc::new(move |ctx: &mut NativeCallContext| {
            let g = ctx.engine.to_object(ctx.this.clone()).map_err(|c| ctx.engine.completion_to_js_error(c))?;
            let input = match verb {
                GeneratorVerb::Next => ResumeInput::Next(ctx.arg(0)),
                GeneratorVerb::Throw => ResumeInput::Throw(ctx.arg(0)),
                GeneratorVerb::Close => ResumeInput::Close,
            };
            match ctx.engine.resume_generator(g, input) {
                Ok(v) => Ok(v),
                Err(e) if matches!(verb, GeneratorVerb::Close) && ctx.engine.is_stop_iteration(&e) => Ok(Value::Undefined),
                Err(e) => Err(e),
            }
        });
        let native = NativeFn { name: name.into(), arity: 1, callback };
        let native_handle = self.heap.alloc(ObjectData::new(ObjectKind::Native(native), Some(self.function_proto)));
        self.heap.get_mut(generator).define_property(
            PropertyKey::from(name),
            Property::Data { value: Value::Object(native_handle), writable: false, enumerable: false, configurable: true },
        );
    }

    pub(crate) fn is_stop_iteration(&self, err: &crate::error::JsError) -> bool {
        matches!(&err.thrown, Some(Value::Symbol(s)) if *s == crate::symbol::well_known().stop_iteration)
    }

    /// Drives a generator object one step, spawning its coroutine on
    /// first resume (spec §4.5.5's caller-API table). Returns a thrown
    /// `StopIteration` once the body has completed, matching the
    /// uniform iterator-protocol convention [`crate::eval::iter`] relies
    /// on for `for...of`/spread over generators.
    pub(crate) fn resume_generator(&mut self, g: ObjectHandle, input: ResumeInput) -> Result<Value, crate::error::JsError> {
        let (state, scope, body) = match &self.heap.get(g).kind {
            ObjectKind::Generator(data) => (data.state, data.scope, data.body.clone()),
            _ => {
                return Err(crate::error::JsError {
                    kind: ErrorKind::TypeError,
                    message: "not a generator".into(),
                    at: self.current_loc.clone(),
                    thrown: None,
                })
            }
        };
        if state == GeneratorState::Completed {
            return Err(self.stop_iteration_error());
        }
        if state == GeneratorState::SuspendedStart {
            if matches!(input, ResumeInput::Throw(_)) {
                if let ObjectKind::Generator(data) = &mut self.heap.get_mut(g).kind {
                    data.state = GeneratorState::Completed;
                }
                return match input {
                    ResumeInput::Throw(v) => Err(crate::error::JsError {
                        kind: ErrorKind::Error,
                        message: "generator threw before starting".into(),
                        at: self.current_loc.clone(),
                        thrown: Some(v),
                    }),
                    _ => unreachable!(),
                };
            }
            if matches!(input, ResumeInput::Close) {
                if let ObjectKind::Generator(data) = &mut self.heap.get_mut(g).kind {
                    data.state = GeneratorState::Completed;
                }
                return Ok(Value::Undefined);
            }
            // A reborrow, not a move of `self` — `self.heap.get_mut(g)`
            // below still needs the original `&mut Engine` binding alive.
            let engine_ptr: *mut Engine = &mut *self;
            let scope = scope.expect("generator always has a prepared scope");
            let packaged = SendGeneratorBody { engine_ptr, scope, body };
            let boxed = self.generator_host.spawn(Box::new(move |control: &dyn GeneratorControl| {
                let SendGeneratorBody { engine_ptr, scope, body } = packaged;
                // SAFETY: `ThreadControl::yield_value` blocks the spawned
                // thread until the driving thread calls `resume` again, and
                // the driving thread blocks on `recv` until then — so at
                // most one of {driver, body} ever touches `*engine_ptr` at
                // a time, matching `AssertSend`'s baton discipline.
                let engine: &mut Engine = unsafe { &mut *engine_ptr };
                engine.run_generator_body(&scope, &body, control)
            }));
            let handle: Rc<RefCell<dyn CoroutineHandle>> = Rc::new(RefCell::new(BoxedHandle(boxed)));
            if let ObjectKind::Generator(data) = &mut self.heap.get_mut(g).kind {
                data.handle = Some(handle);
                data.state = GeneratorState::Executing;
            }
        } else if let ObjectKind::Generator(data) = &mut self.heap.get_mut(g).kind {
            data.state = GeneratorState::Executing;
        }
        let handle = match &self.heap.get(g).kind {
            ObjectKind::Generator(data) => data.handle.clone().expect("generator handle set above"),
            _ => unreachable!(),
        };
        let step = handle.borrow_mut().resume(input);
        match step {
            GeneratorStep::Yielded(v) => {
                if let ObjectKind::Generator(data) = &mut self.heap.get_mut(g).kind {
                    data.state = GeneratorState::SuspendedYield;
                }
                Ok(v)
            }
            GeneratorStep::Returned(v) => {
                if let ObjectKind::Generator(data) = &mut self.heap.get_mut(g).kind {
                    data.state = GeneratorState::Completed;
                    data.handle = None;
                }
                let _ = v;
                Err(self.stop_iteration_error())
            }
            GeneratorStep::Threw(e) => {
                if let ObjectKind::Generator(data) = &mut self.heap.get_mut(g).kind {
                    data.state = GeneratorState::Completed;
                    data.handle = None;
                }
                Err(e)
            }
        }
    }

    pub(crate) fn stop_iteration_error(&self) -> crate::error::JsError {
        crate::error::JsError {
            kind: ErrorKind::Error,
            message: "StopIteration".into(),
            at: self.current_loc.clone(),
            thrown: Some(Value::Symbol(crate::symbol::well_known().stop_iteration)),
        }
    }

    /// Runs a generator body on its coroutine thread, routing `yield`
    /// through `control` (see [`crate::eval::expr`]'s `Node::Yield`
    /// handling) via `Engine::yield_stack`. A plain fall-off-the-end or
    /// `return` both surface as `GeneratorStep::Returned` to the caller.
    fn run_generator_body(&mut self, scope: &ObjectHandle, body: &Rc<FuncBody>, control: &dyn GeneratorControl) -> Result<Value, crate::error::JsError> {
        self.yield_stack.push(control as *const dyn GeneratorControl);
        let result = match self.exec_block(&body.body, *scope) {
            Ok(_) => Ok(Value::Undefined),
            Err(Completion::Return(v)) => Ok(v),
            Err(other) => Err(self.completion_to_js_error(other)),
        };
        self.yield_stack.pop();
        result
    }

    /// Suspends the innermost active generator at a `yield` expression,
    /// blocking (on the coroutine thread, not the driver) until resumed.
    pub(crate) fn do_yield(&mut self, value: Value) -> Flow<Value> {
        let Some(ctrl_ptr) = self.yield_stack.last().copied() else {
            return Err(self.throw(ErrorKind::SyntaxError, "yield used outside a generator body"));
        };
        // SAFETY: `ctrl_ptr` points at a `&dyn GeneratorControl` local to
        // `resume_generator`'s spawned closure, which is still on its
        // stack frame for the entire duration this thread is blocked in
        // `yield_value` below.
        let ctrl: &dyn GeneratorControl = unsafe { &*ctrl_ptr };
        match ctrl.yield_value(value) {
            ResumeInput::Next(v) => Ok(v),
            ResumeInput::Throw(v) => Err(Completion::Throw(v, self.current_loc.clone())),
            ResumeInput::Close => Err(Completion::Return(Value::Undefined)),
        }
    }

    /// Binds `value` against a declaration-position pattern (spec
    /// §3.6's `Pattern`), used for `var`/`let`/`const`, `catch`,
    /// function parameters and `for`-binding targets alike.
    pub(crate) fn bind_pattern(&mut self, pat: &Pattern, value: Value, scope: ObjectHandle) -> Flow<()> {
        match pat {
            Pattern::Ident(name) => {
                scope::declare(&mut self.heap, scope, name, value);
                Ok(())
            }
            Pattern::Default(inner, default_expr) => {
                let v = if matches!(value, Value::Undefined) { self.eval_expr(default_expr, scope)? } else { value };
                self.bind_pattern(inner, v, scope)
            }
            Pattern::Array { elements, rest } => {
                let mut it = self.get_iterator(value)?;
                for el in elements {
                    let item = self.iterator_next(&mut it)?.unwrap_or(Value::Undefined);
                    if let Some(p) = el {
                        self.bind_pattern(p, item, scope)?;
                    }
                }
                if let Some(rest_pat) = rest {
                    let mut collected = Vec::new();
                    while let Some(v) = self.iterator_next(&mut it)? {
                        collected.push(v);
                    }
                    let arr = self.new_array(collected);
                    self.bind_pattern(rest_pat, arr, scope)?;
                }
                Ok(())
            }
            Pattern::Object { props, rest } => {
                if value.is_nullish() {
                    return Err(self.throw(ErrorKind::TypeError, "cannot destructure null or undefined"));
                }
                let mut used = Vec::new();
                for (key_pat, p) in props {
                    let key = self.pattern_key(key_pat, scope)?;
                    used.push(key.clone());
                    let v = self.get_value_property(&value, &key)?;
                    self.bind_pattern(p, v, scope)?;
                }
                if let Some(rest_pat) = rest {
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
                            let v = match p {
                                Property::Data { value, .. } => value,
                                Property::Accessor { get: Some(getter), .. } => self.call(Value::Object(getter), value.clone(), &[])?,
                                Property::Accessor { get: None, .. } => Value::Undefined,
                            };
                            self.heap.get_mut(rest_obj).set_data(k, v);
                        }
                    }
                    self.bind_pattern(rest_pat, Value::Object(rest_obj), scope)?;
                }
                Ok(())
            }
        }
    }

    pub(crate) fn pattern_key(&mut self, key_pat: &PropKeyPat, scope: ObjectHandle) -> Flow<PropertyKey> {
        match key_pat {
            PropKeyPat::Ident(name) => Ok(PropertyKey::from(name.as_str())),
            PropKeyPat::Computed(node) => {
                let v = self.eval_expr(node, scope)?;
                self.to_property_key(v)
            }
        }
    }

    pub(crate) fn to_property_key(&mut self, v: Value) -> Flow<PropertyKey> {
        match v {
            Value::Symbol(s) => Ok(PropertyKey::Symbol(s)),
            other => {
                let s = self.to_string_value(other)?;
                Ok(PropertyKey::from_name(&s))
            }
        }
    }
}

#[derive(Clone, Copy)]
enum GeneratorVerb {
    Next,
    Throw,
    Close,
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
    fn closures_capture_their_own_scope() {
        let v = run("function counter() { let n = 0; return function() { n = n + 1; return n; }; } let c = counter(); c(); c();");
        assert!(matches!(v, Value::Number(n) if n == crate::number::Number::Int32(2)));
    }

    #[test]
    fn constructed_instance_sees_prototype_chain() {
        let v = run("function Point(x) { this.x = x; } Point.prototype.double = function() { return this.x * 2; }; let p = new Point(21); p.double();");
        assert!(matches!(v, Value::Number(n) if n == crate::number::Number::Int32(42)));
    }

    #[test]
    fn rest_parameters_collect_trailing_args() {
        let v = run("function f(a, ...rest) { return rest.length; } f(1,2,3,4);");
        assert!(matches!(v, Value::Number(n) if n == crate::number::Number::Int32(3)));
    }
}
