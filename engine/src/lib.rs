// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ### [6. External interfaces](spec §6)
//!
//! `tiny42js_engine` is the embeddable core: one [`Engine`] per host
//! thread, constructed with [`new_engine`], driven through `execute`/
//! `evaluate`/`evaluate_complex`, extended through `add_native`. The
//! module layout below mirrors spec §2's component list — Lexer and
//! Tokenizer form the structural pass, the `value`/`heap`/`scope`/
//! `property_key`/`symbol`/`number` modules form the data model, and
//! `eval` is the tree-walking evaluator over the `tokenizer::tree::Node`
//! graph `tokenizer::parse_program` produces.
//!
//! Built-in library *content* — `print`, `Math`, `Date`,
//! `String.prototype.*`, `Array.prototype.*`, `JSON`, `console`, and
//! `require`'s file I/O — is an explicit Non-goal of the core (spec
//! §1); only the five built-in error kinds (spec §3.5/§7) are bootstrapped
//! here, since script-level `throw`/`catch` and `instanceof` need them to
//! exist as ordinary global bindings.

pub mod error;
pub mod eval;
pub mod heap;
pub mod lexer;
pub mod native;
pub mod number;
pub mod property_key;
pub mod scope;
pub mod symbol;
pub mod tokenizer;
pub mod value;

use std::rc::Rc;

use error::{ErrorKind, JsError, JsResult, SourceLoc};
use heap::{Heap, ObjectHandle};
use property_key::PropertyKey;
use value::function::{NativeCallContext, NativeCallback, NativeFn};
use value::generator::{CoroutineHost, GeneratorControl, ThreadCoroutineHost};
use value::object::{ObjectData, ObjectKind, Property};
use value::Value;

/// The five ECMAScript-conventional subclasses plus the base `Error`
/// kind (spec §3.5/§7) — the only built-in constructors the core
/// bootstraps onto the global scope.
const ERROR_KINDS: [ErrorKind; 5] = [
    ErrorKind::EvalError,
    ErrorKind::RangeError,
    ErrorKind::ReferenceError,
    ErrorKind::SyntaxError,
    ErrorKind::TypeError,
];

/// What a host callback registered via [`Engine::set_console`] receives.
/// Mirrors the severity levels `set_console(stream, level)` (spec §6)
/// filters by; the core never produces one of these itself (no
/// `console` builtin — spec §1's Non-goals), so the sink is only ever
/// driven by a host-registered native (see `cli`'s `print`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
}

type ConsoleSink = dyn FnMut(ConsoleLevel, &str);
type RequireReader = dyn FnMut(&str) -> Option<std::string::String>;

/// Construction-time configuration (spec §6, generalized): one struct
/// gathering everything that varies per embedder rather than a long
/// constructor argument list.
pub struct Options {
    /// Upper bound on nested [`Engine::call`]/[`Engine::construct`]
    /// depth (spec §4.7's recursion guard / spec §5's "stackBase").
    /// Safe Rust has no portable way to compare against the OS stack
    /// pointer the reference implementation's `stackBase` margin check
    /// used, so a call-depth counter is the substitute — see DESIGN.md.
    pub max_call_depth: u32,
    /// Heap object count above which [`Engine::run_program`] triggers a
    /// collection between top-level statements (spec §4.7).
    pub gc_threshold: usize,
    /// Overrides the default OS-thread-backed generator coroutine
    /// bridge (spec §4.5.5/§9) with an embedder-supplied one — fibers,
    /// `ucontext`, or a wasm stack-switching host, for example.
    pub generator_host: Option<Box<dyn CoroutineHost>>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            max_call_depth: 1024,
            gc_threshold: 4096,
            generator_host: None,
        }
    }
}

/// One embeddable interpreter instance (spec §5: "one engine instance
/// per host thread"). Owns its heap, global scope, and the bootstrapped
/// error-constructor prototypes; nothing here is shared across engines
/// except the process-global [`symbol`] registry.
pub struct Engine {
    pub(crate) heap: Heap,
    pub(crate) global_scope: ObjectHandle,
    pub(crate) object_proto: ObjectHandle,
    pub(crate) function_proto: ObjectHandle,
    pub(crate) array_proto: ObjectHandle,
    pub(crate) string_proto: ObjectHandle,
    pub(crate) number_proto: ObjectHandle,
    pub(crate) boolean_proto: ObjectHandle,
    /// Indexed by `ErrorKind as usize` (error.rs's declaration order).
    pub(crate) error_protos: [ObjectHandle; 6],
    pub(crate) call_depth: u32,
    pub(crate) max_call_depth: u32,
    pub(crate) have_try: u32,
    pub(crate) gc_threshold: usize,
    pub(crate) current_loc: SourceLoc,
    pub(crate) generator_host: Box<dyn CoroutineHost>,
    pub(crate) yield_stack: Vec<*const dyn GeneratorControl>,
    require_read: Option<Box<RequireReader>>,
    console: Option<Box<ConsoleSink>>,
}

/// Builds a fresh [`Engine`]: allocates `Object.prototype` and the
/// `Function`/`Array`/`String`/`Number`/`Boolean`/error prototypes, a
/// global scope chained to none of them (it is a `Function` scope with
/// no parent, so top-level `var` hoisting has somewhere to land), and
/// binds the five error constructors spec §3.5/§7 require to exist.
pub fn new_engine(options: Options) -> Engine {
    let mut heap = Heap::new();

    let object_proto = heap.alloc(ObjectData::new(ObjectKind::Ordinary, None));
    let function_proto = heap.alloc(ObjectData::new(ObjectKind::Ordinary, Some(object_proto)));
    let array_proto = heap.alloc(ObjectData::new(ObjectKind::Ordinary, Some(object_proto)));
    let string_proto = heap.alloc(ObjectData::new(ObjectKind::Ordinary, Some(object_proto)));
    let number_proto = heap.alloc(ObjectData::new(ObjectKind::Ordinary, Some(object_proto)));
    let boolean_proto = heap.alloc(ObjectData::new(ObjectKind::Ordinary, Some(object_proto)));

    let error_base = heap.alloc(ObjectData::new(ObjectKind::Ordinary, Some(object_proto)));
    heap.get_mut(error_base).set_data("name", Value::string(ErrorKind::Error.name()));
    heap.get_mut(error_base).set_data("message", Value::string(""));
    let mut error_protos = [error_base; 6];
    error_protos[ErrorKind::Error as usize] = error_base;
    for kind in ERROR_KINDS {
        let proto = heap.alloc(ObjectData::new(ObjectKind::Ordinary, Some(error_base)));
        heap.get_mut(proto).set_data("name", Value::string(kind.name()));
        error_protos[kind as usize] = proto;
    }

    let global_scope = scope::create_function_scope(&mut heap, None, Value::Undefined, None);

    let generator_host: Box<dyn CoroutineHost> = options.generator_host.unwrap_or_else(|| Box::new(ThreadCoroutineHost));

    let mut engine = Engine {
        heap,
        global_scope,
        object_proto,
        function_proto,
        array_proto,
        string_proto,
        number_proto,
        boolean_proto,
        error_protos,
        call_depth: 0,
        max_call_depth: options.max_call_depth,
        have_try: 0,
        gc_threshold: options.gc_threshold,
        current_loc: SourceLoc::unknown(),
        generator_host,
        yield_stack: Vec::new(),
        require_read: None,
        console: None,
    };

    engine.install_error_constructors();
    engine
}

impl Engine {
    fn install_error_constructors(&mut self) {
        self.install_error_ctor(ErrorKind::Error);
        for kind in ERROR_KINDS {
            self.install_error_ctor(kind);
        }
    }

    /// `Error`/`TypeError`/etc as callable-and-constructable globals
    /// (spec §3.5: "Function, Bound Function" — these are ordinary
    /// native functions, not a distinct constructor kind). Calling one
    /// without `new` behaves the same as constructing it, matching
    /// ECMAScript's `Error(...)  === new Error(...)` convention.
    fn install_error_ctor(&mut self, kind: ErrorKind) {
        let callback: Rc<NativeCallback> = Rc::new(move |ctx: &mut NativeCallContext| {
            let message = if ctx.args.is_empty() {
                std::string::String::new()
            } else {
                ctx.engine.to_string_value(ctx.arg(0)).map_err(|c| ctx.engine.completion_to_js_error(c))?
            };
            Ok(ctx.engine.make_error_value(kind, &message))
        });
        let native = NativeFn { name: kind.name().into(), arity: 1, callback };
        let handle = self.heap.alloc(ObjectData::new(ObjectKind::Native(native), Some(self.function_proto)));
        self.heap.get_mut(handle).define_property(
            PropertyKey::from("prototype"),
            Property::Data { value: Value::Object(self.error_proto(kind)), writable: false, enumerable: false, configurable: false },
        );
        scope::declare(&mut self.heap, self.global_scope, kind.name(), Value::Object(handle));
    }

    /// Runs `source` to completion for its side effects alone (spec
    /// §6's `execute`). The reference interface additionally threads a
    /// starting line/column so a fragment can be embedded inside a
    /// larger host document; `tokenizer::parse_program` always starts
    /// at 1:1, so that pair is not exposed here — a deliberate
    /// simplification recorded in DESIGN.md. `file_name` alone is
    /// enough to tag every diagnostic this script produces.
    pub fn execute(&mut self, source: &str, file_name: &str) -> JsResult<()> {
        self.evaluate_complex(source, file_name)?;
        Ok(())
    }

    /// Runs `source`, returning its last expression's value coerced to
    /// a string (spec §6's `evaluate`).
    pub fn evaluate(&mut self, source: &str, file_name: &str) -> JsResult<std::string::String> {
        let value = self.evaluate_complex(source, file_name)?;
        self.to_string_value(value).map_err(|c| self.completion_to_js_error(c))
    }

    /// Runs `source`, returning its last expression's raw [`Value`]
    /// (spec §6's `evaluate_complex`).
    pub fn evaluate_complex(&mut self, source: &str, file_name: &str) -> JsResult<Value> {
        let program = tokenizer::parse_program(source, file_name)?;
        self.run_program(&program)
    }

    /// Installs a host function at the dotted path a signature like
    /// `"function console.log(message)"` derives (spec §4.6/§6's
    /// `add_native`). Intermediate path segments become plain objects
    /// created on demand, reusing whatever is already there if it's an
    /// object. `userdata`/`link_flags` from the reference signature
    /// have no counterpart: Rust closures capture their own state, and
    /// there is only one link kind (an own data property) to install.
    pub fn add_native<F>(&mut self, signature: &str, callback: F) -> JsResult<()>
    where
        F: Fn(&mut NativeCallContext) -> Result<Value, JsError> + 'static,
    {
        let sig = native::parse_signature(signature)?;
        let name = sig.path.last().cloned().unwrap_or_default();
        let value = self.native_function(&name, sig.arity, callback);
        self.install_at_path(&sig.path, value);
        Ok(())
    }

    /// Allocates a bare native function `Value`, without installing it
    /// anywhere — the primitive `add_native` itself builds on. Exposed
    /// so a host can attach a method directly onto one of the standard
    /// prototypes (e.g. `Array.prototype`) via [`Engine::set_property`]
    /// rather than only at a fresh dotted global path, the way a
    /// library of `Array`/`String` methods would be layered on top of
    /// this core (spec §1's excluded "built-in library content").
    pub fn native_function<F>(&mut self, name: &str, arity: u32, callback: F) -> Value
    where
        F: Fn(&mut NativeCallContext) -> Result<Value, JsError> + 'static,
    {
        let callback: Rc<NativeCallback> = Rc::new(callback);
        let native = NativeFn { name: name.into(), arity, callback };
        let handle = self.heap.alloc(ObjectData::new(ObjectKind::Native(native), Some(self.function_proto)));
        Value::Object(handle)
    }

    /// The array prototype every `Array`-kind object chains to (spec
    /// §3.3). Lets a host layer `Array.prototype.*` methods on without
    /// the core needing to know about any of them itself.
    pub fn array_prototype(&self) -> ObjectHandle {
        self.array_proto
    }

    /// The string prototype every string primitive delegates property
    /// lookups to (spec §4.3's `get_value_property`).
    pub fn string_prototype(&self) -> ObjectHandle {
        self.string_proto
    }

    /// Marks every own property of `handle` non-writable/non-configurable
    /// and the object itself non-extensible (spec §4.3's write-rejection
    /// path already honors this; `Object.freeze` itself is built-in
    /// library content, so a host wires this primitive up under
    /// whatever name it likes via `add_native`).
    pub fn freeze_object(&mut self, handle: ObjectHandle) {
        self.heap.get_mut(handle).freeze();
    }

    /// The `(pattern, flags)` a regex literal (spec §3.3) was scanned
    /// with, if `handle` is one. Full regex matching is out of scope
    /// (Unicode-aware regex handling is a Non-goal per spec §1); this
    /// only exposes the literal source text so a host-supplied
    /// `String.prototype.replace`-style method can do its own
    /// simplified matching against it.
    pub fn regex_literal_source(&self, handle: ObjectHandle) -> Option<(std::string::String, std::string::String)> {
        match &self.heap.get(handle).kind {
            ObjectKind::Regex { pattern, flags } => Some((pattern.clone(), flags.clone())),
            _ => None,
        }
    }

    fn install_at_path(&mut self, path: &[std::string::String], value: Value) {
        if path.is_empty() {
            return;
        }
        if path.len() == 1 {
            scope::declare(&mut self.heap, self.global_scope, &path[0], value);
            return;
        }
        let mut cur = self.ensure_global_object(&path[0]);
        for seg in &path[1..path.len() - 1] {
            cur = self.ensure_child_object(cur, seg);
        }
        self.heap.get_mut(cur).set_data(path.last().unwrap().as_str(), value);
    }

    fn ensure_global_object(&mut self, name: &str) -> ObjectHandle {
        let key = PropertyKey::from(name);
        if let Some(Property::Data { value: Value::Object(h), .. }) = self.heap.get(self.global_scope).get_own(&key) {
            return *h;
        }
        let obj = self.new_plain_object();
        scope::declare(&mut self.heap, self.global_scope, name, Value::Object(obj));
        obj
    }

    fn ensure_child_object(&mut self, parent: ObjectHandle, name: &str) -> ObjectHandle {
        let key = PropertyKey::from(name);
        if let Some(Property::Data { value: Value::Object(h), .. }) = self.heap.get(parent).get_own(&key) {
            return *h;
        }
        let obj = self.new_plain_object();
        self.heap.get_mut(parent).set_data(name, Value::Object(obj));
        obj
    }

    /// Sets the source-loading callback the (excluded) `require(path)`
    /// built-in would call into (spec §6's `set_require_read`). The
    /// core never calls this itself — `require` is built-in library
    /// content, out of scope per spec §1 — so this only stores the
    /// hook for a host-registered native (via [`Engine::add_native`])
    /// to reach through `read_required_source`.
    pub fn set_require_read<F>(&mut self, read: F)
    where
        F: FnMut(&str) -> Option<std::string::String> + 'static,
    {
        self.require_read = Some(Box::new(read));
    }

    /// Reads a module path through the callback installed by
    /// [`Engine::set_require_read`], if any — the hook a host-written
    /// `require` native would call.
    pub fn read_required_source(&mut self, path: &str) -> Option<std::string::String> {
        self.require_read.as_mut().and_then(|f| f(path))
    }

    /// Supplies the recursion-depth budget standing in for the
    /// reference interface's `set_stack_base(ptr or size)` (spec §6):
    /// the low watermark there is a raw stack-pointer margin, which
    /// safe Rust cannot read; `budget` plays the same role measured in
    /// call frames instead of bytes (see [`Options::max_call_depth`]).
    pub fn set_stack_base(&mut self, budget: u32) {
        self.max_call_depth = budget;
    }

    /// Redirects `console.*`-shaped output (spec §6's `set_console`).
    /// No `console` global exists in the core (spec §1's Non-goals), so
    /// this sink is only ever driven by a host-registered native — see
    /// `cli`'s `print`, which calls [`Engine::console_write`] directly.
    pub fn set_console<F>(&mut self, sink: F)
    where
        F: FnMut(ConsoleLevel, &str) + 'static,
    {
        self.console = Some(Box::new(sink));
    }

    /// Writes through the sink installed by [`Engine::set_console`], if
    /// any; a no-op otherwise.
    pub fn console_write(&mut self, level: ConsoleLevel, message: &str) {
        if let Some(sink) = &mut self.console {
            sink(level, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluate_returns_last_expression_as_string() {
        let mut engine = new_engine(Options::default());
        let out = engine.evaluate("1 + 2;", "test.js").expect("evaluate");
        assert_eq!(out, "3");
    }

    #[test]
    fn uncaught_type_error_constructor_is_a_global_binding() {
        let mut engine = new_engine(Options::default());
        let out = engine
            .evaluate("try { throw new TypeError('x'); } catch (e) { e.name + ':' + e.message; }", "test.js")
            .expect("evaluate");
        assert_eq!(out, "TypeError:x");
    }

    #[test]
    fn add_native_installs_at_a_dotted_path() {
        let mut engine = new_engine(Options::default());
        engine
            .add_native("function host.greet(name)", |ctx| {
                let name = ctx.engine.to_string_value(ctx.arg(0)).map_err(|c| ctx.engine.completion_to_js_error(c))?;
                Ok(Value::string(format!("hi {name}")))
            })
            .expect("add_native");
        let out = engine.evaluate("typeof host.greet;", "test.js").expect("evaluate");
        assert_eq!(out, "function");
    }

    #[test]
    fn execute_runs_for_side_effects_only() {
        let mut engine = new_engine(Options::default());
        engine.execute("var x = 1; x = x + 1;", "test.js").expect("execute");
    }

    #[test]
    fn uncaught_error_reports_its_own_kind() {
        let mut engine = new_engine(Options::default());
        let err = engine.execute("throw new RangeError('boom');", "test.js").unwrap_err();
        assert_eq!(err.kind, ErrorKind::RangeError);
        assert_eq!(err.message, "boom");
    }
}
