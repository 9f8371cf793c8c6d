// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ### [4.5 Evaluator](spec §4.5)
//!
//! The tree-walker over `tokenizer::tree::Node`. Where the reference
//! implementation threads a tokenizer position stack so a sub-expression's
//! `TokenVec` can be pushed and popped, the recursive `Node` tree makes
//! that unnecessary: a sub-expression is just a child `Node`, visited by
//! an ordinary recursive call.
//!
//! Control flow that isn't a plain value is reified as [`Completion`]
//! rather than carried through host-language panics/exceptions — the
//! same design spec §4.5.3 describes, expressed as the `Err` side of a
//! `Result` so `?` does the unwinding.

pub mod call;
pub mod coerce;
pub mod expr;
pub mod iter;
pub mod object_ops;

use crate::error::{ErrorKind, JsError, SourceLoc};
use crate::property_key::PropertyKey;
use crate::scope::{self, Binding};
use crate::tokenizer::tree::{DeclKind, Forwards, LoopKind, Node, Program, TokenVec};
use crate::value::object::ObjectKind;
use crate::value::Value;
use crate::Engine;

/// Non-local control flow a statement or expression can produce instead
/// of falling through normally (spec §4.5.3's `Result`, minus `Normal`
/// and `NoExecute`: a normal fall-through is the `Ok` side of
/// [`Flow`], and "don't execute this branch" is simply not recursing
/// into it, so no dedicated variant is needed for either).
#[derive(Debug, Clone)]
pub enum Completion {
    Break(Option<std::string::String>),
    Continue(Option<std::string::String>),
    Return(Value),
    Throw(Value, SourceLoc),
}

pub type Flow<T> = Result<T, Completion>;

impl Engine {
    pub(crate) fn throw(&self, kind: ErrorKind, message: impl Into<std::string::String>) -> Completion {
        let message = message.into();
        let err_obj = self.make_error_value(kind, &message);
        Completion::Throw(err_obj, self.current_loc.clone())
    }

    /// Converts an uncaught [`Completion::Throw`] at the top level into
    /// the host-facing [`JsError`] (spec §7: "outside any `try`, the
    /// engine converts the Throw into a host-level raised exception").
    /// Public beyond the crate boundary because a host-registered
    /// native (spec §4.6's `add_native`) lives outside this crate and
    /// still needs to turn a fallible engine operation's `Completion`
    /// into the `JsError` its own callback signature must return.
    pub fn completion_to_js_error(&self, completion: Completion) -> JsError {
        match completion {
            Completion::Throw(value, at) => {
                let (kind, message) = self.describe_thrown(&value);
                JsError { kind, message, at, thrown: Some(value) }
            }
            // Reaching the top level with an unresolved break/continue/return
            // means the tokenizer failed to reject it statically; treat as a
            // syntax-shaped host error rather than panicking.
            Completion::Break(_) => JsError {
                kind: ErrorKind::SyntaxError,
                message: "illegal break outside of loop/switch".into(),
                at: self.current_loc.clone(),
                thrown: None,
            },
            Completion::Continue(_) => JsError {
                kind: ErrorKind::SyntaxError,
                message: "illegal continue outside of loop".into(),
                at: self.current_loc.clone(),
                thrown: None,
            },
            Completion::Return(_) => JsError {
                kind: ErrorKind::SyntaxError,
                message: "illegal return outside of function".into(),
                at: self.current_loc.clone(),
                thrown: None,
            },
        }
    }

    fn describe_thrown(&self, value: &Value) -> (ErrorKind, std::string::String) {
        if let Value::Object(h) = value {
            if matches!(self.heap.get(*h).kind, ObjectKind::Error) {
                let name = self.get_own_string(*h, "name").unwrap_or_else(|| "Error".into());
                let message = self.get_own_string(*h, "message").unwrap_or_default();
                let kind = ErrorKind::from_name(&name).unwrap_or(ErrorKind::Error);
                return (kind, message);
            }
        }
        (ErrorKind::Error, self.display_value_lossy(value))
    }

    /// Walks `obj`'s prototype chain looking for a own-or-inherited
    /// string-valued data property. Used only to describe an uncaught
    /// throw (`name`/`message` live on the error *prototype*, spec
    /// §3.5's per-kind prototype, not on each thrown instance).
    fn get_own_string(&self, obj: crate::heap::ObjectHandle, key: &str) -> Option<std::string::String> {
        let key = PropertyKey::from(key);
        let mut cur = Some(obj);
        while let Some(h) = cur {
            let data = self.heap.get(h);
            if let Some(crate::value::object::Property::Data { value: Value::String(s), .. }) = data.get_own(&key) {
                return Some(s.to_string());
            }
            cur = data.prototype;
        }
        None
    }

    /// Best-effort `String(value)` that never itself throws, used only
    /// for describing an uncaught non-`Error` throw in [`JsError`].
    fn display_value_lossy(&self, value: &Value) -> std::string::String {
        match value {
            Value::Undefined => "undefined".into(),
            Value::Uninitialized => "undefined".into(),
            Value::Null => "null".into(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.to_string(),
            Value::Symbol(_) => "symbol".into(),
            Value::Object(_) => "[object Object]".into(),
        }
    }

    pub fn run_program(&mut self, program: &Program) -> Result<Value, JsError> {
        self.current_loc = program.source_loc.clone();
        let scope = self.global_scope;
        let mut last = Value::Undefined;
        for stmt in &program.body {
            match self.exec_stmt(stmt, scope) {
                Ok(v) => {
                    if let Some(v) = v {
                        last = v;
                    }
                    if self.call_depth == 0 {
                        self.maybe_collect_garbage();
                    }
                }
                Err(completion) => return Err(self.completion_to_js_error(completion)),
            }
        }
        Ok(last)
    }

    /// Runs a `TokenVec`, installing any leading [`Node::Forwards`]
    /// hoisting record first (spec §4.2 "Hoisting"). Returns the value
    /// of the last expression statement, mirroring `evaluate_complex`'s
    /// contract at the top level.
    pub(crate) fn exec_block(&mut self, body: &TokenVec, scope: crate::heap::ObjectHandle) -> Flow<Option<Value>> {
        let mut last = None;
        for stmt in body {
            if let Some(v) = self.exec_stmt(stmt, scope)? {
                last = Some(v);
            }
        }
        Ok(last)
    }

    fn install_forwards(&mut self, fwd: &Forwards, scope: crate::heap::ObjectHandle) {
        for name in &fwd.vars {
            if scope::resolve(&self.heap, scope, name).is_none() {
                scope::declare(&mut self.heap, scope, name, Value::Undefined);
            } else {
                // already bound by an outer var of the same name sharing
                // this function scope; leave it alone.
            }
        }
        for name in &fwd.lets {
            scope::declare(&mut self.heap, scope, name, Value::Uninitialized);
        }
        for name in &fwd.consts {
            scope::declare(&mut self.heap, scope, name, Value::Uninitialized);
        }
        for (name, body) in &fwd.functions {
            let fn_val = self.make_closure(body.clone(), Some(scope));
            scope::declare(&mut self.heap, scope, name, fn_val);
        }
    }

    /// Executes one statement, returning the value of an expression
    /// statement (used by `evaluate`/`evaluate_complex` to report "the
    /// last expression value") or `None` for non-expression statements.
    pub(crate) fn exec_stmt(&mut self, node: &Node, scope: crate::heap::ObjectHandle) -> Flow<Option<Value>> {
        match node {
            Node::Forwards(fwd) => {
                self.install_forwards(fwd, scope);
                Ok(None)
            }
            Node::Empty => Ok(None),
            Node::ExprStmt(expr) => Ok(Some(self.eval_expr(expr, scope)?)),
            Node::VarDecl { kind, decls } => {
                self.exec_var_decl(*kind, decls, scope)?;
                Ok(None)
            }
            Node::Block(body) => {
                let block_scope = scope::create_let_scope(&mut self.heap, Some(scope));
                self.exec_block(body, block_scope)?;
                Ok(None)
            }
            Node::If { test, cons, alt } => {
                if self.eval_expr(test, scope)?.to_boolean() {
                    self.exec_stmt(cons, scope)?;
                } else if let Some(alt) = alt {
                    self.exec_stmt(alt, scope)?;
                }
                Ok(None)
            }
            Node::Loop { .. } => {
                self.exec_loop(node, scope)?;
                Ok(None)
            }
            Node::Break(label) => Err(Completion::Break(label.clone())),
            Node::Continue(label) => Err(Completion::Continue(label.clone())),
            Node::Return(expr) => {
                let v = match expr {
                    Some(e) => self.eval_expr(e, scope)?,
                    None => Value::Undefined,
                };
                Err(Completion::Return(v))
            }
            Node::Throw(expr) => {
                let v = self.eval_expr(expr, scope)?;
                Err(Completion::Throw(v, self.current_loc.clone()))
            }
            Node::Try { block, catch, finally } => {
                self.exec_try(block, catch.as_ref(), finally.as_ref(), scope)?;
                Ok(None)
            }
            Node::Switch { disc, cases } => {
                self.exec_switch(disc, cases, scope)?;
                Ok(None)
            }
            Node::Labeled { label, body } => match self.exec_stmt(body, scope) {
                Err(Completion::Break(Some(l))) if &l == label => Ok(None),
                other => other,
            },
            Node::With { object, body } => {
                let target_val = self.eval_expr(object, scope)?;
                let target = self.to_object(target_val)?;
                let with_scope = scope::create_with_scope(&mut self.heap, Some(scope), target);
                self.exec_stmt(body, with_scope)
            }
            Node::Function(body) => {
                // A function declaration statement: already hoisted by
                // `install_forwards`; evaluating it again is a no-op.
                let _ = body;
                Ok(None)
            }
            other => {
                // Anything reaching here is an expression-shaped node used
                // directly as a statement body (e.g. a single-statement
                // loop/if arm that is itself an expression statement's
                // inner node after unwrapping) — evaluate it for effect.
                Ok(Some(self.eval_expr(other, scope)?))
            }
        }
    }

    fn exec_var_decl(&mut self, kind: DeclKind, decls: &[(crate::tokenizer::tree::Pattern, Option<Node>)], scope: crate::heap::ObjectHandle) -> Flow<()> {
        for (pat, init) in decls {
            let value = match init {
                Some(e) => self.eval_expr(e, scope)?,
                None => {
                    if matches!(kind, DeclKind::Var) {
                        continue; // already hoisted to `undefined`; no re-init
                    }
                    Value::Undefined
                }
            };
            self.bind_pattern(pat, value, scope)?;
            if matches!(kind, DeclKind::Const) {
                self.freeze_const_bindings(pat, scope);
            }
        }
        Ok(())
    }

    /// Marks every identifier a `const` declaration just bound as
    /// non-writable in its own scope, so a later plain assignment to it
    /// is rejected the same way an inherited read-only property is
    /// (spec §4.2: `const` bindings may not be reassigned).
    fn freeze_const_bindings(&mut self, pat: &crate::tokenizer::tree::Pattern, scope: crate::heap::ObjectHandle) {
        use crate::tokenizer::tree::Pattern;
        match pat {
            Pattern::Ident(name) => {
                let key = PropertyKey::from(name.as_str());
                if let Some(crate::value::object::Property::Data { value, enumerable, configurable, .. }) = self.heap.get(scope).get_own(&key).cloned() {
                    self.heap.get_mut(scope).define_property(
                        key,
                        crate::value::object::Property::Data { value, writable: false, enumerable, configurable },
                    );
                }
            }
            Pattern::Default(inner, _) => self.freeze_const_bindings(inner, scope),
            Pattern::Array { elements, rest } => {
                for el in elements.iter().flatten() {
                    self.freeze_const_bindings(el, scope);
                }
                if let Some(r) = rest {
                    self.freeze_const_bindings(r, scope);
                }
            }
            Pattern::Object { props, rest } => {
                for (_, p) in props {
                    self.freeze_const_bindings(p, scope);
                }
                if let Some(r) = rest {
                    self.freeze_const_bindings(r, scope);
                }
            }
        }
    }

    fn exec_loop(&mut self, node: &Node, outer_scope: crate::heap::ObjectHandle) -> Flow<()> {
        let Node::Loop { kind, labels, init, condition, iter, for_binding, body } = node else {
            unreachable!()
        };
        let matches_label = |l: &Option<std::string::String>| match l {
            None => true,
            Some(l) => labels.contains(l),
        };
        match kind {
            LoopKind::While => loop {
                if !self.eval_expr(condition.as_ref().unwrap(), outer_scope)?.to_boolean() {
                    break;
                }
                match self.exec_stmt(body, outer_scope) {
                    Ok(_) => {}
                    Err(Completion::Break(l)) if matches_label(&l) => break,
                    Err(Completion::Continue(l)) if matches_label(&l) => {}
                    Err(e) => return Err(e),
                }
            },
            LoopKind::Do => loop {
                match self.exec_stmt(body, outer_scope) {
                    Ok(_) => {}
                    Err(Completion::Break(l)) if matches_label(&l) => break,
                    Err(Completion::Continue(l)) if matches_label(&l) => {}
                    Err(e) => return Err(e),
                }
                if !self.eval_expr(condition.as_ref().unwrap(), outer_scope)?.to_boolean() {
                    break;
                }
            },
            LoopKind::For => {
                let loop_scope = scope::create_let_scope(&mut self.heap, Some(outer_scope));
                if let Some(init) = init {
                    self.exec_stmt(init, loop_scope)?;
                }
                loop {
                    if let Some(cond) = condition {
                        if !self.eval_expr(cond, loop_scope)?.to_boolean() {
                            break;
                        }
                    }
                    // Per-iteration `let` clone (spec §3.6/§4.4): a fresh
                    // scope copies the previous iteration's own bindings
                    // so closures created inside the body each capture a
                    // distinct variable.
                    let iter_scope = self.clone_let_scope(loop_scope);
                    match self.exec_stmt(body, iter_scope) {
                        Ok(_) => {}
                        Err(Completion::Break(l)) if matches_label(&l) => break,
                        Err(Completion::Continue(l)) if matches_label(&l) => {}
                        Err(e) => return Err(e),
                    }
                    self.copy_back_let_bindings(loop_scope, iter_scope);
                    if let Some(iter_expr) = iter {
                        self.eval_expr(iter_expr, loop_scope)?;
                    }
                }
            }
            LoopKind::ForIn => {
                let target = self.eval_expr(iter.as_ref().unwrap(), outer_scope)?;
                if target.is_nullish() {
                    return Ok(());
                }
                let obj = self.to_object(target)?;
                let keys = self.enumerable_key_names(obj);
                for key in keys {
                    let loop_scope = scope::create_let_scope(&mut self.heap, Some(outer_scope));
                    self.bind_for_binding(for_binding, Value::string(key), loop_scope)?;
                    match self.exec_stmt(body, loop_scope) {
                        Ok(_) => {}
                        Err(Completion::Break(l)) if matches_label(&l) => break,
                        Err(Completion::Continue(l)) if matches_label(&l) => continue,
                        Err(e) => return Err(e),
                    }
                }
            }
            LoopKind::ForOf => {
                let target = self.eval_expr(iter.as_ref().unwrap(), outer_scope)?;
                let mut it = self.get_iterator(target)?;
                loop {
                    let Some(value) = self.iterator_next(&mut it)? else { break };
                    let loop_scope = scope::create_let_scope(&mut self.heap, Some(outer_scope));
                    self.bind_for_binding(for_binding, value, loop_scope)?;
                    match self.exec_stmt(body, loop_scope) {
                        Ok(_) => {}
                        Err(Completion::Break(l)) if matches_label(&l) => break,
                        Err(Completion::Continue(l)) if matches_label(&l) => continue,
                        Err(e) => return Err(e),
                    }
                }
            }
        }
        Ok(())
    }

    fn bind_for_binding(
        &mut self,
        for_binding: &Option<(DeclKind, crate::tokenizer::tree::Pattern)>,
        value: Value,
        scope: crate::heap::ObjectHandle,
    ) -> Flow<()> {
        match for_binding {
            Some((_, pat)) => self.bind_pattern(pat, value, scope),
            None => Err(self.throw(ErrorKind::SyntaxError, "for-in/for-of without a binding is not supported")),
        }
    }

    /// Clones a `let` scope's own bindings into a fresh child scope
    /// sharing the same parent, for the per-iteration `for (let …)` copy.
    fn clone_let_scope(&mut self, scope: crate::heap::ObjectHandle) -> crate::heap::ObjectHandle {
        let parent = self.heap.get(scope).scope_parent();
        let fresh = scope::create_let_scope(&mut self.heap, parent);
        let entries: Vec<_> = self
            .heap
            .get(scope)
            .own_entries()
            .filter(|(k, _)| !matches!(k, PropertyKey::Symbol(_)))
            .map(|(k, p)| (k.clone(), p.clone()))
            .collect();
        for (k, p) in entries {
            self.heap.get_mut(fresh).define_property(k, p);
        }
        fresh
    }

    fn copy_back_let_bindings(&mut self, dest: crate::heap::ObjectHandle, src: crate::heap::ObjectHandle) {
        let entries: Vec<_> = self
            .heap
            .get(src)
            .own_entries()
            .filter(|(k, _)| !matches!(k, PropertyKey::Symbol(_)))
            .map(|(k, p)| (k.clone(), p.clone()))
            .collect();
        for (k, p) in entries {
            self.heap.get_mut(dest).define_property(k, p);
        }
    }

    fn exec_switch(&mut self, disc: &Node, cases: &[crate::tokenizer::tree::SwitchCase], scope: crate::heap::ObjectHandle) -> Flow<()> {
        let switch_scope = scope::create_let_scope(&mut self.heap, Some(scope));
        let value = self.eval_expr(disc, switch_scope)?;
        let mut matched = None;
        for (i, case) in cases.iter().enumerate() {
            if let Some(test) = &case.test {
                let test_val = self.eval_expr(test, switch_scope)?;
                if value.strict_eq(&test_val) {
                    matched = Some(i);
                    break;
                }
            }
        }
        let start = matched.or_else(|| cases.iter().position(|c| c.test.is_none()));
        let Some(start) = start else { return Ok(()) };
        for case in &cases[start..] {
            match self.exec_block(&case.body, switch_scope) {
                Ok(_) => {}
                Err(Completion::Break(None)) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn exec_try(
        &mut self,
        block: &TokenVec,
        catch: Option<&(Option<crate::tokenizer::tree::Pattern>, TokenVec)>,
        finally: Option<&TokenVec>,
        scope: crate::heap::ObjectHandle,
    ) -> Flow<()> {
        self.have_try += 1;
        let try_scope = scope::create_let_scope(&mut self.heap, Some(scope));
        let block_result = self.exec_block(block, try_scope).map(|_| ());
        self.have_try -= 1;

        let after_catch = match block_result {
            Err(Completion::Throw(value, at)) => {
                if let Some((pat, catch_body)) = catch {
                    let catch_scope = scope::create_let_scope(&mut self.heap, Some(scope));
                    if let Some(pat) = pat {
                        self.bind_pattern(pat, value, catch_scope)?;
                    }
                    let _ = at;
                    self.exec_block(catch_body, catch_scope).map(|_| ())
                } else {
                    Err(Completion::Throw(value, at))
                }
            }
            other => other,
        };

        // `finally` always runs; its own non-Normal completion replaces
        // whatever the try/catch produced (spec §7).
        if let Some(finally_body) = finally {
            let finally_scope = scope::create_let_scope(&mut self.heap, Some(scope));
            match self.exec_block(finally_body, finally_scope) {
                Ok(_) => after_catch,
                Err(e) => Err(e),
            }
        } else {
            after_catch
        }
    }

    fn enumerable_key_names(&self, obj: crate::heap::ObjectHandle) -> Vec<std::string::String> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        let mut cur = Some(obj);
        while let Some(h) = cur {
            let data = self.heap.get(h);
            for (key, prop) in data.own_entries() {
                if let PropertyKey::Symbol(_) = key {
                    continue;
                }
                let name = key.as_display_name();
                if prop.enumerable() && seen.insert(name.clone()) {
                    out.push(name);
                }
            }
            cur = data.prototype;
        }
        out
    }

    /// GC trigger point (spec §4.7). Only called between top-level
    /// statements, where the only live root outside the heap graph is
    /// the global scope — a call mid-evaluation would also need the
    /// current scope chain in `roots`, which nothing outside the
    /// recursive call stack holds a handle to.
    fn maybe_collect_garbage(&mut self) {
        if self.heap.len() > self.gc_threshold {
            self.collect_garbage();
            self.gc_threshold = (self.heap.len() * 2).max(256);
        }
    }

    pub fn collect_garbage(&mut self) {
        let mut roots = vec![
            self.global_scope,
            self.object_proto,
            self.function_proto,
            self.array_proto,
            self.string_proto,
            self.number_proto,
            self.boolean_proto,
        ];
        roots.extend(self.error_protos.iter().copied());
        self.heap.collect(roots);
    }
}

impl ErrorKind {
    fn from_name(name: &str) -> Option<ErrorKind> {
        Some(match name {
            "Error" => ErrorKind::Error,
            "EvalError" => ErrorKind::EvalError,
            "RangeError" => ErrorKind::RangeError,
            "ReferenceError" => ErrorKind::ReferenceError,
            "SyntaxError" => ErrorKind::SyntaxError,
            "TypeError" => ErrorKind::TypeError,
            _ => return None,
        })
    }
}
