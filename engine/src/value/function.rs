// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ### [3.5 Function, Bound Function, Native Function](spec §3.5)

use std::rc::Rc;

use crate::error::JsError;
use crate::heap::ObjectHandle;
use crate::tokenizer::tree::FuncBody;
use crate::value::Value;
use crate::Engine;

/// A user-defined function's extra state beyond its property vector.
/// `prototype` itself is an ordinary own property (spec §3.5: "`prototype`
/// child is created on construction and holds a back `constructor` link");
/// only the pieces that aren't representable as a plain property live here.
#[derive(Debug, Clone)]
pub struct FnData {
    pub body: Rc<FuncBody>,
    /// The `Let`/`Function` scope captured at closure-creation time, or
    /// `None` for a function created directly in the global scope.
    pub closure_scope: Option<ObjectHandle>,
    pub is_getter: bool,
    pub is_setter: bool,
}

impl FnData {
    pub fn new(body: Rc<FuncBody>, closure_scope: Option<ObjectHandle>) -> Self {
        FnData {
            body,
            closure_scope,
            is_getter: false,
            is_setter: false,
        }
    }

    pub fn name(&self) -> &str {
        self.body.name.as_deref().unwrap_or("")
    }

    pub fn arity(&self) -> usize {
        self.body
            .params
            .iter()
            .take_while(|p| !matches!(p, crate::tokenizer::tree::Pattern::Default(..)))
            .count()
    }
}

/// A bound function, spec §3.5: invocation prepends `bound_args` and
/// (unless the target is an arrow function, which ignores `this`
/// entirely) overrides `this` with `bound_this`.
#[derive(Debug, Clone)]
pub struct BoundData {
    pub target: ObjectHandle,
    pub bound_this: Value,
    pub bound_args: Vec<Value>,
}

/// The context a native callback executes with: full engine access (heap,
/// property get/set, and the ability to call back into script functions),
/// the `this` binding, the call's argument list, and — for
/// `new Native(...)` — the freshly allocated receiver.
pub struct NativeCallContext<'a> {
    pub engine: &'a mut Engine,
    pub this: Value,
    pub args: &'a [Value],
    pub new_target: Option<ObjectHandle>,
}

impl<'a> NativeCallContext<'a> {
    pub fn arg(&self, i: usize) -> Value {
        self.args.get(i).cloned().unwrap_or(Value::Undefined)
    }
}

pub type NativeCallback = dyn Fn(&mut NativeCallContext) -> Result<Value, JsError>;

/// A host-registered native function (spec §3.5, §4.6): opaque callback
/// plus the arity/name the signature string declared. Host "user data"
/// is whatever the callback closure captures — idiomatic Rust has no
/// need for the reference implementation's separate `void *userdata`
/// parameter.
#[derive(Clone)]
pub struct NativeFn {
    pub name: std::string::String,
    pub arity: u32,
    pub callback: Rc<NativeCallback>,
}

impl std::fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFn")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}
