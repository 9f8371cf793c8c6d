// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ### [4.5.5 Generators](spec §4.5.5) / [§9 generator coroutine bridge](spec §9)
//!
//! A generator's body must be suspendable mid-statement, which a plain
//! recursive tree-walk can't do without either a CPS rewrite of the
//! evaluator or a real second stack. The core takes the second route
//! behind a [`CoroutineHost`] trait, so an embedder can swap in
//! fibers/ucontext/wasm stack-switching; the default
//! [`ThreadCoroutineHost`] below runs the generator body on a spawned
//! OS thread and hands control back and forth over a channel, exactly
//! as the excluded `TinyJS_Threading` primitives did, just expressed
//! with `std::sync::mpsc` instead of a hand-rolled semaphore.

use std::rc::Rc;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};

use crate::error::JsError;
use crate::heap::ObjectHandle;
use crate::tokenizer::tree::FuncBody;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    SuspendedStart,
    SuspendedYield,
    Executing,
    Completed,
}

/// A generator object's extra state beyond its property vector: the
/// `Let`-scope it closes over (for GC rooting) and its live coroutine
/// handle, if execution has started.
#[derive(Debug, Clone)]
pub struct GeneratorData {
    pub scope: Option<ObjectHandle>,
    /// The generator function's body, run on first `.next()` (spec
    /// §4.5.5: "do not execute the body yet" on creation).
    pub body: Rc<FuncBody>,
    pub state: GeneratorState,
    #[allow(clippy::type_complexity)]
    pub handle: Option<std::rc::Rc<std::cell::RefCell<dyn CoroutineHandle>>>,
}

impl GeneratorData {
    pub fn new(scope: Option<ObjectHandle>, body: Rc<FuncBody>) -> Self {
        GeneratorData {
            scope,
            body,
            state: GeneratorState::SuspendedStart,
            handle: None,
        }
    }
}

/// One step of resuming a generator: either it yielded a value and is
/// still suspended, or it ran to completion (`return`/fall off the end)
/// or threw.
pub enum GeneratorStep {
    Yielded(Value),
    Returned(Value),
    Threw(JsError),
}

/// What a suspended `yield` is resumed with (spec §4.5.5's caller API
/// table): an ordinary value from `next`/`send`, a pending throw at the
/// yield site from `throw`, or the `close` sentinel that unwinds through
/// only the body's `finally` blocks.
#[derive(Debug, Clone)]
pub enum ResumeInput {
    Next(Value),
    Throw(Value),
    Close,
}

/// What the generator body sees when asking to suspend. `yield_value`
/// blocks the coroutine (not the OS thread driving the main engine)
/// until the next `resume`/`throw`/`close` call supplies a
/// [`ResumeInput`].
pub trait GeneratorControl {
    fn yield_value(&self, value: Value) -> ResumeInput;
}

/// A live, resumable coroutine. [`ThreadCoroutineHost`] returns one per
/// `spawn`; an embedder's own host can return a fiber-backed equivalent.
pub trait CoroutineHandle: std::fmt::Debug {
    fn resume(&mut self, input: ResumeInput) -> GeneratorStep;
}

/// Spawns a generator body, handing it a [`GeneratorControl`] to
/// suspend through. Bodies run synchronously with respect to the
/// caller: at most one of {caller, body} executes at a time, so the two
/// sides may safely share the engine's heap despite running on
/// different OS threads, provided the host never calls `resume` again
/// before the previous `GeneratorStep` was consumed — which is exactly
/// how the default implementation's channel handoff is structured.
pub trait CoroutineHost {
    fn spawn(
        &self,
        body: Box<dyn FnOnce(&dyn GeneratorControl) -> Result<Value, JsError> + Send>,
    ) -> Box<dyn CoroutineHandle>;
}

enum ToBody {
    Resume(ResumeInput),
}

enum FromBody {
    Yielded(Value),
    Done(Result<Value, JsError>),
}

struct ThreadControl {
    to_body: Receiver<ToBody>,
    from_body: SyncSender<FromBody>,
}

impl GeneratorControl for ThreadControl {
    fn yield_value(&self, value: Value) -> ResumeInput {
        self.from_body.send(FromBody::Yielded(value)).ok();
        match self.to_body.recv() {
            Ok(ToBody::Resume(input)) => input,
            Err(_) => ResumeInput::Next(Value::Undefined),
        }
    }
}

/// `Value`/`JsError` are `Rc`-based and not actually `Send`; this is
/// sound only because `ThreadCoroutineHost` enforces strict handoff —
/// the spawned thread touches its `Value`s only while the driving
/// thread is blocked in `recv`, and vice versa, so no two threads ever
/// read or write the same `Rc` concurrently. This mirrors the baton
/// discipline the excluded `TinyJS_Threading` semaphore pair provided.
struct AssertSend<T>(T);
unsafe impl<T> Send for AssertSend<T> {}

#[derive(Debug)]
struct ThreadHandle {
    to_body: SyncSender<ToBody>,
    from_body: Receiver<FromBody>,
    done: bool,
}

impl CoroutineHandle for ThreadHandle {
    fn resume(&mut self, input: ResumeInput) -> GeneratorStep {
        if self.done {
            return GeneratorStep::Returned(Value::Undefined);
        }
        if self.to_body.send(ToBody::Resume(input)).is_err() {
            self.done = true;
            return GeneratorStep::Returned(Value::Undefined);
        }
        match self.from_body.recv() {
            Ok(FromBody::Yielded(v)) => GeneratorStep::Yielded(v),
            Ok(FromBody::Done(Ok(v))) => {
                self.done = true;
                GeneratorStep::Returned(v)
            }
            Ok(FromBody::Done(Err(e))) => {
                self.done = true;
                GeneratorStep::Threw(e)
            }
            Err(_) => {
                self.done = true;
                GeneratorStep::Returned(Value::Undefined)
            }
        }
    }
}

pub struct ThreadCoroutineHost;

impl CoroutineHost for ThreadCoroutineHost {
    fn spawn(
        &self,
        body: Box<dyn FnOnce(&dyn GeneratorControl) -> Result<Value, JsError> + Send>,
    ) -> Box<dyn CoroutineHandle> {
        let (to_body_tx, to_body_rx) = sync_channel::<ToBody>(0);
        let (from_body_tx, from_body_rx) = sync_channel::<FromBody>(0);

        let packaged = AssertSend((body, to_body_rx, from_body_tx.clone()));
        std::thread::spawn(move || {
            let AssertSend((body, to_body_rx, from_body_tx)) = packaged;
            // Block until the first `resume()` before running any body
            // code, matching `SuspendedStart` (spec §4.5.5: the body
            // does not run until the first `.next()`).
            let first = to_body_rx.recv();
            if first.is_err() {
                return;
            }
            let control = ThreadControl {
                to_body: to_body_rx,
                from_body: from_body_tx.clone(),
            };
            let result = body(&control);
            from_body_tx.send(FromBody::Done(result)).ok();
        });

        Box::new(ThreadHandle {
            to_body: to_body_tx,
            from_body: from_body_rx,
            done: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_round_trips_a_single_yield() {
        let host = ThreadCoroutineHost;
        let mut handle = host.spawn(Box::new(|ctl: &dyn GeneratorControl| {
            let got = match ctl.yield_value(Value::Number(crate::number::Number::Int32(1))) {
                ResumeInput::Next(v) => v,
                _ => Value::Undefined,
            };
            Ok(got)
        }));
        match handle.resume(ResumeInput::Next(Value::Undefined)) {
            GeneratorStep::Yielded(Value::Number(n)) => {
                assert_eq!(n, crate::number::Number::Int32(1))
            }
            _ => panic!("expected yield"),
        }
        match handle.resume(ResumeInput::Next(Value::Number(crate::number::Number::Int32(2)))) {
            GeneratorStep::Returned(Value::Number(n)) => {
                assert_eq!(n, crate::number::Number::Int32(2))
            }
            other => panic!("expected return, got a different step: {other:?}"),
        }
    }
}

impl std::fmt::Debug for GeneratorStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneratorStep::Yielded(_) => write!(f, "Yielded"),
            GeneratorStep::Returned(_) => write!(f, "Returned"),
            GeneratorStep::Threw(_) => write!(f, "Threw"),
        }
    }
}
