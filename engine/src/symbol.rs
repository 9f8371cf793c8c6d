// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ### Symbol registry
//!
//! Per spec §5 / §9, symbols are the one piece of process-global state
//! multiple engine instances legitimately share (well-known symbols
//! like `symbol.iterator` must compare equal across engines embedded in
//! the same process), so the registry lives behind a single process-wide
//! mutex rather than on `Engine`.

use std::sync::{Mutex, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(u32);

impl SymbolId {
    #[cfg(test)]
    pub fn for_test(raw: u32) -> Self {
        SymbolId(raw)
    }
}

struct Registry {
    descriptions: Vec<Option<std::string::String>>,
}

fn registry() -> &'static Mutex<Registry> {
    static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        Mutex::new(Registry {
            descriptions: Vec::new(),
        })
    })
}

/// Allocates a fresh, globally unique symbol. Every call produces a
/// distinct `SymbolId` even if `description` repeats — symbols are
/// compared by identity, never by description.
pub fn new_symbol(description: Option<&str>) -> SymbolId {
    let mut reg = registry().lock().unwrap();
    let id = reg.descriptions.len() as u32;
    reg.descriptions.push(description.map(str::to_string));
    SymbolId(id)
}

pub fn description(id: SymbolId) -> Option<std::string::String> {
    let reg = registry().lock().unwrap();
    reg.descriptions[id.0 as usize].clone()
}

/// Well-known symbols the evaluator itself dispatches on (`symbol.iterator`
/// for `for...of` and spread, `symbol.accessor_get`/`symbol.accessor_set`
/// for accessor properties, `symbol.scope_parent` for the scope chain).
/// Allocated once, lazily, the first time any engine asks for them, so
/// that two `Engine`s in the same process always agree on their ids —
/// required for e.g. a user object's `[symbol.iterator]` method to be
/// found regardless of which engine installed it.
pub struct WellKnown {
    pub iterator: SymbolId,
    pub accessor_get: SymbolId,
    pub accessor_set: SymbolId,
    pub scope_parent: SymbolId,
    /// The pre-ES6 loop-termination sentinel (spec §7/§9's `StopIteration`):
    /// thrown by a `next()` method on completion, caught only by the
    /// `for...of`/generator-resume machinery in [`crate::eval::iter`].
    pub stop_iteration: SymbolId,
}

pub fn well_known() -> &'static WellKnown {
    static WELL_KNOWN: OnceLock<WellKnown> = OnceLock::new();
    WELL_KNOWN.get_or_init(|| WellKnown {
        iterator: new_symbol(Some("Symbol.iterator")),
        accessor_get: new_symbol(Some("Symbol.accessor_get")),
        accessor_set: new_symbol(Some("Symbol.accessor_set")),
        scope_parent: new_symbol(Some("Symbol.scope_parent")),
        stop_iteration: new_symbol(Some("StopIteration")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_symbols_never_compare_equal() {
        let a = new_symbol(Some("x"));
        let b = new_symbol(Some("x"));
        assert_ne!(a, b);
    }

    #[test]
    fn well_known_is_stable_across_calls() {
        let a = well_known().iterator;
        let b = well_known().iterator;
        assert_eq!(a, b);
    }
}
