// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ### [3.2 Property Name](spec §3.2)
//!
//! A property vector is kept sorted by [`PropertyKey`] so that
//! `ArrayIndex` children always occupy a contiguous prefix — this is
//! what makes `length` a cheap "last index + 1" read instead of a scan.

use core::cmp::Ordering;

use crate::symbol::SymbolId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// Created only by the symbol registry ([`crate::symbol`]).
    Symbol(SymbolId),
    String(std::string::String),
    /// `value <= 2^32 - 2`; the name this was parsed from has no
    /// leading zero unless it is exactly `"0"`.
    ArrayIndex(u32),
}

/// The maximum value an `ArrayIndex` may hold, per spec §3.2
/// (`2^32 - 2`, reserving `2^32 - 1` so `length` itself never aliases
/// a valid index).
pub const MAX_ARRAY_INDEX: u32 = u32::MAX - 1;

impl PropertyKey {
    /// Builds a `PropertyKey` from an arbitrary name, detecting the
    /// `ArrayIndex` case by parsing: non-empty, all ASCII digits, no
    /// leading zero unless the name is exactly `"0"`, value within
    /// range.
    pub fn from_name(name: &str) -> PropertyKey {
        if let Some(index) = parse_array_index(name) {
            PropertyKey::ArrayIndex(index)
        } else {
            PropertyKey::String(name.to_string())
        }
    }

    pub fn from_index(i: u32) -> PropertyKey {
        debug_assert!(i <= MAX_ARRAY_INDEX);
        PropertyKey::ArrayIndex(i)
    }

    /// The visible name, for property enumeration and `toString`
    /// contexts. Symbols have no visible name (`Symbol()` aside, which
    /// the core's bare registry does not model).
    pub fn as_display_name(&self) -> std::string::String {
        match self {
            PropertyKey::Symbol(_) => std::string::String::new(),
            PropertyKey::String(s) => s.clone(),
            PropertyKey::ArrayIndex(i) => i.to_string(),
        }
    }

    pub fn is_array_index(&self) -> bool {
        matches!(self, PropertyKey::ArrayIndex(_))
    }
}

fn parse_array_index(name: &str) -> Option<u32> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if name.len() > 1 && name.starts_with('0') {
        return None;
    }
    let value: u64 = name.parse().ok()?;
    if value <= MAX_ARRAY_INDEX as u64 {
        Some(value as u32)
    } else {
        None
    }
}

/// Category rank used for ordering. `ArrayIndex` sorts first and
/// `Symbol` last: spec §3.3 requires ArrayIndex children to occupy a
/// *contiguous prefix* of the property vector so `length` is a cheap
/// last-index read, and §5's enumeration order is "own ArrayIndex keys
/// ascending, then own string keys ... then prototype keys" — both only
/// hold if ArrayIndex sorts before String. This resolves spec §3.2's
/// own ordering table, whose "largest" label for ArrayIndex describes
/// numeric magnitude as the tiebreaker within the category, not its
/// position among categories (see DESIGN.md).
fn category_rank(key: &PropertyKey) -> u8 {
    match key {
        PropertyKey::ArrayIndex(_) => 0,
        PropertyKey::String(_) => 1,
        PropertyKey::Symbol(_) => 2,
    }
}

impl PartialOrd for PropertyKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PropertyKey {
    fn cmp(&self, other: &Self) -> Ordering {
        category_rank(self).cmp(&category_rank(other)).then_with(|| match (self, other) {
            (PropertyKey::ArrayIndex(a), PropertyKey::ArrayIndex(b)) => a.cmp(b),
            (PropertyKey::String(a), PropertyKey::String(b)) => a.cmp(b),
            (PropertyKey::Symbol(a), PropertyKey::Symbol(b)) => a.cmp(b),
            _ => Ordering::Equal,
        })
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        PropertyKey::from_name(s)
    }
}

impl From<u32> for PropertyKey {
    fn from(i: u32) -> Self {
        PropertyKey::ArrayIndex(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_array_index() {
        assert_eq!(PropertyKey::from_name("0"), PropertyKey::ArrayIndex(0));
        assert_eq!(PropertyKey::from_name("42"), PropertyKey::ArrayIndex(42));
        assert_eq!(
            PropertyKey::from_name("00"),
            PropertyKey::String("00".into())
        );
        assert_eq!(
            PropertyKey::from_name("1e3"),
            PropertyKey::String("1e3".into())
        );
    }

    #[test]
    fn orders_arrayindex_string_symbol() {
        let sym = PropertyKey::Symbol(SymbolId::for_test(0));
        let s = PropertyKey::String("a".into());
        let idx = PropertyKey::ArrayIndex(0);
        let mut v = vec![sym.clone(), s.clone(), idx.clone()];
        v.sort();
        assert_eq!(v, vec![idx, s, sym]);
    }

    #[test]
    fn array_indices_sort_numerically() {
        let mut v = vec![
            PropertyKey::ArrayIndex(10),
            PropertyKey::ArrayIndex(2),
            PropertyKey::ArrayIndex(1),
        ];
        v.sort();
        assert_eq!(
            v,
            vec![
                PropertyKey::ArrayIndex(1),
                PropertyKey::ArrayIndex(2),
                PropertyKey::ArrayIndex(10)
            ]
        );
    }
}
