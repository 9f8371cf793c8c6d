// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ### [4.6 Native interface](spec §4.6)
//!
//! A host signature string such as
//! `"function String.prototype.substring(start, end)"` is parsed — not
//! by the structural [`crate::tokenizer`], which only ever sees script
//! source, but by this small dedicated scanner — into a dotted
//! installation path (`["String", "prototype", "substring"]`) and an
//! arity (`2`), so [`crate::Engine::add_native`] knows both where to
//! install the function and how many declared parameters it has
//! (surfaced as the function's `.length`).

use crate::error::{ErrorKind, JsError, SourceLoc};

/// The parsed shape of a native signature string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeSignature {
    pub path: Vec<std::string::String>,
    pub arity: u32,
}

/// Parses `"function a.b.c(p1, p2, ...)"`. The leading `function`
/// keyword and parameter *names* are both ignored beyond their count —
/// only the dotted path and the parameter count are load-bearing; the
/// parameter names in the signature exist purely for the host author's
/// readability.
pub fn parse_signature(sig: &str) -> Result<NativeSignature, JsError> {
    let sig = sig.trim();
    let rest = sig.strip_prefix("function").ok_or_else(|| sig_err(sig, "missing 'function' keyword"))?;
    let rest = rest.trim_start();

    let paren = rest.find('(').ok_or_else(|| sig_err(sig, "missing '('"))?;
    let path_part = rest[..paren].trim();
    if path_part.is_empty() {
        return Err(sig_err(sig, "missing function name"));
    }
    let path: Vec<std::string::String> = path_part.split('.').map(|s| s.trim().to_string()).collect();
    if path.iter().any(|p| !is_valid_ident(p)) {
        return Err(sig_err(sig, "invalid identifier in dotted path"));
    }

    let close = rest.rfind(')').ok_or_else(|| sig_err(sig, "missing ')'"))?;
    if close < paren {
        return Err(sig_err(sig, "malformed parameter list"));
    }
    let params_part = rest[paren + 1..close].trim();
    let arity = if params_part.is_empty() {
        0
    } else {
        params_part.split(',').count() as u32
    };

    Ok(NativeSignature { path, arity })
}

fn is_valid_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn sig_err(sig: &str, msg: &str) -> JsError {
    JsError {
        kind: ErrorKind::SyntaxError,
        message: format!("invalid native signature '{sig}': {msg}"),
        at: SourceLoc::unknown(),
        thrown: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_path_and_arity() {
        let s = parse_signature("function String.prototype.substring(start, end)").unwrap();
        assert_eq!(s.path, vec!["String", "prototype", "substring"]);
        assert_eq!(s.arity, 2);
    }

    #[test]
    fn parses_zero_arity_top_level_function() {
        let s = parse_signature("function print()").unwrap();
        assert_eq!(s.path, vec!["print"]);
        assert_eq!(s.arity, 0);
    }

    #[test]
    fn rejects_missing_function_keyword() {
        assert!(parse_signature("print(a)").is_err());
    }
}
