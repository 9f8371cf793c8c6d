// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ### [4.2 Tokenizer (structural pass)](spec §4.2)
//!
//! A single-pass recursive-descent parser from [`Lexer`] tokens to the
//! nested [`tree::Node`] tree (spec §3.6). Two structural choices are
//! worth calling out against the reference implementation's own
//! approach, both resolved in `DESIGN.md`:
//!
//! - **Skip tokens.** The reference inserts `LEX_T_SKIP` jump tokens
//!   into a flat token array so the evaluator can bypass a dead branch
//!   without re-parsing it. A recursive tree has no flat array to skip
//!   over — not descending into a branch *is* the skip — so no
//!   `LEX_T_SKIP` equivalent is needed here.
//! - **Destructuring ambiguity.** The reference tokenizes `{…}`/`[…]`
//!   with both `destructuring` and `structuring` flags set when the
//!   parse context is ambiguous, finalizing on the next disambiguating
//!   token. Declarations (`var`/`let`/`const`, function parameters)
//!   are never ambiguous — the keyword already says "parse a pattern" —
//!   so they go through [`Tokenizer::parse_pattern`] directly.
//!   Assignment-target destructuring (`[a, b] = …`) reuses the ordinary
//!   `ArrayLit`/`ObjectLit` expression nodes as the target and the
//!   evaluator walks them structurally; [`Tokenizer::check_assignment_target`]
//!   rejects anything that isn't shaped like a valid pattern.

pub mod tree;

use std::rc::Rc;

use crate::error::ParseError;
use crate::error::{ErrorKind, SourceLoc};
use crate::lexer::{Lexer, Token};
use tree::*;

pub struct Tokenizer<'a> {
    lex: Lexer<'a>,
    file_name: std::string::String,
    /// Stack of "is the nearest enclosing non-arrow function a
    /// generator" flags, used to demote `yield` to a plain identifier
    /// outside generator bodies (spec §4.1: the lexer unconditionally
    /// emits the `yield` keyword token; the tokenizer decides whether
    /// it is in a generator context).
    generator_stack: Vec<bool>,
    /// The classic "noIn" grammar parameter: true while parsing a
    /// `for (...)` head's init clause, where a bare `in` operator would
    /// be ambiguous with `for (x in obj)` (spec §4.2 "Tokenizer
    /// (structural pass)"). Cleared to `false` whenever descending into
    /// any sub-production with its own closing delimiter (parens,
    /// brackets, braces, call arguments, a statement block), since
    /// those can't be confused with the for-head's own `)`.
    no_in: bool,
}

type PResult<T> = Result<T, ParseError>;

pub fn parse_program(source: &str, file_name: &str) -> PResult<Program> {
    let mut t = Tokenizer::new(source.as_bytes(), file_name.to_string());
    let body = t.parse_statement_list(&[])?;
    t.lex.check(Token::Eof, None)?;
    let body = wrap_with_forwards(body, true)?;
    Ok(Program {
        body,
        source_loc: t.lex.loc(),
    })
}

impl<'a> Tokenizer<'a> {
    fn new(src: &'a [u8], file_name: std::string::String) -> Self {
        Tokenizer {
            lex: Lexer::new(src, file_name.clone()),
            file_name,
            generator_stack: vec![false],
            no_in: false,
        }
    }

    /// Runs `f` with the "noIn" flag set to `value`, restoring whatever
    /// it was before on the way out (including on error). Every
    /// delimited sub-production (parens, brackets, a block, call
    /// arguments, ...) calls this with `false` before parsing its own
    /// inner expression, since its own closing token disambiguates `in`
    /// regardless of the enclosing for-head.
    fn with_no_in<T>(&mut self, value: bool, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        let prev = self.no_in;
        self.no_in = value;
        let result = f(self);
        self.no_in = prev;
        result
    }

    fn cur(&self) -> Token {
        self.lex.current_token()
    }

    fn advance(&mut self) -> PResult<()> {
        Ok(self.lex.advance()?)
    }

    fn expect(&mut self, t: Token) -> PResult<()> {
        Ok(self.lex.expect(t)?)
    }

    fn loc(&self) -> SourceLoc {
        self.lex.loc()
    }

    fn err(&self, kind: ErrorKind, msg: impl Into<std::string::String>) -> ParseError {
        ParseError {
            kind,
            message: msg.into(),
            at: self.loc(),
        }
    }

    fn in_generator(&self) -> bool {
        *self.generator_stack.last().unwrap_or(&false)
    }

    /// Implicit-semicolon insertion (spec §4.2): accepts an explicit
    /// `;`, or silently treats `}` / EOF / a preceding line break as
    /// one.
    fn consume_semi(&mut self) -> PResult<()> {
        match self.cur() {
            Token::Semi => self.advance(),
            Token::RBrace | Token::Eof => Ok(()),
            _ if self.lex.line_break_before_token() => Ok(()),
            _ => Err(self.err(ErrorKind::SyntaxError, "expected ';'")),
        }
    }

    // ---- statements ----------------------------------------------------

    fn parse_statement_list(&mut self, enders: &[Token]) -> PResult<TokenVec> {
        // A statement list is always its own delimited production (a
        // block's `{`/`}`, a function body, the top-level program) —
        // never itself part of a `for (...)` head — so any inherited
        // "noIn" suppression from an enclosing for-head doesn't apply
        // inside it (see `with_no_in`).
        self.with_no_in(false, |s| {
            let mut out = Vec::new();
            loop {
                if s.cur() == Token::Eof || enders.contains(&s.cur()) {
                    break;
                }
                out.push(s.parse_statement()?);
            }
            Ok(out)
        })
    }

    fn parse_statement(&mut self) -> PResult<Node> {
        match self.cur() {
            Token::LBrace => self.parse_block(),
            Token::KeywordVar | Token::KeywordLet | Token::KeywordConst => {
                let decl = self.parse_var_decl()?;
                self.consume_semi()?;
                Ok(decl)
            }
            Token::KeywordIf => self.parse_if(),
            Token::KeywordFor => self.parse_for(),
            Token::KeywordWhile => self.parse_while(),
            Token::KeywordDo => self.parse_do_while(),
            Token::KeywordFunction => self.parse_function_decl(),
            Token::KeywordReturn => self.parse_return(),
            Token::KeywordBreak => self.parse_break(),
            Token::KeywordContinue => self.parse_continue(),
            Token::KeywordThrow => self.parse_throw(),
            Token::KeywordTry => self.parse_try(),
            Token::KeywordSwitch => self.parse_switch(),
            Token::KeywordWith => self.parse_with(),
            Token::Semi => {
                self.advance()?;
                Ok(Node::Empty)
            }
            Token::Ident => self.parse_ident_led_statement(),
            _ => {
                let e = self.parse_expression()?;
                self.consume_semi()?;
                Ok(Node::ExprStmt(Box::new(e)))
            }
        }
    }

    /// `ID:` is a label; anything else starting with an identifier is
    /// an expression statement. One token of lookahead via a lexer
    /// savepoint (spec §4.2 "Labels").
    fn parse_ident_led_statement(&mut self) -> PResult<Node> {
        let sp = self.lex.save_position();
        let name = self.lex.token_string().to_string();
        self.advance()?;
        if self.cur() == Token::Colon {
            sp.discard(&mut self.lex);
            self.advance()?;
            let mut body = self.parse_statement()?;
            // A label attaches to the loop it directly (or, through
            // further labels, transitively) wraps, so a `continue
            // label` inside the loop body resolves back into this
            // loop's own iteration (spec §4.2 "Labels": "the label set
            // propagates into the loop/switch following it").
            attach_label_to_loop(&mut body, &name);
            return Ok(Node::Labeled {
                label: name,
                body: Box::new(body),
            });
        }
        sp.restore(&mut self.lex);
        let e = self.parse_expression()?;
        self.consume_semi()?;
        Ok(Node::ExprStmt(Box::new(e)))
    }

    fn parse_block(&mut self) -> PResult<Node> {
        self.expect(Token::LBrace)?;
        let stmts = self.parse_statement_list(&[Token::RBrace])?;
        self.expect(Token::RBrace)?;
        Ok(Node::Block(wrap_with_forwards(stmts, false)?))
    }

    fn parse_var_decl(&mut self) -> PResult<Node> {
        let kind = match self.cur() {
            Token::KeywordVar => DeclKind::Var,
            Token::KeywordLet => DeclKind::Let,
            Token::KeywordConst => DeclKind::Const,
            _ => unreachable!(),
        };
        self.advance()?;
        let mut decls = Vec::new();
        loop {
            let pattern = self.parse_pattern()?;
            let init = if self.cur() == Token::Assign {
                self.advance()?;
                Some(self.parse_assignment()?)
            } else {
                if kind == DeclKind::Const {
                    return Err(self.err(ErrorKind::SyntaxError, "missing initializer in const declaration"));
                }
                None
            };
            decls.push((pattern, init));
            if self.cur() == Token::Comma {
                self.advance()?;
            } else {
                break;
            }
        }
        Ok(Node::VarDecl { kind, decls })
    }

    fn parse_if(&mut self) -> PResult<Node> {
        self.advance()?;
        self.expect(Token::LParen)?;
        let test = self.parse_expression()?;
        self.expect(Token::RParen)?;
        let cons = self.parse_statement()?;
        let alt = if self.cur() == Token::KeywordElse {
            self.advance()?;
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Node::If {
            test: Box::new(test),
            cons: Box::new(cons),
            alt,
        })
    }

    fn parse_while(&mut self) -> PResult<Node> {
        self.advance()?;
        self.expect(Token::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(Token::RParen)?;
        let body = self.parse_statement()?;
        Ok(Node::Loop {
            kind: LoopKind::While,
            labels: Vec::new(),
            init: None,
            condition: Some(Box::new(condition)),
            iter: None,
            for_binding: None,
            body: Box::new(body),
        })
    }

    fn parse_do_while(&mut self) -> PResult<Node> {
        self.advance()?;
        let body = self.parse_statement()?;
        self.expect(Token::KeywordWhile)?;
        self.expect(Token::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(Token::RParen)?;
        self.consume_semi()?;
        Ok(Node::Loop {
            kind: LoopKind::Do,
            labels: Vec::new(),
            init: None,
            condition: Some(Box::new(condition)),
            iter: None,
            for_binding: None,
            body: Box::new(body),
        })
    }

    /// `for (;;)`, `for (init; cond; iter)`, `for (x in obj)`,
    /// `for (x of iterable)`, each with or without a leading
    /// `var`/`let`/`const` (spec §4.2, §4.5.2).
    fn parse_for(&mut self) -> PResult<Node> {
        self.advance()?;
        self.expect(Token::LParen)?;

        if self.cur() == Token::KeywordVar || self.cur() == Token::KeywordLet || self.cur() == Token::KeywordConst {
            let kind = match self.cur() {
                Token::KeywordVar => DeclKind::Var,
                Token::KeywordLet => DeclKind::Let,
                Token::KeywordConst => DeclKind::Const,
                _ => unreachable!(),
            };
            self.advance()?;
            let pattern = self.parse_pattern()?;
            if self.cur() == Token::KeywordIn || self.cur() == Token::KeywordOf {
                let is_of = self.cur() == Token::KeywordOf;
                self.advance()?;
                let iter = self.parse_assignment()?;
                self.expect(Token::RParen)?;
                let body = self.parse_statement()?;
                return Ok(Node::Loop {
                    kind: if is_of { LoopKind::ForOf } else { LoopKind::ForIn },
                    labels: Vec::new(),
                    init: None,
                    condition: None,
                    iter: Some(Box::new(iter)),
                    for_binding: Some((kind, pattern)),
                    body: Box::new(body),
                });
            }
            // Classic `for (var/let/const i = …; …; …)`.
            let init = if self.cur() == Token::Assign {
                self.advance()?;
                Some(self.parse_assignment()?)
            } else {
                None
            };
            let mut decls = vec![(pattern, init)];
            while self.cur() == Token::Comma {
                self.advance()?;
                let p = self.parse_pattern()?;
                let i = if self.cur() == Token::Assign {
                    self.advance()?;
                    Some(self.parse_assignment()?)
                } else {
                    None
                };
                decls.push((p, i));
            }
            self.expect(Token::Semi)?;
            return self.finish_classic_for(Some(Box::new(Node::VarDecl { kind, decls })));
        }

        if self.cur() == Token::Semi {
            self.advance()?;
            return self.finish_classic_for(None);
        }

        let lhs = self.parse_expression_no_in()?;
        if self.cur() == Token::KeywordIn || self.cur() == Token::KeywordOf {
            let is_of = self.cur() == Token::KeywordOf;
            self.check_assignment_target(&lhs)?;
            self.advance()?;
            let iter = self.parse_assignment()?;
            self.expect(Token::RParen)?;
            let body = self.parse_statement()?;
            return Ok(Node::Loop {
                kind: if is_of { LoopKind::ForOf } else { LoopKind::ForIn },
                labels: Vec::new(),
                init: Some(Box::new(lhs)),
                condition: None,
                iter: Some(Box::new(iter)),
                for_binding: None,
                body: Box::new(body),
            });
        }
        self.expect(Token::Semi)?;
        self.finish_classic_for(Some(Box::new(Node::ExprStmt(Box::new(lhs)))))
    }

    fn finish_classic_for(&mut self, init: Option<Box<Node>>) -> PResult<Node> {
        let condition = if self.cur() != Token::Semi {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        self.expect(Token::Semi)?;
        let iter = if self.cur() != Token::RParen {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        self.expect(Token::RParen)?;
        let body = self.parse_statement()?;
        Ok(Node::Loop {
            kind: LoopKind::For,
            labels: Vec::new(),
            init,
            condition,
            iter,
            for_binding: None,
            body: Box::new(body),
        })
    }

    fn parse_function_decl(&mut self) -> PResult<Node> {
        self.advance()?;
        let is_generator = if self.cur() == Token::Mul {
            self.advance()?;
            true
        } else {
            false
        };
        let name = match self.cur() {
            Token::Ident => {
                let n = self.lex.token_string().to_string();
                self.advance()?;
                n
            }
            _ => return Err(self.err(ErrorKind::SyntaxError, "function declaration requires a name")),
        };
        let body = self.parse_function_rest(Some(name), is_generator, false)?;
        Ok(Node::Function(body))
    }

    fn parse_function_rest(
        &mut self,
        name: Option<std::string::String>,
        is_generator: bool,
        is_arrow: bool,
    ) -> PResult<Rc<FuncBody>> {
        let line = self.lex.current_line();
        let file_name = self.file_name.clone();
        self.expect(Token::LParen)?;
        let (params, rest_param) = self.parse_param_list()?;
        self.generator_stack.push(is_generator);
        self.expect(Token::LBrace)?;
        let stmts = self.parse_statement_list(&[Token::RBrace])?;
        self.expect(Token::RBrace)?;
        self.generator_stack.pop();
        let body = wrap_with_forwards(stmts, true)?;
        Ok(Rc::new(FuncBody {
            name,
            params,
            rest_param,
            is_arrow,
            is_generator,
            file_name,
            line,
            body,
        }))
    }

    fn parse_param_list(&mut self) -> PResult<(Vec<Pattern>, Option<Pattern>)> {
        // Bounded by `(`/`)`; see `parse_array_pattern`.
        self.with_no_in(false, |s| {
            let mut params = Vec::new();
            let mut rest = None;
            while s.cur() != Token::RParen {
                if s.cur() == Token::Spread {
                    s.advance()?;
                    rest = Some(s.parse_pattern()?);
                    break;
                }
                params.push(s.parse_pattern_with_default()?);
                if s.cur() == Token::Comma {
                    s.advance()?;
                } else {
                    break;
                }
            }
            s.expect(Token::RParen)?;
            Ok((params, rest))
        })
    }

    fn parse_return(&mut self) -> PResult<Node> {
        self.advance()?;
        let arg = if matches!(self.cur(), Token::Semi | Token::RBrace | Token::Eof) || self.lex.line_break_before_token() {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        self.consume_semi()?;
        Ok(Node::Return(arg))
    }

    fn parse_label_ref(&mut self) -> PResult<Option<std::string::String>> {
        if self.cur() == Token::Ident && !self.lex.line_break_before_token() {
            let n = self.lex.token_string().to_string();
            self.advance()?;
            Ok(Some(n))
        } else {
            Ok(None)
        }
    }

    fn parse_break(&mut self) -> PResult<Node> {
        self.advance()?;
        let label = self.parse_label_ref()?;
        self.consume_semi()?;
        Ok(Node::Break(label))
    }

    fn parse_continue(&mut self) -> PResult<Node> {
        self.advance()?;
        let label = self.parse_label_ref()?;
        self.consume_semi()?;
        Ok(Node::Continue(label))
    }

    fn parse_throw(&mut self) -> PResult<Node> {
        self.advance()?;
        if self.lex.line_break_before_token() {
            return Err(self.err(ErrorKind::SyntaxError, "illegal newline after 'throw'"));
        }
        let e = self.parse_expression()?;
        self.consume_semi()?;
        Ok(Node::Throw(Box::new(e)))
    }

    fn parse_try(&mut self) -> PResult<Node> {
        self.advance()?;
        let block = match self.parse_block()? {
            Node::Block(v) => v,
            _ => unreachable!(),
        };
        let catch = if self.cur() == Token::KeywordCatch {
            self.advance()?;
            let param = if self.cur() == Token::LParen {
                self.advance()?;
                let p = self.parse_pattern()?;
                self.expect(Token::RParen)?;
                Some(p)
            } else {
                None
            };
            let body = match self.parse_block()? {
                Node::Block(v) => v,
                _ => unreachable!(),
            };
            Some((param, body))
        } else {
            None
        };
        let finally = if self.cur() == Token::KeywordFinally {
            self.advance()?;
            let body = match self.parse_block()? {
                Node::Block(v) => v,
                _ => unreachable!(),
            };
            Some(body)
        } else {
            None
        };
        if catch.is_none() && finally.is_none() {
            return Err(self.err(ErrorKind::SyntaxError, "missing catch or finally after try"));
        }
        Ok(Node::Try { block, catch, finally })
    }

    fn parse_switch(&mut self) -> PResult<Node> {
        self.advance()?;
        self.expect(Token::LParen)?;
        let disc = self.parse_expression()?;
        self.expect(Token::RParen)?;
        self.expect(Token::LBrace)?;
        let mut cases = Vec::new();
        while self.cur() != Token::RBrace {
            let test = if self.cur() == Token::KeywordCase {
                self.advance()?;
                let e = self.parse_expression()?;
                Some(e)
            } else {
                self.expect(Token::KeywordDefault)?;
                None
            };
            self.expect(Token::Colon)?;
            let body = self.parse_statement_list(&[Token::RBrace, Token::KeywordCase, Token::KeywordDefault])?;
            cases.push(SwitchCase { test, body });
        }
        self.expect(Token::RBrace)?;
        Ok(Node::Switch {
            disc: Box::new(disc),
            cases,
        })
    }

    fn parse_with(&mut self) -> PResult<Node> {
        self.advance()?;
        self.expect(Token::LParen)?;
        let object = self.parse_expression()?;
        self.expect(Token::RParen)?;
        let body = self.parse_statement()?;
        Ok(Node::With {
            object: Box::new(object),
            body: Box::new(body),
        })
    }

    // ---- patterns --------------------------------------------------

    fn parse_pattern(&mut self) -> PResult<Pattern> {
        match self.cur() {
            Token::LBrace => self.parse_object_pattern(),
            Token::LBrack => self.parse_array_pattern(),
            Token::Ident => {
                let n = self.lex.token_string().to_string();
                self.advance()?;
                Ok(Pattern::Ident(n))
            }
            _ => Err(self.err(ErrorKind::SyntaxError, "expected a binding identifier or pattern")),
        }
    }

    fn parse_pattern_with_default(&mut self) -> PResult<Pattern> {
        let p = self.parse_pattern()?;
        if self.cur() == Token::Assign {
            self.advance()?;
            let default = self.parse_assignment()?;
            Ok(Pattern::Default(Box::new(p), Box::new(default)))
        } else {
            Ok(p)
        }
    }

    fn parse_array_pattern(&mut self) -> PResult<Pattern> {
        self.advance()?;
        // Bounded by `[`/`]`, so any default value or computed key
        // inside is unambiguous regardless of an enclosing for-head's
        // "noIn" (see `with_no_in`).
        self.with_no_in(false, |s| {
            let mut elements = Vec::new();
            let mut rest = None;
            while s.cur() != Token::RBrack {
                if s.cur() == Token::Comma {
                    elements.push(None);
                    s.advance()?;
                    continue;
                }
                if s.cur() == Token::Spread {
                    s.advance()?;
                    rest = Some(Box::new(s.parse_pattern()?));
                    break;
                }
                elements.push(Some(s.parse_pattern_with_default()?));
                if s.cur() == Token::Comma {
                    s.advance()?;
                } else {
                    break;
                }
            }
            s.expect(Token::RBrack)?;
            Ok(Pattern::Array { elements, rest })
        })
    }

    fn parse_object_pattern(&mut self) -> PResult<Pattern> {
        self.advance()?;
        // Bounded by `{`/`}`; see `parse_array_pattern`.
        self.with_no_in(false, |s| {
            let mut props = Vec::new();
            let mut rest = None;
            while s.cur() != Token::RBrace {
                if s.cur() == Token::Spread {
                    s.advance()?;
                    rest = Some(Box::new(s.parse_pattern()?));
                    break;
                }
                let key = s.parse_prop_key_pat()?;
                let value = if s.cur() == Token::Colon {
                    s.advance()?;
                    s.parse_pattern_with_default()?
                } else {
                    // shorthand `{a}` or `{a = default}`
                    let PropKeyPat::Ident(name) = &key else {
                        return Err(s.err(ErrorKind::SyntaxError, "computed key requires ':'"));
                    };
                    let base = Pattern::Ident(name.clone());
                    if s.cur() == Token::Assign {
                        s.advance()?;
                        let d = s.parse_assignment()?;
                        Pattern::Default(Box::new(base), Box::new(d))
                    } else {
                        base
                    }
                };
                props.push((key, value));
                if s.cur() == Token::Comma {
                    s.advance()?;
                } else {
                    break;
                }
            }
            s.expect(Token::RBrace)?;
            Ok(Pattern::Object { props, rest })
        })
    }

    fn parse_prop_key_pat(&mut self) -> PResult<PropKeyPat> {
        if self.cur() == Token::LBrack {
            self.advance()?;
            let e = self.parse_assignment()?;
            self.expect(Token::RBrack)?;
            return Ok(PropKeyPat::Computed(Box::new(e)));
        }
        let name = self.property_key_text()?;
        self.advance()?;
        Ok(PropKeyPat::Ident(name))
    }

    /// Reads the textual spelling of the current token when used as a
    /// (non-computed) property key: identifiers, keywords (`{if: 1}`
    /// is legal JS), strings and numbers all qualify.
    fn property_key_text(&mut self) -> PResult<std::string::String> {
        match self.cur() {
            Token::Ident | Token::Label => Ok(self.lex.token_string().to_string()),
            Token::String => Ok(self.lex.token_string().to_string()),
            Token::Number => Ok(self.lex.number_value.to_string()),
            other if lookup_keyword_text(other).is_some() => Ok(lookup_keyword_text(other).unwrap().to_string()),
            _ => Err(self.err(ErrorKind::SyntaxError, "expected a property key")),
        }
    }

    // ---- expressions -------------------------------------------------

    /// `check_assignment_target` implements spec §4.2's "Leftmost-hand
    /// tracking": an expression is a valid assignment target iff it is
    /// an identifier, a member expression, or an array/object literal
    /// whose own elements are themselves (recursively) valid targets.
    fn check_assignment_target(&self, node: &Node) -> PResult<()> {
        match node {
            Node::Ident(_) | Node::Member { .. } => Ok(()),
            Node::ArrayLit(elems) => {
                for e in elems.iter().flatten() {
                    match e {
                        Node::Assign { op: AssignOp::Assign, target, .. } => self.check_assignment_target(target)?,
                        Node::Spread(inner) => self.check_assignment_target(inner)?,
                        other => self.check_assignment_target(other)?,
                    }
                }
                Ok(())
            }
            Node::ObjectLit(props) => {
                for p in props {
                    match p {
                        ObjectProp::KeyValue { value, .. } => self.check_assignment_target(value)?,
                        ObjectProp::Spread(inner) => self.check_assignment_target(inner)?,
                        _ => return Err(self.err(ErrorKind::SyntaxError, "invalid destructuring target")),
                    }
                }
                Ok(())
            }
            _ => Err(self.err(ErrorKind::ReferenceError, "invalid assignment target")),
        }
    }

    fn parse_expression(&mut self) -> PResult<Node> {
        let first = self.parse_assignment()?;
        if self.cur() == Token::Comma {
            let mut list = vec![first];
            while self.cur() == Token::Comma {
                self.advance()?;
                list.push(self.parse_assignment()?);
            }
            Ok(Node::Sequence(list))
        } else {
            Ok(first)
        }
    }

    /// Same as [`Tokenizer::parse_expression`] but disallows a bare
    /// `in` operator at the top level, for `for (...;...;...)` init
    /// clauses where `in` would otherwise be ambiguous with
    /// `for (x in y)` (classic "noIn" grammar parameter). The
    /// suppression threads down through `parse_relational` via
    /// `self.no_in` and is only visible until the next delimited
    /// sub-production resets it (see `with_no_in`).
    fn parse_expression_no_in(&mut self) -> PResult<Node> {
        self.with_no_in(true, |s| s.parse_assignment())
    }

    fn parse_assignment(&mut self) -> PResult<Node> {
        if let Some(arrow) = self.try_parse_arrow()? {
            return Ok(arrow);
        }
        if self.in_generator() && self.cur() == Token::KeywordYield {
            return self.parse_yield();
        }
        let left = self.parse_conditional()?;
        if let Some(op) = assign_op_for(self.cur()) {
            self.check_assignment_target(&left)?;
            self.advance()?;
            let right = self.parse_assignment()?;
            return Ok(Node::Assign {
                op,
                target: Box::new(left),
                value: Box::new(right),
            });
        }
        Ok(left)
    }

    fn parse_yield(&mut self) -> PResult<Node> {
        self.advance()?;
        let delegate = if self.cur() == Token::Mul {
            self.advance()?;
            true
        } else {
            false
        };
        let arg = if matches!(self.cur(), Token::Semi | Token::RParen | Token::RBrace | Token::RBrack | Token::Comma | Token::Colon | Token::Eof)
            || self.lex.line_break_before_token()
        {
            None
        } else {
            Some(Box::new(self.parse_assignment()?))
        };
        Ok(Node::Yield { arg, delegate })
    }

    /// Attempts to parse `Ident => body` or `(params) => body` at the
    /// current position. On failure (not an arrow at all), restores
    /// the lexer savepoint and returns `None` so the caller falls
    /// through to ordinary expression parsing — this is the "lexer
    /// savepoint" disambiguation spec §4.2 calls for.
    fn try_parse_arrow(&mut self) -> PResult<Option<Node>> {
        if self.cur() == Token::Ident {
            let sp = self.lex.save_position();
            let name = self.lex.token_string().to_string();
            self.advance()?;
            if self.cur() == Token::Arrow && !self.lex.line_break_before_token() {
                sp.discard(&mut self.lex);
                self.advance()?;
                let body = self.parse_function_rest_from_params(vec![Pattern::Ident(name)], None)?;
                return Ok(Some(Node::FunctionExpr(body)));
            }
            sp.restore(&mut self.lex);
            return Ok(None);
        }
        if self.cur() == Token::LParen {
            let sp = self.lex.save_position();
            let attempt = (|| -> PResult<(Vec<Pattern>, Option<Pattern>)> {
                self.advance()?;
                self.parse_param_list()
            })();
            match attempt {
                Ok((params, rest)) if self.cur() == Token::Arrow => {
                    sp.discard(&mut self.lex);
                    self.advance()?;
                    let body = self.parse_function_rest_from_params(params, rest)?;
                    Ok(Some(Node::FunctionExpr(body)))
                }
                _ => {
                    sp.restore(&mut self.lex);
                    Ok(None)
                }
            }
        } else {
            Ok(None)
        }
    }

    fn parse_function_rest_from_params(&mut self, params: Vec<Pattern>, rest_param: Option<Pattern>) -> PResult<Rc<FuncBody>> {
        let line = self.lex.current_line();
        let file_name = self.file_name.clone();
        self.generator_stack.push(false);
        let body = if self.cur() == Token::LBrace {
            self.advance()?;
            let stmts = self.parse_statement_list(&[Token::RBrace])?;
            self.expect(Token::RBrace)?;
            wrap_with_forwards(stmts, true)?
        } else {
            let e = self.parse_assignment()?;
            vec![Node::Return(Some(Box::new(e)))]
        };
        self.generator_stack.pop();
        Ok(Rc::new(FuncBody {
            name: None,
            params,
            rest_param,
            is_arrow: true,
            is_generator: false,
            file_name,
            line,
            body,
        }))
    }

    fn parse_conditional(&mut self) -> PResult<Node> {
        let test = self.parse_nullish_or()?;
        if self.cur() == Token::Question {
            self.advance()?;
            // The branch between `?` and `:` is unambiguous regardless
            // of an enclosing for-head's "noIn": it's bounded by `:` on
            // one side and `?` on the other. Only the `alt` branch
            // (after `:`) inherits the enclosing "noIn" per the
            // grammar's own ConditionalExpression production.
            let cons = self.with_no_in(false, |s| s.parse_assignment())?;
            self.expect(Token::Colon)?;
            let alt = self.parse_assignment()?;
            return Ok(Node::Conditional {
                test: Box::new(test),
                cons: Box::new(cons),
                alt: Box::new(alt),
            });
        }
        Ok(test)
    }

    fn parse_nullish_or(&mut self) -> PResult<Node> {
        let mut left = self.parse_and()?;
        loop {
            let op = match self.cur() {
                Token::Or => LogOp::Or,
                Token::Nullish => LogOp::Nullish,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_and()?;
            left = Node::Logical { op, lhs: Box::new(left), rhs: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> PResult<Node> {
        let mut left = self.parse_bit_or()?;
        while self.cur() == Token::And {
            self.advance()?;
            let right = self.parse_bit_or()?;
            left = Node::Logical { op: LogOp::And, lhs: Box::new(left), rhs: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_bit_or(&mut self) -> PResult<Node> {
        let mut left = self.parse_bit_xor()?;
        while self.cur() == Token::BOr {
            self.advance()?;
            let right = self.parse_bit_xor()?;
            left = Node::Binary { op: BinOp::BOr, lhs: Box::new(left), rhs: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_bit_xor(&mut self) -> PResult<Node> {
        let mut left = self.parse_bit_and()?;
        while self.cur() == Token::BXor {
            self.advance()?;
            let right = self.parse_bit_and()?;
            left = Node::Binary { op: BinOp::BXor, lhs: Box::new(left), rhs: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_bit_and(&mut self) -> PResult<Node> {
        let mut left = self.parse_equality()?;
        while self.cur() == Token::BAnd {
            self.advance()?;
            let right = self.parse_equality()?;
            left = Node::Binary { op: BinOp::BAnd, lhs: Box::new(left), rhs: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> PResult<Node> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.cur() {
                Token::Eq => BinOp::Eq,
                Token::NotEq => BinOp::NotEq,
                Token::StrictEq => BinOp::StrictEq,
                Token::StrictNotEq => BinOp::StrictNotEq,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_relational()?;
            left = Node::Binary { op, lhs: Box::new(left), rhs: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> PResult<Node> {
        let mut left = self.parse_shift()?;
        loop {
            let op = match self.cur() {
                Token::Lt => BinOp::Lt,
                Token::Lte => BinOp::Lte,
                Token::Gt => BinOp::Gt,
                Token::Gte => BinOp::Gte,
                Token::KeywordIn if !self.no_in => BinOp::In,
                Token::KeywordInstanceOf => BinOp::InstanceOf,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_shift()?;
            left = Node::Binary { op, lhs: Box::new(left), rhs: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> PResult<Node> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.cur() {
                Token::ShiftLeft => BinOp::ShiftLeft,
                Token::ShiftRight => BinOp::ShiftRight,
                Token::UShiftRight => BinOp::UShiftRight,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_additive()?;
            left = Node::Binary { op, lhs: Box::new(left), rhs: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> PResult<Node> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.cur() {
                Token::Add => BinOp::Add,
                Token::Sub => BinOp::Sub,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_multiplicative()?;
            left = Node::Binary { op, lhs: Box::new(left), rhs: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> PResult<Node> {
        let mut left = self.parse_exponent()?;
        loop {
            let op = match self.cur() {
                Token::Mul => BinOp::Mul,
                Token::Div => BinOp::Div,
                Token::Mod => BinOp::Mod,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_exponent()?;
            left = Node::Binary { op, lhs: Box::new(left), rhs: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_exponent(&mut self) -> PResult<Node> {
        let base = self.parse_unary()?;
        if self.cur() == Token::Pow {
            self.advance()?;
            let exp = self.parse_exponent()?;
            return Ok(Node::Binary { op: BinOp::Pow, lhs: Box::new(base), rhs: Box::new(exp) });
        }
        Ok(base)
    }

    fn parse_unary(&mut self) -> PResult<Node> {
        let op = match self.cur() {
            Token::Sub => Some(UnOp::Neg),
            Token::Add => Some(UnOp::Plus),
            Token::Not => Some(UnOp::Not),
            Token::BNot => Some(UnOp::BNot),
            Token::KeywordTypeOf => Some(UnOp::TypeOf),
            Token::KeywordVoid => Some(UnOp::Void),
            Token::KeywordDelete => Some(UnOp::Delete),
            _ => None,
        };
        if let Some(op) = op {
            self.advance()?;
            let expr = self.parse_unary()?;
            if op == UnOp::Delete {
                self.check_assignment_target(&expr).ok();
            }
            return Ok(Node::Unary { op, expr: Box::new(expr) });
        }
        if matches!(self.cur(), Token::Inc | Token::Dec) {
            let op = if self.cur() == Token::Inc { UpdateOp::Inc } else { UpdateOp::Dec };
            self.advance()?;
            let target = self.parse_unary()?;
            self.check_assignment_target(&target)?;
            return Ok(Node::Update { op, prefix: true, target: Box::new(target) });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> PResult<Node> {
        let operand = self.parse_call_member_chain()?;
        if !self.lex.line_break_before_token() && matches!(self.cur(), Token::Inc | Token::Dec) {
            let op = if self.cur() == Token::Inc { UpdateOp::Inc } else { UpdateOp::Dec };
            self.check_assignment_target(&operand)?;
            self.advance()?;
            return Ok(Node::Update { op, prefix: false, target: Box::new(operand) });
        }
        Ok(operand)
    }

    fn parse_call_member_chain(&mut self) -> PResult<Node> {
        let mut expr = self.parse_new_or_primary()?;
        loop {
            match self.cur() {
                Token::Dot => {
                    self.advance()?;
                    let name = self.property_key_text()?;
                    self.advance()?;
                    expr = Node::Member { object: Box::new(expr), prop: MemberProp::Ident(name), optional: false };
                }
                Token::LBrack => {
                    self.advance()?;
                    let idx = self.with_no_in(false, |s| s.parse_expression())?;
                    self.expect(Token::RBrack)?;
                    expr = Node::Member { object: Box::new(expr), prop: MemberProp::Computed(Box::new(idx)), optional: false };
                }
                Token::LParen => {
                    let args = self.parse_call_arguments()?;
                    expr = Node::Call { callee: Box::new(expr), args, optional: false };
                }
                Token::OptionalChain => {
                    self.advance()?;
                    let name = self.property_key_text()?;
                    self.advance()?;
                    expr = Node::Member { object: Box::new(expr), prop: MemberProp::Ident(name), optional: true };
                }
                Token::OptionalIndex => {
                    self.advance()?;
                    let idx = self.with_no_in(false, |s| s.parse_expression())?;
                    self.expect(Token::RBrack)?;
                    expr = Node::Member { object: Box::new(expr), prop: MemberProp::Computed(Box::new(idx)), optional: true };
                }
                Token::OptionalCall => {
                    self.advance()?;
                    let args = self.parse_arguments_until(Token::RParen)?;
                    self.expect(Token::RParen)?;
                    expr = Node::Call { callee: Box::new(expr), args, optional: true };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_call_arguments(&mut self) -> PResult<Vec<Node>> {
        self.expect(Token::LParen)?;
        let args = self.parse_arguments_until(Token::RParen)?;
        self.expect(Token::RParen)?;
        Ok(args)
    }

    fn parse_arguments_until(&mut self, end: Token) -> PResult<Vec<Node>> {
        self.with_no_in(false, |s| {
            let mut args = Vec::new();
            while s.cur() != end {
                if s.cur() == Token::Spread {
                    s.advance()?;
                    args.push(Node::Spread(Box::new(s.parse_assignment()?)));
                } else {
                    args.push(s.parse_assignment()?);
                }
                if s.cur() == Token::Comma {
                    s.advance()?;
                } else {
                    break;
                }
            }
            Ok(args)
        })
    }

    fn parse_new_or_primary(&mut self) -> PResult<Node> {
        if self.cur() == Token::KeywordNew {
            self.advance()?;
            if self.cur() == Token::Dot {
                self.advance()?;
                let text = self.property_key_text()?;
                if text != "target" {
                    return Err(self.err(ErrorKind::SyntaxError, "expected 'new.target'"));
                }
                self.advance()?;
                return Ok(Node::NewTarget);
            }
            let callee = self.parse_new_callee()?;
            let args = if self.cur() == Token::LParen {
                self.parse_call_arguments()?
            } else {
                Vec::new()
            };
            return Ok(Node::New { callee: Box::new(callee), args });
        }
        self.parse_primary()
    }

    /// The callee of `new X.Y(...)`: member access only, no calls —
    /// `new` binds to the nearest parenthesized argument list (spec
    /// §4.5.1).
    fn parse_new_callee(&mut self) -> PResult<Node> {
        let mut expr = self.parse_new_or_primary_no_call()?;
        loop {
            match self.cur() {
                Token::Dot => {
                    self.advance()?;
                    let name = self.property_key_text()?;
                    self.advance()?;
                    expr = Node::Member { object: Box::new(expr), prop: MemberProp::Ident(name), optional: false };
                }
                Token::LBrack => {
                    self.advance()?;
                    let idx = self.with_no_in(false, |s| s.parse_expression())?;
                    self.expect(Token::RBrack)?;
                    expr = Node::Member { object: Box::new(expr), prop: MemberProp::Computed(Box::new(idx)), optional: false };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_new_or_primary_no_call(&mut self) -> PResult<Node> {
        if self.cur() == Token::KeywordNew {
            self.advance()?;
            let callee = self.parse_new_callee()?;
            let args = if self.cur() == Token::LParen {
                self.parse_call_arguments()?
            } else {
                Vec::new()
            };
            return Ok(Node::New { callee: Box::new(callee), args });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> PResult<Node> {
        match self.cur() {
            Token::Number => {
                let v = self.lex.number_value;
                self.advance()?;
                Ok(Node::NumberLit(v))
            }
            Token::String => {
                let s = self.lex.token_string().to_string();
                self.advance()?;
                Ok(Node::StringLit(s))
            }
            Token::KeywordTrue => {
                self.advance()?;
                Ok(Node::BoolLit(true))
            }
            Token::KeywordFalse => {
                self.advance()?;
                Ok(Node::BoolLit(false))
            }
            Token::KeywordNull => {
                self.advance()?;
                Ok(Node::NullLit)
            }
            Token::KeywordUndefined => {
                self.advance()?;
                Ok(Node::UndefinedLit)
            }
            Token::KeywordThis => {
                self.advance()?;
                Ok(Node::ThisExpr)
            }
            Token::KeywordYield => {
                // Outside a generator body, `yield` demotes to a plain
                // identifier (spec §4.1).
                let n = self.lex.token_string().to_string();
                self.advance()?;
                Ok(Node::Ident(if n.is_empty() { "yield".to_string() } else { n }))
            }
            Token::Ident | Token::Label => {
                let n = self.lex.token_string().to_string();
                self.advance()?;
                Ok(Node::Ident(n))
            }
            Token::Regex => {
                let text = self.lex.token_string().to_string();
                self.advance()?;
                let mut parts = text.splitn(2, '\u{0}');
                let pattern = parts.next().unwrap_or_default().to_string();
                let flags = parts.next().unwrap_or_default().to_string();
                Ok(Node::RegexLit { pattern, flags })
            }
            Token::KeywordFunction => {
                self.advance()?;
                let is_generator = if self.cur() == Token::Mul {
                    self.advance()?;
                    true
                } else {
                    false
                };
                let name = if self.cur() == Token::Ident {
                    let n = self.lex.token_string().to_string();
                    self.advance()?;
                    Some(n)
                } else {
                    None
                };
                let body = self.parse_function_rest(name, is_generator, false)?;
                Ok(Node::FunctionExpr(body))
            }
            Token::LParen => {
                self.advance()?;
                let e = self.with_no_in(false, |s| s.parse_expression())?;
                self.expect(Token::RParen)?;
                Ok(e)
            }
            Token::LBrack => self.parse_array_literal(),
            Token::LBrace => self.parse_object_literal(),
            Token::TemplateLiteral | Token::TemplateFirst => self.parse_template_literal(),
            other => Err(self.err(ErrorKind::SyntaxError, format!("unexpected token {other:?}"))),
        }
    }

    fn parse_array_literal(&mut self) -> PResult<Node> {
        self.advance()?;
        self.with_no_in(false, |s| {
            let mut elements = Vec::new();
            while s.cur() != Token::RBrack {
                if s.cur() == Token::Comma {
                    elements.push(None);
                    s.advance()?;
                    continue;
                }
                if s.cur() == Token::Spread {
                    s.advance()?;
                    let e = s.parse_assignment()?;
                    elements.push(Some(Node::Spread(Box::new(e))));
                } else {
                    elements.push(Some(s.parse_assignment()?));
                }
                if s.cur() == Token::Comma {
                    s.advance()?;
                } else {
                    break;
                }
            }
            s.expect(Token::RBrack)?;
            Ok(Node::ArrayLit(elements))
        })
    }

    fn parse_object_literal(&mut self) -> PResult<Node> {
        self.advance()?;
        self.with_no_in(false, |s| {
            let mut props = Vec::new();
            while s.cur() != Token::RBrace {
                if s.cur() == Token::Spread {
                    s.advance()?;
                    props.push(ObjectProp::Spread(Box::new(s.parse_assignment()?)));
                    if s.cur() == Token::Comma {
                        s.advance()?;
                    }
                    continue;
                }

                if s.cur() == Token::Ident && matches!(s.lex.token_string(), "get" | "set") {
                    let kind = s.lex.token_string().to_string();
                    let sp = s.lex.save_position();
                    s.advance()?;
                    if !matches!(s.cur(), Token::Colon | Token::Comma | Token::RBrace | Token::LParen) {
                        sp.discard(&mut s.lex);
                        let key = s.parse_prop_key_pat()?;
                        let body = s.parse_function_rest(None, false, false)?;
                        props.push(if kind == "get" {
                            ObjectProp::Getter { key, body }
                        } else {
                            ObjectProp::Setter { key, body }
                        });
                        if s.cur() == Token::Comma {
                            s.advance()?;
                        }
                        continue;
                    }
                    sp.restore(&mut s.lex);
                }

                let key = s.parse_prop_key_pat()?;
                let prop = if s.cur() == Token::LParen {
                    let body = s.parse_function_rest(None, false, false)?;
                    ObjectProp::KeyValue { key, value: Node::FunctionExpr(body), shorthand: false }
                } else if s.cur() == Token::Colon {
                    s.advance()?;
                    let value = s.parse_assignment()?;
                    ObjectProp::KeyValue { key, value, shorthand: false }
                } else {
                    let PropKeyPat::Ident(name) = &key else {
                        return Err(s.err(ErrorKind::SyntaxError, "computed key requires ':'"));
                    };
                    ObjectProp::KeyValue { key: key.clone(), value: Node::Ident(name.clone()), shorthand: true }
                };
                props.push(prop);
                if s.cur() == Token::Comma {
                    s.advance()?;
                } else {
                    break;
                }
            }
            s.expect(Token::RBrace)?;
            Ok(Node::ObjectLit(props))
        })
    }

    fn parse_template_literal(&mut self) -> PResult<Node> {
        let mut quasis = vec![self.lex.token_string().to_string()];
        let mut exprs = Vec::new();
        if self.cur() == Token::TemplateLiteral {
            self.advance()?;
            return Ok(Node::TemplateLiteral { quasis, exprs });
        }
        loop {
            self.advance()?;
            let e = self.with_no_in(false, |s| s.parse_expression())?;
            if self.cur() != Token::RBrace {
                return Err(self.err(ErrorKind::SyntaxError, "expected '}' to close template substitution"));
            }
            self.lex.resume_template()?;
            exprs.push(e);
            quasis.push(self.lex.token_string().to_string());
            match self.cur() {
                Token::TemplateMiddle => continue,
                Token::TemplateLast => {
                    self.advance()?;
                    break;
                }
                _ => return Err(self.err(ErrorKind::SyntaxError, "unterminated template literal")),
            }
        }
        Ok(Node::TemplateLiteral { quasis, exprs })
    }
}

fn lookup_keyword_text(t: Token) -> Option<&'static str> {
    Some(match t {
        Token::KeywordVar => "var",
        Token::KeywordLet => "let",
        Token::KeywordConst => "const",
        Token::KeywordFunction => "function",
        Token::KeywordReturn => "return",
        Token::KeywordIf => "if",
        Token::KeywordElse => "else",
        Token::KeywordFor => "for",
        Token::KeywordWhile => "while",
        Token::KeywordDo => "do",
        Token::KeywordBreak => "break",
        Token::KeywordContinue => "continue",
        Token::KeywordTry => "try",
        Token::KeywordCatch => "catch",
        Token::KeywordFinally => "finally",
        Token::KeywordThrow => "throw",
        Token::KeywordNew => "new",
        Token::KeywordDelete => "delete",
        Token::KeywordTypeOf => "typeof",
        Token::KeywordVoid => "void",
        Token::KeywordIn => "in",
        Token::KeywordOf => "of",
        Token::KeywordInstanceOf => "instanceof",
        Token::KeywordThis => "this",
        Token::KeywordNull => "null",
        Token::KeywordTrue => "true",
        Token::KeywordFalse => "false",
        Token::KeywordUndefined => "undefined",
        Token::KeywordSwitch => "switch",
        Token::KeywordCase => "case",
        Token::KeywordDefault => "default",
        Token::KeywordWith => "with",
        Token::KeywordYield => "yield",
        Token::KeywordClass => "class",
        _ => return None,
    })
}

fn assign_op_for(t: Token) -> Option<AssignOp> {
    Some(match t {
        Token::Assign => AssignOp::Assign,
        Token::AddAssign => AssignOp::Add,
        Token::SubAssign => AssignOp::Sub,
        Token::MulAssign => AssignOp::Mul,
        Token::DivAssign => AssignOp::Div,
        Token::ModAssign => AssignOp::Mod,
        Token::PowAssign => AssignOp::Pow,
        Token::ShiftLeftAssign => AssignOp::ShiftLeft,
        Token::ShiftRightAssign => AssignOp::ShiftRight,
        Token::UShiftRightAssign => AssignOp::UShiftRight,
        Token::BAndAssign => AssignOp::BAnd,
        Token::BOrAssign => AssignOp::BOr,
        Token::BXorAssign => AssignOp::BXor,
        Token::AndAssign => AssignOp::And,
        Token::OrAssign => AssignOp::Or,
        Token::NullishAssign => AssignOp::Nullish,
        _ => return None,
    })
}

// ---- hoisting (spec §4.2 "Hoisting", §3.6 `Forwards`) -------------------

/// Builds this statement list's `Forwards` record and prepends it.
/// `recursive_vars` is true for a function/program body (where `var`
/// hoists through nested blocks up to the function boundary) and false
/// for a plain `{ }` block (whose own `var`s were already collected by
/// the nearest enclosing function-or-program body).
fn wrap_with_forwards(stmts: TokenVec, recursive_vars: bool) -> PResult<TokenVec> {
    let mut lets = Vec::new();
    let mut consts = Vec::new();
    let mut functions = Vec::new();
    for s in &stmts {
        match s {
            Node::VarDecl { kind: DeclKind::Let, decls } => {
                for (p, _) in decls {
                    collect_pattern_names(p, &mut lets);
                }
            }
            Node::VarDecl { kind: DeclKind::Const, decls } => {
                for (p, _) in decls {
                    collect_pattern_names(p, &mut consts);
                }
            }
            Node::Function(body) => {
                if let Some(name) = &body.name {
                    functions.push((name.clone(), body.clone()));
                }
            }
            _ => {}
        }
    }
    let mut seen = std::collections::HashSet::new();
    for name in lets.iter().chain(consts.iter()) {
        if !seen.insert(name.clone()) {
            return Err(ParseError {
                kind: ErrorKind::SyntaxError,
                message: format!("identifier '{name}' has already been declared"),
                at: SourceLoc::unknown(),
            });
        }
    }

    let mut vars = Vec::new();
    if recursive_vars {
        collect_vars_recursive(&stmts, &mut vars);
    }

    let mut out = Vec::with_capacity(stmts.len() + 1);
    out.push(Node::Forwards(Forwards { vars, lets, consts, functions }));
    out.extend(stmts);
    Ok(out)
}

/// Pushes `label` onto the `labels` of the `Node::Loop` that `body`
/// is or (through a chain of further labels, e.g. `outer: inner: for
/// (...)`) eventually wraps. A label on anything else (a block, an
/// `if`, a bare expression statement) is a no-op here: only `break`
/// needs to reach those, and `Node::Labeled`'s own evaluation already
/// catches `Completion::Break` for the exact label it carries.
fn attach_label_to_loop(body: &mut Node, label: &str) {
    match body {
        Node::Loop { labels, .. } => labels.push(label.to_string()),
        Node::Labeled { body, .. } => attach_label_to_loop(body, label),
        _ => {}
    }
}

fn collect_pattern_names(p: &Pattern, out: &mut Vec<std::string::String>) {
    match p {
        Pattern::Ident(n) => out.push(n.clone()),
        Pattern::Default(inner, _) => collect_pattern_names(inner, out),
        Pattern::Array { elements, rest } => {
            for e in elements.iter().flatten() {
                collect_pattern_names(e, out);
            }
            if let Some(r) = rest {
                collect_pattern_names(r, out);
            }
        }
        Pattern::Object { props, rest } => {
            for (_, v) in props {
                collect_pattern_names(v, out);
            }
            if let Some(r) = rest {
                collect_pattern_names(r, out);
            }
        }
    }
}

fn collect_vars_recursive(stmts: &TokenVec, out: &mut Vec<std::string::String>) {
    for s in stmts {
        collect_vars_in(s, out);
    }
}

fn collect_vars_in(node: &Node, out: &mut Vec<std::string::String>) {
    match node {
        Node::VarDecl { kind: DeclKind::Var, decls } => {
            for (p, _) in decls {
                collect_pattern_names(p, out);
            }
        }
        Node::Block(stmts) => collect_vars_recursive(stmts, out),
        Node::If { cons, alt, .. } => {
            collect_vars_in(cons, out);
            if let Some(a) = alt {
                collect_vars_in(a, out);
            }
        }
        Node::Loop { init, body, .. } => {
            if let Some(i) = init {
                collect_vars_in(i, out);
            }
            collect_vars_in(body, out);
        }
        Node::Try { block, catch, finally } => {
            collect_vars_recursive(block, out);
            if let Some((_, b)) = catch {
                collect_vars_recursive(b, out);
            }
            if let Some(f) = finally {
                collect_vars_recursive(f, out);
            }
        }
        Node::Switch { cases, .. } => {
            for c in cases {
                collect_vars_recursive(&c.body, out);
            }
        }
        Node::Labeled { body, .. } => collect_vars_in(body, out),
        Node::With { body, .. } => collect_vars_in(body, out),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Program {
        parse_program(src, "t.js").expect("parse failed")
    }

    #[test]
    fn parses_var_decl_and_hoists() {
        let p = parse("var a = 1; a;");
        assert!(matches!(p.body[0], Node::Forwards(_)));
    }

    #[test]
    fn parses_arrow_function_single_param() {
        let p = parse("var f = x => x + 1;");
        // Forwards, then the ExprStmt-wrapped VarDecl.
        assert!(matches!(p.body[1], Node::VarDecl { .. }));
    }

    #[test]
    fn parses_destructuring_array_pattern() {
        let p = parse("var [a, b, ...r] = [1,2,3,4];");
        if let Node::VarDecl { decls, .. } = &p.body[1] {
            assert!(matches!(decls[0].0, Pattern::Array { .. }));
        } else {
            panic!("expected var decl");
        }
    }

    #[test]
    fn rejects_duplicate_let_in_same_scope() {
        let err = parse_program("let x = 1; let x = 2;", "t.js").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SyntaxError);
    }

    #[test]
    fn parses_template_literal_with_substitution() {
        let p = parse("`a${1+1}b`;");
        match &p.body[1] {
            Node::ExprStmt(e) => assert!(matches!(**e, Node::TemplateLiteral { .. })),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_for_of_with_let_binding() {
        let p = parse("for (let x of [1,2,3]) { x; }");
        assert!(matches!(p.body[1], Node::Loop { kind: LoopKind::ForOf, .. }));
    }

    /// A non-declaration for-in over an existing lvalue: `x in obj`
    /// must not be swallowed whole as a `Binary{In}` expression by the
    /// for-head's init-clause parser, or the loop never sees its
    /// `for…in` shape and `)` fails to match.
    #[test]
    fn parses_for_in_over_existing_lvalue() {
        let p = parse("var x; for (x in obj) { x; }");
        assert!(matches!(p.body[2], Node::Loop { kind: LoopKind::ForIn, init: Some(_), .. }));
    }

    /// The "noIn" suppression must not leak into a parenthesized,
    /// bracketed, or braced sub-expression of the for-head's clauses.
    #[test]
    fn for_head_noin_does_not_leak_into_parens_or_brackets() {
        let p = parse("var a, r; for ((a = ('x' in r)); false; ) { }");
        assert!(matches!(p.body[2], Node::Loop { kind: LoopKind::For, .. }));
        let p = parse("var a = {}, r; for (a[0 in r ? 1 : 0] = 1; false; ) { }");
        assert!(matches!(p.body[2], Node::Loop { kind: LoopKind::For, .. }));
    }

    #[test]
    fn parses_try_catch_finally() {
        let p = parse("try { throw 1; } catch (e) { e; } finally { 1; }");
        assert!(matches!(p.body[1], Node::Try { .. }));
    }

    #[test]
    fn labeled_break_parses() {
        let p = parse("outer: for (;;) { break outer; }");
        assert!(matches!(p.body[1], Node::Labeled { .. }));
    }

    #[test]
    fn labeled_continue_attaches_label_to_loop() {
        let p = parse("outer: for (;;) { continue outer; }");
        match &p.body[1] {
            Node::Labeled { label, body } => {
                assert_eq!(label, "outer");
                match &**body {
                    Node::Loop { labels, .. } => assert_eq!(labels, &vec!["outer".to_string()]),
                    other => panic!("expected a loop, got {other:?}"),
                }
            }
            other => panic!("expected a labeled statement, got {other:?}"),
        }
    }

    #[test]
    fn nested_labels_all_attach_to_the_same_loop() {
        let p = parse("outer: inner: for (;;) { continue inner; }");
        match &p.body[1] {
            Node::Labeled { label, body } => {
                assert_eq!(label, "outer");
                match &**body {
                    Node::Labeled { label, body } => {
                        assert_eq!(label, "inner");
                        match &**body {
                            Node::Loop { labels, .. } => assert_eq!(labels, &vec!["outer".to_string(), "inner".to_string()]),
                            other => panic!("expected a loop, got {other:?}"),
                        }
                    }
                    other => panic!("expected a nested labeled statement, got {other:?}"),
                }
            }
            other => panic!("expected a labeled statement, got {other:?}"),
        }
    }
}
