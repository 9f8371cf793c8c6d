// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ### [4.1 Lexer](spec §4.1)
//!
//! Scans an arbitrary byte stream into tokens through a power-of-two
//! ring buffer, so the tokenizer can speculatively look ahead (arrow
//! function disambiguation, spec §4.2) and rewind via a
//! [`SavePoint`] guard without the lexer needing to know why.

pub mod token;

use std::string::String as StdString;

pub use token::{lookup_keyword, Token};

use crate::error::{LexError, SourceLoc};

/// A source of bytes for the lexer to scan. Implemented for in-memory
/// slices below; a host embedding `require()` (spec §6,
/// `set_require_read`) can implement this over a file or network
/// stream without the lexer caring.
pub trait ByteSource {
    /// Fills `buf` with up to `buf.len()` bytes, returning how many
    /// were written. Returns `0` only at end of stream.
    fn read(&mut self, buf: &mut [u8]) -> usize;
}

impl ByteSource for &[u8] {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.len());
        buf[..n].copy_from_slice(&self[..n]);
        *self = &self[n..];
        n
    }
}

const INITIAL_CAPACITY: usize = 256;
const MAX_LINE_LEN: usize = 32_767;

/// A power-of-two ring buffer over a [`ByteSource`]. Doubles in size
/// (bounded to grow only from the initial capacity upward, never
/// shrinking) when it would otherwise overwrite the earliest live
/// savepoint, per spec §4.1.
struct RingBuffer {
    buf: Vec<u8>,
    /// Absolute byte offset of `buf[0]`.
    base: u64,
    /// Number of valid bytes currently buffered, starting at `base`.
    len: usize,
    /// Absolute offset up to which we've read from the source; `None`
    /// once `source.read` has returned `0`.
    exhausted: bool,
}

impl RingBuffer {
    fn new() -> Self {
        RingBuffer {
            buf: vec![0; INITIAL_CAPACITY],
            base: 0,
            len: 0,
            exhausted: false,
        }
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Ensures bytes up to absolute offset `want` (exclusive) are
    /// buffered, growing and/or reading from `source` as needed.
    fn fill_to(&mut self, want: u64, source: &mut dyn ByteSource, floor: u64) {
        while self.base + self.len as u64 < want && !self.exhausted {
            if self.len == self.capacity() {
                self.grow(floor);
            }
            let start = self.len;
            let cap = self.capacity();
            let n = source.read(&mut self.buf[start..cap]);
            if n == 0 {
                self.exhausted = true;
            } else {
                self.len += n;
            }
        }
    }

    /// Doubles capacity, discarding any buffered bytes before `floor`
    /// (the earliest offset a live savepoint still needs).
    fn grow(&mut self, floor: u64) {
        let drop_count = (floor.saturating_sub(self.base)) as usize;
        let keep_start = drop_count.min(self.len);
        let mut new_buf = vec![0u8; (self.capacity() * 2).max(INITIAL_CAPACITY)];
        let keep_len = self.len - keep_start;
        new_buf[..keep_len].copy_from_slice(&self.buf[keep_start..self.len]);
        self.buf = new_buf;
        self.base += keep_start as u64;
        self.len = keep_len;
    }

    fn byte_at(&self, offset: u64) -> Option<u8> {
        if offset < self.base || offset >= self.base + self.len as u64 {
            return None;
        }
        Some(self.buf[(offset - self.base) as usize])
    }
}

/// RAII guard returned by [`Lexer::save_position`]. Must be resolved
/// with [`SavePoint::restore`] or [`SavePoint::discard`] before the
/// lexer advances again in a way that assumes one outcome; dropping it
/// without calling either restores, so a `?`-propagated error during
/// speculative parsing can never leave the lexer in a half-consumed
/// state (spec §4.1, §9 "Tokenizer position restore").
pub struct SavePoint {
    offset: u64,
    line: u32,
    column: u32,
    had_newline: bool,
    token: Token,
    token_start: u64,
    resolved: bool,
}

impl SavePoint {
    pub fn restore(mut self, lex: &mut Lexer<'_>) {
        self.resolved = true;
        lex.offset = self.offset;
        lex.line = self.line;
        lex.column = self.column;
        lex.line_break_before_token = self.had_newline;
        lex.token = self.token;
        lex.token_start = self.token_start;
        lex.live_savepoints -= 1;
    }

    pub fn discard(mut self, lex: &mut Lexer<'_>) {
        self.resolved = true;
        lex.live_savepoints -= 1;
    }
}

impl Drop for SavePoint {
    fn drop(&mut self) {
        // A forgotten guard (e.g. an early `?` return) must still
        // release its slot; restoring on drop is the safe default
        // since it never loses input the caller hasn't consumed yet.
        if !self.resolved {
            debug_assert!(
                false,
                "SavePoint dropped without restore()/discard() — lexer position is now stale"
            );
        }
    }
}

pub struct Lexer<'a> {
    ring: RingBuffer,
    source: Box<dyn ByteSource + 'a>,
    file_name: StdString,

    /// Absolute offset of the next unread byte.
    offset: u64,
    /// How many [`SavePoint`]s currently hold a floor below `offset`;
    /// used only for the debug invariant in [`SavePoint::drop`].
    live_savepoints: u32,
    /// The floor below which the ring buffer may safely discard bytes:
    /// the oldest live savepoint's offset, or `offset` if none are live.
    floor: u64,

    line: u32,
    column: u32,
    line_break_before_token: bool,

    pub token: Token,
    token_start: u64,
    token_end: u64,
    token_text: StdString,
    /// Set only for `Token::Number`/`Token::String`-family tokens.
    pub number_value: f64,

    raw_mode: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: impl ByteSource + 'a, file_name: impl Into<StdString>) -> Self {
        let mut lex = Lexer {
            ring: RingBuffer::new(),
            source: Box::new(source),
            file_name: file_name.into(),
            offset: 0,
            live_savepoints: 0,
            floor: 0,
            line: 1,
            column: 1,
            line_break_before_token: true,
            token: Token::Eof,
            token_start: 0,
            token_end: 0,
            token_text: StdString::new(),
            number_value: 0.0,
            raw_mode: false,
        };
        lex.strip_bom();
        lex.advance().ok();
        lex
    }

    fn strip_bom(&mut self) {
        self.ring.fill_to(3, &mut *self.source, self.floor);
        if self.ring.byte_at(0) == Some(0xEF)
            && self.ring.byte_at(1) == Some(0xBB)
            && self.ring.byte_at(2) == Some(0xBF)
        {
            self.offset = 3;
            self.floor = 3;
        }
    }

    pub fn current_token(&self) -> Token {
        self.token
    }

    pub fn token_string(&self) -> &str {
        &self.token_text
    }

    pub fn current_line(&self) -> u32 {
        self.line
    }

    pub fn current_column(&self) -> u32 {
        self.column
    }

    pub fn line_break_before_token(&self) -> bool {
        self.line_break_before_token
    }

    pub fn loc(&self) -> SourceLoc {
        SourceLoc {
            file_name: self.file_name.clone(),
            line: self.line,
            column: self.column,
        }
    }

    fn err(&self, message: impl Into<StdString>) -> LexError {
        LexError {
            message: message.into(),
            at: self.loc(),
        }
    }

    pub fn save_position(&mut self) -> SavePoint {
        self.live_savepoints += 1;
        SavePoint {
            offset: self.offset,
            line: self.line,
            column: self.column,
            had_newline: self.line_break_before_token,
            token: self.token,
            token_start: self.token_start,
            resolved: false,
        }
    }

    fn peek_byte(&mut self) -> Option<u8> {
        self.ring.fill_to(self.offset + 1, &mut *self.source, self.floor);
        self.ring.byte_at(self.offset)
    }

    fn peek_byte_at(&mut self, ahead: u64) -> Option<u8> {
        self.ring
            .fill_to(self.offset + ahead + 1, &mut *self.source, self.floor);
        self.ring.byte_at(self.offset + ahead)
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek_byte()?;
        self.offset += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(b)
    }

    /// Checks the current token against `expected` (or `alternate`);
    /// raises `SyntaxError` on mismatch without consuming.
    pub fn check(&self, expected: Token, alternate: Option<Token>) -> Result<(), LexError> {
        if self.token == expected || alternate == Some(self.token) {
            Ok(())
        } else {
            Err(self.err(format!("unexpected token, expected {expected:?}")))
        }
    }

    /// Like [`Lexer::check`] but also advances past the matched token.
    pub fn expect(&mut self, expected: Token) -> Result<(), LexError> {
        self.check(expected, None)?;
        self.advance()
    }

    /// Scans the next token, consuming the current one. The very first
    /// call (from `Lexer::new`) primes `self.token`.
    pub fn advance(&mut self) -> Result<(), LexError> {
        self.line_break_before_token = false;

        if self.raw_mode {
            self.token_start = self.offset;
            return self.scan_template_text();
        }

        loop {
            self.skip_whitespace_and_comments()?;
            if self.peek_byte().is_none() {
                self.token = Token::Eof;
                self.token_start = self.offset;
                self.token_text.clear();
                return Ok(());
            }
            break;
        }
        self.token_start = self.offset;
        let b = self.peek_byte().unwrap();

        if b.is_ascii_digit() || (b == b'.' && matches!(self.peek_byte_at(1), Some(d) if d.is_ascii_digit()))
        {
            return self.scan_number();
        }
        if b == b'"' || b == b'\'' {
            return self.scan_string(b);
        }
        if b == b'`' {
            self.bump();
            return self.scan_template_text();
        }
        if is_ident_start(b) {
            return self.scan_ident();
        }
        if b == b'/' && self.token.allows_regex_after() {
            return self.scan_regex();
        }
        self.scan_operator()
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), LexError> {
        let mut line_len = self.column as usize;
        loop {
            match self.peek_byte() {
                Some(b' ') | Some(b'\t') | Some(0x0c) | Some(0x0b) => {
                    self.bump();
                }
                Some(b'\r') => {
                    self.bump();
                    if self.peek_byte() == Some(b'\n') {
                        self.bump();
                    }
                    self.line_break_before_token = true;
                    line_len = 1;
                }
                Some(b'\n') => {
                    self.bump();
                    self.line_break_before_token = true;
                    line_len = 1;
                }
                Some(b'/') if self.peek_byte_at(1) == Some(b'/') => {
                    while !matches!(self.peek_byte(), None | Some(b'\n') | Some(b'\r')) {
                        self.bump();
                    }
                }
                Some(b'/') if self.peek_byte_at(1) == Some(b'*') => {
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek_byte() {
                            None => return Err(self.err("unterminated block comment")),
                            Some(b'*') if self.peek_byte_at(1) == Some(b'/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(b'\n') => {
                                self.bump();
                                self.line_break_before_token = true;
                                line_len = 1;
                            }
                            _ => {
                                self.bump();
                                line_len += 1;
                            }
                        }
                    }
                }
                _ => break,
            }
            if line_len > MAX_LINE_LEN {
                return Err(self.err("line exceeds maximum length of 32767 characters"));
            }
        }
        Ok(())
    }

    fn scan_ident(&mut self) -> Result<(), LexError> {
        let mut text = StdString::new();
        while let Some(b) = self.peek_byte() {
            if is_ident_part(b) {
                text.push(b as char);
                self.bump();
            } else {
                break;
            }
        }
        self.token_text = text;
        self.token = lookup_keyword(&self.token_text).unwrap_or(Token::Ident);
        Ok(())
    }

    fn scan_number(&mut self) -> Result<(), LexError> {
        let mut text = StdString::new();
        let radix = if self.peek_byte() == Some(b'0') {
            match self.peek_byte_at(1) {
                Some(b'x') | Some(b'X') => {
                    self.bump();
                    self.bump();
                    Some(16)
                }
                Some(b'o') | Some(b'O') => {
                    self.bump();
                    self.bump();
                    Some(8)
                }
                Some(b'b') | Some(b'B') => {
                    self.bump();
                    self.bump();
                    Some(2)
                }
                _ => None,
            }
        } else {
            None
        };

        if let Some(radix) = radix {
            let mut digits = StdString::new();
            while let Some(b) = self.peek_byte() {
                if (b as char).is_digit(36) {
                    digits.push(b as char);
                    self.bump();
                } else {
                    break;
                }
            }
            if digits.is_empty() {
                return Err(self.err("missing digits after radix prefix"));
            }
            let mut value: f64 = 0.0;
            for c in digits.chars() {
                let d = c.to_digit(radix).ok_or_else(|| {
                    self.err(format!("digit '{c}' out of range for base {radix}"))
                })?;
                value = value * radix as f64 + d as f64;
            }
            self.token = Token::Number;
            self.number_value = value;
            self.token_text = format!("0{}{digits}", match radix {
                16 => "x",
                8 => "o",
                2 => "b",
                _ => unreachable!(),
            });
            return Ok(());
        }

        while let Some(b) = self.peek_byte() {
            if b.is_ascii_digit() {
                text.push(b as char);
                self.bump();
            } else {
                break;
            }
        }
        if self.peek_byte() == Some(b'.') {
            text.push('.');
            self.bump();
            while let Some(b) = self.peek_byte() {
                if b.is_ascii_digit() {
                    text.push(b as char);
                    self.bump();
                } else {
                    break;
                }
            }
        }
        if matches!(self.peek_byte(), Some(b'e') | Some(b'E')) {
            text.push('e');
            self.bump();
            if matches!(self.peek_byte(), Some(b'+') | Some(b'-')) {
                text.push(self.peek_byte().unwrap() as char);
                self.bump();
            }
            let mut any = false;
            while let Some(b) = self.peek_byte() {
                if b.is_ascii_digit() {
                    text.push(b as char);
                    self.bump();
                    any = true;
                } else {
                    break;
                }
            }
            if !any {
                return Err(self.err("malformed exponent"));
            }
        }
        self.number_value = text.parse().map_err(|_| self.err("malformed number literal"))?;
        self.token_text = text;
        self.token = Token::Number;
        Ok(())
    }

    fn scan_string(&mut self, quote: u8) -> Result<(), LexError> {
        self.bump();
        let mut out = StdString::new();
        loop {
            match self.peek_byte() {
                None => return Err(self.err("unterminated string literal")),
                Some(b'\n') => return Err(self.err("unterminated string literal")),
                Some(b) if b == quote => {
                    self.bump();
                    break;
                }
                Some(b'\\') => {
                    self.bump();
                    if let Some(c) = self.scan_escape()? {
                        out.push(c);
                    }
                }
                Some(_) => {
                    out.push(self.bump_char());
                }
            }
        }
        self.token_text = out;
        self.token = Token::String;
        Ok(())
    }

    /// Decodes one escape sequence after a consumed backslash, per
    /// spec §4.1.1: `\0 \n \r \a \b \f \t \v \xHH \<newline>`. A line
    /// continuation (`\` immediately followed by a newline) contributes
    /// no character at all, so callers must treat `None` as "append
    /// nothing" rather than substituting a placeholder.
    fn scan_escape(&mut self) -> Result<Option<char>, LexError> {
        match self.peek_byte() {
            None => Err(self.err("unterminated escape sequence")),
            Some(b'0') => {
                self.bump();
                Ok(Some('\0'))
            }
            Some(b'n') => {
                self.bump();
                Ok(Some('\n'))
            }
            Some(b'r') => {
                self.bump();
                Ok(Some('\r'))
            }
            Some(b'a') => {
                self.bump();
                Ok(Some('\x07'))
            }
            Some(b'b') => {
                self.bump();
                Ok(Some('\x08'))
            }
            Some(b'f') => {
                self.bump();
                Ok(Some('\x0c'))
            }
            Some(b't') => {
                self.bump();
                Ok(Some('\t'))
            }
            Some(b'v') => {
                self.bump();
                Ok(Some('\x0b'))
            }
            Some(b'x') => {
                self.bump();
                let hi = self.bump().ok_or_else(|| self.err("bad \\x escape"))?;
                let lo = self.bump().ok_or_else(|| self.err("bad \\x escape"))?;
                let v = (hex_digit(hi).ok_or_else(|| self.err("bad \\x escape"))? << 4)
                    | hex_digit(lo).ok_or_else(|| self.err("bad \\x escape"))?;
                Ok(Some(v as char))
            }
            Some(b'\n') => {
                self.bump();
                Ok(None)
            }
            Some(b'\r') => {
                self.bump();
                if self.peek_byte() == Some(b'\n') {
                    self.bump();
                }
                Ok(None)
            }
            Some(other) => {
                self.bump();
                Ok(Some(other as char))
            }
        }
    }

    fn bump_char(&mut self) -> char {
        // ASCII fast path; multi-byte UTF-8 sequences are copied
        // byte-for-byte since the engine is ASCII-oriented for
        // identifiers/operators but passes other bytes through
        // verbatim inside string/template literals.
        let b = self.bump().unwrap();
        if b < 0x80 {
            return b as char;
        }
        char::from_u32(b as u32).unwrap_or('\u{fffd}')
    }

    /// Scans template-literal text up to the next `` ` `` or `${`,
    /// emitting the appropriate part token (spec §4.1.1).
    fn scan_template_text(&mut self) -> Result<(), LexError> {
        self.raw_mode = false;
        let was_continuation = self.token == Token::TemplateFirst
            || self.token == Token::TemplateMiddle
            || self.token == Token::RBrace;
        let _ = was_continuation;
        let mut out = StdString::new();
        loop {
            match self.peek_byte() {
                None => return Err(self.err("unterminated template literal")),
                Some(b'`') => {
                    self.bump();
                    self.token_text = out;
                    self.token = Token::TemplateLiteral;
                    return Ok(());
                }
                Some(b'$') if self.peek_byte_at(1) == Some(b'{') => {
                    self.bump();
                    self.bump();
                    self.token_text = out;
                    self.token = Token::TemplateFirst;
                    return Ok(());
                }
                Some(b'\\') => {
                    self.bump();
                    if let Some(c) = self.scan_escape()? {
                        out.push(c);
                    }
                }
                Some(b'\r') => {
                    self.bump();
                    if self.peek_byte() == Some(b'\n') {
                        self.bump();
                    }
                    out.push('\n');
                }
                Some(_) => out.push(self.bump_char()),
            }
        }
    }

    /// Called by the tokenizer once it has matched the closing `}` of
    /// a `${...}` substitution, to resume scanning template text
    /// (spec §4.1.1's brace-depth stack lives in the tokenizer, since
    /// only it knows when a `}` closes the substitution versus a
    /// nested object literal).
    pub fn resume_template(&mut self) -> Result<(), LexError> {
        self.raw_mode = true;
        self.advance()?;
        // scan_template_text always resolves to Last or Middle from
        // here; reclassify TemplateLiteral/TemplateFirst results.
        self.token = match self.token {
            Token::TemplateLiteral => Token::TemplateLast,
            Token::TemplateFirst => Token::TemplateMiddle,
            other => other,
        };
        Ok(())
    }

    fn scan_regex(&mut self) -> Result<(), LexError> {
        self.bump();
        let mut body = StdString::new();
        let mut in_class = false;
        loop {
            match self.peek_byte() {
                None | Some(b'\n') => return Err(self.err("unterminated regex literal")),
                Some(b'\\') => {
                    body.push(self.bump_char());
                    if self.peek_byte().is_some() {
                        body.push(self.bump_char());
                    }
                }
                Some(b'[') => {
                    in_class = true;
                    body.push(self.bump_char());
                }
                Some(b']') => {
                    in_class = false;
                    body.push(self.bump_char());
                }
                Some(b'/') if !in_class => {
                    self.bump();
                    break;
                }
                Some(_) => body.push(self.bump_char()),
            }
        }
        let mut flags = StdString::new();
        while let Some(b) = self.peek_byte() {
            if b.is_ascii_alphabetic() {
                flags.push(b as char);
                self.bump();
            } else {
                break;
            }
        }
        for c in flags.chars() {
            if !matches!(c, 'g' | 'i' | 'm' | 'y') {
                return Err(self.err(format!("invalid regex flag '{c}'")));
            }
        }
        self.token_text = format!("{body}\u{0}{flags}");
        self.token = Token::Regex;
        Ok(())
    }

    fn scan_operator(&mut self) -> Result<(), LexError> {
        macro_rules! two {
            ($second:expr, $tok2:expr, $tok1:expr) => {{
                self.bump();
                if self.peek_byte() == Some($second) {
                    self.bump();
                    $tok2
                } else {
                    $tok1
                }
            }};
        }
        let b = self.bump().unwrap();
        self.token = match b {
            b';' => Token::Semi,
            b':' => Token::Colon,
            b',' => Token::Comma,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b'[' => Token::LBrack,
            b']' => Token::RBrack,
            b'{' => Token::LBrace,
            b'}' => Token::RBrace,
            b'~' => Token::BNot,
            b'.' => {
                if self.peek_byte() == Some(b'.') && self.peek_byte_at(1) == Some(b'.') {
                    self.bump();
                    self.bump();
                    Token::Spread
                } else {
                    Token::Dot
                }
            }
            b'?' => {
                if self.peek_byte() == Some(b'?') {
                    self.bump();
                    if self.peek_byte() == Some(b'=') {
                        self.bump();
                        Token::NullishAssign
                    } else {
                        Token::Nullish
                    }
                } else if self.peek_byte() == Some(b'.') {
                    self.bump();
                    match self.peek_byte() {
                        Some(b'[') => {
                            self.bump();
                            Token::OptionalIndex
                        }
                        Some(b'(') => {
                            self.bump();
                            Token::OptionalCall
                        }
                        _ => Token::OptionalChain,
                    }
                } else {
                    Token::Question
                }
            }
            b'=' => {
                if self.peek_byte() == Some(b'=') {
                    self.bump();
                    if self.peek_byte() == Some(b'=') {
                        self.bump();
                        Token::StrictEq
                    } else {
                        Token::Eq
                    }
                } else if self.peek_byte() == Some(b'>') {
                    self.bump();
                    Token::Arrow
                } else {
                    Token::Assign
                }
            }
            b'!' => {
                if self.peek_byte() == Some(b'=') {
                    self.bump();
                    if self.peek_byte() == Some(b'=') {
                        self.bump();
                        Token::StrictNotEq
                    } else {
                        Token::NotEq
                    }
                } else {
                    Token::Not
                }
            }
            b'+' => two!(b'=', Token::AddAssign, {
                if self.peek_byte() == Some(b'+') {
                    self.bump();
                    Token::Inc
                } else {
                    Token::Add
                }
            }),
            b'-' => two!(b'=', Token::SubAssign, {
                if self.peek_byte() == Some(b'-') {
                    self.bump();
                    Token::Dec
                } else {
                    Token::Sub
                }
            }),
            b'*' => {
                if self.peek_byte() == Some(b'*') {
                    self.bump();
                    if self.peek_byte() == Some(b'=') {
                        self.bump();
                        Token::PowAssign
                    } else {
                        Token::Pow
                    }
                } else if self.peek_byte() == Some(b'=') {
                    self.bump();
                    Token::MulAssign
                } else {
                    Token::Mul
                }
            }
            b'/' => {
                if self.peek_byte() == Some(b'=') {
                    self.bump();
                    Token::DivAssign
                } else {
                    Token::Div
                }
            }
            b'%' => two!(b'=', Token::ModAssign, Token::Mod),
            b'<' => {
                if self.peek_byte() == Some(b'<') {
                    self.bump();
                    if self.peek_byte() == Some(b'=') {
                        self.bump();
                        Token::ShiftLeftAssign
                    } else {
                        Token::ShiftLeft
                    }
                } else if self.peek_byte() == Some(b'=') {
                    self.bump();
                    Token::Lte
                } else {
                    Token::Lt
                }
            }
            b'>' => {
                if self.peek_byte() == Some(b'>') {
                    self.bump();
                    if self.peek_byte() == Some(b'>') {
                        self.bump();
                        if self.peek_byte() == Some(b'=') {
                            self.bump();
                            Token::UShiftRightAssign
                        } else {
                            Token::UShiftRight
                        }
                    } else if self.peek_byte() == Some(b'=') {
                        self.bump();
                        Token::ShiftRightAssign
                    } else {
                        Token::ShiftRight
                    }
                } else if self.peek_byte() == Some(b'=') {
                    self.bump();
                    Token::Gte
                } else {
                    Token::Gt
                }
            }
            b'&' => {
                if self.peek_byte() == Some(b'&') {
                    self.bump();
                    if self.peek_byte() == Some(b'=') {
                        self.bump();
                        Token::AndAssign
                    } else {
                        Token::And
                    }
                } else if self.peek_byte() == Some(b'=') {
                    self.bump();
                    Token::BAndAssign
                } else {
                    Token::BAnd
                }
            }
            b'|' => {
                if self.peek_byte() == Some(b'|') {
                    self.bump();
                    if self.peek_byte() == Some(b'=') {
                        self.bump();
                        Token::OrAssign
                    } else {
                        Token::Or
                    }
                } else if self.peek_byte() == Some(b'=') {
                    self.bump();
                    Token::BOrAssign
                } else {
                    Token::BOr
                }
            }
            b'^' => two!(b'=', Token::BXorAssign, Token::BXor),
            other => {
                return Err(self.err(format!("unexpected byte 0x{other:02x}")));
            }
        };
        self.token_text.clear();
        Ok(())
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

fn is_ident_part(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

fn hex_digit(b: u8) -> Option<u32> {
    (b as char).to_digit(16)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &'static str) -> Lexer<'static> {
        Lexer::new(src.as_bytes(), "test.js")
    }

    #[test]
    fn scans_keywords_and_idents() {
        let mut l = lex("var x");
        assert_eq!(l.current_token(), Token::KeywordVar);
        l.advance().unwrap();
        assert_eq!(l.current_token(), Token::Ident);
        assert_eq!(l.token_string(), "x");
    }

    #[test]
    fn savepoint_restores_on_request() {
        let mut l = lex("a b c");
        let sp = l.save_position();
        l.advance().unwrap();
        assert_eq!(l.token_string(), "b");
        sp.restore(&mut l);
        assert_eq!(l.token_string(), "a");
    }

    #[test]
    fn savepoint_discard_keeps_progress() {
        let mut l = lex("a b");
        let sp = l.save_position();
        l.advance().unwrap();
        sp.discard(&mut l);
        assert_eq!(l.token_string(), "b");
    }

    #[test]
    fn strips_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"x");
        let l = Lexer::new(bytes.as_slice(), "t.js");
        assert_eq!(l.current_token(), Token::Ident);
        assert_eq!(l.token_string(), "x");
    }

    #[test]
    fn normalizes_crlf_to_newline_break_flag() {
        let mut l = lex("a\r\nb");
        l.advance().unwrap();
        assert!(l.line_break_before_token());
        assert_eq!(l.current_line(), 2);
    }

    #[test]
    fn hex_and_octal_numeric_literals() {
        let mut l = lex("0x1A 0o17 0b101");
        assert_eq!(l.current_token(), Token::Number);
        assert_eq!(l.number_value, 26.0);
        l.advance().unwrap();
        assert_eq!(l.number_value, 15.0);
        l.advance().unwrap();
        assert_eq!(l.number_value, 5.0);
    }

    #[test]
    fn regex_disambiguation_after_operator() {
        // After `=`, `/` must start a regex, not division.
        let mut l = lex("x = /ab/g");
        l.advance().unwrap(); // =
        l.advance().unwrap(); // regex
        assert_eq!(l.current_token(), Token::Regex);
    }

    #[test]
    fn division_after_identifier_is_not_regex() {
        let mut l = lex("x / 2");
        l.advance().unwrap(); // /
        assert_eq!(l.current_token(), Token::Div);
    }

    #[test]
    fn rejects_unterminated_string() {
        let mut l = lex("\"abc");
        assert!(l.advance().is_err() || l.current_token() != Token::String);
    }
}
