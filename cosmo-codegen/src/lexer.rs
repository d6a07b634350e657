//! Expression tokenizer
//!
//! Splits a free-form potential expression into tokens that the transformer
//! and the parameter resolver can rewrite without regex placeholder tricks.
//! Every token borrows its exact source text, so concatenating the `text()`
//! of all tokens reproduces the input byte for byte.

/// Exponent marker carried by a numeric literal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exponent {
    /// `d`/`D`: already double precision
    Double,
    /// `e`/`E`: single precision in fixed-form source
    Single,
}

/// A standalone numeric literal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberLit<'a> {
    pub text: &'a str,
    pub has_point: bool,
    pub exponent: Option<Exponent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// Field-array access with a literal index, e.g. `x(1)` or `X( 2 )`
    FieldRef(&'a str),
    Number(NumberLit<'a>),
    Ident(&'a str),
    /// Digits glued to identifier characters, e.g. `2m`; never rewritten
    Word(&'a str),
    Space(&'a str),
    /// Any other single character: operators, parentheses, commas
    Symbol(&'a str),
}

impl<'a> Token<'a> {
    pub fn text(&self) -> &'a str {
        match self {
            Token::FieldRef(t)
            | Token::Ident(t)
            | Token::Word(t)
            | Token::Space(t)
            | Token::Symbol(t) => t,
            Token::Number(n) => n.text,
        }
    }

    pub fn is_symbol(&self, s: &str) -> bool {
        matches!(self, Token::Symbol(t) if *t == s)
    }

    pub fn is_ident(&self, name: &str) -> bool {
        matches!(self, Token::Ident(t) if t.eq_ignore_ascii_case(name))
    }
}

/// Name of the 1-indexed field array in generated source
pub const FIELD_ARRAY: &str = "x";

pub fn tokenize(src: &str) -> Vec<Token<'_>> {
    Lexer { src, pos: 0 }.collect()
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

impl<'a> Lexer<'a> {
    fn scan_while(&self, mut i: usize, pred: impl Fn(u8) -> bool) -> usize {
        let bytes = self.src.as_bytes();
        while i < bytes.len() && pred(bytes[i]) {
            i += 1;
        }
        i
    }

    /// End of `(<blanks><digits><blanks>)` starting at `i`, if present
    fn field_index_end(&self, i: usize) -> Option<usize> {
        let bytes = self.src.as_bytes();
        if bytes.get(i) != Some(&b'(') {
            return None;
        }
        let blank = |b: u8| b == b' ' || b == b'\t';
        let digits_start = self.scan_while(i + 1, blank);
        let digits_end = self.scan_while(digits_start, |b| b.is_ascii_digit());
        if digits_end == digits_start {
            return None;
        }
        let close = self.scan_while(digits_end, blank);
        (bytes.get(close) == Some(&b')')).then_some(close + 1)
    }

    fn lex_identifier(&mut self, start: usize) -> Token<'a> {
        let end = self.scan_while(start, is_ident_char);
        let word = &self.src[start..end];

        if word.eq_ignore_ascii_case(FIELD_ARRAY) {
            if let Some(ref_end) = self.field_index_end(end) {
                self.pos = ref_end;
                return Token::FieldRef(&self.src[start..ref_end]);
            }
        }

        self.pos = end;
        Token::Ident(word)
    }

    fn lex_number(&mut self, start: usize) -> Token<'a> {
        let bytes = self.src.as_bytes();
        let mut i = self.scan_while(start, |b| b.is_ascii_digit());

        let mut has_point = false;
        if bytes.get(i) == Some(&b'.') {
            has_point = true;
            i = self.scan_while(i + 1, |b| b.is_ascii_digit());
        }

        let mut exponent = None;
        if let Some(&marker) = bytes.get(i) {
            let kind = match marker {
                b'd' | b'D' => Some(Exponent::Double),
                b'e' | b'E' => Some(Exponent::Single),
                _ => None,
            };
            if let Some(kind) = kind {
                let mut k = i + 1;
                if matches!(bytes.get(k), Some(b'+') | Some(b'-')) {
                    k += 1;
                }
                let digits_end = self.scan_while(k, |b| b.is_ascii_digit());
                if digits_end > k {
                    exponent = Some(kind);
                    i = digits_end;
                }
            }
        }

        // Digits running into identifier characters are not a literal
        if bytes.get(i).is_some_and(|&b| is_ident_char(b)) {
            let end = self.scan_while(i, is_ident_char);
            self.pos = end;
            return Token::Word(&self.src[start..end]);
        }

        self.pos = i;
        Token::Number(NumberLit {
            text: &self.src[start..i],
            has_point,
            exponent,
        })
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let bytes = self.src.as_bytes();
        let start = self.pos;
        let &b = bytes.get(start)?;

        if b.is_ascii_whitespace() {
            let end = self.scan_while(start, |b| b.is_ascii_whitespace());
            self.pos = end;
            return Some(Token::Space(&self.src[start..end]));
        }

        if is_ident_start(b) {
            return Some(self.lex_identifier(start));
        }

        let leading_point = b == b'.' && bytes.get(start + 1).is_some_and(u8::is_ascii_digit);
        if b.is_ascii_digit() || leading_point {
            return Some(self.lex_number(start));
        }

        let width = self.src[start..].chars().next().map_or(1, char::len_utf8);
        self.pos = start + width;
        Some(Token::Symbol(&self.src[start..start + width]))
    }
}
