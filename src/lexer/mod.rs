//! The tokenizer. Delimiters and quotation shorthands come out as plain
//! tokens; atoms (numbers, strings, booleans, symbols) come out as
//! finished values.

use std::fmt;
use std::iter::Peekable;

use fallible_iterator::FallibleIterator;
use num_bigint::BigInt;

use vm::{Number, Value};

#[cfg(test)]
mod test;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Open,
    Close,
    OpenVector,
    Quote,
    Quasiquote,
    Unquote,
    UnquoteSplicing,
    DatumComment,
    Datum(Value),
}

impl fmt::Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Token::Open => fmt.write_str("("),
            Token::Close => fmt.write_str(")"),
            Token::OpenVector => fmt.write_str("#("),
            Token::Quote => fmt.write_str("'"),
            Token::Quasiquote => fmt.write_str("`"),
            Token::Unquote => fmt.write_str(","),
            Token::UnquoteSplicing => fmt.write_str(",@"),
            Token::DatumComment => fmt.write_str("#;"),
            Token::Datum(ref value) => write!(fmt, "{}", value),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum LexError {
    InvalidNumber(String),
    NonFiniteNumber(String),
    InvalidRadix(char),
    InvalidExactness(char),
    InvalidPound(char),
    InvalidEscape(char),
    InvalidHexEscape,
    UnterminatedString,
    UnterminatedComment,
    UnterminatedContinuation,
    CharacterLiteral,
    PipedSymbol,
    UnexpectedCharacter(char),
}

impl fmt::Display for LexError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            LexError::InvalidNumber(ref text) => {
                write!(fmt, "invalid number literal '{}'", text)
            }
            LexError::NonFiniteNumber(ref text) => {
                write!(fmt, "number literal '{}' is not representable", text)
            }
            LexError::InvalidRadix(c) => write!(fmt, "invalid radix #{}", c),
            LexError::InvalidExactness(c) => write!(fmt, "invalid exactness #{}", c),
            LexError::InvalidPound(c) => write!(fmt, "unexpected token #{}", c),
            LexError::InvalidEscape(c) => write!(fmt, "invalid escape sequence '\\{}'", c),
            LexError::InvalidHexEscape => fmt.write_str("invalid hex escape"),
            LexError::UnterminatedString => fmt.write_str("unterminated string"),
            LexError::UnterminatedComment => fmt.write_str("unterminated block comment"),
            LexError::UnterminatedContinuation => {
                fmt.write_str("unterminated line continuation")
            }
            LexError::CharacterLiteral => fmt.write_str("character literals are not supported"),
            LexError::PipedSymbol => fmt.write_str("|...| symbols are not supported"),
            LexError::UnexpectedCharacter(c) => write!(fmt, "unexpected character '{}'", c),
        }
    }
}

impl ::std::error::Error for LexError {}

pub struct Lexer<I: Iterator<Item = char>> {
    chars: Peekable<I>,
}

impl<I: Iterator<Item = char>> Lexer<I> {
    pub fn new(chars: I) -> Lexer<I> {
        Lexer {
            chars: chars.peekable(),
        }
    }

    fn read(&mut self) -> Option<char> {
        self.chars.next()
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().cloned()
    }

    fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        loop {
            let c = match self.read() {
                Some(c) => c,
                None => return Ok(None),
            };

            match c {
                '(' => return Ok(Some(Token::Open)),
                ')' => return Ok(Some(Token::Close)),
                '\'' => return Ok(Some(Token::Quote)),
                '`' => return Ok(Some(Token::Quasiquote)),
                ',' => {
                    if self.peek() == Some('@') {
                        self.read();
                        return Ok(Some(Token::UnquoteSplicing));
                    }
                    return Ok(Some(Token::Unquote));
                }
                '"' => return self.string().map(Some),
                ';' => {
                    while let Some(c) = self.read() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                '#' => {
                    let k = match self.read() {
                        Some(k) => k,
                        None => return Err(LexError::UnexpectedCharacter('#')),
                    };
                    match k {
                        'b' => return self.number_prefix(2).map(Some),
                        'o' => return self.number_prefix(8).map(Some),
                        'd' => return self.number_prefix(10).map(Some),
                        'x' => return self.number_prefix(16).map(Some),
                        'i' | 'e' => return self.number_prefix(0).map(Some),
                        't' => return Ok(Some(Token::Datum(Value::Boolean(true)))),
                        'f' => return Ok(Some(Token::Datum(Value::Boolean(false)))),
                        '\\' => return Err(LexError::CharacterLiteral),
                        '(' => return Ok(Some(Token::OpenVector)),
                        ';' => return Ok(Some(Token::DatumComment)),
                        '!' => {
                            // directive, consumed and ignored
                            while let Some(c) = self.peek() {
                                if continues_identifier(c) {
                                    self.read();
                                } else {
                                    break;
                                }
                            }
                        }
                        '|' => self.block_comment()?,
                        other => return Err(LexError::InvalidPound(other)),
                    }
                }
                '-' | '+' | '.' => return self.number(c, 10, true).map(Some),
                '0'..='9' => return self.number(c, 10, false).map(Some),
                '|' => return Err(LexError::PipedSymbol),
                c if is_space(c) => {}
                c if begins_identifier(c) => return Ok(Some(Token::Datum(self.identifier(c)))),
                c => return Err(LexError::UnexpectedCharacter(c)),
            }
        }
    }

    fn number_prefix(&mut self, mut radix: u32) -> Result<Token, LexError> {
        let mut c = self
            .read()
            .ok_or_else(|| LexError::InvalidNumber(String::new()))?;

        if c == '#' {
            let k = self
                .read()
                .ok_or_else(|| LexError::InvalidNumber(String::new()))?;
            if radix == 0 {
                radix = match k {
                    'b' => 2,
                    'o' => 8,
                    'd' => 10,
                    'x' => 16,
                    _ => return Err(LexError::InvalidRadix(k)),
                };
            } else {
                match k {
                    'i' | 'e' => {}
                    _ => return Err(LexError::InvalidExactness(k)),
                }
            }
            c = self
                .read()
                .ok_or_else(|| LexError::InvalidNumber(String::new()))?;
        }

        if radix == 0 {
            radix = 10;
        }
        self.number(c, radix, false)
    }

    fn number(
        &mut self,
        first: char,
        radix: u32,
        maybe_identifier: bool,
    ) -> Result<Token, LexError> {
        let mut text = String::new();
        text.push(first);
        while let Some(c) = self.peek() {
            if continues_identifier(c) {
                self.read();
                text.push(c);
            } else {
                break;
            }
        }

        match parse_number(&text, radix) {
            NumberParse::Number(n) => Ok(Token::Datum(Value::Number(n))),
            NumberParse::NonFinite => Err(LexError::NonFiniteNumber(text)),
            NumberParse::Invalid => {
                if maybe_identifier {
                    Ok(Token::Datum(Value::Symbol(text.into())))
                } else {
                    Err(LexError::InvalidNumber(text))
                }
            }
        }
    }

    fn string(&mut self) -> Result<Token, LexError> {
        let mut s = String::new();
        loop {
            let c = self.read().ok_or(LexError::UnterminatedString)?;
            match c {
                '"' => return Ok(Token::Datum(Value::String(s.into()))),
                '\\' => {
                    let k = self.read().ok_or(LexError::UnterminatedString)?;
                    match k {
                        '\\' | '"' => s.push(k),
                        'a' => s.push('\u{7}'),
                        'b' => s.push('\u{8}'),
                        't' => s.push('\t'),
                        'n' => s.push('\n'),
                        'r' => s.push('\r'),
                        ' ' | '\t' | '\n' => {
                            // line continuation: whitespace to the newline,
                            // then past the next line's leading whitespace
                            let mut k = k;
                            while k != '\n' {
                                k = self.read().ok_or(LexError::UnterminatedString)?;
                                if k != ' ' && k != '\t' && k != '\n' {
                                    return Err(LexError::UnterminatedContinuation);
                                }
                            }
                            while let Some(next) = self.peek() {
                                if next == ' ' || next == '\t' {
                                    self.read();
                                } else {
                                    break;
                                }
                            }
                        }
                        'x' => {
                            let mut code: u32 = 0;
                            loop {
                                let d = self.read().ok_or(LexError::UnterminatedString)?;
                                if d == ';' {
                                    break;
                                }
                                let digit = d.to_digit(16).ok_or(LexError::InvalidHexEscape)?;
                                code = code
                                    .checked_mul(16)
                                    .and_then(|code| code.checked_add(digit))
                                    .ok_or(LexError::InvalidHexEscape)?;
                            }
                            s.push(::std::char::from_u32(code).ok_or(LexError::InvalidHexEscape)?);
                        }
                        other => return Err(LexError::InvalidEscape(other)),
                    }
                }
                c => s.push(c),
            }
        }
    }

    fn block_comment(&mut self) -> Result<(), LexError> {
        let mut nest = 1;
        while nest > 0 {
            let c = self.read().ok_or(LexError::UnterminatedComment)?;
            match c {
                '#' => {
                    if self.peek() == Some('|') {
                        self.read();
                        nest += 1;
                    }
                }
                '|' => {
                    if self.peek() == Some('#') {
                        self.read();
                        nest -= 1;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn identifier(&mut self, first: char) -> Value {
        let mut id = String::new();
        id.push(first);
        while let Some(c) = self.peek() {
            if continues_identifier(c) {
                self.read();
                id.push(c);
            } else {
                break;
            }
        }
        Value::Symbol(id.into())
    }
}

impl<I: Iterator<Item = char>> FallibleIterator for Lexer<I> {
    type Item = Token;
    type Error = LexError;

    fn next(&mut self) -> Result<Option<Token>, LexError> {
        self.next_token()
    }
}

enum NumberParse {
    Number(Number),
    NonFinite,
    Invalid,
}

fn parse_number(text: &str, radix: u32) -> NumberParse {
    match text {
        // decimal big-floats have no infinities or NaN
        "+inf.0" | "-inf.0" | "+nan.0" | "-nan.0" => return NumberParse::NonFinite,
        _ => {}
    }

    if let Some(slash) = text.find('/') {
        let numerator = parse_radix_int(&text[..slash], radix);
        let denominator = parse_radix_int(&text[slash + 1..], radix);
        if let (Some(n), Some(d)) = (numerator, denominator) {
            return match Number::from_ratio(n, d) {
                Some(number) => NumberParse::Number(number),
                None => NumberParse::Invalid,
            };
        }
        return NumberParse::Invalid;
    }

    if radix == 10 {
        match Number::parse_decimal(text) {
            Some(number) => NumberParse::Number(number),
            None => NumberParse::Invalid,
        }
    } else {
        match parse_radix_int(text, radix) {
            Some(n) => NumberParse::Number(Number::from_bigint(n)),
            None => NumberParse::Invalid,
        }
    }
}

fn parse_radix_int(text: &str, radix: u32) -> Option<BigInt> {
    if text.is_empty() {
        return None;
    }
    BigInt::parse_bytes(text.as_bytes(), radix)
}

fn is_space(c: char) -> bool {
    c == ' ' || c == '\t' || c == '\n' || c == '\r'
}

const SPECIAL_INITIAL: &str = "!$%&*/:<=>?^_~";

fn begins_identifier(c: char) -> bool {
    c.is_alphabetic()
        || SPECIAL_INITIAL.contains(c)
        || (!c.is_ascii() && !c.is_whitespace() && !c.is_control())
}

fn continues_identifier(c: char) -> bool {
    c.is_ascii_digit() || c == '+' || c == '-' || c == '.' || c == '@' || begins_identifier(c)
}
