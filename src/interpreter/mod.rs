use std::collections::VecDeque;
use std::fmt;

use fallible_iterator::FallibleIterator;

use compiler::{compile_body, CompilerError};
use lexer::{LexError, Lexer, Token};
use reader::{parse_datum, ParseError};
use vm::{exec, ExecutionError, GcShared, Scope, Value};


#[derive(Debug, PartialEq)]
pub enum InterpreterError {
    Lex(LexError),
    Parse(ParseError),
    Compile(CompilerError),
    Exec(ExecutionError),
}

impl fmt::Display for InterpreterError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            InterpreterError::Lex(ref error) => write!(fmt, "{}", error),
            InterpreterError::Parse(ref error) => write!(fmt, "{}", error),
            InterpreterError::Compile(ref error) => write!(fmt, "{}", error),
            InterpreterError::Exec(ref error) => write!(fmt, "{}", error),
        }
    }
}

impl ::std::error::Error for InterpreterError {}

/// Tokenizes the source, then reads, compiles and executes one datum at a
/// time against the environment, yielding the last datum's value. A
/// program with no datums evaluates to Null.
pub fn interpret(code: &str, environment: &GcShared<Scope>) -> Result<Value, InterpreterError> {
    let tokens: Vec<Token> = Lexer::new(code.chars())
        .collect()
        .map_err(InterpreterError::Lex)?;
    let mut tokens: VecDeque<Token> = tokens.into();

    let mut value = Value::Null;
    loop {
        let datum = match parse_datum(&mut tokens).map_err(InterpreterError::Parse)? {
            Some(datum) => datum,
            None => return Ok(value),
        };

        let bytecode =
            compile_body(&[datum], environment).map_err(InterpreterError::Compile)?;
        debug!("compiled: {:?}", bytecode);

        value = exec(bytecode, environment).map_err(InterpreterError::Exec)?;
    }
}
