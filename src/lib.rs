extern crate bigdecimal;
extern crate fallible_iterator;
#[macro_use]
extern crate gc;
#[macro_use]
extern crate log;
extern crate num_bigint;
extern crate num_traits;

#[macro_use]
mod helpers;

pub mod lexer;
pub mod reader;
pub mod syntax;
pub mod compiler;
pub mod vm;
pub mod interpreter;
