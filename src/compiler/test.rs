use std::collections::VecDeque;

use fallible_iterator::FallibleIterator;

use lexer::{Lexer, Token};
use reader::parse_datum;
use vm::{default_env, Value};
use super::{compile_body, parse_formals, CompilerError, Instruction};

fn parse(source: &str) -> Value {
    let tokens: Vec<Token> = Lexer::new(source.chars()).collect().expect("tokenizes");
    let mut tokens: VecDeque<Token> = tokens.into();
    parse_datum(&mut tokens).expect("parses").expect("datum")
}

fn compile(source: &str) -> Result<Vec<Instruction>, CompilerError> {
    compile_body(&[parse(source)], &default_env())
}

#[test]
fn literals_compile_to_quote() {
    let code = compile("42").unwrap();
    assert_eq!(code.len(), 2);
    match code[0] {
        Instruction::Quote(ref value) => assert_eq!(value.to_string(), "42"),
        ref other => panic!("expected Quote, got {:?}", other),
    }
    match code[1] {
        Instruction::Return => {}
        ref other => panic!("expected Return, got {:?}", other),
    }
}

#[test]
fn symbols_compile_to_get() {
    let code = compile("x").unwrap();
    match code[0] {
        Instruction::Get(ref name) => assert_eq!(&name[..], "x"),
        ref other => panic!("expected Get, got {:?}", other),
    }
}

#[test]
fn calls_in_tail_position_compile_to_tail() {
    // the last expression of a body is in tail position, so no Return
    let code = compile("(f 1 2)").unwrap();
    assert_eq!(code.len(), 4);
    match code[3] {
        Instruction::Tail(2) => {}
        ref other => panic!("expected Tail(2), got {:?}", other),
    }
}

#[test]
fn lambda_bodies_track_tail_position() {
    let code = compile("(lambda (n) (g n) (f n))").unwrap();
    let proc = match code[0] {
        Instruction::Lambda(ref proc) => proc.clone(),
        ref other => panic!("expected Lambda, got {:?}", other),
    };
    assert_eq!(&proc.name[..], "<lambda>");
    assert_eq!(proc.formals.len(), 1);
    assert!(!proc.variadic);

    // (g n) is a command: plain Call; (f n) is the tail expression
    match proc.body[2] {
        Instruction::Call(1) => {}
        ref other => panic!("expected Call(1), got {:?}", other),
    }
    match *proc.body.last().unwrap() {
        Instruction::Tail(1) => {}
        ref other => panic!("expected Tail(1), got {:?}", other),
    }
}

#[test]
fn if_compiles_to_branch_closures() {
    let code = compile("(if c 1 2)").unwrap();
    match code[0] {
        Instruction::Get(ref name) => assert_eq!(&name[..], "c"),
        ref other => panic!("expected Get, got {:?}", other),
    }
    match (&code[1], &code[2], &code[3], &code[4]) {
        (
            &Instruction::Lambda(ref consequent),
            &Instruction::Lambda(ref alternate),
            &Instruction::If,
            &Instruction::Tail(0),
        ) => {
            assert_eq!(&consequent.name[..], "<if-true>");
            assert_eq!(&alternate.name[..], "<if-false>");
        }
        other => panic!("unexpected if shape: {:?}", other),
    }
}

#[test]
fn define_function_form_compiles_to_named_lambda() {
    let code = compile("(define (f a . rest) a)").unwrap();
    match code[0] {
        Instruction::Lambda(ref proc) => {
            assert_eq!(&proc.name[..], "f");
            assert_eq!(proc.formals.len(), 2);
            assert!(proc.variadic);
        }
        ref other => panic!("expected Lambda, got {:?}", other),
    }
    match code[1] {
        Instruction::Define(ref name) => assert_eq!(&name[..], "f"),
        ref other => panic!("expected Define, got {:?}", other),
    }
}

#[test]
fn vector_literals_push_a_marker() {
    let code = compile("#(1 x)").unwrap();
    match code[0] {
        Instruction::Quote(Value::Vector(ref marker)) => assert!(marker.borrow().is_empty()),
        ref other => panic!("expected the empty-vector marker, got {:?}", other),
    }
    match code[3] {
        Instruction::Vector(2) => {}
        ref other => panic!("expected Vector(2), got {:?}", other),
    }
}

#[test]
fn ill_formed_special_forms() {
    assert_eq!(compile("(if)"), Err(CompilerError::IllegalForm(super::INVALID_IF)));
    assert_eq!(
        compile("(set! 1 2)"),
        Err(CompilerError::IllegalForm(super::INVALID_SET))
    );
    assert_eq!(
        compile("(define)"),
        Err(CompilerError::IllegalForm(super::INVALID_DEFINE))
    );
    assert_eq!(
        compile("(quote a b)"),
        Err(CompilerError::IllegalForm(super::INVALID_QUOTE))
    );
    assert_eq!(
        compile("(lambda (x x) x)"),
        Err(CompilerError::DuplicateFormal("x".into()))
    );
    assert_eq!(
        compile("(include \"other.scm\")"),
        Err(CompilerError::Unsupported("include"))
    );
}

#[test]
fn macro_miss_is_reported_at_the_use_site() {
    let environment = default_env();
    compile_body(
        &[parse(
            "(define-syntax swap (syntax-rules () ((swap a b) (b a))))",
        )],
        &environment,
    ).unwrap();

    assert_eq!(
        compile_body(&[parse("(swap)")], &environment),
        Err(CompilerError::NoMatchingRule("swap".into()))
    );
}

#[test]
fn formals_shapes() {
    assert_eq!(
        parse_formals(&parse("(a b)")),
        Ok((vec!["a".into(), "b".into()], false))
    );
    assert_eq!(
        parse_formals(&parse("(a . rest)")),
        Ok((vec!["a".into(), "rest".into()], true))
    );
    assert_eq!(parse_formals(&parse("args")), Ok((vec!["args".into()], true)));
    assert_eq!(parse_formals(&Value::Null), Ok((vec![], false)));
    assert_eq!(
        parse_formals(&parse("(a 1)")),
        Err(CompilerError::IllegalForm(super::INVALID_FORMALS))
    );
}
