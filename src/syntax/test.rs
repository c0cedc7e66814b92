use std::collections::VecDeque;

use fallible_iterator::FallibleIterator;

use compiler::compile_body;
use lexer::{Lexer, Token};
use reader::parse_datum;
use vm::environment::{Scope, ScopeRef};
use vm::gc::GcShared;
use vm::{default_env, Value};

fn parse(source: &str) -> Value {
    let tokens: Vec<Token> = Lexer::new(source.chars()).collect().expect("tokenizes");
    let mut tokens: VecDeque<Token> = tokens.into();
    parse_datum(&mut tokens).expect("parses").expect("datum")
}

fn define_syntax(environment: &GcShared<Scope>, source: &str) {
    compile_body(&[parse(source)], environment).expect("define-syntax compiles");
}

fn expand(environment: &GcShared<Scope>, keyword: &str, source: &str) -> Option<Value> {
    let rules = environment
        .lookup_syntax(&keyword.into())
        .expect("keyword is bound");
    let form = parse(source).pair().expect("a form");
    rules.expand(&form, environment)
}

#[test]
fn and_rules() {
    let environment = default_env();
    define_syntax(
        &environment,
        "(define-syntax and
            (syntax-rules ()
                ((and) #t)
                ((and test) test)
                ((and test1 test2 ...)
                    (if test1 (and test2 ...) #f))))",
    );

    let expanded = expand(&environment, "and", "(and)").unwrap();
    assert!(expanded.equal(&Value::Boolean(true)));

    let expanded = expand(&environment, "and", "(and #t)").unwrap();
    assert!(expanded.equal(&Value::Boolean(true)));

    // the inner (and #f) chains through the second rule while the
    // template is emitted
    let expanded = expand(&environment, "and", "(and #t #f)").unwrap();
    assert_eq!(expanded.to_string(), "(if #t #f #f)");

    let expanded = expand(&environment, "and", "(and a b c)").unwrap();
    assert_eq!(expanded.to_string(), "(if a (if b c #f) #f)");
}

#[test]
fn ellipsis_consumes_what_the_trailing_patterns_leave() {
    let environment = default_env();
    define_syntax(
        &environment,
        "(define-syntax rotate
            (syntax-rules ()
                ((rotate first rest ... last) (last rest ... first))))",
    );

    let expanded = expand(&environment, "rotate", "(rotate a b c d)").unwrap();
    assert_eq!(expanded.to_string(), "(d b c a)");

    // zero repetitions: the ellipsis consumes nothing
    let expanded = expand(&environment, "rotate", "(rotate a b)").unwrap();
    assert_eq!(expanded.to_string(), "(b a)");

    assert!(expand(&environment, "rotate", "(rotate a)").is_none());
}

#[test]
fn wildcard_matches_without_binding() {
    let environment = default_env();
    define_syntax(
        &environment,
        "(define-syntax second (syntax-rules () ((second _ x) x)))",
    );
    let expanded = expand(&environment, "second", "(second a b)").unwrap();
    assert_eq!(expanded.to_string(), "b");
}

#[test]
fn vector_patterns_and_templates() {
    let environment = default_env();
    define_syntax(
        &environment,
        "(define-syntax rev (syntax-rules () ((rev #(a b c ...)) #(c ... b a))))",
    );
    let expanded = expand(&environment, "rev", "(rev #(1 2 3 4))").unwrap();
    assert_eq!(expanded.to_string(), "(vector 3 4 2 1)");

    assert!(expand(&environment, "rev", "(rev #(1))").is_none());
}

#[test]
fn literals_match_by_name_and_capture() {
    let environment = default_env();
    define_syntax(
        &environment,
        "(define-syntax is-else (syntax-rules (else) ((is-else else) #t) ((is-else x) #f)))",
    );

    let expanded = expand(&environment, "is-else", "(is-else else)").unwrap();
    assert!(expanded.equal(&Value::Boolean(true)));

    let expanded = expand(&environment, "is-else", "(is-else other)").unwrap();
    assert!(expanded.equal(&Value::Boolean(false)));
}

#[test]
fn cond_chains_through_begin() {
    let environment = default_env();
    define_syntax(
        &environment,
        "(define-syntax begin
            (syntax-rules ()
                ((begin exp ...)
                    ((lambda () exp ...)))))",
    );
    define_syntax(
        &environment,
        "(define-syntax cond
            (syntax-rules (else =>)
                ((cond (else result1 result2 ...))
                    (begin result1 result2 ...))
                ((cond (test => result))
                    (let ((temp test))
                        (if temp (result temp))))
                ((cond (test => result) clause1 clause2 ...)
                    (let ((temp test))
                        (if temp
                            (result temp)
                            (cond clause1 clause2 ...))))
                ((cond (test)) test)
                ((cond (test) clause1 clause2 ...)
                    (let ((temp test))
                        (if temp
                            temp
                            (cond clause1 clause2 ...))))
                ((cond (test result1 result2 ...))
                    (if test (begin result1 result2 ...)))
                ((cond (test result1 result2 ...) clause1 clause2 ...)
                    (if test
                        (begin result1 result2 ...)
                        (cond clause1 clause2 ...)))))",
    );

    // each emitted begin and the inner cond expand in turn
    let expanded = expand(
        &environment,
        "cond",
        "(cond ((> 3 2) 'greater) ((< 3 2) 'less))",
    ).unwrap();
    assert_eq!(
        expanded.to_string(),
        "(if (> 3 2) ((lambda () (quote greater))) (if (< 3 2) ((lambda () (quote less)))))"
    );
}
