use gc::Gc;

use compiler::Instruction;
use super::number::Number;
use super::value::{CompiledProcedure, Value};
use super::{default_env, exec, shared, ExecutionError};

fn num(x: i64) -> Value {
    Value::Number(Number::from_i64(x))
}

#[test]
fn defines_lambdas_and_tail_calls() {
    let environment = default_env();

    let inner = Gc::new(CompiledProcedure {
        name: "<lambda>".into(),
        formals: Vec::new(),
        variadic: false,
        body: vec![
            Instruction::Get("+".into()),
            Instruction::Get("a".into()),
            Instruction::Get("b".into()),
            Instruction::Tail(2),
        ],
    });

    let body = vec![
        Instruction::Quote(num(42)),
        Instruction::Define("a".into()),
        Instruction::Quote(num(24)),
        Instruction::Define("b".into()),
        Instruction::Lambda(inner),
        Instruction::Tail(0),
    ];

    let value = exec(body, &environment).unwrap();
    assert!(value.eqv(&num(66)));
}

#[test]
fn continuation_abandons_the_pending_computation() {
    let environment = default_env();

    let receiver = Gc::new(CompiledProcedure {
        name: "<lambda>".into(),
        formals: vec!["c".into()],
        variadic: false,
        body: vec![
            Instruction::Get("c".into()),
            Instruction::Quote(num(33)),
            Instruction::Call(1),
            Instruction::Quote(num(21)),
            Instruction::Return,
        ],
    });

    let body = vec![
        Instruction::Get("*".into()),
        Instruction::Quote(num(2)),
        Instruction::Get("call/cc".into()),
        Instruction::Lambda(receiver),
        Instruction::Call(1),
        Instruction::Tail(2),
    ];

    // the continuation reinstates the product context with 33; the
    // pending 21 never surfaces
    let value = exec(body, &environment).unwrap();
    assert!(value.eqv(&num(66)));
}

#[test]
fn list_conses_onto_the_tail() {
    let environment = default_env();

    let body = vec![
        Instruction::Quote(num(1)),
        Instruction::Quote(num(2)),
        Instruction::Quote(Value::Null),
        Instruction::List(2),
        Instruction::Return,
    ];
    assert_eq!(exec(body, &environment).unwrap().to_string(), "(1 2)");

    let body = vec![
        Instruction::Quote(num(1)),
        Instruction::Quote(num(2)),
        Instruction::Quote(num(3)),
        Instruction::List(2),
        Instruction::Return,
    ];
    assert_eq!(exec(body, &environment).unwrap().to_string(), "(1 2 . 3)");
}

#[test]
fn vector_consumes_its_marker() {
    let environment = default_env();

    // (list #(1 2)): the marker beneath the elements must not leak into
    // the call
    let body = vec![
        Instruction::Get("list".into()),
        Instruction::Quote(Value::Vector(shared(Vec::new()))),
        Instruction::Quote(num(1)),
        Instruction::Quote(num(2)),
        Instruction::Vector(2),
        Instruction::Call(1),
        Instruction::Return,
    ];
    assert_eq!(
        exec(body, &environment).unwrap().to_string(),
        "((vector 1 2))"
    );
}

#[test]
fn if_selects_a_branch_closure() {
    let environment = default_env();

    let consequent = Gc::new(CompiledProcedure {
        name: "<if-true>".into(),
        formals: Vec::new(),
        variadic: false,
        body: vec![Instruction::Quote(num(1)), Instruction::Return],
    });
    let alternate = Gc::new(CompiledProcedure {
        name: "<if-false>".into(),
        formals: Vec::new(),
        variadic: false,
        body: vec![Instruction::Quote(num(2)), Instruction::Return],
    });

    let body = vec![
        Instruction::Quote(Value::Boolean(false)),
        Instruction::Lambda(consequent),
        Instruction::Lambda(alternate),
        Instruction::If,
        Instruction::Call(0),
        Instruction::Return,
    ];
    assert!(exec(body, &environment).unwrap().eqv(&num(2)));
}

#[test]
fn null_is_truthy() {
    let environment = default_env();

    let consequent = Gc::new(CompiledProcedure {
        name: "<if-true>".into(),
        formals: Vec::new(),
        variadic: false,
        body: vec![Instruction::Quote(num(1)), Instruction::Return],
    });
    let alternate = Gc::new(CompiledProcedure {
        name: "<if-false>".into(),
        formals: Vec::new(),
        variadic: false,
        body: vec![Instruction::Quote(num(2)), Instruction::Return],
    });

    let body = vec![
        Instruction::Quote(Value::Null),
        Instruction::Lambda(consequent),
        Instruction::Lambda(alternate),
        Instruction::If,
        Instruction::Call(0),
        Instruction::Return,
    ];
    assert!(exec(body, &environment).unwrap().eqv(&num(1)));
}

#[test]
fn unbound_variable() {
    let environment = default_env();
    let body = vec![Instruction::Get("zork".into()), Instruction::Return];
    assert_eq!(
        exec(body, &environment),
        Err(ExecutionError::UnboundVar("zork".into()))
    );
}

#[test]
fn set_requires_a_binding() {
    let environment = default_env();
    let body = vec![
        Instruction::Quote(num(1)),
        Instruction::Set("zork".into()),
        Instruction::Quote(Value::Null),
        Instruction::Return,
    ];
    assert_eq!(
        exec(body, &environment),
        Err(ExecutionError::UnboundSet("zork".into()))
    );
}

#[test]
fn calling_a_non_procedure() {
    let environment = default_env();
    let body = vec![
        Instruction::Quote(num(7)),
        Instruction::Call(0),
        Instruction::Return,
    ];
    assert_eq!(exec(body, &environment), Err(ExecutionError::NonCallable));
}

#[test]
fn fixed_arity_is_exact() {
    let environment = default_env();

    let identity = Gc::new(CompiledProcedure {
        name: "identity".into(),
        formals: vec!["x".into()],
        variadic: false,
        body: vec![Instruction::Get("x".into()), Instruction::Return],
    });

    let body = vec![
        Instruction::Lambda(identity),
        Instruction::Call(0),
        Instruction::Return,
    ];
    assert_eq!(
        exec(body, &environment),
        Err(ExecutionError::Arity {
            procedure: "identity".into(),
            expected: 1,
            at_least: false,
        })
    );
}

#[test]
fn a_body_ending_in_define_returns_null() {
    let environment = default_env();
    let body = vec![
        Instruction::Quote(num(1)),
        Instruction::Define("x".into()),
        Instruction::Return,
    ];
    assert!(exec(body, &environment).unwrap().is_null());
}
