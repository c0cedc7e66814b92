//! The builtin procedure library. Each builtin takes its evaluated
//! argument vector and returns a value or a descriptive error; the VM and
//! `Procedure::apply` treat them as opaque.

use std::cmp::Ordering;

use super::number::Number;
use super::value::{NativeFn, Value};
use super::{shared, ExecutionError};

pub(super) const STDLIB: [(&str, NativeFn); 59] = [
    // equivalence predicates
    ("eqv?", eqv),
    ("eq?", eq),
    ("equal?", equal),
    // numerics
    ("number?", is_number),
    ("=", number_eq),
    ("<", number_lt),
    (">", number_gt),
    ("<=", number_lte),
    (">=", number_gte),
    ("+", add),
    ("-", sub),
    ("*", mul),
    ("/", div),
    ("quotient", truncate_quotient),
    ("truncate-quotient", truncate_quotient),
    // booleans
    ("boolean?", is_boolean),
    ("not", not),
    // pairs and lists
    ("pair?", is_pair),
    ("cons", cons),
    ("car", car),
    ("cdr", cdr),
    ("set-car!", set_car),
    ("set-cdr!", set_cdr),
    ("null?", is_null),
    ("list", list),
    ("length", length),
    ("append", append),
    ("assq", assq),
    ("list-tail", list_tail),
    ("list-ref", list_ref),
    // symbols
    ("symbol?", is_symbol),
    ("symbol->string", symbol_to_string),
    ("string->symbol", string_to_symbol),
    // strings
    ("string?", is_string),
    ("string-length", string_length),
    ("string-ref", string_ref),
    ("string<?", string_lt),
    ("string>?", string_gt),
    ("string<=?", string_lte),
    ("string>=?", string_gte),
    ("string-append", string_append),
    ("substring", substring),
    // characters
    ("char?", is_char),
    // vectors
    ("vector?", is_vector),
    ("vector", vector),
    ("vector-length", vector_length),
    ("vector-ref", vector_ref),
    ("vector-set!", vector_set),
    ("vector-append", vector_append),
    ("vector->string", vector_to_string),
    ("vector->list", vector_to_list),
    ("list->vector", list_to_vector),
    // control
    ("procedure?", is_procedure),
    ("apply", apply),
    ("map", map),
    // extras
    ("repr", repr),
    ("string-trim-suffix", string_trim_suffix),
    ("string-contains", string_contains),
    ("string-replace", string_replace),
];

fn arity(procedure: &'static str, expected: usize, at_least: bool) -> ExecutionError {
    ExecutionError::Arity {
        procedure: procedure.into(),
        expected,
        at_least,
    }
}

fn bad<S: Into<String>>(message: S) -> ExecutionError {
    ExecutionError::BadArgType(message.into())
}

fn domain<S: Into<String>>(message: S) -> ExecutionError {
    ExecutionError::Domain(message.into())
}

macro_rules! predicate {
    ($fun:ident, $name:expr, $pattern:pat) => {
        fn $fun(args: Vec<Value>) -> Result<Value, ExecutionError> {
            check![args.len() == 1, arity($name, 1, false)];
            let matched = match args[0] {
                $pattern => true,
                _ => false,
            };
            Ok(Value::Boolean(matched))
        }
    };
}

predicate!(is_number, "number?", Value::Number(_));
predicate!(is_boolean, "boolean?", Value::Boolean(_));
predicate!(is_pair, "pair?", Value::Pair(_));
predicate!(is_null, "null?", Value::Null);
predicate!(is_symbol, "symbol?", Value::Symbol(_));
predicate!(is_string, "string?", Value::String(_));
predicate!(is_char, "char?", Value::Character(_));
predicate!(is_vector, "vector?", Value::Vector(_));
predicate!(is_procedure, "procedure?", Value::Procedure(_));

// equivalence

fn eqv(args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 2, arity("eqv?", 2, false)];
    Ok(Value::Boolean(args[0].eqv(&args[1])))
}

fn eq(args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 2, arity("eq?", 2, false)];
    Ok(Value::Boolean(args[0].eqv(&args[1])))
}

fn equal(args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 2, arity("equal?", 2, false)];
    Ok(Value::Boolean(args[0].equal(&args[1])))
}

// numerics

fn number_arg(value: &Value, name: &'static str) -> Result<Number, ExecutionError> {
    match *value {
        Value::Number(ref n) => Ok(n.clone()),
        _ => Err(bad(format!("the arguments to {} must be numbers", name))),
    }
}

fn number_chain(
    name: &'static str,
    args: Vec<Value>,
    accept: fn(Ordering) -> bool,
) -> Result<Value, ExecutionError> {
    let mut prev: Option<Number> = None;
    for arg in &args {
        let n = number_arg(arg, name)?;
        if let Some(p) = prev {
            if !accept(p.cmp(&n)) {
                return Ok(Value::Boolean(false));
            }
        }
        prev = Some(n);
    }
    Ok(Value::Boolean(true))
}

fn number_eq(args: Vec<Value>) -> Result<Value, ExecutionError> {
    number_chain("=", args, |o| o == Ordering::Equal)
}

fn number_lt(args: Vec<Value>) -> Result<Value, ExecutionError> {
    number_chain("<", args, |o| o == Ordering::Less)
}

fn number_gt(args: Vec<Value>) -> Result<Value, ExecutionError> {
    number_chain(">", args, |o| o == Ordering::Greater)
}

fn number_lte(args: Vec<Value>) -> Result<Value, ExecutionError> {
    number_chain("<=", args, |o| o != Ordering::Greater)
}

fn number_gte(args: Vec<Value>) -> Result<Value, ExecutionError> {
    number_chain(">=", args, |o| o != Ordering::Less)
}

fn add(args: Vec<Value>) -> Result<Value, ExecutionError> {
    let mut sum = Number::from_i64(0);
    for arg in &args {
        sum = sum.add(&number_arg(arg, "+")?);
    }
    Ok(Value::Number(sum))
}

fn mul(args: Vec<Value>) -> Result<Value, ExecutionError> {
    let mut product = Number::from_i64(1);
    for arg in &args {
        product = product.mul(&number_arg(arg, "*")?);
    }
    Ok(Value::Number(product))
}

fn sub(args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![!args.is_empty(), arity("-", 1, true)];
    let mut diff = number_arg(&args[0], "-")?;
    if args.len() == 1 {
        return Ok(Value::Number(diff.neg()));
    }
    for arg in &args[1..] {
        diff = diff.sub(&number_arg(arg, "-")?);
    }
    Ok(Value::Number(diff))
}

fn div(args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![!args.is_empty(), arity("/", 1, true)];
    let first = number_arg(&args[0], "/")?;
    if args.len() == 1 {
        return first
            .recip()
            .map(Value::Number)
            .ok_or_else(|| domain("division by zero"));
    }
    let mut quotient = first;
    for arg in &args[1..] {
        quotient = quotient
            .div(&number_arg(arg, "/")?)
            .ok_or_else(|| domain("division by zero"))?;
    }
    Ok(Value::Number(quotient))
}

fn truncate_quotient(args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 2, arity("quotient", 2, false)];
    let a = number_arg(&args[0], "quotient")?;
    let b = number_arg(&args[1], "quotient")?;
    a.truncate_quotient(&b)
        .map(Value::Number)
        .ok_or_else(|| domain("division by zero"))
}

// booleans

fn not(args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 1, arity("not", 1, false)];
    Ok(Value::Boolean(!args[0].is_truthy()))
}

// pairs and lists

fn cons(mut args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 2, arity("cons", 2, false)];
    let cdr = args.pop().unwrap();
    let car = args.pop().unwrap();
    Ok(Value::cons(car, cdr))
}

fn car(args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 1, arity("car", 1, false)];
    let pair = args[0].pair().ok_or_else(|| bad("car expects a pair"))?;
    let value = pair.borrow().car.clone();
    Ok(value)
}

fn cdr(args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 1, arity("cdr", 1, false)];
    let pair = args[0].pair().ok_or_else(|| bad("cdr expects a pair"))?;
    let value = pair.borrow().cdr.clone();
    Ok(value)
}

fn set_car(mut args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 2, arity("set-car!", 2, false)];
    let value = args.pop().unwrap();
    let pair = args[0]
        .pair()
        .ok_or_else(|| bad("set-car! expects a pair"))?;
    pair.borrow_mut().car = value;
    Ok(Value::Null)
}

fn set_cdr(mut args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 2, arity("set-cdr!", 2, false)];
    let value = args.pop().unwrap();
    let pair = args[0]
        .pair()
        .ok_or_else(|| bad("set-cdr! expects a pair"))?;
    pair.borrow_mut().cdr = value;
    Ok(Value::Null)
}

fn list(args: Vec<Value>) -> Result<Value, ExecutionError> {
    Ok(Value::list(args))
}

fn length(args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 1, arity("length", 1, false)];
    let mut node = match args[0] {
        Value::Null => return Ok(Value::Number(Number::from_i64(0))),
        Value::Pair(_) => args[0].clone(),
        _ => return Err(bad("length expects a list")),
    };

    let mut len = 0usize;
    while let Some(pair) = node.pair() {
        len += 1;
        let cdr = pair.borrow().cdr.clone();
        node = cdr;
    }
    Ok(Value::Number(Number::from_usize(len)))
}

fn append(mut args: Vec<Value>) -> Result<Value, ExecutionError> {
    let tail = match args.pop() {
        Some(last) => last,
        None => return Ok(Value::Null),
    };

    let mut items = Vec::new();
    for arg in &args {
        match *arg {
            Value::Null => continue,
            Value::Pair(_) => {}
            _ => return Err(bad("arguments to append must be lists")),
        }
        let mut node = arg.clone();
        while let Some(pair) = node.pair() {
            let (car, cdr) = {
                let inner = pair.borrow();
                (inner.car.clone(), inner.cdr.clone())
            };
            items.push(car);
            node = cdr;
        }
    }

    Ok(Value::improper_list(items, tail))
}

fn assq(args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 2, arity("assq", 2, false)];

    let mut node = match args[1] {
        Value::Null | Value::Pair(_) => args[1].clone(),
        _ => return Err(bad("the second argument to assq must be a list of pairs")),
    };

    while let Some(pair) = node.pair() {
        let (car, cdr) = {
            let inner = pair.borrow();
            (inner.car.clone(), inner.cdr.clone())
        };
        let entry = car
            .pair()
            .ok_or_else(|| bad("the second argument to assq must be a list of pairs"))?;
        let key = entry.borrow().car.clone();
        if args[0].eqv(&key) {
            return Ok(Value::Pair(entry));
        }
        node = cdr;
    }

    Ok(Value::Boolean(false))
}

fn list_index(args: &[Value], name: &'static str) -> Result<(Value, usize), ExecutionError> {
    let node = match args[0] {
        Value::Pair(_) => args[0].clone(),
        _ => {
            return Err(bad(format!(
                "the first argument to {} must be a list",
                name
            )))
        }
    };
    let index = match args[1] {
        Value::Number(ref n) => n.to_index(),
        _ => None,
    };
    let index = index.ok_or_else(|| {
        bad(format!(
            "the second argument to {} must be a non-negative integer",
            name
        ))
    })?;
    Ok((node, index))
}

fn walk_tail(mut node: Value, index: usize) -> Option<Value> {
    for _ in 0..index {
        let pair = node.pair()?;
        let cdr = pair.borrow().cdr.clone();
        node = cdr;
    }
    match node {
        Value::Null => None,
        node => Some(node),
    }
}

fn list_tail(args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 2, arity("list-tail", 2, false)];
    let (node, index) = list_index(&args, "list-tail")?;
    walk_tail(node, index)
        .ok_or_else(|| domain(format!("list does not contain {} elements", index)))
}

fn list_ref(args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 2, arity("list-ref", 2, false)];
    let (node, index) = list_index(&args, "list-ref")?;
    let tail = walk_tail(node, index)
        .ok_or_else(|| domain(format!("list does not contain {} elements", index)))?;
    let pair = tail
        .pair()
        .ok_or_else(|| domain(format!("list does not contain {} elements", index)))?;
    let value = pair.borrow().car.clone();
    Ok(value)
}

// symbols

fn symbol_to_string(args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 1, arity("symbol->string", 1, false)];
    match args[0] {
        Value::Symbol(ref name) => Ok(Value::String(name.clone())),
        _ => Err(bad("symbol->string expects a symbol")),
    }
}

fn string_to_symbol(args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 1, arity("string->symbol", 1, false)];
    match args[0] {
        Value::String(ref s) => Ok(Value::Symbol(s.clone())),
        _ => Err(bad("string->symbol expects a string")),
    }
}

// strings

fn string_length(args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 1, arity("string-length", 1, false)];
    match args[0] {
        Value::String(ref s) => Ok(Value::Number(Number::from_usize(s.chars().count()))),
        _ => Err(bad("the argument to string-length must be a string")),
    }
}

fn string_ref(args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 2, arity("string-ref", 2, false)];
    let s = match args[0] {
        Value::String(ref s) => s.clone(),
        _ => return Err(bad("the first argument to string-ref must be a string")),
    };
    let index = match args[1] {
        Value::Number(ref n) => n.to_index(),
        _ => None,
    };
    let index =
        index.ok_or_else(|| bad("the second argument to string-ref must be a non-negative integer"))?;

    s.chars().nth(index).map(Value::Character).ok_or_else(|| {
        domain(format!(
            "{} is not a member of a string of length {}",
            index,
            s.chars().count()
        ))
    })
}

fn string_chain(
    name: &'static str,
    args: Vec<Value>,
    accept: fn(Ordering) -> bool,
) -> Result<Value, ExecutionError> {
    let mut prev: Option<&Value> = None;
    for arg in &args {
        match *arg {
            Value::String(_) => {}
            _ => return Err(bad(format!("the arguments to {} must be strings", name))),
        }
        if let Some(&Value::String(ref p)) = prev {
            if let Value::String(ref s) = *arg {
                if !accept(p.cmp(s)) {
                    return Ok(Value::Boolean(false));
                }
            }
        }
        prev = Some(arg);
    }
    Ok(Value::Boolean(true))
}

fn string_lt(args: Vec<Value>) -> Result<Value, ExecutionError> {
    string_chain("string<?", args, |o| o == Ordering::Less)
}

fn string_gt(args: Vec<Value>) -> Result<Value, ExecutionError> {
    string_chain("string>?", args, |o| o == Ordering::Greater)
}

fn string_lte(args: Vec<Value>) -> Result<Value, ExecutionError> {
    string_chain("string<=?", args, |o| o != Ordering::Greater)
}

fn string_gte(args: Vec<Value>) -> Result<Value, ExecutionError> {
    string_chain("string>=?", args, |o| o != Ordering::Less)
}

fn string_append(args: Vec<Value>) -> Result<Value, ExecutionError> {
    let mut result = String::new();
    for arg in &args {
        match *arg {
            Value::String(ref s) => result.push_str(s),
            _ => return Err(bad("arguments to string-append must be strings")),
        }
    }
    Ok(Value::String(result.into()))
}

fn substring(args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 3, arity("substring", 3, false)];
    let s = match args[0] {
        Value::String(ref s) => s.clone(),
        _ => return Err(bad("the first argument to substring must be a string")),
    };
    let start = match args[1] {
        Value::Number(ref n) => n.to_index(),
        _ => None,
    };
    let start =
        start.ok_or_else(|| bad("the second argument to substring must be a non-negative integer"))?;
    let end = match args[2] {
        Value::Number(ref n) => n.to_index(),
        _ => None,
    };
    let end =
        end.ok_or_else(|| bad("the third argument to substring must be a non-negative integer"))?;

    let chars: Vec<char> = s.chars().collect();
    if start > end || end > chars.len() {
        return Err(domain(format!(
            "invalid substring range {}..{} of a string of length {}",
            start,
            end,
            chars.len()
        )));
    }
    let result: String = chars[start..end].iter().collect();
    Ok(Value::String(result.into()))
}

fn string_trim_suffix(args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 2, arity("string-trim-suffix", 2, false)];
    match (&args[0], &args[1]) {
        (&Value::String(ref s), &Value::String(ref suffix)) => {
            let trimmed = match s.strip_suffix(&suffix[..]) {
                Some(rest) => rest,
                None => &s[..],
            };
            Ok(Value::String(trimmed.into()))
        }
        _ => Err(bad("the arguments to string-trim-suffix must be strings")),
    }
}

fn string_contains(args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 2, arity("string-contains", 2, false)];
    match (&args[0], &args[1]) {
        (&Value::String(ref s), &Value::String(ref needle)) => {
            Ok(Value::Boolean(s.contains(&needle[..])))
        }
        _ => Err(bad("the arguments to string-contains must be strings")),
    }
}

fn string_replace(args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 3, arity("string-replace", 3, false)];
    match (&args[0], &args[1], &args[2]) {
        (&Value::String(ref s), &Value::String(ref from), &Value::String(ref to)) => {
            Ok(Value::String(s.replace(&from[..], to).into()))
        }
        _ => Err(bad("the arguments to string-replace must be strings")),
    }
}

// vectors

fn vector(args: Vec<Value>) -> Result<Value, ExecutionError> {
    Ok(Value::Vector(shared(args)))
}

fn vector_length(args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 1, arity("vector-length", 1, false)];
    match args[0] {
        Value::Vector(ref v) => Ok(Value::Number(Number::from_usize(v.borrow().len()))),
        _ => Err(bad("the argument to vector-length must be a vector")),
    }
}

fn vector_ref(args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 2, arity("vector-ref", 2, false)];
    let items = match args[0] {
        Value::Vector(ref v) => v.clone(),
        _ => return Err(bad("the first argument to vector-ref must be a vector")),
    };
    let index = match args[1] {
        Value::Number(ref n) => n.to_index(),
        _ => None,
    };
    let index =
        index.ok_or_else(|| bad("the second argument to vector-ref must be a non-negative integer"))?;

    let items = items.borrow();
    items.get(index).cloned().ok_or_else(|| {
        domain(format!(
            "{} is not a member of a vector of length {}",
            index,
            items.len()
        ))
    })
}

fn vector_set(mut args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 3, arity("vector-set!", 3, false)];
    let value = args.pop().unwrap();
    let items = match args[0] {
        Value::Vector(ref v) => v.clone(),
        _ => return Err(bad("the first argument to vector-set! must be a vector")),
    };
    let index = match args[1] {
        Value::Number(ref n) => n.to_index(),
        _ => None,
    };
    let index = index
        .ok_or_else(|| bad("the second argument to vector-set! must be a non-negative integer"))?;

    let mut items = items.borrow_mut();
    let len = items.len();
    match items.get_mut(index) {
        Some(slot) => {
            *slot = value;
            Ok(Value::Null)
        }
        None => Err(domain(format!(
            "{} is not a member of a vector of length {}",
            index, len
        ))),
    }
}

fn vector_append(args: Vec<Value>) -> Result<Value, ExecutionError> {
    let mut result = Vec::new();
    for arg in &args {
        match *arg {
            Value::Vector(ref v) => result.extend(v.borrow().iter().cloned()),
            _ => return Err(bad("arguments to vector-append must be vectors")),
        }
    }
    Ok(Value::Vector(shared(result)))
}

fn vector_to_string(args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 1, arity("vector->string", 1, false)];
    let items = match args[0] {
        Value::Vector(ref v) => v.borrow().clone(),
        _ => {
            return Err(bad(
                "the argument to vector->string must be a vector of characters",
            ))
        }
    };

    let mut result = String::with_capacity(items.len());
    for item in items {
        match item {
            Value::Character(c) => result.push(c),
            _ => {
                return Err(bad(
                    "the argument to vector->string must be a vector of characters",
                ))
            }
        }
    }
    Ok(Value::String(result.into()))
}

fn vector_to_list(args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 1, arity("vector->list", 1, false)];
    match args[0] {
        Value::Vector(ref v) => Ok(Value::list(v.borrow().clone())),
        _ => Err(bad("the argument to vector->list must be a vector")),
    }
}

fn list_to_vector(args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 1, arity("list->vector", 1, false)];
    check![
        args[0].is_proper_list(),
        bad("the argument to list->vector must be a list")
    ];
    Ok(Value::Vector(shared(args[0].list_to_vec().unwrap())))
}

// control

fn apply(mut args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![!args.is_empty(), arity("apply", 1, true)];
    let procedure = match args.remove(0) {
        Value::Procedure(p) => p,
        _ => return Err(bad("the first argument to apply must be a procedure")),
    };

    let mut actuals = Vec::new();
    if let Some(last) = args.pop() {
        actuals.extend(args);
        check![
            last.is_proper_list(),
            bad("the last argument to apply must be a list")
        ];
        actuals.extend(last.list_to_vec().unwrap());
    }

    procedure.apply(actuals)
}

fn map(mut args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() >= 2, arity("map", 2, true)];
    let procedure = match args.remove(0) {
        Value::Procedure(p) => p,
        _ => return Err(bad("the first argument to map must be a procedure")),
    };

    let mut cursors = args;
    let mut results = Vec::new();
    'walk: loop {
        let mut tuple = Vec::with_capacity(cursors.len());
        for cursor in cursors.iter_mut() {
            let pair = match cursor.pair() {
                Some(pair) => pair,
                None => break 'walk,
            };
            let (car, cdr) = {
                let inner = pair.borrow();
                (inner.car.clone(), inner.cdr.clone())
            };
            tuple.push(car);
            *cursor = cdr;
        }
        results.push(procedure.apply(tuple)?);
    }
    Ok(Value::list(results))
}

// extras

fn repr(args: Vec<Value>) -> Result<Value, ExecutionError> {
    check![args.len() == 1, arity("repr", 1, false)];
    Ok(Value::String(args[0].to_string().into()))
}
