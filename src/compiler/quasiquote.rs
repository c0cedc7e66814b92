//! Quasiquotation is handled ahead of bytecode generation: a `quasiquote`
//! form is rewritten into an equivalent tree of `quote`, `list`, `append`
//! and `list->vector` applications, which then compiles like any other
//! expression. `unquote` at depth zero inserts the expression itself;
//! deeper levels rebuild the quotation forms as data.

use helpers::ImmutableString;
use vm::value::Value;
use super::{keywords, CompilerError};

const INVALID_SPLICE: &str = "unquote-splicing must appear inside a list";

pub(super) fn expand_quasiquote(datum: &Value) -> Result<Value, CompilerError> {
    qq(datum, 0)
}

fn qq(datum: &Value, depth: usize) -> Result<Value, CompilerError> {
    match *datum {
        Value::Pair(_) => {
            if let Some((keyword, arg)) = quotation_form(datum) {
                match &keyword[..] {
                    keywords::UNQUOTE => {
                        return if depth == 0 {
                            Ok(arg)
                        } else {
                            Ok(rebuild(keywords::UNQUOTE, qq(&arg, depth - 1)?))
                        };
                    }
                    keywords::UNQUOTE_SPLICING => {
                        return if depth == 0 {
                            Err(CompilerError::IllegalForm(INVALID_SPLICE))
                        } else {
                            Ok(rebuild(keywords::UNQUOTE_SPLICING, qq(&arg, depth - 1)?))
                        };
                    }
                    keywords::QUASIQUOTE => {
                        return Ok(rebuild(keywords::QUASIQUOTE, qq(&arg, depth + 1)?));
                    }
                    _ => {}
                }
            }
            qq_list(datum, depth)
        }
        Value::Vector(ref items) => {
            let items: Vec<Value> = items.borrow().clone();
            let list_expr = qq_segments(&items, None, depth)?;
            Ok(Value::list(vec![Value::symbol("list->vector"), list_expr]))
        }
        ref atom => Ok(quote(atom.clone())),
    }
}

fn qq_list(datum: &Value, depth: usize) -> Result<Value, CompilerError> {
    let mut elements = Vec::new();
    let mut node = datum.clone();

    // a (unquote x) or (unquote-splicing x) in tail position supplies the
    // tail of the rebuilt list, covering dotted forms like (a . ,b)
    let tail = loop {
        if let Some((keyword, arg)) = quotation_form(&node) {
            match &keyword[..] {
                keywords::UNQUOTE | keywords::UNQUOTE_SPLICING => {
                    break Some(if depth == 0 {
                        arg
                    } else {
                        rebuild(&keyword, qq(&arg, depth - 1)?)
                    });
                }
                _ => {}
            }
        }

        match node {
            Value::Pair(p) => {
                let (car, cdr) = {
                    let inner = p.borrow();
                    (inner.car.clone(), inner.cdr.clone())
                };
                elements.push(car);
                node = cdr;
            }
            Value::Null => break None,
            improper => break Some(quote(improper)),
        }
    };

    qq_segments(&elements, tail, depth)
}

/// Splits the elements into runs of plain elements (each run becomes one
/// `list` application) and depth-zero splices (inserted verbatim), then
/// joins the runs with `append`.
fn qq_segments(
    elements: &[Value],
    tail: Option<Value>,
    depth: usize,
) -> Result<Value, CompilerError> {
    let mut segments = Vec::new();
    let mut batch = Vec::new();

    for element in elements {
        let mut spliced = None;
        if depth == 0 {
            if let Some((keyword, arg)) = quotation_form(element) {
                if &keyword[..] == keywords::UNQUOTE_SPLICING {
                    spliced = Some(arg);
                }
            }
        }

        match spliced {
            Some(expr) => {
                if !batch.is_empty() {
                    segments.push(list_call(::std::mem::replace(&mut batch, Vec::new())));
                }
                segments.push(expr);
            }
            None => batch.push(qq(element, depth)?),
        }
    }

    let splice_free = segments.is_empty();
    if !batch.is_empty() {
        segments.push(list_call(batch));
    }

    if segments.is_empty() {
        return Ok(tail.unwrap_or_else(|| quote(Value::Null)));
    }
    if splice_free && tail.is_none() {
        return Ok(segments.pop().unwrap());
    }

    let mut call = Vec::with_capacity(segments.len() + 2);
    call.push(Value::symbol("append"));
    call.extend(segments);
    call.push(tail.unwrap_or_else(|| quote(Value::Null)));
    Ok(Value::list(call))
}

/// `(keyword arg)` as a proper two-element list, any keyword.
fn quotation_form(datum: &Value) -> Option<(ImmutableString, Value)> {
    let pair = datum.pair()?;
    let (car, cdr) = {
        let inner = pair.borrow();
        (inner.car.clone(), inner.cdr.clone())
    };
    let keyword = car.as_symbol()?;
    let rest = cdr.pair()?;
    let (arg, end) = {
        let inner = rest.borrow();
        (inner.car.clone(), inner.cdr.clone())
    };
    if !end.is_null() {
        return None;
    }
    Some((keyword, arg))
}

fn quote(datum: Value) -> Value {
    Value::list(vec![Value::symbol(keywords::QUOTE), datum])
}

/// An expression that rebuilds `(keyword inner)` as data.
fn rebuild(keyword: &str, inner: Value) -> Value {
    Value::list(vec![
        Value::symbol("list"),
        quote(Value::symbol(keyword)),
        inner,
    ])
}

fn list_call(items: Vec<Value>) -> Value {
    let mut call = Vec::with_capacity(items.len() + 1);
    call.push(Value::symbol("list"));
    call.extend(items);
    Value::list(call)
}
