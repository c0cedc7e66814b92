//! Translates value trees into flat instruction sequences, recognizing the
//! special forms, rewriting the derived forms, expanding macro keywords and
//! tracking tail position throughout.

use std::collections::{HashMap, HashSet};
use std::fmt;

use gc::{Finalize, Gc, Trace};

use helpers::ImmutableString;
use syntax::{SyntaxRule, SyntaxRules};
use vm::environment::ScopeRef;
use vm::gc::{shared, GcShared};
use vm::value::{Binding, CompiledProcedure, Value};
use vm::Scope;

pub mod keywords;
mod quasiquote;

#[cfg(test)]
mod test;

#[derive(Debug, Clone)]
pub enum Instruction {
    /// Push the immediate.
    Quote(Value),
    /// Push the symbol's value from the current environment chain.
    Get(ImmutableString),
    /// Push the symbol's value from the frame captured in the binding.
    Binding(Gc<Binding>),
    /// Pop n values and the empty-vector marker beneath them, push a vector
    /// of the values in push order.
    Vector(usize),
    /// Pop a tail and then n values, push the list (v_1 ... v_n . tail).
    List(usize),
    /// Push a closure over the current environment frame.
    Lambda(Gc<CompiledProcedure>),
    /// Pop alternate, consequent and condition closures; push the branch
    /// the condition selects.
    If,
    /// Pop a value and store it in the nearest binding of the symbol.
    Set(ImmutableString),
    /// Pop a value and bind the symbol to it in the current frame.
    Define(ImmutableString),
    /// Pop n arguments and a procedure, invoke it.
    Call(usize),
    /// As Call, but the new frame replaces the current one.
    Tail(usize),
    /// Pop a value and return it to the caller.
    Return,
}

impl PartialEq for Instruction {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Instruction::Quote(a), Instruction::Quote(b)) => a == b,
            (Instruction::Get(a), Instruction::Get(b)) => a == b,
            (Instruction::Binding(a), Instruction::Binding(b)) => {
                std::ptr::eq(&**a, &**b)
            }
            (Instruction::Vector(a), Instruction::Vector(b)) => a == b,
            (Instruction::List(a), Instruction::List(b)) => a == b,
            (Instruction::Lambda(a), Instruction::Lambda(b)) => std::ptr::eq(&**a, &**b),
            (Instruction::If, Instruction::If) => true,
            (Instruction::Set(a), Instruction::Set(b)) => a == b,
            (Instruction::Define(a), Instruction::Define(b)) => a == b,
            (Instruction::Call(a), Instruction::Call(b)) => a == b,
            (Instruction::Tail(a), Instruction::Tail(b)) => a == b,
            (Instruction::Return, Instruction::Return) => true,
            _ => false,
        }
    }
}

impl Finalize for Instruction {}
unsafe impl Trace for Instruction {
    custom_trace!(this, {
        match *this {
            Instruction::Quote(ref value) => mark(value),
            Instruction::Binding(ref binding) => mark(binding),
            Instruction::Lambda(ref proc) => mark(proc),
            _ => {}
        }
    });
}

#[derive(Debug, PartialEq)]
pub enum CompilerError {
    IllegalForm(&'static str),
    DuplicateFormal(ImmutableString),
    NoMatchingRule(ImmutableString),
    Unsupported(&'static str),
    UnknownExpression(&'static str),
}

impl fmt::Display for CompilerError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            CompilerError::IllegalForm(message) => fmt.write_str(message),
            CompilerError::DuplicateFormal(ref name) => write!(fmt, "duplicate formal {}", name),
            CompilerError::NoMatchingRule(ref keyword) => {
                write!(fmt, "no syntax rule matches this use of {}", keyword)
            }
            CompilerError::Unsupported(what) => write!(fmt, "{} is not supported", what),
            CompilerError::UnknownExpression(what) => {
                write!(fmt, "unknown expression type {}", what)
            }
        }
    }
}

impl ::std::error::Error for CompilerError {}

const INVALID_FORMALS: &str =
    "formals must be of the form (variable1 ...), variable, or (variable1 ... . variableN)";
const INVALID_QUOTE: &str = "quote must be of the form (quote datum)";
const INVALID_QUASIQUOTE: &str = "quasiquote must be of the form (quasiquote template)";
const INVALID_LAMBDA: &str = "lambda must be of the form (lambda formals body...)";
const INVALID_IF: &str =
    "if must be of the form (if test consequent) or (if test consequent alternate)";
const INVALID_SET: &str = "set! must be of the form (set! variable expression)";
const INVALID_DEFINE: &str = "define must be of the form (define variable expression), \
     (define (variable formals...) body...), or (define (variable . formal) body...)";
const INVALID_DEFINE_SYNTAX: &str =
    "define-syntax must be of the form (define-syntax keyword (syntax-rules ...))";
const INVALID_SYNTAX_RULES: &str =
    "syntax-rules must be of the form (syntax-rules (literal ...) rule ...)";
const INVALID_RULE: &str = "a syntax rule must be of the form ((pattern ...) template)";
const INVALID_LET: &str = "let must be of the form (let ((variable1 init1) ...) body...)";
const INVALID_COND_CLAUSE: &str = "a cond clause must be of the form (test expression...), \
     (test => receiver), or (else expression...)";
const INVALID_CASE: &str = "case must be of the form (case key clause1 clause2 ...)";
const INVALID_CASE_CLAUSE: &str = "a case clause must be of the form ((datum ...) \
     expression...), ((datum ...) => receiver), or (else expression...)";

// internal variables for rewrites that must bind an intermediate value;
// no reader token can collide with a name containing a space
const COND_TEST: &str = " cond-test";
const OR_TEST: &str = " or-test";
const CASE_KEY: &str = " case-key";

/// Compiles a body: every expression in sequence, the last in tail
/// position, with a trailing Return unless the body already ends in a tail
/// call.
pub fn compile_body(
    exprs: &[Value],
    scope: &GcShared<Scope>,
) -> Result<Vec<Instruction>, CompilerError> {
    if exprs.is_empty() {
        return Ok(Vec::new());
    }

    let mut compiler = Compiler {
        body: Vec::new(),
        scope: scope.clone(),
    };

    let (last, init) = exprs.split_last().unwrap();
    for expr in init {
        compiler.compile(expr, false)?;
    }
    compiler.compile(last, true)?;

    let tail_ended = match compiler.body.last() {
        Some(&Instruction::Tail(_)) => true,
        _ => false,
    };
    if !tail_ended {
        compiler.body.push(Instruction::Return);
    }
    Ok(compiler.body)
}

struct Compiler {
    body: Vec<Instruction>,
    scope: GcShared<Scope>,
}

impl Compiler {
    fn emit(&mut self, instruction: Instruction) {
        self.body.push(instruction);
    }

    fn compile(&mut self, expr: &Value, tail: bool) -> Result<(), CompilerError> {
        match *expr {
            Value::Null
            | Value::Boolean(_)
            | Value::Number(_)
            | Value::Character(_)
            | Value::String(_) => self.emit(Instruction::Quote(expr.clone())),
            Value::Symbol(ref name) => self.emit(Instruction::Get(name.clone())),
            Value::Binding(ref binding) => self.emit(Instruction::Binding(binding.clone())),
            Value::Vector(ref items) => {
                self.emit(Instruction::Quote(Value::Vector(shared(Vec::new()))));
                let items: Vec<Value> = items.borrow().clone();
                for item in &items {
                    self.compile(item, false)?;
                }
                self.emit(Instruction::Vector(items.len()));
            }
            Value::Pair(_) => return self.compile_form(expr, tail),
            Value::Procedure(_) => return Err(CompilerError::UnknownExpression("procedure")),
        }
        Ok(())
    }

    fn compile_form(&mut self, form: &Value, tail: bool) -> Result<(), CompilerError> {
        let pair = form.pair().unwrap();
        let head = pair.borrow().car.clone();

        if let Value::Symbol(ref name) = head {
            // primitive expressions
            match &name[..] {
                keywords::QUOTE => return self.compile_quote(form),
                keywords::QUASIQUOTE => return self.compile_quasiquote(form, tail),
                keywords::LAMBDA => return self.compile_lambda(form),
                keywords::IF => return self.compile_if(form, tail),
                keywords::SET_BANG => return self.compile_set(form),
                keywords::DEFINE => return self.compile_define(form),
                keywords::DEFINE_SYNTAX => return self.compile_define_syntax(form),
                keywords::INCLUDE => return Err(CompilerError::Unsupported(keywords::INCLUDE)),
                keywords::INCLUDE_CI => {
                    return Err(CompilerError::Unsupported(keywords::INCLUDE_CI))
                }
                _ => {}
            }

            // a macro keyword shadows the derived forms, never the
            // primitives above
            if let Some(rules) = self.scope.lookup_syntax(name) {
                let expanded = rules
                    .expand(&pair, &self.scope)
                    .ok_or_else(|| CompilerError::NoMatchingRule(name.clone()))?;
                return self.compile(&expanded, tail);
            }

            // derived expressions
            match &name[..] {
                keywords::COND => return self.compile_cond(form, tail),
                keywords::CASE => return self.compile_case(form, tail),
                keywords::AND => return self.compile_and(form, tail),
                keywords::OR => return self.compile_or(form, tail),
                keywords::LET => return self.compile_let(form, tail),
                keywords::BEGIN => return self.compile_begin(form, tail),
                _ => {}
            }
        }

        // all else: procedure application
        let parts = form.list_to_vec().unwrap();
        for part in &parts {
            self.compile(part, false)?;
        }
        let nargs = parts.len() - 1;
        self.emit(if tail {
            Instruction::Tail(nargs)
        } else {
            Instruction::Call(nargs)
        });
        Ok(())
    }

    fn compile_quote(&mut self, form: &Value) -> Result<(), CompilerError> {
        let args = form.list_to_vec().unwrap();
        check![args.len() == 2, CompilerError::IllegalForm(INVALID_QUOTE)];
        self.emit(Instruction::Quote(args[1].clone()));
        Ok(())
    }

    fn compile_quasiquote(&mut self, form: &Value, tail: bool) -> Result<(), CompilerError> {
        let args = form.list_to_vec().unwrap();
        check![
            args.len() == 2,
            CompilerError::IllegalForm(INVALID_QUASIQUOTE)
        ];
        let expanded = quasiquote::expand_quasiquote(&args[1])?;
        self.compile(&expanded, tail)
    }

    fn compile_lambda(&mut self, form: &Value) -> Result<(), CompilerError> {
        let args = form.list_to_vec().unwrap();
        check![args.len() >= 3, CompilerError::IllegalForm(INVALID_LAMBDA)];

        let (formals, variadic) = parse_formals(&args[1])?;
        let body = compile_body(&args[2..], &self.scope)?;
        self.emit(Instruction::Lambda(Gc::new(CompiledProcedure {
            name: "<lambda>".into(),
            formals,
            variadic,
            body,
        })));
        Ok(())
    }

    /// Both branches become zero-argument closures; IF selects one and a
    /// Call 0 or Tail 0 runs it, which keeps the branch in the caller's
    /// tail context.
    fn compile_if(&mut self, form: &Value, tail: bool) -> Result<(), CompilerError> {
        let args = form.list_to_vec().unwrap();
        check![
            args.len() == 3 || args.len() == 4,
            CompilerError::IllegalForm(INVALID_IF)
        ];

        let consequent = CompiledProcedure {
            name: "<if-true>".into(),
            formals: Vec::new(),
            variadic: false,
            body: compile_body(&args[2..3], &self.scope)?,
        };

        let alternate = CompiledProcedure {
            name: "<if-false>".into(),
            formals: Vec::new(),
            variadic: false,
            body: if args.len() == 4 {
                compile_body(&args[3..4], &self.scope)?
            } else {
                vec![Instruction::Quote(Value::Null), Instruction::Return]
            },
        };

        self.compile(&args[1], false)?;
        self.emit(Instruction::Lambda(Gc::new(consequent)));
        self.emit(Instruction::Lambda(Gc::new(alternate)));
        self.emit(Instruction::If);
        self.emit(if tail {
            Instruction::Tail(0)
        } else {
            Instruction::Call(0)
        });
        Ok(())
    }

    fn compile_set(&mut self, form: &Value) -> Result<(), CompilerError> {
        let args = form.list_to_vec().unwrap();
        check![args.len() == 3, CompilerError::IllegalForm(INVALID_SET)];
        let name = args[1]
            .as_symbol()
            .ok_or(CompilerError::IllegalForm(INVALID_SET))?;
        self.compile(&args[2], false)?;
        self.emit(Instruction::Set(name));
        Ok(())
    }

    fn compile_define(&mut self, form: &Value) -> Result<(), CompilerError> {
        let args = form.list_to_vec().unwrap();
        check![args.len() >= 3, CompilerError::IllegalForm(INVALID_DEFINE)];

        match args[1] {
            Value::Symbol(ref name) => {
                check![args.len() == 3, CompilerError::IllegalForm(INVALID_DEFINE)];
                self.compile(&args[2], false)?;
                self.emit(Instruction::Define(name.clone()));
            }
            Value::Pair(ref decl) => {
                let (name_value, formals_decl) = {
                    let inner = decl.borrow();
                    (inner.car.clone(), inner.cdr.clone())
                };
                let name = name_value
                    .as_symbol()
                    .ok_or(CompilerError::IllegalForm(INVALID_DEFINE))?;

                let (formals, variadic) = parse_formals(&formals_decl)?;
                let body = compile_body(&args[2..], &self.scope)?;
                self.emit(Instruction::Lambda(Gc::new(CompiledProcedure {
                    name: name.clone(),
                    formals,
                    variadic,
                    body,
                })));
                self.emit(Instruction::Define(name));
            }
            _ => return Err(CompilerError::IllegalForm(INVALID_DEFINE)),
        }
        Ok(())
    }

    /// Registers the keyword's ruleset in the compilation environment; the
    /// form itself compiles to Null. Literals capture the frame binding
    /// them here, at definition time.
    fn compile_define_syntax(&mut self, form: &Value) -> Result<(), CompilerError> {
        let args = form.list_to_vec().unwrap();
        check![
            args.len() == 3,
            CompilerError::IllegalForm(INVALID_DEFINE_SYNTAX)
        ];
        let keyword = args[1]
            .as_symbol()
            .ok_or(CompilerError::IllegalForm(INVALID_DEFINE_SYNTAX))?;

        let spec = args[2]
            .list_to_vec()
            .ok_or(CompilerError::IllegalForm(INVALID_DEFINE_SYNTAX))?;
        check![
            !spec.is_empty() && spec[0].is_symbol_named(keywords::SYNTAX_RULES),
            CompilerError::IllegalForm(INVALID_DEFINE_SYNTAX)
        ];
        check![
            spec.len() >= 3,
            CompilerError::IllegalForm(INVALID_SYNTAX_RULES)
        ];

        check![
            spec[1].is_proper_list(),
            CompilerError::IllegalForm(INVALID_SYNTAX_RULES)
        ];
        let mut literals = HashMap::new();
        for literal in spec[1].list_to_vec().unwrap() {
            let name = literal
                .as_symbol()
                .ok_or(CompilerError::IllegalForm(INVALID_SYNTAX_RULES))?;
            let capture = self.scope.where_bound(&name);
            literals.insert(name, capture);
        }

        let mut rules = Vec::with_capacity(spec.len() - 2);
        for rule_spec in &spec[2..] {
            let rule = rule_spec
                .list_to_vec()
                .ok_or(CompilerError::IllegalForm(INVALID_RULE))?;
            check![rule.len() == 2, CompilerError::IllegalForm(INVALID_RULE)];
            check![
                rule[0].pair().is_some(),
                CompilerError::IllegalForm(INVALID_RULE)
            ];
            rules.push(SyntaxRule {
                pattern: rule[0].clone(),
                template: rule[1].clone(),
            });
        }

        let ruleset = SyntaxRules::new(self.scope.clone(), literals, rules);
        self.scope
            .borrow_mut()
            .define_syntax(keyword, Gc::new(ruleset));
        self.emit(Instruction::Quote(Value::Null));
        Ok(())
    }

    /// `begin` compiles inline in the current frame, so definitions inside
    /// a top-level `begin` land at top level.
    fn compile_begin(&mut self, form: &Value, tail: bool) -> Result<(), CompilerError> {
        let args = form.list_to_vec().unwrap();
        if args.len() == 1 {
            self.emit(Instruction::Quote(Value::Null));
            return Ok(());
        }
        let (last, init) = args[1..].split_last().unwrap();
        for expr in init {
            self.compile(expr, false)?;
        }
        self.compile(last, tail)
    }

    fn compile_and(&mut self, form: &Value, tail: bool) -> Result<(), CompilerError> {
        let args = form.list_to_vec().unwrap();
        match args.len() {
            1 => {
                self.emit(Instruction::Quote(Value::Boolean(true)));
                Ok(())
            }
            2 => self.compile(&args[1], tail),
            _ => {
                // (and t1 t2 ...) => (if t1 (and t2 ...) #f)
                let mut rest = vec![Value::symbol(keywords::AND)];
                rest.extend(args[2..].iter().cloned());
                let rewritten = Value::list(vec![
                    Value::symbol(keywords::IF),
                    args[1].clone(),
                    Value::list(rest),
                    Value::Boolean(false),
                ]);
                self.compile(&rewritten, tail)
            }
        }
    }

    fn compile_or(&mut self, form: &Value, tail: bool) -> Result<(), CompilerError> {
        let args = form.list_to_vec().unwrap();
        match args.len() {
            1 => {
                self.emit(Instruction::Quote(Value::Boolean(false)));
                Ok(())
            }
            2 => self.compile(&args[1], tail),
            _ => {
                // (or t1 t2 ...) => ((lambda (t) (if t t (or t2 ...))) t1)
                let test = Value::symbol(OR_TEST);
                let mut rest = vec![Value::symbol(keywords::OR)];
                rest.extend(args[2..].iter().cloned());
                let rewritten = Value::list(vec![
                    Value::list(vec![
                        Value::symbol(keywords::LAMBDA),
                        Value::list(vec![test.clone()]),
                        Value::list(vec![
                            Value::symbol(keywords::IF),
                            test.clone(),
                            test,
                            Value::list(rest),
                        ]),
                    ]),
                    args[1].clone(),
                ]);
                self.compile(&rewritten, tail)
            }
        }
    }

    fn compile_cond(&mut self, form: &Value, tail: bool) -> Result<(), CompilerError> {
        let args = form.list_to_vec().unwrap();
        let rewritten = cond_tree(&args[1..])?;
        self.compile(&rewritten, tail)
    }

    fn compile_case(&mut self, form: &Value, tail: bool) -> Result<(), CompilerError> {
        let args = form.list_to_vec().unwrap();
        check![args.len() >= 2, CompilerError::IllegalForm(INVALID_CASE)];

        let key = Value::symbol(CASE_KEY);
        let clauses = case_tree(&args[2..], &key)?;
        let rewritten = Value::list(vec![
            Value::list(vec![
                Value::symbol(keywords::LAMBDA),
                Value::list(vec![key]),
                clauses,
            ]),
            args[1].clone(),
        ]);
        self.compile(&rewritten, tail)
    }

    fn compile_let(&mut self, form: &Value, tail: bool) -> Result<(), CompilerError> {
        let args = form.list_to_vec().unwrap();
        check![args.len() >= 2, CompilerError::IllegalForm(INVALID_LET)];

        let (name, rest) = match args[1].as_symbol() {
            Some(name) => (Some(name), &args[2..]),
            None => (None, &args[1..]),
        };
        check![rest.len() >= 2, CompilerError::IllegalForm(INVALID_LET)];

        check![
            rest[0].is_proper_list(),
            CompilerError::IllegalForm(INVALID_LET)
        ];
        let mut variables = Vec::new();
        let mut inits = Vec::new();
        for binding in rest[0].list_to_vec().unwrap() {
            let parts = binding
                .list_to_vec()
                .ok_or(CompilerError::IllegalForm(INVALID_LET))?;
            check![parts.len() == 2, CompilerError::IllegalForm(INVALID_LET)];
            check![
                parts[0].as_symbol().is_some(),
                CompilerError::IllegalForm(INVALID_LET)
            ];
            variables.push(parts[0].clone());
            inits.push(parts[1].clone());
        }

        let body = &rest[1..];
        let rewritten = match name {
            // (let ((v i) ...) body...) => ((lambda (v ...) body...) i ...)
            None => {
                let mut lambda = vec![Value::symbol(keywords::LAMBDA), Value::list(variables)];
                lambda.extend(body.iter().cloned());
                let mut call = vec![Value::list(lambda)];
                call.extend(inits);
                Value::list(call)
            }
            // (let loop ((v i) ...) body...) =>
            //   ((lambda () (define (loop v ...) body...) (loop i ...)))
            Some(name) => {
                let mut decl = vec![Value::Symbol(name.clone())];
                decl.extend(variables);
                let mut define = vec![Value::symbol(keywords::DEFINE), Value::list(decl)];
                define.extend(body.iter().cloned());
                let mut call = vec![Value::Symbol(name)];
                call.extend(inits);
                Value::list(vec![Value::list(vec![
                    Value::symbol(keywords::LAMBDA),
                    Value::Null,
                    Value::list(define),
                    Value::list(call),
                ])])
            }
        };
        self.compile(&rewritten, tail)
    }
}

fn begin_form(body: &[Value]) -> Value {
    let mut form = vec![Value::symbol(keywords::BEGIN)];
    form.extend(body.iter().cloned());
    Value::list(form)
}

fn cond_tree(clauses: &[Value]) -> Result<Value, CompilerError> {
    let (first, rest) = match clauses.split_first() {
        Some(split) => split,
        None => return Ok(Value::Null),
    };

    let clause = first
        .list_to_vec()
        .ok_or(CompilerError::IllegalForm(INVALID_COND_CLAUSE))?;
    check![
        !clause.is_empty(),
        CompilerError::IllegalForm(INVALID_COND_CLAUSE)
    ];

    // else only has its special meaning in the final clause
    if rest.is_empty() && clause[0].is_symbol_named(keywords::ELSE) {
        return Ok(begin_form(&clause[1..]));
    }

    let alternative = cond_tree(rest)?;

    if clause.len() == 1 {
        // (test): the test's own value is the result when truthy
        let test = Value::symbol(COND_TEST);
        return Ok(Value::list(vec![
            Value::list(vec![
                Value::symbol(keywords::LAMBDA),
                Value::list(vec![test.clone()]),
                Value::list(vec![
                    Value::symbol(keywords::IF),
                    test.clone(),
                    test,
                    alternative,
                ]),
            ]),
            clause[0].clone(),
        ]));
    }

    if clause.len() == 3 && clause[1].is_symbol_named(keywords::ARROW) {
        // (test => receiver): the receiver is applied to the test's value
        let test = Value::symbol(COND_TEST);
        return Ok(Value::list(vec![
            Value::list(vec![
                Value::symbol(keywords::LAMBDA),
                Value::list(vec![test.clone()]),
                Value::list(vec![
                    Value::symbol(keywords::IF),
                    test.clone(),
                    Value::list(vec![clause[2].clone(), test]),
                    alternative,
                ]),
            ]),
            clause[0].clone(),
        ]));
    }

    Ok(Value::list(vec![
        Value::symbol(keywords::IF),
        clause[0].clone(),
        begin_form(&clause[1..]),
        alternative,
    ]))
}

fn case_tree(clauses: &[Value], key: &Value) -> Result<Value, CompilerError> {
    let (first, rest) = match clauses.split_first() {
        Some(split) => split,
        None => return Ok(Value::Null),
    };

    let clause = first
        .list_to_vec()
        .ok_or(CompilerError::IllegalForm(INVALID_CASE_CLAUSE))?;
    check![
        !clause.is_empty(),
        CompilerError::IllegalForm(INVALID_CASE_CLAUSE)
    ];

    let receiver = clause.len() == 3 && clause[1].is_symbol_named(keywords::ARROW);

    if rest.is_empty() && clause[0].is_symbol_named(keywords::ELSE) {
        return Ok(if receiver {
            Value::list(vec![clause[2].clone(), key.clone()])
        } else {
            begin_form(&clause[1..])
        });
    }

    let datums = clause[0]
        .list_to_vec()
        .ok_or(CompilerError::IllegalForm(INVALID_CASE_CLAUSE))?;
    let mut test = vec![Value::symbol(keywords::OR)];
    for datum in datums {
        test.push(Value::list(vec![
            Value::symbol("eqv?"),
            key.clone(),
            Value::list(vec![Value::symbol(keywords::QUOTE), datum]),
        ]));
    }

    let result = if receiver {
        Value::list(vec![clause[2].clone(), key.clone()])
    } else {
        begin_form(&clause[1..])
    };

    Ok(Value::list(vec![
        Value::symbol(keywords::IF),
        Value::list(test),
        result,
        case_tree(rest, key)?,
    ]))
}

/// Parses a formals declaration: a proper list of distinct variables, a
/// single variable collecting every argument, or a dotted list whose final
/// variable collects the rest.
pub fn parse_formals(declaration: &Value) -> Result<(Vec<ImmutableString>, bool), CompilerError> {
    if let Some(name) = declaration.as_symbol() {
        return Ok((vec![name], true));
    }
    if declaration.is_null() {
        return Ok((Vec::new(), false));
    }

    let mut formals = Vec::new();
    let mut declared = HashSet::new();
    let mut node = declaration.clone();
    loop {
        let pair = node
            .pair()
            .ok_or(CompilerError::IllegalForm(INVALID_FORMALS))?;
        let (car, cdr) = {
            let inner = pair.borrow();
            (inner.car.clone(), inner.cdr.clone())
        };
        let name = car
            .as_symbol()
            .ok_or(CompilerError::IllegalForm(INVALID_FORMALS))?;
        check![
            declared.insert(name.clone()),
            CompilerError::DuplicateFormal(name)
        ];
        formals.push(name);

        match cdr {
            Value::Symbol(rest) => {
                check![
                    declared.insert(rest.clone()),
                    CompilerError::DuplicateFormal(rest)
                ];
                formals.push(rest);
                return Ok((formals, true));
            }
            Value::Pair(_) => node = cdr,
            Value::Null => return Ok((formals, false)),
            _ => return Err(CompilerError::IllegalForm(INVALID_FORMALS)),
        }
    }
}
