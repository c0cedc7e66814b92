//! The virtual machine: a chain of activation frames executed by a
//! fetch/dispatch loop. CALL pushes a frame, TAIL splices the current frame
//! out before pushing, and a continuation is a deep copy of the whole chain
//! that can be reinstated any number of times.

use std::fmt;
use std::mem;

use gc::{Finalize, Gc, Trace};

use compiler::Instruction;
use helpers::ImmutableString;

pub mod environment;
pub mod gc;
pub mod number;
pub mod value;
mod stdlib;

#[cfg(test)]
mod test;

pub use self::environment::{Scope, ScopeRef};
pub use self::gc::{shared, GcShared};
pub use self::number::Number;
pub use self::value::{
    Binding, Closure, CompiledProcedure, NativeProcedure, Pair, Procedure, Value,
};

#[derive(Debug, PartialEq)]
pub enum ExecutionError {
    NonCallable,
    UnboundVar(ImmutableString),
    UnboundSet(ImmutableString),
    Arity {
        procedure: ImmutableString,
        expected: usize,
        at_least: bool,
    },
    ContinuationArity {
        expected: usize,
        got: usize,
    },
    BadArgType(String),
    Domain(String),
    Internal(&'static str),
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ExecutionError::NonCallable => fmt.write_str("value is not a procedure"),
            ExecutionError::UnboundVar(ref name) => write!(fmt, "{} is not bound", name),
            ExecutionError::UnboundSet(ref name) => write!(fmt, "set!: {} is not bound", name),
            ExecutionError::Arity {
                ref procedure,
                expected,
                at_least,
            } => write!(
                fmt,
                "{} expects{} {} argument{}",
                procedure,
                if at_least { " at least" } else { "" },
                expected,
                if expected == 1 { "" } else { "s" }
            ),
            ExecutionError::ContinuationArity { expected, got } => write!(
                fmt,
                "continuation expects {} argument{}, got {}",
                expected,
                if expected == 1 { "" } else { "s" },
                got
            ),
            ExecutionError::BadArgType(ref message) | ExecutionError::Domain(ref message) => {
                fmt.write_str(message)
            }
            ExecutionError::Internal(message) => write!(fmt, "internal error: {}", message),
        }
    }
}

impl ::std::error::Error for ExecutionError {}

/// One activation: the closure being run, its lexical frame, the operand
/// stack, the resume address and the caller link.
#[derive(Debug)]
pub struct Frame {
    caller: Option<Box<Frame>>,
    closure: GcShared<Closure>,
    scope: GcShared<Scope>,
    stack: Vec<Value>,
    pc: usize,
}

impl Frame {
    fn copy(&self) -> Frame {
        Frame {
            caller: None,
            closure: self.closure.clone(),
            scope: self.scope.clone(),
            stack: self.stack.clone(),
            pc: self.pc,
        }
    }

    /// Deep copy of the whole chain. Operand stacks are copied; the values
    /// on them are shared.
    fn copy_chain(&self) -> Frame {
        let mut frames = Vec::new();
        let mut frame = Some(self);
        while let Some(f) = frame {
            frames.push(f.copy());
            frame = f.caller.as_deref();
        }

        let mut chain: Option<Box<Frame>> = None;
        while let Some(mut f) = frames.pop() {
            f.caller = chain.take();
            chain = Some(Box::new(f));
        }
        *chain.unwrap()
    }
}

impl Drop for Frame {
    // the chain is unlinked iteratively; a recursive drop would exhaust
    // the host stack under deep non-tail recursion
    fn drop(&mut self) {
        let mut caller = self.caller.take();
        while let Some(mut frame) = caller {
            caller = frame.caller.take();
        }
    }
}

impl Finalize for Frame {}
unsafe impl Trace for Frame {
    custom_trace!(this, {
        let mut frame = this;
        loop {
            mark(&frame.closure);
            mark(&frame.scope);
            for value in frame.stack.iter() {
                mark(value);
            }
            match frame.caller {
                Some(ref caller) => frame = &**caller,
                None => break,
            }
        }
    });
}

/// A captured frame chain plus the arity its invocation expects (always 1
/// as produced by `call/cc`). Invocation copies the chain again, so one
/// capture supports any number of resumptions.
#[derive(Debug)]
pub struct Continuation {
    stack: Frame,
    arity: usize,
}

impl Finalize for Continuation {}
unsafe impl Trace for Continuation {
    custom_trace!(this, {
        mark(&this.stack);
    });
}

// The distinguished call-with-current-continuation closure. The CALL and
// TAIL handlers recognize it by identity and append a freshly captured
// continuation to its arguments; its body then tail-calls the procedure
// with that continuation.
thread_local! {
    static CALL_CC: GcShared<Closure> = shared(Closure {
        proc: Gc::new(CompiledProcedure {
            name: "call-with-current-continuation".into(),
            formals: vec!["procedure".into(), "continuation".into()],
            variadic: false,
            body: vec![
                Instruction::Get("procedure".into()),
                Instruction::Get("continuation".into()),
                Instruction::Tail(1),
            ],
        }),
        scope: shared(Scope::default()),
    });
}

fn call_cc_closure() -> GcShared<Closure> {
    CALL_CC.with(|closure| closure.clone())
}

fn is_call_cc(closure: &GcShared<Closure>) -> bool {
    CALL_CC.with(|call_cc| Gc::ptr_eq(closure, call_cc))
}

/// Binds a procedure's formals in the given frame. A variadic procedure
/// collects the surplus into a list bound to its final formal; a fixed
/// arity must match exactly.
fn assign_formals(
    proc: &CompiledProcedure,
    scope: &GcShared<Scope>,
    mut args: Vec<Value>,
) -> Result<(), ExecutionError> {
    let required = if proc.variadic {
        proc.formals.len() - 1
    } else {
        proc.formals.len()
    };

    if args.len() < required || (!proc.variadic && args.len() != required) {
        return Err(ExecutionError::Arity {
            procedure: proc.name.clone(),
            expected: required,
            at_least: proc.variadic,
        });
    }

    let rest = args.split_off(required);
    let mut scope = scope.borrow_mut();
    for (name, value) in proc.formals.iter().zip(args.into_iter()) {
        scope.define(name.clone(), value);
    }
    if proc.variadic {
        scope.define(proc.formals[required].clone(), Value::list(rest));
    }
    Ok(())
}

fn pop_call(
    stack: &mut Vec<Value>,
    nargs: usize,
) -> Result<(Procedure, Vec<Value>), ExecutionError> {
    if stack.len() < nargs + 1 {
        return Err(ExecutionError::Internal(
            "operand stack is missing call arguments",
        ));
    }
    let args = stack.split_off(stack.len() - nargs);
    match stack.pop().unwrap() {
        Value::Procedure(procedure) => Ok((procedure, args)),
        _ => Err(ExecutionError::NonCallable),
    }
}

struct Vm {
    top: Box<Frame>,
}

impl Vm {
    fn run(&mut self) -> Result<Value, ExecutionError> {
        let mut proc = self.top.closure.borrow().proc.clone();
        let mut scope = self.top.scope.clone();
        let mut stack = mem::replace(&mut self.top.stack, Vec::new());
        let mut pc = self.top.pc;

        loop {
            let instruction = match proc.body.get(pc) {
                Some(instruction) => instruction.clone(),
                None => {
                    return Err(ExecutionError::Internal(
                        "program counter overran the procedure body",
                    ))
                }
            };
            // pc now names the resume address; saves and captures below
            // store it as such
            pc += 1;

            debug!("pc {:?}\tcode: {:?}\tstack: {:?}", pc - 1, instruction, stack);

            match instruction {
                Instruction::Quote(value) => stack.push(value),

                Instruction::Get(name) => {
                    let value = scope
                        .lookup(&name)
                        .ok_or_else(|| ExecutionError::UnboundVar(name.clone()))?;
                    stack.push(value);
                }

                Instruction::Binding(binding) => {
                    let value = binding.scope.lookup(&binding.name).unwrap_or(Value::Null);
                    stack.push(value);
                }

                Instruction::Vector(n) => {
                    if stack.len() < n + 1 {
                        return Err(ExecutionError::Internal(
                            "operand stack is missing vector elements",
                        ));
                    }
                    let items = stack.split_off(stack.len() - n);
                    stack.pop(); // the empty-vector marker
                    stack.push(Value::Vector(shared(items)));
                }

                Instruction::List(n) => {
                    if stack.len() < n + 1 {
                        return Err(ExecutionError::Internal(
                            "operand stack is missing list elements",
                        ));
                    }
                    let tail = stack.pop().unwrap();
                    let items = stack.split_off(stack.len() - n);
                    stack.push(Value::improper_list(items, tail));
                }

                Instruction::Lambda(compiled) => {
                    stack.push(Value::Procedure(Procedure::Closure(shared(Closure {
                        proc: compiled,
                        scope: scope.clone(),
                    }))));
                }

                Instruction::If => {
                    let alternate = stack.pop();
                    let consequent = stack.pop();
                    let condition = stack.pop();
                    match (condition, consequent, alternate) {
                        (Some(condition), Some(consequent), Some(alternate)) => {
                            stack.push(if condition.is_truthy() {
                                consequent
                            } else {
                                alternate
                            });
                        }
                        _ => {
                            return Err(ExecutionError::Internal(
                                "operand stack is missing if operands",
                            ))
                        }
                    }
                }

                Instruction::Set(name) => {
                    let value = stack
                        .pop()
                        .ok_or(ExecutionError::Internal("operand stack is missing a value"))?;
                    if !scope.set_if_bound(&name, &value) {
                        return Err(ExecutionError::UnboundSet(name));
                    }
                }

                Instruction::Define(name) => {
                    let value = stack
                        .pop()
                        .ok_or(ExecutionError::Internal("operand stack is missing a value"))?;
                    scope.borrow_mut().define(name, value);
                }

                Instruction::Call(nargs) => {
                    let (callee, mut args) = pop_call(&mut stack, nargs)?;
                    match callee {
                        Procedure::Closure(closure) => {
                            self.top.stack = mem::replace(&mut stack, Vec::new());
                            self.top.pc = pc;

                            if is_call_cc(&closure) {
                                args.push(Value::Procedure(Procedure::Continuation(Gc::new(
                                    Continuation {
                                        stack: self.top.copy_chain(),
                                        arity: nargs,
                                    },
                                ))));
                            }

                            let (callee_proc, callee_scope) = {
                                let inner = closure.borrow();
                                (inner.proc.clone(), inner.scope.child())
                            };
                            assign_formals(&callee_proc, &callee_scope, args)?;

                            let caller = mem::replace(
                                &mut self.top,
                                Box::new(Frame {
                                    caller: None,
                                    closure: closure.clone(),
                                    scope: callee_scope.clone(),
                                    stack: Vec::new(),
                                    pc: 0,
                                }),
                            );
                            self.top.caller = Some(caller);

                            proc = callee_proc;
                            scope = callee_scope;
                            pc = 0;
                        }
                        Procedure::Continuation(continuation) => {
                            if args.len() != continuation.arity {
                                return Err(ExecutionError::ContinuationArity {
                                    expected: continuation.arity,
                                    got: args.len(),
                                });
                            }
                            self.top = Box::new(continuation.stack.copy_chain());
                            proc = self.top.closure.borrow().proc.clone();
                            scope = self.top.scope.clone();
                            stack = mem::replace(&mut self.top.stack, Vec::new());
                            pc = self.top.pc;
                            stack.extend(args);
                        }
                        Procedure::Native(native) => {
                            let value = (native.fun)(args)?;
                            stack.push(value);
                        }
                    }
                }

                Instruction::Tail(nargs) => {
                    let (callee, mut args) = pop_call(&mut stack, nargs)?;
                    match callee {
                        Procedure::Closure(closure) => {
                            self.top.stack = mem::replace(&mut stack, Vec::new());
                            self.top.pc = pc;

                            if is_call_cc(&closure) {
                                args.push(Value::Procedure(Procedure::Continuation(Gc::new(
                                    Continuation {
                                        stack: self.top.copy_chain(),
                                        arity: nargs,
                                    },
                                ))));
                            }

                            let (callee_proc, callee_scope) = {
                                let inner = closure.borrow();
                                (inner.proc.clone(), inner.scope.child())
                            };
                            assign_formals(&callee_proc, &callee_scope, args)?;

                            // splice the current frame out: the new frame
                            // returns straight to the caller's caller
                            let caller = self.top.caller.take();
                            self.top = Box::new(Frame {
                                caller,
                                closure: closure.clone(),
                                scope: callee_scope.clone(),
                                stack: Vec::new(),
                                pc: 0,
                            });

                            proc = callee_proc;
                            scope = callee_scope;
                            pc = 0;
                        }
                        Procedure::Continuation(continuation) => {
                            if args.len() != continuation.arity {
                                return Err(ExecutionError::ContinuationArity {
                                    expected: continuation.arity,
                                    got: args.len(),
                                });
                            }
                            self.top = Box::new(continuation.stack.copy_chain());
                            proc = self.top.closure.borrow().proc.clone();
                            scope = self.top.scope.clone();
                            stack = mem::replace(&mut self.top.stack, Vec::new());
                            pc = self.top.pc;
                            stack.extend(args);
                        }
                        Procedure::Native(native) => {
                            let value = (native.fun)(args)?;
                            match self.top.caller.take() {
                                None => return Ok(value),
                                Some(caller) => {
                                    self.top = caller;
                                    proc = self.top.closure.borrow().proc.clone();
                                    scope = self.top.scope.clone();
                                    stack = mem::replace(&mut self.top.stack, Vec::new());
                                    pc = self.top.pc;
                                    stack.push(value);
                                }
                            }
                        }
                    }
                }

                Instruction::Return => {
                    // a body ending in a definition pushed nothing
                    let value = stack.pop().unwrap_or(Value::Null);
                    match self.top.caller.take() {
                        None => return Ok(value),
                        Some(caller) => {
                            self.top = caller;
                            proc = self.top.closure.borrow().proc.clone();
                            scope = self.top.scope.clone();
                            stack = mem::replace(&mut self.top.stack, Vec::new());
                            pc = self.top.pc;
                            stack.push(value);
                        }
                    }
                }
            }
        }
    }
}

impl Procedure {
    /// Invokes the procedure outside the running machine: builtins
    /// directly, closures and continuations on a fresh one. `apply` and
    /// `map` enter through here.
    pub fn apply(&self, args: Vec<Value>) -> Result<Value, ExecutionError> {
        match *self {
            Procedure::Native(ref native) => (native.fun)(args),
            Procedure::Closure(ref closure) => {
                let (proc, scope) = {
                    let inner = closure.borrow();
                    (inner.proc.clone(), inner.scope.child())
                };
                assign_formals(&proc, &scope, args)?;
                let mut vm = Vm {
                    top: Box::new(Frame {
                        caller: None,
                        closure: closure.clone(),
                        scope,
                        stack: Vec::new(),
                        pc: 0,
                    }),
                };
                vm.run()
            }
            Procedure::Continuation(ref continuation) => {
                if args.len() != continuation.arity {
                    return Err(ExecutionError::ContinuationArity {
                        expected: continuation.arity,
                        got: args.len(),
                    });
                }
                let mut vm = Vm {
                    top: Box::new(continuation.stack.copy_chain()),
                };
                vm.top.stack.extend(args);
                vm.run()
            }
        }
    }
}

/// Runs a compiled body against the given environment. The root frame's
/// scope is the environment itself, so top-level definitions persist
/// between programs sharing it.
pub fn exec(
    body: Vec<Instruction>,
    environment: &GcShared<Scope>,
) -> Result<Value, ExecutionError> {
    if body.is_empty() {
        return Ok(Value::Null);
    }

    let proc = Gc::new(CompiledProcedure {
        name: "<program>".into(),
        formals: Vec::new(),
        variadic: false,
        body,
    });
    let closure = shared(Closure {
        proc,
        scope: environment.clone(),
    });

    let mut vm = Vm {
        top: Box::new(Frame {
            caller: None,
            closure,
            scope: environment.clone(),
            stack: Vec::new(),
            pc: 0,
        }),
    };
    vm.run()
}

/// A fresh global environment: the builtin library plus the distinguished
/// call-with-current-continuation closure under both of its names.
pub fn default_env() -> GcShared<Scope> {
    let mut scope = Scope::default();

    for &(name, fun) in stdlib::STDLIB.iter() {
        scope.define(
            name.into(),
            Value::Procedure(Procedure::Native(NativeProcedure { name, fun })),
        );
    }

    let call_cc = Value::Procedure(Procedure::Closure(call_cc_closure()));
    scope.define("call-with-current-continuation".into(), call_cc.clone());
    scope.define("call/cc".into(), call_cc);

    shared(scope)
}
