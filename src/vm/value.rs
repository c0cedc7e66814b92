use std::collections::HashSet;
use std::fmt;

use gc::{Finalize, Gc, GcCell, Trace};

use compiler::Instruction;
use helpers::ImmutableString;
use super::environment::Scope;
use super::gc::{shared, GcShared};
use super::number::Number;
use super::{Continuation, ExecutionError};

/// The closed universe of runtime values. Null doubles as the unit value:
/// it is what the parser produces for `()` and what definitions and empty
/// bodies evaluate to.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Number(Number),
    Character(char),
    String(ImmutableString),
    Symbol(ImmutableString),
    Pair(GcShared<Pair>),
    Vector(GcShared<Vec<Value>>),
    Procedure(Procedure),
    /// A symbol pinned to the frame that bound it when a macro literal was
    /// captured; the expander emits these so later evaluation resolves the
    /// identifier in the macro's defining scope.
    Binding(Gc<Binding>),
}

#[derive(Debug)]
pub struct Pair {
    pub car: Value,
    pub cdr: Value,
}

#[derive(Debug)]
pub struct Binding {
    pub scope: GcShared<Scope>,
    pub name: ImmutableString,
}

#[derive(Debug, Clone)]
pub enum Procedure {
    Native(NativeProcedure),
    Closure(GcShared<Closure>),
    Continuation(Gc<Continuation>),
}

pub type NativeFn = fn(Vec<Value>) -> Result<Value, ExecutionError>;

#[derive(Debug, Clone, Copy)]
pub struct NativeProcedure {
    pub name: &'static str,
    pub fun: NativeFn,
}

/// A compiled procedure is a fixed artifact; pairing it with the frame
/// captured at LAMBDA time makes a closure.
#[derive(Debug)]
pub struct CompiledProcedure {
    pub name: ImmutableString,
    pub formals: Vec<ImmutableString>,
    pub variadic: bool,
    pub body: Vec<Instruction>,
}

#[derive(Debug)]
pub struct Closure {
    pub proc: Gc<CompiledProcedure>,
    pub scope: GcShared<Scope>,
}

impl Finalize for Value {}
unsafe impl Trace for Value {
    custom_trace!(this, {
        match *this {
            Value::Pair(ref p) => mark(p),
            Value::Vector(ref v) => mark(v),
            Value::Procedure(ref p) => mark(p),
            Value::Binding(ref b) => mark(b),
            _ => {}
        }
    });
}

impl Finalize for Pair {}
unsafe impl Trace for Pair {
    custom_trace!(this, {
        mark(&this.car);
        mark(&this.cdr);
    });
}

impl Finalize for Binding {}
unsafe impl Trace for Binding {
    custom_trace!(this, {
        mark(&this.scope);
    });
}

impl Finalize for Procedure {}
unsafe impl Trace for Procedure {
    custom_trace!(this, {
        match *this {
            Procedure::Native(_) => {}
            Procedure::Closure(ref c) => mark(c),
            Procedure::Continuation(ref k) => mark(k),
        }
    });
}

impl Finalize for CompiledProcedure {}
unsafe impl Trace for CompiledProcedure {
    custom_trace!(this, {
        for instruction in this.body.iter() {
            mark(instruction);
        }
    });
}

impl Finalize for Closure {}
unsafe impl Trace for Closure {
    custom_trace!(this, {
        mark(&this.proc);
        mark(&this.scope);
    });
}

impl Value {
    pub fn symbol(name: &str) -> Value {
        Value::Symbol(name.into())
    }

    pub fn cons(car: Value, cdr: Value) -> Value {
        Value::Pair(shared(Pair { car, cdr }))
    }

    /// Builds a proper list out of the items.
    pub fn list(items: Vec<Value>) -> Value {
        Value::improper_list(items, Value::Null)
    }

    /// Builds a list out of the items, ending in the given tail.
    pub fn improper_list(items: Vec<Value>, tail: Value) -> Value {
        let mut head = tail;
        for item in items.into_iter().rev() {
            head = Value::cons(item, head);
        }
        head
    }

    pub fn pair(&self) -> Option<GcShared<Pair>> {
        match *self {
            Value::Pair(ref p) => Some(p.clone()),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<ImmutableString> {
        match *self {
            Value::Symbol(ref s) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn is_symbol_named(&self, name: &str) -> bool {
        match *self {
            Value::Symbol(ref s) => &s[..] == name,
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        match *self {
            Value::Null => true,
            _ => false,
        }
    }

    /// Flattens a list into a vector of its elements. An improper tail
    /// becomes the final element. `None` for anything that is not a list.
    pub fn list_to_vec(&self) -> Option<Vec<Value>> {
        match *self {
            Value::Null => {}
            Value::Pair(_) => {}
            _ => return None,
        }

        let mut items = Vec::new();
        let mut node = self.clone();
        loop {
            match node {
                Value::Pair(p) => {
                    let (car, cdr) = {
                        let inner = p.borrow();
                        (inner.car.clone(), inner.cdr.clone())
                    };
                    items.push(car);
                    node = cdr;
                }
                Value::Null => return Some(items),
                tail => {
                    items.push(tail);
                    return Some(items);
                }
            }
        }
    }

    /// List length with the convention the macro matcher needs: an improper
    /// tail counts as one more element, a non-list is a "list" of one.
    pub fn list_len(&self) -> usize {
        let mut len = 0;
        let mut node = self.clone();
        loop {
            match node {
                Value::Null => return len,
                Value::Pair(p) => {
                    len += 1;
                    let cdr = p.borrow().cdr.clone();
                    node = cdr;
                }
                _ => return len + 1,
            }
        }
    }

    pub fn is_proper_list(&self) -> bool {
        let mut node = self.clone();
        loop {
            match node {
                Value::Null => return true,
                Value::Pair(p) => {
                    let cdr = p.borrow().cdr.clone();
                    node = cdr;
                }
                _ => return false,
            }
        }
    }

    /// Only Boolean false is false.
    pub fn is_truthy(&self) -> bool {
        match *self {
            Value::Boolean(false) => false,
            _ => true,
        }
    }

    /// `eqv?`: Numbers compare by value, every other variant by the
    /// identity the table in the value model prescribes.
    pub fn eqv(&self, other: &Value) -> bool {
        match (self, other) {
            (&Value::Null, &Value::Null) => true,
            (&Value::Boolean(a), &Value::Boolean(b)) => a == b,
            (&Value::Number(ref a), &Value::Number(ref b)) => a == b,
            (&Value::Character(a), &Value::Character(b)) => a == b,
            (&Value::Symbol(ref a), &Value::Symbol(ref b)) => a == b,
            (&Value::String(ref a), &Value::String(ref b)) => {
                a.as_ptr() == b.as_ptr() && a.len() == b.len()
            }
            (&Value::Pair(ref a), &Value::Pair(ref b)) => Gc::ptr_eq(a, b),
            (&Value::Vector(ref a), &Value::Vector(ref b)) => Gc::ptr_eq(a, b),
            (&Value::Binding(ref a), &Value::Binding(ref b)) => Gc::ptr_eq(a, b),
            (&Value::Procedure(ref a), &Value::Procedure(ref b)) => match (a, b) {
                (&Procedure::Native(ref f), &Procedure::Native(ref g)) => f.fun == g.fun,
                (&Procedure::Closure(ref c), &Procedure::Closure(ref d)) => Gc::ptr_eq(c, d),
                (&Procedure::Continuation(ref j), &Procedure::Continuation(ref k)) => {
                    Gc::ptr_eq(j, k)
                }
                _ => false,
            },
            _ => false,
        }
    }

    /// `equal?`: structural equality over pairs, vectors and string
    /// contents. Visited cells are tracked by identity so the walk
    /// terminates on cyclic structure.
    pub fn equal(&self, other: &Value) -> bool {
        equal(self, other, &mut HashSet::new())
    }
}

fn cell_id<T: Trace + 'static>(cell: &GcShared<T>) -> usize {
    &**cell as *const GcCell<T> as usize
}

fn equal(a: &Value, b: &Value, visited: &mut HashSet<usize>) -> bool {
    if a.eqv(b) {
        return true;
    }

    match (a, b) {
        (&Value::String(ref a), &Value::String(ref b)) => a == b,
        (&Value::Pair(ref a), &Value::Pair(ref b)) => {
            let (id_a, id_b) = (cell_id(a), cell_id(b));
            if visited.contains(&id_a) || visited.contains(&id_b) {
                return false;
            }
            visited.insert(id_a);
            visited.insert(id_b);

            let (car_a, cdr_a) = {
                let p = a.borrow();
                (p.car.clone(), p.cdr.clone())
            };
            let (car_b, cdr_b) = {
                let p = b.borrow();
                (p.car.clone(), p.cdr.clone())
            };
            let result = equal(&car_a, &car_b, visited) && equal(&cdr_a, &cdr_b, visited);

            visited.remove(&id_a);
            visited.remove(&id_b);
            result
        }
        (&Value::Vector(ref a), &Value::Vector(ref b)) => {
            if a.borrow().len() != b.borrow().len() {
                return false;
            }
            let (id_a, id_b) = (cell_id(a), cell_id(b));
            if visited.contains(&id_a) || visited.contains(&id_b) {
                return false;
            }
            visited.insert(id_a);
            visited.insert(id_b);

            let items_a: Vec<Value> = a.borrow().clone();
            let items_b: Vec<Value> = b.borrow().clone();
            let result = items_a
                .iter()
                .zip(items_b.iter())
                .all(|(x, y)| equal(x, y, visited));

            visited.remove(&id_a);
            visited.remove(&id_b);
            result
        }
        _ => false,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.eqv(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Value::Null => fmt.write_str("()"),
            Value::Boolean(true) => fmt.write_str("#t"),
            Value::Boolean(false) => fmt.write_str("#f"),
            Value::Number(ref n) => write!(fmt, "{}", n),
            Value::Character(c) => write!(fmt, "{}", c),
            Value::String(ref s) => fmt.write_str(s),
            Value::Symbol(ref s) => fmt.write_str(s),
            Value::Binding(ref b) => fmt.write_str(&b.name),
            Value::Pair(ref pair) => {
                fmt.write_str("(")?;
                let mut p = pair.clone();
                let mut first = true;
                loop {
                    if !first {
                        fmt.write_str(" ")?;
                    }
                    first = false;

                    let (car, cdr) = {
                        let inner = p.borrow();
                        (inner.car.clone(), inner.cdr.clone())
                    };
                    write!(fmt, "{}", car)?;
                    match cdr {
                        Value::Null => break,
                        Value::Pair(next) => p = next,
                        tail => {
                            write!(fmt, " . {}", tail)?;
                            break;
                        }
                    }
                }
                fmt.write_str(")")
            }
            Value::Vector(ref v) => {
                fmt.write_str("(vector")?;
                let items: Vec<Value> = v.borrow().clone();
                for item in items {
                    write!(fmt, " {}", item)?;
                }
                fmt.write_str(")")
            }
            Value::Procedure(Procedure::Native(_)) => fmt.write_str("<builtin procedure>"),
            Value::Procedure(Procedure::Closure(_)) => fmt.write_str("<compiled closure>"),
            Value::Procedure(Procedure::Continuation(_)) => fmt.write_str("<continuation>"),
        }
    }
}
