use std::collections::HashMap;

use gc::{Finalize, Gc, Trace};

use helpers::ImmutableString;
use syntax::SyntaxRules;
use super::gc::{shared, GcShared};
use super::value::Value;

/// A lexical frame: value bindings, macro-keyword bindings and a link to
/// the enclosing frame. Lookups walk the chain outward; `define` always
/// binds here, shadowing any outer binding.
pub struct Scope {
    pub(crate) parent: Option<GcShared<Scope>>,
    bindings: HashMap<ImmutableString, Value>,
    syntax: HashMap<ImmutableString, Gc<SyntaxRules>>,
}

impl Default for Scope {
    fn default() -> Scope {
        Scope {
            parent: None,
            bindings: HashMap::new(),
            syntax: HashMap::new(),
        }
    }
}

impl Finalize for Scope {}
unsafe impl Trace for Scope {
    custom_trace!(this, {
        if let Some(ref parent) = this.parent {
            mark(parent);
        }
        for value in this.bindings.values() {
            mark(value);
        }
        for rules in this.syntax.values() {
            mark(rules);
        }
    });
}

impl ::std::fmt::Debug for Scope {
    fn fmt(&self, fmt: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        fmt.debug_struct("Scope")
            .field("bindings", &self.bindings.keys().collect::<Vec<_>>())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

impl Scope {
    pub fn define(&mut self, name: ImmutableString, value: Value) {
        self.bindings.insert(name, value);
    }

    pub fn define_syntax(&mut self, keyword: ImmutableString, rules: Gc<SyntaxRules>) {
        self.syntax.insert(keyword, rules);
    }

    fn local(&self, name: &ImmutableString) -> Option<Value> {
        self.bindings.get(name).cloned()
    }

    fn local_mut(&mut self, name: &ImmutableString, value: &Value) -> bool {
        match self.bindings.get_mut(name) {
            Some(slot) => {
                *slot = value.clone();
                true
            }
            None => false,
        }
    }

    fn local_syntax(&self, name: &ImmutableString) -> Option<Gc<SyntaxRules>> {
        self.syntax.get(name).cloned()
    }

    fn binds(&self, name: &ImmutableString) -> bool {
        self.bindings.contains_key(name)
    }
}

/// Walks that start from a frame handle. They live on the handle rather
/// than the frame because `where_bound` must be able to return the handle
/// of the frame it stops at.
pub trait ScopeRef {
    fn child(&self) -> GcShared<Scope>;
    fn lookup(&self, name: &ImmutableString) -> Option<Value>;
    fn set_if_bound(&self, name: &ImmutableString, value: &Value) -> bool;
    fn where_bound(&self, name: &ImmutableString) -> Option<GcShared<Scope>>;
    fn lookup_syntax(&self, name: &ImmutableString) -> Option<Gc<SyntaxRules>>;
}

impl ScopeRef for GcShared<Scope> {
    fn child(&self) -> GcShared<Scope> {
        shared(Scope {
            parent: Some(self.clone()),
            bindings: HashMap::new(),
            syntax: HashMap::new(),
        })
    }

    fn lookup(&self, name: &ImmutableString) -> Option<Value> {
        let mut scope = self.clone();
        loop {
            scope = {
                let borrowed = scope.borrow();
                if let Some(value) = borrowed.local(name) {
                    return Some(value);
                }
                match borrowed.parent {
                    Some(ref parent) => parent.clone(),
                    None => return None,
                }
            };
        }
    }

    fn set_if_bound(&self, name: &ImmutableString, value: &Value) -> bool {
        let mut scope = self.clone();
        loop {
            scope = {
                let mut borrowed = scope.borrow_mut();
                if borrowed.local_mut(name, value) {
                    return true;
                }
                match borrowed.parent {
                    Some(ref parent) => parent.clone(),
                    None => return false,
                }
            };
        }
    }

    fn where_bound(&self, name: &ImmutableString) -> Option<GcShared<Scope>> {
        let mut scope = self.clone();
        loop {
            let next = {
                let borrowed = scope.borrow();
                if borrowed.binds(name) {
                    None
                } else {
                    Some(match borrowed.parent {
                        Some(ref parent) => parent.clone(),
                        None => return None,
                    })
                }
            };
            match next {
                Some(parent) => scope = parent,
                None => return Some(scope),
            }
        }
    }

    fn lookup_syntax(&self, name: &ImmutableString) -> Option<Gc<SyntaxRules>> {
        let mut scope = self.clone();
        loop {
            scope = {
                let borrowed = scope.borrow();
                if let Some(rules) = borrowed.local_syntax(name) {
                    return Some(rules);
                }
                match borrowed.parent {
                    Some(ref parent) => parent.clone(),
                    None => return None,
                }
            };
        }
    }
}
