//! `syntax-rules` macro expansion: pattern matching over forms, with
//! ellipsis repetition and literal identifiers, and template instantiation.

use std::collections::HashMap;

use gc::{Finalize, Gc, Trace};

use helpers::ImmutableString;
use vm::environment::{Scope, ScopeRef};
use vm::gc::{shared, GcShared};
use vm::value::{Binding, Pair, Value};

const ELLIPSIS: &str = "...";
const WILDCARD: &str = "_";

/// A keyword's ruleset: the scope it was defined in (used for literal
/// capture and for chained expansion of emitted templates), the declared
/// literals each pinned to the frame that bound it at definition time, and
/// the `(pattern template)` rules in order.
pub struct SyntaxRules {
    scope: GcShared<Scope>,
    literals: HashMap<ImmutableString, Option<GcShared<Scope>>>,
    rules: Vec<SyntaxRule>,
}

pub struct SyntaxRule {
    pub pattern: Value,
    pub template: Value,
}

impl Finalize for SyntaxRules {}
unsafe impl Trace for SyntaxRules {
    custom_trace!(this, {
        mark(&this.scope);
        for capture in this.literals.values() {
            if let Some(ref scope) = *capture {
                mark(scope);
            }
        }
        for rule in this.rules.iter() {
            mark(&rule.pattern);
            mark(&rule.template);
        }
    });
}

type Bindings = HashMap<ImmutableString, Value>;

impl SyntaxRules {
    pub fn new(
        scope: GcShared<Scope>,
        literals: HashMap<ImmutableString, Option<GcShared<Scope>>>,
        rules: Vec<SyntaxRule>,
    ) -> SyntaxRules {
        SyntaxRules {
            scope,
            literals,
            rules,
        }
    }

    /// Tries each rule against the form; the first match wins and its
    /// instantiated template is returned. The head of the pattern and of
    /// the form (the keyword slot) is ignored.
    pub fn expand(&self, form: &GcShared<Pair>, use_scope: &GcShared<Scope>) -> Option<Value> {
        let form_rest = form.borrow().cdr.clone();
        for rule in &self.rules {
            let pattern_rest = match rule.pattern.pair() {
                Some(p) => p.borrow().cdr.clone(),
                None => continue,
            };

            let mut bindings = Bindings::new();
            if self.match_pattern(&pattern_rest, &form_rest, &mut bindings, use_scope) {
                return Some(self.emit_template(&rule.template, &bindings));
            }
        }
        None
    }

    fn match_pattern(
        &self,
        pattern: &Value,
        form: &Value,
        bindings: &mut Bindings,
        use_scope: &GcShared<Scope>,
    ) -> bool {
        match *pattern {
            Value::Null => form.is_null(),
            Value::Symbol(ref name) => {
                if &name[..] == WILDCARD {
                    return true;
                }
                if let Some(capture) = self.literals.get(name) {
                    return match *form {
                        Value::Symbol(ref f) => {
                            f == name && same_capture(&use_scope.where_bound(f), capture)
                        }
                        _ => false,
                    };
                }
                bindings.insert(name.clone(), form.clone());
                true
            }
            Value::Pair(_) => self.match_list(pattern, form, bindings, use_scope),
            Value::Vector(ref pv) => {
                let form_items: Vec<Value> = match *form {
                    Value::Vector(ref fv) => fv.borrow().clone(),
                    _ => return false,
                };
                let pattern_items: Vec<Value> = pv.borrow().clone();
                self.match_slice(&pattern_items, &form_items, bindings, use_scope)
            }
            _ => pattern.equal(form),
        }
    }

    fn match_list(
        &self,
        pattern: &Value,
        form: &Value,
        bindings: &mut Bindings,
        use_scope: &GcShared<Scope>,
    ) -> bool {
        let mut pattern = pattern.clone();
        let mut form = form.clone();

        loop {
            let (pattern_car, pattern_cdr) = match pattern {
                Value::Null => return form.is_null(),
                Value::Pair(ref p) => {
                    let inner = p.borrow();
                    (inner.car.clone(), inner.cdr.clone())
                }
                // an improper pattern tail matches the rest of the form
                ref tail => return self.match_pattern(tail, &form, bindings, use_scope),
            };

            let mut after_ellipsis = None;
            if let Value::Pair(ref next) = pattern_cdr {
                let inner = next.borrow();
                if inner.car.is_symbol_named(ELLIPSIS) {
                    after_ellipsis = Some(inner.cdr.clone());
                }
            }

            if let Some(rest) = after_ellipsis {
                // the ellipsis consumes whatever the trailing sub-patterns
                // do not need
                let n = form.list_len();
                let k = rest.list_len();
                if n < k {
                    return false;
                }

                let mut matched = Vec::with_capacity(n - k);
                for _ in 0..n - k {
                    let (form_car, form_cdr) = match form {
                        Value::Pair(ref f) => {
                            let inner = f.borrow();
                            (inner.car.clone(), inner.cdr.clone())
                        }
                        _ => return false,
                    };
                    if !self.match_pattern(&pattern_car, &form_car, bindings, use_scope) {
                        return false;
                    }
                    matched.push(form_car);
                    form = form_cdr;
                }

                if let Value::Symbol(ref name) = pattern_car {
                    if !self.literals.contains_key(name) {
                        bindings.insert(name.clone(), Value::Vector(shared(matched)));
                    }
                }

                pattern = rest;
                continue;
            }

            let (form_car, form_cdr) = match form {
                Value::Pair(ref f) => {
                    let inner = f.borrow();
                    (inner.car.clone(), inner.cdr.clone())
                }
                _ => return false,
            };
            if !self.match_pattern(&pattern_car, &form_car, bindings, use_scope) {
                return false;
            }
            pattern = pattern_cdr;
            form = form_cdr;
        }
    }

    fn match_slice(
        &self,
        pattern: &[Value],
        form: &[Value],
        bindings: &mut Bindings,
        use_scope: &GcShared<Scope>,
    ) -> bool {
        let mut pi = 0;
        let mut fi = 0;

        while pi < pattern.len() {
            if pi + 1 < pattern.len() && pattern[pi + 1].is_symbol_named(ELLIPSIS) {
                let trailing = pattern.len() - pi - 2;
                if form.len() - fi < trailing {
                    return false;
                }
                let consume = form.len() - fi - trailing;

                let matched = &form[fi..fi + consume];
                for item in matched {
                    if !self.match_pattern(&pattern[pi], item, bindings, use_scope) {
                        return false;
                    }
                }
                if let Value::Symbol(ref name) = pattern[pi] {
                    if !self.literals.contains_key(name) {
                        bindings.insert(name.clone(), Value::Vector(shared(matched.to_vec())));
                    }
                }

                fi += consume;
                pi += 2;
            } else {
                if fi >= form.len()
                    || !self.match_pattern(&pattern[pi], &form[fi], bindings, use_scope)
                {
                    return false;
                }
                pi += 1;
                fi += 1;
            }
        }

        fi == form.len()
    }

    fn emit_template(&self, template: &Value, bindings: &Bindings) -> Value {
        match *template {
            Value::Null => Value::Null,
            Value::Symbol(ref name) => {
                if let Some(capture) = self.literals.get(name) {
                    return match *capture {
                        Some(ref scope) => Value::Binding(Gc::new(Binding {
                            scope: scope.clone(),
                            name: name.clone(),
                        })),
                        None => template.clone(),
                    };
                }
                match bindings.get(name) {
                    Some(value) => value.clone(),
                    None => template.clone(),
                }
            }
            Value::Pair(_) => {
                let mut items = Vec::new();
                let mut node = template.clone();
                let tail = loop {
                    let (car, cdr) = match node {
                        Value::Pair(ref p) => {
                            let inner = p.borrow();
                            (inner.car.clone(), inner.cdr.clone())
                        }
                        Value::Null => break Value::Null,
                        ref improper => break self.emit_template(improper, bindings),
                    };

                    let mut after_ellipsis = None;
                    if let Value::Pair(ref next) = cdr {
                        let inner = next.borrow();
                        if inner.car.is_symbol_named(ELLIPSIS) {
                            after_ellipsis = Some(inner.cdr.clone());
                        }
                    }

                    match after_ellipsis {
                        Some(rest) => {
                            // only a variable directly before ... splices
                            if let Value::Symbol(ref name) = car {
                                if let Some(&Value::Vector(ref matches)) = bindings.get(name) {
                                    items.extend(matches.borrow().iter().cloned());
                                }
                            }
                            node = rest;
                        }
                        None => {
                            items.push(self.emit_template(&car, bindings));
                            node = cdr;
                        }
                    }
                };

                let result = Value::improper_list(items, tail);

                // the emitted head may itself be a keyword in the macro's
                // defining scope; chain the expansion
                if let Value::Pair(ref result_pair) = result {
                    let head = result_pair.borrow().car.clone();
                    if let Value::Symbol(ref name) = head {
                        if let Some(rules) = self.scope.lookup_syntax(name) {
                            if let Some(expanded) = rules.expand(result_pair, &self.scope) {
                                return expanded;
                            }
                        }
                    }
                }
                result
            }
            Value::Vector(ref tv) => {
                let template_items: Vec<Value> = tv.borrow().clone();
                let mut items = Vec::new();
                let mut i = 0;
                while i < template_items.len() {
                    if i + 1 < template_items.len()
                        && template_items[i + 1].is_symbol_named(ELLIPSIS)
                    {
                        if let Value::Symbol(ref name) = template_items[i] {
                            if let Some(&Value::Vector(ref matches)) = bindings.get(name) {
                                items.extend(matches.borrow().iter().cloned());
                            }
                        }
                        i += 2;
                    } else {
                        items.push(self.emit_template(&template_items[i], bindings));
                        i += 1;
                    }
                }
                Value::Vector(shared(items))
            }
            ref atom => atom.clone(),
        }
    }
}

fn same_capture(a: &Option<GcShared<Scope>>, b: &Option<GcShared<Scope>>) -> bool {
    match (a, b) {
        (&None, &None) => true,
        (&Some(ref a), &Some(ref b)) => Gc::ptr_eq(a, b),
        _ => false,
    }
}

#[cfg(test)]
mod test;
