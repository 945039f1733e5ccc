//! Goal-shape analysis.
//!
//! Classifies a goal term into the closed set of forms the compiler knows:
//! - Conjunctions and disjunctions (flattened)
//! - Unification
//! - Control constructs (`find.all`, `if`, `let`, `list.fold`, ...)
//! - Cut, `true`, `fail`
//! - Variable goals and host sources
//! - Callables: atoms, functor calls and operator trees, resolved later
//!   against the system predicates and the rule database

use std::rc::Rc;

use crate::term::{Data, Operator, Term};

/// Operands of `list.fold(List/Seed/Result, Elem/Acc0/AccX, Body)`.
#[derive(Debug, Clone)]
pub struct FoldShape {
    pub list: Term,
    pub seed: Term,
    pub result: Term,
    pub elem: Term,
    pub acc0: Term,
    pub accx: Term,
    pub body: Term,
}

/// Classification of a goal term.
#[derive(Clone)]
pub enum Goal {
    And(Vec<Term>),
    Or(Vec<Term>),
    Unify(Term, Term),
    Builtin {
        namespace: Term,
        name: Term,
        args: Term,
    },
    FindAll {
        template: Term,
        goal: Term,
        result: Term,
    },
    If {
        cond: Term,
        then: Term,
        else_: Term,
    },
    Let {
        var: Term,
        expr: Term,
    },
    ListFold(Box<FoldShape>),
    ListQuery {
        list: Term,
        bind: Term,
        body: Term,
    },
    Not(Term),
    Once(Term),
    Suspend {
        trigger: Term,
        capture: Term,
        goal: Term,
    },
    Throw(Term),
    Try {
        goal: Term,
        pattern: Term,
        catch: Term,
    },
    /// `call(G)` or an unbound variable in goal position.
    Call(Term),
    Cut,
    True,
    Fail,
    Source(Rc<dyn Fn() -> bool>),
    /// Atom, functor call or operator tree.
    Callable(Term),
    /// Nothing the compiler can run.
    Other(Term),
}

/// Classifies `term` as it currently stands.
pub fn classify(term: &Term) -> Goal {
    let term = term.final_term();

    let conjuncts = breakdown(Operator::And, &term);
    if conjuncts.len() > 1 {
        return Goal::And(conjuncts);
    }
    let disjuncts = breakdown(Operator::Or, &term);
    if disjuncts.len() > 1 {
        return Goal::Or(disjuncts);
    }
    if let Some((left, right)) = term.decompose(Operator::Equal) {
        return Goal::Unify(left, right);
    }
    if let Some(goal) = control(&term) {
        return goal;
    }

    match &term {
        Term::Atom(_) if term.is_cut() => Goal::Cut,
        Term::Atom(atom) if atom.name() == "true" || atom.is_nil() => Goal::True,
        Term::Atom(atom) if atom.name() == "fail" => Goal::Fail,
        Term::Atom(atom) if atom.is_variable() => Goal::Other(term.clone()),
        Term::Atom(_) | Term::Tree(_) => Goal::Callable(term.clone()),
        Term::Reference(_) => Goal::Call(term.clone()),
        Term::Data(Data::Source(source)) => Goal::Source(source.clone()),
        Term::Int(_) | Term::Data(_) => Goal::Other(term.clone()),
    }
}

fn control(term: &Term) -> Option<Goal> {
    let (name, args) = term.as_call()?;
    let goal = match (name.name(), args.as_slice()) {
        ("builtin", [namespace, name, args]) => Goal::Builtin {
            namespace: namespace.clone(),
            name: name.clone(),
            args: args.clone(),
        },
        ("find.all", [template, goal, result]) => Goal::FindAll {
            template: template.clone(),
            goal: goal.clone(),
            result: result.clone(),
        },
        ("if", [cond, then, else_]) => Goal::If {
            cond: cond.clone(),
            then: then.clone(),
            else_: else_.clone(),
        },
        ("let", [var, expr]) => Goal::Let {
            var: var.clone(),
            expr: expr.clone(),
        },
        ("list.fold", [lsr, eaa, body]) => {
            let (list, seed, result) = triple(lsr)?;
            let (elem, acc0, accx) = triple(eaa)?;
            Goal::ListFold(Box::new(FoldShape {
                list,
                seed,
                result,
                elem,
                acc0,
                accx,
                body: body.clone(),
            }))
        }
        ("list.query", [list, bind, body]) => Goal::ListQuery {
            list: list.clone(),
            bind: bind.clone(),
            body: body.clone(),
        },
        ("not", [goal]) => Goal::Not(goal.clone()),
        ("once", [goal]) => Goal::Once(goal.clone()),
        ("suspend", [trigger, capture, goal]) => Goal::Suspend {
            trigger: trigger.clone(),
            capture: capture.clone(),
            goal: goal.clone(),
        },
        ("throw", [term]) => Goal::Throw(term.clone()),
        ("try", [goal, pattern, catch]) => Goal::Try {
            goal: goal.clone(),
            pattern: pattern.clone(),
            catch: catch.clone(),
        },
        ("call", [goal]) => Goal::Call(goal.clone()),
        _ => return None,
    };
    Some(goal)
}

/// `A/B/C`, which reads as `(A/B)/C`.
fn triple(term: &Term) -> Option<(Term, Term, Term)> {
    let (ab, c) = term.decompose(Operator::Divide)?;
    let (a, b) = ab.decompose(Operator::Divide)?;
    Some((a, b, c))
}

/// Operands of a chain of `operator`, nested either way, in reading order.
/// A term that is not such a chain yields itself.
pub fn breakdown(operator: Operator, term: &Term) -> Vec<Term> {
    let mut items = Vec::new();
    let mut stack = vec![term.final_term()];
    while let Some(term) = stack.pop() {
        match term.decompose(operator) {
            Some((left, right)) => {
                stack.push(right.final_term());
                stack.push(left.final_term());
            }
            None => items.push(term),
        }
    }
    items
}

/// Tree depth, with unbound variables counting as zero.
pub fn complexity(term: &Term) -> usize {
    let mut max = 0;
    let mut stack = vec![(term.final_term(), 0)];
    while let Some((term, depth)) = stack.pop() {
        match &term {
            Term::Tree(tree) => {
                stack.push((tree.left.final_term(), depth + 1));
                stack.push((tree.right.final_term(), depth + 1));
            }
            Term::Reference(_) => max = max.max(depth),
            Term::Atom(atom) if atom.is_variable() => max = max.max(depth),
            _ => max = max.max(depth + 1),
        }
    }
    max
}

/// Whether a cut occurs anywhere in `term`.
pub fn contains_cut(term: &Term) -> bool {
    let mut stack = vec![term.final_term()];
    while let Some(term) = stack.pop() {
        if term.is_cut() {
            return true;
        }
        if let Term::Tree(tree) = &term {
            stack.push(tree.left.final_term());
            stack.push(tree.right.final_term());
        }
    }
    false
}
