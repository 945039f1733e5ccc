//! Compiled control constructs.
//!
//! Each function takes already compiled pieces and returns the trampoline
//! implementing the construct on top of the runtime's continuation stack,
//! choice-point stack, cut point and handler.

use std::cell::RefCell;
use std::rc::Rc;

use crate::binder::{BindPredicate, TermSource};
use crate::builtin::BuiltinPredicate;
use crate::error::ProveError;
use crate::expression::Evaluate;
use crate::generalizer::Cloner;
use crate::runtime::{Runtime, Trampoline};
use crate::term::{Data, Suspend, Term};

fn okay_if(b: bool) -> Trampoline {
    if b {
        Trampoline::Okay
    } else {
        Trampoline::Fail
    }
}

/// Throws `term` to the current handler and lets the handler decide what runs next.
pub fn throw_term(rt: &mut Runtime, term: Term) -> Trampoline {
    rt.raise(term);
    Trampoline::Okay
}

/// Runs each trampoline after the previous one succeeds.
pub fn and(trs: Vec<Trampoline>) -> Trampoline {
    match trs.len() {
        0 => Trampoline::Okay,
        1 => trs.into_iter().next().unwrap_or(Trampoline::Okay),
        2 => {
            let mut iter = trs.into_iter();
            let (first, second) = match (iter.next(), iter.next()) {
                (Some(first), Some(second)) => (first, second),
                _ => return Trampoline::Okay,
            };
            Trampoline::new(move |rt| {
                rt.push_rem(second.clone());
                first.clone()
            })
        }
        _ => {
            let mut iter = trs.into_iter();
            let first = iter.next().unwrap_or(Trampoline::Okay);
            let rest: Vec<Trampoline> = iter.rev().collect();
            Trampoline::new(move |rt| {
                for tr in &rest {
                    rt.push_rem(tr.clone());
                }
                first.clone()
            })
        }
    }
}

/// Tries each trampoline in turn, restoring the entry state between them.
pub fn or(trs: Vec<Trampoline>) -> Trampoline {
    if trs.len() < 2 {
        return trs.into_iter().next().unwrap_or(Trampoline::Fail);
    }
    let mut iter = trs.into_iter();
    let first = iter.next().unwrap_or(Trampoline::Fail);
    let rest: Vec<Trampoline> = iter.rev().collect();
    Trampoline::new(move |rt| {
        let snapshot = Rc::new(rt.save());
        for tr in &rest {
            let snapshot = snapshot.clone();
            let tr = tr.clone();
            rt.push_alt(Trampoline::new(move |rt| {
                rt.restore(&snapshot);
                tr.clone()
            }));
        }
        first.clone()
    })
}

/// Makes `tr` the scope of any cut it executes.
pub fn cut_begin(tr: Trampoline) -> Trampoline {
    Trampoline::new(move |rt| {
        let cut_point0 = rt.cut_point.clone();
        rt.push_rem(Trampoline::new(move |rt| {
            rt.cut_point = cut_point0.clone();
            Trampoline::Okay
        }));
        rt.cut_point = rt.alts.clone();
        tr.clone()
    })
}

/// `!`
pub fn cut_end() -> Trampoline {
    Trampoline::new(|rt| {
        rt.alts = rt.cut_point.clone();
        Trampoline::Okay
    })
}

/// Puts the caller's environment back once `tr` succeeds.
pub fn save_env(tr: Trampoline) -> Trampoline {
    Trampoline::new(move |rt| {
        let env0 = rt.env.clone();
        rt.push_rem(Trampoline::new(move |rt| {
            rt.env = env0.clone();
            Trampoline::Okay
        }));
        tr.clone()
    })
}

/// Commits to `then` on the first success of `cond`, otherwise runs `else_`.
pub fn if_(cond: Trampoline, then: Trampoline, else_: Trampoline) -> Trampoline {
    Trampoline::new(move |rt| {
        let snapshot = rt.save();
        let alts0 = rt.alts.clone();
        let then = then.clone();
        rt.push_rem(Trampoline::new(move |rt| {
            rt.alts = alts0.clone();
            then.clone()
        }));
        let else_ = else_.clone();
        rt.push_alt(Trampoline::new(move |rt| {
            rt.restore(&snapshot);
            else_.clone()
        }));
        cond.clone()
    })
}

/// Negation as failure.
pub fn not(goal: Trampoline) -> Trampoline {
    if_(goal, Trampoline::Fail, Trampoline::Okay)
}

/// Drops the alternatives `goal` leaves behind after its first success.
pub fn once(goal: Trampoline) -> Trampoline {
    Trampoline::new(move |rt| {
        let alts0 = rt.alts.clone();
        rt.push_rem(Trampoline::new(move |rt| {
            rt.alts = alts0.clone();
            Trampoline::Okay
        }));
        goal.clone()
    })
}

/// `Simple = Complex`: succeeds iff the complex side accepts the simple value.
pub fn unify(complex: BindPredicate, simple: TermSource) -> Trampoline {
    Trampoline::new(move |rt| {
        let value = simple(&rt.env);
        okay_if(complex(&mut rt.trail, &rt.env, &value))
    })
}

pub fn builtin(predicate: Rc<dyn BuiltinPredicate>, args: TermSource) -> Trampoline {
    Trampoline::new(move |rt| {
        let args = args(&rt.env);
        let result = predicate.prove(&mut rt.prover(), &args);
        match result {
            Ok(b) => okay_if(b),
            Err(thrown) => throw_term(rt, thrown),
        }
    })
}

/// Binds `var` to the value of `expr`.
pub fn let_(var: BindPredicate, expr: Evaluate) -> Trampoline {
    Trampoline::new(move |rt| match expr(&rt.env) {
        Ok(n) => okay_if(var(&mut rt.trail, &rt.env, &Term::Int(n))),
        Err(thrown) => throw_term(rt, thrown),
    })
}

/// Host-decided goal.
pub fn source(source: Rc<dyn Fn() -> bool>) -> Trampoline {
    Trampoline::new(move |_| okay_if(source()))
}

/// Collects a copy of `template` for every solution of `goal`, then binds
/// the list of copies to `result` exactly once.
pub fn find_all(template: TermSource, goal: Trampoline, result: BindPredicate) -> Trampoline {
    Trampoline::new(move |rt| {
        let snapshot = rt.save();
        let found = Rc::new(RefCell::new(Vec::new()));

        let collect = found.clone();
        let template = template.clone();
        rt.push_rem(Trampoline::new(move |rt| {
            let copy = Cloner::new().clone_term(&template(&rt.env));
            collect.borrow_mut().push(copy);
            Trampoline::Fail
        }));

        let result = result.clone();
        rt.push_alt(Trampoline::new(move |rt| {
            rt.restore(&snapshot);
            let list = Term::list(std::mem::take(&mut *found.borrow_mut()));
            okay_if(result(&mut rt.trail, &rt.env, &list))
        }));
        goal.clone()
    })
}

/// Pieces of `list.fold(List/Seed/Result, Elem/Acc0/AccX, Body)`.
pub struct Fold {
    pub list: TermSource,
    pub seed: TermSource,
    pub result: BindPredicate,
    pub elem: BindPredicate,
    pub acc0: BindPredicate,
    pub accx: TermSource,
    pub body: Trampoline,
}

/// Left fold over a list, one committed pass of `body` per element in list
/// order. An empty list binds the seed. A failing element fails the whole fold.
///
/// Every variable still free when the fold starts is fresh for each element,
/// including ones shared with the rest of the clause. Bindings the body makes
/// to them are not visible after the fold; only `Result` carries a value out.
pub fn list_fold(fold: Fold) -> Trampoline {
    let fold = Rc::new(fold);
    Trampoline::new(move |rt| {
        let current = Rc::new(RefCell::new((fold.seed)(&rt.env)));
        let env0 = rt.env.clone();

        {
            let fold = fold.clone();
            let current = current.clone();
            let env0 = env0.clone();
            rt.push_rem(Trampoline::new(move |rt| {
                rt.env = env0.clone();
                let value = current.borrow().clone();
                okay_if((fold.result)(&mut rt.trail, &rt.env, &value))
            }));
        }

        let (items, _) = (fold.list)(&rt.env).list_items();
        for item in items.into_iter().rev() {
            let fold = fold.clone();
            let current = current.clone();
            let env0 = env0.clone();
            rt.push_rem(Trampoline::new(move |rt| {
                rt.env = env0.refresh();
                let acc = current.borrow().clone();
                if !(fold.elem)(&mut rt.trail, &rt.env, &item)
                    || !(fold.acc0)(&mut rt.trail, &rt.env, &acc)
                {
                    return Trampoline::Fail;
                }
                let alts0 = rt.alts.clone();
                let body = fold.body.clone();
                let fold = fold.clone();
                let current = current.clone();
                rt.push_rem(Trampoline::new(move |rt| {
                    rt.alts = alts0.clone();
                    *current.borrow_mut() = (fold.accx)(&rt.env);
                    Trampoline::Okay
                }));
                body
            }));
        }
        Trampoline::Okay
    })
}

/// One alternative per list element: binds the element and runs `body`.
pub fn list_query(list: TermSource, bind: BindPredicate, body: Trampoline) -> Trampoline {
    Trampoline::new(move |rt| {
        let (items, _) = list(&rt.env).list_items();
        let mut items = items.into_iter();
        let first = match items.next() {
            Some(first) => first,
            None => return Trampoline::Fail,
        };

        let snapshot = Rc::new(rt.save());
        let rest: Vec<Term> = items.collect();
        for item in rest.into_iter().rev() {
            let snapshot = snapshot.clone();
            let bind = bind.clone();
            let body = body.clone();
            rt.push_alt(Trampoline::new(move |rt| {
                rt.restore(&snapshot);
                if bind(&mut rt.trail, &rt.env, &item) {
                    body.clone()
                } else {
                    Trampoline::Fail
                }
            }));
        }

        if bind(&mut rt.trail, &rt.env, &first) {
            body.clone()
        } else {
            Trampoline::Fail
        }
    })
}

/// Binds the free `trigger` to a lazy value that proves `goal` in its own
/// runtime when forced and yields the single binding of `capture`. The goal
/// sees the environment as it was when the suspension was made.
pub fn suspend(trigger: TermSource, capture: TermSource, goal: Trampoline) -> Trampoline {
    Trampoline::new(move |rt| {
        let reference = match trigger(&rt.env).as_free_reference() {
            Some(reference) => reference,
            None => return Trampoline::Fail,
        };

        let env = rt.env.snapshot();
        let config = rt.config().clone();
        let capture = capture.clone();
        let goal = goal.clone();
        let suspend = Suspend::new(move || {
            let results = Rc::new(RefCell::new(Vec::new()));
            let collect = results.clone();
            let record = Trampoline::new(move |rt| {
                let copy = Cloner::new().clone_term(&capture(&rt.env));
                collect.borrow_mut().push(copy);
                Trampoline::Fail
            });

            let mut child = Runtime::new(config, and(vec![goal, record]));
            child.env = env;
            child.run()?;

            let mut results = results.take();
            match results.len() {
                1 => Ok(results.remove(0)),
                0 => Err(ProveError::NoResult),
                n => Err(ProveError::Ambiguous(n)),
            }
        });

        rt.trail
            .set(&reference, Term::Data(Data::Suspend(suspend)));
        Trampoline::Okay
    })
}

/// Hands a copy of the thrown term to the current handler.
pub fn throw(source: TermSource) -> Trampoline {
    Trampoline::new(move |rt| {
        let term = Cloner::new().clone_term(&source(&rt.env));
        throw_term(rt, term)
    })
}

/// Runs `goal` with a handler that rolls back to the entry state, matches the
/// thrown term against `pattern` and continues with `catch`, or re-raises.
pub fn try_(goal: Trampoline, pattern: BindPredicate, catch: Trampoline) -> Trampoline {
    Trampoline::new(move |rt| {
        let snapshot = rt.save();
        let alts0 = rt.alts.clone();
        let handler0 = rt.handler.clone();

        let pattern = pattern.clone();
        let catch = catch.clone();
        let outer = handler0.clone();
        rt.handler = Rc::new(move |rt: &mut Runtime, thrown: Term| {
            rt.restore(&snapshot);
            if pattern(&mut rt.trail, &rt.env, &thrown) {
                rt.alts = alts0.clone();
                rt.push_rem(catch.clone());
            } else {
                rt.trail.unwind(snapshot.point_in_time());
                outer(rt, thrown);
            }
        });

        rt.push_rem(Trampoline::new(move |rt| {
            rt.handler = handler0.clone();
            Trampoline::Okay
        }));
        goal.clone()
    })
}
