//! Trampoline executor.
//!
//! A [`Trampoline`] is one step of a proof: given the runtime it returns the
//! next step instead of calling it. The runtime keeps an explicit stack of
//! pending continuations (`rems`) and one of choice points (`alts`), so deep
//! conjunctions and recursive predicates never grow the native stack.
//!
//! The loop pops an alternative, makes it the only continuation, then keeps
//! popping and invoking continuations until one yields [`Trampoline::Fail`].
//! The proof is over when no alternatives remain.

use std::fmt;
use std::rc::Rc;

use log::warn;

use crate::binder::Env;
use crate::builtin::Prover;
use crate::config::ProverConfig;
use crate::error::ProveError;
use crate::ilist::IList;
use crate::term::Term;
use crate::trail::Trail;

/// One step of a proof.
#[derive(Clone)]
pub enum Trampoline {
    /// The current continuation succeeded; carry on with the next one.
    Okay,
    /// The current alternative is exhausted.
    Fail,
    Prove(Rc<dyn Fn(&mut Runtime) -> Trampoline>),
}

impl Trampoline {
    pub fn new(f: impl Fn(&mut Runtime) -> Trampoline + 'static) -> Self {
        Trampoline::Prove(Rc::new(f))
    }

    pub fn is_okay(&self) -> bool {
        matches!(self, Trampoline::Okay)
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Trampoline::Fail)
    }
}

impl fmt::Debug for Trampoline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trampoline::Okay => write!(f, "okay"),
            Trampoline::Fail => write!(f, "fail"),
            Trampoline::Prove(_) => write!(f, "<trampoline>"),
        }
    }
}

/// Receives thrown terms.
pub type Handler = Rc<dyn Fn(&mut Runtime, Term)>;

/// Trace indentation and the goals currently being proved.
#[derive(Clone)]
pub struct Tracer {
    pub indent: Rc<str>,
    pub stack: IList<Term>,
}

impl Default for Tracer {
    fn default() -> Self {
        Tracer {
            indent: Rc::from(""),
            stack: IList::nil(),
        }
    }
}

impl Tracer {
    pub fn enter(&self, goal: Term) -> Tracer {
        Tracer {
            indent: Rc::from(format!("{}| ", self.indent)),
            stack: IList::cons(goal, self.stack.clone()),
        }
    }

    pub fn dump(&self) -> String {
        self.stack
            .iter()
            .map(|goal| goal.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Everything [`Runtime::restore`] puts back.
#[derive(Clone)]
pub struct Snapshot {
    env: Env,
    query: Term,
    cut_point: IList<Trampoline>,
    rems: IList<Trampoline>,
    point_in_time: usize,
    handler: Handler,
}

impl Snapshot {
    pub fn point_in_time(&self) -> usize {
        self.point_in_time
    }
}

/// State of one proof.
pub struct Runtime {
    pub(crate) env: Env,
    pub(crate) query: Term,
    pub(crate) cut_point: IList<Trampoline>,
    pub(crate) rems: IList<Trampoline>,
    pub(crate) alts: IList<Trampoline>,
    pub(crate) trail: Trail,
    pub(crate) handler: Handler,
    pub(crate) tracer: Tracer,
    config: ProverConfig,
    steps: u64,
    error: Option<ProveError>,
}

impl Runtime {
    /// A runtime whose only alternative is `tr`.
    pub fn new(config: ProverConfig, tr: Trampoline) -> Self {
        let mut runtime = Self {
            env: Env::empty(),
            query: Term::nil(),
            cut_point: IList::nil(),
            rems: IList::nil(),
            alts: IList::nil(),
            trail: Trail::new(),
            handler: Rc::new(uncaught),
            tracer: Tracer::default(),
            config,
            steps: 0,
            error: None,
        };
        runtime.push_alt(tr);
        runtime
    }

    pub fn config(&self) -> &ProverConfig {
        &self.config
    }

    pub fn push_rem(&mut self, tr: Trampoline) {
        if !tr.is_okay() {
            self.rems = IList::cons(tr, std::mem::take(&mut self.rems));
        }
    }

    pub fn push_alt(&mut self, tr: Trampoline) {
        self.alts = IList::cons(tr, std::mem::take(&mut self.alts));
    }

    pub fn save(&self) -> Snapshot {
        Snapshot {
            env: self.env.clone(),
            query: self.query.clone(),
            cut_point: self.cut_point.clone(),
            rems: self.rems.clone(),
            point_in_time: self.trail.point_in_time(),
            handler: self.handler.clone(),
        }
    }

    /// Rolls bindings back and reinstates the saved continuation state.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        self.env = snapshot.env.clone();
        self.query = snapshot.query.clone();
        self.cut_point = snapshot.cut_point.clone();
        self.rems = snapshot.rems.clone();
        self.trail.unwind(snapshot.point_in_time);
        self.handler = snapshot.handler.clone();
    }

    /// Hands `term` to the current exception handler.
    pub fn raise(&mut self, term: Term) {
        let handler = self.handler.clone();
        handler(self, term);
    }

    /// Abandons the whole proof with `error`.
    pub fn halt(&mut self, error: ProveError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
        self.alts = IList::nil();
        self.rems = IList::cons(Trampoline::Fail, IList::nil());
    }

    pub fn prover(&mut self) -> Prover<'_> {
        Prover::new(&self.config, &mut self.trail)
    }

    /// Runs until the search space is exhausted, then unwinds every binding.
    pub fn run(&mut self) -> Result<(), ProveError> {
        while let Some((alt, alts)) = self.alts.split() {
            self.alts = alts;
            self.rems = IList::cons(alt, IList::nil());

            while let Some((rem, rems)) = self.rems.split() {
                let f = match rem {
                    Trampoline::Fail => break,
                    Trampoline::Okay => {
                        self.rems = rems;
                        continue;
                    }
                    Trampoline::Prove(f) => f,
                };
                self.rems = rems;

                self.steps += 1;
                if let Some(limit) = self.config.step_limit {
                    if self.steps > limit {
                        warn!("proof abandoned after {} steps", limit);
                        self.halt(ProveError::StepLimit(limit));
                        break;
                    }
                }

                let next = f(self);
                self.push_rem(next);
            }
        }

        self.trail.unwind_all();
        match self.error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn uncaught(rt: &mut Runtime, term: Term) {
    let trace = rt.tracer.dump();
    rt.halt(ProveError::Uncaught { term, trace });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counter() -> (Rc<Cell<u32>>, Trampoline) {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let tr = Trampoline::new(move |_| {
            c.set(c.get() + 1);
            Trampoline::Fail
        });
        (count, tr)
    }

    #[test]
    fn test_continuations_run_in_order() {
        let log = Rc::new(std::cell::RefCell::new(Vec::new()));
        let (a, b) = (log.clone(), log.clone());
        let second = Trampoline::new(move |_| {
            b.borrow_mut().push(2);
            Trampoline::Fail
        });
        let first = Trampoline::new(move |rt| {
            a.borrow_mut().push(1);
            rt.push_rem(second.clone());
            Trampoline::Okay
        });
        Runtime::new(ProverConfig::default(), first).run().unwrap();
        assert_eq!(*log.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_every_alternative_is_tried() {
        let (count, tr) = counter();
        let mut rt = Runtime::new(ProverConfig::default(), tr.clone());
        rt.push_alt(tr.clone());
        rt.push_alt(tr);
        rt.run().unwrap();
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn test_restore_unwinds_trail() {
        let mut rt = Runtime::new(ProverConfig::default(), Trampoline::Fail);
        let x = Term::variable();
        let snapshot = rt.save();
        let r = x.as_free_reference().unwrap();
        rt.trail.set(&r, Term::int(1));
        rt.restore(&snapshot);
        assert!(x.as_free_reference().is_some());
        assert_eq!(snapshot.point_in_time(), 0);
    }

    #[test]
    fn test_step_limit() {
        fn spin() -> Trampoline {
            Trampoline::new(|_| spin())
        }
        let mut rt = Runtime::new(ProverConfig::with_step_limit(100), spin());
        assert!(matches!(rt.run(), Err(ProveError::StepLimit(100))));
    }

    #[test]
    fn test_default_handler_halts() {
        let (count, tr) = counter();
        let thrower = Trampoline::new(|rt| {
            rt.raise(Term::atom("boom"));
            Trampoline::Okay
        });
        let mut rt = Runtime::new(ProverConfig::default(), tr);
        rt.push_alt(thrower);
        match rt.run() {
            Err(ProveError::Uncaught { term, .. }) => assert_eq!(term.to_string(), "boom"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(count.get(), 0);
    }
}
