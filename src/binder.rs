//! Compiling terms against variable slots.
//!
//! After generalization a clause mentions a fixed set of references. The
//! [`Binder`] numbers them and compiles terms into closures that rebuild or
//! match the term over an [`Env`] holding one fresh reference per slot, so a
//! clause is compiled once and activated any number of times.

use std::rc::Rc;

use hashbrown::HashMap;

use crate::generalizer::Cloner;
use crate::term::{Reference, Term};
use crate::trail::Trail;
use crate::unify;

/// Builds a term from an environment.
pub type TermSource = Rc<dyn Fn(&Env) -> Term>;

/// Matches a value against a compiled pattern, binding through the trail.
pub type BindPredicate = Rc<dyn Fn(&mut Trail, &Env, &Term) -> bool>;

/// Variable cells of one clause activation.
#[derive(Clone, Default)]
pub struct Env(Rc<[Reference]>);

impl Env {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn fresh(size: usize) -> Self {
        Self((0..size).map(|_| Reference::new()).collect())
    }

    pub fn get(&self, slot: usize) -> &Reference {
        &self.0[slot]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy where every slot that is currently free gets a new reference;
    /// bound slots keep theirs.
    pub fn refresh(&self) -> Self {
        Self(
            self.0
                .iter()
                .map(|r| match Term::Reference(r.clone()).as_free_reference() {
                    Some(_) => Reference::new(),
                    None => r.clone(),
                })
                .collect(),
        )
    }

    /// Detached copy holding each slot's current value. Free variables are
    /// renamed consistently across slots, so the copy outlives a later
    /// unwind of the trail.
    pub fn snapshot(&self) -> Self {
        let mut cloner = Cloner::new();
        Self(
            self.0
                .iter()
                .map(|r| match cloner.clone_term(&Term::Reference(r.clone())) {
                    Term::Reference(copy) => copy,
                    value => {
                        let cell = Reference::new();
                        cell.replace(Some(value));
                        cell
                    }
                })
                .collect(),
        )
    }
}

/// Assigns environment slots to references while compiling one clause.
#[derive(Default)]
pub struct Binder {
    slots: HashMap<Reference, usize>,
}

impl Binder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots an environment for this clause needs.
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// A fresh activation.
    pub fn env(&self) -> Env {
        Env::fresh(self.size())
    }

    /// The environment whose slots are the compiled references themselves,
    /// so compiled code acts on the caller's own variables. Used for queries
    /// and goals compiled at run time.
    pub fn identity_env(&self) -> Env {
        let mut references = vec![Reference::new(); self.size()];
        for (reference, &slot) in &self.slots {
            references[slot] = reference.clone();
        }
        Env(references.into())
    }

    fn slot(&mut self, reference: Reference) -> usize {
        let next = self.slots.len();
        *self.slots.entry(reference).or_insert(next)
    }

    pub fn compile(&mut self, term: &Term) -> TermSource {
        self.compile_part(term).unwrap_or_else(|| {
            let constant = term.final_term();
            Rc::new(move |_| constant.clone())
        })
    }

    /// `None` when `term` mentions no references and can be shared as is.
    fn compile_part(&mut self, term: &Term) -> Option<TermSource> {
        match term.final_term() {
            Term::Reference(r) => {
                let slot = self.slot(r);
                Some(Rc::new(move |env| Term::Reference(env.get(slot).clone())))
            }
            Term::Tree(tree) => {
                let operator = tree.operator;
                match (self.compile_part(&tree.left), self.compile_part(&tree.right)) {
                    (None, None) => None,
                    (left, right) => {
                        let left = left.unwrap_or_else(|| constant(&tree.left));
                        let right = right.unwrap_or_else(|| constant(&tree.right));
                        Some(Rc::new(move |env| Term::tree(operator, left(env), right(env))))
                    }
                }
            }
            _ => None,
        }
    }

    pub fn compile_bind(&mut self, term: &Term) -> BindPredicate {
        match term.final_term() {
            Term::Reference(r) => {
                let slot = self.slot(r);
                Rc::new(move |trail, env, value| {
                    unify::bind(&Term::Reference(env.get(slot).clone()), value, trail)
                })
            }
            Term::Tree(tree) => {
                let operator = tree.operator;
                let left = self.compile_bind(&tree.left);
                let right = self.compile_bind(&tree.right);
                let build = self.compile(&Term::Tree(tree.clone()));
                Rc::new(move |trail, env, value| match value.final_term() {
                    Term::Tree(other) if other.operator == operator => {
                        left(trail, env, &other.left) && right(trail, env, &other.right)
                    }
                    Term::Reference(free) => {
                        trail.set(&free, build(env));
                        true
                    }
                    _ => false,
                })
            }
            Term::Atom(atom) => Rc::new(move |trail, _, value| match value.final_term() {
                Term::Atom(other) => other == atom,
                Term::Reference(free) => {
                    trail.set(&free, Term::Atom(atom.clone()));
                    true
                }
                _ => false,
            }),
            Term::Int(n) => Rc::new(move |trail, _, value| match value.final_term() {
                Term::Int(other) => other == n,
                Term::Reference(free) => {
                    trail.set(&free, Term::Int(n));
                    true
                }
                _ => false,
            }),
            data @ Term::Data(_) => Rc::new(move |trail, _, value| unify::bind(&data, value, trail)),
        }
    }
}

fn constant(term: &Term) -> TermSource {
    let term = term.final_term();
    Rc::new(move |_| term.clone())
}
