//! Indexing signatures for goals and rule heads.

use std::fmt;

use crate::term::{tuple_items, Atom, Operator, Term};

/// Hash key selecting candidate rules.
///
/// Two terms that could unify always have the same prototype; the converse
/// does not hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Prototype {
    Atom(Atom),
    Int(i64),
    Functor(Atom, usize),
    Operator(Operator),
}

impl Prototype {
    /// `None` for variables, references and host data.
    pub fn of(term: &Term) -> Option<Prototype> {
        match term.final_term() {
            Term::Atom(atom) if atom.is_variable() => None,
            Term::Atom(atom) => Some(Prototype::Atom(atom)),
            Term::Int(n) => Some(Prototype::Int(n)),
            Term::Tree(tree) if tree.operator == Operator::Tuple => match tree.left.final_term() {
                Term::Atom(name) if !name.is_variable() => {
                    tuple_items(&tree.right).map(|args| Prototype::Functor(name, args.len()))
                }
                Term::Atom(_) | Term::Reference(_) => None,
                _ => Some(Prototype::Operator(Operator::Tuple)),
            },
            Term::Tree(tree) => Some(Prototype::Operator(tree.operator)),
            Term::Reference(_) | Term::Data(_) => None,
        }
    }

    /// Prototype of the `n`th argument (0-based) of a call, or of an operand.
    pub fn of_argument(term: &Term, n: usize) -> Option<Prototype> {
        if let Some((_, args)) = term.as_call() {
            return args.get(n).and_then(Prototype::of);
        }
        let tree = term.as_tree()?;
        match n {
            0 => Prototype::of(&tree.left),
            1 => Prototype::of(&tree.right),
            _ => None,
        }
    }

    /// Predicate name, for atoms and functors.
    pub fn name(&self) -> Option<&str> {
        match self {
            Prototype::Atom(atom) | Prototype::Functor(atom, _) => Some(atom.name()),
            _ => None,
        }
    }
}

impl fmt::Display for Prototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prototype::Atom(atom) => write!(f, "{}", atom),
            Prototype::Int(n) => write!(f, "{}", n),
            Prototype::Functor(atom, arity) => write!(f, "{}/{}", atom, arity),
            Prototype::Operator(op) => write!(f, "({})", op.name()),
        }
    }
}

/// Hook to specialise goals against a prototype before they are bound.
pub trait QueryRewriter {
    fn rewrite(&self, prototype: &Prototype, term: &Term) -> Term;

    fn get_prototype(&self, prototype: &Prototype, term: &Term, n: usize) -> Option<Prototype>;
}

/// Identity rewriter.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRewriter;

impl QueryRewriter for NoRewriter {
    fn rewrite(&self, _prototype: &Prototype, term: &Term) -> Term {
        term.clone()
    }

    fn get_prototype(&self, _prototype: &Prototype, term: &Term, n: usize) -> Option<Prototype> {
        Prototype::of_argument(term, n)
    }
}
