//! Term model for the prover.
//!
//! Every value the engine manipulates is a [`Term`]: atoms (some marked as
//! logical variables when read), integers, binary operator trees,
//! mutable variable cells ([`Reference`]) and opaque host data.
//!
//! Compound terms are encoded with [`Operator::Tuple`]: `f(a, b)` is the tree
//! `Tuple(f, Tuple(a, Tuple(b, [])))`. Lists are right-nested [`Operator::And`]
//! chains terminated by the `[]` atom.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ProveError;

/// Name of the empty list atom.
pub const NIL: &str = "[]";
/// Name of the cut atom.
pub const CUT: &str = "!";

/// A name, and whether the reader took it for a variable.
///
/// `Foo` and `'Foo'` are different atoms: only the first is a variable.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom {
    name: Rc<str>,
    variable: bool,
}

fn looks_like_variable(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_uppercase() || c == '_')
        && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

impl Atom {
    /// An atom named by convention: identifiers starting with an uppercase
    /// letter or underscore are variables.
    pub fn new(name: &str) -> Self {
        Self {
            name: Rc::from(name),
            variable: looks_like_variable(name),
        }
    }

    /// An atom that is never a variable, whatever its spelling.
    pub fn constant(name: &str) -> Self {
        Self {
            name: Rc::from(name),
            variable: false,
        }
    }

    pub fn nil() -> Self {
        Self::constant(NIL)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_variable(&self) -> bool {
        self.variable
    }

    /// The anonymous variable `_`; every occurrence is distinct.
    pub fn is_wildcard(&self) -> bool {
        self.variable && &*self.name == "_"
    }

    pub fn is_nil(&self) -> bool {
        &*self.name == NIL
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        let plain = !name.is_empty()
            && (name == NIL
                || name == CUT
                || self.is_variable()
                || name.chars().all(|c| "+-*/\\^<>=~:.?@#&$;,".contains(c))
                || (name.starts_with(|c: char| c.is_ascii_lowercase())
                    && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.')));
        if plain {
            write!(f, "{}", name)
        } else {
            write!(f, "'{}'", name.replace('\'', "''"))
        }
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Operator associativity, used for formatting and by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Left,
    Right,
    None,
}

/// Binary operators a [`Tree`] can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `;` disjunction
    Or,
    /// `,` conjunction and list cons
    And,
    /// `=` unification
    Equal,
    /// `\=`
    NotUnify,
    /// `==`
    Identical,
    /// `\==`
    NotIdentical,
    /// `=:=`
    ArithEq,
    /// `=\=`
    ArithNe,
    /// `<`
    Lt,
    /// `=<`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Mult,
    /// `/`
    Divide,
    /// `mod`
    Modulo,
    /// Functor application and argument chains.
    Tuple,
}

impl Operator {
    pub const ALL: [Operator; 18] = [
        Operator::Or,
        Operator::And,
        Operator::Equal,
        Operator::NotUnify,
        Operator::Identical,
        Operator::NotIdentical,
        Operator::ArithEq,
        Operator::ArithNe,
        Operator::Lt,
        Operator::Le,
        Operator::Gt,
        Operator::Ge,
        Operator::Plus,
        Operator::Minus,
        Operator::Mult,
        Operator::Divide,
        Operator::Modulo,
        Operator::Tuple,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operator::Or => ";",
            Operator::And => ",",
            Operator::Equal => "=",
            Operator::NotUnify => "\\=",
            Operator::Identical => "==",
            Operator::NotIdentical => "\\==",
            Operator::ArithEq => "=:=",
            Operator::ArithNe => "=\\=",
            Operator::Lt => "<",
            Operator::Le => "=<",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Mult => "*",
            Operator::Divide => "/",
            Operator::Modulo => "mod",
            Operator::Tuple => " ",
        }
    }

    pub fn precedence(self) -> u16 {
        match self {
            Operator::Or => 1100,
            Operator::And => 1000,
            Operator::Plus | Operator::Minus => 500,
            Operator::Mult | Operator::Divide | Operator::Modulo => 400,
            Operator::Tuple => 0,
            _ => 700,
        }
    }

    pub fn assoc(self) -> Assoc {
        match self {
            Operator::Or | Operator::And | Operator::Tuple => Assoc::Right,
            Operator::Plus
            | Operator::Minus
            | Operator::Mult
            | Operator::Divide
            | Operator::Modulo => Assoc::Left,
            _ => Assoc::None,
        }
    }

    pub fn from_name(name: &str) -> Option<Operator> {
        Self::ALL.iter().copied().find(|op| op.name() == name)
    }
}

/// A binary node.
pub struct Tree {
    pub operator: Operator,
    pub left: Term,
    pub right: Term,
}

impl Drop for Tree {
    // Long lists are right-nested; unlink the spine iteratively.
    fn drop(&mut self) {
        let mut next = std::mem::replace(&mut self.right, Term::Int(0));
        while let Term::Tree(tree) = next {
            match Rc::try_unwrap(tree) {
                Ok(mut tree) => next = std::mem::replace(&mut tree.right, Term::Int(0)),
                Err(_) => break,
            }
        }
    }
}

static NEXT_REFERENCE: AtomicU64 = AtomicU64::new(0);

struct Slot {
    id: u64,
    value: RefCell<Option<Term>>,
}

/// A logical variable cell. Only ever mutated through a [`Trail`](crate::trail::Trail).
#[derive(Clone)]
pub struct Reference(Rc<Slot>);

impl Reference {
    pub fn new() -> Self {
        Self(Rc::new(Slot {
            id: NEXT_REFERENCE.fetch_add(1, Ordering::Relaxed),
            value: RefCell::new(None),
        }))
    }

    /// Allocation order; older references have smaller ids.
    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn value(&self) -> Option<Term> {
        self.0.value.borrow().clone()
    }

    pub fn is_free(&self) -> bool {
        self.0.value.borrow().is_none()
    }

    pub(crate) fn replace(&self, value: Option<Term>) -> Option<Term> {
        self.0.value.replace(value)
    }
}

impl Default for Reference {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Reference {}

impl std::hash::Hash for Reference {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

enum SuspendState {
    Pending(Box<dyn FnOnce() -> Result<Term, ProveError>>),
    Forcing,
    Done(Result<Term, ProveError>),
}

/// A lazily evaluated value; forcing it runs the deferred proof once.
#[derive(Clone)]
pub struct Suspend(Rc<RefCell<SuspendState>>);

impl Suspend {
    pub fn new(f: impl FnOnce() -> Result<Term, ProveError> + 'static) -> Self {
        Self(Rc::new(RefCell::new(SuspendState::Pending(Box::new(f)))))
    }

    /// Runs the deferred computation on first call and memoises its outcome.
    pub fn force(&self) -> Result<Term, ProveError> {
        let pending = {
            let mut state = self.0.borrow_mut();
            match std::mem::replace(&mut *state, SuspendState::Forcing) {
                SuspendState::Pending(f) => f,
                SuspendState::Forcing => return Err(ProveError::RecursiveSuspend),
                SuspendState::Done(result) => {
                    *state = SuspendState::Done(result.clone());
                    return result;
                }
            }
        };
        let result = pending();
        *self.0.borrow_mut() = SuspendState::Done(result.clone());
        result
    }

    pub fn is_forced(&self) -> bool {
        matches!(&*self.0.borrow(), SuspendState::Done(_))
    }
}

/// Opaque host values carried inside terms.
#[derive(Clone)]
pub enum Data {
    Suspend(Suspend),
    /// A goal whose outcome is decided by the host.
    Source(Rc<dyn Fn() -> bool>),
    Host(Rc<dyn Any>),
}

impl Data {
    pub fn source(f: impl Fn() -> bool + 'static) -> Self {
        Data::Source(Rc::new(f))
    }

    pub fn ptr_eq(&self, other: &Data) -> bool {
        match (self, other) {
            (Data::Suspend(a), Data::Suspend(b)) => Rc::ptr_eq(&a.0, &b.0),
            (Data::Source(a), Data::Source(b)) => Rc::ptr_eq(a, b),
            (Data::Host(a), Data::Host(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// The universal value type.
#[derive(Clone)]
pub enum Term {
    Atom(Atom),
    Int(i64),
    Tree(Rc<Tree>),
    Reference(Reference),
    Data(Data),
}

impl Term {
    pub fn atom(name: &str) -> Term {
        Term::Atom(Atom::new(name))
    }

    /// An atom that never acts as a variable, as read from `'Quoted'` text.
    pub fn constant(name: &str) -> Term {
        Term::Atom(Atom::constant(name))
    }

    pub fn nil() -> Term {
        Term::Atom(Atom::nil())
    }

    pub fn int(n: i64) -> Term {
        Term::Int(n)
    }

    /// A fresh unbound variable cell.
    pub fn variable() -> Term {
        Term::Reference(Reference::new())
    }

    pub fn tree(operator: Operator, left: Term, right: Term) -> Term {
        Term::Tree(Rc::new(Tree {
            operator,
            left,
            right,
        }))
    }

    /// `name(args...)`; a call without arguments is the bare atom.
    pub fn call(name: &str, args: Vec<Term>) -> Term {
        if args.is_empty() {
            Term::constant(name)
        } else {
            Term::tree(Operator::Tuple, Term::constant(name), Term::tuple(args))
        }
    }

    /// Argument chain `Tuple(a1, Tuple(a2, ... []))`.
    pub fn tuple(items: Vec<Term>) -> Term {
        items
            .into_iter()
            .rev()
            .fold(Term::nil(), |tail, item| Term::tree(Operator::Tuple, item, tail))
    }

    pub fn list(items: Vec<Term>) -> Term {
        Term::list_with_tail(items, Term::nil())
    }

    pub fn list_with_tail(items: Vec<Term>, tail: Term) -> Term {
        items
            .into_iter()
            .rev()
            .fold(tail, |tail, item| Term::tree(Operator::And, item, tail))
    }

    /// Follows bound references to the value they stand for.
    pub fn final_term(&self) -> Term {
        let mut term = self.clone();
        loop {
            let next = match &term {
                Term::Reference(r) => r.value(),
                _ => None,
            };
            match next {
                Some(value) => term = value,
                None => return term,
            }
        }
    }

    pub fn as_atom(&self) -> Option<Atom> {
        match self.final_term() {
            Term::Atom(atom) => Some(atom),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.final_term() {
            Term::Int(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_tree(&self) -> Option<Rc<Tree>> {
        match self.final_term() {
            Term::Tree(tree) => Some(tree),
            _ => None,
        }
    }

    /// Left and right operands if this is a tree with the given operator.
    pub fn decompose(&self, operator: Operator) -> Option<(Term, Term)> {
        self.as_tree()
            .filter(|tree| tree.operator == operator)
            .map(|tree| (tree.left.clone(), tree.right.clone()))
    }

    /// A free variable cell, if this term (after dereferencing) is one.
    pub fn as_free_reference(&self) -> Option<Reference> {
        match self.final_term() {
            Term::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Splits `name(args...)` into its functor name and arguments.
    pub fn as_call(&self) -> Option<(Atom, Vec<Term>)> {
        let (head, args) = self.decompose(Operator::Tuple)?;
        let name = head.as_atom()?;
        Some((name, tuple_items(&args)?))
    }

    /// Items of an `And` chain and whatever terminates it.
    pub fn list_items(&self) -> (Vec<Term>, Term) {
        let mut items = Vec::new();
        let mut term = self.final_term();
        while let Some((head, tail)) = term.decompose(Operator::And) {
            items.push(head);
            term = tail.final_term();
        }
        (items, term)
    }

    pub fn is_nil(&self) -> bool {
        self.as_atom().map_or(false, |atom| atom.is_nil())
    }

    pub fn is_cut(&self) -> bool {
        self.as_atom().map_or(false, |atom| atom.name() == CUT)
    }

    /// True when no free reference or variable atom occurs in the term.
    pub fn is_ground(&self) -> bool {
        let mut stack = vec![self.clone()];
        while let Some(term) = stack.pop() {
            match term.final_term() {
                Term::Reference(_) => return false,
                Term::Atom(atom) if atom.is_variable() => return false,
                Term::Tree(tree) => {
                    stack.push(tree.left.clone());
                    stack.push(tree.right.clone());
                }
                _ => {}
            }
        }
        true
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, max: u16) -> fmt::Result {
        match self.final_term() {
            Term::Atom(atom) => write!(f, "{}", atom),
            Term::Int(n) => write!(f, "{}", n),
            Term::Reference(r) => write!(f, "_{}", r.id()),
            Term::Data(Data::Suspend(_)) => write!(f, "<suspend>"),
            Term::Data(Data::Source(_)) => write!(f, "<source>"),
            Term::Data(Data::Host(_)) => write!(f, "<data>"),
            term @ Term::Tree(_) => term.write_tree(f, max),
        }
    }

    fn write_tree(&self, f: &mut fmt::Formatter<'_>, max: u16) -> fmt::Result {
        if let Some((name, args)) = self.as_call() {
            write!(f, "{}(", name)?;
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                arg.write(f, 999)?;
            }
            return write!(f, ")");
        }

        let (items, tail) = self.list_items();
        if !items.is_empty() && tail.is_nil() {
            write!(f, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                item.write(f, 999)?;
            }
            return write!(f, "]");
        }

        let Some(tree) = self.as_tree() else {
            return self.write(f, max);
        };
        let operator = tree.operator;
        if operator == Operator::Tuple {
            write!(f, "(")?;
            tree.left.write(f, 999)?;
            write!(f, " ")?;
            tree.right.write(f, 999)?;
            return write!(f, ")");
        }

        let prec = operator.precedence();
        let (left_max, right_max) = match operator.assoc() {
            Assoc::Left => (prec, prec - 1),
            Assoc::Right => (prec - 1, prec),
            Assoc::None => (prec - 1, prec - 1),
        };
        let parens = prec > max;
        if parens {
            write!(f, "(")?;
        }
        tree.left.write(f, left_max)?;
        match operator {
            Operator::And | Operator::Or => write!(f, "{} ", operator.name())?,
            _ => write!(f, " {} ", operator.name())?,
        }
        tree.right.write(f, right_max)?;
        if parens {
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// Items of a `Tuple` argument chain, or `None` if it is improper.
pub fn tuple_items(term: &Term) -> Option<Vec<Term>> {
    let mut items = Vec::new();
    let mut term = term.final_term();
    loop {
        if term.is_nil() {
            return Some(items);
        }
        let (head, tail) = term.decompose(Operator::Tuple)?;
        items.push(head);
        term = tail.final_term();
    }
}

impl From<Atom> for Term {
    fn from(atom: Atom) -> Self {
        Term::Atom(atom)
    }
}

impl From<i64> for Term {
    fn from(n: i64) -> Self {
        Term::Int(n)
    }
}

impl From<Reference> for Term {
    fn from(r: Reference) -> Self {
        Term::Reference(r)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, 1200)
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Structural identity under current bindings.
impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        crate::unify::identical(self, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_naming() {
        assert!(Atom::new("X").is_variable());
        assert!(Atom::new("_Tail").is_variable());
        assert!(Atom::new("_").is_wildcard());
        assert!(!Atom::new("foo").is_variable());
        assert!(!Atom::new(NIL).is_variable());
    }

    #[test]
    fn test_call_encoding() {
        let term = Term::call("f", vec![Term::atom("a"), Term::int(1)]);
        let (name, args) = term.as_call().unwrap();
        assert_eq!(name.name(), "f");
        assert_eq!(args.len(), 2);
        assert_eq!(args[1].as_int(), Some(1));
        assert!(Term::call("g", vec![]).as_atom().is_some());
    }

    #[test]
    fn test_list_items() {
        let list = Term::list(vec![Term::int(1), Term::int(2), Term::int(3)]);
        let (items, tail) = list.list_items();
        assert_eq!(items.len(), 3);
        assert!(tail.is_nil());
        assert_eq!(list.to_string(), "[1, 2, 3]");
    }

    #[test]
    fn test_final_term_follows_chain() {
        let a = Reference::new();
        let b = Reference::new();
        a.replace(Some(Term::Reference(b.clone())));
        b.replace(Some(Term::int(7)));
        assert_eq!(Term::Reference(a).final_term().as_int(), Some(7));
    }

    #[test]
    fn test_display_operators() {
        let sum = Term::tree(
            Operator::Mult,
            Term::tree(Operator::Plus, Term::int(1), Term::int(2)),
            Term::int(3),
        );
        assert_eq!(sum.to_string(), "(1 + 2) * 3");
        let goal = Term::tree(Operator::And, Term::atom("p"), Term::atom("q"));
        assert_eq!(goal.to_string(), "p, q");
        assert_eq!(Term::atom("Hello World").to_string(), "'Hello World'");
        assert_eq!(
            Term::call("find.all", vec![Term::atom("X")]).to_string(),
            "find.all(X)"
        );
    }

    #[test]
    fn test_suspend_memoises() {
        let runs = Rc::new(std::cell::Cell::new(0));
        let counter = runs.clone();
        let suspend = Suspend::new(move || {
            counter.set(counter.get() + 1);
            Ok(Term::int(42))
        });
        assert!(!suspend.is_forced());
        assert_eq!(suspend.force().unwrap().as_int(), Some(42));
        assert_eq!(suspend.force().unwrap().as_int(), Some(42));
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_ground() {
        assert!(Term::call("f", vec![Term::atom("a")]).is_ground());
        assert!(!Term::call("f", vec![Term::atom("X")]).is_ground());
        assert!(!Term::call("f", vec![Term::variable()]).is_ground());
    }

    #[test]
    fn test_long_list_drops() {
        let items = (0..200_000).map(Term::int).collect();
        let list = Term::list(items);
        drop(list);
    }
}
