//! Renaming apart.
//!
//! [`Generalizer`] replaces variable atoms with fresh references so every
//! clause activation gets a private scope. [`Cloner`] copies a term as it
//! currently stands, replacing free references with fresh ones.

use hashbrown::HashMap;

use crate::term::{Atom, Reference, Term, Tree};

/// Maps variable atoms to fresh references, consistently within one instance.
#[derive(Default)]
pub struct Generalizer {
    variables: HashMap<Atom, Reference>,
    order: Vec<Atom>,
}

impl Generalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generalize(&mut self, term: &Term) -> Term {
        match term {
            Term::Atom(atom) if atom.is_wildcard() => Term::variable(),
            Term::Atom(atom) if atom.is_variable() => Term::Reference(self.reference(atom)),
            Term::Tree(tree) => {
                let left = self.generalize(&tree.left);
                let right = self.generalize(&tree.right);
                Term::tree(tree.operator, left, right)
            }
            _ => term.clone(),
        }
    }

    fn reference(&mut self, atom: &Atom) -> Reference {
        if let Some(reference) = self.variables.get(atom) {
            return reference.clone();
        }
        let reference = Reference::new();
        self.variables.insert(atom.clone(), reference.clone());
        self.order.push(atom.clone());
        reference
    }

    /// The reference standing for variable `name`, if it occurred.
    pub fn variable(&self, name: &str) -> Option<Reference> {
        self.variables.get(&Atom::new(name)).cloned()
    }

    /// Variables in order of first occurrence.
    pub fn variables(&self) -> impl Iterator<Item = (&Atom, &Reference)> + '_ {
        self.order
            .iter()
            .filter_map(move |atom| self.variables.get(atom).map(|r| (atom, r)))
    }
}

/// Structural copy under the current bindings.
#[derive(Default)]
pub struct Cloner {
    references: HashMap<Reference, Reference>,
}

impl Cloner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clone_term(&mut self, term: &Term) -> Term {
        match term.final_term() {
            Term::Reference(r) => Term::Reference(
                self.references
                    .entry(r)
                    .or_insert_with(Reference::new)
                    .clone(),
            ),
            Term::Tree(tree) => self.clone_tree(&tree),
            other => other,
        }
    }

    fn clone_tree(&mut self, tree: &Tree) -> Term {
        // Walk list spines iteratively; recurse only into the left operands.
        let mut spine = vec![(tree.operator, self.clone_term(&tree.left))];
        let mut right = tree.right.final_term();
        while let Term::Tree(next) = &right {
            spine.push((next.operator, self.clone_term(&next.left)));
            let following = next.right.final_term();
            right = following;
        }
        let tail = self.clone_term(&right);
        spine
            .into_iter()
            .rev()
            .fold(tail, |tail, (operator, left)| Term::tree(operator, left, tail))
    }
}
