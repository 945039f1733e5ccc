//! Undo log for variable bindings.

use crate::term::{Reference, Term};

/// Every binding made during a proof, with the value it replaced.
#[derive(Default)]
pub struct Trail {
    entries: Vec<(Reference, Option<Term>)>,
}

impl Trail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current position; pass it to [`Trail::unwind`] to roll back to here.
    pub fn point_in_time(&self) -> usize {
        self.entries.len()
    }

    /// Binds `reference` to `value`, remembering the previous content.
    pub fn set(&mut self, reference: &Reference, value: Term) {
        let previous = reference.replace(Some(value));
        self.entries.push((reference.clone(), previous));
    }

    /// Undoes every binding recorded after `point`, most recent first.
    pub fn unwind(&mut self, point: usize) {
        while self.entries.len() > point {
            if let Some((reference, previous)) = self.entries.pop() {
                reference.replace(previous);
            }
        }
    }

    pub fn unwind_all(&mut self) {
        self.unwind(0);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
