//! Structural unification.

use std::rc::Rc;

use crate::term::{Reference, Term};
use crate::trail::Trail;

/// Unifies `a` with `b`, recording bindings on `trail`.
///
/// On failure every binding made by this call has already been undone.
pub fn bind(a: &Term, b: &Term, trail: &mut Trail) -> bool {
    let point = trail.point_in_time();
    if bind0(a, b, trail) {
        true
    } else {
        trail.unwind(point);
        false
    }
}

fn bind0(a: &Term, b: &Term, trail: &mut Trail) -> bool {
    let mut pending = vec![(a.clone(), b.clone())];
    while let Some((a, b)) = pending.pop() {
        match (a.final_term(), b.final_term()) {
            (Term::Reference(ra), Term::Reference(rb)) => {
                if ra != rb {
                    bind_references(&ra, &rb, trail);
                }
            }
            (Term::Reference(r), other) | (other, Term::Reference(r)) => {
                trail.set(&r, other);
            }
            (Term::Atom(x), Term::Atom(y)) => {
                if x != y {
                    return false;
                }
            }
            (Term::Int(x), Term::Int(y)) => {
                if x != y {
                    return false;
                }
            }
            (Term::Tree(x), Term::Tree(y)) => {
                if Rc::ptr_eq(&x, &y) {
                    continue;
                }
                if x.operator != y.operator {
                    return false;
                }
                pending.push((x.right.clone(), y.right.clone()));
                pending.push((x.left.clone(), y.left.clone()));
            }
            (Term::Data(x), Term::Data(y)) => {
                if !x.ptr_eq(&y) {
                    return false;
                }
            }
            _ => return false,
        }
    }
    true
}

// The younger cell always points at the older one.
fn bind_references(a: &Reference, b: &Reference, trail: &mut Trail) {
    if a.id() > b.id() {
        trail.set(a, Term::Reference(b.clone()));
    } else {
        trail.set(b, Term::Reference(a.clone()));
    }
}

/// Structural identity under current bindings; never binds anything.
pub fn identical(a: &Term, b: &Term) -> bool {
    let mut pending = vec![(a.clone(), b.clone())];
    while let Some((a, b)) = pending.pop() {
        let same = match (a.final_term(), b.final_term()) {
            (Term::Reference(x), Term::Reference(y)) => x == y,
            (Term::Atom(x), Term::Atom(y)) => x == y,
            (Term::Int(x), Term::Int(y)) => x == y,
            (Term::Data(x), Term::Data(y)) => x.ptr_eq(&y),
            (Term::Tree(x), Term::Tree(y)) => {
                if !Rc::ptr_eq(&x, &y) {
                    if x.operator != y.operator {
                        return false;
                    }
                    pending.push((x.right.clone(), y.right.clone()));
                    pending.push((x.left.clone(), y.left.clone()));
                }
                true
            }
            _ => false,
        };
        if !same {
            return false;
        }
    }
    true
}
