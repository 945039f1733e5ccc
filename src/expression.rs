//! Integer arithmetic.
//!
//! Operator trees known at compile time become closures; anything else is
//! evaluated from its runtime value. Host errors come back as thrown terms.

use std::rc::Rc;

use crate::binder::{Binder, Env};
use crate::error::{evaluation_error, instantiation_error, type_error, CompileError};
use crate::term::{Operator, Term};

/// Evaluates a compiled expression in an environment.
pub type Evaluate = Rc<dyn Fn(&Env) -> Result<i64, Term>>;

fn is_arithmetic(operator: Operator) -> bool {
    matches!(
        operator,
        Operator::Plus | Operator::Minus | Operator::Mult | Operator::Divide | Operator::Modulo
    )
}

pub fn compile(binder: &mut Binder, term: &Term) -> Result<Evaluate, CompileError> {
    match term.final_term() {
        Term::Int(n) => Ok(Rc::new(move |_| Ok(n))),
        Term::Tree(tree) if is_arithmetic(tree.operator) => {
            let operator = tree.operator;
            let left = compile(binder, &tree.left)?;
            let right = compile(binder, &tree.right)?;
            Ok(Rc::new(move |env| apply(operator, left(env)?, right(env)?)))
        }
        Term::Atom(atom) if !atom.is_variable() => Err(CompileError::Expression(term.clone())),
        Term::Tree(_) if term.is_ground() => Err(CompileError::Expression(term.clone())),
        _ => {
            let source = binder.compile(term);
            Ok(Rc::new(move |env| evaluate(&source(env))))
        }
    }
}

/// Evaluates a term as it currently stands.
pub fn evaluate(term: &Term) -> Result<i64, Term> {
    match term.final_term() {
        Term::Int(n) => Ok(n),
        Term::Tree(tree) if is_arithmetic(tree.operator) => {
            apply(tree.operator, evaluate(&tree.left)?, evaluate(&tree.right)?)
        }
        Term::Reference(_) => Err(instantiation_error()),
        Term::Data(crate::term::Data::Suspend(suspend)) => match suspend.force() {
            Ok(value) => evaluate(&value),
            Err(error) => Err(crate::error::error_term(Term::constant(&error.to_string()))),
        },
        other => Err(type_error("integer", &other)),
    }
}

fn apply(operator: Operator, a: i64, b: i64) -> Result<i64, Term> {
    let result = match operator {
        Operator::Plus => a.checked_add(b),
        Operator::Minus => a.checked_sub(b),
        Operator::Mult => a.checked_mul(b),
        Operator::Divide | Operator::Modulo if b == 0 => {
            return Err(evaluation_error("zero.divisor"))
        }
        Operator::Divide => a.checked_div(b),
        Operator::Modulo => a.checked_rem_euclid(b),
        _ => return Err(type_error("evaluable", &Term::atom(operator.name()))),
    };
    result.ok_or_else(|| evaluation_error("int.overflow"))
}
