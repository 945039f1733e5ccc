//! Host predicates.
//!
//! A [`BuiltinPredicate`] receives the prover handle and its argument term and
//! answers whether the goal holds. Genuine host errors are reported as `Err`
//! carrying the term to throw, never as plain failure.

use std::rc::Rc;

use hashbrown::HashMap;
use log::info;

use crate::config::ProverConfig;
use crate::expression;
use crate::term::{tuple_items, Operator, Term};
use crate::trail::Trail;
use crate::unify;

/// Namespace holding predicates callable by bare name.
pub const SYSTEM: &str = "system";

/// Handle through which builtins see the running proof.
pub struct Prover<'a> {
    config: &'a ProverConfig,
    trail: &'a mut Trail,
}

impl<'a> Prover<'a> {
    pub fn new(config: &'a ProverConfig, trail: &'a mut Trail) -> Self {
        Self { config, trail }
    }

    pub fn config(&self) -> &ProverConfig {
        self.config
    }

    pub fn trail(&mut self) -> &mut Trail {
        self.trail
    }

    /// Unifies two terms; bindings are undone on backtracking.
    pub fn bind(&mut self, a: &Term, b: &Term) -> bool {
        unify::bind(a, b, self.trail)
    }
}

pub trait BuiltinPredicate {
    fn prove(&self, prover: &mut Prover<'_>, args: &Term) -> Result<bool, Term>;
}

impl<F> BuiltinPredicate for F
where
    F: Fn(&mut Prover<'_>, &Term) -> Result<bool, Term>,
{
    fn prove(&self, prover: &mut Prover<'_>, args: &Term) -> Result<bool, Term> {
        self(prover, args)
    }
}

/// Arguments as passed to a builtin: an argument chain, the operands of an
/// operator goal, or nothing for a bare atom.
pub fn arguments(args: &Term) -> Vec<Term> {
    if args.is_nil() {
        return Vec::new();
    }
    if let Some(items) = tuple_items(args) {
        return items;
    }
    match args.as_tree() {
        Some(tree) => vec![tree.left.clone(), tree.right.clone()],
        None => vec![args.clone()],
    }
}

/// Registry of builtins keyed by `(namespace, name)`.
#[derive(Default, Clone)]
pub struct SystemPredicates {
    predicates: HashMap<(String, String), Rc<dyn BuiltinPredicate>>,
}

impl SystemPredicates {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the comparison and type-test predicates.
    pub fn with_defaults() -> Self {
        let mut predicates = Self::new();
        for operator in [
            Operator::Lt,
            Operator::Le,
            Operator::Gt,
            Operator::Ge,
            Operator::ArithEq,
            Operator::ArithNe,
        ] {
            predicates.register(SYSTEM, operator.name(), compare(operator));
        }
        predicates.register(SYSTEM, Operator::Identical.name(), |_: &mut Prover<'_>, args: &Term| -> Result<bool, Term> {
            let [a, b] = two(args)?;
            Ok(unify::identical(&a, &b))
        });
        predicates.register(SYSTEM, Operator::NotIdentical.name(), |_: &mut Prover<'_>, args: &Term| -> Result<bool, Term> {
            let [a, b] = two(args)?;
            Ok(!unify::identical(&a, &b))
        });
        predicates.register(SYSTEM, Operator::NotUnify.name(), |prover: &mut Prover<'_>, args: &Term| -> Result<bool, Term> {
            let [a, b] = two(args)?;
            let point = prover.trail().point_in_time();
            let unifies = prover.bind(&a, &b);
            prover.trail().unwind(point);
            Ok(!unifies)
        });
        predicates.register(SYSTEM, "is.atom", type_test(|t| matches!(t, Term::Atom(_))));
        predicates.register(SYSTEM, "is.int", type_test(|t| matches!(t, Term::Int(_))));
        predicates.register(SYSTEM, "is.tree", type_test(|t| matches!(t, Term::Tree(_))));
        predicates.register(SYSTEM, "bound", type_test(|t| !matches!(t, Term::Reference(_))));
        predicates.register(SYSTEM, "free", type_test(|t| matches!(t, Term::Reference(_))));
        predicates.register(SYSTEM, "dump", |_: &mut Prover<'_>, args: &Term| {
            for arg in arguments(args) {
                info!("{}", arg);
            }
            Ok(true)
        });
        predicates
    }

    pub fn register(
        &mut self,
        namespace: &str,
        name: &str,
        predicate: impl BuiltinPredicate + 'static,
    ) {
        self.predicates
            .insert((namespace.to_string(), name.to_string()), Rc::new(predicate));
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<Rc<dyn BuiltinPredicate>> {
        self.predicates
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Lookup in the [`SYSTEM`] namespace.
    pub fn system(&self, name: &str) -> Option<Rc<dyn BuiltinPredicate>> {
        self.get(SYSTEM, name)
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

fn two(args: &Term) -> Result<[Term; 2], Term> {
    match <[Term; 2]>::try_from(arguments(args)) {
        Ok(pair) => Ok(pair),
        Err(_) => Err(crate::error::type_error("pair", args)),
    }
}

fn compare(operator: Operator) -> impl BuiltinPredicate {
    move |_: &mut Prover<'_>, args: &Term| -> Result<bool, Term> {
        let [a, b] = two(args)?;
        let (a, b) = (expression::evaluate(&a)?, expression::evaluate(&b)?);
        Ok(match operator {
            Operator::Lt => a < b,
            Operator::Le => a <= b,
            Operator::Gt => a > b,
            Operator::Ge => a >= b,
            Operator::ArithEq => a == b,
            _ => a != b,
        })
    }
}

fn type_test(test: fn(&Term) -> bool) -> impl BuiltinPredicate {
    move |_: &mut Prover<'_>, args: &Term| match arguments(args).as_slice() {
        [arg] => Ok(test(&arg.final_term())),
        _ => Err(crate::error::type_error("single.argument", args)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(predicates: &SystemPredicates, name: &str, args: &Term) -> Result<bool, Term> {
        let config = ProverConfig::default();
        let mut trail = Trail::new();
        let mut prover = Prover::new(&config, &mut trail);
        predicates.system(name).unwrap().prove(&mut prover, args)
    }

    #[test]
    fn test_arguments_shapes() {
        assert_eq!(arguments(&Term::nil()).len(), 0);
        assert_eq!(arguments(&Term::tuple(vec![Term::int(1), Term::int(2), Term::int(3)])).len(), 3);
        let op = Term::tree(Operator::Lt, Term::int(1), Term::int(2));
        assert_eq!(arguments(&op).len(), 2);
    }

    #[test]
    fn test_comparisons() {
        let predicates = SystemPredicates::with_defaults();
        let lt = Term::tree(Operator::Lt, Term::int(1), Term::int(2));
        assert_eq!(call(&predicates, "<", &lt), Ok(true));
        let ge = Term::tree(
            Operator::Ge,
            Term::tree(Operator::Plus, Term::int(1), Term::int(1)),
            Term::int(3),
        );
        assert_eq!(call(&predicates, ">=", &ge), Ok(false));
    }

    #[test]
    fn test_comparison_of_unbound_throws() {
        let predicates = SystemPredicates::with_defaults();
        let lt = Term::tree(Operator::Lt, Term::variable(), Term::int(2));
        let error = call(&predicates, "<", &lt).unwrap_err();
        assert_eq!(error.to_string(), "error(instantiation.error)");
    }

    #[test]
    fn test_not_unify_leaves_no_bindings() {
        let predicates = SystemPredicates::with_defaults();
        let x = Term::variable();
        let goal = Term::tree(Operator::NotUnify, x.clone(), Term::int(1));
        assert_eq!(call(&predicates, "\\=", &goal), Ok(false));
        assert!(x.as_free_reference().is_some());
    }

    #[test]
    fn test_type_tests() {
        let predicates = SystemPredicates::with_defaults();
        let args = Term::tuple(vec![Term::atom("a")]);
        assert_eq!(call(&predicates, "is.atom", &args), Ok(true));
        assert_eq!(call(&predicates, "is.int", &args), Ok(false));
        let args = Term::tuple(vec![Term::variable()]);
        assert_eq!(call(&predicates, "free", &args), Ok(true));
    }

    #[test]
    fn test_register_namespaced() {
        let mut predicates = SystemPredicates::new();
        predicates.register("math", "even", |_: &mut Prover<'_>, args: &Term| {
            Ok(arguments(args)[0].as_int().map_or(false, |n| n % 2 == 0))
        });
        assert!(predicates.get("math", "even").is_some());
        assert!(predicates.system("even").is_none());
    }
}
