//! Public entry point.
//!
//! [`SewingProver`] compiles a rule set once; [`SewingProver::compile`] turns
//! a goal into a [`CompiledQuery`] that can be proved any number of times.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::debug;

use crate::binder::Env;
use crate::builtin::{BuiltinPredicate, SystemPredicates};
use crate::compile::Engine;
use crate::config::{EngineConfig, ProverConfig};
use crate::error::{CompileError, ProveError};
use crate::generalizer::Cloner;
use crate::ilist::IList;
use crate::kb::{RuleDatabase, RuleSet};
use crate::prototype::{NoRewriter, QueryRewriter};
use crate::runtime::{Runtime, Trampoline};
use crate::term::Term;

/// A compiled rule set.
pub struct SewingProver {
    engine: Rc<Engine>,
}

impl SewingProver {
    /// Compiles `rules` with the default configuration and system predicates.
    pub fn new(rules: &RuleSet) -> Result<Self, CompileError> {
        Self::builder(rules).build()
    }

    pub fn builder(rules: &RuleSet) -> SewingProverBuilder<'_> {
        SewingProverBuilder {
            rules,
            config: EngineConfig::default(),
            predicates: SystemPredicates::with_defaults(),
            rewriter: Rc::new(NoRewriter),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        self.engine.config()
    }

    /// Compiles a goal. Its variables must already be references (see
    /// [`Generalizer`](crate::generalizer::Generalizer)); proving it binds them.
    pub fn compile(&self, goal: &Term) -> Result<CompiledQuery, CompileError> {
        let (tr, env) = self.engine.compile_query(goal)?;
        Ok(CompiledQuery {
            _engine: self.engine.clone(),
            tr,
            env,
        })
    }
}

pub struct SewingProverBuilder<'a> {
    rules: &'a RuleSet,
    config: EngineConfig,
    predicates: SystemPredicates,
    rewriter: Rc<dyn QueryRewriter>,
}

impl<'a> SewingProverBuilder<'a> {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers a host predicate under `(namespace, name)`.
    pub fn builtin(
        mut self,
        namespace: &str,
        name: &str,
        predicate: impl BuiltinPredicate + 'static,
    ) -> Self {
        self.predicates.register(namespace, name, predicate);
        self
    }

    pub fn rewriter(mut self, rewriter: impl QueryRewriter + 'static) -> Self {
        self.rewriter = Rc::new(rewriter);
        self
    }

    pub fn build(self) -> Result<SewingProver, CompileError> {
        self.config.validate()?;
        let database = RuleDatabase::new(self.rules)?;
        debug!(
            "{} rules in {} predicates",
            self.rules.len(),
            database.len()
        );
        let engine = Engine::new(database, self.config, self.predicates, self.rewriter);
        engine.compile_all()?;
        Ok(SewingProver { engine })
    }
}

/// A goal ready to be proved.
pub struct CompiledQuery {
    _engine: Rc<Engine>,
    tr: Trampoline,
    env: Env,
}

impl CompiledQuery {
    /// Whether the goal has at least one solution. Bindings are undone
    /// before returning.
    pub fn prove(&self, config: &ProverConfig) -> Result<bool, ProveError> {
        let found = Rc::new(Cell::new(false));
        let record = found.clone();
        self.run(
            config,
            Trampoline::new(move |rt| {
                record.set(true);
                rt.alts = IList::nil();
                Trampoline::Fail
            }),
        )?;
        Ok(found.get())
    }

    /// A copy of `template` for every solution, in order.
    pub fn solve_all(&self, config: &ProverConfig, template: &Term) -> Result<Vec<Term>, ProveError> {
        let solutions = Rc::new(RefCell::new(Vec::new()));
        let collect = solutions.clone();
        let template = template.clone();
        self.run(
            config,
            Trampoline::new(move |_| {
                collect
                    .borrow_mut()
                    .push(Cloner::new().clone_term(&template));
                Trampoline::Fail
            }),
        )?;
        Ok(solutions.take())
    }

    fn run(&self, config: &ProverConfig, bottom: Trampoline) -> Result<(), ProveError> {
        let tr = self.tr.clone();
        let env = self.env.clone();
        let mut runtime = Runtime::new(
            config.clone(),
            Trampoline::new(move |rt| {
                rt.env = env.clone();
                rt.push_rem(bottom.clone());
                tr.clone()
            }),
        );
        runtime.run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{arguments, Prover};
    use crate::generalizer::Generalizer;
    use crate::parser::{parse, parse_term};
    use crate::term::Data;

    fn prover(source: &str) -> SewingProver {
        let program = parse(source).unwrap();
        SewingProver::new(&program.rules).unwrap()
    }

    /// Every binding of `var` across the solutions of `goal`.
    fn solve(prover: &SewingProver, goal: &str, var: &str) -> Result<Vec<String>, ProveError> {
        let mut generalizer = Generalizer::new();
        let goal = generalizer.generalize(&parse_term(goal).unwrap());
        let template = generalizer
            .variable(var)
            .map_or_else(Term::nil, Term::Reference);
        let query = prover.compile(&goal).unwrap();
        let solutions = query.solve_all(&ProverConfig::default(), &template)?;
        Ok(solutions.iter().map(|t| t.to_string()).collect())
    }

    fn holds(prover: &SewingProver, goal: &str) -> bool {
        let goal = Generalizer::new().generalize(&parse_term(goal).unwrap());
        prover
            .compile(&goal)
            .unwrap()
            .prove(&ProverConfig::default())
            .unwrap()
    }

    const MEMBER: &str = "
        member(X, [X | _]).
        member(X, [_ | T]) :- member(X, T).
    ";

    #[test]
    fn test_facts_and_rules() {
        let prover = prover(
            "parent(tom, bob).
             parent(bob, pat).
             ancestor(X, Y) :- parent(X, Y).
             ancestor(X, Z) :- parent(X, Y), ancestor(Y, Z).",
        );
        assert!(holds(&prover, "ancestor(tom, pat)"));
        assert!(!holds(&prover, "ancestor(pat, tom)"));
        assert_eq!(solve(&prover, "ancestor(tom, X)", "X").unwrap(), vec!["bob", "pat"]);
    }

    #[test]
    fn test_find_all_in_list_order() {
        let prover = prover(MEMBER);
        assert_eq!(
            solve(&prover, "find.all(X, member(X, [1, 2, 3]), L)", "L").unwrap(),
            vec!["[1, 2, 3]"]
        );
        assert_eq!(
            solve(&prover, "find.all(X, member(X, []), L)", "L").unwrap(),
            vec!["[]"]
        );
    }

    #[test]
    fn test_find_all_leaves_no_bindings() {
        let prover = prover(MEMBER);
        assert_eq!(
            solve(&prover, "find.all(X, member(X, [a, b]), L), free(X)", "L").unwrap(),
            vec!["[a, b]"]
        );
    }

    #[test]
    fn test_once_matches_first_solution() {
        let prover = prover("p(1). p(2). p(3).");
        assert_eq!(solve(&prover, "p(X)", "X").unwrap(), vec!["1", "2", "3"]);
        assert_eq!(solve(&prover, "once(p(X))", "X").unwrap(), vec!["1"]);
    }

    #[test]
    fn test_cut_commits_clause() {
        let prover = prover(
            "max(X, Y, X) :- X >= Y, !.
             max(_, Y, Y).
             p(1). p(2).
             first(X) :- p(X), !.",
        );
        assert_eq!(solve(&prover, "max(3, 2, M)", "M").unwrap(), vec!["3"]);
        assert_eq!(solve(&prover, "max(2, 3, M)", "M").unwrap(), vec!["3"]);
        assert_eq!(solve(&prover, "first(X)", "X").unwrap(), vec!["1"]);
        assert_eq!(
            solve(&prover, "(first(X) ; X = 9)", "X").unwrap(),
            vec!["1", "9"]
        );
    }

    #[test]
    fn test_cut_at_top_level_is_local() {
        let prover = prover("p(1). p(2).");
        assert_eq!(solve(&prover, "p(X), !", "X").unwrap(), vec!["1"]);
    }

    #[test]
    fn test_not() {
        let prover = prover("p(1).");
        assert!(holds(&prover, "not(fail)"));
        assert!(!holds(&prover, "not(true)"));
        assert!(holds(&prover, "not(p(2))"));
        assert_eq!(solve(&prover, "not(X = 1), X = 2", "X").unwrap(), Vec::<String>::new());
        assert_eq!(solve(&prover, "not(not(X = 1)), free(X)", "X").unwrap().len(), 1);
    }

    #[test]
    fn test_if_commits_to_first_condition_solution() {
        let prover = prover("p(1). p(2).");
        assert_eq!(
            solve(&prover, "if(p(X), Y = X, Y = none)", "Y").unwrap(),
            vec!["1"]
        );
        assert_eq!(
            solve(&prover, "if(p(3), Y = yes, Y = no)", "Y").unwrap(),
            vec!["no"]
        );
    }

    #[test]
    fn test_let_and_arithmetic() {
        let prover = prover(
            "len([], 0).
             len([_ | T], N) :- len(T, M), let(N, M + 1).",
        );
        assert_eq!(solve(&prover, "len([a, b, c], N)", "N").unwrap(), vec!["3"]);
        assert!(holds(&prover, "let(6, 2 * 3)"));
        assert!(!holds(&prover, "let(7, 2 * 3)"));
        assert_eq!(solve(&prover, "let(X, 7 mod 3 - 10 / 4)", "X").unwrap(), vec!["-1"]);
    }

    #[test]
    fn test_division_by_zero_is_catchable() {
        let prover = prover("");
        assert_eq!(
            solve(&prover, "try(let(X, 1 / 0), error(E), true)", "E").unwrap(),
            vec!["evaluation.error(zero.divisor)"]
        );
    }

    #[test]
    fn test_list_fold_in_list_order() {
        let prover = prover("");
        assert_eq!(
            solve(&prover, "list.fold([1, 2, 3]/0/R, E/A0/AX, let(AX, A0 * 10 + E))", "R").unwrap(),
            vec!["123"]
        );
        assert_eq!(
            solve(&prover, "list.fold([]/seed/R, E/A0/AX, AX = A0)", "R").unwrap(),
            vec!["seed"]
        );
    }

    #[test]
    fn test_list_fold_commits_each_element() {
        let prover = prover("p(1). p(2).");
        assert_eq!(
            solve(&prover, "list.fold([a, b]/0/R, E/A0/AX, (p(N), let(AX, A0 + N)))", "R").unwrap(),
            vec!["2"]
        );
    }

    #[test]
    fn test_list_fold_aborts_on_failing_element() {
        let prover = prover("");
        assert_eq!(
            solve(&prover, "list.fold([1, x, 3]/0/R, E/A0/AX, (is.int(E), let(AX, A0 + E)))", "R")
                .unwrap(),
            Vec::<String>::new()
        );
    }

    #[test]
    fn test_list_fold_scopes_free_variables_per_element() {
        let prover = prover("");
        assert_eq!(
            solve(
                &prover,
                "list.fold([1, 2]/0/R, E/A0/AX, (let(AX, A0 + E), Last = E)), free(Last)",
                "R"
            )
            .unwrap(),
            vec!["3"]
        );
        assert_eq!(
            solve(&prover, "K = 10, list.fold([1, 2]/0/R, E/A0/AX, let(AX, A0 + E + K))", "R").unwrap(),
            vec!["23"]
        );
    }

    #[test]
    fn test_list_query_is_a_choice_point() {
        let prover = prover("");
        assert_eq!(
            solve(&prover, "list.query([1, 2, 3, 4], E, (E > 2))", "E").unwrap(),
            vec!["3", "4"]
        );
        assert_eq!(
            solve(&prover, "list.query([], E, true)", "E").unwrap(),
            Vec::<String>::new()
        );
    }

    #[test]
    fn test_suspend_forced_by_host() {
        let prover = prover(MEMBER);
        let mut generalizer = Generalizer::new();
        let goal = generalizer.generalize(&parse_term("suspend(S, X, member(X, [only]))").unwrap());
        let s = Term::Reference(generalizer.variable("S").unwrap());
        let query = prover.compile(&goal).unwrap();
        let solutions = query.solve_all(&ProverConfig::default(), &s).unwrap();
        match solutions[0].final_term() {
            Term::Data(Data::Suspend(suspend)) => {
                assert!(!suspend.is_forced());
                assert_eq!(suspend.force().unwrap().to_string(), "only");
                assert!(suspend.is_forced());
            }
            other => panic!("not a suspension: {}", other),
        }
    }

    #[test]
    fn test_suspend_requires_exactly_one_result() {
        let prover = prover(MEMBER);
        let force = |source: &str| {
            let mut generalizer = Generalizer::new();
            let goal = generalizer.generalize(&parse_term(source).unwrap());
            let s = Term::Reference(generalizer.variable("S").unwrap());
            let solutions = prover
                .compile(&goal)
                .unwrap()
                .solve_all(&ProverConfig::default(), &s)
                .unwrap();
            match solutions[0].final_term() {
                Term::Data(Data::Suspend(suspend)) => suspend.force(),
                other => panic!("not a suspension: {}", other),
            }
        };
        assert!(matches!(force("suspend(S, X, member(X, []))"), Err(ProveError::NoResult)));
        assert!(matches!(
            force("suspend(S, X, member(X, [a, b]))"),
            Err(ProveError::Ambiguous(2))
        ));
    }

    #[test]
    fn test_suspend_on_bound_trigger_fails() {
        let prover = prover("");
        assert!(!holds(&prover, "suspend(done, X, X = 1)"));
    }

    #[test]
    fn test_suspend_value_used_in_arithmetic() {
        let prover = prover("");
        assert_eq!(
            solve(&prover, "suspend(S, X, let(X, 20 + 1)), let(Y, S * 2)", "Y").unwrap(),
            vec!["42"]
        );
    }

    #[test]
    fn test_suspend_keeps_bindings_after_query_ends() {
        let prover = prover("");
        let mut generalizer = Generalizer::new();
        let goal = generalizer.generalize(&parse_term("X = 5, suspend(S, Y, let(Y, X + 1))").unwrap());
        let s = Term::Reference(generalizer.variable("S").unwrap());
        let solutions = prover
            .compile(&goal)
            .unwrap()
            .solve_all(&ProverConfig::default(), &s)
            .unwrap();
        match solutions[0].final_term() {
            Term::Data(Data::Suspend(suspend)) => {
                assert_eq!(suspend.force().unwrap().as_int(), Some(6));
            }
            other => panic!("not a suspension: {}", other),
        }
    }

    #[test]
    fn test_try_catch_may_be_the_caught_value() {
        let prover = prover("");
        assert_eq!(
            solve(&prover, "try(throw(err(1)), err(X), X)", "X").unwrap(),
            vec!["1"]
        );
        assert!(holds(&prover, "try(throw(err(2)), err(_), 7)"));
        match solve(&prover, "try(throw(err(oops)), err(X), X)", "X") {
            Err(ProveError::Uncaught { term, .. }) => {
                assert!(term.to_string().starts_with("error(compile.error("))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_quoted_atoms_are_constants() {
        let prover = prover("name('Alice'). name(bob).");
        assert!(!holds(&prover, "name(carol)"));
        assert!(holds(&prover, "name('Alice')"));
        assert_eq!(
            solve(&prover, "name(N)", "N").unwrap(),
            vec!["'Alice'", "bob"]
        );
    }

    #[test]
    fn test_try_catches_matching_throw() {
        let prover = prover("");
        assert_eq!(
            solve(&prover, "try(throw(err(1)), err(X), true)", "X").unwrap(),
            vec!["1"]
        );
        assert_eq!(
            solve(&prover, "try(throw(err(1)), err(X), Y = caught(X))", "Y").unwrap(),
            vec!["caught(1)"]
        );
    }

    #[test]
    fn test_try_rolls_back_goal_bindings() {
        let prover = prover("");
        assert_eq!(
            solve(&prover, "try((X = 1, throw(oops)), oops, true), free(X)", "X")
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_try_reraises_non_matching() {
        let prover = prover("p :- throw(other).");
        assert_eq!(
            solve(&prover, "try(try(p, err(X), true), other, R = outer)", "R").unwrap(),
            vec!["outer"]
        );
    }

    #[test]
    fn test_uncaught_throw() {
        let prover = prover("p :- throw(err(2)).");
        match solve(&prover, "p", "X") {
            Err(ProveError::Uncaught { term, .. }) => assert_eq!(term.to_string(), "err(2)"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_handler_restored_after_goal() {
        let prover = prover("");
        match solve(&prover, "try(true, e, true), throw(late)", "X") {
            Err(ProveError::Uncaught { term, .. }) => assert_eq!(term.to_string(), "late"),
            other => panic!("unexpected {:?}", other),
        }
    }

    const COLORS: &str = "
        color(red, 1). color(green, 2). color(blue, 3).
        color(red, 4). color(cyan, 5). color(green, 6).
        color(magenta, 7). color(red, 8).
    ";

    #[test]
    fn test_indexing_is_transparent() {
        let program = parse(COLORS).unwrap();
        let indexed = SewingProver::new(&program.rules).unwrap();
        let plain = SewingProver::builder(&program.rules)
            .config(EngineConfig {
                indexing: false,
                ..EngineConfig::default()
            })
            .build()
            .unwrap();
        for goal in ["color(red, N)", "color(C, N)", "color(black, N)", "color(green, 6)"] {
            assert_eq!(
                solve(&indexed, goal, "N").unwrap(),
                solve(&plain, goal, "N").unwrap(),
                "{}",
                goal
            );
        }
        assert_eq!(solve(&indexed, "color(red, N)", "N").unwrap(), vec!["1", "4", "8"]);
    }

    #[test]
    fn test_indexing_with_variable_first_argument_falls_back() {
        let mut source = COLORS.to_string();
        source.push_str("color(_, 9).\n");
        let prover = prover(&source);
        assert_eq!(
            solve(&prover, "color(red, N)", "N").unwrap(),
            vec!["1", "4", "8", "9"]
        );
    }

    #[test]
    fn test_deep_recursion() {
        let prover = prover(
            "count(0).
             count(N) :- N > 0, let(M, N - 1), count(M).",
        );
        assert!(holds(&prover, "count(100000)"));
    }

    #[test]
    fn test_long_conjunction_list() {
        let prover = prover(
            "build(0, []) :- !.
             build(N, [N | T]) :- let(M, N - 1), build(M, T).
             len([], 0).
             len([_ | T], N) :- len(T, M), let(N, M + 1).",
        );
        assert_eq!(
            solve(&prover, "build(50000, L), len(L, N)", "N").unwrap(),
            vec!["50000"]
        );
    }

    #[test]
    fn test_mutual_recursion() {
        let prover = prover(
            "even(0).
             even(N) :- N > 0, let(M, N - 1), odd(M).
             odd(N) :- N > 0, let(M, N - 1), even(M).",
        );
        assert!(holds(&prover, "even(10)"));
        assert!(!holds(&prover, "odd(10)"));
    }

    #[test]
    fn test_step_limit() {
        let prover = prover("loop :- loop.");
        let goal = parse_term("loop").unwrap();
        let query = prover.compile(&goal).unwrap();
        assert!(matches!(
            query.prove(&ProverConfig::with_step_limit(1000)),
            Err(ProveError::StepLimit(1000))
        ));
    }

    #[test]
    fn test_dynamic_call() {
        let prover = prover("p(1). p(2).");
        assert_eq!(
            solve(&prover, "G = p(X), call(G)", "X").unwrap(),
            vec!["1", "2"]
        );
        assert_eq!(solve(&prover, "G = p(X), G, !", "X").unwrap(), vec!["1"]);
    }

    #[test]
    fn test_dynamic_call_errors_are_thrown() {
        let prover = prover("");
        assert_eq!(
            solve(&prover, "try(call(G), error(E), true)", "E").unwrap(),
            vec!["instantiation.error"]
        );
        assert_eq!(
            solve(&prover, "try(call(3), error(E), true)", "E").unwrap(),
            vec!["type.error(callable, 3)"]
        );
        let caught = solve(&prover, "try(call(nope), error(compile.error(M)), true)", "M").unwrap();
        assert_eq!(caught.len(), 1);
    }

    #[test]
    fn test_undefined_predicate_fails_compile() {
        let program = parse("p :- q.").unwrap();
        assert!(matches!(
            SewingProver::new(&program.rules),
            Err(CompileError::Undefined(_))
        ));
        let prover = prover("p.");
        let goal = parse_term("r(1)").unwrap();
        assert!(matches!(prover.compile(&goal), Err(CompileError::Undefined(_))));
    }

    #[test]
    fn test_wild_rule_rejected() {
        let program = parse("X :- true.").unwrap();
        assert!(matches!(
            SewingProver::new(&program.rules),
            Err(CompileError::WildRule(_))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let rules = RuleSet::new();
        let result = SewingProver::builder(&rules)
            .config(EngineConfig {
                index_threshold: 1,
                ..EngineConfig::default()
            })
            .build();
        assert!(matches!(result, Err(CompileError::Config(_))));
    }

    #[test]
    fn test_namespaced_builtin() {
        let program = parse("twice(X, Y) :- builtin(math, double, X/Y).").unwrap();
        let prover = SewingProver::builder(&program.rules)
            .builtin(
                "math",
                "double",
                |prover: &mut Prover<'_>, args: &Term| -> Result<bool, Term> {
                    let args = arguments(args);
                    let n = args[0].as_int().ok_or_else(|| args[0].clone())?;
                    Ok(prover.bind(&args[1], &Term::int(n * 2)))
                },
            )
            .build()
            .unwrap();
        assert_eq!(solve(&prover, "twice(21, Y)", "Y").unwrap(), vec!["42"]);
    }

    #[test]
    fn test_builtin_error_is_thrown() {
        let prover = prover("");
        assert_eq!(
            solve(&prover, "try(X < 1, error(E), true)", "E").unwrap(),
            vec!["instantiation.error"]
        );
    }

    #[test]
    fn test_source_goal() {
        let prover = prover("");
        let yes = Term::Data(Data::source(|| true));
        let no = Term::Data(Data::source(|| false));
        let config = ProverConfig::default();
        assert!(prover.compile(&yes).unwrap().prove(&config).unwrap());
        assert!(!prover.compile(&no).unwrap().prove(&config).unwrap());
    }

    #[test]
    fn test_unify_goal() {
        let prover = prover("");
        assert_eq!(
            solve(&prover, "f(X, b) = f(a, Y), Z = g(X, Y)", "Z").unwrap(),
            vec!["g(a, b)"]
        );
        assert!(!holds(&prover, "f(X, X) = f(a, b)"));
    }

    #[test]
    fn test_query_reusable() {
        let prover = prover("p(1).");
        let mut generalizer = Generalizer::new();
        let goal = generalizer.generalize(&parse_term("p(X)").unwrap());
        let query = prover.compile(&goal).unwrap();
        let config = ProverConfig::default();
        assert!(query.prove(&config).unwrap());
        assert!(query.prove(&config).unwrap());
        assert!(generalizer.variable("X").unwrap().is_free());
    }

    #[test]
    fn test_trace_enabled() {
        let program = parse(MEMBER).unwrap();
        let prover = SewingProver::builder(&program.rules)
            .config(EngineConfig {
                trace: true,
                trace_excludes: Vec::new(),
                ..EngineConfig::default()
            })
            .build()
            .unwrap();
        assert_eq!(
            solve(&prover, "member(X, [1, 2])", "X").unwrap(),
            vec!["1", "2"]
        );
    }

    #[test]
    fn test_uncaught_reports_trace_stack() {
        let program = parse("p :- q. q :- throw(boom).").unwrap();
        let prover = SewingProver::builder(&program.rules)
            .config(EngineConfig {
                trace: true,
                ..EngineConfig::default()
            })
            .build()
            .unwrap();
        match solve(&prover, "p", "X") {
            Err(ProveError::Uncaught { trace, .. }) => assert_eq!(trace, "q\np"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
