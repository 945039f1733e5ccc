//! Rule and goal compilation.
//!
//! The [`Engine`] turns every predicate of a [`RuleDatabase`] into one
//! trampoline stored in a per-prototype cell. Calls go through the cell at run
//! time, so predicates can refer to each other in any order.
//!
//! Compiling a predicate:
//! 1. Each rule is renamed apart, its head compiled to a bind predicate and
//!    its body to a trampoline over a slot environment
//! 2. The rules become one disjunction, wrapped in a cut barrier when any body
//!    cuts, then in an environment save and the optional trace wrapper
//! 3. Large buckets whose first arguments are all indexable get one such
//!    disjunction per first-argument prototype, chosen at call time

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use hashbrown::HashMap;
use log::{debug, info, warn};

use crate::analyze::{self, Goal};
use crate::binder::{Binder, Env, TermSource};
use crate::builtin::{BuiltinPredicate, SystemPredicates};
use crate::config::EngineConfig;
use crate::control::{self, Fold};
use crate::error::{compile_error, instantiation_error, type_error, CompileError};
use crate::expression;
use crate::generalizer::Generalizer;
use crate::kb::{index_by_first_argument, Rule, RuleDatabase};
use crate::prototype::{Prototype, QueryRewriter};
use crate::runtime::{Runtime, Trampoline};
use crate::term::{Operator, Term};

/// Mutable holder of a predicate's compiled trampoline.
pub type Cell = Rc<RefCell<Trampoline>>;

pub struct Engine {
    database: RuleDatabase,
    config: EngineConfig,
    predicates: SystemPredicates,
    rewriter: Rc<dyn QueryRewriter>,
    cells: RefCell<HashMap<Prototype, Cell>>,
    this: Weak<Engine>,
}

impl Engine {
    pub fn new(
        database: RuleDatabase,
        config: EngineConfig,
        predicates: SystemPredicates,
        rewriter: Rc<dyn QueryRewriter>,
    ) -> Rc<Engine> {
        Rc::new_cyclic(|this| Engine {
            database,
            config,
            predicates,
            rewriter,
            cells: RefCell::new(HashMap::new()),
            this: this.clone(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn database(&self) -> &RuleDatabase {
        &self.database
    }

    fn cell(&self, prototype: &Prototype) -> Cell {
        self.cells
            .borrow_mut()
            .entry(prototype.clone())
            .or_insert_with(|| Rc::new(RefCell::new(Trampoline::Fail)))
            .clone()
    }

    /// Compiles every predicate into its cell.
    pub fn compile_all(&self) -> Result<(), CompileError> {
        for (prototype, _) in self.database.iter() {
            self.cell(prototype);
        }
        for (prototype, rules) in self.database.iter() {
            let tr = self.compile_predicate(prototype, rules)?;
            *self.cell(prototype).borrow_mut() = tr;
        }
        debug!("compiled {} predicates", self.database.len());
        Ok(())
    }

    fn compile_predicate(
        &self,
        prototype: &Prototype,
        rules: &[Rule],
    ) -> Result<Trampoline, CompileError> {
        let all = self.compile_rules(prototype, rules)?;

        if !self.config.indexing || rules.len() < self.config.index_threshold {
            return Ok(all);
        }
        let groups = match index_by_first_argument(rules) {
            Some(groups) if groups.len() > 1 => groups,
            _ => {
                debug!("{}: first arguments not indexable", prototype);
                return Ok(all);
            }
        };

        let mut by_argument = HashMap::new();
        for (argument, group) in &groups {
            by_argument.insert(argument.clone(), self.compile_rules(prototype, group)?);
        }
        debug!(
            "{}: {} rules indexed into {} sub-buckets",
            prototype,
            rules.len(),
            by_argument.len()
        );

        let rewriter = self.rewriter.clone();
        let prototype = prototype.clone();
        Ok(Trampoline::new(move |rt| {
            rewriter
                .get_prototype(&prototype, &rt.query, 0)
                .and_then(|argument| by_argument.get(&argument))
                .unwrap_or(&all)
                .clone()
        }))
    }

    fn compile_rules(
        &self,
        prototype: &Prototype,
        rules: &[Rule],
    ) -> Result<Trampoline, CompileError> {
        let has_cut = rules.iter().any(|rule| analyze::contains_cut(&rule.tail));
        let alternatives = rules
            .iter()
            .map(|rule| self.compile_rule(prototype, rule))
            .collect::<Result<Vec<_>, _>>()?;

        let mut tr = control::or(alternatives);
        if has_cut {
            tr = control::cut_begin(tr);
        }
        tr = control::save_env(tr);
        if self.config.is_traced(&prototype.to_string()) {
            tr = trace(tr);
        }
        Ok(tr)
    }

    fn compile_rule(&self, prototype: &Prototype, rule: &Rule) -> Result<Trampoline, CompileError> {
        let mut generalizer = Generalizer::new();
        let head = generalizer.generalize(&self.rewriter.rewrite(prototype, &rule.head));
        let tail = generalizer.generalize(&rule.tail);

        let mut binder = Binder::new();
        let bind_head = binder.compile_bind(&head);
        let body = self.compile_goal(&mut binder, &tail)?;
        let size = binder.size();

        Ok(Trampoline::new(move |rt| {
            rt.env = Env::fresh(size);
            if bind_head(&mut rt.trail, &rt.env, &rt.query) {
                body.clone()
            } else {
                Trampoline::Fail
            }
        }))
    }

    /// Compiles a top-level goal whose variables are already references.
    /// Returns the trampoline and the environment it runs in.
    pub fn compile_query(&self, goal: &Term) -> Result<(Trampoline, Env), CompileError> {
        let mut binder = Binder::new();
        let tr = self.compile_goal(&mut binder, goal)?;
        Ok((control::cut_begin(tr), binder.identity_env()))
    }

    pub fn compile_goal(&self, binder: &mut Binder, goal: &Term) -> Result<Trampoline, CompileError> {
        let tr = match analyze::classify(goal) {
            Goal::And(goals) => control::and(self.compile_goals(binder, &goals)?),
            Goal::Or(goals) => control::or(self.compile_goals(binder, &goals)?),
            Goal::Unify(left, right) => {
                let (complex, simple) = if analyze::complexity(&left) > analyze::complexity(&right) {
                    (left, right)
                } else {
                    (right, left)
                };
                control::unify(binder.compile_bind(&complex), binder.compile(&simple))
            }
            Goal::Builtin {
                namespace,
                name,
                args,
            } => {
                let (namespace, name) = match (namespace.as_atom(), name.as_atom()) {
                    (Some(namespace), Some(name)) => (namespace, name),
                    _ => return Err(CompileError::MalformedBuiltin(goal.clone())),
                };
                let predicate = self
                    .predicates
                    .get(namespace.name(), name.name())
                    .ok_or_else(|| CompileError::UnknownBuiltin {
                        namespace: namespace.name().to_string(),
                        name: name.name().to_string(),
                    })?;
                control::builtin(predicate, binder.compile(&args))
            }
            Goal::FindAll {
                template,
                goal,
                result,
            } => {
                let template = binder.compile(&template);
                let goal = self.compile_goal(binder, &goal)?;
                let result = binder.compile_bind(&result);
                control::find_all(template, control::cut_begin(goal), result)
            }
            Goal::If { cond, then, else_ } => {
                let cond = self.compile_goal(binder, &cond)?;
                let then = self.compile_goal(binder, &then)?;
                let else_ = self.compile_goal(binder, &else_)?;
                control::if_(control::cut_begin(cond), then, else_)
            }
            Goal::Let { var, expr } => {
                let var = binder.compile_bind(&var);
                let expr = expression::compile(binder, &expr)?;
                control::let_(var, expr)
            }
            Goal::ListFold(shape) => {
                let list = binder.compile(&shape.list);
                let seed = binder.compile(&shape.seed);
                let result = binder.compile_bind(&shape.result);
                let elem = binder.compile_bind(&shape.elem);
                let acc0 = binder.compile_bind(&shape.acc0);
                let accx = binder.compile(&shape.accx);
                let body = control::cut_begin(self.compile_goal(binder, &shape.body)?);
                control::list_fold(Fold {
                    list,
                    seed,
                    result,
                    elem,
                    acc0,
                    accx,
                    body,
                })
            }
            Goal::ListQuery { list, bind, body } => {
                let list = binder.compile(&list);
                let bind = binder.compile_bind(&bind);
                let body = self.compile_goal(binder, &body)?;
                control::list_query(list, bind, body)
            }
            Goal::Not(goal) => control::not(control::cut_begin(self.compile_goal(binder, &goal)?)),
            Goal::Once(goal) => control::once(control::cut_begin(self.compile_goal(binder, &goal)?)),
            Goal::Suspend {
                trigger,
                capture,
                goal,
            } => {
                let trigger = binder.compile(&trigger);
                let capture = binder.compile(&capture);
                let goal = self.compile_goal(binder, &goal)?;
                control::suspend(trigger, capture, control::cut_begin(goal))
            }
            Goal::Throw(term) => control::throw(binder.compile(&term)),
            Goal::Try {
                goal,
                pattern,
                catch,
            } => {
                let goal = self.compile_goal(binder, &goal)?;
                let pattern = binder.compile_bind(&pattern);
                let catch = self.compile_catch(binder, &catch)?;
                control::try_(control::cut_begin(goal), pattern, catch)
            }
            Goal::Call(goal) => self.dynamic(binder.compile(&goal)),
            Goal::Cut => control::cut_end(),
            Goal::True => Trampoline::Okay,
            Goal::Fail => Trampoline::Fail,
            Goal::Source(source) => control::source(source),
            Goal::Callable(term) => self.compile_callable(binder, &term)?,
            Goal::Other(term) => return Err(CompileError::Unrecognized(term)),
        };
        Ok(tr)
    }

    fn compile_goals(&self, binder: &mut Binder, goals: &[Term]) -> Result<Vec<Trampoline>, CompileError> {
        goals
            .iter()
            .map(|goal| self.compile_goal(binder, goal))
            .collect()
    }

    /// System predicates by name first, then user predicates.
    fn compile_callable(&self, binder: &mut Binder, term: &Term) -> Result<Trampoline, CompileError> {
        if let Some((predicate, args)) = self.system_call(term) {
            return Ok(control::builtin(predicate, binder.compile(&args)));
        }

        let prototype =
            Prototype::of(term).ok_or_else(|| CompileError::Unrecognized(term.clone()))?;
        if !self.database.contains(&prototype) {
            return Err(CompileError::Undefined(term.clone()));
        }

        let query = binder.compile(&self.rewriter.rewrite(&prototype, term));
        let cell = self.cell(&prototype);
        Ok(Trampoline::new(move |rt| {
            rt.query = query(&rt.env);
            let tr = cell.borrow().clone();
            tr
        }))
    }

    fn system_call(&self, term: &Term) -> Option<(Rc<dyn BuiltinPredicate>, Term)> {
        if let Some((head, args)) = term.decompose(Operator::Tuple) {
            let name = head.as_atom()?;
            return self.predicates.system(name.name()).map(|p| (p, args));
        }
        if let Some(tree) = term.as_tree() {
            return self
                .predicates
                .system(tree.operator.name())
                .map(|p| (p, term.clone()));
        }
        let atom = term.as_atom()?;
        self.predicates.system(atom.name()).map(|p| (p, Term::nil()))
    }

    /// The recovery part of `try`. It may name a value rather than a goal,
    /// as in `try(G, err(X), X)`: an integer or host value (other than a
    /// source) succeeds as it stands.
    fn compile_catch(&self, binder: &mut Binder, catch: &Term) -> Result<Trampoline, CompileError> {
        match analyze::classify(catch) {
            Goal::Call(goal) => {
                let source = binder.compile(&goal);
                let call = self.dynamic(source.clone());
                Ok(Trampoline::new(move |rt| match analyze::classify(&source(&rt.env)) {
                    Goal::Other(value) if is_value(&value) => Trampoline::Okay,
                    _ => call.clone(),
                }))
            }
            Goal::Other(value) if is_value(&value) => Ok(Trampoline::Okay),
            _ => self.compile_goal(binder, catch),
        }
    }

    /// A goal only known at run time; compiled when reached, with its own
    /// cut barrier and environment.
    fn dynamic(&self, source: TermSource) -> Trampoline {
        let engine = self.this.clone();
        Trampoline::new(move |rt| {
            let goal = source(&rt.env);
            match engine.upgrade() {
                Some(engine) => engine.compile_dynamic(rt, &goal),
                None => {
                    warn!("engine dropped before {} was called", goal);
                    Trampoline::Fail
                }
            }
        })
    }

    fn compile_dynamic(&self, rt: &mut Runtime, goal: &Term) -> Trampoline {
        let goal = goal.final_term();
        match analyze::classify(&goal) {
            Goal::Call(inner) if inner.as_free_reference().is_some() => {
                return control::throw_term(rt, instantiation_error())
            }
            Goal::Other(term) => return control::throw_term(rt, type_error("callable", &term)),
            _ => {}
        }

        let mut binder = Binder::new();
        match self.compile_goal(&mut binder, &goal) {
            Ok(tr) => {
                let env = binder.identity_env();
                control::save_env(control::cut_begin(Trampoline::new(move |rt| {
                    rt.env = env.clone();
                    tr.clone()
                })))
            }
            Err(error) => {
                debug!("cannot call {}: {}", goal, error);
                control::throw_term(rt, compile_error(&error))
            }
        }
    }
}

fn is_value(term: &Term) -> bool {
    matches!(term.final_term(), Term::Int(_) | Term::Data(_))
}

impl Drop for Engine {
    fn drop(&mut self) {
        // Compiled predicates reach each other through their cells.
        for cell in self.cells.get_mut().values() {
            let compiled = cell.replace(Trampoline::Fail);
            drop(compiled);
        }
    }
}

/// Logs each activation of the wrapped predicate and keeps the goal stack
/// reported with uncaught exceptions.
fn trace(tr: Trampoline) -> Trampoline {
    let enter = Trampoline::new(move |rt| {
        let tracer0 = rt.tracer.clone();
        rt.tracer = tracer0.enter(rt.query.clone());

        let tracer = tracer0.clone();
        rt.push_rem(Trampoline::new(move |rt| {
            rt.tracer = tracer.clone();
            Trampoline::Okay
        }));
        rt.push_alt(Trampoline::new(move |rt| {
            rt.tracer = tracer0.clone();
            Trampoline::Fail
        }));
        tr.clone()
    });

    Trampoline::new(move |rt| {
        let goal = rt.query.to_string();
        let indent = rt.tracer.indent.clone();
        info!("{}QUERY {}", indent, goal);

        let fail = Rc::new((indent, goal));
        let ok = fail.clone();
        rt.push_rem(Trampoline::new(move |_| {
            info!("{}OK___ {}", ok.0, ok.1);
            Trampoline::Okay
        }));
        rt.push_alt(Trampoline::new(move |_| {
            info!("{}FAIL_ {}", fail.0, fail.1);
            Trampoline::Fail
        }));
        enter.clone()
    })
}
